//! Integration tests for Skyshot

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use std::path::Path;
    use tempfile::TempDir;

    /// Binary isolated from the user's config and cache
    fn skyshot(temp: &TempDir) -> Command {
        let mut cmd = cargo_bin_cmd!("skyshot");
        cmd.env("SKYSHOT_CONFIG", temp.path().join("config.toml"))
            .env("SKYSHOT_CACHE_DIR", temp.path().join("cache"))
            .env_remove("RUST_LOG");
        cmd
    }

    fn image(temp: &TempDir, name: &str, bytes: &[u8]) -> std::path::PathBuf {
        let path = temp.path().join(name);
        std::fs::write(&path, bytes).unwrap();
        path
    }

    fn put(temp: &TempDir, location: &str, file: &Path) {
        skyshot(temp)
            .args(["cache", "put", location])
            .arg(file)
            .args(["--date", "2024-05-01T09:00:00Z"])
            .assert()
            .success()
            .stdout(predicate::str::contains("cached"));
    }

    #[test]
    fn help_displays() {
        let temp = TempDir::new().unwrap();
        skyshot(&temp)
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("durable cache"));
    }

    #[test]
    fn version_displays() {
        let temp = TempDir::new().unwrap();
        skyshot(&temp)
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("skyshot"));
    }

    #[test]
    fn list_empty() {
        let temp = TempDir::new().unwrap();
        skyshot(&temp)
            .args(["cache", "list"])
            .assert()
            .success()
            .stdout(predicate::str::contains("No cached images"));
    }

    #[test]
    fn put_then_get_same_day() {
        let temp = TempDir::new().unwrap();
        let file = image(&temp, "in.png", b"\x89PNG payload");
        put(&temp, "90210", &file);

        let output = skyshot(&temp)
            .args(["cache", "get", "90210", "--date", "2024-05-01T23:00:00Z"])
            .assert()
            .success()
            .get_output()
            .stdout
            .clone();

        let path = String::from_utf8(output).unwrap();
        assert_eq!(std::fs::read(path.trim()).unwrap(), b"\x89PNG payload");
    }

    #[test]
    fn get_miss_fails() {
        let temp = TempDir::new().unwrap();
        skyshot(&temp)
            .args(["cache", "get", "90210", "--date", "2024-05-02"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Cache entry not found"));
    }

    #[test]
    fn get_json_includes_entry_fields() {
        let temp = TempDir::new().unwrap();
        let file = image(&temp, "in.png", b"img");
        skyshot(&temp)
            .args(["cache", "put", "90210"])
            .arg(&file)
            .args(["--date", "2024-05-01", "--prompt", "rainy boulevard"])
            .args(["--info", r#"{"city":"Beverly Hills"}"#])
            .assert()
            .success();

        skyshot(&temp)
            .args(["cache", "get", "90210", "--date", "2024-05-01", "--json"])
            .assert()
            .success()
            .stdout(predicate::str::contains("\"prompt\": \"rainy boulevard\""))
            .stdout(predicate::str::contains("\"city\": \"Beverly Hills\""))
            .stdout(predicate::str::contains("\"path\""));
    }

    #[test]
    fn deleted_blob_is_a_miss() {
        let temp = TempDir::new().unwrap();
        let file = image(&temp, "in.png", b"img");
        put(&temp, "90210", &file);

        for entry in std::fs::read_dir(temp.path().join("cache")).unwrap() {
            let path = entry.unwrap().path();
            if path.extension().is_some_and(|ext| ext == "png") {
                std::fs::remove_file(path).unwrap();
            }
        }

        skyshot(&temp)
            .args(["cache", "get", "90210", "--date", "2024-05-01"])
            .assert()
            .failure();

        let metadata = std::fs::read_to_string(temp.path().join("cache/metadata.json")).unwrap();
        assert!(!metadata.contains("90210"));
    }

    #[test]
    fn capacity_evicts_first_inserted() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join("config.toml"),
            "[cache]\ncapacity = 2\n",
        )
        .unwrap();
        let file = image(&temp, "in.png", b"img");

        put(&temp, "a", &file);
        put(&temp, "b", &file);
        skyshot(&temp)
            .args(["cache", "get", "a", "--date", "2024-05-01"])
            .assert()
            .success();
        put(&temp, "c", &file);

        skyshot(&temp)
            .args(["cache", "get", "a", "--date", "2024-05-01"])
            .assert()
            .failure();
        skyshot(&temp)
            .args(["cache", "list", "--format", "json"])
            .assert()
            .success()
            .stdout(predicate::str::contains("\"locationKey\": \"b\""))
            .stdout(predicate::str::contains("\"locationKey\": \"c\""));
    }

    #[test]
    fn zero_capacity_config_is_rejected() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("config.toml"), "[cache]\ncapacity = 0\n").unwrap();

        skyshot(&temp)
            .args(["cache", "list"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid configuration"))
            .stderr(predicate::str::contains("capacity"));
    }

    #[test]
    fn corrupt_metadata_is_ignored() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join("cache")).unwrap();
        std::fs::write(temp.path().join("cache/metadata.json"), "not json at all").unwrap();

        skyshot(&temp)
            .args(["cache", "list"])
            .assert()
            .success()
            .stdout(predicate::str::contains("No cached images"));
    }

    #[test]
    fn remove_then_clear() {
        let temp = TempDir::new().unwrap();
        let file = image(&temp, "in.png", b"img");
        put(&temp, "a", &file);
        put(&temp, "b", &file);

        skyshot(&temp)
            .args(["cache", "remove", "a", "--date", "2024-05-01"])
            .assert()
            .success()
            .stdout(predicate::str::contains("removed"));

        skyshot(&temp)
            .args(["cache", "clear", "--yes"])
            .assert()
            .success()
            .stdout(predicate::str::contains("cleared 1 image(s)"));
    }

    #[test]
    fn reconcile_reports_consistent_cache() {
        let temp = TempDir::new().unwrap();
        skyshot(&temp)
            .args(["cache", "reconcile"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Cache is consistent"));
    }

    #[test]
    fn invalid_date_rejected() {
        let temp = TempDir::new().unwrap();
        skyshot(&temp)
            .args(["cache", "get", "90210", "--date", "next week"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid date"));
    }

    #[test]
    fn config_path() {
        let temp = TempDir::new().unwrap();
        skyshot(&temp)
            .args(["config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("config.toml"));
    }

    #[test]
    fn config_show() {
        let temp = TempDir::new().unwrap();
        skyshot(&temp)
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[cache]"));
    }

    #[test]
    fn config_init_writes_defaults() {
        let temp = TempDir::new().unwrap();
        skyshot(&temp)
            .args(["config", "init"])
            .assert()
            .success();

        let written = std::fs::read_to_string(temp.path().join("config.toml")).unwrap();
        assert!(written.contains("capacity = 100"));
    }
}
