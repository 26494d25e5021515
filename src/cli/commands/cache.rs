//! Cache command - inspect and maintain the image cache

use crate::cache::{CacheEntry, ImageCache};
use crate::cli::args::{CacheAction, CacheArgs, OutputFormat};
use crate::config::Config;
use crate::error::{SkyshotError, SkyshotResult};
use chrono::{DateTime, Utc};
use console::style;
use std::io::{self, Write};
use std::path::Path;
use tokio::fs;

/// Execute the cache command
pub async fn execute(args: CacheArgs, config: &Config) -> SkyshotResult<()> {
    let cache = ImageCache::open(&config.cache).await?;

    match args.action {
        CacheAction::List { format } => list_entries(&cache, format).await,
        CacheAction::Get {
            location,
            date,
            json,
        } => get_entry(&cache, &location, resolve_date(date), json).await,
        CacheAction::Put {
            location,
            file,
            date,
            prompt,
            info,
        } => {
            put_entry(
                &cache,
                &location,
                resolve_date(date),
                &file,
                prompt,
                info.unwrap_or(serde_json::Value::Null),
            )
            .await
        }
        CacheAction::Remove { location, date } => {
            remove_entry(&cache, &location, resolve_date(date)).await
        }
        CacheAction::Reconcile => reconcile(&cache).await,
        CacheAction::Clear { yes } => clear(&cache, yes).await,
    }
}

fn resolve_date(date: Option<DateTime<Utc>>) -> DateTime<Utc> {
    date.unwrap_or_else(Utc::now)
}

fn validate_location(location: &str) -> SkyshotResult<()> {
    if location.trim().is_empty() {
        return Err(SkyshotError::InvalidLocation(location.to_string()));
    }
    Ok(())
}

async fn list_entries(cache: &ImageCache, format: OutputFormat) -> SkyshotResult<()> {
    let entries = cache.entries().await;

    if entries.is_empty() {
        match format {
            OutputFormat::Json => println!("[]"),
            OutputFormat::Plain => {}
            OutputFormat::Table => println!("No cached images."),
        }
        return Ok(());
    }

    match format {
        OutputFormat::Table => print_table(&entries, cache.capacity()),
        OutputFormat::Json => print_json(&entries)?,
        OutputFormat::Plain => print_plain(&entries),
    }

    Ok(())
}

fn print_table(entries: &[CacheEntry], capacity: usize) {
    println!(
        "{:<12} {:<12} {:<18} {:<20}",
        style("LOCATION").bold(),
        style("DATE").bold(),
        style("KEY").bold(),
        style("CREATED").bold()
    );
    println!("{}", "-".repeat(64));

    for entry in entries {
        println!(
            "{:<12} {:<12} {:<18} {:<20}",
            entry.location_key,
            entry.request_date.format("%Y-%m-%d"),
            &entry.key.as_str()[..16],
            entry.created_at.format("%Y-%m-%d %H:%M")
        );
    }

    println!();
    println!("Total: {}/{} image(s)", entries.len(), capacity);
}

fn print_json(entries: &[CacheEntry]) -> SkyshotResult<()> {
    #[derive(serde::Serialize)]
    struct EntryJson<'a> {
        key: &'a str,
        #[serde(flatten)]
        entry: &'a CacheEntry,
    }

    let json: Vec<EntryJson<'_>> = entries
        .iter()
        .map(|entry| EntryJson {
            key: entry.key.as_str(),
            entry,
        })
        .collect();

    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}

fn print_plain(entries: &[CacheEntry]) {
    for entry in entries {
        println!("{}", entry.blob_name);
    }
}

async fn get_entry(
    cache: &ImageCache,
    location: &str,
    date: DateTime<Utc>,
    json: bool,
) -> SkyshotResult<()> {
    validate_location(location)?;

    let hit = cache.get(location, date).await?.ok_or_else(|| {
        SkyshotError::EntryNotFound(format!("{} on {}", location, date.format("%Y-%m-%d")))
    })?;

    if json {
        let mut value = serde_json::to_value(&hit.entry)?;
        if let Some(obj) = value.as_object_mut() {
            obj.insert("key".to_string(), hit.entry.key.as_str().into());
            obj.insert("path".to_string(), hit.path.display().to_string().into());
        }
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        println!("{}", hit.path.display());
    }
    Ok(())
}

async fn put_entry(
    cache: &ImageCache,
    location: &str,
    date: DateTime<Utc>,
    file: &Path,
    prompt: Option<String>,
    info: serde_json::Value,
) -> SkyshotResult<()> {
    validate_location(location)?;

    let bytes = fs::read(file)
        .await
        .map_err(|e| SkyshotError::io(format!("reading image {}", file.display()), e))?;

    let path = cache.set(location, date, &bytes, info, prompt).await?;
    println!("{} cached {}", style("✓").green(), path.display());
    Ok(())
}

async fn remove_entry(
    cache: &ImageCache,
    location: &str,
    date: DateTime<Utc>,
) -> SkyshotResult<()> {
    validate_location(location)?;

    match cache.remove(location, date).await? {
        Some(entry) => {
            println!("{} removed {}", style("✓").green(), entry.blob_name);
            Ok(())
        }
        None => Err(SkyshotError::EntryNotFound(format!(
            "{} on {}",
            location,
            date.format("%Y-%m-%d")
        ))),
    }
}

async fn reconcile(cache: &ImageCache) -> SkyshotResult<()> {
    let report = cache.reconcile().await?;

    if report.purged_entries.is_empty() && report.removed_orphans.is_empty() {
        println!("Cache is consistent.");
        return Ok(());
    }

    for key in &report.purged_entries {
        println!("  {} dropped entry {} (image missing)", style("•").yellow(), key);
    }
    for name in &report.removed_orphans {
        println!("  {} deleted unreferenced {}", style("•").red(), name);
    }
    println!(
        "{} dropped {} stale entry(ies), deleted {} orphaned image(s)",
        style("✓").green(),
        report.purged_entries.len(),
        report.removed_orphans.len()
    );
    Ok(())
}

async fn clear(cache: &ImageCache, skip_confirm: bool) -> SkyshotResult<()> {
    let count = cache.len().await;
    if count == 0 {
        println!("No cached images to clear.");
        return Ok(());
    }

    if !skip_confirm {
        print!("Remove {} cached image(s)? [y/N] ", count);
        let _ = io::stdout().flush();

        let mut input = String::new();
        if io::stdin().read_line(&mut input).is_err() {
            println!("Failed to read input, aborting.");
            return Ok(());
        }

        if !input.trim().eq_ignore_ascii_case("y") {
            println!("Aborted.");
            return Ok(());
        }
    }

    let removed = cache.clear().await?;
    println!("{} cleared {} image(s)", style("✓").green(), removed);
    Ok(())
}
