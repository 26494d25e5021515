//! Cache key derivation
//!
//! A key is the SHA-256 of `"{location}-{day}"`, where `location` is the
//! trimmed, lowercased location identifier and `day` is the UTC calendar day
//! of the request (`YYYY-MM-DD`). Any two timestamps on the same UTC day map
//! to the same key.

use crate::error::{SkyshotError, SkyshotResult};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Length of a rendered key in hex characters
pub const KEY_HEX_LEN: usize = 64;

/// Opaque, fixed-length cache key (lowercase hex SHA-256)
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey(String);

impl CacheKey {
    /// Parse a key previously rendered by [`derive_key`]
    pub fn parse(raw: &str) -> Option<Self> {
        let valid = raw.len() == KEY_HEX_LEN
            && raw
                .chars()
                .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c));
        valid.then(|| Self(raw.to_string()))
    }

    /// Hex representation
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// On-disk blob name for this key
    pub fn blob_name(&self, extension: &str) -> String {
        format!("{}.{}", self.0, extension)
    }

    /// Whether `name` is this key's blob under some plain extension
    pub fn owns_blob(&self, name: &str) -> bool {
        name.strip_prefix(self.0.as_str())
            .and_then(|rest| rest.strip_prefix('.'))
            .is_some_and(is_plain_extension)
    }
}

/// Non-empty ASCII alphanumeric file extension
pub fn is_plain_extension(extension: &str) -> bool {
    !extension.is_empty() && extension.chars().all(|c| c.is_ascii_alphanumeric())
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Normalize a location identifier before hashing
pub fn normalize_location(location: &str) -> String {
    location.trim().to_ascii_lowercase()
}

/// UTC calendar day of a timestamp
pub fn calendar_day<Tz: TimeZone>(date: &DateTime<Tz>) -> NaiveDate {
    date.with_timezone(&Utc).date_naive()
}

/// Derive the cache key for a (location, date) pair
pub fn derive_key<Tz: TimeZone>(location: &str, date: &DateTime<Tz>) -> CacheKey {
    let input = format!(
        "{}-{}",
        normalize_location(location),
        calendar_day(date).format("%Y-%m-%d")
    );

    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    CacheKey(hex::encode(hasher.finalize()))
}

/// Parse a request date given as RFC 3339 or a bare `YYYY-MM-DD`
///
/// Bare dates are taken as midnight UTC.
pub fn parse_request_date(input: &str) -> SkyshotResult<DateTime<Utc>> {
    let input = input.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Ok(dt.with_timezone(&Utc));
    }

    NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .ok()
        .and_then(|day| day.and_hms_opt(0, 0, 0))
        .map(|midnight| midnight.and_utc())
        .ok_or_else(|| SkyshotError::InvalidDate(input.to_string()))
}
