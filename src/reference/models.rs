//! Reference data types and cache keys

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::CacheError;

/// A vehicle brand
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Make {
    pub brand_id: String,
    pub name: String,
}

/// A vehicle model belonging to one brand
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Model {
    pub model_id: String,
    pub brand_id: String,
    pub name: String,
}

/// Validated upstream brand identifier (non-empty decimal digits)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BrandId(String);

impl BrandId {
    pub fn parse(raw: &str) -> Result<Self, CacheError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() || !trimmed.chars().all(|c| c.is_ascii_digit()) {
            return Err(CacheError::InvalidArgument(format!(
                "brand id must be numeric, got {:?}",
                raw
            )));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BrandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Cached data category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheCategory {
    /// The full brand list, stored as a single entry
    Makes,
    /// Models of one brand, one entry per brand
    Models,
}

impl CacheCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheCategory::Makes => "makes",
            CacheCategory::Models => "models",
        }
    }
}

impl fmt::Display for CacheCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of one cache entry
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    Makes,
    Models(BrandId),
}

impl CacheKey {
    const ALL_MAKES: &'static str = "all";

    pub fn category(&self) -> CacheCategory {
        match self {
            CacheKey::Makes => CacheCategory::Makes,
            CacheKey::Models(_) => CacheCategory::Models,
        }
    }

    pub fn key(&self) -> &str {
        match self {
            CacheKey::Makes => Self::ALL_MAKES,
            CacheKey::Models(brand_id) => brand_id.as_str(),
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.category(), self.key())
    }
}

/// A persisted payload and the time it was fetched from upstream
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub category: CacheCategory,
    pub key: String,
    pub payload: serde_json::Value,
    pub fetched_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn new(key: &CacheKey, payload: serde_json::Value, fetched_at: DateTime<Utc>) -> Self {
        Self {
            category: key.category(),
            key: key.key().to_string(),
            payload,
            fetched_at,
        }
    }

    /// Eligible to satisfy a read only while `now - fetched_at < ttl`
    pub fn is_fresh(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now - self.fetched_at < ttl
    }
}
