//! This module provides a local cache for OSM responses

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::accessor::{Body, Fields, ResultType};
use crate::error::OsmError;


/// A response cache, keyed by request, that can be persisted to a local file
#[derive(Debug)]
pub struct Cache {
    backing_file: Option<PathBuf>,
    ttl: Duration,
    data: CachedData,
    hits: u32,
    misses: u32,
}

#[derive(Default, Debug, PartialEq, Serialize, Deserialize)]
struct CachedData {
    entries: HashMap<String, CacheEntry>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
struct CacheEntry {
    stored_at: DateTime<Utc>,
    body: Body,
}

impl Cache {
    /// Initialize an empty cache that will be saved to `path`
    pub fn new(path: &Path) -> Self {
        Self {
            backing_file: Some(PathBuf::from(path)),
            ttl: crate::config::DEFAULT_CACHE_TTL,
            data: CachedData::default(),
            hits: 0,
            misses: 0,
        }
    }

    /// Initialize an empty cache that is never persisted
    pub fn in_memory() -> Self {
        Self {
            backing_file: None,
            ttl: crate::config::DEFAULT_CACHE_TTL,
            data: CachedData::default(),
            hits: 0,
            misses: 0,
        }
    }

    /// Initialize a cache from the content of a valid backing file if it exists.
    /// Returns an error otherwise
    pub fn from_file(path: &Path) -> Result<Self, OsmError> {
        let file = std::fs::File::open(path)
            .map_err(|err| OsmError::Cache(format!("Unable to open file {:?}: {}", path, err)))?;
        let data = serde_json::from_reader(std::io::BufReader::new(file))
            .map_err(|err| OsmError::Cache(format!("Unable to parse file {:?}: {}", path, err)))?;

        let mut cache = Self::new(path);
        cache.data = data;
        cache.purge_expired();
        Ok(cache)
    }

    /// Load the cache stored in `path`, or start from an empty one if that is not possible
    pub fn load_or_new(path: &Path) -> Self {
        match Self::from_file(path) {
            Ok(cache) => cache,
            Err(err) => {
                log::debug!("Not using the existing cache: {}", err);
                Self::new(path)
            },
        }
    }

    /// Set how long entries stay valid
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Store the current Cache to its backing file (if any). Expired entries are dropped first
    pub fn save(&mut self) -> Result<(), OsmError> {
        self.purge_expired();
        let path = match &self.backing_file {
            None => return Ok(()),
            Some(p) => p,
        };
        log::info!("Saving cache to {:?} (hits = {}, misses = {})", path, self.hits, self.misses);

        let file = std::fs::File::create(path)?;
        serde_json::to_writer(std::io::BufWriter::new(file), &self.data)
            .map_err(|err| OsmError::Cache(format!("Unable to serialize: {}", err)))
    }

    /// Forget every entry
    pub fn clear(&mut self) {
        self.data.entries.clear();
    }

    /// Drop every entry older than the TTL
    pub fn purge_expired(&mut self) {
        let ttl = self.chrono_ttl();
        let now = Utc::now();
        let before = self.data.entries.len();
        self.data.entries.retain(|_, entry| now.signed_duration_since(entry.stored_at) <= ttl);

        let purged = before - self.data.entries.len();
        if purged > 0 {
            log::debug!("Purged {} expired cache entries", purged);
        }
    }

    /// The canonical key of a request.
    ///
    /// `scope` identifies who is asking (see [`Credential::cache_scope`](crate::credential::Credential::cache_scope)),
    /// then come the result type, the URL and the fields sorted by name.
    pub fn key(scope: &str, result_type: ResultType, url: &Url, fields: &Fields) -> String {
        let query = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(fields.iter())
            .finish();
        let kind = match result_type {
            ResultType::Json => "json",
            ResultType::Text => "text",
        };
        format!("{} {} {}?{}", scope, kind, url, query)
    }

    fn chrono_ttl(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.ttl).unwrap_or_else(|_| chrono::Duration::weeks(52 * 100))
    }

    /// Return the entry stored under `key`, unless it is missing or older than the TTL
    pub fn get(&mut self, key: &str) -> Option<Body> {
        let ttl = self.chrono_ttl();
        let now = Utc::now();

        let fresh = match self.data.entries.get(key) {
            None => None,
            Some(entry) => Some(now.signed_duration_since(entry.stored_at) <= ttl),
        };

        match fresh {
            Some(true) => {
                self.hits += 1;
                self.data.entries.get(key).map(|entry| entry.body.clone())
            },
            Some(false) => {
                log::debug!("Cache entry expired: {}", key);
                self.data.entries.remove(key);
                self.misses += 1;
                None
            },
            None => {
                self.misses += 1;
                None
            },
        }
    }

    pub fn insert(&mut self, key: String, body: Body) {
        self.data.entries.insert(key, CacheEntry { stored_at: Utc::now(), body });
    }

    pub fn len(&self) -> usize {
        self.data.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.entries.is_empty()
    }

    /// `(hits, misses)` since this cache was created
    pub fn stats(&self) -> (u32, u32) {
        (self.hits, self.misses)
    }

    #[cfg(test)]
    fn backdate(&mut self, key: &str, age: chrono::Duration) {
        if let Some(entry) = self.data.entries.get_mut(key) {
            entry.stored_at = entry.stored_at - age;
        }
    }
}
