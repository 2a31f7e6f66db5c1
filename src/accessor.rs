//! The single entry point for OSM queries: transport, credential, response cache and rate limiter together

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use crate::cache::Cache;
use crate::client::{ApiRequest, HttpResponse, HttpTransport};
use crate::credential::Credential;
use crate::error::{OsmError, TransportFailure};
use crate::rate_limit::{RateLimitPolicy, RateLimitState};
use crate::traits::Transport;

/// Request parameters. Being a `BTreeMap`, they are always sorted by name
pub type Fields = BTreeMap<String, String>;

/// Build [`Fields`] from a list of pairs
pub fn fields<K: ToString, V: ToString>(pairs: &[(K, V)]) -> Fields {
    pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}

/// What a query is expected to return
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResultType {
    Json,
    /// Anything that is not JSON, e.g. the CSV payment exports
    Text,
}

/// A parsed response body
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "content")]
pub enum Body {
    Json(Value),
    Text(String),
}

/// Issues OSM queries, serving them from the cache when possible
pub struct Accessor {
    base_url: Url,
    credential: Credential,
    transport: Arc<dyn Transport>,
    cache: Mutex<Cache>,
    policy: RateLimitPolicy,
}

impl Accessor {
    /// Create an accessor that talks HTTPS to `base_url`. This does not start a connection
    pub fn new(base_url: &str, credential: Credential, cache: Cache) -> Result<Self, OsmError> {
        let transport = HttpTransport::new()
            .map_err(|source| OsmError::Transport { url: base_url.to_string(), source })?;
        Self::with_transport(base_url, credential, cache, Arc::new(transport))
    }

    /// Create an accessor with a custom transport
    pub fn with_transport(base_url: &str, credential: Credential, cache: Cache, transport: Arc<dyn Transport>) -> Result<Self, OsmError> {
        // Paths are joined to the base URL, which therefore has to look like a directory
        let base_url = if base_url.ends_with('/') {
            Url::parse(base_url)?
        } else {
            Url::parse(&format!("{}/", base_url))?
        };

        Ok(Self {
            base_url,
            credential,
            transport,
            cache: Mutex::new(cache),
            policy: RateLimitPolicy::default(),
        })
    }

    /// Replace the default rate limiting heuristics
    pub fn with_rate_limit_policy(mut self, policy: RateLimitPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn base_url(&self) -> &Url { &self.base_url }
    pub fn credential(&self) -> &Credential { &self.credential }
    pub fn transport(&self) -> &dyn Transport { self.transport.as_ref() }

    /// Run a query that returns JSON (an object or an array)
    pub async fn call(&self, path: &str, fields: &Fields) -> Result<Value, OsmError> {
        match self.query(path, fields, ResultType::Json).await? {
            Body::Json(value) => Ok(value),
            Body::Text(text) => Err(self.malformed(path, fields, text)),
        }
    }

    /// Run a query whose result is not JSON
    pub async fn call_text(&self, path: &str, fields: &Fields) -> Result<String, OsmError> {
        match self.query(path, fields, ResultType::Text).await? {
            Body::Text(text) => Ok(text),
            Body::Json(value) => Ok(value.to_string()),
        }
    }

    /// Run a query, from the cache if a fresh answer is stored there
    pub async fn query(&self, path: &str, fields: &Fields, result_type: ResultType) -> Result<Body, OsmError> {
        let url = self.base_url.join(path)?;
        let key = Cache::key(&self.credential.cache_scope(), result_type, &url, fields);

        let cached = self.lock_cache().get(&key);
        if let Some(body) = cached {
            log::debug!("Cache hit: {}", url);
            return Ok(body);
        }

        let response = self.send(&url, fields).await?;
        let body = parse_body(&url, fields, &response, result_type)?;

        if response.status == 200 {
            self.lock_cache().insert(key, body.clone());
        }
        Ok(body)
    }

    /// POST a request, waiting and retrying as long as the rate limit allows
    async fn send(&self, url: &Url, fields: &Fields) -> Result<HttpResponse, OsmError> {
        let mut attempts = 0;
        loop {
            attempts += 1;

            let mut request = ApiRequest::new(url.clone(), fields.clone());
            self.credential.attach(&mut request, self.transport.as_ref()).await?;

            log::debug!("POST {} {:?}", url, fields);
            let response = match self.transport.post(&request).await {
                Ok(r) => r,
                Err(source) => {
                    log::error!("Request failed: {} {:?}", url, fields);
                    return Err(OsmError::Transport { url: url.to_string(), source });
                },
            };

            if response.status == 429 {
                if attempts >= self.policy.max_attempts {
                    log::error!("Still rate limited after {} attempts: {}", attempts, url);
                    return Err(OsmError::Transport {
                        url: url.to_string(),
                        source: TransportFailure::RateLimitExhausted { attempts },
                    });
                }
                let delay = self.policy.retry_delay(&response);
                log::warn!("Rate limited by OSM, retrying {} in {:?}", url, delay);
                tokio::time::sleep(delay).await;
                continue;
            }

            if response.status == 200 {
                if let Some(state) = RateLimitState::from_response(&response) {
                    if let Some(pause) = self.policy.observe(&state) {
                        log::warn!("Pausing for {:?} to let the rate limit reset", pause);
                        tokio::time::sleep(pause).await;
                    }
                }
            } else {
                log::warn!("HTTP {} from {} {:?}", response.status, url, fields);
            }

            return Ok(response);
        }
    }

    fn lock_cache(&self) -> MutexGuard<'_, Cache> {
        match self.cache.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn malformed(&self, path: &str, fields: &Fields, body: String) -> OsmError {
        OsmError::MalformedResponse { url: format!("{}{}", self.base_url, path), fields: fields.clone(), body }
    }

    /// Persist the response cache to its backing file
    pub fn save_cache(&self) -> Result<(), OsmError> {
        self.lock_cache().save()
    }

    /// Forget every cached response
    pub fn clear_cache(&self) {
        self.lock_cache().clear()
    }

    /// `(hits, misses)` of the response cache
    pub fn cache_stats(&self) -> (u32, u32) {
        self.lock_cache().stats()
    }

    /// Get the cache back, e.g. to hand it over to another accessor
    pub fn into_cache(self) -> Cache {
        match self.cache.into_inner() {
            Ok(cache) => cache,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

fn parse_body(url: &Url, fields: &Fields, response: &HttpResponse, result_type: ResultType) -> Result<Body, OsmError> {
    if result_type == ResultType::Text {
        if response.status != 200 {
            return Err(OsmError::Transport {
                url: url.to_string(),
                source: TransportFailure::Status { status: response.status, body: response.body.clone() },
            });
        }
        return Ok(Body::Text(response.body.clone()));
    }

    let value = match serde_json::from_str::<Value>(&response.body) {
        // OSM reports some errors as a bare string, which is valid JSON but not a result
        Ok(v) if v.is_object() || v.is_array() => v,
        _ => {
            if response.status != 200 {
                return Err(OsmError::Transport {
                    url: url.to_string(),
                    source: TransportFailure::Status { status: response.status, body: response.body.clone() },
                });
            }
            log::warn!("Result from {} is not JSON", url);
            return Err(OsmError::MalformedResponse { url: url.to_string(), fields: fields.clone(), body: response.body.clone() });
        },
    };

    for error_key in &["error", "err"] {
        if let Some(message) = value.get(*error_key) {
            if message.is_null() == false && message != &Value::Bool(false) {
                log::warn!("{} in JSON result from {} {:?}", error_key, url, fields);
                return Err(OsmError::Api {
                    url: url.to_string(),
                    fields: fields.clone(),
                    message: crate::utils::value_to_string(message),
                });
            }
        }
    }

    Ok(Body::Json(value))
}
