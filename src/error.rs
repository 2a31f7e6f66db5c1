//! Errors returned by this crate

use thiserror::Error;

use crate::accessor::Fields;

/// Why an HTTP exchange with OSM did not produce a usable response
#[derive(Debug, Error)]
pub enum TransportFailure {
    /// The request could not be sent, or the response could not be read
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    /// The transport refused to carry the request (used by non-HTTP transports)
    #[error("transport unavailable: {0}")]
    Unavailable(String),
    /// The server answered with a non-200 status and a body that could not be used
    #[error("unexpected HTTP status {status}: {body}")]
    Status { status: u16, body: String },
    /// The server kept answering 429 until the retry budget ran out
    #[error("rate limit still exceeded after {attempts} attempts")]
    RateLimitExhausted { attempts: u32 },
}

/// The error type for every fallible operation of this crate
#[derive(Debug, Error)]
pub enum OsmError {
    #[error("transport failure calling {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: TransportFailure,
    },

    /// OSM sometimes answers with a bare string instead of JSON. Never treat it as empty data.
    #[error("OSM API error from {url}:\nvalues = {fields:?}\nresult = {body}")]
    MalformedResponse {
        url: String,
        fields: Fields,
        body: String,
    },

    /// A well-formed JSON answer that carries an `error` (or `err`) member
    #[error("OSM API error from {url}:\nvalues = {fields:?}\nerror = {message}")]
    Api {
        url: String,
        fields: Fields,
        message: String,
    },

    #[error("{kind} has no attribute {key:?} (available keys: {available:?})")]
    MissingAttribute {
        kind: &'static str,
        key: String,
        available: Vec<String>,
    },

    #[error("invalid {kind} record: {reason}")]
    InvalidRecord { kind: &'static str, reason: String },

    #[error("authorisation failed: {0}")]
    Auth(String),

    #[error("cache error: {0}")]
    Cache(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Url(#[from] url::ParseError),
}

impl OsmError {
    pub(crate) fn invalid<S: ToString>(kind: &'static str, reason: S) -> Self {
        Self::InvalidRecord { kind, reason: reason.to_string() }
    }

    /// Whether this error comes from the network layer (as opposed to a problem with the data itself)
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }
}
