use async_trait::async_trait;
use serde_json::Value;

use crate::client::{ApiRequest, HttpResponse};
use crate::error::{OsmError, TransportFailure};
use crate::member::Member;
use crate::record::{Lookup, Record};

/// Something able to carry an [`ApiRequest`] to OSM and bring back the raw answer
#[async_trait]
pub trait Transport: Send + Sync {
    /// POST the request fields (form-encoded) to the request URL.
    /// Only a failure to communicate is an error: any HTTP status is a valid response here.
    async fn post(&self, request: &ApiRequest) -> Result<HttpResponse, TransportFailure>;
}

/// Read access to a flat OSM record
pub trait RecordView {
    /// The name used in error messages (e.g. "Member")
    fn kind(&self) -> &'static str;

    fn record(&self) -> &Record;

    /// Look a key up. The default only checks the flat record
    fn lookup(&self, key: &str) -> Lookup<'_> {
        Lookup::from(self.record().get(key))
    }

    /// The keys that `lookup` can resolve, used to explain a failed lookup
    fn available_keys(&self) -> Vec<String> {
        self.record().keys().cloned().collect()
    }

    /// Returns the value stored under `key`, or a [`OsmError::MissingAttribute`] naming what was available
    fn get(&self, key: &str) -> Result<&Value, OsmError> {
        match self.lookup(key) {
            Lookup::Found(value) => Ok(value),
            Lookup::NotFound => Err(OsmError::MissingAttribute {
                kind: self.kind(),
                key: key.to_string(),
                available: self.available_keys(),
            }),
        }
    }

    /// Same as [`RecordView::get`], rendering the value as text (strings unquoted, null as empty)
    fn get_str(&self, key: &str) -> Result<String, OsmError> {
        self.get(key).map(crate::utils::value_to_string)
    }
}

/// Lets callers bring their own member type.
///
/// A [`Section`](crate::section::Section) builds its members as `M: FromMember`, so a wrapper type
/// with extra helpers can be used instead of [`Member`] without any global state.
pub trait FromMember: Send + Sync + Sized {
    fn from_member(member: Member) -> Self;
    fn member(&self) -> &Member;
}

impl FromMember for Member {
    fn from_member(member: Member) -> Self {
        member
    }

    fn member(&self) -> &Member {
        self
    }
}
