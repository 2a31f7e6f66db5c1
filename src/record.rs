//! Flat key/value records, as returned by most OSM endpoints

use serde_json::Value;

/// A flat OSM record
pub type Record = serde_json::Map<String, Value>;

/// The outcome of a key lookup
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Lookup<'a> {
    Found(&'a Value),
    NotFound,
}

impl<'a> Lookup<'a> {
    pub fn is_found(&self) -> bool {
        matches!(self, Lookup::Found(_))
    }

    /// Use `other` when this lookup failed
    pub fn or_else<F: FnOnce() -> Lookup<'a>>(self, other: F) -> Lookup<'a> {
        match self {
            Lookup::Found(_) => self,
            Lookup::NotFound => other(),
        }
    }
}

impl<'a> From<Option<&'a Value>> for Lookup<'a> {
    fn from(value: Option<&'a Value>) -> Self {
        match value {
            Some(v) => Lookup::Found(v),
            None => Lookup::NotFound,
        }
    }
}

/// A record with no structure around it, e.g. an OSM user or a badge progress row
#[derive(Clone, Debug, PartialEq)]
pub struct PlainRecord {
    kind: &'static str,
    record: Record,
}

impl PlainRecord {
    pub fn new(kind: &'static str, record: Record) -> Self {
        Self { kind, record }
    }

    pub fn into_record(self) -> Record {
        self.record
    }
}

impl crate::traits::RecordView for PlainRecord {
    fn kind(&self) -> &'static str { self.kind }
    fn record(&self) -> &Record { &self.record }
}
