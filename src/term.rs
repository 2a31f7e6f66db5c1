//! Terms, the date ranges that scope members, events and programmes

use std::collections::HashMap;

use chrono::NaiveDate;
use serde_json::Value;

use crate::error::OsmError;
use crate::record::Record;
use crate::section::init_report::InitReport;
use crate::traits::RecordView;
use crate::utils::{id_of, parse_date, text_of};

/// A term of a section
#[derive(Clone, Debug, PartialEq)]
pub struct Term {
    id: String,
    section_id: String,
    name: String,
    start_date: NaiveDate,
    end_date: NaiveDate,
    record: Record,
}

impl Term {
    pub fn new<S: ToString, T: ToString>(id: S, name: T, start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self {
            id: id.to_string(),
            section_id: String::new(),
            name: name.to_string(),
            start_date,
            end_date,
            record: Record::new(),
        }
    }

    /// Build a term from a `getTerms` record (`termid`, `name`, `startdate`, `enddate`)
    pub fn from_record(record: Record) -> Result<Self, OsmError> {
        let id = id_of(&record, "termid", "Term")?;
        let name = text_of(&record, "name").unwrap_or_default().to_string();
        let start_date = date_field(&record, "startdate")?;
        let end_date = date_field(&record, "enddate")?;
        let section_id = record.get("sectionid").map(crate::utils::value_to_string).unwrap_or_default();
        Ok(Self { id, section_id, name, start_date, end_date, record })
    }

    pub fn id(&self) -> &str { &self.id }
    /// The section this term belongs to. Terms are specific to each section, even when they share a name
    pub fn section_id(&self) -> &str { &self.section_id }
    pub fn name(&self) -> &str { &self.name }
    pub fn start_date(&self) -> NaiveDate { self.start_date }
    pub fn end_date(&self) -> NaiveDate { self.end_date }

    /// Whether `date` falls within this term (both ends included)
    pub fn is_active_on(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date <= self.end_date
    }
}

impl RecordView for Term {
    fn kind(&self) -> &'static str { "Term" }
    fn record(&self) -> &Record { &self.record }
}

fn date_field(record: &Record, key: &str) -> Result<NaiveDate, OsmError> {
    let text = text_of(record, key)
        .ok_or_else(|| OsmError::invalid("Term", format!("no {}", key)))?;
    parse_date(text)
        .ok_or_else(|| OsmError::invalid("Term", format!("invalid {} {:?}", key, text)))
}

/// Split the `getTerms` answer (section id → list of terms) into terms.
/// Invalid terms are skipped.
pub fn terms_by_section(value: &Value) -> HashMap<String, Vec<Term>> {
    let mut result = HashMap::new();
    let map = match value.as_object() {
        None => return result,
        Some(m) => m,
    };

    for (section_id, terms) in map {
        let terms = match terms.as_array() {
            None => continue,
            Some(t) => t,
        };
        let parsed = terms.iter()
            .filter_map(|t| t.as_object().cloned())
            .filter_map(|t| match Term::from_record(t) {
                Ok(mut term) => {
                    term.section_id = section_id.clone();
                    Some(term)
                },
                Err(err) => {
                    log::warn!("Ignoring a term of section {}: {}", section_id, err);
                    None
                },
            })
            .collect();
        result.insert(section_id.clone(), parsed);
    }
    result
}


/// Which term a section should use
#[derive(Clone, Debug, PartialEq)]
pub enum TermSelection {
    /// The term active today
    Current,
    /// The term with exactly this name
    Named(String),
    /// The term that contains this date
    OnDate(NaiveDate),
}

impl Default for TermSelection {
    fn default() -> Self {
        TermSelection::Current
    }
}

/// Pick the term of `section` matching `selection`, among `terms` (in API order).
///
/// When several terms match, the last one is used. This mirrors what OSM usually returns during a term changeover,
/// but the API gives no ordering guarantee.
pub fn resolve_term(terms: &[Term], selection: &TermSelection, today: NaiveDate, section: &str, report: &mut InitReport) -> Option<Term> {
    let (candidates, description): (Vec<&Term>, String) = match selection {
        TermSelection::Named(name) => (
            terms.iter().filter(|t| t.name() == name).collect(),
            format!("named {:?}", name),
        ),
        TermSelection::OnDate(date) => (
            terms.iter().filter(|t| t.is_active_on(*date)).collect(),
            format!("active on {}", date),
        ),
        TermSelection::Current => (
            terms.iter().filter(|t| t.is_active_on(today)).collect(),
            "currently active".to_string(),
        ),
    };

    if candidates.is_empty() {
        let available: Vec<&str> = terms.iter().map(|t| t.name()).collect();
        match selection {
            TermSelection::Current => report.warn(section, "term", &format!("no term is {} (terms: {:?})", description, available)),
            _ => report.error(section, "term", &format!("no term is {} (terms: {:?})", description, available)),
        }
        return None;
    }

    if candidates.len() > 1 {
        let names: Vec<&str> = candidates.iter().map(|t| t.name()).collect();
        report.warn(section, "term", &format!("{} terms are {}, picking the last one: {:?}", candidates.len(), description, names));
    }

    candidates.last().map(|t| (*t).clone())
}
