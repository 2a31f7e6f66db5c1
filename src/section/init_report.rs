//! Tracks what went wrong while a section was being initialised

use std::fmt::{Display, Error, Formatter};

/// How bad a problem was
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

/// Something that went wrong while initialising a section, without aborting it
#[derive(Clone, Debug, PartialEq)]
pub struct InitIssue {
    pub severity: Severity,
    /// Name of the section
    pub section: String,
    /// What was being fetched ("term", "members", "programme"...)
    pub object: String,
    pub details: String,
}

impl Display for InitIssue {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        write!(f, "[{}] {}: {}", self.section, self.object, self.details)
    }
}


/// Logs problems as they happen, and keeps them so that callers can tell complete data from partial data
#[derive(Clone, Debug, Default)]
pub struct InitReport {
    issues: Vec<InitIssue>,
}

impl InitReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether nothing went wrong at all
    pub fn is_success(&self) -> bool {
        self.issues.is_empty()
    }

    /// Log an error
    pub fn error(&mut self, section: &str, object: &str, details: &str) {
        log::error!("{}: {}: {}", section, object, details);
        self.push(Severity::Error, section, object, details);
    }
    /// Log a warning
    pub fn warn(&mut self, section: &str, object: &str, details: &str) {
        log::warn!("{}: {}: {}", section, object, details);
        self.push(Severity::Warning, section, object, details);
    }
    /// Log an info
    pub fn info(&mut self, text: &str) {
        log::info!("{}", text);
    }
    /// Log a debug message
    pub fn debug(&mut self, text: &str) {
        log::debug!("{}", text);
    }

    fn push(&mut self, severity: Severity, section: &str, object: &str, details: &str) {
        self.issues.push(InitIssue {
            severity,
            section: section.to_string(),
            object: object.to_string(),
            details: details.to_string(),
        });
    }

    pub fn issues(&self) -> &[InitIssue] {
        &self.issues
    }

    pub fn warnings(&self) -> Vec<&InitIssue> {
        self.issues.iter().filter(|i| i.severity == Severity::Warning).collect()
    }

    pub fn errors(&self) -> Vec<&InitIssue> {
        self.issues.iter().filter(|i| i.severity == Severity::Error).collect()
    }

    /// The issues about one kind of object (e.g. "programme")
    pub fn about(&self, object: &str) -> Vec<&InitIssue> {
        self.issues.iter().filter(|i| i.object == object).collect()
    }
}
