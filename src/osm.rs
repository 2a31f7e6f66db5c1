//! The root of the object graph: the sections a user can access

use chrono::NaiveDate;

use crate::accessor::{Accessor, Fields};
use crate::error::OsmError;
use crate::member::Member;
use crate::section::{ObjectTypes, Section};
use crate::term::TermSelection;
use crate::traits::FromMember;
use crate::utils::items_of;

/// What [`Osm::new`] should load
#[derive(Clone, Debug, Default)]
pub struct OsmOptions {
    /// Only these sections (by id). `None` means every section
    pub section_ids: Option<Vec<String>>,
    pub term: TermSelection,
    pub object_types: ObjectTypes,
    /// The date "current" terms are resolved against. `None` means today
    pub today: Option<NaiveDate>,
}

impl OsmOptions {
    pub fn with_sections<S: ToString>(mut self, ids: &[S]) -> Self {
        self.section_ids = Some(ids.iter().map(|id| id.to_string()).collect());
        self
    }

    pub fn with_term(mut self, term: TermSelection) -> Self {
        self.term = term;
        self
    }

    pub fn with_object_types(mut self, object_types: ObjectTypes) -> Self {
        self.object_types = object_types;
        self
    }

    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }
}


/// The initialised sections of an OSM user
#[derive(Debug)]
pub struct Osm<M: FromMember = Member> {
    /// In the order of the user roles
    sections: Vec<Section<M>>,
    default_index: Option<usize>,
}

impl<M: FromMember> Osm<M> {
    /// Discover the sections of the user, and initialise the requested ones.
    ///
    /// Only a failure to fetch the user roles is an error: whatever goes wrong inside a section
    /// is in that section's [`report`](Section::report).
    pub async fn new(accessor: &Accessor, options: OsmOptions) -> Result<Self, OsmError> {
        let today = options.today.unwrap_or_else(crate::utils::today);
        let roles = accessor.call("api.php?action=getUserRoles", &Fields::new()).await?;

        let mut sections = Vec::new();
        for role in items_of(&roles) {
            if role.contains_key("section") == false {
                continue;
            }
            let mut section: Section<M> = match Section::from_role(role) {
                Ok(s) => s,
                Err(err) => {
                    log::warn!("Ignoring a user role: {}", err);
                    continue;
                },
            };
            if let Some(wanted) = &options.section_ids {
                if wanted.iter().any(|id| id == section.id()) == false {
                    continue;
                }
            }

            section.init(accessor, &options.term, options.object_types, today).await;
            log::info!("Section {} ({}), term = {}",
                section.name(),
                section.section_type(),
                section.term().map(|t| t.name()).unwrap_or("none"));
            sections.push(section);
        }

        let default_index = sections.iter()
            .rposition(|s| s.is_default())
            .or_else(|| sections.len().checked_sub(1));
        if let Some(section) = default_index.and_then(|i| sections.get(i)) {
            log::info!("Default section = {}", section.name());
        }

        let osm = Self { sections, default_index };
        if let Some(terms) = osm.inconsistent_terms() {
            log::warn!("Sections are not on the same term: {:?}", terms);
        }
        Ok(osm)
    }

    /// The initialised sections, in the order of the user roles
    pub fn sections(&self) -> &[Section<M>] {
        &self.sections
    }

    pub fn section(&self, id: &str) -> Option<&Section<M>> {
        self.sections.iter().find(|s| s.id() == id)
    }

    /// The section marked as default by OSM (the last one if several are), or else the last section
    pub fn default_section(&self) -> Option<&Section<M>> {
        self.default_index.and_then(|i| self.sections.get(i))
    }

    /// When the sections did not resolve to terms with the same name, the `(section, term)` names of every section that has a term
    pub fn inconsistent_terms(&self) -> Option<Vec<(&str, &str)>> {
        let terms: Vec<(&str, &str)> = self.sections.iter()
            .filter_map(|s| s.term().map(|t| (s.name(), t.name())))
            .collect();

        let first = terms.first()?.1;
        if terms.iter().all(|(_, name)| *name == first) {
            None
        } else {
            Some(terms)
        }
    }
}
