//! Sections, and the data they own once initialised

pub mod init_report;

use std::collections::BTreeMap;
use std::fmt::{Display, Error, Formatter};
use std::sync::Arc;

use bitflags::bitflags;
use chrono::NaiveDate;
use serde_json::Value;

use crate::accessor::{fields, Accessor, Fields};
use crate::badge::{BadgeType, Badges};
use crate::error::OsmError;
use crate::event::{events_from_value, Event};
use crate::member::{CustomDataStructure, Member, Members};
use crate::movers::Movers;
use crate::programme::Programme;
use crate::record::Record;
use crate::term::{resolve_term, terms_by_section, Term, TermSelection};
use crate::traits::{FromMember, RecordView};
use crate::user::Users;
use crate::utils::{id_of, text_of};

use init_report::InitReport;

bitflags! {
    /// The kinds of data a section fetches when it is initialised
    pub struct ObjectTypes: u8 {
        const MEMBERS = 1;
        const EVENTS = 2;
        /// The weekly meetings
        const PROGRAMME = 4;
        /// OSM users with access to the section
        const USERS = 8;
        /// The "Moving On" flexi record
        const MOVERS = 16;
        /// Every badge type. This costs four queries
        const BADGES = 32;
    }
}

impl Default for ObjectTypes {
    fn default() -> Self {
        Self::all()
    }
}


/// The kind of a section
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum SectionType {
    Squirrels,
    Beavers,
    Cubs,
    Scouts,
    Explorers,
    Adults,
    /// The waiting list
    Waiting,
    Other(String),
}

impl SectionType {
    pub fn parse(text: &str) -> Self {
        match text.to_lowercase().as_str() {
            "squirrels" => SectionType::Squirrels,
            "beavers" => SectionType::Beavers,
            "cubs" => SectionType::Cubs,
            "scouts" => SectionType::Scouts,
            "explorers" => SectionType::Explorers,
            "adults" => SectionType::Adults,
            "waiting" => SectionType::Waiting,
            _ => SectionType::Other(text.to_string()),
        }
    }

    /// The name OSM uses in its queries
    pub fn as_str(&self) -> &str {
        match self {
            SectionType::Squirrels => "squirrels",
            SectionType::Beavers => "beavers",
            SectionType::Cubs => "cubs",
            SectionType::Scouts => "scouts",
            SectionType::Explorers => "explorers",
            SectionType::Adults => "adults",
            SectionType::Waiting => "waiting",
            SectionType::Other(s) => s,
        }
    }
}

impl Display for SectionType {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        write!(f, "{}", self.as_str())
    }
}


/// A section the user has access to.
///
/// A section is built from a user role, then initialised once with [`Section::init`]. After that it is a read-only snapshot.
/// Each kind of data is fetched independently: when one fails, it is `None` and the failure is in [`Section::report`].
pub struct Section<M: FromMember = Member> {
    id: String,
    name: String,
    section_type: SectionType,
    group_name: String,
    is_default: bool,
    record: Record,

    initialized: bool,
    terms: Vec<Term>,
    term: Option<Term>,
    custom_structure: Arc<CustomDataStructure>,
    members: Option<Members<M>>,
    events: Option<Vec<Event>>,
    programme: Option<Programme>,
    users: Option<Users>,
    movers: Option<Movers>,
    badges: BTreeMap<BadgeType, Badges>,
    report: InitReport,
}

impl<M: FromMember> Section<M> {
    /// Build an uninitialised section from a `getUserRoles` record
    pub fn from_role(record: Record) -> Result<Self, OsmError> {
        let id = id_of(&record, "sectionid", "Section")?;
        let name = text_of(&record, "sectionname").unwrap_or(id.as_str()).to_string();
        let section_type = text_of(&record, "section")
            .map(SectionType::parse)
            .ok_or_else(|| OsmError::invalid("Section", format!("section {} has no type", id)))?;
        let group_name = text_of(&record, "groupname").unwrap_or_default().to_string();
        let is_default = matches!(record.get("isDefault"), Some(Value::String(s)) if s == "1")
            || record.get("isDefault") == Some(&Value::from(1));

        Ok(Self {
            id,
            name,
            section_type,
            group_name,
            is_default,
            record,
            initialized: false,
            terms: Vec::new(),
            term: None,
            custom_structure: Arc::new(CustomDataStructure::default()),
            members: None,
            events: None,
            programme: None,
            users: None,
            movers: None,
            badges: BTreeMap::new(),
            report: InitReport::new(),
        })
    }

    pub fn id(&self) -> &str { &self.id }
    pub fn name(&self) -> &str { &self.name }
    pub fn section_type(&self) -> &SectionType { &self.section_type }
    pub fn group_name(&self) -> &str { &self.group_name }
    /// Whether this is the section OSM opens by default for this user
    pub fn is_default(&self) -> bool { self.is_default }
    pub fn is_initialized(&self) -> bool { self.initialized }

    /// Every term of this section, in API order
    pub fn terms(&self) -> &[Term] { &self.terms }
    /// The term the data of this section was fetched for
    pub fn term(&self) -> Option<&Term> { self.term.as_ref() }

    pub fn custom_structure(&self) -> &CustomDataStructure { &self.custom_structure }
    pub fn members(&self) -> Option<&Members<M>> { self.members.as_ref() }
    pub fn events(&self) -> Option<&[Event]> { self.events.as_deref() }
    pub fn programme(&self) -> Option<&Programme> { self.programme.as_ref() }
    pub fn users(&self) -> Option<&Users> { self.users.as_ref() }
    pub fn movers(&self) -> Option<&Movers> { self.movers.as_ref() }
    pub fn badges(&self, badge_type: BadgeType) -> Option<&Badges> { self.badges.get(&badge_type) }

    /// What went wrong during [`Section::init`]
    pub fn report(&self) -> &InitReport { &self.report }

    /// Resolve the term, then fetch the requested kinds of data.
    ///
    /// This never fails as a whole: failures are logged and recorded in [`Section::report`].
    /// Calling this a second time does nothing.
    pub async fn init(&mut self, accessor: &Accessor, selection: &TermSelection, object_types: ObjectTypes, today: NaiveDate) {
        if self.initialized {
            log::info!("Section {} is already initialised", self.name);
            return;
        }
        self.initialized = true;
        self.report.info(&format!("Initialising section {} ({})", self.name, self.section_type));

        match accessor.call("api.php?action=getTerms", &Fields::new()).await {
            Err(err) => self.report.error(&self.name, "term", &format!("unable to fetch terms: {}", err)),
            Ok(value) => {
                self.terms = terms_by_section(&value).remove(&self.id).unwrap_or_default();
                self.term = resolve_term(&self.terms, selection, today, &self.name, &mut self.report);
            },
        }
        let term_id = self.term.as_ref().map(|t| t.id().to_string());

        if object_types.contains(ObjectTypes::MEMBERS) {
            self.custom_structure = match self.fetch_custom_structure(accessor).await {
                Ok(structure) => Arc::new(structure),
                Err(err) => {
                    self.report.warn(&self.name, "custom data", &err.to_string());
                    Arc::new(CustomDataStructure::default())
                },
            };
            let members = self.fetch_members(accessor, term_id.as_deref()).await;
            self.members = self.keep("members", members);
        }

        if object_types.contains(ObjectTypes::USERS) {
            let users = Users::fetch(accessor, &self.id).await;
            self.users = self.keep("users", users);
        }

        let term_id = match term_id {
            Some(t) => t,
            None => {
                self.report.debug(&format!("Section {} has no term, skipping term-scoped data", self.name));
                return;
            },
        };

        if object_types.contains(ObjectTypes::EVENTS) {
            let events = self.fetch_events(accessor, &term_id).await;
            self.events = self.keep("events", events);
        }

        if object_types.contains(ObjectTypes::PROGRAMME) {
            let programme = self.fetch_programme(accessor, &term_id).await;
            self.programme = self.keep("programme", programme);
        }

        if object_types.contains(ObjectTypes::MOVERS) {
            let movers = Movers::fetch(accessor, &self.id, self.section_type.as_str(), &term_id).await;
            self.movers = self.keep("movers", movers).flatten();
        }

        if object_types.contains(ObjectTypes::BADGES) {
            for badge_type in BadgeType::ALL.iter() {
                let badges = Badges::fetch(accessor, *badge_type, &self.id, self.section_type.as_str(), &term_id).await;
                if let Some(badges) = self.keep("badges", badges) {
                    self.badges.insert(*badge_type, badges);
                }
            }
        }
    }

    /// Record a failed fetch, so that it only affects its own kind of data
    fn keep<T>(&mut self, object: &str, result: Result<T, OsmError>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(err) => {
                self.report.warn(&self.name, object, &err.to_string());
                None
            },
        }
    }

    async fn fetch_custom_structure(&self, accessor: &Accessor) -> Result<CustomDataStructure, OsmError> {
        let path = format!("ext/customdata/?action=getStructure&section_id={}", self.id);
        let value = accessor.call(&path, &Fields::new()).await?;
        CustomDataStructure::from_value(&value)
    }

    async fn fetch_members(&self, accessor: &Accessor, term_id: Option<&str>) -> Result<Members<M>, OsmError> {
        let mut query = fields(&[("section_id", self.id.as_str())]);
        if let Some(term_id) = term_id {
            query.insert("term_id".to_string(), term_id.to_string());
        }
        let value = accessor.call("ext/members/contact/grid/?action=getMembers", &query).await?;
        Members::from_value(&value, self.custom_structure.clone())
    }

    async fn fetch_events(&self, accessor: &Accessor, term_id: &str) -> Result<Vec<Event>, OsmError> {
        let path = format!("ext/events/summary/?action=get&sectionid={}&termid={}", self.id, term_id);
        let value = accessor.call(&path, &Fields::new()).await?;
        Ok(events_from_value(&value, &self.name))
    }

    async fn fetch_programme(&self, accessor: &Accessor, term_id: &str) -> Result<Programme, OsmError> {
        let path = format!("programme.php?action=getProgrammeSummary&sectionid={}&termid={}", self.id, term_id);
        let value = accessor.call(&path, &Fields::new()).await?;
        Ok(Programme::from_value(&value, &self.name))
    }
}

impl<M: FromMember> RecordView for Section<M> {
    fn kind(&self) -> &'static str { "Section" }
    fn record(&self) -> &Record { &self.record }
}

impl<M: FromMember> std::fmt::Debug for Section<M> {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        write!(f, "Section({}, {:?}, {})", self.id, self.name, self.section_type)
    }
}
