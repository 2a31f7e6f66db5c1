//! Badges offered by a section, and the progress of its members towards them

use std::collections::BTreeMap;
use std::fmt::{Display, Error, Formatter};

use serde_json::Value;

use crate::accessor::{Accessor, Fields};
use crate::error::OsmError;
use crate::record::PlainRecord;
use crate::utils::{items_of, text_of, value_to_string};

/// The families of badges OSM knows about
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BadgeType {
    Challenge,
    Activity,
    Staged,
    Core,
}

impl BadgeType {
    pub const ALL: [BadgeType; 4] = [BadgeType::Challenge, BadgeType::Activity, BadgeType::Staged, BadgeType::Core];

    /// The name OSM uses in its queries
    pub fn as_str(&self) -> &'static str {
        match self {
            BadgeType::Challenge => "challenge",
            BadgeType::Activity => "activity",
            BadgeType::Staged => "staged",
            BadgeType::Core => "core",
        }
    }
}

impl Display for BadgeType {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        write!(f, "{}", self.as_str())
    }
}


/// Which section and term a badge was fetched for
#[derive(Clone, Debug, PartialEq)]
struct BadgeScope {
    section_id: String,
    section_type: String,
    term_id: String,
    badge_type: BadgeType,
}

/// A badge, with the names of its activities (requirements)
#[derive(Clone, Debug, PartialEq)]
pub struct Badge {
    key: String,
    name: String,
    table: String,
    activities: Vec<String>,
    scope: BadgeScope,
}

impl Badge {
    pub fn key(&self) -> &str { &self.key }
    pub fn name(&self) -> &str { &self.name }
    pub fn table(&self) -> &str { &self.table }
    pub fn badge_type(&self) -> BadgeType { self.scope.badge_type }

    /// The requirements of this badge, in OSM order
    pub fn activities(&self) -> &[String] {
        &self.activities
    }

    /// Fetch the progress of every member of the section towards this badge.
    ///
    /// This is not done when the section is initialised, since it costs one query per badge.
    pub async fn members(&self, accessor: &Accessor) -> Result<Vec<PlainRecord>, OsmError> {
        let path = format!("challenges.php?termid={}&type={}&sectionid={}&section={}&c={}",
            self.scope.term_id,
            self.scope.badge_type,
            self.scope.section_id,
            self.scope.section_type,
            self.name.to_lowercase());
        let value = accessor.call(&path, &Fields::new()).await?;

        Ok(items_of(&value)
            .into_iter()
            .map(|r| PlainRecord::new("BadgeProgress", r))
            .collect())
    }
}


/// The badges of one type for a section and term, by badge key
#[derive(Clone, Debug, PartialEq)]
pub struct Badges {
    badge_type: BadgeType,
    badges: BTreeMap<String, Badge>,
}

impl Badges {
    /// Parse a `getInitialBadges` answer (`details` and `structure`, both keyed by badge)
    pub fn from_value(value: &Value, badge_type: BadgeType, section_id: &str, section_type: &str, term_id: &str) -> Result<Self, OsmError> {
        let scope = BadgeScope {
            section_id: section_id.to_string(),
            section_type: section_type.to_string(),
            term_id: term_id.to_string(),
            badge_type,
        };

        let details = match value.get("details") {
            Some(Value::Object(details)) => details.clone(),
            // An empty PHP map comes back as a list
            Some(Value::Array(_)) | Some(Value::Null) | None => Default::default(),
            Some(other) => return Err(OsmError::invalid("Badges", format!("unexpected details {}", other))),
        };

        let mut badges = BTreeMap::new();
        for (key, detail) in details {
            let detail = match detail.as_object() {
                Some(d) => d,
                None => continue,
            };
            let name = text_of(detail, "name").unwrap_or(key.as_str()).to_string();
            let table = detail.get("table").map(value_to_string).unwrap_or_default();
            let activities = activity_names(value.get("structure").and_then(|s| s.get(&key)));

            badges.insert(key.clone(), Badge { key, name, table, activities, scope: scope.clone() });
        }

        Ok(Self { badge_type, badges })
    }

    /// Fetch the badges of one type
    pub async fn fetch(accessor: &Accessor, badge_type: BadgeType, section_id: &str, section_type: &str, term_id: &str) -> Result<Self, OsmError> {
        let path = format!("challenges.php?action=getInitialBadges&type={}&sectionid={}&section={}&termid={}",
            badge_type, section_id, section_type, term_id);
        let value = accessor.call(&path, &Fields::new()).await?;
        Self::from_value(&value, badge_type, section_id, section_type, term_id)
    }

    pub fn badge_type(&self) -> BadgeType { self.badge_type }

    pub fn get(&self, key: &str) -> Option<&Badge> {
        self.badges.get(key)
    }

    /// Find a badge by its display name
    pub fn by_name(&self, name: &str) -> Option<&Badge> {
        self.badges.values().find(|b| b.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Badge> {
        self.badges.values()
    }

    pub fn len(&self) -> usize {
        self.badges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.badges.is_empty()
    }
}

/// The second row group of a badge structure lists its activities
fn activity_names(structure: Option<&Value>) -> Vec<String> {
    let rows = structure
        .and_then(|s| s.get(1))
        .and_then(|group| group.get("rows"))
        .and_then(|rows| rows.as_array());

    match rows {
        None => Vec::new(),
        Some(rows) => rows.iter()
            .filter_map(|row| row.get("name"))
            .filter_map(|name| name.as_str())
            .map(|name| name.to_string())
            .collect(),
    }
}
