//! The OSM users (leaders, helpers, parents with a login) who can access a section

use serde_json::Value;

use crate::accessor::{Accessor, Fields};
use crate::error::OsmError;
use crate::record::{PlainRecord, Record};
use crate::traits::RecordView;
use crate::utils::{items_of, text_of};

/// The users with access to a section
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Users {
    users: Vec<PlainRecord>,
}

impl Users {
    pub fn from_value(value: &Value) -> Self {
        let users = items_of(value)
            .into_iter()
            .map(|r| PlainRecord::new("User", r))
            .collect();
        Self { users }
    }

    pub async fn fetch(accessor: &Accessor, section_id: &str) -> Result<Self, OsmError> {
        let path = format!("ext/settings/access/?action=getUsersForSection&sectionid={}", section_id);
        let value = accessor.call(&path, &Fields::new()).await?;
        Ok(Self::from_value(&value))
    }

    pub fn iter(&self) -> impl Iterator<Item = &PlainRecord> {
        self.users.iter()
    }

    /// Find a user by (exact) name
    pub fn by_name(&self, name: &str) -> Option<&PlainRecord> {
        self.users.iter().find(|u| user_name(u.record()) == Some(name))
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

fn user_name(record: &Record) -> Option<&str> {
    text_of(record, "firstname").or_else(|| text_of(record, "name"))
}
