//! Members, and the per-section custom data attached to them

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;

use crate::error::OsmError;
use crate::record::{Lookup, Record};
use crate::traits::{FromMember, RecordView};

static NULL: Value = Value::Null;

/// A column of a custom data group
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct CustomDataColumn {
    #[serde(deserialize_with = "crate::utils::de_id")]
    pub column_id: String,
    #[serde(default)]
    pub varname: String,
    #[serde(default)]
    pub label: String,
}

impl CustomDataColumn {
    /// Whether `name` designates this column: by varname, or by label (case-insensitive, spaces ignored)
    pub fn matches(&self, name: &str) -> bool {
        if self.varname == name {
            return true;
        }
        squash(&self.label) == squash(name)
    }
}

fn squash(text: &str) -> String {
    text.chars()
        .filter(|c| c.is_whitespace() == false)
        .flat_map(|c| c.to_lowercase())
        .collect()
}

/// A named bundle of custom fields (e.g. the primary contact details)
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct CustomDataGroup {
    #[serde(deserialize_with = "crate::utils::de_id")]
    pub group_id: String,
    pub identifier: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub columns: Vec<CustomDataColumn>,
}

/// How a section lays out its custom data. Section administrators can rename and reorder these fields,
/// so values are always addressed by group and column ids found here, never by position.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CustomDataStructure {
    groups: Vec<CustomDataGroup>,
}

impl CustomDataStructure {
    pub fn new(groups: Vec<CustomDataGroup>) -> Self {
        Self { groups }
    }

    /// Parse the answer of the custom data structure query (`{"data": [group, ...]}`)
    pub fn from_value(value: &Value) -> Result<Self, OsmError> {
        let list = value.get("data").unwrap_or(value);
        let groups = Vec::<CustomDataGroup>::deserialize(list)
            .map_err(|err| OsmError::invalid("CustomDataStructure", err))?;
        Ok(Self { groups })
    }

    pub fn groups(&self) -> &[CustomDataGroup] {
        &self.groups
    }

    pub fn group(&self, identifier: &str) -> Option<&CustomDataGroup> {
        self.groups.iter().find(|g| g.identifier == identifier)
    }

    /// Resolve `"group_identifier.column"` to `(group_id, column_id)`
    pub fn resolve(&self, dotted: &str) -> Option<(&str, &str)> {
        let mut parts = dotted.splitn(2, '.');
        let head = parts.next()?;
        let tail = parts.next()?;

        let group = self.group(head)?;
        let column = group.columns.iter()
            .find(|c| c.varname == tail)
            .or_else(|| group.columns.iter().find(|c| c.matches(tail)))?;
        Some((&group.group_id, &column.column_id))
    }

    /// Every `"group.varname"` this structure can resolve
    pub fn dotted_names(&self) -> Vec<String> {
        self.groups.iter()
            .flat_map(|g| g.columns.iter().map(move |c| format!("{}.{}", g.identifier, c.varname)))
            .collect()
    }
}


/// A member of a section: a flat record, plus custom data resolved through the section's [`CustomDataStructure`]
#[derive(Clone, Debug, PartialEq)]
pub struct Member {
    id: String,
    record: Record,
    /// group id → column id → value
    custom_data: HashMap<String, HashMap<String, Value>>,
    structure: Arc<CustomDataStructure>,
}

impl Member {
    /// Build a member from a record. A `custom_data` member (group id → column id → value) is moved to the side table
    pub fn new<S: ToString>(id: S, mut record: Record, structure: Arc<CustomDataStructure>) -> Self {
        let mut custom_data = HashMap::new();
        if let Some(Value::Object(groups)) = record.remove("custom_data") {
            for (group_id, columns) in groups {
                if let Value::Object(columns) = columns {
                    custom_data.insert(group_id, columns.into_iter().collect());
                }
            }
        }

        Self { id: id.to_string(), record, custom_data, structure }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn structure(&self) -> &CustomDataStructure {
        &self.structure
    }

    /// Look `"group.column"` up in the custom data only
    pub fn custom_lookup(&self, dotted: &str) -> Lookup<'_> {
        match self.structure.resolve(dotted) {
            None => Lookup::NotFound,
            Some((group_id, column_id)) => {
                let value = self.custom_data.get(group_id).and_then(|g| g.get(column_id));
                // The column exists for this section, this member just has no value for it
                Lookup::Found(value.unwrap_or(&NULL))
            },
        }
    }
}

impl RecordView for Member {
    fn kind(&self) -> &'static str { "Member" }
    fn record(&self) -> &Record { &self.record }

    fn lookup(&self, key: &str) -> Lookup<'_> {
        Lookup::from(self.record.get(key))
            .or_else(|| self.custom_lookup(key))
    }

    fn available_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.record.keys().cloned().collect();
        keys.extend(self.structure.dotted_names());
        keys
    }
}


/// The members of a section, by member id
#[derive(Debug)]
pub struct Members<M = Member> {
    items: BTreeMap<String, M>,
}

impl<M: FromMember> Members<M> {
    /// Parse the members query answer.
    ///
    /// Both `{"data": {id: record}}` and `{"identifier": key, "items": [record]}` are understood.
    pub fn from_value(value: &Value, structure: Arc<CustomDataStructure>) -> Result<Self, OsmError> {
        let mut items = BTreeMap::new();

        match (value.get("data"), value.get("items")) {
            (Some(Value::Object(data)), _) => {
                for (id, record) in data {
                    if let Value::Object(record) = record {
                        items.insert(id.clone(), M::from_member(Member::new(id, record.clone(), structure.clone())));
                    }
                }
            },
            (_, Some(Value::Array(list))) => {
                let identifier = value.get("identifier").and_then(|v| v.as_str()).unwrap_or("scoutid");
                for record in list.iter().filter_map(|r| r.as_object()) {
                    let id = crate::utils::id_of(record, identifier, "Member")?;
                    items.insert(id.clone(), M::from_member(Member::new(id, record.clone(), structure.clone())));
                }
            },
            // PHP encodes an empty map as an empty list
            (Some(Value::Array(list)), _) if list.is_empty() => {},
            _ => return Err(OsmError::invalid("Members", "neither a \"data\" map nor an \"items\" list")),
        }

        Ok(Self { items })
    }

    pub fn get(&self, id: &str) -> Option<&M> {
        self.items.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &M> {
        self.items.values()
    }

    pub fn ids(&self) -> impl Iterator<Item = &String> {
        self.items.keys()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<M> Default for Members<M> {
    fn default() -> Self {
        Self { items: BTreeMap::new() }
    }
}
