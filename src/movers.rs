//! The "Moving On" flexi record, which tracks members about to move to another section
//!
//! Flexi records are tables whose columns are defined by each section. Their data rows only carry
//! opaque `f_N` keys, which a separate structure query maps to the column names the leaders chose.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::accessor::{Accessor, Fields};
use crate::error::OsmError;
use crate::record::{PlainRecord, Record};
use crate::utils::{id_of, items_of, text_of};

/// Rename the `f_N` keys of `row` (matched case-insensitively) to their column names.
///
/// A column whose name is already taken, by a fixed field or by another column, keeps its `f_N` key.
pub fn apply_flexi_structure(row: &mut Record, columns: &BTreeMap<String, String>) {
    let mut renamed = Vec::new();
    for (field, name) in columns {
        let key = row.keys()
            .find(|k| k.eq_ignore_ascii_case(field))
            .cloned();
        if let Some(key) = key {
            if let Some(value) = row.remove(&key) {
                renamed.push((key, name, value));
            }
        }
    }

    for (key, name, value) in renamed {
        if row.contains_key(name.as_str()) {
            log::warn!("Flexi column {} is named {:?}, which is already taken. Keeping it as {}", key, name, key);
            row.insert(key, value);
        } else {
            row.insert(name.clone(), value);
        }
    }
}

/// Read the `f_N` → column name mapping out of a flexi structure answer.
///
/// The structure is a list of row groups; the first one describes the fixed member columns, so only
/// rows whose `field` looks like `f_N` are kept.
pub fn flexi_columns(structure: &Value) -> BTreeMap<String, String> {
    let groups = structure.get("structure").unwrap_or(structure);
    let mut columns = BTreeMap::new();

    if let Value::Array(groups) = groups {
        for group in groups {
            let rows = match group.get("rows") {
                Some(Value::Array(rows)) => rows,
                _ => continue,
            };
            for row in rows.iter().filter_map(|r| r.as_object()) {
                let field = match text_of(row, "field") {
                    Some(f) => f,
                    None => continue,
                };
                let is_flexi = field.len() > 2 && field.get(..2).map_or(false, |p| p.eq_ignore_ascii_case("f_"));
                if is_flexi == false {
                    continue;
                }
                let name = text_of(row, "name").unwrap_or(field);
                columns.insert(field.to_string(), name.to_string());
            }
        }
    }
    columns
}


/// The contents of the movers flexi record for a term
#[derive(Clone, Debug, PartialEq)]
pub struct Movers {
    extra_id: String,
    name: String,
    columns: BTreeMap<String, String>,
    rows: Vec<PlainRecord>,
}

impl Movers {
    pub fn new(extra_id: String, name: String, columns: BTreeMap<String, String>, mut rows: Vec<Record>) -> Self {
        for row in rows.iter_mut() {
            apply_flexi_structure(row, &columns);
        }
        let rows = rows.into_iter().map(|r| PlainRecord::new("Mover", r)).collect();
        Self { extra_id, name, columns, rows }
    }

    /// Fetch the movers flexi record of a section.
    ///
    /// Not every section has one, in which case this returns `Ok(None)`.
    pub async fn fetch(accessor: &Accessor, section_id: &str, section_type: &str, term_id: &str) -> Result<Option<Self>, OsmError> {
        let wanted = crate::config::movers_flexi_name();

        let path = format!("extras.php?action=getExtraRecords&sectionid={}&section={}", section_id, section_type);
        let list = accessor.call(&path, &Fields::new()).await?;
        let flexi = items_of(&list)
            .into_iter()
            .find(|r| text_of(r, "name") == Some(wanted.as_str()));
        let flexi = match flexi {
            None => {
                log::debug!("Section {} has no {:?} flexi record", section_id, wanted);
                return Ok(None);
            },
            Some(f) => f,
        };
        let extra_id = id_of(&flexi, "extraid", "Movers")?;

        let path = format!("extras.php?action=getStructure&sectionid={}&extraid={}", section_id, extra_id);
        let structure = accessor.call(&path, &Fields::new()).await?;
        let columns = flexi_columns(&structure);

        let path = format!("extras.php?action=getData&sectionid={}&extraid={}&termid={}&section={}",
            section_id, extra_id, term_id, section_type);
        let data = accessor.call(&path, &Fields::new()).await?;

        Ok(Some(Self::new(extra_id, wanted, columns, items_of(&data))))
    }

    pub fn extra_id(&self) -> &str { &self.extra_id }
    pub fn name(&self) -> &str { &self.name }

    /// The column names chosen by the section, in `f_N` order
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.values().map(|s| s.as_str()).collect()
    }

    pub fn rows(&self) -> &[PlainRecord] {
        &self.rows
    }
}
