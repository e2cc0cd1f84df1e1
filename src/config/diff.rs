use std::collections::HashMap;

use serde::Serialize;
use serde_json::{Map, Value as JsonValue};
use similar::TextDiff;

use super::{ColumnMapping, ConfigError, MigrationConfig, TableRef};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MappingChange {
    pub source: String,
    pub old: ColumnMapping,
    pub new: ColumnMapping,
}

impl MappingChange {
    /// Unified line diff of the two mappings rendered as pretty JSON.
    pub fn unified_diff(&self) -> Result<String, ConfigError> {
        let old = serde_json::to_string_pretty(&self.old)?;
        let new = serde_json::to_string_pretty(&self.new)?;
        Ok(TextDiff::from_lines(old.as_str(), new.as_str())
            .unified_diff()
            .context_radius(2)
            .header("old", "new")
            .to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SettingChange {
    pub field: &'static str,
    pub old: JsonValue,
    pub new: JsonValue,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConfigDiff {
    pub added: Vec<ColumnMapping>,
    pub removed: Vec<ColumnMapping>,
    pub modified: Vec<MappingChange>,
    pub settings: Vec<SettingChange>,
}

impl ConfigDiff {
    /// Compares two snapshots. Mappings are keyed by source column.
    pub fn between(old: &MigrationConfig, new: &MigrationConfig) -> Self {
        let old_by_source: HashMap<&str, &ColumnMapping> = old
            .mappings
            .iter()
            .map(|mapping| (mapping.source.as_str(), mapping))
            .collect();
        let new_by_source: HashMap<&str, &ColumnMapping> = new
            .mappings
            .iter()
            .map(|mapping| (mapping.source.as_str(), mapping))
            .collect();

        let mut diff = ConfigDiff::default();
        for mapping in &new.mappings {
            match old_by_source.get(mapping.source.as_str()) {
                None => diff.added.push(mapping.clone()),
                Some(previous) if *previous != mapping => diff.modified.push(MappingChange {
                    source: mapping.source.clone(),
                    old: (*previous).clone(),
                    new: mapping.clone(),
                }),
                Some(_) => {}
            }
        }
        diff.removed = old
            .mappings
            .iter()
            .filter(|mapping| !new_by_source.contains_key(mapping.source.as_str()))
            .cloned()
            .collect();
        diff.settings = setting_changes(old, new);
        diff
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty()
            && self.removed.is_empty()
            && self.modified.is_empty()
            && self.settings.is_empty()
    }
}

fn setting_changes(old: &MigrationConfig, new: &MigrationConfig) -> Vec<SettingChange> {
    let pairs = [
        ("module", JsonValue::from(old.module.as_str()), JsonValue::from(new.module.as_str())),
        ("priority", JsonValue::from(old.priority), JsonValue::from(new.priority)),
        ("source", table_json(&old.source), table_json(&new.source)),
        ("target", table_json(&old.target), table_json(&new.target)),
        ("batchSize", JsonValue::from(old.batch_size), JsonValue::from(new.batch_size)),
        (
            "dependencies",
            JsonValue::from(old.dependencies.clone()),
            JsonValue::from(new.dependencies.clone()),
        ),
    ];
    pairs
        .into_iter()
        .filter(|(_, before, after)| before != after)
        .map(|(field, old, new)| SettingChange { field, old, new })
        .collect()
}

fn table_json(table: &TableRef) -> JsonValue {
    let mut object = Map::new();
    object.insert("database".into(), table.database.as_str().into());
    object.insert("table".into(), table.table.as_str().into());
    JsonValue::Object(object)
}
