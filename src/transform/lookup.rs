//! Foreign-key resolution for the `LOOKUP_*` transformers.
//!
//! The engine never decides how a key is resolved. Callers inject a
//! [`LookupResolver`]; the CLI ships [`ReferenceTables`], an in-memory map
//! loaded from a JSON document of the form `{table: {by: {key: value}}}`.

use std::{collections::HashMap, fs::File, io::BufReader, path::Path};

use serde::Deserialize;
use thiserror::Error;

use crate::value::Value;

#[derive(Debug, Error)]
pub enum LookupError {
    #[error("lookup backend unavailable: {0}")]
    Unavailable(String),
    #[error("failed to read reference tables from {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse reference tables: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Resolves `value` found in column `by` of reference table `table`.
///
/// `Ok(None)` means the key is unknown and the value should pass through.
pub trait LookupResolver: Send + Sync {
    fn resolve(&self, table: &str, by: &str, value: &Value) -> Result<Option<Value>, LookupError>;
}

impl<F> LookupResolver for F
where
    F: Fn(&str, &str, &Value) -> Result<Option<Value>, LookupError> + Send + Sync,
{
    fn resolve(&self, table: &str, by: &str, value: &Value) -> Result<Option<Value>, LookupError> {
        self(table, by, value)
    }
}

/// Where a mapping's lookup transformers should resolve keys.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LookupBinding<'a> {
    pub table: Option<&'a str>,
    pub by: Option<&'a str>,
}

impl<'a> LookupBinding<'a> {
    pub fn new(table: Option<&'a str>, by: Option<&'a str>) -> Self {
        Self { table, by }
    }

    pub fn none() -> Self {
        Self::default()
    }

    pub fn target(&self) -> Option<(&'a str, &'a str)> {
        match (self.table, self.by) {
            (Some(table), Some(by)) if !table.is_empty() && !by.is_empty() => Some((table, by)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct ReferenceTables {
    tables: HashMap<String, HashMap<String, HashMap<String, serde_json::Value>>>,
}

impl ReferenceTables {
    pub fn from_json_str(input: &str) -> Result<Self, LookupError> {
        Ok(serde_json::from_str(input)?)
    }

    pub fn load(path: &Path) -> Result<Self, LookupError> {
        let file = File::open(path).map_err(|source| LookupError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }

    pub fn insert(
        &mut self,
        table: impl Into<String>,
        by: impl Into<String>,
        key: impl Into<String>,
        resolved: serde_json::Value,
    ) {
        self.tables
            .entry(table.into())
            .or_default()
            .entry(by.into())
            .or_default()
            .insert(key.into(), resolved);
    }

    pub fn table_count(&self) -> usize {
        self.tables.len()
    }
}

impl LookupResolver for ReferenceTables {
    fn resolve(&self, table: &str, by: &str, value: &Value) -> Result<Option<Value>, LookupError> {
        let key = value.as_display();
        Ok(self
            .tables
            .get(table)
            .and_then(|columns| columns.get(by))
            .and_then(|keys| keys.get(key.trim()))
            .cloned()
            .map(Value::from_json))
    }
}
