//! Mapping configuration: binds source columns to target columns with
//! per-column transformer and validator pipelines.

pub mod diff;
pub mod error;
pub mod export;
pub mod store;

use std::{collections::HashMap, fmt, fs, path::Path, str::FromStr};

use log::warn;
use serde::{Deserialize, Deserializer, Serialize, de};
use serde_json::{Map, Value as JsonValue};

use crate::{
    analyze::ColumnRecommendation,
    transform::{LookupBinding, Transformer},
    validate::Validator,
};

pub use diff::{ConfigDiff, MappingChange, SettingChange};
pub use export::typescript_definition;
pub use error::ConfigError;
pub use store::{ConfigStore, ConfigSummary, StoreError, VersionInfo};

pub const DEFAULT_BATCH_SIZE: usize = 1000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRef {
    pub database: String,
    pub table: String,
}

impl TableRef {
    pub fn new(database: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            table: table.into(),
        }
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.database.is_empty() {
            f.write_str(&self.table)
        } else {
            write!(f, "{}.{}", self.database, self.table)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnMapping {
    pub source: String,
    pub target: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transformers: Option<Vec<Transformer>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validators: Option<Vec<Validator>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ignore: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lookup_table: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lookup_by: Option<String>,
}

impl ColumnMapping {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            transformers: None,
            validators: None,
            required: None,
            ignore: None,
            lookup_table: None,
            lookup_by: None,
        }
    }

    pub fn with_transformers(mut self, transformers: Vec<Transformer>) -> Self {
        self.transformers = Some(transformers);
        self
    }

    pub fn with_validators(mut self, validators: Vec<Validator>) -> Self {
        self.validators = Some(validators);
        self
    }

    pub fn with_lookup(mut self, table: impl Into<String>, by: impl Into<String>) -> Self {
        self.lookup_table = Some(table.into());
        self.lookup_by = Some(by.into());
        self
    }

    pub fn ignored(mut self) -> Self {
        self.ignore = Some(true);
        self
    }

    pub fn is_ignored(&self) -> bool {
        self.ignore.unwrap_or(false)
    }

    pub fn pipeline(&self) -> &[Transformer] {
        self.transformers.as_deref().unwrap_or_default()
    }

    pub fn lookup_binding(&self) -> LookupBinding<'_> {
        LookupBinding::new(self.lookup_table.as_deref(), self.lookup_by.as_deref())
    }

    fn from_json(index: usize, raw: &JsonValue) -> Result<Self, ConfigError> {
        let object = raw
            .as_object()
            .ok_or_else(|| ConfigError::mapping(index, "", "mapping", "must be a JSON object"))?;
        let source = mapping_string(object, index, "", "source")?
            .ok_or_else(|| ConfigError::mapping(index, "", "source", "is required"))?;
        let column = source.as_str();
        let target = mapping_string(object, index, column, "target")?
            .ok_or_else(|| ConfigError::mapping(index, column, "target", "is required"))?;

        let transformers = mapping_list(object, index, column, "transformers")?
            .map(|names| {
                names
                    .iter()
                    .map(|name| {
                        Transformer::from_str(name)
                            .map_err(|err| ConfigError::mapping(index, column, "transformers", err.to_string()))
                    })
                    .collect::<Result<Vec<_>, _>>()
            })
            .transpose()?;
        let validators = mapping_list(object, index, column, "validators")?
            .map(|names| {
                names
                    .iter()
                    .map(|name| {
                        Validator::from_str(name)
                            .map_err(|err| ConfigError::mapping(index, column, "validators", err.to_string()))
                    })
                    .collect::<Result<Vec<_>, _>>()
            })
            .transpose()?;

        let required = mapping_bool(object, index, column, "required")?;
        let ignore = mapping_bool(object, index, column, "ignore")?;
        let lookup_table = mapping_string(object, index, column, "lookupTable")?;
        let lookup_by = mapping_string(object, index, column, "lookupBy")?;

        Ok(ColumnMapping {
            source,
            target,
            transformers,
            validators,
            required,
            ignore,
            lookup_table,
            lookup_by,
        })
    }
}

fn present<'a>(object: &'a Map<String, JsonValue>, field: &str) -> Option<&'a JsonValue> {
    object.get(field).filter(|value| !value.is_null())
}

fn mapping_string(
    object: &Map<String, JsonValue>,
    index: usize,
    column: &str,
    field: &'static str,
) -> Result<Option<String>, ConfigError> {
    match present(object, field) {
        None => Ok(None),
        Some(JsonValue::String(text)) => Ok(Some(text.clone())),
        Some(other) => Err(ConfigError::mapping(
            index,
            column,
            field,
            format!("must be a string, got {other}"),
        )),
    }
}

fn mapping_bool(
    object: &Map<String, JsonValue>,
    index: usize,
    column: &str,
    field: &'static str,
) -> Result<Option<bool>, ConfigError> {
    match present(object, field) {
        None => Ok(None),
        Some(JsonValue::Bool(flag)) => Ok(Some(*flag)),
        Some(other) => Err(ConfigError::mapping(
            index,
            column,
            field,
            format!("must be true or false, got {other}"),
        )),
    }
}

fn mapping_list(
    object: &Map<String, JsonValue>,
    index: usize,
    column: &str,
    field: &'static str,
) -> Result<Option<Vec<String>>, ConfigError> {
    let Some(raw) = present(object, field) else {
        return Ok(None);
    };
    let items = raw.as_array().ok_or_else(|| {
        ConfigError::mapping(index, column, field, format!("must be a list of names, got {raw}"))
    })?;
    items
        .iter()
        .map(|item| {
            item.as_str().map(str::to_string).ok_or_else(|| {
                ConfigError::mapping(index, column, field, format!("entry {item} is not a string"))
            })
        })
        .collect::<Result<Vec<_>, _>>()
        .map(Some)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationConfig {
    pub name: String,
    pub module: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<i64>,
    pub source: TableRef,
    pub target: TableRef,
    pub batch_size: usize,
    pub dependencies: Vec<String>,
    pub mappings: Vec<ColumnMapping>,
}

impl MigrationConfig {
    pub fn new(name: impl Into<String>, module: impl Into<String>, source: TableRef, target: TableRef) -> Self {
        Self {
            name: name.into(),
            module: module.into(),
            priority: None,
            source,
            target,
            batch_size: DEFAULT_BATCH_SIZE,
            dependencies: Vec::new(),
            mappings: Vec::new(),
        }
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&contents)
    }

    pub fn from_json_str(input: &str) -> Result<Self, ConfigError> {
        let raw: JsonValue = serde_json::from_str(input)?;
        Self::from_json_value(&raw)
    }

    /// Parses and validates a configuration document.
    pub fn from_json_value(raw: &JsonValue) -> Result<Self, ConfigError> {
        let object = raw
            .as_object()
            .ok_or_else(|| ConfigError::setting("configuration", "must be a JSON object"))?;

        let name = match present(object, "name") {
            Some(JsonValue::String(name)) => name.clone(),
            Some(other) => return Err(ConfigError::setting("name", format!("must be a string, got {other}"))),
            None => return Err(ConfigError::setting("name", "is required")),
        };
        let module = match present(object, "module") {
            Some(JsonValue::String(module)) => module.clone(),
            Some(other) => {
                return Err(ConfigError::setting("module", format!("must be a string, got {other}")));
            }
            None => String::new(),
        };
        let priority = match present(object, "priority") {
            Some(value) => Some(
                value
                    .as_i64()
                    .ok_or_else(|| ConfigError::setting("priority", format!("must be an integer, got {value}")))?,
            ),
            None => None,
        };
        let source = table_ref(object, "source")?;
        let target = table_ref(object, "target")?;
        let batch_size = match present(object, "batchSize") {
            Some(value) => value
                .as_i64()
                .filter(|size| *size > 0)
                .map(|size| size as usize)
                .ok_or_else(|| {
                    ConfigError::setting("batchSize", format!("must be a positive integer, got {value}"))
                })?,
            None => DEFAULT_BATCH_SIZE,
        };
        let dependencies = match present(object, "dependencies") {
            Some(value) => serde_json::from_value::<Vec<String>>(value.clone())
                .map_err(|_| ConfigError::setting("dependencies", format!("must be a list of names, got {value}")))?,
            None => Vec::new(),
        };
        let mappings = match present(object, "mappings") {
            Some(JsonValue::Array(items)) => items
                .iter()
                .enumerate()
                .map(|(index, item)| ColumnMapping::from_json(index, item))
                .collect::<Result<Vec<_>, _>>()?,
            Some(other) => {
                return Err(ConfigError::setting("mappings", format!("must be a list, got {other}")));
            }
            None => return Err(ConfigError::setting("mappings", "is required")),
        };

        let config = MigrationConfig {
            name,
            module,
            priority,
            source,
            target,
            batch_size,
            dependencies,
            mappings,
        };
        config.validate()?;
        Ok(config)
    }

    /// Checks the invariants that hold regardless of how the value was built.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::setting("name", "must not be empty"));
        }
        if self.batch_size == 0 {
            return Err(ConfigError::setting("batchSize", "must be a positive integer, got 0"));
        }
        let mut seen: HashMap<&str, usize> = HashMap::new();
        for (index, mapping) in self.mappings.iter().enumerate() {
            if mapping.source.trim().is_empty() {
                return Err(ConfigError::mapping(index, &mapping.source, "source", "must not be empty"));
            }
            if mapping.target.trim().is_empty() {
                return Err(ConfigError::mapping(index, &mapping.source, "target", "must not be empty"));
            }
            if let Some(first) = seen.insert(mapping.source.as_str(), index) {
                return Err(ConfigError::DuplicateSource {
                    index,
                    column: mapping.source.clone(),
                    first,
                });
            }
        }
        Ok(())
    }

    pub fn to_json_value(&self) -> Result<JsonValue, ConfigError> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn to_json_pretty(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Mappings that take part in reads and batch execution.
    pub fn active_mappings(&self) -> impl Iterator<Item = &ColumnMapping> {
        self.mappings.iter().filter(|mapping| !mapping.is_ignored())
    }

    pub fn mapping(&self, source: &str) -> Option<&ColumnMapping> {
        self.mappings.iter().find(|mapping| mapping.source == source)
    }

    /// Builds the read query for the non-ignored source columns.
    ///
    /// Falls back to `SELECT * FROM table` when nothing is selectable. A limit
    /// of zero is treated as no limit. Each `.`-separated part of the table
    /// name is quoted like the columns.
    pub fn select_query(&self, table: Option<&str>, limit: Option<usize>, dialect: SqlDialect) -> String {
        let table = dialect.quote_path(table.unwrap_or(&self.source.table));
        let columns = self
            .active_mappings()
            .map(|mapping| dialect.quote(&mapping.source))
            .collect::<Vec<_>>();
        if columns.is_empty() {
            return format!("SELECT * FROM {table}");
        }
        let columns = columns.join(", ");
        match (dialect, limit.filter(|n| *n > 0)) {
            (SqlDialect::SqlServer, Some(limit)) => format!("SELECT TOP {limit} {columns} FROM {table}"),
            (_, Some(limit)) => format!("SELECT {columns} FROM {table} LIMIT {limit}"),
            (_, None) => format!("SELECT {columns} FROM {table}"),
        }
    }

    /// Creates a first draft from table analysis.
    ///
    /// Ignore decisions, transformers and validators are copied; `required` is
    /// left unset. A repeated source column keeps its first recommendation.
    pub fn draft(
        name: impl Into<String>,
        module: impl Into<String>,
        source: TableRef,
        target: TableRef,
        recommendations: &[ColumnRecommendation],
    ) -> Self {
        let mut config = MigrationConfig::new(name, module, source, target);
        for recommendation in recommendations {
            if config.mapping(&recommendation.source).is_some() {
                warn!("Skipping repeated source column '{}' in draft", recommendation.source);
                continue;
            }
            let analysis = &recommendation.analysis;
            let mut mapping = ColumnMapping::new(&recommendation.source, &recommendation.target);
            if !analysis.transformers.is_empty() {
                mapping.transformers = Some(analysis.transformers.clone());
            }
            if !analysis.validators.is_empty() {
                mapping.validators = Some(analysis.validators.clone());
            }
            if analysis.should_ignore {
                mapping.ignore = Some(true);
            }
            config.mappings.push(mapping);
        }
        config
    }
}

impl<'de> Deserialize<'de> for MigrationConfig {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = JsonValue::deserialize(deserializer)?;
        MigrationConfig::from_json_value(&raw).map_err(de::Error::custom)
    }
}

fn table_ref(object: &Map<String, JsonValue>, field: &'static str) -> Result<TableRef, ConfigError> {
    let raw = present(object, field).ok_or_else(|| ConfigError::setting(field, "is required"))?;
    serde_json::from_value::<TableRef>(raw.clone())
        .map_err(|err| ConfigError::setting(field, format!("must be {{\"database\", \"table\"}}: {err}")))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SqlDialect {
    #[default]
    SqlServer,
    Postgres,
    MySql,
}

impl SqlDialect {
    pub fn quote(&self, identifier: &str) -> String {
        match self {
            SqlDialect::SqlServer => format!("[{}]", identifier.replace(']', "]]")),
            SqlDialect::Postgres => format!("\"{}\"", identifier.replace('"', "\"\"")),
            SqlDialect::MySql => format!("`{}`", identifier.replace('`', "``")),
        }
    }

    /// Quotes a dotted name such as `schema.table` part by part.
    pub fn quote_path(&self, path: &str) -> String {
        path.split('.')
            .map(|part| self.quote(part))
            .collect::<Vec<_>>()
            .join(".")
    }
}
