use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("configuration is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("configuration field '{field}' {problem}")]
    Setting { field: &'static str, problem: String },
    #[error("mapping #{index} ('{column}') field '{field}': {problem}")]
    Mapping {
        index: usize,
        column: String,
        field: &'static str,
        problem: String,
    },
    #[error("mapping #{index} ('{column}') duplicates the source column of mapping #{first}")]
    DuplicateSource {
        index: usize,
        column: String,
        first: usize,
    },
}

impl ConfigError {
    pub(crate) fn setting(field: &'static str, problem: impl Into<String>) -> Self {
        ConfigError::Setting {
            field,
            problem: problem.into(),
        }
    }

    pub(crate) fn mapping(
        index: usize,
        column: &str,
        field: &'static str,
        problem: impl Into<String>,
    ) -> Self {
        ConfigError::Mapping {
            index,
            column: column.to_string(),
            field,
            problem: problem.into(),
        }
    }
}
