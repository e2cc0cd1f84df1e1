//! Row-level execution of a mapping configuration.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use log::debug;
use thiserror::Error;

use crate::{
    config::MigrationConfig,
    transform::TransformEngine,
    value::{Row, Value},
};

/// Cooperative cancellation flag shared between a batch and its caller.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BatchError {
    #[error("batch cancelled after {completed} row(s)")]
    Cancelled { completed: usize },
}

/// Transforms `rows` with every non-ignored mapping of `config`.
///
/// Output rows hold exactly the non-ignored targets. A source column missing
/// from a row is read as `Null`. `cancel` is checked before each row.
pub fn apply_batch(
    rows: &[Row],
    config: &MigrationConfig,
    engine: &TransformEngine,
    cancel: &CancelToken,
) -> Result<Vec<Row>, BatchError> {
    let mut output = Vec::with_capacity(rows.len());
    for row in rows {
        if cancel.is_cancelled() {
            debug!(
                "Batch for '{}' cancelled after {} row(s)",
                config.name,
                output.len()
            );
            return Err(BatchError::Cancelled {
                completed: output.len(),
            });
        }
        output.push(transform_row(row, config, engine));
    }
    Ok(output)
}

/// Transforms one row; every output field derives from `row` alone.
pub fn transform_row(row: &Row, config: &MigrationConfig, engine: &TransformEngine) -> Row {
    config
        .active_mappings()
        .map(|mapping| {
            let raw = row.get(&mapping.source).cloned().unwrap_or(Value::Null);
            let value = engine.apply_pipeline(raw, mapping.pipeline(), mapping.lookup_binding());
            (mapping.target.clone(), value)
        })
        .collect()
}
