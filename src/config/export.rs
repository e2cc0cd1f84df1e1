//! Renders a configuration as a TypeScript `TableDefinition` module for the
//! migration runner.

use std::fmt::{Display, Write as _};

use heck::ToUpperCamelCase;

use super::{ColumnMapping, MigrationConfig};

pub const DEFAULT_EXPORT_PRIORITY: i64 = 50;

/// TypeScript source for `config`. Ignored mappings are left out.
pub fn typescript_definition(config: &MigrationConfig) -> String {
    let table = ts_string(&config.source.table);
    let mut out = String::new();
    out.push_str("import { TableDefinition } from '../../../types';\n\n");
    let _ = writeln!(
        out,
        "export const {}Definition: TableDefinition = {{",
        const_name(&config.name)
    );
    let _ = writeln!(out, "  name: {table},");
    let _ = writeln!(out, "  targetTable: {},", ts_string(&config.target.table));
    let _ = writeln!(
        out,
        "  description: {},",
        ts_string(&format!("Auto-generated definition for {}", config.source.table))
    );
    out.push('\n');
    let _ = writeln!(out, "  defaultBatchSize: {},", config.batch_size);
    let _ = writeln!(
        out,
        "  defaultPriority: {},",
        config.priority.unwrap_or(DEFAULT_EXPORT_PRIORITY)
    );
    if !config.dependencies.is_empty() {
        let _ = writeln!(out, "  dependencies: {},", ts_array(&config.dependencies));
    }
    out.push('\n');
    out.push_str("  commonMappings: [\n");
    for mapping in config.active_mappings() {
        out.push_str("    {\n");
        out.push_str(&mapping_props(mapping).join(",\n"));
        out.push_str("\n    },\n");
    }
    out.push_str("  ]\n};\n");
    out
}

fn mapping_props(mapping: &ColumnMapping) -> Vec<String> {
    let mut props = vec![
        format!("      source: {}", ts_string(&mapping.source)),
        format!("      target: {}", ts_string(&mapping.target)),
    ];
    if let Some(transformers) = mapping.transformers.as_deref().filter(|t| !t.is_empty()) {
        props.push(format!("      transformers: {}", ts_array(transformers)));
    }
    if let Some(validators) = mapping.validators.as_deref().filter(|v| !v.is_empty()) {
        props.push(format!("      validators: {}", ts_array(validators)));
    }
    if mapping.required == Some(true) {
        props.push("      required: true".to_string());
    }
    if let Some(table) = &mapping.lookup_table {
        props.push(format!("      lookupTable: {}", ts_string(table)));
    }
    if let Some(by) = &mapping.lookup_by {
        props.push(format!("      lookupBy: {}", ts_string(by)));
    }
    props
}

/// `patient_master` becomes `PatientMaster`; names without letters fall back
/// to `Table`.
fn const_name(name: &str) -> String {
    let camel = name.to_upper_camel_case();
    match camel.chars().next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => camel,
        Some(_) => format!("Table{camel}"),
        None => "Table".to_string(),
    }
}

fn ts_array<T: Display>(items: &[T]) -> String {
    let quoted = items
        .iter()
        .map(|item| ts_string(&item.to_string()))
        .collect::<Vec<_>>();
    format!("[{}]", quoted.join(", "))
}

/// Single-quoted TypeScript string literal.
fn ts_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    for ch in value.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            other => out.push(other),
        }
    }
    out.push('\'');
    out
}
