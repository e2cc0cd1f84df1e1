mod common;

use std::sync::Arc;

use common::PATIENT_CONFIG;
use his_migrate::{
    batch::{self, BatchError, CancelToken},
    config::MigrationConfig,
    transform::{ReferenceTables, TransformEngine},
    validate::{self, Validator},
    value::{Row, Value},
};

fn row(fields: &[(&str, &str)]) -> Row {
    fields
        .iter()
        .map(|(key, value)| (key.to_string(), Value::text(*value)))
        .collect()
}

fn patient_rows() -> Vec<Row> {
    vec![
        row(&[("HN", " 0001234 "), ("BIRTHDATE", "2566-05-15"), ("SEX", "1"), ("OLD_FLAG", "x")]),
        row(&[("HN", "0001235"), ("BIRTHDATE", "2540-01-02"), ("SEX", "female")]),
        row(&[("HN", "HN-99"), ("SEX", "3")]),
    ]
}

#[test]
fn transforms_every_active_mapping() {
    let config = MigrationConfig::from_json_str(PATIENT_CONFIG).unwrap();
    let out = batch::apply_batch(
        &patient_rows(),
        &config,
        &TransformEngine::new(),
        &CancelToken::new(),
    )
    .expect("batch");

    assert_eq!(out.len(), 3);
    for transformed in &out {
        let keys = transformed.keys().map(String::as_str).collect::<Vec<_>>();
        assert_eq!(keys, vec!["birthDate", "gender", "hn"]);
    }
    assert_eq!(out[0]["hn"], Value::text("0001234"));
    assert_eq!(out[0]["birthDate"], Value::text("2023-05-15"));
    assert_eq!(out[1]["birthDate"], Value::text("1997-01-02"));
    assert_eq!(out[1]["gender"], Value::text("F"));
    assert_eq!(out[2]["birthDate"], Value::Null);
    assert_eq!(out[2]["gender"], Value::text("O"));
}

#[test]
fn lookups_follow_mapping_bindings() {
    let mut raw: serde_json::Value = serde_json::from_str(PATIENT_CONFIG).unwrap();
    raw["mappings"][0]["transformers"] = serde_json::json!(["TRIM", "LOOKUP_PATIENT_ID"]);
    raw["mappings"][0]["lookupTable"] = serde_json::json!("patients");
    raw["mappings"][0]["lookupBy"] = serde_json::json!("hn");
    let config = MigrationConfig::from_json_value(&raw).unwrap();

    let tables = ReferenceTables::from_json_str(r#"{"patients": {"hn": {"0001234": 501}}}"#).unwrap();
    let engine = TransformEngine::with_resolver(Arc::new(tables));
    let out = batch::apply_batch(&patient_rows(), &config, &engine, &CancelToken::new()).unwrap();
    assert_eq!(out[0]["hn"], Value::Integer(501));
    assert_eq!(out[1]["hn"], Value::text("0001235"));
}

#[test]
fn cancellation_reports_completed_rows() {
    let config = MigrationConfig::from_json_str(PATIENT_CONFIG).unwrap();
    let token = CancelToken::new();
    let clone = token.clone();
    clone.cancel();
    assert!(token.is_cancelled());
    let err = batch::apply_batch(&patient_rows(), &config, &TransformEngine::new(), &token)
        .expect_err("cancelled");
    assert_eq!(err, BatchError::Cancelled { completed: 0 });
    assert_eq!(err.to_string(), "batch cancelled after 0 row(s)");
}

#[test]
fn grading_counts_failures_per_validator() {
    let config = MigrationConfig::from_json_str(PATIENT_CONFIG).unwrap();
    let out = batch::apply_batch(
        &patient_rows(),
        &config,
        &TransformEngine::new(),
        &CancelToken::new(),
    )
    .unwrap();
    let report = validate::grade(&out, &config);

    let hn_format = report.grade_for("hn", Validator::HnFormat).unwrap();
    assert_eq!(hn_format.checked, 3);
    assert_eq!(hn_format.failed, 1);
    assert_eq!(hn_format.failing_samples, vec!["HN-99".to_string()]);

    let required = report.grade_for("hn", Validator::Required).unwrap();
    assert_eq!(required.failed, 0);

    let dates = report.grade_for("birthDate", Validator::ValidDate).unwrap();
    assert_eq!(dates.failed, 0);
    assert_eq!(report.total_failures(), 1);

    let mut merged = report.clone();
    merged.absorb(report.clone());
    assert_eq!(merged.grade_for("hn", Validator::HnFormat).unwrap().checked, 6);
    assert_eq!(merged.total_failures(), 2);
}
