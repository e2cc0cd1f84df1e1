use std::sync::Arc;

use his_migrate::{
    transform::{
        self, LookupBinding, LookupError, ReferenceTables, TransformEngine, Transformer,
        UnknownPolicy,
    },
    value::Value,
};
use proptest::prelude::*;

fn run(value: &str, pipeline: &[Transformer]) -> Value {
    transform::apply_pipeline(Value::text(value), pipeline)
}

#[test]
fn trim_then_buddhist_to_iso() {
    let result = run(
        "  2566-05-15 ",
        &[Transformer::Trim, Transformer::BuddhistToIso],
    );
    assert_eq!(result, Value::text("2023-05-15"));
}

#[test]
fn buddhist_to_iso_leaves_malformed_dates_alone() {
    assert_eq!(
        run("15/05/2566", &[Transformer::BuddhistToIso]),
        Value::text("15/05/2566")
    );
}

#[test]
fn float_to_int_truncates_and_nulls_garbage() {
    assert_eq!(run("123.0", &[Transformer::FloatToInt]), Value::Integer(123));
    assert_eq!(run("-7.9", &[Transformer::FloatToInt]), Value::Integer(-7));
    assert_eq!(run("abc", &[Transformer::FloatToInt]), Value::Null);
}

#[test]
fn float_to_int_leaves_values_beyond_i64_unchanged() {
    assert_eq!(
        run("99999999999999999999.0", &[Transformer::FloatToInt]),
        Value::text("99999999999999999999.0")
    );
    assert_eq!(run("-1e30", &[Transformer::FloatToInt]), Value::text("-1e30"));
    assert_eq!(
        run("9007199254740992.0", &[Transformer::FloatToInt]),
        Value::Integer(9_007_199_254_740_992)
    );
}

#[test]
fn to_number_yields_floats() {
    assert_eq!(run(" 42 ", &[Transformer::ToNumber]), Value::Float(42.0));
    assert_eq!(run("n/a", &[Transformer::ToNumber]), Value::Null);
}

#[test]
fn map_gender_normalizes_codes() {
    assert_eq!(run(" female ", &[Transformer::MapGender]), Value::text("F"));
    assert_eq!(run("1", &[Transformer::MapGender]), Value::text("M"));
    assert_eq!(run("3", &[Transformer::MapGender]), Value::text("O"));
    assert_eq!(run("unknown", &[Transformer::MapGender]), Value::text("UNKNOWN"));
}

#[test]
fn format_phone_groups_digits() {
    assert_eq!(
        run("(081) 234-5678", &[Transformer::FormatPhone]),
        Value::text("081-234-5678")
    );
    assert_eq!(run("12345", &[Transformer::FormatPhone]), Value::text("12345"));
}

#[test]
fn format_phone_reads_thai_numerals() {
    assert_eq!(
        run("๐๘๑๒๓๔๕๖๗๘", &[Transformer::FormatPhone]),
        Value::text("081-234-5678")
    );
}

#[test]
fn empty_result_mid_pipeline_becomes_null() {
    assert_eq!(
        run("abc", &[Transformer::FormatPhone, Transformer::ReplaceEmptyWithNull]),
        Value::Null
    );
    assert_eq!(
        run("0812345678", &[Transformer::FormatPhone, Transformer::ReplaceEmptyWithNull]),
        Value::text("081-234-5678")
    );
}

#[test]
fn lower_trim_and_clean_spaces_through_the_engine() {
    assert_eq!(
        run("  Somchai   JAIDEE \t", &[Transformer::LowerTrim]),
        Value::text("somchai   jaidee")
    );
    assert_eq!(
        run("  Somchai \t  Jaidee  ", &[Transformer::CleanSpaces]),
        Value::text("Somchai Jaidee")
    );
}

#[test]
fn eng_date_to_iso_tries_month_first() {
    assert_eq!(
        run("05/06/2024", &[Transformer::EngDateToIso]),
        Value::text("2024-05-06")
    );
    assert_eq!(
        run("31/12/2023", &[Transformer::EngDateToIso]),
        Value::text("2023-12-31")
    );
}

#[test]
fn parse_json_builds_structures() {
    let parsed = run(r#"{"a": [1, 2]}"#, &[Transformer::ParseJson]);
    assert!(matches!(parsed, Value::Json(_)));
    assert_eq!(run("{broken", &[Transformer::ParseJson]), Value::text("{broken"));
}

#[test]
fn null_mid_pipeline_skips_remaining_steps() {
    let result = run("abc", &[Transformer::ToNumber, Transformer::UpperTrim]);
    assert_eq!(result, Value::Null);
}

#[test]
fn named_pipeline_rejects_unknown_names() {
    let engine = TransformEngine::new();
    let err = engine
        .apply_named_pipeline(Value::text("x"), &["TRIM", "NOPE"], UnknownPolicy::Reject)
        .expect_err("unknown name");
    assert_eq!(err.name, "NOPE");

    let lenient = engine
        .apply_named_pipeline(
            Value::text(" x "),
            &["trim", "NOPE", "upper_trim"],
            UnknownPolicy::PassThrough,
        )
        .expect("unknown names skipped");
    assert_eq!(lenient, Value::text("X"));
}

#[test]
fn lookups_substitute_only_with_resolver_and_binding() {
    let mut tables = ReferenceTables::default();
    tables.insert("patients", "hn", "0001234", serde_json::json!(77));
    let engine = TransformEngine::with_resolver(Arc::new(tables));
    let pipeline = [Transformer::LookupPatientId];

    let bound = LookupBinding::new(Some("patients"), Some("hn"));
    assert_eq!(
        engine.apply_pipeline(Value::text("0001234"), &pipeline, bound),
        Value::Integer(77)
    );
    assert_eq!(
        engine.apply_pipeline(Value::text("9999999"), &pipeline, bound),
        Value::text("9999999")
    );
    assert_eq!(
        engine.apply_pipeline(Value::text("0001234"), &pipeline, LookupBinding::none()),
        Value::text("0001234")
    );
    assert_eq!(
        TransformEngine::new().apply_pipeline(Value::text("0001234"), &pipeline, bound),
        Value::text("0001234")
    );
}

#[test]
fn failing_lookup_step_is_skipped() {
    let failing = |_: &str, _: &str, _: &Value| -> Result<Option<Value>, LookupError> {
        Err(LookupError::Unavailable("offline".into()))
    };
    let engine = TransformEngine::with_resolver(Arc::new(failing));
    let result = engine.apply_pipeline(
        Value::text(" 42 "),
        &[Transformer::LookupVisitId, Transformer::Trim],
        LookupBinding::new(Some("visits"), Some("vn")),
    );
    assert_eq!(result, Value::text("42"));
}

fn any_pipeline() -> impl Strategy<Value = Vec<Transformer>> {
    prop::collection::vec(prop::sample::select(Transformer::ALL.to_vec()), 0..6)
}

proptest! {
    #[test]
    fn blank_input_is_returned_unchanged(spaces in "[ \t]{0,6}", pipeline in any_pipeline()) {
        let input = Value::text(spaces.clone());
        prop_assert_eq!(transform::apply_pipeline(input.clone(), &pipeline), input);
        prop_assert_eq!(transform::apply_pipeline(Value::Null, &pipeline), Value::Null);
    }

    #[test]
    fn trim_is_idempotent(text in "\\PC{0,24}") {
        let once = transform::apply_pipeline(Value::text(text.clone()), &[Transformer::Trim]);
        let twice = transform::apply_pipeline(once.clone(), &[Transformer::Trim]);
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn names_round_trip_case_insensitively(transformer in prop::sample::select(Transformer::ALL.to_vec())) {
        let lowered = format!("  {}  ", transformer.as_str().to_lowercase());
        prop_assert_eq!(lowered.parse::<Transformer>(), Ok(transformer));
    }
}
