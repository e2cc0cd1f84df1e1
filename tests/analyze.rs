use his_migrate::{
    analyze::{self, ColumnSample},
    transform::Transformer,
    validate::Validator,
};

fn sample(source: &str, target: &str, values: &[Option<&str>]) -> ColumnSample {
    ColumnSample::new(source, target, values.iter().map(|v| v.map(str::to_string)))
}

fn texts(values: &[&'static str]) -> Vec<Option<&'static str>> {
    values.iter().copied().map(Some).collect()
}

#[test]
fn thai_buddhist_dates_recommend_conversion() {
    let result = analyze::analyze(&sample(
        "birth_date",
        "dob",
        &texts(&["2566-05-15", "2567-03-20", "2565-12-01"]),
    ));
    assert!(result.transformers.contains(&Transformer::BuddhistToIso));
    assert!(result.confidence_score >= 0.9);
    assert_eq!(result.validators, vec![Validator::ValidDate]);
}

#[test]
fn empty_samples_suggest_ignoring() {
    let result = analyze::analyze(&sample(
        "remark",
        "remark",
        &[None, Some(""), Some("  "), None, Some("")],
    ));
    assert!(result.should_ignore);
    assert_eq!(result.confidence_score, 0.9);
    assert_eq!(result.reason, "All values are null/empty - suggested to ignore");
}

#[test]
fn null_like_tokens_count_as_empty() {
    let result = analyze::analyze(&sample("x", "x", &texts(&["NaN", "None", "null"])));
    assert!(result.should_ignore);
}

#[test]
fn hn_mapped_to_unrelated_target_is_flagged() {
    let result = analyze::analyze(&sample(
        "hn",
        "email",
        &texts(&["1234567", "9876543", "5555555"]),
    ));
    assert!(!result.is_match);
    assert_eq!(result.reason, "Source is HN but target seems different");
    assert_eq!(result.confidence_score, 1.0);
    assert_eq!(result.validators, vec![Validator::HnFormat]);
}

#[test]
fn cid_with_matching_target_scores_valid_fraction() {
    let result = analyze::analyze(&sample(
        "CID",
        "national_id",
        &texts(&["1101700203450", "1234", "3100600123456", "5555555555555"]),
    ));
    assert!(result.is_match);
    assert_eq!(result.confidence_score, 0.75);
    assert_eq!(result.reason, "CID pattern matched (3/4 valid 13-digit)");
    assert_eq!(result.validators, vec![Validator::ThaiId]);
}

#[test]
fn cid_with_mismatched_target_is_not_a_match() {
    let result = analyze::analyze(&sample("cid", "phone", &texts(&["1101700203450"])));
    assert!(!result.is_match);
    assert_eq!(result.reason, "Source is CID but target seems different");
}

#[test]
fn domain_reason_overwrites_earlier_reasons() {
    let result = analyze::analyze(&sample(
        "vn",
        "vn",
        &texts(&[" 6601001", "6601002 ", " 6601003 "]),
    ));
    assert_eq!(result.transformers, vec![Transformer::Trim]);
    assert_eq!(result.reason, "Healthcare visit/admission identifier detected");
    assert_eq!(result.confidence_score, 0.7);
}

#[test]
fn encounter_tokens_do_not_match_inside_words() {
    for (source, target) in [("plan_name", "planName"), ("caravan", "caravan"), ("phone", "phone")] {
        let result = analyze::analyze(&sample(source, target, &texts(&["basic", "gold"])));
        assert_eq!(result.reason, "Standard mapping", "{source}");
        assert!(result.is_match);
        assert_eq!(result.confidence_score, 0.5);
    }
}

#[test]
fn hn_abbreviation_matches_inside_compound_names() {
    let hns = texts(&["0001234", "0001235"]);
    for source in ["patienthn", "hnno", "hn2"] {
        let mismatched = analyze::analyze(&sample(source, "email", &hns));
        assert!(!mismatched.is_match, "{source}");
        assert_eq!(mismatched.reason, "Source is HN but target seems different");
        assert_eq!(mismatched.validators, vec![Validator::HnFormat]);

        let matched = analyze::analyze(&sample(source, "patient_hn", &hns));
        assert!(matched.is_match, "{source}");
        assert_eq!(matched.reason, "HN pattern matched (2/2 valid)");
    }

    let cid = analyze::analyze(&sample("cid13", "email", &texts(&["1101700203450"])));
    assert!(!cid.is_match);
    assert_eq!(cid.reason, "Source is CID but target seems different");
}

#[test]
fn low_hn_validity_keeps_default_confidence() {
    let result = analyze::analyze(&sample("hn", "hn", &texts(&["abc", "x-1", "12"])));
    assert!(result.is_match);
    assert_eq!(result.confidence_score, 0.5);
    assert_eq!(result.reason, "HN pattern matched (0/3 valid)");
}

#[test]
fn float_rendered_ids_recommend_float_to_int() {
    let result = analyze::analyze(&sample(
        "doctor_code",
        "doctorCode",
        &texts(&["101.0", "102.0", "103.00", "104.0"]),
    ));
    assert_eq!(result.transformers, vec![Transformer::FloatToInt]);
    assert!(result.reason.starts_with("Detected float format IDs (4/4 samples)"));
}

#[test]
fn zero_placeholders_are_ignored_even_after_other_reasons() {
    let result = analyze::analyze(&sample("weight", "bw", &texts(&["0", " 0.0", "00"])));
    assert!(result.should_ignore);
    assert_eq!(result.transformers, vec![Transformer::Trim]);
    assert_eq!(result.reason, "All values are zero - likely missing/placeholder data");
}

#[test]
fn leading_zero_ids_are_informational() {
    let result = analyze::analyze(&sample(
        "ward_code",
        "wardCode",
        &texts(&["0012", "0345", "1200"]),
    ));
    assert!(result.transformers.is_empty());
    assert!(!result.should_ignore);
    assert_eq!(result.reason, "ID with leading zeros - should preserve as string");
}

#[test]
fn json_reason_replaces_whitespace_reason() {
    let result = analyze::analyze(&sample(
        "payload",
        "payload",
        &texts(&[" {\"a\":1}", "[1,2]", "{}"]),
    ));
    assert_eq!(
        result.transformers,
        vec![Transformer::Trim, Transformer::ParseJson]
    );
    assert_eq!(result.reason, "JSON/array structures detected");
}

#[test]
fn mixed_date_layouts_recommend_normalization() {
    let result = analyze::analyze(&sample(
        "admit_day",
        "admitDay",
        &texts(&["05/06/2024", "12-31-2023", "text"]),
    ));
    assert_eq!(result.transformers, vec![Transformer::EngDateToIso]);
    assert_eq!(result.confidence_score, 0.6);
}

#[test]
fn analysis_is_deterministic() {
    let input = sample(
        "HN",
        "hospital_number",
        &texts(&["0001234", " 0001235", "12"]),
    );
    assert_eq!(analyze::analyze(&input), analyze::analyze(&input));
}

#[test]
fn result_serializes_with_snake_case_keys() {
    let result = analyze::analyze(&sample("ward", "ward", &texts(&["A"])));
    let json = serde_json::to_value(&result).expect("serialize");
    assert_eq!(json["confidence_score"], serde_json::json!(0.5));
    assert_eq!(json["should_ignore"], serde_json::json!(false));
    assert_eq!(json["transformers"], serde_json::json!([]));
}
