//! Column analysis: recommends transformers, validators and an ignore
//! decision from a handful of sample values.

mod detectors;
pub mod matcher;

use heck::ToLowerCamelCase;
use itertools::Itertools;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::{transform::Transformer, validate::Validator};

use detectors::{ColumnName, Samples};
pub use matcher::{
    CharRatioScorer, DEFAULT_SIMILARITY_THRESHOLD, MatchStrategy, NameMatch, NameMatcher,
    SimilarityScorer,
};

/// Values inspected per column after null-like entries are dropped.
pub const SAMPLE_LIMIT: usize = 20;

const DEFAULT_CONFIDENCE: f64 = 0.5;
const DEFAULT_REASON: &str = "Standard mapping";
const EMPTY_CONFIDENCE: f64 = 0.9;
const EMPTY_REASON: &str = "All values are null/empty - suggested to ignore";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSample {
    pub source: String,
    pub target: String,
    pub values: Vec<Option<String>>,
}

impl ColumnSample {
    pub fn new<S>(source: impl Into<String>, target: impl Into<String>, values: S) -> Self
    where
        S: IntoIterator,
        S::Item: Into<Option<String>>,
    {
        Self {
            source: source.into(),
            target: target.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub confidence_score: f64,
    pub is_match: bool,
    pub transformers: Vec<Transformer>,
    pub validators: Vec<Validator>,
    pub should_ignore: bool,
    pub reason: String,
}

impl Default for AnalysisResult {
    fn default() -> Self {
        Self {
            confidence_score: DEFAULT_CONFIDENCE,
            is_match: true,
            transformers: Vec::new(),
            validators: Vec::new(),
            should_ignore: false,
            reason: DEFAULT_REASON.to_string(),
        }
    }
}

impl AnalysisResult {
    fn has_default_reason(&self) -> bool {
        self.reason == DEFAULT_REASON
    }

    fn blend_confidence(&mut self, confidence: f64) {
        self.confidence_score = self.confidence_score.max(confidence);
    }
}

/// Analyzes one column sample. Deterministic for identical input.
pub fn analyze(sample: &ColumnSample) -> AnalysisResult {
    let samples = Samples::collect(sample.values.iter().map(Option::as_deref), SAMPLE_LIMIT);
    let mut result = AnalysisResult::default();
    if samples.is_empty() {
        result.should_ignore = true;
        result.confidence_score = EMPTY_CONFIDENCE;
        result.reason = EMPTY_REASON.to_string();
        return result;
    }

    let source = ColumnName::new(&sample.source);
    let target = ColumnName::new(&sample.target);

    if let Some(dates) = detectors::detect_dates(&samples) {
        result.transformers.extend(dates.transformer);
        result.validators.push(Validator::ValidDate);
        result.blend_confidence(dates.confidence);
        result.reason = dates.reason;
    }

    if let Some(quality) = detectors::detect_string_quality(&samples) {
        result.transformers.extend(quality.transformers);
        if result.has_default_reason() {
            result.reason = quality.reason;
        }
    }

    if let Some(numeric) = detectors::detect_numeric(&samples, &source) {
        result.transformers.extend(numeric.transformer);
        if numeric.should_ignore {
            result.should_ignore = true;
            result.reason = numeric.reason;
        } else if result.has_default_reason() {
            result.reason = numeric.reason;
        }
    }

    if let Some(domain) = detectors::detect_domain(&samples, &source, &target) {
        result.blend_confidence(domain.confidence);
        result.is_match = domain.is_match;
        result.validators.extend(domain.validator);
        result.reason = domain.reason;
    }

    result.transformers = result.transformers.into_iter().unique().collect();
    result.validators = result.validators.into_iter().unique().collect();
    debug!(
        "Analyzed '{}' -> '{}': {:?} ({:.2})",
        sample.source, sample.target, result.transformers, result.confidence_score
    );
    result
}

/// Sampled rows of a source table, one optional cell per header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableSample {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

impl TableSample {
    pub fn new(headers: Vec<String>) -> Self {
        Self {
            headers,
            rows: Vec::new(),
        }
    }

    pub fn push_row(&mut self, row: Vec<Option<String>>) {
        self.rows.push(row);
    }

    pub fn column_values(&self, index: usize) -> Vec<Option<String>> {
        self.rows
            .iter()
            .map(|row| row.get(index).cloned().flatten())
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnRecommendation {
    pub source: String,
    pub target: String,
    pub matched_by: Option<MatchStrategy>,
    pub analysis: AnalysisResult,
}

/// Proposes a target for every column of `table` and analyzes its values.
///
/// Columns the matcher cannot place get the source name in lowerCamelCase.
pub fn analyze_table(
    table: &TableSample,
    candidates: &[String],
    matcher: &NameMatcher,
) -> Vec<ColumnRecommendation> {
    table
        .headers
        .iter()
        .enumerate()
        .map(|(index, source)| {
            let suggestion = matcher.suggest(source, candidates);
            let (target, matched_by) = match suggestion {
                Some(found) => (found.target, Some(found.strategy)),
                None => (source.to_lower_camel_case(), None),
            };
            let sample = ColumnSample::new(source.clone(), target.clone(), table.column_values(index));
            ColumnRecommendation {
                source: source.clone(),
                target,
                matched_by,
                analysis: analyze(&sample),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(source: &str, target: &str, values: &[Option<&str>]) -> ColumnSample {
        ColumnSample::new(
            source,
            target,
            values.iter().map(|v| v.map(str::to_string)),
        )
    }

    #[test]
    fn leading_whitespace_is_seen_before_trimming() {
        let result = analyze(&sample("ward", "ward", &[Some("  A1"), Some("B2 "), Some("C3")]));
        assert_eq!(result.transformers, vec![Transformer::Trim]);
        assert_eq!(result.reason, "Leading/trailing whitespace in 2/3 samples");
    }

    #[test]
    fn only_first_twenty_values_are_inspected() {
        let mut values = vec![Some("plain"); 20];
        values.extend(vec![Some("2566-01-01"); 30]);
        let result = analyze(&sample("note", "note", &values));
        assert!(result.transformers.is_empty());
        assert_eq!(result.reason, DEFAULT_REASON);
    }

    #[test]
    fn table_analysis_falls_back_to_camel_case_targets() {
        let mut table = TableSample::new(vec!["HN".into(), "create_date".into()]);
        table.push_row(vec![Some("0001234".into()), Some("2023-01-01".into())]);
        table.push_row(vec![Some("0001235".into()), None]);
        let recommendations = analyze_table(&table, &["hospital_number".into()], &NameMatcher::new());
        assert_eq!(recommendations[0].target, "hospital_number");
        assert_eq!(recommendations[0].matched_by, Some(MatchStrategy::Dictionary));
        assert!(recommendations[0].analysis.is_match);
        assert_eq!(recommendations[1].target, "createDate");
        assert_eq!(recommendations[1].matched_by, None);
        assert_eq!(recommendations[1].analysis.validators, vec![Validator::ValidDate]);
    }
}
