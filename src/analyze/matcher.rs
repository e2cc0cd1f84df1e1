//! Source-to-target column name suggestions.

use std::{fmt, sync::Arc};

use serde::Serialize;
use similar::TextDiff;

use crate::transform::string_ops::alphanumeric_key;

pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.4;

/// Hospital information system abbreviations and the names they commonly
/// appear under.
const HIS_DICTIONARY: &[(&str, &[&str])] = &[
    ("hn", &["hn", "hospital_number", "mrn", "patient_code"]),
    ("vn", &["vn", "visit_number", "visit_no"]),
    ("an", &["an", "admission_number", "admit_no"]),
    ("cid", &["cid", "national_id", "card_id", "citizen_id", "id_card"]),
    ("dob", &["dob", "birth_date", "birthdate", "date_of_birth"]),
    ("pname", &["prefix", "title", "pname"]),
    ("fname", &["firstname", "first_name", "name"]),
    ("lname", &["lastname", "last_name", "surname"]),
    ("sex", &["gender", "sex"]),
    ("diag", &["diagnosis", "icd10", "diag_code"]),
    ("bp", &["blood_pressure", "bp_sys", "bp_dia"]),
    ("bw", &["body_weight", "weight"]),
    ("ht", &["height"]),
    ("cc", &["chief_complaint", "symptom"]),
];

/// Scores how alike two column names are, in `[0, 1]`.
pub trait SimilarityScorer: Send + Sync {
    fn score(&self, source: &str, candidate: &str) -> f64;
}

/// Character-level diff ratio over lowercased names.
#[derive(Debug, Clone, Copy, Default)]
pub struct CharRatioScorer;

impl SimilarityScorer for CharRatioScorer {
    fn score(&self, source: &str, candidate: &str) -> f64 {
        let source = source.to_lowercase();
        let candidate = candidate.to_lowercase();
        TextDiff::from_chars(source.as_str(), candidate.as_str()).ratio() as f64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStrategy {
    Dictionary,
    Normalized,
    Similarity,
}

impl fmt::Display for MatchStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            MatchStrategy::Dictionary => "dictionary",
            MatchStrategy::Normalized => "normalized",
            MatchStrategy::Similarity => "similarity",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NameMatch {
    pub target: String,
    pub strategy: MatchStrategy,
    pub score: f64,
}

#[derive(Clone)]
pub struct NameMatcher {
    scorer: Option<Arc<dyn SimilarityScorer>>,
    threshold: f64,
}

impl fmt::Debug for NameMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NameMatcher")
            .field("scorer", &self.scorer.is_some())
            .field("threshold", &self.threshold)
            .finish()
    }
}

impl Default for NameMatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl NameMatcher {
    /// Dictionary and normalized matching only.
    pub fn new() -> Self {
        Self {
            scorer: None,
            threshold: DEFAULT_SIMILARITY_THRESHOLD,
        }
    }

    pub fn with_scorer(mut self, scorer: Arc<dyn SimilarityScorer>) -> Self {
        self.scorer = Some(scorer);
        self
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn suggest(&self, source: &str, candidates: &[String]) -> Option<NameMatch> {
        if candidates.is_empty() {
            return None;
        }
        dictionary_match(source, candidates)
            .map(|target| NameMatch {
                target,
                strategy: MatchStrategy::Dictionary,
                score: 1.0,
            })
            .or_else(|| {
                normalized_match(source, candidates).map(|target| NameMatch {
                    target,
                    strategy: MatchStrategy::Normalized,
                    score: 1.0,
                })
            })
            .or_else(|| self.similarity_match(source, candidates))
    }

    fn similarity_match(&self, source: &str, candidates: &[String]) -> Option<NameMatch> {
        let scorer = self.scorer.as_ref()?;
        let (best, score) = candidates
            .iter()
            .map(|candidate| (candidate, scorer.score(source, candidate)))
            .fold(None::<(&String, f64)>, |best, (candidate, score)| match best {
                Some((_, best_score)) if best_score >= score => best,
                _ => Some((candidate, score)),
            })?;
        (score >= self.threshold).then(|| NameMatch {
            target: best.clone(),
            strategy: MatchStrategy::Similarity,
            score,
        })
    }
}

fn dictionary_match(source: &str, candidates: &[String]) -> Option<String> {
    let source = source.trim().to_lowercase();
    HIS_DICTIONARY
        .iter()
        .filter(|(key, synonyms)| *key == source || synonyms.contains(&source.as_str()))
        .find_map(|(key, synonyms)| {
            candidates
                .iter()
                .find(|candidate| {
                    let candidate = candidate.trim().to_lowercase();
                    *key == candidate || synonyms.contains(&candidate.as_str())
                })
                .cloned()
        })
}

fn normalized_match(source: &str, candidates: &[String]) -> Option<String> {
    let source = alphanumeric_key(source);
    if source.is_empty() {
        return None;
    }
    candidates
        .iter()
        .find(|candidate| alphanumeric_key(candidate) == source)
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn dictionary_beats_normalized_matching() {
        let matcher = NameMatcher::new();
        let found = matcher
            .suggest("HN", &names(&["visit_no", "hospital_number"]))
            .expect("dictionary match");
        assert_eq!(found.target, "hospital_number");
        assert_eq!(found.strategy, MatchStrategy::Dictionary);
    }

    #[test]
    fn normalized_match_ignores_case_and_punctuation() {
        let matcher = NameMatcher::new();
        let found = matcher
            .suggest("CreateDate", &names(&["create_date"]))
            .expect("normalized match");
        assert_eq!(found.strategy, MatchStrategy::Normalized);
    }

    #[test]
    fn similarity_needs_a_scorer_and_threshold() {
        let candidates = names(&["patient_address"]);
        assert!(NameMatcher::new().suggest("patient_addr", &candidates).is_none());

        let matcher = NameMatcher::new().with_scorer(Arc::new(CharRatioScorer));
        let found = matcher
            .suggest("patient_addr", &candidates)
            .expect("similar names");
        assert_eq!(found.strategy, MatchStrategy::Similarity);
        assert!(found.score >= DEFAULT_SIMILARITY_THRESHOLD);

        let strict = matcher.clone().with_threshold(0.99);
        assert!(strict.suggest("patient_addr", &candidates).is_none());
    }
}
