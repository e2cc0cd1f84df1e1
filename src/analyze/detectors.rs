//! Pattern detectors run by [`super::analyze`] in a fixed order.
//!
//! Every detector reads the same [`Samples`] and reports a finding without
//! touching the result; the caller decides how findings are blended.

use std::sync::OnceLock;

use heck::ToSnakeCase;
use regex::Regex;

use crate::{transform::Transformer, validate::Validator};

const NULL_TOKENS: &[&str] = &["", "NaN", "None", "null"];
const ZERO_TOKENS: &[&str] = &["0", "0.0", "00"];
const COUNTER_KEYWORDS: &[&str] = &["count", "flag", "status"];
const ID_KEYWORDS: &[&str] = &["id", "code", "number"];

/// Working sample: raw values kept for whitespace checks, trimmed values for
/// pattern matching.
#[derive(Debug)]
pub(crate) struct Samples<'a> {
    pub raw: Vec<&'a str>,
    pub trimmed: Vec<&'a str>,
}

impl<'a> Samples<'a> {
    /// Drops nulls and null-like tokens, then keeps the first `limit` values.
    pub fn collect<I>(values: I, limit: usize) -> Self
    where
        I: IntoIterator<Item = Option<&'a str>>,
    {
        let raw = values
            .into_iter()
            .flatten()
            .filter(|value| !NULL_TOKENS.contains(&value.trim()))
            .take(limit)
            .collect::<Vec<_>>();
        let trimmed = raw.iter().map(|value| value.trim()).collect();
        Self { raw, trimmed }
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    pub fn len(&self) -> usize {
        self.raw.len()
    }

    fn count_trimmed(&self, predicate: impl Fn(&str) -> bool) -> usize {
        self.trimmed.iter().filter(|value| predicate(value)).count()
    }

    fn exceeds(&self, count: usize, fraction: f64) -> bool {
        count as f64 > self.len() as f64 * fraction
    }
}

macro_rules! static_regex {
    ($name:ident, $pattern:expr) => {
        fn $name() -> &'static Regex {
            static RE: OnceLock<Regex> = OnceLock::new();
            RE.get_or_init(|| Regex::new($pattern).expect("valid detector regex"))
        }
    };
}

static_regex!(thai_year_regex, r"(?:^|[^0-9])25[5-9][0-9](?:[^0-9]|$)");
static_regex!(iso_date_regex, r"\d{4}[-/]\d{1,2}[-/]\d{1,2}");
static_regex!(date_like_regex, r"\d{2,4}[-/]\d{1,2}");
static_regex!(multi_space_regex, r"\s{2,}");
static_regex!(float_int_regex, r"^\d+\.0+$");
static_regex!(hn_regex, r"^\d{6,10}$");
static_regex!(cid_regex, r"^\d{13}$");

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct DateFinding {
    pub transformer: Option<Transformer>,
    pub confidence: f64,
    pub reason: String,
}

pub(crate) fn detect_dates(samples: &Samples<'_>) -> Option<DateFinding> {
    let total = samples.len();
    let thai = samples.count_trimmed(|value| thai_year_regex().is_match(value));
    if samples.exceeds(thai, 0.5) {
        return Some(DateFinding {
            transformer: Some(Transformer::BuddhistToIso),
            confidence: (thai as f64 / total as f64).min(0.9),
            reason: format!("Detected Thai Buddhist year (25xx) in {thai}/{total} samples"),
        });
    }
    let iso = samples.count_trimmed(|value| iso_date_regex().is_match(value));
    if samples.exceeds(iso, 0.7) {
        return Some(DateFinding {
            transformer: None,
            confidence: 0.8,
            reason: format!("Detected ISO date format in {iso}/{total} samples"),
        });
    }
    let date_like = samples.count_trimmed(|value| date_like_regex().is_match(value));
    if samples.exceeds(date_like, 0.5) {
        return Some(DateFinding {
            transformer: Some(Transformer::EngDateToIso),
            confidence: 0.6,
            reason: "Mixed date formats detected - normalization recommended".to_string(),
        });
    }
    None
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct StringFinding {
    pub transformers: Vec<Transformer>,
    pub reason: String,
}

pub(crate) fn detect_string_quality(samples: &Samples<'_>) -> Option<StringFinding> {
    let total = samples.len();
    let mut transformers = Vec::new();
    let mut reason = String::new();

    let padded = samples
        .raw
        .iter()
        .filter(|value| value.len() != value.trim().len())
        .count();
    if padded > 0 {
        transformers.push(Transformer::Trim);
        reason = format!("Leading/trailing whitespace in {padded}/{total} samples");
    }

    let spaced = samples.count_trimmed(|value| multi_space_regex().is_match(value));
    if samples.exceeds(spaced, 0.3) {
        transformers.push(Transformer::CleanSpaces);
        if reason.is_empty() {
            reason = format!("Multiple consecutive spaces in {spaced}/{total} samples");
        } else {
            reason.push_str(&format!("; multiple spaces in {spaced} samples"));
        }
    }

    let json_like = samples.count_trimmed(|value| value.starts_with('{') || value.starts_with('['));
    if samples.exceeds(json_like, 0.5) {
        transformers.push(Transformer::ParseJson);
        reason = "JSON/array structures detected".to_string();
    }

    if transformers.is_empty() {
        None
    } else {
        Some(StringFinding {
            transformers,
            reason,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct NumericFinding {
    pub transformer: Option<Transformer>,
    pub should_ignore: bool,
    pub reason: String,
}

pub(crate) fn detect_numeric(samples: &Samples<'_>, column: &ColumnName) -> Option<NumericFinding> {
    let total = samples.len();
    let floats = samples.count_trimmed(|value| float_int_regex().is_match(value));
    if samples.exceeds(floats, 0.7) {
        return Some(NumericFinding {
            transformer: Some(Transformer::FloatToInt),
            should_ignore: false,
            reason: format!(
                "Detected float format IDs ({floats}/{total} samples) - converting to integer"
            ),
        });
    }

    let all_zero = samples
        .trimmed
        .iter()
        .all(|value| ZERO_TOKENS.contains(value));
    if all_zero && !column.contains_any(COUNTER_KEYWORDS) {
        return Some(NumericFinding {
            transformer: None,
            should_ignore: true,
            reason: "All values are zero - likely missing/placeholder data".to_string(),
        });
    }

    if column.contains_any(ID_KEYWORDS) {
        let leading_zero = samples.trimmed.iter().any(|value| {
            value.len() > 1 && value.starts_with('0') && value.bytes().all(|b| b.is_ascii_digit())
        });
        if leading_zero {
            return Some(NumericFinding {
                transformer: None,
                should_ignore: false,
                reason: "ID with leading zeros - should preserve as string".to_string(),
            });
        }
    }
    None
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct DomainFinding {
    pub confidence: f64,
    pub is_match: bool,
    pub validator: Option<Validator>,
    pub reason: String,
}

/// Healthcare identifier families recognised by column name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IdentifierFamily {
    HospitalNumber,
    NationalId,
    Encounter,
}

impl IdentifierFamily {
    /// Abbreviations matched anywhere in the name (`patienthn`, `cid13`).
    fn abbreviations(&self) -> &'static [&'static str] {
        match self {
            IdentifierFamily::HospitalNumber => &["hn", "mrn"],
            IdentifierFamily::NationalId => &["cid"],
            IdentifierFamily::Encounter => &[],
        }
    }

    /// Abbreviations too short to match inside other words (`plan`, `caravan`).
    fn tokens(&self) -> &'static [&'static str] {
        match self {
            IdentifierFamily::Encounter => &["vn", "an"],
            _ => &[],
        }
    }

    fn fragments(&self) -> &'static [&'static str] {
        match self {
            IdentifierFamily::HospitalNumber => &["hospital_number"],
            IdentifierFamily::NationalId => &["national_id", "citizen_id", "id_card"],
            IdentifierFamily::Encounter => &["visit", "admission"],
        }
    }

    fn matches(&self, column: &ColumnName) -> bool {
        column.contains_any(self.abbreviations())
            || column.has_token(self.tokens())
            || column.contains_any(self.fragments())
    }

    fn classify(column: &ColumnName) -> Option<Self> {
        [
            IdentifierFamily::HospitalNumber,
            IdentifierFamily::NationalId,
            IdentifierFamily::Encounter,
        ]
        .into_iter()
        .find(|family| family.matches(column))
    }
}

pub(crate) fn detect_domain(
    samples: &Samples<'_>,
    source: &ColumnName,
    target: &ColumnName,
) -> Option<DomainFinding> {
    let total = samples.len();
    let family = IdentifierFamily::classify(source)?;
    let finding = match family {
        IdentifierFamily::HospitalNumber => {
            let valid = samples.count_trimmed(|value| hn_regex().is_match(value));
            let is_match = family.matches(target);
            DomainFinding {
                confidence: valid as f64 / total as f64,
                is_match,
                validator: Some(Validator::HnFormat),
                reason: if is_match {
                    format!("HN pattern matched ({valid}/{total} valid)")
                } else {
                    "Source is HN but target seems different".to_string()
                },
            }
        }
        IdentifierFamily::NationalId => {
            let valid = samples.count_trimmed(|value| cid_regex().is_match(value));
            let is_match = family.matches(target);
            DomainFinding {
                confidence: valid as f64 / total as f64,
                is_match,
                validator: Some(Validator::ThaiId),
                reason: if is_match {
                    format!("CID pattern matched ({valid}/{total} valid 13-digit)")
                } else {
                    "Source is CID but target seems different".to_string()
                },
            }
        }
        IdentifierFamily::Encounter => DomainFinding {
            confidence: 0.7,
            is_match: true,
            validator: None,
            reason: "Healthcare visit/admission identifier detected".to_string(),
        },
    };
    Some(finding)
}

/// A column name normalised to snake_case for keyword checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ColumnName {
    snake: String,
}

impl ColumnName {
    pub fn new(name: &str) -> Self {
        Self {
            snake: name.trim().to_snake_case(),
        }
    }

    /// True when any `_`-separated token equals one of `tokens`.
    pub fn has_token(&self, tokens: &[&str]) -> bool {
        self.snake
            .split('_')
            .any(|token| tokens.contains(&token))
    }

    pub fn contains_any(&self, fragments: &[&str]) -> bool {
        fragments.iter().any(|fragment| self.snake.contains(fragment))
    }
}
