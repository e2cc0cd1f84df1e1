//! Validator registry and grading of transformed batches.
//!
//! Validators are descriptive: a mapping records them, and [`grade`] reports
//! how transformed values measure up, but nothing here rejects or rewrites
//! data. Enforcement belongs to whatever policy step consumes the report.

use std::{collections::BTreeMap, fmt, str::FromStr, sync::OnceLock};

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};
use thiserror::Error;

use crate::{
    config::MigrationConfig,
    transform::dates,
    value::{Row, Value},
};

const FAILURE_SAMPLE_LIMIT: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Validator {
    Required,
    ThaiId,
    HnFormat,
    ValidDate,
}

impl Validator {
    pub const ALL: &'static [Validator] = &[
        Validator::Required,
        Validator::ThaiId,
        Validator::HnFormat,
        Validator::ValidDate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Validator::Required => "REQUIRED",
            Validator::ThaiId => "THAI_ID",
            Validator::HnFormat => "HN_FORMAT",
            Validator::ValidDate => "VALID_DATE",
        }
    }

    /// Grades one value. Only `REQUIRED` fails blank values.
    pub fn check(&self, value: &Value) -> bool {
        if value.is_blank() {
            return !matches!(self, Validator::Required);
        }
        let text = value.as_display();
        let text = text.trim();
        match self {
            Validator::Required => true,
            Validator::ThaiId => is_thai_id(text),
            Validator::HnFormat => hn_regex().is_match(text),
            Validator::ValidDate => dates::is_iso_date(text),
        }
    }
}

impl fmt::Display for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown validator '{name}'")]
pub struct UnknownValidator {
    pub name: String,
}

impl FromStr for Validator {
    type Err = UnknownValidator;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_uppercase();
        Validator::ALL
            .iter()
            .copied()
            .find(|v| v.as_str() == normalized)
            .ok_or_else(|| UnknownValidator {
                name: value.to_string(),
            })
    }
}

impl Serialize for Validator {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Validator {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let token = String::deserialize(deserializer)?;
        Validator::from_str(&token).map_err(de::Error::custom)
    }
}

fn hn_regex() -> &'static Regex {
    static HN: OnceLock<Regex> = OnceLock::new();
    HN.get_or_init(|| Regex::new(r"^\d{6,10}$").expect("valid HN regex"))
}

/// 13 digits (dashes and spaces ignored) with a valid mod-11 check digit.
fn is_thai_id(value: &str) -> bool {
    let digits = value
        .chars()
        .filter(|ch| !matches!(ch, '-' | ' '))
        .map(|ch| ch.to_digit(10))
        .collect::<Option<Vec<u32>>>();
    let Some(digits) = digits else {
        return false;
    };
    if digits.len() != 13 {
        return false;
    }
    let sum: u32 = digits[..12]
        .iter()
        .enumerate()
        .map(|(idx, d)| d * (13 - idx as u32))
        .sum();
    (11 - sum % 11) % 10 == digits[12]
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidatorGrade {
    pub target: String,
    pub validator: Validator,
    pub checked: usize,
    pub failed: usize,
    pub failing_samples: Vec<String>,
}

impl ValidatorGrade {
    pub fn pass_rate(&self) -> f64 {
        if self.checked == 0 {
            return 1.0;
        }
        (self.checked - self.failed) as f64 / self.checked as f64
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidationReport {
    pub grades: Vec<ValidatorGrade>,
}

impl ValidationReport {
    pub fn total_failures(&self) -> usize {
        self.grades.iter().map(|g| g.failed).sum()
    }

    pub fn grade_for(&self, target: &str, validator: Validator) -> Option<&ValidatorGrade> {
        self.grades
            .iter()
            .find(|g| g.target == target && g.validator == validator)
    }

    /// Folds the report of a later batch into this one.
    pub fn absorb(&mut self, other: ValidationReport) {
        for grade in other.grades {
            match self
                .grades
                .iter_mut()
                .find(|g| g.target == grade.target && g.validator == grade.validator)
            {
                Some(existing) => {
                    existing.checked += grade.checked;
                    existing.failed += grade.failed;
                    let room = FAILURE_SAMPLE_LIMIT.saturating_sub(existing.failing_samples.len());
                    existing
                        .failing_samples
                        .extend(grade.failing_samples.into_iter().take(room));
                }
                None => self.grades.push(grade),
            }
        }
    }
}

/// Grades transformed `rows` against the validators each mapping declares.
pub fn grade(rows: &[Row], config: &MigrationConfig) -> ValidationReport {
    let mut grades: BTreeMap<(usize, usize), ValidatorGrade> = BTreeMap::new();
    for (mapping_idx, mapping) in config.active_mappings().enumerate() {
        let Some(validators) = mapping.validators.as_deref() else {
            continue;
        };
        for (validator_idx, validator) in validators.iter().enumerate() {
            let entry = grades
                .entry((mapping_idx, validator_idx))
                .or_insert_with(|| ValidatorGrade {
                    target: mapping.target.clone(),
                    validator: *validator,
                    checked: 0,
                    failed: 0,
                    failing_samples: Vec::new(),
                });
            for row in rows {
                let value = row.get(&mapping.target).unwrap_or(&Value::Null);
                entry.checked += 1;
                if !validator.check(value) {
                    entry.failed += 1;
                    if entry.failing_samples.len() < FAILURE_SAMPLE_LIMIT {
                        entry.failing_samples.push(value.as_display());
                    }
                }
            }
        }
    }
    ValidationReport {
        grades: grades.into_values().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thai_id_checksum_is_enforced() {
        assert!(is_thai_id("1101700203450"));
        assert!(is_thai_id("1-1017-00203-45-0"));
        assert!(!is_thai_id("1101700203451"));
        assert!(!is_thai_id("110170020345"));
    }

    #[test]
    fn only_required_fails_blank_values() {
        assert!(!Validator::Required.check(&Value::Null));
        assert!(Validator::HnFormat.check(&Value::text("  ")));
        assert!(Validator::ValidDate.check(&Value::Null));
    }

    #[test]
    fn hn_and_date_patterns() {
        assert!(Validator::HnFormat.check(&Value::text("0001234")));
        assert!(!Validator::HnFormat.check(&Value::text("HN-1234")));
        assert!(Validator::ValidDate.check(&Value::text("2023-05-15")));
        assert!(!Validator::ValidDate.check(&Value::text("2023-13-45")));
    }
}
