//! Transformer registry and pipeline engine.
//!
//! A pipeline is an ordered list of [`Transformer`]s applied to one value.
//! Blank input short-circuits the whole pipeline. A step that fails is
//! skipped and the value flows on unchanged, so a single bad conversion never
//! aborts a migration batch.

pub mod dates;
pub mod lookup;
pub mod string_ops;

use std::{fmt, str::FromStr, sync::Arc};

use log::{debug, warn};
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};
use thiserror::Error;

use crate::value::Value;

pub use lookup::{LookupBinding, LookupError, LookupResolver, ReferenceTables};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Transformer {
    Trim,
    UpperTrim,
    LowerTrim,
    CleanSpaces,
    BuddhistToIso,
    EngDateToIso,
    SplitThaiName,
    SplitEngName,
    FormatPhone,
    MapGender,
    ToNumber,
    FloatToInt,
    RemovePrefix,
    ReplaceEmptyWithNull,
    ParseJson,
    LookupVisitId,
    LookupPatientId,
    LookupDoctorId,
}

impl Transformer {
    pub const ALL: &'static [Transformer] = &[
        Transformer::Trim,
        Transformer::UpperTrim,
        Transformer::LowerTrim,
        Transformer::CleanSpaces,
        Transformer::BuddhistToIso,
        Transformer::EngDateToIso,
        Transformer::SplitThaiName,
        Transformer::SplitEngName,
        Transformer::FormatPhone,
        Transformer::MapGender,
        Transformer::ToNumber,
        Transformer::FloatToInt,
        Transformer::RemovePrefix,
        Transformer::ReplaceEmptyWithNull,
        Transformer::ParseJson,
        Transformer::LookupVisitId,
        Transformer::LookupPatientId,
        Transformer::LookupDoctorId,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Transformer::Trim => "TRIM",
            Transformer::UpperTrim => "UPPER_TRIM",
            Transformer::LowerTrim => "LOWER_TRIM",
            Transformer::CleanSpaces => "CLEAN_SPACES",
            Transformer::BuddhistToIso => "BUDDHIST_TO_ISO",
            Transformer::EngDateToIso => "ENG_DATE_TO_ISO",
            Transformer::SplitThaiName => "SPLIT_THAI_NAME",
            Transformer::SplitEngName => "SPLIT_ENG_NAME",
            Transformer::FormatPhone => "FORMAT_PHONE",
            Transformer::MapGender => "MAP_GENDER",
            Transformer::ToNumber => "TO_NUMBER",
            Transformer::FloatToInt => "FLOAT_TO_INT",
            Transformer::RemovePrefix => "REMOVE_PREFIX",
            Transformer::ReplaceEmptyWithNull => "REPLACE_EMPTY_WITH_NULL",
            Transformer::ParseJson => "PARSE_JSON",
            Transformer::LookupVisitId => "LOOKUP_VISIT_ID",
            Transformer::LookupPatientId => "LOOKUP_PATIENT_ID",
            Transformer::LookupDoctorId => "LOOKUP_DOCTOR_ID",
        }
    }

    pub fn is_lookup(&self) -> bool {
        matches!(
            self,
            Transformer::LookupVisitId | Transformer::LookupPatientId | Transformer::LookupDoctorId
        )
    }

    pub fn names() -> Vec<&'static str> {
        Self::ALL.iter().map(Transformer::as_str).collect()
    }
}

impl fmt::Display for Transformer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown transformer '{name}'")]
pub struct UnknownTransformer {
    pub name: String,
}

impl FromStr for Transformer {
    type Err = UnknownTransformer;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_uppercase();
        Transformer::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == normalized)
            .ok_or_else(|| UnknownTransformer {
                name: value.to_string(),
            })
    }
}

impl Serialize for Transformer {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Transformer {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let token = String::deserialize(deserializer)?;
        Transformer::from_str(&token).map_err(de::Error::custom)
    }
}

/// How name-level dispatch treats names outside the registry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UnknownPolicy {
    #[default]
    Reject,
    PassThrough,
}

/// Parses raw transformer names according to `policy`.
pub fn parse_pipeline<S>(names: &[S], policy: UnknownPolicy) -> Result<Vec<Transformer>, UnknownTransformer>
where
    S: AsRef<str>,
{
    let mut pipeline = Vec::with_capacity(names.len());
    for name in names {
        match Transformer::from_str(name.as_ref()) {
            Ok(transformer) => pipeline.push(transformer),
            Err(err) if policy == UnknownPolicy::PassThrough => {
                warn!("Skipping {err}");
            }
            Err(err) => return Err(err),
        }
    }
    Ok(pipeline)
}

#[derive(Debug, Error)]
pub enum TransformError {
    #[error("{transformer} lookup in {table}.{by} failed: {source}")]
    Lookup {
        transformer: Transformer,
        table: String,
        by: String,
        #[source]
        source: LookupError,
    },
    #[error("{transformer} cannot represent '{value}' as a 64-bit integer")]
    OutOfRange { transformer: Transformer, value: String },
}

/// Applies transformer pipelines, optionally resolving `LOOKUP_*` steps.
#[derive(Clone, Default)]
pub struct TransformEngine {
    resolver: Option<Arc<dyn LookupResolver>>,
}

impl fmt::Debug for TransformEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransformEngine")
            .field("lookup", &self.resolver.is_some())
            .finish()
    }
}

impl TransformEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_resolver(resolver: Arc<dyn LookupResolver>) -> Self {
        Self {
            resolver: Some(resolver),
        }
    }

    pub fn has_resolver(&self) -> bool {
        self.resolver.is_some()
    }

    /// Runs `pipeline` over `value` in order.
    pub fn apply_pipeline(
        &self,
        value: Value,
        pipeline: &[Transformer],
        binding: LookupBinding<'_>,
    ) -> Value {
        if value.is_blank() {
            return value;
        }
        let mut current = value;
        for &transformer in pipeline {
            if current.is_null() {
                break;
            }
            current = match self.apply_step(transformer, &current, binding) {
                Ok(next) => next,
                Err(err) => {
                    debug!("Skipping {transformer}: {err}");
                    current
                }
            };
        }
        current
    }

    /// Name-level entry point; unknown names follow `policy`.
    pub fn apply_named_pipeline<S>(
        &self,
        value: Value,
        names: &[S],
        policy: UnknownPolicy,
    ) -> Result<Value, UnknownTransformer>
    where
        S: AsRef<str>,
    {
        let pipeline = parse_pipeline(names, policy)?;
        Ok(self.apply_pipeline(value, &pipeline, LookupBinding::none()))
    }

    fn apply_step(
        &self,
        transformer: Transformer,
        value: &Value,
        binding: LookupBinding<'_>,
    ) -> Result<Value, TransformError> {
        let text = value.as_display();
        let transformed = match transformer {
            Transformer::Trim
            | Transformer::SplitThaiName
            | Transformer::SplitEngName
            | Transformer::RemovePrefix => Value::text(string_ops::trim(&text)),
            Transformer::UpperTrim => Value::text(string_ops::upper_trim(&text)),
            Transformer::LowerTrim => Value::text(string_ops::lower_trim(&text)),
            Transformer::CleanSpaces => Value::text(string_ops::clean_spaces(&text)),
            Transformer::BuddhistToIso => match dates::buddhist_to_iso(&text) {
                Some(iso) => Value::Text(iso),
                None => value.clone(),
            },
            Transformer::EngDateToIso => match dates::eng_date_to_iso(&text) {
                Some(iso) => Value::Text(iso),
                None => value.clone(),
            },
            Transformer::FormatPhone => Value::Text(format_phone(&text)),
            Transformer::MapGender => Value::Text(map_gender(&text)),
            Transformer::ToNumber => value.as_f64().map(Value::Float).unwrap_or(Value::Null),
            Transformer::FloatToInt => match value.as_f64().filter(|f| f.is_finite()) {
                Some(f) => Value::Integer(float_to_int(f).ok_or(TransformError::OutOfRange {
                    transformer,
                    value: text,
                })?),
                None => Value::Null,
            },
            Transformer::ReplaceEmptyWithNull => {
                if value.is_blank() {
                    Value::Null
                } else {
                    value.clone()
                }
            }
            Transformer::ParseJson => match value {
                Value::Text(raw) => serde_json::from_str::<serde_json::Value>(raw)
                    .map(Value::from_json)
                    .unwrap_or_else(|_| value.clone()),
                other => other.clone(),
            },
            Transformer::LookupVisitId
            | Transformer::LookupPatientId
            | Transformer::LookupDoctorId => return self.lookup(transformer, value, binding),
        };
        Ok(transformed)
    }

    fn lookup(
        &self,
        transformer: Transformer,
        value: &Value,
        binding: LookupBinding<'_>,
    ) -> Result<Value, TransformError> {
        let (Some(resolver), Some((table, by))) = (self.resolver.as_ref(), binding.target())
        else {
            return Ok(value.clone());
        };
        match resolver.resolve(table, by, value) {
            Ok(Some(resolved)) => Ok(resolved),
            Ok(None) => {
                debug!("{transformer}: no {table}.{by} entry for '{value}'");
                Ok(value.clone())
            }
            Err(source) => Err(TransformError::Lookup {
                transformer,
                table: table.to_string(),
                by: by.to_string(),
                source,
            }),
        }
    }
}

/// Applies `pipeline` with an engine that has no lookup capability.
pub fn apply_pipeline(value: Value, pipeline: &[Transformer]) -> Value {
    TransformEngine::new().apply_pipeline(value, pipeline, LookupBinding::none())
}

/// Truncates toward zero; `None` when the result does not fit in an `i64`.
fn float_to_int(value: f64) -> Option<i64> {
    const LIMIT: f64 = 9_223_372_036_854_775_808.0;
    let truncated = value.trunc();
    (-LIMIT..LIMIT)
        .contains(&truncated)
        .then_some(truncated as i64)
}

fn format_phone(value: &str) -> String {
    let digits = string_ops::digits_only(value);
    match digits.len() {
        10 => format!("{}-{}-{}", &digits[..3], &digits[3..6], &digits[6..]),
        11 => format!(
            "+{} {}-{}-{}",
            &digits[..1],
            &digits[1..4],
            &digits[4..7],
            &digits[7..]
        ),
        _ => digits.into_owned(),
    }
}

fn map_gender(value: &str) -> String {
    let normalized = value.trim().to_uppercase();
    let mapped = match normalized.as_str() {
        "M" | "MALE" | "1" => "M",
        "F" | "FEMALE" | "2" => "F",
        "O" | "OTHER" | "3" => "O",
        _ => return normalized,
    };
    mapped.to_string()
}
