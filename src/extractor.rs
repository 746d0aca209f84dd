//! Trace extraction
//!
//! Parses heterogeneous spiral recordings into a [`CleanTrace`]. Recording
//! devices disagree on key spellings, so each field is resolved against an
//! ordered list of aliases and the first match wins.

use crate::error::ScoringError;
use crate::types::{CleanTrace, RawPoint, SpiralTemplate};
use serde_json::{Map, Value};
use tracing::debug;

/// Minimum number of samples a trace must keep after deduplication
pub const MIN_SAMPLES: usize = 10;

/// Accepted spellings for the x coordinate
pub const X_ALIASES: &[&str] = &["x", "x []"];
/// Accepted spellings for the y coordinate
pub const Y_ALIASES: &[&str] = &["y", "y []"];
/// Accepted spellings for the timestamp (ms)
pub const T_ALIASES: &[&str] = &["t_ms", "t [ms]", "t"];

/// Accepted spellings for the template offset `a`
pub const A_ALIASES: &[&str] = &["a", "a []"];
/// Accepted spellings for the template slope `b`
pub const B_ALIASES: &[&str] = &["b", "b []", "b [/rad]"];

/// Extractor for turning spiral JSON into clean traces
pub struct TraceExtractor;

impl TraceExtractor {
    /// Extract, deduplicate and length-check a trace
    pub fn extract(spiral_json: &Value) -> Result<CleanTrace, ScoringError> {
        let raw = Self::extract_points(spiral_json)?;
        let raw_count = raw.len();
        let points = remove_consecutive_duplicates(raw);

        debug!(
            raw_count,
            clean_count = points.len(),
            "extracted spiral trace"
        );

        if points.len() < MIN_SAMPLES {
            return Err(ScoringError::InsufficientSamples {
                count: points.len(),
                minimum: MIN_SAMPLES,
            });
        }

        Ok(CleanTrace::new(points, raw_count))
    }

    /// Parse a JSON string and extract a clean trace
    pub fn extract_str(raw_json: &str) -> Result<CleanTrace, ScoringError> {
        let value: Value = serde_json::from_str(raw_json)?;
        Self::extract(&value)
    }

    /// Resolve every point record without deduplication
    pub fn extract_points(spiral_json: &Value) -> Result<Vec<RawPoint>, ScoringError> {
        let records = find_points(spiral_json).ok_or(ScoringError::MissingPoints)?;

        records
            .iter()
            .enumerate()
            .map(|(index, record)| parse_point(index, record))
            .collect()
    }
}

/// Locate the `points` array, preferring one nested under `data`
fn find_points(spiral_json: &Value) -> Option<&Vec<Value>> {
    let nested = spiral_json
        .get("data")
        .filter(|data| data.is_object())
        .and_then(|data| data.get("points"))
        .and_then(Value::as_array)
        .filter(|points| !points.is_empty());

    nested.or_else(|| {
        spiral_json
            .get("points")
            .and_then(Value::as_array)
            .filter(|points| !points.is_empty())
    })
}

fn parse_point(index: usize, record: &Value) -> Result<RawPoint, ScoringError> {
    let missing = |field: &'static str, aliases: &'static [&'static str]| {
        ScoringError::MissingField {
            field,
            aliases,
            index,
            record: record.to_string(),
        }
    };

    let Some(object) = record.as_object() else {
        return Err(missing("x", X_ALIASES));
    };

    let x = lookup_number(object, X_ALIASES).ok_or_else(|| missing("x", X_ALIASES))?;
    let y = lookup_number(object, Y_ALIASES).ok_or_else(|| missing("y", Y_ALIASES))?;
    let t = lookup_number(object, T_ALIASES).ok_or_else(|| missing("t", T_ALIASES))?;

    Ok(RawPoint { x, y, t })
}

/// First alias present in `object`, converted to `f64`.
///
/// Only the first present alias is considered: a present but non-numeric value
/// does not fall through to later spellings.
pub(crate) fn lookup_number(object: &Map<String, Value>, aliases: &[&str]) -> Option<f64> {
    aliases
        .iter()
        .find_map(|key| object.get(*key))
        .and_then(value_as_f64)
}

/// Numbers and numeric strings convert; everything else does not
pub(crate) fn value_as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// Collapse runs of identical consecutive `(x, y, t)` samples
pub fn remove_consecutive_duplicates(points: Vec<RawPoint>) -> Vec<RawPoint> {
    let mut kept: Vec<RawPoint> = Vec::with_capacity(points.len());
    for point in points {
        if kept.last() != Some(&point) {
            kept.push(point);
        }
    }
    kept
}

/// Resolver for spiral template parameters carried in metadata objects
pub struct TemplateExtractor;

impl TemplateExtractor {
    /// Read `(a, b)` from one metadata object; both must resolve
    pub fn from_metadata(metadata: &Value) -> Option<SpiralTemplate> {
        let object = metadata.as_object()?;
        let a = lookup_number(object, A_ALIASES)?;
        let b = lookup_number(object, B_ALIASES)?;
        Some(SpiralTemplate { a, b })
    }

    /// Try each candidate in priority order and return the first full match
    pub fn resolve(candidates: &[&Value]) -> Result<SpiralTemplate, ScoringError> {
        candidates
            .iter()
            .find_map(|candidate| Self::from_metadata(candidate))
            .ok_or(ScoringError::MissingTemplate)
    }
}
