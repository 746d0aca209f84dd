//! Error types for spiral scoring
//!
//! Structural problems with the input (missing fields, too few samples, a
//! missing reference table) are reported here and abort the pipeline. Numeric
//! degeneracy is never an error: it surfaces as `NaN` metrics and neutral
//! z-scores instead.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while scoring a spiral trial
#[derive(Debug, Error)]
pub enum ScoringError {
    #[error("Could not find a non-empty 'points' collection in spiral JSON")]
    MissingPoints,

    #[error("Point {index} has no '{field}' field (tried aliases {aliases:?}): {record}")]
    MissingField {
        field: &'static str,
        aliases: &'static [&'static str],
        index: usize,
        record: String,
    },

    #[error("Too few samples ({count}) to score reliably, need at least {minimum}")]
    InsufficientSamples { count: usize, minimum: usize },

    #[error("Bad mean sample interval computed from timestamps: dt = {dt} ms")]
    BadTimestep { dt: f64 },

    #[error("Population stats not found at: {}", path.display())]
    PopulationStatsNotFound { path: PathBuf },

    #[error("Population stats at {} could not be read: {source}", path.display())]
    PopulationStatsUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Population stats are missing a usable entry for '{key}'")]
    PopulationStatsIncomplete { key: String },

    #[error("Missing spiral template params a/b")]
    MissingTemplate,

    #[error("Invalid scoring configuration: {0}")]
    Config(String),

    #[error("Preview rendering failed: {0}")]
    Preview(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl ScoringError {
    /// Short machine-readable code used by the CLI error envelope
    pub fn code(&self) -> &'static str {
        match self {
            ScoringError::MissingPoints => "MISSING_POINTS",
            ScoringError::MissingField { .. } => "MISSING_FIELD",
            ScoringError::InsufficientSamples { .. } => "INSUFFICIENT_SAMPLES",
            ScoringError::BadTimestep { .. } => "BAD_TIMESTEP",
            ScoringError::PopulationStatsNotFound { .. } => "POPULATION_STATS_NOT_FOUND",
            ScoringError::PopulationStatsUnreadable { .. } => "POPULATION_STATS_UNREADABLE",
            ScoringError::PopulationStatsIncomplete { .. } => "POPULATION_STATS_INCOMPLETE",
            ScoringError::MissingTemplate => "MISSING_TEMPLATE",
            ScoringError::Config(_) => "CONFIG_ERROR",
            ScoringError::Preview(_) => "PREVIEW_ERROR",
            ScoringError::JsonError(_) => "JSON_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_field_message_names_field() {
        let err = ScoringError::MissingField {
            field: "t",
            aliases: &["t_ms", "t [ms]", "t"],
            index: 3,
            record: r#"{"x":1.0,"y":2.0}"#.to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("'t'"));
        assert!(msg.contains("Point 3"));
        assert!(msg.contains(r#"{"x":1.0,"y":2.0}"#));
        assert_eq!(err.code(), "MISSING_FIELD");
    }

    #[test]
    fn test_bad_timestep_reports_dt() {
        let err = ScoringError::BadTimestep { dt: -2.5 };
        assert!(err.to_string().contains("-2.5"));
    }
}
