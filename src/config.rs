//! Scoring configuration
//!
//! Everything here has a default matching the reference scoring behaviour, so
//! an empty JSON object (or no file at all) yields a valid configuration.

use crate::error::ScoringError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Render a preview image into the report
    pub include_image: bool,
    /// Template re-estimation policy
    pub refit: RefitPolicy,
    /// Preview rendering settings
    pub preview: PreviewConfig,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            include_image: true,
            refit: RefitPolicy::default(),
            preview: PreviewConfig::default(),
        }
    }
}

/// When to replace the supplied template with one fitted to the centered data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefitPolicy {
    /// Attempt a refit at all
    pub enabled: bool,
    /// The refit needs strictly more qualifying samples than this
    pub min_valid_samples: usize,
    /// The fitted slope `b` must be strictly greater than this
    pub min_slope: f64,
}

impl Default for RefitPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            min_valid_samples: 10,
            min_slope: 0.0,
        }
    }
}

/// Preview canvas settings (pixels)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreviewConfig {
    pub width: u32,
    pub height: u32,
    pub stroke_width: u32,
    /// Empty border kept around the trace
    pub padding: u32,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            width: 480,
            height: 480,
            stroke_width: 2,
            padding: 8,
        }
    }
}

impl ScoringConfig {
    /// Validate config values are within acceptable ranges
    pub fn validate(&self) -> Result<(), ScoringError> {
        if !self.refit.min_slope.is_finite() {
            return Err(ScoringError::Config(format!(
                "refit.min_slope must be finite, got {}",
                self.refit.min_slope
            )));
        }
        let preview = &self.preview;
        if preview.width == 0 || preview.height == 0 {
            return Err(ScoringError::Config(format!(
                "preview size must be non-zero, got {}x{}",
                preview.width, preview.height
            )));
        }
        if preview.padding.saturating_mul(2) >= preview.width.min(preview.height) {
            return Err(ScoringError::Config(format!(
                "preview.padding {} leaves no room on a {}x{} canvas",
                preview.padding, preview.width, preview.height
            )));
        }
        if preview.stroke_width == 0 {
            return Err(ScoringError::Config(
                "preview.stroke_width must be > 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Parse and validate a JSON configuration
    pub fn from_json(json: &str) -> Result<Self, ScoringError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ScoringError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load config from a JSON file
    pub fn load(path: &Path) -> Result<Self, ScoringError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ScoringError::Config(format!("{}: {e}", path.display())))?;
        Self::from_json(&content)
    }

    /// Serialize to pretty JSON
    pub fn to_json(&self) -> Result<String, ScoringError> {
        serde_json::to_string_pretty(self).map_err(ScoringError::JsonError)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_are_valid() {
        let config = ScoringConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.include_image);
        assert_eq!(config.refit.min_valid_samples, 10);
        assert_eq!(config.refit.min_slope, 0.0);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config =
            ScoringConfig::from_json(r#"{ "include_image": false, "refit": { "min_slope": 0.05 } }"#)
                .unwrap();
        assert!(!config.include_image);
        assert!(config.refit.enabled);
        assert_eq!(config.refit.min_slope, 0.05);
        assert_eq!(config.preview, PreviewConfig::default());
    }

    #[test]
    fn test_invalid_preview_rejected() {
        let err = ScoringConfig::from_json(r#"{ "preview": { "width": 0 } }"#).unwrap_err();
        assert!(matches!(err, ScoringError::Config(_)));

        let err = ScoringConfig::from_json(r#"{ "preview": { "padding": 300 } }"#).unwrap_err();
        assert!(err.to_string().contains("padding"));
    }

    #[test]
    fn test_huge_padding_is_rejected_not_overflowed() {
        let err = ScoringConfig::from_json(r#"{ "preview": { "padding": 4294967295 } }"#)
            .unwrap_err();
        assert!(matches!(err, ScoringError::Config(_)));
        assert!(err.to_string().contains("4294967295"));
    }

    #[test]
    fn test_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("scoring.json");
        let mut config = ScoringConfig::default();
        config.refit.min_valid_samples = 25;
        std::fs::write(&path, config.to_json().unwrap()).unwrap();

        let loaded = ScoringConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_missing_file() {
        let err = ScoringConfig::load(Path::new("/nonexistent/scoring.json")).unwrap_err();
        assert!(matches!(err, ScoringError::Config(_)));
    }
}
