//! Pipeline orchestration
//!
//! This module provides the public API for spiral scoring.
//! It runs one trial from raw spiral JSON to a complete scoring artifact.

use crate::config::ScoringConfig;
use crate::derivatives::DerivativeEngine;
use crate::encoder::ReportAssembler;
use crate::error::ScoringError;
use crate::extractor::TraceExtractor;
use crate::features::MetricComputer;
use crate::normalizer::PopulationNormalizer;
use crate::polar::SpiralUnwrapper;
use crate::population::PopulationStats;
use crate::preview::PreviewRenderer;
use crate::types::{ScoringArtifact, SpiralTemplate};
use serde_json::Value;
use std::borrow::Borrow;
use std::path::Path;
use tracing::{debug, info};

/// Score one spiral trial against a population statistics file.
///
/// # Arguments
/// * `spiral_json` - Trial JSON with a `points` array (top-level or under `data`)
/// * `template` - Reference spiral parameters `a`, `b`
/// * `popstats_path` - Population reference table (cached per path)
/// * `include_image` - Embed a base64 SVG preview in the report
///
/// # Example
/// ```ignore
/// let artifact = score_spiral_json(
///     &trial,
///     SpiralTemplate::new(0.0, 1.2),
///     Path::new("popstats.json"),
///     true,
/// )?;
/// println!("{}", artifact.final_score());
/// ```
pub fn score_spiral_json(
    spiral_json: &Value,
    template: SpiralTemplate,
    popstats_path: &Path,
    include_image: bool,
) -> Result<ScoringArtifact, ScoringError> {
    let config = ScoringConfig {
        include_image,
        ..ScoringConfig::default()
    };
    SpiralScorer::with_config(config).score_with_stats_file(spiral_json, template, popstats_path)
}

/// Reusable scorer holding configuration and producer identity.
///
/// Holds no mutable state, so one scorer can be shared across threads.
#[derive(Debug, Clone)]
pub struct SpiralScorer {
    config: ScoringConfig,
    assembler: ReportAssembler,
}

impl Default for SpiralScorer {
    fn default() -> Self {
        Self::new()
    }
}

impl SpiralScorer {
    /// Create a scorer with default settings
    pub fn new() -> Self {
        Self::with_config(ScoringConfig::default())
    }

    /// Create a scorer with a specific configuration
    pub fn with_config(config: ScoringConfig) -> Self {
        Self {
            config,
            assembler: ReportAssembler::new(),
        }
    }

    /// Replace the assembler (fixes the producer instance ID)
    pub fn with_assembler(mut self, assembler: ReportAssembler) -> Self {
        self.assembler = assembler;
        self
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Score against an already loaded population table
    pub fn score(
        &self,
        spiral_json: &Value,
        template: SpiralTemplate,
        stats: &PopulationStats,
    ) -> Result<ScoringArtifact, ScoringError> {
        self.run_stages(spiral_json, template, || Ok(stats))
    }

    /// Score against a population file, loaded through the process-wide cache
    pub fn score_with_stats_file(
        &self,
        spiral_json: &Value,
        template: SpiralTemplate,
        popstats_path: &Path,
    ) -> Result<ScoringArtifact, ScoringError> {
        self.run_stages(spiral_json, template, || {
            PopulationStats::load_cached(popstats_path)
        })
    }

    /// Score against a population file and serialize to pretty JSON
    pub fn score_to_json(
        &self,
        spiral_json: &Value,
        template: SpiralTemplate,
        popstats_path: &Path,
    ) -> Result<String, ScoringError> {
        let artifact = self.score_with_stats_file(spiral_json, template, popstats_path)?;
        serde_json::to_string_pretty(&artifact).map_err(ScoringError::JsonError)
    }

    /// Pipeline stages:
    /// 1. TraceExtractor - Parse points and drop consecutive duplicates
    /// 2. SpiralUnwrapper - Center, unwrap and refit the template
    /// 3. PopulationStats - Obtain the reference table
    /// 4. DerivativeEngine - Smoothed derivatives
    /// 5. MetricComputer - Six metrics plus duration
    /// 6. PopulationNormalizer - Z-scores, weights and final score
    /// 7. PreviewRenderer / ReportAssembler - Package the artifact
    fn run_stages<S, F>(
        &self,
        spiral_json: &Value,
        template: SpiralTemplate,
        load_stats: F,
    ) -> Result<ScoringArtifact, ScoringError>
    where
        S: Borrow<PopulationStats>,
        F: FnOnce() -> Result<S, ScoringError>,
    {
        // Stage 1: Extract a clean trace
        let clean = TraceExtractor::extract(spiral_json)?;

        // Stage 2: Polar form against the chosen template
        let processed = SpiralUnwrapper::process(&clean, template, &self.config.refit);

        // Stage 3: Population reference
        let loaded = load_stats()?;
        let stats: &PopulationStats = loaded.borrow();

        // Stage 4: Derivatives
        let derivatives = DerivativeEngine::compute(&processed)?;

        // Stage 5: Metrics
        let metrics = MetricComputer::compute(&processed, &derivatives);

        // Stage 6: Score
        let scoring = PopulationNormalizer::score(&metrics, stats);

        // Stage 7: Report
        let image = if self.config.include_image {
            PreviewRenderer::render_base64(&processed, &self.config.preview)?
        } else {
            debug!("preview image disabled");
            None
        };

        info!(
            final_score = scoring.final_score,
            n_points = processed.len(),
            template_origin = ?processed.fitted.origin,
            "scored spiral trial"
        );

        Ok(self
            .assembler
            .assemble(&processed, &derivatives, metrics, scoring, image))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::population::tests::reference_document;
    use crate::types::TemplateOrigin;
    use serde_json::json;
    use std::f64::consts::PI;
    use tempfile::TempDir;

    fn sample_spiral_json(n: usize) -> Value {
        let points: Vec<Value> = (0..n)
            .map(|i| {
                let theta = 4.0 * PI * i as f64 / (n - 1) as f64;
                let r = 5.0 + 2.0 * theta + 0.3 * (7.0 * theta).sin();
                json!({
                    "x": 200.0 + r * theta.cos(),
                    "y": 150.0 + r * theta.sin(),
                    "t_ms": 12.0 * i as f64,
                })
            })
            .collect();
        json!({ "data": { "points": points } })
    }

    fn no_image() -> SpiralScorer {
        SpiralScorer::with_config(ScoringConfig {
            include_image: false,
            ..ScoringConfig::default()
        })
    }

    #[test]
    fn test_score_with_loaded_stats() {
        let stats = PopulationStats::from_value(&reference_document(0.0, 1.0)).unwrap();
        let artifact = no_image()
            .score(&sample_spiral_json(300), SpiralTemplate::new(5.0, 2.0), &stats)
            .unwrap();

        assert_eq!(artifact.debug.n_points, 300);
        assert_eq!(artifact.debug.sg_window_main, 31);
        assert_eq!(artifact.debug.sg_window_jerk, 51);
        assert_eq!(artifact.debug.template_origin, TemplateOrigin::Refit);
        assert!(artifact.final_score().is_finite());
        assert!(artifact.report.spiral_image_svg_base64.is_none());
        assert_eq!(artifact.report.top_contributors.len(), 3);
    }

    #[test]
    fn test_score_spiral_json_with_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("popstats.json");
        std::fs::write(&path, reference_document(0.0, 1.0).to_string()).unwrap();

        let artifact =
            score_spiral_json(&sample_spiral_json(200), SpiralTemplate::new(5.0, 2.0), &path, false)
                .unwrap();
        assert_eq!(artifact.version, "spiral_scoring_v1");
        assert!(artifact.final_score().is_finite());
    }

    #[test]
    fn test_extraction_errors_precede_stats_loading() {
        let err = score_spiral_json(
            &json!({ "points": [] }),
            SpiralTemplate::new(0.0, 1.0),
            Path::new("/nonexistent/popstats.json"),
            false,
        )
        .unwrap_err();
        assert!(matches!(err, ScoringError::MissingPoints));
    }

    #[test]
    fn test_stats_errors_precede_derivatives() {
        let dir = TempDir::new().unwrap();
        let err = no_image()
            .score_with_stats_file(
                &sample_spiral_json(50),
                SpiralTemplate::new(5.0, 2.0),
                &dir.path().join("missing.json"),
            )
            .unwrap_err();
        assert!(matches!(err, ScoringError::PopulationStatsNotFound { .. }));
    }

    #[test]
    fn test_score_to_json_is_parseable() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("popstats.json");
        std::fs::write(&path, reference_document(1.0, 2.0).to_string()).unwrap();

        let scorer = no_image().with_assembler(ReportAssembler::with_instance_id("fixed".into()));
        let json = scorer
            .score_to_json(&sample_spiral_json(120), SpiralTemplate::new(5.0, 2.0), &path)
            .unwrap();
        let value: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["producer"]["instance_id"], "fixed");
        assert!(value["scoring"]["final_score"].is_number());
    }

    #[cfg(feature = "preview")]
    #[test]
    fn test_image_included_by_default() {
        let stats = PopulationStats::from_value(&reference_document(0.0, 1.0)).unwrap();
        let artifact = SpiralScorer::new()
            .score(&sample_spiral_json(100), SpiralTemplate::new(5.0, 2.0), &stats)
            .unwrap();
        assert!(artifact.report.spiral_image_svg_base64.is_some());
    }

    #[test]
    fn test_scorer_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SpiralScorer>();
    }
}
