//! Report assembly
//!
//! This module packages the outputs of every stage into a self-contained
//! [`ScoringArtifact`] and stamps it with producer metadata.

use crate::error::ScoringError;
use crate::types::{
    Contributor, DebugInfo, Derivatives, MetricSet, ProcessedTrace, Producer, Report,
    ScoringArtifact, ScoringDetail,
};
use crate::{PRODUCER_NAME, SCORER_VERSION, SCORING_VERSION};
use chrono::Utc;
use uuid::Uuid;

/// Number of ranked contributors surfaced in the report
pub const TOP_CONTRIBUTORS: usize = 3;

/// Assembler producing scoring artifacts
#[derive(Debug, Clone)]
pub struct ReportAssembler {
    instance_id: String,
}

impl Default for ReportAssembler {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportAssembler {
    /// Create a new assembler with a unique instance ID
    pub fn new() -> Self {
        Self {
            instance_id: Uuid::new_v4().to_string(),
        }
    }

    /// Create an assembler with a specific instance ID
    pub fn with_instance_id(instance_id: String) -> Self {
        Self { instance_id }
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    /// Build the artifact from stage outputs
    pub fn assemble(
        &self,
        trace: &ProcessedTrace,
        derivatives: &Derivatives,
        metrics: MetricSet,
        scoring: ScoringDetail,
        image: Option<String>,
    ) -> ScoringArtifact {
        let template = trace.template();
        let debug = DebugInfo {
            a: template.a,
            b: template.b,
            dt_ms: derivatives.dt_ms,
            n_points: trace.len(),
            sg_window_main: derivatives.window_main,
            sg_window_jerk: derivatives.window_jerk,
            template_origin: trace.fitted.origin,
            refit_samples: trace.fitted.valid_samples,
            duplicates_removed: trace.duplicates_removed,
            center_x: trace.center_x,
            center_y: trace.center_y,
        };

        let top_contributors = scoring
            .weighted_contributions_sorted
            .iter()
            .take(TOP_CONTRIBUTORS)
            .map(|(name, contribution)| Contributor {
                name: name.clone(),
                contribution: *contribution,
            })
            .collect();

        ScoringArtifact {
            metrics,
            debug,
            scoring,
            report: Report {
                spiral_image_svg_base64: image,
                top_contributors,
            },
            generated_at: Utc::now().to_rfc3339(),
            version: SCORING_VERSION.to_string(),
            producer: Producer {
                name: PRODUCER_NAME.to_string(),
                version: SCORER_VERSION.to_string(),
                instance_id: self.instance_id.clone(),
            },
        }
    }

    /// Assemble and serialize to pretty JSON
    pub fn assemble_to_json(
        &self,
        trace: &ProcessedTrace,
        derivatives: &Derivatives,
        metrics: MetricSet,
        scoring: ScoringDetail,
        image: Option<String>,
    ) -> Result<String, ScoringError> {
        let artifact = self.assemble(trace, derivatives, metrics, scoring, image);
        serde_json::to_string_pretty(&artifact).map_err(ScoringError::JsonError)
    }
}
