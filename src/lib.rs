//! Spiral Tremor - deterministic tremor-severity scoring for spiral drawings
//!
//! A freehand spiral trial is turned into a single weighted score through a
//! linear pipeline: trace extraction → polar unwrapping (with template refit)
//! → Savitzky–Golay derivatives → metric computation → population
//! normalization → report assembly.
//!
//! ```ignore
//! use spiral_tremor::{score_spiral_json, SpiralTemplate};
//!
//! let artifact = score_spiral_json(&trial, SpiralTemplate::new(0.0, 1.2), path, false)?;
//! println!("{}", artifact.final_score());
//! ```

pub mod config;
pub mod derivatives;
pub mod encoder;
pub mod error;
pub mod extractor;
pub mod features;
pub mod normalizer;
pub mod pipeline;
pub mod polar;
pub mod population;
pub mod preview;
pub mod smoothing;
pub mod types;

pub use config::{PreviewConfig, RefitPolicy, ScoringConfig};
pub use error::ScoringError;
pub use pipeline::{score_spiral_json, SpiralScorer};
pub use population::PopulationStats;
pub use types::{Metric, MetricSet, ScoringArtifact, SpiralTemplate};

/// Crate version embedded in every artifact's producer block
pub const SCORER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for scoring artifacts
pub const PRODUCER_NAME: &str = "spiral-tremor";

/// Artifact format version
pub const SCORING_VERSION: &str = "spiral_scoring_v1";
