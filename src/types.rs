//! Core types for the spiral scoring pipeline
//!
//! This module defines the data structures that flow through each stage of the
//! pipeline: raw and clean traces, the polar (processed) trace, derivative
//! products, metrics, scoring detail and the final artifact.

use serde::{Deserialize, Deserializer, Serialize};

/// Stand-in for a value written as `null`.
///
/// Non-finite floats serialize as `null` in JSON, so reading an artifact back
/// maps `null` to this value.
pub trait NullValue {
    fn null_value() -> Self;
}

impl NullValue for f64 {
    fn null_value() -> Self {
        f64::NAN
    }
}

pub(crate) fn null_as_nan<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + NullValue,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_else(T::null_value))
}

/// A single captured pen-position sample (`t` in milliseconds)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawPoint {
    pub x: f64,
    pub y: f64,
    pub t: f64,
}

impl RawPoint {
    pub fn new(x: f64, y: f64, t: f64) -> Self {
        Self { x, y, t }
    }
}

/// Time-ordered trace with consecutive duplicate samples removed.
///
/// Only the extractor builds these, so every `CleanTrace` holds at least
/// [`crate::extractor::MIN_SAMPLES`] points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleanTrace {
    points: Vec<RawPoint>,
    raw_count: usize,
}

impl CleanTrace {
    pub(crate) fn new(points: Vec<RawPoint>, raw_count: usize) -> Self {
        Self { points, raw_count }
    }

    pub fn points(&self) -> &[RawPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Number of point records read before deduplication
    pub fn raw_count(&self) -> usize {
        self.raw_count
    }

    /// Number of consecutive duplicates that were collapsed
    pub fn duplicates_removed(&self) -> usize {
        self.raw_count - self.points.len()
    }

    /// Elapsed time between the first and last sample (ms)
    pub fn duration_ms(&self) -> f64 {
        match (self.points.first(), self.points.last()) {
            (Some(first), Some(last)) => last.t - first.t,
            _ => 0.0,
        }
    }
}

/// Reference polar spiral `r = a + b·θ`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpiralTemplate {
    pub a: f64,
    pub b: f64,
}

impl SpiralTemplate {
    pub fn new(a: f64, b: f64) -> Self {
        Self { a, b }
    }

    /// Expected radius at unwrapped angle `theta`
    pub fn radius_at(&self, theta: f64) -> f64 {
        self.a + self.b * theta
    }
}

/// Where the template used for scoring came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateOrigin {
    /// Caller-supplied parameters were kept
    Supplied,
    /// Parameters were re-estimated from the centered trace
    Refit,
}

/// Template chosen by the unwrapper, with provenance
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FittedTemplate {
    pub template: SpiralTemplate,
    pub origin: TemplateOrigin,
    /// Samples that qualified for the regression (theta > 0, finite)
    pub valid_samples: usize,
}

/// One centered sample in polar form
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProcessedSample {
    pub x: f64,
    pub y: f64,
    pub t: f64,
    pub r: f64,
    pub theta: f64,
    pub relative_r: f64,
}

/// Centered, unwrapped trace relative to a spiral template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedTrace {
    pub fitted: FittedTemplate,
    /// Centroid subtracted from the raw coordinates
    pub center_x: f64,
    pub center_y: f64,
    pub samples: Vec<ProcessedSample>,
    /// Consecutive duplicates dropped before processing
    pub duplicates_removed: usize,
}

impl ProcessedTrace {
    pub fn template(&self) -> SpiralTemplate {
        self.fitted.template
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn xs(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.x).collect()
    }

    pub fn ys(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.y).collect()
    }

    pub fn ts(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.t).collect()
    }

    pub fn radii(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.r).collect()
    }

    pub fn thetas(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.theta).collect()
    }

    pub fn duration_ms(&self) -> f64 {
        match (self.samples.first(), self.samples.last()) {
            (Some(first), Some(last)) => last.t - first.t,
            _ => 0.0,
        }
    }
}

/// Smoothed derivative products of a processed trace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Derivatives {
    /// Mean sample interval (ms)
    pub dt_ms: f64,
    /// Window used for first derivatives and the smoothed radius
    pub window_main: usize,
    /// Window used for the third derivative
    pub window_jerk: usize,
    pub dr_dt: Vec<f64>,
    pub dtheta_dt: Vec<f64>,
    pub d3r_dt3: Vec<f64>,
    /// Order-3 polynomial-smoothed radius
    pub r_smoothed: Vec<f64>,
    /// Moving-average smoothed `dr_dt`
    pub dr_dt_baseline: Vec<f64>,
}

/// The six scored motor-control metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    LogDrDthetaMean,
    LogDrDtMean,
    AucRatio,
    GeomPower,
    TempPower,
    JerkProxy,
}

impl Metric {
    /// All metrics in scoring order
    pub const ALL: [Metric; 6] = [
        Metric::LogDrDthetaMean,
        Metric::LogDrDtMean,
        Metric::AucRatio,
        Metric::GeomPower,
        Metric::TempPower,
        Metric::JerkProxy,
    ];

    /// Short code used in scoring tables
    pub fn code(&self) -> &'static str {
        match self {
            Metric::LogDrDthetaMean => "log_dr_dtheta_mean",
            Metric::LogDrDtMean => "log_dr_dt_mean",
            Metric::AucRatio => "auc_ratio",
            Metric::GeomPower => "geom_power",
            Metric::TempPower => "temp_power",
            Metric::JerkProxy => "jerk_proxy",
        }
    }

    /// Descriptive name used in the metrics table
    pub fn display_name(&self) -> &'static str {
        match self {
            Metric::LogDrDthetaMean => "Mean of log dr_dtheta",
            Metric::LogDrDtMean => "Mean of log dr_dt",
            Metric::AucRatio => "AUC ratio (drawn/fit)",
            Metric::GeomPower => "Geometric power",
            Metric::TempPower => "Temporal power",
            Metric::JerkProxy => "Jerk proxy",
        }
    }

    /// Statistic label used in population reference files
    pub fn population_label(&self) -> &'static str {
        match self {
            Metric::LogDrDthetaMean => "log dr_dtheta",
            Metric::LogDrDtMean => "log dr_dt",
            Metric::AucRatio => "drawn AUC to fit AUC",
            Metric::GeomPower => "geometric power",
            Metric::TempPower => "temporal power",
            Metric::JerkProxy => "log dimensionless jerk",
        }
    }
}

/// One value per metric, serialized under the metric codes in scoring order
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de> + NullValue"))]
pub struct PerMetric<T> {
    #[serde(deserialize_with = "null_as_nan")]
    pub log_dr_dtheta_mean: T,
    #[serde(deserialize_with = "null_as_nan")]
    pub log_dr_dt_mean: T,
    #[serde(deserialize_with = "null_as_nan")]
    pub auc_ratio: T,
    #[serde(deserialize_with = "null_as_nan")]
    pub geom_power: T,
    #[serde(deserialize_with = "null_as_nan")]
    pub temp_power: T,
    #[serde(deserialize_with = "null_as_nan")]
    pub jerk_proxy: T,
}

impl<T> PerMetric<T> {
    /// Build a table by evaluating `f` for each metric in scoring order
    pub fn from_fn(mut f: impl FnMut(Metric) -> T) -> Self {
        Self {
            log_dr_dtheta_mean: f(Metric::LogDrDthetaMean),
            log_dr_dt_mean: f(Metric::LogDrDtMean),
            auc_ratio: f(Metric::AucRatio),
            geom_power: f(Metric::GeomPower),
            temp_power: f(Metric::TempPower),
            jerk_proxy: f(Metric::JerkProxy),
        }
    }

    /// Fallible variant of [`PerMetric::from_fn`]; stops at the first error
    pub fn try_from_fn<E>(mut f: impl FnMut(Metric) -> Result<T, E>) -> Result<Self, E> {
        Ok(Self {
            log_dr_dtheta_mean: f(Metric::LogDrDthetaMean)?,
            log_dr_dt_mean: f(Metric::LogDrDtMean)?,
            auc_ratio: f(Metric::AucRatio)?,
            geom_power: f(Metric::GeomPower)?,
            temp_power: f(Metric::TempPower)?,
            jerk_proxy: f(Metric::JerkProxy)?,
        })
    }

    pub fn get(&self, metric: Metric) -> &T {
        match metric {
            Metric::LogDrDthetaMean => &self.log_dr_dtheta_mean,
            Metric::LogDrDtMean => &self.log_dr_dt_mean,
            Metric::AucRatio => &self.auc_ratio,
            Metric::GeomPower => &self.geom_power,
            Metric::TempPower => &self.temp_power,
            Metric::JerkProxy => &self.jerk_proxy,
        }
    }

    /// Iterate in scoring order
    pub fn iter(&self) -> impl Iterator<Item = (Metric, &T)> + '_ {
        Metric::ALL.into_iter().map(move |m| (m, self.get(m)))
    }
}

/// Scalar metrics computed from one trial
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricSet {
    #[serde(rename = "Mean of log dr_dtheta", deserialize_with = "null_as_nan")]
    pub log_dr_dtheta_mean: f64,
    #[serde(rename = "Mean of log dr_dt", deserialize_with = "null_as_nan")]
    pub log_dr_dt_mean: f64,
    #[serde(rename = "AUC ratio (drawn/fit)", deserialize_with = "null_as_nan")]
    pub auc_ratio: f64,
    #[serde(rename = "Geometric power", deserialize_with = "null_as_nan")]
    pub geom_power: f64,
    #[serde(rename = "Temporal power", deserialize_with = "null_as_nan")]
    pub temp_power: f64,
    #[serde(rename = "Jerk proxy", deserialize_with = "null_as_nan")]
    pub jerk_proxy: f64,
    #[serde(rename = "Total time (ms)", deserialize_with = "null_as_nan")]
    pub total_time_ms: f64,
}

impl MetricSet {
    pub fn value(&self, metric: Metric) -> f64 {
        match metric {
            Metric::LogDrDthetaMean => self.log_dr_dtheta_mean,
            Metric::LogDrDtMean => self.log_dr_dt_mean,
            Metric::AucRatio => self.auc_ratio,
            Metric::GeomPower => self.geom_power,
            Metric::TempPower => self.temp_power,
            Metric::JerkProxy => self.jerk_proxy,
        }
    }

    /// Metrics that could not be computed for this trial
    pub fn undefined(&self) -> Vec<Metric> {
        Metric::ALL
            .into_iter()
            .filter(|m| !self.value(*m).is_finite())
            .collect()
    }
}

/// Fit and sampling diagnostics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebugInfo {
    #[serde(deserialize_with = "null_as_nan")]
    pub a: f64,
    #[serde(deserialize_with = "null_as_nan")]
    pub b: f64,
    #[serde(deserialize_with = "null_as_nan")]
    pub dt_ms: f64,
    pub n_points: usize,
    pub sg_window_main: usize,
    pub sg_window_jerk: usize,
    pub template_origin: TemplateOrigin,
    pub refit_samples: usize,
    pub duplicates_removed: usize,
    #[serde(deserialize_with = "null_as_nan")]
    pub center_x: f64,
    #[serde(deserialize_with = "null_as_nan")]
    pub center_y: f64,
}

/// Population reference used for one metric, alongside the raw value
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricReference {
    #[serde(deserialize_with = "null_as_nan")]
    pub mean: f64,
    #[serde(deserialize_with = "null_as_nan")]
    pub std: f64,
    #[serde(deserialize_with = "null_as_nan")]
    pub raw: f64,
}

impl NullValue for MetricReference {
    fn null_value() -> Self {
        Self {
            mean: f64::NAN,
            std: f64::NAN,
            raw: f64::NAN,
        }
    }
}

/// Full scoring breakdown
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringDetail {
    pub population_reference: PerMetric<MetricReference>,
    pub z_scores: PerMetric<f64>,
    pub weights: PerMetric<f64>,
    pub weighted_contributions: PerMetric<f64>,
    /// `(code, contribution)` by descending absolute contribution
    pub weighted_contributions_sorted: Vec<(String, f64)>,
    #[serde(deserialize_with = "null_as_nan")]
    pub final_score: f64,
}

/// A ranked contributor shown in the report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contributor {
    pub name: String,
    #[serde(deserialize_with = "null_as_nan")]
    pub contribution: f64,
}

/// Presentation section of the artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    /// Base64-encoded SVG preview of the centered trace
    pub spiral_image_svg_base64: Option<String>,
    pub top_contributors: Vec<Contributor>,
}

/// Producer metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Producer {
    pub name: String,
    pub version: String,
    pub instance_id: String,
}

/// Complete, self-contained scoring output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringArtifact {
    pub metrics: MetricSet,
    pub debug: DebugInfo,
    pub scoring: ScoringDetail,
    pub report: Report,
    pub generated_at: String,
    pub version: String,
    pub producer: Producer,
}

impl ScoringArtifact {
    pub fn final_score(&self) -> f64 {
        self.scoring.final_score
    }
}
