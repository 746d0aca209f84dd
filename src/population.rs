//! Population reference statistics
//!
//! The reference table maps each metric to the mean and standard deviation
//! observed in a healthy population. Files use descriptive statistic names
//! (`"Population mean of log dr_dt"`, ...) and may wrap them under a
//! `"statistics"` key.
//!
//! Loaded tables are cached process-wide, keyed by the path they were read
//! from. Each path is loaded at most once: concurrent first calls for the same
//! path block on a per-path cell while one of them reads the file, and every
//! later call gets the same immutable table. A failed load drops its empty
//! cell so the next call retries.

use crate::error::ScoringError;
use crate::extractor::value_as_f64;
use crate::types::{null_as_nan, Metric, NullValue, PerMetric};
use once_cell::sync::{Lazy, OnceCell};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};

/// Mean and standard deviation for one metric
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PopulationEntry {
    #[serde(deserialize_with = "null_as_nan")]
    pub mean: f64,
    #[serde(deserialize_with = "null_as_nan")]
    pub std: f64,
}

impl NullValue for PopulationEntry {
    fn null_value() -> Self {
        Self {
            mean: f64::NAN,
            std: f64::NAN,
        }
    }
}

/// Immutable population reference table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PopulationStats {
    entries: PerMetric<PopulationEntry>,
}

type CacheSlot = Arc<OnceCell<Arc<PopulationStats>>>;

static POPULATION_CACHE: Lazy<Mutex<HashMap<PathBuf, CacheSlot>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

impl PopulationStats {
    pub fn new(entries: PerMetric<PopulationEntry>) -> Self {
        Self { entries }
    }

    pub fn entry(&self, metric: Metric) -> PopulationEntry {
        *self.entries.get(metric)
    }

    pub fn entries(&self) -> &PerMetric<PopulationEntry> {
        &self.entries
    }

    /// Key under which a metric's mean is stored
    pub fn mean_key(metric: Metric) -> String {
        format!("Population mean of {}", metric.population_label())
    }

    /// Key under which a metric's standard deviation is stored
    pub fn std_key(metric: Metric) -> String {
        format!("Population stdev of {}", metric.population_label())
    }

    /// Build a table from a parsed reference document
    pub fn from_value(document: &Value) -> Result<Self, ScoringError> {
        let table = document.get("statistics").unwrap_or(document);

        let entries = PerMetric::try_from_fn::<ScoringError>(|metric| {
            Ok(PopulationEntry {
                mean: read_statistic(table, &Self::mean_key(metric))?,
                std: read_statistic(table, &Self::std_key(metric))?,
            })
        })?;

        Ok(Self { entries })
    }

    /// Parse a reference document from JSON text
    pub fn from_json(json: &str) -> Result<Self, ScoringError> {
        let document: Value = serde_json::from_str(json)?;
        Self::from_value(&document)
    }

    /// Read a reference file from disk, bypassing the cache
    pub fn load(path: &Path) -> Result<Self, ScoringError> {
        if !path.exists() {
            return Err(ScoringError::PopulationStatsNotFound {
                path: path.to_path_buf(),
            });
        }
        let content = std::fs::read_to_string(path).map_err(|source| {
            ScoringError::PopulationStatsUnreadable {
                path: path.to_path_buf(),
                source,
            }
        })?;
        let stats = Self::from_json(&content)?;
        info!(path = %path.display(), "loaded population statistics");
        Ok(stats)
    }

    /// Load through the process-wide cache
    pub fn load_cached(path: &Path) -> Result<Arc<Self>, ScoringError> {
        let slot = Arc::clone(lock_cache().entry(path.to_path_buf()).or_default());

        if let Some(stats) = slot.get() {
            debug!(path = %path.display(), "population statistics cache hit");
            return Ok(Arc::clone(stats));
        }

        let loaded = slot
            .get_or_try_init(|| Self::load(path).map(Arc::new))
            .map(Arc::clone);
        if loaded.is_err() {
            evict_empty_slot(path, &slot);
        }
        loaded
    }

    /// Metrics whose standard deviation will neutralize their z-score
    pub fn degenerate_metrics(&self) -> Vec<Metric> {
        Metric::ALL
            .into_iter()
            .filter(|m| {
                let entry = self.entry(*m);
                !entry.mean.is_finite() || !entry.std.is_finite() || entry.std == 0.0
            })
            .collect()
    }
}

fn lock_cache() -> MutexGuard<'static, HashMap<PathBuf, CacheSlot>> {
    POPULATION_CACHE
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Drop a slot left empty by a failed load, unless another caller has
/// replaced or filled it in the meantime
fn evict_empty_slot(path: &Path, slot: &CacheSlot) {
    let mut cache = lock_cache();
    let stale = cache
        .get(path)
        .is_some_and(|current| Arc::ptr_eq(current, slot) && current.get().is_none());
    if stale {
        cache.remove(path);
    }
}

/// Numbers (or numeric strings) load as-is, `null` loads as `NaN`
fn read_statistic(table: &Value, key: &str) -> Result<f64, ScoringError> {
    let incomplete = || ScoringError::PopulationStatsIncomplete {
        key: key.to_string(),
    };
    match table.get(key) {
        None => Err(incomplete()),
        Some(Value::Null) => Ok(f64::NAN),
        Some(value) => value_as_f64(value).ok_or_else(incomplete),
    }
}
