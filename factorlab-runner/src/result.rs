//! Serializable simulation result.

use crate::metrics::RunSummary;
use chrono::NaiveDate;
use factorlab_core::domain::{Action, Order};
use factorlab_core::engine::EquityPoint;
use serde::{Deserialize, Serialize};

/// Current schema version for persisted artifacts.
pub const SCHEMA_VERSION: u32 = 1;

/// One point of the benchmark-relative curve: the benchmark's value had
/// the initial capital been held in it instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkPoint {
    pub date: NaiveDate,
    pub value: f64,
}

/// Complete result of one simulation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationResult {
    /// Schema version for forward-compatible deserialization.
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    /// blake3 of the serialized config this run executed.
    pub config_hash: String,
    pub orders: Vec<Order>,
    pub actions: Vec<Action>,
    pub equity_curve: Vec<EquityPoint>,
    pub benchmark_curve: Vec<BenchmarkPoint>,
    pub summary: RunSummary,
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}
