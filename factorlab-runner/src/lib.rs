//! FactorLab Runner — simulation orchestration, metrics, and artifacts.

pub mod config;
pub mod export;
pub mod master;
pub mod metrics;
pub mod result;

pub use config::{ConfigError, SimulationConfig, UniverseFile};
pub use export::write_artifacts;
pub use master::{RunError, SimulationMaster};
pub use metrics::RunSummary;
pub use result::{BenchmarkPoint, SimulationResult, SCHEMA_VERSION};
