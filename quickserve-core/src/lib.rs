//! Quickserve Core - Configuration and sampling primitives
//!
//! This crate provides the building blocks shared by the simulation
//! engine and the CLI: the fixed station model, service-time
//! distribution specifications with reproducible samplers, and the
//! settings document that drives a simulation study.

pub mod config;
pub mod distribution;
pub mod station;

// Re-export main types for convenient access
pub use config::{ConstraintSection, EngineConfig, SimulationConfig, ValidationSection};
pub use distribution::{DistributionError, DistributionSpec, Sampler};
pub use station::{Station, StationMap};

/// Configuration errors detected while parsing or resolving the
/// settings document. All of these abort replica construction before
/// any event runs.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("unknown station `{name}` in section `{section}`")]
    UnknownStation { name: String, section: &'static str },

    #[error("station `{station}` is referenced but has no capacity entry in `resources`")]
    MissingCapacity { station: Station },

    #[error("no service time distribution configured for station `{station}`")]
    MissingServiceTime { station: Station },

    #[error("visit probability {value} for station `{station}` is outside [0, 1]")]
    ProbabilityOutOfRange { station: Station, value: f64 },

    #[error("invalid service distribution for station `{station}`: {source}")]
    Distribution {
        station: Station,
        source: DistributionError,
    },

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),
}

/// Malformed caller input surfaced immediately, never retried.
#[derive(Debug, thiserror::Error)]
pub enum InputError {
    #[error("cannot aggregate zero replicas: confidence interval is undefined")]
    NoReplicas,

    #[error("station `{station}` has capacity {capacity}; at least one server is required")]
    InvalidCapacity { station: Station, capacity: u32 },

    #[error("simulation horizon {horizon} is not a finite, non-negative time")]
    InvalidHorizon { horizon: f64 },
}

/// Errors that can bubble up from any Quickserve subsystem.
#[derive(Debug, thiserror::Error)]
pub enum QuickserveError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("input error: {0}")]
    Input(#[from] InputError),

    #[error("replication error: {reason}")]
    Replication { reason: String },
}

pub type Result<T> = std::result::Result<T, QuickserveError>;
