//! Quickserve Simulation Engine - Deterministic queueing-network replicas.

#![warn(missing_docs)]
#![warn(clippy::missing_errors_doc)]
#![deny(clippy::missing_panics_doc)]
#![warn(clippy::too_many_lines)]
//!
//! This crate runs the discrete-event simulation of the restaurant
//! service network: customers arrive in a Poisson-like stream, pass the
//! mandatory cashier station, and then route through the optional
//! stations behind independent Bernoulli gates, queueing FIFO at each
//! finite pool of servers.
//!
//! # Features
//!
//! - **Deterministic Execution**: Same seed always produces identical results
//! - **Event-Based Simulation**: A min-heap of timestamped events with a
//!   reproducible tie-break
//! - **Replication**: Independent seeded replicas fanned out over a
//!   rayon worker pool
//! - **Metrics**: Per-replica system-time statistics and utilization,
//!   folded into cross-replica confidence intervals
//!
//! # Example
//!
//! ```rust,no_run
//! use quickserve_core::SimulationConfig;
//! use quickserve_sim::{ReplicationPlan, run_and_aggregate};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = SimulationConfig::example().resolve()?;
//! let plan = ReplicationPlan::new(200, 42);
//! let metrics = run_and_aggregate(&config, plan)?;
//! println!("W = {:.2} +/- {:.2} min", metrics.w_mean, metrics.w_ci_95);
//! # Ok(())
//! # }
//! ```

pub mod customer;
pub mod engine;
pub mod event;
pub mod metrics;
pub mod replication;

pub use customer::CustomerRecord;
pub use engine::{ReplicaConfig, ReplicaResult, StationCounters, run_replica};
pub use event::{EventKind, SimEvent, SimTime};
pub use metrics::{AggregateMetrics, ReplicaMetrics};
pub use replication::{FailurePolicy, ReplicationPlan, run_and_aggregate, run_replicas};
