//! Per-replica and cross-replica statistics.
//!
//! `ReplicaMetrics` is a pure function of a `ReplicaResult`;
//! `AggregateMetrics` is a deterministic fold over replica metrics.
//! A replica with zero customers reports all-zero metrics by policy,
//! never an error.

use quickserve_core::{InputError, Result, StationMap};
use serde::Serialize;

use crate::engine::ReplicaResult;

/// Half-width multiplier for a 95% normal-approximation interval.
const Z_95: f64 = 1.96;

/// Scalar statistics for one replica.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReplicaMetrics {
    /// Mean time in system (W).
    pub w_mean: f64,
    /// Sample variance of W (ddof = 1; 0 when fewer than two customers).
    pub w_variance: f64,
    pub w_median: f64,
    pub w_std: f64,
    pub w_min: f64,
    pub w_max: f64,
    pub num_customers: usize,
    /// Busy-server-time over capacity x horizon, per station.
    pub utilization: StationMap<f64>,
    /// Mean cumulative wait per visit, per station.
    pub avg_wait_time: StationMap<f64>,
    pub station_visits: StationMap<u64>,
}

impl ReplicaMetrics {
    /// Reduces one replica's raw records into scalar statistics.
    pub fn from_result(result: &ReplicaResult) -> Self {
        let station_visits = StationMap::from_fn(|s| result.stations[s].visits);

        if result.customers.is_empty() {
            return Self {
                w_mean: 0.0,
                w_variance: 0.0,
                w_median: 0.0,
                w_std: 0.0,
                w_min: 0.0,
                w_max: 0.0,
                num_customers: 0,
                utilization: StationMap::filled(0.0),
                avg_wait_time: StationMap::filled(0.0),
                station_visits,
            };
        }

        let times: Vec<f64> = result
            .customers
            .iter()
            .map(|c| c.time_in_system)
            .collect();
        let w_variance = sample_variance(&times);
        let horizon = result.config.horizon;

        Self {
            w_mean: mean(&times),
            w_variance,
            w_median: median(&times),
            w_std: w_variance.sqrt(),
            w_min: times.iter().copied().fold(f64::INFINITY, f64::min),
            w_max: times.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            num_customers: times.len(),
            utilization: StationMap::from_fn(|s| {
                let counters = &result.stations[s];
                let available = f64::from(counters.capacity) * horizon;
                if counters.visits > 0 && available > 0.0 {
                    counters.total_service_time / available
                } else {
                    0.0
                }
            }),
            avg_wait_time: StationMap::from_fn(|s| {
                let counters = &result.stations[s];
                if counters.visits > 0 {
                    counters.total_wait_time / counters.visits as f64
                } else {
                    0.0
                }
            }),
            station_visits,
        }
    }
}

/// Cross-replica estimates with a 95% confidence half-width.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateMetrics {
    /// Mean of the per-replica mean system times.
    pub w_mean: f64,
    /// Sample standard deviation of the per-replica means (0 when n = 1).
    pub w_std: f64,
    /// Normal-approximation half-width: 1.96 * w_std / sqrt(n).
    pub w_ci_95: f64,
    /// Mean of the per-replica variances.
    pub w_variance: f64,
    /// Mean utilization per station.
    pub utilization: StationMap<f64>,
    pub num_replicas: usize,
}

impl AggregateMetrics {
    /// Folds per-replica metrics into cross-replica estimates.
    ///
    /// # Errors
    /// - `QuickserveError::Input` - The metrics list is empty, leaving
    ///   the confidence interval undefined
    pub fn aggregate(metrics: &[ReplicaMetrics]) -> Result<Self> {
        if metrics.is_empty() {
            return Err(InputError::NoReplicas.into());
        }

        let n = metrics.len();
        let w_means: Vec<f64> = metrics.iter().map(|m| m.w_mean).collect();
        let w_std = sample_variance(&w_means).sqrt();

        Ok(Self {
            w_mean: mean(&w_means),
            w_std,
            w_ci_95: Z_95 * w_std / (n as f64).sqrt(),
            w_variance: metrics.iter().map(|m| m.w_variance).sum::<f64>() / n as f64,
            utilization: StationMap::from_fn(|s| {
                metrics.iter().map(|m| m.utilization[s]).sum::<f64>() / n as f64
            }),
            num_replicas: n,
        })
    }
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample variance with ddof = 1; 0 for fewer than two values.
fn sample_variance(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64
}

/// Median of the values; mean of the two middle values for even n.
fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        sorted[mid]
    } else {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    }
}
