//! Replication coordinator: many independent replicas, one reduction.
//!
//! Replicas are embarrassingly parallel: each gets its own clock,
//! pools, and seeded random source, so they fan out over a rayon
//! worker pool and meet only at the final collect.

use quickserve_core::{EngineConfig, QuickserveError, Result};
use rayon::prelude::*;

use crate::engine::run_replica;
use crate::metrics::{AggregateMetrics, ReplicaMetrics};

/// What to do when a replica fails to construct.
///
/// The engine itself never retries; the batch either aborts on the
/// first failure or skips failed replicas with a warning. Which one is
/// the caller's choice, not a core invariant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Abort the whole batch on the first failed replica.
    #[default]
    Abort,
    /// Drop failed replicas and aggregate the survivors.
    Skip,
}

/// A replication request: how many replicas, from which seed, on how
/// many workers.
#[derive(Debug, Clone, Copy)]
pub struct ReplicationPlan {
    pub replicas: usize,
    /// Replica i runs with seed `base_seed + i`.
    pub base_seed: u64,
    /// Worker-pool bound; `None` uses the global rayon pool.
    pub workers: Option<usize>,
    pub failure_policy: FailurePolicy,
}

impl ReplicationPlan {
    pub fn new(replicas: usize, base_seed: u64) -> Self {
        Self {
            replicas,
            base_seed,
            workers: None,
            failure_policy: FailurePolicy::default(),
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = Some(workers);
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }
}

/// Runs `plan.replicas` independent replicas and returns their metrics
/// in seed order.
///
/// # Errors
/// - `QuickserveError::Config` / `QuickserveError::Input` - A replica
///   failed to construct and the policy is [`FailurePolicy::Abort`]
/// - `QuickserveError::Replication` - The bounded worker pool could
///   not be built
pub fn run_replicas(config: &EngineConfig, plan: ReplicationPlan) -> Result<Vec<ReplicaMetrics>> {
    match plan.workers {
        Some(workers) => {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(workers)
                .build()
                .map_err(|e| QuickserveError::Replication {
                    reason: e.to_string(),
                })?;
            pool.install(|| run_replicas_inner(config, plan))
        }
        None => run_replicas_inner(config, plan),
    }
}

fn run_replicas_inner(
    config: &EngineConfig,
    plan: ReplicationPlan,
) -> Result<Vec<ReplicaMetrics>> {
    let seeds = (0..plan.replicas).map(|i| plan.base_seed + i as u64);

    match plan.failure_policy {
        FailurePolicy::Abort => seeds
            .collect::<Vec<_>>()
            .into_par_iter()
            .map(|seed| Ok(ReplicaMetrics::from_result(&run_replica(config, seed)?)))
            .collect(),
        FailurePolicy::Skip => Ok(seeds
            .collect::<Vec<_>>()
            .into_par_iter()
            .filter_map(|seed| match run_replica(config, seed) {
                Ok(result) => Some(ReplicaMetrics::from_result(&result)),
                Err(error) => {
                    tracing::warn!(seed, %error, "skipping failed replica");
                    None
                }
            })
            .collect()),
    }
}

/// Runs a full replication and reduces it in one call.
///
/// # Errors
/// - Everything [`run_replicas`] can fail with
/// - `QuickserveError::Input` - Zero replicas survived, leaving the
///   confidence interval undefined
pub fn run_and_aggregate(
    config: &EngineConfig,
    plan: ReplicationPlan,
) -> Result<AggregateMetrics> {
    let metrics = run_replicas(config, plan)?;
    AggregateMetrics::aggregate(&metrics)
}

#[cfg(test)]
mod tests {
    use quickserve_core::{InputError, SimulationConfig};

    use super::*;

    #[test]
    fn replicas_are_independent_and_seed_ordered() {
        let config = SimulationConfig::example().resolve().unwrap();
        let plan = ReplicationPlan::new(4, 100);
        let parallel = run_replicas(&config, plan).unwrap();
        assert_eq!(parallel.len(), 4);

        // The parallel batch matches running each seed sequentially.
        for (i, metrics) in parallel.iter().enumerate() {
            let single = run_replica(&config, 100 + i as u64).unwrap();
            assert_eq!(*metrics, ReplicaMetrics::from_result(&single));
        }
    }

    #[test]
    fn repeated_batches_are_deterministic() {
        let config = SimulationConfig::example().resolve().unwrap();
        let plan = ReplicationPlan::new(3, 7).with_workers(2);
        let first = run_replicas(&config, plan).unwrap();
        let second = run_replicas(&config, plan).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn aggregation_of_batch_matches_manual_fold() {
        let config = SimulationConfig::example().resolve().unwrap();
        let plan = ReplicationPlan::new(5, 42);
        let metrics = run_replicas(&config, plan).unwrap();
        let direct = AggregateMetrics::aggregate(&metrics).unwrap();
        let combined = run_and_aggregate(&config, plan).unwrap();
        assert_eq!(direct, combined);
        assert_eq!(combined.num_replicas, 5);
    }

    #[test]
    fn zero_replicas_fail_aggregation() {
        let config = SimulationConfig::example().resolve().unwrap();
        let err = run_and_aggregate(&config, ReplicationPlan::new(0, 1)).unwrap_err();
        assert!(matches!(
            err,
            QuickserveError::Input(InputError::NoReplicas)
        ));
    }
}
