//! One-parameter sensitivity sweeps around the base configuration.
//!
//! Each sweep clones the base settings, overrides a single parameter,
//! and re-runs the full replication, so every point is an independent
//! study of its own.

use anyhow::Context;
use quickserve_core::{DistributionSpec, SimulationConfig, Station};
use quickserve_sim::{AggregateMetrics, ReplicationPlan, run_and_aggregate};

/// One evaluated point of a sweep.
#[derive(Debug, Clone)]
pub struct SweepPoint {
    pub value: f64,
    pub metrics: AggregateMetrics,
}

/// A named parameter sweep with its evaluated points, in input order.
#[derive(Debug, Clone)]
pub struct Sweep {
    /// Parameter name, used as the CSV column header.
    pub parameter: &'static str,
    pub points: Vec<SweepPoint>,
}

fn sweep(
    parameter: &'static str,
    base: &SimulationConfig,
    values: &[f64],
    replicas: usize,
    apply: impl Fn(&mut SimulationConfig, f64),
) -> anyhow::Result<Sweep> {
    let mut points = Vec::with_capacity(values.len());
    for &value in values {
        let mut config = base.clone();
        apply(&mut config, value);
        let engine = config
            .resolve()
            .with_context(|| format!("resolving {parameter} = {value}"))?;
        let plan = ReplicationPlan::new(replicas, config.simulation.base_seed);
        let metrics = run_and_aggregate(&engine, plan)
            .with_context(|| format!("evaluating {parameter} = {value}"))?;
        tracing::info!(parameter, value, w_mean = metrics.w_mean, "sweep point");
        points.push(SweepPoint { value, metrics });
    }
    Ok(Sweep { parameter, points })
}

/// Sweeps the chicken-station visit probability.
pub fn chicken_probability_sweep(
    base: &SimulationConfig,
    values: &[f64],
    replicas: usize,
) -> anyhow::Result<Sweep> {
    sweep("chicken_probability", base, values, replicas, |config, v| {
        config
            .probabilities
            .insert(Station::Chicken.as_str().to_string(), v);
    })
}

/// Sweeps the mean inter-arrival gap.
pub fn arrival_sweep(
    base: &SimulationConfig,
    values: &[f64],
    replicas: usize,
) -> anyhow::Result<Sweep> {
    sweep("lambda", base, values, replicas, |config, v| {
        config.arrivals.lambda = v;
    })
}

/// Sweeps the cashier exponential service mean.
pub fn cashier_mean_sweep(
    base: &SimulationConfig,
    values: &[f64],
    replicas: usize,
) -> anyhow::Result<Sweep> {
    sweep("cashier_service_mean", base, values, replicas, |config, v| {
        config.service_times.insert(
            Station::Cashiers.as_str().to_string(),
            DistributionSpec::Exponential { mean: v },
        );
    })
}

/// The three study sweeps at their standard grids: chicken demand in
/// 0.05 steps up to 0.5, arrival gaps at 80%-120% of the configured
/// value, and the cashier mean from 1.5 to 3.5.
pub fn default_sweeps(base: &SimulationConfig, replicas: usize) -> anyhow::Result<Vec<Sweep>> {
    let chicken: Vec<f64> = (1..=10).map(|i| f64::from(i) * 0.05).collect();
    let lambda: Vec<f64> = [0.8, 0.9, 1.0, 1.1, 1.2]
        .iter()
        .map(|factor| factor * base.arrivals.lambda)
        .collect();
    Ok(vec![
        chicken_probability_sweep(base, &chicken, replicas)?,
        arrival_sweep(base, &lambda, replicas)?,
        cashier_mean_sweep(base, &[1.5, 2.0, 2.5, 3.0, 3.5], replicas)?,
    ])
}
