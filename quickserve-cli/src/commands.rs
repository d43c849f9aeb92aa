//! CLI command implementations

use std::path::Path;

use anyhow::Context;
use clap::{Subcommand, ValueEnum};
use quickserve_core::{SimulationConfig, Station};
use quickserve_sim::{ReplicaMetrics, ReplicationPlan, run_and_aggregate, run_replica};

use crate::report;
use crate::search::{self, Scenario};
use crate::sensitivity;
use crate::validate;

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Check the configured service distributions against their
    /// theoretical families
    Validate,
    /// Run one replica (or a full replication) of the base configuration
    Replica {
        /// Seed override for a single replica
        #[arg(short, long)]
        seed: Option<u64>,
        /// Run this many replicas and report the aggregate instead
        #[arg(short, long)]
        replicas: Option<usize>,
    },
    /// Grid-search server allocations for one scenario or all of them
    Optimize {
        /// Scenario to run
        #[arg(short, long, default_value = "all")]
        scenario: ScenarioArg,
        /// Replicas per candidate (defaults to the configured count)
        #[arg(short, long)]
        replicas: Option<usize>,
    },
    /// Run the one-parameter sensitivity sweeps
    Sensitivity {
        /// Replicas per sweep point (defaults to the configured count)
        #[arg(short, long)]
        replicas: Option<usize>,
    },
}

/// Scenario selector for the optimize command.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ScenarioArg {
    A,
    B,
    C,
    D,
    E,
    All,
}

impl ScenarioArg {
    fn scenarios(self) -> Vec<Scenario> {
        match self {
            ScenarioArg::A => vec![Scenario::A],
            ScenarioArg::B => vec![Scenario::B],
            ScenarioArg::C => vec![Scenario::C],
            ScenarioArg::D => vec![Scenario::D],
            ScenarioArg::E => vec![Scenario::E],
            ScenarioArg::All => Scenario::ALL.to_vec(),
        }
    }
}

/// Handle the CLI command
///
/// # Errors
/// Returns appropriate error based on the command that fails
pub fn handle_command(config_path: &Path, output: &Path, command: Commands) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    match command {
        Commands::Validate => run_validation(&config, output),
        Commands::Replica { seed, replicas } => run_replication(&config, output, seed, replicas),
        Commands::Optimize { scenario, replicas } => {
            run_optimization(&config, output, scenario, replicas)
        }
        Commands::Sensitivity { replicas } => run_sensitivity(&config, output, replicas),
    }
}

/// Reads the settings document, falling back to the baseline study
/// configuration when the file is absent.
fn load_config(path: &Path) -> anyhow::Result<SimulationConfig> {
    if path.exists() {
        SimulationConfig::load(path)
            .with_context(|| format!("loading configuration from {}", path.display()))
            .map_err(Into::into)
    } else {
        tracing::warn!(
            path = %path.display(),
            "configuration file not found, using the baseline study configuration"
        );
        Ok(SimulationConfig::example())
    }
}

fn run_validation(config: &SimulationConfig, output: &Path) -> anyhow::Result<()> {
    println!("Distribution Validation");
    println!("{:-<72}", "");

    let results = validate::validate_all(config, config.simulation.base_seed)?;
    println!(
        "{:<10} {:<20} {:>8} {:>8} {:>10} {:>10} {:>7}",
        "station", "test", "mean", "std", "statistic", "critical", "verdict"
    );
    for result in &results {
        println!(
            "{:<10} {:<20} {:>8.3} {:>8.3} {:>10.4} {:>10.4} {:>7}",
            result.station.to_string(),
            result.test.name(),
            result.mean,
            result.std,
            result.statistic,
            result.critical,
            if result.passed { "pass" } else { "FAIL" }
        );
    }

    let summary_path = output.join("validation").join("summary.csv");
    report::write_validation_summary_csv(&summary_path, &results)?;
    for result in &results {
        let sample_path = output
            .join("validation")
            .join(format!("samples_{}.csv", result.station));
        report::write_sample_csv(&sample_path, result)?;
    }

    println!();
    println!("Reports written to {}", output.join("validation").display());
    Ok(())
}

fn run_replication(
    config: &SimulationConfig,
    output: &Path,
    seed: Option<u64>,
    replicas: Option<usize>,
) -> anyhow::Result<()> {
    let engine = config.resolve().context("resolving configuration")?;
    let replicas = replicas.unwrap_or(1);

    if replicas > 1 {
        println!("Replication: {replicas} replicas");
        println!("{:-<72}", "");

        let plan = ReplicationPlan::new(replicas, config.simulation.base_seed);
        let aggregate = run_and_aggregate(&engine, plan)?;
        println!(
            "W = {:.3} min  (95% CI half-width {:.3}, std {:.3}, n = {})",
            aggregate.w_mean, aggregate.w_ci_95, aggregate.w_std, aggregate.num_replicas
        );
        for station in Station::ALL {
            println!(
                "  {:<10} utilization {:.3}",
                station.as_str(),
                aggregate.utilization[station]
            );
        }
        return Ok(());
    }

    let seed = seed
        .or(config.simulation.random_seed)
        .unwrap_or(config.simulation.base_seed);
    println!("Single replica, seed {seed}");
    println!("{:-<72}", "");

    let result = run_replica(&engine, seed)?;
    let metrics = ReplicaMetrics::from_result(&result);
    println!("Customers served: {}", metrics.num_customers);
    println!(
        "W: mean {:.3}  median {:.3}  std {:.3}  min {:.3}  max {:.3}",
        metrics.w_mean, metrics.w_median, metrics.w_std, metrics.w_min, metrics.w_max
    );
    for station in Station::ALL {
        println!(
            "  {:<10} visits {:>5}  utilization {:.3}  avg wait {:.3}",
            station.as_str(),
            metrics.station_visits[station],
            metrics.utilization[station],
            metrics.avg_wait_time[station]
        );
    }

    let path = output.join(format!("replica_seed{seed}.csv"));
    report::write_replica_csv(&path, &result)?;
    println!();
    println!("Customer report written to {}", path.display());
    Ok(())
}

fn run_optimization(
    config: &SimulationConfig,
    output: &Path,
    scenario: ScenarioArg,
    replicas: Option<usize>,
) -> anyhow::Result<()> {
    let replicas = replicas.unwrap_or(config.simulation.replicas);

    for scenario in scenario.scenarios() {
        println!("Scenario {}: {}", scenario, scenario.description());
        println!("{:-<72}", "");

        let scenario_report = search::run_scenario(scenario, config, replicas)?;
        match scenario_report.best() {
            Some(best) => {
                print!("Best allocation:");
                for station in Station::ALL {
                    print!(" {station}={}", best.capacities[station]);
                }
                println!();
                println!(
                    "  cost ${:.0}, {} collaborators, W = {:.3} +/- {:.3} min",
                    best.cost, best.collaborators, best.metrics.w_mean, best.metrics.w_ci_95
                );
            }
            None => println!("No allocation satisfies the scenario constraints."),
        }

        let path = output.join(format!("scenario_{scenario}.csv"));
        report::write_candidates_csv(&path, &scenario_report.candidates)?;
        println!("Candidates written to {}", path.display());
        println!();
    }

    Ok(())
}

fn run_sensitivity(
    config: &SimulationConfig,
    output: &Path,
    replicas: Option<usize>,
) -> anyhow::Result<()> {
    let replicas = replicas.unwrap_or(config.simulation.replicas);

    println!("Sensitivity sweeps ({replicas} replicas per point)");
    println!("{:-<72}", "");

    for sweep in sensitivity::default_sweeps(config, replicas)? {
        println!("{}:", sweep.parameter);
        for point in &sweep.points {
            println!(
                "  {:>7.3} -> W = {:.3} +/- {:.3} min",
                point.value, point.metrics.w_mean, point.metrics.w_ci_95
            );
        }

        let path = output.join(format!("sensitivity_{}.csv", sweep.parameter));
        report::write_sweep_csv(&path, &sweep)?;
        println!("  written to {}", path.display());
        println!();
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_config_falls_back_to_baseline() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(&dir.path().join("absent.json")).unwrap();
        assert_eq!(config.simulation.horizon, 480.0);
    }

    #[test]
    fn config_on_disk_takes_priority() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let mut config = SimulationConfig::example();
        config.simulation.horizon = 120.0;
        std::fs::write(&path, serde_json::to_string_pretty(&config).unwrap()).unwrap();

        let loaded = load_config(&path).unwrap();
        assert_eq!(loaded.simulation.horizon, 120.0);
    }

    #[test]
    fn scenario_arg_expands_to_all() {
        assert_eq!(ScenarioArg::All.scenarios().len(), 5);
        assert_eq!(ScenarioArg::C.scenarios(), vec![Scenario::C]);
    }

    #[test]
    fn replica_command_writes_its_report() {
        let dir = tempfile::tempdir().unwrap();
        let config = SimulationConfig::example();
        run_replication(&config, dir.path(), Some(5), None).unwrap();
        assert!(dir.path().join("replica_seed5.csv").exists());
    }
}
