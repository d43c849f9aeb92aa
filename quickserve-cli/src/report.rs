//! CSV report writers.
//!
//! All output is plain numeric CSV so the analysis notebooks downstream
//! can consume it without a schema. Per-station columns appear for
//! every station, zero-filled where a customer never visited.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::Context;
use quickserve_core::Station;
use quickserve_sim::ReplicaResult;

use crate::search::Candidate;
use crate::sensitivity::Sweep;
use crate::validate::StationValidation;

fn create(path: &Path) -> anyhow::Result<BufWriter<File>> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating output directory {}", parent.display()))?;
    }
    let file =
        File::create(path).with_context(|| format!("creating report {}", path.display()))?;
    Ok(BufWriter::new(file))
}

/// One row per customer, with wait/service columns for every station.
pub fn write_replica_csv(path: &Path, result: &ReplicaResult) -> anyhow::Result<()> {
    let mut out = create(path)?;

    write!(out, "customer_id,arrival_time")?;
    for station in Station::ALL {
        write!(out, ",wait_{station},service_{station}")?;
    }
    writeln!(out, ",departure_time,time_in_system")?;

    for customer in &result.customers {
        write!(out, "{},{:.6}", customer.id, customer.arrival_time)?;
        for station in Station::ALL {
            let wait = customer.wait_times[station].unwrap_or(0.0);
            let service = customer.service_times[station].unwrap_or(0.0);
            write!(out, ",{wait:.6},{service:.6}")?;
        }
        writeln!(
            out,
            ",{:.6},{:.6}",
            customer.departure_time, customer.time_in_system
        )?;
    }

    out.flush()?;
    Ok(())
}

/// Ranked candidate configurations from a grid search.
pub fn write_candidates_csv(path: &Path, candidates: &[Candidate]) -> anyhow::Result<()> {
    let mut out = create(path)?;

    write!(out, "rank")?;
    for station in Station::ALL {
        write!(out, ",{station}")?;
    }
    writeln!(out, ",collaborators,cost,w_mean,w_ci_95,num_replicas")?;

    for (rank, candidate) in candidates.iter().enumerate() {
        write!(out, "{}", rank + 1)?;
        for station in Station::ALL {
            write!(out, ",{}", candidate.capacities[station])?;
        }
        writeln!(
            out,
            ",{},{:.2},{:.6},{:.6},{}",
            candidate.collaborators,
            candidate.cost,
            candidate.metrics.w_mean,
            candidate.metrics.w_ci_95,
            candidate.metrics.num_replicas
        )?;
    }

    out.flush()?;
    Ok(())
}

/// One row per sweep point: parameter value then the aggregate columns.
pub fn write_sweep_csv(path: &Path, sweep: &Sweep) -> anyhow::Result<()> {
    let mut out = create(path)?;

    write!(out, "{},w_mean,w_std,w_ci_95", sweep.parameter)?;
    for station in Station::ALL {
        write!(out, ",utilization_{station}")?;
    }
    writeln!(out)?;

    for point in &sweep.points {
        write!(
            out,
            "{:.6},{:.6},{:.6},{:.6}",
            point.value, point.metrics.w_mean, point.metrics.w_std, point.metrics.w_ci_95
        )?;
        for station in Station::ALL {
            write!(out, ",{:.6}", point.metrics.utilization[station])?;
        }
        writeln!(out)?;
    }

    out.flush()?;
    Ok(())
}

/// Goodness-of-fit summary, one row per validated station.
pub fn write_validation_summary_csv(
    path: &Path,
    results: &[StationValidation],
) -> anyhow::Result<()> {
    let mut out = create(path)?;

    writeln!(out, "station,test,n,mean,std,min,max,statistic,critical,passed")?;
    for result in results {
        writeln!(
            out,
            "{},{},{},{:.6},{:.6},{:.6},{:.6},{:.6},{:.6},{}",
            result.station,
            result.test.name(),
            result.samples.len(),
            result.mean,
            result.std,
            result.min,
            result.max,
            result.statistic,
            result.critical,
            result.passed
        )?;
    }

    out.flush()?;
    Ok(())
}

/// The raw draws behind one station's validation, one value per row.
pub fn write_sample_csv(path: &Path, result: &StationValidation) -> anyhow::Result<()> {
    let mut out = create(path)?;

    writeln!(out, "{}", result.station)?;
    for sample in &result.samples {
        writeln!(out, "{sample:.6}")?;
    }

    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use quickserve_core::SimulationConfig;
    use quickserve_sim::run_replica;

    use super::*;
    use crate::validate::validate_all;

    #[test]
    fn replica_csv_zero_fills_unvisited_stations() {
        let config = SimulationConfig::example().resolve().unwrap();
        let result = run_replica(&config, 3).unwrap();
        assert!(!result.customers.is_empty());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("replica.csv");
        write_replica_csv(&path, &result).unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        let mut lines = contents.lines();
        let header = lines.next().unwrap();
        assert!(header.starts_with("customer_id,arrival_time,wait_cashiers"));
        assert!(header.ends_with("departure_time,time_in_system"));

        // Every data row has the full column count even when a customer
        // skipped stations.
        let columns = header.split(',').count();
        for line in lines {
            assert_eq!(line.split(',').count(), columns);
        }
        assert_eq!(
            contents.lines().count(),
            result.customers.len() + 1
        );
    }

    #[test]
    fn validation_summary_lists_each_station() {
        let config = SimulationConfig::example();
        let results = validate_all(&config, 42).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("validation.csv");
        write_validation_summary_csv(&path, &results).unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), results.len() + 1);
        assert!(contents.contains("cashiers,kolmogorov-smirnov"));
        assert!(contents.contains("desserts,chi-square"));
    }

    #[test]
    fn writers_create_missing_output_directories() {
        let config = SimulationConfig::example();
        let results = validate_all(&config, 1).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a/b/samples.csv");
        write_sample_csv(&nested, &results[0]).unwrap();
        assert!(nested.exists());
    }
}
