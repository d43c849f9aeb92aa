//! Settings document for a simulation study.
//!
//! The document is parsed once into [`SimulationConfig`] (a nested,
//! serde-backed structure mirroring the JSON layout) and then resolved
//! into the typed, immutable [`EngineConfig`] a replica runs against.
//! All configuration errors surface at resolution time, before any
//! simulation event runs.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::distribution::{DistributionSpec, Sampler};
use crate::station::{Station, StationMap};
use crate::{ConfigError, InputError, QuickserveError};

fn default_replicas() -> usize {
    200
}

fn default_base_seed() -> u64 {
    42
}

/// Top-level simulation parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationSection {
    /// Simulated-time cutoff after which no new arrivals are admitted,
    /// in the same time unit as the arrival and service means.
    pub horizon: f64,
    /// Seed for a single replica run; per-call overrides take priority.
    #[serde(default)]
    pub random_seed: Option<u64>,
    /// Number of replicas per configuration evaluation.
    #[serde(default = "default_replicas")]
    pub replicas: usize,
    /// First seed of the replication seed sequence.
    #[serde(default = "default_base_seed")]
    pub base_seed: u64,
}

/// Arrival process parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArrivalSection {
    /// Mean inter-arrival gap. Despite the name, the value is fed
    /// directly to the exponential sampler as its mean; see DESIGN.md
    /// for the open question on whether it was ever intended as a rate.
    pub lambda: f64,
}

/// Resource-allocation search constraints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConstraintSection {
    /// Maximum total number of servers across all stations.
    pub max_collaborators: u32,
    /// Maximum total equipment cost.
    pub max_budget: f64,
}

impl Default for ConstraintSection {
    fn default() -> Self {
        Self {
            max_collaborators: 10,
            max_budget: 3000.0,
        }
    }
}

/// Distribution goodness-of-fit testing parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationSection {
    pub sample_size: usize,
    pub significance_level: f64,
    /// Chi-square bins with an expected count below this are merged.
    pub min_expected_frequency: f64,
}

impl Default for ValidationSection {
    fn default() -> Self {
        Self {
            sample_size: 10_000,
            significance_level: 0.05,
            min_expected_frequency: 5.0,
        }
    }
}

/// The parsed settings document.
///
/// Scenario exploration clones this structure and overrides fields
/// (resource counts, service means, visit probabilities) before
/// resolving again.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub simulation: SimulationSection,
    pub arrivals: ArrivalSection,
    /// Servers per station, keyed by station name.
    pub resources: BTreeMap<String, u32>,
    /// Visit probability per optional station; a missing entry means
    /// the station is never visited. The cashiers are always visited.
    #[serde(default)]
    pub probabilities: BTreeMap<String, f64>,
    /// Service-time distribution per station.
    pub service_times: BTreeMap<String, DistributionSpec>,
    /// Unit cost per equipment type, consumed by the configuration
    /// search.
    #[serde(default)]
    pub costs: BTreeMap<String, f64>,
    #[serde(default)]
    pub constraints: ConstraintSection,
    #[serde(default)]
    pub validation: ValidationSection,
}

impl SimulationConfig {
    /// Reads and parses a JSON settings document.
    ///
    /// # Errors
    /// - `ConfigError::Io` - The file cannot be read
    /// - `ConfigError::Parse` - The document is not valid configuration JSON
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_json(&fs::read_to_string(path)?)
    }

    /// Parses a JSON settings document from a string.
    ///
    /// # Errors
    /// - `ConfigError::Parse` - The document is not valid configuration JSON
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// The baseline study configuration, also used as a starting point
    /// in tests.
    pub fn example() -> Self {
        let resources = BTreeMap::from([
            ("cashiers".to_string(), 2),
            ("drinks".to_string(), 1),
            ("fryer".to_string(), 2),
            ("desserts".to_string(), 1),
            ("chicken".to_string(), 2),
        ]);
        let probabilities = BTreeMap::from([
            ("drinks".to_string(), 0.9),
            ("fryer".to_string(), 0.6),
            ("desserts".to_string(), 0.25),
            ("chicken".to_string(), 0.3),
        ]);
        let service_times = BTreeMap::from([
            (
                "cashiers".to_string(),
                DistributionSpec::Exponential { mean: 2.5 },
            ),
            (
                "drinks".to_string(),
                DistributionSpec::NormalDiscrete { mean: 1.5, std: 0.5 },
            ),
            (
                "fryer".to_string(),
                DistributionSpec::Exponential { mean: 3.0 },
            ),
            (
                "desserts".to_string(),
                DistributionSpec::Binomial { n: 3, p: 0.4 },
            ),
            (
                "chicken".to_string(),
                DistributionSpec::Geometric { p: 0.35 },
            ),
        ]);
        let costs = BTreeMap::from([
            ("cashiers".to_string(), 200.0),
            ("drinks".to_string(), 150.0),
            ("fryer".to_string(), 300.0),
            ("chicken".to_string(), 400.0),
        ]);

        Self {
            simulation: SimulationSection {
                horizon: 480.0,
                random_seed: Some(42),
                replicas: 200,
                base_seed: 42,
            },
            arrivals: ArrivalSection { lambda: 2.0 },
            resources,
            probabilities,
            service_times,
            costs,
            constraints: ConstraintSection::default(),
            validation: ValidationSection::default(),
        }
    }

    /// Resolves the document into the typed view one replica runs
    /// against, surfacing every configuration and input error before
    /// any event runs.
    ///
    /// # Errors
    /// - `QuickserveError::Config` - Unknown station names, a station
    ///   gated by a visit probability without a capacity or service
    ///   entry, a probability outside [0, 1], or invalid distribution
    ///   parameters
    /// - `QuickserveError::Input` - Zero capacity or a malformed horizon
    pub fn resolve(&self) -> Result<EngineConfig, QuickserveError> {
        let horizon = self.simulation.horizon;
        if !horizon.is_finite() || horizon < 0.0 {
            return Err(InputError::InvalidHorizon { horizon }.into());
        }

        let mut capacities: StationMap<Option<u32>> = StationMap::filled(None);
        for (name, &capacity) in &self.resources {
            let station = parse_station(name, "resources")?;
            if capacity == 0 {
                return Err(InputError::InvalidCapacity { station, capacity }.into());
            }
            capacities[station] = Some(capacity);
        }

        let mut visit_prob = StationMap::filled(0.0);
        visit_prob[Station::Cashiers] = 1.0;
        for (name, &value) in &self.probabilities {
            let station = parse_station(name, "probabilities")?;
            if !(0.0..=1.0).contains(&value) || !value.is_finite() {
                return Err(ConfigError::ProbabilityOutOfRange { station, value }.into());
            }
            visit_prob[station] = value;
        }

        let mut service: StationMap<Option<DistributionSpec>> = StationMap::filled(None);
        for (name, &spec) in &self.service_times {
            let station = parse_station(name, "service_times")?;
            // Validate parameters eagerly, even for unreachable stations.
            Sampler::new(spec)
                .map_err(|source| ConfigError::Distribution { station, source })?;
            service[station] = Some(spec);
        }

        // Every station a customer can reach needs a server pool and a
        // service-time distribution.
        for station in Station::ALL {
            if visit_prob[station] > 0.0 {
                if capacities[station].is_none() {
                    return Err(ConfigError::MissingCapacity { station }.into());
                }
                if service[station].is_none() {
                    return Err(ConfigError::MissingServiceTime { station }.into());
                }
            }
        }

        tracing::debug!(
            horizon,
            lambda = self.arrivals.lambda,
            "configuration resolved"
        );
        Ok(EngineConfig {
            horizon,
            interarrival_mean: self.arrivals.lambda,
            seed: self.simulation.random_seed,
            capacities: StationMap::from_fn(|s| capacities[s].unwrap_or(0)),
            visit_prob,
            service,
        })
    }
}

fn parse_station(name: &str, section: &'static str) -> Result<Station, ConfigError> {
    name.parse().map_err(|_| ConfigError::UnknownStation {
        name: name.to_string(),
        section,
    })
}

/// Immutable, validated configuration for one replica.
///
/// Constructed by [`SimulationConfig::resolve`]; read-only for the
/// duration of the replica.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Admission cutoff for new arrivals.
    pub horizon: f64,
    /// Mean inter-arrival gap; a non-positive value disables arrivals.
    pub interarrival_mean: f64,
    /// Default seed when the caller does not pass one explicitly.
    pub seed: Option<u64>,
    /// Servers per station; 0 for stations that can never be visited.
    pub capacities: StationMap<u32>,
    /// Visit probability per station (cashiers fixed at 1.0).
    pub visit_prob: StationMap<f64>,
    /// Service-time specification per reachable station.
    pub service: StationMap<Option<DistributionSpec>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn example_config_resolves() {
        let resolved = SimulationConfig::example().resolve().unwrap();
        assert_eq!(resolved.horizon, 480.0);
        assert_eq!(resolved.interarrival_mean, 2.0);
        assert_eq!(resolved.capacities[Station::Cashiers], 2);
        assert_eq!(resolved.visit_prob[Station::Cashiers], 1.0);
        assert_eq!(resolved.visit_prob[Station::Desserts], 0.25);
        assert!(resolved.service[Station::Chicken].is_some());
    }

    #[test]
    fn unknown_station_name_is_a_config_error() {
        let mut config = SimulationConfig::example();
        config.resources.insert("grill".to_string(), 1);
        let err = config.resolve().unwrap_err();
        assert!(matches!(
            err,
            QuickserveError::Config(ConfigError::UnknownStation { .. })
        ));
    }

    #[test]
    fn gated_station_without_capacity_is_a_config_error() {
        let mut config = SimulationConfig::example();
        config.resources.remove("chicken");
        let err = config.resolve().unwrap_err();
        assert!(matches!(
            err,
            QuickserveError::Config(ConfigError::MissingCapacity {
                station: Station::Chicken
            })
        ));
    }

    #[test]
    fn gated_station_without_service_time_is_a_config_error() {
        let mut config = SimulationConfig::example();
        config.service_times.remove("drinks");
        let err = config.resolve().unwrap_err();
        assert!(matches!(
            err,
            QuickserveError::Config(ConfigError::MissingServiceTime {
                station: Station::Drinks
            })
        ));
    }

    #[test]
    fn unreachable_station_needs_no_capacity() {
        let mut config = SimulationConfig::example();
        config.probabilities.remove("desserts");
        config.resources.remove("desserts");
        let resolved = config.resolve().unwrap();
        assert_eq!(resolved.visit_prob[Station::Desserts], 0.0);
        assert_eq!(resolved.capacities[Station::Desserts], 0);
    }

    #[test]
    fn probability_out_of_range_is_rejected() {
        let mut config = SimulationConfig::example();
        config.probabilities.insert("drinks".to_string(), 1.2);
        let err = config.resolve().unwrap_err();
        assert!(matches!(
            err,
            QuickserveError::Config(ConfigError::ProbabilityOutOfRange { .. })
        ));
    }

    #[test]
    fn zero_capacity_is_an_input_error() {
        let mut config = SimulationConfig::example();
        config.resources.insert("fryer".to_string(), 0);
        let err = config.resolve().unwrap_err();
        assert!(matches!(
            err,
            QuickserveError::Input(InputError::InvalidCapacity {
                station: Station::Fryer,
                capacity: 0
            })
        ));
    }

    #[test]
    fn negative_horizon_is_an_input_error() {
        let mut config = SimulationConfig::example();
        config.simulation.horizon = -1.0;
        let err = config.resolve().unwrap_err();
        assert!(matches!(
            err,
            QuickserveError::Input(InputError::InvalidHorizon { .. })
        ));
    }

    #[test]
    fn bad_distribution_parameters_carry_station_context() {
        let mut config = SimulationConfig::example();
        config.service_times.insert(
            "fryer".to_string(),
            DistributionSpec::Exponential { mean: -3.0 },
        );
        let err = config.resolve().unwrap_err();
        match err {
            QuickserveError::Config(ConfigError::Distribution { station, .. }) => {
                assert_eq!(station, Station::Fryer);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn config_round_trips_through_json() {
        let config = SimulationConfig::example();
        let json = serde_json::to_string(&config).unwrap();
        let reparsed = SimulationConfig::from_json(&json).unwrap();
        assert_eq!(reparsed.arrivals.lambda, config.arrivals.lambda);
        assert_eq!(reparsed.resources, config.resources);
    }

    #[test]
    fn load_reads_a_document_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let config = SimulationConfig::example();
        fs::write(&path, serde_json::to_string_pretty(&config).unwrap()).unwrap();
        let loaded = SimulationConfig::load(&path).unwrap();
        assert_eq!(loaded.simulation.horizon, config.simulation.horizon);
    }
}
