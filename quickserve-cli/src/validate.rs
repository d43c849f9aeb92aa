//! Goodness-of-fit checks for the configured service distributions.
//!
//! Each station's sampler is exercised with a large draw and compared
//! against its theoretical distribution: Kolmogorov-Smirnov for the
//! continuous families, chi-square with low-expectancy bin merging for
//! the discrete ones.

use std::f64::consts::SQRT_2;

use anyhow::{Context, anyhow};
use quickserve_core::{
    DistributionSpec, Sampler, SimulationConfig, Station, ValidationSection,
};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Which test produced a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GofTest {
    /// Kolmogorov-Smirnov against the theoretical CDF.
    KolmogorovSmirnov,
    /// Chi-square over merged integer bins, with the given degrees of
    /// freedom.
    ChiSquare { df: usize },
}

impl GofTest {
    pub fn name(self) -> &'static str {
        match self {
            GofTest::KolmogorovSmirnov => "kolmogorov-smirnov",
            GofTest::ChiSquare { .. } => "chi-square",
        }
    }
}

/// Summary statistics and test verdict for one station's sampler.
#[derive(Debug, Clone)]
pub struct StationValidation {
    pub station: Station,
    pub spec: DistributionSpec,
    pub samples: Vec<f64>,
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
    pub statistic: f64,
    pub critical: f64,
    pub test: GofTest,
    pub passed: bool,
}

/// Validates every configured service distribution with a fresh seeded
/// stream per station.
pub fn validate_all(config: &SimulationConfig, seed: u64) -> anyhow::Result<Vec<StationValidation>> {
    let mut results = Vec::new();
    for station in Station::ALL {
        let Some(&spec) = config.service_times.get(station.as_str()) else {
            continue;
        };
        let station_seed = seed + station.index() as u64;
        results.push(validate_station(station, spec, &config.validation, station_seed)?);
    }
    Ok(results)
}

/// Draws `settings.sample_size` values and runs the family-appropriate
/// goodness-of-fit test.
pub fn validate_station(
    station: Station,
    spec: DistributionSpec,
    settings: &ValidationSection,
    seed: u64,
) -> anyhow::Result<StationValidation> {
    let sampler = Sampler::new(spec)
        .with_context(|| format!("invalid distribution for station {station}"))?;
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let samples: Vec<f64> = (0..settings.sample_size)
        .map(|_| sampler.sample(&mut rng))
        .collect();
    if samples.is_empty() {
        return Err(anyhow!("validation sample size is zero"));
    }

    let n = samples.len() as f64;
    let mean = samples.iter().sum::<f64>() / n;
    let variance = samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1.0).max(1.0);
    let min = samples.iter().copied().fold(f64::INFINITY, f64::min);
    let max = samples.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    let (statistic, critical, test) = match spec {
        DistributionSpec::Exponential { mean } => {
            let d = ks_statistic(&samples, |x| 1.0 - (-x / mean).exp());
            (d, ks_critical(settings.significance_level, samples.len()), GofTest::KolmogorovSmirnov)
        }
        DistributionSpec::NormalDiscrete { mean, std } => {
            let d = ks_statistic(&samples, |x| normal_cdf(x, mean, std));
            (d, ks_critical(settings.significance_level, samples.len()), GofTest::KolmogorovSmirnov)
        }
        DistributionSpec::Binomial { n: trials, p } => {
            chi_square_verdict(&samples, settings, binomial_pmf_table(trials, p))
        }
        DistributionSpec::Geometric { p } => {
            chi_square_verdict(&samples, settings, geometric_pmf_table(p, samples.len()))
        }
    };

    Ok(StationValidation {
        station,
        spec,
        samples,
        mean,
        std: variance.sqrt(),
        min,
        max,
        statistic,
        critical,
        test,
        passed: statistic <= critical,
    })
}

/// Two-sided KS distance between the empirical CDF and `cdf`.
fn ks_statistic(samples: &[f64], cdf: impl Fn(f64) -> f64) -> f64 {
    let mut sorted = samples.to_vec();
    sorted.sort_by(f64::total_cmp);
    let n = sorted.len() as f64;

    let mut d = 0.0f64;
    for (i, &x) in sorted.iter().enumerate() {
        let theoretical = cdf(x);
        let above = (i as f64 + 1.0) / n - theoretical;
        let below = theoretical - i as f64 / n;
        d = d.max(above).max(below);
    }
    d
}

/// Asymptotic KS critical value c(alpha)/sqrt(n).
fn ks_critical(alpha: f64, n: usize) -> f64 {
    let c = if alpha <= 0.01 {
        1.628
    } else if alpha <= 0.05 {
        1.358
    } else {
        1.224
    };
    c / (n as f64).sqrt()
}

/// Standard normal CDF via the Abramowitz & Stegun 7.1.26 erf
/// approximation (absolute error below 1.5e-7).
fn normal_cdf(x: f64, mean: f64, std: f64) -> f64 {
    0.5 * (1.0 + erf((x - mean) / (std * SQRT_2)))
}

fn erf(x: f64) -> f64 {
    const A1: f64 = 0.254829592;
    const A2: f64 = -0.284496736;
    const A3: f64 = 1.421413741;
    const A4: f64 = -1.453152027;
    const A5: f64 = 1.061405429;
    const P: f64 = 0.3275911;

    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let x = x.abs();
    let t = 1.0 / (1.0 + P * x);
    let poly = ((((A5 * t + A4) * t + A3) * t + A2) * t + A1) * t;
    sign * (1.0 - poly * (-x * x).exp())
}

/// (support value, probability) rows covering the distribution's mass.
type PmfTable = Vec<(f64, f64)>;

fn binomial_pmf_table(trials: u64, p: f64) -> PmfTable {
    let mut table = Vec::with_capacity(trials as usize + 1);
    for k in 0..=trials {
        table.push((k as f64, binomial_pmf(trials, k, p)));
    }
    table
}

fn binomial_pmf(n: u64, k: u64, p: f64) -> f64 {
    // Log-space to stay finite for larger n.
    let log_choose = ln_factorial(n) - ln_factorial(k) - ln_factorial(n - k);
    (log_choose + k as f64 * p.ln() + (n - k) as f64 * (1.0 - p).ln()).exp()
}

fn ln_factorial(n: u64) -> f64 {
    (2..=n).map(|i| (i as f64).ln()).sum()
}

/// PMF over trial counts k = 1, 2, ... with a tail row absorbing the
/// remaining mass once the expected count per bin becomes negligible.
fn geometric_pmf_table(p: f64, sample_size: usize) -> PmfTable {
    let mut table = Vec::new();
    let mut remaining = 1.0;
    let mut k = 1u64;
    // Stop extending once an individual bin expects less than one
    // observation; the merge step folds the tail together anyway.
    while remaining * sample_size as f64 >= 1.0 && k < 10_000 {
        let mass = p * (1.0 - p).powi(k as i32 - 1);
        table.push((k as f64, mass));
        remaining -= mass;
        k += 1;
    }
    table.push((k as f64, remaining.max(0.0)));
    table
}

/// Chi-square statistic over merged bins, with the Wilson-Hilferty
/// critical value.
fn chi_square_verdict(
    samples: &[f64],
    settings: &ValidationSection,
    pmf: PmfTable,
) -> (f64, f64, GofTest) {
    let n = samples.len() as f64;

    // Observed count per support row; the last row absorbs overflow.
    let mut bins: Vec<(f64, f64)> = pmf
        .iter()
        .map(|&(_, mass)| (0.0, mass * n))
        .collect();
    for &sample in samples {
        let idx = pmf
            .iter()
            .position(|&(value, _)| (value - sample).abs() < 0.5)
            .unwrap_or(pmf.len() - 1);
        bins[idx].0 += 1.0;
    }

    let merged = merge_low_expectancy(bins, settings.min_expected_frequency);
    let statistic: f64 = merged
        .iter()
        .filter(|&&(_, expected)| expected > 0.0)
        .map(|&(observed, expected)| (observed - expected).powi(2) / expected)
        .sum();
    let df = merged.len().saturating_sub(1).max(1);
    let critical = chi_square_critical(df, settings.significance_level);
    (statistic, critical, GofTest::ChiSquare { df })
}

/// Merges adjacent bins until every expected count reaches the floor.
fn merge_low_expectancy(bins: Vec<(f64, f64)>, min_expected: f64) -> Vec<(f64, f64)> {
    let mut merged: Vec<(f64, f64)> = Vec::new();
    for (observed, expected) in bins {
        match merged.last_mut() {
            Some(last) if last.1 < min_expected => {
                last.0 += observed;
                last.1 += expected;
            }
            _ => merged.push((observed, expected)),
        }
    }
    // The trailing bin may still be under the floor; fold it backwards.
    while merged.len() > 1 && merged[merged.len() - 1].1 < min_expected {
        let (observed, expected) = merged.pop().unwrap_or((0.0, 0.0));
        if let Some(last) = merged.last_mut() {
            last.0 += observed;
            last.1 += expected;
        }
    }
    merged
}

/// Upper-tail chi-square quantile via the Wilson-Hilferty cube
/// approximation.
fn chi_square_critical(df: usize, alpha: f64) -> f64 {
    let z = if alpha <= 0.01 {
        2.3263
    } else if alpha <= 0.05 {
        1.6449
    } else {
        1.2816
    };
    let k = df as f64;
    let term = 1.0 - 2.0 / (9.0 * k) + z * (2.0 / (9.0 * k)).sqrt();
    k * term.powi(3)
}
