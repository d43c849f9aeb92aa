//! Single-replica discrete-event engine.
//!
//! One replica owns its simulated clock, one seeded random source, a
//! min-heap of scheduled events, and one server pool per station. The
//! arrival process and every customer process run cooperatively: a
//! process suspends by scheduling a future event, and the main loop
//! resumes exactly one process per event, in (time, insertion order).
//! The engine is the only mutable accumulator; customer processes
//! never share state with each other.

use std::collections::{BinaryHeap, VecDeque};

use quickserve_core::{
    ConfigError, DistributionSpec, EngineConfig, Result, Sampler, Station, StationMap,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Serialize;

use crate::customer::{CustomerRecord, CustomerState};
use crate::event::{EventKind, SimEvent, SimTime};

/// Cumulative per-station counters for one replica.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct StationCounters {
    pub capacity: u32,
    pub visits: u64,
    pub total_service_time: f64,
    pub total_wait_time: f64,
}

/// Echo of the effective configuration a replica ran with.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReplicaConfig {
    pub seed: u64,
    pub interarrival_mean: f64,
    pub horizon: f64,
    pub capacities: StationMap<u32>,
}

/// The immutable output of one replica.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReplicaResult {
    /// Finalized customers, in departure order.
    pub customers: Vec<CustomerRecord>,
    pub stations: StationMap<StationCounters>,
    pub config: ReplicaConfig,
}

/// Runs one replica to quiescence and returns its full result.
///
/// Deterministic given `(config, seed)`. The horizon bounds admission
/// of new arrivals only; customers already admitted run to completion
/// even past it, so the loop ends only when no events remain.
///
/// # Errors
/// - `QuickserveError::Config` - A reachable station has an invalid
///   service distribution (propagated from the sampler)
pub fn run_replica(config: &EngineConfig, seed: u64) -> Result<ReplicaResult> {
    let mut replica = Replica::new(config, seed)?;
    replica.run();

    let result = replica.into_result(seed);
    tracing::debug!(
        seed,
        customers = result.customers.len(),
        "replica complete"
    );
    Ok(result)
}

/// One station's server pool: fixed capacity, an in-service count that
/// never exceeds it, and a strict-FIFO queue of waiting customers.
#[derive(Debug, Default)]
struct Pool {
    capacity: u32,
    in_service: u32,
    waiting: VecDeque<u64>,
    visits: u64,
    total_service_time: f64,
    total_wait_time: f64,
}

struct Replica<'a> {
    config: &'a EngineConfig,
    now: f64,
    events: BinaryHeap<SimEvent>,
    next_seq: u64,
    rng: ChaCha8Rng,
    interarrival: Option<Sampler>,
    samplers: StationMap<Option<Sampler>>,
    pools: StationMap<Pool>,
    /// In-flight and finished customer states, indexed by `id - 1`.
    active: Vec<CustomerState>,
    next_customer_id: u64,
    completed: Vec<CustomerRecord>,
}

impl<'a> Replica<'a> {
    fn new(config: &'a EngineConfig, seed: u64) -> Result<Self> {
        let mut samplers = StationMap::filled(None);
        for station in Station::ALL {
            if let Some(spec) = config.service[station] {
                let sampler = Sampler::new(spec)
                    .map_err(|source| ConfigError::Distribution { station, source })?;
                samplers[station] = Some(sampler);
            }
        }

        // A non-positive mean gap disables the arrival stream entirely
        // rather than producing a zero-gap flood.
        let interarrival = if config.interarrival_mean > 0.0 && config.horizon > 0.0 {
            let spec = DistributionSpec::Exponential {
                mean: config.interarrival_mean,
            };
            Some(
                Sampler::new(spec).map_err(|source| ConfigError::Distribution {
                    station: Station::Cashiers,
                    source,
                })?,
            )
        } else {
            None
        };

        let mut replica = Self {
            config,
            now: 0.0,
            events: BinaryHeap::new(),
            next_seq: 0,
            rng: ChaCha8Rng::seed_from_u64(seed),
            interarrival,
            samplers,
            pools: StationMap::from_fn(|s| Pool {
                capacity: config.capacities[s],
                ..Pool::default()
            }),
            active: Vec::new(),
            next_customer_id: 1,
            completed: Vec::new(),
        };

        replica.schedule_next_arrival();
        Ok(replica)
    }

    fn run(&mut self) {
        while let Some(event) = self.events.pop() {
            // The heap yields events in non-decreasing time order, so
            // the clock only moves forward.
            self.now = event.time.0;
            match event.kind {
                EventKind::Arrival => self.handle_arrival(),
                EventKind::ServiceComplete { customer, station } => {
                    self.handle_service_complete(customer, station);
                }
            }
        }
    }

    fn schedule(&mut self, time: f64, kind: EventKind) {
        let event = SimEvent {
            seq: self.next_seq,
            time: SimTime(time),
            kind,
        };
        self.next_seq += 1;
        self.events.push(event);
    }

    fn schedule_next_arrival(&mut self) {
        if let Some(interarrival) = self.interarrival {
            let gap = interarrival.sample(&mut self.rng);
            self.schedule(self.now + gap, EventKind::Arrival);
        }
    }

    fn handle_arrival(&mut self) {
        // Admission is bounded by the horizon; the stream stops at the
        // first arrival instant landing at or past it.
        if self.now >= self.config.horizon {
            return;
        }

        let id = self.next_customer_id;
        self.next_customer_id += 1;
        self.active.push(CustomerState::new(id, self.now));

        // The cashier visit is mandatory.
        self.request(Station::Cashiers, id);
        self.schedule_next_arrival();
    }

    /// Acquires a server at `station` for the customer, or joins the
    /// station's FIFO queue if all servers are busy.
    fn request(&mut self, station: Station, customer: u64) {
        let pool = &self.pools[station];
        if pool.in_service < pool.capacity {
            self.begin_service(station, customer);
        } else {
            self.pools[station].waiting.push_back(customer);
        }
    }

    fn begin_service(&mut self, station: Station, customer: u64) {
        let Some(sampler) = self.samplers[station] else {
            // resolve() guarantees a sampler for every reachable station.
            debug_assert!(false, "no service sampler for station {station}");
            return;
        };
        let duration = sampler.sample(&mut self.rng);

        let now = self.now;
        let state = &mut self.active[(customer - 1) as usize];
        // Cumulative-from-arrival wait, the study's reporting convention.
        state.record.wait_times[station] = Some(now - state.record.arrival_time);
        state.record.start_times[station] = Some(now);
        state.record.service_times[station] = Some(duration);

        self.pools[station].in_service += 1;
        self.schedule(now + duration, EventKind::ServiceComplete { customer, station });
    }

    fn handle_service_complete(&mut self, customer: u64, station: Station) {
        let now = self.now;
        let state = &mut self.active[(customer - 1) as usize];
        state.record.end_times[station] = Some(now);
        state.record.stations_visited.push(station);
        let wait = state.record.wait_times[station].unwrap_or(0.0);
        let duration = state.record.service_times[station].unwrap_or(0.0);

        let pool = &mut self.pools[station];
        pool.visits += 1;
        pool.total_service_time += duration;
        pool.total_wait_time += wait;
        pool.in_service -= 1;

        // Hand the freed server to the queue head before the completing
        // customer moves on, keeping acquisition strictly FIFO.
        if let Some(next) = self.pools[station].waiting.pop_front() {
            self.begin_service(station, next);
        }

        self.advance(customer);
    }

    /// Draws the Bernoulli gates for the remaining optional stations in
    /// fixed order; the first success routes the customer there, no
    /// success finalizes it.
    fn advance(&mut self, customer: u64) {
        loop {
            let next_optional = self.active[(customer - 1) as usize].next_optional;
            let Some(&station) = Station::OPTIONAL.get(next_optional) else {
                self.depart(customer);
                return;
            };
            self.active[(customer - 1) as usize].next_optional += 1;

            if self.rng.random::<f64>() < self.config.visit_prob[station] {
                self.request(station, customer);
                return;
            }
        }
    }

    fn depart(&mut self, customer: u64) {
        let now = self.now;
        let state = &mut self.active[(customer - 1) as usize];
        state.record.departure_time = now;
        state.record.time_in_system = now - state.record.arrival_time;
        self.completed.push(state.record.clone());
    }

    fn into_result(self, seed: u64) -> ReplicaResult {
        ReplicaResult {
            customers: self.completed,
            stations: StationMap::from_fn(|s| {
                let pool = &self.pools[s];
                StationCounters {
                    capacity: pool.capacity,
                    visits: pool.visits,
                    total_service_time: pool.total_service_time,
                    total_wait_time: pool.total_wait_time,
                }
            }),
            config: ReplicaConfig {
                seed,
                interarrival_mean: self.config.interarrival_mean,
                horizon: self.config.horizon,
                capacities: self.config.capacities,
            },
        }
    }
}
