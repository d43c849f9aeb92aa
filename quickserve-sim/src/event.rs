//! Event types and scheduling for the discrete-event engine.

use std::cmp::Ordering;

use quickserve_core::Station;

/// Simulated time, in the study's time unit (minutes).
///
/// Wraps `f64` so events can carry a total order; comparison uses
/// `total_cmp`, which is consistent for every value the engine
/// produces (finite, non-negative).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimTime(pub f64);

impl Eq for SimTime {}

impl PartialOrd for SimTime {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SimTime {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

/// What happens when an event fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// The next customer of the Poisson stream arrives.
    Arrival,
    /// A customer finishes service at a station, freeing one server.
    ServiceComplete { customer: u64, station: Station },
}

/// A scheduled event with a deterministic tie-break.
#[derive(Debug, Clone, Copy)]
pub struct SimEvent {
    /// Insertion sequence number; breaks ties at equal timestamps so
    /// resumption order is reproducible across runs.
    pub seq: u64,
    /// Scheduled firing time.
    pub time: SimTime,
    pub kind: EventKind,
}

impl Eq for SimEvent {}

impl PartialEq for SimEvent {
    fn eq(&self, other: &Self) -> bool {
        self.seq == other.seq
    }
}

impl Ord for SimEvent {
    fn cmp(&self, other: &Self) -> Ordering {
        // Earlier timestamp first; insertion order at equal timestamps.
        // Reversed so BinaryHeap behaves as a min-heap.
        match self.time.cmp(&other.time) {
            Ordering::Equal => self.seq.cmp(&other.seq).reverse(),
            other => other.reverse(),
        }
    }
}

impl PartialOrd for SimEvent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
