//! Long-horizon random sample of observed nodes.
//!
//! The sampler backs the view: whatever push and pull deliver in a round is
//! folded in here, and each new view draws a few entries from the sample so
//! that a round where push and pull went dry (or were poisoned) still leaves
//! the node connected.
//!
//! # Replacement policy
//!
//! Reservoir sampling (Algorithm R) over the stream of distinct admitted
//! candidates. Below capacity every candidate is inserted. At capacity the
//! k-th candidate replaces a uniformly chosen entry with probability
//! `capacity / k`, which keeps the sample uniform over everything observed.
//!
//! # Invalidation
//!
//! Nodes that failed a liveness probe are dropped from the sample and
//! remembered for a retention window. While remembered they are refused by
//! [`Sampler::update`] and filtered from pull results by the round function.
//! The table is bounded; under pressure the oldest invalidation goes first.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::Rng;
use tracing::trace;

use crate::{Nid, Node, View};

/// How long an invalidated node stays excluded.
pub const DEFAULT_INVALIDATION_RETENTION: Duration = Duration::from_secs(30);

/// Default size of the invalidation table relative to the sample capacity.
const INVALIDATION_CAPACITY_FACTOR: usize = 2;

#[derive(Debug)]
struct Inner {
    sample: View,
    /// Distinct candidates admitted so far (the reservoir's stream position).
    seen: u64,
    rng: StdRng,
    invalidated: HashMap<Nid, Instant>,
}

/// Capacity-bounded random sample plus a short-lived invalidation table.
#[derive(Debug)]
pub struct Sampler {
    capacity: usize,
    retention: Duration,
    invalidation_capacity: usize,
    inner: Mutex<Inner>,
}

impl Sampler {
    /// Create an empty sampler holding at most `capacity` nodes.
    pub fn new(capacity: usize, rng: StdRng) -> Self {
        Self {
            capacity,
            retention: DEFAULT_INVALIDATION_RETENTION,
            invalidation_capacity: capacity.max(1) * INVALIDATION_CAPACITY_FACTOR,
            inner: Mutex::new(Inner {
                sample: View::new(),
                seen: 0,
                rng,
                invalidated: HashMap::new(),
            }),
        }
    }

    /// Set how long invalidations are remembered.
    #[must_use]
    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    /// Set how many invalidations are remembered at most.
    #[must_use]
    pub fn with_invalidation_capacity(mut self, capacity: usize) -> Self {
        self.invalidation_capacity = capacity.max(1);
        self
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot of the current sample.
    pub fn sample(&self) -> View {
        self.lock().sample.clone()
    }

    /// Maximum number of sampled nodes.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of sampled nodes.
    pub fn len(&self) -> usize {
        self.lock().sample.len()
    }

    /// Check if the sample is empty.
    pub fn is_empty(&self) -> bool {
        self.lock().sample.is_empty()
    }

    /// Fold a batch of observed nodes into the sample.
    pub fn update(&self, observed: &View) {
        self.update_at(observed, Instant::now());
    }

    /// [`update`](Self::update) with an explicit clock reading.
    pub fn update_at(&self, observed: &View, now: Instant) {
        if self.capacity == 0 {
            return;
        }

        let mut guard = self.lock();
        let inner = &mut *guard;
        self.prune(inner, now);

        for (id, node) in observed.iter() {
            if inner.sample.contains(id) || inner.invalidated.contains_key(id) {
                continue;
            }

            inner.seen += 1;
            if inner.sample.len() < self.capacity {
                inner.sample.insert(*node);
                continue;
            }

            let slot = inner.rng.gen_range(0..inner.seen);
            if slot >= self.capacity as u64 {
                continue;
            }

            let victim_idx = inner.rng.gen_range(0..inner.sample.len());
            let victim = inner.sample.iter().nth(victim_idx).map(|(vid, _)| *vid);
            if let Some(victim) = victim {
                trace!(evicted = %victim, admitted = %id, "sampler replaced entry");
                inner.sample.remove(&victim);
                inner.sample.insert(*node);
            }
        }
    }

    /// Whether `id` failed a probe within the retention window.
    pub fn recently_invalidated(&self, id: &Nid) -> bool {
        self.recently_invalidated_at(id, Instant::now())
    }

    /// [`recently_invalidated`](Self::recently_invalidated) with an explicit clock reading.
    pub fn recently_invalidated_at(&self, id: &Nid, now: Instant) -> bool {
        self.lock()
            .invalidated
            .get(id)
            .is_some_and(|at| now.saturating_duration_since(*at) < self.retention)
    }

    /// Record that `node` failed a liveness probe.
    pub fn invalidate(&self, node: &Node) {
        self.invalidate_at(node, Instant::now());
    }

    /// [`invalidate`](Self::invalidate) with an explicit clock reading.
    pub fn invalidate_at(&self, node: &Node, now: Instant) {
        let id = node.hash();
        let mut guard = self.lock();
        let inner = &mut *guard;
        self.prune(inner, now);

        inner.sample.remove(&id);
        inner.invalidated.insert(id, now);

        while inner.invalidated.len() > self.invalidation_capacity {
            let oldest = inner
                .invalidated
                .iter()
                .min_by_key(|(_, at)| **at)
                .map(|(oid, _)| *oid);
            match oldest {
                Some(oldest) => {
                    inner.invalidated.remove(&oldest);
                }
                None => break,
            }
        }
    }

    /// Number of invalidations currently remembered (expired ones included
    /// until the next update or invalidation prunes them).
    pub fn invalidated_len(&self) -> usize {
        self.lock().invalidated.len()
    }

    fn prune(&self, inner: &mut Inner, now: Instant) {
        let retention = self.retention;
        inner
            .invalidated
            .retain(|_, at| now.saturating_duration_since(*at) < retention);
    }
}
