//! The stateful driver around the round function.
//!
//! A [`Core`] owns one node's view and sampler. Two operations change
//! them, each meant to be called from its own timer:
//!
//! - [`Core::update_view`]: one gossip round, replaces the view
//! - [`Core::validate_sample`]: probes the sample, records invalidations
//!
//! Everything else only reads (`read_view`, `is_active`) or enqueues
//! (`receive_node`), so request handlers can call them at any time.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::round::{self, Round};
use crate::sampler::DEFAULT_INVALIDATION_RETENTION;
use crate::transport::{Responder, Transport};
use crate::{Node, Params, Sampler, View};

/// Default number of inbound pushes buffered between two rounds.
pub const DEFAULT_INBOX_CAPACITY: usize = 1024;

/// Tunables that are not protocol parameters.
#[derive(Debug, Clone, Copy)]
pub struct CoreOptions {
    /// Inbound pushes buffered between two rounds; extra pushes are dropped.
    pub inbox_capacity: usize,
    /// How long a probe failure keeps a node out of the sample.
    pub invalidation_retention: Duration,
}

impl Default for CoreOptions {
    fn default() -> Self {
        Self {
            inbox_capacity: DEFAULT_INBOX_CAPACITY,
            invalidation_retention: DEFAULT_INVALIDATION_RETENTION,
        }
    }
}

/// State only a running round touches.
struct RoundState {
    rng: StdRng,
    pushes: mpsc::Receiver<Node>,
}

/// One node's membership state and the entry points that advance it.
pub struct Core {
    me: Node,
    params: Params,
    transport: Arc<dyn Transport>,
    sampler: Sampler,
    view: RwLock<View>,
    /// Serializes rounds; held for a whole round.
    round: Mutex<RoundState>,
    inbox: mpsc::Sender<Node>,
    alive: AtomicBool,
}

impl Core {
    /// Create a core with default options.
    ///
    /// `view` seeds the first round; the node itself is filtered out of it.
    pub fn new(rng: StdRng, me: Node, view: View, params: Params, transport: Arc<dyn Transport>) -> Self {
        Self::with_options(rng, me, view, params, transport, CoreOptions::default())
    }

    /// Create a core with explicit options.
    pub fn with_options(
        mut rng: StdRng,
        me: Node,
        mut view: View,
        params: Params,
        transport: Arc<dyn Transport>,
        options: CoreOptions,
    ) -> Self {
        view.remove(&me.hash());

        let sampler = Sampler::new(params.sample_size(), StdRng::seed_from_u64(rng.gen()))
            .with_retention(options.invalidation_retention);
        let (inbox, pushes) = mpsc::channel(options.inbox_capacity.max(1));

        debug!(me = %me, view = %view, "created core");

        Self {
            me,
            params,
            transport,
            sampler,
            view: RwLock::new(view),
            round: Mutex::new(RoundState { rng, pushes }),
            inbox,
            alive: AtomicBool::new(true),
        }
    }

    /// The local node.
    pub fn self_node(&self) -> &Node {
        &self.me
    }

    /// The protocol parameters.
    pub fn params(&self) -> &Params {
        &self.params
    }

    /// The sampler backing the view.
    pub fn sampler(&self) -> &Sampler {
        &self.sampler
    }

    /// Snapshot of the current sample.
    pub fn sample(&self) -> View {
        self.sampler.sample()
    }

    /// Whether the node still takes part in the protocol.
    pub fn is_active(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// Snapshot of the current view.
    pub fn read_view(&self) -> View {
        self.view_read().clone()
    }

    /// Queue a push received from a peer for the next round.
    ///
    /// Pushes naming ourselves, pushes to a stopped core and pushes beyond
    /// the inbox capacity are dropped.
    pub fn receive_node(&self, node: Node) {
        if !self.is_active() || node.hash() == self.me.hash() {
            return;
        }

        match self.inbox.try_send(node) {
            Ok(()) => {}
            Err(TrySendError::Full(node)) => {
                warn!(me = %self.me, from = %node, "push inbox full, dropping push");
            }
            Err(TrySendError::Closed(_)) => {}
        }
    }

    /// Run one gossip round and replace the view with its result.
    ///
    /// No-op once the core is stopped.
    pub async fn update_view(&self, budget: Duration) {
        if !self.is_active() {
            return;
        }

        let mut state = self.round.lock().await;
        let state = &mut *state;

        let current = self.read_view();
        let round = Round {
            me: &self.me,
            params: &self.params,
            budget,
            sampler: &self.sampler,
            transport: &self.transport,
        };
        let next = round.run(&mut state.rng, &mut state.pushes, &current).await;

        // stopped while the round was in flight
        if !self.is_active() {
            return;
        }
        *self.view_write() = next;
    }

    /// Probe the sample and invalidate nodes that do not answer in time.
    ///
    /// Does not wait for a running round. No-op once the core is stopped.
    pub async fn validate_sample(&self, budget: Duration) {
        if !self.is_active() {
            return;
        }

        let invalidated = round::validate(&self.sampler, &self.transport, budget).await;
        if invalidated > 0 {
            debug!(me = %self.me, invalidated, "validation pass invalidated nodes");
        }
    }

    /// Stop taking part in the protocol and forget the view.
    ///
    /// Peers keep the node in their views until probes against it fail.
    pub fn stop(&self) {
        if self.alive.swap(false, Ordering::AcqRel) {
            info!(me = %self.me, "core stopped");
        }
        *self.view_write() = View::new();
    }

    fn view_read(&self) -> RwLockReadGuard<'_, View> {
        self.view.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn view_write(&self) -> RwLockWriteGuard<'_, View> {
        self.view.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Responder for Core {
    fn is_active(&self) -> bool {
        Core::is_active(self)
    }

    fn receive_node(&self, node: Node) {
        Core::receive_node(self, node)
    }

    fn read_view(&self) -> View {
        Core::read_view(self)
    }
}

impl std::fmt::Debug for Core {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Core")
            .field("me", &self.me)
            .field("params", &self.params)
            .field("alive", &self.is_active())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemNetTransport;
    use std::net::Ipv4Addr;

    fn n(port: u16) -> Node {
        Node::new(Ipv4Addr::LOCALHOST, port)
    }

    fn lone_core(options: CoreOptions, view: View) -> Arc<Core> {
        // L1α = 2, L1β = 2, L1γ = 1
        let params = Params::new(0.45, 0.45, 0.1, 5, 5).unwrap();
        let net = Arc::new(MemNetTransport::new());
        let core = Arc::new(Core::with_options(StdRng::seed_from_u64(1), n(1), view, params, net.clone(), options));
        net.add_core(&core);
        core
    }

    #[test]
    fn self_is_removed_from_initial_view() {
        let core = lone_core(CoreOptions::default(), View::from_nodes([n(1), n(2)]));
        assert_eq!(core.read_view(), View::from_nodes([n(2)]));
    }

    #[tokio::test]
    async fn received_pushes_shape_next_view() {
        let core = lone_core(CoreOptions::default(), View::new());
        core.receive_node(n(1));
        core.receive_node(n(2));

        core.update_view(Duration::from_millis(10)).await;
        assert_eq!(core.read_view(), View::from_nodes([n(2)]));
        assert_eq!(core.sample(), View::from_nodes([n(2)]));
    }

    #[tokio::test]
    async fn full_inbox_drops_extra_pushes() {
        let options = CoreOptions {
            inbox_capacity: 2,
            ..CoreOptions::default()
        };
        let core = lone_core(options, View::new());
        for port in 2..5 {
            core.receive_node(n(port));
        }

        core.update_view(Duration::from_millis(10)).await;
        assert_eq!(core.read_view(), View::from_nodes([n(2), n(3)]));
    }

    #[tokio::test]
    async fn stopped_core_ignores_everything() {
        let core = lone_core(CoreOptions::default(), View::from_nodes([n(2)]));
        core.stop();
        assert!(!core.is_active());
        assert!(core.read_view().is_empty());

        core.receive_node(n(3));
        core.update_view(Duration::from_millis(10)).await;
        core.validate_sample(Duration::from_millis(10)).await;
        assert!(core.read_view().is_empty());
        assert!(core.sample().is_empty());
    }
}
