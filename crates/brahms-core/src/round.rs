//! One Brahms round, and the liveness validation pass.
//!
//! # Round
//!
//! ```text
//! view ──pick L1α──▶ push(self) ─┐
//! view ──pick L1β──▶ pull ───────┤  (concurrent, one shared budget)
//!                                ▼
//!                 budget over: abort stragglers
//!                                ▼
//!      drain inbound pushes ─▶ push    drain pull results ─▶ pull
//!      (drop self)                     (drop self, drop invalidated)
//!                                ▼
//!                  sampler.update(push ∪ pull)
//!                                ▼
//!      |push| > L1α ?  keep old view
//!      otherwise       push.pick(L1α) ∪ pull.pick(L1β) ∪ sample.pick(L1γ)
//! ```
//!
//! The view is rebuilt from scratch every round, even when push and pull
//! both came back empty, so unresponsive peers drop out of small networks.
//! Pull results naming a recently invalidated node are discarded, so peers
//! stop handing dead entries back and forth.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::timeout;
use tracing::{debug, trace, warn};

use crate::transport::Transport;
use crate::{Nid, Node, Params, Sampler, View};

/// Everything a round needs besides the rng, the inbound pushes and the
/// current view.
pub struct Round<'a> {
    /// The local node.
    pub me: &'a Node,
    pub params: &'a Params,
    /// Time allowed for the fan-out before stragglers are abandoned.
    pub budget: Duration,
    pub sampler: &'a Sampler,
    pub transport: &'a Arc<dyn Transport>,
}

impl Round<'_> {
    /// Execute one round and return the next view.
    ///
    /// The sampler is updated as a side effect. `view` itself is not
    /// touched; the caller decides where the result goes.
    pub async fn run<R>(&self, rng: &mut R, pushes: &mut mpsc::Receiver<Node>, view: &View) -> View
    where
        R: Rng + Send + ?Sized,
    {
        let params = self.params;
        let push_targets = view.pick(rng, params.l1_alpha());
        let pull_targets = view.pick(rng, params.l1_beta());

        let (pull_tx, mut pull_rx) = mpsc::channel::<View>(params.l1_beta().max(1));
        let mut tasks = JoinSet::new();

        for to in push_targets {
            let transport = Arc::clone(self.transport);
            let me = *self.me;
            tasks.spawn(async move {
                if let Err(e) = transport.push(&me, &to).await {
                    debug!(peer = %to, error = %e, "push failed");
                }
            });
        }

        for from in pull_targets {
            let transport = Arc::clone(self.transport);
            let results = pull_tx.clone();
            tasks.spawn(async move {
                match transport.pull(&from).await {
                    Ok(pulled) => {
                        // Sized to L1β and each pull sends once: never full.
                        let _ = results.try_send(pulled);
                    }
                    Err(e) => debug!(peer = %from, error = %e, "pull failed"),
                }
            });
        }
        drop(pull_tx);

        let completed = timeout(self.budget, async {
            while tasks.join_next().await.is_some() {}
        })
        .await
        .is_ok();
        if !completed {
            trace!(outstanding = tasks.len(), "round budget elapsed, abandoning peers");
            tasks.abort_all();
        }

        let self_id = self.me.hash();

        let mut push = View::new();
        while let Ok(node) = pushes.try_recv() {
            if node.hash() != self_id {
                push.insert(node);
            }
        }

        let mut pull = View::new();
        while let Ok(pulled) = pull_rx.try_recv() {
            for node in pulled {
                let id = node.hash();
                if id == self_id || self.sampler.recently_invalidated(&id) {
                    continue;
                }
                pull.insert(node);
            }
        }

        let flooded = push.len() > params.l1_alpha();

        self.sampler.update(&push.concat(&pull));

        if flooded {
            warn!(
                me = %self.me,
                pushes = push.len(),
                limit = params.l1_alpha(),
                "too many pushes this round, keeping previous view"
            );
            return view.clone();
        }

        let next = push
            .pick(rng, params.l1_alpha())
            .concat(&pull.pick(rng, params.l1_beta()))
            .concat(&self.sampler.sample().pick(rng, params.l1_gamma()));

        debug!(
            me = %self.me,
            pushes = push.len(),
            pulls = pull.len(),
            view = next.len(),
            "round complete"
        );

        next
    }
}

/// Probe every sampled node and invalidate the ones that do not answer
/// `active` within `budget`. Returns the number of invalidated nodes.
pub async fn validate(sampler: &Sampler, transport: &Arc<dyn Transport>, budget: Duration) -> usize {
    let targets = sampler.sample();
    if targets.is_empty() {
        return 0;
    }

    let mut tasks = JoinSet::new();
    for node in targets.nodes().copied() {
        let transport = Arc::clone(transport);
        tasks.spawn(async move {
            match transport.probe(&node).await {
                Ok(active) => (node, active),
                Err(e) => {
                    debug!(peer = %node, error = %e, "probe failed");
                    (node, false)
                }
            }
        });
    }

    let mut responsive: HashSet<Nid> = HashSet::new();
    let _ = timeout(budget, async {
        while let Some(joined) = tasks.join_next().await {
            if let Ok((node, true)) = joined {
                responsive.insert(node.hash());
            }
        }
    })
    .await;
    tasks.abort_all();

    let mut invalidated = 0;
    for (id, node) in targets.iter() {
        if !responsive.contains(id) {
            debug!(peer = %node, "invalidating unresponsive node");
            sampler.invalidate(node);
            invalidated += 1;
        }
    }
    invalidated
}
