//! A Brahms node on a real network.
//!
//! [`Agent::new`] binds the listener, [`Agent::join`] starts the node:
//!
//! 1. HTTP server answering peers (push, pull, probe)
//! 2. Gossip timer running [`Core::update_view`]
//! 3. Validation timer running [`Core::validate_sample`]
//! 4. One-shot announcement of our identity to the bootstrap peers
//!
//! All four run as independent tasks until [`Agent::shutdown`].

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use std::time::Duration;

use brahms_core::{transport::encode_push, Core, Node, Params, Transport, View};
use brahms_http::{router, HttpTransport, JsonCodec};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::config::AgentConfig;
use crate::error::{Error, Result};

/// Runs one [`Core`] behind an HTTP listener.
pub struct Agent {
    config: AgentConfig,
    params: Params,
    me: Node,
    transport: Arc<HttpTransport>,
    /// Taken by `join`; dropped by `shutdown`.
    listener: Mutex<Option<TcpListener>>,
    core: OnceLock<Arc<Core>>,
    shutdown: watch::Sender<bool>,
    tasks: Mutex<JoinSet<()>>,
}

impl Agent {
    /// Validate `config` and bind the listener.
    ///
    /// The node identity is the configured address plus the bound port, so
    /// port 0 yields a usable identity too.
    pub async fn new(config: AgentConfig) -> Result<Self> {
        let ip = config
            .listen_addr
            .ok_or_else(|| Error::invalid("listen", "no listen address configured"))?;
        let params = config.params()?;
        for (name, period) in [
            ("update_interval", config.update_interval),
            ("validate_interval", config.validate_interval),
        ] {
            if period.is_zero() {
                return Err(Error::invalid("config", format!("{name} must be positive")));
            }
        }

        let transport =
            HttpTransport::new(config.request_timeout).map_err(|e| Error::invalid("transport", e.to_string()))?;

        let listener = TcpListener::bind((ip, config.listen_port))
            .await
            .map_err(|source| Error::Io { op: "listen", source })?;
        let port = listener
            .local_addr()
            .map_err(|source| Error::Io { op: "listen", source })?
            .port();

        let me = Node::new(ip, port);
        info!(%me, "agent listening");

        let (shutdown, _) = watch::channel(false);
        Ok(Self {
            config,
            params,
            me,
            transport: Arc::new(transport),
            listener: Mutex::new(Some(listener)),
            core: OnceLock::new(),
            shutdown,
            tasks: Mutex::new(JoinSet::new()),
        })
    }

    /// The address peers reach this agent at.
    pub fn self_node(&self) -> Node {
        self.me
    }

    /// The running core, once joined.
    pub fn core(&self) -> Option<Arc<Core>> {
        self.core.get().cloned()
    }

    /// Start taking part in the protocol with `view` as the bootstrap peers.
    ///
    /// An empty view starts a new group. Must be called from within a tokio
    /// runtime. Fails with op `"join"` when already joined or shut down.
    pub fn join(&self, view: View) -> Result<()> {
        let listener = lock(&self.listener)
            .take()
            .ok_or_else(|| Error::invalid("join", "agent already joined or shut down"))?;

        let rng = match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let transport: Arc<dyn Transport> = self.transport.clone();
        let core = Arc::new(Core::new(rng, self.me, view, self.params, transport.clone()));
        if self.core.set(core.clone()).is_err() {
            return Err(Error::invalid("join", "agent already joined"));
        }

        let mut tasks = lock(&self.tasks);
        tasks.spawn(serve(listener, core.clone(), self.shutdown.subscribe()));

        let gossip = core.clone();
        let budget = self.config.update_budget;
        tasks.spawn(every("gossip", self.config.update_interval, self.shutdown.subscribe(), move || {
            let core = gossip.clone();
            async move { core.update_view(budget).await }
        }));

        let validation = core.clone();
        let budget = self.config.validate_budget;
        tasks.spawn(every("validation", self.config.validate_interval, self.shutdown.subscribe(), move || {
            let core = validation.clone();
            async move { core.validate_sample(budget).await }
        }));

        let peers = core.read_view();
        info!(me = %self.me, peers = peers.len(), "joined");
        if !peers.is_empty() {
            tasks.spawn(announce(transport, self.me, peers, self.config.update_budget));
        }
        Ok(())
    }

    /// Stop the core and wait up to `deadline` for all tasks to end.
    ///
    /// Tasks still running at the deadline are aborted and the call fails
    /// with op `"shutdown"`. Allowed before [`join`](Self::join).
    pub async fn shutdown(&self, deadline: Duration) -> Result<()> {
        self.shutdown.send_replace(true);
        lock(&self.listener).take();
        if let Some(core) = self.core.get() {
            core.stop();
        }

        let mut tasks = std::mem::take(&mut *lock(&self.tasks));
        let drained = timeout(deadline, async {
            while let Some(res) = tasks.join_next().await {
                if let Err(e) = res {
                    if e.is_panic() {
                        error!(error = %e, "agent task panicked");
                    }
                }
            }
        })
        .await;
        tasks.abort_all();

        match drained {
            Ok(()) => {
                info!(me = %self.me, "agent shut down");
                Ok(())
            }
            Err(_) => Err(Error::Timeout {
                op: "shutdown",
                after: deadline,
            }),
        }
    }
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("me", &self.me)
            .field("joined", &self.core.get().is_some())
            .finish_non_exhaustive()
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

async fn wait_for_shutdown(mut rx: watch::Receiver<bool>) {
    while !*rx.borrow_and_update() {
        if rx.changed().await.is_err() {
            break;
        }
    }
}

async fn serve(listener: TcpListener, core: Arc<Core>, shutdown: watch::Receiver<bool>) {
    let app = router(core, Arc::new(JsonCodec));
    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(wait_for_shutdown(shutdown))
        .await
    {
        error!(error = %e, "http server failed");
    }
}

/// Run `tick` every `period` until shutdown. Ticks never overlap.
async fn every<F, Fut>(name: &'static str, period: Duration, mut shutdown: watch::Receiver<bool>, mut tick: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ()>,
{
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        if *shutdown.borrow_and_update() {
            break;
        }
        tokio::select! {
            _ = ticker.tick() => tick().await,
            changed = shutdown.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }
    debug!(timer = name, "timer stopped");
}

/// Push our identity to every bootstrap peer once.
async fn announce(transport: Arc<dyn Transport>, me: Node, peers: View, budget: Duration) {
    let msg = match encode_push(&me) {
        Ok(msg) => Arc::new(msg),
        Err(e) => {
            error!(error = %e, "failed to encode announcement");
            return;
        }
    };

    let id = me.hash();
    let (acks, mut acked) = mpsc::channel(peers.len().max(1));
    let mut sends = JoinSet::new();
    for peer in peers {
        let (transport, acks, msg) = (transport.clone(), acks.clone(), msg.clone());
        sends.spawn(async move {
            if let Err(e) = transport.emit(&acks, id, &msg, &peer).await {
                debug!(%peer, error = %e, "announcement failed");
            }
        });
    }
    drop(acks);

    let _ = timeout(budget, async { while sends.join_next().await.is_some() {} }).await;
    sends.abort_all();

    let mut delivered = 0;
    while acked.try_recv().is_ok() {
        delivered += 1;
    }
    info!(%me, delivered, "announced to bootstrap peers");
}
