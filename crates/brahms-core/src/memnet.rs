//! In-process network of cores.
//!
//! Every registered core is reachable by its node address. Stopped cores
//! behave like crashed hosts: pushes and pulls to them fail, probes report
//! them inactive.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, Weak};

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::TransportError;
use crate::transport::{decode_push, Result, Transport};
use crate::{Core, Nid, Node, View};

/// A [`Transport`] that delivers directly to cores in the same process.
#[derive(Debug, Default)]
pub struct MemNetTransport {
    cores: RwLock<HashMap<Nid, Weak<Core>>>,
}

impl MemNetTransport {
    /// Create an empty network.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `core` reachable at its own node address.
    pub fn add_core(&self, core: &Arc<Core>) {
        self.cores
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(core.self_node().hash(), Arc::downgrade(core));
    }

    /// Number of registered cores.
    pub fn len(&self) -> usize {
        self.cores.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Check if no core is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lookup(&self, node: &Node) -> Result<Arc<Core>> {
        self.cores
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&node.hash())
            .and_then(Weak::upgrade)
            .ok_or_else(|| TransportError::Unreachable(node.to_string()))
    }

    fn reachable(&self, node: &Node) -> Result<Arc<Core>> {
        let core = self.lookup(node)?;
        if !core.is_active() {
            return Err(TransportError::Unreachable(node.to_string()));
        }
        Ok(core)
    }
}

#[async_trait]
impl Transport for MemNetTransport {
    async fn emit(&self, acks: &mpsc::Sender<Nid>, id: Nid, msg: &[u8], to: &Node) -> Result<()> {
        let target = self.reachable(to)?;
        target.receive_node(decode_push(msg)?);
        let _ = acks.try_send(id);
        Ok(())
    }

    async fn push(&self, me: &Node, to: &Node) -> Result<()> {
        self.reachable(to)?.receive_node(*me);
        Ok(())
    }

    async fn pull(&self, from: &Node) -> Result<View> {
        Ok(self.reachable(from)?.read_view())
    }

    async fn probe(&self, to: &Node) -> Result<bool> {
        Ok(self.lookup(to)?.is_active())
    }
}
