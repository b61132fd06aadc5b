//! Brahms Gossip Membership
//!
//! Each node keeps a small, constantly refreshed view of reachable peers
//! without any central directory. Views are rebuilt every round from three
//! sources:
//!
//! - **Push**: peers advertising themselves to us
//! - **Pull**: views fetched from peers in our view
//! - **Sample**: a long-horizon random sample of everything observed
//!
//! # Design
//!
//! Node identifiers are 32-byte Blake3 hashes of the node's address. A
//! round fans out pushes and pulls concurrently under one time budget and
//! ignores whatever has not answered when the budget runs out. If more
//! pushes arrive than the push fan-in could legitimately produce, the round
//! keeps the old view (flood guard) but still feeds the sampler.
//!
//! A separate validation pass probes the sample. Nodes that fail are kept
//! out of the sample and out of pull results for a retention window.
//!
//! # Example
//!
//! ```no_run
//! use std::net::Ipv4Addr;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use brahms_core::{Core, MemNetTransport, Node, Params, View};
//! use rand::{rngs::StdRng, SeedableRng};
//!
//! # async fn run() -> brahms_core::Result<()> {
//! let params = Params::new(0.45, 0.45, 0.1, 10, 10)?;
//! let net = Arc::new(MemNetTransport::new());
//!
//! let a = Node::new(Ipv4Addr::LOCALHOST, 1);
//! let b = Node::new(Ipv4Addr::LOCALHOST, 2);
//! let core = Arc::new(Core::new(StdRng::seed_from_u64(1), a, View::from_nodes([b]), params, net.clone()));
//! net.add_core(&core);
//!
//! core.update_view(Duration::from_millis(10)).await;
//! core.validate_sample(Duration::from_millis(10)).await;
//! # Ok(())
//! # }
//! ```

mod engine;
mod error;
mod memnet;
mod node;
mod params;
pub mod round;
mod sampler;
pub mod transport;
mod view;

pub use engine::{Core, CoreOptions, DEFAULT_INBOX_CAPACITY};
pub use error::{Error, Result, TransportError};
pub use memnet::MemNetTransport;
pub use node::{Nid, Node};
pub use params::Params;
pub use sampler::{Sampler, DEFAULT_INVALIDATION_RETENTION};
pub use transport::{Responder, Transport};
pub use view::View;
