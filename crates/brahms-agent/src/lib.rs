//! Brahms Agent
//!
//! Runs a Brahms membership node over HTTP: a listener answering peers and
//! timers driving gossip rounds and sample validation.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use brahms_agent::{Agent, AgentConfig};
//! use brahms_core::View;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let agent = Agent::new(AgentConfig::from_env()?).await?;
//!     agent.join(View::new())?;
//!
//!     tokio::signal::ctrl_c().await?;
//!     agent.shutdown(Duration::from_secs(5)).await?;
//!     Ok(())
//! }
//! ```

mod agent;
mod config;
mod error;

pub use agent::Agent;
pub use config::AgentConfig;
pub use error::{Error, Result};
