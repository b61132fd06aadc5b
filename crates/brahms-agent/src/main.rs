//! brahmsd
//!
//! Runs a single Brahms node until interrupted.

use std::time::Duration;

use brahms_agent::{Agent, AgentConfig};
use brahms_core::{Node, View};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const SHUTDOWN_DEADLINE: Duration = Duration::from_secs(5);

#[derive(Parser, Debug)]
#[command(name = "brahmsd")]
#[command(about = "Brahms gossip membership daemon")]
struct Args {
    /// Peer to bootstrap from (host:port); starts a new group when omitted
    bootstrap: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "brahmsd=info,brahms=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let config = AgentConfig::from_env()?;

    let mut view = View::new();
    if let Some(peer) = &args.bootstrap {
        let addr = tokio::net::lookup_host(peer)
            .await?
            .next()
            .ok_or_else(|| format!("bootstrap peer {peer} did not resolve"))?;
        view.insert(Node::from(addr));
    }

    let agent = Agent::new(config).await?;
    agent.join(view)?;
    tracing::info!(me = %agent.self_node(), "brahmsd running");

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down");
    agent.shutdown(SHUTDOWN_DEADLINE).await?;

    Ok(())
}
