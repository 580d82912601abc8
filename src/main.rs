//! Bragfeed API Server
//!
//! Rate-limited review feed API with Stripe subscription billing.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use bragfeed::reviews::StaticReviewSource;
use bragfeed::server::{router, serve, AppState};
use bragfeed::store::{InMemoryEventStore, InMemorySubscriberStore};
use bragfeed::stripe::{StripeWebhookConfig, StripeWebhookState};

/// Bragfeed API Server
#[derive(Parser, Debug)]
#[command(name = "bragfeed-api")]
#[command(version)]
#[command(about = "Rate-limited review feed API with Stripe subscription billing")]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "3000")]
    port: u16,

    /// Host to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize tracing
    let filter = if args.verbose { "debug" } else { "info" };

    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = StripeWebhookConfig::from_env().context("loading webhook configuration")?;

    // The binary ships with in-memory backends; production deployments
    // plug a database adapter in behind the store traits.
    let subscribers = Arc::new(InMemorySubscriberStore::new());
    let state = AppState::new(
        Arc::new(InMemoryEventStore::new()),
        subscribers.clone(),
        Arc::new(StaticReviewSource::new()),
    );
    let webhook = Arc::new(StripeWebhookState::new(&config, subscribers));

    let addr: SocketAddr = format!("{}:{}", args.host, args.port)
        .parse()
        .context("parsing bind address")?;

    serve(addr, router(state, webhook)).await?;
    Ok(())
}
