//! Podsearch worker process
//!
//! Owns the ML engines and the transcript index for a UI process.
//! Communication is via JSON lines over stdin/stdout; logs go to stderr.

mod handler;

use anyhow::Result;
use podsearch_pipeline::{PipelineContext, Settings};
use std::io;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() {
    // stdout is for IPC
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "warn,podsearch=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    tracing::info!("Podsearch worker starting");

    if let Err(e) = run_worker() {
        tracing::error!("Worker error: {:#}", e);
        std::process::exit(1);
    }
}

fn run_worker() -> Result<()> {
    let settings = Settings::load();
    let ctx = PipelineContext::from_settings(&settings)?;
    let worker = handler::Worker::new(&ctx, &settings);

    handler::run(&worker, io::stdin().lock(), io::stdout())
}
