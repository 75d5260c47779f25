//! # roomstated — roomstate daemon
//!
//! Composition root that wires the in-memory adapters to the rule engine.
//!
//! ## Responsibilities
//! - Parse configuration (config file, env vars)
//! - Install the `tracing` subscriber
//! - Construct the state store, settings and action sink (adapters)
//! - Construct the rule engine, injecting adapters via port traits
//! - Load definitions from the TOML document
//! - Feed JSON-lines state reports from stdin into the store and event bus
//! - Handle graceful shutdown (Ctrl-C or end of input)
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer — no domain logic belongs here.

mod config;
mod ingest;

use std::sync::Arc;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::LinesStream;
use tracing_subscriber::EnvFilter;

use roomstate_adapter_memory::{InMemoryStateStore, LoggingActionSink, TomlDefinitionSource};
use roomstate_app::clock::SystemClock;
use roomstate_app::event_bus::InProcessEventBus;
use roomstate_app::ports::EventPublisher;
use roomstate_app::rule_engine::RuleEngine;

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load().context("loading configuration")?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&config.logging.filter))
        .init();

    // Adapters
    let store = Arc::new(InMemoryStateStore::new());
    let settings = Arc::new(config.settings());
    let bus = Arc::new(InProcessEventBus::new(config.engine.channel_capacity));

    // Engine
    let engine = RuleEngine::new(
        config.engine_config(),
        store.clone(),
        settings,
        LoggingActionSink,
        bus.clone(),
        Arc::new(SystemClock),
    );
    let source = TomlDefinitionSource::new(&config.definitions.path);
    if let Err(err) = engine.reload(&source).await {
        tracing::warn!(path = %source.path().display(), error = %err, "no definitions loaded");
    }
    let engine_task = engine.start(bus.subscribe());

    // Observers
    let mut updates = bus.subscribe_updates();
    let observer = engine.clone();
    let updates_task = tokio::spawn(async move {
        while let Ok(area) = updates.recv().await {
            tracing::info!(%area, activity = %observer.activity(&area), "area updated");
        }
    });

    tracing::info!(definitions = %config.definitions.path, "roomstated reading state reports from stdin");
    let mut lines = LinesStream::new(BufReader::new(tokio::io::stdin()).lines());
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupted");
                break;
            }
            line = lines.next() => match line {
                Some(Ok(line)) => match ingest::parse_line(&line) {
                    Ok(Some(report)) => {
                        let change = ingest::apply(&store, report);
                        bus.publish(change).await?;
                    }
                    Ok(None) => {}
                    Err(err) => tracing::warn!(error = %err, "report skipped"),
                },
                Some(Err(err)) => return Err(err).context("reading stdin"),
                None => {
                    tracing::info!("end of input");
                    break;
                }
            },
        }
    }

    engine.stop();
    engine_task.await.context("joining rule engine")?;
    updates_task.abort();
    tracing::info!(statistics = ?engine.statistics(), "roomstated stopped");
    Ok(())
}
