use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use picod::Config;
use picod::Engine;
use tracing::error;
use tracing::info;
use tracing::warn;
use tracing_subscriber::prelude::*;

/// Lutron Pico remote to light automation daemon
#[derive(Debug, Parser)]
#[command(name = "picod", version)]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "picod.toml")]
    config: PathBuf,

    /// Validate the configuration, print the remote mapping, and exit
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = Config::from_file(&args.config)
        .with_context(|| format!("Failed to load {}", args.config.display()))?;

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_filter(config.logging.targets()))
        .init();

    info!("picod starting");
    info!("Loaded config from: {}", args.config.display());

    let mut engine = Engine::from_config(&config);

    if engine.pico().registry().is_empty() {
        warn!("No remotes configured in [pico.light_mapping]");
    }
    for trigger in engine.pico().registry().iter() {
        info!(
            "Pico {} controls {} (state: {})",
            trigger.device_id, trigger.light_entity_id, trigger.app_entity_id
        );
    }

    if args.check {
        println!("{}: ok", args.config.display());
        println!(
            "brightness step: {}%, scenes: {}",
            config.pico.brightness_step_pct,
            engine.pico().scenes().len()
        );
        for trigger in engine.pico().registry().iter() {
            println!("{} -> {}", trigger.device_id, trigger.light_entity_id);
        }
        return Ok(());
    }

    engine.register_integrations_from_config(&config);
    let engine = Arc::new(engine);

    let api = config.api.clone().map(|api_config| {
        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
        let engine = engine.clone();
        let handle = tokio::spawn(async move {
            if let Err(e) =
                picod::api::serve(api_config.listen, api_config.port, engine, shutdown_rx).await
            {
                error!("HTTP API server failed: {:#}", e);
            }
        });
        (shutdown_tx, handle)
    });

    let engine_task = {
        let engine = engine.clone();
        tokio::spawn(async move {
            if let Err(e) = engine.run().await {
                error!("Engine stopped with error: {}", e);
            }
        })
    };

    info!("Press Ctrl+C to exit");

    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Received shutdown signal"),
        Err(e) => error!("Failed to listen for shutdown signal: {}", e),
    }

    if let Some((shutdown_tx, handle)) = api {
        let _ = shutdown_tx.send(());
        if let Err(e) = handle.await {
            error!("HTTP API task failed: {}", e);
        }
    }

    engine_task.abort();

    info!("picod shutdown complete");

    Ok(())
}
