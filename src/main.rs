use anyhow::Result;
use clap::Parser;
use slaacd_core::config::{Config, LoggingConfig};
use slaacd_engine::{Engine, EngineServer};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "slaacd", about = "slaacd - IPv6 router advertisement engine")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "/etc/slaacd/slaacd.toml")]
    config: PathBuf,

    /// Raise log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::from_file(&cli.config)?;

    // Initialize logging
    init_logging(&config.logging, cli.verbose);

    info!(instance_id = %config.instance.id, "starting slaacd");

    // Shutdown signal
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Initialize message bus
    let (backend, topic_prefix, url) = match config.messaging {
        Some(ref msg_config) => (
            msg_config.backend.clone(),
            msg_config.topic_prefix.clone(),
            msg_config.url.clone(),
        ),
        None => ("noop".to_string(), "slaacd".to_string(), None),
    };

    let message_bus: Arc<dyn slaacd_msg::MessageBus> = Arc::from(
        slaacd_msg::create_message_bus(
            &backend,
            &config.instance.id,
            &topic_prefix,
            url.as_deref(),
            config.engine.channel_capacity,
        )
        .await?,
    );
    info!(backend = %backend, "message bus initialized");

    // Start the engine
    let server = EngineServer::new(Engine::new(), message_bus.clone());
    let rx = shutdown_rx.clone();
    let engine_task = tokio::spawn(async move {
        if let Err(e) = server.run(rx).await {
            error!("engine error: {e}");
        }
    });

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received, stopping engine...");
    let _ = shutdown_tx.send(true);

    // Shut down message bus
    if let Err(e) = message_bus.shutdown().await {
        error!("message bus shutdown error: {e}");
    }

    let _ = engine_task.await;

    info!("slaacd stopped");
    Ok(())
}

fn init_logging(config: &LoggingConfig, verbose: u8) {
    use tracing_subscriber::EnvFilter;

    let level = match verbose {
        0 => config.level.as_str(),
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    match config.format.as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .json()
                .init();
        }
        _ => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
        }
    }
}
