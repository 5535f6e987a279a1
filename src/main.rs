//! gibolin-stream - personal audio library streaming server
//!
//! Main entry point: loads the configuration, starts the token sweeper and
//! serves HTTP until Ctrl-C.

use std::sync::Arc;

use anyhow::Context;
use gibolin_stream::config::{ConfigStore, ConfigStoreConfig};
use gibolin_stream::logging::LoggingSystem;
use gibolin_stream::server::{verifier_from_config, StreamServer};
use gibolin_stream::token::CapabilityStore;
use tracing::level_filters::LevelFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let store = ConfigStore::new(ConfigStoreConfig::default())
        .await
        .context("failed to load configuration")?;
    let config_path = store.config_path().to_path_buf();
    let config = store.into_config();

    // The guard inside keeps the file writer flushing until exit
    let _logging_system = match LoggingSystem::init(config.logging.clone()) {
        Ok(system) => {
            match system.log_directory() {
                Some(dir) => tracing::info!("Logging system initialized, files in {:?}", dir),
                None => tracing::info!("Logging system initialized"),
            }
            Some(system)
        }
        Err(e) => {
            // Fall back to basic logging if advanced logging fails
            eprintln!("Failed to initialize logging system: {}. Using basic logging.", e);
            tracing_subscriber::fmt()
                .with_env_filter(
                    tracing_subscriber::EnvFilter::from_default_env()
                        .add_directive(LevelFilter::from(config.logging.level).into()),
                )
                .init();
            None
        }
    };

    tracing::info!("Starting gibolin-stream with configuration {:?}", config_path);

    let tokens = Arc::new(CapabilityStore::new(config.token_ttl()));
    let sweeper = tokens.start_sweeping(config.sweep_interval());
    tracing::info!(
        "Token store ready: ttl {:?}, sweep every {:?}",
        tokens.ttl(),
        config.sweep_interval()
    );

    let verifier = verifier_from_config(&config.identity).context("failed to set up identity provider")?;
    let server = StreamServer::new(&config, Arc::clone(&tokens), verifier)?;
    tracing::info!(
        "Mixes at http://{}/mp3/<token>, whitelist of {} address(es)",
        server.addr(),
        config.whitelist.len()
    );

    let result = server
        .serve(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
            }
            tracing::info!("Shutdown requested");
        })
        .await;

    sweeper.stop().await;
    tracing::info!("Token sweeper stopped");

    result.context("stream server failed")
}
