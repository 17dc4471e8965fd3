//! Swicord - keeps a gateway presence session alive from the command line.

use std::env;
use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use swicord_client::{
    AutoPresence, Config, GatewaySession, PresenceDispatcher, SessionState, TracingSink,
};

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn print_version() {
    println!("swicord {}", VERSION);
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Handle --version / -V
    let args: Vec<String> = env::args().collect();
    if args.iter().any(|a| a == "--version" || a == "-V") {
        print_version();
        return Ok(());
    }

    // Initialize tracing
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::load().map_err(|e| {
        format!(
            "Failed to load configuration: {}. \
             Make sure swicord.toml exists or set SWICORD__CREDENTIALS__TOKEN.",
            e
        )
    })?;
    tracing::info!("Starting swicord {} against {}", VERSION, config.gateway.url);

    let session = GatewaySession::new(config.gateway.clone(), Arc::new(TracingSink));
    let auto_presence = Arc::new(AutoPresence::new(session.clone(), config.presence.clone()));

    // Refresh presence once the handshake completes, stop when the session drops
    let mut statuses = session.subscribe().await;
    let watcher = {
        let session = session.clone();
        let auto_presence = Arc::clone(&auto_presence);
        let auto_update = config.auto_update.clone();
        let presence = config.presence.clone();
        tokio::spawn(async move {
            let mut announced = false;
            while let Some(status) = statuses.recv().await {
                tracing::info!(connected = status.connected, "{}", status.status_text);
                if !status.connected {
                    auto_presence.stop();
                    announced = false;
                    continue;
                }
                if announced || session.state().await != SessionState::Ready {
                    continue;
                }
                announced = true;
                if auto_update.enabled {
                    auto_presence.start(Duration::from_secs(auto_update.interval_secs));
                } else {
                    session.update_presence(&presence).await;
                }
            }
        })
    };

    // Start the HTTP fallback if configured
    let dispatcher = if config.dispatcher.enabled {
        let dispatcher = Arc::new(PresenceDispatcher::new(&config.dispatcher, &config.credentials)?);
        dispatcher.start_periodic(Duration::from_secs(config.dispatcher.interval_secs));
        Some(dispatcher)
    } else {
        tracing::info!("Presence dispatcher disabled");
        None
    };

    if let Err(e) = session.connect(&config.credentials).await {
        tracing::error!("Gateway connection failed: {}", e);
    }

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down");

    auto_presence.stop();
    if let Some(dispatcher) = &dispatcher {
        dispatcher.stop();
    }
    session.disconnect().await;
    watcher.abort();

    Ok(())
}
