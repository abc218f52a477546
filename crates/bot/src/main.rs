mod bootstrap;
mod responder;

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};

use pongbot_core::config::{AppConfig, LoadOptions};
use pongbot_mattermost::client::RestClient;
use pongbot_mattermost::events::EventDispatcher;
use pongbot_mattermost::socket::{EventPump, EventTransport, WebSocketTransport};

use crate::responder::PingResponder;

fn init_logging(config: &AppConfig) {
    use pongbot_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

async fn run() -> Result<()> {
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let mut client = RestClient::new(config.server.base_url.clone());
    let context = bootstrap::bootstrap(&mut client, &config).await?;

    let token = client.auth_token().context("login did not capture a session token")?.to_owned();
    let transport = Arc::new(WebSocketTransport::new(&config.server.websocket_base(), token));

    let client = Arc::new(client);
    let context = Arc::new(context);

    let mut dispatcher = EventDispatcher::new();
    dispatcher.register(PingResponder::new(Arc::clone(&client), Arc::clone(&context)));

    // A failed realtime connection is not fatal: the bot stays up, idle,
    // until interrupted.
    let pump_task = match transport.connect().await {
        Ok(()) => {
            let pump =
                EventPump::new(Arc::clone(&transport) as Arc<dyn EventTransport>, dispatcher);
            Some(tokio::spawn(pump.run()))
        }
        Err(error) => {
            warn!(%error, "could not open the event stream; running without realtime events");
            None
        }
    };

    info!(
        team = %context.team.name,
        user = %context.identity.username,
        "pongbot running; press Ctrl-C to stop"
    );
    wait_for_shutdown().await?;

    info!("interrupt received; shutting down");
    if let Err(error) = transport.close().await {
        warn!(%error, "event stream close failed");
    }
    if let Some(task) = pump_task {
        let _ = task.await;
    }

    Ok(())
}

async fn wait_for_shutdown() -> Result<()> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}
