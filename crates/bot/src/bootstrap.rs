use secrecy::ExposeSecret;
use thiserror::Error;
use tracing::{info, warn};

use pongbot_core::config::AppConfig;
use pongbot_core::{ChannelIgnoreSet, Team, User};
use pongbot_mattermost::client::{ClientError, RestClient};

/// Read-only state produced once by bootstrap and shared with the event
/// side: the bot's own identity, the bound team, and the muted channels.
#[derive(Debug)]
pub struct BotContext {
    pub identity: User,
    pub team: Team,
    pub ignored: ChannelIgnoreSet,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("could not reach the server at `{base_url}`: {source}")]
    Ping {
        base_url: String,
        #[source]
        source: ClientError,
    },
    #[error("login failed for `{login_id}`: {source}")]
    Login {
        login_id: String,
        #[source]
        source: ClientError,
    },
    #[error("initial team load failed: {0}")]
    InitialLoad(#[source] ClientError),
    #[error("bot is not a member of team `{0}`")]
    TeamNotFound(String),
}

/// The ordered startup handshake: ping, login, initial load, team selection,
/// team binding, channel enumeration. Everything up to the team binding is
/// fatal; a channel-listing failure is logged and leaves every channel
/// monitored.
pub async fn bootstrap(
    client: &mut RestClient,
    config: &AppConfig,
) -> Result<BotContext, BootstrapError> {
    let status = client.ping().await.map_err(|source| BootstrapError::Ping {
        base_url: config.server.base_url.clone(),
        source,
    })?;
    info!(version = %status.version, "server detected");

    let identity = client
        .login(&config.bot.login_id, config.bot.password.expose_secret())
        .await
        .map_err(|source| BootstrapError::Login {
            login_id: config.bot.login_id.clone(),
            source,
        })?;
    info!(user = %identity.username, "logged in");

    let teams = client.my_teams().await.map_err(BootstrapError::InitialLoad)?;
    let team = select_team(&teams, &config.bot.team_name)
        .ok_or_else(|| BootstrapError::TeamNotFound(config.bot.team_name.clone()))?;
    client.bind_team(&team.id);
    info!(team = %team.name, "team bound");

    let ignored = match client.my_channels().await {
        Ok(channels) => {
            let ignored =
                ChannelIgnoreSet::from_channels(&channels, config.bot.monitor_town_square);
            for channel in &channels {
                if !ignored.contains(&channel.id) {
                    info!(channel = %channel.name, "monitoring channel");
                }
            }
            ignored
        }
        Err(error) => {
            warn!(%error, "could not list channels; monitoring everything");
            ChannelIgnoreSet::default()
        }
    };

    Ok(BotContext { identity, team, ignored })
}

/// Exact name match, first match wins.
fn select_team(teams: &[Team], name: &str) -> Option<Team> {
    teams.iter().find(|team| team.name == name).cloned()
}
