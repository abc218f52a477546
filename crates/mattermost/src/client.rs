use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use pongbot_core::domain::channel::Channel;
use pongbot_core::domain::post::{NewPost, Post};
use pongbot_core::domain::team::{Team, TeamId};
use pongbot_core::domain::user::User;

const API_PREFIX: &str = "/api/v4";
/// Response header carrying the session token after a successful login.
const SESSION_TOKEN_HEADER: &str = "Token";
/// The server stamps every response with its version; the ping body does not
/// always carry one.
const SERVER_VERSION_HEADER: &str = "X-Version-Id";

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("http transport failure: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("server rejected the request with status {status}: {message}")]
    Api { status: u16, message: String },
    #[error("no session token captured; login must succeed first")]
    MissingToken,
    #[error("no active team bound; bind_team must run first")]
    NoActiveTeam,
    #[error("could not decode server response: {0}")]
    Decode(#[source] reqwest::Error),
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct ServerStatus {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub version: String,
}

#[derive(Debug, Default, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: String,
}

/// REST client for the server's v4 HTTP API.
///
/// Login captures the session token, and `bind_team` pins the active team;
/// both are client state set once during bootstrap, before the client is
/// shared with the event-handling side.
pub struct RestClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
    active_team: Option<TeamId>,
}

impl RestClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token: None,
            active_team: None,
        }
    }

    /// Client authenticated with a pre-issued session or personal access
    /// token, skipping the login call.
    pub fn with_token(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        let mut client = Self::new(base_url);
        client.token = Some(token.into());
        client
    }

    pub fn auth_token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn active_team(&self) -> Option<&TeamId> {
        self.active_team.as_ref()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{API_PREFIX}{path}", self.base_url)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http.request(method, self.url(path))
    }

    fn authed(&self, method: Method, path: &str) -> Result<RequestBuilder, ClientError> {
        let token = self.token.as_deref().ok_or(ClientError::MissingToken)?;
        Ok(self.request(method, path).bearer_auth(token))
    }

    /// Liveness probe. Succeeds iff the server answers; surfaces the reported
    /// version for display.
    pub async fn ping(&self) -> Result<ServerStatus, ClientError> {
        let response = self.request(Method::GET, "/system/ping").send().await?;
        let version_header = header_value(&response, SERVER_VERSION_HEADER);

        let mut status: ServerStatus = decode(response).await?;
        if status.version.is_empty() {
            if let Some(version) = version_header {
                status.version = version;
            }
        }
        Ok(status)
    }

    /// Authenticate and capture the session token for all further calls.
    pub async fn login(&mut self, login_id: &str, password: &str) -> Result<User, ClientError> {
        let response = self
            .request(Method::POST, "/users/login")
            .json(&serde_json::json!({ "login_id": login_id, "password": password }))
            .send()
            .await?;
        let token = header_value(&response, SESSION_TOKEN_HEADER);

        let user: User = decode(response).await?;
        self.token = Some(token.ok_or(ClientError::MissingToken)?);
        debug!(user = %user.username, "session established");
        Ok(user)
    }

    /// Teams the authenticated account belongs to (the initial load).
    pub async fn my_teams(&self) -> Result<Vec<Team>, ClientError> {
        let response = self.authed(Method::GET, "/users/me/teams")?.send().await?;
        decode(response).await
    }

    /// Pin the active team. Channel operations are scoped to it from here on.
    pub fn bind_team(&mut self, team: &TeamId) {
        self.active_team = Some(team.clone());
    }

    /// Channels of the bound team the account is a member of.
    pub async fn my_channels(&self) -> Result<Vec<Channel>, ClientError> {
        let team = self.active_team.as_ref().ok_or(ClientError::NoActiveTeam)?;
        let path = format!("/users/me/teams/{}/channels", team.0);
        let response = self.authed(Method::GET, &path)?.send().await?;
        decode(response).await
    }

    pub async fn create_post(&self, post: &NewPost) -> Result<Post, ClientError> {
        let response = self.authed(Method::POST, "/posts")?.json(post).send().await?;
        decode(response).await
    }
}

fn header_value(response: &Response, name: &str) -> Option<String> {
    response.headers().get(name).and_then(|value| value.to_str().ok()).map(str::to_owned)
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    let status = response.status();
    if !status.is_success() {
        let body: ApiErrorBody = response.json().await.unwrap_or_default();
        let message = if body.message.is_empty() {
            status.canonical_reason().unwrap_or("unknown error").to_string()
        } else {
            body.message
        };
        return Err(ClientError::Api { status: status.as_u16(), message });
    }

    response.json::<T>().await.map_err(ClientError::Decode)
}
