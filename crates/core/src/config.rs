use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub bot: BotConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub base_url: String,
    pub ws_url: Option<String>,
}

#[derive(Clone, Debug)]
pub struct BotConfig {
    pub login_id: String,
    pub password: SecretString,
    pub team_name: String,
    pub monitor_town_square: bool,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub base_url: Option<String>,
    pub ws_url: Option<String>,
    pub login_id: Option<String>,
    pub password: Option<String>,
    pub team_name: Option<String>,
    pub monitor_town_square: Option<bool>,
    pub log_level: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        // Defaults mirror the sample-bot constants: a local server, the
        // `samplebot` account, and the `test` team with town-square muted.
        Self {
            server: ServerConfig { base_url: "http://localhost:8065".to_string(), ws_url: None },
            bot: BotConfig {
                login_id: "samplebot".to_string(),
                password: "password1".to_string().into(),
                team_name: "test".to_string(),
                monitor_town_square: false,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl ServerConfig {
    /// Base URL for the realtime websocket endpoint. An explicit `ws_url`
    /// wins; otherwise it is derived from `base_url` by swapping the scheme.
    pub fn websocket_base(&self) -> String {
        if let Some(ws_url) = &self.ws_url {
            return ws_url.trim_end_matches('/').to_string();
        }

        let base = self.base_url.trim_end_matches('/');
        if let Some(rest) = base.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = base.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            base.to_string()
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("pongbot.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(server) = patch.server {
            if let Some(base_url) = server.base_url {
                self.server.base_url = base_url;
            }
            if let Some(ws_url) = server.ws_url {
                self.server.ws_url = Some(ws_url);
            }
        }

        if let Some(bot) = patch.bot {
            if let Some(login_id) = bot.login_id {
                self.bot.login_id = login_id;
            }
            if let Some(password_value) = bot.password {
                self.bot.password = password_value.into();
            }
            if let Some(team_name) = bot.team_name {
                self.bot.team_name = team_name;
            }
            if let Some(monitor_town_square) = bot.monitor_town_square {
                self.bot.monitor_town_square = monitor_town_square;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("PONGBOT_SERVER_BASE_URL") {
            self.server.base_url = value;
        }
        if let Some(value) = read_env("PONGBOT_SERVER_WS_URL") {
            self.server.ws_url = Some(value);
        }

        if let Some(value) = read_env("PONGBOT_BOT_LOGIN_ID") {
            self.bot.login_id = value;
        }
        if let Some(value) = read_env("PONGBOT_BOT_PASSWORD") {
            self.bot.password = value.into();
        }
        if let Some(value) = read_env("PONGBOT_BOT_TEAM_NAME") {
            self.bot.team_name = value;
        }
        if let Some(value) = read_env("PONGBOT_BOT_MONITOR_TOWN_SQUARE") {
            self.bot.monitor_town_square = parse_bool("PONGBOT_BOT_MONITOR_TOWN_SQUARE", &value)?;
        }

        let log_level = read_env("PONGBOT_LOGGING_LEVEL").or_else(|| read_env("PONGBOT_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("PONGBOT_LOGGING_FORMAT").or_else(|| read_env("PONGBOT_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(base_url) = overrides.base_url {
            self.server.base_url = base_url;
        }
        if let Some(ws_url) = overrides.ws_url {
            self.server.ws_url = Some(ws_url);
        }
        if let Some(login_id) = overrides.login_id {
            self.bot.login_id = login_id;
        }
        if let Some(password) = overrides.password {
            self.bot.password = password.into();
        }
        if let Some(team_name) = overrides.team_name {
            self.bot.team_name = team_name;
        }
        if let Some(monitor_town_square) = overrides.monitor_town_square {
            self.bot.monitor_town_square = monitor_town_square;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_server(&self.server)?;
        validate_bot(&self.bot)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("pongbot.toml"), PathBuf::from("config/pongbot.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    let base_url = server.base_url.trim();
    if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
        return Err(ConfigError::Validation(
            "server.base_url must start with http:// or https://".to_string(),
        ));
    }

    if let Some(ws_url) = &server.ws_url {
        let ws_url = ws_url.trim();
        if !ws_url.starts_with("ws://") && !ws_url.starts_with("wss://") {
            return Err(ConfigError::Validation(
                "server.ws_url must start with ws:// or wss://".to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_bot(bot: &BotConfig) -> Result<(), ConfigError> {
    if bot.login_id.trim().is_empty() {
        return Err(ConfigError::Validation("bot.login_id must not be empty".to_string()));
    }

    if bot.password.expose_secret().is_empty() {
        return Err(ConfigError::Validation("bot.password must not be empty".to_string()));
    }

    if bot.team_name.trim().is_empty() {
        return Err(ConfigError::Validation("bot.team_name must not be empty".to_string()));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    value.parse::<bool>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    server: Option<ServerPatch>,
    bot: Option<BotPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    base_url: Option<String>,
    ws_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct BotPatch {
    login_id: Option<String>,
    password: Option<String>,
    team_name: Option<String>,
    monitor_town_square: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::sync::{Mutex, OnceLock};

    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    use super::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat, ServerConfig};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    #[test]
    fn defaults_mirror_the_sample_bot_constants() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let config = AppConfig::load(LoadOptions::default())
            .map_err(|err| format!("config load failed: {err}"))?;

        ensure(config.server.base_url == "http://localhost:8065", "default base url")?;
        ensure(config.bot.login_id == "samplebot", "default login id")?;
        ensure(config.bot.team_name == "test", "default team name")?;
        ensure(!config.bot.monitor_town_square, "town-square is muted by default")?;
        Ok(())
    }

    #[test]
    fn websocket_base_is_derived_from_the_http_scheme() {
        let http = ServerConfig { base_url: "http://localhost:8065/".to_string(), ws_url: None };
        assert_eq!(http.websocket_base(), "ws://localhost:8065");

        let https = ServerConfig { base_url: "https://chat.example.com".to_string(), ws_url: None };
        assert_eq!(https.websocket_base(), "wss://chat.example.com");

        let explicit = ServerConfig {
            base_url: "https://chat.example.com".to_string(),
            ws_url: Some("wss://realtime.example.com/".to_string()),
        };
        assert_eq!(explicit.websocket_base(), "wss://realtime.example.com");
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TEST_BOT_PASSWORD", "hunter2-from-env");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("pongbot.toml");
            fs::write(
                &path,
                r#"
[bot]
password = "${TEST_BOT_PASSWORD}"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.bot.password.expose_secret() == "hunter2-from-env",
                "password should be loaded from environment",
            )?;
            Ok(())
        })();

        clear_vars(&["TEST_BOT_PASSWORD"]);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("PONGBOT_BOT_TEAM_NAME", "team-from-env");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("pongbot.toml");
            fs::write(
                &path,
                r#"
[server]
base_url = "http://from-file:8065"

[bot]
team_name = "team-from-file"

[logging]
level = "warn"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    log_level: Some("debug".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.server.base_url == "http://from-file:8065", "file base url should win")?;
            ensure(config.bot.team_name == "team-from-env", "env team name should win over file")?;
            ensure(config.logging.level == "debug", "override log level should win")?;
            Ok(())
        })();

        clear_vars(&["PONGBOT_BOT_TEAM_NAME"]);
        result
    }

    #[test]
    fn validation_fails_fast_with_actionable_error() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let error = match AppConfig::load(LoadOptions {
            overrides: ConfigOverrides {
                team_name: Some("   ".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        }) {
            Ok(_) => return Err("expected validation failure but config load succeeded".to_string()),
            Err(error) => error,
        };

        let has_message = matches!(
            error,
            ConfigError::Validation(ref message) if message.contains("bot.team_name")
        );
        ensure(has_message, "validation failure should mention bot.team_name")
    }

    #[test]
    fn invalid_monitor_flag_env_value_is_rejected() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("PONGBOT_BOT_MONITOR_TOWN_SQUARE", "yes-please");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => return Err("expected env override failure".to_string()),
                Err(error) => error,
            };
            ensure(
                matches!(error, ConfigError::InvalidEnvOverride { ref key, .. }
                    if key == "PONGBOT_BOT_MONITOR_TOWN_SQUARE"),
                "invalid boolean should surface the offending variable",
            )
        })();

        clear_vars(&["PONGBOT_BOT_MONITOR_TOWN_SQUARE"]);
        result
    }

    #[test]
    fn secret_values_are_not_leaked_by_debug() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("PONGBOT_BOT_PASSWORD", "super-secret-value");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            let debug = format!("{config:?}");

            ensure(
                !debug.contains("super-secret-value"),
                "debug output should not contain the password",
            )?;
            ensure(
                matches!(config.logging.format, LogFormat::Compact),
                "default logging format should be compact",
            )?;
            Ok(())
        })();

        clear_vars(&["PONGBOT_BOT_PASSWORD"]);
        result
    }
}
