//! Command-line flags and configuration loading.

use clap::Parser;
use repo_relay_api::{ConfigError, ServiceConfig, WebhookSecretConfig};
use std::path::{Path, PathBuf};

/// Repo-Relay - Gitea webhook notifications for Keybase chat
#[derive(Debug, Parser)]
#[command(name = "repo-relay")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Relays Gitea repository events into subscribed Keybase conversations")]
pub struct Cli {
    /// Configuration file, applied after the system and local defaults
    #[arg(long, env = "RR_CONFIG_FILE")]
    pub config_file: Option<PathBuf>,

    /// Listen address as host:port (":port" keeps the configured host)
    #[arg(long, env = "BOT_HTTP_PREFIX")]
    pub http_prefix: Option<String>,

    /// Install-wide webhook secret
    #[arg(long, env = "BOT_WEBHOOK_SECRET", hide_env_values = true)]
    pub secret: Option<String>,

    /// Gitea base URL used for links in messages
    #[arg(long, env = "BOT_GITEA_URL")]
    pub gitea_url: Option<String>,

    /// Send issue and pull request notifications to assignees directly
    #[arg(long)]
    pub direct_messages: bool,
}

impl Cli {
    /// Apply flag values on top of the loaded configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for a malformed `--http-prefix`.
    pub fn apply_overrides(&self, config: &mut ServiceConfig) -> Result<(), ConfigError> {
        if let Some(prefix) = self.http_prefix.as_deref() {
            let (host, port) = parse_http_prefix(prefix)?;
            if let Some(host) = host {
                config.server.host = host;
            }
            config.server.port = port;
        }

        if let Some(secret) = self.secret.as_deref().filter(|s| !s.is_empty()) {
            config.relay.secret = Some(WebhookSecretConfig::Literal {
                value: secret.to_string(),
            });
        }

        if let Some(url) = self.gitea_url.as_deref() {
            config.relay.gitea_url = Some(url.to_string());
        }

        if self.direct_messages {
            config.relay.direct_messages = true;
        }

        Ok(())
    }
}

/// Split `host:port`; an empty host means "keep the configured one".
pub fn parse_http_prefix(prefix: &str) -> Result<(Option<String>, u16), ConfigError> {
    let invalid = || ConfigError::Invalid {
        message: format!("--http-prefix must be host:port, got '{prefix}'"),
    };

    let (host, port) = prefix.trim().rsplit_once(':').ok_or_else(invalid)?;
    let port: u16 = port.parse().map_err(|_| invalid())?;

    Ok(((!host.is_empty()).then(|| host.to_string()), port))
}

/// Load the layered service configuration.
///
/// Sources, later ones overriding earlier ones:
///  1. `/etc/repo-relay/service.{yaml,toml,json}`
///  2. `./config/service.{yaml,toml,json}`
///  3. `--config-file` / `RR_CONFIG_FILE` (required when given)
///  4. Environment variables prefixed `RR__`, e.g. `RR__SERVER__PORT=9090`
///
/// Command-line flags are applied last by [`Cli::apply_overrides`].
pub fn load_config(config_file: Option<&Path>) -> Result<ServiceConfig, ConfigError> {
    let mut builder = config::Config::builder()
        .add_source(config::File::with_name("/etc/repo-relay/service").required(false))
        .add_source(config::File::with_name("config/service").required(false));

    if let Some(path) = config_file {
        builder = builder.add_source(config::File::from(path).required(true));
    }

    builder
        .add_source(config::Environment::with_prefix("RR").separator("__"))
        .build()
        .and_then(|config| config.try_deserialize::<ServiceConfig>())
        .map_err(|e| ConfigError::Invalid {
            message: e.to_string(),
        })
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
