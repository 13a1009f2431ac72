//! Configuration types for the HTTP service

use crate::errors::ConfigError;
use repo_relay_core::{ChatUsername, ConversationId, RepositoryName, UserDirectory};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;

/// Service configuration
///
/// Every section is defaulted, so an empty configuration source produces a
/// runnable (if secret-less) service.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ServiceConfig {
    /// HTTP server settings
    pub server: ServerConfig,

    /// Inbound endpoint paths
    pub webhooks: WebhookConfig,

    /// Routing and authentication settings
    pub relay: RelayConfig,

    /// Chat system settings
    pub chat: ChatConfig,

    /// Where subscriptions are read from
    pub subscriptions: SubscriptionsConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl ServiceConfig {
    /// Reject configurations the service cannot run with.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Invalid {
                message: "server.port must be non-zero".to_string(),
            });
        }

        for (key, path) in [
            ("webhooks.endpoint_path", &self.webhooks.endpoint_path),
            ("webhooks.health_path", &self.webhooks.health_path),
        ] {
            if !path.starts_with('/') {
                return Err(ConfigError::Invalid {
                    message: format!("{key} must start with '/', got '{path}'"),
                });
            }
        }

        if self.webhooks.endpoint_path == self.webhooks.health_path {
            return Err(ConfigError::Invalid {
                message: format!(
                    "webhooks.endpoint_path and webhooks.health_path are both '{}'",
                    self.webhooks.endpoint_path
                ),
            });
        }

        if let Some(base_url) = self.relay.gitea_url.as_deref() {
            validate_base_url(base_url)?;
        }

        if let Some(secret) = &self.relay.secret {
            secret.validate()?;
        }

        self.relay.user_directory()?;

        for (key, value) in [
            ("chat.announcement", &self.chat.announcement),
            (
                "chat.error_report_conversation",
                &self.chat.error_report_conversation,
            ),
        ] {
            if let Some(conversation) = value {
                ConversationId::new(conversation.as_str()).map_err(|e| ConfigError::Invalid {
                    message: format!("{key}: {e}"),
                })?;
            }
        }

        Ok(())
    }
}

fn validate_base_url(base_url: &str) -> Result<(), ConfigError> {
    let trimmed = base_url.trim();
    if trimmed.is_empty() {
        return Ok(());
    }

    let parsed = url::Url::parse(trimmed).map_err(|e| ConfigError::Invalid {
        message: format!("relay.gitea_url '{trimmed}' is not a valid URL: {e}"),
    })?;

    match parsed.scheme() {
        "http" | "https" => Ok(()),
        scheme => Err(ConfigError::Invalid {
            message: format!("relay.gitea_url must use http or https, got '{scheme}'"),
        }),
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Maximum request size in bytes
    pub max_body_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            max_body_size: 2 * 1024 * 1024, // 2MB
        }
    }
}

/// Inbound endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhookConfig {
    /// Webhook endpoint path
    pub endpoint_path: String,

    /// Health check path
    pub health_path: String,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            endpoint_path: "/webhook".to_string(),
            health_path: "/healthcheck".to_string(),
        }
    }
}

/// Routing and authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct RelayConfig {
    /// Source of the install-wide webhook secret
    pub secret: Option<WebhookSecretConfig>,

    /// Deliver issue, comment and pull request events to assignees directly
    pub direct_messages: bool,

    /// Base URL of the Gitea server, used for links in messages
    pub gitea_url: Option<String>,

    /// Gitea username to chat username overrides
    pub user_map: BTreeMap<String, String>,
}

impl RelayConfig {
    /// Build the direct-message directory from `user_map`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for an empty username, an invalid
    /// chat username, or two usernames that differ only in case.
    pub fn user_directory(&self) -> Result<UserDirectory, ConfigError> {
        let mut entries = Vec::with_capacity(self.user_map.len());
        let mut seen = HashSet::with_capacity(self.user_map.len());
        for (username, chat_user) in &self.user_map {
            if username.trim().is_empty() {
                return Err(ConfigError::Invalid {
                    message: "relay.user_map contains an empty username".to_string(),
                });
            }
            // Lookups ignore case, so keys must be unique once folded
            if !seen.insert(username.trim().to_lowercase()) {
                return Err(ConfigError::Invalid {
                    message: format!(
                        "relay.user_map has more than one override for '{}'",
                        username.trim()
                    ),
                });
            }
            let chat_user =
                ChatUsername::new(chat_user.as_str()).map_err(|e| ConfigError::Invalid {
                    message: format!("relay.user_map override for '{username}': {e}"),
                })?;
            entries.push((username.trim().to_string(), chat_user));
        }
        Ok(UserDirectory::from_entries(entries))
    }
}

/// Where the install-wide webhook secret comes from
///
/// [`WebhookSecretConfig::Literal`] is meant for development; prefer a
/// credentials file outside the configuration directory.
#[derive(Clone, Deserialize, Serialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum WebhookSecretConfig {
    /// Secret embedded in the configuration.
    Literal {
        /// Raw secret value. Excluded from `Debug` output.
        value: String,
    },

    /// JSON file containing `{"webhook_secret": "..."}`.
    CredentialsFile { path: PathBuf },
}

impl WebhookSecretConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            Self::Literal { value } if value.is_empty() => Err(ConfigError::Invalid {
                message: "relay.secret literal value is empty".to_string(),
            }),
            Self::CredentialsFile { path } if path.as_os_str().is_empty() => {
                Err(ConfigError::Invalid {
                    message: "relay.secret credentials file path is empty".to_string(),
                })
            }
            _ => Ok(()),
        }
    }
}

impl std::fmt::Debug for WebhookSecretConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Literal { .. } => f
                .debug_struct("WebhookSecretConfig::Literal")
                .field("value", &"<REDACTED>")
                .finish(),
            Self::CredentialsFile { path } => f
                .debug_struct("WebhookSecretConfig::CredentialsFile")
                .field("path", path)
                .finish(),
        }
    }
}

/// Chat system configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Keybase executable
    pub keybase_binary: String,

    /// Keybase home directory (`--home`)
    pub home_dir: Option<PathBuf>,

    /// Conversation that receives the startup announcement
    pub announcement: Option<String>,

    /// Conversation that receives request-level failures
    pub error_report_conversation: Option<String>,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            keybase_binary: "keybase".to_string(),
            home_dir: None,
            announcement: None,
            error_report_conversation: None,
        }
    }
}

/// Subscription source configuration
///
/// With `file` set, subscriptions are read from that file on every webhook;
/// otherwise `static_subscriptions` is loaded into memory at startup.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SubscriptionsConfig {
    pub file: Option<PathBuf>,
    pub static_subscriptions: Vec<StaticSubscription>,
}

/// One repository and the conversations subscribed to it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaticSubscription {
    pub repository: RepositoryName,
    #[serde(default)]
    pub conversations: Vec<ConversationId>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is not set
    pub level: String,

    /// Enable JSON structured logging
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "repo_relay_service=info,repo_relay_api=info,repo_relay_core=info,tower_http=info"
                .to_string(),
            json_format: false,
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
