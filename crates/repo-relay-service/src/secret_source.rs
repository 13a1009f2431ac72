//! Resolution of the install-wide webhook secret at startup.
//!
//! | Source | Use |
//! |--------|-----|
//! | [`WebhookSecretConfig::Literal`] | Flag, environment or config value; development |
//! | [`WebhookSecretConfig::CredentialsFile`] | JSON file `{"webhook_secret": "..."}` |

use repo_relay_api::WebhookSecretConfig;
use repo_relay_core::SharedSecret;
use serde::Deserialize;
use std::path::PathBuf;
use tracing::{info, warn};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

#[derive(Deserialize, Zeroize, ZeroizeOnDrop)]
struct Credentials {
    #[serde(default)]
    webhook_secret: String,
}

/// Failures while resolving the shared secret
#[derive(Debug, thiserror::Error)]
pub enum SecretSourceError {
    #[error("No webhook secret configured; set relay.secret, --secret or BOT_WEBHOOK_SECRET")]
    NotConfigured,

    #[error("Failed to read credentials file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse credentials file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Webhook secret from {origin} is empty")]
    Empty { origin: String },
}

/// Resolve the configured secret source into a [`SharedSecret`].
pub async fn resolve_secret(
    source: Option<&WebhookSecretConfig>,
) -> Result<SharedSecret, SecretSourceError> {
    match source.ok_or(SecretSourceError::NotConfigured)? {
        WebhookSecretConfig::Literal { value } => {
            if value.is_empty() {
                return Err(SecretSourceError::Empty {
                    origin: "literal configuration".to_string(),
                });
            }
            warn!("Using a literal webhook secret; prefer a credentials file in production");
            Ok(SharedSecret::new(value.as_str()))
        }
        WebhookSecretConfig::CredentialsFile { path } => {
            let contents = Zeroizing::new(tokio::fs::read_to_string(path).await.map_err(
                |source| SecretSourceError::Read {
                    path: path.clone(),
                    source,
                },
            )?);

            let credentials: Credentials =
                serde_json::from_str(&contents).map_err(|source| SecretSourceError::Parse {
                    path: path.clone(),
                    source,
                })?;

            if credentials.webhook_secret.is_empty() {
                return Err(SecretSourceError::Empty {
                    origin: path.display().to_string(),
                });
            }

            info!(path = %path.display(), "Loaded webhook secret from credentials file");
            Ok(SharedSecret::new(credentials.webhook_secret.as_str()))
        }
    }
}

#[cfg(test)]
#[path = "secret_source_tests.rs"]
mod tests;
