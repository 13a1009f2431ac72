//! [`ChatTransport`] backed by the Keybase chat JSON API.
//!
//! Every message is one invocation of `keybase [--home H] chat api -m <json>`.
//! The executable answers with a single JSON document on stdout, either
//! `{"result": ...}` or `{"error": {"code": .., "message": ..}}`.

use async_trait::async_trait;
use repo_relay_core::{ChatTransport, ChatUsername, ConversationId, TransportError};
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::PathBuf;
use tokio::process::Command;
use tracing::{debug, instrument, warn};

#[derive(Debug, Deserialize)]
struct ApiReply {
    #[serde(default)]
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    code: Option<i64>,
    #[serde(default)]
    message: String,
}

/// Sends chat messages by shelling out to the `keybase` executable.
#[derive(Debug, Clone)]
pub struct KeybaseChatTransport {
    binary: PathBuf,
    home_dir: Option<PathBuf>,
}

impl KeybaseChatTransport {
    pub fn new(binary: impl Into<PathBuf>, home_dir: Option<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            home_dir,
        }
    }

    /// Arguments passed to the executable, excluding the request document.
    fn base_args(&self) -> Vec<std::ffi::OsString> {
        let mut args = Vec::with_capacity(5);
        if let Some(home) = &self.home_dir {
            args.push("--home".into());
            args.push(home.clone().into_os_string());
        }
        args.extend(["chat".into(), "api".into(), "-m".into()]);
        args
    }

    async fn call(&self, recipient: &str, request: Value) -> Result<(), TransportError> {
        let output = Command::new(&self.binary)
            .args(self.base_args())
            .arg(request.to_string())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| TransportError::Unavailable {
                message: format!("failed to run {}: {e}", self.binary.display()),
            })?;

        interpret_reply(
            recipient,
            output.status.success(),
            &output.stdout,
            &output.stderr,
        )
    }
}

#[async_trait]
impl ChatTransport for KeybaseChatTransport {
    #[instrument(skip_all, fields(conversation = %conversation))]
    async fn send(
        &self,
        conversation: &ConversationId,
        message: &str,
    ) -> Result<(), TransportError> {
        self.call(conversation.as_str(), send_request(conversation, message))
            .await
    }

    #[instrument(skip_all, fields(user = %user))]
    async fn send_direct(&self, user: &ChatUsername, message: &str) -> Result<(), TransportError> {
        self.call(user.as_str(), direct_request(user, message))
            .await
    }
}

/// Request posting into a conversation by its id.
pub fn send_request(conversation: &ConversationId, message: &str) -> Value {
    json!({
        "method": "send",
        "params": {
            "options": {
                "conversation_id": conversation.as_str(),
                "message": { "body": message },
            }
        }
    })
}

/// Request for a private message; the channel of a one-on-one chat is the
/// recipient's username.
pub fn direct_request(user: &ChatUsername, message: &str) -> Value {
    json!({
        "method": "send",
        "params": {
            "options": {
                "channel": { "name": user.as_str() },
                "message": { "body": message },
            }
        }
    })
}

/// Map the executable's exit status and output onto a delivery result.
pub(crate) fn interpret_reply(
    recipient: &str,
    success: bool,
    stdout: &[u8],
    stderr: &[u8],
) -> Result<(), TransportError> {
    match serde_json::from_slice::<ApiReply>(stdout) {
        Ok(ApiReply { error: Some(error) }) => Err(TransportError::Rejected {
            recipient: recipient.to_string(),
            message: match error.code {
                Some(code) => format!("{} (code {code})", error.message),
                None => error.message,
            },
        }),
        Ok(ApiReply { error: None }) if success => Ok(()),
        Ok(ApiReply { error: None }) => Err(TransportError::Unavailable {
            message: format!("keybase exited with failure: {}", stderr_text(stderr)),
        }),
        Err(e) if success => {
            debug!(recipient, error = %e, "Keybase reply was not JSON; treating as sent");
            Ok(())
        }
        Err(_) => {
            warn!(recipient, "Keybase exited with failure and no reply");
            Err(TransportError::Unavailable {
                message: format!("keybase exited with failure: {}", stderr_text(stderr)),
            })
        }
    }
}

fn stderr_text(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr).trim().to_string();
    if text.is_empty() {
        "no output".to_string()
    } else {
        text
    }
}

#[cfg(test)]
#[path = "keybase_tests.rs"]
mod tests;
