//! # Secret Validator
//!
//! Per-conversation authentication of webhook payloads.
//!
//! When a conversation subscribes to a repository it is handed a token derived
//! from the repository, the conversation and the install-wide shared secret.
//! The source-control server embeds that token in every payload. On delivery
//! the token is recomputed for each subscribed conversation and compared in
//! constant time, so a token leaked from one conversation cannot authenticate
//! delivery into another.
//!
//! # Algorithm
//!
//! `hex(HMAC-SHA256(key = shared secret, msg = repository ‖ 0x00 ‖ conversation))`
//!
//! The repository is always the lower-cased [`RepositoryName`].

use crate::{ConversationId, RepositoryName};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::fmt;
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

type HmacSha256 = Hmac<Sha256>;

// ============================================================================
// Shared Secret
// ============================================================================

/// Install-wide webhook secret.
///
/// Zeroized on drop; `Debug` output is redacted.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SharedSecret(String);

impl SharedSecret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Check if secret is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn expose_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SharedSecret").field(&"<REDACTED>").finish()
    }
}

// ============================================================================
// Secret Token
// ============================================================================

/// Token expected in payloads addressed to one conversation.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretToken(String);

impl SecretToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SecretToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SecretToken").field(&"<REDACTED>").finish()
    }
}

impl fmt::Display for SecretToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Derive the token a conversation expects for a repository.
///
/// Deterministic for fixed inputs; differs whenever the repository or the
/// conversation differs.
pub fn derive_token(
    repository: &RepositoryName,
    conversation: &ConversationId,
    secret: &SharedSecret,
) -> SecretToken {
    let mut mac = HmacSha256::new_from_slice(secret.expose_bytes())
        .unwrap_or_else(|_| unreachable!("HMAC-SHA256 accepts keys of any length"));
    mac.update(repository.as_str().as_bytes());
    mac.update(&[0]);
    mac.update(conversation.as_str().as_bytes());
    SecretToken(hex::encode(mac.finalize().into_bytes()))
}

/// Check `candidate` against the token derived for `repository` and
/// `conversation`.
///
/// `repository` may be in any case; it is lower-cased before derivation. The
/// comparison is constant time with respect to token content.
pub fn validate_token(
    candidate: &str,
    repository: &str,
    conversation: &ConversationId,
    secret: &SharedSecret,
) -> bool {
    let expected = derive_token(&RepositoryName::new(repository), conversation, secret);
    bool::from(candidate.as_bytes().ct_eq(expected.as_str().as_bytes()))
}

// ============================================================================
// Validator
// ============================================================================

/// Validates payload tokens against the configured shared secret.
#[derive(Debug, Clone)]
pub struct SecretValidator {
    secret: SharedSecret,
}

impl SecretValidator {
    pub fn new(secret: SharedSecret) -> Self {
        Self { secret }
    }

    /// Token for a subscription, as handed to the conversation at subscribe time.
    pub fn token_for(
        &self,
        repository: &RepositoryName,
        conversation: &ConversationId,
    ) -> SecretToken {
        derive_token(repository, conversation, &self.secret)
    }

    /// Validate the token embedded in a payload for one conversation.
    ///
    /// # Errors
    ///
    /// Returns [`SecretMismatch`] when the token does not match. The caller
    /// skips that conversation and continues with the others.
    pub fn validate(
        &self,
        candidate: &str,
        repository: &RepositoryName,
        conversation: &ConversationId,
    ) -> Result<(), SecretMismatch> {
        if validate_token(candidate, repository.as_str(), conversation, &self.secret) {
            Ok(())
        } else {
            Err(SecretMismatch {
                conversation: conversation.clone(),
            })
        }
    }
}

/// Per-conversation authentication failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Payload secret does not match conversation {conversation}")]
pub struct SecretMismatch {
    pub conversation: ConversationId,
}

#[cfg(test)]
#[path = "secret_tests.rs"]
mod tests;
