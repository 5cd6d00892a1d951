//! Wallet collaborator types.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::host::StoreError;

/// A federated e-cash wallet session.
#[async_trait]
pub trait Wallet: Send + Sync {
    /// Whether a federation is currently open in this session.
    fn is_open(&self) -> bool;

    /// Open a previously joined federation. Returns `false` if it was never joined.
    async fn open(&self, federation_id: &str) -> Result<bool, WalletError>;

    async fn join_federation(&self, invite: &str, federation_id: &str) -> Result<(), WalletError>;

    /// Release the session's resources.
    async fn cleanup(&self) -> Result<(), WalletError>;

    fn set_log_level(&self, level: &str);

    /// Stream of balance updates in millisatoshis.
    fn subscribe_balance(&self) -> mpsc::Receiver<u64>;
}

/// Creates fresh wallet sessions.
pub trait WalletFactory: Send + Sync {
    fn create(&self) -> Arc<dyn Wallet>;
}

/// A federation entry from the `federations` setting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FederationItem {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub invite: String,
    #[serde(default)]
    pub label: Option<String>,
}

impl FederationItem {
    /// Entries without an id or invite cannot be joined.
    pub fn is_valid(&self) -> bool {
        !self.id.trim().is_empty() && !self.invite.trim().is_empty()
    }
}

/// Wallet lifecycle errors.
#[derive(Debug, thiserror::Error)]
pub enum WalletError {
    #[error("Wallet backend error: {0}")]
    Backend(String),

    #[error("Failed to join federation {federation_id}: {reason}")]
    Join {
        federation_id: String,
        reason: String,
    },

    #[error("Invalid value for setting {key}: {reason}")]
    InvalidSetting { key: String, reason: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn federation_item_validation() {
        let item = FederationItem {
            id: "fed-a".to_string(),
            invite: "fed11abc".to_string(),
            label: None,
        };
        assert!(item.is_valid());

        let missing_invite: FederationItem = serde_json::from_str(r#"{"id": "fed-b"}"#).unwrap();
        assert!(!missing_invite.is_valid());

        let blank_id: FederationItem =
            serde_json::from_str(r#"{"id": "  ", "invite": "fed11abc", "label": "x"}"#).unwrap();
        assert!(!blank_id.is_valid());
    }
}
