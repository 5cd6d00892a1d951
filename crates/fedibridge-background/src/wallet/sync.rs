//! Storage-driven wallet lifecycle.
//!
//! Reacts to changes of the `activeFederation` and `federations` settings:
//! swaps the wallet session when the active federation changes, joins newly
//! added federations, and forwards balance updates to extension pages.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use fedibridge_core::config::WalletConfig;
use fedibridge_core::envelope::BalanceUpdate;

use crate::host::{BrowserHost, KeyValueStore, StorageChanges};

use super::state::WalletSlot;
use super::types::{FederationItem, Wallet, WalletError, WalletFactory};

/// Storage key holding the id of the active federation.
pub const ACTIVE_FEDERATION_KEY: &str = "activeFederation";
/// Storage key holding the list of known federations.
pub const FEDERATIONS_KEY: &str = "federations";
/// Storage key recording which federations have been joined.
pub const JOINED_FEDERATIONS_KEY: &str = "joinedFederations";

/// Keeps the wallet handle in step with persisted settings.
pub struct WalletStateSync {
    slot: Arc<WalletSlot>,
    factory: Arc<dyn WalletFactory>,
    store: Arc<dyn KeyValueStore>,
    host: Arc<dyn BrowserHost>,
    config: WalletConfig,
    /// Serializes wallet creation and swaps.
    lifecycle: Mutex<()>,
}

impl WalletStateSync {
    pub fn new(
        slot: Arc<WalletSlot>,
        factory: Arc<dyn WalletFactory>,
        store: Arc<dyn KeyValueStore>,
        host: Arc<dyn BrowserHost>,
        config: WalletConfig,
    ) -> Self {
        Self {
            slot,
            factory,
            store,
            host,
            config,
            lifecycle: Mutex::new(()),
        }
    }

    pub fn slot(&self) -> &Arc<WalletSlot> {
        &self.slot
    }

    /// Create and open the default wallet if none exists yet.
    ///
    /// Opens the configured default federation, joining it with the bootstrap
    /// invite when it has never been joined.
    pub async fn ensure_wallet(&self) -> Result<Arc<dyn Wallet>, WalletError> {
        let _lifecycle = self.lifecycle.lock().await;

        if let Some(wallet) = self.slot.current().await {
            return Ok(wallet);
        }

        let federation_id = &self.config.default_federation_id;
        let wallet = self.factory.create();

        if wallet.open(federation_id).await? {
            info!(federation_id, "Opened default federation");
        } else if let Some(invite) = &self.config.bootstrap_invite {
            wallet
                .join_federation(invite, federation_id)
                .await
                .map_err(|e| WalletError::Join {
                    federation_id: federation_id.clone(),
                    reason: e.to_string(),
                })?;
            info!(federation_id, "Joined default federation");
        } else {
            warn!(
                federation_id,
                "Default federation not joined and no bootstrap invite configured"
            );
        }

        self.slot.replace(Arc::clone(&wallet)).await;
        self.subscribe_balance(&wallet).await;
        Ok(wallet)
    }

    /// Apply a batch of storage changes.
    ///
    /// Every key in the batch is processed; the first failure is returned.
    pub async fn handle_storage_change(&self, changes: &StorageChanges) -> Result<(), WalletError> {
        let mut first_error = None;

        for (key, change) in changes {
            let result = match key.as_str() {
                ACTIVE_FEDERATION_KEY => {
                    let federation_id = change.new_value.as_ref().and_then(Value::as_str);
                    self.switch_active_federation(federation_id).await
                }
                FEDERATIONS_KEY => {
                    let old = federation_list(change.old_value.as_ref());
                    let new = federation_list(change.new_value.as_ref());
                    self.sync_federations(&old, &new).await
                }
                _ => {
                    debug!(key, "Ignoring storage change");
                    Ok(())
                }
            };

            if let Err(e) = result {
                warn!(key, error = %e, "Failed to apply storage change");
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }

        first_error.map_or(Ok(()), Err)
    }

    /// Re-send the last known balance to extension pages.
    pub async fn publish_balance(&self) {
        let Some(balance) = self.slot.last_balance().await else {
            debug!("No balance known yet");
            return;
        };
        if let Err(e) = self.host.broadcast(BalanceUpdate { balance }.to_envelope()).await {
            debug!(error = %e, "No receiver for balance update");
        }
    }

    async fn switch_active_federation(&self, federation_id: Option<&str>) -> Result<(), WalletError> {
        let _lifecycle = self.lifecycle.lock().await;

        let Some(federation_id) = federation_id else {
            self.slot.stop_balance_task().await;
            info!("Active federation cleared");
            return Ok(());
        };

        let wallet = match self.slot.current().await {
            Some(current) if current.is_open() => {
                self.slot.stop_balance_task().await;
                current.cleanup().await?;

                let fresh = self.factory.create();
                fresh.set_log_level(&self.config.log_level);
                self.slot.replace(Arc::clone(&fresh)).await;
                fresh
            }
            Some(current) => current,
            None => {
                let fresh = self.factory.create();
                self.slot.replace(Arc::clone(&fresh)).await;
                fresh
            }
        };

        if !wallet.open(federation_id).await? {
            warn!(federation_id, "Active federation has not been joined");
        }
        self.subscribe_balance(&wallet).await;

        info!(federation_id, "Switched active federation");
        Ok(())
    }

    async fn sync_federations(
        &self,
        old: &[FederationItem],
        new: &[FederationItem],
    ) -> Result<(), WalletError> {
        let mut to_join: Vec<&FederationItem> = new.iter().collect();

        if old.len() < new.len() {
            if old.is_empty()
                && let Some(first) = new.first()
            {
                self.store
                    .set(ACTIVE_FEDERATION_KEY, Value::String(first.id.clone()))
                    .await?;
            }
            to_join.retain(|f| !old.iter().any(|x| x.id == f.id));
        } else {
            let active = self.store.get(ACTIVE_FEDERATION_KEY).await?;
            let active_id = active.as_ref().and_then(Value::as_str);

            if !new.iter().any(|f| Some(f.id.as_str()) == active_id) {
                let replacement = new
                    .first()
                    .map_or(Value::Null, |f| Value::String(f.id.clone()));
                info!(active = ?active_id, replacement = %replacement, "Active federation removed");
                self.store.set(ACTIVE_FEDERATION_KEY, replacement).await?;
            }
        }

        to_join.retain(|f| {
            let valid = f.is_valid();
            if !valid {
                warn!(federation_id = %f.id, "Skipping invalid federation entry");
            }
            valid
        });

        let mut joined = self.joined_ids().await?;
        to_join.retain(|f| !joined.contains(&f.id));

        if to_join.is_empty() {
            return Ok(());
        }

        let wallet = match self.slot.current().await {
            Some(wallet) => wallet,
            None => self.ensure_wallet().await?,
        };

        for federation in &to_join {
            wallet
                .join_federation(&federation.invite, &federation.id)
                .await
                .map_err(|e| WalletError::Join {
                    federation_id: federation.id.clone(),
                    reason: e.to_string(),
                })?;
            joined.push(federation.id.clone());
            info!(federation_id = %federation.id, "Joined federation");
        }

        let value = serde_json::to_value(joined).map_err(|e| WalletError::InvalidSetting {
            key: JOINED_FEDERATIONS_KEY.to_string(),
            reason: e.to_string(),
        })?;
        self.store.set(JOINED_FEDERATIONS_KEY, value).await?;
        Ok(())
    }

    async fn joined_ids(&self) -> Result<Vec<String>, WalletError> {
        Ok(self
            .store
            .get(JOINED_FEDERATIONS_KEY)
            .await?
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default())
    }

    async fn subscribe_balance(&self, wallet: &Arc<dyn Wallet>) {
        let mut updates = wallet.subscribe_balance();
        let host = Arc::clone(&self.host);
        let last_balance = self.slot.balance_cell();

        let task = tokio::spawn(async move {
            while let Some(balance) = updates.recv().await {
                *last_balance.write().await = Some(balance);
                if let Err(e) = host.broadcast(BalanceUpdate { balance }.to_envelope()).await {
                    debug!(error = %e, "No receiver for balance update");
                }
            }
        });

        self.slot.set_balance_task(task).await;
    }
}

/// Lenient parse of a `federations` value; non-object entries are dropped.
fn federation_list(value: Option<&Value>) -> Vec<FederationItem> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| serde_json::from_value(item.clone()).ok())
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn federation_list_is_lenient() {
        let value = json!([
            {"id": "a", "invite": "fed11a"},
            "not-an-object",
            {"id": "b", "invite": "fed11b", "label": "Bravo"},
        ]);
        let items = federation_list(Some(&value));
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].label.as_deref(), Some("Bravo"));

        assert!(federation_list(None).is_empty());
        assert!(federation_list(Some(&json!({"id": "a"}))).is_empty());
    }
}
