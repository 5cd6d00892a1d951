//! Current wallet handle and its balance subscription.

use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::debug;

use super::types::Wallet;

/// Holder of the single wallet handle.
///
/// The handle is replaced wholesale on federation switches; callers that
/// cloned it earlier keep using the session they captured.
#[derive(Default)]
pub struct WalletSlot {
    current: RwLock<Option<Arc<dyn Wallet>>>,
    balance_task: Mutex<Option<JoinHandle<()>>>,
    last_balance: Arc<RwLock<Option<u64>>>,
}

impl WalletSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clone of the current handle.
    pub async fn current(&self) -> Option<Arc<dyn Wallet>> {
        self.current.read().await.clone()
    }

    /// Swap in a new handle, returning the previous one.
    pub async fn replace(&self, wallet: Arc<dyn Wallet>) -> Option<Arc<dyn Wallet>> {
        self.current.write().await.replace(wallet)
    }

    pub async fn is_initialized(&self) -> bool {
        self.current.read().await.is_some()
    }

    /// Last balance reported by the active subscription.
    pub async fn last_balance(&self) -> Option<u64> {
        *self.last_balance.read().await
    }

    pub(crate) fn balance_cell(&self) -> Arc<RwLock<Option<u64>>> {
        Arc::clone(&self.last_balance)
    }

    /// Install the task forwarding balance updates, stopping any previous one.
    pub(crate) async fn set_balance_task(&self, task: JoinHandle<()>) {
        if let Some(previous) = self.balance_task.lock().await.replace(task) {
            previous.abort();
            debug!("Replaced balance subscription");
        }
    }

    /// Stop forwarding balance updates.
    pub(crate) async fn stop_balance_task(&self) {
        if let Some(task) = self.balance_task.lock().await.take() {
            task.abort();
            debug!("Stopped balance subscription");
        }
    }
}
