//! Browser-side collaborators.
//!
//! The background engine never talks to extension APIs directly. The
//! embedding host implements these traits and feeds browser events into
//! [`MessageRouter`](crate::router::MessageRouter).

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use fedibridge_core::envelope::InternalCall;
use fedibridge_core::permissions::ModuleMethod;

use crate::wallet::Wallet;

/// Browser window identifier.
pub type WindowId = i64;

/// Geometry and location of a consent popup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PopupRequest {
    pub url: Url,
    pub width: u32,
    pub height: u32,
    pub left: i32,
    pub top: i32,
}

/// Context attached to a runtime message by the browser.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SenderContext {
    /// Window of the tab that sent the message, if any.
    pub window_id: Option<WindowId>,
}

impl SenderContext {
    pub const fn from_window(window_id: WindowId) -> Self {
        Self {
            window_id: Some(window_id),
        }
    }
}

/// Why the extension's install event fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallReason {
    Install,
    Update,
    BrowserUpdate,
}

/// Errors reported by browser APIs.
#[derive(Debug, Clone, thiserror::Error)]
#[error("Browser API error: {0}")]
pub struct HostError(pub String);

/// Window and runtime capabilities of the browser.
#[async_trait]
pub trait BrowserHost: Send + Sync {
    /// Resolve an extension-relative path to an absolute URL.
    fn extension_url(&self, path: &str) -> Result<Url, HostError>;

    /// Open a popup window and return its id.
    async fn create_popup(&self, request: PopupRequest) -> Result<WindowId, HostError>;

    /// Close a window.
    async fn remove_window(&self, window_id: WindowId) -> Result<(), HostError>;

    /// Open the extension's action popup.
    async fn open_action_popup(&self) -> Result<(), HostError>;

    /// Send a runtime message to every extension page.
    async fn broadcast(&self, message: Value) -> Result<(), HostError>;
}

/// Old and new value of a changed storage key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageChange {
    #[serde(default)]
    pub old_value: Option<Value>,
    #[serde(default)]
    pub new_value: Option<Value>,
}

/// Storage changes keyed by storage key, as delivered by `onChanged`.
pub type StorageChanges = HashMap<String, StorageChange>;

/// Errors reported by the settings store.
#[derive(Debug, Clone, thiserror::Error)]
#[error("Storage error: {0}")]
pub struct StoreError(pub String);

/// Persisted extension settings.
///
/// Writes are expected to surface again as change notifications through
/// [`MessageRouter::on_storage_changed`](crate::router::MessageRouter::on_storage_changed).
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError>;

    async fn set(&self, key: &str, value: Value) -> Result<(), StoreError>;
}

/// Owner of the module implementations (fedimint, nostr, webln).
#[async_trait]
pub trait ModuleHandler: Send + Sync {
    /// Execute an authorized call.
    ///
    /// `wallet` is the handle current when the call was dispatched.
    async fn dispatch(
        &self,
        method: ModuleMethod,
        params: Value,
        wallet: Option<Arc<dyn Wallet>>,
    ) -> anyhow::Result<Value>;
}

/// Handler for the extension's own `internalCall` API.
#[async_trait]
pub trait InternalHandler: Send + Sync {
    async fn handle(
        &self,
        call: InternalCall,
        wallet: Option<Arc<dyn Wallet>>,
    ) -> anyhow::Result<Value>;
}
