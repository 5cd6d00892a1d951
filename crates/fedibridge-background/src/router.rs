//! Boundary between browser messaging and the mediation engine.
//!
//! Receives runtime messages from the same-extension channel and the
//! externally-addressable channel, plus the browser events the engine
//! reacts to (window removed, installed, storage changed).

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, error, info, warn};

use fedibridge_core::envelope::{Envelope, Response, parse_envelope};

use crate::host::{BrowserHost, InstallReason, InternalHandler, SenderContext, StorageChanges, WindowId};
use crate::mediation::{ConsentPrompt, MediationError, RequestDispatcher};
use crate::wallet::{WalletError, WalletStateSync};

/// Inbound message channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    /// `runtime.onMessage`: extension pages, content scripts, the prompt popup.
    Extension,
    /// `runtime.onMessageExternal`: externally connectable web pages.
    External,
}

/// Routes envelopes to the dispatcher, the prompt, or wallet sync.
pub struct MessageRouter {
    dispatcher: Arc<RequestDispatcher>,
    prompt: Arc<ConsentPrompt>,
    internal: Arc<dyn InternalHandler>,
    wallet_sync: Arc<WalletStateSync>,
    host: Arc<dyn BrowserHost>,
}

impl MessageRouter {
    pub fn new(
        dispatcher: Arc<RequestDispatcher>,
        prompt: Arc<ConsentPrompt>,
        internal: Arc<dyn InternalHandler>,
        wallet_sync: Arc<WalletStateSync>,
        host: Arc<dyn BrowserHost>,
    ) -> Self {
        Self {
            dispatcher,
            prompt,
            internal,
            wallet_sync,
            host,
        }
    }

    /// Handle a message from the same-extension channel.
    ///
    /// Returns the reply for the sender, or `None` when the message expects
    /// no reply or was not addressed to this extension.
    pub async fn on_message(&self, raw: &Value, sender: SenderContext) -> Option<Response> {
        self.route(Channel::Extension, raw, sender).await
    }

    /// Handle a message from the externally-addressable channel.
    pub async fn on_message_external(&self, raw: &Value) -> Option<Response> {
        self.route(Channel::External, raw, SenderContext::default())
            .await
    }

    /// Forward the browser's window-removed event.
    pub fn on_window_removed(&self, window_id: WindowId) -> bool {
        self.prompt.window_removed(window_id)
    }

    /// Open the action popup on first install.
    pub async fn on_installed(&self, reason: InstallReason) {
        if reason != InstallReason::Install {
            return;
        }
        info!("Extension installed, opening action popup");
        if let Err(e) = self.host.open_action_popup().await {
            warn!(error = %e, "Failed to open action popup");
        }
    }

    /// Forward storage changes to wallet sync.
    pub async fn on_storage_changed(&self, changes: &StorageChanges) -> Result<(), WalletError> {
        self.wallet_sync.handle_storage_change(changes).await
    }

    async fn route(&self, channel: Channel, raw: &Value, sender: SenderContext) -> Option<Response> {
        let envelope = match parse_envelope(raw) {
            Ok(Some(envelope)) => envelope,
            Ok(None) => return None,
            Err(e @ fedibridge_core::Error::UnknownPermission { .. }) => {
                error!(?channel, error = %e, "Call outside the permission table");
                return Some(Response::err(e.to_string()));
            }
            Err(e) => {
                warn!(?channel, error = %e, "Dropping malformed envelope");
                return None;
            }
        };

        if channel == Channel::Extension
            && let Err(e) = self.wallet_sync.ensure_wallet().await
        {
            warn!(error = %e, "Wallet initialisation failed");
        }

        debug!(?channel, kind = envelope.kind(), "Routing envelope");

        match envelope {
            Envelope::MethodCall(call) => {
                let result = self.dispatcher.handle(call).await;
                if let Err(MediationError::Host(ref e)) = result {
                    error!(error = %e, "Browser API failed during mediation");
                }
                Some(Response::from_result(result))
            }
            Envelope::InternalCall(call) => {
                let wallet = self.wallet_sync.slot().current().await;
                Some(Response::from_result(self.internal.handle(call, wallet).await))
            }
            Envelope::Prompt(decision) if channel == Channel::Extension => {
                self.prompt.resolve(decision, sender).await;
                None
            }
            Envelope::BalanceRequest if channel == Channel::Extension => {
                self.wallet_sync.publish_balance().await;
                None
            }
            other => {
                debug!(?channel, kind = other.kind(), "Ignoring envelope");
                None
            }
        }
    }
}
