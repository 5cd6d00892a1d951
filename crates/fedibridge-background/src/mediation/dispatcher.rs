//! End-to-end handling of one privileged call.
//!
//! Permission lookup, consent negotiation under the sequencer when required,
//! then dispatch to the owning module handler.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};

use fedibridge_core::envelope::ModuleMethodCall;
use fedibridge_core::permissions::{PermissionLevel, PermissionTable};

use crate::host::ModuleHandler;
use crate::wallet::WalletSlot;

use super::prompt::ConsentPrompt;
use super::sequencer::RequestSequencer;
use super::types::{CallLifecycle, CallState, ConsentOutcome, MediationError};

/// Mediates calls between requesting pages and module handlers.
pub struct RequestDispatcher {
    sequencer: Arc<RequestSequencer>,
    prompt: Arc<ConsentPrompt>,
    modules: Arc<dyn ModuleHandler>,
    wallet: Arc<WalletSlot>,
}

impl RequestDispatcher {
    pub fn new(
        sequencer: Arc<RequestSequencer>,
        prompt: Arc<ConsentPrompt>,
        modules: Arc<dyn ModuleHandler>,
        wallet: Arc<WalletSlot>,
    ) -> Self {
        Self {
            sequencer,
            prompt,
            modules,
            wallet,
        }
    }

    /// Handle one call and return the handler's result verbatim.
    pub async fn handle(&self, call: ModuleMethodCall) -> Result<Value, MediationError> {
        let mut lifecycle = CallLifecycle::new(call.method.to_string());

        let level = PermissionTable::level(call.method);
        lifecycle.advance(CallState::PermissionChecked);
        debug!(call = %call.method, ?level, "Permission checked");

        let params = match level {
            PermissionLevel::None => {
                lifecycle.advance(CallState::AutoApproved);
                lifecycle.advance(CallState::Approved);
                call.params
            }
            PermissionLevel::Prompt => {
                lifecycle.advance(CallState::AwaitingConsent);

                let outcome = self.negotiate(&call).await.inspect_err(|_| {
                    lifecycle.advance(CallState::Failed);
                })?;

                match outcome {
                    ConsentOutcome::Accepted { params } => {
                        lifecycle.advance(CallState::Approved);
                        params.unwrap_or(call.params)
                    }
                    ConsentOutcome::Denied => {
                        lifecycle.advance(CallState::Denied);
                        lifecycle.advance(CallState::Failed);
                        info!(call = %call.method, "Call denied by user");
                        return Err(MediationError::PermissionDenied);
                    }
                }
            }
        };

        // Captured now; a later federation switch does not affect this call.
        let wallet = self.wallet.current().await;

        lifecycle.advance(CallState::Dispatched);
        match self.modules.dispatch(call.method, params, wallet).await {
            Ok(value) => {
                lifecycle.advance(CallState::Completed);
                Ok(value)
            }
            Err(e) => {
                lifecycle.advance(CallState::HandlerFailed);
                warn!(call = %call.method, error = %e, "Module handler failed");
                Err(MediationError::Handler(e))
            }
        }
    }

    /// Run the consent prompt while holding the sequencer.
    async fn negotiate(&self, call: &ModuleMethodCall) -> Result<ConsentOutcome, MediationError> {
        let permit = self.sequencer.acquire().await?;
        let outcome = self.prompt.negotiate(&permit, call).await;
        self.sequencer.release(permit);
        outcome
    }
}
