//! Popup-based consent negotiation.
//!
//! A negotiation installs a single pending prompt, opens the popup window and
//! waits for the first of: an explicit decision from the popup, removal of the
//! popup window, or the optional timeout. Settlement goes through a one-shot
//! channel, so later attempts are no-ops.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::oneshot;
use tracing::{debug, info, warn};
use uuid::Uuid;

use fedibridge_core::config::PromptConfig;
use fedibridge_core::envelope::{ModuleMethodCall, PromptDecision};

use crate::host::{BrowserHost, PopupRequest, SenderContext, WindowId};

use super::sequencer::ConsentPermit;
use super::types::{ConsentOutcome, MediationError};

/// Popup page, geometry and timeout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptSettings {
    pub page_path: String,
    pub width: u32,
    pub height: u32,
    pub timeout: Option<Duration>,
}

impl From<&PromptConfig> for PromptSettings {
    fn from(config: &PromptConfig) -> Self {
        Self {
            page_path: config.page_path.clone(),
            width: config.width,
            height: config.height,
            timeout: config.timeout(),
        }
    }
}

impl Default for PromptSettings {
    fn default() -> Self {
        Self::from(&PromptConfig::default())
    }
}

struct PendingPrompt {
    prompt_id: Uuid,
    window_id: Option<WindowId>,
    settle: oneshot::Sender<ConsentOutcome>,
}

#[derive(Default)]
struct SlotState {
    pending: Option<PendingPrompt>,
    /// Windows removed while the pending popup was still being created.
    closed_while_opening: Vec<WindowId>,
}

/// Holder of the single pending prompt.
#[derive(Default)]
pub struct PromptSlot {
    state: Mutex<SlotState>,
}

impl PromptSlot {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, SlotState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Install a new pending prompt and return its settlement receiver.
    pub fn install(&self, prompt_id: Uuid) -> oneshot::Receiver<ConsentOutcome> {
        let (settle, settled) = oneshot::channel();
        let mut state = self.lock();

        if let Some(stale) = state.pending.take() {
            warn!(prompt_id = %stale.prompt_id, "Replacing stale pending prompt");
            let _ = stale.settle.send(ConsentOutcome::Denied);
        }

        state.closed_while_opening.clear();
        state.pending = Some(PendingPrompt {
            prompt_id,
            window_id: None,
            settle,
        });
        settled
    }

    /// Record the popup window of the pending prompt.
    ///
    /// If the window was already removed while it was being created, the
    /// prompt is settled as denied and `false` is returned.
    pub fn attach_window(&self, prompt_id: Uuid, window_id: WindowId) -> bool {
        let mut state = self.lock();
        let closed_early = state.closed_while_opening.contains(&window_id);
        state.closed_while_opening.clear();

        if !state.pending.as_ref().is_some_and(|p| p.prompt_id == prompt_id) {
            return false;
        }

        if closed_early {
            if let Some(pending) = state.pending.take() {
                let _ = pending.settle.send(ConsentOutcome::Denied);
            }
            return false;
        }

        if let Some(pending) = state.pending.as_mut() {
            pending.window_id = Some(window_id);
        }
        true
    }

    /// Settle the pending prompt, whichever it is.
    pub fn settle_current(&self, outcome: ConsentOutcome) -> bool {
        self.settle_from(None, outcome)
    }

    /// Settle the pending prompt on behalf of the window `from`.
    ///
    /// A decision sent from a window other than the pending popup is ignored.
    pub fn settle_from(&self, from: Option<WindowId>, outcome: ConsentOutcome) -> bool {
        let pending = {
            let mut state = self.lock();
            let expected = state.pending.as_ref().and_then(|p| p.window_id);
            match (from, expected) {
                (Some(from), Some(expected)) if from != expected => {
                    warn!(from, expected, "Ignoring decision from a foreign window");
                    None
                }
                _ => state.pending.take(),
            }
        };

        let Some(pending) = pending else {
            return false;
        };
        debug!(prompt_id = %pending.prompt_id, accepted = outcome.is_accepted(), "Prompt settled");
        pending.settle.send(outcome).is_ok()
    }

    /// Settle a specific prompt.
    pub fn settle_prompt(&self, prompt_id: Uuid, outcome: ConsentOutcome) -> bool {
        let pending = {
            let mut state = self.lock();
            if state.pending.as_ref().is_some_and(|p| p.prompt_id == prompt_id) {
                state.pending.take()
            } else {
                None
            }
        };
        pending.is_some_and(|p| p.settle.send(outcome).is_ok())
    }

    /// Handle removal of a browser window.
    ///
    /// Settles the pending prompt as denied if `window_id` is its popup.
    pub fn settle_window_closed(&self, window_id: WindowId) -> bool {
        let pending = {
            let mut state = self.lock();
            let pending_window = state.pending.as_ref().map(|p| p.window_id);
            match pending_window {
                Some(Some(id)) if id == window_id => state.pending.take(),
                Some(None) => {
                    state.closed_while_opening.push(window_id);
                    None
                }
                _ => None,
            }
        };

        let Some(pending) = pending else {
            return false;
        };
        debug!(prompt_id = %pending.prompt_id, window_id, "Prompt window closed");
        pending.settle.send(ConsentOutcome::Denied).is_ok()
    }

    /// Drop the pending prompt if it is still `prompt_id`.
    pub fn clear(&self, prompt_id: Uuid) {
        let mut state = self.lock();
        if state.pending.as_ref().is_some_and(|p| p.prompt_id == prompt_id) {
            state.pending = None;
            state.closed_while_opening.clear();
        }
    }

    pub fn is_pending(&self) -> bool {
        self.lock().pending.is_some()
    }

    /// Popup window of the pending prompt, once known.
    pub fn pending_window(&self) -> Option<WindowId> {
        self.lock().pending.as_ref().and_then(|p| p.window_id)
    }
}

/// Clears the slot when a negotiation exits, however it exits.
struct PendingGuard<'a> {
    slot: &'a PromptSlot,
    prompt_id: Uuid,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.slot.clear(self.prompt_id);
    }
}

/// Runs consent negotiations through popup windows.
pub struct ConsentPrompt {
    host: Arc<dyn BrowserHost>,
    slot: PromptSlot,
    settings: PromptSettings,
}

impl ConsentPrompt {
    pub fn new(host: Arc<dyn BrowserHost>, settings: PromptSettings) -> Self {
        Self {
            host,
            slot: PromptSlot::new(),
            settings,
        }
    }

    pub const fn slot(&self) -> &PromptSlot {
        &self.slot
    }

    pub const fn settings(&self) -> &PromptSettings {
        &self.settings
    }

    /// Ask the user to approve `call`.
    ///
    /// Requires the sequencer permit, so only one negotiation runs at a time.
    pub async fn negotiate(
        &self,
        permit: &ConsentPermit,
        call: &ModuleMethodCall,
    ) -> Result<ConsentOutcome, MediationError> {
        let request = self.popup_request(call)?;
        let prompt_id = Uuid::new_v4();

        let mut settled = self.slot.install(prompt_id);
        let _pending = PendingGuard {
            slot: &self.slot,
            prompt_id,
        };

        let window_id = self.host.create_popup(request).await?;
        info!(
            %prompt_id,
            window_id,
            ticket = permit.ticket(),
            call = %call.method,
            "Consent prompt opened"
        );

        if !self.slot.attach_window(prompt_id, window_id) {
            debug!(%prompt_id, window_id, "Prompt settled before its window was attached");
        }

        let outcome = match self.settings.timeout {
            Some(limit) => match tokio::time::timeout(limit, &mut settled).await {
                Ok(result) => result.unwrap_or(ConsentOutcome::Denied),
                Err(_) => {
                    if self.slot.settle_prompt(prompt_id, ConsentOutcome::Denied) {
                        warn!(%prompt_id, window_id, ?limit, "Consent prompt timed out");
                        self.close_window(window_id).await;
                    }
                    settled.await.unwrap_or(ConsentOutcome::Denied)
                }
            },
            None => settled.await.unwrap_or(ConsentOutcome::Denied),
        };

        info!(%prompt_id, accepted = outcome.is_accepted(), "Consent prompt resolved");
        Ok(outcome)
    }

    /// Apply a decision sent by the prompt popup, then close the popup.
    ///
    /// Without a pending prompt the decision is ignored.
    pub async fn resolve(&self, decision: PromptDecision, sender: SenderContext) -> bool {
        let outcome = if decision.accept {
            ConsentOutcome::Accepted {
                params: decision.params,
            }
        } else {
            ConsentOutcome::Denied
        };

        let settled = self.slot.settle_from(sender.window_id, outcome);
        if !settled {
            debug!("No pending prompt for decision");
        }

        if let Some(window_id) = sender.window_id {
            self.close_window(window_id).await;
        }
        settled
    }

    /// Handle the browser's window-removed event.
    pub fn window_removed(&self, window_id: WindowId) -> bool {
        self.slot.settle_window_closed(window_id)
    }

    fn popup_request(&self, call: &ModuleMethodCall) -> Result<PopupRequest, MediationError> {
        let mut url = self.host.extension_url(&self.settings.page_path)?;
        url.query_pairs_mut()
            .append_pair("params", &call.params.to_string())
            .append_pair("module", call.method.module().as_str())
            .append_pair("method", call.method.method_name());

        let (left, top) = call.window.top_left();
        Ok(PopupRequest {
            url,
            width: self.settings.width,
            height: self.settings.height,
            left,
            top,
        })
    }

    async fn close_window(&self, window_id: WindowId) {
        if let Err(e) = self.host.remove_window(window_id).await {
            warn!(window_id, error = %e, "Failed to close prompt window");
        }
    }
}
