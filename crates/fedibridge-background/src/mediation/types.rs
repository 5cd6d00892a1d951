//! Mediation types.

use serde_json::Value;

use crate::host::HostError;
use crate::wallet::WalletError;

use super::sequencer::SequencerError;

/// How a consent negotiation ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsentOutcome {
    /// The user approved; `params` replaces the requested params when set.
    Accepted { params: Option<Value> },
    /// Explicit rejection, popup closed, or prompt timed out.
    Denied,
}

impl ConsentOutcome {
    pub const fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted { .. })
    }
}

/// Lifecycle state of one mediated call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallState {
    Received,
    PermissionChecked,
    AutoApproved,
    AwaitingConsent,
    Approved,
    Denied,
    Dispatched,
    Completed,
    HandlerFailed,
    Failed,
}

impl CallState {
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::HandlerFailed | Self::Failed)
    }

    /// Whether `next` is a legal successor of this state.
    pub const fn can_advance_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Received, Self::PermissionChecked)
                | (Self::PermissionChecked, Self::AutoApproved | Self::AwaitingConsent)
                | (Self::AutoApproved, Self::Approved)
                | (Self::AwaitingConsent, Self::Approved | Self::Denied | Self::Failed)
                | (Self::Approved, Self::Dispatched)
                | (Self::Denied, Self::Failed)
                | (Self::Dispatched, Self::Completed | Self::HandlerFailed)
        )
    }
}

/// Tracks one call through [`CallState`]; terminal states are final.
#[derive(Debug)]
pub struct CallLifecycle {
    label: String,
    state: CallState,
}

impl CallLifecycle {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            state: CallState::Received,
        }
    }

    pub const fn state(&self) -> CallState {
        self.state
    }

    /// Move to `next`. Illegal transitions are logged and ignored.
    pub fn advance(&mut self, next: CallState) -> bool {
        if !self.state.can_advance_to(next) {
            tracing::warn!(
                call = %self.label,
                from = ?self.state,
                to = ?next,
                "Ignoring illegal call state transition"
            );
            return false;
        }
        tracing::debug!(call = %self.label, from = ?self.state, to = ?next, "Call state");
        self.state = next;
        true
    }
}

/// Errors surfaced to callers of the dispatcher.
#[derive(Debug, thiserror::Error)]
pub enum MediationError {
    #[error(transparent)]
    UnknownPermission(#[from] fedibridge_core::Error),

    /// The user rejected or closed the prompt.
    #[error("denied")]
    PermissionDenied,

    /// The module handler failed; its message is passed through verbatim.
    #[error("{0}")]
    Handler(anyhow::Error),

    #[error(transparent)]
    Host(#[from] HostError),

    #[error(transparent)]
    Sequencer(#[from] SequencerError),

    #[error(transparent)]
    Wallet(#[from] WalletError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states_are_final() {
        for terminal in [CallState::Completed, CallState::HandlerFailed, CallState::Failed] {
            assert!(terminal.is_terminal());
            assert!(!terminal.can_advance_to(CallState::Dispatched));
            assert!(!terminal.can_advance_to(CallState::Failed));
        }
    }

    #[test]
    fn prompted_path() {
        let mut call = CallLifecycle::new("nostr.signEvent");
        assert!(call.advance(CallState::PermissionChecked));
        assert!(call.advance(CallState::AwaitingConsent));
        assert!(call.advance(CallState::Denied));
        assert!(call.advance(CallState::Failed));
        assert!(!call.advance(CallState::Dispatched));
        assert_eq!(call.state(), CallState::Failed);
    }

    #[test]
    fn auto_approved_cannot_skip_dispatch() {
        let mut call = CallLifecycle::new("fedimint.getBalance");
        call.advance(CallState::PermissionChecked);
        call.advance(CallState::AutoApproved);
        assert!(!call.advance(CallState::Completed));
        assert!(call.advance(CallState::Approved));
        assert!(call.advance(CallState::Dispatched));
        assert!(call.advance(CallState::Completed));
    }

    #[test]
    fn denial_message_is_stable() {
        assert_eq!(MediationError::PermissionDenied.to_string(), "denied");
        let err = MediationError::Handler(anyhow::anyhow!("insufficient balance"));
        assert_eq!(err.to_string(), "insufficient balance");
    }
}
