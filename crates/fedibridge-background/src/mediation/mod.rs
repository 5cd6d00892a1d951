//! Consent mediation between requesting pages and module handlers.
//!
//! - [`RequestSequencer`]: single-flight gate; one consent prompt at a time.
//! - [`ConsentPrompt`]: popup lifecycle and one-shot settlement.
//! - [`RequestDispatcher`]: permission lookup, negotiation, dispatch.

mod dispatcher;
mod prompt;
mod sequencer;
mod types;

pub use dispatcher::RequestDispatcher;
pub use prompt::{ConsentPrompt, PromptSettings, PromptSlot};
pub use sequencer::{ConsentPermit, RequestSequencer, SequencerError};
pub use types::{CallLifecycle, CallState, ConsentOutcome, MediationError};
