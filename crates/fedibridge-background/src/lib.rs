//! fedibridge background context.
//!
//! Mediates privileged wallet calls from web pages: permission lookup,
//! one-at-a-time consent prompts, dispatch to module handlers, and the
//! storage-driven wallet lifecycle.

pub mod engine;
pub mod host;
pub mod mediation;
pub mod router;
pub mod wallet;

pub use engine::{Collaborators, MediationEngine};
pub use host::{BrowserHost, InstallReason, KeyValueStore, ModuleHandler, SenderContext};
pub use mediation::{MediationError, RequestDispatcher, RequestSequencer};
pub use router::MessageRouter;
pub use wallet::{Wallet, WalletFactory, WalletSlot, WalletStateSync};
