//! Wallet session state.
//!
//! Holds the current wallet handle and keeps it in step with the
//! `activeFederation`/`federations` settings.

mod state;
mod sync;
mod types;

pub use state::WalletSlot;
pub use sync::{ACTIVE_FEDERATION_KEY, FEDERATIONS_KEY, JOINED_FEDERATIONS_KEY, WalletStateSync};
pub use types::{FederationItem, Wallet, WalletError, WalletFactory};
