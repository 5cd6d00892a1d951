//! Background context wiring.
//!
//! One [`MediationEngine`] exists per extension background context. It owns
//! the sequencer, the pending-prompt slot and the wallet handle, and hands out
//! the [`MessageRouter`] the host feeds browser events into.

use std::sync::Arc;

use tracing::info;

use fedibridge_core::Config;

use crate::host::{BrowserHost, InternalHandler, KeyValueStore, ModuleHandler};
use crate::mediation::{ConsentPrompt, PromptSettings, RequestDispatcher, RequestSequencer};
use crate::router::MessageRouter;
use crate::wallet::{WalletFactory, WalletSlot, WalletStateSync};

/// Host-provided implementations the engine depends on.
pub struct Collaborators {
    pub host: Arc<dyn BrowserHost>,
    pub store: Arc<dyn KeyValueStore>,
    pub modules: Arc<dyn ModuleHandler>,
    pub internal: Arc<dyn InternalHandler>,
    pub wallets: Arc<dyn WalletFactory>,
}

/// Process-wide mediation state.
pub struct MediationEngine {
    sequencer: Arc<RequestSequencer>,
    prompt: Arc<ConsentPrompt>,
    wallet_sync: Arc<WalletStateSync>,
    dispatcher: Arc<RequestDispatcher>,
    router: MessageRouter,
}

impl MediationEngine {
    pub fn new(config: &Config, collaborators: Collaborators) -> Self {
        let Collaborators {
            host,
            store,
            modules,
            internal,
            wallets,
        } = collaborators;

        let sequencer = Arc::new(RequestSequencer::new());
        let prompt = Arc::new(ConsentPrompt::new(
            Arc::clone(&host),
            PromptSettings::from(&config.prompt),
        ));
        let slot = Arc::new(WalletSlot::new());
        let wallet_sync = Arc::new(WalletStateSync::new(
            Arc::clone(&slot),
            wallets,
            store,
            Arc::clone(&host),
            config.wallet.clone(),
        ));
        let dispatcher = Arc::new(RequestDispatcher::new(
            Arc::clone(&sequencer),
            Arc::clone(&prompt),
            modules,
            slot,
        ));
        let router = MessageRouter::new(
            Arc::clone(&dispatcher),
            Arc::clone(&prompt),
            internal,
            Arc::clone(&wallet_sync),
            host,
        );

        info!(
            prompt_timeout = ?config.prompt.timeout(),
            default_federation = %config.wallet.default_federation_id,
            "Mediation engine ready"
        );

        Self {
            sequencer,
            prompt,
            wallet_sync,
            dispatcher,
            router,
        }
    }

    pub const fn router(&self) -> &MessageRouter {
        &self.router
    }

    pub const fn sequencer(&self) -> &Arc<RequestSequencer> {
        &self.sequencer
    }

    pub const fn prompt(&self) -> &Arc<ConsentPrompt> {
        &self.prompt
    }

    pub const fn dispatcher(&self) -> &Arc<RequestDispatcher> {
        &self.dispatcher
    }

    pub const fn wallet_sync(&self) -> &Arc<WalletStateSync> {
        &self.wallet_sync
    }

    pub fn wallet(&self) -> &Arc<WalletSlot> {
        self.wallet_sync.slot()
    }

    /// Stop accepting consent negotiations and the balance subscription.
    pub async fn shutdown(&self) {
        self.sequencer.close();
        self.wallet().stop_balance_task().await;
        info!("Mediation engine shut down");
    }
}
