//! In-memory collaborators for driving the engine without a browser.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::sync::mpsc;
use url::Url;

use fedibridge_background::host::{
    BrowserHost, HostError, InternalHandler, KeyValueStore, ModuleHandler, PopupRequest,
    StoreError, WindowId,
};
use fedibridge_background::wallet::{Wallet, WalletError, WalletFactory};
use fedibridge_background::{Collaborators, MediationEngine};
use fedibridge_core::Config;
use fedibridge_core::envelope::{InternalCall, NAMESPACE};
use fedibridge_core::permissions::ModuleMethod;

/// Browser stand-in that records every window operation.
pub struct FakeHost {
    next_window: AtomicI64,
    popups: mpsc::UnboundedSender<(WindowId, PopupRequest)>,
    pub removed: Mutex<Vec<WindowId>>,
    pub broadcasts: Mutex<Vec<Value>>,
    pub action_popups: AtomicUsize,
}

#[async_trait]
impl BrowserHost for FakeHost {
    fn extension_url(&self, path: &str) -> Result<Url, HostError> {
        Url::parse("chrome-extension://fedibridge/")
            .and_then(|base| base.join(path))
            .map_err(|e| HostError(e.to_string()))
    }

    async fn create_popup(&self, request: PopupRequest) -> Result<WindowId, HostError> {
        let window_id = self.next_window.fetch_add(1, Ordering::SeqCst);
        self.popups
            .send((window_id, request))
            .map_err(|e| HostError(e.to_string()))?;
        Ok(window_id)
    }

    async fn remove_window(&self, window_id: WindowId) -> Result<(), HostError> {
        self.removed.lock().unwrap().push(window_id);
        Ok(())
    }

    async fn open_action_popup(&self) -> Result<(), HostError> {
        self.action_popups.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn broadcast(&self, message: Value) -> Result<(), HostError> {
        self.broadcasts.lock().unwrap().push(message);
        Ok(())
    }
}

/// Settings store; writes do not echo back as change notifications.
#[derive(Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, Value>>,
}

impl MemoryStore {
    pub fn value(&self, key: &str) -> Option<Value> {
        self.values.lock().unwrap().get(key).cloned()
    }

    pub fn insert(&self, key: &str, value: Value) {
        self.values.lock().unwrap().insert(key.to_string(), value);
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.value(key))
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        self.insert(key, value);
        Ok(())
    }
}

/// Federations joined by any wallet session, shared like the real wallet database.
#[derive(Default)]
pub struct FederationLedger {
    pub known: Mutex<HashSet<String>>,
    pub joins: Mutex<Vec<String>>,
}

pub struct FakeWallet {
    ledger: Arc<FederationLedger>,
    open: AtomicBool,
    pub opened: Mutex<Vec<String>>,
    pub cleaned_up: AtomicBool,
    pub log_level: Mutex<Option<String>>,
    balance: Mutex<Option<mpsc::Sender<u64>>>,
}

impl FakeWallet {
    /// Emit a balance update on the active subscription.
    pub async fn push_balance(&self, balance: u64) {
        let sender = self.balance.lock().unwrap().clone();
        sender.unwrap().send(balance).await.unwrap();
    }
}

#[async_trait]
impl Wallet for FakeWallet {
    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    async fn open(&self, federation_id: &str) -> Result<bool, WalletError> {
        self.opened.lock().unwrap().push(federation_id.to_string());
        let known = self.ledger.known.lock().unwrap().contains(federation_id);
        if known {
            self.open.store(true, Ordering::SeqCst);
        }
        Ok(known)
    }

    async fn join_federation(&self, invite: &str, federation_id: &str) -> Result<(), WalletError> {
        if invite == "bad-invite" {
            return Err(WalletError::Backend("invalid invite code".to_string()));
        }
        self.ledger
            .known
            .lock()
            .unwrap()
            .insert(federation_id.to_string());
        self.ledger
            .joins
            .lock()
            .unwrap()
            .push(federation_id.to_string());
        self.open.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn cleanup(&self) -> Result<(), WalletError> {
        self.cleaned_up.store(true, Ordering::SeqCst);
        self.open.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn set_log_level(&self, level: &str) {
        *self.log_level.lock().unwrap() = Some(level.to_string());
    }

    fn subscribe_balance(&self) -> mpsc::Receiver<u64> {
        let (tx, rx) = mpsc::channel(8);
        *self.balance.lock().unwrap() = Some(tx);
        rx
    }
}

#[derive(Default)]
pub struct FakeWalletFactory {
    pub ledger: Arc<FederationLedger>,
    pub created: Mutex<Vec<Arc<FakeWallet>>>,
}

impl FakeWalletFactory {
    pub fn wallet(&self, index: usize) -> Arc<FakeWallet> {
        Arc::clone(&self.created.lock().unwrap()[index])
    }

    pub fn created_count(&self) -> usize {
        self.created.lock().unwrap().len()
    }
}

impl WalletFactory for FakeWalletFactory {
    fn create(&self) -> Arc<dyn Wallet> {
        let wallet = Arc::new(FakeWallet {
            ledger: Arc::clone(&self.ledger),
            open: AtomicBool::new(false),
            opened: Mutex::new(Vec::new()),
            cleaned_up: AtomicBool::new(false),
            log_level: Mutex::new(None),
            balance: Mutex::new(None),
        });
        self.created.lock().unwrap().push(Arc::clone(&wallet));
        wallet
    }
}

/// A call that reached a module handler.
#[derive(Debug, Clone)]
pub struct DispatchedCall {
    pub method: ModuleMethod,
    pub params: Value,
    pub had_wallet: bool,
}

/// Echoes the call back; params containing `"fail": true` produce an error.
#[derive(Default)]
pub struct RecordingModules {
    pub calls: Mutex<Vec<DispatchedCall>>,
}

#[async_trait]
impl ModuleHandler for RecordingModules {
    async fn dispatch(
        &self,
        method: ModuleMethod,
        params: Value,
        wallet: Option<Arc<dyn Wallet>>,
    ) -> anyhow::Result<Value> {
        self.calls.lock().unwrap().push(DispatchedCall {
            method,
            params: params.clone(),
            had_wallet: wallet.is_some(),
        });
        if params.get("fail").and_then(Value::as_bool) == Some(true) {
            anyhow::bail!("insufficient balance");
        }
        Ok(json!({ "call": method.to_string(), "params": params }))
    }
}

pub struct EchoInternal;

#[async_trait]
impl InternalHandler for EchoInternal {
    async fn handle(
        &self,
        call: InternalCall,
        wallet: Option<Arc<dyn Wallet>>,
    ) -> anyhow::Result<Value> {
        Ok(json!({ "internal": call.method, "hasWallet": wallet.is_some() }))
    }
}

pub struct Harness {
    pub engine: Arc<MediationEngine>,
    pub host: Arc<FakeHost>,
    pub popups: mpsc::UnboundedReceiver<(WindowId, PopupRequest)>,
    pub store: Arc<MemoryStore>,
    pub modules: Arc<RecordingModules>,
    pub wallets: Arc<FakeWalletFactory>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(&Config::default())
    }

    pub fn with_config(config: &Config) -> Self {
        let (popup_tx, popups) = mpsc::unbounded_channel();
        let host = Arc::new(FakeHost {
            next_window: AtomicI64::new(1000),
            popups: popup_tx,
            removed: Mutex::new(Vec::new()),
            broadcasts: Mutex::new(Vec::new()),
            action_popups: AtomicUsize::new(0),
        });
        let store = Arc::new(MemoryStore::default());
        let modules = Arc::new(RecordingModules::default());
        let wallets = Arc::new(FakeWalletFactory::default());

        let engine = MediationEngine::new(
            config,
            Collaborators {
                host: Arc::clone(&host) as Arc<dyn BrowserHost>,
                store: Arc::clone(&store) as Arc<dyn KeyValueStore>,
                modules: Arc::clone(&modules) as Arc<dyn ModuleHandler>,
                internal: Arc::new(EchoInternal),
                wallets: Arc::clone(&wallets) as Arc<dyn WalletFactory>,
            },
        );

        Self {
            engine: Arc::new(engine),
            host,
            popups,
            store,
            modules,
            wallets,
        }
    }

    /// Wait for the next consent popup to open and be attached to its prompt.
    pub async fn next_popup(&mut self) -> (WindowId, PopupRequest) {
        let (window_id, request) = tokio::time::timeout(Duration::from_secs(2), self.popups.recv())
            .await
            .expect("popup should open")
            .unwrap();
        let slot = self.engine.prompt().slot();
        eventually(|| slot.pending_window() == Some(window_id)).await;
        (window_id, request)
    }

    /// Assert no popup opens within a short grace period.
    pub async fn assert_no_popup(&mut self) {
        let next = tokio::time::timeout(Duration::from_millis(50), self.popups.recv()).await;
        assert!(next.is_err(), "unexpected popup: {next:?}");
    }

    pub fn dispatched(&self) -> Vec<DispatchedCall> {
        self.modules.calls.lock().unwrap().clone()
    }
}

pub fn method_call(module: &str, method: &str, params: Value) -> Value {
    json!({
        "ext": NAMESPACE,
        "type": "methodCall",
        "module": module,
        "method": method,
        "params": params,
    })
}

pub fn prompt_decision(accept: bool, params: Option<Value>) -> Value {
    json!({
        "ext": NAMESPACE,
        "type": "prompt",
        "accept": accept,
        "params": params,
    })
}

/// Poll `condition` until it holds or a second passes.
pub async fn eventually(mut condition: impl FnMut() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached in time");
}
