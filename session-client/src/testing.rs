// session-client/src/testing.rs
//! In-crate fakes for the host SDK, wallet connector and verification API.
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use common::{AuthRequest, IdentityResult};
use tokio::sync::Notify;

use crate::api::VerificationApi;
use crate::error::{ClientError, HostError, WalletError};
use crate::host::{HostEnvironment, HostSdk, HostSignInRequest, HostSignInResult};
use crate::negotiator::{NegotiatorOptions, SessionNegotiator};
use crate::store::{MemoryStorage, SessionStore};
use crate::wallet::WalletConnector;

pub fn identity(fid: Option<u64>, address: Option<&str>, token: &str) -> IdentityResult {
    IdentityResult {
        fid,
        address: address.map(str::to_string),
        token: token.to_string(),
    }
}

pub struct MockHost {
    supports: AtomicBool,
    probe_fails: bool,
    rejects: bool,
    sign_ins: AtomicUsize,
    readies: AtomicUsize,
}

impl MockHost {
    pub const SIGNATURE: &'static str = "0xhostsig";

    fn build(probe_fails: bool, rejects: bool) -> Self {
        Self {
            supports: AtomicBool::new(true),
            probe_fails,
            rejects,
            sign_ins: AtomicUsize::new(0),
            readies: AtomicUsize::new(0),
        }
    }

    pub fn supporting() -> Self {
        Self::build(false, false)
    }

    pub fn failing_probe() -> Self {
        Self::build(true, false)
    }

    pub fn rejecting() -> Self {
        Self::build(false, true)
    }

    pub fn set_supports_sign_in(&self, supported: bool) {
        self.supports.store(supported, Ordering::SeqCst);
    }

    pub fn sign_in_calls(&self) -> usize {
        self.sign_ins.load(Ordering::SeqCst)
    }

    pub fn ready_calls(&self) -> usize {
        self.readies.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HostSdk for MockHost {
    async fn supports_sign_in(&self) -> Result<bool, HostError> {
        if self.probe_fails {
            return Err(HostError::Sdk("capabilities unavailable".to_string()));
        }
        Ok(self.supports.load(Ordering::SeqCst))
    }

    async fn sign_in(&self, request: HostSignInRequest) -> Result<HostSignInResult, HostError> {
        self.sign_ins.fetch_add(1, Ordering::SeqCst);
        if self.rejects {
            return Err(HostError::Rejected("user dismissed".to_string()));
        }
        assert!(request.accept_auth_address);
        Ok(HostSignInResult {
            message: format!("app.example wants you to sign in\nFarcaster FID: 99\nNonce: {}", request.nonce),
            signature: Self::SIGNATURE.to_string(),
        })
    }

    async fn ready(&self) -> Result<(), HostError> {
        self.readies.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Default)]
pub struct MockWallet {
    address: Mutex<Option<String>>,
    on_modal: Mutex<Option<String>>,
    modal_opens: AtomicUsize,
    disconnects: AtomicUsize,
}

impl MockWallet {
    pub const SIGNATURE: &'static str = "0xwalletsig";

    pub fn disconnected() -> Self {
        Self::default()
    }

    pub fn connect(&self, address: &str) {
        *self.address.lock().unwrap() = Some(address.to_string());
    }

    /// Connect as soon as the modal is opened
    pub fn connect_on_modal(&self, address: &str) {
        *self.on_modal.lock().unwrap() = Some(address.to_string());
    }

    pub fn modal_opens(&self) -> usize {
        self.modal_opens.load(Ordering::SeqCst)
    }

    pub fn disconnects(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WalletConnector for MockWallet {
    fn is_connected(&self) -> bool {
        self.address.lock().unwrap().is_some()
    }

    fn address(&self) -> Option<String> {
        self.address.lock().unwrap().clone()
    }

    async fn open_modal(&self) -> Result<(), WalletError> {
        self.modal_opens.fetch_add(1, Ordering::SeqCst);
        if let Some(address) = self.on_modal.lock().unwrap().take() {
            self.connect(&address);
        }
        Ok(())
    }

    async fn sign_message(&self, _message: &str) -> Result<String, WalletError> {
        if !self.is_connected() {
            return Err(WalletError::NotConnected);
        }
        Ok(Self::SIGNATURE.to_string())
    }

    async fn disconnect(&self) -> Result<(), WalletError> {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        *self.address.lock().unwrap() = None;
        Ok(())
    }
}

type Scripted = Result<IdentityResult, (u16, &'static str)>;

#[derive(Default)]
pub struct MockApi {
    responses: Mutex<VecDeque<Scripted>>,
    requests: Mutex<Vec<AuthRequest>>,
    gate: Mutex<Option<Arc<Notify>>>,
}

impl MockApi {
    pub fn respond(&self, response: Scripted) {
        self.responses.lock().unwrap().push_back(response);
    }

    /// Block the next `verify` until the returned notify fires
    pub fn hold(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    pub fn requests(&self) -> Vec<AuthRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl VerificationApi for MockApi {
    async fn verify(&self, request: &AuthRequest) -> Result<IdentityResult, ClientError> {
        self.requests.lock().unwrap().push(request.clone());

        let gate = self.gate.lock().unwrap().take();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        match self.responses.lock().unwrap().pop_front() {
            Some(Ok(identity)) => Ok(identity),
            Some(Err((status, message))) => Err(ClientError::Authentication {
                status,
                message: message.to_string(),
            }),
            None => Err(ClientError::Authentication {
                status: 500,
                message: "Authentication failed".to_string(),
            }),
        }
    }
}

/// A negotiator wired to fakes, plus handles on each fake
pub struct Harness {
    pub host: HostEnvironment,
    pub wallet: Arc<MockWallet>,
    pub api: Arc<MockApi>,
    pub store: SessionStore,
    pub negotiator: SessionNegotiator,
}

impl Harness {
    fn build(host: HostEnvironment, wallet: MockWallet) -> Self {
        let wallet = Arc::new(wallet);
        let api = Arc::new(MockApi::default());
        let store = SessionStore::new(Arc::new(MemoryStorage::new()));
        let negotiator = SessionNegotiator::new(
            host.clone(),
            wallet.clone(),
            api.clone(),
            store.clone(),
            NegotiatorOptions::default(),
        );
        Self { host, wallet, api, store, negotiator }
    }

    pub fn detached(wallet: MockWallet) -> Self {
        Self::build(HostEnvironment::detached(), wallet)
    }

    pub fn embedded(host: MockHost, wallet: MockWallet) -> Self {
        Self::with_host(Arc::new(host), wallet)
    }

    pub fn with_host(host: Arc<MockHost>, wallet: MockWallet) -> Self {
        Self::build(HostEnvironment::embedded(host), wallet)
    }

    /// Fresh negotiator over the same fakes and storage, as after a reload
    pub fn rebuild(&self) -> SessionNegotiator {
        SessionNegotiator::new(
            self.host.clone(),
            self.wallet.clone(),
            self.api.clone(),
            self.store.clone(),
            NegotiatorOptions::default(),
        )
    }

    pub async fn wait_until_loading(&self) {
        let mut session = self.negotiator.subscribe();
        tokio::time::timeout(Duration::from_secs(5), session.wait_for(|s| s.is_loading))
            .await
            .expect("sign-in never started")
            .expect("session channel closed");
    }
}
