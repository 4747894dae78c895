// session-client/src/host.rs
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::watch;

use crate::error::HostError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostSignInRequest {
    pub nonce: String,
    /// Allow the host to sign with an auth address instead of the custody address
    pub accept_auth_address: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostSignInResult {
    pub message: String,
    pub signature: String,
}

/// SDK exposed by the embedding host application
#[async_trait]
pub trait HostSdk: Send + Sync {
    async fn supports_sign_in(&self) -> Result<bool, HostError>;
    async fn sign_in(&self, request: HostSignInRequest) -> Result<HostSignInResult, HostError>;
    /// Dismiss the host's splash screen
    async fn ready(&self) -> Result<(), HostError>;
}

pub type HostHandle = Option<Arc<dyn HostSdk>>;

/// Optional host handle. The host may attach or go away at any point, so
/// whether we are embedded is answered fresh on every call.
#[derive(Clone)]
pub struct HostEnvironment {
    handle: Arc<watch::Sender<HostHandle>>,
}

impl HostEnvironment {
    pub fn new(handle: HostHandle) -> Self {
        let (tx, _) = watch::channel(handle);
        Self { handle: Arc::new(tx) }
    }

    pub fn detached() -> Self {
        Self::new(None)
    }

    pub fn embedded(sdk: Arc<dyn HostSdk>) -> Self {
        Self::new(Some(sdk))
    }

    pub fn attach(&self, sdk: Arc<dyn HostSdk>) {
        tracing::debug!("Host SDK attached");
        self.handle.send_replace(Some(sdk));
    }

    pub fn detach(&self) {
        tracing::debug!("Host SDK detached");
        self.handle.send_replace(None);
    }

    pub fn sdk(&self) -> HostHandle {
        self.handle.borrow().clone()
    }

    pub async fn is_embedded_host(&self) -> bool {
        let Some(sdk) = self.sdk() else {
            return false;
        };

        match sdk.supports_sign_in().await {
            Ok(supported) => supported,
            Err(e) => {
                tracing::debug!("Host capability probe failed: {}", e);
                false
            },
        }
    }

    /// Fires whenever the handle is attached or detached
    pub fn subscribe(&self) -> watch::Receiver<HostHandle> {
        self.handle.subscribe()
    }

    /// Tell the host the app has loaded
    pub async fn ready(&self) {
        if let Some(sdk) = self.sdk() {
            if let Err(e) = sdk.ready().await {
                tracing::warn!("Host ready() failed: {}", e);
            }
        }
    }
}
