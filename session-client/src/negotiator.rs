// session-client/src/negotiator.rs
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use common::{generate_nonce, AuthRequest, ClientConfig, UserData};
use tokio::sync::watch;

use crate::api::VerificationApi;
use crate::error::{ClientError, HostError};
use crate::host::{HostEnvironment, HostSignInRequest};
use crate::session::{AuthView, Session};
use crate::store::SessionStore;
use crate::wallet::{connected_address, wait_for_address, WalletConnector};

/// Wallet connection polling
#[derive(Debug, Clone, Copy)]
pub struct NegotiatorOptions {
    pub poll_interval: Duration,
    pub poll_attempts: u32,
}

impl Default for NegotiatorOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            poll_attempts: 100,
        }
    }
}

impl From<&ClientConfig> for NegotiatorOptions {
    fn from(config: &ClientConfig) -> Self {
        Self {
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            poll_attempts: config.poll_attempts,
        }
    }
}

struct Inner {
    host: HostEnvironment,
    wallet: Arc<dyn WalletConnector>,
    api: Arc<dyn VerificationApi>,
    store: SessionStore,
    options: NegotiatorOptions,
    state: watch::Sender<Session>,
    auto_sign_in_attempted: Arc<AtomicBool>,
    shutdown: watch::Sender<bool>,
}

/// Owns the session and runs the sign-in / sign-out protocol.
///
/// Sign-in prefers the embedded host when one is detected and falls back to
/// the external wallet on any host-path failure.
#[derive(Clone)]
pub struct SessionNegotiator {
    inner: Arc<Inner>,
}

impl SessionNegotiator {
    pub fn new(
        host: HostEnvironment,
        wallet: Arc<dyn WalletConnector>,
        api: Arc<dyn VerificationApi>,
        store: SessionStore,
        options: NegotiatorOptions,
    ) -> Self {
        let restored = store.load();
        if restored.token.is_some() {
            tracing::debug!("Restored persisted session");
        }

        let (state, _) = watch::channel(restored);
        let (shutdown, _) = watch::channel(false);

        Self {
            inner: Arc::new(Inner {
                host,
                wallet,
                api,
                store,
                options,
                state,
                auto_sign_in_attempted: Arc::new(AtomicBool::new(false)),
                shutdown,
            }),
        }
    }

    pub fn host(&self) -> &HostEnvironment {
        &self.inner.host
    }

    pub fn session(&self) -> Session {
        self.inner.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.inner.state.subscribe()
    }

    /// Set once an automatic sign-in has been started, cleared on failure or sign-out
    pub fn auto_sign_in_latch(&self) -> Arc<AtomicBool> {
        self.inner.auto_sign_in_attempted.clone()
    }

    pub async fn is_authenticated(&self) -> bool {
        let has_token = self.inner.state.borrow().token.is_some();
        if self.inner.host.is_embedded_host().await {
            has_token
        } else {
            self.inner.wallet.is_connected() && has_token
        }
    }

    pub async fn view(&self) -> AuthView {
        let is_authenticated = self.is_authenticated().await;
        let session = self.session();
        AuthView {
            token: session.token,
            user_data: session.user_data,
            is_loading: session.is_loading,
            is_authenticated,
        }
    }

    pub async fn sign_in(&self) -> Result<(), ClientError> {
        if self.is_torn_down() {
            return Err(ClientError::Cancelled);
        }
        if !self.begin_loading() {
            tracing::warn!("Sign-in requested while another is in flight");
            return Err(ClientError::SignInInFlight);
        }

        let outcome = self.negotiate().await;

        if self.is_torn_down() {
            self.finish_loading();
            return Err(ClientError::Cancelled);
        }

        match outcome {
            Ok((token, user_data)) => {
                self.inner.store.save(Some(&token), Some(&user_data));
                self.inner.state.send_replace(Session::authenticated(token, user_data));
                tracing::info!("Signed in");
                Ok(())
            },
            Err(e) => {
                self.finish_loading();
                tracing::error!("Sign-in failed: {}", e);
                Err(e)
            },
        }
    }

    pub async fn sign_out(&self) {
        if !self.inner.host.is_embedded_host().await && self.inner.wallet.is_connected() {
            if let Err(e) = self.inner.wallet.disconnect().await {
                tracing::warn!("Wallet disconnect failed: {}", e);
            }
        }

        self.inner.state.send_modify(|session| {
            session.token = None;
            session.user_data = None;
        });
        self.inner.store.save(None, None);
        self.inner.auto_sign_in_attempted.store(false, Ordering::SeqCst);
        tracing::info!("Signed out");
    }

    /// Cancel in-flight waits and stop the auto-sign-in trigger
    pub fn teardown(&self) {
        self.inner.shutdown.send_replace(true);
    }

    pub fn is_torn_down(&self) -> bool {
        *self.inner.shutdown.borrow()
    }

    #[cfg(test)]
    pub(crate) fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.inner.shutdown.subscribe()
    }

    // Compare-and-set on is_loading
    fn begin_loading(&self) -> bool {
        self.inner.state.send_if_modified(|session| {
            if session.is_loading {
                false
            } else {
                session.is_loading = true;
                true
            }
        })
    }

    fn finish_loading(&self) {
        self.inner.state.send_if_modified(|session| std::mem::replace(&mut session.is_loading, false));
    }

    async fn negotiate(&self) -> Result<(String, UserData), ClientError> {
        if self.inner.host.is_embedded_host().await {
            match self.host_sign_in().await {
                Ok(signed_in) => return Ok(signed_in),
                Err(ClientError::Cancelled) => return Err(ClientError::Cancelled),
                Err(e) if self.is_torn_down() => {
                    tracing::debug!("Embedded sign-in failed after teardown: {}", e);
                    return Err(ClientError::Cancelled);
                },
                Err(e) => tracing::warn!("Embedded sign-in failed, falling back to wallet: {}", e),
            }
        }

        self.wallet_sign_in().await
    }

    async fn host_sign_in(&self) -> Result<(String, UserData), ClientError> {
        let sdk = self.inner.host.sdk().ok_or(HostError::Unavailable)?;
        let signed = sdk
            .sign_in(HostSignInRequest {
                nonce: generate_nonce(),
                accept_auth_address: true,
            })
            .await?;

        let local_address = connected_address(self.inner.wallet.as_ref());
        let request = AuthRequest::host(signed.message, signed.signature.clone(), local_address.clone());
        let response = self.inner.api.verify(&request).await?;

        let token = non_empty_or(response.token, signed.signature);
        let user_data = UserData {
            fid: response.fid,
            address: local_address.or(response.address),
        };
        Ok((token, user_data))
    }

    async fn wallet_sign_in(&self) -> Result<(String, UserData), ClientError> {
        let wallet = self.inner.wallet.as_ref();

        let address = match connected_address(wallet) {
            Some(address) => address,
            None => {
                wallet.open_modal().await?;
                let mut shutdown = self.shutdown_signal();
                wait_for_address(
                    wallet,
                    self.inner.options.poll_interval,
                    self.inner.options.poll_attempts,
                    &mut shutdown,
                )
                .await?
            },
        };

        let message = sign_in_message(Utc::now());
        let signature = wallet.sign_message(&message).await?;

        let request = AuthRequest::wallet(address.clone(), message, signature.clone());
        let response = self.inner.api.verify(&request).await?;

        let token = non_empty_or(response.token, signature);
        let user_data = UserData {
            address: response.address.filter(|a| !a.is_empty()).or(Some(address)),
            fid: response.fid,
        };
        Ok((token, user_data))
    }
}

/// Message the wallet is asked to sign
pub fn sign_in_message(now: DateTime<Utc>) -> String {
    format!(
        "Sign in to this app at {}",
        now.to_rfc3339_opts(SecondsFormat::Millis, true)
    )
}

fn non_empty_or(value: String, fallback: String) -> String {
    if value.is_empty() {
        fallback
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{identity, Harness, MockHost, MockWallet};
    use chrono::TimeZone;

    #[test]
    fn test_sign_in_message_format() {
        let at = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(sign_in_message(at), "Sign in to this app at 2024-01-02T03:04:05.000Z");
    }

    #[tokio::test]
    async fn test_embedded_sign_in_uses_host_assertion() {
        let h = Harness::embedded(MockHost::supporting(), MockWallet::disconnected());
        h.api.respond(Ok(identity(Some(99), None, "server-token")));

        h.negotiator.sign_in().await.unwrap();

        let session = h.negotiator.session();
        assert_eq!(session.token.as_deref(), Some("server-token"));
        assert_eq!(session.user_data, Some(UserData { fid: Some(99), address: None }));
        assert!(!session.is_loading);
        assert!(h.negotiator.is_authenticated().await);

        let requests = h.api.requests();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].is_host_assertion());
        assert_eq!(requests[0].address, None);
        assert_eq!(h.wallet.modal_opens(), 0);

        // Mirrored to storage
        assert_eq!(h.store.load().token.as_deref(), Some("server-token"));
    }

    #[tokio::test]
    async fn test_embedded_token_falls_back_to_signature() {
        let wallet = MockWallet::disconnected();
        wallet.connect("0xlocal");
        let h = Harness::embedded(MockHost::supporting(), wallet);
        h.api.respond(Ok(identity(Some(5), Some("0xserver"), "")));

        h.negotiator.sign_in().await.unwrap();

        let session = h.negotiator.session();
        assert_eq!(session.token.as_deref(), Some(MockHost::SIGNATURE));
        // Locally connected address wins on the host path
        assert_eq!(
            session.user_data,
            Some(UserData { fid: Some(5), address: Some("0xlocal".to_string()) })
        );
        assert_eq!(h.api.requests()[0].address.as_deref(), Some("0xlocal"));
    }

    #[tokio::test]
    async fn test_host_rejection_falls_back_to_wallet() {
        let wallet = MockWallet::disconnected();
        wallet.connect("0xabc");
        let h = Harness::embedded(MockHost::supporting(), wallet);
        h.api.respond(Err((401, "SIWF verification failed")));
        h.api.respond(Ok(identity(None, Some("0xabc"), "wallet-token")));

        h.negotiator.sign_in().await.unwrap();

        let requests = h.api.requests();
        assert_eq!(requests.len(), 2);
        assert!(!requests[1].is_host_assertion());
        assert!(requests[1]
            .message
            .as_deref()
            .is_some_and(|m| m.starts_with("Sign in to this app at ")));
        assert_eq!(requests[1].signature.as_deref(), Some(MockWallet::SIGNATURE));
        assert_eq!(h.negotiator.session().token.as_deref(), Some("wallet-token"));
    }

    #[tokio::test]
    async fn test_wallet_sign_in_fills_missing_response_fields() {
        let wallet = MockWallet::disconnected();
        wallet.connect("0xabc");
        let h = Harness::detached(wallet);
        h.api.respond(Ok(identity(None, None, "")));

        h.negotiator.sign_in().await.unwrap();

        let session = h.negotiator.session();
        assert_eq!(session.token.as_deref(), Some(MockWallet::SIGNATURE));
        assert_eq!(
            session.user_data,
            Some(UserData { fid: None, address: Some("0xabc".to_string()) })
        );
        assert!(h.negotiator.is_authenticated().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wallet_never_connects_times_out() {
        let h = Harness::detached(MockWallet::disconnected());

        let err = h.negotiator.sign_in().await.unwrap_err();

        assert!(matches!(err, ClientError::ConnectionTimeout(_)));
        assert_eq!(h.wallet.modal_opens(), 1);
        assert_eq!(h.negotiator.session(), Session::default());
        assert!(h.api.requests().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_wallet_connecting_after_modal_signs_in() {
        let wallet = MockWallet::disconnected();
        wallet.connect_on_modal("0xdef");
        let h = Harness::detached(wallet);
        h.api.respond(Ok(identity(None, Some("0xdef"), "t")));

        h.negotiator.sign_in().await.unwrap();
        assert_eq!(h.wallet.modal_opens(), 1);
        assert_eq!(h.api.requests()[0].address.as_deref(), Some("0xdef"));
    }

    #[tokio::test]
    async fn test_server_rejection_leaves_session_untouched() {
        let wallet = MockWallet::disconnected();
        wallet.connect("0xabc");
        let h = Harness::detached(wallet);
        h.api.respond(Err((401, "Invalid signature")));

        let err = h.negotiator.sign_in().await.unwrap_err();

        assert!(matches!(err, ClientError::Authentication { status: 401, .. }));
        assert_eq!(h.negotiator.session(), Session::default());
        assert!(h.store.load().token.is_none());
    }

    #[tokio::test]
    async fn test_concurrent_sign_in_is_refused() {
        let wallet = MockWallet::disconnected();
        wallet.connect("0xabc");
        let h = Harness::detached(wallet);
        let gate = h.api.hold();
        h.api.respond(Ok(identity(None, Some("0xabc"), "t")));

        let first = tokio::spawn({
            let negotiator = h.negotiator.clone();
            async move { negotiator.sign_in().await }
        });
        h.wait_until_loading().await;

        assert!(matches!(h.negotiator.sign_in().await, Err(ClientError::SignInInFlight)));
        assert!(h.negotiator.session().is_loading);

        gate.notify_one();
        first.await.unwrap().unwrap();
        assert_eq!(h.api.requests().len(), 1);
        assert_eq!(h.negotiator.session().token.as_deref(), Some("t"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_teardown_cancels_wallet_wait() {
        let h = Harness::detached(MockWallet::disconnected());

        let pending = tokio::spawn({
            let negotiator = h.negotiator.clone();
            async move { negotiator.sign_in().await }
        });
        h.wait_until_loading().await;
        h.negotiator.teardown();

        assert!(matches!(pending.await.unwrap(), Err(ClientError::Cancelled)));
        assert!(!h.negotiator.session().is_loading);
        assert!(matches!(h.negotiator.sign_in().await, Err(ClientError::Cancelled)));
    }

    #[tokio::test]
    async fn test_teardown_during_host_sign_in_skips_wallet_fallback() {
        let wallet = MockWallet::disconnected();
        wallet.connect("0xabc");
        let h = Harness::embedded(MockHost::supporting(), wallet);
        let gate = h.api.hold();
        h.api.respond(Err((401, "SIWF verification failed")));
        h.api.respond(Ok(identity(None, Some("0xabc"), "wallet-token")));

        let pending = tokio::spawn({
            let negotiator = h.negotiator.clone();
            async move { negotiator.sign_in().await }
        });
        h.wait_until_loading().await;
        h.negotiator.teardown();
        gate.notify_one();

        assert!(matches!(pending.await.unwrap(), Err(ClientError::Cancelled)));
        // Only the host assertion reached the server
        let requests = h.api.requests();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].is_host_assertion());
        assert!(h.negotiator.session().token.is_none());
        assert!(h.store.load().token.is_none());
    }

    #[tokio::test]
    async fn test_sign_out_clears_and_disconnects() {
        let wallet = MockWallet::disconnected();
        wallet.connect("0xabc");
        let h = Harness::detached(wallet);
        h.api.respond(Ok(identity(None, Some("0xabc"), "t")));
        h.negotiator.sign_in().await.unwrap();
        h.negotiator.auto_sign_in_latch().store(true, Ordering::SeqCst);

        h.negotiator.sign_out().await;

        assert_eq!(h.negotiator.session(), Session::default());
        assert_eq!(h.store.load(), Session::default());
        assert_eq!(h.wallet.disconnects(), 1);
        assert!(!h.negotiator.auto_sign_in_latch().load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_sign_out_inside_host_keeps_wallet() {
        let wallet = MockWallet::disconnected();
        wallet.connect("0xabc");
        let h = Harness::embedded(MockHost::supporting(), wallet);

        h.negotiator.sign_out().await;
        assert_eq!(h.wallet.disconnects(), 0);
    }

    #[tokio::test]
    async fn test_is_authenticated_rules() {
        let wallet = MockWallet::disconnected();
        let h = Harness::detached(wallet);
        assert!(!h.negotiator.is_authenticated().await);

        // Token restored but wallet disconnected outside the host
        h.store.save(Some("t"), Some(&UserData { fid: None, address: Some("0xabc".into()) }));
        let restored = h.rebuild();
        assert!(restored.session().token.is_some());
        assert!(!restored.is_authenticated().await);

        h.wallet.connect("0xabc");
        assert!(restored.is_authenticated().await);

        let view = restored.view().await;
        assert!(view.is_authenticated);
        assert_eq!(view.token.as_deref(), Some("t"));
    }
}
