// session-client/src/auto_sign_in.rs
use std::sync::atomic::Ordering;

use tokio::task::JoinHandle;

use crate::negotiator::SessionNegotiator;
use crate::wallet::cancelled;

/// Signs in automatically, once, when running inside an embedded host
#[derive(Clone)]
pub struct AutoSignIn {
    negotiator: SessionNegotiator,
}

impl AutoSignIn {
    pub fn new(negotiator: SessionNegotiator) -> Self {
        Self { negotiator }
    }

    /// Start a background sign-in if embedded, not yet attempted, signed out and idle
    pub async fn evaluate(&self) -> Option<JoinHandle<()>> {
        if self.negotiator.is_torn_down() {
            return None;
        }

        let session = self.negotiator.session();
        if session.token.is_some() || session.is_loading {
            return None;
        }

        if !self.negotiator.host().is_embedded_host().await {
            return None;
        }

        let latch = self.negotiator.auto_sign_in_latch();
        if latch
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return None;
        }

        tracing::info!("Embedded host detected, signing in automatically");
        let negotiator = self.negotiator.clone();
        Some(tokio::spawn(async move {
            if let Err(e) = negotiator.sign_in().await {
                tracing::warn!("Automatic sign-in failed: {}", e);
                latch.store(false, Ordering::SeqCst);
            }
        }))
    }

    /// Evaluate now, then again whenever the embedded-host answer changes,
    /// until the negotiator is torn down
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut host_changes = self.negotiator.host().subscribe();
            host_changes.borrow_and_update();
            let mut shutdown = self.negotiator.shutdown_signal();

            let mut embedded = self.negotiator.host().is_embedded_host().await;
            self.evaluate().await;

            loop {
                tokio::select! {
                    changed = host_changes.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let now_embedded = self.negotiator.host().is_embedded_host().await;
                        if now_embedded != embedded {
                            embedded = now_embedded;
                            self.evaluate().await;
                        }
                    },
                    _ = cancelled(&mut shutdown) => break,
                }
            }

            tracing::debug!("Auto sign-in trigger stopped");
        })
    }
}
