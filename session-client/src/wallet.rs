// session-client/src/wallet.rs
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::error::{ClientError, WalletError};

/// External browser wallet, as exposed by the wallet adapter
#[async_trait]
pub trait WalletConnector: Send + Sync {
    fn is_connected(&self) -> bool;
    fn address(&self) -> Option<String>;
    /// Ask the user to pick and connect a wallet
    async fn open_modal(&self) -> Result<(), WalletError>;
    /// EIP-191 `personal_sign`
    async fn sign_message(&self, message: &str) -> Result<String, WalletError>;
    async fn disconnect(&self) -> Result<(), WalletError>;
}

/// Address of a connected wallet, if any
pub fn connected_address(wallet: &dyn WalletConnector) -> Option<String> {
    if !wallet.is_connected() {
        return None;
    }
    wallet.address().filter(|a| !a.is_empty())
}

/// Poll every `interval`, up to `attempts` times, for the wallet to connect.
/// Gives up early with `Cancelled` once `cancel` flips to true.
pub async fn wait_for_address(
    wallet: &dyn WalletConnector,
    interval: Duration,
    attempts: u32,
    cancel: &mut watch::Receiver<bool>,
) -> Result<String, ClientError> {
    let mut ticker = interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    for _ in 0..attempts {
        tokio::select! {
            _ = ticker.tick() => {},
            _ = cancelled(cancel) => return Err(ClientError::Cancelled),
        }

        if let Some(address) = connected_address(wallet) {
            return Ok(address);
        }
    }

    Err(ClientError::ConnectionTimeout(interval * attempts))
}

/// Resolves once the flag is true. Pends forever if the sender is gone.
pub(crate) async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    loop {
        if *cancel.borrow_and_update() {
            return;
        }
        if cancel.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
