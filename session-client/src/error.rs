// session-client/src/error.rs
use std::time::Duration;

use thiserror::Error;

/// Failures reported by the embedded host SDK
#[derive(Debug, Error)]
pub enum HostError {
    #[error("Host SDK is not available")]
    Unavailable,

    #[error("Host sign-in rejected: {0}")]
    Rejected(String),

    #[error("Host SDK failure: {0}")]
    Sdk(String),
}

/// Failures reported by the wallet connector
#[derive(Debug, Error)]
pub enum WalletError {
    #[error("Wallet is not connected")]
    NotConnected,

    #[error("User rejected the wallet request: {0}")]
    Rejected(String),

    #[error("Wallet connector failure: {0}")]
    Connector(String),
}

/// Failures of the session key/value slot. Never surfaced past the store.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Stored value could not be encoded: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Wallet did not connect within {0:?}")]
    ConnectionTimeout(Duration),

    #[error("Authentication failed ({status}): {message}")]
    Authentication { status: u16, message: String },

    #[error(transparent)]
    Host(#[from] HostError),

    #[error(transparent)]
    Wallet(#[from] WalletError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("A sign-in is already in progress")]
    SignInInFlight,

    #[error("Session was torn down")]
    Cancelled,
}
