// session-client/src/init.rs
use std::sync::{Arc, OnceLock};

use common::ClientConfig;

use crate::api::HttpVerificationApi;
use crate::auto_sign_in::AutoSignIn;
use crate::error::ClientError;
use crate::host::HostEnvironment;
use crate::negotiator::{NegotiatorOptions, SessionNegotiator};
use crate::store::{FileStorage, KeyValueStorage, MemoryStorage, SessionStore};
use crate::wallet::WalletConnector;

static CLIENT: OnceLock<ClientHandle> = OnceLock::new();

/// Process-wide session client
#[derive(Clone)]
pub struct ClientHandle {
    negotiator: SessionNegotiator,
}

impl ClientHandle {
    pub fn negotiator(&self) -> &SessionNegotiator {
        &self.negotiator
    }

    pub fn teardown(&self) {
        self.negotiator.teardown();
    }
}

/// Build the session client once per process.
///
/// Later calls return the existing handle and ignore their arguments.
pub async fn initialize(
    config: &ClientConfig,
    host: HostEnvironment,
    wallet: Arc<dyn WalletConnector>,
) -> Result<ClientHandle, ClientError> {
    install(&CLIENT, || {
        let api = Arc::new(HttpVerificationApi::new(&config.backend_origin)?);
        Ok(SessionNegotiator::new(
            host,
            wallet,
            api,
            SessionStore::new(storage_for(config)),
            NegotiatorOptions::from(config),
        ))
    })
    .await
}

pub(crate) async fn install<F>(cell: &OnceLock<ClientHandle>, build: F) -> Result<ClientHandle, ClientError>
where
    F: FnOnce() -> Result<SessionNegotiator, ClientError>,
{
    if let Some(existing) = cell.get() {
        tracing::warn!("Session client already initialized, reusing it");
        return Ok(existing.clone());
    }

    let negotiator = build()?;
    let mut fresh = false;
    let handle = cell
        .get_or_init(|| {
            fresh = true;
            ClientHandle { negotiator }
        })
        .clone();

    if !fresh {
        tracing::warn!("Session client already initialized, reusing it");
        return Ok(handle);
    }

    handle.negotiator.host().ready().await;
    AutoSignIn::new(handle.negotiator.clone()).spawn();
    tracing::info!("Session client initialized");

    Ok(handle)
}

fn storage_for(config: &ClientConfig) -> Arc<dyn KeyValueStorage> {
    match config.storage_dir.as_deref() {
        Some(dir) => match FileStorage::new(dir) {
            Ok(storage) => Arc::new(storage),
            Err(e) => {
                tracing::warn!("Session directory {} unusable, keeping session in memory: {}", dir, e);
                Arc::new(MemoryStorage::new())
            },
        },
        None => Arc::new(MemoryStorage::new()),
    }
}
