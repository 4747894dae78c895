// session-client/src/lib.rs
//! Client side of the mini app sign-in: negotiates a session through the
//! embedded host when available, otherwise through an external wallet.
pub mod api;
pub mod auto_sign_in;
pub mod error;
pub mod host;
pub mod init;
pub mod negotiator;
pub mod session;
pub mod store;
pub mod wallet;

#[cfg(test)]
pub(crate) mod testing;

pub use self::api::{HttpVerificationApi, VerificationApi};
pub use self::auto_sign_in::AutoSignIn;
pub use self::error::{ClientError, HostError, StorageError, WalletError};
pub use self::host::{HostEnvironment, HostSdk, HostSignInRequest, HostSignInResult};
pub use self::init::{initialize, ClientHandle};
pub use self::negotiator::{sign_in_message, NegotiatorOptions, SessionNegotiator};
pub use self::session::{AuthView, Session};
pub use self::store::{FileStorage, KeyValueStorage, MemoryStorage, SessionStore};
pub use self::wallet::{wait_for_address, WalletConnector};
