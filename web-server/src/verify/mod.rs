// web-server/src/verify/mod.rs
//! Verification capabilities used by the auth endpoint.
//!
//! Each check sits behind a trait so the handler never depends on a concrete
//! cryptographic backend:
//!
//! - [`SignatureVerifier`] - wallet `personal_sign` assertions
//! - [`HostAssertionVerifier`] - embedded host (SIWF) assertions
//! - [`TokenIssuer`] / [`TokenVerifier`] - the credential handed back to clients

pub mod eip191;
pub mod siwf;
pub mod token;

use async_trait::async_trait;
use thiserror::Error;

pub use eip191::Eip191Verifier;
pub use siwf::{FidAuthority, HostAssertion, ShapeOnlyVerifier, SiwfSignatureVerifier, StaticFidAuthority};
pub use token::{ChainedTokenVerifier, JwtSessionTokens, QuickAuthTokenVerifier, SignatureEcho};

/// Errors raised by verifier backends
#[derive(Debug, Error)]
pub enum VerifyError {
    /// The assertion was checked and does not hold
    #[error("Assertion rejected: {0}")]
    Rejected(String),

    /// The check could not be carried out
    #[error("Verifier failure: {0}")]
    Backend(String),
}

/// Errors raised while issuing or checking tokens
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("Invalid token: {0}")]
    Invalid(String),

    #[error("Token backend failure: {0}")]
    Backend(String),
}

/// Verifies that `signature` over `message` was produced by `address`
#[async_trait]
pub trait SignatureVerifier: Send + Sync {
    /// `Ok(false)` means the signature is well-formed enough to check and does not match
    async fn verify(&self, address: &str, message: &str, signature: &str) -> Result<bool, VerifyError>;
}

/// Verifies an embedded-host sign-in assertion
#[async_trait]
pub trait HostAssertionVerifier: Send + Sync {
    async fn verify(&self, assertion: &HostAssertion) -> Result<(), VerifyError>;
}

/// Identity a token is minted for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenSubject {
    pub fid: Option<u64>,
    pub address: Option<String>,
}

/// Produces the credential returned after a successful verification
pub trait TokenIssuer: Send + Sync {
    fn issue(&self, subject: &TokenSubject, signature: &str) -> Result<String, TokenError>;
}

/// Validates a bearer token presented to `GET /api/auth`
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<TokenSubject, TokenError>;
}

/// Prefix a signature with `0x` when it lacks one
pub fn normalize_signature(signature: &str) -> String {
    let trimmed = signature.trim();
    if trimmed.starts_with("0x") {
        trimmed.to_string()
    } else {
        format!("0x{}", trimmed)
    }
}
