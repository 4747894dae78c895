// common/src/models/identity.rs
use serde::{Deserialize, Serialize};

/// Substring that marks an embedded-host (SIWF) message
pub const HOST_MESSAGE_MARKER: &str = "FID:";

/// Normalized identity of a signed-in user
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserData {
    /// Farcaster numeric ID, known when signed in through the embedded host
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fid: Option<u64>,
    /// On-chain address
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

/// Identity assertion posted to `POST /api/auth`.
///
/// Both shapes share the same fields; the endpoint tells them apart by the
/// `FID:` marker in `message`, there is no type tag.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthRequest {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub signature: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
}

impl AuthRequest {
    /// Assertion produced by the embedded host sign-in action
    pub fn host(message: String, signature: String, address: Option<String>) -> Self {
        Self {
            message: Some(message),
            signature: Some(signature),
            address,
        }
    }

    /// Assertion produced by signing a message with an external wallet
    pub fn wallet(address: String, message: String, signature: String) -> Self {
        Self {
            message: Some(message),
            signature: Some(signature),
            address: Some(address),
        }
    }

    /// Whether the request takes the embedded-host path
    pub fn is_host_assertion(&self) -> bool {
        let has_signature = self.signature.as_deref().is_some_and(|s| !s.is_empty());
        let has_marker = self
            .message
            .as_deref()
            .is_some_and(|m| m.contains(HOST_MESSAGE_MARKER));
        has_signature && has_marker
    }
}

/// Successful verification result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fid: Option<u64>,
    // Always serialized, `null` on the host path when no address was supplied
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub token: String,
}

/// Body of every non-2xx response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>) -> Self {
        Self { error: error.into() }
    }
}

/// Response of `GET /api/auth`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenInfo {
    pub fid: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}
