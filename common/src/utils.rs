// Common Crate - utils.rs
// common/src/utils.rs
use tracing::Level;
use tracing_subscriber::FmtSubscriber;
use jsonwebtoken::{encode, decode, Header, Algorithm, Validation, EncodingKey, DecodingKey};
use rand::{thread_rng, Rng};
use rand::distributions::Alphanumeric;
use serde::{Serialize, Deserialize};
use uuid::Uuid;

/// Length of the nonce handed to the embedded host sign-in action
pub const NONCE_LENGTH: usize = 24;

/// Setup tracing for consistent logging across services.
///
/// Safe to call more than once; only the first subscriber is installed.
pub fn setup_tracing(level: &str) {
    let level = level.parse::<Level>().unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .finish();

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        tracing::debug!("Tracing subscriber already installed");
    }
}

/// Generate a random alphanumeric token of the given length
pub fn generate_random_token(length: usize) -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

/// Nonce for the SIWF challenge. Collision resistant, not a trust boundary:
/// the embedded host signs it, this crate only makes it hard to replay.
pub fn generate_nonce() -> String {
    generate_random_token(NONCE_LENGTH)
}

// Session token claims
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionClaims {
    pub sub: String,            // fid if known, otherwise the wallet address
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fid: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    pub aud: String,            // app domain
    pub exp: usize,             // expiration time
    pub iat: usize,             // issued at time
    pub jti: String,
}

impl SessionClaims {
    pub fn new(fid: Option<u64>, address: Option<String>, audience: &str, ttl_seconds: u64) -> Self {
        let now = chrono::Utc::now().timestamp().max(0) as usize;
        let sub = match (fid, address.as_deref()) {
            (Some(fid), _) => fid.to_string(),
            (None, Some(address)) => address.to_string(),
            (None, None) => String::new(),
        };

        Self {
            sub,
            fid,
            address,
            aud: audience.to_string(),
            iat: now,
            exp: now + ttl_seconds as usize,
            jti: Uuid::new_v4().to_string(),
        }
    }
}

// Sign session claims into an HS256 token
pub fn generate_session_token(claims: &SessionClaims, secret: &[u8]) -> Result<String, jsonwebtoken::errors::Error> {
    encode(
        &Header::default(),
        claims,
        &EncodingKey::from_secret(secret)
    )
}

// Validate a session token for the given audience and return its claims
pub fn validate_session_token(token: &str, secret: &[u8], audience: &str) -> Result<SessionClaims, jsonwebtoken::errors::Error> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_audience(&[audience]);

    let token_data = decode::<SessionClaims>(
        token,
        &DecodingKey::from_secret(secret),
        &validation
    )?;

    Ok(token_data.claims)
}
