// web-server/src/verify/token.rs
use std::sync::Arc;

use async_trait::async_trait;
use common::{generate_session_token, validate_session_token, SessionClaims};
use jsonwebtoken::errors::ErrorKind as JwtErrorKind;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;

use super::{TokenError, TokenIssuer, TokenSubject, TokenVerifier};

/// Legacy issuance: the submitted signature doubles as the token.
/// Such tokens cannot be checked later by `GET /api/auth`.
#[derive(Debug, Clone, Default)]
pub struct SignatureEcho;

impl TokenIssuer for SignatureEcho {
    fn issue(&self, _subject: &TokenSubject, signature: &str) -> Result<String, TokenError> {
        Ok(signature.to_string())
    }
}

/// Server-minted HS256 session tokens
#[derive(Clone)]
pub struct JwtSessionTokens {
    secret: Vec<u8>,
    audience: String,
    ttl_seconds: u64,
}

impl JwtSessionTokens {
    pub fn new(secret: impl Into<Vec<u8>>, audience: impl Into<String>, ttl_seconds: u64) -> Self {
        Self {
            secret: secret.into(),
            audience: audience.into(),
            ttl_seconds,
        }
    }
}

impl TokenIssuer for JwtSessionTokens {
    fn issue(&self, subject: &TokenSubject, _signature: &str) -> Result<String, TokenError> {
        let claims = SessionClaims::new(subject.fid, subject.address.clone(), &self.audience, self.ttl_seconds);
        generate_session_token(&claims, &self.secret).map_err(|e| TokenError::Backend(e.to_string()))
    }
}

#[async_trait]
impl TokenVerifier for JwtSessionTokens {
    async fn verify(&self, token: &str) -> Result<TokenSubject, TokenError> {
        let claims = validate_session_token(token, &self.secret, &self.audience).map_err(classify_jwt_error)?;
        Ok(TokenSubject {
            fid: claims.fid,
            address: claims.address,
        })
    }
}

#[derive(Debug, Deserialize)]
struct QuickAuthClaims {
    sub: serde_json::Value,
    #[serde(default)]
    address: Option<String>,
}

/// Verifies quick auth tokens minted by the embedded host's auth server
#[derive(Clone)]
pub struct QuickAuthTokenVerifier {
    key: DecodingKey,
    audience: String,
    issuer: String,
}

impl QuickAuthTokenVerifier {
    pub fn from_ed_pem(pem: &str, audience: &str, issuer: &str) -> Result<Self, TokenError> {
        let key = DecodingKey::from_ed_pem(pem.as_bytes())
            .map_err(|e| TokenError::Backend(format!("invalid quick auth public key: {}", e)))?;
        Ok(Self {
            key,
            audience: audience.to_string(),
            issuer: issuer.to_string(),
        })
    }
}

#[async_trait]
impl TokenVerifier for QuickAuthTokenVerifier {
    async fn verify(&self, token: &str) -> Result<TokenSubject, TokenError> {
        let mut validation = Validation::new(Algorithm::EdDSA);
        validation.set_audience(&[&self.audience]);
        validation.set_issuer(&[&self.issuer]);

        let data = decode::<QuickAuthClaims>(token, &self.key, &validation).map_err(classify_jwt_error)?;

        let fid = match &data.claims.sub {
            serde_json::Value::Number(n) => n.as_u64(),
            serde_json::Value::String(s) => s.parse::<u64>().ok(),
            _ => None,
        }
        .ok_or_else(|| TokenError::Invalid("subject is not a fid".to_string()))?;

        Ok(TokenSubject {
            fid: Some(fid),
            address: data.claims.address,
        })
    }
}

/// Tries each verifier in order; the first acceptance wins
pub struct ChainedTokenVerifier {
    verifiers: Vec<Arc<dyn TokenVerifier>>,
}

impl ChainedTokenVerifier {
    pub fn new(verifiers: Vec<Arc<dyn TokenVerifier>>) -> Self {
        Self { verifiers }
    }
}

#[async_trait]
impl TokenVerifier for ChainedTokenVerifier {
    async fn verify(&self, token: &str) -> Result<TokenSubject, TokenError> {
        let mut last = TokenError::Invalid("no token verifier configured".to_string());
        for verifier in &self.verifiers {
            match verifier.verify(token).await {
                Ok(subject) => return Ok(subject),
                Err(TokenError::Invalid(reason)) => last = TokenError::Invalid(reason),
                Err(e) => return Err(e),
            }
        }
        Err(last)
    }
}

fn classify_jwt_error(err: jsonwebtoken::errors::Error) -> TokenError {
    match err.kind() {
        JwtErrorKind::Crypto(_) => TokenError::Backend(err.to_string()),
        _ => TokenError::Invalid(err.to_string()),
    }
}
