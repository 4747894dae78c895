// web-server/src/state.rs
use std::sync::Arc;

use common::{AuthConfig, HostVerificationMode, TokenMode};

use crate::verify::{
    ChainedTokenVerifier, Eip191Verifier, HostAssertionVerifier, JwtSessionTokens,
    QuickAuthTokenVerifier, ShapeOnlyVerifier, SignatureEcho, SignatureVerifier,
    SiwfSignatureVerifier, StaticFidAuthority, TokenError, TokenIssuer, TokenVerifier,
};

/// Immutable capabilities shared by every auth request
#[derive(Clone)]
pub struct AuthState {
    pub signature_verifier: Arc<dyn SignatureVerifier>,
    pub host_verifier: Arc<dyn HostAssertionVerifier>,
    pub token_issuer: Arc<dyn TokenIssuer>,
    pub token_verifier: Arc<dyn TokenVerifier>,
}

impl AuthState {
    pub fn new(
        signature_verifier: Arc<dyn SignatureVerifier>,
        host_verifier: Arc<dyn HostAssertionVerifier>,
        token_issuer: Arc<dyn TokenIssuer>,
        token_verifier: Arc<dyn TokenVerifier>,
    ) -> Self {
        Self {
            signature_verifier,
            host_verifier,
            token_issuer,
            token_verifier,
        }
    }

    /// Wire the verifiers selected by configuration
    pub fn from_config(config: &AuthConfig) -> Result<Self, TokenError> {
        let host_verifier: Arc<dyn HostAssertionVerifier> = match config.host_verification {
            HostVerificationMode::ShapeOnly => Arc::new(ShapeOnlyVerifier),
            HostVerificationMode::Signature => Arc::new(SiwfSignatureVerifier::new(
                Arc::new(StaticFidAuthority::from_config(config)),
                Some(config.domain.clone()),
            )),
        };

        let session_tokens = JwtSessionTokens::new(
            config.jwt_secret.as_bytes().to_vec(),
            config.domain.clone(),
            config.token_ttl_seconds,
        );

        let token_issuer: Arc<dyn TokenIssuer> = match config.token_mode {
            TokenMode::Signature => Arc::new(SignatureEcho),
            TokenMode::Jwt => Arc::new(session_tokens.clone()),
        };

        let mut verifiers: Vec<Arc<dyn TokenVerifier>> = vec![Arc::new(session_tokens)];
        if let Some(pem) = config.quick_auth_public_key_pem.as_deref() {
            verifiers.push(Arc::new(QuickAuthTokenVerifier::from_ed_pem(
                pem,
                &config.domain,
                &config.quick_auth_issuer,
            )?));
        }

        tracing::info!(
            "Auth configured: domain={}, token_mode={:?}, host_verification={:?}",
            config.domain,
            config.token_mode,
            config.host_verification
        );

        Ok(Self::new(
            Arc::new(Eip191Verifier),
            host_verifier,
            token_issuer,
            Arc::new(ChainedTokenVerifier::new(verifiers)),
        ))
    }
}
