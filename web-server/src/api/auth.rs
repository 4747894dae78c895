// web-server/src/api/auth.rs
use actix_web::{get, post, http::header, web, HttpRequest, HttpResponse};
use common::{AuthRequest, IdentityResult, TokenInfo};
use futures_util::StreamExt;

use crate::error::AuthError;
use crate::state::AuthState;
use crate::verify::siwf::{extract_fid, HostAssertion};
use crate::verify::{normalize_signature, TokenError, TokenSubject};

/// Largest accepted POST body; assertions are a message and a signature
pub const MAX_BODY_BYTES: usize = 64 * 1024;

// Verify an embedded-host or wallet assertion and hand back a token
#[post("/auth")]
pub async fn verify_assertion(
    payload: web::Payload,
    state: web::Data<AuthState>,
) -> Result<HttpResponse, AuthError> {
    let body = read_body(payload).await?;
    let request: AuthRequest = serde_json::from_slice(&body).map_err(|e| {
        tracing::debug!("Rejecting malformed auth body: {}", e);
        AuthError::MalformedBody
    })?;

    let result = if request.is_host_assertion() {
        verify_host_assertion(&request, &state).await?
    } else {
        verify_wallet_assertion(&request, &state).await?
    };

    Ok(HttpResponse::Ok().json(result))
}

// Validate a previously issued token
#[get("/auth")]
pub async fn token_info(
    req: HttpRequest,
    state: web::Data<AuthState>,
) -> Result<HttpResponse, AuthError> {
    let token = bearer_token(&req).ok_or(AuthError::MissingBearer)?;

    match state.token_verifier.verify(&token).await {
        Ok(subject) => Ok(HttpResponse::Ok().json(TokenInfo {
            fid: subject.fid,
            address: subject.address,
        })),
        Err(TokenError::Invalid(reason)) => {
            tracing::debug!("Bearer token rejected: {}", reason);
            Err(AuthError::InvalidToken)
        },
        Err(TokenError::Backend(detail)) => Err(AuthError::Internal(detail)),
    }
}

async fn verify_host_assertion(request: &AuthRequest, state: &AuthState) -> Result<IdentityResult, AuthError> {
    let message = request.message.clone().unwrap_or_default();
    let signature = request.signature.clone().unwrap_or_default();

    let fid = extract_fid(&message).ok_or(AuthError::InvalidHostMessage)?;
    let address = non_empty(&request.address).map(str::to_string);

    let assertion = HostAssertion {
        fid,
        message,
        signature,
        address: address.clone(),
    };

    if let Err(e) = state.host_verifier.verify(&assertion).await {
        tracing::warn!("SIWF verification error for fid {}: {}", fid, e);
        return Err(AuthError::HostVerificationFailed);
    }

    let subject = TokenSubject { fid: Some(fid), address: address.clone() };
    let token = state
        .token_issuer
        .issue(&subject, &assertion.signature)
        .map_err(|e| AuthError::Internal(e.to_string()))?;

    tracing::info!("Verified embedded host sign-in for fid {}", fid);

    Ok(IdentityResult {
        fid: Some(fid),
        address,
        token,
    })
}

async fn verify_wallet_assertion(request: &AuthRequest, state: &AuthState) -> Result<IdentityResult, AuthError> {
    let (address, message, signature) = match (
        non_empty(&request.address),
        non_empty(&request.message),
        non_empty(&request.signature),
    ) {
        (Some(address), Some(message), Some(signature)) => (address, message, signature),
        _ => return Err(AuthError::MissingFields),
    };

    let normalized = normalize_signature(signature);
    let valid = state
        .signature_verifier
        .verify(address, message, &normalized)
        .await
        .map_err(|e| AuthError::Internal(e.to_string()))?;

    if !valid {
        tracing::warn!("Invalid wallet signature for {}", address);
        return Err(AuthError::InvalidSignature);
    }

    let subject = TokenSubject { fid: None, address: Some(address.to_string()) };
    let token = state
        .token_issuer
        .issue(&subject, signature)
        .map_err(|e| AuthError::Internal(e.to_string()))?;

    tracing::info!("Verified wallet sign-in for {}", address);

    Ok(IdentityResult {
        fid: None,
        address: Some(address.to_string()),
        token,
    })
}

async fn read_body(mut payload: web::Payload) -> Result<web::BytesMut, AuthError> {
    let mut body = web::BytesMut::new();
    while let Some(chunk) = payload.next().await {
        let chunk = chunk.map_err(|e| {
            tracing::debug!("Failed to read auth body: {}", e);
            AuthError::MalformedBody
        })?;
        if body.len() + chunk.len() > MAX_BODY_BYTES {
            return Err(AuthError::PayloadTooLarge);
        }
        body.extend_from_slice(&chunk);
    }
    Ok(body)
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

fn bearer_token(req: &HttpRequest) -> Option<String> {
    let value = req.headers().get(header::AUTHORIZATION)?.to_str().ok()?;
    value
        .strip_prefix("Bearer ")
        .and_then(|rest| rest.split(' ').next())
        .filter(|token| !token.is_empty())
        .map(str::to_string)
}
