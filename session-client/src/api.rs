// session-client/src/api.rs
use std::time::Duration;

use async_trait::async_trait;
use common::{AuthRequest, ErrorBody, IdentityResult};
use reqwest::Client;

use crate::error::ClientError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Client side of `POST /api/auth`
#[async_trait]
pub trait VerificationApi: Send + Sync {
    async fn verify(&self, request: &AuthRequest) -> Result<IdentityResult, ClientError>;
}

pub struct HttpVerificationApi {
    client: Client,
    endpoint: String,
}

impl HttpVerificationApi {
    pub fn new(backend_origin: &str) -> Result<Self, ClientError> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            endpoint: format!("{}/api/auth", backend_origin.trim_end_matches('/')),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl VerificationApi for HttpVerificationApi {
    async fn verify(&self, request: &AuthRequest) -> Result<IdentityResult, ClientError> {
        let response = self.client.post(&self.endpoint).json(request).send().await?;
        let status = response.status();

        if !status.is_success() {
            let message = match response.json::<ErrorBody>().await {
                Ok(body) => body.error,
                Err(_) => status.canonical_reason().unwrap_or("Request failed").to_string(),
            };
            return Err(ClientError::Authentication {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.json::<IdentityResult>().await?)
    }
}
