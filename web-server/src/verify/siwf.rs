// web-server/src/verify/siwf.rs
use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::AuthConfig;
use regex::Regex;

use super::eip191::{normalize_address, recover_signer};
use super::{normalize_signature, HostAssertionVerifier, VerifyError};

static FID_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"FID: (\d+)").expect("FID pattern is a valid regex"));

const SIWE_HEADER_SUFFIX: &str = " wants you to sign in with your Ethereum account:";

/// Embedded-host sign-in assertion after shape validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostAssertion {
    pub fid: u64,
    pub message: String,
    pub signature: String,
    pub address: Option<String>,
}

/// Digits following `FID: `, `None` when missing, zero or out of range
pub fn extract_fid(message: &str) -> Option<u64> {
    FID_PATTERN
        .captures(message)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<u64>().ok())
        .filter(|fid| *fid != 0)
}

/// Fields of a SIWE-formatted sign-in message. All optional: hosts are not
/// required to use the full EIP-4361 layout.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SiwfFields<'a> {
    pub domain: Option<&'a str>,
    pub account: Option<&'a str>,
    pub nonce: Option<&'a str>,
    pub expiration_time: Option<&'a str>,
}

pub fn parse_fields(message: &str) -> SiwfFields<'_> {
    let mut fields = SiwfFields::default();
    let mut lines = message.lines();

    if let Some(domain) = lines.next().and_then(|l| l.trim().strip_suffix(SIWE_HEADER_SUFFIX)) {
        fields.domain = Some(domain);
        fields.account = lines.next().map(str::trim).filter(|l| l.starts_with("0x"));
    }

    for line in message.lines() {
        let line = line.trim();
        if let Some(nonce) = line.strip_prefix("Nonce: ") {
            fields.nonce = Some(nonce);
        } else if let Some(expiry) = line.strip_prefix("Expiration Time: ") {
            fields.expiration_time = Some(expiry);
        }
    }

    fields
}

/// Answers whether an address may sign on behalf of a FID
/// (custody address, or an auth address registered for it)
#[async_trait]
pub trait FidAuthority: Send + Sync {
    async fn is_authorized(&self, fid: u64, signer: &str) -> Result<bool, VerifyError>;
}

/// FID signer registry loaded from configuration
#[derive(Debug, Clone, Default)]
pub struct StaticFidAuthority {
    signers: HashMap<u64, Vec<String>>,
}

impl StaticFidAuthority {
    pub fn new(signers: HashMap<u64, Vec<String>>) -> Self {
        let signers = signers
            .into_iter()
            .map(|(fid, addrs)| (fid, addrs.iter().filter_map(|a| normalize_address(a)).collect()))
            .collect();
        Self { signers }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        let mut signers = HashMap::new();
        for key in config.fid_signers.keys() {
            match key.parse::<u64>() {
                Ok(fid) => {
                    signers.insert(fid, config.signers_for(fid));
                },
                Err(_) => tracing::warn!("Ignoring non-numeric FID in auth.fid_signers: {}", key),
            }
        }
        Self::new(signers)
    }
}

#[async_trait]
impl FidAuthority for StaticFidAuthority {
    async fn is_authorized(&self, fid: u64, signer: &str) -> Result<bool, VerifyError> {
        Ok(self
            .signers
            .get(&fid)
            .is_some_and(|addrs| addrs.iter().any(|a| a == signer)))
    }
}

/// Accepts any well-shaped assertion. Only for trusted development hosts.
#[derive(Debug, Clone, Default)]
pub struct ShapeOnlyVerifier;

#[async_trait]
impl HostAssertionVerifier for ShapeOnlyVerifier {
    async fn verify(&self, _assertion: &HostAssertion) -> Result<(), VerifyError> {
        Ok(())
    }
}

/// Full SIWF check: recover the signer, match it against the message and
/// require the FID authority to vouch for it.
pub struct SiwfSignatureVerifier {
    authority: Arc<dyn FidAuthority>,
    expected_domain: Option<String>,
}

impl SiwfSignatureVerifier {
    pub fn new(authority: Arc<dyn FidAuthority>, expected_domain: Option<String>) -> Self {
        Self { authority, expected_domain }
    }
}

#[async_trait]
impl HostAssertionVerifier for SiwfSignatureVerifier {
    async fn verify(&self, assertion: &HostAssertion) -> Result<(), VerifyError> {
        let fields = parse_fields(&assertion.message);

        if let (Some(domain), Some(expected)) = (fields.domain, self.expected_domain.as_deref()) {
            if domain != expected {
                return Err(VerifyError::Rejected(format!("message issued for domain {}", domain)));
            }
        }

        if let Some(expiry) = fields.expiration_time {
            let expires_at = DateTime::parse_from_rfc3339(expiry)
                .map_err(|e| VerifyError::Rejected(format!("bad expiration time: {}", e)))?;
            if expires_at.with_timezone(&Utc) <= Utc::now() {
                return Err(VerifyError::Rejected("message expired".to_string()));
            }
        }

        let signer = recover_signer(&assertion.message, &normalize_signature(&assertion.signature))?;

        if let Some(account) = fields.account {
            if normalize_address(account).as_deref() != Some(signer.as_str()) {
                return Err(VerifyError::Rejected("signer does not match message account".to_string()));
            }
        }

        if !self.authority.is_authorized(assertion.fid, &signer).await? {
            return Err(VerifyError::Rejected(format!(
                "{} is not a signer for fid {}",
                signer, assertion.fid
            )));
        }

        tracing::debug!("SIWF assertion verified for fid {}", assertion.fid);
        Ok(())
    }
}
