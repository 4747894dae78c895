// web-server/src/verify/eip191.rs
use async_trait::async_trait;
use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};
use sha3::{Digest, Keccak256};

use super::{SignatureVerifier, VerifyError};

/// Ethereum `personal_sign` verification over secp256k1.
#[derive(Debug, Clone, Default)]
pub struct Eip191Verifier;

#[async_trait]
impl SignatureVerifier for Eip191Verifier {
    async fn verify(&self, address: &str, message: &str, signature: &str) -> Result<bool, VerifyError> {
        let expected = match normalize_address(address) {
            Some(address) => address,
            None => {
                tracing::debug!("Rejecting signature for malformed address");
                return Ok(false);
            }
        };

        match recover_signer(message, signature) {
            Ok(recovered) => Ok(recovered == expected),
            Err(VerifyError::Rejected(reason)) => {
                tracing::debug!("Signature could not be recovered: {}", reason);
                Ok(false)
            },
            Err(e) => Err(e),
        }
    }
}

/// Keccak-256 of the EIP-191 prefixed message
pub fn personal_sign_hash(message: &str) -> [u8; 32] {
    let bytes = message.as_bytes();
    let prefix = format!("\x19Ethereum Signed Message:\n{}", bytes.len());

    let mut hasher = Keccak256::new();
    hasher.update(prefix.as_bytes());
    hasher.update(bytes);

    let digest = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    out
}

/// Recover the lowercase `0x` address that signed `message`
pub fn recover_signer(message: &str, signature: &str) -> Result<String, VerifyError> {
    let raw = signature.trim();
    let hex_part = raw.strip_prefix("0x").unwrap_or(raw);
    let bytes = hex::decode(hex_part)
        .map_err(|e| VerifyError::Rejected(format!("signature is not hex: {}", e)))?;

    if bytes.len() != 65 {
        return Err(VerifyError::Rejected(format!(
            "signature must be 65 bytes, got {}",
            bytes.len()
        )));
    }

    let sig = Signature::try_from(&bytes[..64])
        .map_err(|e| VerifyError::Rejected(format!("invalid ECDSA signature bytes: {}", e)))?;
    let recovery_id = recovery_id_from_v(bytes[64])?;

    // Wallets are expected to emit low-S signatures; flip parity if one slipped through
    let (sig, recovery_id) = match sig.normalize_s() {
        Some(normalized) => (
            normalized,
            RecoveryId::new(!recovery_id.is_y_odd(), recovery_id.is_x_reduced()),
        ),
        None => (sig, recovery_id),
    };

    let prehash = personal_sign_hash(message);
    let key = VerifyingKey::recover_from_prehash(&prehash, &sig, recovery_id)
        .map_err(|e| VerifyError::Rejected(format!("failed recovering signer: {}", e)))?;

    Ok(address_from_key(&key))
}

/// Lowercase a `0x`-prefixed 20-byte hex address, `None` if malformed
pub fn normalize_address(address: &str) -> Option<String> {
    let trimmed = address.trim();
    let hex_part = trimmed.strip_prefix("0x").or_else(|| trimmed.strip_prefix("0X"))?;
    if hex_part.len() != 40 || !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    Some(format!("0x{}", hex_part.to_lowercase()))
}

/// Ethereum address of a secp256k1 public key
pub fn address_from_key(key: &VerifyingKey) -> String {
    let encoded = key.to_encoded_point(false);
    // Skip the 0x04 uncompressed marker
    let digest = Keccak256::digest(&encoded.as_bytes()[1..]);
    format!("0x{}", hex::encode(&digest[12..]))
}

fn recovery_id_from_v(v: u8) -> Result<RecoveryId, VerifyError> {
    let id = match v {
        27 | 28 => v - 27,
        0 | 1 => v,
        _ => return Err(VerifyError::Rejected(format!("unsupported recovery id {}", v))),
    };
    RecoveryId::from_byte(id)
        .ok_or_else(|| VerifyError::Rejected(format!("invalid recovery id {}", id)))
}
