use ed25519_dalek::{Signature, Verifier, VerifyingKey};

use super::key::ED25519_KEY_LEN;
use super::parser::decode_base64;
use super::DkicError;

/// Verify a base64 Ed25519 signature over `payload`.
///
/// `Ok(false)` is a computed "not authentic" verdict. Errors mean the inputs
/// could not be used at all.
pub fn verify_signature(
    public_key: &[u8],
    signature_b64: &str,
    payload: &[u8],
) -> Result<bool, DkicError> {
    let signature = decode_base64("signature", signature_b64)?;
    let key = import_public_key(public_key)?;

    // A signature of the wrong length cannot match; that is a verdict, not a fault.
    let signature = match Signature::from_slice(&signature) {
        Ok(s) => s,
        Err(_) => return Ok(false),
    };

    Ok(key.verify(payload, &signature).is_ok())
}

fn import_public_key(raw: &[u8]) -> Result<VerifyingKey, DkicError> {
    let bytes: [u8; ED25519_KEY_LEN] = raw.try_into().map_err(|_| {
        DkicError::KeyImportError(format!(
            "expected {} bytes of key material, got {}",
            ED25519_KEY_LEN,
            raw.len()
        ))
    })?;
    VerifyingKey::from_bytes(&bytes).map_err(|e| DkicError::KeyImportError(e.to_string()))
}
