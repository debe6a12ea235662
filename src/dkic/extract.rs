use super::context::DocumentContext;
use super::types::SignatureClaim;
use super::{DkicError, CARRIER_CONTENT_TYPE, KEY_TYPE_ED25519};

/// Read the signature claim from the document's single carrier element.
pub fn extract_signature<D: DocumentContext + ?Sized>(
    document: &D,
) -> Result<SignatureClaim, DkicError> {
    let mut carriers = document.signature_elements();
    if carriers.len() > 1 {
        return Err(DkicError::MalformedSignaturePayload(format!(
            "found {} signature elements, expected exactly one",
            carriers.len()
        )));
    }
    let carrier = carriers.pop().ok_or(DkicError::MissingSignatureElement)?;

    if carrier.tag_name != "script" {
        return Err(DkicError::InvalidSignatureElementType(format!(
            "<{}> element",
            carrier.tag_name
        )));
    }
    match carrier.content_type.as_deref().map(str::trim) {
        Some(t) if t.eq_ignore_ascii_case(CARRIER_CONTENT_TYPE) => {}
        Some(t) => {
            return Err(DkicError::InvalidSignatureElementType(format!(
                "type=\"{}\"",
                t
            )))
        }
        None => {
            return Err(DkicError::InvalidSignatureElementType(
                "no type attribute".into(),
            ))
        }
    }

    let claim: SignatureClaim = serde_json::from_str(&carrier.text)
        .map_err(|e| DkicError::MalformedSignaturePayload(e.to_string()))?;

    if claim.signature.is_empty() {
        return Err(DkicError::MalformedSignaturePayload(
            "signature data missing \"signature\" field".into(),
        ));
    }
    if let Some(alg) = &claim.alg {
        if alg != KEY_TYPE_ED25519 {
            return Err(DkicError::MalformedSignaturePayload(format!(
                "unsupported signature algorithm: {}",
                alg
            )));
        }
    }

    Ok(claim)
}
