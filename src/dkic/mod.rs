//! DKIC (Domain Key Integrity Check): web documents signed with an Ed25519 key
//! published at `_dkic.<domain>`.

pub mod canon;
mod context;
mod crypto;
mod extract;
mod key;
mod parser;
pub mod resolve;
pub mod sign;
mod types;
pub mod verify;

pub use canon::{canonicalize, Canonicalized, Canonicalizer};
pub use context::{CarrierElement, DocumentContext, RenderedDocument};
pub use crypto::verify_signature;
pub use extract::extract_signature;
pub use key::{KeyEncoding, KeyRecord};
pub use resolve::KeyResolver;
pub use sign::{DkicSigner, SigningError};
pub use types::{CanonicalDocument, OutcomeReport, SignatureClaim, VerificationOutcome};
pub use verify::DkicVerifier;

use thiserror::Error;

/// DNS label prefixed onto the document's domain.
pub const DKIC_SUBDOMAIN: &str = "_dkic";
/// Fixed `id` of the signature carrier element.
pub const CARRIER_ID: &str = "dkic-signature";
/// Declared content type the carrier must carry.
pub const CARRIER_CONTENT_TYPE: &str = "application/json";
pub const PROTOCOL_VERSION: &str = "DKIC1";
pub const KEY_TYPE_ED25519: &str = "ed25519";

/// Every way a DKIC verification can end without a positive verdict.
///
/// All variants are terminal. Only [`DkicError::SignatureMismatch`] is a
/// computed verdict; the others mean the document could not be checked.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DkicError {
    #[error("no signature data found (missing element #dkic-signature)")]
    MissingSignatureElement,
    #[error("signature element must be <script type=\"application/json\">, found {0}")]
    InvalidSignatureElementType(String),
    #[error("invalid signature JSON: {0}")]
    MalformedSignaturePayload(String),
    #[error("cannot fetch original HTML: {0}")]
    SourceFetchFailed(String),
    #[error("expected exactly one signature element in fetched source, found {found}")]
    CanonicalizationMismatch { found: usize },
    #[error("invalid document address: {0}")]
    InvalidDocumentAddress(String),
    #[error("DNS lookup failed: {0}")]
    DnsTransportError(String),
    #[error("DNS query for {name} failed with status {status}")]
    DnsQueryFailed { name: String, status: u32 },
    #[error("no TXT record found for {0}")]
    DnsRecordNotFound(String),
    #[error("unsupported version: {0}; expected v=DKIC1")]
    UnsupportedVersion(String),
    #[error("unsupported key type: {0}; expected k=ed25519")]
    UnsupportedKeyType(String),
    #[error("missing public key field (p=) in DNS record")]
    MissingPublicKey,
    #[error("invalid base64 encoding in {field}: {detail}")]
    InvalidBase64 { field: &'static str, detail: String },
    #[error("failed to import Ed25519 public key: {0}")]
    KeyImportError(String),
    #[error("signature verification failed - signature does not match content")]
    SignatureMismatch,
}

impl DkicError {
    /// True when the pipeline completed and the verdict was "not authentic".
    pub fn is_verdict(&self) -> bool {
        matches!(self, DkicError::SignatureMismatch)
    }
}
