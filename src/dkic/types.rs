use std::fmt;

use serde::{Deserialize, Serialize};

use super::DkicError;

/// Structured payload of the signature carrier element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureClaim {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,
    /// Base64-encoded Ed25519 signature.
    pub signature: String,
}

impl SignatureClaim {
    pub fn ed25519(signature: impl Into<String>) -> Self {
        Self {
            alg: Some(super::KEY_TYPE_ED25519.to_string()),
            signature: signature.into(),
        }
    }
}

/// Document source with the signature carrier removed. This is exactly the
/// byte sequence covered by the signature.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanonicalDocument(String);

impl CanonicalDocument {
    pub(crate) fn new(text: String) -> Self {
        Self(text)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for CanonicalDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Result of one verification attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationOutcome {
    /// The signature matches the canonical document under the domain's key.
    Verified {
        domain: String,
        document: CanonicalDocument,
    },
    /// The first failure encountered, including a negative verdict.
    Failed { error: DkicError },
}

impl VerificationOutcome {
    pub fn is_verified(&self) -> bool {
        matches!(self, VerificationOutcome::Verified { .. })
    }

    pub fn domain(&self) -> Option<&str> {
        match self {
            VerificationOutcome::Verified { domain, .. } => Some(domain),
            VerificationOutcome::Failed { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&DkicError> {
        match self {
            VerificationOutcome::Verified { .. } => None,
            VerificationOutcome::Failed { error } => Some(error),
        }
    }

    /// Flatten into the wire-shaped record handed back to the embedding host.
    pub fn report(&self) -> OutcomeReport {
        match self {
            VerificationOutcome::Verified { domain, document } => OutcomeReport {
                success: true,
                domain: Some(domain.clone()),
                html_content: Some(document.as_str().to_string()),
                error: None,
            },
            VerificationOutcome::Failed { error } => OutcomeReport {
                success: false,
                domain: None,
                html_content: None,
                error: Some(error.to_string()),
            },
        }
    }
}

/// `{ success, domain, htmlContent }` or `{ success, error }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutcomeReport {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html_content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
