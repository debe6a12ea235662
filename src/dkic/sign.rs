use std::path::Path;

use base64::Engine;
use ring::rand::SystemRandom;
use ring::signature::{Ed25519KeyPair, KeyPair};
use thiserror::Error;

use super::canon::canonicalize;
use super::key::ED25519_KEY_LEN;
use super::parser::BASE64;
use super::types::SignatureClaim;
use super::{CARRIER_CONTENT_TYPE, CARRIER_ID, DKIC_SUBDOMAIN, KEY_TYPE_ED25519, PROTOCOL_VERSION};

/// DER header of an Ed25519 SubjectPublicKeyInfo (RFC 8410); the 32 key
/// bytes follow.
const ED25519_SPKI_PREFIX: [u8; 12] = [
    0x30, 0x2a, 0x30, 0x05, 0x06, 0x03, 0x2b, 0x65, 0x70, 0x03, 0x21, 0x00,
];

const PEM_LABEL: &str = "PRIVATE KEY";

#[derive(Debug, Error)]
pub enum SigningError {
    #[error("key generation failed")]
    KeyGeneration,
    #[error("invalid Ed25519 PKCS8 key: {0}")]
    InvalidKey(String),
    #[error("invalid PEM: {0}")]
    Pem(String),
    #[error("could not find <head> section in HTML")]
    MissingHead,
    #[error("signature carrier serialization failed: {0}")]
    Carrier(#[from] serde_json::Error),
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Signs HTML documents for DKIC verification.
pub struct DkicSigner {
    key_pair: Ed25519KeyPair,
    pkcs8: Vec<u8>,
}

impl DkicSigner {
    /// Generate a fresh Ed25519 key.
    pub fn generate() -> Result<Self, SigningError> {
        let rng = SystemRandom::new();
        let pkcs8 = Ed25519KeyPair::generate_pkcs8(&rng).map_err(|_| SigningError::KeyGeneration)?;
        Self::from_pkcs8(pkcs8.as_ref())
    }

    /// Load from PKCS8 DER (v1 as written by OpenSSL, or v2).
    pub fn from_pkcs8(der: &[u8]) -> Result<Self, SigningError> {
        let key_pair = Ed25519KeyPair::from_pkcs8_maybe_unchecked(der)
            .map_err(|e| SigningError::InvalidKey(e.to_string()))?;
        Ok(Self {
            key_pair,
            pkcs8: der.to_vec(),
        })
    }

    pub fn from_pkcs8_pem(pem: &str) -> Result<Self, SigningError> {
        Self::from_pkcs8(&decode_pem(pem)?)
    }

    pub fn to_pkcs8_pem(&self) -> String {
        encode_pem(&self.pkcs8)
    }

    /// Raw 32-byte public key.
    pub fn public_key(&self) -> &[u8] {
        self.key_pair.public_key().as_ref()
    }

    /// DER SubjectPublicKeyInfo wrapping the public key.
    pub fn public_key_spki(&self) -> Vec<u8> {
        let mut der = Vec::with_capacity(ED25519_SPKI_PREFIX.len() + ED25519_KEY_LEN);
        der.extend_from_slice(&ED25519_SPKI_PREFIX);
        der.extend_from_slice(self.public_key());
        der
    }

    /// TXT record content to publish at `_dkic.<domain>`.
    pub fn dns_record(&self) -> String {
        format!(
            "v={}; k={}; p={}",
            PROTOCOL_VERSION,
            KEY_TYPE_ED25519,
            BASE64.encode(self.public_key_spki())
        )
    }

    /// Zone-file line for the TXT record.
    pub fn zone_entry(&self, domain: Option<&str>) -> String {
        format!(
            "{}.{}. IN TXT \"{}\"",
            DKIC_SUBDOMAIN,
            domain.unwrap_or("[your-domain]"),
            self.dns_record()
        )
    }

    /// Sign `html` and return it with the signature carrier embedded.
    ///
    /// Any carrier already present is dropped first, so re-signing replaces
    /// the old signature. The signature covers exactly what a verifier's
    /// canonicalizer reconstructs from the returned document.
    pub fn sign_html(&self, html: &str) -> Result<String, SigningError> {
        let base = canonicalize(html).document.into_string();
        let at = insertion_point(&base)?;

        let unsigned = embed(&base, at, &SignatureClaim::ed25519(""))?;
        let payload = canonicalize(&unsigned).document;
        let signature = self.key_pair.sign(payload.as_bytes());

        embed(&base, at, &SignatureClaim::ed25519(BASE64.encode(signature.as_ref())))
    }

    /// Sign the HTML file at `path` in place.
    pub fn sign_file(&self, path: &Path) -> Result<(), SigningError> {
        let io_err = |source| SigningError::Io {
            path: path.display().to_string(),
            source,
        };
        let html = std::fs::read_to_string(path).map_err(io_err)?;
        let signed = self.sign_html(&html)?;
        std::fs::write(path, signed).map_err(io_err)
    }
}

#[derive(Debug, Clone, Copy)]
enum Insertion {
    /// Before `</head>`, carrier followed by a newline.
    BeforeHeadEnd(usize),
    /// After `<head>`, carrier preceded by a newline.
    AfterHeadStart(usize),
}

fn insertion_point(html: &str) -> Result<Insertion, SigningError> {
    let lower = html.to_ascii_lowercase();
    if let Some(i) = lower.find("</head>") {
        Ok(Insertion::BeforeHeadEnd(i))
    } else if let Some(i) = lower.find("<head>") {
        Ok(Insertion::AfterHeadStart(i + "<head>".len()))
    } else {
        Err(SigningError::MissingHead)
    }
}

fn embed(html: &str, at: Insertion, claim: &SignatureClaim) -> Result<String, SigningError> {
    let carrier = format!(
        r#"<script type="{}" id="{}">{}</script>"#,
        CARRIER_CONTENT_TYPE,
        CARRIER_ID,
        serde_json::to_string(claim)?
    );
    let mut out = String::with_capacity(html.len() + carrier.len() + 1);
    match at {
        Insertion::BeforeHeadEnd(i) => {
            out.push_str(&html[..i]);
            out.push_str(&carrier);
            out.push('\n');
            out.push_str(&html[i..]);
        }
        Insertion::AfterHeadStart(i) => {
            out.push_str(&html[..i]);
            out.push('\n');
            out.push_str(&carrier);
            out.push_str(&html[i..]);
        }
    }
    Ok(out)
}

fn encode_pem(der: &[u8]) -> String {
    let b64 = BASE64.encode(der);
    let mut pem = format!("-----BEGIN {}-----\n", PEM_LABEL);
    for chunk in b64.as_bytes().chunks(64) {
        // base64 output is ASCII
        pem.push_str(&String::from_utf8_lossy(chunk));
        pem.push('\n');
    }
    pem.push_str(&format!("-----END {}-----\n", PEM_LABEL));
    pem
}

fn decode_pem(pem: &str) -> Result<Vec<u8>, SigningError> {
    let mut b64 = String::new();
    let mut in_block = false;

    for line in pem.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with("-----BEGIN") {
            in_block = true;
            continue;
        }
        if trimmed.starts_with("-----END") {
            break;
        }
        if in_block {
            b64.push_str(trimmed);
        }
    }

    if b64.is_empty() {
        return Err(SigningError::Pem("no PEM content found".into()));
    }

    BASE64
        .decode(&b64)
        .map_err(|e| SigningError::Pem(format!("base64 decode failed: {}", e)))
}
