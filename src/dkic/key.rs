use serde::{Deserialize, Serialize};
use x509_parser::der_parser::oid::Oid;
use x509_parser::prelude::*;

use super::parser::{decode_base64, parse_tag_list};
use super::{DkicError, KEY_TYPE_ED25519, PROTOCOL_VERSION};

/// id-Ed25519 (RFC 8410): 1.3.101.112
const ED25519_OID: &[u64] = &[1, 3, 101, 112];

pub(crate) const ED25519_KEY_LEN: usize = 32;

/// How the `p=` blob is turned into raw Ed25519 key material.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum KeyEncoding {
    /// Take the trailing 32 bytes. Accepts both DER SubjectPublicKeyInfo and
    /// bare 32-byte keys without parsing ASN.1.
    #[default]
    Permissive,
    /// Require a DER SubjectPublicKeyInfo with the Ed25519 algorithm OID.
    StrictSpki,
}

impl std::str::FromStr for KeyEncoding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "permissive" => Ok(KeyEncoding::Permissive),
            "strict-spki" | "strict" => Ok(KeyEncoding::StrictSpki),
            other => Err(format!("unknown key encoding: {}", other)),
        }
    }
}

/// Parsed `_dkic` TXT record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyRecord {
    pub version: String,
    pub key_type: String,
    pub public_key_b64: String,
}

impl KeyRecord {
    /// Parse `v=DKIC1; k=ed25519; p=<base64>`.
    pub fn parse(txt_record: &str) -> Result<Self, DkicError> {
        let mut tags = parse_tag_list(txt_record);

        let version = tags.remove("v").unwrap_or_default();
        if version != PROTOCOL_VERSION {
            return Err(DkicError::UnsupportedVersion(display_or_missing(&version)));
        }

        let key_type = tags.remove("k").unwrap_or_default();
        if key_type != KEY_TYPE_ED25519 {
            return Err(DkicError::UnsupportedKeyType(display_or_missing(&key_type)));
        }

        let public_key_b64 = tags.remove("p").ok_or(DkicError::MissingPublicKey)?;

        Ok(KeyRecord {
            version,
            key_type,
            public_key_b64,
        })
    }

    /// Decode `p=` and extract the raw public key under `encoding`.
    pub fn public_key(&self, encoding: KeyEncoding) -> Result<Vec<u8>, DkicError> {
        let decoded = decode_base64("public key", &self.public_key_b64)?;
        match encoding {
            KeyEncoding::Permissive => {
                let start = decoded.len().saturating_sub(ED25519_KEY_LEN);
                Ok(decoded[start..].to_vec())
            }
            KeyEncoding::StrictSpki => spki_key(&decoded),
        }
    }
}

fn display_or_missing(value: &str) -> String {
    if value.is_empty() {
        "(missing)".to_string()
    } else {
        value.to_string()
    }
}

fn spki_key(der: &[u8]) -> Result<Vec<u8>, DkicError> {
    let (rest, spki) = SubjectPublicKeyInfo::from_der(der)
        .map_err(|e| DkicError::KeyImportError(format!("not a DER SubjectPublicKeyInfo: {}", e)))?;
    if !rest.is_empty() {
        return Err(DkicError::KeyImportError(format!(
            "{} trailing bytes after SubjectPublicKeyInfo",
            rest.len()
        )));
    }

    let ed25519 = Oid::from(ED25519_OID)
        .map_err(|_| DkicError::KeyImportError("invalid Ed25519 OID".into()))?;
    if spki.algorithm.algorithm != ed25519 {
        return Err(DkicError::KeyImportError(format!(
            "SubjectPublicKeyInfo algorithm is {}, expected Ed25519",
            spki.algorithm.algorithm
        )));
    }

    let key = spki.subject_public_key.data.to_vec();
    if key.len() != ED25519_KEY_LEN {
        return Err(DkicError::KeyImportError(format!(
            "Ed25519 key must be {} bytes, got {}",
            ED25519_KEY_LEN,
            key.len()
        )));
    }
    Ok(key)
}
