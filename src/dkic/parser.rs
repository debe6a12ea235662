use std::collections::HashMap;

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;

use super::DkicError;

/// Standard alphabet; padding optional on decode, emitted on encode.
pub(crate) const BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Parse `key=value` pairs separated by `;`.
///
/// Each pair splits at its first `=`; both sides are trimmed. Pairs with an
/// empty key or empty value are dropped, and a later duplicate replaces an
/// earlier one.
pub fn parse_tag_list(input: &str) -> HashMap<String, String> {
    let mut tags = HashMap::new();
    for part in input.split(';') {
        if let Some((name, value)) = part.split_once('=') {
            let (name, value) = (name.trim(), value.trim());
            if !name.is_empty() && !value.is_empty() {
                tags.insert(name.to_string(), value.to_string());
            }
        }
    }
    tags
}

/// Strip one pair of surrounding double quotes, as DoH services render TXT
/// data in presentation format.
pub fn unquote_txt(data: &str) -> &str {
    data.strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(data)
}

/// Decode base64, ignoring ASCII whitespace and missing padding.
pub(crate) fn decode_base64(field: &'static str, value: &str) -> Result<Vec<u8>, DkicError> {
    let cleaned: String = value.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    BASE64
        .decode(&cleaned)
        .map_err(|e| DkicError::InvalidBase64 {
            field,
            detail: e.to_string(),
        })
}
