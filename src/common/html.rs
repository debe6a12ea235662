//! Minimal HTML start-tag scanner.
//!
//! Locates elements by `id` in raw markup and reports exact byte offsets, so
//! callers can cut an element out of the source without re-serializing it.

use std::ops::Range;

/// Elements whose content is raw text and must not be scanned for tags.
const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style", "textarea", "title"];

/// An element located in the source, with byte offsets into it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    /// Lowercased tag name.
    pub name: String,
    /// Attributes in source order, names lowercased.
    pub attributes: Vec<(String, String)>,
    /// Offset of the opening `<`.
    pub start: usize,
    /// Content between the start tag and the closing tag.
    pub content: Range<usize>,
    /// Offset just past the closing tag's `>`.
    pub end: usize,
}

impl Element {
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn text<'a>(&self, source: &'a str) -> &'a str {
        &source[self.content.clone()]
    }
}

struct StartTag {
    name: String,
    attributes: Vec<(String, String)>,
    end: usize,
}

/// Find every closed element whose `id` matches `id` (ASCII case-insensitive).
///
/// Comments are skipped and raw-text element content is never treated as
/// markup, so a carrier quoted inside a `<script>` body is not reported.
pub fn elements_with_id(source: &str, id: &str) -> Vec<Element> {
    let lower = source.to_ascii_lowercase();
    let mut found = Vec::new();
    let mut pos = 0;

    while let Some(offset) = source[pos..].find('<') {
        let lt = pos + offset;

        if lower[lt..].starts_with("<!--") {
            match lower[lt + 4..].find("-->") {
                Some(e) => {
                    pos = lt + 4 + e + 3;
                    continue;
                }
                None => break,
            }
        }

        let tag = match parse_start_tag(source, lt) {
            Some(t) => t,
            None => {
                pos = lt + 1;
                continue;
            }
        };

        let id_matches = tag
            .attributes
            .iter()
            .any(|(n, v)| n == "id" && v.eq_ignore_ascii_case(id));
        let raw_text = RAW_TEXT_ELEMENTS.contains(&tag.name.as_str());

        if !id_matches && !raw_text {
            pos = tag.end;
            continue;
        }

        let close = find_closing_tag(&lower, tag.end, &tag.name);
        if id_matches {
            if let Some((close_start, close_end)) = close {
                found.push(Element {
                    name: tag.name.clone(),
                    attributes: tag.attributes.clone(),
                    start: lt,
                    content: tag.end..close_start,
                    end: close_end,
                });
            }
        }

        pos = match (raw_text, close) {
            (true, Some((_, close_end))) => close_end,
            (true, None) => break,
            (false, _) => tag.end,
        };
    }

    found
}

/// Parse a start tag beginning at `lt`. Returns `None` when the text at `lt`
/// is not a well-formed start tag.
fn parse_start_tag(source: &str, lt: usize) -> Option<StartTag> {
    let bytes = source.as_bytes();
    let mut i = lt + 1;
    if i >= bytes.len() || !bytes[i].is_ascii_alphabetic() {
        return None;
    }

    let name_start = i;
    while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'-' || bytes[i] == b':') {
        i += 1;
    }
    let name = source[name_start..i].to_ascii_lowercase();

    let mut attributes = Vec::new();
    loop {
        while i < bytes.len() && (bytes[i].is_ascii_whitespace() || bytes[i] == b'/') {
            i += 1;
        }
        if i >= bytes.len() {
            return None;
        }
        if bytes[i] == b'>' {
            return Some(StartTag {
                name,
                attributes,
                end: i + 1,
            });
        }

        let attr_start = i;
        while i < bytes.len()
            && !bytes[i].is_ascii_whitespace()
            && !matches!(bytes[i], b'=' | b'>' | b'/')
        {
            i += 1;
        }
        let attr_name = source[attr_start..i].to_ascii_lowercase();

        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        if i < bytes.len() && bytes[i] == b'=' {
            i += 1;
            while i < bytes.len() && bytes[i].is_ascii_whitespace() {
                i += 1;
            }
            if i >= bytes.len() {
                return None;
            }
            let value = if bytes[i] == b'"' || bytes[i] == b'\'' {
                let quote = bytes[i] as char;
                let value_start = i + 1;
                let len = source[value_start..].find(quote)?;
                i = value_start + len + 1;
                &source[value_start..value_start + len]
            } else {
                let value_start = i;
                while i < bytes.len() && !bytes[i].is_ascii_whitespace() && bytes[i] != b'>' {
                    i += 1;
                }
                &source[value_start..i]
            };
            attributes.push((attr_name, value.to_string()));
        } else {
            attributes.push((attr_name, String::new()));
        }
    }
}

/// Locate `</name ...>` at or after `from` in the lowercased source.
/// Returns the offset of `</` and the offset just past `>`.
fn find_closing_tag(lower: &str, from: usize, name: &str) -> Option<(usize, usize)> {
    let needle = format!("</{}", name);
    let mut pos = from;
    while let Some(offset) = lower[pos..].find(&needle) {
        let start = pos + offset;
        let after = start + needle.len();
        match lower.as_bytes().get(after) {
            Some(b) if *b == b'>' || b.is_ascii_whitespace() || *b == b'/' => {
                let gt = lower[after..].find('>')?;
                return Some((start, after + gt + 1));
            }
            None => return None,
            _ => pos = after,
        }
    }
    None
}
