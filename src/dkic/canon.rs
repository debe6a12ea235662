use std::time::Duration;

use tracing::debug;
use url::Url;

use crate::common::html::elements_with_id;
use crate::common::http::{HttpError, HttpFetcher};

use super::types::CanonicalDocument;
use super::{DkicError, CARRIER_ID};

/// Output of [`canonicalize`]: the stripped document and how many carriers
/// were cut out of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Canonicalized {
    pub document: CanonicalDocument,
    pub removed: usize,
}

// ── Pure canonicalization ────────────────────────────────────────────

/// Remove every `<script>` signature carrier, including any whitespace that
/// immediately follows its closing tag.
///
/// Removal is by exact byte slice; nothing else in the source is touched.
/// A source without a carrier comes back unchanged.
pub fn canonicalize(source: &str) -> Canonicalized {
    let carriers: Vec<_> = elements_with_id(source, CARRIER_ID)
        .into_iter()
        .filter(|el| el.name == "script")
        .collect();

    let mut out = String::with_capacity(source.len());
    let mut cursor = 0;
    for el in &carriers {
        out.push_str(&source[cursor..el.start]);
        cursor = skip_whitespace(source, el.end);
    }
    out.push_str(&source[cursor..]);

    Canonicalized {
        document: CanonicalDocument::new(out),
        removed: carriers.len(),
    }
}

fn skip_whitespace(source: &str, from: usize) -> usize {
    source[from..]
        .char_indices()
        .find(|(_, c)| !is_html_space(*c))
        .map(|(i, _)| from + i)
        .unwrap_or(source.len())
}

/// ECMAScript `\s`: Unicode White_Space without U+0085, plus U+FEFF.
fn is_html_space(c: char) -> bool {
    c == '\u{feff}' || (c.is_whitespace() && c != '\u{85}')
}

// ── Fetch + canonicalize ─────────────────────────────────────────────

/// Reconstructs the signed payload from a fresh copy of the document source.
#[derive(Clone)]
pub struct Canonicalizer<F: HttpFetcher> {
    fetcher: F,
    timeout: Duration,
}

impl<F: HttpFetcher> Canonicalizer<F> {
    pub fn new(fetcher: F, timeout: Duration) -> Self {
        Self { fetcher, timeout }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Re-fetch `address` and strip its single signature carrier.
    pub async fn fetch_canonical(&self, address: &Url) -> Result<CanonicalDocument, DkicError> {
        let source = self.fetch_source(address).await?;
        let canonical = canonicalize(&source);
        debug!(
            source_len = source.len(),
            canonical_len = canonical.document.len(),
            removed = canonical.removed,
            "canonicalized document source"
        );
        if canonical.removed != 1 {
            return Err(DkicError::CanonicalizationMismatch {
                found: canonical.removed,
            });
        }
        Ok(canonical.document)
    }

    pub(crate) async fn fetch_source(&self, address: &Url) -> Result<String, DkicError> {
        let response = tokio::time::timeout(self.timeout, self.fetcher.get(address.as_str(), None))
            .await
            .unwrap_or_else(|_| Err(HttpError::Timeout(self.timeout)))
            .map_err(|e| DkicError::SourceFetchFailed(e.to_string()))?;

        if !response.is_success() {
            return Err(DkicError::SourceFetchFailed(format!(
                "HTTP status {}",
                response.status
            )));
        }

        String::from_utf8(response.body)
            .map_err(|e| DkicError::SourceFetchFailed(format!("document is not valid UTF-8: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::http::{HttpResponse, MockFetcher};

    const CARRIER: &str =
        r#"<script type="application/json" id="dkic-signature">{"signature":"c2ln"}</script>"#;

    #[test]
    fn test_strips_carrier_and_trailing_whitespace() {
        let src = format!("<head>\n<title>t</title>\n{}\n  \t</head>", CARRIER);
        let c = canonicalize(&src);
        assert_eq!(c.removed, 1);
        assert_eq!(c.document.as_str(), "<head>\n<title>t</title>\n</head>");
    }

    #[test]
    fn test_commented_out_carrier_is_content() {
        let src = format!("<head><!-- {} --></head>", CARRIER);
        let c = canonicalize(&src);
        assert_eq!(c.removed, 0);
        assert_eq!(c.document.as_str(), src);
    }

    #[test]
    fn test_trailing_whitespace_follows_ecmascript_set() {
        // U+FEFF is stripped, U+0085 is content.
        let src = format!("<head>{}{}</head>", CARRIER, "\u{feff}\u{a0}\n\u{85}");
        assert_eq!(canonicalize(&src).document.as_str(), "<head>\u{85}</head>");

        let src = format!("<head>{}{}</head>", CARRIER, "\u{3000}\u{2028}");
        assert_eq!(canonicalize(&src).document.as_str(), "<head></head>");
    }

    #[test]
    fn test_leading_whitespace_is_kept() {
        let src = format!("<head>  {}</head>", CARRIER);
        assert_eq!(canonicalize(&src).document.as_str(), "<head>  </head>");
    }

    #[test]
    fn test_canonical_document_is_unchanged() {
        let src = "<html><head><title>x</title></head>\n<body>hi</body></html>\n";
        let c = canonicalize(src);
        assert_eq!(c.removed, 0);
        assert_eq!(c.document.as_str(), src);

        let again = canonicalize(c.document.as_str());
        assert_eq!(again.document, c.document);
    }

    #[test]
    fn test_attribute_order_and_casing_do_not_matter() {
        let variants = [
            r#"<script type="application/json" id="dkic-signature">{"signature":"c2ln"}</script>"#,
            r#"<script id="dkic-signature" type="application/json">{"signature":"c2ln"}</script>"#,
            r#"<SCRIPT ID='DKIC-SIGNATURE' TYPE='application/json' data-v="1">{"signature":"c2ln"}</SCRIPT>"#,
            r#"<script  id=dkic-signature   type=application/json >{"signature":"c2ln"}</script >"#,
        ];
        for v in variants {
            let src = format!("<head>{}\n</head><body>b</body>", v);
            assert_eq!(
                canonicalize(&src).document.as_str(),
                "<head></head><body>b</body>",
                "variant {}",
                v
            );
        }
    }

    #[test]
    fn test_other_scripts_survive() {
        let src = format!(
            "<head><script>var a = 1;</script>\n{}\n<script id=\"other\">x</script></head>",
            CARRIER
        );
        assert_eq!(
            canonicalize(&src).document.as_str(),
            "<head><script>var a = 1;</script>\n<script id=\"other\">x</script></head>"
        );
    }

    #[test]
    fn test_non_script_carrier_is_not_removed() {
        let src = r#"<div id="dkic-signature">x</div>"#;
        let c = canonicalize(src);
        assert_eq!(c.removed, 0);
        assert_eq!(c.document.as_str(), src);
    }

    #[test]
    fn test_every_carrier_is_counted() {
        let src = format!("{}{}<p>x</p>", CARRIER, CARRIER);
        let c = canonicalize(&src);
        assert_eq!(c.removed, 2);
        assert_eq!(c.document.as_str(), "<p>x</p>");
    }

    fn address() -> Url {
        Url::parse("https://example.org/page.html").unwrap()
    }

    #[tokio::test]
    async fn test_fetch_canonical_strips_fetched_source() {
        let fetcher = MockFetcher::new();
        fetcher.add_response(
            "https://example.org/page.html",
            HttpResponse::ok(format!("<head>{}\n</head>", CARRIER)),
        );
        let canon = Canonicalizer::new(fetcher.clone(), Duration::from_secs(5));
        let doc = canon.fetch_canonical(&address()).await.unwrap();
        assert_eq!(doc.as_str(), "<head></head>");
        assert_eq!(fetcher.requests().len(), 1);
        assert_eq!(fetcher.requests()[0].url, "https://example.org/page.html");
    }

    #[tokio::test]
    async fn test_non_success_status_fails() {
        let fetcher = MockFetcher::new();
        fetcher.add_response("https://example.org/page.html", HttpResponse::new(503, "busy"));
        let canon = Canonicalizer::new(fetcher, Duration::from_secs(5));
        let err = canon.fetch_canonical(&address()).await.unwrap_err();
        assert_eq!(err, DkicError::SourceFetchFailed("HTTP status 503".into()));
    }

    #[tokio::test]
    async fn test_transport_error_fails() {
        let fetcher = MockFetcher::new();
        fetcher.add_error(
            "https://example.org/page.html",
            HttpError::Transport("connection reset".into()),
        );
        let canon = Canonicalizer::new(fetcher, Duration::from_secs(5));
        assert!(matches!(
            canon.fetch_canonical(&address()).await,
            Err(DkicError::SourceFetchFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_carrier_in_source_is_a_mismatch() {
        let fetcher = MockFetcher::new();
        fetcher.add_response("https://example.org/page.html", HttpResponse::ok("<head></head>"));
        let canon = Canonicalizer::new(fetcher, Duration::from_secs(5));
        assert_eq!(
            canon.fetch_canonical(&address()).await,
            Err(DkicError::CanonicalizationMismatch { found: 0 })
        );
    }

    #[tokio::test]
    async fn test_invalid_utf8_fails() {
        let fetcher = MockFetcher::new();
        fetcher.add_response("https://example.org/page.html", HttpResponse::ok(vec![0xff, 0xfe, 0x00]));
        let canon = Canonicalizer::new(fetcher, Duration::from_secs(5));
        assert!(matches!(
            canon.fetch_canonical(&address()).await,
            Err(DkicError::SourceFetchFailed(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_source_times_out() {
        let fetcher = MockFetcher::new();
        fetcher.add_delayed(
            "https://example.org/page.html",
            Duration::from_secs(60),
            HttpResponse::ok(CARRIER),
        );
        let canon = Canonicalizer::new(fetcher, Duration::from_secs(2));
        let err = canon.fetch_canonical(&address()).await.unwrap_err();
        assert_eq!(err, DkicError::SourceFetchFailed("timed out after 2s".into()));
    }
}
