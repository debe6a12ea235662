use std::time::Duration;

use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::common::http::{HttpError, HttpFetcher};

use super::key::{KeyEncoding, KeyRecord};
use super::parser::unquote_txt;
use super::{DkicError, DKIC_SUBDOMAIN};

/// `Accept` header for JSON-form DNS-over-HTTPS responses.
pub const DNS_JSON: &str = "application/dns-json";

const RR_TYPE_TXT: u16 = 16;

#[derive(Debug, Deserialize)]
struct DohResponse {
    #[serde(rename = "Status")]
    status: u32,
    #[serde(rename = "Answer", default)]
    answer: Vec<DohAnswer>,
}

#[derive(Debug, Deserialize)]
struct DohAnswer {
    #[serde(rename = "type", default)]
    record_type: Option<u16>,
    data: String,
}

/// Name queried for `domain`'s DKIC key.
pub fn query_name(domain: &str) -> String {
    format!("{}.{}", DKIC_SUBDOMAIN, domain)
}

/// Build `<doh_url>?name=<name>&type=TXT`.
pub fn doh_query_url(doh_url: &str, name: &str) -> Result<Url, DkicError> {
    let mut url = Url::parse(doh_url)
        .map_err(|e| DkicError::DnsTransportError(format!("invalid DoH URL {}: {}", doh_url, e)))?;
    url.query_pairs_mut()
        .append_pair("name", name)
        .append_pair("type", "TXT");
    Ok(url)
}

/// Resolves a domain's DKIC public key over DNS-over-HTTPS.
#[derive(Clone)]
pub struct KeyResolver<F: HttpFetcher> {
    fetcher: F,
    timeout: Duration,
    encoding: KeyEncoding,
}

impl<F: HttpFetcher> KeyResolver<F> {
    pub fn new(fetcher: F, timeout: Duration) -> Self {
        Self {
            fetcher,
            timeout,
            encoding: KeyEncoding::default(),
        }
    }

    pub fn key_encoding(mut self, encoding: KeyEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Resolve `domain` to raw Ed25519 key material via `doh_url`.
    pub async fn resolve(&self, domain: &str, doh_url: &str) -> Result<Vec<u8>, DkicError> {
        let txt = self.lookup_txt(domain, doh_url).await?;
        let record = KeyRecord::parse(&txt)?;
        let key = record.public_key(self.encoding)?;
        debug!(key_len = key.len(), encoding = ?self.encoding, "public key decoded");
        Ok(key)
    }

    /// Fetch the raw TXT string published at `_dkic.<domain>`.
    pub async fn lookup_txt(&self, domain: &str, doh_url: &str) -> Result<String, DkicError> {
        let name = query_name(domain);
        let url = doh_query_url(doh_url, &name)?;
        debug!(%url, "querying DoH resolver");

        let response = tokio::time::timeout(self.timeout, self.fetcher.get(url.as_str(), Some(DNS_JSON)))
            .await
            .unwrap_or_else(|_| Err(HttpError::Timeout(self.timeout)))
            .map_err(|e| DkicError::DnsTransportError(e.to_string()))?;

        if !response.is_success() {
            return Err(DkicError::DnsTransportError(format!(
                "HTTP status {}",
                response.status
            )));
        }

        let doh: DohResponse = serde_json::from_slice(&response.body)
            .map_err(|e| DkicError::DnsTransportError(format!("invalid DoH response: {}", e)))?;

        if doh.status != 0 {
            return Err(DkicError::DnsQueryFailed {
                name,
                status: doh.status,
            });
        }

        let answer = doh
            .answer
            .iter()
            .find(|a| a.record_type.map_or(true, |t| t == RR_TYPE_TXT))
            .ok_or_else(|| DkicError::DnsRecordNotFound(name.clone()))?;

        Ok(unquote_txt(&answer.data).to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::http::{HttpResponse, MockFetcher};
    use crate::dkic::parser::BASE64;
    use base64::Engine;

    const DOH: &str = "https://dns.example/dns-query";
    const QUERY: &str = "https://dns.example/dns-query?name=_dkic.example.org&type=TXT";

    fn resolver(fetcher: &MockFetcher) -> KeyResolver<MockFetcher> {
        KeyResolver::new(fetcher.clone(), Duration::from_secs(5))
    }

    fn txt_answer(data: &str) -> String {
        serde_json::json!({
            "Status": 0,
            "Answer": [{ "name": "_dkic.example.org.", "type": 16, "TTL": 300, "data": data }],
        })
        .to_string()
    }

    #[test]
    fn test_query_url_shape() {
        assert_eq!(doh_query_url(DOH, &query_name("example.org")).unwrap().as_str(), QUERY);
        assert_eq!(
            doh_query_url("https://dns.example/resolve?ct=json", "_dkic.a.b")
                .unwrap()
                .as_str(),
            "https://dns.example/resolve?ct=json&name=_dkic.a.b&type=TXT"
        );
    }

    #[test]
    fn test_invalid_doh_url() {
        assert!(matches!(
            doh_query_url("not a url", "_dkic.example.org"),
            Err(DkicError::DnsTransportError(_))
        ));
    }

    #[tokio::test]
    async fn test_resolves_key_and_sends_dns_json_accept() {
        let fetcher = MockFetcher::new();
        let key = BASE64.encode([9u8; 32]);
        fetcher.add_response(
            QUERY,
            HttpResponse::ok(txt_answer(&format!("\"v=DKIC1; k=ed25519; p={}\"", key))),
        );

        let resolved = resolver(&fetcher).resolve("example.org", DOH).await.unwrap();
        assert_eq!(resolved, vec![9u8; 32]);

        let requests = fetcher.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].url, QUERY);
        assert_eq!(requests[0].accept.as_deref(), Some(DNS_JSON));
    }

    #[tokio::test]
    async fn test_unquoted_data_is_accepted() {
        let fetcher = MockFetcher::new();
        fetcher.add_response(QUERY, HttpResponse::ok(txt_answer("v=DKIC1; k=ed25519; p=AAAA")));
        let txt = resolver(&fetcher).lookup_txt("example.org", DOH).await.unwrap();
        assert_eq!(txt, "v=DKIC1; k=ed25519; p=AAAA");
    }

    #[tokio::test]
    async fn test_http_failure_is_transport_error() {
        let fetcher = MockFetcher::new();
        fetcher.add_response(QUERY, HttpResponse::new(502, "bad gateway"));
        let err = resolver(&fetcher).resolve("example.org", DOH).await.unwrap_err();
        assert_eq!(err, DkicError::DnsTransportError("HTTP status 502".into()));
    }

    #[tokio::test]
    async fn test_garbage_body_is_transport_error() {
        let fetcher = MockFetcher::new();
        fetcher.add_response(QUERY, HttpResponse::ok("<html>not json</html>"));
        assert!(matches!(
            resolver(&fetcher).resolve("example.org", DOH).await,
            Err(DkicError::DnsTransportError(_))
        ));
    }

    #[tokio::test]
    async fn test_nxdomain_is_query_failure() {
        let fetcher = MockFetcher::new();
        fetcher.add_response(QUERY, HttpResponse::ok(r#"{"Status":3}"#));
        let err = resolver(&fetcher).resolve("example.org", DOH).await.unwrap_err();
        assert_eq!(
            err,
            DkicError::DnsQueryFailed {
                name: "_dkic.example.org".into(),
                status: 3
            }
        );
    }

    #[tokio::test]
    async fn test_empty_answer_is_not_found() {
        let fetcher = MockFetcher::new();
        fetcher.add_response(QUERY, HttpResponse::ok(r#"{"Status":0,"Answer":[]}"#));
        assert_eq!(
            resolver(&fetcher).resolve("example.org", DOH).await.unwrap_err(),
            DkicError::DnsRecordNotFound("_dkic.example.org".into())
        );

        fetcher.add_response(QUERY, HttpResponse::ok(r#"{"Status":0}"#));
        assert_eq!(
            resolver(&fetcher).resolve("example.org", DOH).await.unwrap_err(),
            DkicError::DnsRecordNotFound("_dkic.example.org".into())
        );
    }

    #[tokio::test]
    async fn test_cname_answers_are_skipped() {
        let fetcher = MockFetcher::new();
        let body = serde_json::json!({
            "Status": 0,
            "Answer": [
                { "name": "_dkic.example.org.", "type": 5, "data": "keys.example.net." },
                { "name": "keys.example.net.", "type": 16, "data": "\"v=DKIC1; k=ed25519; p=AAAA\"" },
            ],
        });
        fetcher.add_response(QUERY, HttpResponse::ok(body.to_string()));
        let txt = resolver(&fetcher).lookup_txt("example.org", DOH).await.unwrap();
        assert_eq!(txt, "v=DKIC1; k=ed25519; p=AAAA");
    }

    #[tokio::test]
    async fn test_record_errors_propagate() {
        let fetcher = MockFetcher::new();
        fetcher.add_response(QUERY, HttpResponse::ok(txt_answer("v=DKIC2; k=ed25519; p=AAAA")));
        assert_eq!(
            resolver(&fetcher).resolve("example.org", DOH).await.unwrap_err(),
            DkicError::UnsupportedVersion("DKIC2".into())
        );

        fetcher.add_response(QUERY, HttpResponse::ok(txt_answer("v=DKIC1; k=ed25519")));
        assert_eq!(
            resolver(&fetcher).resolve("example.org", DOH).await.unwrap_err(),
            DkicError::MissingPublicKey
        );
    }

    #[tokio::test]
    async fn test_strict_encoding_is_applied() {
        let fetcher = MockFetcher::new();
        let key = BASE64.encode([9u8; 32]);
        fetcher.add_response(
            QUERY,
            HttpResponse::ok(txt_answer(&format!("v=DKIC1; k=ed25519; p={}", key))),
        );
        let strict = resolver(&fetcher).key_encoding(KeyEncoding::StrictSpki);
        assert!(matches!(
            strict.resolve("example.org", DOH).await,
            Err(DkicError::KeyImportError(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_resolver_times_out() {
        let fetcher = MockFetcher::new();
        fetcher.add_delayed(QUERY, Duration::from_secs(30), HttpResponse::ok(txt_answer("x")));
        let resolver = KeyResolver::new(fetcher, Duration::from_secs(1));
        assert_eq!(
            resolver.resolve("example.org", DOH).await.unwrap_err(),
            DkicError::DnsTransportError("timed out after 1s".into())
        );
    }
}
