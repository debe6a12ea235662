use std::fmt;
use std::time::Duration;

use tracing::{debug, info, info_span, warn, Instrument};
use url::Url;

use crate::common::http::{HttpFetcher, ReqwestFetcher};
use crate::config::{ConfigError, VerifierConfig};

use super::canon::Canonicalizer;
use super::context::{DocumentContext, RenderedDocument};
use super::crypto::verify_signature;
use super::extract::extract_signature;
use super::key::KeyEncoding;
use super::resolve::KeyResolver;
use super::types::{CanonicalDocument, VerificationOutcome};
use super::DkicError;

/// Pipeline states, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    ExtractSignature,
    FetchAndCanonicalize,
    ResolveDomain,
    ResolveKey,
    Verify,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::ExtractSignature => "extract-signature",
            Stage::FetchAndCanonicalize => "fetch-and-canonicalize",
            Stage::ResolveDomain => "resolve-domain",
            Stage::ResolveKey => "resolve-key",
            Stage::Verify => "verify",
        })
    }
}

/// DKIC verifier.
///
/// Holds no state between calls: every `verify` re-fetches the document
/// source and re-resolves the key, so concurrent verifications need no
/// coordination.
#[derive(Clone)]
pub struct DkicVerifier<F: HttpFetcher> {
    canonicalizer: Canonicalizer<F>,
    resolver: KeyResolver<F>,
}

impl DkicVerifier<ReqwestFetcher> {
    /// Build a network-backed verifier from a validated configuration.
    pub fn from_config(config: &VerifierConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let fetcher = ReqwestFetcher::new(config.fetch_timeout(), &config.user_agent)?;
        Ok(Self::new(fetcher)
            .fetch_timeout(config.fetch_timeout())
            .dns_timeout(config.dns_timeout())
            .key_encoding(config.key_encoding))
    }
}

impl<F: HttpFetcher> DkicVerifier<F> {
    pub fn new(fetcher: F) -> Self {
        let fetch_timeout = Duration::from_millis(crate::config::DEFAULT_FETCH_TIMEOUT_MS);
        let dns_timeout = Duration::from_millis(crate::config::DEFAULT_DNS_TIMEOUT_MS);
        Self {
            canonicalizer: Canonicalizer::new(fetcher.clone(), fetch_timeout),
            resolver: KeyResolver::new(fetcher, dns_timeout),
        }
    }

    pub fn fetch_timeout(mut self, timeout: Duration) -> Self {
        self.canonicalizer = self.canonicalizer.timeout(timeout);
        self
    }

    pub fn dns_timeout(mut self, timeout: Duration) -> Self {
        self.resolver = self.resolver.timeout(timeout);
        self
    }

    pub fn key_encoding(mut self, encoding: KeyEncoding) -> Self {
        self.resolver = self.resolver.key_encoding(encoding);
        self
    }

    /// Verify `document` against the key its domain publishes, resolving DNS
    /// through `doh_url`.
    pub async fn verify<D: DocumentContext + ?Sized>(
        &self,
        document: &D,
        doh_url: &str,
    ) -> VerificationOutcome {
        let span = info_span!("dkic_verify", url = %document.address());
        async {
            match self.run(document, doh_url).await {
                Ok((domain, document)) => {
                    info!(%domain, content_len = document.len(), "signature verified");
                    VerificationOutcome::Verified { domain, document }
                }
                Err(error) => {
                    if error.is_verdict() {
                        warn!(verdict = "mismatch", %error, "signature does not match content");
                    } else {
                        warn!(%error, "verification failed");
                    }
                    VerificationOutcome::Failed { error }
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Fetch the page at `page_url` as the rendered document, then verify it.
    pub async fn verify_url(&self, page_url: &str, doh_url: &str) -> VerificationOutcome {
        match self.load_rendered(page_url).await {
            Ok(document) => self.verify(&document, doh_url).await,
            Err(error) => {
                warn!(url = page_url, %error, "could not load page");
                VerificationOutcome::Failed { error }
            }
        }
    }

    async fn load_rendered(&self, page_url: &str) -> Result<RenderedDocument, DkicError> {
        let address = Url::parse(page_url)
            .map_err(|e| DkicError::InvalidDocumentAddress(format!("{}: {}", page_url, e)))?;
        let markup = self.canonicalizer.fetch_source(&address).await?;
        Ok(RenderedDocument::new(address, markup))
    }

    async fn run<D: DocumentContext + ?Sized>(
        &self,
        document: &D,
        doh_url: &str,
    ) -> Result<(String, CanonicalDocument), DkicError> {
        debug!(stage = %Stage::ExtractSignature);
        let claim = extract_signature(document)?;

        debug!(stage = %Stage::FetchAndCanonicalize);
        let canonical = self.canonicalizer.fetch_canonical(document.address()).await?;

        debug!(stage = %Stage::ResolveDomain);
        let domain = document_domain(document.address())?;

        debug!(stage = %Stage::ResolveKey, %domain);
        let public_key = self.resolver.resolve(&domain, doh_url).await?;

        debug!(stage = %Stage::Verify);
        if !verify_signature(&public_key, &claim.signature, canonical.as_bytes())? {
            return Err(DkicError::SignatureMismatch);
        }

        Ok((domain, canonical))
    }
}

/// Host of an http(s) document address.
fn document_domain(address: &Url) -> Result<String, DkicError> {
    if !matches!(address.scheme(), "http" | "https") {
        return Err(DkicError::InvalidDocumentAddress(format!(
            "can only verify HTTP/HTTPS pages, got {}",
            address.scheme()
        )));
    }
    address
        .host_str()
        .map(str::to_string)
        .ok_or_else(|| DkicError::InvalidDocumentAddress(format!("{} has no host", address)))
}
