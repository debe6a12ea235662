//! DKIC (Domain Key Integrity Check): verify that a web document was authored
//! by the controller of its domain.
//!
//! A page carries an Ed25519 signature in a `<script id="dkic-signature">`
//! element. The verifier re-fetches the page source, removes that element,
//! looks up `_dkic.<domain>` over DNS-over-HTTPS and checks the signature.
//!
//! Network access goes through the [`HttpFetcher`] trait. Implement it to
//! plug in a different client, or use [`MockFetcher`] in tests.

pub mod common;
pub mod config;
pub mod dkic;

pub use common::http::{HttpError, HttpFetcher, HttpResponse, MockFetcher, ReqwestFetcher};
pub use config::{ConfigError, DohProvider, VerifierConfig};
pub use dkic::{
    canonicalize, DkicError, DkicSigner, DkicVerifier, DocumentContext, KeyEncoding,
    RenderedDocument, SignatureClaim, SigningError, VerificationOutcome,
};
