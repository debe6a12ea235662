//! Infrastructure shared by the signer and the verifier.

pub mod html;
pub mod http;
