//! Signature-based authentication for restricted channels and the HTTP API.

pub mod signer;

pub use signer::AuthSigner;
