//! Cloud KMS adapter for kmsgate
//!
//! Provides the key service used by every route that encrypts or decrypts:
//! - Symmetric encrypt/decrypt through Cloud KMS
//! - Asymmetric (RSA-OAEP) encrypt with a cached public key, decrypt through Cloud KMS
//! - HTTP handlers for /encrypt, /decrypt, /asmencrypt and /asmdecrypt

pub mod client;
pub mod handlers;
mod service;

pub use client::{CloudKms, KeyManagement, DEFAULT_ENDPOINT};
pub use handlers::{router, KmsState};
pub use service::{KeyService, KmsError};
