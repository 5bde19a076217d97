//! Google Secret Manager adapter for kmsgate
//!
//! Provides:
//! - CreateSecret (automatic replication), AddSecretVersion, AccessSecretVersion
//! - Optional KMS encryption of payloads before they are stored
//! - HTTP handlers for /secrets, /storesecrets and /secrets/:secret_name/:version

pub mod client;
pub mod handlers;
mod service;

pub use client::{CloudSecretManager, SecretManager, DEFAULT_ENDPOINT};
pub use handlers::{router, SecretsState};
pub use service::{SecretService, SecretsError};
