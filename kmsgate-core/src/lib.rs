//! Core types for kmsgate
//!
//! This crate provides the pieces shared by the key and secret services:
//! response envelopes, the handler-boundary error, resource names and the
//! provider access token.

pub mod auth;
pub mod error;
pub mod resource;
pub mod response;
pub mod rest;

pub use auth::{AuthError, TokenSource};
pub use error::{ApiError, ErrorEnvelope};
pub use resource::ResourceNames;
pub use rest::ProviderError;
pub use response::{health, json_response, respond, PayloadResponse, JSON_CONTENT_TYPE};
