//! REST client module for the console's authentication API.
//!
//! This module provides the `AuthClient` for the login, logout and
//! refresh-token endpoints, and the `CredentialTransport` trait the session
//! is written against.
//!
//! Every request carries the deployment's static `api-key` header; logout
//! and refresh additionally authenticate with the current bearer token.

pub mod client;
pub mod envelope;
pub mod error;
pub mod transport;

pub use client::AuthClient;
pub use envelope::{ApiMessage, ApiReply, Credentials, LoginData, RefreshData};
pub use error::ApiError;
pub use transport::CredentialTransport;
