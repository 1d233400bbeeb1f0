//! REST API client module for the finance-tracker backend.
//!
//! This module provides the `ApiClient` for communicating with the
//! backend to obtain and refresh JWT tokens and fetch the greeting.
//!
//! The API uses SimpleJWT-style bearer token authentication.

pub mod client;
pub mod error;

pub use client::ApiClient;
pub use error::ApiError;
