//! Wire models for the finance-tracker API.

use serde::Deserialize;

/// Greeting payload from `GET /api/hello/`.
#[derive(Debug, Clone, Deserialize)]
pub struct Greeting {
    pub message: String,
}

/// Token pair issued by `POST /api/token/` at login.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}
