use thiserror::Error;

use crate::api::ApiError;

use super::token::TokenError;

/// Failures inside the authorization check. All of these are handled locally
/// by the authenticator and collapse to `Unauthorized`; they never reach the
/// render layer.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("no credential in store")]
    MissingCredential,

    #[error("malformed access token: {0}")]
    MalformedToken(#[from] TokenError),

    #[error("transport failure during refresh: {0}")]
    TransportFailure(ApiError),

    #[error("refresh rejected: {0}")]
    RefreshRejected(ApiError),
}
