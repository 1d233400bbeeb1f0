//! Authentication module: session lifecycle and render gating.
//!
//! This module provides:
//! - `SessionAuthenticator`: authorization decisions with refresh-on-demand
//! - `RouteGuard`: the render-gating state machine for protected views
//! - `TokenClaims`: JWT payload inspection (no verification)
//! - `CredentialStore`: the injected key-value store for the token pair
//! - `PasswordVault`: OS-keychain password storage for interactive login

pub mod credentials;
pub mod error;
pub mod guard;
pub mod session;
pub mod store;
pub mod token;

pub use credentials::PasswordVault;
pub use guard::{GuardState, RouteGuard};
pub use session::{AuthStatus, SessionAuthenticator};
pub use store::{CredentialStore, FileCredentialStore, ACCESS_TOKEN_KEY};
