//! Session authorization.
//!
//! `SessionAuthenticator` decides, on demand, whether the current credentials
//! authorize access to protected views. A live access token is confirmed with
//! a single probe request; an expired one is exchanged via the refresh
//! endpoint. Every failure mode collapses to `Unauthorized` - the caller
//! never sees an error, and access is never granted on ambiguity.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::api::{ApiClient, ApiError};

use super::error::AuthError;
use super::store::{CredentialStore, ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY};
use super::token::TokenClaims;

/// Outcome of an authorization check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStatus {
    Authorized,
    Unauthorized,
}

/// Decides authorization status from the stored credentials, refreshing the
/// access token when it has expired.
///
/// The store is shared mutable state across the process; the authenticator
/// holds it behind a mutex so clones running on spawned tasks see the same
/// credentials. There is exactly one writer path per key (the refresh).
pub struct SessionAuthenticator<S> {
    store: Arc<Mutex<S>>,
    api: ApiClient,
}

impl<S> Clone for SessionAuthenticator<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            api: self.api.clone(),
        }
    }
}

impl<S: CredentialStore> SessionAuthenticator<S> {
    pub fn new(store: S, api: ApiClient) -> Self {
        Self {
            store: Arc::new(Mutex::new(store)),
            api,
        }
    }

    /// Shared handle to the credential store.
    pub fn store(&self) -> Arc<Mutex<S>> {
        Arc::clone(&self.store)
    }

    /// Decide whether the caller currently holds a valid credential.
    ///
    /// Performs at most one probe call and at most one refresh call, never
    /// both. Fail-closed: any error resolves to `Unauthorized`.
    pub async fn check_authorization(&mut self) -> AuthStatus {
        match self.try_check().await {
            Ok(status) => status,
            Err(e) => {
                warn!(error = %e, "Authorization check failed");
                AuthStatus::Unauthorized
            }
        }
    }

    async fn try_check(&mut self) -> Result<AuthStatus, AuthError> {
        let access = self.store.lock().await.get(ACCESS_TOKEN_KEY);
        let Some(access) = access else {
            // No credential means no network call at all
            return Err(AuthError::MissingCredential);
        };

        let claims = TokenClaims::decode(&access)?;

        if claims.is_expired_at(Utc::now().timestamp_millis()) {
            return self.refresh().await;
        }

        self.api.set_token(access);
        match self.api.probe_auth().await {
            Ok(()) => Ok(AuthStatus::Authorized),
            Err(e) => {
                // A rejected probe is an ordinary deny, not an error
                debug!(error = %e, "Auth probe rejected");
                Ok(AuthStatus::Unauthorized)
            }
        }
    }

    /// Exchange the refresh credential for a new access token and store it.
    async fn refresh(&mut self) -> Result<AuthStatus, AuthError> {
        let refresh = self.store.lock().await.get(REFRESH_TOKEN_KEY);
        let Some(refresh) = refresh else {
            return Err(AuthError::MissingCredential);
        };

        match self.api.refresh_access(&refresh).await {
            Ok(access) => {
                if let Err(e) = self.store.lock().await.set(ACCESS_TOKEN_KEY, &access) {
                    // The backend accepted the refresh; a failed persist only
                    // costs a re-login next run
                    warn!(error = %e, "Failed to persist refreshed access token");
                }
                self.api.set_token(access);
                debug!("Access token refreshed");
                Ok(AuthStatus::Authorized)
            }
            Err(e) if e.is_transport() => Err(AuthError::TransportFailure(e)),
            Err(e) => Err(AuthError::RefreshRejected(e)),
        }
    }

    /// Obtain a token pair for the given credentials and store both.
    pub async fn login(&mut self, username: &str, password: &str) -> Result<(), ApiError> {
        let pair = self.api.login(username, password).await?;

        {
            let mut store = self.store.lock().await;
            if let Err(e) = store.set(ACCESS_TOKEN_KEY, &pair.access) {
                warn!(error = %e, "Failed to persist access token");
            }
            if let Err(e) = store.set(REFRESH_TOKEN_KEY, &pair.refresh) {
                warn!(error = %e, "Failed to persist refresh token");
            }
        }

        self.api.set_token(pair.access);
        Ok(())
    }

    /// Remove both credentials and drop the bearer token.
    pub async fn logout(&mut self) {
        let mut store = self.store.lock().await;
        for key in [ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY] {
            if let Err(e) = store.remove(key) {
                warn!(key, error = %e, "Failed to remove credential");
            }
        }
        drop(store);
        self.api.clear_token();
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::super::store::MemoryCredentialStore;
    use super::*;

    fn make_token(exp: i64) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(json!({ "exp": exp }).to_string().as_bytes());
        format!("{}.{}.sig", header, payload)
    }

    fn live_token() -> String {
        make_token(Utc::now().timestamp() + 3600)
    }

    fn expired_token() -> String {
        make_token(Utc::now().timestamp() - 3600)
    }

    async fn authenticator(
        server: &MockServer,
        access: Option<&str>,
        refresh: Option<&str>,
    ) -> SessionAuthenticator<MemoryCredentialStore> {
        let mut store = MemoryCredentialStore::default();
        if let Some(access) = access {
            store.set(ACCESS_TOKEN_KEY, access).unwrap();
        }
        if let Some(refresh) = refresh {
            store.set(REFRESH_TOKEN_KEY, refresh).unwrap();
        }
        SessionAuthenticator::new(store, ApiClient::new(server.uri()).unwrap())
    }

    async fn stored(auth: &SessionAuthenticator<MemoryCredentialStore>, key: &str) -> Option<String> {
        auth.store().lock().await.get(key)
    }

    #[tokio::test]
    async fn test_missing_access_token_denies_without_network() {
        let server = MockServer::start().await;
        // Any request at all would trip this
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let mut auth = authenticator(&server, None, Some("refresh-token")).await;
        assert_eq!(auth.check_authorization().await, AuthStatus::Unauthorized);
    }

    #[tokio::test]
    async fn test_malformed_access_token_denies_without_network() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let mut auth = authenticator(&server, Some("definitely-not-a-jwt"), None).await;
        assert_eq!(auth.check_authorization().await, AuthStatus::Unauthorized);
    }

    #[tokio::test]
    async fn test_live_token_with_successful_probe_authorizes() {
        let server = MockServer::start().await;
        let access = live_token();

        Mock::given(method("GET"))
            .and(path("/auth"))
            .and(header("authorization", format!("Bearer {}", access)))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let mut auth = authenticator(&server, Some(&access), None).await;
        assert_eq!(auth.check_authorization().await, AuthStatus::Authorized);
    }

    #[tokio::test]
    async fn test_far_future_exp_takes_probe_path_without_panicking() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/auth"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        // An exp near i64::MAX must behave as "not expired", not overflow
        let mut auth = authenticator(&server, Some(&make_token(i64::MAX)), None).await;
        assert_eq!(auth.check_authorization().await, AuthStatus::Authorized);
    }

    #[tokio::test]
    async fn test_live_token_with_rejected_probe_denies() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/auth"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;

        let mut auth = authenticator(&server, Some(&live_token()), None).await;
        assert_eq!(auth.check_authorization().await, AuthStatus::Unauthorized);
    }

    #[tokio::test]
    async fn test_expired_token_refreshes_and_stores_new_access() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/token/refresh/"))
            .and(body_json(json!({ "refresh": "refresh-token" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "access": "newtoken" })))
            .expect(1)
            .mount(&server)
            .await;

        let mut auth = authenticator(&server, Some(&expired_token()), Some("refresh-token")).await;
        assert_eq!(auth.check_authorization().await, AuthStatus::Authorized);
        assert_eq!(stored(&auth, ACCESS_TOKEN_KEY).await.as_deref(), Some("newtoken"));
    }

    #[tokio::test]
    async fn test_rejected_refresh_denies_and_leaves_store_unchanged() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/token/refresh/"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "detail": "expired" })))
            .expect(1)
            .mount(&server)
            .await;

        let old_access = expired_token();
        let mut auth = authenticator(&server, Some(&old_access), Some("refresh-token")).await;
        assert_eq!(auth.check_authorization().await, AuthStatus::Unauthorized);
        assert_eq!(stored(&auth, ACCESS_TOKEN_KEY).await.as_deref(), Some(old_access.as_str()));
    }

    #[tokio::test]
    async fn test_expired_token_without_refresh_credential_denies_without_network() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let mut auth = authenticator(&server, Some(&expired_token()), None).await;
        assert_eq!(auth.check_authorization().await, AuthStatus::Unauthorized);
    }

    #[tokio::test]
    async fn test_malformed_refresh_response_denies() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/token/refresh/"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let mut auth = authenticator(&server, Some(&expired_token()), Some("refresh-token")).await;
        assert_eq!(auth.check_authorization().await, AuthStatus::Unauthorized);
    }

    #[tokio::test]
    async fn test_transport_failure_during_refresh_denies() {
        // Point at a server that is no longer listening
        let server = MockServer::start().await;
        let uri = server.uri();
        drop(server);

        let mut store = MemoryCredentialStore::default();
        store.set(ACCESS_TOKEN_KEY, &expired_token()).unwrap();
        store.set(REFRESH_TOKEN_KEY, "refresh-token").unwrap();
        let mut auth = SessionAuthenticator::new(store, ApiClient::new(uri).unwrap());

        assert_eq!(auth.check_authorization().await, AuthStatus::Unauthorized);
    }

    #[tokio::test]
    async fn test_login_stores_both_tokens() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/token/"))
            .and(body_json(json!({ "username": "dana", "password": "hunter2" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access": "acc",
                "refresh": "ref",
            })))
            .mount(&server)
            .await;

        let mut auth = authenticator(&server, None, None).await;
        auth.login("dana", "hunter2").await.unwrap();
        assert_eq!(stored(&auth, ACCESS_TOKEN_KEY).await.as_deref(), Some("acc"));
        assert_eq!(stored(&auth, REFRESH_TOKEN_KEY).await.as_deref(), Some("ref"));
    }

    #[tokio::test]
    async fn test_logout_removes_both_tokens() {
        let server = MockServer::start().await;
        let mut auth = authenticator(&server, Some("a"), Some("r")).await;
        auth.logout().await;
        assert_eq!(stored(&auth, ACCESS_TOKEN_KEY).await, None);
        assert_eq!(stored(&auth, REFRESH_TOKEN_KEY).await, None);
    }
}
