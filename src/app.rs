//! Application state management for centavo.
//!
//! This module contains the core `App` struct that wires the session
//! authenticator and route guard into the TUI: mounting the guard on
//! startup, reacting to its decision each tick, and fetching the greeting
//! for the protected home view in the background.

use std::io::{self, Write};

use anyhow::Result;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::api::{ApiClient, ApiError};
use crate::auth::{
    CredentialStore, FileCredentialStore, GuardState, PasswordVault, RouteGuard,
    SessionAuthenticator, ACCESS_TOKEN_KEY,
};
use crate::config::Config;

// ============================================================================
// Constants
// ============================================================================

/// Buffer size for the background fetch message channel.
/// Only the greeting fetch reports through it; 8 leaves headroom.
const CHANNEL_BUFFER_SIZE: usize = 8;

/// Maximum length for username input.
/// Usernames are typically email addresses, 50 chars covers most.
const MAX_USERNAME_LENGTH: usize = 50;

/// Maximum length for password input.
/// 128 chars accommodates password managers and passphrases.
const MAX_PASSWORD_LENGTH: usize = 128;

pub fn can_add_username_char(current_len: usize, c: char) -> bool {
    current_len < MAX_USERNAME_LENGTH && !c.is_control()
}

pub fn can_add_password_char(current_len: usize, c: char) -> bool {
    current_len < MAX_PASSWORD_LENGTH && !c.is_control()
}

// ============================================================================
// UI State Types
// ============================================================================

/// Overall application state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    Normal,
    LoggingIn,
    ShowingHelp,
    Quitting,
}

/// Login form focus state
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LoginFocus {
    Username,
    Password,
    Button,
}

/// Results from background fetch tasks, sent over the MPSC channel back to
/// the main loop.
enum FetchResult {
    Greeting(String),
    Error(String),
}

// ============================================================================
// Main Application Struct
// ============================================================================

pub struct App {
    // Core services
    pub config: Config,
    pub auth: SessionAuthenticator<FileCredentialStore>,
    pub guard: RouteGuard,

    // UI state
    pub state: AppState,
    pub greeting: Option<String>,
    pub status_message: Option<String>,

    // Login form state
    pub login_username: String,
    pub login_password: String,
    pub login_focus: LoginFocus,
    pub login_error: Option<String>,

    // Background fetch channel
    fetch_rx: mpsc::Receiver<FetchResult>,
    fetch_tx: mpsc::Sender<FetchResult>,

    // One greeting fetch per authorized mount
    greeting_requested: bool,
}

impl App {
    /// Create a new application instance
    pub fn new() -> Result<Self> {
        let config = match Config::load() {
            Ok(c) => c,
            Err(e) => {
                warn!(error = %e, "Failed to load config, using defaults");
                Config::default()
            }
        };

        let data_dir = Config::data_dir().unwrap_or_else(|_| std::path::PathBuf::from("."));
        let store = FileCredentialStore::open(data_dir);
        let api = ApiClient::new(config.resolve_base_url())?;
        let auth = SessionAuthenticator::new(store, api);

        let (tx, rx) = mpsc::channel(CHANNEL_BUFFER_SIZE);

        let login_username = std::env::var("CENTAVO_USERNAME")
            .ok()
            .or_else(|| config.last_username.clone())
            .unwrap_or_default();

        Ok(Self {
            config,
            auth,
            guard: RouteGuard::new(),

            state: AppState::Normal,
            greeting: None,
            status_message: None,

            login_username,
            login_password: String::new(),
            login_focus: LoginFocus::Username,
            login_error: None,

            fetch_rx: rx,
            fetch_tx: tx,

            greeting_requested: false,
        })
    }

    // =========================================================================
    // Route guard
    // =========================================================================

    /// Mount the guarded home view: restart the guard and run a fresh
    /// authorization check.
    pub fn mount_home(&mut self) {
        self.greeting = None;
        self.greeting_requested = false;
        let mut auth = self.auth.clone();
        self.guard.mount(async move { auth.check_authorization().await });
    }

    /// Advance the guard and drain background results. Called every tick of
    /// the event loop.
    pub async fn tick(&mut self) {
        match self.guard.poll() {
            GuardState::Unknown => {}
            GuardState::Authorized => {
                if !self.greeting_requested {
                    self.greeting_requested = true;
                    self.fetch_greeting_background();
                }
            }
            GuardState::Unauthorized => {
                // Redirect to the login view, once
                if self.state != AppState::LoggingIn {
                    self.start_login();
                }
            }
        }

        while let Ok(result) = self.fetch_rx.try_recv() {
            self.process_fetch_result(result);
        }
    }

    // =========================================================================
    // Background greeting fetch
    // =========================================================================

    /// Spawn a background task to fetch the home-view greeting.
    fn fetch_greeting_background(&mut self) {
        let store = self.auth.store();
        let base_url = self.config.resolve_base_url();
        let tx = self.fetch_tx.clone();

        tokio::spawn(async move {
            let api = match ApiClient::new(base_url) {
                Ok(api) => api,
                Err(e) => {
                    error!(error = %e, "Failed to create API client for greeting fetch");
                    let _ = tx.send(FetchResult::Error(e.to_string())).await;
                    return;
                }
            };

            let api = match store.lock().await.get(ACCESS_TOKEN_KEY) {
                Some(token) => api.with_token(token),
                None => api,
            };

            match api.fetch_greeting().await {
                Ok(greeting) => {
                    let _ = tx.send(FetchResult::Greeting(greeting.message)).await;
                }
                Err(e) => {
                    let _ = tx.send(FetchResult::Error(e.to_string())).await;
                }
            }
        });
    }

    fn process_fetch_result(&mut self, result: FetchResult) {
        match result {
            FetchResult::Greeting(message) => {
                self.greeting = Some(message);
                self.status_message = None;
            }
            FetchResult::Error(msg) => {
                error!(error = %msg, "Background fetch error");
                self.status_message = Some(format!("Error: {}", msg));
            }
        }
    }

    // =========================================================================
    // Authentication
    // =========================================================================

    /// Attempt login with the credentials from the login form
    pub async fn attempt_login(&mut self) -> Result<()> {
        let username = self.login_username.clone();
        let password = self.login_password.clone();

        if username.is_empty() || password.is_empty() {
            self.login_error = Some("Username and password required".to_string());
            return Err(anyhow::anyhow!("Username and password required"));
        }

        self.login_error = None;

        match self.auth.login(&username, &password).await {
            Ok(()) => {
                if let Err(e) = PasswordVault::store(&username, &password) {
                    warn!(error = %e, "Failed to store password in keychain");
                }

                self.config.last_username = Some(username);
                if let Err(e) = self.config.save() {
                    warn!(error = %e, "Failed to save config");
                }

                self.login_password.clear();
                self.state = AppState::Normal;
                info!("Login successful");

                // Re-run the guard from Unknown with the fresh credentials
                self.mount_home();
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "Login failed");
                self.login_error = Some(Self::friendly_login_error(&e));
                Err(e.into())
            }
        }
    }

    fn friendly_login_error(e: &ApiError) -> String {
        match e {
            ApiError::Unauthorized | ApiError::AccessDenied(_) => {
                "Invalid username or password".to_string()
            }
            ApiError::NetworkError(_) => {
                "Unable to connect to server. Check your connection.".to_string()
            }
            other => format!("Login failed: {}", other),
        }
    }

    /// Start the login process (show login overlay)
    pub fn start_login(&mut self) {
        self.state = AppState::LoggingIn;
        self.login_focus = if self.login_username.is_empty() {
            LoginFocus::Username
        } else {
            LoginFocus::Password
        };
        self.login_error = None;
    }

    /// Log out: discard any in-flight check, remove both credentials, and
    /// redirect to login.
    pub async fn logout(&mut self) {
        self.guard.unmount();
        self.auth.logout().await;
        self.greeting = None;
        self.greeting_requested = false;
        info!("Logged out");
        self.start_login();
    }

    // =========================================================================
    // CLI login/logout
    // =========================================================================

    /// Interactive login for the `--login` CLI path.
    pub async fn login_interactive(&mut self) -> Result<()> {
        println!("\n=== centavo login ===\n");

        let username = if let Some(last_user) = self.config.last_username.clone() {
            print!("Username [{}]: ", last_user);
            io::stdout().flush()?;

            let mut input = String::new();
            io::stdin().read_line(&mut input)?;
            let input = input.trim();

            if input.is_empty() {
                last_user
            } else {
                input.to_string()
            }
        } else {
            Self::prompt_username()?
        };

        let password = if PasswordVault::has_password(&username) {
            print!("Use stored password? [Y/n]: ");
            io::stdout().flush()?;

            let mut input = String::new();
            io::stdin().read_line(&mut input)?;

            if input.trim().to_lowercase() != "n" {
                PasswordVault::get_password(&username)?
            } else {
                Self::prompt_password()?
            }
        } else {
            Self::prompt_password()?
        };

        println!("\nAuthenticating...");
        self.auth.login(&username, &password).await?;

        if let Err(e) = PasswordVault::store(&username, &password) {
            warn!(error = %e, "Failed to store password in keychain");
        }

        self.config.last_username = Some(username);
        self.config.save()?;

        println!("Login successful.");
        Ok(())
    }

    /// Clear stored credentials for the `--logout` CLI path.
    pub async fn logout_cli(&mut self) -> Result<()> {
        self.auth.logout().await;
        if let Some(ref username) = self.config.last_username {
            if PasswordVault::has_password(username) {
                if let Err(e) = PasswordVault::delete(username) {
                    warn!(error = %e, "Failed to remove password from keychain");
                }
            }
        }
        println!("Credentials cleared.");
        Ok(())
    }

    fn prompt_username() -> Result<String> {
        print!("Username: ");
        io::stdout().flush()?;

        let mut username = String::new();
        io::stdin().read_line(&mut username)?;
        Ok(username.trim().to_string())
    }

    fn prompt_password() -> Result<String> {
        let password = rpassword::prompt_password("Password: ")?;
        Ok(password)
    }
}
