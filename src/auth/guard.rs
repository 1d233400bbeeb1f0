//! Render-gating guard for protected views.
//!
//! A mounted guard runs one authorization check and moves from `Unknown` to
//! exactly one terminal state. The event loop polls it each tick; protected
//! content is rendered only in `Authorized`, and `Unauthorized` redirects to
//! the login view. Remounting restarts from `Unknown` - decisions are never
//! cached across mounts.

use std::future::Future;

use tokio::sync::oneshot;
use tracing::warn;

use super::session::AuthStatus;

/// Guard state. `Unknown` transitions at most once per mount.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardState {
    Unknown,
    Authorized,
    Unauthorized,
}

impl From<AuthStatus> for GuardState {
    fn from(status: AuthStatus) -> Self {
        match status {
            AuthStatus::Authorized => GuardState::Authorized,
            AuthStatus::Unauthorized => GuardState::Unauthorized,
        }
    }
}

pub struct RouteGuard {
    state: GuardState,
    pending: Option<oneshot::Receiver<AuthStatus>>,
}

impl RouteGuard {
    pub fn new() -> Self {
        Self {
            state: GuardState::Unknown,
            pending: None,
        }
    }

    pub fn state(&self) -> GuardState {
        self.state
    }

    /// Mount the guard: reset to `Unknown` and run `check` on the runtime.
    /// Any previously pending check is discarded (its receiver is dropped, so
    /// a late settlement mutates nothing).
    pub fn mount<F>(&mut self, check: F)
    where
        F: Future<Output = AuthStatus> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        self.attach(rx);
        tokio::spawn(async move {
            // The receiver may be gone if the guard was unmounted meanwhile
            let _ = tx.send(check.await);
        });
    }

    fn attach(&mut self, rx: oneshot::Receiver<AuthStatus>) {
        self.state = GuardState::Unknown;
        self.pending = Some(rx);
    }

    /// Unmount the guard, discarding any in-flight check.
    pub fn unmount(&mut self) {
        self.state = GuardState::Unknown;
        self.pending = None;
    }

    /// Advance the state machine. Called from the event loop; transitions
    /// exactly once per mount, when the check settles.
    pub fn poll(&mut self) -> GuardState {
        if self.state != GuardState::Unknown {
            return self.state;
        }

        if let Some(rx) = self.pending.as_mut() {
            match rx.try_recv() {
                Ok(status) => {
                    self.state = status.into();
                    self.pending = None;
                }
                Err(oneshot::error::TryRecvError::Empty) => {}
                Err(oneshot::error::TryRecvError::Closed) => {
                    // The check task died without settling: fail closed
                    warn!("Authorization check dropped without settling");
                    self.state = GuardState::Unauthorized;
                    self.pending = None;
                }
            }
        }

        self.state
    }
}

impl Default for RouteGuard {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================
