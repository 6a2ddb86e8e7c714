//! Session gate controller
//!
//! Single source of truth for whether exam content is gated. Reconciles the
//! lock flag persisted on the device with the backend's status (which always
//! wins when it can be reached) and handles password unlock attempts.
//!
//! Remote calls are queued: `refresh_status` and `verify` hold one async
//! mutex for their whole duration, so completions are applied strictly in
//! call order and `api_loading` belongs to exactly one call at a time.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};

use crate::api::{ApiError, GateApi};
use crate::state::{GatePhase, SessionState};
use crate::store::{KeyValueStore, LOCKED_KEY};

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Result of a password unlock attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyOutcome {
    Unlocked,
    Rejected,
}

/// Verification accepts 201..=299 only. A plain 200 is a rejection.
pub fn is_accepted_status(code: u16) -> bool {
    (201..=299).contains(&code)
}

/// Marks a remote call in flight. Dropping it clears `api_loading`, so a
/// cancelled call never leaves the gate on the loading screen.
struct RemoteCall<'a> {
    state: &'a watch::Sender<SessionState>,
}

impl<'a> RemoteCall<'a> {
    fn begin(state: &'a watch::Sender<SessionState>) -> Self {
        state.send_modify(|s| {
            s.api_loading = true;
            s.api_failed = false;
        });
        Self { state }
    }
}

impl Drop for RemoteCall<'_> {
    fn drop(&mut self) {
        self.state.send_if_modified(|s| std::mem::replace(&mut s.api_loading, false));
    }
}

pub struct GateController {
    store: Arc<dyn KeyValueStore>,
    api: Arc<dyn GateApi>,
    state: watch::Sender<SessionState>,
    remote_guard: Mutex<()>,
    request_timeout: Duration,
}

impl GateController {
    pub fn new(store: Arc<dyn KeyValueStore>, api: Arc<dyn GateApi>) -> Self {
        let (state, _) = watch::channel(SessionState::default());
        Self {
            store,
            api,
            state,
            remote_guard: Mutex::new(()),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Snapshot of the current state
    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn phase(&self) -> GatePhase {
        self.state.borrow().phase()
    }

    /// Push-updated view of the state
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Load the persisted lock flag. Never contacts the backend.
    pub fn initialize(&self) {
        let locked = match self.store.get_bool(LOCKED_KEY) {
            Ok(value) => value.unwrap_or(false),
            Err(e) => {
                tracing::warn!("Failed to read persisted lock flag, assuming unlocked: {}", e);
                false
            }
        };

        self.state.send_modify(|s| s.locked = locked);
        tracing::info!("Gate initialized, locked={}", locked);
    }

    /// Fetch the gate status and apply it.
    ///
    /// On failure the lock flag and target are left untouched and
    /// `api_failed` is raised.
    pub async fn refresh_status(&self) -> GatePhase {
        let _guard = self.remote_guard.lock().await;
        let _call = RemoteCall::begin(&self.state);

        match self.bounded(self.api.fetch_status()).await {
            Ok(status) => {
                let mut changed = false;
                self.state.send_modify(|s| {
                    if let Some(hint) = status.location_hint.as_ref() {
                        s.target_url = Some(hint.clone());
                    }
                    changed = s.locked != status.enabled;
                    s.locked = status.enabled;
                    s.resolved = true;
                    s.api_loading = false;
                });

                if changed || self.stored_locked() != Some(status.enabled) {
                    self.persist_locked(status.enabled);
                }
                if changed {
                    tracing::info!(
                        "Gate {} by backend",
                        if status.enabled { "locked" } else { "unlocked" }
                    );
                }
            }
            Err(e) => {
                tracing::warn!("Status refresh failed ({:?}): {}", e.kind(), e);
                self.state.send_modify(|s| {
                    s.api_failed = true;
                    s.api_loading = false;
                });
            }
        }

        self.phase()
    }

    /// Submit an unlock password.
    ///
    /// Anything but an accepted status locks the gate. `api_failed` is only
    /// raised when no response was obtained at all.
    pub async fn verify(&self, password: &str) -> VerifyOutcome {
        let _guard = self.remote_guard.lock().await;
        let _call = RemoteCall::begin(&self.state);

        let (outcome, api_failed) = match self.bounded(self.api.verify(password)).await {
            Ok(code) if is_accepted_status(code) => (VerifyOutcome::Unlocked, false),
            Ok(code) => {
                tracing::info!("Password rejected with status {}", code);
                (VerifyOutcome::Rejected, false)
            }
            Err(e) => {
                tracing::warn!("Password verification failed ({:?}): {}", e.kind(), e);
                (VerifyOutcome::Rejected, true)
            }
        };

        let locked = outcome == VerifyOutcome::Rejected;
        self.state.send_modify(|s| {
            s.locked = locked;
            s.resolved = true;
            s.api_failed = api_failed;
            s.api_loading = false;
        });
        self.persist_locked(locked);

        if outcome == VerifyOutcome::Unlocked {
            tracing::info!("Gate unlocked by password");
        }
        outcome
    }

    /// Lock immediately, e.g. when the host goes to the background
    pub fn lock(&self) {
        self.state.send_modify(|s| s.locked = true);
        self.persist_locked(true);
        tracing::info!("Gate locked locally");
    }

    pub fn report_content_load_failed(&self, failed: bool) {
        self.state.send_modify(|s| s.content_failed = failed);
    }

    pub fn report_content_loading(&self, is_loading: bool) {
        self.state.send_modify(|s| {
            s.loading = is_loading;
            if is_loading {
                s.content_failed = false;
            }
        });
    }

    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, ApiError>>,
    ) -> Result<T, ApiError> {
        match tokio::time::timeout(self.request_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(ApiError::Timeout),
        }
    }

    /// Persisted flag, with an absent key read as unlocked the way
    /// `initialize` reads it. `None` when the store cannot be read.
    fn stored_locked(&self) -> Option<bool> {
        self.store
            .get_bool(LOCKED_KEY)
            .ok()
            .map(|value| value.unwrap_or(false))
    }

    fn persist_locked(&self, locked: bool) {
        if let Err(e) = self.store.set_bool(LOCKED_KEY, locked) {
            tracing::warn!("Failed to persist lock flag: {}", e);
        }
    }
}
