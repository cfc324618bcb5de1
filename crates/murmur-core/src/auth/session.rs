//! Session lifecycle: login, logout, renewal and persistence of the
//! credential pair.
//!
//! The manager is the only owner of the pair. Every state change bumps a
//! generation counter; results of network calls issued under an older
//! generation are discarded, so a refresh that lands after a logout can never
//! resurrect the session.

use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};
use std::time::Duration as StdDuration;

use chrono::{Duration, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::backend::AuthBackend;
use super::error::SessionError;
use super::store::TokenStore;
use super::token::{CredentialPair, Identity};

/// Tokens expiring within this window are treated as unusable.
pub const SAFETY_MARGIN_SECS: i64 = 120;

/// Period of the proactive background refresh.
pub const REFRESH_INTERVAL_SECS: u64 = 240;

#[derive(Debug, Clone, Copy)]
pub struct SessionSettings {
    pub safety_margin: Duration,
    pub refresh_interval: StdDuration,
    /// Run the background refresh timer while a session exists
    pub proactive_refresh: bool,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            safety_margin: Duration::seconds(SAFETY_MARGIN_SECS),
            refresh_interval: StdDuration::from_secs(REFRESH_INTERVAL_SECS),
            proactive_refresh: true,
        }
    }
}

#[derive(Default)]
struct SessionState {
    credentials: Option<CredentialPair>,
    identity: Option<Identity>,
    generation: u64,
}

pub struct SessionManager {
    backend: Arc<dyn AuthBackend>,
    store: Arc<dyn TokenStore>,
    settings: SessionSettings,
    state: RwLock<SessionState>,
    identity_tx: watch::Sender<Option<Identity>>,
    timer: Mutex<Option<JoinHandle<()>>>,
    this: Weak<SessionManager>,
}

impl SessionManager {
    pub fn new(backend: Arc<dyn AuthBackend>, store: Arc<dyn TokenStore>) -> Arc<Self> {
        Self::with_settings(backend, store, SessionSettings::default())
    }

    pub fn with_settings(
        backend: Arc<dyn AuthBackend>,
        store: Arc<dyn TokenStore>,
        settings: SessionSettings,
    ) -> Arc<Self> {
        let (identity_tx, _) = watch::channel(None);
        Arc::new_cyclic(|this| Self {
            backend,
            store,
            settings,
            state: RwLock::new(SessionState::default()),
            identity_tx,
            timer: Mutex::new(None),
            this: this.clone(),
        })
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    // =========================================================================
    // Read accessors
    // =========================================================================

    pub fn identity(&self) -> Option<Identity> {
        self.read_state().identity.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.read_state().credentials.is_some()
    }

    /// Current access token as-is, without checking expiry
    pub fn access_token(&self) -> Option<String> {
        self.read_state()
            .credentials
            .as_ref()
            .map(|c| c.access.clone())
    }

    /// Watch the identity. `None` is published on every logout, including
    /// forced ones, so the UI can return to the login screen.
    pub fn subscribe(&self) -> watch::Receiver<Option<Identity>> {
        self.identity_tx.subscribe()
    }

    /// True while a proactive refresh timer is scheduled
    pub fn refresh_timer_active(&self) -> bool {
        self.timer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }

    // =========================================================================
    // Session lifecycle
    // =========================================================================

    /// Load a previously stored pair. An unreadable pair is discarded; a pair
    /// whose access token is inside the safety margin is renewed right away.
    pub async fn restore(&self) -> Option<Identity> {
        let pair = match self.store.load() {
            Ok(Some(pair)) => pair,
            Ok(None) => return None,
            Err(e) => {
                warn!(error = %e, "Stored credentials are unreadable, discarding");
                self.logout();
                return None;
            }
        };

        let identity = match Identity::from_access_token(&pair.access) {
            Ok(identity) => identity,
            Err(e) => {
                warn!(error = %e, "Stored access token is unreadable, discarding");
                self.logout();
                return None;
            }
        };

        let near_expiry = identity.expires_within(self.settings.safety_margin, Utc::now());
        debug!(user_id = identity.user_id, near_expiry, "Restored stored session");
        self.install(pair, identity, None);
        self.start_refresh_timer();

        if near_expiry {
            if let Err(e) = self.refresh().await {
                info!(error = %e, "Stored session could not be renewed");
                return None;
            }
        }
        self.identity()
    }

    /// Exchange credentials for a token pair. On failure nothing changes.
    pub async fn login(&self, email: &str, password: &str) -> Result<Identity, SessionError> {
        let pair = self.backend.obtain(email, password).await.map_err(|e| {
            warn!(error = %e, "Login failed");
            SessionError::from_login_failure(&e)
        })?;

        let identity = Identity::from_access_token(&pair.access).map_err(|e| {
            warn!(error = %e, "Login returned an unreadable access token");
            SessionError::Transport(format!("invalid access token: {}", e))
        })?;

        self.install(pair, identity.clone(), None);
        self.start_refresh_timer();
        info!(user_id = identity.user_id, "Logged in");
        Ok(identity)
    }

    /// Drop the session from memory and storage. Never fails.
    pub fn logout(&self) {
        self.end_session(None);
    }

    /// Renew the access token with the refresh token.
    ///
    /// Any failure of the renewal call ends the session. Results that arrive
    /// after the session changed underneath are discarded; the caller then
    /// gets whatever token is current, if any.
    pub async fn refresh(&self) -> Result<String, SessionError> {
        let (refresh_token, generation) = {
            let state = self.read_state();
            (
                state.credentials.as_ref().map(|c| c.refresh.clone()),
                state.generation,
            )
        };

        let Some(refresh_token) = refresh_token else {
            debug!("Refresh requested without a session");
            self.logout();
            return Err(SessionError::NotAuthenticated);
        };

        let outcome = self
            .backend
            .renew(&refresh_token)
            .await
            .map_err(|e| e.to_string())
            .and_then(|renewed| {
                let identity = Identity::from_access_token(&renewed.access)
                    .map_err(|e| format!("invalid access token: {}", e))?;
                let pair = CredentialPair {
                    access: renewed.access,
                    refresh: renewed.refresh.unwrap_or(refresh_token),
                };
                Ok((pair, identity))
            });

        match outcome {
            Ok((pair, identity)) => {
                let access = pair.access.clone();
                let user_id = identity.user_id;
                if self.install(pair, identity, Some(generation)) {
                    debug!(user_id, "Access token renewed");
                    Ok(access)
                } else {
                    debug!("Discarding stale refresh result");
                    self.access_token().ok_or(SessionError::NotAuthenticated)
                }
            }
            Err(reason) => {
                if self.end_session(Some(generation)) {
                    warn!(error = %reason, "Token refresh failed, session ended");
                    Err(SessionError::SessionExpired(reason))
                } else {
                    debug!(error = %reason, "Ignoring failure of a stale refresh");
                    self.access_token().ok_or(SessionError::NotAuthenticated)
                }
            }
        }
    }

    /// Access token guaranteed to outlive the safety margin, renewing first
    /// when the current one is too close to expiry.
    pub async fn valid_access_token(&self) -> Result<String, SessionError> {
        let current = {
            let state = self.read_state();
            match (&state.credentials, &state.identity) {
                (Some(pair), Some(identity)) => Some((pair.access.clone(), identity.clone())),
                _ => None,
            }
        };
        let (token, identity) = current.ok_or(SessionError::NotAuthenticated)?;

        if !identity.expires_within(self.settings.safety_margin, Utc::now()) {
            return Ok(token);
        }

        debug!(user_id = identity.user_id, "Access token inside safety margin, renewing");
        let renewed = self.refresh().await?;
        let generation = self.read_state().generation;
        match Identity::from_access_token(&renewed) {
            Ok(fresh) if !fresh.expires_within(self.settings.safety_margin, Utc::now()) => {
                Ok(renewed)
            }
            _ => {
                let reason = "renewed access token expires within the safety margin".to_string();
                if self.end_session(Some(generation)) {
                    warn!(error = %reason, "Session ended");
                }
                Err(SessionError::SessionExpired(reason))
            }
        }
    }

    // =========================================================================
    // Proactive refresh timer
    // =========================================================================

    /// Schedule the recurring background refresh, replacing any previous timer.
    pub fn start_refresh_timer(&self) {
        if !self.settings.proactive_refresh {
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("No async runtime available, proactive refresh disabled");
            return;
        };

        let weak = self.this.clone();
        let period = self.settings.refresh_interval;
        let handle = runtime.spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(manager) = weak.upgrade() else {
                    break;
                };
                if !manager.is_authenticated() {
                    continue;
                }
                if let Err(e) = manager.refresh().await {
                    debug!(error = %e, "Proactive refresh failed");
                }
            }
        });

        let mut timer = self.timer.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = timer.replace(handle) {
            previous.abort();
        }
    }

    fn stop_refresh_timer(&self) {
        let mut timer = self.timer.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(handle) = timer.take() {
            handle.abort();
        }
    }

    // =========================================================================
    // State transitions
    // =========================================================================

    /// Install a pair and its identity. With `expected`, nothing happens
    /// unless the state is still at that generation.
    fn install(&self, pair: CredentialPair, identity: Identity, expected: Option<u64>) -> bool {
        {
            let mut state = self.write_state();
            if expected.is_some_and(|g| g != state.generation) {
                return false;
            }
            if let Err(e) = self.store.save(&pair) {
                warn!(error = %e, "Failed to persist credentials");
            }
            state.credentials = Some(pair);
            state.identity = Some(identity.clone());
            state.generation += 1;
        }
        self.identity_tx.send_replace(Some(identity));
        true
    }

    /// Clear the session. With `expected`, nothing happens unless the state
    /// is still at that generation.
    fn end_session(&self, expected: Option<u64>) -> bool {
        {
            let mut state = self.write_state();
            if expected.is_some_and(|g| g != state.generation) {
                return false;
            }
            if let Err(e) = self.store.clear() {
                warn!(error = %e, "Failed to clear stored credentials");
            }
            let had_session = state.credentials.take().is_some();
            state.identity = None;
            state.generation += 1;
            if had_session {
                info!("Session ended");
            }
        }
        self.stop_refresh_timer();
        self.identity_tx.send_replace(None);
        true
    }

    fn read_state(&self) -> RwLockReadGuard<'_, SessionState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, SessionState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        if let Ok(mut timer) = self.timer.lock() {
            if let Some(handle) = timer.take() {
                handle.abort();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = SessionSettings::default();
        assert_eq!(settings.safety_margin, Duration::minutes(2));
        assert_eq!(settings.refresh_interval, StdDuration::from_secs(4 * 60));
        assert!(settings.proactive_refresh);
    }
}
