//! Reactive session state shared by everything that renders or gates views.
//!
//! `SessionContext` owns the published `SessionState` and is the only place
//! it changes. It is seeded from the token store without any network I/O, so
//! a stored token that the server has since revoked is trusted until the
//! first authorized call comes back 401. That call clears the token inside
//! `AuthService`, which emits `SessionEvent::Expired`; the listener started
//! by `spawn_event_listener` then re-reads the store.

pub mod state;

use std::sync::{Arc, Mutex, MutexGuard, Weak};

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::api::{AuthError, AuthService, LoginSuccess, SessionEvent};
use crate::auth::{TokenStore, User};

pub use state::{SessionPhase, SessionState};

pub struct SessionContext {
    auth: Arc<AuthService>,
    state: watch::Sender<SessionState>,
    /// Bumped by every sign-in attempt and explicit logout; a sign-in
    /// result only lands if the generation it started under is current.
    /// Held while a result is committed so a logout cannot interleave.
    generation: Mutex<u64>,
}

impl SessionContext {
    pub fn new(auth: Arc<AuthService>) -> Self {
        let initial = Self::read_store(auth.token_store());
        info!(phase = ?initial.phase(), "Session initialized from stored token");
        let (state, _) = watch::channel(initial);

        Self {
            auth,
            state,
            generation: Mutex::new(0),
        }
    }

    fn read_store(store: &TokenStore) -> SessionState {
        if !store.is_valid() {
            return SessionState::anonymous();
        }
        store
            .current_user()
            .map(SessionState::authenticated)
            .unwrap_or_else(SessionState::anonymous)
    }

    pub fn auth(&self) -> &Arc<AuthService> {
        &self.auth
    }

    /// Snapshot of the current state
    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().is_authenticated
    }

    pub fn user(&self) -> Option<User> {
        self.state.borrow().user.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    // ========================================================================
    // Transitions
    // ========================================================================

    pub async fn login(&self, username: &str, password: &str) -> Result<User, AuthError> {
        let generation = self.begin_sign_in()?;
        let result = self.auth.fetch_login(username, password).await;
        self.finish_sign_in(generation, result)
    }

    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<User, AuthError> {
        let generation = self.begin_sign_in()?;
        let result = self.auth.fetch_registration(username, email, password).await;
        self.finish_sign_in(generation, result)
    }

    fn generation(&self) -> MutexGuard<'_, u64> {
        // A poisoned counter is still a valid counter
        self.generation.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Enter Authenticating. Fails with `Busy` if a sign-in is already running.
    fn begin_sign_in(&self) -> Result<u64, AuthError> {
        let mut started = false;
        self.state.send_if_modified(|state| {
            if state.loading {
                return false;
            }
            state.loading = true;
            started = true;
            true
        });

        if !started {
            debug!("Rejecting sign-in while another is in flight");
            return Err(AuthError::Busy);
        }
        let mut generation = self.generation();
        *generation += 1;
        Ok(*generation)
    }

    /// Persist and publish a fetched sign-in, unless a logout or newer
    /// sign-in happened since it started. A stale result never reaches the
    /// token store.
    fn finish_sign_in(
        &self,
        started: u64,
        result: Result<LoginSuccess, AuthError>,
    ) -> Result<User, AuthError> {
        let generation = self.generation();
        if *generation != started {
            debug!("Discarding superseded sign-in result");
            return Err(AuthError::Superseded);
        }

        let committed = result.and_then(|success| {
            self.auth.commit_sign_in(&success)?;
            Ok(success.user)
        });
        match committed {
            Ok(user) => {
                self.state
                    .send_replace(SessionState::authenticated(user.clone()));
                Ok(user)
            }
            Err(e) => {
                self.state.send_replace(SessionState::anonymous());
                Err(e)
            }
        }
    }

    pub fn logout(&self) {
        let mut generation = self.generation();
        *generation += 1;
        self.auth.logout();
        self.state.send_replace(SessionState::anonymous());
    }

    /// Re-derive the state from the token store.
    ///
    /// Skipped while a sign-in is in flight; its result settles the state.
    pub fn resync(&self) {
        let fresh = Self::read_store(self.auth.token_store());
        self.state.send_if_modified(|state| {
            if state.loading || *state == fresh {
                return false;
            }
            info!(phase = ?fresh.phase(), "Session state re-synced from token store");
            *state = fresh;
            true
        });
    }

    pub fn handle_event(&self, event: &SessionEvent) {
        match event {
            SessionEvent::Expired | SessionEvent::LoggedOut => self.resync(),
            // Sign-ins started here are applied by `finish_sign_in`
            SessionEvent::LoggedIn(_) => {}
        }
    }

    /// Follow `AuthService` session events for as long as this context lives.
    ///
    /// The subscription is taken before returning, so no event emitted after
    /// this call is missed.
    pub fn spawn_event_listener(self: &Arc<Self>) -> JoinHandle<()> {
        let events = self.auth.subscribe();
        let context = Arc::downgrade(self);
        tokio::spawn(Self::listen(context, events))
    }

    async fn listen(context: Weak<Self>, mut events: broadcast::Receiver<SessionEvent>) {
        loop {
            let event = events.recv().await;
            let Some(context) = context.upgrade() else {
                break;
            };
            match event {
                Ok(event) => context.handle_event(&event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Session events lagged, re-syncing");
                    context.resync();
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
        debug!("Session event listener stopped");
    }
}

impl std::fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionContext")
            .field("state", &*self.state.borrow())
            .field("generation", &*self.generation())
            .finish()
    }
}
