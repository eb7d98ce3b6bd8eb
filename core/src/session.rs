//! Session lifecycle: who is signed in, and where the UI should be.
//!
//! # Design
//! `Session` is an ordinary value built from an `ApiClient` and a
//! `Navigator`; nothing about it is global, so tests (or two accounts) can
//! hold independent instances. State moves
//! `Initializing -> Unauthenticated <-> Authenticated`. Token persistence
//! lives in the client; the session only tracks the user and drives
//! redirects.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info, warn};

use crate::client::ApiClient;
use crate::error::ApiError;
use crate::types::{AuthResponse, RegisterRequest, User};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Initializing,
    Unauthenticated,
    Authenticated(User),
}

/// Top-level surfaces the session redirects between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// The signed-in application.
    Main,
    /// The sign-in / sign-up screens.
    Login,
}

/// Host hook for redirects. Called after the state change is visible.
pub trait Navigator: Send + Sync {
    fn replace(&self, route: Route);
}

/// Navigator for hosts without routing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNavigator;

impl Navigator for NoopNavigator {
    fn replace(&self, _route: Route) {}
}

struct Inner {
    state: SessionState,
    loading: bool,
}

pub struct Session {
    client: ApiClient,
    navigator: Arc<dyn Navigator>,
    inner: Mutex<Inner>,
}

impl Session {
    pub fn new(client: ApiClient, navigator: Arc<dyn Navigator>) -> Self {
        Self {
            client,
            navigator,
            inner: Mutex::new(Inner {
                state: SessionState::Initializing,
                loading: true,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Leaves `Initializing`.
    ///
    /// The backend has no "current user" endpoint, so a stored token cannot
    /// be turned back into a user and every start lands in
    /// `Unauthenticated`. The token is left in place.
    pub fn restore(&self) {
        if self.lock().state != SessionState::Initializing {
            return;
        }
        match self.client.stored_token() {
            Ok(Some(_)) => info!("stored session token found but cannot be restored; starting signed out"),
            Ok(None) => debug!("no stored session token"),
            Err(e) => warn!(error = %e, "could not read stored session token"),
        }
        let mut inner = self.lock();
        inner.state = SessionState::Unauthenticated;
        inner.loading = false;
    }

    pub fn state(&self) -> SessionState {
        self.lock().state.clone()
    }

    pub fn user(&self) -> Option<User> {
        match &self.lock().state {
            SessionState::Authenticated(user) => Some(user.clone()),
            _ => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self.lock().state, SessionState::Authenticated(_))
    }

    /// True while a transition is in flight. Overlapping transitions are not
    /// rejected here; the UI is expected to disable submission.
    pub fn is_loading(&self) -> bool {
        self.lock().loading
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    pub fn sign_in(&self, identifier: &str, password: &str) -> Result<User, ApiError> {
        self.authenticate("sign in", || self.client.login(identifier, password))
    }

    pub fn sign_up(&self, request: &RegisterRequest) -> Result<User, ApiError> {
        self.authenticate("sign up", || self.client.register(request))
    }

    fn authenticate(
        &self,
        action: &str,
        call: impl FnOnce() -> Result<AuthResponse, ApiError>,
    ) -> Result<User, ApiError> {
        self.lock().loading = true;
        let result = call();

        let mut inner = self.lock();
        inner.loading = false;
        match result {
            Ok(auth) => {
                inner.state = SessionState::Authenticated(auth.user.clone());
                drop(inner);
                info!(user_id = auth.user.id, "{action} succeeded");
                self.navigator.replace(Route::Main);
                Ok(auth.user)
            }
            Err(e) => {
                drop(inner);
                warn!(error = %e, "{action} failed");
                Err(e)
            }
        }
    }

    /// Clears the stored token and the current user, then redirects to login.
    ///
    /// The session always ends up `Unauthenticated`; a token-store failure is
    /// still reported.
    pub fn sign_out(&self) -> Result<(), ApiError> {
        self.lock().loading = true;
        let result = self.client.logout();
        {
            let mut inner = self.lock();
            inner.state = SessionState::Unauthenticated;
            inner.loading = false;
        }
        match &result {
            Ok(()) => info!("signed out"),
            Err(e) => warn!(error = %e, "signed out but token could not be removed"),
        }
        self.navigator.replace(Route::Login);
        result
    }
}
