use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::api::{ApiError, RemoteApi};
use crate::task::Credentials;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionState {
    pub authenticated: bool,
    pub loading: bool,
}

impl SessionState {
    /// Unauthenticated and loading until the startup probe settles.
    pub fn initial() -> Self {
        Self {
            authenticated: false,
            loading: true,
        }
    }
}

/// Client-observed authentication state. The actual credential is a cookie
/// owned by the API client; only the boolean lives here.
pub struct Session {
    api: Arc<dyn RemoteApi>,
    state: Mutex<SessionState>,
}

impl Session {
    pub fn new(api: Arc<dyn RemoteApi>) -> Self {
        Self {
            api,
            state: Mutex::new(SessionState::initial()),
        }
    }

    pub fn state(&self) -> SessionState {
        *self.state.lock()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.lock().authenticated
    }

    pub fn is_loading(&self) -> bool {
        self.state.lock().loading
    }

    /// Startup probe. A failed probe means "not logged in", never an
    /// application error.
    #[instrument(skip(self))]
    pub async fn check_session(&self) -> bool {
        let result = self.api.whoami().await;

        let authenticated = match result {
            Ok(()) => true,
            Err(err) if err.is_unauthorized() => {
                debug!("session probe: not logged in");
                false
            }
            Err(err) => {
                warn!(error = %err, "session probe failed");
                false
            }
        };

        self.settle(authenticated);
        info!(authenticated, "session resolved");
        authenticated
    }

    #[instrument(skip(self, credentials), fields(email = %credentials.email))]
    pub async fn login(&self, credentials: &Credentials) -> Result<(), ApiError> {
        self.begin();
        let result = self.api.login(credentials).await;
        self.settle(result.is_ok());

        match &result {
            Ok(()) => info!("logged in"),
            Err(err) => warn!(error = %err, "login failed"),
        }
        result
    }

    /// The session ends locally whatever the API answers.
    #[instrument(skip(self))]
    pub async fn logout(&self) -> Result<(), ApiError> {
        self.begin();
        let result = self.api.logout().await;
        self.settle(false);

        if let Err(err) = &result {
            warn!(error = %err, "logout call failed; session cleared anyway");
        } else {
            info!("logged out");
        }
        result
    }

    /// Creates an account. Does not log in.
    #[instrument(skip(self, credentials), fields(email = %credentials.email))]
    pub async fn register(&self, credentials: &Credentials) -> Result<(), ApiError> {
        let result = self.api.register(credentials).await;
        match &result {
            Ok(()) => info!("account registered"),
            Err(err) => warn!(error = %err, "registration failed"),
        }
        result
    }

    /// Drops the flag after the API refused a call for lack of a session.
    pub fn expire(&self) {
        if self.is_authenticated() {
            info!("session expired");
        }
        self.settle(false);
    }

    fn begin(&self) {
        self.state.lock().loading = true;
    }

    fn settle(&self, authenticated: bool) {
        let mut state = self.state.lock();
        state.authenticated = authenticated;
        state.loading = false;
    }
}
