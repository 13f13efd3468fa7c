//! Owner of the in-memory session state.
//!
//! [`SessionManager`] is the only writer of [`SessionState`]. Readers take
//! snapshots or subscribe to changes; they never get a mutable handle.

use crate::api::ApiClient;
use crate::endpoints::AvatarUpload;
use crate::error::{SessionError, SessionResult, StorageError};
use crate::token_store::TokenStore;
use shared::config::ClientConfig;
use shared::models::{
    CredentialPair, ProfileUpdate, RegisterRequest, Role, RolePolicy, SetPasswordRequest, User,
};
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, AtomicU64, Ordering},
};
use reqwest::StatusCode;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Snapshot of the running session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    /// Set once the first bootstrap attempt has resolved.
    pub initialized: bool,
    /// Authenticated profile, if any.
    pub user: Option<User>,
    /// Role derived from `user`.
    pub role: Option<Role>,
    /// True while a login request is in flight.
    pub pending: bool,
}

impl SessionState {
    /// True when a user is present.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    /// True when the derived role is [`Role::Admin`].
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == Some(Role::Admin)
    }
}

/// Coarse lifecycle position of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Bootstrap has not been started.
    Uninitialized,
    /// Bootstrap is checking stored tokens.
    Restoring,
    /// Initialized with no user.
    Unauthenticated,
    /// A login request is in flight.
    Authenticating,
    /// Initialized with a user.
    Authenticated,
}

/// Orchestrates bootstrap, login, logout and profile refresh.
///
/// Each login and logout starts a new epoch. Bootstrap, login and profile
/// refresh results that resolve under an older epoch are discarded, so a
/// late response never overwrites a newer session.
#[derive(Debug)]
pub struct SessionManager {
    api: ApiClient,
    policy: RolePolicy,
    state: watch::Sender<SessionState>,
    epoch: AtomicU64,
    /// Epoch of the login that last wrote the token store.
    token_owner: Mutex<u64>,
    bootstrap_started: AtomicBool,
}

impl SessionManager {
    /// Create a manager in the `Uninitialized` phase.
    #[must_use]
    pub fn new(api: ApiClient, policy: RolePolicy) -> Self {
        Self {
            api,
            policy,
            state: watch::Sender::new(SessionState::default()),
            epoch: AtomicU64::new(0),
            token_owner: Mutex::new(0),
            bootstrap_started: AtomicBool::new(false),
        }
    }

    /// Build the API client and manager from resolved configuration.
    ///
    /// # Errors
    /// Returns an error when the HTTP client cannot be built.
    pub fn from_config(config: &ClientConfig, tokens: Arc<dyn TokenStore>) -> SessionResult<Self> {
        let api = ApiClient::from_config(config, tokens)?;
        Ok(Self::new(api, config.role_policy))
    }

    /// The API client used for session calls.
    #[must_use]
    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    /// Role derivation policy in effect.
    #[must_use]
    pub fn policy(&self) -> RolePolicy {
        self.policy
    }

    /// Latest settled state.
    #[must_use]
    pub fn snapshot(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// Receiver notified on every state change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Current lifecycle phase.
    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        let state = self.state.borrow();
        if !state.initialized {
            if self.bootstrap_started.load(Ordering::SeqCst) {
                SessionPhase::Restoring
            } else {
                SessionPhase::Uninitialized
            }
        } else if state.pending {
            SessionPhase::Authenticating
        } else if state.user.is_some() {
            SessionPhase::Authenticated
        } else {
            SessionPhase::Unauthenticated
        }
    }

    fn is_current(&self, epoch: u64) -> bool {
        self.epoch.load(Ordering::SeqCst) == epoch
    }

    fn apply_user(&self, user: Option<User>) {
        let role = Role::derive(user.as_ref(), self.policy);
        self.state.send_modify(|state| {
            state.user = user;
            state.role = role;
        });
    }

    fn is_rejection(err: &SessionError) -> bool {
        err.is_authentication() || err.status() == Some(StatusCode::UNAUTHORIZED)
    }

    fn clear_tokens(&self) {
        if let Err(err) = self.api.token_store().clear() {
            error!(error = %err, "failed to clear stored tokens");
        }
    }

    /// Restore the session from stored tokens. Runs once; later calls return
    /// the current snapshot without doing anything.
    ///
    /// Never fails: an unreadable token store counts as "no token". Stored
    /// tokens are cleared only when the server rejects them; after a network
    /// or server failure they are kept for the next attempt and the session
    /// starts signed out.
    pub async fn bootstrap(&self) -> SessionState {
        if self.bootstrap_started.swap(true, Ordering::SeqCst) {
            return self.snapshot();
        }
        let epoch = self.epoch.load(Ordering::SeqCst);

        let has_token = self.api.token_store().has_access_token().unwrap_or_else(|err| {
            warn!(error = %err, "token store unavailable during bootstrap; continuing signed out");
            false
        });

        let user = if has_token {
            match self.api.current_user().await {
                Ok(user) => {
                    info!(user_id = user.id, "session restored");
                    Some(user)
                }
                Err(err) if Self::is_rejection(&err) => {
                    warn!(error = %err, "stored session rejected; discarding stored tokens");
                    if self.is_current(epoch) {
                        self.clear_tokens();
                    }
                    None
                }
                Err(err) => {
                    warn!(error = %err, "session restore failed; keeping stored tokens");
                    None
                }
            }
        } else {
            debug!("no stored access token; starting signed out");
            None
        };

        let current = self.is_current(epoch);
        if !current {
            debug!("session changed during bootstrap; keeping newer state");
        }
        let role = Role::derive(user.as_ref(), self.policy);
        self.state.send_modify(|state| {
            if current {
                state.user = user;
                state.role = role;
            }
            state.initialized = true;
        });
        self.snapshot()
    }

    /// Sign in with email and password.
    ///
    /// # Errors
    /// Returns the API client's error unmodified; bad credentials arrive as
    /// [`SessionError::Validation`]. A login overtaken by a newer login or a
    /// logout returns [`SessionError::Cancelled`].
    pub async fn login(&self, email: &str, password: &str) -> SessionResult<User> {
        self.login_cancellable(email, password, CancellationToken::new())
            .await
    }

    /// Sign in, giving up when `cancel` fires.
    ///
    /// A cancelled login leaves the session state as it found it apart from
    /// clearing `pending`, and removes any tokens it had already stored.
    ///
    /// # Errors
    /// As [`SessionManager::login`], plus [`SessionError::Cancelled`].
    pub async fn login_cancellable(
        &self,
        email: &str,
        password: &str,
        cancel: CancellationToken,
    ) -> SessionResult<User> {
        let epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.send_modify(|state| state.pending = true);
        debug!("login started");

        let outcome = self.authenticate(email, password, epoch, &cancel).await;
        let current = self.is_current(epoch);

        match outcome {
            Ok(user) if current => {
                info!(user_id = user.id, "login succeeded");
                let role = Role::derive(Some(&user), self.policy);
                let stored = user.clone();
                self.state.send_modify(|state| {
                    state.pending = false;
                    state.user = Some(stored);
                    state.role = role;
                });
                Ok(user)
            }
            Ok(_) => {
                debug!("discarding superseded login result");
                self.release_tokens(epoch);
                Err(SessionError::Cancelled)
            }
            Err(err) => {
                self.release_tokens(epoch);
                if current {
                    self.state.send_modify(|state| state.pending = false);
                }
                warn!(error = %err, "login failed");
                Err(err)
            }
        }
    }

    async fn authenticate(
        &self,
        email: &str,
        password: &str,
        epoch: u64,
        cancel: &CancellationToken,
    ) -> SessionResult<User> {
        let pair = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(SessionError::Cancelled),
            result = self.api.create_tokens(email, password) => result?,
        };
        if cancel.is_cancelled() || !self.is_current(epoch) {
            return Err(SessionError::Cancelled);
        }
        self.store_tokens(&pair, epoch)?;

        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(SessionError::Cancelled),
            result = self.api.current_user() => result,
        }
    }

    fn store_tokens(&self, pair: &CredentialPair, epoch: u64) -> SessionResult<()> {
        let mut owner = self
            .token_owner
            .lock()
            .map_err(|_| StorageError::Unavailable("token owner lock poisoned".to_string()))?;
        self.api.token_store().set(pair)?;
        *owner = epoch;
        Ok(())
    }

    /// Remove the tokens stored by the login of `epoch`, unless a newer
    /// login has written the store since.
    fn release_tokens(&self, epoch: u64) {
        let Ok(mut owner) = self.token_owner.lock() else {
            error!("token owner lock poisoned; leaving stored tokens");
            return;
        };
        if *owner == epoch {
            debug!("discarding tokens of a login that did not complete");
            self.clear_tokens();
            *owner = 0;
        }
    }

    /// Sign out. Clears the stored tokens and the user; cannot fail.
    pub fn logout(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.clear_tokens();
        self.state.send_modify(|state| {
            state.user = None;
            state.role = None;
            state.pending = false;
        });
        info!("logged out");
    }

    /// Re-fetch the profile and replace the stored user.
    ///
    /// # Errors
    /// Returns the API client's error; the state is left untouched. Returns
    /// [`SessionError::Cancelled`] when a login or logout happened meanwhile.
    pub async fn refresh_profile(&self) -> SessionResult<User> {
        let epoch = self.epoch.load(Ordering::SeqCst);
        let user = self.api.current_user().await?;
        if !self.is_current(epoch) {
            debug!("discarding profile fetched for a previous session");
            return Err(SessionError::Cancelled);
        }
        self.apply_user(Some(user.clone()));
        Ok(user)
    }

    /// Apply a partial profile update, then refresh the stored user.
    ///
    /// # Errors
    /// See [`ApiClient::update_current_user`] and [`SessionManager::refresh_profile`].
    pub async fn update_profile(&self, update: &ProfileUpdate) -> SessionResult<User> {
        self.api.update_current_user(update).await?;
        self.refresh_profile().await
    }

    /// Upload a new avatar, then refresh the stored user.
    ///
    /// # Errors
    /// See [`ApiClient::upload_avatar`] and [`SessionManager::refresh_profile`].
    pub async fn upload_avatar(&self, upload: &AvatarUpload) -> SessionResult<User> {
        self.api.upload_avatar(upload).await?;
        self.refresh_profile().await
    }

    /// Create an account. Does not sign in.
    ///
    /// # Errors
    /// See [`ApiClient::register`].
    pub async fn register(&self, request: &RegisterRequest) -> SessionResult<User> {
        self.api.register(request).await
    }

    /// Change the password of the signed-in account.
    ///
    /// # Errors
    /// See [`ApiClient::set_password`].
    pub async fn change_password(&self, request: &SetPasswordRequest) -> SessionResult<()> {
        self.api.set_password(request).await
    }

    /// Request a password reset email.
    ///
    /// # Errors
    /// See [`ApiClient::request_password_reset`].
    pub async fn request_password_reset(&self, email: &str) -> SessionResult<()> {
        self.api.request_password_reset(email).await
    }
}
