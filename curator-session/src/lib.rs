//! Session and authorization core for the Curator front end.
//!
//! - [`token_store`] persists the access/refresh token pair.
//! - [`api`] issues authenticated requests with one-shot refresh-and-retry.
//! - [`manager`] owns the session state: bootstrap, login, logout, profile refresh.
//! - [`guard`] gates navigation on that state.
//! - [`projection`] gives screens a `{data, loading, error}` view of async calls.

pub mod api;
pub mod endpoints;
pub mod error;
pub mod guard;
pub mod manager;
pub mod projection;
pub mod token_store;

pub use api::ApiClient;
pub use endpoints::AvatarUpload;
pub use error::{ErrorMessage, SessionError, SessionResult, StorageError};
pub use guard::{AuthorizationGuard, Guarded};
pub use manager::{SessionManager, SessionPhase, SessionState};
pub use projection::{Projection, ProjectionState};
pub use token_store::{FileTokenStore, MemoryTokenStore, StoredTokens, TokenStore};
