//! Route-level authorization gating.
//!
//! The guard is a pure function of [`SessionState`]: it performs no I/O and
//! does not look at the authorization predicate until bootstrap has resolved,
//! so a returning user is never bounced to the login screen while their
//! session is still being restored.

use crate::manager::SessionState;

/// Outcome of guarding a subtree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Guarded<V, R> {
    /// Bootstrap has not resolved; render nothing and do not redirect.
    Pending,
    /// Navigation is not allowed; go to the target instead.
    Redirect(R),
    /// Navigation is allowed; the rendered subtree.
    Render(V),
}

impl<V, R> Guarded<V, R> {
    /// True while the session is still being restored.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }

    /// Redirect target, when the guard denied access.
    #[must_use]
    pub fn redirect_target(&self) -> Option<&R> {
        match self {
            Self::Redirect(target) => Some(target),
            _ => None,
        }
    }

    /// The rendered subtree, when the guard allowed access.
    #[must_use]
    pub fn into_content(self) -> Option<V> {
        match self {
            Self::Render(content) => Some(content),
            _ => None,
        }
    }
}

/// Gate for a navigation subtree with a fixed redirect target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationGuard<R> {
    redirect_to: R,
}

impl<R: Clone> AuthorizationGuard<R> {
    /// Guard redirecting to `redirect_to` when access is denied.
    #[must_use]
    pub fn new(redirect_to: R) -> Self {
        Self { redirect_to }
    }

    /// Where denied navigation is sent.
    #[must_use]
    pub fn redirect_target(&self) -> &R {
        &self.redirect_to
    }

    /// Decide without building a subtree.
    #[must_use]
    pub fn decide<P>(&self, state: &SessionState, allowed: P) -> Guarded<(), R>
    where
        P: FnOnce(&SessionState) -> bool,
    {
        self.render(state, allowed, || ())
    }

    /// Build `subtree` only when `allowed` holds for an initialized session.
    #[must_use]
    pub fn render<P, S, V>(&self, state: &SessionState, allowed: P, subtree: S) -> Guarded<V, R>
    where
        P: FnOnce(&SessionState) -> bool,
        S: FnOnce() -> V,
    {
        if !state.initialized {
            return Guarded::Pending;
        }
        if allowed(state) {
            Guarded::Render(subtree())
        } else {
            Guarded::Redirect(self.redirect_to.clone())
        }
    }
}

/// Allows any signed-in user.
#[must_use]
pub fn is_authenticated(state: &SessionState) -> bool {
    state.is_authenticated()
}

/// Allows signed-in users whose role is admin.
#[must_use]
pub fn is_admin(state: &SessionState) -> bool {
    state.is_authenticated() && state.is_admin()
}

/// Allows only signed-out visitors, e.g. for the login screen.
#[must_use]
pub fn is_anonymous(state: &SessionState) -> bool {
    !state.is_authenticated()
}
