//! Sign-in, sign-out and session inspection commands.

use std::{
    io::{self, Write},
    path::Path,
    sync::Arc,
};

use anyhow::{Context, Result, bail};
use session::{FileTokenStore, SessionError, SessionManager, TokenStore};
use shared::{config::ClientConfig, models::User};

/// Build a session manager whose tokens live in the configured file.
///
/// # Errors
/// Returns an error when the HTTP client cannot be built.
pub fn build_manager(config: &ClientConfig) -> Result<SessionManager> {
    let store: Arc<dyn TokenStore> = Arc::new(FileTokenStore::new(config.resolved_token_path()));
    SessionManager::from_config(config, store).context("failed to build API client")
}

/// Wrap a session error so the user-facing message leads the report.
pub fn user_facing(err: SessionError) -> anyhow::Error {
    let message = err.message();
    anyhow::Error::new(err).context(message)
}

/// Sign in with `email` (prompted for when absent) and a prompted password.
///
/// # Errors
/// Returns an error when a prompt fails or the credentials are rejected.
pub async fn login(manager: &SessionManager, token_path: &Path, email: Option<String>) -> Result<()> {
    let email = match email {
        Some(email) => email,
        None => prompt("Email: ")?,
    };
    let password = rpassword::prompt_password("Password: ")?;
    if password.trim().is_empty() {
        bail!("password must not be empty");
    }

    let user = manager
        .login(&email, &password)
        .await
        .map_err(user_facing)?;
    print_user(manager, &user);
    println!("tokens stored at {}", token_path.display());
    Ok(())
}

/// Print the signed-in user.
///
/// # Errors
/// Returns an error when nobody is signed in.
pub async fn me(manager: &SessionManager) -> Result<()> {
    let user = require_session(manager).await?;
    print_user(manager, &user);
    Ok(())
}

/// Sign out and remove the stored tokens.
pub fn logout(manager: &SessionManager, token_path: &Path) {
    manager.logout();
    println!("Signed out; removed tokens at {}", token_path.display());
}

/// Exchange the stored refresh token for a new access token.
///
/// # Errors
/// Returns an error when no refresh token is stored or the exchange is rejected.
pub async fn refresh(manager: &SessionManager) -> Result<()> {
    manager
        .api()
        .refresh_access_token()
        .await
        .map_err(user_facing)?;
    println!("Access token refreshed");
    Ok(())
}

/// Restore the stored session, failing when nobody is signed in.
///
/// # Errors
/// Returns an error when no session could be restored.
pub async fn require_session(manager: &SessionManager) -> Result<User> {
    if let Some(user) = manager.bootstrap().await.user {
        return Ok(user);
    }
    // Bootstrap keeps tokens it could not verify; only rejected ones are cleared.
    if manager.api().token_store().has_access_token().unwrap_or(false) {
        bail!("could not restore the stored session; the server may be unreachable, try again later");
    }
    bail!("no active session found; run `curator login` first")
}

/// Read one non-empty line from stdin after printing `message`.
///
/// # Errors
/// Returns an error when stdin cannot be read or the answer is blank.
pub fn prompt(message: &str) -> Result<String> {
    print!("{message}");
    io::stdout().flush().ok();
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    let trimmed = input.trim().to_string();
    if trimmed.is_empty() {
        bail!("input must not be empty");
    }
    Ok(trimmed)
}

/// Print the user's profile and the derived role.
pub fn print_user(manager: &SessionManager, user: &User) {
    println!("Logged in as {}", user.email);
    println!("name: {}", user.display_name());
    if let Some(phone) = &user.phone_number {
        println!("phone: {phone}");
    }
    if let Some(avatar) = &user.avatar_url {
        println!("avatar: {avatar}");
    }
    if let Some(role) = manager.snapshot().role {
        println!("role: {role} (policy: {})", manager.policy());
    }
}
