//! Account management: registration, profile, password and avatar.

use std::path::Path;

use anyhow::{Context, Result, bail};
use clap::{Args, Subcommand};
use rpassword::prompt_password;
use session::{AvatarUpload, SessionManager};
use shared::models::{ProfileUpdate, RegisterRequest, SetPasswordRequest};

use super::session::{print_user, prompt, require_session, user_facing};

/// Arguments for `curator register`.
#[derive(Args, Debug)]
pub struct RegisterArgs {
    /// Given name
    #[arg(long)]
    pub first_name: String,
    /// Family name
    #[arg(long)]
    pub last_name: String,
    /// Account email; prompted for when omitted
    #[arg(long, short)]
    pub email: Option<String>,
    /// Contact phone number
    #[arg(long)]
    pub phone: Option<String>,
}

/// Arguments for `curator profile`; only the given fields change.
#[derive(Args, Debug)]
pub struct ProfileArgs {
    /// New given name
    #[arg(long)]
    pub first_name: Option<String>,
    /// New family name
    #[arg(long)]
    pub last_name: Option<String>,
    /// New login email
    #[arg(long)]
    pub email: Option<String>,
    /// New contact phone number
    #[arg(long)]
    pub phone: Option<String>,
}

/// `curator password` subcommands.
#[derive(Subcommand, Debug)]
pub enum PasswordCommand {
    /// Change the password of the signed-in account
    Change,
    /// Email a password reset link
    Reset {
        /// Account email; prompted for when omitted
        #[arg(long, short)]
        email: Option<String>,
    },
}

/// Create an account from `args`, prompting for the password twice.
///
/// # Errors
/// Returns an error when a prompt fails or the backend rejects the request.
pub async fn register(manager: &SessionManager, args: RegisterArgs) -> Result<()> {
    let email = match args.email {
        Some(email) => email,
        None => prompt("Email: ")?,
    };
    let password = prompt_password("Password: ")?;
    let re_password = prompt_password("Repeat password: ")?;
    if password.is_empty() {
        bail!("password must not be empty");
    }

    let request = RegisterRequest {
        first_name: args.first_name,
        last_name: args.last_name,
        email,
        phone_number: args.phone,
        password,
        re_password,
    };
    let user = manager.register(&request).await.map_err(user_facing)?;
    println!("Registered {} (id {}); run `curator login` to sign in", user.email, user.id);
    Ok(())
}

/// Apply a partial profile update to the signed-in account.
///
/// # Errors
/// Returns an error when no field is given, nobody is signed in, or the update is rejected.
pub async fn update_profile(manager: &SessionManager, args: ProfileArgs) -> Result<()> {
    let update = ProfileUpdate {
        first_name: args.first_name,
        last_name: args.last_name,
        email: args.email,
        phone_number: args.phone,
    };
    if update.is_empty() {
        bail!("nothing to update; pass at least one of --first-name, --last-name, --email, --phone");
    }
    require_session(manager).await?;

    let user = manager
        .update_profile(&update)
        .await
        .map_err(user_facing)?;
    print_user(manager, &user);
    Ok(())
}

/// Change the current password or request a reset email.
///
/// # Errors
/// Returns an error when a prompt fails or the backend rejects the request.
pub async fn password(manager: &SessionManager, command: PasswordCommand) -> Result<()> {
    match command {
        PasswordCommand::Change => {
            require_session(manager).await?;
            let request = SetPasswordRequest {
                current_password: prompt_password("Current password: ")?,
                new_password: prompt_password("New password: ")?,
                re_new_password: prompt_password("Repeat new password: ")?,
            };
            manager
                .change_password(&request)
                .await
                .map_err(user_facing)?;
            println!("Password changed");
        }
        PasswordCommand::Reset { email } => {
            let email = match email {
                Some(email) => email,
                None => prompt("Email: ")?,
            };
            manager
                .request_password_reset(&email)
                .await
                .map_err(user_facing)?;
            println!("If {email} has an account, a reset link is on its way");
        }
    }
    Ok(())
}

/// Upload the image at `path` as the signed-in account's avatar.
///
/// # Errors
/// Returns an error when the file cannot be read or the upload is rejected.
pub async fn upload_avatar(manager: &SessionManager, path: &Path) -> Result<()> {
    let upload = AvatarUpload::from_path(path)
        .with_context(|| format!("failed to read avatar image {}", path.display()))?;
    require_session(manager).await?;

    let user = manager
        .upload_avatar(&upload)
        .await
        .map_err(user_facing)?;
    print_user(manager, &user);
    Ok(())
}
