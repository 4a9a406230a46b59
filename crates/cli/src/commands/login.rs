// `idox login` / `idox logout`: store or forget the hosted sign-in.

use clap::Args;
use idox_editor::config::{AuthConfig, EditorConfig};
use idox_editor::error::EditorError;
use serde::Serialize;
use tracing::info;

use super::GlobalArgs;
use crate::context::{load_config, save_config};
use crate::output;

#[derive(Debug, Args)]
pub struct LoginArgs {
    /// Backend user id.
    #[arg(long)]
    user_id: String,

    #[arg(long)]
    email: Option<String>,

    /// Access token issued by the auth service.
    #[arg(long)]
    token: Option<String>,
}

#[derive(Debug, Args)]
pub struct LogoutArgs {}

#[derive(Debug, Serialize)]
pub struct LoginResult {
    pub signed_in: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

pub fn run_login(args: LoginArgs, global: &GlobalArgs) -> anyhow::Result<()> {
    let mut config = load_config(global.config.as_deref())?;
    apply_login(&mut config, args)?;
    save_config(&config, global.config.as_deref())?;
    info!(user_id = ?config.auth.user_id, "stored sign-in");

    let result = LoginResult {
        signed_in: true,
        user_id: config.auth.user_id.clone(),
        email: config.auth.email.clone(),
    };
    output::print_output(global.format(), &result, |r| {
        format!("Signed in as {}", r.email.as_deref().or(r.user_id.as_deref()).unwrap_or_default())
    })?;
    Ok(())
}

pub fn run_logout(_args: LogoutArgs, global: &GlobalArgs) -> anyhow::Result<()> {
    let mut config = load_config(global.config.as_deref())?;
    let was_signed_in = config.auth.user_id.is_some();
    config.auth = AuthConfig::default();
    save_config(&config, global.config.as_deref())?;
    if was_signed_in {
        info!("cleared stored sign-in");
    }

    let result = LoginResult { signed_in: false, user_id: None, email: None };
    output::print_output(global.format(), &result, |_| "Signed out".to_string())?;
    Ok(())
}

fn apply_login(config: &mut EditorConfig, args: LoginArgs) -> Result<(), EditorError> {
    let user_id = args.user_id.trim();
    if user_id.is_empty() {
        return Err(EditorError::validation("user id is required"));
    }
    let email = args.email.map(|e| e.trim().to_string()).filter(|e| !e.is_empty());
    if let Some(email) = &email {
        if !email.contains('@') {
            return Err(EditorError::validation(format!("invalid email address: {email}")));
        }
    }
    config.auth = AuthConfig {
        user_id: Some(user_id.to_string()),
        email,
        access_token: args.token.filter(|t| !t.is_empty()),
    };
    Ok(())
}
