// `idox invite`: add a collaborator to a document by email.

use clap::Args;
use idox_common::types::{Collaborator, Permission};
use idox_editor::error::Notice;
use idox_editor::service::invite_notice;
use serde::Serialize;
use uuid::Uuid;

use super::{block_on, failed, GlobalArgs};
use crate::context::EditorContext;
use crate::output;

#[derive(Debug, Args)]
pub struct InviteArgs {
    /// Document id.
    pub id: Uuid,

    /// Email address of the user to invite.
    pub email: String,

    /// Access level: view, edit or admin.
    #[arg(long, default_value = "edit")]
    permission: Permission,
}

#[derive(Debug, Serialize)]
pub struct InviteResult {
    pub collaborator: Collaborator,
    pub notice: Notice,
}

pub fn run(args: InviteArgs, global: &GlobalArgs) -> anyhow::Result<()> {
    let format = global.format();
    let ctx = EditorContext::load(global.config.as_deref())?;

    let outcome = block_on(ctx.service().add_collaborator(args.id, &args.email, args.permission))?;
    let notice = invite_notice(args.email.trim(), &outcome);
    let collaborator = outcome.map_err(|e| failed("Failed to invite collaborator", e))?;

    let result = InviteResult { collaborator, notice };
    output::print_notice(format, &result.notice);
    output::print_output(format, &result, |r| {
        format!(
            "{} ({})",
            r.collaborator.username.as_deref().unwrap_or(args.email.trim()),
            r.collaborator.permission
        )
    })?;
    Ok(())
}
