// `idox share`: publish a document and print its share link.

use clap::Args;
use idox_common::types::ShareResponse;
use idox_editor::error::{EditorError, Notice};
use idox_editor::service::share_link_notice;
use serde::Serialize;
use uuid::Uuid;

use super::{block_on, failed, GlobalArgs};
use crate::context::EditorContext;
use crate::output;

#[derive(Debug, Args)]
pub struct ShareArgs {
    /// Document id.
    pub id: Uuid,

    /// Require this password to open the shared document.
    #[arg(long, conflicts_with = "clear_password")]
    password: Option<String>,

    /// Remove an existing share password.
    #[arg(long)]
    clear_password: bool,
}

#[derive(Debug, Serialize)]
pub struct ShareResult {
    #[serde(flatten)]
    pub share: ShareResponse,
    pub password_protected: bool,
    pub notice: Notice,
}

pub fn run(args: ShareArgs, global: &GlobalArgs) -> anyhow::Result<()> {
    let format = global.format();
    let ctx = EditorContext::load(global.config.as_deref())?;
    let service = ctx.service();

    let outcome = block_on(async {
        let share = service.generate_share_link(args.id).await;
        let notice = share_link_notice(&share);
        let share = share?;
        let document = match (&args.password, args.clear_password) {
            (Some(password), _) => Some(service.set_password(args.id, password).await?),
            (None, true) => Some(service.clear_password(args.id).await?),
            (None, false) => None,
        };
        let password_protected = match document {
            Some(document) => document.is_password_protected(),
            None => service.get_document(args.id).await?.is_password_protected(),
        };
        Ok::<_, EditorError>(ShareResult { share, password_protected, notice })
    })?;
    let result = outcome.map_err(|e| failed("Failed to generate share link", e))?;

    output::print_notice(format, &result.notice);
    output::print_output(format, &result, format_human)?;
    Ok(())
}

fn format_human(result: &ShareResult) -> String {
    let lock = if result.password_protected { " (password protected)" } else { "" };
    format!("{}{}", result.share.share_link, lock)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_flattens_share_response() {
        let result = ShareResult {
            share: ShareResponse {
                share_link: "http://localhost:8080/share/abc".into(),
                share_code: "abc".into(),
            },
            password_protected: true,
            notice: Notice::info("Share link generated", ""),
        };
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["share_code"], "abc");
        assert_eq!(value["notice"]["title"], "Share link generated");
        assert_eq!(format_human(&result), "http://localhost:8080/share/abc (password protected)");
    }
}
