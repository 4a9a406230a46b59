// `idox shared`: open a shared document as a visitor.

use clap::Args;
use idox_common::metrics::{calculate_metrics, DocumentMetrics};
use idox_editor::error::EditorError;
use idox_editor::service::SharedView;
use serde::Serialize;
use uuid::Uuid;

use super::{block_on, failed, GlobalArgs};
use crate::context::EditorContext;
use crate::output;

const EMPTY_PLACEHOLDER: &str = "<p>This document appears to be empty.</p>";

#[derive(Debug, Args)]
pub struct SharedArgs {
    /// Share code from the link (`.../share/<code>`).
    pub code: String,

    /// Password for protected documents.
    #[arg(long)]
    password: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SharedResult {
    Ready { id: Uuid, title: String, html: String, metrics: DocumentMetrics },
    NotFound,
    PasswordRequired,
    InvalidPassword,
}

impl From<SharedView> for SharedResult {
    fn from(view: SharedView) -> Self {
        match view {
            SharedView::Ready(document) => {
                let metrics = calculate_metrics(document.html());
                let html = if document.html().trim().is_empty() {
                    EMPTY_PLACEHOLDER.to_string()
                } else {
                    document.content.html
                };
                Self::Ready { id: document.id, title: document.title, html, metrics }
            }
            SharedView::NotFound => Self::NotFound,
            SharedView::PasswordRequired => Self::PasswordRequired,
            SharedView::InvalidPassword => Self::InvalidPassword,
        }
    }
}

pub fn run(args: SharedArgs, global: &GlobalArgs) -> anyhow::Result<()> {
    let format = global.format();
    let ctx = EditorContext::load(global.config.as_deref())?;
    let view = block_on(ctx.service().open_shared(&args.code, args.password.as_deref()))?
        .map_err(|e| failed("Failed to open shared document", e))?;

    if let Some(notice) = view.notice() {
        output::print_notice(format, &notice);
    }
    let failure = match &view {
        SharedView::Ready(_) => None,
        SharedView::NotFound => Some(EditorError::not_found("shared document")),
        SharedView::PasswordRequired => Some(EditorError::PasswordRequired),
        SharedView::InvalidPassword => Some(EditorError::InvalidPassword),
    };

    let result = SharedResult::from(view);
    output::print_output(format, &result, format_human)?;
    match failure {
        Some(error) => Err(error.into()),
        None => Ok(()),
    }
}

fn format_human(result: &SharedResult) -> String {
    match result {
        SharedResult::Ready { title, html, metrics, .. } => format!(
            "{title} (Shared, read-only, {} words)\n\n{html}",
            metrics.word_count
        ),
        SharedResult::NotFound => {
            "The shared document you're looking for doesn't exist or is no longer available.".into()
        }
        SharedResult::PasswordRequired => "This document is password protected. Pass --password.".into(),
        SharedResult::InvalidPassword => "Incorrect password.".into(),
    }
}
