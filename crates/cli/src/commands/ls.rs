// `idox ls`: list documents owned by the current identity.

use chrono::{DateTime, Utc};
use clap::Args;
use idox_common::metrics::calculate_metrics;
use idox_common::types::Document;
use serde::Serialize;
use uuid::Uuid;

use super::{block_on, failed, GlobalArgs};
use crate::context::EditorContext;
use crate::output;

#[derive(Debug, Args)]
pub struct LsArgs {}

#[derive(Debug, Clone, Serialize)]
pub struct LsResult {
    pub documents: Vec<DocEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DocEntry {
    pub id: Uuid,
    pub title: String,
    pub words: usize,
    pub shared: bool,
    pub updated_at: DateTime<Utc>,
}

impl From<&Document> for DocEntry {
    fn from(document: &Document) -> Self {
        Self {
            id: document.id,
            title: document.title.clone(),
            words: calculate_metrics(document.html()).word_count,
            shared: document.is_public,
            updated_at: document.updated_at,
        }
    }
}

pub fn run(_args: LsArgs, global: &GlobalArgs) -> anyhow::Result<()> {
    let format = global.format();
    let ctx = EditorContext::load(global.config.as_deref())?;
    let documents =
        block_on(ctx.service().list_documents())?.map_err(|e| failed("Failed to list documents", e))?;

    let result = LsResult { documents: documents.iter().map(DocEntry::from).collect() };
    output::print_output(format, &result, format_human)?;
    Ok(())
}

fn format_human(result: &LsResult) -> String {
    if result.documents.is_empty() {
        return "No documents yet.".into();
    }

    let mut lines = Vec::new();
    lines.push(format!("{} document(s)", result.documents.len()));
    for d in &result.documents {
        let shared = if d.shared { " (shared)" } else { "" };
        lines.push(format!(
            "  {}  {}{} ({} words, updated {})",
            d.id,
            d.title,
            shared,
            d.words,
            d.updated_at.format("%Y-%m-%d %H:%M")
        ));
    }
    lines.join("\n")
}
