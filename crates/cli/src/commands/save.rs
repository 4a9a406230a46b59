// `idox save`: write file content into a document right away.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use idox_common::metrics::{calculate_metrics, DocumentMetrics};
use idox_editor::editor::DocumentEditor;
use idox_editor::error::{EditorError, Notice};
use serde::Serialize;
use uuid::Uuid;

use super::{block_on, failed, read_input, GlobalArgs};
use crate::context::EditorContext;
use crate::output;

#[derive(Debug, Args)]
pub struct SaveArgs {
    /// Document id.
    pub id: Uuid,

    /// HTML file with the new content (`-` for stdin).
    pub file: PathBuf,

    /// Rename the document in the same save. Blank resets to the default title.
    #[arg(long)]
    title: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SaveResult {
    pub id: Uuid,
    pub title: String,
    pub metrics: DocumentMetrics,
    pub notice: Notice,
}

pub fn run(args: SaveArgs, global: &GlobalArgs) -> anyhow::Result<()> {
    let format = global.format();
    let content = read_input(&args.file)?;
    let ctx = EditorContext::load(global.config.as_deref())?;

    let result = block_on(save(&ctx, args.id, content, args.title))?
        .map_err(|e| failed("Failed to save document", e))?;
    output::print_notice(format, &result.notice);
    output::print_output(format, &result, format_human)?;
    Ok(())
}

async fn save(
    ctx: &EditorContext,
    id: Uuid,
    content: String,
    title: Option<String>,
) -> Result<SaveResult, EditorError> {
    let document = ctx.service().get_document(id).await?;
    let (scheduler, _events) = ctx.scheduler();
    let mut editor = DocumentEditor::open(&document, Arc::new(scheduler));

    editor.on_input(content);
    let saved = match title {
        Some(title) => editor.commit_title(&title).await?,
        None => editor.save_now().await?,
    };
    editor.close();

    Ok(SaveResult {
        id: saved.id,
        metrics: calculate_metrics(saved.html()),
        notice: Notice::info("Document saved", saved.title.clone()),
        title: saved.title,
    })
}

fn format_human(result: &SaveResult) -> String {
    format!(
        "{}  {} ({} words)",
        result.id, result.title, result.metrics.word_count
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn human_format_summarizes_save() {
        let result = SaveResult {
            id: Uuid::nil(),
            title: "Plans".into(),
            metrics: calculate_metrics("<p>one two three</p>"),
            notice: Notice::info("Document saved", "Plans"),
        };
        assert_eq!(
            format_human(&result),
            "00000000-0000-0000-0000-000000000000  Plans (3 words)"
        );
    }
}
