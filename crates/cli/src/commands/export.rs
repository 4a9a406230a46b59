// `idox export`: standalone HTML or PDF from a document or a local file.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Args, ValueEnum};
use idox_editor::export::{export_html, export_pdf, CommandPdfRenderer};
use serde::Serialize;
use uuid::Uuid;

use super::{block_on, failed, read_input, GlobalArgs};
use crate::context::EditorContext;
use crate::output;

const DEFAULT_PDF_COMMAND: &str = "wkhtmltopdf --quiet - -";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExportFormat {
    Html,
    Pdf,
}

#[derive(Debug, Args)]
pub struct ExportArgs {
    /// Document id, or a path to an HTML file (`-` for stdin).
    pub source: String,

    /// Title for the exported page. Defaults to the document title or file name.
    #[arg(long)]
    title: Option<String>,

    #[arg(long, value_enum, default_value_t = ExportFormat::Html)]
    format: ExportFormat,

    /// Output directory.
    #[arg(long, value_name = "DIR", default_value = ".")]
    out: PathBuf,

    /// HTML-to-PDF converter reading stdin and writing stdout.
    #[arg(long, value_name = "COMMAND", default_value = DEFAULT_PDF_COMMAND)]
    pdf_command: String,
}

#[derive(Debug, Serialize)]
pub struct ExportResult {
    pub path: PathBuf,
    pub mime: &'static str,
    pub bytes: usize,
}

pub fn run(args: ExportArgs, global: &GlobalArgs) -> anyhow::Result<()> {
    let (title, html) = load_source(&args.source, args.title.as_deref(), global)?;

    let file = match args.format {
        ExportFormat::Html => export_html(&title, &html),
        ExportFormat::Pdf => {
            let renderer = CommandPdfRenderer::from_command_line(&args.pdf_command)?;
            export_pdf(&renderer, &title, &html)?
        }
    };
    let path = file.write_into(&args.out)?;

    let result = ExportResult { path, mime: file.mime, bytes: file.bytes.len() };
    output::print_output(global.format(), &result, |r| {
        format!("Exported {} ({} bytes)", r.path.display(), r.bytes)
    })?;
    Ok(())
}

/// Title and HTML body for `source`, which is a document id or a file path.
fn load_source(
    source: &str,
    title: Option<&str>,
    global: &GlobalArgs,
) -> anyhow::Result<(String, String)> {
    if let Ok(id) = Uuid::parse_str(source) {
        let ctx = EditorContext::load(global.config.as_deref())?;
        let document = block_on(ctx.service().get_document(id))?
            .map_err(|e| failed("Failed to export document", e))?;
        let title = title.map(str::to_string).unwrap_or(document.title.clone());
        return Ok((title, document.content.html));
    }

    let path = Path::new(source);
    let html = read_input(path)?;
    let title = match title {
        Some(title) => title.to_string(),
        None => file_title(path).context("could not derive a title; pass --title")?,
    };
    Ok((title, html))
}

fn file_title(path: &Path) -> Option<String> {
    if path == Path::new("-") {
        return Some(idox_common::types::DEFAULT_TITLE.to_string());
    }
    path.file_stem().map(|stem| stem.to_string_lossy().into_owned())
}
