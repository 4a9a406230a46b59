// `idox new`: create a document, optionally seeded from a file.

use std::path::PathBuf;

use clap::Args;
use idox_common::types::Document;
use idox_editor::error::Notice;
use serde::Serialize;

use super::{block_on, failed, read_input, GlobalArgs};
use crate::context::EditorContext;
use crate::output;

#[derive(Debug, Args)]
pub struct NewArgs {
    /// Document title (defaults to "Untitled Document").
    #[arg(long)]
    title: Option<String>,

    /// HTML file with the initial content (`-` for stdin).
    #[arg(long, value_name = "FILE")]
    file: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
pub struct NewResult {
    pub document: Document,
    pub notice: Notice,
}

pub fn run(args: NewArgs, global: &GlobalArgs) -> anyhow::Result<()> {
    let format = global.format();
    let initial = args.file.as_deref().map(read_input).transpose()?;
    let ctx = EditorContext::load(global.config.as_deref())?;
    let service = ctx.service();

    let document = block_on(service.create_document(args.title.as_deref(), initial.as_deref()))?
        .map_err(|e| failed("Failed to create document", e))?;
    let result = NewResult {
        notice: Notice::info("Document created", document.title.clone()),
        document,
    };
    output::print_notice(format, &result.notice);
    output::print_output(format, &result, format_human)?;
    Ok(())
}

fn format_human(result: &NewResult) -> String {
    format!("{}  {}", result.document.id, result.document.title)
}
