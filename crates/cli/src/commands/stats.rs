// `idox stats`: content metrics for an HTML file or stdin.

use std::path::PathBuf;

use clap::Args;
use idox_common::metrics::{calculate_metrics, DocumentMetrics};

use super::{read_input, GlobalArgs};
use crate::output;

#[derive(Debug, Args)]
pub struct StatsArgs {
    /// HTML file to measure (`-` for stdin).
    pub file: PathBuf,
}

pub fn run(args: StatsArgs, global: &GlobalArgs) -> anyhow::Result<()> {
    let content = read_input(&args.file)?;
    let metrics = calculate_metrics(&content);
    output::print_output(global.format(), &metrics, format_human)?;
    Ok(())
}

pub(crate) fn format_human(metrics: &DocumentMetrics) -> String {
    format!(
        "Words: {}\nCharacters: {}\nParagraphs: {}\nReading time: {} min",
        metrics.word_count,
        metrics.character_count,
        metrics.paragraph_count,
        metrics.reading_time_minutes
    )
}
