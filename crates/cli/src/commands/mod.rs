// CLI subcommand dispatch.

use std::future::Future;
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Args, Subcommand};
use idox_editor::error::EditorError;

use crate::output::OutputFormat;

pub mod collaborators;
pub mod edit;
pub mod export;
pub mod invite;
pub mod login;
pub mod ls;
pub mod new;
pub mod save;
pub mod share;
pub mod shared;
pub mod stats;
pub mod whoami;

/// Flags accepted by every subcommand.
#[derive(Debug, Args)]
pub struct GlobalArgs {
    /// Config file to use instead of `~/.idox/config.toml`.
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Force JSON output.
    #[arg(long, global = true)]
    pub json: bool,
}

impl GlobalArgs {
    pub fn format(&self) -> OutputFormat {
        OutputFormat::detect(self.json)
    }
}

#[derive(Subcommand)]
pub enum Command {
    /// Create a document
    New(new::NewArgs),
    /// List your documents
    Ls(ls::LsArgs),
    /// Save file content into a document
    Save(save::SaveArgs),
    /// Follow a file and autosave it into a document
    Edit(edit::EditArgs),
    /// Word, character, paragraph and reading-time metrics
    Stats(stats::StatsArgs),
    /// Export a document or file as HTML or PDF
    Export(export::ExportArgs),
    /// Publish a document through a share link
    Share(share::ShareArgs),
    /// Open a shared document by its share code
    Shared(shared::SharedArgs),
    /// Invite a collaborator by email
    Invite(invite::InviteArgs),
    /// List a document's collaborators
    Collaborators(collaborators::CollaboratorsArgs),
    /// Store a sign-in for the hosted backend
    Login(login::LoginArgs),
    /// Forget the stored sign-in
    Logout(login::LogoutArgs),
    /// Show the current identity and storage mode
    Whoami(whoami::WhoamiArgs),
}

pub fn run(cmd: Command, global: &GlobalArgs) -> anyhow::Result<()> {
    match cmd {
        Command::New(args) => new::run(args, global),
        Command::Ls(args) => ls::run(args, global),
        Command::Save(args) => save::run(args, global),
        Command::Edit(args) => edit::run(args, global),
        Command::Stats(args) => stats::run(args, global),
        Command::Export(args) => export::run(args, global),
        Command::Share(args) => share::run(args, global),
        Command::Shared(args) => shared::run(args, global),
        Command::Invite(args) => invite::run(args, global),
        Command::Collaborators(args) => collaborators::run(args, global),
        Command::Login(args) => login::run_login(args, global),
        Command::Logout(args) => login::run_logout(args, global),
        Command::Whoami(args) => whoami::run(args, global),
    }
}

/// Drive `future` to completion on a fresh current-thread runtime.
pub(crate) fn block_on<F: Future>(future: F) -> anyhow::Result<F::Output> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    Ok(runtime.block_on(future))
}

/// Read a file, or stdin when `path` is `-`.
pub(crate) fn read_input(path: &Path) -> anyhow::Result<String> {
    if path == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf).context("failed to read stdin")?;
        return Ok(buf);
    }
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

/// Attach the failure notice's title to an operation error.
pub(crate) fn failed(notice_title: &'static str, error: EditorError) -> anyhow::Error {
    anyhow::Error::new(error).context(notice_title)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn read_input_reads_files() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("draft.html");
        std::fs::write(&path, "<p>hi</p>").unwrap();
        assert_eq!(read_input(&path).unwrap(), "<p>hi</p>");
        assert!(read_input(&dir.path().join("missing.html")).is_err());
    }

    #[test]
    fn failure_context_keeps_notice_title() {
        let err = failed("Failed to invite collaborator", EditorError::validation("email is required"));
        assert_eq!(format!("{err:#}"), "Failed to invite collaborator: email is required");
    }

    #[test]
    fn block_on_runs_future() {
        assert_eq!(block_on(async { 7 }).unwrap(), 7);
    }
}
