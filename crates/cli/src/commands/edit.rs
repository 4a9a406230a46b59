// `idox edit`: follow a local HTML file and autosave it into a document.
//
// Each change to the file is fed to the editing buffer, so saves are
// debounced exactly as keystrokes are. Ctrl-C flushes anything pending and
// waits for debounced writes already in flight before reporting.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use clap::Args;
use idox_common::metrics::DocumentMetrics;
use idox_editor::autosave::SaveEvent;
use idox_editor::editor::DocumentEditor;
use idox_editor::presence::{PresencePayload, PresenceRoster};
use idox_editor::session::Session;
use idox_editor::stats::spawn_stats_refresher;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use super::{block_on, failed, GlobalArgs};
use crate::context::EditorContext;
use crate::output::{self, OutputFormat};

const DEFAULT_POLL_MS: u64 = 500;

#[derive(Debug, Args)]
pub struct EditArgs {
    /// Document id.
    pub id: Uuid,

    /// HTML file to follow.
    pub file: PathBuf,

    /// How often to check the file for changes, in milliseconds.
    #[arg(long, value_name = "MS", default_value_t = DEFAULT_POLL_MS)]
    poll_ms: u64,
}

#[derive(Debug, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum EditUpdate {
    Opened { id: Uuid, title: String, channel: String, viewers: usize },
    Saved { id: Uuid, title: String },
    SaveFailed { id: Uuid, message: String },
    Stats { metrics: DocumentMetrics },
    Closed { saves: usize, failures: usize },
}

pub fn run(args: EditArgs, global: &GlobalArgs) -> anyhow::Result<()> {
    let format = global.format();
    let ctx = EditorContext::load(global.config.as_deref())?;
    block_on(follow(&ctx, &args, format))?
}

async fn follow(ctx: &EditorContext, args: &EditArgs, format: OutputFormat) -> anyhow::Result<()> {
    let document = ctx
        .service()
        .get_document(args.id)
        .await
        .map_err(|e| failed("Failed to open document", e))?;
    let (scheduler, mut events) = ctx.scheduler();
    let scheduler = Arc::new(scheduler);
    let editor = DocumentEditor::open(&document, Arc::clone(&scheduler));
    let (mut metrics_rx, stats) =
        spawn_stats_refresher(editor.content_watch(), ctx.config.stats.interval());
    info!(doc_id = %args.id, file = %args.file.display(), "following file");
    let roster = local_presence(document.id, &ctx.session);
    emit(
        format,
        &EditUpdate::Opened {
            id: document.id,
            title: document.title.clone(),
            channel: roster.channel().to_string(),
            viewers: roster.viewer_count(),
        },
    )?;

    let mut last_seen = document.html().to_string();
    let mut poll = tokio::time::interval(Duration::from_millis(args.poll_ms.max(50)));
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let (mut saves, mut failures) = (0_usize, 0_usize);
    loop {
        tokio::select! {
            _ = poll.tick() => {
                if let Some(current) = read_if_changed(&args.file, &last_seen).await {
                    editor.on_input(current.clone());
                    last_seen = current;
                }
            }
            Some(event) = events.recv() => {
                report(format, event, &mut saves, &mut failures)?;
            }
            Ok(()) = metrics_rx.changed() => {
                let metrics = *metrics_rx.borrow_and_update();
                emit(format, &EditUpdate::Stats { metrics })?;
            }
            _ = &mut ctrl_c => break,
        }
    }

    if editor.has_pending_save() {
        // Success and failure both arrive on the event channel.
        let _ = editor.save_now().await;
    }
    scheduler.settle().await;
    while let Ok(event) = events.try_recv() {
        report(format, event, &mut saves, &mut failures)?;
    }
    stats.shutdown().await;
    editor.close();
    emit(format, &EditUpdate::Closed { saves, failures })?;
    Ok(())
}

/// Roster for the followed document holding only this session. Anonymous
/// sessions do not track presence, so their roster stays empty.
fn local_presence(document_id: Uuid, session: &Session) -> PresenceRoster {
    let mut roster = PresenceRoster::new(document_id);
    if let Some(payload) = PresencePayload::for_session(session, Utc::now()) {
        roster.join(payload.user_id.clone(), vec![payload]);
    }
    roster
}

fn report(
    format: OutputFormat,
    event: SaveEvent,
    saves: &mut usize,
    failures: &mut usize,
) -> std::io::Result<()> {
    output::print_notice(format, &event.notice());
    let update = match event {
        SaveEvent::Saved { document_id, document, .. } => {
            *saves += 1;
            EditUpdate::Saved { id: document_id, title: document.title }
        }
        SaveEvent::Failed { document_id, message, .. } => {
            *failures += 1;
            EditUpdate::SaveFailed { id: document_id, message }
        }
    };
    emit(format, &update)
}

async fn read_if_changed(path: &Path, last_seen: &str) -> Option<String> {
    match tokio::fs::read_to_string(path).await {
        Ok(current) if current != last_seen => Some(current),
        Ok(_) => None,
        Err(error) => {
            warn!(file = %path.display(), %error, "could not read followed file");
            None
        }
    }
}

fn emit(format: OutputFormat, update: &EditUpdate) -> std::io::Result<()> {
    output::print_output(format, update, format_human)
}

fn format_human(update: &EditUpdate) -> String {
    match update {
        EditUpdate::Opened { title, channel, viewers, .. } => {
            format!("opened {title} on {channel} ({viewers} viewer(s))")
        }
        EditUpdate::Saved { title, .. } => format!("saved  {title}"),
        EditUpdate::SaveFailed { message, .. } => format!("failed {message}"),
        EditUpdate::Stats { metrics } => format!(
            "stats  {} words, {} characters, {} paragraphs, {} min read",
            metrics.word_count,
            metrics.character_count,
            metrics.paragraph_count,
            metrics.reading_time_minutes
        ),
        EditUpdate::Closed { saves, failures } => {
            format!("closed {saves} save(s), {failures} failure(s)")
        }
    }
}
