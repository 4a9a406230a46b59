// In-memory editing buffer for one open document.
//
// Input replaces the buffered HTML, publishes it to observers and re-arms
// the autosave timer. Closing or dropping the buffer cancels the pending
// timer without writing.

use std::sync::Arc;

use idox_common::metrics::{calculate_metrics, DocumentMetrics};
use idox_common::types::{Document, DEFAULT_TITLE};
use tokio::sync::watch;
use tracing::debug;
use uuid::Uuid;

use crate::autosave::{SaveScheduler, TimerToken};
use crate::error::EditorError;
use crate::store::DocumentStore;

pub struct DocumentEditor<S: DocumentStore> {
    document_id: Uuid,
    title: String,
    content: watch::Sender<String>,
    scheduler: Arc<SaveScheduler<S>>,
}

impl<S: DocumentStore> DocumentEditor<S> {
    pub fn open(document: &Document, scheduler: Arc<SaveScheduler<S>>) -> Self {
        let (content, _) = watch::channel(document.html().to_string());
        debug!(doc_id = %document.id, "editor opened");
        Self { document_id: document.id, title: document.title.clone(), content, scheduler }
    }

    pub fn document_id(&self) -> Uuid {
        self.document_id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn content(&self) -> String {
        self.content.borrow().clone()
    }

    /// Observers of the buffered content (the stats refresher, previews).
    pub fn content_watch(&self) -> watch::Receiver<String> {
        self.content.subscribe()
    }

    pub fn on_input(&self, html: impl Into<String>) -> TimerToken {
        let html = html.into();
        let token = self.scheduler.schedule(self.document_id, html.clone(), None);
        self.content.send_replace(html);
        token
    }

    /// Rename and save immediately. Blank titles fall back to the default.
    pub async fn commit_title(&mut self, title: &str) -> Result<Document, EditorError> {
        let title = match title.trim() {
            "" => DEFAULT_TITLE,
            trimmed => trimmed,
        };
        self.title = title.to_string();
        self.scheduler
            .flush(self.document_id, self.content(), Some(self.title.clone()))
            .await
            .map_err(|e| EditorError::store("save document", e))
    }

    pub async fn save_now(&self) -> Result<Document, EditorError> {
        self.scheduler
            .flush(self.document_id, self.content(), None)
            .await
            .map_err(|e| EditorError::store("save document", e))
    }

    pub fn metrics(&self) -> DocumentMetrics {
        calculate_metrics(&self.content.borrow())
    }

    /// Whether an autosave is armed for this document.
    pub fn has_pending_save(&self) -> bool {
        self.scheduler.is_armed(self.document_id)
    }

    pub fn close(self) {}
}

impl<S: DocumentStore> Drop for DocumentEditor<S> {
    fn drop(&mut self) {
        if self.scheduler.cancel(self.document_id) {
            debug!(doc_id = %self.document_id, "editor closed with pending autosave discarded");
        }
    }
}
