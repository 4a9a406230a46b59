// Document operations behind the editor UI and CLI.
//
// Wraps a persistence collaborator and the editing session. Every failure
// comes back as an `EditorError`; callers turn it into a notice.

use std::sync::Arc;

use chrono::Utc;
use idox_common::types::{
    ActivityEntry, Collaborator, Document, DocumentContent, DocumentPatch, NewDocument,
    Permission, ShareResponse, DEFAULT_TITLE,
};
use serde_json::Value;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::ShareConfig;
use crate::error::{notice_for, EditorError, Notice};
use crate::session::Session;
use crate::share::{build_share_link, generate_share_code, hash_password, verify_password};
use crate::store::DocumentStore;

/// What a visitor of a share link gets to see.
#[derive(Debug, Clone, PartialEq)]
pub enum SharedView {
    /// Read-only document. The password hash is never exposed.
    Ready(Document),
    NotFound,
    PasswordRequired,
    InvalidPassword,
}

impl SharedView {
    pub fn notice(&self) -> Option<Notice> {
        match self {
            Self::Ready(_) => None,
            Self::NotFound => Some(Notice::destructive(
                "Document not found",
                "The shared document could not be found or is no longer available.",
            )),
            Self::PasswordRequired => Some(Notice::info(
                "Password required",
                "This document is password protected.",
            )),
            Self::InvalidPassword => {
                Some(Notice::destructive("Incorrect password", "The password did not match."))
            }
        }
    }
}

/// Reject operations that need a selected document when none is.
pub fn require_selection(document_id: Option<Uuid>) -> Result<Uuid, EditorError> {
    document_id.ok_or_else(|| EditorError::validation("no document selected"))
}

pub fn share_link_notice(result: &Result<ShareResponse, EditorError>) -> Notice {
    notice_for(
        result,
        |_| {
            Notice::info(
                "Share link generated",
                "Your document is now publicly accessible via the link.",
            )
        },
        "Failed to generate share link",
    )
}

pub fn invite_notice(email: &str, result: &Result<Collaborator, EditorError>) -> Notice {
    notice_for(
        result,
        |_| Notice::info("Collaborator invited", format!("{email} has been added as a collaborator.")),
        "Failed to invite collaborator",
    )
}

pub struct DocumentService<S> {
    store: S,
    session: Arc<Session>,
    share_base_url: String,
}

impl<S: DocumentStore> DocumentService<S> {
    pub fn new(store: S, session: Arc<Session>, share: &ShareConfig) -> Self {
        Self { store, session, share_base_url: share.base_url.clone() }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// Create a document owned by the session's user (or its anonymous id).
    pub async fn create_document(
        &self,
        title: Option<&str>,
        html: Option<&str>,
    ) -> Result<Document, EditorError> {
        let title = title.map(str::trim).filter(|t| !t.is_empty()).unwrap_or(DEFAULT_TITLE);
        let document = NewDocument {
            title: title.to_string(),
            content: DocumentContent::html(html.unwrap_or_default(), Utc::now()),
            owner_id: self.session.owner_id(),
        };
        let created = self
            .store
            .insert(document)
            .await
            .map_err(|e| EditorError::store("create document", e))?;
        info!(doc_id = %created.id, "document created");
        Ok(created)
    }

    pub async fn get_document(&self, id: Uuid) -> Result<Document, EditorError> {
        self.store
            .fetch(id)
            .await
            .map_err(|e| EditorError::store("get document", e))?
            .ok_or_else(|| EditorError::not_found("document"))
    }

    pub async fn update_document(
        &self,
        id: Uuid,
        patch: DocumentPatch,
    ) -> Result<Document, EditorError> {
        if patch.is_empty() {
            return Err(EditorError::validation("nothing to update"));
        }
        self.store.update(id, patch).await.map_err(|e| EditorError::store("update document", e))
    }

    pub async fn delete_document(&self, id: Uuid) -> Result<(), EditorError> {
        self.store.delete(id).await.map_err(|e| EditorError::store("delete document", e))?;
        info!(doc_id = %id, "document deleted");
        Ok(())
    }

    /// Documents owned by the current session, most recently updated first.
    pub async fn list_documents(&self) -> Result<Vec<Document>, EditorError> {
        self.store
            .list_owned(&self.session.owner_id())
            .await
            .map_err(|e| EditorError::store("list documents", e))
    }

    /// Publish the document under a fresh share code.
    pub async fn generate_share_link(&self, id: Uuid) -> Result<ShareResponse, EditorError> {
        let share_code = generate_share_code();
        let patch = DocumentPatch {
            share_code: Some(share_code.clone()),
            is_public: Some(true),
            ..DocumentPatch::default()
        };
        self.store
            .update(id, patch)
            .await
            .map_err(|e| EditorError::store("generate share link", e))?;
        info!(doc_id = %id, "share link generated");
        self.record(id, "shared", Value::Null).await;

        Ok(ShareResponse { share_link: build_share_link(&self.share_base_url, &share_code), share_code })
    }

    /// Public document behind `share_code`.
    pub async fn get_document_by_share_code(
        &self,
        share_code: &str,
    ) -> Result<Document, EditorError> {
        let share_code = share_code.trim();
        if share_code.is_empty() {
            return Err(EditorError::not_found("shared document"));
        }
        self.store
            .find_shared(share_code)
            .await
            .map_err(|e| EditorError::store("get shared document", e))?
            .ok_or_else(|| EditorError::not_found("shared document"))
    }

    pub async fn set_password(&self, id: Uuid, password: &str) -> Result<Document, EditorError> {
        let hash = hash_password(password)?;
        let patch = DocumentPatch { password_hash: Some(Some(hash)), ..DocumentPatch::default() };
        let updated = self
            .store
            .update(id, patch)
            .await
            .map_err(|e| EditorError::store("set password", e))?;
        info!(doc_id = %id, "share password set");
        Ok(updated)
    }

    pub async fn clear_password(&self, id: Uuid) -> Result<Document, EditorError> {
        let patch = DocumentPatch { password_hash: Some(None), ..DocumentPatch::default() };
        let updated = self
            .store
            .update(id, patch)
            .await
            .map_err(|e| EditorError::store("clear password", e))?;
        info!(doc_id = %id, "share password cleared");
        Ok(updated)
    }

    /// Resolve a share link for a visitor, checking the password if the
    /// document has one. Lookup misses are a view state, not an error.
    pub async fn open_shared(
        &self,
        share_code: &str,
        password: Option<&str>,
    ) -> Result<SharedView, EditorError> {
        let mut document = match self.get_document_by_share_code(share_code).await {
            Ok(document) => document,
            Err(EditorError::NotFound { .. }) => {
                debug!("share code matched no public document");
                return Ok(SharedView::NotFound);
            }
            Err(e) => return Err(e),
        };

        if let Some(stored_hash) = document.password_hash.take() {
            let Some(password) = password.filter(|p| !p.is_empty()) else {
                return Ok(SharedView::PasswordRequired);
            };
            if !verify_password(password, &stored_hash) {
                warn!(doc_id = %document.id, "shared document password mismatch");
                return Ok(SharedView::InvalidPassword);
            }
        }
        Ok(SharedView::Ready(document))
    }

    pub async fn add_collaborator(
        &self,
        id: Uuid,
        email: &str,
        permission: Permission,
    ) -> Result<Collaborator, EditorError> {
        let email = email.trim();
        if email.is_empty() {
            return Err(EditorError::validation("email is required"));
        }
        if !email.contains('@') {
            return Err(EditorError::validation(format!("invalid email address: {email}")));
        }

        let collaborator = self
            .store
            .add_collaborator(id, email, permission)
            .await
            .map_err(|e| match e {
                e if e.is_not_found() => EditorError::not_found(format!("user {email}")),
                e => EditorError::store("add collaborator", e),
            })?;
        info!(doc_id = %id, permission = %permission, "collaborator added");
        self.record(id, "collaborator_added", serde_json::json!({ "permission": permission }))
            .await;
        Ok(collaborator)
    }

    pub async fn get_collaborators(&self, id: Uuid) -> Result<Vec<Collaborator>, EditorError> {
        self.store
            .list_collaborators(id)
            .await
            .map_err(|e| EditorError::store("get collaborators", e))
    }

    /// Append to the document's activity log. Skipped for anonymous
    /// sessions.
    pub async fn log_activity(
        &self,
        id: Uuid,
        action: &str,
        metadata: Option<Value>,
    ) -> Result<(), EditorError> {
        let Some(identity) = self.session.identity() else {
            debug!(doc_id = %id, action, "activity not logged for anonymous session");
            return Ok(());
        };
        let entry = ActivityEntry {
            document_id: id,
            user_id: identity.user_id,
            action: action.to_string(),
            metadata: metadata.filter(|m| !m.is_null()).unwrap_or_else(|| serde_json::json!({})),
            at: Utc::now(),
        };
        self.store.log_activity(entry).await.map_err(|e| EditorError::store("log activity", e))
    }

    async fn record(&self, id: Uuid, action: &str, metadata: Value) {
        if let Err(error) = self.log_activity(id, action, Some(metadata)).await {
            warn!(doc_id = %id, action, %error, "activity log failed");
        }
    }
}
