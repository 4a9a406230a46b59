// In-process document store for tests and throwaway sessions.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use chrono::Utc;
use idox_common::types::{
    ActivityEntry, Collaborator, Document, DocumentPatch, NewDocument, Permission,
};
use uuid::Uuid;

use super::{invite_username, DocumentStore, StoreError};

#[derive(Debug, Default)]
struct MemoryState {
    documents: HashMap<Uuid, Document>,
    collaborators: Vec<Collaborator>,
    activity: Vec<ActivityEntry>,
    /// Every update applied, in order.
    updates: Vec<(Uuid, DocumentPatch)>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
    fail_writes: AtomicBool,
    write_calls: AtomicUsize,
    update_delay_ms: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent insert/update/delete fail with `Rejected`.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Hold every subsequent update for `delay` before applying it.
    pub fn set_update_delay(&self, delay: Duration) {
        self.update_delay_ms.store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    /// Number of write attempts, including failed ones.
    pub fn write_calls(&self) -> usize {
        self.write_calls.load(Ordering::SeqCst)
    }

    /// Successful updates in application order.
    pub fn updates(&self) -> Vec<(Uuid, DocumentPatch)> {
        self.lock().updates.clone()
    }

    pub fn activity(&self) -> Vec<ActivityEntry> {
        self.lock().activity.clone()
    }

    pub fn len(&self) -> usize {
        self.lock().documents.len()
    }

    /// Seed a document directly, bypassing write accounting.
    pub fn seed(&self, document: Document) {
        self.lock().documents.insert(document.id, document);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn begin_write(&self) -> Result<(), StoreError> {
        self.write_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Rejected { status: 503, message: "writes disabled".into() });
        }
        Ok(())
    }
}

impl DocumentStore for MemoryStore {
    async fn insert(&self, document: NewDocument) -> Result<Document, StoreError> {
        self.begin_write()?;
        let now = Utc::now();
        let stored = Document {
            id: Uuid::new_v4(),
            title: document.title,
            content: document.content,
            owner_id: document.owner_id,
            is_public: false,
            share_code: None,
            password_hash: None,
            created_at: now,
            updated_at: now,
        };
        self.lock().documents.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn fetch(&self, id: Uuid) -> Result<Option<Document>, StoreError> {
        Ok(self.lock().documents.get(&id).cloned())
    }

    async fn update(&self, id: Uuid, patch: DocumentPatch) -> Result<Document, StoreError> {
        self.begin_write()?;
        let delay = self.update_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        let mut state = self.lock();
        let document =
            state.documents.get_mut(&id).ok_or(StoreError::NotFound { entity: "document" })?;
        document.apply_patch(&patch, Utc::now());
        let updated = document.clone();
        state.updates.push((id, patch));
        Ok(updated)
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        self.begin_write()?;
        let mut state = self.lock();
        state.documents.remove(&id);
        state.collaborators.retain(|c| c.document_id != id);
        Ok(())
    }

    async fn find_shared(&self, share_code: &str) -> Result<Option<Document>, StoreError> {
        Ok(self
            .lock()
            .documents
            .values()
            .find(|d| d.is_public && d.share_code.as_deref() == Some(share_code))
            .cloned())
    }

    async fn list_owned(&self, owner_id: &str) -> Result<Vec<Document>, StoreError> {
        let mut documents: Vec<Document> =
            self.lock().documents.values().filter(|d| d.owner_id == owner_id).cloned().collect();
        documents.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(documents)
    }

    async fn add_collaborator(
        &self,
        document_id: Uuid,
        email: &str,
        permission: Permission,
    ) -> Result<Collaborator, StoreError> {
        self.begin_write()?;
        let collaborator = Collaborator {
            document_id,
            user_id: None,
            username: Some(invite_username(email).to_string()),
            email: Some(email.to_string()),
            permission,
        };
        self.lock().collaborators.push(collaborator.clone());
        Ok(collaborator)
    }

    async fn list_collaborators(&self, document_id: Uuid) -> Result<Vec<Collaborator>, StoreError> {
        Ok(self
            .lock()
            .collaborators
            .iter()
            .filter(|c| c.document_id == document_id)
            .cloned()
            .collect())
    }

    async fn log_activity(&self, entry: ActivityEntry) -> Result<(), StoreError> {
        self.lock().activity.push(entry);
        Ok(())
    }
}
