// Local key-value store backing anonymous sessions.
//
// A single `kv` table in SQLite holds JSON values under string keys:
//   document:{id}        -> Document
//   share:{code}         -> document id
//   collaborators:{id}   -> [Collaborator]
//   activity:{id}        -> [ActivityEntry]
//   session:anonymous_id -> six-digit anonymous id (plain string)

use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{Context, Result};
use chrono::Utc;
use idox_common::types::{
    ActivityEntry, Collaborator, Document, DocumentPatch, NewDocument, Permission,
};
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use super::{invite_username, DocumentStore, StoreError};
use crate::session::generate_anonymous_id;

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS kv (
    key         TEXT PRIMARY KEY,
    value       TEXT NOT NULL,
    updated_at  TEXT NOT NULL
);
"#;

const DOCUMENT_PREFIX: &str = "document:";
const ANONYMOUS_ID_KEY: &str = "session:anonymous_id";

fn document_key(id: Uuid) -> String {
    format!("{DOCUMENT_PREFIX}{id}")
}

fn share_key(code: &str) -> String {
    format!("share:{code}")
}

fn collaborators_key(id: Uuid) -> String {
    format!("collaborators:{id}")
}

fn activity_key(id: Uuid) -> String {
    format!("activity:{id}")
}

/// Cheap to clone: clones share one connection.
#[derive(Debug, Clone)]
pub struct LocalStore {
    conn: Arc<Mutex<Connection>>,
}

impl LocalStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed to create local store directory `{}`", parent.display())
            })?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("failed to open local store at `{}`", path.display()))?;
        conn.execute_batch("PRAGMA journal_mode = WAL;")
            .context("failed to configure sqlite pragmas for local store")?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("failed to open in-memory local store")?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA_SQL).context("failed to create local store schema")?;
        Ok(Self { conn: Arc::new(Mutex::new(conn)) })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Anonymous id for this store, generated and kept on first use so
    /// documents created anonymously stay owned across runs.
    pub fn anonymous_id(&self) -> Result<String> {
        if let Some(id) = self.get_raw(ANONYMOUS_ID_KEY)?.filter(|id| !id.trim().is_empty()) {
            return Ok(id);
        }
        let id = generate_anonymous_id();
        self.put_raw(ANONYMOUS_ID_KEY, &id)?;
        debug!(anonymous_id = %id, "generated anonymous id");
        Ok(id)
    }

    // ── Raw key-value access ───────────────────────────────────────

    pub fn get_raw(&self, key: &str) -> Result<Option<String>> {
        self.conn()
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| row.get(0))
            .optional()
            .with_context(|| format!("failed to read local key `{key}`"))
    }

    pub fn put_raw(&self, key: &str, value: &str) -> Result<()> {
        self.conn()
            .execute(
                "INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3) \
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, \
                 updated_at = excluded.updated_at",
                params![key, value, Utc::now().to_rfc3339()],
            )
            .with_context(|| format!("failed to write local key `{key}`"))?;
        Ok(())
    }

    pub fn remove(&self, key: &str) -> Result<bool> {
        let changed = self
            .conn()
            .execute("DELETE FROM kv WHERE key = ?1", params![key])
            .with_context(|| format!("failed to delete local key `{key}`"))?;
        Ok(changed > 0)
    }

    /// Values whose key starts with `prefix`, ordered by key.
    pub fn scan_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare("SELECT value FROM kv WHERE substr(key, 1, ?2) = ?1 ORDER BY key ASC")
            .context("failed to prepare local prefix scan")?;
        let rows = stmt
            .query_map(params![prefix, prefix.len() as i64], |row| row.get::<_, String>(0))
            .context("failed to scan local keys")?;
        rows.collect::<std::result::Result<Vec<_>, _>>().context("failed to collect local values")
    }

    /// Run `op` on the blocking pool; SQLite calls never block the executor.
    async fn blocking<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&LocalStore) -> Result<T, StoreError> + Send + 'static,
    {
        let store = self.clone();
        tokio::task::spawn_blocking(move || op(&store))
            .await
            .map_err(|e| StoreError::Local(anyhow::Error::new(e).context("local store task failed")))?
    }

    fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StoreError> {
        match self.get_raw(key)? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    fn put_json<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StoreError> {
        let raw = serde_json::to_string(value)?;
        self.put_raw(key, &raw)?;
        Ok(())
    }
}

impl LocalStore {
    // Blocking bodies of the `DocumentStore` operations.

    fn insert_document(&self, document: NewDocument) -> Result<Document, StoreError> {
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
        self.put_json(&document_key(stored.id), &stored)?;
        debug!(doc_id = %stored.id, "document stored locally");
        Ok(stored)
    }

    fn fetch_document(&self, id: Uuid) -> Result<Option<Document>, StoreError> {
        self.get_json(&document_key(id))
    }

    fn update_document(&self, id: Uuid, patch: DocumentPatch) -> Result<Document, StoreError> {
        let mut document: Document = self
            .get_json(&document_key(id))?
            .ok_or(StoreError::NotFound { entity: "document" })?;
        let previous_code = document.share_code.clone();
        document.apply_patch(&patch, Utc::now());

        if document.share_code != previous_code {
            if let Some(old) = previous_code {
                self.remove(&share_key(&old))?;
            }
        }
        if let Some(code) = &document.share_code {
            self.put_raw(&share_key(code), &id.to_string())?;
        }
        self.put_json(&document_key(id), &document)?;
        debug!(doc_id = %id, "local document updated");
        Ok(document)
    }

    fn delete_document(&self, id: Uuid) -> Result<(), StoreError> {
        if let Some(document) = self.get_json::<Document>(&document_key(id))? {
            if let Some(code) = document.share_code {
                self.remove(&share_key(&code))?;
            }
        }
        self.remove(&document_key(id))?;
        self.remove(&collaborators_key(id))?;
        self.remove(&activity_key(id))?;
        Ok(())
    }

    fn find_shared_document(&self, share_code: &str) -> Result<Option<Document>, StoreError> {
        let Some(raw_id) = self.get_raw(&share_key(share_code))? else {
            return Ok(None);
        };
        let Ok(id) = raw_id.parse::<Uuid>() else {
            return Ok(None);
        };
        Ok(self.get_json::<Document>(&document_key(id))?.filter(|d| d.is_public))
    }

    fn list_owned_documents(&self, owner_id: &str) -> Result<Vec<Document>, StoreError> {
        let mut documents = Vec::new();
        for raw in self.scan_prefix(DOCUMENT_PREFIX)? {
            let document: Document = serde_json::from_str(&raw)?;
            if document.owner_id == owner_id {
                documents.push(document);
            }
        }
        documents.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(documents)
    }

    fn put_collaborator(
        &self,
        document_id: Uuid,
        email: &str,
        permission: Permission,
    ) -> Result<Collaborator, StoreError> {
        let key = collaborators_key(document_id);
        let mut collaborators: Vec<Collaborator> = self.get_json(&key)?.unwrap_or_default();
        let collaborator = Collaborator {
            document_id,
            user_id: None,
            username: Some(invite_username(email).to_string()),
            email: Some(email.to_string()),
            permission,
        };
        collaborators.retain(|c| c.email.as_deref() != Some(email));
        collaborators.push(collaborator.clone());
        self.put_json(&key, &collaborators)?;
        Ok(collaborator)
    }

    fn read_collaborators(&self, document_id: Uuid) -> Result<Vec<Collaborator>, StoreError> {
        Ok(self.get_json(&collaborators_key(document_id))?.unwrap_or_default())
    }

    fn append_activity(&self, entry: ActivityEntry) -> Result<(), StoreError> {
        let key = activity_key(entry.document_id);
        let mut entries: Vec<ActivityEntry> = self.get_json(&key)?.unwrap_or_default();
        entries.push(entry);
        self.put_json(&key, &entries)
    }
}


impl DocumentStore for LocalStore {
    async fn insert(&self, document: NewDocument) -> Result<Document, StoreError> {
        self.blocking(move |store| store.insert_document(document)).await
    }

    async fn fetch(&self, id: Uuid) -> Result<Option<Document>, StoreError> {
        self.blocking(move |store| store.fetch_document(id)).await
    }

    async fn update(&self, id: Uuid, patch: DocumentPatch) -> Result<Document, StoreError> {
        self.blocking(move |store| store.update_document(id, patch)).await
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        self.blocking(move |store| store.delete_document(id)).await
    }

    async fn find_shared(&self, share_code: &str) -> Result<Option<Document>, StoreError> {
        let share_code = share_code.to_string();
        self.blocking(move |store| store.find_shared_document(&share_code)).await
    }

    async fn list_owned(&self, owner_id: &str) -> Result<Vec<Document>, StoreError> {
        let owner_id = owner_id.to_string();
        self.blocking(move |store| store.list_owned_documents(&owner_id)).await
    }

    async fn add_collaborator(
        &self,
        document_id: Uuid,
        email: &str,
        permission: Permission,
    ) -> Result<Collaborator, StoreError> {
        let email = email.to_string();
        self.blocking(move |store| store.put_collaborator(document_id, &email, permission)).await
    }

    async fn list_collaborators(&self, document_id: Uuid) -> Result<Vec<Collaborator>, StoreError> {
        self.blocking(move |store| store.read_collaborators(document_id)).await
    }

    async fn log_activity(&self, entry: ActivityEntry) -> Result<(), StoreError> {
        self.blocking(move |store| store.append_activity(entry)).await
    }
}
