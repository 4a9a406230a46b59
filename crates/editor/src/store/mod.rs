// Persistence collaborators.
//
// The hosted backend owns the document schema; this module only talks to it
// through `DocumentStore`. Anonymous sessions use the local key-value store
// instead, and `RoutedStore` picks between the two per call.

pub mod local;
pub mod memory;
pub mod remote;
pub mod routed;

use std::future::Future;

use idox_common::types::{ActivityEntry, Collaborator, Document, DocumentPatch, NewDocument, Permission};
use uuid::Uuid;

pub use local::LocalStore;
pub use memory::MemoryStore;
pub use remote::RestStore;
pub use routed::RoutedStore;

/// Failures reported by a persistence collaborator.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{entity} not found")]
    NotFound { entity: &'static str },
    #[error("request rejected ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("network failure: {0}")]
    Network(String),
    #[error("malformed payload: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("local storage failure: {0:#}")]
    Local(#[from] anyhow::Error),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Abstraction over document persistence. Trait-based for testability.
///
/// All methods return `Send` futures so saves can run on spawned tasks.
pub trait DocumentStore: Send + Sync + 'static {
    /// Persist a new document and return the stored row.
    fn insert(
        &self,
        document: NewDocument,
    ) -> impl Future<Output = Result<Document, StoreError>> + Send;

    fn fetch(&self, id: Uuid) -> impl Future<Output = Result<Option<Document>, StoreError>> + Send;

    /// Apply a partial update. Missing documents yield `StoreError::NotFound`.
    fn update(
        &self,
        id: Uuid,
        patch: DocumentPatch,
    ) -> impl Future<Output = Result<Document, StoreError>> + Send;

    fn delete(&self, id: Uuid) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Look up a public document by share code.
    fn find_shared(
        &self,
        share_code: &str,
    ) -> impl Future<Output = Result<Option<Document>, StoreError>> + Send;

    /// Documents owned by `owner_id`, most recently updated first.
    fn list_owned(
        &self,
        owner_id: &str,
    ) -> impl Future<Output = Result<Vec<Document>, StoreError>> + Send;

    fn add_collaborator(
        &self,
        document_id: Uuid,
        email: &str,
        permission: Permission,
    ) -> impl Future<Output = Result<Collaborator, StoreError>> + Send;

    fn list_collaborators(
        &self,
        document_id: Uuid,
    ) -> impl Future<Output = Result<Vec<Collaborator>, StoreError>> + Send;

    fn log_activity(
        &self,
        entry: ActivityEntry,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;
}

impl<S: DocumentStore> DocumentStore for std::sync::Arc<S> {
    fn insert(
        &self,
        document: NewDocument,
    ) -> impl Future<Output = Result<Document, StoreError>> + Send {
        (**self).insert(document)
    }

    fn fetch(&self, id: Uuid) -> impl Future<Output = Result<Option<Document>, StoreError>> + Send {
        (**self).fetch(id)
    }

    fn update(
        &self,
        id: Uuid,
        patch: DocumentPatch,
    ) -> impl Future<Output = Result<Document, StoreError>> + Send {
        (**self).update(id, patch)
    }

    fn delete(&self, id: Uuid) -> impl Future<Output = Result<(), StoreError>> + Send {
        (**self).delete(id)
    }

    fn find_shared(
        &self,
        share_code: &str,
    ) -> impl Future<Output = Result<Option<Document>, StoreError>> + Send {
        (**self).find_shared(share_code)
    }

    fn list_owned(
        &self,
        owner_id: &str,
    ) -> impl Future<Output = Result<Vec<Document>, StoreError>> + Send {
        (**self).list_owned(owner_id)
    }

    fn add_collaborator(
        &self,
        document_id: Uuid,
        email: &str,
        permission: Permission,
    ) -> impl Future<Output = Result<Collaborator, StoreError>> + Send {
        (**self).add_collaborator(document_id, email, permission)
    }

    fn list_collaborators(
        &self,
        document_id: Uuid,
    ) -> impl Future<Output = Result<Vec<Collaborator>, StoreError>> + Send {
        (**self).list_collaborators(document_id)
    }

    fn log_activity(
        &self,
        entry: ActivityEntry,
    ) -> impl Future<Output = Result<(), StoreError>> + Send {
        (**self).log_activity(entry)
    }
}

/// Username a collaborator invite resolves to: the email local part.
pub(crate) fn invite_username(email: &str) -> &str {
    email.split('@').next().unwrap_or(email)
}
