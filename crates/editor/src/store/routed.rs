// Identity-routed persistence: remote while signed in, local otherwise.

use std::sync::Arc;

use idox_common::types::{
    ActivityEntry, Collaborator, Document, DocumentPatch, NewDocument, Permission,
};
use tracing::trace;
use uuid::Uuid;

use super::{DocumentStore, StoreError};
use crate::session::Session;

/// Routes every call by the session's identity at call time. Anonymous
/// sessions never reach the remote store; without a remote, everything stays
/// local.
pub struct RoutedStore<R, L> {
    remote: Option<R>,
    local: L,
    session: Arc<Session>,
}

impl<R: DocumentStore, L: DocumentStore> RoutedStore<R, L> {
    pub fn new(remote: R, local: L, session: Arc<Session>) -> Self {
        Self::with_optional_remote(Some(remote), local, session)
    }

    pub fn local_only(local: L, session: Arc<Session>) -> Self {
        Self::with_optional_remote(None, local, session)
    }

    pub fn with_optional_remote(remote: Option<R>, local: L, session: Arc<Session>) -> Self {
        Self { remote, local, session }
    }

    pub fn remote(&self) -> Option<&R> {
        self.remote.as_ref()
    }

    pub fn local(&self) -> &L {
        &self.local
    }

    fn pick(&self) -> Target<'_, R, L> {
        match &self.remote {
            Some(remote) if self.session.is_authenticated() => {
                trace!(remote = true, "routing store call");
                Target::Remote(remote)
            }
            _ => {
                trace!(remote = false, "routing store call");
                Target::Local(&self.local)
            }
        }
    }
}

enum Target<'a, R, L> {
    Remote(&'a R),
    Local(&'a L),
}

impl<R: DocumentStore, L: DocumentStore> DocumentStore for RoutedStore<R, L> {
    async fn insert(&self, document: NewDocument) -> Result<Document, StoreError> {
        match self.pick() {
            Target::Remote(store) => store.insert(document).await,
            Target::Local(store) => store.insert(document).await,
        }
    }

    async fn fetch(&self, id: Uuid) -> Result<Option<Document>, StoreError> {
        match self.pick() {
            Target::Remote(store) => store.fetch(id).await,
            Target::Local(store) => store.fetch(id).await,
        }
    }

    async fn update(&self, id: Uuid, patch: DocumentPatch) -> Result<Document, StoreError> {
        match self.pick() {
            Target::Remote(store) => store.update(id, patch).await,
            Target::Local(store) => store.update(id, patch).await,
        }
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        match self.pick() {
            Target::Remote(store) => store.delete(id).await,
            Target::Local(store) => store.delete(id).await,
        }
    }

    async fn find_shared(&self, share_code: &str) -> Result<Option<Document>, StoreError> {
        match self.pick() {
            Target::Remote(store) => store.find_shared(share_code).await,
            Target::Local(store) => store.find_shared(share_code).await,
        }
    }

    async fn list_owned(&self, owner_id: &str) -> Result<Vec<Document>, StoreError> {
        match self.pick() {
            Target::Remote(store) => store.list_owned(owner_id).await,
            Target::Local(store) => store.list_owned(owner_id).await,
        }
    }

    async fn add_collaborator(
        &self,
        document_id: Uuid,
        email: &str,
        permission: Permission,
    ) -> Result<Collaborator, StoreError> {
        match self.pick() {
            Target::Remote(store) => store.add_collaborator(document_id, email, permission).await,
            Target::Local(store) => store.add_collaborator(document_id, email, permission).await,
        }
    }

    async fn list_collaborators(&self, document_id: Uuid) -> Result<Vec<Collaborator>, StoreError> {
        match self.pick() {
            Target::Remote(store) => store.list_collaborators(document_id).await,
            Target::Local(store) => store.list_collaborators(document_id).await,
        }
    }

    async fn log_activity(&self, entry: ActivityEntry) -> Result<(), StoreError> {
        match self.pick() {
            Target::Remote(store) => store.log_activity(entry).await,
            Target::Local(store) => store.log_activity(entry).await,
        }
    }
}
