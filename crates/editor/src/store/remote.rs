// Hosted backend client speaking PostgREST conventions over HTTP.
//
// Tables: `documents`, `profiles`, `document_collaborators`,
// `document_activity`. Every request carries the public API key; requests
// made while signed in also carry the session's bearer token.

use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use idox_common::types::{
    ActivityEntry, Collaborator, Document, DocumentPatch, NewDocument, Permission,
};
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};
use url::Url;
use uuid::Uuid;

use super::{invite_username, DocumentStore, StoreError};
use crate::session::Session;

const REST_PREFIX: &str = "rest/v1/";
const RETURN_REPRESENTATION: &str = "return=representation";

#[derive(Debug, Clone)]
pub struct RestStore {
    client: reqwest::Client,
    base: Url,
    anon_key: String,
    session: Arc<Session>,
}

#[derive(Debug, Deserialize)]
struct ProfileRow {
    user_id: String,
}

#[derive(Debug, Deserialize)]
struct CollaboratorRow {
    document_id: Uuid,
    user_id: String,
    #[serde(default)]
    permission: Permission,
    #[serde(default)]
    profiles: Option<ProfileSummary>,
}

#[derive(Debug, Deserialize)]
struct ProfileSummary {
    username: Option<String>,
}

#[derive(Debug, Serialize)]
struct PatchBody<'a> {
    #[serde(flatten)]
    patch: &'a DocumentPatch,
    updated_at: chrono::DateTime<Utc>,
}

impl RestStore {
    pub fn new(
        base_url: &str,
        anon_key: impl Into<String>,
        session: Arc<Session>,
    ) -> anyhow::Result<Self> {
        let mut base =
            Url::parse(base_url).with_context(|| format!("invalid backend url `{base_url}`"))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(Self { client: reqwest::Client::new(), base, anon_key: anon_key.into(), session })
    }

    fn table_url(&self, table: &str, filters: &[(&str, String)]) -> Result<Url, StoreError> {
        let mut url = self
            .base
            .join(&format!("{REST_PREFIX}{table}"))
            .with_context(|| format!("failed to build url for table `{table}`"))?;
        if !filters.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in filters {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let bearer = self.session.access_token().unwrap_or_else(|| self.anon_key.clone());
        self.client
            .request(method, url)
            .header("apikey", &self.anon_key)
            .bearer_auth(bearer)
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response, StoreError> {
        let response = builder.send().await.map_err(|e| StoreError::Network(e.to_string()))?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<serde_json::Value>(&body)
            .ok()
            .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_owned))
            .unwrap_or(body);
        warn!(status = status.as_u16(), %message, "backend rejected request");
        Err(StoreError::Rejected { status: status.as_u16(), message })
    }

    async fn rows<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<Vec<T>, StoreError> {
        let response = self.send(builder).await?;
        let bytes = response.bytes().await.map_err(|e| StoreError::Network(e.to_string()))?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

impl DocumentStore for RestStore {
    async fn insert(&self, document: NewDocument) -> Result<Document, StoreError> {
        let url = self.table_url("documents", &[])?;
        let builder = self
            .request(Method::POST, url)
            .header("Prefer", RETURN_REPRESENTATION)
            .json(&document);
        let stored: Vec<Document> = self.rows(builder).await?;
        let stored = stored.into_iter().next().ok_or(StoreError::NotFound { entity: "document" })?;
        debug!(doc_id = %stored.id, "document created on backend");
        Ok(stored)
    }

    async fn fetch(&self, id: Uuid) -> Result<Option<Document>, StoreError> {
        let url = self
            .table_url("documents", &[("select", "*".into()), ("id", format!("eq.{id}"))])?;
        let rows: Vec<Document> = self.rows(self.request(Method::GET, url)).await?;
        Ok(rows.into_iter().next())
    }

    async fn update(&self, id: Uuid, patch: DocumentPatch) -> Result<Document, StoreError> {
        let url = self.table_url("documents", &[("id", format!("eq.{id}"))])?;
        let body = PatchBody { patch: &patch, updated_at: Utc::now() };
        let builder = self
            .request(Method::PATCH, url)
            .header("Prefer", RETURN_REPRESENTATION)
            .json(&body);
        let rows: Vec<Document> = self.rows(builder).await?;
        rows.into_iter().next().ok_or(StoreError::NotFound { entity: "document" })
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        let url = self.table_url("documents", &[("id", format!("eq.{id}"))])?;
        self.send(self.request(Method::DELETE, url)).await?;
        Ok(())
    }

    async fn find_shared(&self, share_code: &str) -> Result<Option<Document>, StoreError> {
        let url = self.table_url(
            "documents",
            &[
                ("select", "*".into()),
                ("share_code", format!("eq.{share_code}")),
                ("is_public", "eq.true".into()),
            ],
        )?;
        let rows: Vec<Document> = self.rows(self.request(Method::GET, url)).await?;
        Ok(rows.into_iter().next())
    }

    async fn list_owned(&self, owner_id: &str) -> Result<Vec<Document>, StoreError> {
        let url = self.table_url(
            "documents",
            &[
                ("select", "*".into()),
                ("owner_id", format!("eq.{owner_id}")),
                ("order", "updated_at.desc".into()),
            ],
        )?;
        self.rows(self.request(Method::GET, url)).await
    }

    async fn add_collaborator(
        &self,
        document_id: Uuid,
        email: &str,
        permission: Permission,
    ) -> Result<Collaborator, StoreError> {
        let username = invite_username(email);
        let url = self.table_url(
            "profiles",
            &[("select", "user_id".into()), ("username", format!("eq.{username}"))],
        )?;
        let profiles: Vec<ProfileRow> = self.rows(self.request(Method::GET, url)).await?;
        let profile = profiles.into_iter().next().ok_or(StoreError::NotFound { entity: "user" })?;

        let url = self.table_url("document_collaborators", &[])?;
        let body = json!({
            "document_id": document_id,
            "user_id": profile.user_id,
            "permission": permission,
        });
        self.send(self.request(Method::POST, url).json(&body)).await?;

        Ok(Collaborator {
            document_id,
            user_id: Some(profile.user_id),
            username: Some(username.to_string()),
            email: Some(email.to_string()),
            permission,
        })
    }

    async fn list_collaborators(&self, document_id: Uuid) -> Result<Vec<Collaborator>, StoreError> {
        let url = self.table_url(
            "document_collaborators",
            &[
                ("select", "*,profiles:user_id(username,avatar_url)".into()),
                ("document_id", format!("eq.{document_id}")),
            ],
        )?;
        let rows: Vec<CollaboratorRow> = self.rows(self.request(Method::GET, url)).await?;
        Ok(rows
            .into_iter()
            .map(|row| Collaborator {
                document_id: row.document_id,
                user_id: Some(row.user_id),
                username: row.profiles.and_then(|p| p.username),
                email: None,
                permission: row.permission,
            })
            .collect())
    }

    async fn log_activity(&self, entry: ActivityEntry) -> Result<(), StoreError> {
        let url = self.table_url("document_activity", &[])?;
        let body = json!({
            "document_id": entry.document_id,
            "user_id": entry.user_id,
            "action": entry.action,
            "metadata": entry.metadata,
        });
        self.send(self.request(Method::POST, url).json(&body)).await?;
        Ok(())
    }
}
