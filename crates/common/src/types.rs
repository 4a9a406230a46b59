// Core domain types shared across all idox crates.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Title given to documents created or renamed without one.
pub const DEFAULT_TITLE: &str = "Untitled Document";

/// A document row as owned by the hosted backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Document {
    pub id: Uuid,
    pub title: String,
    pub content: DocumentContent,
    pub owner_id: String,
    #[serde(default)]
    pub is_public: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub share_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_hash: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document {
    /// Raw HTML payload of the document body.
    pub fn html(&self) -> &str {
        &self.content.html
    }

    pub fn is_password_protected(&self) -> bool {
        self.password_hash.is_some()
    }

    /// Apply a partial update in place, stamping `updated_at`.
    pub fn apply_patch(&mut self, patch: &DocumentPatch, now: DateTime<Utc>) {
        if let Some(title) = &patch.title {
            self.title = title.clone();
        }
        if let Some(content) = &patch.content {
            self.content = content.clone();
        }
        if let Some(share_code) = &patch.share_code {
            self.share_code = Some(share_code.clone());
        }
        if let Some(is_public) = patch.is_public {
            self.is_public = is_public;
        }
        if let Some(password_hash) = &patch.password_hash {
            self.password_hash = password_hash.clone();
        }
        self.updated_at = now;
    }
}

/// Payload format tag for document bodies. Only HTML exists today.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ContentFormat {
    #[default]
    Html,
}

/// Fixed-shape document body: `{format, html, lastModified}`.
///
/// Rows written before the format tag existed carry only `html` and
/// `lastModified`; they decode as HTML.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DocumentContent {
    #[serde(default)]
    pub format: ContentFormat,
    #[serde(default)]
    pub html: String,
    #[serde(rename = "lastModified")]
    pub last_modified: DateTime<Utc>,
}

impl DocumentContent {
    pub fn html(html: impl Into<String>, last_modified: DateTime<Utc>) -> Self {
        Self { format: ContentFormat::Html, html: html.into(), last_modified }
    }
}

/// Partial update of a document. `None` fields are left untouched.
///
/// `password_hash` is doubly optional: `Some(None)` clears the hash.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DocumentPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<DocumentContent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub share_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_public: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_hash: Option<Option<String>>,
}

impl DocumentPatch {
    /// Content-only or content+title update, as produced by autosave.
    pub fn content(html: impl Into<String>, title: Option<String>, now: DateTime<Utc>) -> Self {
        Self {
            title,
            content: Some(DocumentContent::html(html, now)),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// Insert payload for a new document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewDocument {
    pub title: String,
    pub content: DocumentContent,
    pub owner_id: String,
}

/// Result of publishing a document through a share link.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ShareResponse {
    pub share_link: String,
    pub share_code: String,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    #[default]
    View,
    Edit,
    Admin,
}

impl Permission {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::View => "view",
            Self::Edit => "edit",
            Self::Admin => "admin",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown permission `{0}` (expected view, edit or admin)")]
pub struct ParsePermissionError(pub String);

impl FromStr for Permission {
    type Err = ParsePermissionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "view" => Ok(Self::View),
            "edit" => Ok(Self::Edit),
            "admin" => Ok(Self::Admin),
            other => Err(ParsePermissionError(other.to_string())),
        }
    }
}

/// A user granted access to a document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Collaborator {
    pub document_id: Uuid,
    /// Backend user id when the invite resolved to a profile.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub permission: Permission,
}

/// One row of the per-document activity log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActivityEntry {
    pub document_id: Uuid,
    pub user_id: String,
    pub action: String,
    #[serde(default)]
    pub metadata: serde_json::Value,
    pub at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).single().expect("valid timestamp")
    }

    fn sample() -> Document {
        Document {
            id: Uuid::nil(),
            title: "Notes".into(),
            content: DocumentContent::html("<p>hi</p>", ts(10)),
            owner_id: "user-1".into(),
            is_public: false,
            share_code: None,
            password_hash: None,
            created_at: ts(10),
            updated_at: ts(10),
        }
    }

    #[test]
    fn content_serializes_with_format_tag_and_camel_case_timestamp() {
        let value = serde_json::to_value(DocumentContent::html("<p>x</p>", ts(0))).unwrap();
        assert_eq!(value["format"], "html");
        assert_eq!(value["html"], "<p>x</p>");
        assert!(value.get("lastModified").is_some());
    }

    #[test]
    fn legacy_content_without_format_decodes_as_html() {
        let content: DocumentContent = serde_json::from_str(
            r#"{"html":"<p>old</p>","lastModified":"2024-01-01T00:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(content.format, ContentFormat::Html);
        assert_eq!(content.html, "<p>old</p>");
    }

    #[test]
    fn patch_skips_absent_fields_when_serialized() {
        let patch = DocumentPatch { title: Some("T".into()), ..DocumentPatch::default() };
        let value = serde_json::to_value(&patch).unwrap();
        assert_eq!(value, serde_json::json!({ "title": "T" }));
    }

    #[test]
    fn patch_can_clear_password_hash() {
        let patch = DocumentPatch { password_hash: Some(None), ..DocumentPatch::default() };
        let value = serde_json::to_value(&patch).unwrap();
        assert_eq!(value, serde_json::json!({ "password_hash": null }));

        let mut doc = sample();
        doc.password_hash = Some("$argon2id$...".into());
        doc.apply_patch(&patch, ts(20));
        assert!(!doc.is_password_protected());
        assert_eq!(doc.updated_at, ts(20));
    }

    #[test]
    fn content_patch_leaves_title_when_none() {
        let mut doc = sample();
        doc.apply_patch(&DocumentPatch::content("<p>new</p>", None, ts(30)), ts(30));
        assert_eq!(doc.title, "Notes");
        assert_eq!(doc.html(), "<p>new</p>");
    }

    #[test]
    fn empty_patch_is_empty() {
        assert!(DocumentPatch::default().is_empty());
        assert!(!DocumentPatch::content("", None, ts(0)).is_empty());
    }

    #[test]
    fn permission_parses_case_insensitively() {
        assert_eq!("EDIT".parse::<Permission>().unwrap(), Permission::Edit);
        assert_eq!(" view ".parse::<Permission>().unwrap(), Permission::View);
        assert!("owner".parse::<Permission>().is_err());
        assert_eq!(Permission::default(), Permission::View);
    }
}
