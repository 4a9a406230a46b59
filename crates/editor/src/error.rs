// Operation failures and the user-visible notices they turn into.
//
// Every failure ends at the operation that produced it. Nothing is retried
// and nothing escalates past the notice channel.

use serde::Serialize;

use crate::store::StoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Precondition not met: nothing selected, required field empty.
    Validation,
    /// Lookup yielded nothing. Shown as its own view state.
    NotFound,
    /// The persistence collaborator rejected or never received the write.
    Persistence,
    Unexpected,
}

#[derive(Debug, thiserror::Error)]
pub enum EditorError {
    #[error("{0}")]
    Validation(String),
    #[error("user not authenticated")]
    Unauthenticated,
    #[error("{what} not found")]
    NotFound { what: String },
    #[error("this document is password protected")]
    PasswordRequired,
    #[error("incorrect password")]
    InvalidPassword,
    #[error("failed to {operation}: {source}")]
    Persistence {
        operation: &'static str,
        #[source]
        source: StoreError,
    },
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

impl EditorError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    /// Wrap a store failure for `operation`, keeping not-found and a missing
    /// or expired sign-in (HTTP 401) distinct.
    pub fn store(operation: &'static str, source: StoreError) -> Self {
        match source {
            StoreError::NotFound { entity } => Self::not_found(entity),
            StoreError::Rejected { status: 401, .. } => Self::Unauthenticated,
            source => Self::Persistence { operation, source },
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_)
            | Self::Unauthenticated
            | Self::PasswordRequired
            | Self::InvalidPassword => ErrorKind::Validation,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Persistence { .. } => ErrorKind::Persistence,
            Self::Unexpected(_) => ErrorKind::Unexpected,
        }
    }

    /// Notice for a failed operation titled `title`.
    pub fn to_notice(&self, title: impl Into<String>) -> Notice {
        Notice::destructive(title, self.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum NoticeVariant {
    #[default]
    Default,
    Destructive,
}

/// Transient user-visible message (a toast).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub title: String,
    pub description: String,
    pub variant: NoticeVariant,
}

impl Notice {
    pub fn info(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self { title: title.into(), description: description.into(), variant: NoticeVariant::Default }
    }

    pub fn destructive(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            variant: NoticeVariant::Destructive,
        }
    }

    pub fn is_error(&self) -> bool {
        self.variant == NoticeVariant::Destructive
    }
}

/// Run `result` through the notice channel: success yields `success`,
/// failure yields a destructive notice titled `failure_title`.
pub fn notice_for<T>(
    result: &Result<T, EditorError>,
    success: impl FnOnce(&T) -> Notice,
    failure_title: &str,
) -> Notice {
    match result {
        Ok(value) => success(value),
        Err(error) => error.to_notice(failure_title),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_not_found_stays_not_found() {
        let err = EditorError::store("update document", StoreError::NotFound { entity: "document" });
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.to_string(), "document not found");
    }

    #[test]
    fn store_rejection_is_persistence_failure() {
        let err = EditorError::store(
            "update document",
            StoreError::Rejected { status: 409, message: "conflict".into() },
        );
        assert_eq!(err.kind(), ErrorKind::Persistence);
        assert_eq!(err.to_string(), "failed to update document: request rejected (409): conflict");
    }

    #[test]
    fn store_unauthorized_is_unauthenticated() {
        let err = EditorError::store(
            "save document",
            StoreError::Rejected { status: 401, message: "JWT expired".into() },
        );
        assert!(matches!(err, EditorError::Unauthenticated));
        assert_eq!(err.to_string(), "user not authenticated");

        let forbidden = EditorError::store(
            "save document",
            StoreError::Rejected { status: 403, message: "permission denied".into() },
        );
        assert_eq!(forbidden.kind(), ErrorKind::Persistence);
    }

    #[test]
    fn precondition_failures_are_validation() {
        assert_eq!(EditorError::validation("no document selected").kind(), ErrorKind::Validation);
        assert_eq!(EditorError::Unauthenticated.kind(), ErrorKind::Validation);
        assert_eq!(EditorError::InvalidPassword.kind(), ErrorKind::Validation);
    }

    #[test]
    fn unexpected_wraps_anyhow() {
        let err: EditorError = anyhow::anyhow!("boom").into();
        assert_eq!(err.kind(), ErrorKind::Unexpected);
        assert_eq!(err.to_string(), "boom");
    }

    #[test]
    fn notice_for_maps_both_outcomes() {
        let ok: Result<u32, EditorError> = Ok(3);
        let notice = notice_for(&ok, |n| Notice::info("Saved", format!("{n} changes")), "Save failed");
        assert!(!notice.is_error());
        assert_eq!(notice.description, "3 changes");

        let err: Result<u32, EditorError> = Err(EditorError::not_found("document"));
        let notice = notice_for(&err, |_| Notice::info("Saved", ""), "Save failed");
        assert!(notice.is_error());
        assert_eq!(notice.title, "Save failed");
        assert_eq!(notice.description, "document not found");
    }
}
