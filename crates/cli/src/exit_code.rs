// Consistent exit codes for the idox CLI.
//
//   0  = success
//   1  = general error
//   2  = usage/validation error
//   3  = document not found
//   11 = authentication error
//   13 = network error

use std::process;

use idox_editor::error::{EditorError, ErrorKind};
use idox_editor::store::StoreError;

/// Named exit codes for the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    Success = 0,
    Error = 1,
    Usage = 2,
    NotFound = 3,
    Auth = 11,
    Network = 13,
}

impl ExitCode {
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Map an anyhow error to an exit code by inspecting the error chain.
    pub fn from_error(err: &anyhow::Error) -> Self {
        for cause in err.chain() {
            if let Some(editor_error) = cause.downcast_ref::<EditorError>() {
                return Self::from_editor_error(editor_error);
            }
            if let Some(store_error) = cause.downcast_ref::<StoreError>() {
                return Self::from_store_error(store_error);
            }
        }
        Self::Error
    }

    fn from_editor_error(error: &EditorError) -> Self {
        match error {
            EditorError::Unauthenticated => Self::Auth,
            EditorError::Persistence { source, .. } => Self::from_store_error(source),
            other => match other.kind() {
                ErrorKind::Validation => Self::Usage,
                ErrorKind::NotFound => Self::NotFound,
                ErrorKind::Persistence | ErrorKind::Unexpected => Self::Error,
            },
        }
    }

    fn from_store_error(error: &StoreError) -> Self {
        match error {
            StoreError::NotFound { .. } => Self::NotFound,
            StoreError::Network(_) => Self::Network,
            StoreError::Rejected { status: 403, .. } => Self::Auth,
            _ => Self::Error,
        }
    }
}

impl From<ExitCode> for process::ExitCode {
    fn from(code: ExitCode) -> Self {
        process::ExitCode::from(code.code() as u8)
    }
}
