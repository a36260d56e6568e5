use axum::{
    http::{Error as HttpError, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Failure kinds raised by the sandbox, the content lister and the playlist store.
#[derive(Error, Debug)]
pub enum LibraryError {
    #[error("path is outside the configured folder: {path}")]
    Rejected { path: String },

    #[error("not found: {what}")]
    NotFound { what: String },

    #[error("track index {index} is out of range for a playlist of {len} tracks")]
    OutOfRange { index: i64, len: usize },

    #[error("already exists: {name}")]
    AlreadyExists { name: String },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl LibraryError {
    pub fn rejected(path: impl Into<String>) -> Self {
        LibraryError::Rejected { path: path.into() }
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        LibraryError::NotFound { what: what.into() }
    }

    /// Keeps a missing file distinguishable from other I/O failures.
    pub fn from_io(err: std::io::Error, what: impl Into<String>) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            LibraryError::not_found(what)
        } else {
            LibraryError::Io(err)
        }
    }
}

pub type LibraryResult<T> = Result<T, LibraryError>;

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Library(#[from] LibraryError),

    #[error("Internal Server Error")]
    Internal(#[from] anyhow::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] HttpError),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Library(err) => match err {
                LibraryError::Rejected { .. } => StatusCode::FORBIDDEN,
                LibraryError::NotFound { .. } => StatusCode::NOT_FOUND,
                LibraryError::OutOfRange { .. } | LibraryError::InvalidArgument(_) => {
                    StatusCode::BAD_REQUEST
                }
                LibraryError::AlreadyExists { .. } => StatusCode::CONFLICT,
                LibraryError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            AppError::Internal(_) | AppError::Http(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("request failed: {}", self);
        }

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
