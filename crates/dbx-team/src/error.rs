//! Error types for the Dropbox team client.
//!
//! Every public operation returns a [`DropboxResult`]. A call blocked by the
//! local rate-limit gate is reported as [`DropboxError::RateLimited`] and never
//! reaches the network.

use std::path::PathBuf;
use std::time::Duration;

/// Convenience type alias.
pub type DropboxResult<T> = Result<T, DropboxError>;

#[derive(Debug, thiserror::Error)]
pub enum DropboxError {
    /// The local call budget for `action` is exhausted for the current window.
    #[error("rate limited: '{action}' budget exhausted, window resets in {}s", retry_after.as_secs())]
    RateLimited { action: String, retry_after: Duration },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Dropbox answered with an error status or an error envelope.
    #[error("Dropbox API error {status}: {summary}")]
    Server {
        status: u16,
        summary: String,
        retry_after: Option<u64>,
    },

    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error("I/O error on '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode {context}: {source}")]
    Decode {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("content hash mismatch for '{path}': local {local}, remote {remote}")]
    ContentHashMismatch {
        path: String,
        local: String,
        remote: String,
    },

    #[error("no access token configured")]
    NotAuthenticated,

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl DropboxError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn decode(context: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Decode {
            context: context.into(),
            source,
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// True when the call was skipped by the local rate-limit gate.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }

    /// Whether a host may reasonably retry the call later.
    ///
    /// The client itself never retries.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimited { .. } => true,
            Self::Server { status, .. } => *status == 429 || *status >= 500,
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }

    /// Status code for server-side failures.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Server { status, .. } => Some(*status),
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Zip extraction failure.
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    /// The file could not be opened or is not a readable zip archive.
    #[error("cannot open archive '{}': {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    /// The archive opened but writing its entries failed.
    #[error("cannot extract archive '{}' into '{}': {source}", path.display(), target.display())]
    Extract {
        path: PathBuf,
        target: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("extraction task failed: {0}")]
    Join(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limited_is_distinguishable() {
        let e = DropboxError::RateLimited {
            action: "upload".into(),
            retry_after: Duration::from_secs(42),
        };
        assert!(e.is_rate_limited());
        assert!(e.is_retryable());
        assert!(e.to_string().contains("upload"));
        assert!(e.to_string().contains("42s"));
    }

    #[test]
    fn server_error_retryable_only_for_429_and_5xx() {
        let server = |status| DropboxError::Server {
            status,
            summary: "x".into(),
            retry_after: None,
        };
        assert!(server(429).is_retryable());
        assert!(server(503).is_retryable());
        assert!(!server(409).is_retryable());
        assert_eq!(server(409).status(), Some(409));
    }

    #[test]
    fn config_error_not_retryable() {
        let e = DropboxError::config("bad base url");
        assert!(!e.is_retryable());
        assert!(!e.is_rate_limited());
        assert_eq!(e.status(), None);
    }

    #[test]
    fn archive_error_keeps_cause() {
        let e: DropboxError = ArchiveError::Open {
            path: "/tmp/x.zip".into(),
            source: zip::result::ZipError::InvalidArchive("bad magic".into()),
        }
        .into();
        let msg = e.to_string();
        assert!(msg.contains("/tmp/x.zip"));
        assert!(std::error::Error::source(&e).is_some());
    }
}
