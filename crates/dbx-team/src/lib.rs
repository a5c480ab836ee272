//! # dbx-team – Dropbox Team API Client
//!
//! Dropbox API v2 client for team (Business / Enterprise) tokens:
//!
//! - **Team**: list team members, read the selected member's account
//! - **Folders**: list folder entries with cursor continuation
//! - **Content**: download files, download folders as zip (with optional
//!   extraction), upload, export
//! - **Files**: delete, search
//! - **Rate limiting**: fixed-window budget per action, checked before any
//!   request leaves the process
//!
//! Every call goes through a [`Transport`], so tests swap the HTTP layer out.

pub mod archive;
pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod files;
pub mod folders;
pub mod rate_limit;
pub mod team;
pub mod transport;
pub mod types;

pub use auth::AuthContext;
pub use client::{ApiAction, DropboxClient};
pub use config::{DropboxConfig, RateLimitConfig};
pub use error::{ArchiveError, DropboxError, DropboxResult};
pub use rate_limit::{
    Clock, ManualClock, RateDecision, RateLimitPolicy, RateLimitRecord, RateLimiter, SystemClock,
};
pub use transport::{ApiRequest, ApiResponse, RequestBody, ReqwestTransport, Transport};
