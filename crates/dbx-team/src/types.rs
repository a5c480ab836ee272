//! Shared types for the Dropbox API v2 endpoints used by the team client.
//!
//! Models the Dropbox HTTP API responses and request payloads so that
//! the client can hand strongly-typed Rust values back to callers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Dropbox API Error
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Dropbox API v2 error envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DropboxApiError {
    #[serde(default)]
    pub error_summary: Option<String>,
    #[serde(default)]
    pub error: Option<serde_json::Value>,
    #[serde(default)]
    pub user_message: Option<DropboxUserMessage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DropboxUserMessage {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub locale: Option<String>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Metadata: Files & Folders
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Tag used to discriminate file vs folder vs deleted.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MetadataTag {
    /// Endpoints that return plain `FileMetadata` (upload, download) omit the tag.
    #[default]
    File,
    Folder,
    Deleted,
}

/// Unified metadata entry (Dropbox returns a union type).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(rename = ".tag", default)]
    pub tag: MetadataTag,
    pub name: String,
    #[serde(default)]
    pub path_lower: Option<String>,
    #[serde(default)]
    pub path_display: Option<String>,
    #[serde(default)]
    pub id: Option<String>,

    // File-specific fields
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub rev: Option<String>,
    #[serde(default)]
    pub content_hash: Option<String>,
    #[serde(default)]
    pub client_modified: Option<DateTime<Utc>>,
    #[serde(default)]
    pub server_modified: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_downloadable: Option<bool>,
    #[serde(default)]
    pub sharing_info: Option<serde_json::Value>,
    #[serde(default)]
    pub has_explicit_shared_members: Option<bool>,
}

impl Metadata {
    pub fn is_file(&self) -> bool {
        self.tag == MetadataTag::File
    }

    pub fn is_folder(&self) -> bool {
        self.tag == MetadataTag::Folder
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  List Folder
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListFolderResult {
    #[serde(default)]
    pub entries: Vec<Metadata>,
    #[serde(default)]
    pub cursor: String,
    #[serde(default)]
    pub has_more: bool,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  File Operations
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Result of `files/delete_v2`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteResult {
    pub metadata: Metadata,
}

/// Outcome of a single-file download.
#[derive(Debug, Clone)]
pub struct FileDownload {
    pub path: PathBuf,
    pub bytes: u64,
    /// Decoded from the `Dropbox-API-Result` response header.
    pub metadata: Option<Metadata>,
}

/// `Dropbox-API-Result` payload of `files/download_zip`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadZipResult {
    pub metadata: Metadata,
}

/// Outcome of a folder-as-zip download.
#[derive(Debug, Clone)]
pub struct ZipDownload {
    /// Where the zip was written; it no longer exists once extracted.
    pub zip_path: PathBuf,
    pub bytes: u64,
    pub folder: Option<Metadata>,
    /// Set when the archive was extracted (and the zip removed).
    pub extracted_to: Option<PathBuf>,
    pub entries: usize,
}

/// `Dropbox-API-Result` payload of `files/export`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExportResult {
    #[serde(default)]
    pub export_metadata: Option<ExportMetadata>,
    #[serde(default)]
    pub file_metadata: Option<Metadata>,
    /// Exported file bytes from the response body.
    #[serde(skip)]
    pub content: Vec<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportMetadata {
    pub name: String,
    pub size: u64,
    #[serde(default)]
    pub export_hash: Option<String>,
    #[serde(default)]
    pub paper_revision: Option<i64>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Search
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    Active,
    Deleted,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchV2Result {
    #[serde(default)]
    pub matches: Vec<SearchMatch>,
    #[serde(default)]
    pub cursor: Option<String>,
    #[serde(default)]
    pub has_more: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchMatch {
    #[serde(default)]
    pub match_type: Option<SearchMatchType>,
    pub metadata: SearchMatchMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchMatchType {
    #[serde(rename = ".tag")]
    pub tag: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchMatchMetadata {
    pub metadata: Metadata,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Account
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FullAccount {
    pub account_id: String,
    pub name: AccountName,
    pub email: String,
    #[serde(default)]
    pub email_verified: Option<bool>,
    #[serde(default)]
    pub disabled: Option<bool>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub locale: Option<String>,
    #[serde(default)]
    pub account_type: Option<AccountType>,
    #[serde(default)]
    pub team: Option<serde_json::Value>,
    #[serde(default)]
    pub team_member_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountName {
    pub given_name: String,
    pub surname: String,
    pub familiar_name: String,
    pub display_name: String,
    #[serde(default)]
    pub abbreviated_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountType {
    #[serde(rename = ".tag")]
    pub tag: String,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Team
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamMember {
    pub profile: TeamMemberProfile,
    #[serde(default)]
    pub roles: Option<Vec<TeamMemberRole>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamMemberProfile {
    pub team_member_id: String,
    pub account_id: String,
    pub email: String,
    #[serde(default)]
    pub email_verified: Option<bool>,
    #[serde(default)]
    pub name: Option<AccountName>,
    #[serde(default)]
    pub status: Option<TeamMemberStatus>,
    #[serde(default)]
    pub membership_type: Option<serde_json::Value>,
    #[serde(default)]
    pub joined_on: Option<DateTime<Utc>>,
    #[serde(default)]
    pub external_id: Option<String>,
    #[serde(default)]
    pub persistent_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamMemberRole {
    pub role_id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamMemberStatus {
    #[serde(rename = ".tag")]
    pub tag: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TeamMembersListResult {
    #[serde(default)]
    pub members: Vec<TeamMember>,
    #[serde(default)]
    pub cursor: String,
    #[serde(default)]
    pub has_more: bool,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Content Hash
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Dropbox content hash: SHA-256 of 4 MB block hashes concatenated.
pub const CONTENT_HASH_BLOCK_SIZE: usize = 4 * 1024 * 1024;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Helper: format bytes
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = 1024 * KB;
    const GB: u64 = 1024 * MB;
    const TB: u64 = 1024 * GB;

    if bytes >= TB {
        format!("{:.2} TB", bytes as f64 / TB as f64)
    } else if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
