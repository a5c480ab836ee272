//! Team Dropbox client.
//!
//! Every public operation maps to one Dropbox API v2 endpoint and goes
//! through the same steps:
//! 1. consult the [`RateLimiter`] under the operation's action name; a blocked
//!    call returns [`DropboxError::RateLimited`] without touching the network
//! 2. stamp the auth headers and build one immutable [`ApiRequest`]
//! 3. send it through the [`Transport`] and shape the response

use crate::archive;
use crate::auth::AuthContext;
use crate::config::DropboxConfig;
use crate::error::{DropboxError, DropboxResult};
use crate::files;
use crate::folders;
use crate::rate_limit::{RateDecision, RateLimiter};
use crate::team;
use crate::transport::{ApiRequest, ApiResponse, DownloadedFile, ReqwestTransport, Transport};
use crate::types::*;
use log::{debug, info, warn};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Action keys used by the rate-limit gate, one per operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiAction {
    MembersList,
    MembersListContinue,
    MemberInfo,
    ListFolder,
    ListFolderContinue,
    DownloadFile,
    DownloadZip,
    Upload,
    DeleteFile,
    ExportFile,
    SearchFileFolder,
}

impl ApiAction {
    pub const ALL: [ApiAction; 11] = [
        Self::MembersList,
        Self::MembersListContinue,
        Self::MemberInfo,
        Self::ListFolder,
        Self::ListFolderContinue,
        Self::DownloadFile,
        Self::DownloadZip,
        Self::Upload,
        Self::DeleteFile,
        Self::ExportFile,
        Self::SearchFileFolder,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MembersList => "members_list",
            Self::MembersListContinue => "members_list_continue",
            Self::MemberInfo => "member_info",
            Self::ListFolder => "list_folder",
            Self::ListFolderContinue => "list_folder_continue",
            Self::DownloadFile => "download_file",
            Self::DownloadZip => "download_zip",
            Self::Upload => "upload",
            Self::DeleteFile => "delete_file",
            Self::ExportFile => "export_file",
            Self::SearchFileFolder => "search_file_folder",
        }
    }

    /// API route relative to its endpoint base.
    pub fn route(&self) -> &'static str {
        match self {
            Self::MembersList => "team/members/list_v2",
            Self::MembersListContinue => "team/members/list/continue_v2",
            Self::MemberInfo => "users/get_current_account",
            Self::ListFolder => "files/list_folder",
            Self::ListFolderContinue => "files/list_folder/continue",
            Self::DownloadFile => "files/download",
            Self::DownloadZip => "files/download_zip",
            Self::Upload => "files/upload",
            Self::DeleteFile => "files/delete_v2",
            Self::ExportFile => "files/export",
            Self::SearchFileFolder => "files/search_v2",
        }
    }

    /// Content endpoints live on `content.dropboxapi.com`.
    pub fn is_content(&self) -> bool {
        matches!(
            self,
            Self::DownloadFile | Self::DownloadZip | Self::Upload | Self::ExportFile
        )
    }

    /// Team-level routes act for the whole team, so the member selector is
    /// not sent with them.
    pub fn is_member_scoped(&self) -> bool {
        !matches!(self, Self::MembersList | Self::MembersListContinue)
    }
}

impl std::fmt::Display for ApiAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Dropbox team API client.
#[derive(Clone)]
pub struct DropboxClient {
    config: DropboxConfig,
    auth: Option<AuthContext>,
    limiter: RateLimiter,
    transport: Arc<dyn Transport>,
}

impl std::fmt::Debug for DropboxClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DropboxClient")
            .field("api_base", &self.config.api_base)
            .field("content_base", &self.config.content_base)
            .field("auth", &self.auth)
            .finish()
    }
}

impl DropboxClient {
    /// Client over the default `reqwest` transport with its own rate limiter.
    pub fn new(config: DropboxConfig) -> DropboxResult<Self> {
        config.validate()?;
        let transport = ReqwestTransport::new(Duration::from_secs(config.timeout_secs))?;
        Self::with_parts(config, Arc::new(transport), RateLimiter::new())
    }

    /// Client over a caller-supplied transport and limiter.
    ///
    /// Pass a clone of an existing limiter to share its budgets.
    pub fn with_parts(
        config: DropboxConfig,
        transport: Arc<dyn Transport>,
        limiter: RateLimiter,
    ) -> DropboxResult<Self> {
        config.validate()?;
        let auth = match config.access_token.as_deref() {
            Some(token) => Some(AuthContext::new(token, config.select_user.as_deref())?),
            None => None,
        };
        Ok(Self {
            config,
            auth,
            limiter,
            transport,
        })
    }

    /// Set the bearer token and optional team-member selector.
    pub fn auth(&mut self, token: &str, select_user: Option<&str>) -> DropboxResult<&mut Self> {
        let ctx = AuthContext::new(token, select_user)?;
        debug!("Dropbox auth set ({})", ctx.masked_token());
        self.auth = Some(ctx);
        Ok(self)
    }

    pub fn auth_context(&self) -> Option<&AuthContext> {
        self.auth.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.auth.is_some()
    }

    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    pub fn config(&self) -> &DropboxConfig {
        &self.config
    }

    // ── Plumbing ────────────────────────────────────────────────────

    fn gate(&self, action: ApiAction) -> DropboxResult<()> {
        let policy = self.config.rate_limits.policy_for(action.as_str());
        match self.limiter.check(action.as_str(), policy) {
            RateDecision::Allowed { remaining } => {
                debug!("{action}: allowed ({remaining} left in window)");
                Ok(())
            }
            RateDecision::Blocked { retry_after } => {
                warn!(
                    "{action}: local rate limit reached ({} calls / {}s), skipping request",
                    policy.max_calls, policy.window_secs
                );
                Err(DropboxError::RateLimited {
                    action: action.as_str().to_string(),
                    retry_after,
                })
            }
        }
    }

    /// Authenticated request skeleton for `action`.
    fn request(&self, action: ApiAction) -> DropboxResult<ApiRequest> {
        let auth = self.auth.as_ref().ok_or(DropboxError::NotAuthenticated)?;
        let url = if action.is_content() {
            self.config.content_url(action.route())
        } else {
            self.config.rpc_url(action.route())
        };
        debug!("{action}: POST {url} as {}", auth.masked_token());
        Ok(ApiRequest::post(url).headers(auth.headers(action.is_member_scoped())))
    }

    async fn rpc(&self, action: ApiAction, body: serde_json::Value) -> DropboxResult<ApiResponse> {
        self.gate(action)?;
        let request = self.request(action)?.json(body);
        self.transport.send(request).await?.check_errors()
    }

    async fn download_to(
        &self,
        action: ApiAction,
        remote: &str,
        dest: &Path,
    ) -> DropboxResult<DownloadedFile> {
        self.gate(action)?;
        let request = self
            .request(action)?
            .api_arg(&files::build_download_arg(remote));
        if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| DropboxError::io(parent, e))?;
        }
        self.transport.download(request, dest).await
    }

    // ━━━━━━━━━━━━━━  Team  ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// List team members (first page).
    pub async fn list_members(&self) -> DropboxResult<Vec<TeamMember>> {
        Ok(self.list_members_page().await?.members)
    }

    /// First page of team members, with the cursor for continuation.
    pub async fn list_members_page(&self) -> DropboxResult<TeamMembersListResult> {
        let body = team::build_members_list(self.config.members_page_size, false);
        let resp = self.rpc(ApiAction::MembersList, body).await?;
        Ok(resp
            .json_opt::<TeamMembersListResult>("team/members/list_v2 response")?
            .unwrap_or_default())
    }

    pub async fn list_members_continue(&self, cursor: &str) -> DropboxResult<TeamMembersListResult> {
        let body = team::build_members_list_continue(cursor);
        let resp = self.rpc(ApiAction::MembersListContinue, body).await?;
        Ok(resp
            .json_opt::<TeamMembersListResult>("team/members/list/continue_v2 response")?
            .unwrap_or_default())
    }

    /// Account of the member selected by `Dropbox-API-Select-User`.
    pub async fn member_info(&self) -> DropboxResult<FullAccount> {
        let resp = self
            .rpc(ApiAction::MemberInfo, team::build_get_current_account())
            .await?;
        resp.json_opt::<FullAccount>("users/get_current_account response")?
            .ok_or_else(|| DropboxError::Server {
                status: resp.status,
                summary: "empty account response".into(),
                retry_after: None,
            })
    }

    // ━━━━━━━━━━━━━━  Folders  ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Entries directly under `path`; empty when the response has no data.
    pub async fn list_folder(&self, path: &str) -> DropboxResult<Vec<Metadata>> {
        Ok(self.list_folder_page(path).await?.entries)
    }

    pub async fn list_folder_page(&self, path: &str) -> DropboxResult<ListFolderResult> {
        let resp = self
            .rpc(ApiAction::ListFolder, folders::build_list_folder(path))
            .await?;
        Ok(resp
            .json_opt::<ListFolderResult>("files/list_folder response")?
            .unwrap_or_default())
    }

    pub async fn list_folder_continue(&self, cursor: &str) -> DropboxResult<ListFolderResult> {
        let resp = self
            .rpc(
                ApiAction::ListFolderContinue,
                folders::build_list_folder_continue(cursor),
            )
            .await?;
        Ok(resp
            .json_opt::<ListFolderResult>("files/list_folder/continue response")?
            .unwrap_or_default())
    }

    // ━━━━━━━━━━━━━━  Content  ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Download one file (by path or `id:`) to `dest`.
    pub async fn download_file(
        &self,
        remote: &str,
        dest: impl AsRef<Path>,
    ) -> DropboxResult<FileDownload> {
        let dest = dest.as_ref();
        let downloaded = self.download_to(ApiAction::DownloadFile, remote, dest).await?;
        let metadata: Option<Metadata> =
            download_result(&downloaded, dest, "files/download result").await?;
        info!(
            "Downloaded {} ({}) to {}",
            remote,
            format_bytes(downloaded.bytes),
            dest.display()
        );
        Ok(FileDownload {
            path: dest.to_path_buf(),
            bytes: downloaded.bytes,
            metadata,
        })
    }

    /// Download a folder as a zip to `dest`.
    ///
    /// With `extract`, the archive is unpacked into `dirname(dest)/folder/`
    /// and the zip is removed. Extraction failures keep the zip on disk.
    pub async fn download_zip(
        &self,
        remote: &str,
        dest: impl AsRef<Path>,
        extract: bool,
        folder: Option<&str>,
    ) -> DropboxResult<ZipDownload> {
        let dest = dest.as_ref();
        let downloaded = self.download_to(ApiAction::DownloadZip, remote, dest).await?;
        let folder_meta =
            download_result::<DownloadZipResult>(&downloaded, dest, "files/download_zip result")
                .await?
                .map(|r| Metadata {
                    tag: MetadataTag::Folder,
                    ..r.metadata
                });
        info!(
            "Downloaded zip of {} ({}) to {}",
            remote,
            format_bytes(downloaded.bytes),
            dest.display()
        );

        let mut result = ZipDownload {
            zip_path: dest.to_path_buf(),
            bytes: downloaded.bytes,
            folder: folder_meta,
            extracted_to: None,
            entries: 0,
        };
        if !extract {
            return Ok(result);
        }

        let target = archive::extraction_dir(dest, folder);
        result.entries = archive::extract_zip(dest, &target).await?;
        tokio::fs::remove_file(dest)
            .await
            .map_err(|e| DropboxError::io(dest, e))?;
        result.extracted_to = Some(target);
        Ok(result)
    }

    /// Upload `local` to `remote`, overwriting (autorename on conflict).
    ///
    /// The server's content hash is checked against the local file.
    pub async fn upload(&self, local: impl AsRef<Path>, remote: &str) -> DropboxResult<Metadata> {
        let local = local.as_ref();
        self.gate(ApiAction::Upload)?;
        let (local_hash, size) = files::hash_file(local).await?;

        let arg = files::build_upload_arg(remote, true);
        let request = self
            .request(ApiAction::Upload)?
            .header("Content-Type", "application/octet-stream")
            .api_arg(&arg)
            .file(PathBuf::from(local));
        let resp = self.transport.send(request).await?.check_errors()?;
        let metadata = resp
            .json_opt::<Metadata>("files/upload response")?
            .ok_or_else(|| DropboxError::Server {
                status: resp.status,
                summary: "empty upload response".into(),
                retry_after: None,
            })?;

        if let Some(remote_hash) = metadata.content_hash.as_deref() {
            if !remote_hash.eq_ignore_ascii_case(&local_hash) {
                return Err(DropboxError::ContentHashMismatch {
                    path: remote.to_string(),
                    local: local_hash,
                    remote: remote_hash.to_string(),
                });
            }
        }
        info!(
            "Uploaded {} ({}) to {}",
            local.display(),
            format_bytes(size),
            metadata.path_display.as_deref().unwrap_or(remote)
        );
        Ok(metadata)
    }

    /// Delete a file or folder; returns the metadata of what was removed.
    pub async fn delete_file(&self, remote: &str) -> DropboxResult<Metadata> {
        let resp = self
            .rpc(ApiAction::DeleteFile, files::build_delete(remote))
            .await?;
        resp.json_opt::<DeleteResult>("files/delete_v2 response")?
            .map(|r| r.metadata)
            .ok_or_else(|| DropboxError::Server {
                status: resp.status,
                summary: "empty delete response".into(),
                retry_after: None,
            })
    }

    /// Export a non-downloadable file (e.g. a Google Doc stored in Dropbox).
    ///
    /// The exported bytes are returned in [`ExportResult::content`].
    pub async fn export_file(&self, remote: &str) -> DropboxResult<ExportResult> {
        self.gate(ApiAction::ExportFile)?;
        let request = self
            .request(ApiAction::ExportFile)?
            .api_arg(&files::build_download_arg(remote));
        // The body is the exported document, so only the status signals failure.
        let resp = self.transport.send(request).await?.check_status()?;
        let mut result = resp
            .api_result_as::<ExportResult>("files/export result")?
            .unwrap_or_default();
        result.content = resp.body;
        Ok(result)
    }

    // ━━━━━━━━━━━━━━  Search  ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Search names and contents under `path`; empty when nothing matches.
    pub async fn search_file_folder(
        &self,
        query: &str,
        path: &str,
        max_results: Option<u64>,
    ) -> DropboxResult<Vec<SearchMatch>> {
        let max = max_results.unwrap_or(files::DEFAULT_SEARCH_MAX_RESULTS);
        let body = files::build_search(query, folders::normalize_root(path), max);
        let resp = self.rpc(ApiAction::SearchFileFolder, body).await?;
        Ok(resp
            .json_opt::<SearchV2Result>("files/search_v2 response")?
            .map(|r| r.matches)
            .unwrap_or_default())
    }
}

/// Decode a finished download's result header. If it does not decode, the
/// downloaded file is removed before the error is returned.
async fn download_result<T: DeserializeOwned>(
    downloaded: &DownloadedFile,
    dest: &Path,
    context: &str,
) -> DropboxResult<Option<T>> {
    match downloaded.api_result_as::<T>(context) {
        Ok(result) => Ok(result),
        Err(e) => {
            if let Err(rm) = tokio::fs::remove_file(dest).await {
                warn!("Could not remove {}: {rm}", dest.display());
            }
            Err(e)
        }
    }
}
