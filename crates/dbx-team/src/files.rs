//! File operations: request arguments for upload, download, delete,
//! export and search, plus content hashing.

use crate::error::{DropboxError, DropboxResult};
use crate::types::*;
use sha2::{Digest, Sha256};
use std::path::Path;
use tokio::io::AsyncReadExt;

/// Search result cap used when the caller does not pick one.
pub const DEFAULT_SEARCH_MAX_RESULTS: u64 = 20;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Request Builders
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Build the upload arg header. Uploads always overwrite the target.
pub fn build_upload_arg(path: &str, autorename: bool) -> serde_json::Value {
    serde_json::json!({
        "path": path,
        "mode": "overwrite",
        "autorename": autorename,
        "mute": false,
        "strict_conflict": false,
    })
}

/// Build a download arg header (also used by `download_zip` and `export`).
pub fn build_download_arg(path: &str) -> serde_json::Value {
    serde_json::json!({ "path": path })
}

/// Build a delete request body.
pub fn build_delete(path: &str) -> serde_json::Value {
    serde_json::json!({ "path": path })
}

/// Build a search_v2 request body.
///
/// Only active files are matched, against names and content, without
/// highlight spans.
pub fn build_search(query: &str, path: &str, max_results: u64) -> serde_json::Value {
    serde_json::json!({
        "query": query,
        "options": {
            "path": path,
            "max_results": max_results.clamp(1, 1000),
            "file_status": FileStatus::Active,
            "filename_only": false,
        },
        "match_field_options": {
            "include_highlights": false,
        },
    })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Content Hash
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Compute the Dropbox content hash for a byte slice.
///
/// Algorithm: split data into 4 MB blocks, SHA-256 each block,
/// then SHA-256 the concatenated block hashes.
pub fn content_hash(data: &[u8]) -> String {
    let mut overall = Sha256::new();
    for chunk in data.chunks(CONTENT_HASH_BLOCK_SIZE) {
        let block_hash = Sha256::digest(chunk);
        overall.update(block_hash);
    }
    hex::encode(overall.finalize())
}

/// Compute content hash for data that arrives in segments.
pub struct ContentHasher {
    overall: Sha256,
    block: Sha256,
    block_offset: usize,
}

impl ContentHasher {
    pub fn new() -> Self {
        Self {
            overall: Sha256::new(),
            block: Sha256::new(),
            block_offset: 0,
        }
    }

    pub fn update(&mut self, data: &[u8]) {
        let mut remaining = data;
        while !remaining.is_empty() {
            let space = CONTENT_HASH_BLOCK_SIZE - self.block_offset;
            let take = remaining.len().min(space);
            self.block.update(&remaining[..take]);
            self.block_offset += take;
            remaining = &remaining[take..];

            if self.block_offset == CONTENT_HASH_BLOCK_SIZE {
                let block_hash = std::mem::replace(&mut self.block, Sha256::new()).finalize();
                self.overall.update(block_hash);
                self.block_offset = 0;
            }
        }
    }

    pub fn finalize(mut self) -> String {
        if self.block_offset > 0 {
            let block_hash = self.block.finalize();
            self.overall.update(block_hash);
        }
        hex::encode(self.overall.finalize())
    }
}

impl Default for ContentHasher {
    fn default() -> Self {
        Self::new()
    }
}

/// Stream a local file through [`ContentHasher`]. Returns `(hash, size)`.
pub async fn hash_file(path: &Path) -> DropboxResult<(String, u64)> {
    let mut file = tokio::fs::File::open(path)
        .await
        .map_err(|e| DropboxError::io(path, e))?;
    let mut hasher = ContentHasher::new();
    let mut buf = vec![0u8; 64 * 1024];
    let mut total = 0u64;
    loop {
        let n = file.read(&mut buf).await.map_err(|e| DropboxError::io(path, e))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        total += n as u64;
    }
    Ok((hasher.finalize(), total))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_arg_matches_overwrite_policy() {
        let v = build_upload_arg("/x.txt", true);
        assert_eq!(
            v,
            serde_json::json!({
                "path": "/x.txt",
                "mode": "overwrite",
                "autorename": true,
                "mute": false,
                "strict_conflict": false,
            })
        );
    }

    #[test]
    fn upload_arg_without_autorename() {
        let v = build_upload_arg("/x.txt", false);
        assert_eq!(v["autorename"], false);
        assert_eq!(v["mode"], "overwrite");
    }

    #[test]
    fn download_arg_path() {
        let v = build_download_arg("id:a4ayc_80_OEAAAAAAAAAYa");
        assert_eq!(v["path"], "id:a4ayc_80_OEAAAAAAAAAYa");
    }

    #[test]
    fn delete_body() {
        let v = build_delete("/trash.txt");
        assert_eq!(v["path"], "/trash.txt");
    }

    #[test]
    fn search_body_shape() {
        let v = build_search("invoice", "/Finance", 20);
        assert_eq!(v["query"], "invoice");
        assert_eq!(v["options"]["path"], "/Finance");
        assert_eq!(v["options"]["max_results"], 20);
        assert_eq!(v["options"]["file_status"], "active");
        assert_eq!(v["options"]["filename_only"], false);
        assert_eq!(v["match_field_options"]["include_highlights"], false);
    }

    #[test]
    fn search_max_results_clamped() {
        assert_eq!(build_search("q", "", 0)["options"]["max_results"], 1);
        assert_eq!(build_search("q", "", 5000)["options"]["max_results"], 1000);
    }

    #[test]
    fn content_hash_empty() {
        let h = content_hash(b"");
        assert_eq!(h.len(), 64); // SHA-256 = 32 bytes = 64 hex
    }

    #[test]
    fn content_hash_differs() {
        assert_ne!(content_hash(b"aaa"), content_hash(b"bbb"));
    }

    #[test]
    fn content_hasher_streaming() {
        let full = content_hash(b"hello world, this is a streaming test");
        let mut hasher = ContentHasher::new();
        hasher.update(b"hello world, ");
        hasher.update(b"this is a streaming test");
        assert_eq!(hasher.finalize(), full);
    }

    #[test]
    fn content_hasher_across_block_boundary() {
        let data = vec![7u8; CONTENT_HASH_BLOCK_SIZE + 10];
        let mut hasher = ContentHasher::new();
        for chunk in data.chunks(999_999) {
            hasher.update(chunk);
        }
        assert_eq!(hasher.finalize(), content_hash(&data));
    }

    #[tokio::test]
    async fn hash_file_matches_in_memory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.bin");
        tokio::fs::write(&path, b"dropbox content").await.unwrap();
        let (hash, size) = hash_file(&path).await.unwrap();
        assert_eq!(size, 15);
        assert_eq!(hash, content_hash(b"dropbox content"));
    }

    #[tokio::test]
    async fn hash_file_missing() {
        let err = hash_file(Path::new("/no/such/file.bin")).await.unwrap_err();
        assert!(matches!(err, DropboxError::Io { .. }));
    }
}
