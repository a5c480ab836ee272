//! Folder listing request bodies.

/// Build a list_folder request body.
pub fn build_list_folder(path: &str) -> serde_json::Value {
    serde_json::json!({ "path": normalize_root(path) })
}

/// Build a list_folder/continue request body.
pub fn build_list_folder_continue(cursor: &str) -> serde_json::Value {
    serde_json::json!({ "cursor": cursor })
}

/// Dropbox spells the root folder as the empty string, not `/`.
pub fn normalize_root(path: &str) -> &str {
    if path == "/" {
        ""
    } else {
        path
    }
}
