//! Team administration requests (Business / Enterprise accounts).

/// Build team/members/list_v2 request body.
pub fn build_members_list(limit: u32, include_removed: bool) -> serde_json::Value {
    serde_json::json!({
        "limit": limit,
        "include_removed": include_removed,
    })
}

/// Build team/members/list/continue_v2 request body.
pub fn build_members_list_continue(cursor: &str) -> serde_json::Value {
    serde_json::json!({ "cursor": cursor })
}

/// Build users/get_current_account request (no arguments needed).
///
/// Sent with `Dropbox-API-Select-User` it returns the selected member's account.
pub fn build_get_current_account() -> serde_json::Value {
    serde_json::json!(null)
}
