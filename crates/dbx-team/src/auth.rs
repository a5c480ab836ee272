//! Credentials stamped onto every outgoing request.

use crate::error::{DropboxError, DropboxResult};

pub const HEADER_SELECT_USER: &str = "Dropbox-API-Select-User";

/// Bearer token plus an optional team-member selector.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct AuthContext {
    token: String,
    select_user: Option<String>,
}

impl std::fmt::Debug for AuthContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthContext")
            .field("token_preview", &self.masked_token())
            .field("select_user", &self.select_user)
            .finish()
    }
}

impl AuthContext {
    /// Accepts tokens with or without a leading `Bearer `.
    pub fn new(token: &str, select_user: Option<&str>) -> DropboxResult<Self> {
        let token = token.trim();
        let token = token
            .strip_prefix("Bearer ")
            .or_else(|| token.strip_prefix("bearer "))
            .unwrap_or(token)
            .trim();
        if token.is_empty() {
            return Err(DropboxError::config("Dropbox access token must not be empty"));
        }
        Ok(Self {
            token: token.to_string(),
            select_user: select_user
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
        })
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn select_user(&self) -> Option<&str> {
        self.select_user.as_deref()
    }

    /// Value for the `Authorization` header.
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.token)
    }

    /// Show a masked version of the token for logging.
    pub fn masked_token(&self) -> String {
        let chars: Vec<char> = self.token.chars().collect();
        if chars.len() <= 8 {
            "****".into()
        } else {
            let head: String = chars[..4].iter().collect();
            let tail: String = chars[chars.len() - 4..].iter().collect();
            format!("{head}…{tail}")
        }
    }

    /// Headers for a request; `member_scoped` adds the select-user header
    /// when a selector is configured.
    pub fn headers(&self, member_scoped: bool) -> Vec<(String, String)> {
        let mut headers = vec![("Authorization".to_string(), self.bearer())];
        if member_scoped {
            if let Some(user) = &self.select_user {
                headers.push((HEADER_SELECT_USER.to_string(), user.clone()));
            }
        }
        headers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_token() {
        assert!(AuthContext::new("", None).is_err());
        assert!(AuthContext::new("Bearer   ", None).is_err());
    }

    #[test]
    fn strips_bearer_prefix() {
        let a = AuthContext::new("Bearer sl.abc123def456", None).unwrap();
        assert_eq!(a.token(), "sl.abc123def456");
        assert_eq!(a.bearer(), "Bearer sl.abc123def456");
    }

    #[test]
    fn masked_token_short() {
        let a = AuthContext::new("tiny", None).unwrap();
        assert_eq!(a.masked_token(), "****");
    }

    #[test]
    fn masked_token_long() {
        let a = AuthContext::new("sl.abcdef12345678", None).unwrap();
        let m = a.masked_token();
        assert!(m.starts_with("sl.a"));
        assert!(m.ends_with("5678"));
        assert!(m.contains('…'));
    }

    #[test]
    fn debug_hides_token() {
        let a = AuthContext::new("sl.secretsecretsecret", Some("dbmid:1")).unwrap();
        let dbg = format!("{a:?}");
        assert!(!dbg.contains("secretsecretsecret"));
        assert!(dbg.contains("dbmid:1"));
    }

    #[test]
    fn select_user_only_on_member_scoped() {
        let a = AuthContext::new("sl.tokenvalue", Some("dbmid:member")).unwrap();
        let team = a.headers(false);
        assert_eq!(team.len(), 1);
        let member = a.headers(true);
        assert!(member
            .iter()
            .any(|(k, v)| k == HEADER_SELECT_USER && v == "dbmid:member"));
    }

    #[test]
    fn blank_select_user_is_none() {
        let a = AuthContext::new("sl.tokenvalue", Some("  ")).unwrap();
        assert!(a.select_user().is_none());
        assert_eq!(a.headers(true).len(), 1);
    }
}
