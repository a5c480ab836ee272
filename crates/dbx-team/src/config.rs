//! Client configuration: endpoints, credentials and rate-limit budgets.

use crate::error::{DropboxError, DropboxResult};
use crate::rate_limit::RateLimitPolicy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Base URLs for the two Dropbox endpoint families used here.
pub const API_BASE: &str = "https://api.dropboxapi.com/2";
pub const CONTENT_BASE: &str = "https://content.dropboxapi.com/2";

pub const DEFAULT_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_MEMBERS_PAGE_SIZE: u32 = 100;

const ENV_ACCESS_TOKEN: &str = "DROPBOX_ACCESS_TOKEN";
const ENV_SELECT_USER: &str = "DROPBOX_SELECT_USER";
const ENV_API_BASE: &str = "DROPBOX_API_BASE";
const ENV_CONTENT_BASE: &str = "DROPBOX_CONTENT_BASE";
const ENV_TIMEOUT_SECS: &str = "DROPBOX_TIMEOUT_SECS";

/// Configuration for a team Dropbox connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DropboxConfig {
    /// Team or user access token.
    pub access_token: Option<String>,
    /// Team member id sent as `Dropbox-API-Select-User`.
    pub select_user: Option<String>,
    /// RPC endpoint base.
    pub api_base: String,
    /// Content upload/download endpoint base.
    pub content_base: String,
    /// Per-request timeout handed to the HTTP transport.
    pub timeout_secs: u64,
    /// `limit` sent with `team/members/list_v2`.
    pub members_page_size: u32,
    pub rate_limits: RateLimitConfig,
}

impl Default for DropboxConfig {
    fn default() -> Self {
        Self {
            access_token: None,
            select_user: None,
            api_base: API_BASE.to_string(),
            content_base: CONTENT_BASE.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            members_page_size: DEFAULT_MEMBERS_PAGE_SIZE,
            rate_limits: RateLimitConfig::default(),
        }
    }
}

impl DropboxConfig {
    /// Config with a token and otherwise default settings.
    pub fn with_token(token: &str) -> Self {
        Self {
            access_token: Some(token.to_string()),
            ..Self::default()
        }
    }

    pub fn from_json_str(json: &str) -> DropboxResult<Self> {
        let cfg: Self =
            serde_json::from_str(json).map_err(|e| DropboxError::decode("config JSON", e))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Read a JSON config file, then apply environment overrides.
    pub fn load(path: impl AsRef<Path>) -> DropboxResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| DropboxError::io(path, e))?;
        let mut cfg: Self = serde_json::from_str(&raw)
            .map_err(|e| DropboxError::decode(format!("config file {}", path.display()), e))?;
        cfg.apply_env();
        cfg.validate()?;
        Ok(cfg)
    }

    /// Defaults overridden by `DROPBOX_*` environment variables.
    pub fn from_env() -> DropboxResult<Self> {
        let mut cfg = Self::default();
        cfg.apply_env();
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn apply_env(&mut self) {
        self.apply_vars(|key| std::env::var(key).ok());
    }

    fn apply_vars(&mut self, get: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| get(key).filter(|v| !v.trim().is_empty());
        if let Some(v) = get(ENV_ACCESS_TOKEN) {
            self.access_token = Some(v);
        }
        if let Some(v) = get(ENV_SELECT_USER) {
            self.select_user = Some(v);
        }
        if let Some(v) = get(ENV_API_BASE) {
            self.api_base = v;
        }
        if let Some(v) = get(ENV_CONTENT_BASE) {
            self.content_base = v;
        }
        if let Some(v) = get(ENV_TIMEOUT_SECS) {
            match v.trim().parse() {
                Ok(secs) => self.timeout_secs = secs,
                Err(_) => log::warn!("Ignoring non-numeric {ENV_TIMEOUT_SECS}={v}"),
            }
        }
    }

    pub fn validate(&self) -> DropboxResult<()> {
        validate_base("api_base", &self.api_base)?;
        validate_base("content_base", &self.content_base)?;
        if self.timeout_secs == 0 {
            return Err(DropboxError::config("timeout_secs must be greater than 0"));
        }
        if !(1..=1000).contains(&self.members_page_size) {
            return Err(DropboxError::config(
                "members_page_size must be between 1 and 1000",
            ));
        }
        self.rate_limits.validate()
    }

    /// Full URL of an RPC route.
    pub fn rpc_url(&self, route: &str) -> String {
        join(&self.api_base, route)
    }

    /// Full URL of a content route.
    pub fn content_url(&self, route: &str) -> String {
        join(&self.content_base, route)
    }
}

fn join(base: &str, route: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), route.trim_start_matches('/'))
}

fn validate_base(field: &str, value: &str) -> DropboxResult<()> {
    let url = url::Url::parse(value)
        .map_err(|e| DropboxError::config(format!("{field} '{value}' is not a valid URL: {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(DropboxError::config(format!(
            "{field} must use http or https, got '{other}'"
        ))),
    }
}

/// Default budget plus per-action overrides keyed by action name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub default: RateLimitPolicy,
    pub overrides: HashMap<String, RateLimitPolicy>,
}

impl RateLimitConfig {
    pub fn policy_for(&self, action: &str) -> RateLimitPolicy {
        self.overrides.get(action).copied().unwrap_or(self.default)
    }

    pub fn set(&mut self, action: &str, policy: RateLimitPolicy) {
        self.overrides.insert(action.to_string(), policy);
    }

    pub fn validate(&self) -> DropboxResult<()> {
        let all = std::iter::once(("default", &self.default))
            .chain(self.overrides.iter().map(|(k, v)| (k.as_str(), v)));
        for (name, p) in all {
            if p.max_calls == 0 || p.window_secs == 0 {
                return Err(DropboxError::config(format!(
                    "rate limit '{name}' needs max_calls > 0 and window_secs > 0"
                )));
            }
        }
        Ok(())
    }
}
