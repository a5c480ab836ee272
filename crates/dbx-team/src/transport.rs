//! HTTP transport for the Dropbox API v2.
//!
//! The client builds one immutable [`ApiRequest`] per call and hands it to a
//! [`Transport`]. [`ReqwestTransport`] is the production implementation:
//! - JSON bodies for RPC endpoints
//! - streamed file bodies for content uploads
//! - streamed-to-disk bodies for content downloads
//!
//! Transports never retry; errors propagate to the caller unchanged.

use crate::error::{DropboxError, DropboxResult};
use crate::types::DropboxApiError;
use async_trait::async_trait;
use futures::StreamExt;
use log::debug;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE, RETRY_AFTER};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;

pub const HEADER_API_ARG: &str = "Dropbox-API-Arg";
pub const HEADER_API_RESULT: &str = "Dropbox-API-Result";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Request
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Empty,
    Json(serde_json::Value),
    /// Local file streamed as `application/octet-stream`.
    File(PathBuf),
}

/// A single POST to a Dropbox endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: RequestBody,
}

impl ApiRequest {
    pub fn post(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: Vec::new(),
            body: RequestBody::Empty,
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn headers(mut self, headers: impl IntoIterator<Item = (String, String)>) -> Self {
        self.headers.extend(headers);
        self
    }

    pub fn json(mut self, body: serde_json::Value) -> Self {
        self.body = RequestBody::Json(body);
        self
    }

    pub fn file(mut self, path: impl Into<PathBuf>) -> Self {
        self.body = RequestBody::File(path.into());
        self
    }

    /// Attach the serialized `Dropbox-API-Arg` header.
    pub fn api_arg(self, arg: &serde_json::Value) -> Self {
        self.header(HEADER_API_ARG, encode_api_arg(arg))
    }

    /// Case-insensitive header lookup.
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Serialize an API arg for use as an HTTP header value.
///
/// Header values must be ASCII, so every character outside printable ASCII
/// is written as a JSON `\uXXXX` escape (surrogate pairs above the BMP).
pub fn encode_api_arg(arg: &serde_json::Value) -> String {
    let raw = arg.to_string();
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        if ch.is_ascii() && ch != '\u{7f}' {
            out.push(ch);
        } else {
            let mut units = [0u16; 2];
            for unit in ch.encode_utf16(&mut units) {
                out.push_str(&format!("\\u{:04x}", unit));
            }
        }
    }
    out
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Response
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Default)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Vec<u8>,
    /// Raw `Dropbox-API-Result` header, sent by content endpoints.
    pub api_result: Option<String>,
    /// `Retry-After` seconds, when present.
    pub retry_after: Option<u64>,
}

impl ApiResponse {
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        Self {
            status: 200,
            body: body.into(),
            ..Self::default()
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Error-check step: surfaces error statuses and error envelopes
    /// carried by a 2xx body.
    pub fn check_errors(self) -> DropboxResult<Self> {
        if !self.is_success() {
            return Err(server_error(self.status, &self.body, self.retry_after));
        }
        if let Ok(envelope) = serde_json::from_slice::<serde_json::Value>(&self.body) {
            if let Some(summary) = envelope.get("error_summary").and_then(|s| s.as_str()) {
                return Err(DropboxError::Server {
                    status: self.status,
                    summary: summary.to_string(),
                    retry_after: self.retry_after,
                });
            }
        }
        Ok(self)
    }

    /// Status-only check for endpoints whose 2xx body is file content.
    pub fn check_status(self) -> DropboxResult<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(server_error(self.status, &self.body, self.retry_after))
        }
    }

    /// Decode the body; an empty or `null` body yields `None`.
    pub fn json_opt<T: DeserializeOwned>(&self, context: &str) -> DropboxResult<Option<T>> {
        decode_opt(&self.body, context)
    }

    /// Decode the `Dropbox-API-Result` header, if any.
    pub fn api_result_as<T: DeserializeOwned>(&self, context: &str) -> DropboxResult<Option<T>> {
        match &self.api_result {
            Some(raw) => decode_opt(raw.as_bytes(), context),
            None => Ok(None),
        }
    }
}

/// Result of streaming a response body to disk.
#[derive(Debug, Clone, Default)]
pub struct DownloadedFile {
    pub bytes: u64,
    pub api_result: Option<String>,
}

impl DownloadedFile {
    pub fn api_result_as<T: DeserializeOwned>(&self, context: &str) -> DropboxResult<Option<T>> {
        match &self.api_result {
            Some(raw) => decode_opt(raw.as_bytes(), context),
            None => Ok(None),
        }
    }
}

fn decode_opt<T: DeserializeOwned>(raw: &[u8], context: &str) -> DropboxResult<Option<T>> {
    let trimmed = trim_ascii_whitespace(raw);
    if trimmed.is_empty() || trimmed == b"null" {
        return Ok(None);
    }
    // Bytes that are not UTF-8 fail here as a decode error.
    serde_json::from_slice(trimmed)
        .map(Some)
        .map_err(|e| DropboxError::decode(context, e))
}

fn trim_ascii_whitespace(raw: &[u8]) -> &[u8] {
    let start = raw
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(raw.len());
    let end = raw
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(start, |i| i + 1);
    &raw[start..end]
}

/// Build a `Server` error from a failed response body.
pub fn server_error(status: u16, body: &[u8], retry_after: Option<u64>) -> DropboxError {
    let text = String::from_utf8_lossy(body);
    let summary = match serde_json::from_str::<DropboxApiError>(&text) {
        Ok(e) => e
            .error_summary
            .or_else(|| e.user_message.and_then(|m| m.text))
            .unwrap_or_else(|| format!("HTTP {status}")),
        Err(_) if text.trim().is_empty() => format!("HTTP {status}"),
        Err(_) => text.chars().take(500).collect(),
    };
    DropboxError::Server {
        status,
        summary,
        retry_after,
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Transport trait
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[async_trait]
pub trait Transport: Send + Sync {
    /// Send the request and buffer the whole response.
    async fn send(&self, request: ApiRequest) -> DropboxResult<ApiResponse>;

    /// Send the request and stream a successful body into `dest`.
    ///
    /// An error status is returned as [`DropboxError::Server`] and leaves no
    /// file behind.
    async fn download(&self, request: ApiRequest, dest: &Path) -> DropboxResult<DownloadedFile>;
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  reqwest implementation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    http: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> DropboxResult<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http })
    }

    /// Wrap an existing client (shared connection pool, custom TLS, proxies).
    pub fn from_client(http: reqwest::Client) -> Self {
        Self { http }
    }

    async fn build(&self, request: ApiRequest) -> DropboxResult<reqwest::RequestBuilder> {
        let has_content_type = request.header_value(CONTENT_TYPE.as_str()).is_some();
        let mut builder = self.http.post(&request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        let builder = match request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder
                .header(CONTENT_TYPE, "application/json")
                .body(value.to_string()),
            RequestBody::File(path) => {
                let file = tokio::fs::File::open(&path)
                    .await
                    .map_err(|e| DropboxError::io(&path, e))?;
                let len = file
                    .metadata()
                    .await
                    .map_err(|e| DropboxError::io(&path, e))?
                    .len();
                let builder = if !has_content_type {
                    builder.header(CONTENT_TYPE, "application/octet-stream")
                } else {
                    builder
                };
                builder
                    .header(CONTENT_LENGTH, len)
                    .body(reqwest::Body::from(file))
            }
        };
        Ok(builder)
    }
}

fn response_meta(resp: &reqwest::Response) -> (Option<String>, Option<u64>) {
    let headers = resp.headers();
    let api_result = headers
        .get(HEADER_API_RESULT)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string());
    let retry_after = headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok());
    (api_result, retry_after)
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: ApiRequest) -> DropboxResult<ApiResponse> {
        debug!("POST {}", request.url);
        let resp = self.build(request).await?.send().await?;
        let status = resp.status().as_u16();
        let (api_result, retry_after) = response_meta(&resp);
        let body = resp.bytes().await?.to_vec();
        Ok(ApiResponse {
            status,
            body,
            api_result,
            retry_after,
        })
    }

    async fn download(&self, request: ApiRequest, dest: &Path) -> DropboxResult<DownloadedFile> {
        debug!("POST {} -> {}", request.url, dest.display());
        let resp = self.build(request).await?.send().await?;
        let status = resp.status().as_u16();
        let (api_result, retry_after) = response_meta(&resp);

        if !resp.status().is_success() {
            let body = resp.bytes().await.map(|b| b.to_vec()).unwrap_or_default();
            return Err(server_error(status, &body, retry_after));
        }

        match write_stream(resp, dest).await {
            Ok(bytes) => Ok(DownloadedFile { bytes, api_result }),
            Err(e) => {
                let _ = tokio::fs::remove_file(dest).await;
                Err(e)
            }
        }
    }
}

async fn write_stream(resp: reqwest::Response, dest: &Path) -> DropboxResult<u64> {
    let mut file = tokio::fs::File::create(dest)
        .await
        .map_err(|e| DropboxError::io(dest, e))?;
    let mut stream = resp.bytes_stream();
    let mut total = 0u64;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk)
            .await
            .map_err(|e| DropboxError::io(dest, e))?;
        total += chunk.len() as u64;
    }
    file.flush().await.map_err(|e| DropboxError::io(dest, e))?;
    Ok(total)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Test double
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_builder_collects_headers() {
        let req = ApiRequest::post("https://x/2/files/download")
            .header("Authorization", "Bearer t")
            .api_arg(&serde_json::json!({"path": "/a.txt"}));
        assert_eq!(req.header_value("authorization"), Some("Bearer t"));
        assert_eq!(req.header_value(HEADER_API_ARG), Some(r#"{"path":"/a.txt"}"#));
        assert_eq!(req.body, RequestBody::Empty);
    }

    #[test]
    fn api_arg_escapes_non_ascii() {
        let encoded = encode_api_arg(&serde_json::json!({"path": "/Café/😀.txt"}));
        assert!(encoded.is_ascii());
        assert!(encoded.contains(r"\u00e9"));
        assert!(encoded.contains(r"\ud83d\ude00"));
        let back: serde_json::Value = serde_json::from_str(&encoded).unwrap();
        assert_eq!(back["path"], "/Café/😀.txt");
    }

    #[test]
    fn check_errors_passes_success() {
        let resp = ApiResponse::ok(r#"{"entries":[]}"#);
        assert!(resp.check_errors().is_ok());
    }

    #[test]
    fn check_errors_surfaces_status() {
        let resp = ApiResponse {
            status: 409,
            body: br#"{"error_summary":"path/not_found/..","error":{".tag":"path"}}"#.to_vec(),
            ..ApiResponse::default()
        };
        match resp.check_errors().unwrap_err() {
            DropboxError::Server { status, summary, .. } => {
                assert_eq!(status, 409);
                assert_eq!(summary, "path/not_found/..");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn check_errors_surfaces_envelope_on_200() {
        let resp = ApiResponse::ok(r#"{"error_summary":"non_exportable/.."}"#);
        let err = resp.check_errors().unwrap_err();
        assert_eq!(err.status(), Some(200));
        assert!(err.to_string().contains("non_exportable"));
    }

    #[test]
    fn server_error_plain_text_body() {
        let err = server_error(400, b"Error in call to API function", None);
        assert!(err.to_string().contains("Error in call to API function"));
        let err = server_error(503, b"", Some(5));
        match err {
            DropboxError::Server { summary, retry_after, .. } => {
                assert_eq!(summary, "HTTP 503");
                assert_eq!(retry_after, Some(5));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn json_opt_empty_and_null() {
        let empty = ApiResponse::ok("");
        assert!(empty.json_opt::<serde_json::Value>("x").unwrap().is_none());
        let null = ApiResponse::ok("null");
        assert!(null.json_opt::<serde_json::Value>("x").unwrap().is_none());
        let bad = ApiResponse::ok("{not json");
        assert!(matches!(
            bad.json_opt::<serde_json::Value>("x").unwrap_err(),
            DropboxError::Decode { .. }
        ));
    }

    #[test]
    fn json_opt_rejects_non_utf8_body() {
        let garbled = ApiResponse::ok(vec![0xff, 0xfe, 0x7b]);
        assert!(matches!(
            garbled.json_opt::<serde_json::Value>("x").unwrap_err(),
            DropboxError::Decode { .. }
        ));
        let padded = ApiResponse::ok(" \n null \t");
        assert!(padded.json_opt::<serde_json::Value>("x").unwrap().is_none());
    }

    #[test]
    fn check_status_ignores_envelope_in_content() {
        let resp = ApiResponse::ok(r#"{"error_summary":"just a field in the document"}"#);
        assert!(resp.check_status().is_ok());
        let resp = ApiResponse {
            status: 409,
            body: br#"{"error_summary":"non_exportable/.."}"#.to_vec(),
            ..ApiResponse::default()
        };
        assert_eq!(resp.check_status().unwrap_err().status(), Some(409));
    }

    #[test]
    fn api_result_header_decoded() {
        let resp = ApiResponse {
            api_result: Some(r#"{"name":"a.txt","size":3}"#.into()),
            ..ApiResponse::ok("")
        };
        let v: serde_json::Value = resp.api_result_as("result").unwrap().unwrap();
        assert_eq!(v["size"], 3);
    }
}
