//! Remote file host client for image uploads.
//!
//! Listing flows attach images; this client relays the bytes to the remote
//! file-manager API (cPanel-style) and returns the public URL they will be
//! served from. Requests carry a bounded timeout: a slow host surfaces as a
//! retryable failure, never a hung handler.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use serde::Deserialize;
use thiserror::Error;

use crate::config::FileHostConfig;

/// File-manager API upload endpoint.
const UPLOAD_ENDPOINT: &str = "/execute/Fileman/upload_files";

/// Web root the upload directory lives under.
const WEB_ROOT: &str = "public_html";

/// Errors that can occur when relaying files to the remote host.
#[derive(Debug, Error)]
pub enum FileHostError {
    /// HTTP request failed (including timeouts).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// The host accepted the request but rejected the upload.
    #[error("Upload rejected: {0}")]
    Rejected(String),

    /// Failed to parse response.
    #[error("Parse error: {0}")]
    Parse(String),
}

/// Successful upload response payload from the file-manager API.
#[derive(Debug, Deserialize)]
struct FileManagerResponse {
    status: i64,
    #[serde(default)]
    errors: Option<Vec<String>>,
    #[serde(default)]
    data: Option<FileManagerData>,
}

#[derive(Debug, Deserialize)]
struct FileManagerData {
    #[serde(default)]
    succeeded: i64,
    #[serde(default)]
    uploads: Vec<FileManagerUpload>,
}

#[derive(Debug, Deserialize)]
struct FileManagerUpload {
    #[serde(default)]
    reason: String,
    status: i64,
}

/// Client for the remote file host's file-manager API.
#[derive(Clone)]
pub struct FileHostClient {
    client: reqwest::Client,
    api_url: String,
    public_domain: String,
}

impl FileHostClient {
    /// Create a new file host client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &FileHostConfig) -> Result<Self, FileHostError> {
        let mut headers = HeaderMap::new();

        let auth_value = format!(
            "cpanel {}:{}",
            config.username,
            config.api_token.expose_secret()
        );
        headers.insert(
            "Authorization",
            HeaderValue::from_str(&auth_value)
                .map_err(|e| FileHostError::Parse(format!("Invalid API token format: {e}")))?,
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            api_url: config.api_url.trim_end_matches('/').to_owned(),
            public_domain: config.public_domain.clone(),
        })
    }

    /// Upload a file into `folder` and return its public URL.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails, times out, or the host rejects
    /// the upload.
    pub async fn upload(
        &self,
        bytes: Vec<u8>,
        file_name: &str,
        folder: &str,
    ) -> Result<String, FileHostError> {
        let part = reqwest::multipart::Part::bytes(bytes).file_name(file_name.to_owned());
        let form = reqwest::multipart::Form::new()
            .text("dir", format!("{WEB_ROOT}/{folder}"))
            .part("file-1", part);

        let response = self
            .client
            .post(format!("{}{UPLOAD_ENDPOINT}", self.api_url))
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(FileHostError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: FileManagerResponse = response
            .json()
            .await
            .map_err(|e| FileHostError::Parse(e.to_string()))?;

        if body.status != 1 {
            let message = body
                .errors
                .unwrap_or_default()
                .join("; ");
            return Err(FileHostError::Rejected(message));
        }

        let data = body
            .data
            .ok_or_else(|| FileHostError::Parse("missing upload data".to_owned()))?;
        if data.succeeded < 1 {
            let reason = data
                .uploads
                .iter()
                .find(|u| u.status != 1)
                .map_or_else(|| "no file uploaded".to_owned(), |u| u.reason.clone());
            return Err(FileHostError::Rejected(reason));
        }

        Ok(format!(
            "https://{}/{folder}/{file_name}",
            self.public_domain
        ))
    }
}
