//! Image upload relay route handler.
//!
//! Accepts a multipart upload from a listing flow and relays it to the
//! remote file host, returning the public URL the image will be served from.

use axum::{
    Json,
    extract::{Multipart, State},
};
use serde::Serialize;
use tracing::instrument;

use crate::error::{AppError, Result};
use crate::state::AppState;

const DEFAULT_FOLDER: &str = "uploads";

/// Response for a successful upload.
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub success: bool,
    pub public_url: String,
}

/// Relay an uploaded file to the remote file host.
///
/// Expects a multipart form with a `file` part and an optional `folder`
/// text part selecting the destination directory.
#[instrument(skip_all)]
pub async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>> {
    let Some(filehost) = state.filehost() else {
        return Err(AppError::Unavailable("file host is not configured".to_owned()));
    };

    let mut file: Option<(String, Vec<u8>)> = None;
    let mut folder = DEFAULT_FOLDER.to_owned();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("malformed multipart body: {e}")))?
    {
        match field.name() {
            Some("file") => {
                let file_name = sanitize_file_name(field.file_name().unwrap_or("upload.bin"));
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("failed to read file: {e}")))?;
                file = Some((file_name, bytes.to_vec()));
            }
            Some("folder") => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("failed to read folder: {e}")))?;
                folder = sanitize_folder(&value)?;
            }
            _ => {}
        }
    }

    let Some((file_name, bytes)) = file else {
        return Err(AppError::BadRequest("no file provided".to_owned()));
    };
    if bytes.is_empty() {
        return Err(AppError::BadRequest("file is empty".to_owned()));
    }

    let public_url = filehost.upload(bytes, &file_name, &folder).await?;
    tracing::info!(url = %public_url, "file relayed to host");

    Ok(Json(UploadResponse {
        success: true,
        public_url,
    }))
}

/// Keep only the final path component of a client-supplied file name.
fn sanitize_file_name(name: &str) -> String {
    let base = name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(name)
        .trim();
    if base.is_empty() {
        "upload.bin".to_owned()
    } else {
        base.to_owned()
    }
}

/// Destination folders are single path components of a restricted alphabet.
fn sanitize_folder(folder: &str) -> Result<String> {
    let folder = folder.trim();
    if folder.is_empty() {
        return Ok(DEFAULT_FOLDER.to_owned());
    }
    if folder
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        Ok(folder.to_owned())
    } else {
        Err(AppError::BadRequest(
            "folder may only contain letters, digits, '-' and '_'".to_owned(),
        ))
    }
}
