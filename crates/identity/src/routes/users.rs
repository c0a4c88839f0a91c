//! User API route handlers.
//!
//! Read access to the directory plus the in-app phone-number flow. Identity
//! lifecycle changes never come through here; those are the webhook's job.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use wheelhouse_core::{Email, ExternalId, UserRole};

use crate::db::{RepositoryError, users::UserQuery};
use crate::error::{AppError, Result};
use crate::models::{NewUser, PublicProfile, UserRecord};
use crate::reconcile::Directory;
use crate::state::AppState;

const MAX_PAGE_SIZE: i64 = 200;

/// Query parameters for listing users.
#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub external_id: Option<String>,
    pub email: Option<String>,
    pub role: Option<String>,
    pub limit: Option<i64>,
    pub skip: Option<i64>,
}

/// Full directory record projection (internal consumers).
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub external_id: String,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub image_url: Option<String>,
    pub role: UserRole,
    pub phone_number: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl From<&UserRecord> for UserResponse {
    fn from(user: &UserRecord) -> Self {
        Self {
            external_id: user.external_id.as_str().to_owned(),
            email: user.email.as_ref().map(ToString::to_string),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            image_url: user.image_url.clone(),
            role: user.role,
            phone_number: user.phone_number.clone(),
            created_at: user.created_at,
        }
    }
}

/// Pagination envelope for list responses.
#[derive(Debug, Serialize)]
pub struct Pagination {
    pub total: i64,
    pub count: usize,
    pub limit: i64,
    pub skip: i64,
}

/// Response for the user list endpoint.
#[derive(Debug, Serialize)]
pub struct UserListResponse {
    pub users: Vec<UserResponse>,
    pub pagination: Pagination,
}

/// Response for the public profile endpoint.
#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub success: bool,
    pub user: PublicProfile,
}

/// Request body for the phone-number flow.
///
/// The profile fields are only used when the directory record does not exist
/// yet (webhook not processed) and has to be synthesized.
#[derive(Debug, Deserialize)]
pub struct PhoneUpdateRequest {
    pub phone_number: String,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub image_url: Option<String>,
}

/// List users with optional filters and pagination, newest first.
#[instrument(skip(state, params))]
pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<UserListResponse>> {
    let query = UserQuery {
        external_id: params
            .external_id
            .as_deref()
            .map(ExternalId::parse)
            .transpose()
            .map_err(|e| AppError::BadRequest(format!("invalid external_id filter: {e}")))?,
        email: params
            .email
            .as_deref()
            .map(Email::parse)
            .transpose()
            .map_err(|e| AppError::BadRequest(format!("invalid email filter: {e}")))?,
        role: params
            .role
            .as_deref()
            .map(str::parse::<UserRole>)
            .transpose()
            .map_err(|e| AppError::BadRequest(format!("invalid role filter: {e}")))?,
        limit: params.limit.unwrap_or(50).clamp(1, MAX_PAGE_SIZE),
        skip: params.skip.unwrap_or(0).max(0),
    };

    let page = state.users().list(&query).await?;
    Ok(Json(UserListResponse {
        pagination: Pagination {
            total: page.total,
            count: page.users.len(),
            limit: query.limit,
            skip: query.skip,
        },
        users: page.users.iter().map(UserResponse::from).collect(),
    }))
}

/// Fetch a user's public profile by external id.
#[instrument(skip(state))]
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ProfileResponse>> {
    let external_id = ExternalId::parse(&id)
        .map_err(|e| AppError::BadRequest(format!("invalid external id: {e}")))?;

    let user = state
        .users()
        .find_by_external_id(&external_id)
        .await?
        .ok_or_else(|| AppError::NotFound(id))?;

    Ok(Json(ProfileResponse {
        success: true,
        user: PublicProfile::from(&user),
    }))
}

/// Set a user's phone number (in-app flow).
///
/// If the directory record does not exist yet (the provider webhook may not
/// have been processed), it is synthesized from the supplied profile fields
/// rather than failing the flow.
#[instrument(skip(state, body))]
pub async fn update_phone(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<PhoneUpdateRequest>,
) -> Result<Json<UserResponse>> {
    let external_id = ExternalId::parse(&id)
        .map_err(|e| AppError::BadRequest(format!("invalid external id: {e}")))?;

    let phone_number = body.phone_number.trim();
    if phone_number.is_empty() {
        return Err(AppError::BadRequest("phone number is required".to_owned()));
    }

    match state.users().update_phone(&external_id, phone_number).await {
        Ok(user) => Ok(Json(UserResponse::from(&user))),
        Err(RepositoryError::NotFound) => {
            let email = body
                .email
                .as_deref()
                .map(Email::parse)
                .transpose()
                .map_err(|e| AppError::BadRequest(format!("invalid email: {e}")))?;

            state
                .users()
                .insert(NewUser {
                    external_id: external_id.clone(),
                    email,
                    first_name: body.first_name,
                    last_name: body.last_name,
                    image_url: body.image_url,
                })
                .await?;
            let user = state.users().update_phone(&external_id, phone_number).await?;

            tracing::info!(external_id = %external_id, "record synthesized by phone flow");
            Ok(Json(UserResponse::from(&user)))
        }
        Err(e) => Err(e.into()),
    }
}
