use axum::{
    Extension, Json,
    extract::{
        Multipart, Path, State,
        multipart::{MultipartError, MultipartRejection},
        rejection::JsonRejection,
    },
    http::header,
    response::{IntoResponse, Response},
};
use std::sync::Arc;

use super::error::IdentityError;
use super::models::{
    AuthenticatedIdentity, AvatarUpload, LoginRequest, MessageResponse, ProfileForm,
    RegisterRequest, TokenResponse, UserProfile,
};
use crate::gateway::state::AppState;

/// Multipart field carrying the optional avatar image.
const AVATAR_FIELD: &str = "avatar";

/// Register a new user
///
/// POST /api/sso/register
#[utoipa::path(
    post,
    path = "/api/sso/register",
    request_body = RegisterRequest,
    responses(
        (status = 200, description = "User registered, session token issued", body = TokenResponse),
        (status = 400, description = "Malformed body or missing credentials"),
        (status = 409, description = "Login or email already in use"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Auth"
)]
pub async fn register(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<Json<TokenResponse>, IdentityError> {
    let Json(req) = payload.map_err(reject_body)?;
    let token = state.identity.register(req).await?;
    Ok(Json(TokenResponse { token }))
}

/// Login by email or login
///
/// POST /api/sso/login
#[utoipa::path(
    post,
    path = "/api/sso/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = TokenResponse),
        (status = 400, description = "Malformed body or ambiguous identifier"),
        (status = 401, description = "Invalid credentials"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Auth"
)]
pub async fn login(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<TokenResponse>, IdentityError> {
    let Json(req) = payload.map_err(reject_body)?;
    let token = state.identity.login(req).await?;
    Ok(Json(TokenResponse { token }))
}

/// Profile of the token holder
///
/// GET /api/sso/user_profile
#[utoipa::path(
    get,
    path = "/api/sso/user_profile",
    responses(
        (status = 200, description = "User profile", body = UserProfile),
        (status = 401, description = "Missing, invalid or expired token"),
        (status = 404, description = "User no longer exists")
    ),
    security(("bearer_jwt" = [])),
    tag = "User"
)]
pub async fn user_profile(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<AuthenticatedIdentity>,
) -> Result<Json<UserProfile>, IdentityError> {
    let profile = state.identity.get_profile(&identity).await?;
    Ok(Json(profile))
}

/// Rewrite the profile of the token holder
///
/// PUT /api/sso/update_user_profile (multipart/form-data)
#[utoipa::path(
    put,
    path = "/api/sso/update_user_profile",
    request_body(content = crate::user_auth::models::ProfileFormSchema, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Profile updated", body = MessageResponse),
        (status = 400, description = "Missing field or unsupported image format"),
        (status = 401, description = "Missing, invalid or expired token"),
        (status = 409, description = "Login or email already in use"),
        (status = 500, description = "Avatar upload or store failure")
    ),
    security(("bearer_jwt" = [])),
    tag = "User"
)]
pub async fn update_user_profile(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<AuthenticatedIdentity>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<MessageResponse>, IdentityError> {
    let mut multipart = multipart.map_err(|e| {
        tracing::debug!(error = %e, "profile form rejected");
        IdentityError::ValidationFailure("body")
    })?;

    let mut form = ProfileForm::default();
    let mut avatar = None;

    while let Some(field) = multipart.next_field().await.map_err(reject_multipart)? {
        let Some(name) = field.name().map(str::to_owned) else {
            continue;
        };

        if name == AVATAR_FIELD {
            let file_name = field.file_name().unwrap_or_default().to_owned();
            let bytes = field.bytes().await.map_err(reject_multipart)?;
            // An empty file part means "keep the current avatar"
            if !file_name.is_empty() && !bytes.is_empty() {
                avatar = Some(AvatarUpload {
                    file_name,
                    bytes: bytes.to_vec(),
                });
            }
        } else {
            let value = field.text().await.map_err(reject_multipart)?;
            form.set(&name, value);
        }
    }

    state
        .identity
        .update_profile(&identity, form, avatar)
        .await?;

    Ok(Json(MessageResponse {
        message: "Profile updated".to_string(),
    }))
}

/// Serve a stored avatar image
///
/// GET /api/sso/images/{filename}
#[utoipa::path(
    get,
    path = "/api/sso/images/{filename}",
    params(("filename" = String, Path, description = "Avatar reference")),
    responses(
        (status = 200, description = "Image bytes with its image content type"),
        (status = 403, description = "Reference rejected"),
        (status = 404, description = "No such image")
    ),
    tag = "User"
)]
pub async fn serve_avatar(
    State(state): State<Arc<AppState>>,
    Path(filename): Path<String>,
) -> Result<Response, IdentityError> {
    let file = state.identity.avatar(&filename).await?;
    Ok(([(header::CONTENT_TYPE, file.content_type)], file.bytes).into_response())
}

fn reject_body(rejection: JsonRejection) -> IdentityError {
    tracing::debug!(error = %rejection.body_text(), "request body rejected");
    IdentityError::ValidationFailure("body")
}

fn reject_multipart(e: MultipartError) -> IdentityError {
    tracing::debug!(error = %e.body_text(), "multipart stream rejected");
    IdentityError::ValidationFailure("body")
}
