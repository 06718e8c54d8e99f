use crate::auth::{verify_password, AuthError, AuthUser, Claims, TokenType};
use crate::error::ApiError;
use crate::helpers::extract::ValidJson;
use crate::schemas::{ApiResponse, AppState, ErrorResponse};
use axum::{extract::State, response::Json};
use model::entities::user;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, trace, warn};
use utoipa::ToSchema;
use validator::Validate;

/// Login credentials
#[derive(Deserialize, Serialize, ToSchema, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "This field may not be blank."))]
    pub username: String,
    #[validate(length(min = 1, message = "This field may not be blank."))]
    pub password: String,
}

// Keeps the password out of traces.
impl std::fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginRequest")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

/// Token pair plus the account attributes a client shows after login
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LoginResponse {
    pub access: String,
    pub refresh: String,
    pub id: i32,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub is_staff: bool,
    pub is_superuser: bool,
}

#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct RefreshRequest {
    #[validate(length(min = 1, message = "This field may not be blank."))]
    pub refresh: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RefreshResponse {
    pub access: String,
}

/// Exchange username and password for an access and a refresh token
#[utoipa::path(
    post,
    path = "/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = ApiResponse<LoginResponse>),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 401, description = "No active account found with the given credentials", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn login(
    State(state): State<AppState>,
    ValidJson(request): ValidJson<LoginRequest>,
) -> Result<Json<ApiResponse<LoginResponse>>, ApiError> {
    trace!("Entering login function");

    let account = user::Entity::find()
        .filter(user::Column::Username.eq(request.username.trim()))
        .one(&state.db)
        .await?;

    // Same answer for unknown user, wrong password and inactive account.
    let account = match account {
        Some(account) if account.is_active && verify_password(&request.password, &account.password_hash) => account,
        _ => {
            warn!("Login failed for username '{}'", request.username);
            return Err(AuthError::InvalidCredentials.into());
        }
    };

    let pair = state.jwt.token_pair(&account)?;

    info!("User {} ('{}') logged in", account.id, account.username);
    let response = LoginResponse {
        access: pair.access,
        refresh: pair.refresh,
        id: account.id,
        username: account.username,
        email: account.email,
        first_name: account.first_name,
        last_name: account.last_name,
        is_staff: account.is_staff,
        is_superuser: account.is_superuser,
    };
    Ok(Json(ApiResponse::ok(response, "Login successful")))
}

/// Issue a new access token from a refresh token
#[utoipa::path(
    post,
    path = "/token/refresh",
    tag = "auth",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "Token refreshed", body = ApiResponse<RefreshResponse>),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 401, description = "Refresh token is invalid or expired", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state, request))]
pub async fn refresh_token(
    State(state): State<AppState>,
    ValidJson(request): ValidJson<RefreshRequest>,
) -> Result<Json<ApiResponse<RefreshResponse>>, ApiError> {
    let claims = state.jwt.validate(request.refresh.trim(), TokenType::Refresh)?;
    debug!("Refresh token accepted for user ID: {}", claims.user_id);

    // The account may have been removed or deactivated since login.
    let account = user::Entity::find_by_id(claims.user_id)
        .one(&state.db)
        .await?
        .filter(|account| account.is_active)
        .ok_or_else(|| {
            warn!("Refresh rejected: user ID {} is gone or inactive", claims.user_id);
            ApiError::from(AuthError::InvalidToken)
        })?;

    let access = state.jwt.access_token(&account)?;

    info!("Issued new access token for user ID: {}", account.id);
    Ok(Json(ApiResponse::ok(RefreshResponse { access }, "Token refreshed")))
}

/// Claims of the access token sent with the request
#[utoipa::path(
    get,
    path = "/me",
    tag = "auth",
    responses(
        (status = 200, description = "Current token claims", body = ApiResponse<Claims>),
        (status = 401, description = "Missing, invalid or expired token", body = ErrorResponse)
    ),
    security(
        ("bearer_auth" = [])
    )
)]
#[instrument(skip(user))]
pub async fn me(user: AuthUser) -> Json<ApiResponse<Claims>> {
    let AuthUser(claims) = user;
    debug!("Returning claims for user ID: {}", claims.user_id);
    Json(ApiResponse::ok(claims, "Authenticated"))
}
