use crate::auth::hash_password;
use crate::error::{is_unique_violation, ApiError};
use crate::helpers::extract::{not_blank, optional_email, FromFormData, JsonOrForm, ValidJson, ValidQuery};
use crate::helpers::multipart::FormData;
use crate::media::{media_url, MediaFolder};
use crate::schemas::{ApiResponse, AppState, ErrorResponse};
use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::Json,
};
use chrono::{DateTime, Utc};
use model::entities::{chat_room, delivery, message, payment, profile, transportation, user};
use model::status::DEFAULT_PROFILE_STATUS;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument, trace, warn};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

/// Request body for registering a new account
#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct RegisterRequest {
    /// Mobile number used as the login name (must be unique)
    #[validate(custom(function = "not_blank"))]
    pub username: String,
    #[validate(custom(function = "not_blank"))]
    pub password: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    /// May be left empty
    #[validate(custom(function = "optional_email"))]
    pub email: Option<String>,
    /// Free text such as "Customer" or "Rider"
    pub role: Option<String>,
}

impl FromFormData for RegisterRequest {
    fn from_form(form: &FormData) -> Result<Self, ApiError> {
        Ok(Self {
            username: form.text("username").unwrap_or_default(),
            password: form.raw("password").unwrap_or_default(),
            first_name: form.text("first_name"),
            last_name: form.text("last_name"),
            email: form.text("email"),
            role: form.text("role"),
        })
    }
}

/// Multipart form for uploading a profile picture
#[derive(ToSchema)]
#[allow(dead_code)]
pub struct ProfilePictureForm {
    /// jpg, jpeg or png image
    #[schema(value_type = String, format = Binary)]
    pub profile_picture: Vec<u8>,
}

/// Request body for changing a profile status
#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct UpdateProfileStatusRequest {
    #[validate(custom(function = "not_blank"))]
    pub status: String,
}

/// Query parameters for listing clients
#[derive(Debug, Deserialize, IntoParams, Validate)]
#[into_params(parameter_in = Query)]
pub struct ClientQuery {
    /// Only return profiles with exactly this role
    pub role: Option<String>,
}

/// Account response model. Never includes the password hash.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AccountResponse {
    pub id: i32,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub is_active: bool,
    pub is_staff: bool,
    pub is_superuser: bool,
    pub date_joined: DateTime<Utc>,
}

impl From<user::Model> for AccountResponse {
    fn from(model: user::Model) -> Self {
        Self {
            id: model.id,
            username: model.username,
            first_name: model.first_name,
            last_name: model.last_name,
            email: model.email,
            is_active: model.is_active,
            is_staff: model.is_staff,
            is_superuser: model.is_superuser,
            date_joined: model.date_joined,
        }
    }
}

/// Profile fields without the owning account
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ProfileDetails {
    pub id: i32,
    pub role: Option<String>,
    pub status: String,
    /// URL of the uploaded picture
    pub profile_picture: Option<String>,
}

impl From<profile::Model> for ProfileDetails {
    fn from(model: profile::Model) -> Self {
        Self {
            id: model.id,
            role: model.role,
            status: model.status,
            profile_picture: model.profile_picture.as_deref().map(media_url),
        }
    }
}

/// Profile together with the account fields shown on a profile page
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ProfileResponse {
    pub id: i32,
    pub user_id: i32,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub role: Option<String>,
    pub status: String,
    pub profile_picture: Option<String>,
}

impl ProfileResponse {
    fn new(profile: profile::Model, account: user::Model) -> Self {
        Self {
            id: profile.id,
            user_id: account.id,
            username: account.username,
            first_name: account.first_name,
            last_name: account.last_name,
            email: account.email,
            role: profile.role,
            status: profile.status,
            profile_picture: profile.profile_picture.as_deref().map(media_url),
        }
    }
}

/// Profile with its account embedded
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ClientResponse {
    pub id: i32,
    pub role: Option<String>,
    pub status: String,
    pub profile_picture: Option<String>,
    pub user: AccountResponse,
}

/// Account with its profile embedded (`null` when the account has none)
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AccountWithProfileResponse {
    pub id: i32,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub is_active: bool,
    pub is_staff: bool,
    pub date_joined: DateTime<Utc>,
    pub profile: Option<ProfileDetails>,
}

impl AccountWithProfileResponse {
    fn new(account: user::Model, profile: Option<profile::Model>) -> Self {
        Self {
            id: account.id,
            username: account.username,
            first_name: account.first_name,
            last_name: account.last_name,
            email: account.email,
            is_active: account.is_active,
            is_staff: account.is_staff,
            date_joined: account.date_joined,
            profile: profile.map(ProfileDetails::from),
        }
    }
}

/// Load an account or fail with NotFound.
pub(crate) async fn find_account<C: ConnectionTrait>(db: &C, user_id: i32) -> Result<user::Model, ApiError> {
    user::Entity::find_by_id(user_id)
        .one(db)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("User with ID {} not found", user_id)))
}

/// Check that `rider_id` names an account whose profile role is Rider.
pub(crate) async fn ensure_rider<C: ConnectionTrait>(db: &C, rider_id: i32) -> Result<user::Model, ApiError> {
    let account = find_account(db, rider_id).await?;

    let is_rider = profile::Entity::find()
        .filter(profile::Column::UserId.eq(rider_id))
        .one(db)
        .await?
        .is_some_and(|p| p.is_rider());

    if !is_rider {
        warn!("User {} cannot be assigned: profile role is not Rider", rider_id);
        return Err(ApiError::validation(format!("User with ID {} is not a rider", rider_id)));
    }
    Ok(account)
}

async fn find_profile_with_account(
    state: &AppState,
    user_id: i32,
) -> Result<(profile::Model, user::Model), ApiError> {
    let found = profile::Entity::find()
        .filter(profile::Column::UserId.eq(user_id))
        .find_also_related(user::Entity)
        .one(&state.db)
        .await?;

    match found {
        Some((profile, Some(account))) => Ok((profile, account)),
        _ => {
            warn!("Profile for user ID {} not found", user_id);
            Err(ApiError::not_found(format!("Profile for user ID {} not found", user_id)))
        }
    }
}

fn optional_text(value: Option<String>) -> String {
    value.map(|v| v.trim().to_string()).unwrap_or_default()
}

/// Register a new account and its profile
#[utoipa::path(
    post,
    path = "/register",
    tag = "accounts",
    request_body(
        content = RegisterRequest,
        description = "JSON, or multipart/form-data with the same fields plus an optional image in `profile_picture`"
    ),
    responses(
        (status = 201, description = "Account registered successfully", body = ApiResponse<AccountResponse>),
        (status = 400, description = "Invalid request or unsupported image", body = ErrorResponse),
        (status = 409, description = "Username already exists", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state, request, form))]
pub async fn register(
    State(state): State<AppState>,
    JsonOrForm(request, mut form): JsonOrForm<RegisterRequest>,
) -> Result<(StatusCode, Json<ApiResponse<AccountResponse>>), ApiError> {
    trace!("Entering register function");
    let username = request.username.trim().to_string();

    let existing = user::Entity::find()
        .filter(user::Column::Username.eq(username.as_str()))
        .one(&state.db)
        .await?;
    if existing.is_some() {
        warn!("Registration rejected: username '{}' already exists", username);
        return Err(ApiError::Conflict(format!("Username '{}' already exists", username)));
    }

    let password_hash = hash_password(&request.password)?;

    let picture = match form.take_file("profile_picture") {
        Some(file) => Some(
            state
                .media
                .save(MediaFolder::ProfilePictures, &file.file_name, &file.data)
                .await?,
        ),
        None => None,
    };

    let account = match insert_account(&state, username, password_hash, request, picture.clone()).await {
        Ok(account) => account,
        Err(err) => {
            state.media.discard(picture.as_deref()).await;
            return Err(err);
        }
    };

    info!("Account registered successfully with ID: {}, username: {}", account.id, account.username);
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(AccountResponse::from(account), "Account registered successfully")),
    ))
}

/// Write the account and its profile in one transaction.
async fn insert_account(
    state: &AppState,
    username: String,
    password_hash: String,
    request: RegisterRequest,
    picture: Option<String>,
) -> Result<user::Model, ApiError> {
    let txn = state.db.begin().await?;

    let new_account = user::ActiveModel {
        username: Set(username.clone()),
        first_name: Set(optional_text(request.first_name)),
        last_name: Set(optional_text(request.last_name)),
        email: Set(optional_text(request.email)),
        password_hash: Set(password_hash),
        is_active: Set(true),
        is_staff: Set(false),
        is_superuser: Set(false),
        date_joined: Set(Utc::now()),
        ..Default::default()
    };

    let account = match new_account.insert(&txn).await {
        Ok(account) => account,
        Err(db_error) if is_unique_violation(&db_error) => {
            warn!("Username '{}' was taken concurrently", username);
            return Err(ApiError::Conflict(format!("Username '{}' already exists", username)));
        }
        Err(db_error) => return Err(db_error.into()),
    };

    let new_profile = profile::ActiveModel {
        user_id: Set(account.id),
        role: Set(request.role.map(|r| r.trim().to_string()).filter(|r| !r.is_empty())),
        status: Set(DEFAULT_PROFILE_STATUS.to_string()),
        profile_picture: Set(picture),
        ..Default::default()
    };
    new_profile.insert(&txn).await?;

    txn.commit().await?;
    Ok(account)
}

/// Get the profile of an account
#[utoipa::path(
    get,
    path = "/profile/{user_id}",
    tag = "accounts",
    params(
        ("user_id" = i32, Path, description = "Account ID"),
    ),
    responses(
        (status = 200, description = "Profile retrieved successfully", body = ApiResponse<ProfileResponse>),
        (status = 404, description = "Profile not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_profile(
    Path(user_id): Path<i32>,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<ProfileResponse>>, ApiError> {
    debug!("Fetching profile for user ID: {}", user_id);

    let (profile, account) = find_profile_with_account(&state, user_id).await?;

    Ok(Json(ApiResponse::ok(
        ProfileResponse::new(profile, account),
        "Profile retrieved successfully",
    )))
}

/// List profiles with their accounts, optionally filtered by role
#[utoipa::path(
    get,
    path = "/clients",
    tag = "accounts",
    params(ClientQuery),
    responses(
        (status = 200, description = "Clients retrieved successfully", body = ApiResponse<Vec<ClientResponse>>),
        (status = 400, description = "Invalid query", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn list_clients(
    State(state): State<AppState>,
    ValidQuery(query): ValidQuery<ClientQuery>,
) -> Result<Json<ApiResponse<Vec<ClientResponse>>>, ApiError> {
    trace!("Entering list_clients function");

    let mut select = profile::Entity::find().find_also_related(user::Entity);
    if let Some(role) = query.role.as_deref().map(str::trim).filter(|r| !r.is_empty()) {
        debug!("Filtering clients by role: {}", role);
        select = select.filter(profile::Column::Role.eq(role));
    }

    let rows = select.order_by_asc(profile::Column::Id).all(&state.db).await?;

    let clients: Vec<ClientResponse> = rows
        .into_iter()
        .filter_map(|(profile, account)| {
            let account = account?;
            Some(ClientResponse {
                id: profile.id,
                role: profile.role,
                status: profile.status,
                profile_picture: profile.profile_picture.as_deref().map(media_url),
                user: AccountResponse::from(account),
            })
        })
        .collect();

    info!("Successfully retrieved {} clients", clients.len());
    Ok(Json(ApiResponse::ok(clients, "Clients retrieved successfully")))
}

/// Change the free-text status of a profile
#[utoipa::path(
    patch,
    path = "/profile/{user_id}/status",
    tag = "accounts",
    params(
        ("user_id" = i32, Path, description = "Account ID"),
    ),
    request_body = UpdateProfileStatusRequest,
    responses(
        (status = 200, description = "Profile status updated successfully", body = ApiResponse<ProfileResponse>),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 404, description = "Profile not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state, request))]
pub async fn update_profile_status(
    Path(user_id): Path<i32>,
    State(state): State<AppState>,
    ValidJson(request): ValidJson<UpdateProfileStatusRequest>,
) -> Result<Json<ApiResponse<ProfileResponse>>, ApiError> {
    debug!("Updating profile status for user ID {} to '{}'", user_id, request.status);

    let (profile, account) = find_profile_with_account(&state, user_id).await?;

    let mut active: profile::ActiveModel = profile.into();
    active.status = Set(request.status.trim().to_string());
    let updated = active.update(&state.db).await?;

    info!("Profile status for user ID {} set to '{}'", user_id, updated.status);
    Ok(Json(ApiResponse::ok(
        ProfileResponse::new(updated, account),
        "Profile status updated successfully",
    )))
}

/// Upload or replace a profile picture
#[utoipa::path(
    patch,
    path = "/profile/{user_id}/picture",
    tag = "accounts",
    params(
        ("user_id" = i32, Path, description = "Account ID"),
    ),
    request_body(content = ProfilePictureForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Profile picture updated successfully", body = ApiResponse<ProfileResponse>),
        (status = 400, description = "Missing or unsupported image", body = ErrorResponse),
        (status = 404, description = "Profile not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state, multipart))]
pub async fn update_profile_picture(
    Path(user_id): Path<i32>,
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<ApiResponse<ProfileResponse>>, ApiError> {
    let mut form = FormData::from_multipart(multipart).await?;
    let file = form
        .take_file("profile_picture")
        .ok_or_else(|| ApiError::validation("profile_picture: No file was submitted."))?;

    let (profile, account) = find_profile_with_account(&state, user_id).await?;
    let previous = profile.profile_picture.clone();

    let key = state
        .media
        .save(MediaFolder::ProfilePictures, &file.file_name, &file.data)
        .await?;

    let mut active: profile::ActiveModel = profile.into();
    active.profile_picture = Set(Some(key.clone()));
    let updated = match active.update(&state.db).await {
        Ok(updated) => updated,
        Err(db_error) => {
            error!("Failed to store picture for user ID {}: {}", user_id, db_error);
            state.media.discard(Some(&key)).await;
            return Err(db_error.into());
        }
    };

    state.media.discard(previous.as_deref()).await;

    info!("Profile picture for user ID {} stored as {}", user_id, key);
    Ok(Json(ApiResponse::ok(
        ProfileResponse::new(updated, account),
        "Profile picture updated successfully",
    )))
}

/// List all accounts with their profiles
#[utoipa::path(
    get,
    path = "/riders",
    tag = "accounts",
    responses(
        (status = 200, description = "Accounts retrieved successfully", body = ApiResponse<Vec<AccountWithProfileResponse>>),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn list_riders(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<AccountWithProfileResponse>>>, ApiError> {
    trace!("Entering list_riders function");

    let rows = user::Entity::find()
        .find_also_related(profile::Entity)
        .order_by_asc(user::Column::Id)
        .all(&state.db)
        .await?;

    let accounts: Vec<AccountWithProfileResponse> = rows
        .into_iter()
        .map(|(account, profile)| AccountWithProfileResponse::new(account, profile))
        .collect();

    info!("Successfully retrieved {} accounts", accounts.len());
    Ok(Json(ApiResponse::ok(accounts, "Accounts retrieved successfully")))
}

/// Delete an account and everything that belongs to it
#[utoipa::path(
    delete,
    path = "/accounts/{user_id}",
    tag = "accounts",
    params(
        ("user_id" = i32, Path, description = "Account ID"),
    ),
    responses(
        (status = 204, description = "Account deleted successfully"),
        (status = 404, description = "Account not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn delete_account(
    Path(user_id): Path<i32>,
    State(state): State<AppState>,
) -> Result<StatusCode, ApiError> {
    trace!("Entering delete_account function for user_id: {}", user_id);

    let txn = state.db.begin().await?;
    let account = find_account(&txn, user_id).await?;

    // Images referenced by rows about to disappear; removed once committed.
    let mut media_keys: Vec<String> = Vec::new();

    let profile = profile::Entity::find()
        .filter(profile::Column::UserId.eq(user_id))
        .one(&txn)
        .await?;
    if let Some(picture) = profile.and_then(|p| p.profile_picture) {
        media_keys.push(picture);
    }

    let payment_keys: Vec<String> = payment::Entity::find()
        .filter(payment::Column::CustomerId.eq(user_id))
        .select_only()
        .column(payment::Column::Pay)
        .into_tuple()
        .all(&txn)
        .await?;
    media_keys.extend(payment_keys);

    let delivery_keys: Vec<Option<String>> = delivery::Entity::find()
        .filter(delivery::Column::CustomerId.eq(user_id))
        .select_only()
        .column(delivery::Column::Payment)
        .into_tuple()
        .all(&txn)
        .await?;
    media_keys.extend(delivery_keys.into_iter().flatten());

    let ride_keys: Vec<Option<String>> = transportation::Entity::find()
        .filter(transportation::Column::CustomerId.eq(user_id))
        .select_only()
        .column(transportation::Column::Payment)
        .into_tuple()
        .all(&txn)
        .await?;
    media_keys.extend(ride_keys.into_iter().flatten());

    let room_ids: Vec<i32> = chat_room::Entity::find()
        .filter(
            chat_room::Column::User1Id
                .eq(user_id)
                .or(chat_room::Column::User2Id.eq(user_id)),
        )
        .select_only()
        .column(chat_room::Column::Id)
        .into_tuple()
        .all(&txn)
        .await?;

    let messages = message::Entity::delete_many()
        .filter(
            message::Column::SenderId
                .eq(user_id)
                .or(message::Column::RoomId.is_in(room_ids.clone())),
        )
        .exec(&txn)
        .await?;
    let rooms = chat_room::Entity::delete_many()
        .filter(chat_room::Column::Id.is_in(room_ids))
        .exec(&txn)
        .await?;
    debug!(
        "Removed {} messages and {} chat rooms of user ID {}",
        messages.rows_affected, rooms.rows_affected, user_id
    );

    // Jobs this account was riding for stay, without a rider.
    delivery::Entity::update_many()
        .col_expr(delivery::Column::RiderId, Expr::value(Option::<i32>::None))
        .filter(delivery::Column::RiderId.eq(user_id))
        .exec(&txn)
        .await?;
    transportation::Entity::update_many()
        .col_expr(transportation::Column::RiderId, Expr::value(Option::<i32>::None))
        .filter(transportation::Column::RiderId.eq(user_id))
        .exec(&txn)
        .await?;

    delivery::Entity::delete_many()
        .filter(delivery::Column::CustomerId.eq(user_id))
        .exec(&txn)
        .await?;
    transportation::Entity::delete_many()
        .filter(transportation::Column::CustomerId.eq(user_id))
        .exec(&txn)
        .await?;
    payment::Entity::delete_many()
        .filter(payment::Column::CustomerId.eq(user_id))
        .exec(&txn)
        .await?;
    profile::Entity::delete_many()
        .filter(profile::Column::UserId.eq(user_id))
        .exec(&txn)
        .await?;
    user::Entity::delete_by_id(account.id).exec(&txn).await?;

    txn.commit().await?;

    for key in &media_keys {
        state.media.discard(Some(key)).await;
    }

    info!("Account {} ('{}') deleted successfully", account.id, account.username);
    Ok(StatusCode::NO_CONTENT)
}
