use crate::error::{is_unique_violation, ApiError};
use crate::handlers::accounts::find_account;
use crate::helpers::extract::{not_blank, ValidJson, ValidQuery};
use crate::schemas::{ApiResponse, AppState, ErrorResponse};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use chrono::{DateTime, Utc};
use model::entities::{chat_room, message, user};
use sea_orm::{
    sea_query::{Expr, Func},
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info, instrument, trace, warn};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct PostMessageRequest {
    /// Must be one of the two accounts in the path
    #[validate(required(message = "This field is required."))]
    pub sender_id: Option<i32>,
    #[validate(required(message = "This field is required."), custom(function = "not_blank"))]
    pub content: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct MarkReadRequest {
    /// Member of the room whose incoming messages are marked as read
    pub reader_id: i32,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MarkReadResponse {
    pub updated: u64,
}

#[derive(Debug, Deserialize, IntoParams, Validate)]
#[into_params(parameter_in = Query)]
pub struct SearchQuery {
    /// First name to look for, compared case-insensitively
    #[validate(required(message = "This field is required."), custom(function = "not_blank"))]
    pub first_name: Option<String>,
}

/// Public fields of an account shown in conversations
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AccountSummary {
    pub id: i32,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

impl From<user::Model> for AccountSummary {
    fn from(model: user::Model) -> Self {
        Self {
            id: model.id,
            username: model.username,
            first_name: model.first_name,
            last_name: model.last_name,
            email: model.email,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub id: i32,
    pub room_id: i32,
    pub sender_id: i32,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub is_read: bool,
}

impl From<message::Model> for MessageResponse {
    fn from(model: message::Model) -> Self {
        Self {
            id: model.id,
            room_id: model.room_id,
            sender_id: model.sender_id,
            content: model.content,
            created_at: model.created_at,
            is_read: model.is_read,
        }
    }
}

/// A room with its full message history, oldest first
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RoomResponse {
    pub id: i32,
    pub user1_id: i32,
    pub user2_id: i32,
    pub created_at: DateTime<Utc>,
    pub messages: Vec<MessageResponse>,
}

/// One entry of an account's conversation list
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RoomSummaryResponse {
    pub room_id: i32,
    pub counterpart: AccountSummary,
    pub last_message: Option<MessageResponse>,
    /// Messages from the counterpart not yet marked as read
    pub unread_count: u64,
    pub created_at: DateTime<Utc>,
}

fn distinct_pair(user1_id: i32, user2_id: i32) -> Result<(i32, i32), ApiError> {
    if user1_id == user2_id {
        return Err(ApiError::validation("A chat room needs two different users"));
    }
    Ok(chat_room::canonical_pair(user1_id, user2_id))
}

async fn find_room<C: ConnectionTrait>(db: &C, pair: (i32, i32)) -> Result<Option<chat_room::Model>, ApiError> {
    Ok(chat_room::Entity::find()
        .filter(chat_room::Column::User1Id.eq(pair.0))
        .filter(chat_room::Column::User2Id.eq(pair.1))
        .one(db)
        .await?)
}

/// Fetch the room of a canonical pair, creating it on first use.
async fn get_or_create_room(state: &AppState, pair: (i32, i32)) -> Result<chat_room::Model, ApiError> {
    if let Some(room) = find_room(&state.db, pair).await? {
        return Ok(room);
    }

    let new_room = chat_room::ActiveModel {
        user1_id: Set(pair.0),
        user2_id: Set(pair.1),
        created_at: Set(Utc::now()),
        ..Default::default()
    };

    match new_room.insert(&state.db).await {
        Ok(room) => {
            info!("Created chat room {} for users {} and {}", room.id, pair.0, pair.1);
            Ok(room)
        }
        // Another request created the room between our lookup and insert.
        Err(db_error) if is_unique_violation(&db_error) => {
            debug!("Chat room for {:?} created concurrently, re-reading", pair);
            find_room(&state.db, pair).await?.ok_or_else(|| {
                ApiError::Internal(format!("Chat room for users {:?} vanished after creation", pair))
            })
        }
        Err(db_error) => Err(db_error.into()),
    }
}

async fn room_messages(state: &AppState, room_id: i32) -> Result<Vec<MessageResponse>, ApiError> {
    let messages = message::Entity::find()
        .filter(message::Column::RoomId.eq(room_id))
        .order_by_asc(message::Column::CreatedAt)
        .order_by_asc(message::Column::Id)
        .all(&state.db)
        .await?;
    Ok(messages.into_iter().map(MessageResponse::from).collect())
}

/// Open the conversation between two accounts
///
/// The order of the two ids does not matter: both orders resolve to the same
/// room, which is created the first time the pair talks.
#[utoipa::path(
    get,
    path = "/chat/{user1_id}/{user2_id}",
    tag = "chat",
    params(
        ("user1_id" = i32, Path, description = "One member of the conversation"),
        ("user2_id" = i32, Path, description = "The other member"),
    ),
    responses(
        (status = 200, description = "Chat room retrieved successfully", body = ApiResponse<RoomResponse>),
        (status = 400, description = "Both ids are the same", body = ErrorResponse),
        (status = 404, description = "Account not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_room(
    Path((user1_id, user2_id)): Path<(i32, i32)>,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<RoomResponse>>, ApiError> {
    let pair = distinct_pair(user1_id, user2_id)?;
    find_account(&state.db, pair.0).await?;
    find_account(&state.db, pair.1).await?;

    let room = get_or_create_room(&state, pair).await?;
    let messages = room_messages(&state, room.id).await?;
    debug!("Room {} has {} messages", room.id, messages.len());

    let response = RoomResponse {
        id: room.id,
        user1_id: room.user1_id,
        user2_id: room.user2_id,
        created_at: room.created_at,
        messages,
    };
    Ok(Json(ApiResponse::ok(response, "Chat room retrieved successfully")))
}

/// Send a message to the other member of the pair
#[utoipa::path(
    post,
    path = "/chat/{user1_id}/{user2_id}",
    tag = "chat",
    params(
        ("user1_id" = i32, Path, description = "One member of the conversation"),
        ("user2_id" = i32, Path, description = "The other member"),
    ),
    request_body = PostMessageRequest,
    responses(
        (status = 201, description = "Message sent successfully", body = ApiResponse<MessageResponse>),
        (status = 400, description = "Missing content or sender not part of the conversation", body = ErrorResponse),
        (status = 404, description = "Account not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state, request))]
pub async fn post_message(
    Path((user1_id, user2_id)): Path<(i32, i32)>,
    State(state): State<AppState>,
    ValidJson(request): ValidJson<PostMessageRequest>,
) -> Result<(StatusCode, Json<ApiResponse<MessageResponse>>), ApiError> {
    trace!("Entering post_message function");
    let pair = distinct_pair(user1_id, user2_id)?;

    let (Some(sender_id), Some(content)) = (request.sender_id, request.content) else {
        return Err(ApiError::validation("sender_id and content are required"));
    };

    if sender_id != pair.0 && sender_id != pair.1 {
        warn!("Sender {} is not part of conversation {:?}", sender_id, pair);
        return Err(ApiError::validation(format!(
            "Sender {} is not part of this conversation",
            sender_id
        )));
    }

    find_account(&state.db, pair.0).await?;
    find_account(&state.db, pair.1).await?;

    let room = get_or_create_room(&state, pair).await?;

    let new_message = message::ActiveModel {
        room_id: Set(room.id),
        sender_id: Set(sender_id),
        content: Set(content),
        created_at: Set(Utc::now()),
        is_read: Set(false),
        ..Default::default()
    };
    let message = new_message.insert(&state.db).await?;

    info!("User {} posted message {} in room {}", sender_id, message.id, room.id);
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(MessageResponse::from(message), "Message sent successfully")),
    ))
}

/// Mark the counterpart's messages as read
#[utoipa::path(
    patch,
    path = "/chat/{user1_id}/{user2_id}/read",
    tag = "chat",
    params(
        ("user1_id" = i32, Path, description = "One member of the conversation"),
        ("user2_id" = i32, Path, description = "The other member"),
    ),
    request_body = MarkReadRequest,
    responses(
        (status = 200, description = "Messages marked as read", body = ApiResponse<MarkReadResponse>),
        (status = 400, description = "Reader not part of the conversation", body = ErrorResponse),
        (status = 404, description = "Account not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn mark_read(
    Path((user1_id, user2_id)): Path<(i32, i32)>,
    State(state): State<AppState>,
    ValidJson(request): ValidJson<MarkReadRequest>,
) -> Result<Json<ApiResponse<MarkReadResponse>>, ApiError> {
    let pair = distinct_pair(user1_id, user2_id)?;
    if request.reader_id != pair.0 && request.reader_id != pair.1 {
        return Err(ApiError::validation(format!(
            "Reader {} is not part of this conversation",
            request.reader_id
        )));
    }
    find_account(&state.db, request.reader_id).await?;

    let updated = match find_room(&state.db, pair).await? {
        Some(room) => {
            message::Entity::update_many()
                .col_expr(message::Column::IsRead, Expr::value(true))
                .filter(message::Column::RoomId.eq(room.id))
                .filter(message::Column::SenderId.ne(request.reader_id))
                .filter(message::Column::IsRead.eq(false))
                .exec(&state.db)
                .await?
                .rows_affected
        }
        None => 0,
    };

    info!("Marked {} messages as read for user {}", updated, request.reader_id);
    Ok(Json(ApiResponse::ok(MarkReadResponse { updated }, "Messages marked as read")))
}

/// List an account's conversations, most recently active first
#[utoipa::path(
    get,
    path = "/chat/rooms/{user_id}",
    tag = "chat",
    params(
        ("user_id" = i32, Path, description = "Account ID"),
    ),
    responses(
        (status = 200, description = "Chat rooms retrieved successfully", body = ApiResponse<Vec<RoomSummaryResponse>>),
        (status = 404, description = "Account not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn list_rooms(
    Path(user_id): Path<i32>,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<RoomSummaryResponse>>>, ApiError> {
    find_account(&state.db, user_id).await?;

    let rooms = chat_room::Entity::find()
        .filter(
            chat_room::Column::User1Id
                .eq(user_id)
                .or(chat_room::Column::User2Id.eq(user_id)),
        )
        .all(&state.db)
        .await?;

    let counterpart_ids: Vec<i32> = rooms.iter().filter_map(|r| r.counterpart_of(user_id)).collect();
    let mut counterparts: HashMap<i32, user::Model> = user::Entity::find()
        .filter(user::Column::Id.is_in(counterpart_ids))
        .all(&state.db)
        .await?
        .into_iter()
        .map(|u| (u.id, u))
        .collect();

    let mut summaries = Vec::with_capacity(rooms.len());
    for room in rooms {
        let Some(counterpart) = room.counterpart_of(user_id).and_then(|id| counterparts.remove(&id)) else {
            continue;
        };

        let last_message = message::Entity::find()
            .filter(message::Column::RoomId.eq(room.id))
            .order_by_desc(message::Column::CreatedAt)
            .order_by_desc(message::Column::Id)
            .one(&state.db)
            .await?;

        let unread_count = message::Entity::find()
            .filter(message::Column::RoomId.eq(room.id))
            .filter(message::Column::SenderId.ne(user_id))
            .filter(message::Column::IsRead.eq(false))
            .count(&state.db)
            .await?;

        summaries.push(RoomSummaryResponse {
            room_id: room.id,
            counterpart: AccountSummary::from(counterpart),
            last_message: last_message.map(MessageResponse::from),
            unread_count,
            created_at: room.created_at,
        });
    }

    summaries.sort_by_key(|s| {
        std::cmp::Reverse(
            s.last_message
                .as_ref()
                .map(|m| m.created_at)
                .unwrap_or(s.created_at),
        )
    });

    info!("Retrieved {} chat rooms for user {}", summaries.len(), user_id);
    Ok(Json(ApiResponse::ok(summaries, "Chat rooms retrieved successfully")))
}

/// Find accounts by first name, ignoring case
#[utoipa::path(
    get,
    path = "/chat/search",
    tag = "chat",
    params(SearchQuery),
    responses(
        (status = 200, description = "Accounts found", body = ApiResponse<Vec<AccountSummary>>),
        (status = 400, description = "first_name is missing or blank", body = ErrorResponse),
        (status = 404, description = "No account with that first name", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn search_accounts(
    State(state): State<AppState>,
    ValidQuery(query): ValidQuery<SearchQuery>,
) -> Result<Json<ApiResponse<Vec<AccountSummary>>>, ApiError> {
    let first_name = query.first_name.as_deref().map(str::trim).unwrap_or_default();

    let accounts = user::Entity::find()
        .filter(Expr::expr(Func::lower(Expr::col(user::Column::FirstName))).eq(first_name.to_lowercase()))
        .order_by_asc(user::Column::Id)
        .all(&state.db)
        .await?;

    if accounts.is_empty() {
        warn!("No account with first name '{}'", first_name);
        return Err(ApiError::not_found(format!("No user found with first name '{}'", first_name)));
    }

    debug!("Found {} accounts named '{}'", accounts.len(), first_name);
    let accounts: Vec<AccountSummary> = accounts.into_iter().map(AccountSummary::from).collect();
    Ok(Json(ApiResponse::ok(accounts, "Accounts found")))
}
