use crate::error::ApiError;
use crate::handlers::accounts::{ensure_rider, find_account};
use crate::helpers::extract::ValidJson;
use crate::helpers::multipart::{FormData, UploadedFile};
use crate::media::{media_url, MediaFolder};
use crate::schemas::{ApiResponse, AppState, ErrorResponse};
use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::Json,
};
use chrono::{DateTime, Utc};
use model::entities::transportation;
use model::status::{Assignment, FulfillmentStatus};
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Select, Set,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument, trace, warn};
use utoipa::ToSchema;
use validator::Validate;

/// Request body for asking for a ride
#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct CreateTransportationRequest {
    pub current_location: Option<String>,
    pub destination: Option<String>,
    pub message: Option<String>,
    pub price: Option<String>,
    /// Number of passengers, as entered
    pub passengers: Option<String>,
}

/// Multipart form for setting a price and attaching a receipt
#[derive(ToSchema)]
#[allow(dead_code)]
pub struct PricePaymentForm {
    pub price: Option<String>,
    /// jpg, jpeg or png receipt
    #[schema(value_type = Option<String>, format = Binary)]
    pub payment: Option<Vec<u8>>,
}

/// Multipart form for changing status, price and receipt together
#[derive(ToSchema)]
#[allow(dead_code)]
pub struct StatusPricePaymentForm {
    /// One of Pending, Assigned, InTransit, Arrived, Cancelled
    pub status: Option<String>,
    pub price: Option<String>,
    /// jpg, jpeg or png receipt
    #[schema(value_type = Option<String>, format = Binary)]
    pub payment: Option<Vec<u8>>,
}

#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct UpdateRiderRequest {
    pub rider_id: i32,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TransportationResponse {
    pub id: i32,
    pub customer_id: i32,
    pub rider_id: Option<i32>,
    pub status: String,
    pub current_location: Option<String>,
    pub destination: Option<String>,
    pub message: Option<String>,
    pub price: Option<String>,
    /// URL of the payment receipt
    pub payment: Option<String>,
    pub date_requested: DateTime<Utc>,
    pub passengers: Option<String>,
}

impl From<transportation::Model> for TransportationResponse {
    fn from(model: transportation::Model) -> Self {
        Self {
            id: model.id,
            customer_id: model.customer_id,
            rider_id: model.rider_id,
            status: model.status.to_string(),
            current_location: model.current_location,
            destination: model.destination,
            message: model.message,
            price: model.price,
            payment: model.payment.as_deref().map(media_url),
            date_requested: model.date_requested,
            passengers: model.passengers,
        }
    }
}

async fn find_transportation(state: &AppState, transportation_id: i32) -> Result<transportation::Model, ApiError> {
    transportation::Entity::find_by_id(transportation_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| {
            warn!("Transportation with ID {} not found", transportation_id);
            ApiError::not_found(format!("Transportation with ID {} not found", transportation_id))
        })
}

async fn respond_with_list(
    state: &AppState,
    select: Select<transportation::Entity>,
    message: &str,
) -> Result<Json<ApiResponse<Vec<TransportationResponse>>>, ApiError> {
    let rides = select
        .order_by_desc(transportation::Column::DateRequested)
        .order_by_desc(transportation::Column::Id)
        .all(&state.db)
        .await?;
    debug!("Retrieved {} transportation requests from database", rides.len());

    let rides: Vec<TransportationResponse> = rides.into_iter().map(TransportationResponse::from).collect();
    Ok(Json(ApiResponse::ok(rides, message)))
}

/// Store the new receipt and write the row, cleaning up whichever file
/// ends up unreferenced.
async fn save_with_receipt(
    state: &AppState,
    mut active: transportation::ActiveModel,
    receipt: Option<UploadedFile>,
    previous: Option<String>,
) -> Result<transportation::Model, ApiError> {
    let mut new_key = None;
    if let Some(file) = receipt {
        let key = state.media.save(MediaFolder::Payments, &file.file_name, &file.data).await?;
        active.payment = Set(Some(key.clone()));
        new_key = Some(key);
    }

    match active.update(&state.db).await {
        Ok(updated) => {
            if new_key.is_some() {
                state.media.discard(previous.as_deref()).await;
            }
            Ok(updated)
        }
        Err(db_error) => {
            error!("Failed to update transportation: {}", db_error);
            state.media.discard(new_key.as_deref()).await;
            Err(db_error.into())
        }
    }
}

/// Write a new status and rider, plus an optional price and receipt, provided
/// nobody changed the status or rider since `current` was read.
async fn reassign(
    state: &AppState,
    current: &transportation::Model,
    next: Assignment,
    price: Option<String>,
    receipt: Option<UploadedFile>,
) -> Result<transportation::Model, ApiError> {
    let rider_unchanged = match current.rider_id {
        Some(rider_id) => transportation::Column::RiderId.eq(rider_id),
        None => transportation::Column::RiderId.is_null(),
    };

    let mut update = transportation::Entity::update_many()
        .col_expr(transportation::Column::Status, Expr::value(next.status.as_str()))
        .col_expr(transportation::Column::RiderId, Expr::value(next.rider_id))
        .filter(transportation::Column::Id.eq(current.id))
        .filter(transportation::Column::Status.eq(current.status))
        .filter(rider_unchanged);

    if let Some(price) = price {
        update = update.col_expr(transportation::Column::Price, Expr::value(price));
    }

    let mut new_key = None;
    if let Some(file) = receipt {
        let key = state.media.save(MediaFolder::Payments, &file.file_name, &file.data).await?;
        update = update.col_expr(transportation::Column::Payment, Expr::value(key.clone()));
        new_key = Some(key);
    }

    let rows_affected = match update.exec(&state.db).await {
        Ok(result) => result.rows_affected,
        Err(db_error) => {
            error!("Failed to update transportation {}: {}", current.id, db_error);
            state.media.discard(new_key.as_deref()).await;
            return Err(db_error.into());
        }
    };

    if rows_affected == 0 {
        warn!("Transportation {} changed while its status was being updated", current.id);
        state.media.discard(new_key.as_deref()).await;
        return Err(ApiError::Conflict(format!(
            "Transportation with ID {} was modified concurrently, reload it and try again",
            current.id
        )));
    }

    if new_key.is_some() {
        state.media.discard(current.payment.as_deref()).await;
    }

    find_transportation(state, current.id).await
}

fn trimmed(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Request a ride
#[utoipa::path(
    post,
    path = "/transportation/{user_id}/create",
    tag = "transportation",
    params(
        ("user_id" = i32, Path, description = "Customer account ID"),
    ),
    request_body = CreateTransportationRequest,
    responses(
        (status = 201, description = "Transportation requested successfully", body = ApiResponse<TransportationResponse>),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 404, description = "Customer not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn create_transportation(
    Path(user_id): Path<i32>,
    State(state): State<AppState>,
    ValidJson(request): ValidJson<CreateTransportationRequest>,
) -> Result<(StatusCode, Json<ApiResponse<TransportationResponse>>), ApiError> {
    trace!("Entering create_transportation function");
    let customer = find_account(&state.db, user_id).await?;

    let new_ride = transportation::ActiveModel {
        customer_id: Set(customer.id),
        rider_id: Set(None),
        status: Set(FulfillmentStatus::Pending),
        current_location: Set(trimmed(request.current_location)),
        destination: Set(trimmed(request.destination)),
        message: Set(trimmed(request.message)),
        price: Set(trimmed(request.price)),
        payment: Set(None),
        date_requested: Set(Utc::now()),
        passengers: Set(trimmed(request.passengers)),
        ..Default::default()
    };

    let ride = new_ride.insert(&state.db).await?;

    info!("Transportation {} requested by user {}", ride.id, customer.id);
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(
            TransportationResponse::from(ride),
            "Transportation requested successfully",
        )),
    ))
}

/// List the rides a customer has requested
#[utoipa::path(
    get,
    path = "/transportation/user/{user_id}",
    tag = "transportation",
    params(
        ("user_id" = i32, Path, description = "Customer account ID"),
    ),
    responses(
        (status = 200, description = "Transportation requests retrieved successfully", body = ApiResponse<Vec<TransportationResponse>>),
        (status = 404, description = "Account not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn list_user_transportations(
    Path(user_id): Path<i32>,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<TransportationResponse>>>, ApiError> {
    find_account(&state.db, user_id).await?;

    let select = transportation::Entity::find().filter(transportation::Column::CustomerId.eq(user_id));
    respond_with_list(&state, select, "Transportation requests retrieved successfully").await
}

/// Ride details, as shown on the map view
#[utoipa::path(
    get,
    path = "/transportations/{transportation_id}/map",
    tag = "transportation",
    params(
        ("transportation_id" = i32, Path, description = "Transportation ID"),
    ),
    responses(
        (status = 200, description = "Transportation retrieved successfully", body = ApiResponse<TransportationResponse>),
        (status = 404, description = "Transportation not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_transportation_map(
    Path(transportation_id): Path<i32>,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<TransportationResponse>>, ApiError> {
    let ride = find_transportation(&state, transportation_id).await?;
    Ok(Json(ApiResponse::ok(
        TransportationResponse::from(ride),
        "Transportation retrieved successfully",
    )))
}

/// Set the price and/or attach a payment receipt
#[utoipa::path(
    patch,
    path = "/transportations/{transportation_id}/update-price-payment",
    tag = "transportation",
    params(
        ("transportation_id" = i32, Path, description = "Transportation ID"),
    ),
    request_body(
        content = PricePaymentForm,
        content_type = "multipart/form-data",
        description = "Both fields are optional"
    ),
    responses(
        (status = 200, description = "Transportation updated successfully", body = ApiResponse<TransportationResponse>),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 404, description = "Transportation not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state, multipart))]
pub async fn update_price_payment(
    Path(transportation_id): Path<i32>,
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<ApiResponse<TransportationResponse>>, ApiError> {
    let mut form = FormData::from_multipart(multipart).await?;
    let ride = find_transportation(&state, transportation_id).await?;

    let previous = ride.payment.clone();
    let mut active: transportation::ActiveModel = ride.into();
    if let Some(price) = form.text("price") {
        debug!("Transportation {} price set to {}", transportation_id, price);
        active.price = Set(Some(price));
    }

    let updated = save_with_receipt(&state, active, form.take_file("payment"), previous).await?;

    info!("Transportation {} price and payment updated", updated.id);
    Ok(Json(ApiResponse::ok(
        TransportationResponse::from(updated),
        "Transportation updated successfully",
    )))
}

/// Assign a rider to a ride
#[utoipa::path(
    patch,
    path = "/transportations/{transportation_id}/update-rider",
    tag = "transportation",
    params(
        ("transportation_id" = i32, Path, description = "Transportation ID"),
    ),
    request_body = UpdateRiderRequest,
    responses(
        (status = 200, description = "Rider assigned successfully", body = ApiResponse<TransportationResponse>),
        (status = 400, description = "Account is not a rider", body = ErrorResponse),
        (status = 404, description = "Transportation or rider not found", body = ErrorResponse),
        (status = 409, description = "Ride can no longer be assigned", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn update_rider(
    Path(transportation_id): Path<i32>,
    State(state): State<AppState>,
    ValidJson(request): ValidJson<UpdateRiderRequest>,
) -> Result<Json<ApiResponse<TransportationResponse>>, ApiError> {
    let ride = find_transportation(&state, transportation_id).await?;
    if ride.status.is_terminal() {
        warn!("Transportation {} is already {}", ride.id, ride.status);
        return Err(ApiError::Conflict(format!(
            "Transportation with ID {} is already {}",
            ride.id, ride.status
        )));
    }

    let rider = ensure_rider(&state.db, request.rider_id).await?;

    let requested = match ride.status {
        FulfillmentStatus::Pending => FulfillmentStatus::Assigned,
        current => current,
    };
    let next = Assignment::new(ride.status, ride.rider_id).change(requested, Some(rider.id))?;

    let updated = reassign(&state, &ride, next, None, None).await?;

    info!("Rider {} assigned to transportation {} ({})", rider.id, updated.id, updated.status);
    Ok(Json(ApiResponse::ok(
        TransportationResponse::from(updated),
        "Rider assigned successfully",
    )))
}

/// Change status and price and attach a receipt in one call
#[utoipa::path(
    patch,
    path = "/transportations/{transportation_id}/update-status-price-payment",
    tag = "transportation",
    params(
        ("transportation_id" = i32, Path, description = "Transportation ID"),
    ),
    request_body(
        content = StatusPricePaymentForm,
        content_type = "multipart/form-data",
        description = "Every field is optional. Assigned, InTransit and Arrived need a rider already assigned"
    ),
    responses(
        (status = 200, description = "Transportation updated successfully", body = ApiResponse<TransportationResponse>),
        (status = 400, description = "Invalid request, unknown status or no rider assigned", body = ErrorResponse),
        (status = 404, description = "Transportation not found", body = ErrorResponse),
        (status = 409, description = "Status change not allowed or ride changed concurrently", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state, multipart))]
pub async fn update_status_price_payment(
    Path(transportation_id): Path<i32>,
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<ApiResponse<TransportationResponse>>, ApiError> {
    let mut form = FormData::from_multipart(multipart).await?;
    let requested = form.parse::<FulfillmentStatus>("status")?;
    let ride = find_transportation(&state, transportation_id).await?;

    // Validate before anything is written to disk.
    let updated = match requested {
        Some(status) => {
            let next = Assignment::new(ride.status, ride.rider_id).change(status, None)?;
            debug!("Transportation {}: {} -> {}", transportation_id, ride.status, next.status);
            reassign(&state, &ride, next, form.text("price"), form.take_file("payment")).await?
        }
        None => {
            let previous = ride.payment.clone();
            let mut active: transportation::ActiveModel = ride.into();
            if let Some(price) = form.text("price") {
                active.price = Set(Some(price));
            }
            save_with_receipt(&state, active, form.take_file("payment"), previous).await?
        }
    };

    info!("Transportation {} updated ({})", updated.id, updated.status);
    Ok(Json(ApiResponse::ok(
        TransportationResponse::from(updated),
        "Transportation updated successfully",
    )))
}

/// List all rides
#[utoipa::path(
    get,
    path = "/transportations",
    tag = "transportation",
    responses(
        (status = 200, description = "Transportation requests retrieved successfully", body = ApiResponse<Vec<TransportationResponse>>),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn list_transportations(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<TransportationResponse>>>, ApiError> {
    respond_with_list(
        &state,
        transportation::Entity::find(),
        "Transportation requests retrieved successfully",
    )
    .await
}

/// List rides that have arrived
#[utoipa::path(
    get,
    path = "/transportations/arrived",
    tag = "transportation",
    responses(
        (status = 200, description = "Arrived transportation requests retrieved successfully", body = ApiResponse<Vec<TransportationResponse>>),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn list_arrived_transportations(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<TransportationResponse>>>, ApiError> {
    let select = transportation::Entity::find()
        .filter(transportation::Column::Status.eq(FulfillmentStatus::Arrived));
    respond_with_list(&state, select, "Arrived transportation requests retrieved successfully").await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::test_utils::setup_test_app;
    use model::entities::user;

    #[tokio::test]
    async fn test_stale_reassignment_is_rejected() {
        let app = setup_test_app().await;
        let state = &app.state;

        let account = user::ActiveModel {
            username: Set("0788000002".to_string()),
            first_name: Set("Sefu".to_string()),
            last_name: Set(String::new()),
            email: Set(String::new()),
            password_hash: Set("not-a-real-hash".to_string()),
            is_active: Set(true),
            is_staff: Set(false),
            is_superuser: Set(false),
            date_joined: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&state.db)
        .await
        .unwrap();

        let ride = transportation::ActiveModel {
            customer_id: Set(account.id),
            rider_id: Set(None),
            status: Set(FulfillmentStatus::Pending),
            current_location: Set(None),
            destination: Set(None),
            message: Set(None),
            price: Set(None),
            payment: Set(None),
            date_requested: Set(Utc::now()),
            passengers: Set(None),
            ..Default::default()
        }
        .insert(&state.db)
        .await
        .unwrap();

        let current = Assignment::new(ride.status, ride.rider_id);
        let assigned = current.change(FulfillmentStatus::Assigned, Some(account.id)).unwrap();
        let cancelled = current.change(FulfillmentStatus::Cancelled, None).unwrap();

        let first = reassign(state, &ride, assigned, Some("300".to_string()), None).await.unwrap();
        assert_eq!(first.status, FulfillmentStatus::Assigned);
        assert_eq!(first.rider_id, Some(account.id));
        assert_eq!(first.price.as_deref(), Some("300"));

        // Written against the Pending row that no longer exists
        let second = reassign(state, &ride, cancelled, Some("0".to_string()), None).await;
        assert!(matches!(second, Err(ApiError::Conflict(_))));

        let stored = find_transportation(state, ride.id).await.unwrap();
        assert_eq!(stored.status, FulfillmentStatus::Assigned);
        assert_eq!(stored.price.as_deref(), Some("300"));
    }
}
