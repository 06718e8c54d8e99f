use crate::error::ApiError;
use crate::handlers::accounts::{ensure_rider, find_account};
use crate::handlers::products::find_product;
use crate::helpers::extract::{not_blank, ValidJson};
use crate::helpers::multipart::FormData;
use crate::media::{media_url, MediaFolder};
use crate::schemas::{ApiResponse, AppState, ErrorResponse};
use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::Json,
};
use chrono::{DateTime, Utc};
use model::entities::delivery;
use model::status::{Assignment, FulfillmentStatus};
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Select, Set,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument, trace, warn};
use utoipa::ToSchema;
use validator::Validate;

/// Request body for ordering a product
#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct SubmitDeliveryRequest {
    /// Where the product should be brought
    pub location: Option<String>,
    pub message: Option<String>,
    pub price: Option<String>,
    /// Units ordered (defaults to 1)
    #[validate(range(min = 1, message = "Ensure this value is greater than or equal to 1."))]
    pub quantity: Option<i32>,
    /// Account that should fulfil the order; must be a rider
    pub rider_id: Option<i32>,
}

/// Multipart form for attaching a payment to a delivery
#[derive(ToSchema)]
#[allow(dead_code)]
pub struct DeliveryPaymentForm {
    pub price: Option<String>,
    pub message: Option<String>,
    pub location: Option<String>,
    /// jpg, jpeg or png receipt
    #[schema(value_type = Option<String>, format = Binary)]
    pub payment: Option<Vec<u8>>,
}

/// Request body for moving a delivery along its lifecycle
#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct UpdateDeliveryStatusRequest {
    /// One of Pending, Assigned, InTransit, Arrived, Cancelled
    #[validate(custom(function = "not_blank"))]
    pub status: String,
    /// Assign or replace the rider in the same call. Assigned, InTransit and
    /// Arrived need a rider; going back to Pending releases it.
    pub rider_id: Option<i32>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DeliveryResponse {
    pub id: i32,
    pub customer_id: i32,
    pub rider_id: Option<i32>,
    pub product_id: i32,
    pub status: String,
    pub location: Option<String>,
    pub message: Option<String>,
    pub price: Option<String>,
    /// URL of the payment receipt
    pub payment: Option<String>,
    pub delivery_issued: DateTime<Utc>,
    pub quantity: i32,
}

impl From<delivery::Model> for DeliveryResponse {
    fn from(model: delivery::Model) -> Self {
        Self {
            id: model.id,
            customer_id: model.customer_id,
            rider_id: model.rider_id,
            product_id: model.product_id,
            status: model.status.to_string(),
            location: model.location,
            message: model.message,
            price: model.price,
            payment: model.payment.as_deref().map(media_url),
            delivery_issued: model.delivery_issued,
            quantity: model.quantity,
        }
    }
}

async fn find_delivery(state: &AppState, delivery_id: i32) -> Result<delivery::Model, ApiError> {
    delivery::Entity::find_by_id(delivery_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| {
            warn!("Delivery with ID {} not found", delivery_id);
            ApiError::not_found(format!("Delivery with ID {} not found", delivery_id))
        })
}

/// Write a new status and rider, provided nobody changed them since `current` was read.
async fn reassign(
    state: &AppState,
    current: &delivery::Model,
    next: Assignment,
) -> Result<delivery::Model, ApiError> {
    let rider_unchanged = match current.rider_id {
        Some(rider_id) => delivery::Column::RiderId.eq(rider_id),
        None => delivery::Column::RiderId.is_null(),
    };

    let result = delivery::Entity::update_many()
        .col_expr(delivery::Column::Status, Expr::value(next.status.as_str()))
        .col_expr(delivery::Column::RiderId, Expr::value(next.rider_id))
        .filter(delivery::Column::Id.eq(current.id))
        .filter(delivery::Column::Status.eq(current.status))
        .filter(rider_unchanged)
        .exec(&state.db)
        .await?;

    if result.rows_affected == 0 {
        warn!("Delivery {} changed while its status was being updated", current.id);
        return Err(ApiError::Conflict(format!(
            "Delivery with ID {} was modified concurrently, reload it and try again",
            current.id
        )));
    }

    find_delivery(state, current.id).await
}

fn newest_first(select: Select<delivery::Entity>) -> Select<delivery::Entity> {
    select
        .order_by_desc(delivery::Column::DeliveryIssued)
        .order_by_desc(delivery::Column::Id)
}

async fn respond_with_list(
    state: &AppState,
    select: Select<delivery::Entity>,
    message: &str,
) -> Result<Json<ApiResponse<Vec<DeliveryResponse>>>, ApiError> {
    let deliveries = newest_first(select).all(&state.db).await?;
    debug!("Retrieved {} deliveries from database", deliveries.len());

    let deliveries: Vec<DeliveryResponse> = deliveries.into_iter().map(DeliveryResponse::from).collect();
    Ok(Json(ApiResponse::ok(deliveries, message)))
}

fn trimmed(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Order a product for delivery
#[utoipa::path(
    post,
    path = "/deliveries/submit/{user_id}/{product_id}",
    tag = "deliveries",
    params(
        ("user_id" = i32, Path, description = "Customer account ID"),
        ("product_id" = i32, Path, description = "Product ID"),
    ),
    request_body = SubmitDeliveryRequest,
    responses(
        (status = 201, description = "Delivery submitted successfully", body = ApiResponse<DeliveryResponse>),
        (status = 400, description = "Invalid request or rider", body = ErrorResponse),
        (status = 404, description = "Customer, product or rider not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn submit_delivery(
    Path((user_id, product_id)): Path<(i32, i32)>,
    State(state): State<AppState>,
    ValidJson(request): ValidJson<SubmitDeliveryRequest>,
) -> Result<(StatusCode, Json<ApiResponse<DeliveryResponse>>), ApiError> {
    trace!("Entering submit_delivery function");

    let customer = find_account(&state.db, user_id).await?;
    let product = find_product(&state.db, product_id).await?;

    let status = match request.rider_id {
        Some(rider_id) => {
            ensure_rider(&state.db, rider_id).await?;
            debug!("Delivery will be assigned to rider {}", rider_id);
            FulfillmentStatus::Assigned
        }
        None => FulfillmentStatus::Pending,
    };

    let new_delivery = delivery::ActiveModel {
        customer_id: Set(customer.id),
        rider_id: Set(request.rider_id),
        product_id: Set(product.id),
        status: Set(status),
        location: Set(trimmed(request.location)),
        message: Set(trimmed(request.message)),
        price: Set(trimmed(request.price)),
        payment: Set(None),
        delivery_issued: Set(Utc::now()),
        quantity: Set(request.quantity.unwrap_or(1)),
        ..Default::default()
    };

    let delivery = new_delivery.insert(&state.db).await?;

    info!(
        "Delivery {} submitted by user {} for product {} ({})",
        delivery.id, customer.id, product.id, delivery.status
    );
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(DeliveryResponse::from(delivery), "Delivery submitted successfully")),
    ))
}

/// List the deliveries a customer has ordered
#[utoipa::path(
    get,
    path = "/deliveries/user/{user_id}",
    tag = "deliveries",
    params(
        ("user_id" = i32, Path, description = "Customer account ID"),
    ),
    responses(
        (status = 200, description = "Deliveries retrieved successfully", body = ApiResponse<Vec<DeliveryResponse>>),
        (status = 404, description = "Account not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn list_user_deliveries(
    Path(user_id): Path<i32>,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<DeliveryResponse>>>, ApiError> {
    find_account(&state.db, user_id).await?;

    let select = delivery::Entity::find().filter(delivery::Column::CustomerId.eq(user_id));
    respond_with_list(&state, select, "Deliveries retrieved successfully").await
}

/// List all deliveries
#[utoipa::path(
    get,
    path = "/deliveries",
    tag = "deliveries",
    responses(
        (status = 200, description = "Deliveries retrieved successfully", body = ApiResponse<Vec<DeliveryResponse>>),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn list_deliveries(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<DeliveryResponse>>>, ApiError> {
    respond_with_list(&state, delivery::Entity::find(), "Deliveries retrieved successfully").await
}

/// Change the status of a delivery, optionally assigning a rider
#[utoipa::path(
    patch,
    path = "/deliveries/{delivery_id}/update-status",
    tag = "deliveries",
    params(
        ("delivery_id" = i32, Path, description = "Delivery ID"),
    ),
    request_body = UpdateDeliveryStatusRequest,
    responses(
        (status = 200, description = "Delivery status updated successfully", body = ApiResponse<DeliveryResponse>),
        (status = 400, description = "Unknown status, missing rider or account is not a rider", body = ErrorResponse),
        (status = 404, description = "Delivery or rider not found", body = ErrorResponse),
        (status = 409, description = "Status change not allowed or delivery changed concurrently", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn update_delivery_status(
    Path(delivery_id): Path<i32>,
    State(state): State<AppState>,
    ValidJson(request): ValidJson<UpdateDeliveryStatusRequest>,
) -> Result<Json<ApiResponse<DeliveryResponse>>, ApiError> {
    let requested: FulfillmentStatus = request.status.parse()?;
    let delivery = find_delivery(&state, delivery_id).await?;

    let next = Assignment::new(delivery.status, delivery.rider_id).change(requested, request.rider_id)?;
    debug!("Delivery {}: {} -> {}", delivery_id, delivery.status, next.status);

    if let Some(rider_id) = request.rider_id {
        ensure_rider(&state.db, rider_id).await?;
    }

    let updated = reassign(&state, &delivery, next).await?;

    info!("Delivery {} is now {}", updated.id, updated.status);
    Ok(Json(ApiResponse::ok(
        DeliveryResponse::from(updated),
        "Delivery status updated successfully",
    )))
}

/// Attach a payment receipt and adjust price, message or location
#[utoipa::path(
    patch,
    path = "/deliveries/{delivery_id}/update-payment",
    tag = "deliveries",
    params(
        ("delivery_id" = i32, Path, description = "Delivery ID"),
    ),
    request_body(
        content = DeliveryPaymentForm,
        content_type = "multipart/form-data",
        description = "Every field is optional; only the ones sent are changed"
    ),
    responses(
        (status = 200, description = "Delivery payment updated successfully", body = ApiResponse<DeliveryResponse>),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 404, description = "Delivery not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state, multipart))]
pub async fn update_delivery_payment(
    Path(delivery_id): Path<i32>,
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<ApiResponse<DeliveryResponse>>, ApiError> {
    let mut form = FormData::from_multipart(multipart).await?;
    let delivery = find_delivery(&state, delivery_id).await?;

    let previous_payment = delivery.payment.clone();
    let mut active: delivery::ActiveModel = delivery.into();

    if let Some(price) = form.text("price") {
        active.price = Set(Some(price));
    }
    if let Some(message) = form.text("message") {
        active.message = Set(Some(message));
    }
    if let Some(location) = form.text("location") {
        active.location = Set(Some(location));
    }

    let mut new_payment = None;
    if let Some(file) = form.take_file("payment") {
        let key = state.media.save(MediaFolder::Payments, &file.file_name, &file.data).await?;
        active.payment = Set(Some(key.clone()));
        new_payment = Some(key);
    }

    let updated = match active.update(&state.db).await {
        Ok(updated) => updated,
        Err(db_error) => {
            error!("Failed to update payment of delivery {}: {}", delivery_id, db_error);
            state.media.discard(new_payment.as_deref()).await;
            return Err(db_error.into());
        }
    };

    if new_payment.is_some() {
        state.media.discard(previous_payment.as_deref()).await;
    }

    info!("Delivery {} payment details updated", updated.id);
    Ok(Json(ApiResponse::ok(
        DeliveryResponse::from(updated),
        "Delivery payment updated successfully",
    )))
}

/// Delete a delivery
#[utoipa::path(
    delete,
    path = "/deliveries/{delivery_id}",
    tag = "deliveries",
    params(
        ("delivery_id" = i32, Path, description = "Delivery ID"),
    ),
    responses(
        (status = 204, description = "Delivery deleted successfully"),
        (status = 404, description = "Delivery not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn delete_delivery(
    Path(delivery_id): Path<i32>,
    State(state): State<AppState>,
) -> Result<StatusCode, ApiError> {
    let delivery = find_delivery(&state, delivery_id).await?;

    delivery::Entity::delete_by_id(delivery.id).exec(&state.db).await?;
    state.media.discard(delivery.payment.as_deref()).await;

    info!("Delivery {} deleted successfully", delivery_id);
    Ok(StatusCode::NO_CONTENT)
}

/// List deliveries that have arrived
#[utoipa::path(
    get,
    path = "/deliveries/arrived",
    tag = "deliveries",
    responses(
        (status = 200, description = "Arrived deliveries retrieved successfully", body = ApiResponse<Vec<DeliveryResponse>>),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn list_arrived_deliveries(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<DeliveryResponse>>>, ApiError> {
    let select = delivery::Entity::find().filter(delivery::Column::Status.eq(FulfillmentStatus::Arrived));
    respond_with_list(&state, select, "Arrived deliveries retrieved successfully").await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::test_utils::setup_test_app;
    use model::entities::{product, user};
    use model::status::DEFAULT_PRODUCT_STATUS;

    async fn seed_delivery(state: &AppState, status: FulfillmentStatus) -> delivery::Model {
        let account = user::ActiveModel {
            username: Set("0788000001".to_string()),
            first_name: Set("Rehema".to_string()),
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

        let item = product::ActiveModel {
            name: Set("Sugar".to_string()),
            picture: Set(None),
            price: Set(None),
            status: Set(DEFAULT_PRODUCT_STATUS.to_string()),
            product_type: Set(None),
            quantity: Set(3),
            date_posted: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&state.db)
        .await
        .unwrap();

        delivery::ActiveModel {
            customer_id: Set(account.id),
            rider_id: Set(Some(account.id)),
            product_id: Set(item.id),
            status: Set(status),
            location: Set(None),
            message: Set(None),
            price: Set(None),
            payment: Set(None),
            delivery_issued: Set(Utc::now()),
            quantity: Set(1),
            ..Default::default()
        }
        .insert(&state.db)
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_stale_status_change_is_rejected() {
        let app = setup_test_app().await;
        let state = &app.state;
        let in_transit = seed_delivery(state, FulfillmentStatus::InTransit).await;
        let current = Assignment::new(in_transit.status, in_transit.rider_id);

        // Two requests read the same InTransit row; the first one to write wins.
        let arrived = current.change(FulfillmentStatus::Arrived, None).unwrap();
        let cancelled = current.change(FulfillmentStatus::Cancelled, None).unwrap();

        let first = reassign(state, &in_transit, arrived).await.unwrap();
        assert_eq!(first.status, FulfillmentStatus::Arrived);

        let second = reassign(state, &in_transit, cancelled).await;
        assert!(matches!(second, Err(ApiError::Conflict(_))));

        let stored = find_delivery(state, in_transit.id).await.unwrap();
        assert_eq!(stored.status, FulfillmentStatus::Arrived);
        assert_eq!(stored.rider_id, in_transit.rider_id);
    }
}
