use crate::error::ApiError;
use crate::handlers::accounts::find_account;
use crate::helpers::multipart::FormData;
use crate::media::{media_url, MediaFolder};
use crate::schemas::{ApiResponse, AppState, ErrorResponse};
use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::Json,
};
use chrono::{DateTime, Utc};
use model::entities::payment;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument};
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PaymentResponse {
    pub id: i32,
    pub customer_id: i32,
    /// URL of the receipt image
    pub pay: String,
    pub date_issued: DateTime<Utc>,
}

impl From<payment::Model> for PaymentResponse {
    fn from(model: payment::Model) -> Self {
        Self {
            id: model.id,
            customer_id: model.customer_id,
            pay: media_url(&model.pay),
            date_issued: model.date_issued,
        }
    }
}

/// Multipart form for uploading a receipt
#[derive(ToSchema)]
#[allow(dead_code)]
pub struct PaymentForm {
    /// jpg, jpeg or png receipt
    #[schema(value_type = String, format = Binary)]
    pub pay: Vec<u8>,
}

/// Upload a payment receipt
#[utoipa::path(
    post,
    path = "/payments/{user_id}",
    tag = "payments",
    params(
        ("user_id" = i32, Path, description = "Customer account ID"),
    ),
    request_body(content = PaymentForm, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Payment uploaded successfully", body = ApiResponse<PaymentResponse>),
        (status = 400, description = "Missing or unsupported image", body = ErrorResponse),
        (status = 404, description = "Account not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state, multipart))]
pub async fn create_payment(
    Path(user_id): Path<i32>,
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<ApiResponse<PaymentResponse>>), ApiError> {
    let mut form = FormData::from_multipart(multipart).await?;
    let file = form
        .take_file("pay")
        .ok_or_else(|| ApiError::validation("pay: No file was submitted."))?;

    let customer = find_account(&state.db, user_id).await?;

    let key = state.media.save(MediaFolder::Payments, &file.file_name, &file.data).await?;

    let new_payment = payment::ActiveModel {
        customer_id: Set(customer.id),
        pay: Set(key.clone()),
        date_issued: Set(Utc::now()),
        ..Default::default()
    };

    let payment = match new_payment.insert(&state.db).await {
        Ok(payment) => payment,
        Err(db_error) => {
            error!("Failed to record payment for user {}: {}", user_id, db_error);
            state.media.discard(Some(&key)).await;
            return Err(db_error.into());
        }
    };

    info!("Payment {} uploaded by user {}", payment.id, customer.id);
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(PaymentResponse::from(payment), "Payment uploaded successfully")),
    ))
}

/// List a customer's payment receipts, newest first
#[utoipa::path(
    get,
    path = "/payments/user/{user_id}",
    tag = "payments",
    params(
        ("user_id" = i32, Path, description = "Customer account ID"),
    ),
    responses(
        (status = 200, description = "Payments retrieved successfully", body = ApiResponse<Vec<PaymentResponse>>),
        (status = 404, description = "Account not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn list_user_payments(
    Path(user_id): Path<i32>,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<PaymentResponse>>>, ApiError> {
    find_account(&state.db, user_id).await?;

    let payments = payment::Entity::find()
        .filter(payment::Column::CustomerId.eq(user_id))
        .order_by_desc(payment::Column::DateIssued)
        .order_by_desc(payment::Column::Id)
        .all(&state.db)
        .await?;

    debug!("Retrieved {} payments for user {}", payments.len(), user_id);
    let payments: Vec<PaymentResponse> = payments.into_iter().map(PaymentResponse::from).collect();
    Ok(Json(ApiResponse::ok(payments, "Payments retrieved successfully")))
}
