use crate::error::ApiError;
use crate::helpers::extract::{not_blank, FromFormData, JsonOrForm, ValidJson};
use crate::helpers::multipart::FormData;
use crate::media::{media_url, MediaFolder};
use crate::schemas::{ApiResponse, AppState, ErrorResponse};
use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::Json,
};
use chrono::{DateTime, Utc};
use model::entities::{delivery, product};
use model::status::DEFAULT_PRODUCT_STATUS;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument, trace, warn};
use utoipa::ToSchema;
use validator::Validate;

/// Request body for posting a product
#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct CreateProductRequest {
    #[validate(custom(function = "not_blank"))]
    pub name: String,
    pub price: Option<String>,
    /// Defaults to "Available"
    pub status: Option<String>,
    #[serde(rename = "type")]
    pub product_type: Option<String>,
    /// Units in stock (defaults to 0)
    #[validate(range(min = 0, message = "Ensure this value is greater than or equal to 0."))]
    pub quantity: Option<i32>,
}

impl FromFormData for CreateProductRequest {
    fn from_form(form: &FormData) -> Result<Self, ApiError> {
        Ok(Self {
            name: form.text("name").unwrap_or_default(),
            price: form.text("price"),
            status: form.text("status"),
            product_type: form.text("type"),
            quantity: form.parse("quantity")?,
        })
    }
}

/// Multipart form for posting or editing a product
#[derive(Deserialize, ToSchema)]
#[allow(dead_code)]
pub struct ProductForm {
    pub name: Option<String>,
    pub price: Option<String>,
    pub status: Option<String>,
    #[serde(rename = "type")]
    pub product_type: Option<String>,
    pub quantity: Option<i32>,
    /// jpg, jpeg or png image
    #[schema(value_type = Option<String>, format = Binary)]
    pub picture: Option<Vec<u8>>,
}

/// Request body for taking units out of stock
#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct DeductQuantityRequest {
    #[validate(range(min = 1, message = "Ensure this value is greater than or equal to 1."))]
    pub quantity: i32,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ProductResponse {
    pub id: i32,
    pub name: String,
    /// URL of the product picture
    pub picture: Option<String>,
    pub price: Option<String>,
    pub status: String,
    #[serde(rename = "type")]
    pub product_type: Option<String>,
    pub quantity: i32,
    pub date_posted: DateTime<Utc>,
}

impl From<product::Model> for ProductResponse {
    fn from(model: product::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            picture: model.picture.as_deref().map(media_url),
            price: model.price,
            status: model.status,
            product_type: model.product_type,
            quantity: model.quantity,
            date_posted: model.date_posted,
        }
    }
}

pub(crate) async fn find_product<C: ConnectionTrait>(db: &C, product_id: i32) -> Result<product::Model, ApiError> {
    product::Entity::find_by_id(product_id)
        .one(db)
        .await?
        .ok_or_else(|| {
            warn!("Product with ID {} not found", product_id);
            ApiError::not_found(format!("Product with ID {} not found", product_id))
        })
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Post a new product
#[utoipa::path(
    post,
    path = "/post-products",
    tag = "products",
    request_body(
        content = CreateProductRequest,
        description = "JSON, or multipart/form-data with the same fields plus an optional image in `picture`"
    ),
    responses(
        (status = 201, description = "Product created successfully", body = ApiResponse<ProductResponse>),
        (status = 400, description = "Invalid request or unsupported image", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state, form))]
pub async fn create_product(
    State(state): State<AppState>,
    JsonOrForm(request, mut form): JsonOrForm<CreateProductRequest>,
) -> Result<(StatusCode, Json<ApiResponse<ProductResponse>>), ApiError> {
    trace!("Entering create_product function");

    let picture = match form.take_file("picture") {
        Some(file) => Some(state.media.save(MediaFolder::Products, &file.file_name, &file.data).await?),
        None => None,
    };

    let new_product = product::ActiveModel {
        name: Set(request.name.trim().to_string()),
        picture: Set(picture.clone()),
        price: Set(non_blank(request.price)),
        status: Set(non_blank(request.status).unwrap_or_else(|| DEFAULT_PRODUCT_STATUS.to_string())),
        product_type: Set(non_blank(request.product_type)),
        quantity: Set(request.quantity.unwrap_or(0)),
        date_posted: Set(Utc::now()),
        ..Default::default()
    };

    let product = match new_product.insert(&state.db).await {
        Ok(product) => product,
        Err(db_error) => {
            error!("Failed to create product: {}", db_error);
            state.media.discard(picture.as_deref()).await;
            return Err(db_error.into());
        }
    };

    info!("Product created successfully with ID: {}, name: {}", product.id, product.name);
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(ProductResponse::from(product), "Product created successfully")),
    ))
}

/// List products, most recently posted first
#[utoipa::path(
    get,
    path = "/products",
    tag = "products",
    responses(
        (status = 200, description = "Products retrieved successfully", body = ApiResponse<Vec<ProductResponse>>),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn list_products(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<ProductResponse>>>, ApiError> {
    let products = product::Entity::find()
        .order_by_desc(product::Column::DatePosted)
        .order_by_desc(product::Column::Id)
        .all(&state.db)
        .await?;

    debug!("Retrieved {} products from database", products.len());
    let products: Vec<ProductResponse> = products.into_iter().map(ProductResponse::from).collect();
    Ok(Json(ApiResponse::ok(products, "Products retrieved successfully")))
}

/// Get a single product
#[utoipa::path(
    get,
    path = "/product-details/{product_id}",
    tag = "products",
    params(
        ("product_id" = i32, Path, description = "Product ID"),
    ),
    responses(
        (status = 200, description = "Product retrieved successfully", body = ApiResponse<ProductResponse>),
        (status = 404, description = "Product not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_product(
    Path(product_id): Path<i32>,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<ProductResponse>>, ApiError> {
    let product = find_product(&state.db, product_id).await?;
    Ok(Json(ApiResponse::ok(ProductResponse::from(product), "Product retrieved successfully")))
}

/// Partially update a product; a new picture may be attached
#[utoipa::path(
    patch,
    path = "/edit-product/{product_id}",
    tag = "products",
    params(
        ("product_id" = i32, Path, description = "Product ID"),
    ),
    request_body(
        content = ProductForm,
        content_type = "multipart/form-data",
        description = "Every field is optional; only the ones sent are changed"
    ),
    responses(
        (status = 200, description = "Product updated successfully", body = ApiResponse<ProductResponse>),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 404, description = "Product not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state, multipart))]
pub async fn edit_product(
    Path(product_id): Path<i32>,
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<ApiResponse<ProductResponse>>, ApiError> {
    trace!("Entering edit_product function for product_id: {}", product_id);
    let mut form = FormData::from_multipart(multipart).await?;

    let product = find_product(&state.db, product_id).await?;

    let quantity = form.parse::<i32>("quantity")?;
    if quantity.is_some_and(|q| q < 0) {
        return Err(ApiError::validation("quantity: Ensure this value is greater than or equal to 0."));
    }

    let previous_picture = product.picture.clone();
    let mut active: product::ActiveModel = product.into();

    if let Some(name) = form.text("name") {
        debug!("Updating product name to: {}", name);
        active.name = Set(name);
    }
    if let Some(price) = form.text("price") {
        active.price = Set(Some(price));
    }
    if let Some(status) = form.text("status") {
        active.status = Set(status);
    }
    if let Some(product_type) = form.text("type") {
        active.product_type = Set(Some(product_type));
    }
    if let Some(quantity) = quantity {
        active.quantity = Set(quantity);
    }

    let mut new_picture = None;
    if let Some(file) = form.take_file("picture") {
        let key = state.media.save(MediaFolder::Products, &file.file_name, &file.data).await?;
        active.picture = Set(Some(key.clone()));
        new_picture = Some(key);
    }

    let updated = match active.update(&state.db).await {
        Ok(updated) => updated,
        Err(db_error) => {
            error!("Failed to update product {}: {}", product_id, db_error);
            state.media.discard(new_picture.as_deref()).await;
            return Err(db_error.into());
        }
    };

    if new_picture.is_some() {
        state.media.discard(previous_picture.as_deref()).await;
    }

    info!("Product {} updated successfully", updated.id);
    Ok(Json(ApiResponse::ok(ProductResponse::from(updated), "Product updated successfully")))
}

/// Delete a product and the deliveries ordering it
#[utoipa::path(
    delete,
    path = "/delete-product/{product_id}",
    tag = "products",
    params(
        ("product_id" = i32, Path, description = "Product ID"),
    ),
    responses(
        (status = 204, description = "Product deleted successfully"),
        (status = 404, description = "Product not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn delete_product(
    Path(product_id): Path<i32>,
    State(state): State<AppState>,
) -> Result<StatusCode, ApiError> {
    let txn = state.db.begin().await?;
    let product = find_product(&txn, product_id).await?;

    let receipts: Vec<Option<String>> = delivery::Entity::find()
        .filter(delivery::Column::ProductId.eq(product_id))
        .select_only()
        .column(delivery::Column::Payment)
        .into_tuple()
        .all(&txn)
        .await?;

    let removed = delivery::Entity::delete_many()
        .filter(delivery::Column::ProductId.eq(product_id))
        .exec(&txn)
        .await?;
    product::Entity::delete_by_id(product_id).exec(&txn).await?;
    txn.commit().await?;

    state.media.discard(product.picture.as_deref()).await;
    for key in receipts.iter().flatten() {
        state.media.discard(Some(key)).await;
    }

    info!(
        "Product {} deleted together with {} deliveries",
        product_id, removed.rows_affected
    );
    Ok(StatusCode::NO_CONTENT)
}

/// Take units out of stock
///
/// The decrement only applies while enough stock is left, so two concurrent
/// requests can never push the quantity below zero.
#[utoipa::path(
    patch,
    path = "/products/{product_id}/deduct",
    tag = "products",
    params(
        ("product_id" = i32, Path, description = "Product ID"),
    ),
    request_body = DeductQuantityRequest,
    responses(
        (status = 200, description = "Stock deducted successfully", body = ApiResponse<ProductResponse>),
        (status = 400, description = "Invalid quantity or not enough stock", body = ErrorResponse),
        (status = 404, description = "Product not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn deduct_quantity(
    Path(product_id): Path<i32>,
    State(state): State<AppState>,
    ValidJson(request): ValidJson<DeductQuantityRequest>,
) -> Result<Json<ApiResponse<ProductResponse>>, ApiError> {
    debug!("Deducting {} units from product {}", request.quantity, product_id);

    let result = product::Entity::update_many()
        .col_expr(
            product::Column::Quantity,
            Expr::col(product::Column::Quantity).sub(request.quantity),
        )
        .filter(product::Column::Id.eq(product_id))
        .filter(product::Column::Quantity.gte(request.quantity))
        .exec(&state.db)
        .await?;

    let product = find_product(&state.db, product_id).await?;

    if result.rows_affected == 0 {
        warn!(
            "Cannot deduct {} units from product {}: only {} in stock",
            request.quantity, product_id, product.quantity
        );
        return Err(ApiError::validation(format!(
            "Requested quantity {} exceeds available stock {}",
            request.quantity, product.quantity
        )));
    }

    info!("Product {} stock is now {}", product.id, product.quantity);
    Ok(Json(ApiResponse::ok(ProductResponse::from(product), "Stock deducted successfully")))
}
