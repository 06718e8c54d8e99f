use crate::auth::{Claims, JwtManager, TokenType};
use crate::handlers::{
    accounts::{
        AccountResponse, AccountWithProfileResponse, ClientResponse, ProfileDetails, ProfileResponse,
        ProfilePictureForm, RegisterRequest, UpdateProfileStatusRequest,
    },
    auth::{LoginRequest, LoginResponse, RefreshRequest, RefreshResponse},
    chat::{
        AccountSummary, MarkReadRequest, MarkReadResponse, MessageResponse, PostMessageRequest,
        RoomResponse, RoomSummaryResponse,
    },
    deliveries::{
        DeliveryPaymentForm, DeliveryResponse, SubmitDeliveryRequest, UpdateDeliveryStatusRequest,
    },
    payments::{PaymentForm, PaymentResponse},
    products::{CreateProductRequest, DeductQuantityRequest, ProductForm, ProductResponse},
    transportation::{
        CreateTransportationRequest, PricePaymentForm, StatusPricePaymentForm, TransportationResponse,
        UpdateRiderRequest,
    },
};
use crate::media::MediaStore;
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi, ToSchema};

/// Application state shared across handlers
#[derive(Clone, Debug)]
pub struct AppState {
    /// Database connection
    pub db: DatabaseConnection,
    /// Token issuer and verifier
    pub jwt: JwtManager,
    /// Uploaded image storage
    pub media: MediaStore,
}

/// API response wrapper
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiResponse<T> {
    /// Response data
    pub data: T,
    /// Response message
    pub message: String,
    /// Success status
    pub success: bool,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T, message: impl Into<String>) -> Self {
        Self {
            data,
            message: message.into(),
            success: true,
        }
    }
}

/// Error response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Error message
    pub error: String,
    /// Error code
    pub code: String,
    /// Success status (always false for errors)
    pub success: bool,
}

/// Health check response
#[derive(Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// Service status
    pub status: String,
    /// Service version
    pub version: String,
    /// Database connection status
    pub database: String,
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::health::health_check,
        crate::handlers::accounts::register,
        crate::handlers::accounts::get_profile,
        crate::handlers::accounts::list_clients,
        crate::handlers::accounts::update_profile_status,
        crate::handlers::accounts::update_profile_picture,
        crate::handlers::accounts::list_riders,
        crate::handlers::accounts::delete_account,
        crate::handlers::auth::login,
        crate::handlers::auth::refresh_token,
        crate::handlers::auth::me,
        crate::handlers::products::create_product,
        crate::handlers::products::list_products,
        crate::handlers::products::get_product,
        crate::handlers::products::edit_product,
        crate::handlers::products::delete_product,
        crate::handlers::products::deduct_quantity,
        crate::handlers::deliveries::submit_delivery,
        crate::handlers::deliveries::list_user_deliveries,
        crate::handlers::deliveries::list_deliveries,
        crate::handlers::deliveries::update_delivery_status,
        crate::handlers::deliveries::update_delivery_payment,
        crate::handlers::deliveries::delete_delivery,
        crate::handlers::deliveries::list_arrived_deliveries,
        crate::handlers::transportation::create_transportation,
        crate::handlers::transportation::list_user_transportations,
        crate::handlers::transportation::get_transportation_map,
        crate::handlers::transportation::update_price_payment,
        crate::handlers::transportation::update_rider,
        crate::handlers::transportation::update_status_price_payment,
        crate::handlers::transportation::list_transportations,
        crate::handlers::transportation::list_arrived_transportations,
        crate::handlers::payments::create_payment,
        crate::handlers::payments::list_user_payments,
        crate::handlers::chat::get_room,
        crate::handlers::chat::post_message,
        crate::handlers::chat::mark_read,
        crate::handlers::chat::list_rooms,
        crate::handlers::chat::search_accounts,
    ),
    components(
        schemas(
            ErrorResponse,
            HealthResponse,
            RegisterRequest,
            UpdateProfileStatusRequest,
            AccountResponse,
            AccountWithProfileResponse,
            ClientResponse,
            ProfileDetails,
            ProfileResponse,
            ProfilePictureForm,
            LoginRequest,
            LoginResponse,
            RefreshRequest,
            RefreshResponse,
            Claims,
            TokenType,
            CreateProductRequest,
            DeductQuantityRequest,
            ProductResponse,
            ProductForm,
            SubmitDeliveryRequest,
            UpdateDeliveryStatusRequest,
            DeliveryResponse,
            DeliveryPaymentForm,
            CreateTransportationRequest,
            UpdateRiderRequest,
            TransportationResponse,
            PricePaymentForm,
            StatusPricePaymentForm,
            PaymentResponse,
            PaymentForm,
            AccountSummary,
            MessageResponse,
            PostMessageRequest,
            MarkReadRequest,
            MarkReadResponse,
            RoomResponse,
            RoomSummaryResponse,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "accounts", description = "Registration, profiles and account management"),
        (name = "auth", description = "Token issuance and refresh"),
        (name = "products", description = "Product catalog"),
        (name = "deliveries", description = "Delivery orders"),
        (name = "transportation", description = "Ride requests"),
        (name = "payments", description = "Payment receipts"),
        (name = "chat", description = "Direct messaging between two accounts"),
    ),
    info(
        title = "Courier API",
        description = "Delivery and ride marketplace API: accounts, catalog, deliveries, rides and messaging",
        version = "0.1.0",
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    )
)]
pub struct ApiDoc;

/// Registers the bearer token scheme referenced by authenticated paths
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}
