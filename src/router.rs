use crate::handlers::{
    accounts::{
        delete_account, get_profile, list_clients, list_riders, register, update_profile_picture,
        update_profile_status,
    },
    auth::{login, me, refresh_token},
    chat::{get_room, list_rooms, mark_read, post_message, search_accounts},
    deliveries::{
        delete_delivery, list_arrived_deliveries, list_deliveries, list_user_deliveries,
        submit_delivery, update_delivery_payment, update_delivery_status,
    },
    health::health_check,
    payments::{create_payment, list_user_payments},
    products::{create_product, deduct_quantity, delete_product, edit_product, get_product, list_products},
    transportation::{
        create_transportation, get_transportation_map, list_arrived_transportations,
        list_transportations, list_user_transportations, update_price_payment, update_rider,
        update_status_price_payment,
    },
};
use crate::media::MEDIA_URL_PREFIX;
use crate::schemas::{ApiDoc, AppState};
use axum::{
    routing::{delete, get, patch, post},
    Router,
};
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, services::ServeDir, timeout::TimeoutLayer,
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Create application router with all routes and middleware
pub fn create_router(state: AppState) -> Router {
    let media_dir = ServeDir::new(state.media.root());

    let router = Router::new()
        // Health check
        .route("/health", get(health_check))
        // Accounts and profiles
        .route("/register", post(register))
        .route("/profile/:user_id", get(get_profile))
        .route("/profile/:user_id/status", patch(update_profile_status))
        .route("/profile/:user_id/picture", patch(update_profile_picture))
        .route("/clients", get(list_clients))
        .route("/riders", get(list_riders))
        .route("/accounts/:user_id", delete(delete_account))
        // Authentication
        .route("/login", post(login))
        .route("/token/refresh", post(refresh_token))
        .route("/me", get(me))
        // Product catalog
        .route("/post-products", post(create_product))
        .route("/products", get(list_products))
        .route("/product-details/:product_id", get(get_product))
        .route("/edit-product/:product_id", patch(edit_product))
        .route("/delete-product/:product_id", delete(delete_product))
        .route("/products/:product_id/deduct", patch(deduct_quantity))
        // Deliveries
        .route("/deliveries", get(list_deliveries))
        .route("/deliveries/arrived", get(list_arrived_deliveries))
        .route("/deliveries/submit/:user_id/:product_id", post(submit_delivery))
        .route("/deliveries/user/:user_id", get(list_user_deliveries))
        .route("/deliveries/:delivery_id", delete(delete_delivery))
        .route("/deliveries/:delivery_id/update-status", patch(update_delivery_status))
        .route("/deliveries/:delivery_id/update-payment", patch(update_delivery_payment))
        // Transportation
        .route("/transportation/:user_id/create", post(create_transportation))
        .route("/transportation/user/:user_id", get(list_user_transportations))
        .route("/transportations", get(list_transportations))
        .route("/transportations/arrived", get(list_arrived_transportations))
        .route("/transportations/:transportation_id/map", get(get_transportation_map))
        .route(
            "/transportations/:transportation_id/update-price-payment",
            patch(update_price_payment),
        )
        .route("/transportations/:transportation_id/update-rider", patch(update_rider))
        .route(
            "/transportations/:transportation_id/update-status-price-payment",
            patch(update_status_price_payment),
        )
        // Payments
        .route("/payments/:user_id", post(create_payment))
        .route("/payments/user/:user_id", get(list_user_payments))
        // Chat
        .route("/chat/search", get(search_accounts))
        .route("/chat/rooms/:user_id", get(list_rooms))
        .route("/chat/:user1_id/:user2_id", get(get_room).post(post_message))
        .route("/chat/:user1_id/:user2_id/read", patch(mark_read))
        // Uploaded images
        .nest_service(MEDIA_URL_PREFIX, media_dir)
        // Swagger UI
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // The Prometheus recorder is process-global, so tests run without it.
    #[cfg(not(test))]
    let router = {
        let (prometheus_layer, metric_handle) = axum_prometheus::PrometheusMetricLayer::pair();
        router
            .route("/metrics", get(|| async move { metric_handle.render() }))
            .layer(prometheus_layer)
    };

    router
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(TimeoutLayer::new(Duration::from_secs(30)))
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}
