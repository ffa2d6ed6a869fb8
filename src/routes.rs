// src/routes.rs

use axum::{
    routing::{get, patch, post, put},
    Router,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{config::AppState, docs::ApiDoc, handlers};

pub fn app(app_state: AppState) -> Router {
    // Rotas do painel: escopo pelo cabeçalho x-tenant-id (auth fica na camada externa)
    let booking_routes = Router::new()
        .route("/", post(handlers::bookings::create_booking))
        .route("/{booking_id}/status", patch(handlers::bookings::update_booking_status))
        .route(
            "/{booking_id}/notifications",
            get(handlers::bookings::list_booking_notifications),
        );

    let messaging_routes = Router::new()
        .route("/status", get(handlers::messaging::get_messaging_status))
        .route("/templates/{message_type}", put(handlers::messaging::save_message_template));

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/api/health", get(|| async { "OK" }))
        .nest("/api/bookings", booking_routes)
        .nest("/api/messaging", messaging_routes)
        .with_state(app_state)
}
