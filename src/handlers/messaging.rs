// src/handlers/messaging.rs

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::Utc;

use crate::{
    common::error::{ApiError, AppError},
    config::AppState,
    middleware::{i18n::Locale, tenancy::TenantContext},
    models::{
        messaging::{ConnectionStatus, ConnectionStatusResponse},
        notification::{MessageTemplateOverride, MessageType},
    },
    services::templates::save_template_override,
};

// GET /api/messaging/status
#[utoipa::path(
    get,
    path = "/api/messaging/status",
    tag = "Messaging",
    responses(
        (status = 200, description = "Situação da conexão do canal próprio", body = ConnectionStatusResponse)
    ),
    params(
        ("x-tenant-id" = Uuid, Header, description = "ID do estabelecimento")
    )
)]
pub async fn get_messaging_status(
    State(app_state): State<AppState>,
    locale: Locale,
    tenant: TenantContext,
) -> Result<impl IntoResponse, ApiError> {
    let business = app_state
        .businesses
        .find_business(tenant.0)
        .await
        .map_err(|app_err| app_err.to_api_error(&locale, &app_state.i18n_store))?
        .ok_or_else(|| AppError::BusinessNotFound.to_api_error(&locale, &app_state.i18n_store))?;

    let status = app_state.token_manager.connection_status(&business, Utc::now()).await;
    let expires_at = match status {
        ConnectionStatus::Disconnected => None,
        _ => business.channel_token_expires_at,
    };

    Ok((StatusCode::OK, Json(ConnectionStatusResponse { status, expires_at })))
}

// PUT /api/messaging/templates/{messageType}
#[utoipa::path(
    put,
    path = "/api/messaging/templates/{message_type}",
    tag = "Messaging",
    request_body = MessageTemplateOverride,
    responses(
        (status = 204, description = "Template salvo"),
        (status = 400, description = "Cabeçalho ou corpo fora dos limites")
    ),
    params(
        ("message_type" = MessageType, Path, description = "Tipo de mensagem"),
        ("x-tenant-id" = Uuid, Header, description = "ID do estabelecimento")
    )
)]
pub async fn save_message_template(
    State(app_state): State<AppState>,
    locale: Locale,
    tenant: TenantContext,
    Path(message_type): Path<MessageType>,
    Json(payload): Json<MessageTemplateOverride>,
) -> Result<impl IntoResponse, ApiError> {
    save_template_override(app_state.businesses.as_ref(), tenant.0, message_type, &payload)
        .await
        .map_err(|app_err| app_err.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(StatusCode::NO_CONTENT)
}
