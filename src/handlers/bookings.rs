// src/handlers/bookings.rs

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use uuid::Uuid;

use crate::{
    common::error::{ApiError, AppError},
    config::AppState,
    middleware::{i18n::Locale, tenancy::TenantContext},
    models::{
        booking::{Booking, BookingAction, BookingOutcome, BookingRequest},
        notification::NotificationRecord,
    },
};

// POST /api/bookings
#[utoipa::path(
    post,
    path = "/api/bookings",
    tag = "Bookings",
    request_body = BookingRequest,
    responses(
        (status = 201, description = "Agendamento criado", body = BookingOutcome),
        (status = 402, description = "Assinatura do estabelecimento inativa"),
        (status = 409, description = "Horário indisponível (código no campo `code`)")
    )
)]
pub async fn create_booking(
    State(app_state): State<AppState>,
    locale: Locale,
    Json(payload): Json<BookingRequest>,
) -> Result<impl IntoResponse, ApiError> {
    // Mensagens de erro no idioma pedido no corpo, se houver
    let locale = locale.with_override(payload.locale.as_deref());

    let outcome = app_state
        .admission_service
        .admit(payload, &locale, Utc::now())
        .await
        .map_err(|app_err| app_err.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::CREATED, Json(outcome)))
}

// PATCH /api/bookings/{id}/status
#[utoipa::path(
    patch,
    path = "/api/bookings/{booking_id}/status",
    tag = "Bookings",
    request_body = BookingAction,
    responses(
        (status = 200, description = "Status atualizado", body = Booking),
        (status = 404, description = "Agendamento não encontrado"),
        (status = 409, description = "Transição não permitida")
    ),
    params(
        ("booking_id" = Uuid, Path, description = "ID do agendamento"),
        ("x-tenant-id" = Uuid, Header, description = "ID do estabelecimento")
    )
)]
pub async fn update_booking_status(
    State(app_state): State<AppState>,
    locale: Locale,
    tenant: TenantContext,
    Path(booking_id): Path<Uuid>,
    Json(action): Json<BookingAction>,
) -> Result<impl IntoResponse, ApiError> {
    let booking = app_state
        .lifecycle_service
        .transition(tenant.0, booking_id, action, Utc::now())
        .await
        .map_err(|app_err| app_err.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(booking)))
}

// GET /api/bookings/{id}/notifications
#[utoipa::path(
    get,
    path = "/api/bookings/{booking_id}/notifications",
    tag = "Bookings",
    responses(
        (status = 200, description = "Histórico de envios do agendamento", body = [NotificationRecord])
    ),
    params(
        ("booking_id" = Uuid, Path, description = "ID do agendamento"),
        ("x-tenant-id" = Uuid, Header, description = "ID do estabelecimento")
    )
)]
pub async fn list_booking_notifications(
    State(app_state): State<AppState>,
    locale: Locale,
    tenant: TenantContext,
    Path(booking_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let to_api = |app_err: AppError| app_err.to_api_error(&locale, &app_state.i18n_store);

    // Garante que o agendamento pertence ao estabelecimento
    app_state
        .bookings
        .find_booking(tenant.0, booking_id)
        .await
        .map_err(to_api)?
        .ok_or(AppError::BookingNotFound)
        .map_err(to_api)?;

    let records = app_state
        .notifications
        .list_for_booking(booking_id)
        .await
        .map_err(to_api)?;

    Ok((StatusCode::OK, Json(records)))
}
