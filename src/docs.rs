// src/docs.rs

use utoipa::OpenApi;

use crate::handlers;
use crate::models;

#[derive(OpenApi)]
#[openapi(
    paths(
        // --- Bookings ---
        handlers::bookings::create_booking,
        handlers::bookings::update_booking_status,
        handlers::bookings::list_booking_notifications,

        // --- Messaging ---
        handlers::messaging::get_messaging_status,
        handlers::messaging::save_message_template,
    ),
    components(
        schemas(
            // --- Bookings ---
            models::booking::BookingStatus,
            models::booking::CancelledBy,
            models::booking::Booking,
            models::booking::BookingAction,
            models::booking::BookingDateTime,
            models::booking::BookingRequest,
            models::booking::BookingOutcome,

            // --- Customers ---
            models::customer::CustomerType,
            models::customer::CustomerIdentity,
            models::customer::Customer,

            // --- Messaging ---
            models::business::MessagingMode,
            models::messaging::ConnectionStatus,
            models::messaging::ConnectionStatusResponse,
            models::notification::MessageType,
            models::notification::DeliveryStatus,
            models::notification::DispatchOutcome,
            models::notification::NotificationRecord,
            models::notification::MessageTemplateOverride,
        )
    ),
    tags(
        (name = "Bookings", description = "Entrada e ciclo de vida dos agendamentos"),
        (name = "Messaging", description = "Canal de mensagens e templates")
    )
)]
pub struct ApiDoc;
