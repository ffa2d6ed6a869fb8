// src/services/booking_lifecycle.rs

use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::{BookingRepository, BusinessRepository},
    models::{
        booking::{Booking, BookingAction},
        notification::MessageType,
    },
    services::notification_dispatcher::NotificationDispatcher,
};

#[derive(Clone)]
pub struct BookingLifecycleService {
    businesses: Arc<dyn BusinessRepository>,
    bookings: Arc<dyn BookingRepository>,
    dispatcher: Arc<NotificationDispatcher>,
}

impl BookingLifecycleService {
    pub fn new(
        businesses: Arc<dyn BusinessRepository>,
        bookings: Arc<dyn BookingRepository>,
        dispatcher: Arc<NotificationDispatcher>,
    ) -> Self {
        Self { businesses, bookings, dispatcher }
    }

    /// Aplica a ação e persiste. O envio da mensagem nunca desfaz a transição.
    pub async fn transition(
        &self,
        business_id: Uuid,
        booking_id: Uuid,
        action: BookingAction,
        now: DateTime<Utc>,
    ) -> Result<Booking, AppError> {
        let business = self
            .businesses
            .find_business(business_id)
            .await?
            .ok_or(AppError::BusinessNotFound)?;

        let mut booking = self
            .bookings
            .find_booking(business_id, booking_id)
            .await?
            .ok_or(AppError::BookingNotFound)?;

        let previous = booking.status;
        booking.apply(&action, now)?;
        let booking = self.bookings.update_status(&booking, previous).await?;

        tracing::info!("Agendamento {}: '{}' aplicado ({:?})", booking.id, action.name(), booking.status);

        let message_type = match action {
            BookingAction::Confirm => Some(MessageType::Confirmation),
            BookingAction::Cancel { .. } => Some(MessageType::Cancellation),
            BookingAction::Complete | BookingAction::MarkNoShow => None,
        };

        if let Some(message_type) = message_type {
            self.dispatcher.dispatch(&booking, &business, message_type).await;
        }

        Ok(booking)
    }
}
