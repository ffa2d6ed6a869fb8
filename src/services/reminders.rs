// src/services/reminders.rs

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::{
    common::error::AppError,
    db::{BookingRepository, BusinessRepository},
    models::notification::MessageType,
    services::notification_dispatcher::NotificationDispatcher,
};

pub const DEFAULT_LOOKAHEAD_HOURS: i64 = 24;
pub const DEFAULT_INTERVAL_MINUTES: u64 = 15;

/// Resumo de uma varredura.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReminderSweep {
    pub due: usize,
    pub sent: usize,
}

#[derive(Clone)]
pub struct ReminderService {
    businesses: Arc<dyn BusinessRepository>,
    bookings: Arc<dyn BookingRepository>,
    dispatcher: Arc<NotificationDispatcher>,
    lookahead: Duration,
}

impl ReminderService {
    pub fn new(
        businesses: Arc<dyn BusinessRepository>,
        bookings: Arc<dyn BookingRepository>,
        dispatcher: Arc<NotificationDispatcher>,
        lookahead: Duration,
    ) -> Self {
        Self { businesses, bookings, dispatcher, lookahead }
    }

    /// Envia lembrete para os confirmados que começam dentro da janela.
    pub async fn send_due_reminders(&self, now: DateTime<Utc>) -> Result<ReminderSweep, AppError> {
        let due = self.bookings.list_due_reminders(now, now + self.lookahead).await?;
        let mut sweep = ReminderSweep { due: due.len(), sent: 0 };

        for booking in due {
            let Some(business) = self.businesses.find_business(booking.business_id).await? else {
                tracing::warn!("Agendamento {} sem estabelecimento, lembrete ignorado", booking.id);
                continue;
            };

            if self
                .dispatcher
                .dispatch(&booking, &business, MessageType::Reminder)
                .await
                .is_sent()
            {
                sweep.sent += 1;
            }
        }

        if sweep.due > 0 {
            tracing::info!("⏰ Lembretes: {} enviados de {} pendentes", sweep.sent, sweep.due);
        }
        Ok(sweep)
    }
}
