// src/services/conflict.rs

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::BookingRepository,
    models::booking::{Booking, NewBooking},
};

/// Teste simétrico de sobreposição entre `[a_start, a_end)` e `[b_start, b_end)`.
pub fn overlaps(
    a_start: DateTime<Utc>,
    a_end: DateTime<Utc>,
    b_start: DateTime<Utc>,
    b_end: DateTime<Utc>,
) -> bool {
    a_start < b_end && b_start < a_end
}

#[derive(Clone)]
pub struct ConflictDetector {
    bookings: Arc<dyn BookingRepository>,
}

impl ConflictDetector {
    pub fn new(bookings: Arc<dyn BookingRepository>) -> Self {
        Self { bookings }
    }

    /// Pré-checagem só de leitura, para recusar cedo. Não reserva nada.
    /// Sem profissional não há checagem: o estabelecimento aceita reservas simultâneas.
    pub async fn has_conflict(
        &self,
        staff_id: Option<Uuid>,
        start: DateTime<Utc>,
        duration_minutes: i32,
    ) -> Result<bool, AppError> {
        let Some(staff_id) = staff_id else {
            return Ok(false);
        };

        let end = start + Duration::minutes(i64::from(duration_minutes));
        self.bookings.has_conflict(staff_id, start, end).await
    }

    /// Reserva o horário e grava o agendamento de forma atômica.
    /// `None` = outra requisição levou o horário.
    pub async fn try_reserve(&self, booking: &NewBooking) -> Result<Option<Booking>, AppError> {
        let reserved = self.bookings.try_reserve(booking).await?;

        if reserved.is_none() {
            tracing::info!(
                "Horário {} já reservado para o profissional {:?}",
                booking.date_time,
                booking.staff_id
            );
        }

        Ok(reserved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 10, hour, minute, 0).unwrap()
    }

    #[test]
    fn overlap_is_symmetric() {
        // Existente 10:00-11:00, pedido 09:30-10:30 (começa antes e invade)
        assert!(overlaps(at(10, 0), at(11, 0), at(9, 30), at(10, 30)));
        assert!(overlaps(at(9, 30), at(10, 30), at(10, 0), at(11, 0)));
    }

    #[test]
    fn touching_intervals_do_not_overlap() {
        assert!(!overlaps(at(10, 0), at(10, 30), at(10, 30), at(11, 0)));
        assert!(!overlaps(at(10, 30), at(11, 0), at(10, 0), at(10, 30)));
    }

    #[test]
    fn contained_interval_overlaps() {
        assert!(overlaps(at(9, 0), at(12, 0), at(10, 0), at(10, 15)));
    }
}
