// src/db/booking_repo.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::booking::{Booking, BookingStatus, NewBooking, TransitionError},
};

#[async_trait]
pub trait BookingRepository: Send + Sync {
    /// Existe reserva ativa (`pending`/`confirmed`) do profissional sobrepondo `[start, end)`?
    async fn has_conflict(
        &self,
        staff_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<bool, AppError>;

    /// Verifica conflito e insere de forma atômica.
    /// `None` significa que o horário foi tomado por outra reserva.
    async fn try_reserve(&self, booking: &NewBooking) -> Result<Option<Booking>, AppError>;

    async fn find_booking(&self, business_id: Uuid, booking_id: Uuid) -> Result<Option<Booking>, AppError>;

    /// Persiste status, no-show e dados de cancelamento, somente se o status
    /// gravado ainda for `expected` (compare-and-set).
    async fn update_status(&self, booking: &Booking, expected: BookingStatus) -> Result<Booking, AppError>;

    async fn mark_confirmation_sent(&self, booking_id: Uuid) -> Result<(), AppError>;

    async fn mark_reminder_sent(&self, booking_id: Uuid) -> Result<(), AppError>;

    // Confirmados sem lembrete, começando em [from, until)
    async fn list_due_reminders(
        &self,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<Booking>, AppError>;
}

const BOOKING_COLUMNS: &str = r#"
    id, business_id, customer_id, service_id, staff_id, date_time, duration_minutes,
    status, no_show, responses, confirmation_sent, reminder_sent,
    cancellation_reason, cancelled_by, created_at, updated_at
"#;

// 40001 = serialization_failure, 23P01 = exclusion_violation
fn is_slot_conflict(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .and_then(|db_err| db_err.code())
        .is_some_and(|code| code == "40001" || code == "23P01")
}

#[derive(Clone)]
pub struct PgBookingRepository {
    pool: PgPool,
}

impl PgBookingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BookingRepository for PgBookingRepository {
    async fn has_conflict(
        &self,
        staff_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM bookings
                WHERE staff_id = $1
                  AND status IN ('pending', 'confirmed')
                  AND date_time < $3
                  AND $2 < end_time
            )
            "#,
        )
            .bind(staff_id)
            .bind(start)
            .bind(end)
            .fetch_one(&self.pool)
            .await?;

        Ok(exists)
    }

    async fn try_reserve(&self, booking: &NewBooking) -> Result<Option<Booking>, AppError> {
        // Verificação e inserção na MESMA transação serializável.
        // A constraint de exclusão (bookings_no_staff_overlap) é a última barreira.
        let mut tx = self.pool.begin().await?;

        sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
            .execute(&mut *tx)
            .await?;

        let end = booking.end_time();

        if let Some(staff_id) = booking.staff_id {
            let taken: bool = match sqlx::query_scalar(
                r#"
                SELECT EXISTS (
                    SELECT 1 FROM bookings
                    WHERE staff_id = $1
                      AND status IN ('pending', 'confirmed')
                      AND date_time < $3
                      AND $2 < end_time
                )
                "#,
            )
                .bind(staff_id)
                .bind(booking.date_time)
                .bind(end)
                .fetch_one(&mut *tx)
                .await
            {
                Ok(taken) => taken,
                Err(e) if is_slot_conflict(&e) => return Ok(None),
                Err(e) => return Err(e.into()),
            };

            if taken {
                // O drop do tx faz o rollback
                return Ok(None);
            }
        }

        let query = format!(
            r#"
            INSERT INTO bookings (
                business_id, customer_id, service_id, staff_id,
                date_time, end_time, duration_minutes, status, responses
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {BOOKING_COLUMNS}
            "#
        );

        let inserted = sqlx::query_as::<_, Booking>(&query)
            .bind(booking.business_id)
            .bind(booking.customer_id)
            .bind(booking.service_id)
            .bind(booking.staff_id)
            .bind(booking.date_time)
            .bind(end)
            .bind(booking.duration_minutes)
            .bind(booking.status)
            .bind(&booking.responses)
            .fetch_one(&mut *tx)
            .await;

        let created = match inserted {
            Ok(created) => created,
            Err(e) if is_slot_conflict(&e) => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        match tx.commit().await {
            Ok(()) => Ok(Some(created)),
            Err(e) if is_slot_conflict(&e) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn find_booking(&self, business_id: Uuid, booking_id: Uuid) -> Result<Option<Booking>, AppError> {
        let query = format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE business_id = $1 AND id = $2");
        let booking = sqlx::query_as::<_, Booking>(&query)
            .bind(business_id)
            .bind(booking_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(booking)
    }

    async fn update_status(&self, booking: &Booking, expected: BookingStatus) -> Result<Booking, AppError> {
        let query = format!(
            r#"
            UPDATE bookings
            SET status = $2, no_show = $3, cancellation_reason = $4, cancelled_by = $5, updated_at = $6
            WHERE id = $1 AND status = $7
            RETURNING {BOOKING_COLUMNS}
            "#
        );

        let updated = sqlx::query_as::<_, Booking>(&query)
            .bind(booking.id)
            .bind(booking.status)
            .bind(booking.no_show)
            .bind(booking.cancellation_reason.as_deref())
            .bind(booking.cancelled_by)
            .bind(booking.updated_at)
            .bind(expected)
            .fetch_optional(&self.pool)
            .await?;

        // Nenhuma linha: o status mudou desde a leitura
        updated.ok_or(AppError::InvalidStatusTransition(TransitionError::StatusChanged { expected }))
    }

    async fn mark_confirmation_sent(&self, booking_id: Uuid) -> Result<(), AppError> {
        sqlx::query("UPDATE bookings SET confirmation_sent = TRUE, updated_at = NOW() WHERE id = $1")
            .bind(booking_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn mark_reminder_sent(&self, booking_id: Uuid) -> Result<(), AppError> {
        sqlx::query("UPDATE bookings SET reminder_sent = TRUE, updated_at = NOW() WHERE id = $1")
            .bind(booking_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn list_due_reminders(
        &self,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<Booking>, AppError> {
        let query = format!(
            r#"
            SELECT {BOOKING_COLUMNS} FROM bookings
            WHERE status = 'confirmed'
              AND reminder_sent = FALSE
              AND date_time >= $1
              AND date_time < $2
            ORDER BY date_time ASC
            "#
        );

        let bookings = sqlx::query_as::<_, Booking>(&query)
            .bind(from)
            .bind(until)
            .fetch_all(&self.pool)
            .await?;

        Ok(bookings)
    }
}
