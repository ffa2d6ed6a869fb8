// src/db/notification_repo.rs

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::notification::{ChannelBotMapping, MessageType, NewNotificationRecord, NotificationRecord},
};

#[async_trait]
pub trait NotificationRepository: Send + Sync {
    /// Ausência é esperada: o cliente ainda não adicionou o bot do estabelecimento.
    async fn find_bot_mapping(
        &self,
        business_id: Uuid,
        channel_user_id: &str,
    ) -> Result<Option<ChannelBotMapping>, AppError>;

    async fn record(&self, record: &NewNotificationRecord) -> Result<NotificationRecord, AppError>;

    // Já existe envio com sucesso deste tipo para o agendamento?
    async fn was_sent(&self, booking_id: Uuid, message_type: MessageType) -> Result<bool, AppError>;

    async fn list_for_booking(&self, booking_id: Uuid) -> Result<Vec<NotificationRecord>, AppError>;
}

#[derive(Clone)]
pub struct PgNotificationRepository {
    pool: PgPool,
}

impl PgNotificationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationRepository for PgNotificationRepository {
    async fn find_bot_mapping(
        &self,
        business_id: Uuid,
        channel_user_id: &str,
    ) -> Result<Option<ChannelBotMapping>, AppError> {
        let mapping = sqlx::query_as::<_, ChannelBotMapping>(
            r#"
            SELECT business_id, channel_user_id, bot_user_id, created_at
            FROM channel_bot_mappings
            WHERE business_id = $1 AND channel_user_id = $2
            "#,
        )
            .bind(business_id)
            .bind(channel_user_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(mapping)
    }

    async fn record(&self, record: &NewNotificationRecord) -> Result<NotificationRecord, AppError> {
        let saved = sqlx::query_as::<_, NotificationRecord>(
            r#"
            INSERT INTO notification_records (
                booking_id, business_id, message_type, delivery_status, reason, payload
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, booking_id, business_id, message_type, delivery_status, reason, payload, created_at
            "#,
        )
            .bind(record.booking_id)
            .bind(record.business_id)
            .bind(record.message_type)
            .bind(record.delivery_status)
            .bind(record.reason.as_deref())
            .bind(&record.payload)
            .fetch_one(&self.pool)
            .await?;

        Ok(saved)
    }

    async fn was_sent(&self, booking_id: Uuid, message_type: MessageType) -> Result<bool, AppError> {
        let sent: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM notification_records
                WHERE booking_id = $1 AND message_type = $2 AND delivery_status = 'sent'
            )
            "#,
        )
            .bind(booking_id)
            .bind(message_type)
            .fetch_one(&self.pool)
            .await?;

        Ok(sent)
    }

    async fn list_for_booking(&self, booking_id: Uuid) -> Result<Vec<NotificationRecord>, AppError> {
        let records = sqlx::query_as::<_, NotificationRecord>(
            r#"
            SELECT id, booking_id, business_id, message_type, delivery_status, reason, payload, created_at
            FROM notification_records
            WHERE booking_id = $1
            ORDER BY created_at ASC
            "#,
        )
            .bind(booking_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(records)
    }
}
