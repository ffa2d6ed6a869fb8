// src/db/business_repo.rs

use async_trait::async_trait;
use sqlx::{types::Json, PgPool};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::{
        business::{Business, Owner, Service, Staff},
        notification::{MessageTemplateOverride, MessageType},
    },
};

// Leitura das configurações do estabelecimento (escritas pelo painel)
#[async_trait]
pub trait BusinessRepository: Send + Sync {
    async fn find_business(&self, business_id: Uuid) -> Result<Option<Business>, AppError>;

    async fn find_owner(&self, owner_id: Uuid) -> Result<Option<Owner>, AppError>;

    async fn find_staff(&self, business_id: Uuid, staff_id: Uuid) -> Result<Option<Staff>, AppError>;

    async fn find_service(&self, business_id: Uuid, service_id: Uuid) -> Result<Option<Service>, AppError>;

    /// Grava (ou substitui) a personalização de um tipo de mensagem.
    async fn save_message_template(
        &self,
        business_id: Uuid,
        message_type: MessageType,
        template: &MessageTemplateOverride,
    ) -> Result<(), AppError>;
}

const BUSINESS_COLUMNS: &str = r#"
    id, owner_id, name, is_active, business_hours, closed_date_ranges,
    appointment_only, default_duration_minutes, requires_approval, utc_offset_minutes,
    messaging_mode, channel_access_token, channel_refresh_token, channel_token_expires_at,
    notifications_enabled, phone, address, form_fields, message_templates,
    created_at, updated_at
"#;

#[derive(Clone)]
pub struct PgBusinessRepository {
    pool: PgPool,
}

impl PgBusinessRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BusinessRepository for PgBusinessRepository {
    async fn find_business(&self, business_id: Uuid) -> Result<Option<Business>, AppError> {
        let query = format!("SELECT {BUSINESS_COLUMNS} FROM businesses WHERE id = $1");
        let business = sqlx::query_as::<_, Business>(&query)
            .bind(business_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(business)
    }

    async fn find_owner(&self, owner_id: Uuid) -> Result<Option<Owner>, AppError> {
        let owner = sqlx::query_as::<_, Owner>(
            r#"
            SELECT id, email, channel_user_id, subscription_status, trial_ends_at, subscription_ends_at
            FROM owners
            WHERE id = $1
            "#,
        )
            .bind(owner_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(owner)
    }

    async fn find_staff(&self, business_id: Uuid, staff_id: Uuid) -> Result<Option<Staff>, AppError> {
        let staff = sqlx::query_as::<_, Staff>(
            r#"
            SELECT id, business_id, name, availability, is_active
            FROM staff
            WHERE business_id = $1 AND id = $2
            "#,
        )
            .bind(business_id)
            .bind(staff_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(staff)
    }

    async fn find_service(&self, business_id: Uuid, service_id: Uuid) -> Result<Option<Service>, AppError> {
        let service = sqlx::query_as::<_, Service>(
            r#"
            SELECT id, business_id, name, duration_minutes, price, is_active
            FROM services
            WHERE business_id = $1 AND id = $2
            "#,
        )
            .bind(business_id)
            .bind(service_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(service)
    }

    async fn save_message_template(
        &self,
        business_id: Uuid,
        message_type: MessageType,
        template: &MessageTemplateOverride,
    ) -> Result<(), AppError> {
        // jsonb_set cria a chave se ela ainda não existir
        let result = sqlx::query(
            r#"
            UPDATE businesses
            SET message_templates = jsonb_set(message_templates, ARRAY[$2::text], $3, true),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
            .bind(business_id)
            .bind(message_type.as_str())
            .bind(Json(template))
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::BusinessNotFound);
        }

        Ok(())
    }
}
