// src/db/credential_repo.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::messaging::{ChannelCredential, RefreshedToken},
};

// Credencial do canal próprio de cada estabelecimento.
// Vive nas colunas channel_* da tabela businesses, nunca em memória global.
#[async_trait]
pub trait CredentialRepository: Send + Sync {
    async fn load_credential(&self, business_id: Uuid) -> Result<Option<ChannelCredential>, AppError>;

    async fn store_credential(&self, business_id: Uuid, token: &RefreshedToken) -> Result<(), AppError>;

    /// Limpa token, refresh token e validade (a UI pede reconexão).
    async fn clear_credential(&self, business_id: Uuid) -> Result<(), AppError>;
}

#[derive(Clone)]
pub struct PgCredentialRepository {
    pool: PgPool,
}

impl PgCredentialRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct CredentialRow {
    channel_access_token: Option<String>,
    channel_refresh_token: Option<String>,
    channel_token_expires_at: Option<DateTime<Utc>>,
}

#[async_trait]
impl CredentialRepository for PgCredentialRepository {
    async fn load_credential(&self, business_id: Uuid) -> Result<Option<ChannelCredential>, AppError> {
        let row = sqlx::query_as::<_, CredentialRow>(
            r#"
            SELECT channel_access_token, channel_refresh_token, channel_token_expires_at
            FROM businesses
            WHERE id = $1
            "#,
        )
            .bind(business_id)
            .fetch_optional(&self.pool)
            .await?;

        // Sem access token = sem credencial
        Ok(row.and_then(|r| {
            r.channel_access_token.map(|access_token| ChannelCredential {
                access_token,
                refresh_token: r.channel_refresh_token,
                expires_at: r.channel_token_expires_at,
            })
        }))
    }

    async fn store_credential(&self, business_id: Uuid, token: &RefreshedToken) -> Result<(), AppError> {
        // Se o provedor não devolver refresh token novo, mantemos o atual
        sqlx::query(
            r#"
            UPDATE businesses
            SET channel_access_token = $2,
                channel_refresh_token = COALESCE($3, channel_refresh_token),
                channel_token_expires_at = $4,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
            .bind(business_id)
            .bind(&token.access_token)
            .bind(token.refresh_token.as_deref())
            .bind(token.expires_at)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn clear_credential(&self, business_id: Uuid) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE businesses
            SET channel_access_token = NULL,
                channel_refresh_token = NULL,
                channel_token_expires_at = NULL,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
            .bind(business_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
