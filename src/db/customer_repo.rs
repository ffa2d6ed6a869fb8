// src/db/customer_repo.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::customer::{Customer, CustomerIdentity, CustomerProfile, CustomerType},
};

#[async_trait]
pub trait CustomerRepository: Send + Sync {
    /// Cria ou atualiza pelo id do canal. Nunca duplica.
    async fn upsert_channel_customer(
        &self,
        channel_user_id: &str,
        profile: &CustomerProfile,
        now: DateTime<Utc>,
    ) -> Result<Customer, AppError>;

    /// Cria ou atualiza pelo e-mail. Nunca duplica.
    async fn upsert_web_customer(
        &self,
        email: &str,
        profile: &CustomerProfile,
        now: DateTime<Utc>,
    ) -> Result<Customer, AppError>;

    // Sempre uma linha nova
    async fn create_anonymous_customer(
        &self,
        profile: &CustomerProfile,
        now: DateTime<Utc>,
    ) -> Result<Customer, AppError>;

    async fn find_customer(&self, customer_id: Uuid) -> Result<Option<Customer>, AppError>;
}

const CUSTOMER_COLUMNS: &str = r#"
    id, customer_type, channel_user_id, email, display_name, picture_url,
    phone, language, last_active_at, created_at, updated_at
"#;

// Linha "achatada" do banco; a identidade vira um enum no domínio
#[derive(sqlx::FromRow)]
struct CustomerRow {
    id: Uuid,
    customer_type: CustomerType,
    channel_user_id: Option<String>,
    email: Option<String>,
    display_name: Option<String>,
    picture_url: Option<String>,
    phone: Option<String>,
    language: Option<String>,
    last_active_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<CustomerRow> for Customer {
    type Error = AppError;

    fn try_from(row: CustomerRow) -> Result<Self, Self::Error> {
        let identity = match row.customer_type {
            CustomerType::Channel => CustomerIdentity::Channel {
                channel_user_id: row.channel_user_id.ok_or_else(|| {
                    anyhow::anyhow!("cliente {} do tipo channel sem channel_user_id", row.id)
                })?,
            },
            CustomerType::Web => CustomerIdentity::Web {
                email: row.email.clone().ok_or_else(|| {
                    anyhow::anyhow!("cliente {} do tipo web sem e-mail", row.id)
                })?,
            },
            CustomerType::Anonymous => CustomerIdentity::Anonymous,
        };

        Ok(Customer {
            id: row.id,
            identity,
            display_name: row.display_name,
            picture_url: row.picture_url,
            phone: row.phone,
            email: row.email,
            language: row.language,
            last_active_at: row.last_active_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Clone)]
pub struct PgCustomerRepository {
    pool: PgPool,
}

impl PgCustomerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CustomerRepository for PgCustomerRepository {
    async fn upsert_channel_customer(
        &self,
        channel_user_id: &str,
        profile: &CustomerProfile,
        now: DateTime<Utc>,
    ) -> Result<Customer, AppError> {
        // O e-mail não entra aqui: ele é a chave dos clientes web
        let query = format!(
            r#"
            INSERT INTO customers (
                customer_type, channel_user_id, display_name, picture_url, phone, language, last_active_at
            )
            VALUES ('channel', $1, $2, $3, $4, $5, $6)
            ON CONFLICT (channel_user_id)
            DO UPDATE SET
                display_name = COALESCE(EXCLUDED.display_name, customers.display_name),
                picture_url = COALESCE(EXCLUDED.picture_url, customers.picture_url),
                phone = COALESCE(EXCLUDED.phone, customers.phone),
                language = COALESCE(EXCLUDED.language, customers.language),
                last_active_at = EXCLUDED.last_active_at,
                updated_at = NOW()
            RETURNING {CUSTOMER_COLUMNS}
            "#
        );

        let row = sqlx::query_as::<_, CustomerRow>(&query)
            .bind(channel_user_id)
            .bind(profile.display_name.as_deref())
            .bind(profile.picture_url.as_deref())
            .bind(profile.phone.as_deref())
            .bind(profile.language.as_deref())
            .bind(now)
            .fetch_one(&self.pool)
            .await?;

        row.try_into()
    }

    async fn upsert_web_customer(
        &self,
        email: &str,
        profile: &CustomerProfile,
        now: DateTime<Utc>,
    ) -> Result<Customer, AppError> {
        let query = format!(
            r#"
            INSERT INTO customers (
                customer_type, email, display_name, picture_url, phone, language, last_active_at
            )
            VALUES ('web', $1, $2, $3, $4, $5, $6)
            ON CONFLICT (email)
            DO UPDATE SET
                display_name = COALESCE(EXCLUDED.display_name, customers.display_name),
                phone = COALESCE(EXCLUDED.phone, customers.phone),
                language = COALESCE(EXCLUDED.language, customers.language),
                last_active_at = EXCLUDED.last_active_at,
                updated_at = NOW()
            RETURNING {CUSTOMER_COLUMNS}
            "#
        );

        let row = sqlx::query_as::<_, CustomerRow>(&query)
            .bind(email)
            .bind(profile.display_name.as_deref())
            .bind(profile.picture_url.as_deref())
            .bind(profile.phone.as_deref())
            .bind(profile.language.as_deref())
            .bind(now)
            .fetch_one(&self.pool)
            .await?;

        row.try_into()
    }

    async fn create_anonymous_customer(
        &self,
        profile: &CustomerProfile,
        now: DateTime<Utc>,
    ) -> Result<Customer, AppError> {
        let query = format!(
            r#"
            INSERT INTO customers (customer_type, display_name, phone, language, last_active_at)
            VALUES ('anonymous', $1, $2, $3, $4)
            RETURNING {CUSTOMER_COLUMNS}
            "#
        );

        let row = sqlx::query_as::<_, CustomerRow>(&query)
            .bind(profile.display_name.as_deref())
            .bind(profile.phone.as_deref())
            .bind(profile.language.as_deref())
            .bind(now)
            .fetch_one(&self.pool)
            .await?;

        row.try_into()
    }

    async fn find_customer(&self, customer_id: Uuid) -> Result<Option<Customer>, AppError> {
        let query = format!("SELECT {CUSTOMER_COLUMNS} FROM customers WHERE id = $1");
        let row = sqlx::query_as::<_, CustomerRow>(&query)
            .bind(customer_id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Customer::try_from).transpose()
    }
}
