// src/models/customer.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "customer_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CustomerType {
    Channel,
    Web,
    Anonymous,
}

/// Como o cliente é identificado. Cada variante tem a sua chave de deduplicação.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CustomerIdentity {
    // Usuário do app de mensagens (chave: id do canal)
    Channel {
        #[serde(rename = "channelUserId")]
        channel_user_id: String,
    },
    // Formulário web (chave: e-mail)
    Web { email: String },
    // Sem chave estável: sempre uma linha nova
    Anonymous,
}

impl CustomerIdentity {
    pub fn customer_type(&self) -> CustomerType {
        match self {
            CustomerIdentity::Channel { .. } => CustomerType::Channel,
            CustomerIdentity::Web { .. } => CustomerType::Web,
            CustomerIdentity::Anonymous => CustomerType::Anonymous,
        }
    }

    pub fn channel_user_id(&self) -> Option<&str> {
        match self {
            CustomerIdentity::Channel { channel_user_id } => Some(channel_user_id),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: Uuid,
    pub identity: CustomerIdentity,
    #[schema(example = "Maria Souza")]
    pub display_name: Option<String>,
    pub picture_url: Option<String>,
    #[schema(example = "(11) 99999-8888")]
    pub phone: Option<String>,
    pub email: Option<String>,
    #[schema(example = "pt")]
    pub language: Option<String>,
    pub last_active_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// Campos atualizados a cada novo agendamento da mesma identidade
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CustomerProfile {
    pub display_name: Option<String>,
    pub picture_url: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub language: Option<String>,
}
