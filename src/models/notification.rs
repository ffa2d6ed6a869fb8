// src/models/notification.rs

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

// Motivos registrados quando a mensagem não é enviada
pub const REASON_NO_TOKEN: &str = "no_token";
pub const REASON_USER_NOT_FRIEND: &str = "user_not_friend";
pub const REASON_NOTIFICATIONS_DISABLED: &str = "notifications_disabled";
pub const REASON_ALREADY_SENT: &str = "already_sent";
pub const REASON_NO_RECIPIENT: &str = "no_recipient";
pub const REASON_TIMEOUT: &str = "timeout";

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, sqlx::Type, ToSchema,
)]
#[sqlx(type_name = "notification_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    Confirmation,
    Cancellation,
    Reminder,
    OwnerNotification,
}

impl MessageType {
    pub fn as_str(self) -> &'static str {
        match self {
            MessageType::Confirmation => "confirmation",
            MessageType::Cancellation => "cancellation",
            MessageType::Reminder => "reminder",
            MessageType::OwnerNotification => "owner_notification",
        }
    }

    pub fn targets_owner(self) -> bool {
        self == MessageType::OwnerNotification
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "delivery_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Sent,
    Skipped,
    Failed,
}

/// Resultado de um envio. `reason` explica `skipped`/`failed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DispatchOutcome {
    pub status: DeliveryStatus,
    pub reason: Option<String>,
}

impl DispatchOutcome {
    pub fn sent() -> Self {
        Self { status: DeliveryStatus::Sent, reason: None }
    }

    pub fn skipped(reason: &str) -> Self {
        Self { status: DeliveryStatus::Skipped, reason: Some(reason.to_string()) }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Self { status: DeliveryStatus::Failed, reason: Some(reason.into()) }
    }

    pub fn is_sent(&self) -> bool {
        self.status == DeliveryStatus::Sent
    }
}

// Trilha de auditoria (append-only)
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRecord {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub business_id: Uuid,
    pub message_type: MessageType,
    pub delivery_status: DeliveryStatus,
    #[schema(example = "user_not_friend")]
    pub reason: Option<String>,
    pub payload: Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewNotificationRecord {
    pub booking_id: Uuid,
    pub business_id: Uuid,
    pub message_type: MessageType,
    pub delivery_status: DeliveryStatus,
    pub reason: Option<String>,
    pub payload: Value,
}

// ---
// Vínculo entre o id de login do cliente e o id dele no bot do estabelecimento
// ---
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ChannelBotMapping {
    pub business_id: Uuid,
    pub channel_user_id: String,
    pub bot_user_id: String,
    pub created_at: DateTime<Utc>,
}

// --- Templates ---

/// Personalização de um tipo de mensagem feita pelo estabelecimento.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MessageTemplateOverride {
    #[validate(length(min = 1, max = 100, message = "header_length"))]
    #[schema(example = "Agendamento confirmado! ✂️")]
    pub header: String,

    #[validate(length(min = 1, max = 500, message = "body_length"))]
    #[schema(example = "Obrigado por agendar com a gente. Até breve!")]
    pub body: String,
}

pub type TemplateOverrides = BTreeMap<MessageType, MessageTemplateOverride>;
