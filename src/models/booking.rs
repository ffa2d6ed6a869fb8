// src/models/booking.rs

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

// --- Enums ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "booking_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
    Completed,
}

impl BookingStatus {
    /// Status inicial: `pending` só quando o estabelecimento aprova manualmente.
    pub fn initial(requires_approval: bool) -> Self {
        if requires_approval {
            BookingStatus::Pending
        } else {
            BookingStatus::Confirmed
        }
    }

    // Só reservas ativas ocupam horário
    pub fn blocks_slot(self) -> bool {
        matches!(self, BookingStatus::Pending | BookingStatus::Confirmed)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, BookingStatus::Cancelled | BookingStatus::Completed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "cancelled_by", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CancelledBy {
    Customer,
    Business,
    System,
}

// --- Agendamento ---

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: Uuid,
    pub business_id: Uuid,
    pub customer_id: Uuid,
    pub service_id: Option<Uuid>,
    pub staff_id: Option<Uuid>,
    pub date_time: DateTime<Utc>,
    #[schema(example = 30)]
    pub duration_minutes: i32,
    pub status: BookingStatus,
    pub no_show: bool,
    // Respostas do formulário customizado
    pub responses: Value,
    pub confirmation_sent: bool,
    pub reminder_sent: bool,
    pub cancellation_reason: Option<String>,
    pub cancelled_by: Option<CancelledBy>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    pub fn end_time(&self) -> DateTime<Utc> {
        self.date_time + Duration::minutes(i64::from(self.duration_minutes))
    }

    /// Aplica uma transição da máquina de estados.
    /// `cancelled` e `completed` são terminais; `noShow` é ortogonal ao status.
    pub fn apply(&mut self, action: &BookingAction, now: DateTime<Utc>) -> Result<(), TransitionError> {
        match (self.status, action) {
            (BookingStatus::Pending, BookingAction::Confirm) => {
                self.status = BookingStatus::Confirmed;
            }
            (BookingStatus::Confirmed, BookingAction::Complete) => {
                self.status = BookingStatus::Completed;
            }
            (BookingStatus::Pending | BookingStatus::Confirmed, BookingAction::Cancel { reason, cancelled_by }) => {
                self.status = BookingStatus::Cancelled;
                self.cancellation_reason = reason.clone();
                self.cancelled_by = Some(*cancelled_by);
            }
            (BookingStatus::Confirmed, BookingAction::MarkNoShow) => {
                if self.date_time > now {
                    return Err(TransitionError::NotStartedYet);
                }
                self.no_show = true;
            }
            (from, action) => {
                return Err(TransitionError::NotAllowed { from, action: action.name() });
            }
        }

        self.updated_at = now;
        Ok(())
    }
}

/// Dados para inserir um agendamento novo (antes de ter id).
#[derive(Debug, Clone)]
pub struct NewBooking {
    pub business_id: Uuid,
    pub customer_id: Uuid,
    pub service_id: Option<Uuid>,
    pub staff_id: Option<Uuid>,
    pub date_time: DateTime<Utc>,
    pub duration_minutes: i32,
    pub status: BookingStatus,
    pub responses: Value,
}

impl NewBooking {
    pub fn end_time(&self) -> DateTime<Utc> {
        self.date_time + Duration::minutes(i64::from(self.duration_minutes))
    }
}

// --- Transições ---

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum BookingAction {
    Confirm,
    Complete,
    Cancel {
        reason: Option<String>,
        #[serde(rename = "cancelledBy", default = "default_cancelled_by")]
        cancelled_by: CancelledBy,
    },
    MarkNoShow,
}

fn default_cancelled_by() -> CancelledBy {
    CancelledBy::Business
}

impl BookingAction {
    pub fn name(&self) -> &'static str {
        match self {
            BookingAction::Confirm => "confirm",
            BookingAction::Complete => "complete",
            BookingAction::Cancel { .. } => "cancel",
            BookingAction::MarkNoShow => "mark_no_show",
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("transição '{action}' não permitida a partir de {from:?}")]
    NotAllowed { from: BookingStatus, action: &'static str },

    #[error("no-show só pode ser marcado depois do início do horário")]
    NotStartedYet,

    // Outra requisição alterou o status entre a leitura e a escrita
    #[error("o agendamento não está mais em {expected:?}")]
    StatusChanged { expected: BookingStatus },
}

// --- Requisição de entrada (vinda da API) ---

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BookingDateTime {
    #[validate(length(equal = 10, message = "invalid_date"))]
    #[schema(example = "2025-03-11")]
    pub date: String,

    #[validate(length(equal = 5, message = "invalid_time"))]
    #[schema(example = "10:00")]
    pub time: String,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BookingRequest {
    pub business_id: Uuid,

    #[validate(length(min = 1, max = 128, message = "invalid_channel_id"))]
    #[schema(example = "U4af4980629")]
    pub customer_channel_id: Option<String>,

    #[validate(length(max = 120, message = "too_long"))]
    #[schema(example = "Maria Souza")]
    pub customer_display_name: Option<String>,

    #[validate(url(message = "invalid_url"))]
    pub customer_picture_url: Option<String>,

    pub service_id: Option<Uuid>,
    pub staff_id: Option<Uuid>,

    #[validate(nested)]
    pub date_time: BookingDateTime,

    #[validate(range(min = 5, max = 1440, message = "invalid_duration"))]
    #[schema(example = 30)]
    pub duration_minutes: Option<i32>,

    pub responses: Option<Value>,

    #[schema(example = "pt")]
    pub locale: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BookingOutcome {
    pub booking: Booking,
    pub message_sent: bool,
}
