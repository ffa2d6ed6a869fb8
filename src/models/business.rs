// src/models/business.rs

use chrono::{DateTime, FixedOffset, Offset, Utc, Weekday};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::notification::TemplateOverrides;

// --- Enums ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "messaging_mode", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MessagingMode {
    // Canal compartilhado da plataforma
    Shared,
    // Canal próprio do estabelecimento (credencial por tenant)
    OwnChannel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "subscription_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    Trialing,
    PastDue,
    Cancelled,
}

// --- Horários ---

/// Janela de um dia, em horário local ("HH:MM").
/// Um `close` de "00:00" significa fim do dia.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DayHours {
    pub open: String,
    pub close: String,
    #[serde(default)]
    pub closed: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeeklySchedule {
    pub monday: Option<DayHours>,
    pub tuesday: Option<DayHours>,
    pub wednesday: Option<DayHours>,
    pub thursday: Option<DayHours>,
    pub friday: Option<DayHours>,
    pub saturday: Option<DayHours>,
    pub sunday: Option<DayHours>,
}

impl WeeklySchedule {
    pub fn day(&self, weekday: Weekday) -> Option<&DayHours> {
        match weekday {
            Weekday::Mon => self.monday.as_ref(),
            Weekday::Tue => self.tuesday.as_ref(),
            Weekday::Wed => self.wednesday.as_ref(),
            Weekday::Thu => self.thursday.as_ref(),
            Weekday::Fri => self.friday.as_ref(),
            Weekday::Sat => self.saturday.as_ref(),
            Weekday::Sun => self.sunday.as_ref(),
        }
    }
}

// Espelha o JSONB { "mode": "24/7" | "same-daily" | "custom-per-weekday", ... }
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode")]
pub enum BusinessHours {
    #[serde(rename = "24/7")]
    AlwaysOpen,
    #[serde(rename = "same-daily")]
    SameDaily { open: String, close: String },
    #[serde(rename = "custom-per-weekday")]
    CustomPerWeekday { days: WeeklySchedule },
}

/// Período de fechamento (férias, feriados). Intervalo fechado nos dois lados.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClosedDateRange {
    pub start_date_time: DateTime<Utc>,
    pub end_date_time: DateTime<Utc>,
    pub reason: Option<String>,
}

impl ClosedDateRange {
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start_date_time <= instant && instant <= self.end_date_time
    }
}

// --- Formulário customizado (definido pelo construtor de formulários) ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormFieldType {
    Text,
    Email,
    Phone,
    Name,
    Textarea,
    Select,
    Date,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormField {
    pub key: String,
    pub label: String,
    pub field_type: FormFieldType,
}

// ---
// 1. Business (O "Estabelecimento")
// ---
#[derive(Debug, Clone, FromRow)]
pub struct Business {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub is_active: bool,
    pub business_hours: Json<BusinessHours>,
    pub closed_date_ranges: Json<Vec<ClosedDateRange>>,
    // Quando true, ignora o horário de funcionamento
    pub appointment_only: bool,
    pub default_duration_minutes: i32,
    pub requires_approval: bool,
    // Relógio local do estabelecimento
    pub utc_offset_minutes: i32,
    pub messaging_mode: MessagingMode,
    pub channel_access_token: Option<String>,
    pub channel_refresh_token: Option<String>,
    pub channel_token_expires_at: Option<DateTime<Utc>>,
    pub notifications_enabled: bool,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub form_fields: Json<Vec<FormField>>,
    pub message_templates: Json<TemplateOverrides>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Business {
    pub fn local_offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_minutes * 60).unwrap_or_else(|| Utc.fix())
    }

    pub fn to_local(&self, instant: DateTime<Utc>) -> DateTime<FixedOffset> {
        instant.with_timezone(&self.local_offset())
    }
}

// ---
// 2. Owner (O dono da conta)
// ---
#[derive(Debug, Clone, FromRow)]
pub struct Owner {
    pub id: Uuid,
    pub email: String,
    pub channel_user_id: Option<String>,
    pub subscription_status: SubscriptionStatus,
    pub trial_ends_at: Option<DateTime<Utc>>,
    pub subscription_ends_at: Option<DateTime<Utc>>,
}

impl Owner {
    /// Assinatura ativa (ou trial ainda válido) no instante `now`.
    pub fn is_entitled(&self, now: DateTime<Utc>) -> bool {
        match self.subscription_status {
            SubscriptionStatus::Active => self.subscription_ends_at.is_none_or(|ends| ends > now),
            SubscriptionStatus::Trialing => self.trial_ends_at.is_some_and(|ends| ends > now),
            SubscriptionStatus::PastDue | SubscriptionStatus::Cancelled => false,
        }
    }
}

// ---
// 3. Staff (O profissional)
// ---
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum StaffAvailability {
    // Usa o horário do estabelecimento
    Inherit,
    Custom { days: WeeklySchedule },
}

#[derive(Debug, Clone, FromRow)]
pub struct Staff {
    pub id: Uuid,
    pub business_id: Uuid,
    pub name: String,
    pub availability: Json<StaffAvailability>,
    pub is_active: bool,
}

// ---
// 4. Service (O serviço oferecido)
// ---
#[derive(Debug, Clone, FromRow)]
pub struct Service {
    pub id: Uuid,
    pub business_id: Uuid,
    pub name: String,
    pub duration_minutes: i32,
    pub price: Decimal,
    pub is_active: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn owner(status: SubscriptionStatus) -> Owner {
        Owner {
            id: Uuid::new_v4(),
            email: "dono@acme.com".into(),
            channel_user_id: None,
            subscription_status: status,
            trial_ends_at: None,
            subscription_ends_at: None,
        }
    }

    #[test]
    fn trial_is_entitled_only_until_it_ends() {
        let now = Utc.with_ymd_and_hms(2025, 3, 10, 12, 0, 0).unwrap();
        let mut o = owner(SubscriptionStatus::Trialing);
        assert!(!o.is_entitled(now));

        o.trial_ends_at = Some(now + Duration::days(1));
        assert!(o.is_entitled(now));

        o.trial_ends_at = Some(now - Duration::seconds(1));
        assert!(!o.is_entitled(now));
    }

    #[test]
    fn past_due_and_cancelled_are_not_entitled() {
        let now = Utc::now();
        assert!(owner(SubscriptionStatus::Active).is_entitled(now));
        assert!(!owner(SubscriptionStatus::PastDue).is_entitled(now));
        assert!(!owner(SubscriptionStatus::Cancelled).is_entitled(now));
    }

    #[test]
    fn business_hours_json_uses_mode_tag() {
        let hours: BusinessHours =
            serde_json::from_str(r#"{"mode":"same-daily","open":"09:00","close":"18:00"}"#).unwrap();
        assert_eq!(
            hours,
            BusinessHours::SameDaily { open: "09:00".into(), close: "18:00".into() }
        );

        let always: BusinessHours = serde_json::from_str(r#"{"mode":"24/7"}"#).unwrap();
        assert_eq!(always, BusinessHours::AlwaysOpen);
    }
}
