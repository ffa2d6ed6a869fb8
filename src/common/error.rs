use std::collections::HashMap;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use thiserror::Error;

use crate::{
    common::i18n::I18nStore,
    middleware::i18n::Locale,
    models::booking::TransitionError,
};

// Nosso tipo de erro, agora com `thiserror` para melhor ergonomia.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Erro de validação")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("Data ou horário inválido: {0}")]
    InvalidDateTime(String),

    #[error("Horário no passado")]
    BookingInPast,

    #[error("Duração inválida")]
    InvalidDuration,

    #[error("Estabelecimento não encontrado")]
    BusinessNotFound,

    #[error("Profissional não encontrado")]
    StaffNotFound,

    #[error("Serviço não encontrado")]
    ServiceNotFound,

    #[error("Agendamento não encontrado")]
    BookingNotFound,

    // Assinatura/trial do dono expirou
    #[error("Assinatura inativa")]
    SubscriptionInactive,

    // `reason` é o código de máquina (outside_business_hours, slot_already_booked, ...)
    #[error("Horário indisponível: {reason}")]
    SlotUnavailable { reason: &'static str },

    #[error("Transição de status inválida: {0}")]
    InvalidStatusTransition(#[from] TransitionError),

    // Variante para erros de banco de dados (exemplo com sqlx)
    #[error("Erro de banco de dados: {0}")]
    DatabaseError(#[from] sqlx::Error),

    // Variante genérica para qualquer outro erro inesperado
    #[error("Erro interno do servidor: {0}")]
    InternalServerError(#[from] anyhow::Error),
}

impl AppError {
    /// Código estável, usado pelo frontend e como chave de tradução.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::ValidationError(_) => "validation_error",
            AppError::InvalidDateTime(_) => "invalid_date_time",
            AppError::BookingInPast => "booking_in_past",
            AppError::InvalidDuration => "invalid_duration",
            AppError::BusinessNotFound => "business_not_found",
            AppError::StaffNotFound => "staff_not_found",
            AppError::ServiceNotFound => "service_not_found",
            AppError::BookingNotFound => "booking_not_found",
            AppError::SubscriptionInactive => "subscription_inactive",
            AppError::SlotUnavailable { reason } => *reason,
            AppError::InvalidStatusTransition(_) => "invalid_status_transition",
            AppError::DatabaseError(_) | AppError::InternalServerError(_) => "internal_error",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_)
            | AppError::InvalidDateTime(_)
            | AppError::BookingInPast
            | AppError::InvalidDuration => StatusCode::BAD_REQUEST,
            AppError::BusinessNotFound
            | AppError::StaffNotFound
            | AppError::ServiceNotFound
            | AppError::BookingNotFound => StatusCode::NOT_FOUND,
            // Status próprio para a UI pedir ação de cobrança
            AppError::SubscriptionInactive => StatusCode::PAYMENT_REQUIRED,
            AppError::SlotUnavailable { .. } | AppError::InvalidStatusTransition(_) => StatusCode::CONFLICT,
            AppError::DatabaseError(_) | AppError::InternalServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Converte para a resposta HTTP com a mensagem traduzida para o idioma do usuário.
    pub fn to_api_error(self, locale: &Locale, i18n_store: &I18nStore) -> ApiError {
        let status = self.status();
        let code = self.code();

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("Erro Interno do Servidor: {}", self);
        }

        let details = match &self {
            AppError::ValidationError(errors) => {
                let mut details: HashMap<String, Vec<String>> = HashMap::new();
                for (field, field_errors) in errors.field_errors() {
                    let codes = field_errors
                        .iter()
                        .map(|e| e.message.as_ref().map_or_else(|| e.code.to_string(), |m| m.to_string()))
                        .collect();
                    details.insert(field.to_string(), codes);
                }
                Some(json!(details))
            }
            _ => None,
        };

        ApiError {
            status,
            code: code.to_string(),
            error: i18n_store.translate(&locale.0, code),
            details,
        }
    }
}

/// Erro já pronto para o cliente HTTP.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: String,
    pub error: String,
    pub details: Option<Value>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut body = json!({
            "error": self.error,
            "code": self.code,
        });
        if let Some(details) = self.details {
            body["details"] = details;
        }
        (self.status, Json(body)).into_response()
    }
}

// Usado onde não temos o idioma do usuário (idioma padrão do catálogo)
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let locale = Locale(I18nStore::DEFAULT_LANGUAGE.to_string());
        self.to_api_error(&locale, &I18nStore::new()).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_unavailable_exposes_reason_as_code() {
        let err = AppError::SlotUnavailable { reason: "outside_business_hours" };
        assert_eq!(err.code(), "outside_business_hours");
        assert_eq!(err.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn localized_message_is_distinct_from_code() {
        let store = I18nStore::new();
        let api = AppError::SubscriptionInactive.to_api_error(&Locale("en".into()), &store);

        assert_eq!(api.status, StatusCode::PAYMENT_REQUIRED);
        assert_eq!(api.code, "subscription_inactive");
        assert_ne!(api.error, api.code);
    }
}
