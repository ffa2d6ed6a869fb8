// src/services/customer_resolver.rs

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::{
    common::error::AppError,
    db::CustomerRepository,
    models::{
        booking::BookingRequest,
        business::Business,
        customer::{Customer, CustomerProfile},
    },
    services::form_fields::FieldExtractor,
};

/// Encontra ou cria o cliente de um agendamento.
/// Nunca recusa por falta de identidade: só decide como deduplicar.
#[derive(Clone)]
pub struct CustomerIdentityResolver {
    customers: Arc<dyn CustomerRepository>,
    extractor: Arc<dyn FieldExtractor>,
}

impl CustomerIdentityResolver {
    pub fn new(customers: Arc<dyn CustomerRepository>, extractor: Arc<dyn FieldExtractor>) -> Self {
        Self { customers, extractor }
    }

    pub async fn resolve(
        &self,
        business: &Business,
        request: &BookingRequest,
        language: &str,
        now: DateTime<Utc>,
    ) -> Result<Customer, AppError> {
        // 1. Usuário do canal de mensagens
        if let Some(channel_user_id) = request.customer_channel_id.as_deref() {
            let profile = CustomerProfile {
                display_name: clean(request.customer_display_name.as_deref()),
                picture_url: clean(request.customer_picture_url.as_deref()),
                language: Some(language.to_string()),
                ..CustomerProfile::default()
            };

            return self.customers.upsert_channel_customer(channel_user_id, &profile, now).await;
        }

        // 2. Formulário web: contato vem das respostas
        let responses = request.responses.clone().unwrap_or(Value::Null);
        let contact = self.extractor.extract(&business.form_fields, &responses);

        let display_name = contact
            .name
            .clone()
            .or_else(|| clean(request.customer_display_name.as_deref()));

        if let Some(email) = contact.email.as_deref() {
            let profile = CustomerProfile {
                // Sem nome informado, usa a parte local do e-mail
                display_name: display_name.or_else(|| email_local_part(email)),
                phone: contact.phone.clone(),
                email: Some(email.to_string()),
                language: Some(language.to_string()),
                ..CustomerProfile::default()
            };

            return self.customers.upsert_web_customer(email, &profile, now).await;
        }

        // 3. Anônimo: sempre uma linha nova, o agendamento segue normalmente
        tracing::debug!("Agendamento sem identidade para o estabelecimento {}", business.id);
        let profile = CustomerProfile {
            display_name,
            phone: contact.phone,
            language: Some(language.to_string()),
            ..CustomerProfile::default()
        };
        self.customers.create_anonymous_customer(&profile, now).await
    }
}

fn clean(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|v| !v.is_empty()).map(str::to_string)
}

fn email_local_part(email: &str) -> Option<String> {
    email
        .split_once('@')
        .map(|(local, _)| local)
        .filter(|local| !local.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_part_fallback() {
        assert_eq!(email_local_part("joana.silva@example.com").as_deref(), Some("joana.silva"));
        assert_eq!(email_local_part("@example.com"), None);
    }
}
