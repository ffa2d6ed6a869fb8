// src/common/i18n.rs

use std::collections::HashMap;

// Catálogo: (código, português, inglês)
const MESSAGES: &[(&str, &str, &str)] = &[
    ("validation_error", "Um ou mais campos são inválidos.", "One or more fields are invalid."),
    ("invalid_date_time", "Data ou horário em formato inválido.", "Date or time has an invalid format."),
    ("booking_in_past", "Não é possível agendar um horário que já passou.", "You cannot book a time in the past."),
    ("invalid_duration", "A duração do atendimento é inválida.", "The appointment duration is invalid."),
    ("business_not_found", "Estabelecimento não encontrado ou inativo.", "Business not found or inactive."),
    ("staff_not_found", "Profissional não encontrado.", "Staff member not found."),
    ("service_not_found", "Serviço não encontrado.", "Service not found."),
    ("booking_not_found", "Agendamento não encontrado.", "Booking not found."),
    (
        "subscription_inactive",
        "Este estabelecimento não está aceitando agendamentos no momento.",
        "This business is not accepting bookings right now.",
    ),
    (
        "outside_business_hours",
        "Este horário está fora do horário de funcionamento.",
        "This time is outside business hours.",
    ),
    (
        "business_closed_this_date",
        "O estabelecimento está fechado nesta data.",
        "The business is closed on this date.",
    ),
    (
        "staff_unavailable",
        "O profissional não atende neste horário.",
        "The staff member is not available at this time.",
    ),
    (
        "slot_already_booked",
        "Este horário acabou de ser reservado. Escolha outro.",
        "This slot has just been booked. Please choose another.",
    ),
    (
        "invalid_status_transition",
        "Esta alteração de status não é permitida.",
        "This status change is not allowed.",
    ),
    ("internal_error", "Ocorreu um erro inesperado.", "An unexpected error occurred."),
];

/// Mensagens traduzidas para o usuário final, indexadas por idioma e código.
#[derive(Debug, Clone)]
pub struct I18nStore {
    catalog: HashMap<&'static str, HashMap<&'static str, &'static str>>,
}

impl I18nStore {
    pub const DEFAULT_LANGUAGE: &'static str = "pt";

    pub fn new() -> Self {
        let mut pt = HashMap::new();
        let mut en = HashMap::new();
        for (code, pt_msg, en_msg) in MESSAGES {
            pt.insert(*code, *pt_msg);
            en.insert(*code, *en_msg);
        }

        let mut catalog = HashMap::new();
        catalog.insert("pt", pt);
        catalog.insert("en", en);
        Self { catalog }
    }

    pub fn supports(&self, language: &str) -> bool {
        self.catalog.contains_key(language)
    }

    /// Traduz `code`. Idioma desconhecido cai no padrão; código desconhecido volta como está.
    pub fn translate(&self, language: &str, code: &str) -> String {
        let lang = if self.supports(language) { language } else { Self::DEFAULT_LANGUAGE };

        self.catalog
            .get(lang)
            .and_then(|messages| messages.get(code))
            .or_else(|| {
                self.catalog
                    .get(Self::DEFAULT_LANGUAGE)
                    .and_then(|messages| messages.get(code))
            })
            .map(|msg| msg.to_string())
            .unwrap_or_else(|| code.to_string())
    }
}

impl Default for I18nStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn falls_back_to_portuguese() {
        let store = I18nStore::new();
        assert_eq!(
            store.translate("fr", "staff_not_found"),
            store.translate("pt", "staff_not_found")
        );
        assert_eq!(store.translate("en", "staff_not_found"), "Staff member not found.");
    }

    #[test]
    fn unknown_code_is_returned_verbatim() {
        assert_eq!(I18nStore::new().translate("pt", "mystery"), "mystery");
    }
}
