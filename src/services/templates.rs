// src/services/templates.rs

use chrono::{DateTime, FixedOffset};
use reqwest::Url;
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::error::AppError,
    db::BusinessRepository,
    models::{
        business::Business,
        messaging::{MessageAction, OutboundMessage},
        notification::{MessageTemplateOverride, MessageType, TemplateOverrides},
    },
};

const MAPS_SEARCH_URL: &str = "https://www.google.com/maps/search/";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageTemplate {
    pub header: String,
    pub body: String,
}

/// Rótulos por idioma. Só "pt" e "en"; o resto cai em "pt".
struct Labels {
    service: &'static str,
    staff: &'static str,
    date: &'static str,
    time: &'static str,
    duration: &'static str,
    customer: &'static str,
    minutes: &'static str,
    call: &'static str,
    directions: &'static str,
}

const LABELS_PT: Labels = Labels {
    service: "Serviço",
    staff: "Profissional",
    date: "Data",
    time: "Horário",
    duration: "Duração",
    customer: "Cliente",
    minutes: "min",
    call: "Ligar",
    directions: "Como chegar",
};

const LABELS_EN: Labels = Labels {
    service: "Service",
    staff: "Staff",
    date: "Date",
    time: "Time",
    duration: "Duration",
    customer: "Customer",
    minutes: "min",
    call: "Call",
    directions: "Directions",
};

fn labels(language: &str) -> &'static Labels {
    if language == "en" { &LABELS_EN } else { &LABELS_PT }
}

pub fn default_template(message_type: MessageType, language: &str) -> MessageTemplate {
    let (header, body) = match (message_type, language) {
        (MessageType::Confirmation, "en") => ("Booking confirmed ✅", "Your appointment is booked. See you soon!"),
        (MessageType::Confirmation, _) => ("Agendamento confirmado ✅", "Seu horário está reservado. Até breve!"),
        (MessageType::Cancellation, "en") => ("Booking cancelled", "Your appointment was cancelled. Feel free to book another time."),
        (MessageType::Cancellation, _) => ("Agendamento cancelado", "Seu horário foi cancelado. Se quiser, agende um novo horário."),
        (MessageType::Reminder, "en") => ("Appointment reminder ⏰", "Just a reminder of your upcoming appointment."),
        (MessageType::Reminder, _) => ("Lembrete de horário ⏰", "Passando para lembrar do seu próximo atendimento."),
        (MessageType::OwnerNotification, "en") => ("New booking 📅", "You have received a new booking."),
        (MessageType::OwnerNotification, _) => ("Novo agendamento 📅", "Você recebeu um novo agendamento."),
    };

    MessageTemplate { header: header.to_string(), body: body.to_string() }
}

/// Personalização do estabelecimento por cima do padrão.
pub fn resolve_template(overrides: &TemplateOverrides, message_type: MessageType, language: &str) -> MessageTemplate {
    match overrides.get(&message_type) {
        Some(custom) => MessageTemplate { header: custom.header.clone(), body: custom.body.clone() },
        None => default_template(message_type, language),
    }
}

/// Detalhes do agendamento que entram na mensagem.
#[derive(Debug, Clone)]
pub struct BookingDetails {
    pub service_name: Option<String>,
    pub staff_name: Option<String>,
    pub customer_name: Option<String>,
    pub local_start: DateTime<FixedOffset>,
    pub duration_minutes: i32,
}

pub fn compose_message(
    template: &MessageTemplate,
    details: &BookingDetails,
    business: &Business,
    language: &str,
) -> OutboundMessage {
    let l = labels(language);
    let date_format = if language == "en" { "%m/%d/%Y" } else { "%d/%m/%Y" };

    let mut lines = vec![template.header.clone(), String::new(), template.body.clone(), String::new()];

    if let Some(customer) = &details.customer_name {
        lines.push(format!("{}: {}", l.customer, customer));
    }
    if let Some(service) = &details.service_name {
        lines.push(format!("{}: {}", l.service, service));
    }
    if let Some(staff) = &details.staff_name {
        lines.push(format!("{}: {}", l.staff, staff));
    }
    lines.push(format!("{}: {}", l.date, details.local_start.format(date_format)));
    lines.push(format!("{}: {}", l.time, details.local_start.format("%H:%M")));
    lines.push(format!("{}: {} {}", l.duration, details.duration_minutes, l.minutes));

    // Contato do estabelecimento como links clicáveis
    let mut actions = Vec::new();
    if let Some(phone) = business.phone.as_deref().filter(|p| !p.trim().is_empty()) {
        lines.push(format!("📞 {}", phone));
        actions.push(MessageAction { label: l.call.to_string(), uri: phone_link(phone) });
    }
    if let Some(address) = business.address.as_deref().filter(|a| !a.trim().is_empty()) {
        lines.push(format!("📍 {}", address));
        if let Some(uri) = maps_link(address) {
            actions.push(MessageAction { label: l.directions.to_string(), uri });
        }
    }

    OutboundMessage {
        alt_text: format!("{} - {}", template.header, business.name),
        text: lines.join("\n"),
        actions,
    }
}

fn phone_link(phone: &str) -> String {
    let digits: String = phone.chars().filter(|c| c.is_ascii_digit() || *c == '+').collect();
    format!("tel:{}", digits)
}

fn maps_link(address: &str) -> Option<String> {
    Url::parse_with_params(MAPS_SEARCH_URL, &[("api", "1"), ("query", address)])
        .ok()
        .map(String::from)
}

/// Valida (cabeçalho ≤ 100, corpo ≤ 500) e grava a personalização.
pub async fn save_template_override(
    businesses: &dyn BusinessRepository,
    business_id: Uuid,
    message_type: MessageType,
    template: &MessageTemplateOverride,
) -> Result<(), AppError> {
    template.validate()?;

    let trimmed = MessageTemplateOverride {
        header: template.header.trim().to_string(),
        body: template.body.trim().to_string(),
    };
    trimmed.validate()?;

    businesses.save_message_template(business_id, message_type, &trimmed).await?;
    tracing::info!("Template '{}' atualizado para o estabelecimento {}", message_type.as_str(), business_id);
    Ok(())
}
