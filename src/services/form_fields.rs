// src/services/form_fields.rs

use serde_json::Value;
use validator::ValidateEmail;

use crate::models::business::{FormField, FormFieldType};

/// Dados de contato encontrados nas respostas do formulário.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContactFields {
    pub email: Option<String>,
    pub phone: Option<String>,
    pub name: Option<String>,
}

// O construtor de formulários define os campos; aqui só lemos as respostas.
pub trait FieldExtractor: Send + Sync {
    fn extract(&self, fields: &[FormField], responses: &Value) -> ContactFields;
}

/// Extrai pelo tipo do campo; sem definições, tenta as chaves convencionais.
#[derive(Debug, Clone, Default)]
pub struct FormFieldExtractor;

fn text_answer(responses: &Value, key: &str) -> Option<String> {
    responses
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn first_answer(
    fields: &[FormField],
    responses: &Value,
    field_type: FormFieldType,
    fallback_keys: &[&str],
) -> Option<String> {
    fields
        .iter()
        .filter(|f| f.field_type == field_type)
        .find_map(|f| text_answer(responses, &f.key))
        .or_else(|| fallback_keys.iter().find_map(|key| text_answer(responses, key)))
}

impl FieldExtractor for FormFieldExtractor {
    fn extract(&self, fields: &[FormField], responses: &Value) -> ContactFields {
        // E-mail inválido é ignorado (o cliente vira anônimo em vez de falhar)
        let email = first_answer(fields, responses, FormFieldType::Email, &["email", "e-mail"])
            .map(|e| e.to_lowercase())
            .filter(|e| e.validate_email());

        ContactFields {
            email,
            phone: first_answer(fields, responses, FormFieldType::Phone, &["phone", "telefone"]),
            name: first_answer(fields, responses, FormFieldType::Name, &["name", "nome"]),
        }
    }
}
