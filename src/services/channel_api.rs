// src/services/channel_api.rs

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, ClientBuilder};
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;

use crate::models::messaging::{OutboundMessage, RefreshedToken};

// Limite do texto de botões na API de mensagens
const BUTTON_TEXT_LIMIT: usize = 160;

#[derive(Debug, Error)]
pub enum MessagingError {
    #[error("falha de transporte: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("API de mensagens recusou o envio ({status}): {body}")]
    Rejected { status: u16, body: String },
}

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("falha de transporte no refresh: {0}")]
    Transport(#[from] reqwest::Error),

    // Refresh token inválido ou revogado
    #[error("endpoint de token recusou o refresh ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("refresh excedeu o tempo limite")]
    Timeout,
}

impl CredentialError {
    /// Recusa definitiva do refresh token (400/401, ex.: `invalid_grant`).
    /// Falhas de rede, timeout e 5xx são transitórias.
    pub fn is_revoked(&self) -> bool {
        matches!(self, CredentialError::Rejected { status: 400 | 401, .. })
    }
}

/// Envio de mensagem estruturada para um destinatário, com uma credencial bearer.
#[async_trait]
pub trait MessagingClient: Send + Sync {
    async fn push(
        &self,
        recipient_id: &str,
        access_token: &str,
        message: &OutboundMessage,
    ) -> Result<(), MessagingError>;
}

/// Troca de refresh token por um par novo (estilo OAuth).
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    async fn refresh(&self, refresh_token: &str) -> Result<RefreshedToken, CredentialError>;
}

pub fn build_http_client(timeout: Duration) -> Client {
    ClientBuilder::new()
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(5))
        .build()
        .unwrap_or_else(|_| Client::new())
}

// =============================================================================
//  ENVIO
// =============================================================================

#[derive(Clone)]
pub struct HttpMessagingClient {
    client: Client,
    base_url: String,
}

impl HttpMessagingClient {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self { client, base_url: base_url.into() }
    }

    fn payload(recipient_id: &str, message: &OutboundMessage) -> Value {
        let mut messages = vec![json!({ "type": "text", "text": message.text })];

        if !message.actions.is_empty() {
            let button_text: String = message.alt_text.chars().take(BUTTON_TEXT_LIMIT).collect();
            let actions: Vec<Value> = message
                .actions
                .iter()
                .map(|a| json!({ "type": "uri", "label": a.label, "uri": a.uri }))
                .collect();

            messages.push(json!({
                "type": "template",
                "altText": message.alt_text,
                "template": { "type": "buttons", "text": button_text, "actions": actions },
            }));
        }

        json!({ "to": recipient_id, "messages": messages })
    }
}

#[async_trait]
impl MessagingClient for HttpMessagingClient {
    async fn push(
        &self,
        recipient_id: &str,
        access_token: &str,
        message: &OutboundMessage,
    ) -> Result<(), MessagingError> {
        let url = format!("{}/message/push", self.base_url.trim_end_matches('/'));

        let response = self
            .client
            .post(url)
            .bearer_auth(access_token)
            .json(&Self::payload(recipient_id, message))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(MessagingError::Rejected { status, body });
        }

        Ok(())
    }
}

// =============================================================================
//  REFRESH DE TOKEN
// =============================================================================

#[derive(Debug, Deserialize)]
struct TokenRefreshResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
}

#[derive(Clone)]
pub struct HttpTokenRefresher {
    client: Client,
    token_url: String,
    client_id: String,
    client_secret: String,
}

impl HttpTokenRefresher {
    pub fn new(client: Client, token_url: String, client_id: String, client_secret: String) -> Self {
        Self { client, token_url, client_id, client_secret }
    }
}

#[async_trait]
impl TokenRefresher for HttpTokenRefresher {
    async fn refresh(&self, refresh_token: &str) -> Result<RefreshedToken, CredentialError> {
        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
        ];

        let response = self.client.post(&self.token_url).form(&params).send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(CredentialError::Rejected { status, body });
        }

        let token: TokenRefreshResponse = response.json().await?;

        Ok(RefreshedToken {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            expires_at: token.expires_in.map(|secs| Utc::now() + chrono::Duration::seconds(secs)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::messaging::MessageAction;

    #[test]
    fn payload_adds_button_template_only_with_actions() {
        let mut message = OutboundMessage {
            alt_text: "Agendamento confirmado".into(),
            text: "Olá!".into(),
            actions: vec![],
        };

        let plain = HttpMessagingClient::payload("U1", &message);
        assert_eq!(plain["to"], "U1");
        assert_eq!(plain["messages"].as_array().map(Vec::len), Some(1));

        message.actions.push(MessageAction { label: "Ligar".into(), uri: "tel:+5511999998888".into() });
        let with_buttons = HttpMessagingClient::payload("U1", &message);
        assert_eq!(with_buttons["messages"][1]["template"]["actions"][0]["uri"], "tel:+5511999998888");
    }
}
