// src/services/token_lifecycle.rs

use std::{sync::Arc, time::Duration as StdDuration};

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::{
    db::CredentialRepository,
    models::{
        business::Business,
        messaging::{ChannelCredential, ConnectionStatus, RefreshedToken},
    },
    services::channel_api::{CredentialError, TokenRefresher},
};

pub const DEFAULT_REFRESH_BUFFER_MINUTES: i64 = 60;
const EXPIRING_SOON_DAYS: i64 = 7;

/// Mantém válida a credencial do canal próprio de cada estabelecimento.
///
/// O refresh + persistência é serializado por tenant: duas requisições
/// simultâneas nunca fazem refresh em paralelo para o mesmo estabelecimento.
#[derive(Clone)]
pub struct TokenLifecycleManager {
    credentials: Arc<dyn CredentialRepository>,
    refresher: Arc<dyn TokenRefresher>,
    refresh_buffer: Duration,
    refresh_timeout: StdDuration,
    tenant_locks: Arc<DashMap<Uuid, Arc<Mutex<()>>>>,
}

impl TokenLifecycleManager {
    pub fn new(
        credentials: Arc<dyn CredentialRepository>,
        refresher: Arc<dyn TokenRefresher>,
        refresh_buffer: Duration,
        refresh_timeout: StdDuration,
    ) -> Self {
        Self {
            credentials,
            refresher,
            refresh_buffer,
            refresh_timeout,
            tenant_locks: Arc::new(DashMap::new()),
        }
    }

    fn is_fresh(&self, credential: &ChannelCredential, now: DateTime<Utc>) -> bool {
        // Sem validade informada = token sem expiração
        credential
            .expires_at
            .is_none_or(|expires_at| expires_at - now > self.refresh_buffer)
    }

    fn tenant_lock(&self, business_id: Uuid) -> Arc<Mutex<()>> {
        self.tenant_locks
            .entry(business_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Devolve uma credencial utilizável ou `None` (o chamador decide o fallback).
    /// Erros de credencial são tratados aqui e nunca sobem para o agendamento.
    pub async fn get_valid_credential(&self, business: &Business) -> Option<ChannelCredential> {
        let credential = self.load(business.id).await?;

        let now = Utc::now();
        if self.is_fresh(&credential, now) {
            return Some(credential);
        }

        // Sem refresh token não há I/O: vale até expirar
        if credential.refresh_token.is_none() {
            return credential.expires_at.is_some_and(|expires_at| expires_at > now).then_some(credential);
        }

        let lock = self.tenant_lock(business.id);
        let _guard = lock.lock().await;

        // Relê dentro do lock: outra requisição pode ter acabado de renovar
        let credential = self.load(business.id).await?;
        if self.is_fresh(&credential, Utc::now()) {
            return Some(credential);
        }
        let refresh_token = credential.refresh_token.clone()?;

        match self.refresh(&refresh_token).await {
            Ok(token) => {
                if let Err(e) = self.credentials.store_credential(business.id, &token).await {
                    tracing::error!("Falha ao salvar token renovado do estabelecimento {}: {}", business.id, e);
                }
                tracing::info!("🔑 Token do canal renovado para o estabelecimento {}", business.id);

                let mut renewed = ChannelCredential::from(token);
                // O provedor pode não devolver um refresh token novo
                renewed.refresh_token = renewed.refresh_token.or(Some(refresh_token));
                Some(renewed)
            }
            Err(e) if e.is_revoked() => {
                tracing::warn!(
                    "Refresh token recusado para o estabelecimento {}: {}. Limpando credencial.",
                    business.id,
                    e
                );
                if let Err(e) = self.credentials.clear_credential(business.id).await {
                    tracing::error!("Falha ao limpar credencial do estabelecimento {}: {}", business.id, e);
                }
                None
            }
            Err(e) => {
                // Falha transitória: mantém o que está salvo e usa o token atual enquanto não expirar
                tracing::warn!("Refresh do token falhou para o estabelecimento {}: {}", business.id, e);
                credential
                    .expires_at
                    .is_some_and(|expires_at| expires_at > Utc::now())
                    .then_some(credential)
            }
        }
    }

    async fn load(&self, business_id: Uuid) -> Option<ChannelCredential> {
        match self.credentials.load_credential(business_id).await {
            Ok(credential) => credential,
            Err(e) => {
                tracing::error!("Falha ao carregar credencial do estabelecimento {}: {}", business_id, e);
                None
            }
        }
    }

    async fn refresh(&self, refresh_token: &str) -> Result<RefreshedToken, CredentialError> {
        tokio::time::timeout(self.refresh_timeout, self.refresher.refresh(refresh_token))
            .await
            .map_err(|_| CredentialError::Timeout)?
    }

    pub async fn connection_status(&self, business: &Business, now: DateTime<Utc>) -> ConnectionStatus {
        connection_status(self.load(business.id).await.as_ref(), now)
    }
}

/// Status para exibição no painel (somente leitura).
pub fn connection_status(credential: Option<&ChannelCredential>, now: DateTime<Utc>) -> ConnectionStatus {
    let Some(credential) = credential else {
        return ConnectionStatus::Disconnected;
    };

    match credential.expires_at {
        None => ConnectionStatus::Active,
        Some(expires_at) if expires_at <= now => ConnectionStatus::Expired,
        Some(expires_at) if expires_at - now <= Duration::days(EXPIRING_SOON_DAYS) => ConnectionStatus::ExpiringSoon,
        Some(_) => ConnectionStatus::Active,
    }
}
