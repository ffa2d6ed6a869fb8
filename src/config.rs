// src/config.rs

use std::{env, str::FromStr, sync::Arc, time::Duration};

use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::{
    common::i18n::I18nStore,
    db::{
        BookingRepository, BusinessRepository, CredentialRepository, CustomerRepository, NotificationRepository,
        PgBookingRepository, PgBusinessRepository, PgCredentialRepository, PgCustomerRepository,
        PgNotificationRepository,
    },
    services::{
        booking_admission::BookingAdmissionService,
        booking_lifecycle::BookingLifecycleService,
        channel_api::{build_http_client, HttpMessagingClient, HttpTokenRefresher, MessagingClient, TokenRefresher},
        conflict::ConflictDetector,
        customer_resolver::CustomerIdentityResolver,
        form_fields::FormFieldExtractor,
        notification_dispatcher::NotificationDispatcher,
        reminders::{ReminderService, DEFAULT_INTERVAL_MINUTES, DEFAULT_LOOKAHEAD_HOURS},
        token_lifecycle::{TokenLifecycleManager, DEFAULT_REFRESH_BUFFER_MINUTES},
    },
};

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
const DEFAULT_NOTIFICATION_TIMEOUT_SECS: u64 = 8;

/// Configuração lida do ambiente (`.env` em desenvolvimento).
#[derive(Debug, Clone)]
pub struct Settings {
    pub database_url: String,
    pub bind_addr: String,
    pub messaging_api_url: String,
    // Credencial da plataforma para o modo `shared`
    pub shared_access_token: Option<String>,
    pub token_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub refresh_buffer_minutes: i64,
    pub notification_timeout_secs: u64,
    pub reminder_lookahead_hours: i64,
    pub reminder_interval_minutes: u64,
}

fn optional(key: &str) -> Option<String> {
    env::var(key).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn parsed<T: FromStr>(key: &str, default: T) -> anyhow::Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional(key) {
        Some(raw) => raw.parse().with_context(|| format!("{} inválido: '{}'", key, raw)),
        None => Ok(default),
    }
}

impl Settings {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            database_url: optional("DATABASE_URL").context("DATABASE_URL deve ser definida")?,
            bind_addr: optional("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
            messaging_api_url: optional("MESSAGING_API_URL").context("MESSAGING_API_URL deve ser definida")?,
            shared_access_token: optional("SHARED_CHANNEL_ACCESS_TOKEN"),
            token_url: optional("CHANNEL_TOKEN_URL").context("CHANNEL_TOKEN_URL deve ser definida")?,
            client_id: optional("CHANNEL_CLIENT_ID").unwrap_or_default(),
            client_secret: optional("CHANNEL_CLIENT_SECRET").unwrap_or_default(),
            refresh_buffer_minutes: parsed("TOKEN_REFRESH_BUFFER_MINUTES", DEFAULT_REFRESH_BUFFER_MINUTES)?,
            notification_timeout_secs: parsed("NOTIFICATION_TIMEOUT_SECS", DEFAULT_NOTIFICATION_TIMEOUT_SECS)?,
            reminder_lookahead_hours: parsed("REMINDER_LOOKAHEAD_HOURS", DEFAULT_LOOKAHEAD_HOURS)?,
            reminder_interval_minutes: parsed("REMINDER_INTERVAL_MINUTES", DEFAULT_INTERVAL_MINUTES)?,
        })
    }

    pub fn service_options(&self) -> ServiceOptions {
        ServiceOptions {
            shared_access_token: self.shared_access_token.clone(),
            refresh_buffer: chrono::Duration::minutes(self.refresh_buffer_minutes),
            send_timeout: Duration::from_secs(self.notification_timeout_secs),
            reminder_lookahead: chrono::Duration::hours(self.reminder_lookahead_hours),
        }
    }

    pub fn reminder_interval(&self) -> Duration {
        Duration::from_secs(self.reminder_interval_minutes.max(1) * 60)
    }
}

/// Parâmetros dos serviços, separados do ambiente para facilitar os testes.
#[derive(Debug, Clone)]
pub struct ServiceOptions {
    pub shared_access_token: Option<String>,
    pub refresh_buffer: chrono::Duration,
    pub send_timeout: Duration,
    pub reminder_lookahead: chrono::Duration,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            shared_access_token: None,
            refresh_buffer: chrono::Duration::minutes(DEFAULT_REFRESH_BUFFER_MINUTES),
            send_timeout: Duration::from_secs(DEFAULT_NOTIFICATION_TIMEOUT_SECS),
            reminder_lookahead: chrono::Duration::hours(DEFAULT_LOOKAHEAD_HOURS),
        }
    }
}

#[derive(Clone)]
pub struct Repositories {
    pub businesses: Arc<dyn BusinessRepository>,
    pub customers: Arc<dyn CustomerRepository>,
    pub bookings: Arc<dyn BookingRepository>,
    pub notifications: Arc<dyn NotificationRepository>,
    pub credentials: Arc<dyn CredentialRepository>,
}

impl Repositories {
    pub fn postgres(pool: PgPool) -> Self {
        Self {
            businesses: Arc::new(PgBusinessRepository::new(pool.clone())),
            customers: Arc::new(PgCustomerRepository::new(pool.clone())),
            bookings: Arc::new(PgBookingRepository::new(pool.clone())),
            notifications: Arc::new(PgNotificationRepository::new(pool.clone())),
            credentials: Arc::new(PgCredentialRepository::new(pool)),
        }
    }
}

#[derive(Clone)]
pub struct ChannelClients {
    pub messaging: Arc<dyn MessagingClient>,
    pub refresher: Arc<dyn TokenRefresher>,
}

impl ChannelClients {
    pub fn http(settings: &Settings) -> Self {
        let client = build_http_client(Duration::from_secs(settings.notification_timeout_secs));

        Self {
            messaging: Arc::new(HttpMessagingClient::new(client.clone(), settings.messaging_api_url.clone())),
            refresher: Arc::new(HttpTokenRefresher::new(
                client,
                settings.token_url.clone(),
                settings.client_id.clone(),
                settings.client_secret.clone(),
            )),
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub i18n_store: Arc<I18nStore>,
    pub businesses: Arc<dyn BusinessRepository>,
    pub bookings: Arc<dyn BookingRepository>,
    pub notifications: Arc<dyn NotificationRepository>,
    pub token_manager: Arc<TokenLifecycleManager>,
    pub admission_service: BookingAdmissionService,
    pub lifecycle_service: BookingLifecycleService,
    pub reminder_service: ReminderService,
}

impl AppState {
    pub async fn new(settings: &Settings) -> anyhow::Result<(Self, PgPool)> {
        let db_pool = PgPoolOptions::new()
            .max_connections(10)
            .acquire_timeout(Duration::from_secs(3))
            .connect(&settings.database_url)
            .await
            .context("Falha ao conectar ao banco de dados")?;

        tracing::info!("✅ Conexão com o banco de dados estabelecida com sucesso!");

        let state = Self::assemble(
            Repositories::postgres(db_pool.clone()),
            ChannelClients::http(settings),
            settings.service_options(),
        );
        Ok((state, db_pool))
    }

    // --- Monta o gráfico de dependências ---
    pub fn assemble(repos: Repositories, clients: ChannelClients, options: ServiceOptions) -> Self {
        let token_manager = Arc::new(TokenLifecycleManager::new(
            repos.credentials.clone(),
            clients.refresher,
            options.refresh_buffer,
            options.send_timeout,
        ));

        let dispatcher = Arc::new(NotificationDispatcher::new(
            repos.businesses.clone(),
            repos.customers.clone(),
            repos.bookings.clone(),
            repos.notifications.clone(),
            token_manager.clone(),
            clients.messaging,
            options.shared_access_token,
            options.send_timeout,
        ));

        let resolver = CustomerIdentityResolver::new(repos.customers.clone(), Arc::new(FormFieldExtractor));

        let admission_service = BookingAdmissionService::new(
            repos.businesses.clone(),
            ConflictDetector::new(repos.bookings.clone()),
            resolver,
            dispatcher.clone(),
        );
        let lifecycle_service =
            BookingLifecycleService::new(repos.businesses.clone(), repos.bookings.clone(), dispatcher.clone());
        let reminder_service = ReminderService::new(
            repos.businesses.clone(),
            repos.bookings.clone(),
            dispatcher,
            options.reminder_lookahead,
        );

        Self {
            i18n_store: Arc::new(I18nStore::new()),
            businesses: repos.businesses,
            bookings: repos.bookings,
            notifications: repos.notifications,
            token_manager,
            admission_service,
            lifecycle_service,
            reminder_service,
        }
    }
}
