// src/test_utils.rs
//
// Implementações em memória dos repositórios e clientes falsos do canal,
// usadas pelos testes unitários e de integração.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::types::Json;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    config::{AppState, ChannelClients, Repositories, ServiceOptions},
    db::{BookingRepository, BusinessRepository, CredentialRepository, CustomerRepository, NotificationRepository},
    models::{
        booking::{Booking, BookingStatus, NewBooking, TransitionError},
        business::{Business, BusinessHours, MessagingMode, Owner, Service, Staff, StaffAvailability, SubscriptionStatus},
        customer::{Customer, CustomerIdentity, CustomerProfile},
        messaging::{ChannelCredential, OutboundMessage, RefreshedToken},
        notification::{
            ChannelBotMapping, DeliveryStatus, MessageTemplateOverride, MessageType, NewNotificationRecord,
            NotificationRecord, TemplateOverrides,
        },
    },
    services::{
        channel_api::{CredentialError, MessagingClient, MessagingError, TokenRefresher},
        conflict::overlaps,
    },
};

// =============================================================================
//  FIXTURES
// =============================================================================

/// Estabelecimento aberto das 09:00 às 18:00 (UTC), modo compartilhado.
pub fn sample_business() -> Business {
    let now = Utc::now();
    Business {
        id: Uuid::new_v4(),
        owner_id: Uuid::new_v4(),
        name: "Acme Salon".into(),
        is_active: true,
        business_hours: Json(BusinessHours::SameDaily { open: "09:00".into(), close: "18:00".into() }),
        closed_date_ranges: Json(Vec::new()),
        appointment_only: false,
        default_duration_minutes: 30,
        requires_approval: false,
        utc_offset_minutes: 0,
        messaging_mode: MessagingMode::Shared,
        channel_access_token: None,
        channel_refresh_token: None,
        channel_token_expires_at: None,
        notifications_enabled: true,
        phone: Some("(11) 3333-4444".into()),
        address: Some("Rua das Flores, 123".into()),
        form_fields: Json(Vec::new()),
        message_templates: Json(TemplateOverrides::new()),
        created_at: now,
        updated_at: now,
    }
}

pub fn sample_owner(owner_id: Uuid) -> Owner {
    Owner {
        id: owner_id,
        email: "dono@acme.com".into(),
        channel_user_id: Some("U-owner".into()),
        subscription_status: SubscriptionStatus::Active,
        trial_ends_at: None,
        subscription_ends_at: None,
    }
}

pub fn sample_staff(business_id: Uuid) -> Staff {
    Staff {
        id: Uuid::new_v4(),
        business_id,
        name: "João".into(),
        availability: Json(StaffAvailability::Inherit),
        is_active: true,
    }
}

pub fn sample_service(business_id: Uuid) -> Service {
    Service {
        id: Uuid::new_v4(),
        business_id,
        name: "Corte".into(),
        duration_minutes: 45,
        price: Decimal::new(5000, 2),
        is_active: true,
    }
}

// =============================================================================
//  REPOSITÓRIO EM MEMÓRIA
// =============================================================================

#[derive(Default)]
struct Tables {
    businesses: HashMap<Uuid, Business>,
    owners: HashMap<Uuid, Owner>,
    staff: HashMap<Uuid, Staff>,
    services: HashMap<Uuid, Service>,
    customers: Vec<Customer>,
    bookings: Vec<Booking>,
    bot_mappings: Vec<ChannelBotMapping>,
    notifications: Vec<NotificationRecord>,
}

/// Um único lock para todas as tabelas: cada operação é atômica.
#[derive(Default)]
pub struct InMemoryStore {
    tables: Mutex<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_business(&self, business: Business) {
        self.tables.lock().await.businesses.insert(business.id, business);
    }

    pub async fn insert_owner(&self, owner: Owner) {
        self.tables.lock().await.owners.insert(owner.id, owner);
    }

    pub async fn insert_staff(&self, staff: Staff) {
        self.tables.lock().await.staff.insert(staff.id, staff);
    }

    pub async fn insert_service(&self, service: Service) {
        self.tables.lock().await.services.insert(service.id, service);
    }

    pub async fn insert_booking(&self, booking: Booking) {
        self.tables.lock().await.bookings.push(booking);
    }

    pub async fn insert_bot_mapping(&self, business_id: Uuid, channel_user_id: &str, bot_user_id: &str) {
        self.tables.lock().await.bot_mappings.push(ChannelBotMapping {
            business_id,
            channel_user_id: channel_user_id.to_string(),
            bot_user_id: bot_user_id.to_string(),
            created_at: Utc::now(),
        });
    }

    pub async fn business(&self, business_id: Uuid) -> Option<Business> {
        self.tables.lock().await.businesses.get(&business_id).cloned()
    }

    pub async fn bookings(&self) -> Vec<Booking> {
        self.tables.lock().await.bookings.clone()
    }

    pub async fn customers(&self) -> Vec<Customer> {
        self.tables.lock().await.customers.clone()
    }

    pub async fn notifications(&self) -> Vec<NotificationRecord> {
        self.tables.lock().await.notifications.clone()
    }
}

fn booking_from(new: &NewBooking) -> Booking {
    let now = Utc::now();
    Booking {
        id: Uuid::new_v4(),
        business_id: new.business_id,
        customer_id: new.customer_id,
        service_id: new.service_id,
        staff_id: new.staff_id,
        date_time: new.date_time,
        duration_minutes: new.duration_minutes,
        status: new.status,
        no_show: false,
        responses: new.responses.clone(),
        confirmation_sent: false,
        reminder_sent: false,
        cancellation_reason: None,
        cancelled_by: None,
        created_at: now,
        updated_at: now,
    }
}

fn staff_is_busy(bookings: &[Booking], staff_id: Uuid, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
    bookings.iter().any(|b| {
        b.staff_id == Some(staff_id) && b.status.blocks_slot() && overlaps(b.date_time, b.end_time(), start, end)
    })
}

// Campos ausentes no perfil mantêm o valor atual (igual ao COALESCE do SQL)
fn merge_profile(customer: &mut Customer, profile: &CustomerProfile, now: DateTime<Utc>) {
    if profile.display_name.is_some() {
        customer.display_name = profile.display_name.clone();
    }
    if profile.picture_url.is_some() {
        customer.picture_url = profile.picture_url.clone();
    }
    if profile.phone.is_some() {
        customer.phone = profile.phone.clone();
    }
    if profile.language.is_some() {
        customer.language = profile.language.clone();
    }
    customer.last_active_at = now;
    customer.updated_at = now;
}

fn new_customer(identity: CustomerIdentity, profile: &CustomerProfile, now: DateTime<Utc>) -> Customer {
    Customer {
        id: Uuid::new_v4(),
        identity,
        display_name: profile.display_name.clone(),
        picture_url: profile.picture_url.clone(),
        phone: profile.phone.clone(),
        email: profile.email.clone(),
        language: profile.language.clone(),
        last_active_at: now,
        created_at: now,
        updated_at: now,
    }
}

#[async_trait]
impl BusinessRepository for InMemoryStore {
    async fn find_business(&self, business_id: Uuid) -> Result<Option<Business>, AppError> {
        Ok(self.tables.lock().await.businesses.get(&business_id).cloned())
    }

    async fn find_owner(&self, owner_id: Uuid) -> Result<Option<Owner>, AppError> {
        Ok(self.tables.lock().await.owners.get(&owner_id).cloned())
    }

    async fn find_staff(&self, business_id: Uuid, staff_id: Uuid) -> Result<Option<Staff>, AppError> {
        let tables = self.tables.lock().await;
        Ok(tables.staff.get(&staff_id).filter(|s| s.business_id == business_id).cloned())
    }

    async fn find_service(&self, business_id: Uuid, service_id: Uuid) -> Result<Option<Service>, AppError> {
        let tables = self.tables.lock().await;
        Ok(tables.services.get(&service_id).filter(|s| s.business_id == business_id).cloned())
    }

    async fn save_message_template(
        &self,
        business_id: Uuid,
        message_type: MessageType,
        template: &MessageTemplateOverride,
    ) -> Result<(), AppError> {
        let mut tables = self.tables.lock().await;
        let business = tables.businesses.get_mut(&business_id).ok_or(AppError::BusinessNotFound)?;
        business.message_templates.insert(message_type, template.clone());
        Ok(())
    }
}

#[async_trait]
impl CustomerRepository for InMemoryStore {
    async fn upsert_channel_customer(
        &self,
        channel_user_id: &str,
        profile: &CustomerProfile,
        now: DateTime<Utc>,
    ) -> Result<Customer, AppError> {
        let mut tables = self.tables.lock().await;

        if let Some(existing) = tables
            .customers
            .iter_mut()
            .find(|c| c.identity.channel_user_id() == Some(channel_user_id))
        {
            merge_profile(existing, profile, now);
            return Ok(existing.clone());
        }

        let identity = CustomerIdentity::Channel { channel_user_id: channel_user_id.to_string() };
        let profile = CustomerProfile { email: None, ..profile.clone() };
        let customer = new_customer(identity, &profile, now);
        tables.customers.push(customer.clone());
        Ok(customer)
    }

    async fn upsert_web_customer(
        &self,
        email: &str,
        profile: &CustomerProfile,
        now: DateTime<Utc>,
    ) -> Result<Customer, AppError> {
        let mut tables = self.tables.lock().await;

        if let Some(existing) = tables.customers.iter_mut().find(|c| c.email.as_deref() == Some(email)) {
            // A foto só vem do canal de mensagens
            let profile = CustomerProfile { picture_url: None, ..profile.clone() };
            merge_profile(existing, &profile, now);
            return Ok(existing.clone());
        }

        let identity = CustomerIdentity::Web { email: email.to_string() };
        let profile = CustomerProfile { email: Some(email.to_string()), ..profile.clone() };
        let customer = new_customer(identity, &profile, now);
        tables.customers.push(customer.clone());
        Ok(customer)
    }

    async fn create_anonymous_customer(
        &self,
        profile: &CustomerProfile,
        now: DateTime<Utc>,
    ) -> Result<Customer, AppError> {
        let profile = CustomerProfile { email: None, picture_url: None, ..profile.clone() };
        let customer = new_customer(CustomerIdentity::Anonymous, &profile, now);
        self.tables.lock().await.customers.push(customer.clone());
        Ok(customer)
    }

    async fn find_customer(&self, customer_id: Uuid) -> Result<Option<Customer>, AppError> {
        let tables = self.tables.lock().await;
        Ok(tables.customers.iter().find(|c| c.id == customer_id).cloned())
    }
}

#[async_trait]
impl BookingRepository for InMemoryStore {
    async fn has_conflict(&self, staff_id: Uuid, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<bool, AppError> {
        Ok(staff_is_busy(&self.tables.lock().await.bookings, staff_id, start, end))
    }

    async fn try_reserve(&self, booking: &NewBooking) -> Result<Option<Booking>, AppError> {
        // Checagem e inserção sob o mesmo lock
        let mut tables = self.tables.lock().await;

        if let Some(staff_id) = booking.staff_id {
            if staff_is_busy(&tables.bookings, staff_id, booking.date_time, booking.end_time()) {
                return Ok(None);
            }
        }

        let created = booking_from(booking);
        tables.bookings.push(created.clone());
        Ok(Some(created))
    }

    async fn find_booking(&self, business_id: Uuid, booking_id: Uuid) -> Result<Option<Booking>, AppError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .bookings
            .iter()
            .find(|b| b.id == booking_id && b.business_id == business_id)
            .cloned())
    }

    async fn update_status(&self, booking: &Booking, expected: BookingStatus) -> Result<Booking, AppError> {
        let mut tables = self.tables.lock().await;
        let stored = tables
            .bookings
            .iter_mut()
            .find(|b| b.id == booking.id && b.status == expected)
            .ok_or(AppError::InvalidStatusTransition(TransitionError::StatusChanged { expected }))?;

        stored.status = booking.status;
        stored.no_show = booking.no_show;
        stored.cancellation_reason = booking.cancellation_reason.clone();
        stored.cancelled_by = booking.cancelled_by;
        stored.updated_at = booking.updated_at;
        Ok(stored.clone())
    }

    async fn mark_confirmation_sent(&self, booking_id: Uuid) -> Result<(), AppError> {
        let mut tables = self.tables.lock().await;
        if let Some(b) = tables.bookings.iter_mut().find(|b| b.id == booking_id) {
            b.confirmation_sent = true;
        }
        Ok(())
    }

    async fn mark_reminder_sent(&self, booking_id: Uuid) -> Result<(), AppError> {
        let mut tables = self.tables.lock().await;
        if let Some(b) = tables.bookings.iter_mut().find(|b| b.id == booking_id) {
            b.reminder_sent = true;
        }
        Ok(())
    }

    async fn list_due_reminders(&self, from: DateTime<Utc>, until: DateTime<Utc>) -> Result<Vec<Booking>, AppError> {
        let tables = self.tables.lock().await;
        let mut due: Vec<Booking> = tables
            .bookings
            .iter()
            .filter(|b| b.status == BookingStatus::Confirmed && !b.reminder_sent)
            .filter(|b| from <= b.date_time && b.date_time < until)
            .cloned()
            .collect();
        due.sort_by_key(|b| b.date_time);
        Ok(due)
    }
}

#[async_trait]
impl NotificationRepository for InMemoryStore {
    async fn find_bot_mapping(
        &self,
        business_id: Uuid,
        channel_user_id: &str,
    ) -> Result<Option<ChannelBotMapping>, AppError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .bot_mappings
            .iter()
            .find(|m| m.business_id == business_id && m.channel_user_id == channel_user_id)
            .cloned())
    }

    async fn record(&self, record: &NewNotificationRecord) -> Result<NotificationRecord, AppError> {
        let saved = NotificationRecord {
            id: Uuid::new_v4(),
            booking_id: record.booking_id,
            business_id: record.business_id,
            message_type: record.message_type,
            delivery_status: record.delivery_status,
            reason: record.reason.clone(),
            payload: record.payload.clone(),
            created_at: Utc::now(),
        };
        self.tables.lock().await.notifications.push(saved.clone());
        Ok(saved)
    }

    async fn was_sent(&self, booking_id: Uuid, message_type: MessageType) -> Result<bool, AppError> {
        let tables = self.tables.lock().await;
        Ok(tables.notifications.iter().any(|n| {
            n.booking_id == booking_id && n.message_type == message_type && n.delivery_status == DeliveryStatus::Sent
        }))
    }

    async fn list_for_booking(&self, booking_id: Uuid) -> Result<Vec<NotificationRecord>, AppError> {
        let tables = self.tables.lock().await;
        Ok(tables.notifications.iter().filter(|n| n.booking_id == booking_id).cloned().collect())
    }
}

#[async_trait]
impl CredentialRepository for InMemoryStore {
    async fn load_credential(&self, business_id: Uuid) -> Result<Option<ChannelCredential>, AppError> {
        let tables = self.tables.lock().await;
        Ok(tables.businesses.get(&business_id).and_then(|b| {
            b.channel_access_token.clone().map(|access_token| ChannelCredential {
                access_token,
                refresh_token: b.channel_refresh_token.clone(),
                expires_at: b.channel_token_expires_at,
            })
        }))
    }

    async fn store_credential(&self, business_id: Uuid, token: &RefreshedToken) -> Result<(), AppError> {
        let mut tables = self.tables.lock().await;
        if let Some(b) = tables.businesses.get_mut(&business_id) {
            b.channel_access_token = Some(token.access_token.clone());
            if token.refresh_token.is_some() {
                b.channel_refresh_token = token.refresh_token.clone();
            }
            b.channel_token_expires_at = token.expires_at;
        }
        Ok(())
    }

    async fn clear_credential(&self, business_id: Uuid) -> Result<(), AppError> {
        let mut tables = self.tables.lock().await;
        if let Some(b) = tables.businesses.get_mut(&business_id) {
            b.channel_access_token = None;
            b.channel_refresh_token = None;
            b.channel_token_expires_at = None;
        }
        Ok(())
    }
}

// =============================================================================
//  CLIENTES FALSOS DO CANAL
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub recipient_id: String,
    pub access_token: String,
    pub message: OutboundMessage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PushBehavior {
    #[default]
    Accept,
    Reject,
    // Demora mais que qualquer timeout razoável de teste
    Hang,
}

#[derive(Default)]
pub struct FakeMessagingClient {
    sent: Mutex<Vec<SentMessage>>,
    behavior: Mutex<PushBehavior>,
}

impl FakeMessagingClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_behavior(&self, behavior: PushBehavior) {
        *self.behavior.lock().await = behavior;
    }

    pub async fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl MessagingClient for FakeMessagingClient {
    async fn push(&self, recipient_id: &str, access_token: &str, message: &OutboundMessage) -> Result<(), MessagingError> {
        let behavior = *self.behavior.lock().await;
        match behavior {
            PushBehavior::Accept => {
                self.sent.lock().await.push(SentMessage {
                    recipient_id: recipient_id.to_string(),
                    access_token: access_token.to_string(),
                    message: message.clone(),
                });
                Ok(())
            }
            PushBehavior::Reject => Err(MessagingError::Rejected { status: 400, body: "invalid recipient".into() }),
            PushBehavior::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(())
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshFailure {
    /// 400 `invalid_grant`: refresh token revogado
    Revoked,
    /// 503 do endpoint de token
    Unavailable,
    Timeout,
}

pub struct FakeTokenRefresher {
    calls: AtomicUsize,
    delay: Duration,
    failure: Option<RefreshFailure>,
    valid_for: chrono::Duration,
}

impl Default for FakeTokenRefresher {
    fn default() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            delay: Duration::ZERO,
            failure: None,
            valid_for: chrono::Duration::days(30),
        }
    }
}

impl FakeTokenRefresher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self::failing_with(RefreshFailure::Revoked)
    }

    pub fn failing_with(failure: RefreshFailure) -> Self {
        Self { failure: Some(failure), ..Self::default() }
    }

    // Alarga a janela de corrida nos testes de concorrência
    pub fn with_delay(delay: Duration) -> Self {
        Self { delay, ..Self::default() }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenRefresher for FakeTokenRefresher {
    async fn refresh(&self, _refresh_token: &str) -> Result<RefreshedToken, CredentialError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match self.failure {
            Some(RefreshFailure::Revoked) => {
                return Err(CredentialError::Rejected { status: 400, body: "invalid_grant".into() });
            }
            Some(RefreshFailure::Unavailable) => {
                return Err(CredentialError::Rejected { status: 503, body: "service unavailable".into() });
            }
            Some(RefreshFailure::Timeout) => return Err(CredentialError::Timeout),
            None => {}
        }

        Ok(RefreshedToken {
            access_token: format!("renewed-{}", call),
            refresh_token: Some(format!("refresh-{}", call)),
            expires_at: Some(Utc::now() + self.valid_for),
        })
    }
}

// =============================================================================
//  HARNESS
// =============================================================================

/// Estado da aplicação montado sobre o repositório em memória.
pub struct TestApp {
    pub store: Arc<InMemoryStore>,
    pub messaging: Arc<FakeMessagingClient>,
    pub refresher: Arc<FakeTokenRefresher>,
    pub state: AppState,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with(FakeTokenRefresher::new(), Self::default_options())
    }

    pub fn default_options() -> ServiceOptions {
        ServiceOptions {
            shared_access_token: Some("shared-token".into()),
            send_timeout: Duration::from_millis(200),
            ..ServiceOptions::default()
        }
    }

    pub fn with(refresher: FakeTokenRefresher, options: ServiceOptions) -> Self {
        let store = Arc::new(InMemoryStore::new());
        let messaging = Arc::new(FakeMessagingClient::new());
        let refresher = Arc::new(refresher);

        let repos = Repositories {
            businesses: store.clone(),
            customers: store.clone(),
            bookings: store.clone(),
            notifications: store.clone(),
            credentials: store.clone(),
        };
        let clients = ChannelClients { messaging: messaging.clone(), refresher: refresher.clone() };

        let state = AppState::assemble(repos, clients, options);
        Self { store, messaging, refresher, state }
    }

    /// Cadastra estabelecimento + dono com assinatura ativa.
    pub async fn seed_business(&self, business: Business) -> Business {
        self.store.insert_owner(sample_owner(business.owner_id)).await;
        self.store.insert_business(business.clone()).await;
        business
    }
}

impl Default for TestApp {
    fn default() -> Self {
        Self::new()
    }
}
