// src/services/notification_dispatcher.rs

use std::{sync::Arc, time::Duration};

use serde_json::json;

use crate::{
    common::{error::AppError, i18n::I18nStore},
    db::{BookingRepository, BusinessRepository, CustomerRepository, NotificationRepository},
    models::{
        booking::Booking,
        business::{Business, MessagingMode},
        customer::Customer,
        notification::{
            DispatchOutcome, MessageType, NewNotificationRecord, REASON_ALREADY_SENT,
            REASON_NOTIFICATIONS_DISABLED, REASON_NO_RECIPIENT, REASON_NO_TOKEN, REASON_TIMEOUT,
            REASON_USER_NOT_FRIEND,
        },
    },
    services::{
        channel_api::MessagingClient,
        templates::{compose_message, resolve_template, BookingDetails},
        token_lifecycle::TokenLifecycleManager,
    },
};

/// Envia as mensagens de um agendamento e registra cada tentativa.
///
/// Nunca devolve erro: falhas viram `skipped`/`failed` na trilha de auditoria
/// e o agendamento continua válido.
#[derive(Clone)]
pub struct NotificationDispatcher {
    businesses: Arc<dyn BusinessRepository>,
    customers: Arc<dyn CustomerRepository>,
    bookings: Arc<dyn BookingRepository>,
    notifications: Arc<dyn NotificationRepository>,
    tokens: Arc<TokenLifecycleManager>,
    messaging: Arc<dyn MessagingClient>,
    shared_access_token: Option<String>,
    send_timeout: Duration,
}

// Destinatário e credencial já decididos
struct Delivery {
    recipient: String,
    access_token: String,
}

impl NotificationDispatcher {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        businesses: Arc<dyn BusinessRepository>,
        customers: Arc<dyn CustomerRepository>,
        bookings: Arc<dyn BookingRepository>,
        notifications: Arc<dyn NotificationRepository>,
        tokens: Arc<TokenLifecycleManager>,
        messaging: Arc<dyn MessagingClient>,
        shared_access_token: Option<String>,
        send_timeout: Duration,
    ) -> Self {
        Self {
            businesses,
            customers,
            bookings,
            notifications,
            tokens,
            messaging,
            shared_access_token,
            send_timeout,
        }
    }

    pub async fn dispatch(&self, booking: &Booking, business: &Business, message_type: MessageType) -> DispatchOutcome {
        let (outcome, recipient) = match self.deliver(booking, business, message_type).await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!("Erro ao preparar '{}' do agendamento {}: {}", message_type.as_str(), booking.id, e);
                (DispatchOutcome::failed(e.to_string()), None)
            }
        };

        self.audit(booking, business, message_type, &outcome, recipient).await;
        outcome
    }

    async fn deliver(
        &self,
        booking: &Booking,
        business: &Business,
        message_type: MessageType,
    ) -> Result<(DispatchOutcome, Option<String>), AppError> {
        if message_type.targets_owner() && !business.notifications_enabled {
            return Ok((DispatchOutcome::skipped(REASON_NOTIFICATIONS_DISABLED), None));
        }

        if self.notifications.was_sent(booking.id, message_type).await? {
            return Ok((DispatchOutcome::skipped(REASON_ALREADY_SENT), None));
        }

        let customer = self.customers.find_customer(booking.customer_id).await?;

        let login_id = if message_type.targets_owner() {
            self.businesses
                .find_owner(business.owner_id)
                .await?
                .and_then(|owner| owner.channel_user_id)
        } else {
            customer
                .as_ref()
                .and_then(|c| c.identity.channel_user_id())
                .map(str::to_string)
        };

        let Some(login_id) = login_id else {
            return Ok((DispatchOutcome::skipped(REASON_NO_RECIPIENT), None));
        };

        let delivery = match self.delivery_for(business, login_id).await? {
            Ok(delivery) => delivery,
            Err(reason) => return Ok((DispatchOutcome::skipped(reason), None)),
        };

        let language = if message_type.targets_owner() {
            I18nStore::DEFAULT_LANGUAGE.to_string()
        } else {
            customer
                .as_ref()
                .and_then(|c| c.language.clone())
                .unwrap_or_else(|| I18nStore::DEFAULT_LANGUAGE.to_string())
        };

        let details = self.details(booking, business, message_type, customer.as_ref()).await?;
        let template = resolve_template(&business.message_templates, message_type, &language);
        let message = compose_message(&template, &details, business, &language);

        let sent = tokio::time::timeout(
            self.send_timeout,
            self.messaging.push(&delivery.recipient, &delivery.access_token, &message),
        )
        .await;

        let outcome = match sent {
            Ok(Ok(())) => {
                self.mark_sent(booking, message_type).await;
                DispatchOutcome::sent()
            }
            Ok(Err(e)) => {
                tracing::warn!("Envio de '{}' falhou para o agendamento {}: {}", message_type.as_str(), booking.id, e);
                DispatchOutcome::failed(e.to_string())
            }
            Err(_) => {
                tracing::warn!("Envio de '{}' excedeu o tempo limite (agendamento {})", message_type.as_str(), booking.id);
                DispatchOutcome::failed(REASON_TIMEOUT)
            }
        };

        Ok((outcome, Some(delivery.recipient)))
    }

    /// Escolhe credencial e destinatário conforme o modo de mensagens.
    /// O `Err` interno carrega o motivo do `skipped`.
    async fn delivery_for(
        &self,
        business: &Business,
        login_id: String,
    ) -> Result<Result<Delivery, &'static str>, AppError> {
        match business.messaging_mode {
            MessagingMode::Shared => Ok(match &self.shared_access_token {
                Some(token) => Ok(Delivery { recipient: login_id, access_token: token.clone() }),
                None => Err(REASON_NO_TOKEN),
            }),
            MessagingMode::OwnChannel => {
                let Some(credential) = self.tokens.get_valid_credential(business).await else {
                    return Ok(Err(REASON_NO_TOKEN));
                };

                // O bot próprio só conhece o usuário depois que ele adiciona o bot
                let mapping = self.notifications.find_bot_mapping(business.id, &login_id).await?;
                Ok(match mapping {
                    Some(mapping) => Ok(Delivery {
                        recipient: mapping.bot_user_id,
                        access_token: credential.access_token,
                    }),
                    None => Err(REASON_USER_NOT_FRIEND),
                })
            }
        }
    }

    async fn details(
        &self,
        booking: &Booking,
        business: &Business,
        message_type: MessageType,
        customer: Option<&Customer>,
    ) -> Result<BookingDetails, AppError> {
        let service_name = match booking.service_id {
            Some(id) => self.businesses.find_service(business.id, id).await?.map(|s| s.name),
            None => None,
        };
        let staff_name = match booking.staff_id {
            Some(id) => self.businesses.find_staff(business.id, id).await?.map(|s| s.name),
            None => None,
        };
        let customer_name = if message_type.targets_owner() {
            customer.and_then(|c| c.display_name.clone())
        } else {
            None
        };

        Ok(BookingDetails {
            service_name,
            staff_name,
            customer_name,
            local_start: business.to_local(booking.date_time),
            duration_minutes: booking.duration_minutes,
        })
    }

    async fn mark_sent(&self, booking: &Booking, message_type: MessageType) {
        let marked = match message_type {
            MessageType::Confirmation => self.bookings.mark_confirmation_sent(booking.id).await,
            MessageType::Reminder => self.bookings.mark_reminder_sent(booking.id).await,
            MessageType::Cancellation | MessageType::OwnerNotification => Ok(()),
        };

        if let Err(e) = marked {
            tracing::error!("Falha ao marcar envio de '{}' no agendamento {}: {}", message_type.as_str(), booking.id, e);
        }
    }

    async fn audit(
        &self,
        booking: &Booking,
        business: &Business,
        message_type: MessageType,
        outcome: &DispatchOutcome,
        recipient: Option<String>,
    ) {
        let record = NewNotificationRecord {
            booking_id: booking.id,
            business_id: business.id,
            message_type,
            delivery_status: outcome.status,
            reason: outcome.reason.clone(),
            payload: json!({
                "mode": business.messaging_mode,
                "recipient": recipient,
            }),
        };

        match self.notifications.record(&record).await {
            Ok(_) => tracing::info!(
                "📨 '{}' do agendamento {}: {:?}",
                message_type.as_str(),
                booking.id,
                outcome.status
            ),
            Err(e) => tracing::error!("Falha ao registrar notificação do agendamento {}: {}", booking.id, e),
        }
    }
}
