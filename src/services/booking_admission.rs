// src/services/booking_admission.rs

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use validator::Validate;

use crate::{
    common::error::AppError,
    db::BusinessRepository,
    middleware::i18n::Locale,
    models::{
        booking::{BookingDateTime, BookingOutcome, BookingRequest, BookingStatus, NewBooking},
        business::{Business, Service, Staff},
        notification::MessageType,
    },
    services::{
        availability,
        conflict::ConflictDetector,
        customer_resolver::CustomerIdentityResolver,
        notification_dispatcher::NotificationDispatcher,
    },
};

const SLOT_ALREADY_BOOKED: &str = "slot_already_booked";

/// Orquestra a entrada de um agendamento, da validação ao envio da confirmação.
#[derive(Clone)]
pub struct BookingAdmissionService {
    businesses: Arc<dyn BusinessRepository>,
    conflicts: ConflictDetector,
    resolver: CustomerIdentityResolver,
    dispatcher: Arc<NotificationDispatcher>,
}

impl BookingAdmissionService {
    pub fn new(
        businesses: Arc<dyn BusinessRepository>,
        conflicts: ConflictDetector,
        resolver: CustomerIdentityResolver,
        dispatcher: Arc<NotificationDispatcher>,
    ) -> Self {
        Self { businesses, conflicts, resolver, dispatcher }
    }

    pub async fn admit(
        &self,
        request: BookingRequest,
        locale: &Locale,
        now: DateTime<Utc>,
    ) -> Result<BookingOutcome, AppError> {
        request.validate()?;

        let business = self
            .businesses
            .find_business(request.business_id)
            .await?
            .filter(|b| b.is_active)
            .ok_or(AppError::BusinessNotFound)?;

        // Dono sem assinatura ativa não recebe agendamentos
        let entitled = self
            .businesses
            .find_owner(business.owner_id)
            .await?
            .is_some_and(|owner| owner.is_entitled(now));
        if !entitled {
            return Err(AppError::SubscriptionInactive);
        }

        let staff = self.load_staff(&business, &request).await?;
        let service = self.load_service(&business, &request).await?;

        let duration_minutes = request
            .duration_minutes
            .or_else(|| service.as_ref().map(|s| s.duration_minutes))
            .unwrap_or(business.default_duration_minutes);
        if duration_minutes <= 0 {
            return Err(AppError::InvalidDuration);
        }

        let start = local_to_utc(&business, &request.date_time)?;
        if start < now {
            return Err(AppError::BookingInPast);
        }

        let availability = availability::validate(&business, staff.as_ref(), start, duration_minutes);
        if !availability.bookable {
            tracing::info!(
                "Horário recusado para o estabelecimento {}: {}",
                business.id,
                availability.reason.code()
            );
            return Err(AppError::SlotUnavailable { reason: availability.reason.code() });
        }

        let staff_id = staff.as_ref().map(|s| s.id);
        if self.conflicts.has_conflict(staff_id, start, duration_minutes).await? {
            return Err(AppError::SlotUnavailable { reason: SLOT_ALREADY_BOOKED });
        }

        let language = locale.clone().with_override(request.locale.as_deref());
        let customer = self.resolver.resolve(&business, &request, &language.0, now).await?;

        let new_booking = NewBooking {
            business_id: business.id,
            customer_id: customer.id,
            service_id: service.as_ref().map(|s| s.id),
            staff_id,
            date_time: start,
            duration_minutes,
            status: BookingStatus::initial(business.requires_approval),
            responses: request.responses.clone().unwrap_or_else(|| serde_json::json!({})),
        };

        // Pode perder a corrida para outra requisição entre a pré-checagem e aqui
        let booking = self
            .conflicts
            .try_reserve(&new_booking)
            .await?
            .ok_or(AppError::SlotUnavailable { reason: SLOT_ALREADY_BOOKED })?;

        tracing::info!("📅 Agendamento {} criado para o estabelecimento {}", booking.id, business.id);

        let message_sent = if booking.status == BookingStatus::Confirmed {
            self.dispatcher
                .dispatch(&booking, &business, MessageType::Confirmation)
                .await
                .is_sent()
        } else {
            false
        };

        self.dispatcher
            .dispatch(&booking, &business, MessageType::OwnerNotification)
            .await;

        Ok(BookingOutcome { booking, message_sent })
    }

    async fn load_staff(&self, business: &Business, request: &BookingRequest) -> Result<Option<Staff>, AppError> {
        let Some(staff_id) = request.staff_id else {
            return Ok(None);
        };

        self.businesses
            .find_staff(business.id, staff_id)
            .await?
            .filter(|s| s.is_active)
            .map(Some)
            .ok_or(AppError::StaffNotFound)
    }

    async fn load_service(&self, business: &Business, request: &BookingRequest) -> Result<Option<Service>, AppError> {
        let Some(service_id) = request.service_id else {
            return Ok(None);
        };

        self.businesses
            .find_service(business.id, service_id)
            .await?
            .filter(|s| s.is_active)
            .map(Some)
            .ok_or(AppError::ServiceNotFound)
    }
}

/// Converte data + hora no relógio do estabelecimento para UTC.
pub fn local_to_utc(business: &Business, date_time: &BookingDateTime) -> Result<DateTime<Utc>, AppError> {
    let date = NaiveDate::parse_from_str(&date_time.date, "%Y-%m-%d")
        .map_err(|_| AppError::InvalidDateTime(date_time.date.clone()))?;
    let time = NaiveTime::parse_from_str(&date_time.time, "%H:%M")
        .map_err(|_| AppError::InvalidDateTime(date_time.time.clone()))?;

    business
        .local_offset()
        .from_local_datetime(&date.and_time(time))
        .single()
        .map(|local| local.with_timezone(&Utc))
        .ok_or_else(|| AppError::InvalidDateTime(format!("{} {}", date_time.date, date_time.time)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::sample_business;

    fn at(date: &str, time: &str) -> BookingDateTime {
        BookingDateTime { date: date.into(), time: time.into() }
    }

    #[test]
    fn local_time_uses_business_offset() {
        let mut business = sample_business();
        business.utc_offset_minutes = -180;

        let start = local_to_utc(&business, &at("2025-03-11", "10:00")).unwrap();
        assert_eq!(start, Utc.with_ymd_and_hms(2025, 3, 11, 13, 0, 0).unwrap());
    }

    #[test]
    fn malformed_date_is_rejected() {
        let business = sample_business();

        assert!(matches!(
            local_to_utc(&business, &at("2025-02-30", "10:00")),
            Err(AppError::InvalidDateTime(_))
        ));
        assert!(matches!(
            local_to_utc(&business, &at("2025-03-11", "25:00")),
            Err(AppError::InvalidDateTime(_))
        ));
    }
}
