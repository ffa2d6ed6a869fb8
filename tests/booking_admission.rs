// tests/booking_admission.rs

use chrono::{Duration, NaiveDate, Utc};
use serde_json::json;

use booking_backend::{
    common::error::AppError,
    middleware::i18n::Locale,
    models::{
        booking::{BookingDateTime, BookingRequest, BookingStatus},
        business::{Business, BusinessHours, ClosedDateRange, SubscriptionStatus},
        notification::{DeliveryStatus, MessageType},
    },
    test_utils::{sample_business, sample_owner, sample_service, sample_staff, TestApp},
};
use sqlx::types::Json;

fn tomorrow() -> NaiveDate {
    (Utc::now() + Duration::days(1)).date_naive()
}

fn request(business: &Business, date: NaiveDate, time: &str) -> BookingRequest {
    BookingRequest {
        business_id: business.id,
        customer_channel_id: Some("U-maria".into()),
        customer_display_name: Some("Maria Souza".into()),
        customer_picture_url: None,
        service_id: None,
        staff_id: None,
        date_time: BookingDateTime { date: date.format("%Y-%m-%d").to_string(), time: time.into() },
        duration_minutes: Some(30),
        responses: None,
        locale: None,
    }
}

#[tokio::test]
async fn acme_salon_books_and_confirms() -> anyhow::Result<()> {
    let app = TestApp::new();
    let business = app.seed_business(sample_business()).await;

    let outcome = app
        .state
        .admission_service
        .admit(request(&business, tomorrow(), "10:00"), &Locale::default(), Utc::now())
        .await?;

    assert_eq!(outcome.booking.status, BookingStatus::Confirmed);
    assert!(outcome.message_sent);
    assert_eq!(outcome.booking.duration_minutes, 30);

    let records = app.store.notifications().await;
    let confirmation = records
        .iter()
        .find(|r| r.message_type == MessageType::Confirmation)
        .expect("confirmação registrada");
    assert_eq!(confirmation.delivery_status, DeliveryStatus::Sent);
    assert_eq!(confirmation.booking_id, outcome.booking.id);

    let sent = app.messaging.sent().await;
    assert!(sent.iter().any(|m| m.recipient_id == "U-maria" && m.access_token == "shared-token"));
    // O dono também é avisado
    assert!(sent.iter().any(|m| m.recipient_id == "U-owner"));

    let stored = app.store.bookings().await;
    assert!(stored[0].confirmation_sent);
    Ok(())
}

#[tokio::test]
async fn outside_business_hours_creates_nothing() -> anyhow::Result<()> {
    let app = TestApp::new();
    let business = app.seed_business(sample_business()).await;

    let err = app
        .state
        .admission_service
        .admit(request(&business, tomorrow(), "19:00"), &Locale::default(), Utc::now())
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::SlotUnavailable { reason: "outside_business_hours" }));
    assert!(app.store.bookings().await.is_empty());
    assert!(app.messaging.sent().await.is_empty());
    Ok(())
}

#[tokio::test]
async fn closed_date_range_rejects() -> anyhow::Result<()> {
    let app = TestApp::new();
    let mut business = sample_business();
    let day = tomorrow();
    let start = day.and_hms_opt(0, 0, 0).unwrap().and_utc();
    business.closed_date_ranges = Json(vec![ClosedDateRange {
        start_date_time: start,
        end_date_time: start + Duration::hours(23),
        reason: Some("Feriado".into()),
    }]);
    let business = app.seed_business(business).await;

    let err = app
        .state
        .admission_service
        .admit(request(&business, day, "10:00"), &Locale::default(), Utc::now())
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::SlotUnavailable { reason: "business_closed_this_date" }));
    Ok(())
}

#[tokio::test]
async fn lookups_fail_with_typed_errors() -> anyhow::Result<()> {
    let app = TestApp::new();
    let business = app.seed_business(sample_business()).await;
    let now = Utc::now();

    let mut unknown_business = request(&business, tomorrow(), "10:00");
    unknown_business.business_id = uuid::Uuid::new_v4();
    assert!(matches!(
        app.state.admission_service.admit(unknown_business, &Locale::default(), now).await,
        Err(AppError::BusinessNotFound)
    ));

    let mut unknown_staff = request(&business, tomorrow(), "10:00");
    unknown_staff.staff_id = Some(uuid::Uuid::new_v4());
    assert!(matches!(
        app.state.admission_service.admit(unknown_staff, &Locale::default(), now).await,
        Err(AppError::StaffNotFound)
    ));

    let mut unknown_service = request(&business, tomorrow(), "10:00");
    unknown_service.service_id = Some(uuid::Uuid::new_v4());
    assert!(matches!(
        app.state.admission_service.admit(unknown_service, &Locale::default(), now).await,
        Err(AppError::ServiceNotFound)
    ));

    assert!(app.store.bookings().await.is_empty());
    Ok(())
}

#[tokio::test]
async fn inactive_subscription_blocks_booking() -> anyhow::Result<()> {
    let app = TestApp::new();
    let business = sample_business();
    let mut owner = sample_owner(business.owner_id);
    owner.subscription_status = SubscriptionStatus::Trialing;
    owner.trial_ends_at = Some(Utc::now() - Duration::days(1));
    app.store.insert_owner(owner).await;
    app.store.insert_business(business.clone()).await;

    let err = app
        .state
        .admission_service
        .admit(request(&business, tomorrow(), "10:00"), &Locale::default(), Utc::now())
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::SubscriptionInactive));
    assert!(app.store.bookings().await.is_empty());
    Ok(())
}

#[tokio::test]
async fn past_start_is_rejected() -> anyhow::Result<()> {
    let app = TestApp::new();
    let mut business = sample_business();
    business.business_hours = Json(BusinessHours::AlwaysOpen);
    let business = app.seed_business(business).await;

    let yesterday = (Utc::now() - Duration::days(1)).date_naive();
    let err = app
        .state
        .admission_service
        .admit(request(&business, yesterday, "10:00"), &Locale::default(), Utc::now())
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::BookingInPast));
    Ok(())
}

#[tokio::test]
async fn duration_falls_back_to_service_then_business() -> anyhow::Result<()> {
    let app = TestApp::new();
    let business = app.seed_business(sample_business()).await;
    let service = sample_service(business.id);
    app.store.insert_service(service.clone()).await;

    let mut with_service = request(&business, tomorrow(), "10:00");
    with_service.duration_minutes = None;
    with_service.service_id = Some(service.id);
    let outcome = app.state.admission_service.admit(with_service, &Locale::default(), Utc::now()).await?;
    assert_eq!(outcome.booking.duration_minutes, service.duration_minutes);

    let mut bare = request(&business, tomorrow(), "14:00");
    bare.duration_minutes = None;
    let outcome = app.state.admission_service.admit(bare, &Locale::default(), Utc::now()).await?;
    assert_eq!(outcome.booking.duration_minutes, business.default_duration_minutes);
    Ok(())
}

#[tokio::test]
async fn overlapping_request_for_same_staff_is_refused() -> anyhow::Result<()> {
    let app = TestApp::new();
    let business = app.seed_business(sample_business()).await;
    let staff = sample_staff(business.id);
    app.store.insert_staff(staff.clone()).await;

    let mut first = request(&business, tomorrow(), "10:00");
    first.staff_id = Some(staff.id);
    first.duration_minutes = Some(60);
    app.state.admission_service.admit(first, &Locale::default(), Utc::now()).await?;

    // Começa antes e invade o agendamento existente
    let mut second = request(&business, tomorrow(), "09:30");
    second.staff_id = Some(staff.id);
    second.customer_channel_id = Some("U-bia".into());
    second.duration_minutes = Some(60);
    let err = app
        .state
        .admission_service
        .admit(second, &Locale::default(), Utc::now())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::SlotUnavailable { reason: "slot_already_booked" }));

    // Encostado no fim não conflita
    let mut adjacent = request(&business, tomorrow(), "11:00");
    adjacent.staff_id = Some(staff.id);
    app.state.admission_service.admit(adjacent, &Locale::default(), Utc::now()).await?;

    assert_eq!(app.store.bookings().await.len(), 2);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_requests_reserve_the_slot_once() -> anyhow::Result<()> {
    let app = TestApp::new();
    let business = app.seed_business(sample_business()).await;
    let staff = sample_staff(business.id);
    app.store.insert_staff(staff.clone()).await;

    let mut handles = Vec::new();
    for i in 0..8 {
        let service = app.state.admission_service.clone();
        let mut req = request(&business, tomorrow(), "15:00");
        req.staff_id = Some(staff.id);
        req.customer_channel_id = Some(format!("U-{}", i));
        handles.push(tokio::spawn(async move { service.admit(req, &Locale::default(), Utc::now()).await }));
    }

    let mut created = 0;
    for handle in handles {
        match handle.await? {
            Ok(_) => created += 1,
            Err(AppError::SlotUnavailable { reason }) => assert_eq!(reason, "slot_already_booked"),
            Err(other) => anyhow::bail!("erro inesperado: {other}"),
        }
    }

    assert_eq!(created, 1);
    assert_eq!(app.store.bookings().await.len(), 1);
    Ok(())
}

#[tokio::test]
async fn cancelled_booking_frees_the_slot() -> anyhow::Result<()> {
    let app = TestApp::new();
    let business = app.seed_business(sample_business()).await;
    let staff = sample_staff(business.id);
    app.store.insert_staff(staff.clone()).await;

    let mut first = request(&business, tomorrow(), "10:00");
    first.staff_id = Some(staff.id);
    let outcome = app.state.admission_service.admit(first, &Locale::default(), Utc::now()).await?;

    app.state
        .lifecycle_service
        .transition(
            business.id,
            outcome.booking.id,
            booking_backend::models::booking::BookingAction::Cancel {
                reason: Some("Imprevisto".into()),
                cancelled_by: booking_backend::models::booking::CancelledBy::Customer,
            },
            Utc::now(),
        )
        .await?;

    let mut again = request(&business, tomorrow(), "10:00");
    again.staff_id = Some(staff.id);
    again.customer_channel_id = Some("U-bia".into());
    let outcome = app.state.admission_service.admit(again, &Locale::default(), Utc::now()).await?;
    assert_eq!(outcome.booking.status, BookingStatus::Confirmed);
    Ok(())
}

#[tokio::test]
async fn approval_required_starts_pending_without_confirmation() -> anyhow::Result<()> {
    let app = TestApp::new();
    let mut business = sample_business();
    business.requires_approval = true;
    let business = app.seed_business(business).await;

    let outcome = app
        .state
        .admission_service
        .admit(request(&business, tomorrow(), "10:00"), &Locale::default(), Utc::now())
        .await?;

    assert_eq!(outcome.booking.status, BookingStatus::Pending);
    assert!(!outcome.message_sent);

    let records = app.store.notifications().await;
    assert!(records.iter().all(|r| r.message_type != MessageType::Confirmation));
    assert!(records.iter().any(|r| r.message_type == MessageType::OwnerNotification));
    Ok(())
}

#[tokio::test]
async fn web_form_answers_are_stored_with_the_booking() -> anyhow::Result<()> {
    let app = TestApp::new();
    let business = app.seed_business(sample_business()).await;

    let mut req = request(&business, tomorrow(), "10:00");
    req.customer_channel_id = None;
    req.responses = Some(json!({ "email": "ana@example.com", "obs": "Primeira vez" }));

    let outcome = app.state.admission_service.admit(req, &Locale::default(), Utc::now()).await?;

    // Cliente web não tem canal: reserva confirmada, mensagem não enviada
    assert_eq!(outcome.booking.status, BookingStatus::Confirmed);
    assert!(!outcome.message_sent);
    assert_eq!(outcome.booking.responses["obs"], "Primeira vez");
    Ok(())
}
