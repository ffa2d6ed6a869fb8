// tests/postgres_reservation.rs
//
// Roda contra um Postgres real apenas quando DATABASE_URL está definida.

use std::sync::Arc;

use chrono::{Duration, DurationRound, Utc};
use serde_json::json;
use sqlx::{postgres::PgPoolOptions, PgPool};
use uuid::Uuid;

use booking_backend::{
    common::error::AppError,
    db::{BookingRepository, PgBookingRepository},
    models::booking::{BookingAction, BookingStatus, CancelledBy, NewBooking},
};

struct Seeded {
    business_id: Uuid,
    staff_id: Uuid,
    customer_id: Uuid,
}

async fn connect() -> anyhow::Result<Option<PgPool>> {
    let Ok(url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL não definida, pulando teste de Postgres");
        return Ok(None);
    };

    let pool = PgPoolOptions::new().max_connections(12).connect(&url).await?;
    sqlx::migrate!().run(&pool).await?;
    Ok(Some(pool))
}

async fn seed(pool: &PgPool) -> anyhow::Result<Seeded> {
    let owner_id: Uuid = sqlx::query_scalar(
        "INSERT INTO owners (email, subscription_status) VALUES ($1, 'active') RETURNING id",
    )
    .bind(format!("{}@teste.dev", Uuid::new_v4()))
    .fetch_one(pool)
    .await?;

    let business_id: Uuid =
        sqlx::query_scalar("INSERT INTO businesses (owner_id, name) VALUES ($1, 'Acme Salon') RETURNING id")
            .bind(owner_id)
            .fetch_one(pool)
            .await?;

    let staff_id: Uuid = sqlx::query_scalar("INSERT INTO staff (business_id, name) VALUES ($1, 'João') RETURNING id")
        .bind(business_id)
        .fetch_one(pool)
        .await?;

    let customer_id: Uuid =
        sqlx::query_scalar("INSERT INTO customers (customer_type) VALUES ('anonymous') RETURNING id")
            .fetch_one(pool)
            .await?;

    Ok(Seeded { business_id, staff_id, customer_id })
}

fn new_booking(seeded: &Seeded, offset_minutes: i64, duration_minutes: i32) -> anyhow::Result<NewBooking> {
    let base = (Utc::now() + Duration::days(1)).duration_trunc(Duration::hours(1))?;
    Ok(NewBooking {
        business_id: seeded.business_id,
        customer_id: seeded.customer_id,
        service_id: None,
        staff_id: Some(seeded.staff_id),
        date_time: base + Duration::minutes(offset_minutes),
        duration_minutes,
        status: BookingStatus::Confirmed,
        responses: json!({}),
    })
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_reservations_commit_exactly_once() -> anyhow::Result<()> {
    let Some(pool) = connect().await? else {
        return Ok(());
    };
    let seeded = seed(&pool).await?;
    let repo = Arc::new(PgBookingRepository::new(pool.clone()));
    let booking = new_booking(&seeded, 0, 30)?;

    let mut handles = Vec::new();
    for _ in 0..8 {
        let repo = repo.clone();
        let booking = booking.clone();
        handles.push(tokio::spawn(async move { repo.try_reserve(&booking).await }));
    }

    let mut reserved = 0;
    for handle in handles {
        // Perdedores recebem None (40001 ou 23P01), nunca erro
        if handle.await??.is_some() {
            reserved += 1;
        }
    }
    assert_eq!(reserved, 1);

    let active: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM bookings WHERE staff_id = $1 AND status IN ('pending', 'confirmed')",
    )
    .bind(seeded.staff_id)
    .fetch_one(&pool)
    .await?;
    assert_eq!(active, 1);
    Ok(())
}

#[tokio::test]
async fn overlap_is_refused_and_cancelled_booking_frees_the_slot() -> anyhow::Result<()> {
    let Some(pool) = connect().await? else {
        return Ok(());
    };
    let seeded = seed(&pool).await?;
    let repo = PgBookingRepository::new(pool);

    let existing = repo
        .try_reserve(&new_booking(&seeded, 60, 60)?)
        .await?
        .expect("primeira reserva");

    // Começa antes e invade; encostado no fim passa
    assert!(repo.try_reserve(&new_booking(&seeded, 30, 60)?).await?.is_none());
    assert!(repo.try_reserve(&new_booking(&seeded, 120, 30)?).await?.is_some());

    let mut cancelled = existing.clone();
    cancelled.apply(
        &BookingAction::Cancel { reason: None, cancelled_by: CancelledBy::System },
        Utc::now(),
    )?;
    repo.update_status(&cancelled, BookingStatus::Confirmed).await?;

    assert!(repo.try_reserve(&new_booking(&seeded, 30, 60)?).await?.is_some());
    Ok(())
}

#[tokio::test]
async fn status_write_is_compare_and_set() -> anyhow::Result<()> {
    let Some(pool) = connect().await? else {
        return Ok(());
    };
    let seeded = seed(&pool).await?;
    let repo = PgBookingRepository::new(pool);

    let booking = repo
        .try_reserve(&new_booking(&seeded, 240, 30)?)
        .await?
        .expect("reserva");
    let mut cancelled = booking.clone();
    let mut stale = booking.clone();

    cancelled.apply(
        &BookingAction::Cancel { reason: None, cancelled_by: CancelledBy::Customer },
        Utc::now(),
    )?;
    repo.update_status(&cancelled, BookingStatus::Confirmed).await?;

    stale.apply(&BookingAction::Complete, Utc::now())?;
    let err = repo.update_status(&stale, BookingStatus::Confirmed).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidStatusTransition(_)));

    let stored = repo
        .find_booking(seeded.business_id, booking.id)
        .await?
        .expect("agendamento");
    assert_eq!(stored.status, BookingStatus::Cancelled);
    Ok(())
}
