//! Интеграционные тесты хранилища бронирований и платежей. Требуют
//! живой Postgres:
//!
//! ```sh
//! BOOKING_DATABASE_URL=... PAYMENT_DATABASE_URL=... cargo test -- --ignored
//! ```

use sqlx::PgPool;
use uuid::Uuid;

use flight_system::booking::models::{BookingStatus, NewBooking};
use flight_system::booking::repo::{BookingStore, PgBookingRepo};
use flight_system::payment::models::{NewPayment, PaymentStatus};
use flight_system::payment::repo::{PaymentStore, PgPaymentRepo};

async fn booking_pool() -> PgPool {
    let url = std::env::var("BOOKING_DATABASE_URL")
        .expect("BOOKING_DATABASE_URL must be set for integration tests");
    let pool = PgPool::connect(&url).await.expect("connect to postgres");
    sqlx::migrate!("migrations/booking")
        .run(&pool)
        .await
        .expect("run migrations");
    pool
}

async fn payment_pool() -> PgPool {
    let url = std::env::var("PAYMENT_DATABASE_URL")
        .expect("PAYMENT_DATABASE_URL must be set for integration tests");
    let pool = PgPool::connect(&url).await.expect("connect to postgres");
    sqlx::migrate!("migrations/payment")
        .run(&pool)
        .await
        .expect("run migrations");
    pool
}

fn new_booking() -> NewBooking {
    NewBooking {
        user_id: 1,
        flight_id: 10,
        seat_number: "12A".to_string(),
        passenger_name: "Ivan Petrov".to_string(),
        passenger_passport: "4509 123456".to_string(),
        price_minor_units: 150_00,
        currency: "RUB".to_string(),
    }
}

#[tokio::test]
#[ignore = "requires postgres"]
async fn booking_and_payment_request_are_one_transaction() {
    let pool = booking_pool().await;
    let repo = PgBookingRepo::new(pool.clone());

    let booking = repo.create_with_payment_request(new_booking()).await.unwrap();
    assert_eq!(booking.status, BookingStatus::Pending);

    let outbox_rows: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM booking_outbox
        WHERE event_type = 'PAYMENT_REQUEST'
          AND (payload ->> 'booking_id')::uuid = $1
        "#,
    )
    .bind(booking.id)
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(outbox_rows, 1);
}

#[tokio::test]
#[ignore = "requires postgres"]
async fn terminal_status_is_monotonic() {
    let pool = booking_pool().await;
    let repo = PgBookingRepo::new(pool.clone());
    let booking = repo.create_with_payment_request(new_booking()).await.unwrap();

    assert!(repo.transition(booking.id, BookingStatus::Paid).await.unwrap());

    // Никакой последующий переход не меняет терминальный статус.
    for next in [
        BookingStatus::Cancelled,
        BookingStatus::Failed,
        BookingStatus::Timeout,
        BookingStatus::Paid,
    ] {
        assert!(!repo.transition(booking.id, next).await.unwrap());
    }

    assert_eq!(
        repo.get(booking.id).await.unwrap().status,
        BookingStatus::Paid
    );
}

#[tokio::test]
#[ignore = "requires postgres"]
async fn duplicate_payment_request_yields_single_row() {
    let pool = payment_pool().await;
    let repo = PgPaymentRepo::new(pool.clone());

    let new_payment = NewPayment {
        booking_id: Uuid::new_v4(),
        user_id: 1,
        amount_minor_units: 150_00,
        currency: "RUB".to_string(),
    };

    let (first, first_is_new) = repo.create_or_get(new_payment.clone()).await.unwrap();
    assert!(first_is_new);

    repo.mark_processed(first.id, PaymentStatus::Success, None)
        .await
        .unwrap();

    let (second, second_is_new) = repo.create_or_get(new_payment.clone()).await.unwrap();
    assert!(!second_is_new);
    assert_eq!(second.id, first.id);
    assert_eq!(second.status, PaymentStatus::Success);

    let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM payments WHERE booking_id = $1")
        .bind(new_payment.booking_id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(rows, 1);
}
