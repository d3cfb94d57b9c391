//! repo.rs
//!
//! Хранилище бронирований. Ключевые свойства:
//! - бронирование и его PAYMENT_REQUEST-событие вставляются одной
//!   транзакцией — платёжный запрос существует ровно тогда, когда
//!   существует PENDING-бронирование;
//! - каждый переход статуса несёт предикат `status = 'PENDING'`,
//!   поэтому конкурентные переходы деградируют в no-op, а не
//!   перезаписывают терминальный статус.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::booking::error::BookingError;
use crate::booking::models::{
    Booking, BookingStatus, NewBooking, PaymentRequestEvent, EVENT_PAYMENT_REQUEST,
};

/// Узкий интерфейс хранилища, от которого зависит оркестратор саги.
#[async_trait]
pub trait BookingStore: Send + Sync {
    /// Вставляет PENDING-бронирование вместе с outbox-событием
    /// PAYMENT_REQUEST в одной транзакции.
    async fn create_with_payment_request(
        &self,
        new_booking: NewBooking,
    ) -> Result<Booking, BookingError>;

    async fn get(&self, id: Uuid) -> Result<Booking, BookingError>;

    async fn list_by_user(&self, user_id: i64) -> Result<Vec<Booking>, BookingError>;

    /// Переход PENDING → `to`. Возвращает `true`, если строка изменилась;
    /// `false` — бронирование уже в терминальном статусе или не найдено.
    async fn transition(&self, id: Uuid, to: BookingStatus) -> Result<bool, BookingError>;

    /// PENDING-бронирования старше отметки времени.
    async fn find_expired(&self, cutoff: DateTime<Utc>) -> Result<Vec<Booking>, BookingError>;
}

#[derive(Clone)]
pub struct PgBookingRepo {
    pool: PgPool,
}

impl PgBookingRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BookingStore for PgBookingRepo {
    async fn create_with_payment_request(
        &self,
        new_booking: NewBooking,
    ) -> Result<Booking, BookingError> {
        let booking_id = Uuid::new_v4();
        let mut tx = self.pool.begin().await?;

        let booking: Booking = sqlx::query_as(
            r#"
            INSERT INTO bookings (
                id, user_id, flight_id, seat_number,
                passenger_name, passenger_passport,
                price_minor_units, currency, status, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, NOW(), NOW())
            RETURNING *
            "#,
        )
        .bind(booking_id)
        .bind(new_booking.user_id)
        .bind(new_booking.flight_id)
        .bind(&new_booking.seat_number)
        .bind(&new_booking.passenger_name)
        .bind(&new_booking.passenger_passport)
        .bind(new_booking.price_minor_units)
        .bind(&new_booking.currency)
        .bind(BookingStatus::Pending)
        .fetch_one(&mut *tx)
        .await?;

        let event = PaymentRequestEvent {
            booking_id,
            user_id: new_booking.user_id,
            amount_minor_units: new_booking.price_minor_units,
            currency: new_booking.currency.clone(),
        };
        sqlx::query("INSERT INTO booking_outbox (id, event_type, payload) VALUES ($1, $2, $3)")
            .bind(Uuid::new_v4())
            .bind(EVENT_PAYMENT_REQUEST)
            .bind(serde_json::to_value(&event)?)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(booking)
    }

    async fn get(&self, id: Uuid) -> Result<Booking, BookingError> {
        let booking: Option<Booking> = sqlx::query_as("SELECT * FROM bookings WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        booking.ok_or(BookingError::BookingNotFound)
    }

    async fn list_by_user(&self, user_id: i64) -> Result<Vec<Booking>, BookingError> {
        let bookings = sqlx::query_as(
            "SELECT * FROM bookings WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(bookings)
    }

    async fn transition(&self, id: Uuid, to: BookingStatus) -> Result<bool, BookingError> {
        let result = sqlx::query(
            r#"
            UPDATE bookings
            SET status = $1, updated_at = NOW()
            WHERE id = $2 AND status = 'PENDING'
            "#,
        )
        .bind(to)
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn find_expired(&self, cutoff: DateTime<Utc>) -> Result<Vec<Booking>, BookingError> {
        let bookings = sqlx::query_as(
            "SELECT * FROM bookings WHERE status = 'PENDING' AND created_at < $1",
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;

        Ok(bookings)
    }
}
