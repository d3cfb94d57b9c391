//! repo.rs
//!
//! Хранилище платежей. Идемпотентность обеспечивает уникальный индекс
//! по booking_id: повторный запрос не создаёт вторую строку, а
//! возвращает существующую с флагом `is_new = false`.

use async_trait::async_trait;
use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

use crate::payment::models::{NewPayment, Payment, PaymentStatus};

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("payment not found")]
    PaymentNotFound,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[async_trait]
pub trait PaymentStore: Send + Sync {
    /// Создаёт платёж или возвращает уже существующий для этого
    /// booking_id. Второй элемент — признак "строка новая".
    async fn create_or_get(&self, new_payment: NewPayment)
        -> Result<(Payment, bool), PaymentError>;

    /// Переводит платёж в терминальный статус с отметкой времени.
    async fn mark_processed(
        &self,
        payment_id: Uuid,
        status: PaymentStatus,
        error_message: Option<&str>,
    ) -> Result<(), PaymentError>;
}

#[derive(Clone)]
pub struct PgPaymentRepo {
    pool: PgPool,
}

impl PgPaymentRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PaymentStore for PgPaymentRepo {
    async fn create_or_get(
        &self,
        new_payment: NewPayment,
    ) -> Result<(Payment, bool), PaymentError> {
        let inserted: Option<Payment> = sqlx::query_as(
            r#"
            INSERT INTO payments (id, booking_id, user_id, amount_minor_units, currency, status, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, NOW())
            ON CONFLICT (booking_id) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(new_payment.booking_id)
        .bind(new_payment.user_id)
        .bind(new_payment.amount_minor_units)
        .bind(&new_payment.currency)
        .bind(PaymentStatus::Pending)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(payment) = inserted {
            return Ok((payment, true));
        }

        let existing: Option<Payment> =
            sqlx::query_as("SELECT * FROM payments WHERE booking_id = $1")
                .bind(new_payment.booking_id)
                .fetch_optional(&self.pool)
                .await?;

        existing
            .map(|payment| (payment, false))
            .ok_or(PaymentError::PaymentNotFound)
    }

    async fn mark_processed(
        &self,
        payment_id: Uuid,
        status: PaymentStatus,
        error_message: Option<&str>,
    ) -> Result<(), PaymentError> {
        let result = sqlx::query(
            r#"
            UPDATE payments
            SET status = $1, error_message = $2, processed_at = NOW()
            WHERE id = $3
            "#,
        )
        .bind(status)
        .bind(error_message)
        .bind(payment_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(PaymentError::PaymentNotFound);
        }

        Ok(())
    }
}
