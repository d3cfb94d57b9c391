//! service.rs
//!
//! Симулятор банка. Задержка и исход берутся из криптографически
//! стойкого генератора: равномерная пауза в заданном окне и взвешенная
//! монета успеха.

use chrono::Utc;
use rand::rngs::OsRng;
use rand::Rng;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::PaymentConfig;
use crate::payment::models::{NewPayment, Payment, PaymentRequestDTO, PaymentStatus};
use crate::payment::repo::{PaymentError, PaymentStore};

const BANK_DECLINE_MESSAGE: &str = "insufficient funds or bank error";

pub struct PaymentService<S> {
    store: S,
    success_chance: u32,
    min_delay_ms: u64,
    max_delay_ms: u64,
}

impl<S: PaymentStore> PaymentService<S> {
    pub fn new(store: S, config: &PaymentConfig) -> Self {
        Self {
            store,
            success_chance: config.bank_success_chance.min(100),
            min_delay_ms: config.bank_min_delay_ms,
            max_delay_ms: config.bank_max_delay_ms.max(config.bank_min_delay_ms),
        }
    }

    /// Обрабатывает платёжный запрос. Дубликат по booking_id не
    /// трогает банк: возвращается сохранённый результат.
    pub async fn process_payment(
        &self,
        request: &PaymentRequestDTO,
    ) -> Result<Payment, PaymentError> {
        let (mut payment, is_new) = self
            .store
            .create_or_get(NewPayment {
                booking_id: request.booking_id,
                user_id: request.user_id,
                amount_minor_units: request.amount_minor_units,
                currency: request.currency.clone(),
            })
            .await?;

        if !is_new {
            info!(
                booking_id = %request.booking_id,
                status = payment.status.as_str(),
                "payment request duplicate, returning existing status"
            );
            return Ok(payment);
        }

        self.simulate_bank_latency().await;

        let (status, error_message) = if self.bank_accepts() {
            info!(booking_id = %request.booking_id, "bank accepted payment");
            (PaymentStatus::Success, None)
        } else {
            warn!(
                booking_id = %request.booking_id,
                reason = BANK_DECLINE_MESSAGE,
                "bank rejected payment"
            );
            (PaymentStatus::Failed, Some(BANK_DECLINE_MESSAGE))
        };

        self.store
            .mark_processed(payment.id, status, error_message)
            .await?;

        payment.status = status;
        payment.error_message = error_message.map(str::to_string);
        payment.processed_at = Some(Utc::now());

        Ok(payment)
    }

    async fn simulate_bank_latency(&self) {
        let delay_ms = if self.max_delay_ms > self.min_delay_ms {
            OsRng.gen_range(self.min_delay_ms..=self.max_delay_ms)
        } else {
            self.min_delay_ms
        };
        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }

    fn bank_accepts(&self) -> bool {
        OsRng.gen_range(0..100u32) < self.success_chance
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use uuid::Uuid;

    fn config(success_chance: u32) -> PaymentConfig {
        PaymentConfig {
            database_url: String::new(),
            kafka: crate::config::KafkaConfig {
                brokers: String::new(),
                topic_payment_requests: String::new(),
                topic_payment_results: String::new(),
                group_id: String::new(),
            },
            rust_log: String::new(),
            bank_success_chance: success_chance,
            bank_min_delay_ms: 0,
            bank_max_delay_ms: 0,
        }
    }

    fn request() -> PaymentRequestDTO {
        PaymentRequestDTO {
            booking_id: Uuid::new_v4(),
            user_id: 5,
            amount_minor_units: 150_00,
            currency: "RUB".to_string(),
        }
    }

    #[derive(Default)]
    struct FakeStore {
        existing: Mutex<Option<Payment>>,
        mark_calls: AtomicU32,
    }

    #[async_trait]
    impl PaymentStore for FakeStore {
        async fn create_or_get(
            &self,
            new_payment: NewPayment,
        ) -> Result<(Payment, bool), PaymentError> {
            if let Some(existing) = self.existing.lock().unwrap().clone() {
                return Ok((existing, false));
            }
            Ok((
                Payment {
                    id: Uuid::new_v4(),
                    booking_id: new_payment.booking_id,
                    user_id: new_payment.user_id,
                    amount_minor_units: new_payment.amount_minor_units,
                    currency: new_payment.currency,
                    status: PaymentStatus::Pending,
                    error_message: None,
                    created_at: Utc::now(),
                    processed_at: None,
                },
                true,
            ))
        }

        async fn mark_processed(
            &self,
            _payment_id: Uuid,
            _status: PaymentStatus,
            _error_message: Option<&str>,
        ) -> Result<(), PaymentError> {
            self.mark_calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn always_successful_bank_yields_success() {
        let service = PaymentService::new(FakeStore::default(), &config(100));

        let payment = service.process_payment(&request()).await.unwrap();

        assert_eq!(payment.status, PaymentStatus::Success);
        assert!(payment.error_message.is_none());
        assert!(payment.processed_at.is_some());
        assert_eq!(service.store.mark_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn always_failing_bank_yields_failure_with_reason() {
        let service = PaymentService::new(FakeStore::default(), &config(0));

        let payment = service.process_payment(&request()).await.unwrap();

        assert_eq!(payment.status, PaymentStatus::Failed);
        assert_eq!(
            payment.error_message.as_deref(),
            Some(BANK_DECLINE_MESSAGE)
        );
    }

    #[tokio::test]
    async fn duplicate_request_returns_stored_result_without_touching_bank() {
        let store = FakeStore::default();
        let stored = Payment {
            id: Uuid::new_v4(),
            booking_id: Uuid::new_v4(),
            user_id: 5,
            amount_minor_units: 150_00,
            currency: "RUB".to_string(),
            status: PaymentStatus::Success,
            error_message: None,
            created_at: Utc::now(),
            processed_at: Some(Utc::now()),
        };
        *store.existing.lock().unwrap() = Some(stored.clone());

        let service = PaymentService::new(store, &config(0));
        let payment = service.process_payment(&request()).await.unwrap();

        // Статус сохранённого платежа, а не новый бросок монеты.
        assert_eq!(payment.status, PaymentStatus::Success);
        assert_eq!(payment.id, stored.id);
        assert_eq!(service.store.mark_calls.load(Ordering::SeqCst), 0);
    }
}
