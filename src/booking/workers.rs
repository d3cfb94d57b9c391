//! workers.rs
//!
//! Фоновые воркеры сервиса бронирований:
//! - релей booking_outbox → Kafka (PAYMENT_REQUEST в payment_requests);
//! - уборщик зависших PENDING-бронирований (TTL → TIMEOUT).
//!
//! Релей держит строки под FOR UPDATE SKIP LOCKED, поэтому несколько
//! инстансов сервиса не конфликтуют на одной очереди. Обработанные
//! строки не удаляются, а помечаются PROCESSED — история платёжных
//! запросов остаётся для аудита.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::booking::error::BookingError;
use crate::booking::flight_client::SeatClient;
use crate::booking::models::{PaymentRequestEvent, EVENT_PAYMENT_REQUEST};
use crate::booking::repo::BookingStore;
use crate::booking::service::BookingService;
use crate::kafka::Producer;

#[derive(Debug, sqlx::FromRow)]
struct OutboxRow {
    id: Uuid,
    event_type: String,
    payload: Value,
}

/// Релей платёжных запросов из outbox в шину.
pub struct PaymentOutboxRelay {
    pool: PgPool,
    producer: Producer,
    topic: String,
    interval: Duration,
    batch_size: i64,
}

impl PaymentOutboxRelay {
    pub fn new(
        pool: PgPool,
        producer: Producer,
        topic: String,
        interval: Duration,
        batch_size: i64,
    ) -> Self {
        Self {
            pool,
            producer,
            topic,
            interval,
            batch_size,
        }
    }

    pub async fn run(self, token: CancellationToken) {
        info!("starting payment outbox relay, interval {:?}", self.interval);
        let mut ticker = tokio::time::interval(self.interval);

        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    info!("stopping payment outbox relay");
                    return;
                }
                _ = ticker.tick() => {
                    if let Err(err) = self.process_batch().await {
                        error!("outbox batch failed: {err}");
                    }
                }
            }
        }
    }

    async fn process_batch(&self) -> Result<(), BookingError> {
        let mut tx = self.pool.begin().await?;

        let rows: Vec<OutboxRow> = sqlx::query_as(
            r#"
            SELECT id, event_type, payload
            FROM booking_outbox
            WHERE status = 'PENDING'
            ORDER BY created_at ASC
            LIMIT $1
            FOR UPDATE SKIP LOCKED
            "#,
        )
        .bind(self.batch_size)
        .fetch_all(&mut *tx)
        .await?;

        for row in rows {
            if row.event_type != EVENT_PAYMENT_REQUEST {
                let reason = format!("unknown event type: {}", row.event_type);
                warn!("poison outbox row {}: {reason}", row.id);
                mark_failed(&mut tx, row.id, &reason).await?;
                continue;
            }

            // Ключ сообщения — booking_id, сам payload уходит как есть.
            let event: PaymentRequestEvent = match serde_json::from_value(row.payload.clone()) {
                Ok(event) => event,
                Err(err) => {
                    let reason = format!("invalid payload json: {err}");
                    warn!("poison outbox row {}: {reason}", row.id);
                    mark_failed(&mut tx, row.id, &reason).await?;
                    continue;
                }
            };

            let payload = serde_json::to_vec(&row.payload)?;
            if let Err(err) = self
                .producer
                .send(&self.topic, &event.booking_id.to_string(), &payload)
                .await
            {
                // Публикация не удалась: откатываем батч, строки
                // остаются PENDING до следующего тика.
                error!("failed to publish outbox row {}: {err}", row.id);
                return Ok(());
            }

            sqlx::query(
                "UPDATE booking_outbox SET status = 'PROCESSED', processed_at = NOW() WHERE id = $1",
            )
            .bind(row.id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

async fn mark_failed(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    id: Uuid,
    reason: &str,
) -> Result<(), BookingError> {
    sqlx::query("UPDATE booking_outbox SET status = 'FAILED', error_message = $1 WHERE id = $2")
        .bind(reason)
        .bind(id)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

/// Уборщик зависших бронирований: PENDING старше TTL → TIMEOUT,
/// место освобождается по RPC.
pub struct ExpiredBookingCleaner<R, C> {
    service: Arc<BookingService<R, C>>,
    interval: Duration,
    booking_ttl: Duration,
}

impl<R: BookingStore, C: SeatClient> ExpiredBookingCleaner<R, C> {
    pub fn new(
        service: Arc<BookingService<R, C>>,
        interval: Duration,
        booking_ttl: Duration,
    ) -> Self {
        Self {
            service,
            interval,
            booking_ttl,
        }
    }

    pub async fn run(self, token: CancellationToken) {
        info!(
            "starting expired booking cleaner, interval {:?}, ttl {:?}",
            self.interval, self.booking_ttl
        );
        let mut ticker = tokio::time::interval(self.interval);

        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    info!("stopping expired booking cleaner");
                    return;
                }
                _ = ticker.tick() => {
                    match self.service.expire_stale(self.booking_ttl).await {
                        Ok(0) => {}
                        Ok(count) => info!("timed out {count} expired bookings"),
                        Err(err) => error!("failed to process expired bookings: {err}"),
                    }
                }
            }
        }
    }
}
