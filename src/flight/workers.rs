//! workers.rs
//!
//! Фоновые воркеры сервиса рейсов:
//! - релей outbox → поисковый индекс (батч с FOR UPDATE SKIP LOCKED,
//!   обработанные строки удаляются);
//! - уборщик просроченных резервов мест (TTL).
//!
//! Оба цикла никогда не выходят по ошибке — только по отмене корневого
//! токена. Ошибка батча оставляет строки в PENDING до следующего тика.

use std::collections::BTreeSet;
use std::time::Duration;

use chrono::Utc;
use serde_json::Value;
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::flight::error::FlightError;
use crate::flight::models::{
    FlightDocument, SeatsChangedEvent, EVENT_FLIGHT_CREATED, EVENT_SEATS_CHANGED,
};
use crate::flight::repo::{self, FlightRepo};
use crate::flight::search::SearchClient;

/// Типизированное событие из flight_outbox.
#[derive(Debug)]
pub enum FlightOutboxEvent {
    FlightCreated(FlightDocument),
    SeatsChanged(SeatsChangedEvent),
}

/// Разбирает строку outbox по тегу события. Ошибка — ядовитая строка:
/// релей помечает её FAILED и идёт дальше.
pub fn decode_outbox_event(event_type: &str, payload: &Value) -> Result<FlightOutboxEvent, String> {
    match event_type {
        EVENT_FLIGHT_CREATED => serde_json::from_value(payload.clone())
            .map(FlightOutboxEvent::FlightCreated)
            .map_err(|e| format!("invalid FLIGHT_CREATED payload: {e}")),
        EVENT_SEATS_CHANGED => serde_json::from_value(payload.clone())
            .map(FlightOutboxEvent::SeatsChanged)
            .map_err(|e| format!("invalid SEATS_CHANGED payload: {e}")),
        unknown => Err(format!("unknown event type: {unknown}")),
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OutboxRow {
    id: Uuid,
    event_type: String,
    payload: Value,
}

/// Релей outbox-таблицы рейсов в поисковый индекс.
pub struct SearchOutboxRelay {
    pool: PgPool,
    flights: FlightRepo,
    search: SearchClient,
    interval: Duration,
    batch_size: i64,
}

impl SearchOutboxRelay {
    pub fn new(
        pool: PgPool,
        flights: FlightRepo,
        search: SearchClient,
        interval: Duration,
        batch_size: i64,
    ) -> Self {
        Self {
            pool,
            flights,
            search,
            interval,
            batch_size,
        }
    }

    pub async fn run(self, token: CancellationToken) {
        info!("starting search outbox relay, interval {:?}", self.interval);
        let mut ticker = tokio::time::interval(self.interval);

        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    info!("stopping search outbox relay");
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

    async fn process_batch(&self) -> Result<(), FlightError> {
        let mut tx = self.pool.begin().await?;

        let rows: Vec<OutboxRow> = sqlx::query_as(
            r#"
            SELECT id, event_type, payload
            FROM flight_outbox
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
            let event = match decode_outbox_event(&row.event_type, &row.payload) {
                Ok(event) => event,
                Err(reason) => {
                    warn!("poison outbox row {}: {reason}", row.id);
                    mark_failed(&mut tx, row.id, &reason).await?;
                    continue;
                }
            };

            match self.publish(event).await {
                Ok(()) => {
                    // События индекса не аудируются: строка удаляется.
                    sqlx::query("DELETE FROM flight_outbox WHERE id = $1")
                        .bind(row.id)
                        .execute(&mut *tx)
                        .await?;
                }
                Err(PublishError::Poison(reason)) => {
                    warn!("outbox row {} failed permanently: {reason}", row.id);
                    mark_failed(&mut tx, row.id, &reason).await?;
                }
                Err(PublishError::Transient(err)) => {
                    // Батч откатывается целиком: строки остаются PENDING
                    // и будут переобработаны на следующем тике.
                    return Err(err);
                }
            }
        }

        tx.commit().await?;
        Ok(())
    }

    async fn publish(&self, event: FlightOutboxEvent) -> Result<(), PublishError> {
        match event {
            FlightOutboxEvent::FlightCreated(document) => self
                .search
                .index_flight(&document)
                .await
                .map_err(PublishError::Transient),
            FlightOutboxEvent::SeatsChanged(changed) => {
                // Счётчик мест читается заново: индексировать устаревшее
                // значение нельзя.
                let flight = match self.flights.get_by_id(changed.flight_id).await {
                    Ok(flight) => flight,
                    Err(FlightError::FlightNotFound) => {
                        return Err(PublishError::Poison(format!(
                            "flight {} disappeared from db",
                            changed.flight_id
                        )));
                    }
                    Err(err) => return Err(PublishError::Transient(err)),
                };

                self.search
                    .update_available_seats(flight.id, flight.available_seats)
                    .await
                    .map_err(PublishError::Transient)
            }
        }
    }
}

enum PublishError {
    Poison(String),
    Transient(FlightError),
}

async fn mark_failed(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    id: Uuid,
    reason: &str,
) -> Result<(), FlightError> {
    sqlx::query("UPDATE flight_outbox SET status = 'FAILED', error_message = $1 WHERE id = $2")
        .bind(reason)
        .bind(id)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

/// Уборщик просроченных резервов. Подтверждённые места (`reserved_at IS
/// NULL`) под предикат не попадают по построению.
pub struct SeatSweeper {
    pool: PgPool,
    interval: Duration,
    reservation_ttl: Duration,
}

impl SeatSweeper {
    pub fn new(pool: PgPool, interval: Duration, reservation_ttl: Duration) -> Self {
        Self {
            pool,
            interval,
            reservation_ttl,
        }
    }

    pub async fn run(self, token: CancellationToken) {
        info!(
            "starting seat sweeper, interval {:?}, ttl {:?}",
            self.interval, self.reservation_ttl
        );
        let mut ticker = tokio::time::interval(self.interval);

        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    info!("stopping seat sweeper");
                    return;
                }
                _ = ticker.tick() => {
                    match self.sweep_expired().await {
                        Ok(freed) if !freed.is_empty() => {
                            info!("released expired reservations on {} flights", freed.len());
                        }
                        Ok(_) => {}
                        Err(err) => error!("failed to sweep expired reservations: {err}"),
                    }
                }
            }
        }
    }

    /// Снимает просроченные резервы и пишет по одному SEATS_CHANGED на
    /// каждый затронутый рейс — всё в одной транзакции. Возвращает
    /// затронутые рейсы.
    pub async fn sweep_expired(&self) -> Result<BTreeSet<i64>, FlightError> {
        let cutoff = Utc::now() - chrono::Duration::seconds(self.reservation_ttl.as_secs() as i64);

        let mut tx = self.pool.begin().await?;

        let flight_ids: Vec<i64> = sqlx::query_scalar(
            r#"
            UPDATE seats
            SET is_booked = FALSE, reserved_at = NULL
            WHERE is_booked = TRUE
              AND reserved_at IS NOT NULL
              AND reserved_at < $1
            RETURNING flight_id
            "#,
        )
        .bind(cutoff)
        .fetch_all(&mut *tx)
        .await?;

        let affected: BTreeSet<i64> = flight_ids.into_iter().collect();
        for flight_id in &affected {
            repo::append_seats_changed(&mut *tx, *flight_id).await?;
        }

        tx.commit().await?;
        Ok(affected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decode_dispatches_by_tag() {
        let payload = json!({"flight_id": 5});
        match decode_outbox_event(EVENT_SEATS_CHANGED, &payload).unwrap() {
            FlightOutboxEvent::SeatsChanged(event) => assert_eq!(event.flight_id, 5),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn decode_rejects_unknown_tag() {
        let err = decode_outbox_event("SOMETHING_ELSE", &json!({})).unwrap_err();
        assert!(err.contains("unknown event type"));
    }

    #[test]
    fn decode_rejects_malformed_payload() {
        let err = decode_outbox_event(EVENT_SEATS_CHANGED, &json!({"flight": "oops"})).unwrap_err();
        assert!(err.contains("invalid SEATS_CHANGED payload"));
    }
}
