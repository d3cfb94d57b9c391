//! consumer.rs
//!
//! Консьюмер топика payment_results. Оффсет коммитится после успешной
//! обработки; нечитабельное сообщение остаётся неподтверждённым и
//! будет доставлено снова.

use std::sync::Arc;

use anyhow::Context;
use rdkafka::consumer::StreamConsumer;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::booking::flight_client::SeatClient;
use crate::booking::models::PaymentResultDTO;
use crate::booking::repo::BookingStore;
use crate::booking::service::BookingService;
use crate::kafka;

pub async fn run<R, C>(
    consumer: StreamConsumer,
    token: CancellationToken,
    service: Arc<BookingService<R, C>>,
) where
    R: BookingStore,
    C: SeatClient,
{
    kafka::run_consumer(&consumer, &token, |payload| {
        let service = service.clone();
        async move {
            let result: PaymentResultDTO =
                serde_json::from_slice(&payload).context("failed to decode payment result")?;

            info!(
                booking_id = %result.booking_id,
                status = %result.status,
                "received payment result"
            );

            service
                .handle_payment_result(result)
                .await
                .context("failed to process payment result")
        }
    })
    .await;
}
