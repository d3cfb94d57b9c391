//! worker.rs
//!
//! Консьюмер payment_requests. Сообщение подтверждается только после
//! успешной публикации результата: упавшая публикация означает
//! повторную доставку, а дедупликацию берёт на себя уникальный индекс
//! по booking_id.

use std::sync::Arc;

use anyhow::Context;
use rdkafka::consumer::StreamConsumer;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::kafka::{self, Producer};
use crate::payment::models::{PaymentRequestDTO, PaymentResultDTO};
use crate::payment::repo::PaymentStore;
use crate::payment::service::PaymentService;

pub async fn run<S>(
    consumer: StreamConsumer,
    token: CancellationToken,
    service: Arc<PaymentService<S>>,
    producer: Producer,
    results_topic: String,
) where
    S: PaymentStore,
{
    kafka::run_consumer(&consumer, &token, |payload| {
        let service = service.clone();
        let producer = producer.clone();
        let results_topic = results_topic.clone();

        async move {
            let request: PaymentRequestDTO =
                serde_json::from_slice(&payload).context("failed to decode payment request")?;

            info!(
                booking_id = %request.booking_id,
                amount = request.amount_minor_units,
                "received payment request"
            );

            let payment = service
                .process_payment(&request)
                .await
                .context("failed to process payment")?;

            let result = PaymentResultDTO::from_payment(&payment);
            let body = serde_json::to_vec(&result).context("failed to encode payment result")?;

            producer
                .send(&results_topic, &payment.booking_id.to_string(), &body)
                .await
                .context("failed to publish payment result")?;

            info!(
                booking_id = %payment.booking_id,
                payment_id = %payment.id,
                status = payment.status.as_str(),
                "payment result sent"
            );

            Ok(())
        }
    })
    .await;
}
