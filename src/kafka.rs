//! kafka.rs
//!
//! Тонкие обёртки над rdkafka: продюсер с подтверждением доставки и
//! общий цикл консьюмера с семантикой at-least-once. Оффсет коммитится
//! только после успешной обработки сообщения; ошибка обработчика
//! оставляет оффсет на месте, и сообщение будет доставлено повторно.

use std::future::Future;
use std::time::Duration;

use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::error::KafkaError;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use rdkafka::Message;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Продюсер, ждущий подтверждения записи от брокера.
#[derive(Clone)]
pub struct Producer {
    inner: FutureProducer,
}

impl Producer {
    pub fn new(brokers: &str) -> Result<Self, KafkaError> {
        let inner: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("acks", "all")
            .set("message.timeout.ms", "5000")
            .create()?;

        Ok(Producer { inner })
    }

    /// Публикует сообщение и дожидается подтверждения от брокера.
    /// Ключ определяет партицию: сообщения с одним ключом упорядочены.
    pub async fn send(&self, topic: &str, key: &str, payload: &[u8]) -> Result<(), KafkaError> {
        let record = FutureRecord::to(topic).key(key).payload(payload);

        self.inner
            .send(record, Timeout::After(Duration::from_secs(5)))
            .await
            .map_err(|(err, _msg)| err)?;

        Ok(())
    }
}

/// Создаёт консьюмера с ручным коммитом оффсетов.
pub fn consumer(brokers: &str, group_id: &str, topic: &str) -> Result<StreamConsumer, KafkaError> {
    let consumer: StreamConsumer = ClientConfig::new()
        .set("bootstrap.servers", brokers)
        .set("group.id", group_id)
        .set("enable.auto.commit", "false")
        .set("auto.offset.reset", "earliest")
        .create()?;

    consumer.subscribe(&[topic])?;
    Ok(consumer)
}

/// Цикл консьюмера. Ошибка чтения из брокера не роняет цикл: пауза в
/// секунду и новая попытка. Выход только по отмене корневого токена.
pub async fn run_consumer<H, Fut>(consumer: &StreamConsumer, token: &CancellationToken, mut handle: H)
where
    H: FnMut(Vec<u8>) -> Fut,
    Fut: Future<Output = anyhow::Result<()>>,
{
    info!("kafka consumer started");

    loop {
        let message = tokio::select! {
            _ = token.cancelled() => {
                info!("kafka consumer stopping");
                break;
            }
            fetched = consumer.recv() => match fetched {
                Ok(m) => m,
                Err(err) => {
                    error!("failed to fetch message: {err}");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                    continue;
                }
            },
        };

        let payload = message.payload().unwrap_or_default().to_vec();
        let offset = message.offset();

        match handle(payload).await {
            Ok(()) => {
                if let Err(err) = consumer.commit_message(&message, CommitMode::Async) {
                    error!("failed to commit offset {offset}: {err}");
                }
            }
            Err(err) => {
                // Оффсет не коммитим: сообщение будет доставлено снова.
                warn!("failed to process message at offset {offset}: {err:#}");
            }
        }
    }
}
