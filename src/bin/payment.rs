use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use flight_system::config::PaymentConfig;
use flight_system::database::Database;
use flight_system::kafka;
use flight_system::payment::{repo::PgPaymentRepo, service::PaymentService, worker};
use flight_system::shutdown;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let config = PaymentConfig::from_env();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&config.rust_log))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("starting payment service");

    let db = Database::connect(&config.database_url)
        .await
        .expect("Failed to connect to database");
    info!("database connected");

    sqlx::migrate!("migrations/payment")
        .run(&db.pool)
        .await
        .expect("Failed to run migrations");

    let service = Arc::new(PaymentService::new(
        PgPaymentRepo::new(db.pool.clone()),
        &config,
    ));

    let producer = kafka::Producer::new(&config.kafka.brokers).expect("Failed to create producer");
    let requests_consumer = kafka::consumer(
        &config.kafka.brokers,
        &config.kafka.group_id,
        &config.kafka.topic_payment_requests,
    )
    .expect("Failed to create consumer");

    let root = CancellationToken::new();
    tokio::spawn(shutdown::cancel_on_signal(root.clone()));

    // Консьюмер и есть главный цикл сервиса: выходим по сигналу.
    worker::run(
        requests_consumer,
        root,
        service,
        producer,
        config.kafka.topic_payment_results.clone(),
    )
    .await;

    db.close().await;
    info!("server stopped");
}
