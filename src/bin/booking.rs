use std::net::SocketAddr;
use std::sync::Arc;

use axum::{routing::get, Router};
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use flight_system::booking::{
    self, consumer, flight_client::FlightClient, repo::PgBookingRepo, service::BookingService,
    workers::{ExpiredBookingCleaner, PaymentOutboxRelay},
};
use flight_system::config::BookingConfig;
use flight_system::database::Database;
use flight_system::kafka;
use flight_system::shutdown;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let config = BookingConfig::from_env();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&config.rust_log))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("starting booking service");

    let db = Database::connect(&config.database_url)
        .await
        .expect("Failed to connect to database");
    info!("database connected");

    sqlx::migrate!("migrations/booking")
        .run(&db.pool)
        .await
        .expect("Failed to run migrations");

    let flight_client = FlightClient::new(&config.flight_service_url, config.flight_client_timeout);
    let service = Arc::new(BookingService::new(
        PgBookingRepo::new(db.pool.clone()),
        flight_client,
    ));

    let producer = kafka::Producer::new(&config.kafka.brokers).expect("Failed to create producer");
    let results_consumer = kafka::consumer(
        &config.kafka.brokers,
        &config.kafka.group_id,
        &config.kafka.topic_payment_results,
    )
    .expect("Failed to create consumer");

    let root = CancellationToken::new();
    tokio::spawn(shutdown::cancel_on_signal(root.clone()));

    tokio::spawn(consumer::run(
        results_consumer,
        root.clone(),
        service.clone(),
    ));

    let relay = PaymentOutboxRelay::new(
        db.pool.clone(),
        producer,
        config.kafka.topic_payment_requests.clone(),
        config.outbox_interval,
        config.outbox_batch_size,
    );
    tokio::spawn(relay.run(root.clone()));

    let cleaner =
        ExpiredBookingCleaner::new(service.clone(), config.cleaner_interval, config.booking_ttl);
    tokio::spawn(cleaner.run(root.clone()));

    let state = Arc::new(booking::AppState { service });

    let app = Router::new()
        .route("/health", get(|| async { "OK" }))
        .nest("/api", booking::controllers::routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.http_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind listener");
    info!("server listening on {addr}");

    let server_token = root.clone();
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async move { server_token.cancelled().await })
        .await
        .expect("server error");

    db.close().await;
    info!("server stopped");
}
