use std::net::SocketAddr;
use std::sync::Arc;

use axum::{routing::get, Router};
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use flight_system::config::FlightConfig;
use flight_system::database::Database;
use flight_system::flight::{
    self,
    repo::{AircraftRepo, FlightRepo},
    search::SearchClient,
    workers::{SearchOutboxRelay, SeatSweeper},
};
use flight_system::shutdown;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let config = FlightConfig::from_env();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&config.rust_log))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("starting flight service");

    let db = Database::connect(&config.database_url)
        .await
        .expect("Failed to connect to database");
    info!("database connected");

    sqlx::migrate!("migrations/flight")
        .run(&db.pool)
        .await
        .expect("Failed to run migrations");

    let search = SearchClient::new(&config.search_url);
    search
        .ensure_index()
        .await
        .expect("Failed to initialize search index");
    info!("search index ready");

    let state = Arc::new(flight::AppState {
        flights: FlightRepo::new(db.pool.clone()),
        aircrafts: AircraftRepo::new(db.pool.clone()),
        search: search.clone(),
    });

    let root = CancellationToken::new();
    tokio::spawn(shutdown::cancel_on_signal(root.clone()));

    let relay = SearchOutboxRelay::new(
        db.pool.clone(),
        FlightRepo::new(db.pool.clone()),
        search,
        config.outbox_interval,
        config.outbox_batch_size,
    );
    tokio::spawn(relay.run(root.clone()));

    let sweeper = SeatSweeper::new(db.pool.clone(), config.sweep_interval, config.reservation_ttl);
    tokio::spawn(sweeper.run(root.clone()));

    let app = Router::new()
        .route("/health", get(|| async { "OK" }))
        .nest("/api", flight::controllers::routes())
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
