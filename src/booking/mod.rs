//! Сервис бронирований: оркестратор саги. Создаёт бронирование поверх
//! резерва места, публикует платёжные запросы через outbox, применяет
//! результаты платежей и компенсирует отказы освобождением места.

pub mod consumer;
pub mod controllers;
pub mod error;
pub mod flight_client;
pub mod models;
pub mod repo;
pub mod service;
pub mod workers;

use std::sync::Arc;

use flight_client::FlightClient;
use repo::PgBookingRepo;
use service::BookingService;

/// Общее состояние HTTP-обработчиков сервиса бронирований.
pub struct AppState {
    pub service: Arc<BookingService<PgBookingRepo, FlightClient>>,
}

pub type SharedState = Arc<AppState>;
