//! Сервис рейсов: каталог рейсов и самолётов, инвентарь мест с
//! пессимистичной блокировкой строк, зеркало в поисковом индексе.

pub mod controllers;
pub mod error;
pub mod models;
pub mod repo;
pub mod search;
pub mod workers;

use std::sync::Arc;

/// Общее состояние HTTP-обработчиков сервиса рейсов.
pub struct AppState {
    pub flights: repo::FlightRepo,
    pub aircrafts: repo::AircraftRepo,
    pub search: search::SearchClient,
}

pub type SharedState = Arc<AppState>;
