//! controllers.rs
//!
//! HTTP API сервиса рейсов.
//!
//! Включает в себя следующую функциональность:
//! - Создание рейса и получение деталей/мест.
//! - Поиск рейсов через поисковый индекс.
//! - Справочники аэропортов и самолётов.
//! - Резерв, освобождение и подтверждение места.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use serde_json::json;

use crate::flight::error::FlightError;
use crate::flight::models::AircraftSeat;
use crate::flight::repo::NewFlight;
use crate::flight::search::SearchFilter;
use crate::flight::SharedState;

/// Определяет маршруты API сервиса рейсов.
pub fn routes() -> Router<SharedState> {
    Router::new()
        .route("/flights", post(create_flight))
        .route("/flights/search", get(search_flights))
        .route("/flights/{id}", get(get_flight_details))
        .route("/flights/{id}/seats", get(get_flight_seats))
        .route("/airports", get(list_airports))
        .route("/aircrafts", post(create_aircraft).get(list_aircrafts))
        .route("/aircrafts/{id}/seats", post(add_aircraft_seats))
        .route("/seats/reserve", post(reserve_seat))
        .route("/seats/release", post(release_seat))
        .route("/seats/confirm", post(confirm_seat))
}

/// Переводит доменную ошибку в HTTP-статус. Детали внутренних ошибок в
/// ответ не попадают, только в лог.
fn map_error(err: FlightError) -> (StatusCode, String) {
    match err {
        FlightError::FlightNotFound
        | FlightError::SeatNotFound
        | FlightError::AircraftNotFound => (StatusCode::NOT_FOUND, err.to_string()),
        FlightError::FlightAlreadyExists | FlightError::SeatAlreadyBooked => {
            (StatusCode::CONFLICT, err.to_string())
        }
        FlightError::Database(_) | FlightError::Serialization(_) | FlightError::Search(_) => {
            tracing::error!("internal error: {err}");
            (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string())
        }
    }
}

fn bad_request(message: &str) -> (StatusCode, String) {
    (StatusCode::BAD_REQUEST, message.to_string())
}

// --- Рейсы ---

#[derive(Debug, Deserialize)]
pub struct CreateFlightRequest {
    pub flight_number: String,
    pub aircraft_id: i64,
    pub departure_airport: String,
    pub arrival_airport: String,
    pub departure_time: DateTime<Utc>,
    pub arrival_time: DateTime<Utc>,
    pub price_minor_units: i64,
}

pub(crate) fn validate_create_flight(req: &CreateFlightRequest) -> Result<(), &'static str> {
    if req.flight_number.trim().is_empty() {
        return Err("flight number is required");
    }
    if req.aircraft_id <= 0 {
        return Err("aircraft id is required");
    }
    if req.departure_airport.is_empty() || req.arrival_airport.is_empty() {
        return Err("departure and arrival airports are required");
    }
    if req.departure_airport == req.arrival_airport {
        return Err("departure and arrival airports must be different");
    }
    if req.price_minor_units <= 0 {
        return Err("price must be positive");
    }
    if req.arrival_time <= req.departure_time {
        return Err("arrival time must be after departure time");
    }
    Ok(())
}

/// POST /api/flights
async fn create_flight(
    State(state): State<SharedState>,
    Json(req): Json<CreateFlightRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    validate_create_flight(&req).map_err(bad_request)?;

    let new_flight = NewFlight {
        flight_number: req.flight_number.trim().to_string(),
        aircraft_id: req.aircraft_id,
        departure_airport: req.departure_airport,
        arrival_airport: req.arrival_airport,
        departure_time: req.departure_time,
        arrival_time: req.arrival_time,
        price_minor_units: req.price_minor_units,
    };

    let flight_id = state
        .flights
        .create_flight(&new_flight)
        .await
        .map_err(map_error)?;

    Ok((StatusCode::CREATED, Json(json!({ "flight_id": flight_id }))))
}

/// GET /api/flights/{id}
async fn get_flight_details(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    if id <= 0 {
        return Err(bad_request("flight id is required"));
    }

    let flight = state.flights.get_by_id(id).await.map_err(map_error)?;
    Ok(Json(flight))
}

/// GET /api/flights/{id}/seats
async fn get_flight_seats(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    if id <= 0 {
        return Err(bad_request("flight id is required"));
    }

    let seats = state.flights.get_seats(id).await.map_err(map_error)?;
    Ok(Json(seats))
}

#[derive(Debug, Deserialize)]
pub struct SearchFlightsQuery {
    pub from: String,
    pub to: String,
    pub date: NaiveDate,
    pub passengers: i64,
}

pub(crate) fn validate_search(query: &SearchFlightsQuery) -> Result<(), &'static str> {
    if query.from.is_empty() || query.to.is_empty() {
        return Err("departure and arrival airports are required");
    }
    if query.passengers <= 0 {
        return Err("passenger count must be positive");
    }
    Ok(())
}

/// GET /api/flights/search?from=SVO&to=LED&date=2025-06-01&passengers=2
async fn search_flights(
    State(state): State<SharedState>,
    Query(query): Query<SearchFlightsQuery>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    validate_search(&query).map_err(bad_request)?;

    let found = state
        .search
        .search(&SearchFilter {
            from_airport: query.from,
            to_airport: query.to,
            date: query.date,
            passenger_count: query.passengers,
        })
        .await
        .map_err(map_error)?;

    Ok(Json(found))
}

/// GET /api/airports
async fn list_airports(
    State(state): State<SharedState>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let airports = state.flights.list_airports().await.map_err(map_error)?;
    Ok(Json(airports))
}

// --- Самолёты ---

#[derive(Debug, Deserialize)]
pub struct CreateAircraftRequest {
    pub model: String,
    pub total_seats: i32,
}

/// POST /api/aircrafts
async fn create_aircraft(
    State(state): State<SharedState>,
    Json(req): Json<CreateAircraftRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    if req.model.trim().is_empty() {
        return Err(bad_request("aircraft model is required"));
    }
    if req.total_seats <= 0 {
        return Err(bad_request("total seats must be positive"));
    }

    let id = state
        .aircrafts
        .create_aircraft(req.model.trim(), req.total_seats)
        .await
        .map_err(map_error)?;

    Ok((StatusCode::CREATED, Json(json!({ "aircraft_id": id }))))
}

/// GET /api/aircrafts
async fn list_aircrafts(
    State(state): State<SharedState>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let list = state.aircrafts.list_aircrafts().await.map_err(map_error)?;
    Ok(Json(list))
}

#[derive(Debug, Deserialize)]
pub struct AddAircraftSeatsRequest {
    pub seats: Vec<AircraftSeat>,
}

/// POST /api/aircrafts/{id}/seats
async fn add_aircraft_seats(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
    Json(req): Json<AddAircraftSeatsRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    if id <= 0 {
        return Err(bad_request("aircraft id is required"));
    }
    if req.seats.is_empty() {
        return Err(bad_request("seats list is empty"));
    }
    if req.seats.iter().any(|s| s.seat_number.trim().is_empty()) {
        return Err(bad_request("seat number is required"));
    }

    state
        .aircrafts
        .add_seats(id, &req.seats)
        .await
        .map_err(map_error)?;

    Ok((StatusCode::OK, Json(json!({ "success": true }))))
}

// --- Места ---

#[derive(Debug, Deserialize)]
pub struct SeatRequest {
    pub flight_id: i64,
    pub seat_number: String,
}

pub(crate) fn validate_seat_request(req: &SeatRequest) -> Result<(), &'static str> {
    if req.flight_id <= 0 {
        return Err("flight id is required");
    }
    if req.seat_number.trim().is_empty() {
        return Err("seat number is required");
    }
    Ok(())
}

/// POST /api/seats/reserve
async fn reserve_seat(
    State(state): State<SharedState>,
    Json(req): Json<SeatRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    validate_seat_request(&req).map_err(bad_request)?;

    let seat_id = state
        .flights
        .reserve_seat(req.flight_id, req.seat_number.trim())
        .await
        .map_err(map_error)?;

    Ok(Json(json!({ "seat_id": seat_id })))
}

/// POST /api/seats/release
async fn release_seat(
    State(state): State<SharedState>,
    Json(req): Json<SeatRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    validate_seat_request(&req).map_err(bad_request)?;

    state
        .flights
        .release_seat(req.flight_id, req.seat_number.trim())
        .await
        .map_err(map_error)?;

    Ok(Json(json!({ "success": true })))
}

/// POST /api/seats/confirm
async fn confirm_seat(
    State(state): State<SharedState>,
    Json(req): Json<SeatRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    validate_seat_request(&req).map_err(bad_request)?;

    state
        .flights
        .confirm_seat(req.flight_id, req.seat_number.trim())
        .await
        .map_err(map_error)?;

    Ok(Json(json!({ "success": true })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn valid_flight_request() -> CreateFlightRequest {
        CreateFlightRequest {
            flight_number: "SU-1404".to_string(),
            aircraft_id: 1,
            departure_airport: "SVO".to_string(),
            arrival_airport: "LED".to_string(),
            departure_time: Utc.with_ymd_and_hms(2025, 6, 1, 8, 0, 0).unwrap(),
            arrival_time: Utc.with_ymd_and_hms(2025, 6, 1, 9, 30, 0).unwrap(),
            price_minor_units: 150_00,
        }
    }

    #[test]
    fn create_flight_validation_accepts_valid_request() {
        assert!(validate_create_flight(&valid_flight_request()).is_ok());
    }

    #[test]
    fn create_flight_validation_rejects_same_airports() {
        let mut req = valid_flight_request();
        req.arrival_airport = "SVO".to_string();
        assert_eq!(
            validate_create_flight(&req),
            Err("departure and arrival airports must be different")
        );
    }

    #[test]
    fn create_flight_validation_rejects_inverted_times() {
        let mut req = valid_flight_request();
        req.arrival_time = req.departure_time;
        assert_eq!(
            validate_create_flight(&req),
            Err("arrival time must be after departure time")
        );
    }

    #[test]
    fn create_flight_validation_rejects_non_positive_price() {
        let mut req = valid_flight_request();
        req.price_minor_units = 0;
        assert_eq!(validate_create_flight(&req), Err("price must be positive"));
    }

    #[test]
    fn seat_request_validation() {
        assert!(validate_seat_request(&SeatRequest {
            flight_id: 1,
            seat_number: "12A".to_string()
        })
        .is_ok());
        assert!(validate_seat_request(&SeatRequest {
            flight_id: 0,
            seat_number: "12A".to_string()
        })
        .is_err());
        assert!(validate_seat_request(&SeatRequest {
            flight_id: 1,
            seat_number: "  ".to_string()
        })
        .is_err());
    }

    #[test]
    fn search_validation_requires_passengers() {
        let query = SearchFlightsQuery {
            from: "SVO".to_string(),
            to: "LED".to_string(),
            date: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            passengers: 0,
        };
        assert_eq!(validate_search(&query), Err("passenger count must be positive"));
    }
}
