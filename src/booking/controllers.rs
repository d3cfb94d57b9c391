//! controllers.rs
//!
//! HTTP API сервиса бронирований: создание, чтение, список и отмена.
//! Оплата в ответ не попадает — она идёт асинхронно через outbox.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::booking::error::BookingError;
use crate::booking::models::{NewBooking, DEFAULT_CURRENCY};
use crate::booking::SharedState;

pub fn routes() -> Router<SharedState> {
    Router::new()
        .route("/bookings", post(create_booking).get(list_bookings))
        .route("/bookings/{id}", get(get_booking))
        .route("/bookings/{id}/cancel", post(cancel_booking))
}

fn map_error(err: BookingError) -> (StatusCode, String) {
    match err {
        BookingError::BookingNotFound | BookingError::SeatNotFound => {
            (StatusCode::NOT_FOUND, err.to_string())
        }
        BookingError::SeatAlreadyBooked | BookingError::CannotCancelTerminal => {
            (StatusCode::CONFLICT, err.to_string())
        }
        BookingError::FlightService(_)
        | BookingError::Database(_)
        | BookingError::Serialization(_) => {
            tracing::error!("internal error: {err}");
            (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string())
        }
    }
}

fn bad_request(message: &str) -> (StatusCode, String) {
    (StatusCode::BAD_REQUEST, message.to_string())
}

#[derive(Debug, Deserialize)]
pub struct CreateBookingRequest {
    pub user_id: i64,
    pub flight_id: i64,
    pub seat_number: String,
    pub passenger_name: String,
    pub passenger_passport: String,
    pub price_minor_units: i64,
    #[serde(default)]
    pub currency: Option<String>,
}

pub(crate) fn validate_create_booking(req: &CreateBookingRequest) -> Result<(), &'static str> {
    if req.user_id <= 0 {
        return Err("user id is required");
    }
    if req.flight_id <= 0 {
        return Err("flight id is required");
    }
    if req.seat_number.trim().is_empty() {
        return Err("seat number is required");
    }
    if req.passenger_name.trim().is_empty() {
        return Err("passenger name is required");
    }
    if req.passenger_passport.trim().is_empty() {
        return Err("passenger passport is required");
    }
    if req.price_minor_units <= 0 {
        return Err("price must be positive");
    }
    Ok(())
}

/// POST /api/bookings
async fn create_booking(
    State(state): State<SharedState>,
    Json(req): Json<CreateBookingRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    validate_create_booking(&req).map_err(bad_request)?;

    let currency = req
        .currency
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .unwrap_or(DEFAULT_CURRENCY)
        .to_string();

    let booking = state
        .service
        .create_booking(NewBooking {
            user_id: req.user_id,
            flight_id: req.flight_id,
            seat_number: req.seat_number.trim().to_string(),
            passenger_name: req.passenger_name.trim().to_string(),
            passenger_passport: req.passenger_passport.trim().to_string(),
            price_minor_units: req.price_minor_units,
            currency,
        })
        .await
        .map_err(map_error)?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "booking_id": booking.id })),
    ))
}

/// GET /api/bookings/{id}
async fn get_booking(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let booking = state.service.get_booking(id).await.map_err(map_error)?;
    Ok(Json(booking))
}

#[derive(Debug, Deserialize)]
struct ListBookingsQuery {
    user_id: i64,
}

/// GET /api/bookings?user_id=1
async fn list_bookings(
    State(state): State<SharedState>,
    Query(query): Query<ListBookingsQuery>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    if query.user_id <= 0 {
        return Err(bad_request("user id is required"));
    }

    let bookings = state
        .service
        .list_bookings(query.user_id)
        .await
        .map_err(map_error)?;
    Ok(Json(bookings))
}

/// POST /api/bookings/{id}/cancel
async fn cancel_booking(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    state.service.cancel_booking(id).await.map_err(map_error)?;
    Ok(Json(json!({ "success": true })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_request() -> CreateBookingRequest {
        CreateBookingRequest {
            user_id: 1,
            flight_id: 10,
            seat_number: "12A".to_string(),
            passenger_name: "Ivan Petrov".to_string(),
            passenger_passport: "4509 123456".to_string(),
            price_minor_units: 150_00,
            currency: None,
        }
    }

    #[test]
    fn validation_accepts_valid_request() {
        assert!(validate_create_booking(&valid_request()).is_ok());
    }

    #[test]
    fn validation_rejects_blank_seat() {
        let mut req = valid_request();
        req.seat_number = "   ".to_string();
        assert_eq!(validate_create_booking(&req), Err("seat number is required"));
    }

    #[test]
    fn validation_rejects_non_positive_price() {
        let mut req = valid_request();
        req.price_minor_units = -5;
        assert_eq!(validate_create_booking(&req), Err("price must be positive"));
    }

    #[test]
    fn validation_rejects_missing_passenger() {
        let mut req = valid_request();
        req.passenger_name = String::new();
        assert_eq!(
            validate_create_booking(&req),
            Err("passenger name is required")
        );
    }
}
