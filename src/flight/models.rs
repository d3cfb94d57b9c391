use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const FLIGHT_STATUS_SCHEDULED: &str = "scheduled";

/// Типы событий в flight_outbox.
pub const EVENT_FLIGHT_CREATED: &str = "FLIGHT_CREATED";
pub const EVENT_SEATS_CHANGED: &str = "SEATS_CHANGED";

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Airport {
    pub code: String,
    pub name: String,
    pub city: String,
    pub country: String,
    pub timezone: String,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Aircraft {
    pub id: i64,
    pub model: String,
    pub total_seats: i32,
}

/// Шаблон места самолёта: копируется в конкретные места рейса
/// при создании рейса.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AircraftSeat {
    pub seat_number: String,
    pub seat_class: String,
    pub price_multiplier: f64,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Flight {
    pub id: i64,
    pub flight_number: String,
    pub aircraft_id: i64,
    pub departure_airport: String,
    pub arrival_airport: String,
    pub departure_time: DateTime<Utc>,
    pub arrival_time: DateTime<Utc>,
    pub price_minor_units: i64,
    pub status: String,
    pub created_at: DateTime<Utc>,
    /// Производное поле: COUNT свободных мест.
    pub available_seats: i64,
}

/// Место рейса. `is_booked && reserved_at.is_some()` — резерв, который
/// может снять уборщик; `is_booked && reserved_at.is_none()` —
/// подтверждённое место, уборщик его не трогает.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Seat {
    pub id: i64,
    pub flight_id: i64,
    pub seat_number: String,
    pub seat_class: String,
    pub price_multiplier: f64,
    pub is_booked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reserved_at: Option<DateTime<Utc>>,
}

/// Документ рейса в поисковом индексе.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FlightDocument {
    pub id: i64,
    pub departure_airport: String,
    pub arrival_airport: String,
    pub departure_time: DateTime<Utc>,
    pub price_minor_units: i64,
    pub available_seats: i64,
}

/// Payload события SEATS_CHANGED.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SeatsChangedEvent {
    pub flight_id: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn flight_document_wire_shape() {
        let doc = FlightDocument {
            id: 7,
            departure_airport: "SVO".to_string(),
            arrival_airport: "LED".to_string(),
            departure_time: Utc.with_ymd_and_hms(2025, 6, 1, 10, 30, 0).unwrap(),
            price_minor_units: 15_000_00,
            available_seats: 99,
        };

        let value = serde_json::to_value(&doc).unwrap();
        assert_eq!(value["id"], 7);
        assert_eq!(value["departure_airport"], "SVO");
        assert_eq!(value["arrival_airport"], "LED");
        assert_eq!(value["price_minor_units"], 1_500_000);
        assert_eq!(value["available_seats"], 99);
    }

    #[test]
    fn seats_changed_round_trip() {
        let raw = serde_json::json!({"flight_id": 42});
        let event: SeatsChangedEvent = serde_json::from_value(raw).unwrap();
        assert_eq!(event, SeatsChangedEvent { flight_id: 42 });
    }
}
