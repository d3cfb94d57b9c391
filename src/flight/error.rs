use thiserror::Error;

#[derive(Debug, Error)]
pub enum FlightError {
    #[error("flight not found")]
    FlightNotFound,

    #[error("flight already exists")]
    FlightAlreadyExists,

    #[error("seat not found")]
    SeatNotFound,

    #[error("seat already booked")]
    SeatAlreadyBooked,

    #[error("aircraft not found")]
    AircraftNotFound,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("event serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("search index error: {0}")]
    Search(String),
}
