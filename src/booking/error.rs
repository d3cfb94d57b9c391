use thiserror::Error;

#[derive(Debug, Error)]
pub enum BookingError {
    #[error("booking not found")]
    BookingNotFound,

    #[error("cannot cancel terminal booking")]
    CannotCancelTerminal,

    #[error("seat not found")]
    SeatNotFound,

    #[error("seat already booked")]
    SeatAlreadyBooked,

    #[error("flight service unavailable: {0}")]
    FlightService(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("event serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
