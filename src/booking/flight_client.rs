//! flight_client.rs
//!
//! Клиент API сервиса рейсов. Оркестратор саги зависит от узкого
//! трейта `SeatClient`, а не от конкретного HTTP-клиента.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SeatClientError {
    #[error("seat not found")]
    SeatNotFound,

    #[error("seat already booked")]
    SeatAlreadyBooked,

    #[error("flight service transport error: {0}")]
    Transport(String),
}

#[async_trait]
pub trait SeatClient: Send + Sync {
    async fn reserve_seat(&self, flight_id: i64, seat_number: &str)
        -> Result<i64, SeatClientError>;

    async fn release_seat(&self, flight_id: i64, seat_number: &str)
        -> Result<(), SeatClientError>;

    async fn confirm_seat(&self, flight_id: i64, seat_number: &str)
        -> Result<(), SeatClientError>;
}

#[derive(Clone)]
pub struct FlightClient {
    base_url: String,
    http_client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct ReserveSeatResponse {
    seat_id: i64,
}

impl FlightClient {
    /// `timeout` — дедлайн одного вызова; по умолчанию сервисы ставят 5s.
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http_client: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .expect("Failed to create HTTP client"),
        }
    }

    async fn post_seat_call(
        &self,
        action: &str,
        flight_id: i64,
        seat_number: &str,
    ) -> Result<reqwest::Response, SeatClientError> {
        let response = self
            .http_client
            .post(format!("{}/api/seats/{}", self.base_url, action))
            .json(&json!({ "flight_id": flight_id, "seat_number": seat_number }))
            .send()
            .await
            .map_err(|e| SeatClientError::Transport(e.to_string()))?;

        match response.status() {
            status if status.is_success() => Ok(response),
            reqwest::StatusCode::NOT_FOUND => Err(SeatClientError::SeatNotFound),
            reqwest::StatusCode::CONFLICT => Err(SeatClientError::SeatAlreadyBooked),
            status => Err(SeatClientError::Transport(format!(
                "unexpected status {status}"
            ))),
        }
    }
}

#[async_trait]
impl SeatClient for FlightClient {
    async fn reserve_seat(
        &self,
        flight_id: i64,
        seat_number: &str,
    ) -> Result<i64, SeatClientError> {
        let response = self.post_seat_call("reserve", flight_id, seat_number).await?;
        let parsed: ReserveSeatResponse = response
            .json()
            .await
            .map_err(|e| SeatClientError::Transport(e.to_string()))?;
        Ok(parsed.seat_id)
    }

    async fn release_seat(
        &self,
        flight_id: i64,
        seat_number: &str,
    ) -> Result<(), SeatClientError> {
        self.post_seat_call("release", flight_id, seat_number)
            .await
            .map(|_| ())
    }

    async fn confirm_seat(
        &self,
        flight_id: i64,
        seat_number: &str,
    ) -> Result<(), SeatClientError> {
        self.post_seat_call("confirm", flight_id, seat_number)
            .await
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn reserve_returns_seat_id() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/seats/reserve"))
            .and(body_json(json!({"flight_id": 1, "seat_number": "12A"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"seat_id": 77})))
            .expect(1)
            .mount(&server)
            .await;

        let client = FlightClient::new(&server.uri(), Duration::from_secs(5));
        let seat_id = client.reserve_seat(1, "12A").await.unwrap();
        assert_eq!(seat_id, 77);
    }

    #[tokio::test]
    async fn conflict_maps_to_already_booked() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/seats/reserve"))
            .respond_with(ResponseTemplate::new(409))
            .mount(&server)
            .await;

        let client = FlightClient::new(&server.uri(), Duration::from_secs(5));
        let err = client.reserve_seat(1, "12A").await.unwrap_err();
        assert!(matches!(err, SeatClientError::SeatAlreadyBooked));
    }

    #[tokio::test]
    async fn not_found_maps_to_seat_not_found() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/seats/release"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = FlightClient::new(&server.uri(), Duration::from_secs(5));
        let err = client.release_seat(1, "12A").await.unwrap_err();
        assert!(matches!(err, SeatClientError::SeatNotFound));
    }

    #[tokio::test]
    async fn server_error_is_transport() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/seats/confirm"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = FlightClient::new(&server.uri(), Duration::from_secs(5));
        let err = client.confirm_seat(1, "12A").await.unwrap_err();
        assert!(matches!(err, SeatClientError::Transport(_)));
    }
}
