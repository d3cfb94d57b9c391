use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const DEFAULT_CURRENCY: &str = "RUB";

/// Тип события в booking_outbox.
pub const EVENT_PAYMENT_REQUEST: &str = "PAYMENT_REQUEST";

/// Статус бронирования. PENDING — единственный нетерминальный статус;
/// выход из терминального статуса запрещён.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BookingStatus {
    Pending,
    Paid,
    Cancelled,
    Failed,
    Timeout,
}

impl BookingStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, BookingStatus::Pending)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "PENDING",
            BookingStatus::Paid => "PAID",
            BookingStatus::Cancelled => "CANCELLED",
            BookingStatus::Failed => "FAILED",
            BookingStatus::Timeout => "TIMEOUT",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "PENDING" => Some(BookingStatus::Pending),
            "PAID" => Some(BookingStatus::Paid),
            "CANCELLED" => Some(BookingStatus::Cancelled),
            "FAILED" => Some(BookingStatus::Failed),
            "TIMEOUT" => Some(BookingStatus::Timeout),
            _ => None,
        }
    }
}

// Статус хранится в БД как TEXT.
impl sqlx::Type<sqlx::Postgres> for BookingStatus {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <&str as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <&str as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

impl sqlx::Encode<'_, sqlx::Postgres> for BookingStatus {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <&str as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.as_str(), buf)
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Postgres> for BookingStatus {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let raw = <&str as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        BookingStatus::parse(raw).ok_or_else(|| format!("unknown booking status: {raw}").into())
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Booking {
    pub id: Uuid,
    pub user_id: i64,
    pub flight_id: i64,
    pub seat_number: String,
    pub passenger_name: String,
    pub passenger_passport: String,
    pub price_minor_units: i64,
    pub currency: String,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewBooking {
    pub user_id: i64,
    pub flight_id: i64,
    pub seat_number: String,
    pub passenger_name: String,
    pub passenger_passport: String,
    pub price_minor_units: i64,
    pub currency: String,
}

/// Payload события PAYMENT_REQUEST; уходит в топик payment_requests
/// без изменений.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentRequestEvent {
    pub booking_id: Uuid,
    pub user_id: i64,
    pub amount_minor_units: i64,
    pub currency: String,
}

/// Результат платежа из топика payment_results. Статус намеренно
/// строка: незнакомое значение не должно превращать сообщение в яд.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentResultDTO {
    pub booking_id: Uuid,
    pub payment_id: Uuid,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub processed_at: DateTime<Utc>,
}

pub const PAYMENT_RESULT_SUCCESS: &str = "SUCCESS";
pub const PAYMENT_RESULT_FAILED: &str = "FAILED";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_is_the_only_non_terminal_status() {
        assert!(!BookingStatus::Pending.is_terminal());
        for status in [
            BookingStatus::Paid,
            BookingStatus::Cancelled,
            BookingStatus::Failed,
            BookingStatus::Timeout,
        ] {
            assert!(status.is_terminal(), "{status:?} must be terminal");
        }
    }

    #[test]
    fn status_round_trips_through_text() {
        for status in [
            BookingStatus::Pending,
            BookingStatus::Paid,
            BookingStatus::Cancelled,
            BookingStatus::Failed,
            BookingStatus::Timeout,
        ] {
            assert_eq!(BookingStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(BookingStatus::parse("EXPIRED"), None);
    }

    #[test]
    fn payment_request_wire_shape() {
        let booking_id = Uuid::new_v4();
        let event = PaymentRequestEvent {
            booking_id,
            user_id: 13,
            amount_minor_units: 150_00,
            currency: "RUB".to_string(),
        };

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["booking_id"], booking_id.to_string());
        assert_eq!(value["user_id"], 13);
        assert_eq!(value["amount_minor_units"], 15000);
        assert_eq!(value["currency"], "RUB");
    }

    proptest::proptest! {
        #[test]
        fn status_parse_accepts_only_known_values(raw in "\\PC*") {
            let parsed = BookingStatus::parse(&raw);
            match parsed {
                Some(status) => proptest::prop_assert_eq!(status.as_str(), raw),
                None => proptest::prop_assert!(
                    !["PENDING", "PAID", "CANCELLED", "FAILED", "TIMEOUT"].contains(&raw.as_str())
                ),
            }
        }
    }

    #[test]
    fn payment_result_tolerates_missing_error_message() {
        let raw = serde_json::json!({
            "booking_id": Uuid::new_v4(),
            "payment_id": Uuid::new_v4(),
            "status": "SUCCESS",
            "processed_at": "2025-06-01T10:00:00Z"
        });

        let result: PaymentResultDTO = serde_json::from_value(raw).unwrap();
        assert_eq!(result.status, PAYMENT_RESULT_SUCCESS);
        assert!(result.error_message.is_none());
    }
}
