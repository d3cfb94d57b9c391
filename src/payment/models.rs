use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Статус платежа. PENDING живёт только между созданием строки и
/// ответом "банка"; терминальные статусы не меняются.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PaymentStatus {
    Pending,
    Success,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Success => "SUCCESS",
            PaymentStatus::Failed => "FAILED",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "PENDING" => Some(PaymentStatus::Pending),
            "SUCCESS" => Some(PaymentStatus::Success),
            "FAILED" => Some(PaymentStatus::Failed),
            _ => None,
        }
    }
}

impl sqlx::Type<sqlx::Postgres> for PaymentStatus {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <&str as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <&str as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

impl sqlx::Encode<'_, sqlx::Postgres> for PaymentStatus {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <&str as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.as_str(), buf)
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Postgres> for PaymentStatus {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let raw = <&str as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        PaymentStatus::parse(raw).ok_or_else(|| format!("unknown payment status: {raw}").into())
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Payment {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub user_id: i64,
    pub amount_minor_units: i64,
    pub currency: String,
    pub status: PaymentStatus,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct NewPayment {
    pub booking_id: Uuid,
    pub user_id: i64,
    pub amount_minor_units: i64,
    pub currency: String,
}

/// Платёжный запрос из топика payment_requests.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentRequestDTO {
    pub booking_id: Uuid,
    pub user_id: i64,
    pub amount_minor_units: i64,
    pub currency: String,
}

/// Результат платежа, публикуемый в payment_results.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentResultDTO {
    pub booking_id: Uuid,
    pub payment_id: Uuid,
    pub status: PaymentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub processed_at: DateTime<Utc>,
}

impl PaymentResultDTO {
    pub fn from_payment(payment: &Payment) -> Self {
        PaymentResultDTO {
            booking_id: payment.booking_id,
            payment_id: payment.id,
            status: payment.status,
            error_message: payment.error_message.clone(),
            processed_at: payment.processed_at.unwrap_or_else(Utc::now),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn result_wire_shape_omits_empty_error() {
        let payment = Payment {
            id: Uuid::new_v4(),
            booking_id: Uuid::new_v4(),
            user_id: 1,
            amount_minor_units: 150_00,
            currency: "RUB".to_string(),
            status: PaymentStatus::Success,
            error_message: None,
            created_at: Utc::now(),
            processed_at: Some(Utc::now()),
        };

        let value = serde_json::to_value(PaymentResultDTO::from_payment(&payment)).unwrap();
        assert_eq!(value["status"], "SUCCESS");
        assert_eq!(value["booking_id"], payment.booking_id.to_string());
        assert_eq!(value["payment_id"], payment.id.to_string());
        assert!(value.get("error_message").is_none());
    }

    #[test]
    fn result_wire_shape_carries_error_for_failure() {
        let payment = Payment {
            id: Uuid::new_v4(),
            booking_id: Uuid::new_v4(),
            user_id: 1,
            amount_minor_units: 150_00,
            currency: "RUB".to_string(),
            status: PaymentStatus::Failed,
            error_message: Some("insufficient funds or bank error".to_string()),
            created_at: Utc::now(),
            processed_at: Some(Utc::now()),
        };

        let value = serde_json::to_value(PaymentResultDTO::from_payment(&payment)).unwrap();
        assert_eq!(value["status"], "FAILED");
        assert_eq!(value["error_message"], "insufficient funds or bank error");
    }

    #[test]
    fn request_decodes_from_booking_wire_format() {
        let raw = serde_json::json!({
            "booking_id": Uuid::new_v4(),
            "user_id": 3,
            "amount_minor_units": 99_00,
            "currency": "RUB"
        });

        let request: PaymentRequestDTO = serde_json::from_value(raw).unwrap();
        assert_eq!(request.user_id, 3);
        assert_eq!(request.amount_minor_units, 9900);
    }
}
