//! config.rs
//!
//! Конфигурация сервисов. Каждый сервис читает свой набор переменных
//! окружения; никакого другого источника конфигурации нет.

use std::env;
use std::time::Duration;

/// Конфигурация сервиса рейсов.
#[derive(Debug, Clone)]
pub struct FlightConfig {
    pub http_port: u16,
    pub database_url: String,
    pub search_url: String,
    pub rust_log: String,
    /// Период опроса outbox-таблицы релеем поискового индекса.
    pub outbox_interval: Duration,
    pub outbox_batch_size: i64,
    /// Период запуска уборщика просроченных резервов мест.
    pub sweep_interval: Duration,
    /// TTL резерва места: позже этого момента резерв снимается.
    pub reservation_ttl: Duration,
}

impl FlightConfig {
    pub fn from_env() -> Self {
        FlightConfig {
            http_port: env_parse("FLIGHT_HTTP_PORT", 8081),
            database_url: env::var("FLIGHT_DATABASE_URL")
                .expect("FLIGHT_DATABASE_URL must be set"),
            search_url: env::var("SEARCH_INDEX_URL")
                .unwrap_or_else(|_| "http://localhost:9200".to_string()),
            rust_log: env_rust_log(),
            outbox_interval: Duration::from_secs(env_parse("FLIGHT_OUTBOX_INTERVAL_SECS", 1)),
            outbox_batch_size: env_parse("FLIGHT_OUTBOX_BATCH_SIZE", 50),
            sweep_interval: Duration::from_secs(env_parse("SEAT_SWEEP_INTERVAL_SECS", 60)),
            reservation_ttl: Duration::from_secs(env_parse("SEAT_RESERVATION_TTL_SECS", 900)),
        }
    }
}

/// Конфигурация сервиса бронирований.
#[derive(Debug, Clone)]
pub struct BookingConfig {
    pub http_port: u16,
    pub database_url: String,
    pub kafka: KafkaConfig,
    /// Базовый URL API сервиса рейсов.
    pub flight_service_url: String,
    /// Таймаут одного вызова к сервису рейсов.
    pub flight_client_timeout: Duration,
    pub rust_log: String,
    pub outbox_interval: Duration,
    pub outbox_batch_size: i64,
    /// Период запуска уборщика зависших бронирований.
    pub cleaner_interval: Duration,
    /// TTL бронирования в статусе PENDING.
    pub booking_ttl: Duration,
}

impl BookingConfig {
    pub fn from_env() -> Self {
        BookingConfig {
            http_port: env_parse("BOOKING_HTTP_PORT", 8082),
            database_url: env::var("BOOKING_DATABASE_URL")
                .expect("BOOKING_DATABASE_URL must be set"),
            kafka: KafkaConfig::from_env("booking_service_group"),
            flight_service_url: env::var("FLIGHT_SERVICE_URL")
                .unwrap_or_else(|_| "http://localhost:8081".to_string()),
            flight_client_timeout: Duration::from_secs(env_parse("FLIGHT_CLIENT_TIMEOUT_SECS", 5)),
            rust_log: env_rust_log(),
            outbox_interval: Duration::from_secs(env_parse("BOOKING_OUTBOX_INTERVAL_SECS", 2)),
            outbox_batch_size: env_parse("BOOKING_OUTBOX_BATCH_SIZE", 10),
            cleaner_interval: Duration::from_secs(env_parse("BOOKING_CLEANER_INTERVAL_SECS", 60)),
            booking_ttl: Duration::from_secs(env_parse("BOOKING_TTL_SECS", 900)),
        }
    }
}

/// Конфигурация платёжного сервиса.
#[derive(Debug, Clone)]
pub struct PaymentConfig {
    pub database_url: String,
    pub kafka: KafkaConfig,
    pub rust_log: String,
    /// Вероятность успешного ответа "банка", в процентах.
    pub bank_success_chance: u32,
    pub bank_min_delay_ms: u64,
    pub bank_max_delay_ms: u64,
}

impl PaymentConfig {
    pub fn from_env() -> Self {
        PaymentConfig {
            database_url: env::var("PAYMENT_DATABASE_URL")
                .expect("PAYMENT_DATABASE_URL must be set"),
            kafka: KafkaConfig::from_env("payment_service_group"),
            rust_log: env_rust_log(),
            bank_success_chance: env_parse("BANK_SUCCESS_CHANCE", 80),
            bank_min_delay_ms: env_parse("BANK_MIN_DELAY_MS", 500),
            bank_max_delay_ms: env_parse("BANK_MAX_DELAY_MS", 2000),
        }
    }
}

/// Общие настройки Kafka: брокеры, топики и группа консьюмера.
#[derive(Debug, Clone)]
pub struct KafkaConfig {
    pub brokers: String,
    pub topic_payment_requests: String,
    pub topic_payment_results: String,
    pub group_id: String,
}

impl KafkaConfig {
    fn from_env(default_group: &str) -> Self {
        KafkaConfig {
            brokers: env::var("KAFKA_BROKERS").unwrap_or_else(|_| "localhost:9092".to_string()),
            topic_payment_requests: env::var("KAFKA_TOPIC_PAYMENT_REQUESTS")
                .unwrap_or_else(|_| "payment_requests".to_string()),
            topic_payment_results: env::var("KAFKA_TOPIC_PAYMENT_RESULTS")
                .unwrap_or_else(|_| "payment_results".to_string()),
            group_id: env::var("KAFKA_GROUP_ID").unwrap_or_else(|_| default_group.to_string()),
        }
    }
}

fn env_rust_log() -> String {
    env::var("RUST_LOG").unwrap_or_else(|_| "flight_system=debug,tower_http=info".to_string())
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(raw) => raw
            .parse()
            .unwrap_or_else(|_| panic!("{} must be a valid number", name)),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_parse_falls_back_to_default() {
        assert_eq!(env_parse("FLIGHT_SYSTEM_TEST_UNSET_VAR", 42u64), 42);
    }

    #[test]
    fn env_parse_reads_value() {
        env::set_var("FLIGHT_SYSTEM_TEST_SET_VAR", "7");
        assert_eq!(env_parse("FLIGHT_SYSTEM_TEST_SET_VAR", 42u64), 7);
        env::remove_var("FLIGHT_SYSTEM_TEST_SET_VAR");
    }
}
