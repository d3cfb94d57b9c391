//! repo.rs
//!
//! Доступ к схеме сервиса рейсов. Все мутации мест идут через
//! транзакции с блокировкой строки (`SELECT ... FOR UPDATE`): два
//! конкурентных резерва одного места сериализуются, проигравший видит
//! `is_booked = true`. Каждая мутация, меняющая доступность мест,
//! добавляет событие SEATS_CHANGED в outbox той же транзакцией.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::flight::error::FlightError;
use crate::flight::models::{
    Aircraft, AircraftSeat, Airport, Flight, FlightDocument, Seat, SeatsChangedEvent,
    EVENT_FLIGHT_CREATED, EVENT_SEATS_CHANGED, FLIGHT_STATUS_SCHEDULED,
};

#[derive(Debug, Clone)]
pub struct NewFlight {
    pub flight_number: String,
    pub aircraft_id: i64,
    pub departure_airport: String,
    pub arrival_airport: String,
    pub departure_time: DateTime<Utc>,
    pub arrival_time: DateTime<Utc>,
    pub price_minor_units: i64,
}

#[derive(Clone)]
pub struct FlightRepo {
    pool: PgPool,
}

impl FlightRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Создаёт рейс и копирует шаблон мест самолёта в места рейса одной
    /// транзакцией. Туда же пишется событие FLIGHT_CREATED для индекса.
    pub async fn create_flight(&self, f: &NewFlight) -> Result<i64, FlightError> {
        let mut tx = self.pool.begin().await?;

        let template_seats: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM aircraft_seats WHERE aircraft_id = $1",
        )
        .bind(f.aircraft_id)
        .fetch_one(&mut *tx)
        .await?;

        let aircraft_exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM aircrafts WHERE id = $1)")
                .bind(f.aircraft_id)
                .fetch_one(&mut *tx)
                .await?;
        if !aircraft_exists {
            return Err(FlightError::AircraftNotFound);
        }

        let flight_id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO flights (flight_number, aircraft_id, departure_airport, arrival_airport,
                                 departure_time, arrival_time, price_minor_units, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id
            "#,
        )
        .bind(&f.flight_number)
        .bind(f.aircraft_id)
        .bind(&f.departure_airport)
        .bind(&f.arrival_airport)
        .bind(f.departure_time)
        .bind(f.arrival_time)
        .bind(f.price_minor_units)
        .bind(FLIGHT_STATUS_SCHEDULED)
        .fetch_one(&mut *tx)
        .await
        .map_err(|err| match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                FlightError::FlightAlreadyExists
            }
            _ => FlightError::Database(err),
        })?;

        sqlx::query(
            r#"
            INSERT INTO seats (flight_id, seat_number, seat_class, price_multiplier)
            SELECT $1, seat_number, seat_class, price_multiplier
            FROM aircraft_seats
            WHERE aircraft_id = $2
            "#,
        )
        .bind(flight_id)
        .bind(f.aircraft_id)
        .execute(&mut *tx)
        .await?;

        let document = FlightDocument {
            id: flight_id,
            departure_airport: f.departure_airport.clone(),
            arrival_airport: f.arrival_airport.clone(),
            departure_time: f.departure_time,
            price_minor_units: f.price_minor_units,
            available_seats: template_seats,
        };
        append_outbox_event(
            &mut *tx,
            EVENT_FLIGHT_CREATED,
            serde_json::to_value(&document)?,
        )
        .await?;

        tx.commit().await?;
        Ok(flight_id)
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Flight, FlightError> {
        let flight: Option<Flight> = sqlx::query_as(
            r#"
            SELECT f.*, COUNT(s.id) FILTER (WHERE s.is_booked = FALSE) AS available_seats
            FROM flights f
            LEFT JOIN seats s ON s.flight_id = f.id
            WHERE f.id = $1
            GROUP BY f.id
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        flight.ok_or(FlightError::FlightNotFound)
    }

    pub async fn get_seats(&self, flight_id: i64) -> Result<Vec<Seat>, FlightError> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM flights WHERE id = $1)")
            .bind(flight_id)
            .fetch_one(&self.pool)
            .await?;
        if !exists {
            return Err(FlightError::FlightNotFound);
        }

        let seats = sqlx::query_as(
            "SELECT * FROM seats WHERE flight_id = $1 ORDER BY seat_number",
        )
        .bind(flight_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(seats)
    }

    pub async fn list_airports(&self) -> Result<Vec<Airport>, FlightError> {
        let airports = sqlx::query_as("SELECT * FROM airports ORDER BY city")
            .fetch_all(&self.pool)
            .await?;
        Ok(airports)
    }

    /// Резервирует место. Блокировка строки сериализует конкурентные
    /// вызовы: ровно один выигрывает, остальные получают
    /// `SeatAlreadyBooked`.
    pub async fn reserve_seat(
        &self,
        flight_id: i64,
        seat_number: &str,
    ) -> Result<i64, FlightError> {
        let mut tx = self.pool.begin().await?;

        let seat: Option<(i64, bool)> = sqlx::query_as(
            "SELECT id, is_booked FROM seats WHERE flight_id = $1 AND seat_number = $2 FOR UPDATE",
        )
        .bind(flight_id)
        .bind(seat_number)
        .fetch_optional(&mut *tx)
        .await?;

        let (seat_id, is_booked) = seat.ok_or(FlightError::SeatNotFound)?;
        if is_booked {
            return Err(FlightError::SeatAlreadyBooked);
        }

        sqlx::query("UPDATE seats SET is_booked = TRUE, reserved_at = NOW() WHERE id = $1")
            .bind(seat_id)
            .execute(&mut *tx)
            .await?;

        append_seats_changed(&mut *tx, flight_id).await?;

        tx.commit().await?;
        Ok(seat_id)
    }

    /// Освобождает место. Ноль затронутых строк (места нет или оно уже
    /// свободно) трактуется как `SeatNotFound`; компенсационные вызовы
    /// обязаны это терпеть.
    pub async fn release_seat(
        &self,
        flight_id: i64,
        seat_number: &str,
    ) -> Result<(), FlightError> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            r#"
            UPDATE seats
            SET is_booked = FALSE, reserved_at = NULL
            WHERE flight_id = $1 AND seat_number = $2 AND is_booked = TRUE
            "#,
        )
        .bind(flight_id)
        .bind(seat_number)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(FlightError::SeatNotFound);
        }

        append_seats_changed(&mut *tx, flight_id).await?;

        tx.commit().await?;
        Ok(())
    }

    /// Подтверждает место: `reserved_at` очищается, `is_booked`
    /// остаётся. После этого уборщик не может снять резерв — его
    /// предикат требует непустой `reserved_at`.
    pub async fn confirm_seat(
        &self,
        flight_id: i64,
        seat_number: &str,
    ) -> Result<(), FlightError> {
        let updated = sqlx::query(
            r#"
            UPDATE seats
            SET reserved_at = NULL
            WHERE flight_id = $1 AND seat_number = $2 AND is_booked = TRUE
            "#,
        )
        .bind(flight_id)
        .bind(seat_number)
        .execute(&self.pool)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(FlightError::SeatNotFound);
        }

        Ok(())
    }
}

#[derive(Clone)]
pub struct AircraftRepo {
    pool: PgPool,
}

impl AircraftRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create_aircraft(
        &self,
        model: &str,
        total_seats: i32,
    ) -> Result<i64, FlightError> {
        let id = sqlx::query_scalar(
            "INSERT INTO aircrafts (model, total_seats) VALUES ($1, $2) RETURNING id",
        )
        .bind(model)
        .bind(total_seats)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    pub async fn list_aircrafts(&self) -> Result<Vec<Aircraft>, FlightError> {
        let list = sqlx::query_as("SELECT * FROM aircrafts ORDER BY model")
            .fetch_all(&self.pool)
            .await?;
        Ok(list)
    }

    /// Добавляет или обновляет шаблон мест самолёта.
    pub async fn add_seats(
        &self,
        aircraft_id: i64,
        seats: &[AircraftSeat],
    ) -> Result<(), FlightError> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM aircrafts WHERE id = $1)")
                .bind(aircraft_id)
                .fetch_one(&self.pool)
                .await?;
        if !exists {
            return Err(FlightError::AircraftNotFound);
        }

        let mut tx = self.pool.begin().await?;
        for seat in seats {
            sqlx::query(
                r#"
                INSERT INTO aircraft_seats (aircraft_id, seat_number, seat_class, price_multiplier)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (aircraft_id, seat_number) DO UPDATE
                SET seat_class = EXCLUDED.seat_class, price_multiplier = EXCLUDED.price_multiplier
                "#,
            )
            .bind(aircraft_id)
            .bind(&seat.seat_number)
            .bind(&seat.seat_class)
            .bind(seat.price_multiplier)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        Ok(())
    }
}

/// Пишет событие SEATS_CHANGED в outbox внутри уже открытой транзакции.
pub(crate) async fn append_seats_changed(
    conn: &mut PgConnection,
    flight_id: i64,
) -> Result<(), FlightError> {
    append_outbox_event(
        conn,
        EVENT_SEATS_CHANGED,
        serde_json::to_value(SeatsChangedEvent { flight_id })?,
    )
    .await
}

pub(crate) async fn append_outbox_event(
    conn: &mut PgConnection,
    event_type: &str,
    payload: serde_json::Value,
) -> Result<(), FlightError> {
    sqlx::query("INSERT INTO flight_outbox (id, event_type, payload) VALUES ($1, $2, $3)")
        .bind(Uuid::new_v4())
        .bind(event_type)
        .bind(payload)
        .execute(conn)
        .await?;
    Ok(())
}
