//! service.rs
//!
//! Оркестратор саги бронирования.
//!
//! Порядок шагов CreateBooking принципиален: сначала резерв места по
//! RPC (не плодим бронирования, которые нечем исполнить), затем одной
//! локальной транзакцией строка бронирования и outbox-событие платежа.
//! Компенсация — освобождение места; если и она падает, последним
//! рубежом остаётся уборщик резервов в сервисе рейсов.

use chrono::Utc;
use std::time::Duration;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::booking::error::BookingError;
use crate::booking::flight_client::{SeatClient, SeatClientError};
use crate::booking::models::{
    Booking, BookingStatus, NewBooking, PaymentResultDTO, PAYMENT_RESULT_FAILED,
    PAYMENT_RESULT_SUCCESS,
};
use crate::booking::repo::BookingStore;

pub struct BookingService<R, C> {
    repo: R,
    seats: C,
}

impl<R: BookingStore, C: SeatClient> BookingService<R, C> {
    pub fn new(repo: R, seats: C) -> Self {
        Self { repo, seats }
    }

    /// Создаёт бронирование. Оплата идёт асинхронно: outbox-релей
    /// опубликует платёжный запрос после коммита.
    pub async fn create_booking(&self, new_booking: NewBooking) -> Result<Booking, BookingError> {
        self.seats
            .reserve_seat(new_booking.flight_id, &new_booking.seat_number)
            .await
            .map_err(map_seat_error)?;

        let flight_id = new_booking.flight_id;
        let seat_number = new_booking.seat_number.clone();

        match self.repo.create_with_payment_request(new_booking).await {
            Ok(booking) => {
                info!(booking_id = %booking.id, "booking created");
                Ok(booking)
            }
            Err(err) => {
                // Локальная транзакция не прошла — возвращаем место.
                error!("failed to persist booking, compensating: {err}");
                if let Err(release_err) = self.seats.release_seat(flight_id, &seat_number).await {
                    warn!("compensation failed, seat sweeper is the backstop: {release_err}");
                }
                Err(err)
            }
        }
    }

    pub async fn get_booking(&self, id: Uuid) -> Result<Booking, BookingError> {
        self.repo.get(id).await
    }

    pub async fn list_bookings(&self, user_id: i64) -> Result<Vec<Booking>, BookingError> {
        self.repo.list_by_user(user_id).await
    }

    /// Отмена пользователем. Переход защищён предикатом PENDING, так
    /// что гонка с результатом платежа деградирует в отказ отмены.
    pub async fn cancel_booking(&self, id: Uuid) -> Result<(), BookingError> {
        let booking = self.repo.get(id).await?;
        if booking.status.is_terminal() {
            return Err(BookingError::CannotCancelTerminal);
        }

        let cancelled = self.repo.transition(id, BookingStatus::Cancelled).await?;
        if !cancelled {
            return Err(BookingError::CannotCancelTerminal);
        }

        if let Err(err) = self
            .seats
            .release_seat(booking.flight_id, &booking.seat_number)
            .await
        {
            warn!(booking_id = %id, "seat release after cancel failed: {err}");
        }

        info!(booking_id = %id, "booking cancelled");
        Ok(())
    }

    /// Применяет результат платежа. Ошибка означает «не коммитить
    /// оффсет»; все бизнес-развилки (сирота, дубликат, незнакомый
    /// статус) завершаются Ok и подтверждают сообщение.
    pub async fn handle_payment_result(
        &self,
        result: PaymentResultDTO,
    ) -> Result<(), BookingError> {
        let booking = match self.repo.get(result.booking_id).await {
            Ok(booking) => booking,
            Err(BookingError::BookingNotFound) => {
                info!(booking_id = %result.booking_id, "payment result for unknown booking, skipping");
                return Ok(());
            }
            Err(err) => return Err(err),
        };

        if booking.status.is_terminal() {
            return Ok(());
        }

        match result.status.as_str() {
            PAYMENT_RESULT_SUCCESS => {
                let paid = self
                    .repo
                    .transition(result.booking_id, BookingStatus::Paid)
                    .await?;
                if !paid {
                    return Ok(());
                }

                if let Err(err) = self
                    .seats
                    .confirm_seat(booking.flight_id, &booking.seat_number)
                    .await
                {
                    // Бронирование уже PAID, а reserved_at осталось:
                    // резерв может снять уборщик. Известная инверсия.
                    error!(booking_id = %result.booking_id, "seat confirmation after payment failed: {err}");
                } else {
                    info!(booking_id = %result.booking_id, "booking paid and seat confirmed");
                }
            }
            PAYMENT_RESULT_FAILED => {
                let failed = self
                    .repo
                    .transition(result.booking_id, BookingStatus::Failed)
                    .await?;
                if !failed {
                    return Ok(());
                }

                info!(booking_id = %result.booking_id, "payment failed, compensating");
                if let Err(err) = self
                    .seats
                    .release_seat(booking.flight_id, &booking.seat_number)
                    .await
                {
                    warn!(booking_id = %result.booking_id, "compensation failed: {err}");
                }
            }
            other => {
                warn!(booking_id = %result.booking_id, "unexpected payment status '{other}', skipping");
            }
        }

        Ok(())
    }

    /// Переводит зависшие PENDING-бронирования в TIMEOUT и освобождает
    /// их места. Возвращает число затронутых бронирований.
    pub async fn expire_stale(&self, booking_ttl: Duration) -> Result<usize, BookingError> {
        let cutoff = Utc::now() - chrono::Duration::seconds(booking_ttl.as_secs() as i64);
        let expired = self.repo.find_expired(cutoff).await?;

        let mut timed_out = 0;
        for booking in expired {
            let transitioned = match self.repo.transition(booking.id, BookingStatus::Timeout).await
            {
                Ok(changed) => changed,
                Err(err) => {
                    error!(booking_id = %booking.id, "failed to time out booking: {err}");
                    continue;
                }
            };
            if !transitioned {
                continue;
            }
            timed_out += 1;

            if let Err(err) = self
                .seats
                .release_seat(booking.flight_id, &booking.seat_number)
                .await
            {
                warn!(booking_id = %booking.id, "failed to release seat of expired booking: {err}");
            } else {
                info!(booking_id = %booking.id, "booking expired and seat released");
            }
        }

        Ok(timed_out)
    }
}

fn map_seat_error(err: SeatClientError) -> BookingError {
    match err {
        SeatClientError::SeatNotFound => BookingError::SeatNotFound,
        SeatClientError::SeatAlreadyBooked => BookingError::SeatAlreadyBooked,
        SeatClientError::Transport(reason) => BookingError::FlightService(reason),
    }
}
