pub mod config;
pub mod database;
pub mod kafka;
pub mod shutdown;

// Три сервиса системы бронирования: инвентарь мест, сага бронирования,
// симулятор банка. У каждого своя схема БД и свой бинарник в src/bin.
pub mod booking;
pub mod flight;
pub mod payment;
