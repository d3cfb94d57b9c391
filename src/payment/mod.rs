//! Платёжный сервис: симулятор банка. Потребляет платёжные запросы,
//! идемпотентно заводит платёж по booking_id и публикует результат.

pub mod models;
pub mod repo;
pub mod service;
pub mod worker;
