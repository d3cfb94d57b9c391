use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;

#[derive(Clone)]
pub struct Database {
    pub pool: PgPool,
}

impl Database {
    /// Открывает пул соединений к Postgres. Размеры пула совпадают для
    /// всех трёх сервисов: до 10 открытых соединений, 5 простаивающих.
    pub async fn connect(database_url: &str) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .min_connections(5)
            .acquire_timeout(Duration::from_secs(5))
            .idle_timeout(Duration::from_secs(300))
            .connect(database_url)
            .await?;

        Ok(Database { pool })
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}
