//! PostgreSQL backend for deployments that share one database between
//! several receivers.
//!
//! Requires the `postgres` feature flag. Same table and key as the SQLite
//! backend, with native DATE/TIME columns and connection pooling via
//! `sqlx::PgPool`.

#![cfg(feature = "postgres")]

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};

use acars_core::routing::OnceKey;
use acars_core::types::AcarsMessage;

use crate::db::{MessageStore, StoreError, StoreStats};

const PG_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS acars (
    date DATE NOT NULL,
    time TIME NOT NULL,
    frequency VARCHAR(7),
    registration VARCHAR(7) NOT NULL,
    flight CHAR(6) NOT NULL,
    mode CHAR(1) NOT NULL,
    label CHAR(2) NOT NULL,
    block_id CHAR(1) NOT NULL,
    msg_id CHAR(4) NOT NULL,
    text TEXT NOT NULL,
    PRIMARY KEY (date, registration, flight, mode, label, block_id, msg_id)
);

CREATE INDEX IF NOT EXISTS idx_acars_datetime ON acars(date, time);
CREATE INDEX IF NOT EXISTS idx_acars_registration ON acars(registration);
CREATE INDEX IF NOT EXISTS idx_acars_flight ON acars(flight);
"#;

const INSERT_SQL: &str = "INSERT INTO acars
     (date, time, frequency, registration, flight, mode, label, block_id, msg_id, text)
     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)";

const INSERT_IF_ABSENT_SQL: &str = "INSERT INTO acars
     (date, time, frequency, registration, flight, mode, label, block_id, msg_id, text)
     SELECT $1, $2, $3, $4, $5, $6, $7, $8, $9, $10
     WHERE NOT EXISTS (
         SELECT 1 FROM acars WHERE date = $11 AND flight = $12 AND registration = $13
     )";

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::Duplicate,
            _ => StoreError::Backend(e.to_string()),
        }
    }
}

/// PostgreSQL store with connection pooling.
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new().max_connections(4).connect(url).await?;
        Ok(PgStore { pool })
    }

    /// Bind the ten message columns, in table order.
    fn bind_message<'q>(
        query: sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments>,
        message: &'q AcarsMessage,
    ) -> sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments> {
        query
            .bind(message.timestamp.date_naive())
            .bind(message.timestamp.time())
            .bind(message.frequency.as_deref())
            .bind(message.registration.as_str())
            .bind(message.flight_id.as_str())
            .bind(message.mode.to_string())
            .bind(message.label.as_str())
            .bind(message.block_id.to_string())
            .bind(message.msg_id.as_str())
            .bind(message.text.as_str())
    }
}

#[async_trait]
impl MessageStore for PgStore {
    async fn setup_schema(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(PG_SCHEMA).execute(&self.pool).await?;
        Ok(())
    }

    async fn insert(&self, message: &AcarsMessage) -> Result<(), StoreError> {
        Self::bind_message(sqlx::query(INSERT_SQL), message)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn insert_if_absent(
        &self,
        key: &OnceKey,
        message: &AcarsMessage,
    ) -> Result<u64, StoreError> {
        let result = Self::bind_message(sqlx::query(INSERT_IF_ABSENT_SQL), message)
            .bind(key.date)
            .bind(key.flight_id.as_str())
            .bind(key.registration.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn stats(&self) -> Result<StoreStats, StoreError> {
        let messages: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM acars")
            .fetch_one(&self.pool)
            .await?;

        let rows = sqlx::query(
            "SELECT label::TEXT AS label, COUNT(*) AS n FROM acars
             GROUP BY label ORDER BY n DESC, label",
        )
        .fetch_all(&self.pool)
        .await?;

        let by_label = rows
            .iter()
            .map(|r| Ok((r.try_get::<String, _>("label")?, r.try_get::<i64, _>("n")?)))
            .collect::<Result<Vec<_>, sqlx::Error>>()?;

        Ok(StoreStats { messages, by_label })
    }
}
