use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteConnection, SqliteJournalMode, SqlitePoolOptions, SqliteRow,
    SqliteSynchronous,
};
use sqlx::{Row, Sqlite, SqlitePool, Transaction};
use uuid::Uuid;

use crate::config::StoreConfig;
use crate::domain::{House, HouseId, HouseNumber, RechargeRecord, WattHours};

use super::MIGRATION_001_INITIAL;

/// Transaction scope over one pooled connection.
/// Dropping it without `commit` rolls back.
pub type LedgerTx = Transaction<'static, Sqlite>;

/// How long a writer waits on a locked database before the statement fails.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const HOUSE_COLUMNS: &str = "id, house_number, remaining_energy_wh, last_update, created_at";

/// Repository for persisting and querying houses and recharge records.
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given SQLite connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open the connection pool described by `config`.
    /// Creates the database file if it doesn't exist.
    pub async fn connect(config: &StoreConfig) -> Result<Self> {
        let connect_opts = SqliteConnectOptions::from_str(&config.database_url)
            .with_context(|| format!("Invalid database URL: {}", config.database_url))?
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(BUSY_TIMEOUT)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout())
            .connect_with(connect_opts)
            .await
            .context("Failed to connect to database")?;
        Ok(Self::new(pool))
    }

    /// Run database migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(MIGRATION_001_INITIAL)
            .execute(&self.pool)
            .await
            .context("Failed to run migration 001")?;
        Ok(())
    }

    /// Initialize a database (connect + migrate).
    pub async fn init(config: &StoreConfig) -> Result<Self> {
        let repo = Self::connect(config).await?;
        repo.migrate().await?;
        Ok(repo)
    }

    /// The shared pool behind this repository.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close the pool, waiting for checked-out connections to be returned.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Start a transaction on a connection taken from the pool.
    pub async fn begin(&self) -> Result<LedgerTx> {
        self.pool
            .begin()
            .await
            .context("Failed to begin transaction")
    }

    // ========================
    // House operations
    // ========================

    /// Insert a new house and return it with its store-assigned id.
    /// Returns `None` when the house number is already taken.
    pub async fn insert_house(
        &self,
        house_number: HouseNumber,
        remaining_energy_wh: WattHours,
        now: DateTime<Utc>,
    ) -> Result<Option<House>> {
        let now = format_timestamp(now);
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO houses (house_number, remaining_energy_wh, last_update, created_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT (house_number) DO NOTHING
            RETURNING {HOUSE_COLUMNS}
            "#
        ))
        .bind(house_number)
        .bind(remaining_energy_wh)
        .bind(&now)
        .bind(&now)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to insert house")?;

        row.as_ref().map(row_to_house).transpose()
    }

    /// Get a house by its external number.
    pub async fn get_house_by_number(&self, house_number: HouseNumber) -> Result<Option<House>> {
        let row = sqlx::query(&format!(
            "SELECT {HOUSE_COLUMNS} FROM houses WHERE house_number = ?"
        ))
        .bind(house_number)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch house")?;

        row.as_ref().map(row_to_house).transpose()
    }

    /// List all houses, ordered by house number.
    pub async fn list_houses(&self) -> Result<Vec<House>> {
        let rows = sqlx::query(&format!(
            "SELECT {HOUSE_COLUMNS} FROM houses ORDER BY house_number"
        ))
        .fetch_all(&self.pool)
        .await
        .context("Failed to list houses")?;

        rows.iter().map(row_to_house).collect()
    }

    /// Overwrite a house's remaining energy.
    /// Returns `None` when no house has this number.
    pub async fn set_remaining_energy(
        &self,
        house_number: HouseNumber,
        remaining_energy_wh: WattHours,
        now: DateTime<Utc>,
    ) -> Result<Option<House>> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE houses
            SET remaining_energy_wh = ?, last_update = ?
            WHERE house_number = ?
            RETURNING {HOUSE_COLUMNS}
            "#
        ))
        .bind(remaining_energy_wh)
        .bind(format_timestamp(now))
        .bind(house_number)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to update remaining energy")?;

        row.as_ref().map(row_to_house).transpose()
    }

    /// Add `delta_wh` to a house's remaining energy inside an open transaction.
    /// The sum is computed by the store, so concurrent callers never lose an increment.
    /// Returns `None` when no house has this number.
    pub async fn increment_remaining_energy(
        conn: &mut SqliteConnection,
        house_number: HouseNumber,
        delta_wh: WattHours,
        now: DateTime<Utc>,
    ) -> Result<Option<House>> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE houses
            SET remaining_energy_wh = remaining_energy_wh + ?, last_update = ?
            WHERE house_number = ?
            RETURNING {HOUSE_COLUMNS}
            "#
        ))
        .bind(delta_wh)
        .bind(format_timestamp(now))
        .bind(house_number)
        .fetch_optional(&mut *conn)
        .await
        .context("Failed to increment remaining energy")?;

        row.as_ref().map(row_to_house).transpose()
    }

    // ========================
    // Recharge audit log
    // ========================

    /// Append a recharge record inside an open transaction.
    pub async fn insert_recharge(
        conn: &mut SqliteConnection,
        record: &RechargeRecord,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO energy_recharges (id, house_id, amount_wh, created_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(record.id.to_string())
        .bind(record.house_id)
        .bind(record.amount_wh)
        .bind(format_timestamp(record.created_at))
        .execute(&mut *conn)
        .await
        .context("Failed to insert recharge record")?;
        Ok(())
    }

    /// List recharges for one house, oldest first.
    pub async fn list_recharges_for_house(&self, house_id: HouseId) -> Result<Vec<RechargeRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT id, house_id, amount_wh, created_at
            FROM energy_recharges
            WHERE house_id = ?
            ORDER BY created_at, rowid
            "#,
        )
        .bind(house_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list recharges for house")?;

        rows.iter().map(row_to_recharge).collect()
    }

    /// List every recharge in the audit log, oldest first.
    pub async fn list_recharges(&self) -> Result<Vec<RechargeRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT id, house_id, amount_wh, created_at
            FROM energy_recharges
            ORDER BY created_at, rowid
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to list recharges")?;

        rows.iter().map(row_to_recharge).collect()
    }

    /// Count recharges recorded for one house.
    pub async fn count_recharges_for_house(&self, house_id: HouseId) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) as count FROM energy_recharges WHERE house_id = ?")
            .bind(house_id)
            .fetch_one(&self.pool)
            .await
            .context("Failed to count recharges")?;

        Ok(row.get("count"))
    }

    /// Count all recharge records.
    pub async fn count_recharges(&self) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) as count FROM energy_recharges")
            .fetch_one(&self.pool)
            .await
            .context("Failed to count recharges")?;

        Ok(row.get("count"))
    }
}

/// Timestamps are stored as fixed-width RFC3339 so they sort lexically.
fn format_timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(value: &str, column: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(value)
        .with_context(|| format!("Invalid {column} timestamp"))?
        .with_timezone(&Utc))
}

fn row_to_house(row: &SqliteRow) -> Result<House> {
    let last_update_str: String = row.get("last_update");
    let created_at_str: String = row.get("created_at");

    Ok(House {
        id: row.get("id"),
        house_number: row.get("house_number"),
        remaining_energy_wh: row.get("remaining_energy_wh"),
        last_update: parse_timestamp(&last_update_str, "last_update")?,
        created_at: parse_timestamp(&created_at_str, "created_at")?,
    })
}

fn row_to_recharge(row: &SqliteRow) -> Result<RechargeRecord> {
    let id_str: String = row.get("id");
    let created_at_str: String = row.get("created_at");

    Ok(RechargeRecord {
        id: Uuid::parse_str(&id_str).context("Invalid recharge ID")?,
        house_id: row.get("house_id"),
        amount_wh: row.get("amount_wh"),
        created_at: parse_timestamp(&created_at_str, "created_at")?,
    })
}
