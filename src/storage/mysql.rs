//! MySQL-backed [`PlayerStore`] over a pooled `sqlx` connection.
//!
//! The table name comes from configuration and is validated as a plain
//! identifier before it is formatted into statement text; every value is bound
//! as a parameter.

use async_trait::async_trait;
use log::{debug, error, info, warn};
use rust_decimal::Decimal;
use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions};
use std::time::{Duration, Instant};

use super::{
    apply_delta, check_amount, format_cents, last_seen_from_millis, AdjustOutcome, Currency,
    Operation, Player, PlayerStore, StoreError,
};
use crate::config::DatabaseConfig;
use crate::logutil::escape_log;
use crate::metrics;
use crate::validation::validate_table_name;

/// Balances are read through this cast so DOUBLE and DECIMAL columns decode alike.
const BALANCE_SQL_TYPE: &str = "DECIMAL(30,4)";

/// Column list shared by list and lookup. `last_online` is expected to be a
/// BIGINT of epoch milliseconds; a DATETIME column would cast to
/// `YYYYMMDDhhmmss` and decode as a nonsense timestamp.
fn select_sql(table: &str) -> String {
    format!(
        "SELECT uuid, name, \
         CAST(COALESCE(gems, 0) AS {ty}) AS gems, \
         CAST(COALESCE(coins, 0) AS {ty}) AS coins, \
         CAST(last_online AS SIGNED) AS last_online \
         FROM {table}",
        ty = BALANCE_SQL_TYPE,
        table = table
    )
}

fn list_sql(table: &str) -> String {
    format!("{} ORDER BY name", select_sql(table))
}

/// Binds `key` three times. An identifier match sorts ahead of name matches.
fn lookup_sql(table: &str) -> String {
    format!(
        "{} WHERE uuid = ? OR name = ? ORDER BY (uuid = ?) DESC, name LIMIT 1",
        select_sql(table)
    )
}

/// Locking read of one balance by identifier.
fn read_balance_sql(table: &str, currency: Currency) -> String {
    format!(
        "SELECT CAST(COALESCE({col}, 0) AS {ty}) FROM {table} WHERE uuid = ? FOR UPDATE",
        col = currency.column(),
        ty = BALANCE_SQL_TYPE,
        table = table
    )
}

/// Binds the amount, the identifier and, for removes, the amount again.
/// A remove only matches while the balance covers it.
fn write_sql(table: &str, currency: Currency, operation: Operation) -> String {
    let col = currency.column();
    match operation {
        Operation::Add => format!(
            "UPDATE {table} SET {col} = COALESCE({col}, 0) + ? WHERE uuid = ?",
            table = table,
            col = col
        ),
        Operation::Remove => format!(
            "UPDATE {table} SET {col} = COALESCE({col}, 0) - ? \
             WHERE uuid = ? AND COALESCE({col}, 0) >= ?",
            table = table,
            col = col
        ),
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PlayerRow {
    uuid: String,
    name: String,
    gems: Decimal,
    coins: Decimal,
    last_online: Option<i64>,
}

impl From<PlayerRow> for Player {
    fn from(row: PlayerRow) -> Self {
        Player {
            id: row.uuid,
            name: row.name,
            gems: row.gems,
            coins: row.coins,
            last_seen: last_seen_from_millis(row.last_online),
        }
    }
}

pub struct MySqlPlayerStore {
    pool: MySqlPool,
    table: String,
}

impl MySqlPlayerStore {
    /// Build the pool and run a connectivity test.
    pub async fn connect(cfg: &DatabaseConfig) -> Result<Self, StoreError> {
        validate_table_name(&cfg.table)
            .map_err(|e| StoreError::InvalidInput(format!("table name: {}", e)))?;

        let options = MySqlConnectOptions::new()
            .host(&cfg.host)
            .port(cfg.port)
            .username(&cfg.user)
            .password(&cfg.password)
            .database(&cfg.name);

        let pool = MySqlPoolOptions::new()
            .max_connections(cfg.pool_size)
            .acquire_timeout(Duration::from_secs(cfg.connect_timeout_seconds))
            .connect_with(options)
            .await
            .map_err(|e| {
                error!("Database connection error for {}: {}", cfg.describe(), e);
                StoreError::Unavailable(e.to_string())
            })?;
        info!(
            "Database connection pool created: {} (max {} connections)",
            cfg.describe(),
            cfg.pool_size
        );

        let store = Self::from_pool(pool, &cfg.table)?;
        store.ping().await?;
        info!("Database connection test successful");
        Ok(store)
    }

    /// Wrap an existing pool.
    pub fn from_pool(pool: MySqlPool, table: &str) -> Result<Self, StoreError> {
        validate_table_name(table)
            .map_err(|e| StoreError::InvalidInput(format!("table name: {}", e)))?;
        Ok(Self {
            pool,
            table: table.to_string(),
        })
    }

    pub async fn close(&self) {
        self.pool.close().await;
        info!("Database connections closed");
    }

    async fn try_adjust(
        &self,
        player_id: &str,
        currency: Currency,
        amount: Decimal,
        operation: Operation,
    ) -> Result<AdjustOutcome, StoreError> {
        let read = read_balance_sql(&self.table, currency);
        let mut tx = self.pool.begin().await?;

        let current: Option<Decimal> = sqlx::query_scalar::<_, Decimal>(&read)
            .bind(player_id)
            .fetch_optional(&mut *tx)
            .await?;
        let Some(current) = current else {
            tx.rollback().await?;
            return Ok(AdjustOutcome::Failed(StoreError::NotFound(
                player_id.to_string(),
            )));
        };

        if let Err(rejection) = apply_delta(current, amount, operation) {
            tx.rollback().await?;
            return Ok(AdjustOutcome::Failed(rejection));
        }

        // The row is locked, but the write still re-checks non-negativity so
        // the statement is safe on its own.
        let statement = write_sql(&self.table, currency, operation);
        let mut write = sqlx::query(&statement)
            .bind(amount)
            .bind(player_id);
        if operation == Operation::Remove {
            write = write.bind(amount);
        }
        let result = write.execute(&mut *tx).await?;
        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(AdjustOutcome::Failed(StoreError::NoRowsUpdated));
        }

        // report the stored value; DOUBLE or narrower DECIMAL columns may differ
        let new_balance: Decimal = sqlx::query_scalar::<_, Decimal>(&read)
            .bind(player_id)
            .fetch_one(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(AdjustOutcome::Applied {
            player_id: player_id.to_string(),
            currency,
            operation,
            amount,
            previous: current,
            new_balance,
        })
    }
}

#[async_trait]
impl PlayerStore for MySqlPlayerStore {
    async fn list_players(&self) -> Result<Vec<Player>, StoreError> {
        let started = Instant::now();
        let sql = list_sql(&self.table);
        let rows = sqlx::query_as::<_, PlayerRow>(&sql)
            .fetch_all(&self.pool)
            .await;
        metrics::observe_store_latency(started);
        match rows {
            Ok(rows) => {
                debug!("Retrieved {} players from database", rows.len());
                Ok(rows.into_iter().map(Player::from).collect())
            }
            Err(e) => {
                metrics::inc_store_errors();
                error!("Error fetching players: {}", e);
                Err(e.into())
            }
        }
    }

    async fn get_player(&self, key: &str) -> Result<Option<Player>, StoreError> {
        let started = Instant::now();
        let sql = lookup_sql(&self.table);
        let row = sqlx::query_as::<_, PlayerRow>(&sql)
            .bind(key)
            .bind(key)
            .bind(key)
            .fetch_optional(&self.pool)
            .await;
        metrics::observe_store_latency(started);
        match row {
            Ok(row) => Ok(row.map(Player::from)),
            Err(e) => {
                metrics::inc_store_errors();
                error!("Error fetching player {}: {}", escape_log(key), e);
                Err(e.into())
            }
        }
    }

    async fn adjust_balance(
        &self,
        player_id: &str,
        currency: Currency,
        amount: Decimal,
        operation: Operation,
    ) -> AdjustOutcome {
        if let Err(e) = check_amount(amount) {
            return AdjustOutcome::Failed(e);
        }
        let started = Instant::now();
        let outcome = match self.try_adjust(player_id, currency, amount, operation).await {
            Ok(outcome) => outcome,
            Err(e) => {
                metrics::inc_store_errors();
                error!("Error updating currency for {}: {}", escape_log(player_id), e);
                AdjustOutcome::Failed(e)
            }
        };
        metrics::observe_store_latency(started);

        match &outcome {
            AdjustOutcome::Applied { new_balance, .. } => info!(
                "Updated {}: {} {} {} (new balance {})",
                escape_log(player_id),
                operation,
                amount,
                currency,
                format_cents(new_balance)
            ),
            AdjustOutcome::Failed(e) if !e.is_system_fault() => debug!(
                "Adjustment for {} rejected: {}",
                escape_log(player_id),
                e
            ),
            AdjustOutcome::Failed(e) => warn!(
                "Adjustment for {} failed: {}",
                escape_log(player_id),
                e
            ),
        }
        outcome
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(|e| {
                error!("Database ping failed: {}", e);
                StoreError::from(e)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_match_on_identifier_only() {
        for currency in Currency::ALL {
            for operation in [Operation::Add, Operation::Remove] {
                let sql = write_sql("players", currency, operation);
                assert!(sql.contains("WHERE uuid = ?"), "{}", sql);
                assert!(!sql.contains("name"), "{}", sql);
                assert_eq!(sql.matches('?').count(), if operation == Operation::Add { 2 } else { 3 });
            }
        }
    }

    #[test]
    fn remove_is_guarded_by_current_balance() {
        assert_eq!(
            write_sql("players", Currency::Coins, Operation::Remove),
            "UPDATE players SET coins = COALESCE(coins, 0) - ? \
             WHERE uuid = ? AND COALESCE(coins, 0) >= ?"
        );
        assert!(!write_sql("players", Currency::Coins, Operation::Add).contains(">="));
    }

    #[test]
    fn balance_read_locks_the_row() {
        assert_eq!(
            read_balance_sql("players", Currency::Gems),
            "SELECT CAST(COALESCE(gems, 0) AS DECIMAL(30,4)) FROM players WHERE uuid = ? FOR UPDATE"
        );
    }

    #[test]
    fn lookup_prefers_identifier_match() {
        let sql = lookup_sql("players");
        assert!(sql.ends_with("WHERE uuid = ? OR name = ? ORDER BY (uuid = ?) DESC, name LIMIT 1"));
        assert_eq!(sql.matches('?').count(), 3);
        assert!(list_sql("players").ends_with("FROM players ORDER BY name"));
    }
}
