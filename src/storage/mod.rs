//! # Storage Module - Player Record Store
//!
//! Read and adjust access to the players table. The application never creates
//! or deletes player rows; it lists them, fetches one, and moves the `gems` or
//! `coins` balance up or down.
//!
//! ## Backends
//!
//! - [`mysql::MySqlPlayerStore`] - pooled `sqlx` connection to the live table
//! - [`memory::MemoryPlayerStore`] - in-process table used by tests and `start --demo`
//!
//! Both implement [`PlayerStore`], which is the only seam the console uses.
//!
//! ## Adjustment Rules
//!
//! - Amounts must be strictly positive; this is checked before any row is touched.
//! - The balance read and the write happen under one row lock, so a concurrent
//!   adjustment cannot slip between them.
//! - A `remove` that would leave the balance below zero is rejected and nothing is written.
//! - Writes match on the player identifier only. Name matching is reserved for
//!   read-only lookups.
//!
//! ## Error Handling
//!
//! Database faults never escape [`PlayerStore::adjust_balance`]; they come back
//! as [`AdjustOutcome::Failed`] carrying a [`StoreError`]. List and fetch return
//! `Result` so callers can decide whether an empty list is acceptable.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub mod memory;
pub mod mysql;

/// Which balance column an adjustment targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Currency {
    Gems,
    Coins,
}

impl Currency {
    pub const ALL: [Currency; 2] = [Currency::Gems, Currency::Coins];

    /// Column name in the players table.
    pub fn column(self) -> &'static str {
        match self {
            Currency::Gems => "gems",
            Currency::Coins => "coins",
        }
    }

    pub fn label(self) -> &'static str {
        self.column()
    }

    pub fn title(self) -> &'static str {
        match self {
            Currency::Gems => "Gems",
            Currency::Coins => "Coins",
        }
    }

    pub fn emoji(self) -> &'static str {
        match self {
            Currency::Gems => "💎",
            Currency::Coins => "🪙",
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Currency {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gems" | "gem" => Ok(Currency::Gems),
            "coins" | "coin" => Ok(Currency::Coins),
            _ => Err(StoreError::InvalidInput(
                "Invalid currency type. Use 'gems' or 'coins'.".to_string(),
            )),
        }
    }
}

/// Direction of an adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Add,
    Remove,
}

impl Operation {
    pub fn title(self) -> &'static str {
        match self {
            Operation::Add => "Add",
            Operation::Remove => "Remove",
        }
    }

    /// Past tense, capitalised: "Added" / "Removed".
    pub fn past_title(self) -> &'static str {
        match self {
            Operation::Add => "Added",
            Operation::Remove => "Removed",
        }
    }

    pub fn past(self) -> &'static str {
        match self {
            Operation::Add => "added",
            Operation::Remove => "removed",
        }
    }

    pub fn preposition(self) -> &'static str {
        match self {
            Operation::Add => "to",
            Operation::Remove => "from",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Operation::Add => "add",
            Operation::Remove => "remove",
        })
    }
}

impl FromStr for Operation {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "add" => Ok(Operation::Add),
            "remove" => Ok(Operation::Remove),
            _ => Err(StoreError::InvalidInput(
                "Invalid operation. Use 'add' or 'remove'.".to_string(),
            )),
        }
    }
}

/// One row of the players table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    /// Stable identifier (UUID string).
    pub id: String,
    pub name: String,
    pub gems: Decimal,
    pub coins: Decimal,
    /// Informational only.
    pub last_seen: Option<DateTime<Utc>>,
}

impl Player {
    pub fn new(id: impl Into<String>, name: impl Into<String>, gems: Decimal, coins: Decimal) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            gems,
            coins,
            last_seen: None,
        }
    }

    pub fn balance(&self, currency: Currency) -> Decimal {
        match currency {
            Currency::Gems => self.gems,
            Currency::Coins => self.coins,
        }
    }

    pub(crate) fn balance_mut(&mut self, currency: Currency) -> &mut Decimal {
        match currency {
            Currency::Gems => &mut self.gems,
            Currency::Coins => &mut self.coins,
        }
    }
}

/// Round to cents, halves away from zero.
pub fn round_cents(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// `0.009` → `0.01`, `25.5` → `25.50`
pub fn format_cents(value: &Decimal) -> String {
    format!("{:.2}", round_cents(*value))
}

/// Convert a stored millisecond epoch into a timestamp.
pub(crate) fn last_seen_from_millis(millis: Option<i64>) -> Option<DateTime<Utc>> {
    millis
        .filter(|ms| *ms > 0)
        .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
}

/// Store-level failures.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    /// The pool could not hand out a connection.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A statement was rejected or failed mid-flight.
    #[error("query failed: {0}")]
    QueryFailed(String),

    #[error("Player not found.")]
    NotFound(String),

    #[error("{0}")]
    InvalidInput(String),

    #[error(
        "Insufficient balance. Current: {}, Trying to remove: {}",
        format_cents(.current),
        format_cents(.requested)
    )]
    InsufficientBalance { current: Decimal, requested: Decimal },

    /// The write matched no row (row vanished or predicate mismatch).
    #[error("No rows updated.")]
    NoRowsUpdated,
}

impl StoreError {
    /// Whether this is an infrastructure fault rather than a business rejection.
    pub fn is_system_fault(&self) -> bool {
        matches!(
            self,
            StoreError::Unavailable(_) | StoreError::QueryFailed(_) | StoreError::NoRowsUpdated
        )
    }

    /// Text safe to show an operator. System faults are summarised; details
    /// stay in the log.
    pub fn operator_message(&self) -> String {
        match self {
            StoreError::Unavailable(_) => {
                "The database is unavailable right now. Nothing was changed.".to_string()
            }
            StoreError::QueryFailed(_) => {
                "Database error. The change was not applied.".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
                StoreError::Unavailable(e.to_string())
            }
            sqlx::Error::Io(_) | sqlx::Error::Tls(_) | sqlx::Error::WorkerCrashed => {
                StoreError::Unavailable(e.to_string())
            }
            sqlx::Error::RowNotFound => StoreError::NotFound("row not found".to_string()),
            other => StoreError::QueryFailed(other.to_string()),
        }
    }
}

/// Result of [`PlayerStore::adjust_balance`].
#[derive(Debug, Clone, PartialEq)]
pub enum AdjustOutcome {
    Applied {
        player_id: String,
        currency: Currency,
        operation: Operation,
        amount: Decimal,
        previous: Decimal,
        new_balance: Decimal,
    },
    Failed(StoreError),
}

impl AdjustOutcome {
    pub fn ok(&self) -> bool {
        matches!(self, AdjustOutcome::Applied { .. })
    }

    /// The operator-facing message for either branch.
    pub fn message(&self) -> String {
        match self {
            AdjustOutcome::Applied {
                currency,
                operation,
                amount,
                new_balance,
                ..
            } => format!(
                "Successfully {} {} {}. New balance: {}",
                operation.past(),
                format_cents(amount),
                currency,
                format_cents(new_balance)
            ),
            AdjustOutcome::Failed(e) => e.operator_message(),
        }
    }

    pub fn error(&self) -> Option<&StoreError> {
        match self {
            AdjustOutcome::Failed(e) => Some(e),
            AdjustOutcome::Applied { .. } => None,
        }
    }

    /// The `(ok, message)` pair used by callers that only need a verdict.
    pub fn into_pair(self) -> (bool, String) {
        (self.ok(), self.message())
    }
}

/// Reject non-positive amounts before any row is read.
pub fn check_amount(amount: Decimal) -> Result<(), StoreError> {
    if amount <= Decimal::ZERO {
        return Err(StoreError::InvalidInput("Amount must be positive.".to_string()));
    }
    Ok(())
}

/// Compute the balance after an adjustment, enforcing the non-negative rule.
pub fn apply_delta(
    current: Decimal,
    amount: Decimal,
    operation: Operation,
) -> Result<Decimal, StoreError> {
    match operation {
        Operation::Add => current
            .checked_add(amount)
            .ok_or_else(|| StoreError::InvalidInput("Amount is too large.".to_string())),
        Operation::Remove => {
            let next = current - amount;
            if next < Decimal::ZERO {
                Err(StoreError::InsufficientBalance {
                    current,
                    requested: amount,
                })
            } else {
                Ok(next)
            }
        }
    }
}

/// Access to the players table.
#[async_trait]
pub trait PlayerStore: Send + Sync {
    /// Every player, ordered by name.
    async fn list_players(&self) -> Result<Vec<Player>, StoreError>;

    /// Look a player up by identifier or display name. An identifier match
    /// wins over a name match.
    async fn get_player(&self, key: &str) -> Result<Option<Player>, StoreError>;

    /// Add to or remove from one balance of the player with this identifier.
    async fn adjust_balance(
        &self,
        player_id: &str,
        currency: Currency,
        amount: Decimal,
        operation: Operation,
    ) -> AdjustOutcome;

    /// Cheap connectivity check used at startup and by `status`.
    async fn ping(&self) -> Result<(), StoreError>;
}

/// Adjust using loosely typed operator input. Unknown currency or operation
/// names and non-positive amounts are rejected without touching the store.
pub async fn adjust_balance_raw(
    store: &dyn PlayerStore,
    player_id: &str,
    currency: &str,
    amount: Decimal,
    operation: &str,
) -> AdjustOutcome {
    let currency = match currency.parse::<Currency>() {
        Ok(c) => c,
        Err(e) => return AdjustOutcome::Failed(e),
    };
    let operation = match operation.parse::<Operation>() {
        Ok(o) => o,
        Err(e) => return AdjustOutcome::Failed(e),
    };
    if let Err(e) = check_amount(amount) {
        return AdjustOutcome::Failed(e);
    }
    store
        .adjust_balance(player_id, currency, amount, operation)
        .await
}
