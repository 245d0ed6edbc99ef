//! Adjustment workflow state machine.
//!
//! ```text
//!  AwaitingAmount ──submit(valid)──▶ AwaitingConfirmation ──confirm──▶ Applied | Rejected
//!        │  ▲                               │
//!        │  └──submit(invalid)              ├──cancel / timeout──▶ Cancelled
//!        └──cancel──▶ Cancelled             │
//! ```
//!
//! Terminal states (`Applied`, `Rejected`, `Cancelled`) ignore further input,
//! so a second confirm can never apply the same change twice. Invalid amounts
//! are rejected here, before the store is consulted.

use chrono::{DateTime, Duration, Utc};
use log::info;
use rust_decimal::Decimal;
use std::sync::Arc;
use tokio::task::JoinHandle;

use super::audit::{spawn_delivery, AuditEntry, AuditSink};
use super::interaction::Operator;
use crate::logutil::escape_log;
use crate::metrics;
use crate::storage::{AdjustOutcome, Currency, Operation, Player, PlayerStore};
use crate::validation::{parse_amount, AmountError};

#[derive(Debug, Clone, PartialEq)]
pub enum AdjustState {
    AwaitingAmount,
    AwaitingConfirmation {
        amount: Decimal,
        prompted_at: DateTime<Utc>,
    },
    Applied {
        amount: Decimal,
        new_balance: Decimal,
    },
    Rejected {
        reason: String,
    },
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AdjustError {
    #[error("{0}")]
    InvalidAmount(#[from] AmountError),
    #[error("No amount has been entered yet.")]
    NotAwaitingConfirmation,
    #[error("This adjustment is waiting for confirmation.")]
    NotAwaitingAmount,
    #[error("This confirmation is no longer active.")]
    Resolved,
    #[error("Confirmation timed out. Nothing was changed.")]
    TimedOut,
}

/// Result of a confirm that reached the store.
#[derive(Debug)]
pub struct Confirmed {
    pub outcome: AdjustOutcome,
    /// Background audit delivery; resolves to whether the entry landed.
    /// `None` for rejections.
    pub audit: Option<JoinHandle<bool>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Adjustment {
    pub player_id: String,
    pub player_name: String,
    pub currency: Currency,
    pub operation: Operation,
    pub state: AdjustState,
}

impl Adjustment {
    pub fn new(player: &Player, currency: Currency, operation: Operation) -> Self {
        Self {
            player_id: player.id.clone(),
            player_name: player.name.clone(),
            currency,
            operation,
            state: AdjustState::AwaitingAmount,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self.state,
            AdjustState::Applied { .. } | AdjustState::Rejected { .. } | AdjustState::Cancelled
        )
    }

    /// Amount awaiting confirmation, if any.
    pub fn pending_amount(&self) -> Option<Decimal> {
        match self.state {
            AdjustState::AwaitingConfirmation { amount, .. } => Some(amount),
            _ => None,
        }
    }

    /// Validate operator input and move to confirmation. Invalid input leaves
    /// the state unchanged.
    pub fn submit_amount(&mut self, input: &str, now: DateTime<Utc>) -> Result<Decimal, AdjustError> {
        match self.state {
            AdjustState::AwaitingAmount => {}
            AdjustState::AwaitingConfirmation { .. } => return Err(AdjustError::NotAwaitingAmount),
            _ => return Err(AdjustError::Resolved),
        }
        let amount = parse_amount(input).map_err(|e| {
            metrics::inc_invalid_amounts();
            AdjustError::from(e)
        })?;
        self.state = AdjustState::AwaitingConfirmation {
            amount,
            prompted_at: now,
        };
        Ok(amount)
    }

    /// Abandon the adjustment. Only valid before it resolves.
    pub fn cancel(&mut self) -> Result<(), AdjustError> {
        if self.is_terminal() {
            return Err(AdjustError::Resolved);
        }
        self.mark_cancelled();
        Ok(())
    }

    /// Callers check `is_terminal` first.
    pub(crate) fn mark_cancelled(&mut self) {
        self.state = AdjustState::Cancelled;
        metrics::inc_adjustments_cancelled();
    }

    /// Cancel a confirmation prompt that has been open longer than `timeout`.
    pub fn expire_if_stale(&mut self, now: DateTime<Utc>, timeout: Duration) -> bool {
        match self.state {
            AdjustState::AwaitingConfirmation { prompted_at, .. } if now - prompted_at > timeout => {
                self.mark_cancelled();
                true
            }
            _ => false,
        }
    }

    /// Apply the pending amount. When it lands the audit entry is handed to a
    /// background task; the reply does not wait for delivery.
    pub async fn confirm(
        &mut self,
        store: &dyn PlayerStore,
        audit: &Arc<dyn AuditSink>,
        operator: &Operator,
        now: DateTime<Utc>,
        timeout: Duration,
    ) -> Result<Confirmed, AdjustError> {
        let amount = match self.state {
            AdjustState::AwaitingConfirmation { amount, .. } => amount,
            AdjustState::AwaitingAmount => return Err(AdjustError::NotAwaitingConfirmation),
            _ => return Err(AdjustError::Resolved),
        };
        if self.expire_if_stale(now, timeout) {
            return Err(AdjustError::TimedOut);
        }

        let outcome = store
            .adjust_balance(&self.player_id, self.currency, amount, self.operation)
            .await;

        match &outcome {
            AdjustOutcome::Applied { new_balance, .. } => {
                metrics::inc_adjustments_applied();
                self.state = AdjustState::Applied {
                    amount,
                    new_balance: *new_balance,
                };
                let entry = AuditEntry {
                    player_id: self.player_id.clone(),
                    player_name: self.player_name.clone(),
                    currency: self.currency,
                    operation: self.operation,
                    amount,
                    new_balance: *new_balance,
                    operator: operator.clone(),
                    at: now,
                };
                info!(
                    "{} {} {} {} {} by {}",
                    self.operation.past_title(),
                    amount,
                    self.currency,
                    self.operation.preposition(),
                    escape_log(&self.player_name),
                    escape_log(&operator.to_string())
                );
                let task = spawn_delivery(Arc::clone(audit), entry);
                Ok(Confirmed {
                    outcome,
                    audit: Some(task),
                })
            }
            AdjustOutcome::Failed(e) => {
                metrics::inc_adjustments_rejected();
                self.state = AdjustState::Rejected {
                    reason: e.operator_message(),
                };
                Ok(Confirmed {
                    outcome,
                    audit: None,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::console::audit::MemoryAuditSink;
    use crate::storage::memory::MemoryPlayerStore;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn alice() -> Player {
        Player::new("a-1", "Alice", dec("100.00"), dec("250"))
    }

    fn minute() -> Duration {
        Duration::seconds(60)
    }

    fn sink() -> (Arc<MemoryAuditSink>, Arc<dyn AuditSink>) {
        let memory = Arc::new(MemoryAuditSink::new());
        let shared: Arc<dyn AuditSink> = memory.clone();
        (memory, shared)
    }

    #[test]
    fn invalid_amount_keeps_state() {
        let now = Utc::now();
        let mut adj = Adjustment::new(&alice(), Currency::Gems, Operation::Add);
        for bad in ["", "abc", "-5", "0", "12345678901"] {
            assert!(matches!(
                adj.submit_amount(bad, now),
                Err(AdjustError::InvalidAmount(_))
            ));
            assert_eq!(adj.state, AdjustState::AwaitingAmount);
        }
        assert_eq!(adj.submit_amount("25.50", now).unwrap(), dec("25.5"));
        assert_eq!(adj.pending_amount(), Some(dec("25.5")));
    }

    #[test]
    fn cancel_is_terminal() {
        let now = Utc::now();
        let mut adj = Adjustment::new(&alice(), Currency::Coins, Operation::Remove);
        adj.submit_amount("5", now).unwrap();
        adj.cancel().unwrap();
        assert_eq!(adj.state, AdjustState::Cancelled);
        assert_eq!(adj.cancel(), Err(AdjustError::Resolved));
        assert_eq!(adj.submit_amount("5", now), Err(AdjustError::Resolved));
    }

    #[tokio::test]
    async fn confirm_applies_once() {
        let store = MemoryPlayerStore::new(vec![alice()]);
        let (audit, shared) = sink();
        let op = Operator::admin(9, "mod");
        let now = Utc::now();
        let mut adj = Adjustment::new(&alice(), Currency::Gems, Operation::Add);
        adj.submit_amount("25.50", now).unwrap();

        let done = adj.confirm(&store, &shared, &op, now, minute()).await.unwrap();
        assert!(done.outcome.ok());
        assert!(done.audit.expect("audit task").await.unwrap());
        assert_eq!(store.balance_of("a-1", Currency::Gems), Some(dec("125.50")));

        let again = adj.confirm(&store, &shared, &op, now, minute()).await;
        assert!(matches!(again, Err(AdjustError::Resolved)));
        assert_eq!(store.adjust_calls(), 1);
        assert_eq!(audit.entries().len(), 1);
    }

    #[tokio::test]
    async fn rejection_is_terminal_and_unaudited() {
        let store = MemoryPlayerStore::new(vec![alice()]);
        let (audit, shared) = sink();
        let now = Utc::now();
        let mut adj = Adjustment::new(&alice(), Currency::Gems, Operation::Remove);
        adj.submit_amount("500", now).unwrap();
        let done = adj
            .confirm(&store, &shared, &Operator::admin(9, "mod"), now, minute())
            .await
            .unwrap();
        assert!(!done.outcome.ok());
        assert!(done.audit.is_none());
        assert!(matches!(adj.state, AdjustState::Rejected { .. }));
        assert!(audit.entries().is_empty());
        assert_eq!(store.balance_of("a-1", Currency::Gems), Some(dec("100.00")));
    }

    #[tokio::test]
    async fn stale_confirmation_times_out() {
        let store = MemoryPlayerStore::new(vec![alice()]);
        let (_, shared) = sink();
        let start = Utc::now();
        let mut adj = Adjustment::new(&alice(), Currency::Gems, Operation::Add);
        adj.submit_amount("1", start).unwrap();
        let late = start + Duration::seconds(61);
        let res = adj
            .confirm(&store, &shared, &Operator::admin(9, "mod"), late, minute())
            .await;
        assert!(matches!(res, Err(AdjustError::TimedOut)));
        assert_eq!(adj.state, AdjustState::Cancelled);
        assert_eq!(store.adjust_calls(), 0);
    }

    #[tokio::test]
    async fn audit_failure_does_not_undo_change() {
        let store = MemoryPlayerStore::new(vec![alice()]);
        let (audit, shared) = sink();
        audit.set_failing(true);
        let now = Utc::now();
        let mut adj = Adjustment::new(&alice(), Currency::Coins, Operation::Add);
        adj.submit_amount("10", now).unwrap();
        let done = adj
            .confirm(&store, &shared, &Operator::admin(9, "mod"), now, minute())
            .await
            .unwrap();
        assert!(done.outcome.ok());
        assert!(!done.audit.expect("audit task").await.unwrap());
        assert_eq!(store.balance_of("a-1", Currency::Coins), Some(dec("260")));
    }
}
