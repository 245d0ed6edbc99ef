//! In-process [`PlayerStore`] used by the test suite and `start --demo`.
//!
//! Mirrors the MySQL backend's rules (name ordering, identifier-first lookup,
//! locked read-then-write) and counts calls so tests can assert that rejected
//! input never reached the store.

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use super::{apply_delta, check_amount, AdjustOutcome, Currency, Operation, Player, PlayerStore, StoreError};

#[derive(Default)]
pub struct MemoryPlayerStore {
    players: Mutex<Vec<Player>>,
    calls: AtomicUsize,
    adjust_calls: AtomicUsize,
    unavailable: AtomicBool,
}

impl MemoryPlayerStore {
    pub fn new(players: Vec<Player>) -> Self {
        Self {
            players: Mutex::new(players),
            ..Default::default()
        }
    }

    /// A handful of sample players for `start --demo`.
    pub fn demo() -> Self {
        use std::str::FromStr;
        let dec = |s: &str| Decimal::from_str(s).unwrap_or_default();
        let names = [
            ("Alice", "100.00", "250"),
            ("Alan", "12.50", "40"),
            ("Bob", "0", "10"),
            ("Carmen", "5", "1200.75"),
            ("Dmitri", "64", "0"),
        ];
        Self::new(
            names
                .iter()
                .map(|(name, gems, coins)| {
                    Player::new(uuid::Uuid::new_v4().to_string(), *name, dec(gems), dec(coins))
                })
                .collect(),
        )
    }

    /// Total store calls of any kind.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn adjust_calls(&self) -> usize {
        self.adjust_calls.load(Ordering::SeqCst)
    }

    /// Simulate the pool refusing connections.
    pub fn set_unavailable(&self, down: bool) {
        self.unavailable.store(down, Ordering::SeqCst);
    }

    /// Replace a player's name in place (simulates an external rename).
    pub fn rename(&self, player_id: &str, name: &str) -> bool {
        match self.lock() {
            Ok(mut players) => match players.iter_mut().find(|p| p.id == player_id) {
                Some(p) => {
                    p.name = name.to_string();
                    true
                }
                None => false,
            },
            Err(_) => false,
        }
    }

    /// Remove a row (simulates a row disappearing between reads).
    pub fn delete(&self, player_id: &str) -> bool {
        match self.lock() {
            Ok(mut players) => {
                let before = players.len();
                players.retain(|p| p.id != player_id);
                players.len() != before
            }
            Err(_) => false,
        }
    }

    /// Snapshot a balance without counting as a store call.
    pub fn balance_of(&self, player_id: &str, currency: Currency) -> Option<Decimal> {
        self.lock()
            .ok()?
            .iter()
            .find(|p| p.id == player_id)
            .map(|p| p.balance(currency))
    }

    fn enter(&self) -> Result<MutexGuard<'_, Vec<Player>>, StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("connection pool exhausted".to_string()));
        }
        self.lock()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Vec<Player>>, StoreError> {
        self.players
            .lock()
            .map_err(|_| StoreError::Unavailable("player table lock poisoned".to_string()))
    }
}

#[async_trait]
impl PlayerStore for MemoryPlayerStore {
    async fn list_players(&self) -> Result<Vec<Player>, StoreError> {
        let players = self.enter()?;
        let mut out = players.clone();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(out)
    }

    async fn get_player(&self, key: &str) -> Result<Option<Player>, StoreError> {
        let players = self.enter()?;
        if let Some(p) = players.iter().find(|p| p.id == key) {
            return Ok(Some(p.clone()));
        }
        Ok(players.iter().find(|p| p.name == key).cloned())
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
        self.adjust_calls.fetch_add(1, Ordering::SeqCst);
        let mut players = match self.enter() {
            Ok(guard) => guard,
            Err(e) => return AdjustOutcome::Failed(e),
        };
        let Some(player) = players.iter_mut().find(|p| p.id == player_id) else {
            return AdjustOutcome::Failed(StoreError::NotFound(player_id.to_string()));
        };
        let previous = player.balance(currency);
        match apply_delta(previous, amount, operation) {
            Ok(new_balance) => {
                *player.balance_mut(currency) = new_balance;
                AdjustOutcome::Applied {
                    player_id: player_id.to_string(),
                    currency,
                    operation,
                    amount,
                    previous,
                    new_balance,
                }
            }
            Err(e) => AdjustOutcome::Failed(e),
        }
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.enter().map(|_| ())
    }
}
