//! Operator sessions and their lifetime.
//!
//! A session is created by the `manage` entry point and holds everything the
//! follow-up interactions need: the roster snapshot, any active search, the
//! selected player and at most one in-flight adjustment. Sessions expire after
//! a period of inactivity; an expired session accepts no further input and
//! any unresolved adjustment in it is cancelled.

use chrono::{DateTime, Duration, Utc};
use log::{debug, info, warn};
use std::collections::HashMap;

use super::adjust::Adjustment;
use super::interaction::{Operator, SessionKey};
use super::pager::Pager;
use crate::logutil::escape_log;
use crate::metrics;
use crate::storage::{AdjustOutcome, Currency, Operation, Player};

/// Ranked search results replacing the roster in the list view.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResults {
    pub query: String,
    pub pager: Pager<Player>,
}

#[derive(Debug, Clone)]
pub struct Session {
    pub key: SessionKey,
    pub operator: Operator,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub roster: Pager<Player>,
    pub search: Option<SearchResults>,
    pub selected: Option<Player>,
    pub adjustment: Option<Adjustment>,
}

impl Session {
    pub fn new(key: SessionKey, operator: Operator, players: Vec<Player>, now: DateTime<Utc>) -> Self {
        Self {
            key,
            operator,
            created_at: now,
            last_activity: now,
            roster: Pager::new(players),
            search: None,
            selected: None,
            adjustment: None,
        }
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_activity = now;
    }

    pub fn is_inactive_at(&self, now: DateTime<Utc>, timeout: Duration) -> bool {
        now - self.last_activity > timeout
    }

    /// The list currently shown: search results when a search is active.
    pub fn list(&self) -> &Pager<Player> {
        match &self.search {
            Some(s) => &s.pager,
            None => &self.roster,
        }
    }

    pub fn list_mut(&mut self) -> &mut Pager<Player> {
        match &mut self.search {
            Some(s) => &mut s.pager,
            None => &mut self.roster,
        }
    }

    /// Start a new adjustment for the selected player, cancelling any
    /// unresolved one.
    pub fn begin_adjustment(
        &mut self,
        currency: Currency,
        operation: Operation,
    ) -> Option<&Adjustment> {
        let player = self.selected.as_ref()?;
        let next = Adjustment::new(player, currency, operation);
        if let Some(prev) = self.adjustment.as_mut() {
            if !prev.is_terminal() {
                prev.mark_cancelled();
            }
        }
        self.adjustment = Some(next);
        self.adjustment.as_ref()
    }

    /// Drop the adjustment, cancelling it first if it is still open.
    pub fn abandon_adjustment(&mut self) {
        if let Some(mut adj) = self.adjustment.take() {
            if !adj.is_terminal() {
                adj.mark_cancelled();
            }
        }
    }

    /// Store a fresh copy of a player in the selection and both lists.
    pub fn refresh_player(&mut self, player: &Player) {
        if let Some(sel) = self.selected.as_mut() {
            if sel.id == player.id {
                *sel = player.clone();
            }
        }
        for p in self.roster.iter_mut() {
            if p.id == player.id {
                *p = player.clone();
            }
        }
        if let Some(search) = self.search.as_mut() {
            for p in search.pager.iter_mut() {
                if p.id == player.id {
                    *p = player.clone();
                }
            }
        }
    }

    /// Mirror an applied adjustment into the cached copies.
    pub fn record_outcome(&mut self, outcome: &AdjustOutcome) {
        if let AdjustOutcome::Applied {
            player_id,
            currency,
            new_balance,
            ..
        } = outcome
        {
            let updated = self
                .roster
                .items()
                .iter()
                .chain(self.selected.iter())
                .find(|p| &p.id == player_id)
                .cloned();
            if let Some(mut player) = updated {
                *player.balance_mut(*currency) = *new_balance;
                self.refresh_player(&player);
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("This session has expired. Run manage again.")]
    Expired,
    #[error("This session is no longer active. Run manage again.")]
    Unknown,
    #[error("This session belongs to another operator.")]
    NotOwner,
}

pub struct SessionManager {
    sessions: HashMap<SessionKey, Session>,
    /// `None` disables idle expiry.
    idle_timeout: Option<Duration>,
    confirm_timeout: Duration,
}

impl SessionManager {
    pub fn new(idle_timeout_minutes: u32, confirm_timeout_seconds: u64) -> Self {
        Self {
            sessions: HashMap::new(),
            idle_timeout: (idle_timeout_minutes > 0)
                .then(|| Duration::minutes(idle_timeout_minutes as i64)),
            confirm_timeout: Duration::seconds(confirm_timeout_seconds as i64),
        }
    }

    pub fn confirm_timeout(&self) -> Duration {
        self.confirm_timeout
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Open a session, replacing any existing one under the same key.
    pub fn start(
        &mut self,
        key: SessionKey,
        operator: Operator,
        players: Vec<Player>,
        now: DateTime<Utc>,
    ) -> &mut Session {
        metrics::inc_sessions_started();
        debug!(
            "Session {} opened for {} ({} players)",
            key,
            escape_log(&operator.to_string()),
            players.len()
        );
        if let Some(mut old) = self.sessions.remove(&key) {
            old.abandon_adjustment();
        }
        self.sessions
            .entry(key.clone())
            .or_insert_with(|| Session::new(key, operator, players, now))
    }

    pub fn get(&self, key: &SessionKey) -> Option<&Session> {
        self.sessions.get(key)
    }

    /// Look up a live session owned by `operator_id`. A session found idle
    /// past the timeout is expired on the spot.
    pub fn get_mut(
        &mut self,
        key: &SessionKey,
        operator_id: u64,
        now: DateTime<Utc>,
    ) -> Result<&mut Session, SessionError> {
        let (owner, idle) = match self.sessions.get(key) {
            Some(s) => (s.operator.id, self.is_idle(s, now)),
            None => return Err(SessionError::Unknown),
        };
        if owner != operator_id {
            warn!(
                target: "security",
                "Operator {} tried to use session {} owned by {}",
                operator_id,
                key,
                owner
            );
            return Err(SessionError::NotOwner);
        }
        if idle {
            self.expire(key, now);
            return Err(SessionError::Expired);
        }
        self.sessions.get_mut(key).ok_or(SessionError::Unknown)
    }

    /// Expire idle sessions and stale confirmation prompts. Returns the
    /// expired session keys.
    pub fn prune(&mut self, now: DateTime<Utc>) -> Vec<SessionKey> {
        let idle: Vec<SessionKey> = self
            .sessions
            .values()
            .filter(|s| self.is_idle(s, now))
            .map(|s| s.key.clone())
            .collect();
        for key in &idle {
            self.expire(key, now);
        }
        let confirm_timeout = self.confirm_timeout;
        for session in self.sessions.values_mut() {
            if let Some(adj) = session.adjustment.as_mut() {
                if adj.expire_if_stale(now, confirm_timeout) {
                    debug!("Confirmation in session {} timed out", session.key);
                }
            }
        }
        idle
    }

    pub fn close(&mut self, key: &SessionKey) -> bool {
        match self.sessions.remove(key) {
            Some(mut s) => {
                s.abandon_adjustment();
                true
            }
            None => false,
        }
    }

    fn is_idle(&self, session: &Session, now: DateTime<Utc>) -> bool {
        self.idle_timeout
            .is_some_and(|t| session.is_inactive_at(now, t))
    }

    fn expire(&mut self, key: &SessionKey, now: DateTime<Utc>) {
        if let Some(mut session) = self.sessions.remove(key) {
            session.abandon_adjustment();
            metrics::inc_sessions_expired();
            info!(
                "Session {} (operator {}) expired due to inactivity after {} min",
                key,
                escape_log(&session.operator.name),
                (now - session.created_at).num_minutes()
            );
        }
    }
}
