//! Console server: routes interactions to sessions and owns the event loop.
//!
//! The server handles one interaction at a time. Transports submit
//! [`Inbound`] requests over an mpsc channel and receive the [`Reply`] on a
//! oneshot; a one-second housekeeping tick prunes idle sessions. Audit
//! delivery runs on spawned tasks so a slow audit channel never holds up the
//! loop.

use anyhow::Result;
use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use super::adjust::{AdjustError, AdjustState};
use super::audit::{AuditSink, LogAuditSink};
use super::interaction::{Interaction, InteractionKind, Operator, Reply, SessionKey};
use super::pager::Pager;
use super::render;
use super::roles::AccessPolicy;
use super::search::{self, SearchOutcome};
use super::session::{SearchResults, Session, SessionManager};
use crate::config::Config;
use crate::logutil::escape_log;
use crate::metrics;
use crate::storage::memory::MemoryPlayerStore;
use crate::storage::mysql::MySqlPlayerStore;
use crate::storage::{Player, PlayerStore, StoreError};

/// Generic text for faults whose details stay in the log.
const GENERIC_FAILURE: &str = "An error occurred. Please try again.";

/// Seconds between periodic stats log lines.
const STATS_INTERVAL_SECS: u64 = 300;

/// One interaction awaiting a reply.
pub struct Inbound {
    pub interaction: Interaction,
    pub reply_tx: oneshot::Sender<Reply>,
}

pub struct ConsoleServer {
    config: Config,
    store: Arc<dyn PlayerStore>,
    audit: Arc<dyn AuditSink>,
    sessions: SessionManager,
    policy: AccessPolicy,
    audit_tasks: Vec<JoinHandle<bool>>,
}

impl ConsoleServer {
    pub fn new(config: Config, store: Arc<dyn PlayerStore>, audit: Arc<dyn AuditSink>) -> Self {
        let sessions = SessionManager::new(
            config.console.session_timeout,
            config.console.confirm_timeout_seconds,
        );
        let policy = AccessPolicy::from_config(&config.discord);
        Self {
            config,
            store,
            audit,
            sessions,
            policy,
            audit_tasks: Vec::new(),
        }
    }

    /// Connect to MySQL and pick an audit sink from configuration.
    pub async fn connect(config: Config) -> Result<Self> {
        let store = MySqlPlayerStore::connect(&config.database).await?;
        let audit = build_audit_sink(&config);
        Ok(Self::new(config, Arc::new(store), audit))
    }

    /// In-memory sample data and log-only auditing.
    pub fn demo(config: Config) -> Self {
        Self::new(
            config,
            Arc::new(MemoryPlayerStore::demo()),
            Arc::new(LogAuditSink),
        )
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub async fn handle(&mut self, interaction: Interaction) -> Reply {
        self.handle_at(interaction, Utc::now()).await
    }

    /// Handle one interaction as of `now`.
    pub async fn handle_at(&mut self, interaction: Interaction, now: DateTime<Utc>) -> Reply {
        debug!(
            "Interaction {} from {} (session {})",
            interaction.kind.name(),
            escape_log(&interaction.operator.to_string()),
            interaction.key
        );
        if let Err(denied) = self.policy.check(&interaction.operator, interaction.guild_id) {
            return Reply::error(denied.to_string());
        }

        let Interaction {
            key,
            operator,
            kind,
            ..
        } = interaction;

        if kind == InteractionKind::Manage {
            return self.start_session(key, operator, now).await;
        }

        let confirm_timeout = self.sessions.confirm_timeout();
        let store = Arc::clone(&self.store);
        let audit = Arc::clone(&self.audit);
        let session = match self.sessions.get_mut(&key, operator.id, now) {
            Ok(s) => s,
            Err(e) => return Reply::error(e.to_string()),
        };
        session.touch(now);

        match kind {
            InteractionKind::Manage => list_view(session),
            InteractionKind::Search(query) => search_players(session, &query, store.as_ref()).await,
            InteractionKind::ClearSearch => {
                session.search = None;
                render::player_list(&session.roster, None)
            }
            InteractionKind::NextPage => {
                session.list_mut().next();
                list_view(session)
            }
            InteractionKind::PrevPage => {
                session.list_mut().prev();
                list_view(session)
            }
            InteractionKind::Select(id) => select_player(session, &id, store.as_ref()).await,
            InteractionKind::Refresh => match session.selected.as_ref().map(|p| p.id.clone()) {
                Some(id) => select_player(session, &id, store.as_ref()).await,
                None => Reply::error("No player selected."),
            },
            InteractionKind::Back => {
                session.abandon_adjustment();
                session.selected = None;
                list_view(session)
            }
            InteractionKind::Begin(currency, operation) => {
                match session.begin_adjustment(currency, operation) {
                    Some(adj) => render::amount_prompt(adj),
                    None => Reply::error("Select a player first."),
                }
            }
            InteractionKind::SubmitAmount(text) => {
                let Some(adj) = session.adjustment.as_mut() else {
                    return Reply::error("Choose an action before entering an amount.");
                };
                match adj.submit_amount(&text, now) {
                    Ok(amount) => render::confirmation(adj, amount),
                    Err(AdjustError::InvalidAmount(e)) => {
                        // stay on the prompt so the operator can retry
                        let mut reply = render::amount_prompt(adj);
                        reply.content = format!("❌ {}\n{}", e, reply.content);
                        reply
                    }
                    Err(e) => Reply::error(e.to_string()),
                }
            }
            InteractionKind::Confirm => {
                let Some(adj) = session.adjustment.as_mut() else {
                    return Reply::error(AdjustError::Resolved.to_string());
                };
                let result = adj
                    .confirm(store.as_ref(), &audit, &operator, now, confirm_timeout)
                    .await;
                match result {
                    Ok(done) => {
                        if let Some(task) = done.audit {
                            self.audit_tasks.push(task);
                        }
                        if let Some(e) = done.outcome.error() {
                            if e.is_system_fault() {
                                warn!("Adjustment in session {} failed: {}", key, e);
                            }
                        }
                        session.record_outcome(&done.outcome);
                        render::outcome(&done.outcome)
                    }
                    Err(e) => Reply::error(e.to_string()),
                }
            }
            InteractionKind::Cancel => match session.adjustment.as_mut() {
                Some(adj) => match adj.cancel() {
                    Ok(()) => render::cancelled(),
                    // a repeated cancel is answered the same way
                    Err(_) if adj.state == AdjustState::Cancelled => render::cancelled(),
                    Err(e) => Reply::error(e.to_string()),
                },
                None => Reply::error(AdjustError::Resolved.to_string()),
            },
        }
    }

    async fn start_session(
        &mut self,
        key: SessionKey,
        operator: Operator,
        now: DateTime<Utc>,
    ) -> Reply {
        let players = match self.store.list_players().await {
            Ok(p) => p,
            Err(e) => return store_failure("loading players", &e),
        };
        if players.is_empty() {
            return Reply::error("No players found in the database.");
        }
        info!(
            "{} opened the economy manager ({} players)",
            escape_log(&operator.to_string()),
            players.len()
        );
        let session = self.sessions.start(key, operator, players, now);
        render::player_list(&session.roster, None)
    }

    /// Wait for outstanding audit deliveries; returns how many landed.
    pub async fn flush_audit(&mut self) -> usize {
        let mut delivered = 0;
        for task in self.audit_tasks.drain(..) {
            match task.await {
                Ok(true) => delivered += 1,
                Ok(false) => {}
                Err(e) => error!("Audit task failed: {}", e),
            }
        }
        delivered
    }

    pub fn pending_audit(&self) -> usize {
        self.audit_tasks.iter().filter(|t| !t.is_finished()).count()
    }

    /// Prune idle sessions as of `now`; returns how many expired.
    pub fn prune_idle_at(&mut self, now: DateTime<Utc>) -> usize {
        self.sessions.prune(now).len()
    }

    /// Serve interactions from `rx` until the channel closes or ctrl-c.
    pub async fn run(&mut self, mut rx: mpsc::UnboundedReceiver<Inbound>) -> Result<()> {
        let mut housekeeping = tokio::time::interval(Duration::from_secs(1));
        housekeeping.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let mut stats = tokio::time::interval(Duration::from_secs(STATS_INTERVAL_SECS));
        stats.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        info!("Economy manager console ready");
        loop {
            tokio::select! {
                _ = housekeeping.tick() => {
                    let expired = self.prune_idle_at(Utc::now());
                    if expired > 0 {
                        debug!("Pruned {} idle session(s)", expired);
                    }
                    self.audit_tasks.retain(|t| !t.is_finished());
                }
                _ = stats.tick() => {
                    debug!("stats: sessions={} {}", self.sessions.len(), metrics::snapshot());
                }
                msg = rx.recv() => {
                    match msg {
                        Some(Inbound { interaction, reply_tx }) => {
                            let reply = self.handle(interaction).await;
                            if reply_tx.send(reply).is_err() {
                                debug!("Transport dropped before reply was delivered");
                            }
                        }
                        None => {
                            info!("Transport closed");
                            break;
                        }
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("Received shutdown signal");
                    break;
                }
            }
        }
        if !self.audit_tasks.is_empty() {
            info!("Waiting for {} audit deliveries", self.audit_tasks.len());
            self.flush_audit().await;
        }
        info!("Console stopped; {}", metrics::snapshot());
        Ok(())
    }

    /// Run with the terminal transport on stdin/stdout.
    pub async fn run_stdio(mut self) -> Result<()> {
        let (tx, rx) = mpsc::unbounded_channel();
        let operator = super::stdio::operator_from_config(&self.config);
        let transport = tokio::spawn(super::stdio::run(tx, operator));
        self.run(rx).await?;
        transport.abort();
        Ok(())
    }
}

/// Pick the audit sink for this configuration.
pub fn build_audit_sink(config: &Config) -> Arc<dyn AuditSink> {
    if config.discord.log_channel_id.is_none() {
        return Arc::new(LogAuditSink);
    }
    #[cfg(feature = "channel-audit")]
    {
        match super::audit::ChannelAuditSink::new(&config.discord) {
            Ok(sink) => {
                info!("Audit entries will be posted to the log channel");
                Arc::new(sink)
            }
            Err(e) => {
                warn!("Audit channel unavailable ({}); logging audit entries only", e);
                Arc::new(LogAuditSink)
            }
        }
    }
    #[cfg(not(feature = "channel-audit"))]
    {
        warn!("Built without channel-audit; logging audit entries only");
        Arc::new(LogAuditSink)
    }
}

fn list_view(session: &Session) -> Reply {
    let query = session.search.as_ref().map(|s| s.query.as_str());
    render::player_list(session.list(), query)
}

async fn search_players(session: &mut Session, query: &str, store: &dyn PlayerStore) -> Reply {
    let query = query.trim();
    if query.is_empty() {
        return Reply::error("Enter a name to search for.");
    }
    match search::search(query, session.roster.items()) {
        SearchOutcome::NoMatches => {
            let mut reply = list_view(session);
            reply.content = format!("❌ No players match '{}'.\n{}", query, reply.content);
            reply
        }
        SearchOutcome::Single(player) => {
            session.search = None;
            select_player(session, &player.id, store).await
        }
        SearchOutcome::Ranked(ranked) => {
            let players: Vec<Player> = ranked.into_iter().map(|(_, p)| p).collect();
            session.search = Some(SearchResults {
                query: query.to_string(),
                pager: Pager::new(players),
            });
            list_view(session)
        }
    }
}

/// Fetch a fresh copy of a player and show the detail view.
async fn select_player(session: &mut Session, id: &str, store: &dyn PlayerStore) -> Reply {
    match store.get_player(id).await {
        Ok(Some(player)) => {
            if session.selected.as_ref().map(|p| &p.id) != Some(&player.id) {
                session.abandon_adjustment();
            }
            session.selected = Some(player.clone());
            session.refresh_player(&player);
            render::player_detail(&player)
        }
        Ok(None) => Reply::error(format!("Player '{}' not found.", id)),
        Err(e) => store_failure("fetching player data", &e),
    }
}

fn store_failure(context: &str, e: &StoreError) -> Reply {
    error!("Error {}: {}", context, e);
    if e.is_system_fault() {
        Reply::error(GENERIC_FAILURE)
    } else {
        Reply::error(e.operator_message())
    }
}
