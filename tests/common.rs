//! Test utilities & fixtures.
//! Builds a console server over the in-memory store with a recording audit sink.
#![allow(dead_code)]

use std::sync::Arc;

use economy_manager::config::Config;
use economy_manager::console::audit::MemoryAuditSink;
use economy_manager::console::{ConsoleServer, Interaction, InteractionKind, Operator, Reply, SessionKey};
use economy_manager::storage::memory::MemoryPlayerStore;
use economy_manager::storage::Player;
use rust_decimal::Decimal;

pub fn dec(s: &str) -> Decimal {
    s.parse().expect("decimal literal")
}

pub fn player(id: &str, name: &str, gems: &str, coins: &str) -> Player {
    Player::new(id, name, dec(gems), dec(coins))
}

/// Alice 100.00 gems, Alan 12.50 gems, Bob 10 coins.
pub fn roster() -> Vec<Player> {
    vec![
        player("uuid-alice", "Alice", "100.00", "250"),
        player("uuid-alan", "Alan", "12.50", "40"),
        player("uuid-bob", "Bob", "0", "10"),
    ]
}

pub struct Harness {
    pub server: ConsoleServer,
    pub store: Arc<MemoryPlayerStore>,
    pub audit: Arc<MemoryAuditSink>,
    pub key: SessionKey,
    pub operator: Operator,
}

impl Harness {
    pub fn new(players: Vec<Player>) -> Self {
        Self::with_config(players, Config::default())
    }

    pub fn with_config(players: Vec<Player>, config: Config) -> Self {
        let store = Arc::new(MemoryPlayerStore::new(players));
        let audit = Arc::new(MemoryAuditSink::new());
        let server = ConsoleServer::new(config, store.clone(), audit.clone());
        Self {
            server,
            store,
            audit,
            key: SessionKey::new("test-session"),
            operator: Operator::admin(42, "mod"),
        }
    }

    pub async fn send(&mut self, kind: InteractionKind) -> Reply {
        let interaction = Interaction::new(self.key.clone(), self.operator.clone(), kind);
        self.server.handle(interaction).await
    }

    /// Open the console and select a player by id.
    pub async fn open(&mut self, player_id: &str) -> Reply {
        self.send(InteractionKind::Manage).await;
        self.send(InteractionKind::Select(player_id.to_string())).await
    }
}
