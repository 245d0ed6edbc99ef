//! # Console Module
//!
//! The interactive side of the economy manager: everything between an
//! operator's action and a call into the [`PlayerStore`](crate::storage::PlayerStore).
//!
//! ## Components
//!
//! - [`server`] - Interaction routing, session ownership and the event loop
//! - [`session`] - Per-operator session state and idle expiry
//! - [`search`] - Fuzzy name scoring and ranking
//! - [`pager`] - Fixed 25-entry pagination
//! - [`adjust`] - Amount → confirmation → applied/rejected/cancelled state machine
//! - [`audit`] - Audit entries and sinks (log, memory, chat channel)
//! - [`roles`] - Operator authorization
//! - [`render`] - Reply builders, balance formatting, terminal rendering
//! - [`interaction`] - Transport-agnostic request/reply types
//! - [`stdio`] - Line-oriented terminal transport
//!
//! ## Flow
//!
//! ```text
//! Manage ──▶ list (page / search) ──▶ select ──▶ detail
//!                                                  │
//!                          Begin(currency, op) ◀───┘
//!                                   │
//!                    SubmitAmount ──▶ Confirm ──▶ store.adjust_balance ──▶ audit
//!                                   └──▶ Cancel
//! ```
//!
//! ## Usage
//!
//! ```rust,no_run
//! use economy_manager::config::Config;
//! use economy_manager::console::{ConsoleServer, Interaction, InteractionKind, Operator, SessionKey};
//!
//! # async fn demo() {
//! let mut server = ConsoleServer::demo(Config::default());
//! let op = Operator::admin(1, "root");
//! let reply = server
//!     .handle(Interaction::new(SessionKey::new("s1"), op, InteractionKind::Manage))
//!     .await;
//! println!("{}", reply.content);
//! # }
//! ```

pub mod adjust;
pub mod audit;
pub mod interaction;
pub mod pager;
pub mod render;
pub mod roles;
pub mod search;
pub mod server;
pub mod session;
pub mod stdio;

pub use audit::{AuditEntry, AuditSink};
pub use interaction::{Interaction, InteractionKind, Operator, Reply, SessionKey};
pub use server::ConsoleServer;
