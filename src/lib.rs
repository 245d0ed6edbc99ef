//! # Economy Manager - Administrative Console for Player Balances
//!
//! Economy Manager lets server operators inspect and adjust the two balances
//! ("gems" and "coins") stored against player rows in a relational table. It is
//! driven through a chat-style interaction model: an operator opens the console,
//! pages or fuzzy-searches the player list, opens a player, and applies an
//! add/remove adjustment through a confirmation step. Applied changes are
//! mirrored to an audit channel on a best-effort basis.
//!
//! ## Features
//!
//! - **Player Browser**: 25-entry pages with previous/next affordances and a page indicator.
//! - **Fuzzy Search**: Exact, substring, and matching-block similarity ranking with a 0.4 cut-off.
//! - **Guarded Adjustments**: Row-locked read and conditional write; balances never go negative.
//! - **Confirmation Flow**: Explicit amount → confirm/cancel state machine with idle expiry.
//! - **Audit Trail**: Pluggable sink, chat-channel delivery when configured.
//! - **Async Design**: Built on Tokio and a pooled `sqlx` MySQL connection.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use economy_manager::config::Config;
//! use economy_manager::console::ConsoleServer;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load(Some("config.toml")).await?;
//!     let server = ConsoleServer::connect(config).await?;
//!     server.run_stdio().await
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`console`] - Sessions, interaction routing, search, pagination, adjustment flow, audit
//! - [`storage`] - Player records and the `PlayerStore` seam (MySQL and in-memory)
//! - [`config`] - Environment and TOML configuration with validation
//! - [`validation`] - Amount parsing and SQL identifier checks
//! - [`logutil`] - Single-line log sanitising helpers
//! - [`metrics`] - Process-wide workflow counters
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │  Transport      │ ← Terminal (stdin) or any chat adapter producing Interactions
//! └─────────────────┘
//!          │
//! ┌─────────────────┐
//! │  ConsoleServer  │ ← Sessions, search, paging, adjustment state machine
//! └─────────────────┘
//!          │
//! ┌─────────────────┐    ┌─────────────────┐
//! │  PlayerStore    │    │   AuditSink     │
//! └─────────────────┘    └─────────────────┘
//! ```

pub mod config;
pub mod console;
pub mod logutil;
pub mod metrics;
pub mod storage;
pub mod validation;
