//! Line-oriented terminal transport.
//!
//! Reads one command per line from stdin, forwards it to the server as an
//! [`Interaction`] and prints the rendered reply. Numbers given to `select`
//! refer to the last list printed.

use log::{debug, warn};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, oneshot};

use super::interaction::{Component, Interaction, InteractionKind, Operator, Reply, SessionKey};
use super::render;
use super::server::Inbound;
use crate::config::Config;
use crate::storage::{Currency, Operation};

pub const HELP: &str = "\
Commands:
  manage                 open the player list
  search <name>          fuzzy search players
  clear                  clear the search
  next | prev            page through the list
  select <n|id|name>     open a player
  refresh                reload the selected player
  add gems|coins         start an adjustment
  remove gems|coins
  amount <n>             enter the amount (a bare number also works)
  confirm | cancel       resolve the pending adjustment
  back                   return to the list
  help | quit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Send(InteractionKind),
    Help,
    Quit,
    Empty,
    Invalid(String),
}

/// Transport-side state: the current session key and the last reply shown.
#[derive(Debug, Default)]
pub struct Terminal {
    key: Option<SessionKey>,
    last: Option<Reply>,
}

impl Terminal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn key(&self) -> Option<&SessionKey> {
        self.key.as_ref()
    }

    pub fn remember(&mut self, reply: Reply) {
        self.last = Some(reply);
    }

    fn awaiting_amount(&self) -> bool {
        self.last.as_ref().is_some_and(|r| {
            r.components
                .iter()
                .any(|c| matches!(c, Component::TextInput { label, .. } if label == "Amount"))
        })
    }

    /// Resolve `select` arguments: a 1-based index into the last list, or a
    /// raw identifier/name passed through to the server.
    fn select_target(&self, arg: &str) -> String {
        if let (Ok(n), Some(last)) = (arg.parse::<usize>(), self.last.as_ref()) {
            if let Some(opt) = n.checked_sub(1).and_then(|i| last.select_options().get(i)) {
                return opt.value.clone();
            }
        }
        arg.to_string()
    }

    pub fn parse(&self, line: &str) -> Command {
        let line = line.trim();
        if line.is_empty() {
            return Command::Empty;
        }
        let (verb, rest) = match line.split_once(char::is_whitespace) {
            Some((v, r)) => (v, r.trim()),
            None => (line, ""),
        };
        let kind = match verb.to_ascii_lowercase().as_str() {
            "help" | "?" => return Command::Help,
            "quit" | "exit" | "q" => return Command::Quit,
            "manage" | "m" => InteractionKind::Manage,
            "search" | "s" if !rest.is_empty() => InteractionKind::Search(rest.to_string()),
            "search" | "s" => return Command::Invalid("Usage: search <name>".to_string()),
            "clear" => InteractionKind::ClearSearch,
            "next" | "n" => InteractionKind::NextPage,
            "prev" | "p" => InteractionKind::PrevPage,
            "select" | "open" if !rest.is_empty() => InteractionKind::Select(self.select_target(rest)),
            "select" | "open" => return Command::Invalid("Usage: select <n|id|name>".to_string()),
            "refresh" | "r" => InteractionKind::Refresh,
            "back" | "b" => InteractionKind::Back,
            "confirm" | "yes" | "y" => InteractionKind::Confirm,
            "cancel" | "no" => InteractionKind::Cancel,
            "amount" => InteractionKind::SubmitAmount(rest.to_string()),
            "add" | "remove" => {
                let operation: Operation = match verb.parse() {
                    Ok(op) => op,
                    Err(e) => return Command::Invalid(e.to_string()),
                };
                let currency: Currency = match rest.parse() {
                    Ok(c) => c,
                    Err(e) => return Command::Invalid(e.to_string()),
                };
                InteractionKind::Begin(currency, operation)
            }
            _ if self.awaiting_amount() => InteractionKind::SubmitAmount(line.to_string()),
            _ => return Command::Invalid(format!("Unknown command '{}'. Type help.", verb)),
        };
        Command::Send(kind)
    }

    /// Wrap a parsed command; `Manage` opens a fresh session key.
    pub fn interaction(&mut self, operator: &Operator, kind: InteractionKind) -> Interaction {
        if kind == InteractionKind::Manage || self.key.is_none() {
            self.key = Some(SessionKey::generate());
        }
        let key = self.key.clone().unwrap_or_else(SessionKey::generate);
        Interaction::new(key, operator.clone(), kind)
    }
}

pub fn operator_from_config(config: &Config) -> Operator {
    Operator {
        id: config.console.operator_id,
        name: config.console.operator_name.clone(),
        roles: Vec::new(),
        administrator: config.console.operator_is_admin,
    }
}

/// Drive the terminal until EOF or `quit`. Dropping `tx` stops the server loop.
pub async fn run(tx: mpsc::UnboundedSender<Inbound>, operator: Operator) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    let mut terminal = Terminal::new();

    let _ = stdout
        .write_all(b"Economy Manager console. Type 'manage' to begin, 'help' for commands.\n")
        .await;
    loop {
        let _ = stdout.write_all(b"> ").await;
        let _ = stdout.flush().await;
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                warn!("stdin read error: {}", e);
                break;
            }
        };
        let kind = match terminal.parse(&line) {
            Command::Send(kind) => kind,
            Command::Help => {
                let _ = stdout.write_all(format!("{}\n", HELP).as_bytes()).await;
                continue;
            }
            Command::Quit => break,
            Command::Empty => continue,
            Command::Invalid(msg) => {
                let _ = stdout.write_all(format!("{}\n", msg).as_bytes()).await;
                continue;
            }
        };
        let (reply_tx, reply_rx) = oneshot::channel();
        let interaction = terminal.interaction(&operator, kind);
        if tx.send(Inbound { interaction, reply_tx }).is_err() {
            debug!("Console server stopped; closing terminal");
            break;
        }
        match reply_rx.await {
            Ok(reply) => {
                let _ = stdout.write_all(render::to_text(&reply).as_bytes()).await;
                terminal.remember(reply);
            }
            Err(_) => break,
        }
    }
}
