//! Audit trail for applied adjustments.
//!
//! Delivery is best-effort and runs on its own task: the balance change is
//! already committed when an entry is emitted, so a failed delivery is logged
//! and counted but never surfaces as an error to the operator.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{info, warn};
use rust_decimal::Decimal;
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;

use super::interaction::Operator;
use crate::logutil::escape_log;
use crate::metrics;
use crate::storage::{format_cents, Currency, Operation};

#[derive(Debug, Clone, PartialEq)]
pub struct AuditEntry {
    pub player_id: String,
    pub player_name: String,
    pub currency: Currency,
    pub operation: Operation,
    pub amount: Decimal,
    pub new_balance: Decimal,
    pub operator: Operator,
    pub at: DateTime<Utc>,
}

impl AuditEntry {
    /// "Added 25.50 gems"
    pub fn action(&self) -> String {
        format!(
            "{} {} {}",
            self.operation.past_title(),
            format_cents(&self.amount),
            self.currency
        )
    }

    /// Chat-formatted record posted to the audit channel.
    pub fn render(&self) -> String {
        format!(
            "{} **Economy Update**\n\
             **Action:** {}\n\
             **Player:** {}\n\
             **Admin:** {}\n\
             **Time:** <t:{}:F>",
            self.currency.emoji(),
            self.action(),
            self.player_name,
            self.operator.mention(),
            self.at.timestamp()
        )
    }

    /// One-line form for the log file.
    pub fn summary(&self) -> String {
        format!(
            "{} for {} ({}) by {}; new balance {}",
            self.action(),
            escape_log(&self.player_name),
            escape_log(&self.player_id),
            escape_log(&self.operator.to_string()),
            format_cents(&self.new_balance)
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    #[error("audit channel not configured")]
    NotConfigured,
    #[error("audit delivery failed: {0}")]
    Delivery(String),
    #[error("audit delivery rejected with status {0}")]
    Rejected(u16),
}

#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn deliver(&self, entry: &AuditEntry) -> Result<(), AuditError>;
}

/// Deliver `entry` in the background. The handle resolves to whether it landed.
pub fn spawn_delivery(sink: Arc<dyn AuditSink>, entry: AuditEntry) -> JoinHandle<bool> {
    tokio::spawn(async move {
        match sink.deliver(&entry).await {
            Ok(()) => {
                metrics::inc_audit_delivered();
                true
            }
            Err(e) => {
                metrics::inc_audit_failed();
                warn!("Audit delivery failed for {}: {}", entry.summary(), e);
                false
            }
        }
    })
}

/// Writes entries to the `audit` log target only.
#[derive(Debug, Default)]
pub struct LogAuditSink;

#[async_trait]
impl AuditSink for LogAuditSink {
    async fn deliver(&self, entry: &AuditEntry) -> Result<(), AuditError> {
        info!(target: "audit", "{}", entry.summary());
        Ok(())
    }
}

/// Keeps entries in memory; `set_failing` makes every delivery fail.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    entries: Mutex<Vec<AuditEntry>>,
    failing: std::sync::atomic::AtomicBool,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing
            .store(failing, std::sync::atomic::Ordering::SeqCst);
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn deliver(&self, entry: &AuditEntry) -> Result<(), AuditError> {
        if self.failing.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(AuditError::Delivery("sink offline".to_string()));
        }
        self.entries
            .lock()
            .map_err(|_| AuditError::Delivery("sink lock poisoned".to_string()))?
            .push(entry.clone());
        Ok(())
    }
}

/// Posts entries to a chat channel over the REST API.
#[cfg(feature = "channel-audit")]
pub struct ChannelAuditSink {
    client: reqwest::Client,
    url: String,
    token: String,
}

#[cfg(feature = "channel-audit")]
impl ChannelAuditSink {
    pub fn new(cfg: &crate::config::DiscordConfig) -> Result<Self, AuditError> {
        let channel = cfg.log_channel_id.ok_or(AuditError::NotConfigured)?;
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(cfg.audit_timeout_seconds))
            .build()
            .map_err(|e| AuditError::Delivery(e.to_string()))?;
        Ok(Self {
            client,
            url: format!(
                "{}/channels/{}/messages",
                cfg.api_base.trim_end_matches('/'),
                channel
            ),
            token: cfg.token.clone(),
        })
    }
}

#[cfg(feature = "channel-audit")]
#[async_trait]
impl AuditSink for ChannelAuditSink {
    async fn deliver(&self, entry: &AuditEntry) -> Result<(), AuditError> {
        info!(target: "audit", "{}", entry.summary());
        let body = serde_json::json!({
            "content": entry.render(),
            "allowed_mentions": { "parse": [] },
        });
        let resp = self
            .client
            .post(&self.url)
            .header("Authorization", format!("Bot {}", self.token))
            .json(&body)
            .send()
            .await
            .map_err(|e| AuditError::Delivery(e.to_string()))?;
        let status = resp.status();
        if status.is_success() {
            Ok(())
        } else {
            warn!("Audit channel rejected entry: HTTP {}", status.as_u16());
            Err(AuditError::Rejected(status.as_u16()))
        }
    }
}
