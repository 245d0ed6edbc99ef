use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use economy_manager::config::Config;
use economy_manager::console::audit::{AuditError, MemoryAuditSink};
use economy_manager::console::{
    AuditEntry, AuditSink, ConsoleServer, Interaction, InteractionKind, Operator, SessionKey,
};
use economy_manager::storage::memory::MemoryPlayerStore;
use economy_manager::storage::{Currency, Operation};
use tokio::sync::Semaphore;
mod common;
use common::{dec, roster, Harness};

/// Holds every delivery until a permit is released.
struct GatedSink {
    gate: Semaphore,
    delivered: MemoryAuditSink,
}

impl GatedSink {
    fn closed() -> Self {
        Self {
            gate: Semaphore::new(0),
            delivered: MemoryAuditSink::new(),
        }
    }
}

#[async_trait]
impl AuditSink for GatedSink {
    async fn deliver(&self, entry: &AuditEntry) -> Result<(), AuditError> {
        let _permit = self
            .gate
            .acquire()
            .await
            .map_err(|e| AuditError::Delivery(e.to_string()))?;
        self.delivered.deliver(entry).await
    }
}

#[tokio::test]
async fn add_gems_with_confirmation() {
    let mut h = Harness::new(roster());
    let detail = h.open("uuid-alice").await;
    assert!(detail.embed.is_some());

    let prompt = h
        .send(InteractionKind::Begin(Currency::Gems, Operation::Add))
        .await;
    assert!(prompt.content.contains("Alice"));

    let confirm = h.send(InteractionKind::SubmitAmount("25.50".into())).await;
    assert_eq!(
        confirm.content,
        "**Confirmation Required**\nAdd **25.50** 💎 gems to **Alice**?"
    );
    assert_eq!(h.store.adjust_calls(), 0, "nothing applied before confirm");

    let done = h.send(InteractionKind::Confirm).await;
    assert_eq!(
        done.content,
        "✅ Successfully added 25.50 gems. New balance: 125.50"
    );
    assert!(done.components.is_empty());
    assert_eq!(h.store.balance_of("uuid-alice", Currency::Gems), Some(dec("125.50")));

    assert_eq!(h.server.flush_audit().await, 1);
    let entries = h.audit.entries();
    assert_eq!(entries.len(), 1);
    let text = entries[0].render();
    assert!(text.contains("Added 25.50 gems"));
    assert!(text.contains("Alice"));
    assert!(text.contains("<@42>"));
}

#[tokio::test]
async fn remove_more_than_balance_is_rejected() {
    let mut h = Harness::new(roster());
    h.open("uuid-bob").await;
    h.send(InteractionKind::Begin(Currency::Coins, Operation::Remove))
        .await;
    h.send(InteractionKind::SubmitAmount("50".into())).await;
    let reply = h.send(InteractionKind::Confirm).await;

    assert_eq!(
        reply.content,
        "❌ Insufficient balance. Current: 10.00, Trying to remove: 50.00"
    );
    assert_eq!(h.store.balance_of("uuid-bob", Currency::Coins), Some(dec("10")));
    h.server.flush_audit().await;
    assert!(h.audit.entries().is_empty());
}

#[tokio::test]
async fn invalid_amounts_never_reach_the_store() {
    let mut h = Harness::new(roster());
    h.open("uuid-alice").await;
    h.send(InteractionKind::Begin(Currency::Gems, Operation::Remove))
        .await;
    let calls_before = h.store.calls();

    for bad in ["abc", "-5", "0", "", "1.2.3", "12345678901"] {
        let reply = h.send(InteractionKind::SubmitAmount(bad.into())).await;
        assert!(reply.content.starts_with("❌"), "input {:?}: {}", bad, reply.content);
    }
    // confirm without a valid amount does nothing either
    h.send(InteractionKind::Confirm).await;

    assert_eq!(h.store.calls(), calls_before);
    assert_eq!(h.store.adjust_calls(), 0);
    assert_eq!(h.store.balance_of("uuid-alice", Currency::Gems), Some(dec("100.00")));
}

#[tokio::test]
async fn cancel_then_confirm_changes_nothing() {
    let mut h = Harness::new(roster());
    h.open("uuid-alice").await;
    h.send(InteractionKind::Begin(Currency::Coins, Operation::Add))
        .await;
    h.send(InteractionKind::SubmitAmount("5".into())).await;

    let cancelled = h.send(InteractionKind::Cancel).await;
    assert_eq!(cancelled.content, "❌ Transaction cancelled.");
    h.send(InteractionKind::Confirm).await;

    assert_eq!(h.store.adjust_calls(), 0);
    h.server.flush_audit().await;
    assert!(h.audit.entries().is_empty());
    assert_eq!(h.store.balance_of("uuid-alice", Currency::Coins), Some(dec("250")));
}

#[tokio::test]
async fn second_confirm_and_late_cancel_have_no_effect() {
    let mut h = Harness::new(roster());
    h.open("uuid-alice").await;
    h.send(InteractionKind::Begin(Currency::Gems, Operation::Add))
        .await;
    h.send(InteractionKind::SubmitAmount("1".into())).await;
    h.send(InteractionKind::Confirm).await;

    let again = h.send(InteractionKind::Confirm).await;
    assert!(again.content.contains("no longer active"));
    let late_cancel = h.send(InteractionKind::Cancel).await;
    assert!(late_cancel.content.contains("no longer active"));

    assert_eq!(h.store.adjust_calls(), 1);
    h.server.flush_audit().await;
    assert_eq!(h.audit.entries().len(), 1);
    assert_eq!(h.store.balance_of("uuid-alice", Currency::Gems), Some(dec("101")));
}

#[tokio::test]
async fn audit_failure_keeps_the_change() {
    let mut h = Harness::new(roster());
    h.audit.set_failing(true);
    h.open("uuid-alan").await;
    h.send(InteractionKind::Begin(Currency::Gems, Operation::Remove))
        .await;
    h.send(InteractionKind::SubmitAmount("2.5".into())).await;
    let reply = h.send(InteractionKind::Confirm).await;

    assert!(reply.content.starts_with("✅"));
    assert_eq!(h.store.balance_of("uuid-alan", Currency::Gems), Some(dec("10")));
    assert_eq!(h.server.flush_audit().await, 0);
    assert!(h.audit.entries().is_empty());
}

#[tokio::test]
async fn store_outage_is_reported_generically() {
    let mut h = Harness::new(roster());
    h.open("uuid-alice").await;
    h.send(InteractionKind::Begin(Currency::Gems, Operation::Add))
        .await;
    h.send(InteractionKind::SubmitAmount("3".into())).await;
    h.store.set_unavailable(true);
    let reply = h.send(InteractionKind::Confirm).await;

    assert!(reply.content.starts_with("❌"));
    assert!(!reply.content.contains("pool"), "internal detail leaked: {}", reply.content);
    h.server.flush_audit().await;
    assert!(h.audit.entries().is_empty());
}

#[tokio::test]
async fn removed_row_between_select_and_confirm() {
    let mut h = Harness::new(roster());
    h.open("uuid-bob").await;
    h.send(InteractionKind::Begin(Currency::Coins, Operation::Add))
        .await;
    h.send(InteractionKind::SubmitAmount("1".into())).await;
    assert!(h.store.delete("uuid-bob"));
    let reply = h.send(InteractionKind::Confirm).await;
    assert_eq!(reply.content, "❌ Player not found.");
    h.server.flush_audit().await;
    assert!(h.audit.entries().is_empty());
}

#[tokio::test]
async fn detail_view_reflects_new_balance() {
    let mut h = Harness::new(roster());
    h.open("uuid-alice").await;
    h.send(InteractionKind::Begin(Currency::Gems, Operation::Add))
        .await;
    h.send(InteractionKind::SubmitAmount("1000".into())).await;
    h.send(InteractionKind::Confirm).await;

    let refreshed = h.send(InteractionKind::Refresh).await;
    let embed = refreshed.embed.expect("detail embed");
    assert_eq!(embed.fields[0].value, "`1,100.00`");
}

#[tokio::test]
async fn slow_audit_does_not_hold_up_replies() {
    let store = Arc::new(MemoryPlayerStore::new(roster()));
    let sink = Arc::new(GatedSink::closed());
    let mut server = ConsoleServer::new(Config::default(), store.clone(), sink.clone());
    let first = Operator::admin(1, "first");
    let second = Operator::admin(2, "second");
    let a = SessionKey::new("a");
    let b = SessionKey::new("b");
    let send = |key: &SessionKey, op: &Operator, kind| Interaction::new(key.clone(), op.clone(), kind);

    server.handle(send(&a, &first, InteractionKind::Manage)).await;
    server
        .handle(send(&a, &first, InteractionKind::Select("uuid-alice".into())))
        .await;
    server
        .handle(send(&a, &first, InteractionKind::Begin(Currency::Gems, Operation::Add)))
        .await;
    server
        .handle(send(&a, &first, InteractionKind::SubmitAmount("0.009".into())))
        .await;

    let reply = tokio::time::timeout(
        Duration::from_secs(1),
        server.handle(send(&a, &first, InteractionKind::Confirm)),
    )
    .await
    .expect("confirm reply waited on audit delivery");
    assert_eq!(
        reply.content,
        "✅ Successfully added 0.01 gems. New balance: 100.01"
    );
    assert_eq!(server.pending_audit(), 1);

    // another operator is served while the entry is still in flight
    let other = tokio::time::timeout(
        Duration::from_secs(1),
        server.handle(send(&b, &second, InteractionKind::Manage)),
    )
    .await
    .expect("second operator blocked by audit delivery");
    assert_eq!(other.select_options().len(), 3);
    assert!(sink.delivered.entries().is_empty());

    sink.gate.add_permits(1);
    assert_eq!(server.flush_audit().await, 1);
    let entries = sink.delivered.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].action(), "Added 0.01 gems");
    assert_eq!(store.balance_of("uuid-alice", Currency::Gems), Some(dec("100.009")));
}
