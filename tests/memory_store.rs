use economy_manager::storage::memory::MemoryPlayerStore;
use economy_manager::storage::{adjust_balance_raw, Currency, Operation, PlayerStore, StoreError};
mod common;
use common::{dec, player, roster};

#[tokio::test]
async fn list_is_sorted_by_name() {
    let store = MemoryPlayerStore::new(roster());
    let names: Vec<String> = store
        .list_players()
        .await
        .unwrap()
        .into_iter()
        .map(|p| p.name)
        .collect();
    assert_eq!(names, vec!["Alan", "Alice", "Bob"]);
}

#[tokio::test]
async fn identifier_wins_over_name() {
    // one player's name collides with another's identifier
    let store = MemoryPlayerStore::new(vec![
        player("uuid-1", "uuid-2", "1", "1"),
        player("uuid-2", "Real", "2", "2"),
        player("uuid-3", "Twin", "3", "3"),
        player("uuid-4", "Twin", "4", "4"),
    ]);
    let hit = store.get_player("uuid-2").await.unwrap().unwrap();
    assert_eq!(hit.name, "Real");
    let twin = store.get_player("Twin").await.unwrap().unwrap();
    assert_eq!(twin.id, "uuid-3");
    assert!(store.get_player("nobody").await.unwrap().is_none());
}

#[tokio::test]
async fn adjust_adds_and_removes_exactly() {
    let store = MemoryPlayerStore::new(roster());
    let out = store
        .adjust_balance("uuid-alice", Currency::Gems, dec("25.50"), Operation::Add)
        .await;
    assert_eq!(out.message(), "Successfully added 25.50 gems. New balance: 125.50");

    let out = store
        .adjust_balance("uuid-alice", Currency::Gems, dec("125.50"), Operation::Remove)
        .await;
    assert!(out.ok());
    assert_eq!(store.balance_of("uuid-alice", Currency::Gems), Some(dec("0")));
}

#[tokio::test]
async fn writes_match_identifier_only() {
    let store = MemoryPlayerStore::new(roster());
    let out = store
        .adjust_balance("Alice", Currency::Gems, dec("1"), Operation::Add)
        .await;
    assert!(matches!(out.error(), Some(StoreError::NotFound(_))));
    assert_eq!(store.balance_of("uuid-alice", Currency::Gems), Some(dec("100")));
}

#[tokio::test]
async fn renamed_player_is_still_adjusted_by_identifier() {
    let store = MemoryPlayerStore::new(roster());
    assert!(store.rename("uuid-alice", "Alicia"));
    let out = store
        .adjust_balance("uuid-alice", Currency::Coins, dec("5"), Operation::Add)
        .await;
    assert!(out.ok());
    assert_eq!(store.balance_of("uuid-alice", Currency::Coins), Some(dec("255")));
    assert!(store.get_player("Alice").await.unwrap().is_none());
    assert_eq!(store.get_player("Alicia").await.unwrap().unwrap().id, "uuid-alice");
}

#[tokio::test]
async fn raw_inputs_are_checked_before_store_access() {
    let store = MemoryPlayerStore::new(roster());
    for (currency, amount, op) in [
        ("rubies", "1", "add"),
        ("gems", "1", "steal"),
        ("gems", "0", "add"),
        ("coins", "-3", "remove"),
    ] {
        let out = adjust_balance_raw(&store, "uuid-alice", currency, dec(amount), op).await;
        assert!(!out.ok());
    }
    assert_eq!(store.calls(), 0);

    let (ok, message) = adjust_balance_raw(&store, "uuid-bob", "coins", dec("50"), "remove")
        .await
        .into_pair();
    assert!(!ok);
    assert_eq!(message, "Insufficient balance. Current: 10.00, Trying to remove: 50.00");
}

#[tokio::test]
async fn concurrent_removes_never_overdraw() {
    let store = std::sync::Arc::new(MemoryPlayerStore::new(roster()));
    let mut handles = Vec::new();
    for _ in 0..8 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            store
                .adjust_balance("uuid-bob", Currency::Coins, dec("3"), Operation::Remove)
                .await
                .ok()
        }));
    }
    let mut applied = 0;
    for h in handles {
        if h.await.unwrap() {
            applied += 1;
        }
    }
    assert_eq!(applied, 3);
    assert_eq!(store.balance_of("uuid-bob", Currency::Coins), Some(dec("1")));
}

#[tokio::test]
async fn outage_surfaces_as_unavailable() {
    let store = MemoryPlayerStore::new(roster());
    store.set_unavailable(true);
    assert!(matches!(store.ping().await, Err(StoreError::Unavailable(_))));
    let out = store
        .adjust_balance("uuid-alice", Currency::Gems, dec("1"), Operation::Add)
        .await;
    assert!(out.error().is_some_and(|e| e.is_system_fault()));
}

#[test]
fn demo_store_has_sample_players() {
    let store = MemoryPlayerStore::demo();
    let players = tokio_test::block_on(store.list_players()).unwrap();
    assert_eq!(players.len(), 5);
    assert_eq!(players[0].name, "Alan");
    tokio_test::assert_ok!(tokio_test::block_on(store.ping()));
}
