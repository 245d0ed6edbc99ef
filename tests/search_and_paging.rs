use economy_manager::console::pager::PAGE_SIZE;
use economy_manager::console::search::{rank, score, MATCH_THRESHOLD};
use economy_manager::console::InteractionKind;
mod common;
use common::{player, roster, Harness};

#[test]
fn ali_ranks_alice_over_alan_and_drops_bob() {
    let ranked = rank("ali", &roster());
    assert_eq!(ranked.len(), 2);
    assert_eq!(ranked[0].1.name, "Alice");
    assert!(ranked[0].0 >= 0.9);
    assert_eq!(ranked[1].1.name, "Alan");
    assert!(ranked[1].0 > MATCH_THRESHOLD && ranked[1].0 < ranked[0].0);
    assert!(score("ali", "Bob") <= MATCH_THRESHOLD);
}

#[tokio::test]
async fn single_match_opens_detail() {
    let mut h = Harness::new(roster());
    h.send(InteractionKind::Manage).await;
    let reply = h.send(InteractionKind::Search("bob".into())).await;
    let embed = reply.embed.expect("detail view");
    assert!(embed.description.contains("**Player:** Bob"));
}

#[tokio::test]
async fn several_matches_list_best_first() {
    let mut h = Harness::new(roster());
    h.send(InteractionKind::Manage).await;
    let reply = h.send(InteractionKind::Search("ali".into())).await;
    assert!(reply.embed.is_none());
    let labels: Vec<&str> = reply.select_options().iter().map(|o| o.label.as_str()).collect();
    assert_eq!(labels, vec!["Alice", "Alan"]);
    assert!(reply.content.contains("Search results for 'ali'"));

    let cleared = h.send(InteractionKind::ClearSearch).await;
    assert_eq!(cleared.select_options().len(), 3);
}

#[tokio::test]
async fn no_match_keeps_the_list() {
    let mut h = Harness::new(roster());
    h.send(InteractionKind::Manage).await;
    let reply = h.send(InteractionKind::Search("zzz".into())).await;
    assert!(reply.content.starts_with("❌ No players match 'zzz'."));
    assert_eq!(reply.select_options().len(), 3);
}

#[tokio::test]
async fn paging_walks_the_whole_roster_without_requerying() {
    let players: Vec<_> = (0..60)
        .map(|i| player(&format!("id-{:02}", i), &format!("Player {:02}", i), "1", "1"))
        .collect();
    let mut h = Harness::new(players.clone());

    let first = h.send(InteractionKind::Manage).await;
    let calls_after_manage = h.store.calls();
    assert!(!first.has_action(&InteractionKind::PrevPage));
    assert!(first.has_action(&InteractionKind::NextPage));

    let mut seen: Vec<String> = first.select_options().iter().map(|o| o.value.clone()).collect();
    assert_eq!(seen.len(), PAGE_SIZE);
    loop {
        let page = h.send(InteractionKind::NextPage).await;
        let values: Vec<String> = page.select_options().iter().map(|o| o.value.clone()).collect();
        seen.extend(values);
        if !page.has_action(&InteractionKind::NextPage) {
            assert!(page.has_action(&InteractionKind::PrevPage));
            break;
        }
    }
    let expected: Vec<String> = players.iter().map(|p| p.id.clone()).collect();
    assert_eq!(seen, expected);
    assert_eq!(h.store.calls(), calls_after_manage);

    let back = h.send(InteractionKind::PrevPage).await;
    assert!(back.content.contains("60 players"));
}

#[tokio::test]
async fn empty_table_message() {
    let mut h = Harness::new(Vec::new());
    let reply = h.send(InteractionKind::Manage).await;
    assert_eq!(reply.content, "❌ No players found in the database.");
}
