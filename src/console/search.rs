//! Fuzzy player search.
//!
//! Scoring, highest first:
//! - `1.0` when the query equals the name, ignoring case
//! - `0.9` when the query is a case-insensitive substring of the name
//! - otherwise the matching-block similarity ratio `2*M / (len(a) + len(b))`,
//!   where `M` is the total length of the blocks found by repeatedly taking the
//!   longest common run and recursing on both sides of it
//!
//! Anything scoring `<= 0.4` is dropped. Ranking is stable, so equal scores keep
//! the input (name) order.

use crate::storage::Player;

pub const EXACT_SCORE: f64 = 1.0;
pub const SUBSTRING_SCORE: f64 = 0.9;
pub const MATCH_THRESHOLD: f64 = 0.4;

/// Outcome of ranking a query against the player list.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome {
    /// Nothing cleared the threshold.
    NoMatches,
    /// Exactly one player matched; the caller can skip the selection step.
    Single(Player),
    /// Several players matched, best first.
    Ranked(Vec<(f64, Player)>),
}

/// Score one candidate name against a query, in `[0, 1]`.
pub fn score(query: &str, name: &str) -> f64 {
    let q = query.to_lowercase();
    let n = name.to_lowercase();
    if q == n {
        return EXACT_SCORE;
    }
    if n.contains(&q) {
        return SUBSTRING_SCORE;
    }
    similarity_ratio(&q, &n)
}

/// Matching-block similarity ratio between two strings.
pub fn similarity_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    let matched = matching_chars(&a, &b, 0, a.len(), 0, b.len());
    2.0 * matched as f64 / total as f64
}

/// Sum of matching block sizes within `a[alo..ahi]` and `b[blo..bhi]`.
fn matching_chars(a: &[char], b: &[char], alo: usize, ahi: usize, blo: usize, bhi: usize) -> usize {
    let (i, j, size) = longest_match(a, b, alo, ahi, blo, bhi);
    if size == 0 {
        return 0;
    }
    let mut total = size;
    if alo < i && blo < j {
        total += matching_chars(a, b, alo, i, blo, j);
    }
    if i + size < ahi && j + size < bhi {
        total += matching_chars(a, b, i + size, ahi, j + size, bhi);
    }
    total
}

/// Longest common run in the given windows. Ties go to the run starting
/// earliest in `a`, then earliest in `b`.
fn longest_match(
    a: &[char],
    b: &[char],
    alo: usize,
    ahi: usize,
    blo: usize,
    bhi: usize,
) -> (usize, usize, usize) {
    let (mut best_i, mut best_j, mut best_size) = (alo, blo, 0);
    // run[j + 1] = length of the common run ending at a[i], b[j]
    let mut prev = vec![0usize; bhi - blo + 1];
    for i in alo..ahi {
        let mut cur = vec![0usize; bhi - blo + 1];
        for j in blo..bhi {
            if a[i] == b[j] {
                let k = prev[j - blo] + 1;
                cur[j - blo + 1] = k;
                if k > best_size {
                    best_i = i + 1 - k;
                    best_j = j + 1 - k;
                    best_size = k;
                }
            }
        }
        prev = cur;
    }
    (best_i, best_j, best_size)
}

/// Score every player, drop those at or below the threshold, and sort best first.
pub fn rank(query: &str, players: &[Player]) -> Vec<(f64, Player)> {
    let query = query.trim();
    if query.is_empty() {
        return Vec::new();
    }
    let mut scored: Vec<(f64, Player)> = players
        .iter()
        .map(|p| (score(query, &p.name), p))
        .filter(|(s, _)| *s > MATCH_THRESHOLD)
        .map(|(s, p)| (s, p.clone()))
        .collect();
    // sort_by is stable; ties keep list order
    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
    scored
}

/// Rank and classify the result for the selection flow.
pub fn search(query: &str, players: &[Player]) -> SearchOutcome {
    let mut ranked = rank(query, players);
    match ranked.len() {
        0 => SearchOutcome::NoMatches,
        1 => SearchOutcome::Single(ranked.remove(0).1),
        _ => SearchOutcome::Ranked(ranked),
    }
}
