//! Ranking passes.
//!
//! Active players are ordered by chips descending with the earlier joiner
//! winning a tie. Players knocked out in bulk are ordered by join time
//! descending, so the most recent joiner ranks worst within the batch.

use super::models::{CompetitionPlayer, CompetitionPlayerStatus, CompetitionRank};
use crate::table::{PlayerId, Table};
use std::cmp::Ordering;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankData {
    pub player_id: PlayerId,
    /// 0 = seated but not in the hand
    pub rank: u32,
    pub chips: i64,
}

/// Chips descending; join key ascending when both keys are known
fn compare_active<F>(a: (&str, i64), b: (&str, i64), join_key: &F) -> Ordering
where
    F: Fn(&str) -> Option<(i64, u64)>,
{
    b.1.cmp(&a.1).then_with(|| match (join_key(a.0), join_key(b.0)) {
        (Some(key_a), Some(key_b)) => key_a.cmp(&key_b),
        _ => Ordering::Equal,
    })
}

/// Rank a settled table's hand participants
///
/// # Arguments
///
/// * `table` - Settled table snapshot
/// * `join_key` - Join ordering key lookup by player id
///
/// # Returns
///
/// * `Vec<RankData>` - Participants ranked 1..n, then seated non-participants at rank 0
pub fn table_ranking_data<F>(table: &Table, join_key: F) -> Vec<RankData>
where
    F: Fn(&str) -> Option<(i64, u64)>,
{
    let players = &table.state.player_states;
    let mut participants: Vec<_> = table
        .state
        .game_player_indexes
        .iter()
        .filter_map(|&idx| players.get(idx))
        .collect();

    participants.sort_by(|a, b| {
        compare_active(
            (a.player_id.as_str(), a.bankroll),
            (b.player_id.as_str(), b.bankroll),
            &join_key,
        )
    });

    let mut ranking: Vec<RankData> = participants
        .iter()
        .zip(1..)
        .map(|(player, rank)| RankData {
            player_id: player.player_id.clone(),
            rank,
            chips: player.bankroll,
        })
        .collect();

    for player in players {
        if !ranking.iter().any(|r| r.player_id == player.player_id) {
            ranking.push(RankData {
                player_id: player.player_id.clone(),
                rank: 0,
                chips: player.bankroll,
            });
        }
    }

    ranking
}

/// Players knocked out when buy-in stops, most recent joiner first
pub fn stop_buy_in_knockout_rankings(players: &[CompetitionPlayer]) -> Vec<PlayerId> {
    let mut knockouts: Vec<&CompetitionPlayer> = players
        .iter()
        .filter(|p| p.chips == 0 && p.status == CompetitionPlayerStatus::ReBuyWaiting)
        .collect();

    knockouts.sort_by(|a, b| b.join_at.cmp(&a.join_at));
    knockouts.iter().map(|p| p.player_id.clone()).collect()
}

/// Rank every player still holding chips
pub fn final_competition_rankings<F>(players: &[CompetitionPlayer], join_key: F) -> Vec<RankData>
where
    F: Fn(&str) -> Option<(i64, u64)>,
{
    let mut active: Vec<&CompetitionPlayer> = players.iter().filter(|p| p.chips > 0).collect();
    active.sort_by(|a, b| {
        compare_active(
            (a.player_id.as_str(), a.chips),
            (b.player_id.as_str(), b.chips),
            &join_key,
        )
    });

    active
        .iter()
        .zip(1..)
        .map(|(player, rank)| RankData {
            player_id: player.player_id.clone(),
            rank,
            chips: player.chips,
        })
        .collect()
}

/// Merge live rankings into the knockout list and return best-first order
///
/// `knockouts` is in elimination order, earliest first.
pub fn settle_rankings(knockouts: &[CompetitionRank], live: &[RankData]) -> Vec<CompetitionRank> {
    let mut rankings = knockouts.to_vec();
    rankings.extend(live.iter().rev().map(|r| CompetitionRank {
        player_id: r.player_id.clone(),
        final_chips: r.chips,
    }));
    rankings.reverse();
    rankings
}
