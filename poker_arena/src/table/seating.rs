//! Seat and dealer allocation.
//!
//! Pure functions over a table's seat map and player list: random seat
//! assignment, dead-button detection, dealer rotation, participant rotation
//! and table positions. Nothing here holds state.

use super::{
    config::Rule,
    errors::{TableError, TableResult},
    models::{Position, TablePlayerState},
};
use rand::seq::{IndexedRandom, SliceRandom};
use std::collections::HashMap;

/// Pick `count` distinct empty seats in uniformly random order
///
/// # Arguments
///
/// * `seat_map` - Seat to player-index map
/// * `count` - Number of seats wanted
///
/// # Returns
///
/// * `TableResult<Vec<usize>>` - Chosen seats, or `NoEmptySeats` if fewer are free
pub fn assign_seats(seat_map: &[Option<usize>], count: usize) -> TableResult<Vec<usize>> {
    let mut empty_seats: Vec<usize> = seat_map
        .iter()
        .enumerate()
        .filter_map(|(seat, occupant)| occupant.is_none().then_some(seat))
        .collect();

    if empty_seats.len() < count {
        return Err(TableError::NoEmptySeats);
    }

    empty_seats.shuffle(&mut rand::rng());
    empty_seats.truncate(count);
    Ok(empty_seats)
}

/// True if `seat` lies strictly clockwise between `from` and `to`
fn is_seat_between(seat: usize, from: usize, to: usize) -> bool {
    if to >= from {
        seat > from && seat < to
    } else {
        seat > from || seat < to
    }
}

/// Dead-button check: is `seat` strictly between the dealer and big blind?
///
/// Always false under the short-deck rule, and when either button is unset.
pub fn is_between_dealer_bb(
    seat: usize,
    dealer_seat: Option<usize>,
    bb_seat: Option<usize>,
    rule: Rule,
) -> bool {
    if rule == Rule::ShortDeck {
        return false;
    }

    match (dealer_seat, bb_seat) {
        (Some(dealer), Some(bb)) => is_seat_between(seat, dealer, bb),
        _ => false,
    }
}

/// Seats a hand's dealer rotation has skipped over
pub fn is_between_dealers(seat: usize, prev_dealer_seat: usize, new_dealer_seat: usize) -> bool {
    is_seat_between(seat, prev_dealer_seat, new_dealer_seat)
}

fn is_dealer_candidate(player: &TablePlayerState) -> bool {
    player.is_participated && player.is_in
}

/// Choose the player index holding the dealer button for the next hand
///
/// The first hand (or a table with no previous dealer) picks a uniformly
/// random candidate. Later hands scan clockwise from the seat after the
/// previous dealer and take the first participating, joined player.
///
/// # Arguments
///
/// * `game_count` - Hands played so far
/// * `prev_dealer_seat` - Dealer seat of the previous hand
/// * `min_players` - Minimum candidates required for a dealer to exist
/// * `players` - Table player list
/// * `seat_map` - Seat to player-index map
///
/// # Returns
///
/// * `Option<usize>` - Player-list index of the new dealer
pub fn find_dealer_player_index(
    game_count: u32,
    prev_dealer_seat: Option<usize>,
    min_players: usize,
    players: &[TablePlayerState],
    seat_map: &[Option<usize>],
) -> Option<usize> {
    let candidates: Vec<usize> = players
        .iter()
        .enumerate()
        .filter_map(|(idx, p)| is_dealer_candidate(p).then_some(idx))
        .collect();

    if candidates.is_empty() || candidates.len() < min_players {
        return None;
    }

    let prev_dealer_seat = match prev_dealer_seat {
        Some(seat) if game_count > 0 => seat,
        _ => {
            return candidates
                .choose(&mut rand::rng())
                .copied()
                .or_else(|| candidates.first().copied());
        }
    };

    let seat_count = seat_map.len();
    (1..=seat_count)
        .map(|offset| (prev_dealer_seat + offset) % seat_count)
        .filter_map(|seat| seat_map[seat])
        .find(|&idx| players.get(idx).is_some_and(is_dealer_candidate))
}

/// Participating players in clockwise seat order starting at the dealer seat
pub fn find_game_player_indexes(
    dealer_seat: usize,
    seat_map: &[Option<usize>],
    players: &[TablePlayerState],
) -> Vec<usize> {
    let seat_count = seat_map.len();
    (0..seat_count)
        .map(|offset| (dealer_seat + offset) % seat_count)
        .filter_map(|seat| seat_map[seat])
        .filter(|&idx| players.get(idx).is_some_and(|p| p.is_participated))
        .collect()
}

/// Position layout by participant count, dealer first
fn position_layout(count: usize) -> Option<Vec<Vec<Position>>> {
    use Position::*;

    let layout: Vec<Vec<Position>> = match count {
        2 => vec![vec![Dealer, Sb], vec![Bb]],
        3 => vec![vec![Dealer], vec![Sb], vec![Bb]],
        4 => vec![vec![Dealer], vec![Sb], vec![Bb], vec![Ug]],
        5 => vec![vec![Dealer], vec![Sb], vec![Bb], vec![Ug], vec![Co]],
        6 => vec![vec![Dealer], vec![Sb], vec![Bb], vec![Ug], vec![Hj], vec![Co]],
        7 => vec![
            vec![Dealer],
            vec![Sb],
            vec![Bb],
            vec![Ug],
            vec![Mp],
            vec![Hj],
            vec![Co],
        ],
        8 => vec![
            vec![Dealer],
            vec![Sb],
            vec![Bb],
            vec![Ug],
            vec![Ug2],
            vec![Mp],
            vec![Hj],
            vec![Co],
        ],
        9 => vec![
            vec![Dealer],
            vec![Sb],
            vec![Bb],
            vec![Ug],
            vec![Ug2],
            vec![Mp],
            vec![Mp2],
            vec![Hj],
            vec![Co],
        ],
        10 => vec![
            vec![Dealer],
            vec![Sb],
            vec![Bb],
            vec![Ug],
            vec![Ug2],
            vec![Ug3],
            vec![Mp],
            vec![Mp2],
            vec![Hj],
            vec![Co],
        ],
        _ => return None,
    };

    Some(layout)
}

/// Table positions keyed by player-list index
///
/// Unsupported participant counts yield an empty map.
pub fn player_position_map(game_player_indexes: &[usize]) -> HashMap<usize, Vec<Position>> {
    match position_layout(game_player_indexes.len()) {
        Some(layout) => game_player_indexes
            .iter()
            .copied()
            .zip(layout)
            .collect(),
        None => HashMap::new(),
    }
}

/// Seat of the big blind for a participant rotation
pub fn find_bb_seat(players: &[TablePlayerState], game_player_indexes: &[usize]) -> Option<usize> {
    let rotation_idx = match game_player_indexes.len() {
        0 | 1 => return None,
        2 => 1,
        _ => 2,
    };

    game_player_indexes
        .get(rotation_idx)
        .and_then(|&idx| players.get(idx))
        .map(|p| p.seat)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::models::TablePlayerGameStatistics;

    fn seated(seats: &[usize], seat_count: usize) -> (Vec<TablePlayerState>, Vec<Option<usize>>) {
        let mut seat_map = vec![None; seat_count];
        let players = seats
            .iter()
            .enumerate()
            .map(|(idx, &seat)| {
                seat_map[seat] = Some(idx);
                TablePlayerState {
                    player_id: format!("p{}", idx),
                    seat,
                    positions: vec![Position::Unknown],
                    is_participated: true,
                    is_between_dealer_bb: false,
                    bankroll: 1000,
                    is_in: true,
                    game_statistics: TablePlayerGameStatistics::default(),
                }
            })
            .collect();
        (players, seat_map)
    }

    #[test]
    fn test_assign_seats_picks_empty_seats() {
        let seat_map = vec![Some(0), None, None, Some(1), None];
        let seats = assign_seats(&seat_map, 3).unwrap();
        let mut sorted = seats.clone();
        sorted.sort();
        assert_eq!(sorted, vec![1, 2, 4]);
    }

    #[test]
    fn test_assign_seats_no_empty_seats() {
        let seat_map = vec![Some(0), None];
        assert!(matches!(
            assign_seats(&seat_map, 2),
            Err(TableError::NoEmptySeats)
        ));
    }

    #[test]
    fn test_between_dealer_bb() {
        assert!(is_between_dealer_bb(3, Some(1), Some(5), Rule::Default));
        assert!(!is_between_dealer_bb(5, Some(1), Some(5), Rule::Default));
        assert!(!is_between_dealer_bb(1, Some(1), Some(5), Rule::Default));
        // wrapping past seat 0
        assert!(is_between_dealer_bb(8, Some(7), Some(1), Rule::Default));
        assert!(is_between_dealer_bb(0, Some(7), Some(1), Rule::Default));
        assert!(!is_between_dealer_bb(4, Some(7), Some(1), Rule::Default));
        assert!(!is_between_dealer_bb(3, Some(1), Some(5), Rule::ShortDeck));
        assert!(!is_between_dealer_bb(3, None, Some(5), Rule::Default));
    }

    #[test]
    fn test_dealer_rotates_clockwise() {
        let (players, seat_map) = seated(&[1, 4, 7], 9);
        assert_eq!(
            find_dealer_player_index(1, Some(1), 2, &players, &seat_map),
            Some(1)
        );
        assert_eq!(
            find_dealer_player_index(2, Some(7), 2, &players, &seat_map),
            Some(0)
        );
    }

    #[test]
    fn test_dealer_skips_non_participants() {
        let (mut players, seat_map) = seated(&[1, 4, 7], 9);
        players[1].is_participated = false;
        assert_eq!(
            find_dealer_player_index(3, Some(1), 2, &players, &seat_map),
            Some(2)
        );
    }

    #[test]
    fn test_first_dealer_is_a_candidate() {
        let (mut players, seat_map) = seated(&[0, 2, 5], 6);
        players[0].is_in = false;
        for _ in 0..20 {
            let idx = find_dealer_player_index(0, None, 2, &players, &seat_map).unwrap();
            assert_ne!(idx, 0);
        }
    }

    #[test]
    fn test_no_dealer_below_min_players() {
        let (mut players, seat_map) = seated(&[0, 2], 6);
        players[1].is_participated = false;
        assert_eq!(find_dealer_player_index(0, None, 2, &players, &seat_map), None);
    }

    #[test]
    fn test_game_player_indexes_rotate_to_dealer() {
        let (players, seat_map) = seated(&[6, 1, 3], 9);
        assert_eq!(find_game_player_indexes(3, &seat_map, &players), vec![2, 0, 1]);
        assert_eq!(find_game_player_indexes(6, &seat_map, &players), vec![0, 1, 2]);
    }

    #[test]
    fn test_position_map() {
        let map = player_position_map(&[4, 2]);
        assert_eq!(map[&4], vec![Position::Dealer, Position::Sb]);
        assert_eq!(map[&2], vec![Position::Bb]);

        let map = player_position_map(&[0, 1, 2, 3, 4, 5]);
        assert_eq!(map[&4], vec![Position::Hj]);

        assert!(player_position_map(&[1]).is_empty());
        assert!(player_position_map(&(0..11).collect::<Vec<_>>()).is_empty());
    }

    #[test]
    fn test_bb_seat() {
        let (players, _) = seated(&[2, 5, 8], 9);
        assert_eq!(find_bb_seat(&players, &[0, 1]), Some(5));
        assert_eq!(find_bb_seat(&players, &[1, 2, 0]), Some(2));
        assert_eq!(find_bb_seat(&players, &[0]), None);
    }
}
