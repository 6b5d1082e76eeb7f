//! Integration tests for the competition lifecycle over in-process tables
//!
//! A scripted hand engine drives hands to fixed outcomes so settlement,
//! re-buy, knockout and cash-out can be observed end to end.

mod common;

#[cfg(test)]
mod competition_flow_tests {
    use super::common::*;
    use poker_arena::{
        CompetitionError, CompetitionEvent, CompetitionStatus, JoinPlayer,
        competition::{CompetitionPlayerStatus, ReBuySetting},
        table::{PlayerGameAction, TableStatus},
    };
    use std::time::Duration;

    fn is_playing(table: &poker_arena::table::Table) -> bool {
        table.state.status == TableStatus::GamePlaying
    }

    #[tokio::test]
    async fn test_walk_recorded_for_uncontested_big_blind() {
        let h = harness(test_config(Duration::from_secs(30)));
        h.manager
            .create_competition(cash_setting(
                "c1",
                "t1",
                3,
                blind_levels(&[600]),
                0,
                ReBuySetting::default(),
            ))
            .await
            .unwrap();

        for id in ["p1", "p2", "p3"] {
            h.manager
                .player_buy_in("c1", JoinPlayer::new(id, 15000))
                .await
                .unwrap();
        }

        let table = wait_for_table(&h.tables, "t1", is_playing)
            .await
            .expect("first hand should start");
        assert_eq!(table.state.game_count, 1);

        let order = hand_order(&table);
        assert_eq!(order.len(), 3);
        let (dealer, sb, bb) = (order[0].clone(), order[1].clone(), order[2].clone());

        h.tables
            .player_action("t1", dealer.clone(), PlayerGameAction::Fold)
            .await
            .unwrap();
        h.tables
            .player_action("t1", sb.clone(), PlayerGameAction::Fold)
            .await
            .unwrap();

        let competition = wait_for_competition(&h.manager, "c1", |c| {
            player(c, &bb).is_some_and(|p| p.total_game_counts == 1)
        })
        .await
        .expect("settlement should be applied");

        let winner = player(&competition, &bb).unwrap();
        assert_eq!(winner.total_walk_times, 1);
        assert_eq!(winner.total_profit_times, 1);
        assert_eq!(winner.chips, 15010);
        assert_eq!(winner.rank, Some(1));
        assert_eq!(winner.best_winning_pot_chips, 10);
        assert_eq!(winner.best_winning_type, "pair");

        for folded in [&dealer, &sb] {
            let p = player(&competition, folded).unwrap();
            assert_eq!(p.total_game_counts, 1);
            assert_eq!(p.total_preflop_fold_times, 1);
            assert_eq!(p.total_walk_times, 0);
        }

        assert_eq!(competition.state.status, CompetitionStatus::DelayedBuyIn);
        assert_eq!(competition.state.tables[0].state.game_count, 1);
    }

    /// Heads-up hand where the dealer moves all in and loses to a call
    async fn bust_dealer(h: &Harness) -> (String, String) {
        let table = wait_for_table(&h.tables, "t1", is_playing)
            .await
            .expect("first hand should start");
        let order = hand_order(&table);
        let (loser, winner) = (order[0].clone(), order[1].clone());

        h.tables
            .player_action("t1", loser.clone(), PlayerGameAction::Allin)
            .await
            .unwrap();
        h.tables
            .player_action("t1", winner.clone(), PlayerGameAction::Call)
            .await
            .unwrap();
        (loser, winner)
    }

    fn re_buy_setting() -> ReBuySetting {
        ReBuySetting {
            max_time: 1,
            waiting_time: 1,
        }
    }

    #[tokio::test]
    async fn test_re_buy_within_window_keeps_player() {
        let h = harness(test_config(Duration::from_millis(100)));
        h.manager
            .create_competition(cash_setting(
                "c1",
                "t1",
                2,
                blind_levels(&[600]),
                0,
                re_buy_setting(),
            ))
            .await
            .unwrap();
        for id in ["p1", "p2"] {
            h.manager
                .player_buy_in("c1", JoinPlayer::new(id, 1000))
                .await
                .unwrap();
        }

        let (loser, _winner) = bust_dealer(&h).await;
        let competition = wait_for_competition(&h.manager, "c1", |c| {
            player(c, &loser).is_some_and(|p| p.status == CompetitionPlayerStatus::ReBuyWaiting)
        })
        .await
        .expect("busted player should wait to re-buy");
        let waiting = player(&competition, &loser).unwrap();
        assert_eq!(waiting.chips, 0);
        assert!(waiting.is_re_buying);
        assert!(waiting.re_buy_end_at.is_some());

        h.manager
            .player_buy_in("c1", JoinPlayer::new(loser.clone(), 500))
            .await
            .unwrap();

        let competition = h.manager.competition("c1").await.unwrap();
        let rebought = player(&competition, &loser).unwrap();
        assert_eq!(rebought.status, CompetitionPlayerStatus::Playing);
        assert_eq!(rebought.re_buy_times, 1);
        assert_eq!(rebought.chips, 500);
        assert!(!rebought.is_re_buying);
        assert_eq!(competition.state.statistic.total_buy_in_count, 3);

        // the re-buy cancelled the window deadline
        tokio::time::sleep(Duration::from_millis(1500)).await;
        let competition = h.manager.competition("c1").await.unwrap();
        assert!(player(&competition, &loser).is_some());
        assert!(h.manager.cache().get("c1", &loser).is_some());

        let table = wait_for_table(&h.tables, "t1", |t| {
            t.find_player_index(&loser)
                .is_some_and(|idx| t.state.player_states[idx].bankroll == 500)
        })
        .await;
        assert!(table.is_some());
    }

    #[tokio::test]
    async fn test_missed_re_buy_window_cashes_out() {
        let mut h = harness(test_config(Duration::from_millis(100)));
        h.manager
            .create_competition(cash_setting(
                "c1",
                "t1",
                2,
                blind_levels(&[600]),
                0,
                re_buy_setting(),
            ))
            .await
            .unwrap();
        for id in ["p1", "p2"] {
            h.manager
                .player_buy_in("c1", JoinPlayer::new(id, 1000))
                .await
                .unwrap();
        }

        let (loser, winner) = bust_dealer(&h).await;
        let competition =
            wait_for_competition(&h.manager, "c1", |c| player(c, &loser).is_none())
                .await
                .expect("player should be cashed out after the deadline");
        assert_eq!(player(&competition, &winner).unwrap().chips, 2000);
        assert!(h.manager.cache().get("c1", &loser).is_none());

        let table = wait_for_table(&h.tables, "t1", |t| t.find_player_index(&loser).is_none())
            .await
            .expect("player should leave the table");
        assert_eq!(table.state.player_states.len(), 1);

        let mut cashed_out = false;
        while let Ok(event) = h.events.try_recv() {
            if let CompetitionEvent::PlayerCashOut { player, .. } = event
                && player.player_id == loser
            {
                cashed_out = true;
            }
        }
        assert!(cashed_out);
    }

    #[tokio::test]
    async fn test_stop_buy_in_knocks_out_waiting_players() {
        let mut h = harness(test_config(Duration::from_secs(30)));
        h.manager
            .create_competition(cash_setting(
                "c1",
                "t1",
                3,
                blind_levels(&[2, 600]),
                0,
                ReBuySetting {
                    max_time: 1,
                    waiting_time: 30,
                },
            ))
            .await
            .unwrap();
        for id in ["p1", "p2", "p3"] {
            h.manager
                .player_buy_in("c1", JoinPlayer::new(id, 1000))
                .await
                .unwrap();
        }

        let table = wait_for_table(&h.tables, "t1", is_playing)
            .await
            .expect("first hand should start");
        let order = hand_order(&table);
        for busted in &order[..2] {
            h.tables
                .player_action("t1", busted.clone(), PlayerGameAction::Allin)
                .await
                .unwrap();
        }
        h.tables
            .player_action("t1", order[2].clone(), PlayerGameAction::Call)
            .await
            .unwrap();

        let competition = wait_for_competition(&h.manager, "c1", |c| {
            c.state.status == CompetitionStatus::StoppedBuyIn
        })
        .await
        .expect("buy-in should stop when the blind passes the final level");

        for busted in &order[..2] {
            let p = player(&competition, busted).unwrap();
            assert_eq!(p.status, CompetitionPlayerStatus::Knockout);
            assert_eq!(p.current_seat, None);
            assert!(!p.is_re_buying);
        }
        assert_eq!(competition.state.rankings.len(), 2);
        assert!(competition.state.rankings.iter().all(|r| r.final_chips == 0));
        assert_eq!(competition.state.blind_state.current_level_index, 1);

        assert!(matches!(
            h.manager
                .player_buy_in("c1", JoinPlayer::new(order[0].clone(), 1000))
                .await,
            Err(CompetitionError::ReBuyRejected)
        ));
        assert!(matches!(
            h.manager
                .player_buy_in("c1", JoinPlayer::new("late", 1000))
                .await,
            Err(CompetitionError::BuyInRejected)
        ));

        h.manager
            .close_competition("c1", CompetitionStatus::End)
            .await
            .unwrap();

        let mut final_rankings = None;
        while let Ok(event) = h.events.try_recv() {
            if let CompetitionEvent::Updated(c) = event
                && c.state.status == CompetitionStatus::End
            {
                final_rankings = Some(c.state.rankings);
            }
        }
        let final_rankings = final_rankings.expect("final snapshot should be emitted");
        assert_eq!(final_rankings.len(), 3);
        assert_eq!(final_rankings[0].player_id, order[2]);
        assert_eq!(final_rankings[0].final_chips, 3000);
        assert!(h.manager.cache().competition_len("c1") == 0);
    }

    #[tokio::test]
    async fn test_cash_out_mid_hand_waits_for_settlement() {
        let h = harness(test_config(Duration::from_secs(30)));
        h.manager
            .create_competition(cash_setting(
                "c1",
                "t1",
                2,
                blind_levels(&[600]),
                0,
                ReBuySetting::default(),
            ))
            .await
            .unwrap();
        for id in ["p1", "p2"] {
            h.manager
                .player_buy_in("c1", JoinPlayer::new(id, 1000))
                .await
                .unwrap();
        }

        let table = wait_for_table(&h.tables, "t1", is_playing)
            .await
            .expect("first hand should start");
        let order = hand_order(&table);
        let leaver = order[1].clone();

        h.manager
            .player_cash_out("c1", "t1".to_string(), leaver.clone())
            .await
            .unwrap();
        let competition = h.manager.competition("c1").await.unwrap();
        assert_eq!(
            player(&competition, &leaver).unwrap().status,
            CompetitionPlayerStatus::CashLeaving
        );

        h.tables
            .player_action("t1", order[0].clone(), PlayerGameAction::Fold)
            .await
            .unwrap();

        let competition =
            wait_for_competition(&h.manager, "c1", |c| player(c, &leaver).is_none())
                .await
                .expect("cash-out should apply after settlement");
        assert_eq!(competition.state.players.len(), 1);
        assert!(h.manager.cache().get("c1", &leaver).is_none());
    }

    #[tokio::test]
    async fn test_unfilled_competition_auto_closes() {
        let h = harness(test_config(Duration::from_secs(30)));
        let mut setting = cash_setting(
            "c1",
            "t1",
            2,
            blind_levels(&[600]),
            0,
            ReBuySetting::default(),
        );
        setting.disable_at = chrono::Utc::now().timestamp() + 1;
        h.manager.create_competition(setting).await.unwrap();
        h.manager
            .player_buy_in("c1", JoinPlayer::new("p1", 1000))
            .await
            .unwrap();

        let competition = wait_for_competition(&h.manager, "c1", |c| c.is_end())
            .await
            .expect("competition should auto close");
        assert_eq!(competition.state.status, CompetitionStatus::AutoEnd);
        assert!(competition.state.rankings.is_empty());
        assert!(h.manager.cache().get("c1", "p1").is_none());

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(h.tables.table("t1").await.is_err());
    }
}
