//! Concurrency tests for the engine's shared state.
//!
//! The engine hands out one handle shared across threads; these tests check
//! that racing placements, cancellations, and votes always converge on the
//! same books:
//! - Stakes are conserved no matter how placements interleave
//! - Cancellations return the pool to its prior state
//! - A quorum race executes a proposal exactly once

use std::sync::Arc;
use std::thread;

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use wager_engine::{
    BetFilter, CreateVaultRequest, EngineConfig, OpenMarketRequest, ProposalError, ProposalStatus,
    VoteChoice, WagerEngine,
};

fn open_market(engine: &WagerEngine, title: &str) -> String {
    engine
        .open_market(OpenMarketRequest {
            title: title.to_string(),
            category: "games".to_string(),
            option_names: vec!["Home".to_string(), "Away".to_string()],
            closes_at: Utc::now() + Duration::hours(1),
            seed_liquidity: dec!(25),
        })
        .unwrap()
        .id
}

// ============================================================================
// Concurrent placements
// ============================================================================

#[test]
fn test_concurrent_placements_conserve_stakes() {
    let engine = Arc::new(WagerEngine::with_defaults());
    let market = open_market(&engine, "Crowded line");

    // 8 bettors, 5 bets of 10 each, split evenly across the two options
    let handles: Vec<_> = (0..8)
        .map(|i| {
            let engine = Arc::clone(&engine);
            let market = market.clone();
            thread::spawn(move || {
                let option = if i % 2 == 0 { "option_0" } else { "option_1" };
                let bettor = format!("bettor-{}", i);
                let mut locked = Vec::new();
                for _ in 0..5 {
                    let bet = engine.place_bet(&market, option, &bettor, dec!(10)).unwrap();
                    locked.push(bet.locked_odds);
                }
                locked
            })
        })
        .collect();

    let mut locked_odds = Vec::new();
    for handle in handles {
        locked_odds.extend(handle.join().unwrap());
    }

    // However the 40 placements interleaved, the books balance
    let overview = engine.market_overview(&market).unwrap();
    assert_eq!(overview.market.total_staked, dec!(400));
    assert_eq!(overview.total_bet_count, 40);
    assert_eq!(overview.unique_participants, 8);
    for option in &overview.market.options {
        assert_eq!(option.stake, dec!(200));
        assert_eq!(option.bet_count, 20);
        assert_eq!(option.odds, dec!(2));
        assert_eq!(option.percentage, dec!(50));
    }

    // Every receipt locked a well-formed quote
    assert_eq!(locked_odds.len(), 40);
    assert!(locked_odds.iter().all(|odds| *odds >= dec!(1)));
}

#[test]
fn test_parallel_markets_stay_independent() {
    let engine = Arc::new(WagerEngine::with_defaults());
    let markets: Vec<String> = (0..4)
        .map(|i| open_market(&engine, &format!("Lane {}", i)))
        .collect();

    let handles: Vec<_> = markets
        .iter()
        .map(|market| {
            let engine = Arc::clone(&engine);
            let market = market.clone();
            thread::spawn(move || {
                for i in 0..10 {
                    engine
                        .place_bet(&market, "option_0", &format!("solo-{}", i), dec!(7))
                        .unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    for market in &markets {
        let view = engine.market_overview(market).unwrap();
        assert_eq!(view.market.total_staked, dec!(70));
        assert_eq!(view.market.options[0].bet_count, 10);
    }
    let all = engine.list_bets(&BetFilter::default());
    assert_eq!(all.total, 40);
}

// ============================================================================
// Concurrent cancellations
// ============================================================================

#[test]
fn test_concurrent_cancellations_restore_the_pool() {
    let engine = Arc::new(WagerEngine::with_defaults());
    let market = open_market(&engine, "Cold feet");
    engine
        .place_bet(&market, "option_0", "anchor", dec!(100))
        .unwrap();
    let baseline = engine.market_overview(&market).unwrap().market;

    let handles: Vec<_> = (0..6)
        .map(|i| {
            let engine = Arc::clone(&engine);
            let market = market.clone();
            thread::spawn(move || {
                let bettor = format!("flaky-{}", i);
                let bet = engine
                    .place_bet(&market, "option_1", &bettor, dec!(50))
                    .unwrap();
                engine.cancel_bet(&bet.id, &bettor).unwrap();
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    // Round-tripped stakes leave no trace on the pool
    let after = engine.market_overview(&market).unwrap().market;
    assert_eq!(after, baseline);

    // But the records remain
    for i in 0..6 {
        let stats = engine.bettor_stats(&format!("flaky-{}", i));
        assert_eq!(stats.cancelled_bets, 1);
    }
}

// ============================================================================
// Quorum races
// ============================================================================

#[test]
fn test_concurrent_votes_execute_exactly_once() {
    // Four members at power 100 each under the individual strategy: any two
    // approvals reach 200 of 400 and trigger execution
    let mut config = EngineConfig::default();
    config.vault.creator_voting_power = Decimal::ZERO;
    let engine = Arc::new(WagerEngine::new(config));
    let market = open_market(&engine, "Race to quorum");

    let vault_id = engine
        .create_vault(CreateVaultRequest {
            name: "Racers".to_string(),
            description: String::new(),
            creator: "alice".to_string(),
            strategy: Some("individual".to_string()),
            ..CreateVaultRequest::default()
        })
        .unwrap()
        .id;
    for i in 0..4 {
        engine
            .join_vault(&vault_id, &format!("member-{}", i), "M", dec!(10000))
            .unwrap();
    }

    let proposal = engine
        .propose_bet(&vault_id, &market, "option_0", "member-0", "", dec!(500))
        .unwrap();

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let engine = Arc::clone(&engine);
            let proposal_id = proposal.id.clone();
            thread::spawn(move || {
                engine.cast_vote(&proposal_id, &format!("member-{}", i), VoteChoice::Approve)
            })
        })
        .collect();

    let mut executions = 0;
    for handle in handles {
        match handle.join().unwrap() {
            Ok(outcome) => {
                if outcome.executed {
                    executions += 1;
                }
            }
            // Votes arriving after execution are turned away
            Err(ProposalError::ProposalNotPending { .. }) => {}
            Err(err) => panic!("unexpected vote error: {err}"),
        }
    }
    assert_eq!(executions, 1);

    // One execution, one bet, one debit
    let executed = engine.get_proposal(&proposal.id).unwrap();
    assert_eq!(executed.status, ProposalStatus::Executed);
    let bet_id = executed.bet_id.unwrap();
    assert_eq!(engine.get_bet(&bet_id).unwrap().amount, dec!(500));

    let vault = engine.vault_snapshot(&vault_id).unwrap();
    assert_eq!(vault.total_wagered, dec!(500));
    assert_eq!(
        engine.market_overview(&market).unwrap().market.total_staked,
        dec!(500)
    );
}
