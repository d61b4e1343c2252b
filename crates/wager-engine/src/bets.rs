//! Bet records: placement, cancellation, settlement, and bettor statistics.
//!
//! Every bet is an immutable record of the terms it was struck at — amount,
//! locked odds, estimated payout — plus a status that only ever moves
//! forward: `pending` to exactly one of `won`, `lost`, or `cancelled`.
//! Settled and cancelled bets are never deleted; statistics and listings
//! are derived from the full history.
//!
//! ## Locked odds vs. settlement odds
//!
//! The odds stored on a bet are the option's odds *before* the bet's own
//! stake landed, captured under the pool's entry guard. They drive the
//! `estimated_payout` shown to the bettor. Settlement ignores them: winners
//! are paid at the winning option's final resolution-time odds.
//!
//! ## Placement window
//!
//! Placement applies the stake to the pool first and inserts the bet record
//! after. A settlement sweeping between the two leaves that record pending;
//! [`BetRegistry::settle_market`] is idempotent, so a later sweep settles it.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use wager_common::BetStatus;

use crate::config::BettingConfig;
use crate::pool::{PoolError, PoolLedger};

/// Errors from bet registry operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BetError {
    #[error("Bet not found: {bet_id}")]
    BetNotFound { bet_id: String },

    #[error("{requester} is not allowed to act on bet {bet_id}")]
    Unauthorized { bet_id: String, requester: String },

    #[error("Bet {bet_id} cannot be cancelled")]
    NotCancellable { bet_id: String },

    #[error("Bet amount {amount} is below the minimum of {minimum}")]
    BelowMinimum { amount: Decimal, minimum: Decimal },

    #[error(transparent)]
    Pool(#[from] PoolError),
}

/// A single wager, created on placement and mutated only to transition
/// status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bet {
    pub id: String,
    pub market_id: String,
    pub option_id: String,
    pub bettor: String,
    pub amount: Decimal,
    /// Odds at placement, excluding this bet's own stake.
    pub locked_odds: Decimal,
    /// `amount * locked_odds`.
    pub estimated_payout: Decimal,
    /// `estimated_payout - amount`.
    pub potential_profit: Decimal,
    pub status: BetStatus,
    /// Display copies taken from the market at placement.
    pub market_title: String,
    pub option_name: String,
    pub category: String,
    pub created_at: DateTime<Utc>,
    pub settled_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    /// Set on settlement: `amount * final_odds` for winners, zero for losers.
    pub payout: Option<Decimal>,
    /// Set on settlement: `payout - amount` for winners, `-amount` for losers.
    pub profit: Option<Decimal>,
}

/// One bet's outcome within a [`SettlementReport`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettledBet {
    pub bet_id: String,
    pub bettor: String,
    pub status: BetStatus,
    pub amount: Decimal,
    pub payout: Decimal,
    pub profit: Decimal,
}

/// Everything one settlement pass did.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementReport {
    pub market_id: String,
    pub winning_option: String,
    pub final_odds: Decimal,
    pub settled: Vec<SettledBet>,
    pub winners: usize,
    pub losers: usize,
    pub total_paid: Decimal,
}

/// Filter and pagination for bet listings. Empty filter matches everything.
#[derive(Debug, Clone, Default)]
pub struct BetFilter {
    pub market_id: Option<String>,
    pub bettor: Option<String>,
    pub status: Option<BetStatus>,
    /// Page size; the configured default when `None`.
    pub limit: Option<usize>,
    pub offset: usize,
}

/// One page of bets, newest first.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BetPage {
    pub bets: Vec<Bet>,
    /// Matching bets before pagination.
    pub total: usize,
    pub has_more: bool,
}

/// Aggregate wagering record for one bettor.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BettorStats {
    pub bettor: String,
    pub total_bets: usize,
    /// Sum of amounts across every bet ever placed, cancelled included.
    pub total_volume: Decimal,
    pub pending_bets: usize,
    pub won_bets: usize,
    pub lost_bets: usize,
    pub cancelled_bets: usize,
    /// Won share of every bet ever placed (not just settled ones), 0..=100.
    pub win_rate: Decimal,
    /// Sum of payouts over won bets.
    pub total_payouts: Decimal,
    /// Sum of recorded profit over settled bets.
    pub total_profit: Decimal,
    pub average_bet_size: Decimal,
    /// Most-wagered category, `"unknown"` for a bettor with no bets.
    pub favorite_category: String,
    /// Consecutive wins counting back from the most recent settled bet.
    pub current_streak: usize,
    /// Longest run of identical settled outcomes, winning or losing.
    pub longest_streak: usize,
}

/// Bet records keyed by id, backed by the pool ledger for stake movement.
///
/// The registry owns no odds math: placement and cancellation delegate the
/// stake mutation to [`PoolLedger`] and record what the receipt reports.
#[derive(Debug)]
pub struct BetRegistry {
    bets: DashMap<String, Bet>,
    pools: Arc<PoolLedger>,
    config: BettingConfig,
}

impl BetRegistry {
    pub fn new(pools: Arc<PoolLedger>, config: BettingConfig) -> Self {
        Self {
            bets: DashMap::new(),
            pools,
            config,
        }
    }

    /// Place a bet: apply the stake to the pool, lock the pre-update odds,
    /// and record the bet as pending.
    pub fn place_bet(
        &self,
        market_id: &str,
        option_id: &str,
        bettor: &str,
        amount: Decimal,
    ) -> Result<Bet, BetError> {
        if amount < self.config.min_bet {
            return Err(BetError::BelowMinimum {
                amount,
                minimum: self.config.min_bet,
            });
        }

        let receipt = self.pools.apply_stake(market_id, option_id, amount)?;
        let estimated_payout = amount * receipt.locked_odds;

        let bet = Bet {
            id: Uuid::new_v4().to_string(),
            market_id: market_id.to_string(),
            option_id: option_id.to_string(),
            bettor: bettor.to_string(),
            amount,
            locked_odds: receipt.locked_odds,
            estimated_payout,
            potential_profit: estimated_payout - amount,
            status: BetStatus::Pending,
            market_title: receipt.market_title,
            option_name: receipt.option_name,
            category: receipt.category,
            created_at: Utc::now(),
            settled_at: None,
            cancelled_at: None,
            payout: None,
            profit: None,
        };

        info!(
            bet_id = %bet.id,
            market_id,
            option_id,
            bettor,
            %amount,
            locked_odds = %bet.locked_odds,
            "bet placed"
        );
        self.bets.insert(bet.id.clone(), bet.clone());
        Ok(bet)
    }

    /// Cancel a pending bet and reverse its stake from the pool.
    ///
    /// Only the bettor may cancel, only while the bet is pending, and only
    /// while the market is still open for wagering.
    pub fn cancel_bet(&self, bet_id: &str, requester: &str) -> Result<Bet, BetError> {
        let mut bet = self
            .bets
            .get_mut(bet_id)
            .ok_or_else(|| BetError::BetNotFound {
                bet_id: bet_id.to_string(),
            })?;

        if bet.bettor != requester {
            return Err(BetError::Unauthorized {
                bet_id: bet_id.to_string(),
                requester: requester.to_string(),
            });
        }
        if bet.status != BetStatus::Pending {
            return Err(BetError::NotCancellable {
                bet_id: bet_id.to_string(),
            });
        }

        match self
            .pools
            .reverse_stake(&bet.market_id, &bet.option_id, bet.amount)
        {
            Ok(()) => {}
            // A frozen or expired market means the wager stands
            Err(PoolError::MarketClosed { .. }) => {
                return Err(BetError::NotCancellable {
                    bet_id: bet_id.to_string(),
                })
            }
            Err(err) => return Err(err.into()),
        }

        bet.status = BetStatus::Cancelled;
        bet.cancelled_at = Some(Utc::now());

        info!(bet_id, market_id = %bet.market_id, "bet cancelled");
        Ok(bet.clone())
    }

    /// Settle every pending bet on a resolved market.
    ///
    /// Winners are paid `amount * final_odds`; losers record a zero payout
    /// and a loss of their full stake. Bets already settled or cancelled are
    /// left alone, which makes repeat calls harmless.
    pub fn settle_market(
        &self,
        market_id: &str,
        winning_option_id: &str,
        final_odds: Decimal,
    ) -> SettlementReport {
        let now = Utc::now();
        let mut settled = Vec::new();
        let mut winners = 0;
        let mut losers = 0;
        let mut total_paid = Decimal::ZERO;

        for mut entry in self.bets.iter_mut() {
            let bet = entry.value_mut();
            if bet.market_id != market_id || bet.status != BetStatus::Pending {
                continue;
            }

            let (status, payout) = if bet.option_id == winning_option_id {
                winners += 1;
                (BetStatus::Won, bet.amount * final_odds)
            } else {
                losers += 1;
                (BetStatus::Lost, Decimal::ZERO)
            };
            let profit = payout - bet.amount;

            bet.status = status;
            bet.payout = Some(payout);
            bet.profit = Some(profit);
            bet.settled_at = Some(now);
            total_paid += payout;

            debug!(bet_id = %bet.id, status = %status, %payout, "bet settled");
            settled.push(SettledBet {
                bet_id: bet.id.clone(),
                bettor: bet.bettor.clone(),
                status,
                amount: bet.amount,
                payout,
                profit,
            });
        }

        info!(
            market_id,
            winning_option = winning_option_id,
            %final_odds,
            winners,
            losers,
            %total_paid,
            "market settled"
        );
        SettlementReport {
            market_id: market_id.to_string(),
            winning_option: winning_option_id.to_string(),
            final_odds,
            settled,
            winners,
            losers,
            total_paid,
        }
    }

    /// Void every pending bet on a market, without reversing stakes or
    /// paying anything out. Used when a market is cancelled outright.
    /// Returns the number of bets voided.
    pub fn void_market(&self, market_id: &str) -> usize {
        let now = Utc::now();
        let mut voided = 0;
        for mut entry in self.bets.iter_mut() {
            let bet = entry.value_mut();
            if bet.market_id == market_id && bet.status == BetStatus::Pending {
                bet.status = BetStatus::Cancelled;
                bet.cancelled_at = Some(now);
                voided += 1;
            }
        }
        info!(market_id, voided, "pending bets voided");
        voided
    }

    pub fn get_bet(&self, bet_id: &str) -> Result<Bet, BetError> {
        self.bets
            .get(bet_id)
            .map(|r| r.value().clone())
            .ok_or_else(|| BetError::BetNotFound {
                bet_id: bet_id.to_string(),
            })
    }

    /// List bets matching the filter, newest first, paginated.
    pub fn list_bets(&self, filter: &BetFilter) -> BetPage {
        let mut matched: Vec<Bet> = self
            .bets
            .iter()
            .filter(|entry| {
                filter
                    .market_id
                    .as_ref()
                    .map_or(true, |m| &entry.market_id == m)
                    && filter.bettor.as_ref().map_or(true, |b| &entry.bettor == b)
                    && filter.status.map_or(true, |s| entry.status == s)
            })
            .map(|entry| entry.value().clone())
            .collect();
        matched.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let total = matched.len();
        let limit = filter.limit.unwrap_or(self.config.default_page_limit);
        let bets: Vec<Bet> = matched.into_iter().skip(filter.offset).take(limit).collect();
        let has_more = filter.offset + bets.len() < total;

        BetPage {
            bets,
            total,
            has_more,
        }
    }

    /// Aggregate statistics for one bettor across their whole history.
    pub fn bettor_stats(&self, bettor: &str) -> BettorStats {
        let mine: Vec<Bet> = self
            .bets
            .iter()
            .filter(|entry| entry.bettor == bettor)
            .map(|entry| entry.value().clone())
            .collect();

        let total_bets = mine.len();
        let total_volume: Decimal = mine.iter().map(|b| b.amount).sum();
        let won_bets = mine.iter().filter(|b| b.status == BetStatus::Won).count();
        let total_payouts: Decimal = mine
            .iter()
            .filter(|b| b.status == BetStatus::Won)
            .filter_map(|b| b.payout)
            .sum();
        let total_profit: Decimal = mine.iter().filter_map(|b| b.profit).sum();

        let win_rate = if total_bets > 0 {
            Decimal::from(won_bets) * Decimal::ONE_HUNDRED / Decimal::from(total_bets)
        } else {
            Decimal::ZERO
        };
        let average_bet_size = if total_bets > 0 {
            total_volume / Decimal::from(total_bets)
        } else {
            Decimal::ZERO
        };

        BettorStats {
            bettor: bettor.to_string(),
            total_bets,
            total_volume,
            pending_bets: mine
                .iter()
                .filter(|b| b.status == BetStatus::Pending)
                .count(),
            won_bets,
            lost_bets: mine.iter().filter(|b| b.status == BetStatus::Lost).count(),
            cancelled_bets: mine
                .iter()
                .filter(|b| b.status == BetStatus::Cancelled)
                .count(),
            win_rate,
            total_payouts,
            total_profit,
            average_bet_size,
            favorite_category: favorite_category(&mine),
            current_streak: current_streak(&mine),
            longest_streak: longest_streak(&mine),
        }
    }

    /// Bets counted toward a market's totals: everything not cancelled.
    pub fn market_bet_count(&self, market_id: &str) -> usize {
        self.bets
            .iter()
            .filter(|entry| entry.market_id == market_id && entry.status != BetStatus::Cancelled)
            .count()
    }

    /// Distinct bettors who ever placed on a market, cancellations included.
    pub fn unique_participants(&self, market_id: &str) -> usize {
        let participants: HashSet<String> = self
            .bets
            .iter()
            .filter(|entry| entry.market_id == market_id)
            .map(|entry| entry.bettor.clone())
            .collect();
        participants.len()
    }
}

/// Most-wagered category; ties go to the category seen later in placement
/// order.
fn favorite_category(bets: &[Bet]) -> String {
    let mut counts: Vec<(String, usize)> = Vec::new();
    for bet in bets {
        match counts.iter_mut().find(|(cat, _)| cat == &bet.category) {
            Some((_, n)) => *n += 1,
            None => counts.push((bet.category.clone(), 1)),
        }
    }

    let mut best: Option<(&str, usize)> = None;
    for (cat, n) in &counts {
        match best {
            Some((_, top)) if *n < top => {}
            _ => best = Some((cat.as_str(), *n)),
        }
    }
    best.map(|(cat, _)| cat.to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Consecutive wins counting back from the newest settled bet; zero when the
/// newest settled bet was a loss.
fn current_streak(bets: &[Bet]) -> usize {
    let mut settled: Vec<&Bet> = bets.iter().filter(|b| b.status.is_settled()).collect();
    settled.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    settled
        .iter()
        .take_while(|b| b.status == BetStatus::Won)
        .count()
}

/// Longest run of identical settled outcomes in placement order.
fn longest_streak(bets: &[Bet]) -> usize {
    let mut settled: Vec<&Bet> = bets.iter().filter(|b| b.status.is_settled()).collect();
    settled.sort_by(|a, b| a.created_at.cmp(&b.created_at));

    let mut longest = 0;
    let mut run = 0;
    let mut last: Option<BetStatus> = None;
    for bet in settled {
        if last == Some(bet.status) {
            run += 1;
        } else {
            longest = longest.max(run);
            run = 1;
            last = Some(bet.status);
        }
    }
    longest.max(run)
}
