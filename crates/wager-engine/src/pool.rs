//! Market pools and pari-mutuel stake accounting.
//!
//! Each market pool tracks per-option stakes and derives odds and
//! percentages from them. Derived values are recomputed for the whole
//! option set on every mutation — never incrementally — so sums can never
//! drift from their parts.
//!
//! ## Odds model
//!
//! For option `i` with stake `s_i` and market total `T` (post-update):
//! `odds_i = max(1.0, T / s_i)` when `s_i > 0`, else `1.0`;
//! `pct_i = 100 * s_i / T` when `T > 0`, else `0`.
//!
//! ## Concurrency
//!
//! Pools are keyed in a `DashMap`; every mutation runs under the market's
//! entry guard, so two placements on the same market never interleave their
//! read-modify-write, while unrelated markets proceed in parallel. The
//! pre-update odds a bet locks are captured under the same guard as the
//! stake application.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use wager_common::MarketStatus;

use crate::config::BettingConfig;

/// Errors from pool ledger operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PoolError {
    #[error("Market not found: {market_id}")]
    MarketNotFound { market_id: String },

    #[error("Market {market_id} is closed for wagering")]
    MarketClosed { market_id: String },

    #[error("Option {option_id} not found in market {market_id}")]
    OptionNotFound {
        market_id: String,
        option_id: String,
    },

    #[error("Stake amount must be positive, got {amount}")]
    InvalidAmount { amount: Decimal },

    #[error("Cannot reverse {requested} from option {option_id}: only {available} staked")]
    InsufficientStake {
        option_id: String,
        requested: Decimal,
        available: Decimal,
    },

    #[error("A market needs at least {required} options, got {supplied}")]
    TooFewOptions { supplied: usize, required: usize },

    #[error("Seed liquidity {supplied} is below the minimum of {required}")]
    SeedBelowMinimum { supplied: Decimal, required: Decimal },
}

/// One selectable outcome within a market pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketOption {
    /// Option identifier, `option_<index>` in creation order.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Total amount staked on this option.
    pub stake: Decimal,
    /// Number of open (non-reversed) bets on this option.
    pub bet_count: u64,
    /// Derived payout multiplier, always ≥ 1.
    pub odds: Decimal,
    /// Derived share of the market total, 0..=100.
    pub percentage: Decimal,
}

impl MarketOption {
    fn new(index: usize, name: String) -> Self {
        Self {
            id: format!("option_{}", index),
            name,
            stake: Decimal::ZERO,
            bet_count: 0,
            odds: Decimal::ONE,
            percentage: Decimal::ZERO,
        }
    }
}

/// A market's wagering state. Owned exclusively by the [`PoolLedger`].
#[derive(Debug, Clone)]
pub struct MarketPool {
    pub id: String,
    pub title: String,
    pub category: String,
    pub status: MarketStatus,
    pub options: Vec<MarketOption>,
    /// Placements past this instant are rejected even while `Active`.
    pub closes_at: DateTime<Utc>,
    /// Creation stake posted by the market opener. Display-only: never part
    /// of `total_staked` or the odds/percentage math.
    pub seed_liquidity: Decimal,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub winning_option: Option<String>,
}

impl MarketPool {
    /// Sum of option stakes. Computed, never stored.
    fn total_staked(&self) -> Decimal {
        self.options.iter().map(|o| o.stake).sum()
    }

    fn is_open(&self, now: DateTime<Utc>) -> bool {
        self.status == MarketStatus::Active && now < self.closes_at
    }

    fn option_index(&self, option_id: &str) -> Option<usize> {
        self.options.iter().position(|o| o.id == option_id)
    }

    /// Recompute odds and percentage for every option from current stakes.
    fn recompute(&mut self) {
        let total = self.total_staked();
        for opt in &mut self.options {
            opt.odds = if opt.stake > Decimal::ZERO {
                (total / opt.stake).max(Decimal::ONE)
            } else {
                Decimal::ONE
            };
            opt.percentage = if total > Decimal::ZERO {
                opt.stake * Decimal::ONE_HUNDRED / total
            } else {
                Decimal::ZERO
            };
        }
    }

    fn view(&self) -> MarketView {
        MarketView {
            id: self.id.clone(),
            title: self.title.clone(),
            category: self.category.clone(),
            status: self.status,
            options: self.options.clone(),
            total_staked: self.total_staked(),
            seed_liquidity: self.seed_liquidity,
            closes_at: self.closes_at,
            created_at: self.created_at,
            resolved_at: self.resolved_at,
            winning_option: self.winning_option.clone(),
        }
    }
}

/// Read-only snapshot of a market pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketView {
    pub id: String,
    pub title: String,
    pub category: String,
    pub status: MarketStatus,
    pub options: Vec<MarketOption>,
    /// Sum of option stakes at snapshot time.
    pub total_staked: Decimal,
    pub seed_liquidity: Decimal,
    pub closes_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub winning_option: Option<String>,
}

/// Parameters for opening a market.
#[derive(Debug, Clone)]
pub struct OpenMarketRequest {
    pub title: String,
    pub category: String,
    /// Display names; option ids are generated in order.
    pub option_names: Vec<String>,
    pub closes_at: DateTime<Utc>,
    pub seed_liquidity: Decimal,
}

/// Outcome of a stake application, captured atomically under the market's
/// entry guard.
#[derive(Debug, Clone)]
pub struct StakeReceipt {
    pub market_id: String,
    pub option_id: String,
    /// Option odds as they stood before this stake landed. This is what a
    /// bet locks in: the bettor's own stake never moves the odds they get.
    pub locked_odds: Decimal,
    /// Display fields, copied onto bet records.
    pub market_title: String,
    pub option_name: String,
    pub category: String,
    /// Option stake after the update.
    pub option_stake: Decimal,
    /// Market total after the update.
    pub total_staked: Decimal,
}

/// Filter for market listings. Empty filter matches everything.
#[derive(Debug, Clone, Default)]
pub struct MarketFilter {
    pub status: Option<MarketStatus>,
    pub category: Option<String>,
}

/// Per-market, per-option stake accounting with derived odds.
///
/// All mutations to one market are serialized through its `DashMap` entry
/// guard; the full odds/percentage recompute happens before the guard drops.
#[derive(Debug)]
pub struct PoolLedger {
    markets: DashMap<String, MarketPool>,
    config: BettingConfig,
}

impl PoolLedger {
    /// Create an empty ledger with the given policy.
    pub fn new(config: BettingConfig) -> Self {
        Self {
            markets: DashMap::new(),
            config,
        }
    }

    /// Open a new market with zeroed options and return its snapshot.
    pub fn open_market(&self, request: OpenMarketRequest) -> Result<MarketView, PoolError> {
        if request.option_names.len() < self.config.min_options {
            return Err(PoolError::TooFewOptions {
                supplied: request.option_names.len(),
                required: self.config.min_options,
            });
        }
        if request.seed_liquidity < self.config.min_seed_liquidity {
            return Err(PoolError::SeedBelowMinimum {
                supplied: request.seed_liquidity,
                required: self.config.min_seed_liquidity,
            });
        }

        let options = request
            .option_names
            .into_iter()
            .enumerate()
            .map(|(index, name)| MarketOption::new(index, name))
            .collect();

        let pool = MarketPool {
            id: Uuid::new_v4().to_string(),
            title: request.title,
            category: request.category,
            status: MarketStatus::Active,
            options,
            closes_at: request.closes_at,
            seed_liquidity: request.seed_liquidity,
            created_at: Utc::now(),
            resolved_at: None,
            winning_option: None,
        };

        let view = pool.view();
        info!(
            market_id = %pool.id,
            title = %pool.title,
            options = pool.options.len(),
            "market opened"
        );
        self.markets.insert(pool.id.clone(), pool);
        Ok(view)
    }

    /// Add `amount` to an option's stake and recompute the whole option set.
    ///
    /// Returns a receipt carrying the option's pre-update odds; capturing
    /// them and applying the stake happen under one entry guard, so no
    /// concurrent placement can slip between the two.
    pub fn apply_stake(
        &self,
        market_id: &str,
        option_id: &str,
        amount: Decimal,
    ) -> Result<StakeReceipt, PoolError> {
        if amount <= Decimal::ZERO {
            return Err(PoolError::InvalidAmount { amount });
        }

        let mut market = self
            .markets
            .get_mut(market_id)
            .ok_or_else(|| PoolError::MarketNotFound {
                market_id: market_id.to_string(),
            })?;

        if !market.is_open(Utc::now()) {
            return Err(PoolError::MarketClosed {
                market_id: market_id.to_string(),
            });
        }

        let index = market
            .option_index(option_id)
            .ok_or_else(|| PoolError::OptionNotFound {
                market_id: market_id.to_string(),
                option_id: option_id.to_string(),
            })?;

        let locked_odds = market.options[index].odds;
        market.options[index].stake += amount;
        market.options[index].bet_count += 1;
        market.recompute();

        debug!(
            market_id,
            option_id,
            %amount,
            %locked_odds,
            total_staked = %market.total_staked(),
            "stake applied"
        );

        Ok(StakeReceipt {
            market_id: market_id.to_string(),
            option_id: option_id.to_string(),
            locked_odds,
            market_title: market.title.clone(),
            option_name: market.options[index].name.clone(),
            category: market.category.clone(),
            option_stake: market.options[index].stake,
            total_staked: market.total_staked(),
        })
    }

    /// Subtract `amount` from an option's stake and recompute the whole
    /// option set, exactly as [`apply_stake`](Self::apply_stake) does.
    ///
    /// Reversing what was previously applied restores the pool to its prior
    /// state (the round-trip law).
    pub fn reverse_stake(
        &self,
        market_id: &str,
        option_id: &str,
        amount: Decimal,
    ) -> Result<(), PoolError> {
        if amount <= Decimal::ZERO {
            return Err(PoolError::InvalidAmount { amount });
        }

        let mut market = self
            .markets
            .get_mut(market_id)
            .ok_or_else(|| PoolError::MarketNotFound {
                market_id: market_id.to_string(),
            })?;

        if !market.is_open(Utc::now()) {
            return Err(PoolError::MarketClosed {
                market_id: market_id.to_string(),
            });
        }

        let index = market
            .option_index(option_id)
            .ok_or_else(|| PoolError::OptionNotFound {
                market_id: market_id.to_string(),
                option_id: option_id.to_string(),
            })?;

        let available = market.options[index].stake;
        if available < amount {
            return Err(PoolError::InsufficientStake {
                option_id: option_id.to_string(),
                requested: amount,
                available,
            });
        }

        market.options[index].stake -= amount;
        market.options[index].bet_count = market.options[index].bet_count.saturating_sub(1);
        market.recompute();

        debug!(
            market_id,
            option_id,
            %amount,
            total_staked = %market.total_staked(),
            "stake reversed"
        );
        Ok(())
    }

    /// Current odds for one option. Read-only; works on frozen markets too.
    pub fn estimate_odds(&self, market_id: &str, option_id: &str) -> Result<Decimal, PoolError> {
        let market = self
            .markets
            .get(market_id)
            .ok_or_else(|| PoolError::MarketNotFound {
                market_id: market_id.to_string(),
            })?;
        let index = market
            .option_index(option_id)
            .ok_or_else(|| PoolError::OptionNotFound {
                market_id: market_id.to_string(),
                option_id: option_id.to_string(),
            })?;
        Ok(market.options[index].odds)
    }

    /// Freeze the market with a winning option and return that option's
    /// final odds, which settlement pays out at.
    ///
    /// Fails with `MarketClosed` when already resolved or cancelled.
    pub fn resolve_market(
        &self,
        market_id: &str,
        winning_option_id: &str,
    ) -> Result<Decimal, PoolError> {
        let mut market = self
            .markets
            .get_mut(market_id)
            .ok_or_else(|| PoolError::MarketNotFound {
                market_id: market_id.to_string(),
            })?;

        if market.status != MarketStatus::Active {
            return Err(PoolError::MarketClosed {
                market_id: market_id.to_string(),
            });
        }

        let index =
            market
                .option_index(winning_option_id)
                .ok_or_else(|| PoolError::OptionNotFound {
                    market_id: market_id.to_string(),
                    option_id: winning_option_id.to_string(),
                })?;

        market.status = MarketStatus::Resolved;
        market.resolved_at = Some(Utc::now());
        market.winning_option = Some(winning_option_id.to_string());

        let final_odds = market.options[index].odds;
        info!(
            market_id,
            winning_option = winning_option_id,
            %final_odds,
            "market resolved"
        );
        Ok(final_odds)
    }

    /// Freeze the market without a winner. The pool keeps its final numbers
    /// as a historical record; no stake is reversed.
    pub fn cancel_market(&self, market_id: &str) -> Result<(), PoolError> {
        let mut market = self
            .markets
            .get_mut(market_id)
            .ok_or_else(|| PoolError::MarketNotFound {
                market_id: market_id.to_string(),
            })?;

        if market.status != MarketStatus::Active {
            return Err(PoolError::MarketClosed {
                market_id: market_id.to_string(),
            });
        }

        market.status = MarketStatus::Cancelled;
        info!(market_id, "market cancelled");
        Ok(())
    }

    /// Snapshot one market.
    pub fn snapshot(&self, market_id: &str) -> Result<MarketView, PoolError> {
        self.markets
            .get(market_id)
            .map(|m| m.view())
            .ok_or_else(|| PoolError::MarketNotFound {
                market_id: market_id.to_string(),
            })
    }

    /// Snapshot all markets matching the filter, newest first.
    pub fn list_markets(&self, filter: &MarketFilter) -> Vec<MarketView> {
        let mut views: Vec<MarketView> = self
            .markets
            .iter()
            .filter(|entry| {
                filter.status.map_or(true, |s| entry.status == s)
                    && filter
                        .category
                        .as_ref()
                        .map_or(true, |c| &entry.category == c)
            })
            .map(|entry| entry.view())
            .collect();
        views.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        views
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn ledger() -> PoolLedger {
        PoolLedger::new(BettingConfig::default())
    }

    fn open_two_way(ledger: &PoolLedger) -> MarketView {
        ledger
            .open_market(OpenMarketRequest {
                title: "Will it rain tomorrow?".to_string(),
                category: "weather".to_string(),
                option_names: vec!["Yes".to_string(), "No".to_string()],
                closes_at: Utc::now() + Duration::hours(1),
                seed_liquidity: dec!(50),
            })
            .unwrap()
    }

    #[test]
    fn test_open_market_zeroed_options() {
        let ledger = ledger();
        let market = open_two_way(&ledger);

        assert_eq!(market.status, MarketStatus::Active);
        assert_eq!(market.options.len(), 2);
        assert_eq!(market.options[0].id, "option_0");
        assert_eq!(market.options[1].id, "option_1");
        assert_eq!(market.total_staked, Decimal::ZERO);
        for opt in &market.options {
            assert_eq!(opt.stake, Decimal::ZERO);
            assert_eq!(opt.bet_count, 0);
            assert_eq!(opt.odds, dec!(1));
            assert_eq!(opt.percentage, Decimal::ZERO);
        }
    }

    #[test]
    fn test_open_market_requires_two_options() {
        let ledger = ledger();
        let err = ledger
            .open_market(OpenMarketRequest {
                title: "One-sided".to_string(),
                category: "test".to_string(),
                option_names: vec!["Only".to_string()],
                closes_at: Utc::now() + Duration::hours(1),
                seed_liquidity: dec!(50),
            })
            .unwrap_err();
        assert_eq!(
            err,
            PoolError::TooFewOptions {
                supplied: 1,
                required: 2
            }
        );
    }

    #[test]
    fn test_open_market_rejects_low_seed() {
        let ledger = ledger();
        let err = ledger
            .open_market(OpenMarketRequest {
                title: "Underfunded".to_string(),
                category: "test".to_string(),
                option_names: vec!["A".to_string(), "B".to_string()],
                closes_at: Utc::now() + Duration::hours(1),
                seed_liquidity: dec!(9.99),
            })
            .unwrap_err();
        assert_eq!(
            err,
            PoolError::SeedBelowMinimum {
                supplied: dec!(9.99),
                required: dec!(10)
            }
        );
    }

    #[test]
    fn test_first_stake_locks_even_odds() {
        let ledger = ledger();
        let market = open_two_way(&ledger);

        let receipt = ledger
            .apply_stake(&market.id, "option_0", dec!(100))
            .unwrap();
        // Empty pool: pre-update odds are defined as 1.0
        assert_eq!(receipt.locked_odds, dec!(1));
        assert_eq!(receipt.option_stake, dec!(100));
        assert_eq!(receipt.total_staked, dec!(100));
        assert_eq!(receipt.category, "weather");

        let view = ledger.snapshot(&market.id).unwrap();
        assert_eq!(view.options[0].stake, dec!(100));
        assert_eq!(view.options[0].bet_count, 1);
        assert_eq!(view.options[0].percentage, dec!(100));
        assert_eq!(view.options[1].percentage, dec!(0));
        // T = s_0 = 100 so odds_0 stays at the floor
        assert_eq!(view.options[0].odds, dec!(1));
        assert_eq!(view.options[1].odds, dec!(1));
    }

    #[test]
    fn test_second_option_stake_rebalances_everything() {
        let ledger = ledger();
        let market = open_two_way(&ledger);
        ledger
            .apply_stake(&market.id, "option_0", dec!(100))
            .unwrap();

        let receipt = ledger
            .apply_stake(&market.id, "option_1", dec!(100))
            .unwrap();
        // Zero-stake option is defined to have odds 1.0 pre-update
        assert_eq!(receipt.locked_odds, dec!(1));

        let view = ledger.snapshot(&market.id).unwrap();
        assert_eq!(view.total_staked, dec!(200));
        assert_eq!(view.options[0].odds, dec!(2));
        assert_eq!(view.options[1].odds, dec!(2));
        assert_eq!(view.options[0].percentage, dec!(50));
        assert_eq!(view.options[1].percentage, dec!(50));
    }

    #[test]
    fn test_locked_odds_ignore_own_stake_but_see_prior_stakes() {
        let ledger = ledger();
        let market = open_two_way(&ledger);
        ledger
            .apply_stake(&market.id, "option_0", dec!(300))
            .unwrap();
        ledger
            .apply_stake(&market.id, "option_1", dec!(100))
            .unwrap();

        // Option 1 carries 100 of 400 staked: current odds 4.0
        let receipt = ledger
            .apply_stake(&market.id, "option_1", dec!(50))
            .unwrap();
        assert_eq!(receipt.locked_odds, dec!(4));
        // Post-update odds moved: 450 / 150 = 3.0
        let view = ledger.snapshot(&market.id).unwrap();
        assert_eq!(view.options[1].odds, dec!(3));
    }

    #[test]
    fn test_reverse_restores_pool_exactly() {
        let ledger = ledger();
        let market = open_two_way(&ledger);
        ledger
            .apply_stake(&market.id, "option_0", dec!(120))
            .unwrap();
        ledger
            .apply_stake(&market.id, "option_1", dec!(80))
            .unwrap();

        let before = ledger.snapshot(&market.id).unwrap();
        ledger
            .apply_stake(&market.id, "option_0", dec!(55.5))
            .unwrap();
        ledger
            .reverse_stake(&market.id, "option_0", dec!(55.5))
            .unwrap();
        let after = ledger.snapshot(&market.id).unwrap();

        assert_eq!(before, after);
    }

    #[test]
    fn test_reverse_recomputes_odds_for_remaining_options() {
        let ledger = ledger();
        let market = open_two_way(&ledger);
        ledger
            .apply_stake(&market.id, "option_0", dec!(100))
            .unwrap();
        ledger
            .apply_stake(&market.id, "option_1", dec!(100))
            .unwrap();

        ledger
            .reverse_stake(&market.id, "option_0", dec!(100))
            .unwrap();

        let view = ledger.snapshot(&market.id).unwrap();
        assert_eq!(view.total_staked, dec!(100));
        assert_eq!(view.options[0].stake, Decimal::ZERO);
        assert_eq!(view.options[0].bet_count, 0);
        assert_eq!(view.options[0].odds, dec!(1));
        assert_eq!(view.options[0].percentage, dec!(0));
        assert_eq!(view.options[1].odds, dec!(1));
        assert_eq!(view.options[1].percentage, dec!(100));
    }

    #[test]
    fn test_reverse_more_than_staked_fails() {
        let ledger = ledger();
        let market = open_two_way(&ledger);
        ledger
            .apply_stake(&market.id, "option_0", dec!(40))
            .unwrap();

        let err = ledger
            .reverse_stake(&market.id, "option_0", dec!(41))
            .unwrap_err();
        assert_eq!(
            err,
            PoolError::InsufficientStake {
                option_id: "option_0".to_string(),
                requested: dec!(41),
                available: dec!(40),
            }
        );
    }

    #[test]
    fn test_stake_validation() {
        let ledger = ledger();
        let market = open_two_way(&ledger);

        assert!(matches!(
            ledger.apply_stake(&market.id, "option_0", Decimal::ZERO),
            Err(PoolError::InvalidAmount { .. })
        ));
        assert!(matches!(
            ledger.apply_stake(&market.id, "option_0", dec!(-5)),
            Err(PoolError::InvalidAmount { .. })
        ));
        assert!(matches!(
            ledger.apply_stake("missing", "option_0", dec!(10)),
            Err(PoolError::MarketNotFound { .. })
        ));
        assert!(matches!(
            ledger.apply_stake(&market.id, "option_9", dec!(10)),
            Err(PoolError::OptionNotFound { .. })
        ));
    }

    #[test]
    fn test_expired_market_rejects_stakes() {
        let ledger = ledger();
        let market = ledger
            .open_market(OpenMarketRequest {
                title: "Already over".to_string(),
                category: "test".to_string(),
                option_names: vec!["A".to_string(), "B".to_string()],
                closes_at: Utc::now() - Duration::minutes(1),
                seed_liquidity: dec!(10),
            })
            .unwrap();

        assert!(matches!(
            ledger.apply_stake(&market.id, "option_0", dec!(10)),
            Err(PoolError::MarketClosed { .. })
        ));
    }

    #[test]
    fn test_resolve_freezes_market() {
        let ledger = ledger();
        let market = open_two_way(&ledger);
        ledger
            .apply_stake(&market.id, "option_0", dec!(100))
            .unwrap();
        ledger
            .apply_stake(&market.id, "option_1", dec!(300))
            .unwrap();

        // Final odds for option_0: 400 / 100 = 4.0
        let final_odds = ledger.resolve_market(&market.id, "option_0").unwrap();
        assert_eq!(final_odds, dec!(4));

        let view = ledger.snapshot(&market.id).unwrap();
        assert_eq!(view.status, MarketStatus::Resolved);
        assert_eq!(view.winning_option.as_deref(), Some("option_0"));
        assert!(view.resolved_at.is_some());

        // Frozen: no further mutation, no second resolution
        assert!(matches!(
            ledger.apply_stake(&market.id, "option_1", dec!(10)),
            Err(PoolError::MarketClosed { .. })
        ));
        assert!(matches!(
            ledger.reverse_stake(&market.id, "option_0", dec!(100)),
            Err(PoolError::MarketClosed { .. })
        ));
        assert!(matches!(
            ledger.resolve_market(&market.id, "option_1"),
            Err(PoolError::MarketClosed { .. })
        ));
    }

    #[test]
    fn test_resolve_unknown_option_leaves_market_active() {
        let ledger = ledger();
        let market = open_two_way(&ledger);

        assert!(matches!(
            ledger.resolve_market(&market.id, "option_9"),
            Err(PoolError::OptionNotFound { .. })
        ));
        let view = ledger.snapshot(&market.id).unwrap();
        assert_eq!(view.status, MarketStatus::Active);
    }

    #[test]
    fn test_cancel_market() {
        let ledger = ledger();
        let market = open_two_way(&ledger);
        ledger
            .apply_stake(&market.id, "option_0", dec!(100))
            .unwrap();

        ledger.cancel_market(&market.id).unwrap();
        let view = ledger.snapshot(&market.id).unwrap();
        assert_eq!(view.status, MarketStatus::Cancelled);
        // Frozen with its final numbers intact
        assert_eq!(view.total_staked, dec!(100));
        assert!(matches!(
            ledger.cancel_market(&market.id),
            Err(PoolError::MarketClosed { .. })
        ));
    }

    #[test]
    fn test_estimate_odds_matches_snapshot() {
        let ledger = ledger();
        let market = open_two_way(&ledger);
        ledger
            .apply_stake(&market.id, "option_0", dec!(75))
            .unwrap();
        ledger
            .apply_stake(&market.id, "option_1", dec!(25))
            .unwrap();

        assert_eq!(
            ledger.estimate_odds(&market.id, "option_1").unwrap(),
            dec!(4)
        );
        assert!(matches!(
            ledger.estimate_odds(&market.id, "option_9"),
            Err(PoolError::OptionNotFound { .. })
        ));
    }

    #[test]
    fn test_odds_never_below_one_and_percentages_sum_to_hundred() {
        let ledger = ledger();
        let market = ledger
            .open_market(OpenMarketRequest {
                title: "Three-way".to_string(),
                category: "test".to_string(),
                option_names: vec!["A".to_string(), "B".to_string(), "C".to_string()],
                closes_at: Utc::now() + Duration::hours(1),
                seed_liquidity: dec!(10),
            })
            .unwrap();

        for (option, amount) in [
            ("option_0", dec!(1)),
            ("option_1", dec!(1)),
            ("option_2", dec!(1)),
            ("option_0", dec!(7.77)),
        ] {
            ledger.apply_stake(&market.id, option, amount).unwrap();
            let view = ledger.snapshot(&market.id).unwrap();
            let pct_sum: Decimal = view.options.iter().map(|o| o.percentage).sum();
            assert!((pct_sum - dec!(100)).abs() < dec!(0.000001), "pct_sum = {}", pct_sum);
            for opt in &view.options {
                assert!(opt.odds >= dec!(1));
            }
        }
    }

    #[test]
    fn test_list_markets_filters_and_orders() {
        let ledger = ledger();
        let first = open_two_way(&ledger);
        let second = ledger
            .open_market(OpenMarketRequest {
                title: "Crypto market".to_string(),
                category: "crypto".to_string(),
                option_names: vec!["Up".to_string(), "Down".to_string()],
                closes_at: Utc::now() + Duration::hours(2),
                seed_liquidity: dec!(10),
            })
            .unwrap();
        ledger.resolve_market(&second.id, "option_0").unwrap();

        let all = ledger.list_markets(&MarketFilter::default());
        assert_eq!(all.len(), 2);

        let active = ledger.list_markets(&MarketFilter {
            status: Some(MarketStatus::Active),
            category: None,
        });
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, first.id);

        let crypto = ledger.list_markets(&MarketFilter {
            status: None,
            category: Some("crypto".to_string()),
        });
        assert_eq!(crypto.len(), 1);
        assert_eq!(crypto[0].id, second.id);
    }
}
