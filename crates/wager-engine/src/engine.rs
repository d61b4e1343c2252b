//! The engine facade: one handle wiring pools, bets, vaults, and proposals.
//!
//! [`WagerEngine`] owns the four components behind `Arc`s and is itself
//! cheap to share: wrap it in an `Arc` and call it from as many threads as
//! you like. Single-component operations delegate straight through; the
//! cross-component flows live here:
//!
//! - **resolve**: freeze the market, settle every pending bet at the final
//!   odds, then route each winning team bet's payout back to its vault and
//!   proposer.
//! - **cancel**: freeze the market without a winner and void its pending
//!   bets. Stakes stay where they were as the pool's historical record.
//! - **vault stats**: join vault bookkeeping with proposal outcomes.

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;
use tracing::warn;

use wager_common::{BetStatus, ProposalStatus, VoteChoice};

use crate::bets::{Bet, BetError, BetFilter, BetPage, BetRegistry, BettorStats, SettlementReport};
use crate::config::EngineConfig;
use crate::pool::{MarketFilter, MarketView, OpenMarketRequest, PoolError, PoolLedger};
use crate::proposals::{
    ProposalEngine, ProposalError, ProposalFilter, TeamProposal, VoteOutcome,
};
use crate::vault::{
    CreateVaultRequest, TeamMember, TeamVault, VaultError, VaultFilter, VaultRegistry, VaultStats,
};

/// A market snapshot joined with its bet-registry numbers.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketOverview {
    pub market: MarketView,
    /// Bets on record for the market, cancelled ones excluded.
    pub total_bet_count: usize,
    /// Distinct bettors who ever placed here, cancellations included.
    pub unique_participants: usize,
}

/// Entry point owning the whole engine.
#[derive(Debug)]
pub struct WagerEngine {
    config: EngineConfig,
    pools: Arc<PoolLedger>,
    bets: Arc<BetRegistry>,
    vaults: Arc<VaultRegistry>,
    proposals: Arc<ProposalEngine>,
}

impl WagerEngine {
    pub fn new(config: EngineConfig) -> Self {
        let pools = Arc::new(PoolLedger::new(config.betting.clone()));
        let bets = Arc::new(BetRegistry::new(
            Arc::clone(&pools),
            config.betting.clone(),
        ));
        let vaults = Arc::new(VaultRegistry::new(config.vault.clone()));
        let proposals = Arc::new(ProposalEngine::new(
            Arc::clone(&vaults),
            Arc::clone(&bets),
            config.voting.clone(),
        ));
        Self {
            config,
            pools,
            bets,
            vaults,
            proposals,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(EngineConfig::default())
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ---- markets ----

    pub fn open_market(&self, request: OpenMarketRequest) -> Result<MarketView, PoolError> {
        self.pools.open_market(request)
    }

    pub fn market_overview(&self, market_id: &str) -> Result<MarketOverview, PoolError> {
        let market = self.pools.snapshot(market_id)?;
        Ok(MarketOverview {
            total_bet_count: self.bets.market_bet_count(market_id),
            unique_participants: self.bets.unique_participants(market_id),
            market,
        })
    }

    pub fn list_markets(&self, filter: &MarketFilter) -> Vec<MarketView> {
        self.pools.list_markets(filter)
    }

    pub fn estimate_odds(&self, market_id: &str, option_id: &str) -> Result<Decimal, PoolError> {
        self.pools.estimate_odds(market_id, option_id)
    }

    /// Resolve a market and settle everything riding on it.
    ///
    /// Pending bets on the winning option are paid at the final odds; team
    /// bets additionally credit their vault's `total_payouts` and the
    /// proposer's `total_winnings`.
    pub fn resolve_market(
        &self,
        market_id: &str,
        winning_option_id: &str,
    ) -> Result<SettlementReport, PoolError> {
        let final_odds = self.pools.resolve_market(market_id, winning_option_id)?;
        let report = self
            .bets
            .settle_market(market_id, winning_option_id, final_odds);

        for settled in &report.settled {
            if settled.status != BetStatus::Won {
                continue;
            }
            if let Some(proposal) = self.proposals.find_by_bet(&settled.bet_id) {
                // Executed proposals always reference a live vault and member
                if let Err(err) = self.vaults.record_payout(
                    &proposal.vault_id,
                    &proposal.proposer,
                    settled.payout,
                ) {
                    warn!(bet_id = %settled.bet_id, %err, "team payout not credited");
                }
            }
        }
        Ok(report)
    }

    /// Cancel a market outright and void its pending bets. No payouts, no
    /// stake reversal. Returns how many bets were voided.
    pub fn cancel_market(&self, market_id: &str) -> Result<usize, PoolError> {
        self.pools.cancel_market(market_id)?;
        Ok(self.bets.void_market(market_id))
    }

    // ---- bets ----

    pub fn place_bet(
        &self,
        market_id: &str,
        option_id: &str,
        bettor: &str,
        amount: Decimal,
    ) -> Result<Bet, BetError> {
        self.bets.place_bet(market_id, option_id, bettor, amount)
    }

    pub fn cancel_bet(&self, bet_id: &str, requester: &str) -> Result<Bet, BetError> {
        self.bets.cancel_bet(bet_id, requester)
    }

    pub fn get_bet(&self, bet_id: &str) -> Result<Bet, BetError> {
        self.bets.get_bet(bet_id)
    }

    pub fn list_bets(&self, filter: &BetFilter) -> BetPage {
        self.bets.list_bets(filter)
    }

    pub fn bettor_stats(&self, bettor: &str) -> BettorStats {
        self.bets.bettor_stats(bettor)
    }

    // ---- vaults ----

    pub fn create_vault(&self, request: CreateVaultRequest) -> Result<TeamVault, VaultError> {
        self.vaults.create_vault(request)
    }

    pub fn join_vault(
        &self,
        vault_id: &str,
        address: &str,
        nickname: &str,
        deposit: Decimal,
    ) -> Result<TeamMember, VaultError> {
        self.vaults.join_vault(vault_id, address, nickname, deposit)
    }

    pub fn deactivate_vault(&self, vault_id: &str, requester: &str) -> Result<(), VaultError> {
        self.vaults.deactivate_vault(vault_id, requester)
    }

    pub fn suspend_member(
        &self,
        vault_id: &str,
        requester: &str,
        address: &str,
    ) -> Result<(), VaultError> {
        self.vaults.suspend_member(vault_id, requester, address)
    }

    pub fn vault_snapshot(&self, vault_id: &str) -> Result<TeamVault, VaultError> {
        self.vaults.snapshot(vault_id)
    }

    pub fn list_vaults(&self, filter: &VaultFilter) -> Vec<TeamVault> {
        self.vaults.list_vaults(filter)
    }

    /// Vault bookkeeping joined with how its executed proposals actually
    /// fared.
    pub fn vault_stats(&self, vault_id: &str) -> Result<VaultStats, VaultError> {
        let vault = self.vaults.snapshot(vault_id)?;
        let executed = self.proposals.list_proposals(&ProposalFilter {
            vault_id: Some(vault_id.to_string()),
            status: Some(ProposalStatus::Executed),
        });

        let executed_bets = executed.len();
        let mut winners = 0usize;
        let mut staked = Decimal::ZERO;
        for proposal in &executed {
            staked += proposal.amount;
            let won = proposal
                .bet_id
                .as_deref()
                .and_then(|id| self.bets.get_bet(id).ok())
                .map_or(false, |bet| bet.status == BetStatus::Won);
            if won {
                winners += 1;
            }
        }

        let win_rate = if executed_bets > 0 {
            Decimal::from(winners) * Decimal::ONE_HUNDRED / Decimal::from(executed_bets)
        } else {
            Decimal::ZERO
        };
        let average_bet_size = if executed_bets > 0 {
            staked / Decimal::from(executed_bets)
        } else {
            Decimal::ZERO
        };

        // Earliest joiner wins ties, so only a strictly better record takes
        // the title from the creator
        let mut top: Option<&TeamMember> = None;
        for member in &vault.members {
            match top {
                Some(current) if member.total_winnings <= current.total_winnings => {}
                _ => top = Some(member),
            }
        }

        Ok(VaultStats {
            vault_id: vault.id.clone(),
            total_members: vault.members.len(),
            total_deposits: vault.total_deposits,
            total_wagered: vault.total_wagered,
            total_payouts: vault.total_payouts,
            executed_bets,
            win_rate,
            average_bet_size,
            top_performer: top.map(|m| m.nickname.clone()).unwrap_or_default(),
        })
    }

    // ---- proposals ----

    pub fn propose_bet(
        &self,
        vault_id: &str,
        market_id: &str,
        option_id: &str,
        proposer: &str,
        description: &str,
        amount: Decimal,
    ) -> Result<TeamProposal, ProposalError> {
        self.proposals
            .propose_bet(vault_id, market_id, option_id, proposer, description, amount)
    }

    pub fn cast_vote(
        &self,
        proposal_id: &str,
        voter: &str,
        choice: VoteChoice,
    ) -> Result<VoteOutcome, ProposalError> {
        self.proposals.cast_vote(proposal_id, voter, choice)
    }

    pub fn get_proposal(&self, proposal_id: &str) -> Result<TeamProposal, ProposalError> {
        self.proposals.get_proposal(proposal_id)
    }

    pub fn list_proposals(&self, filter: &ProposalFilter) -> Vec<TeamProposal> {
        self.proposals.list_proposals(filter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use rust_decimal_macros::dec;
    use wager_common::MarketStatus;

    fn open_market(engine: &WagerEngine) -> String {
        engine
            .open_market(OpenMarketRequest {
                title: "Engine market".to_string(),
                category: "test".to_string(),
                option_names: vec!["Yes".to_string(), "No".to_string()],
                closes_at: Utc::now() + Duration::hours(1),
                seed_liquidity: dec!(10),
            })
            .unwrap()
            .id
    }

    #[test]
    fn test_overview_joins_pool_and_registry() {
        let engine = WagerEngine::with_defaults();
        let market = open_market(&engine);

        engine.place_bet(&market, "option_0", "alice", dec!(50)).unwrap();
        engine.place_bet(&market, "option_1", "alice", dec!(25)).unwrap();
        let dropped = engine
            .place_bet(&market, "option_1", "bob", dec!(25))
            .unwrap();
        engine.cancel_bet(&dropped.id, "bob").unwrap();

        let overview = engine.market_overview(&market).unwrap();
        assert_eq!(overview.market.total_staked, dec!(75));
        assert_eq!(overview.total_bet_count, 2);
        assert_eq!(overview.unique_participants, 2);
    }

    #[test]
    fn test_resolve_credits_winning_team_bet() {
        let engine = WagerEngine::with_defaults();
        let market = open_market(&engine);

        let vault = engine
            .create_vault(CreateVaultRequest {
                name: "Winners".to_string(),
                description: String::new(),
                creator: "alice".to_string(),
                strategy: Some("majority".to_string()),
                ..CreateVaultRequest::default()
            })
            .unwrap()
            .id;
        engine.join_vault(&vault, "bob", "Bob", dec!(1000)).unwrap();

        let proposal = engine
            .propose_bet(&vault, &market, "option_0", "bob", "looks good", dec!(500))
            .unwrap()
            .id;
        // Creator's baseline 100 carries the majority alone
        let outcome = engine
            .cast_vote(&proposal, "alice", VoteChoice::Approve)
            .unwrap();
        assert!(outcome.executed);
        let bet_id = outcome.proposal.bet_id.unwrap();

        let report = engine.resolve_market(&market, "option_0").unwrap();
        assert_eq!(report.winners, 1);
        // Sole bet on the winning side: final odds 1.0
        assert_eq!(report.total_paid, dec!(500));
        assert_eq!(engine.get_bet(&bet_id).unwrap().status, BetStatus::Won);

        let snapshot = engine.vault_snapshot(&vault).unwrap();
        assert_eq!(snapshot.total_payouts, dec!(500));
        assert_eq!(snapshot.member("bob").unwrap().total_winnings, dec!(500));

        let stats = engine.vault_stats(&vault).unwrap();
        assert_eq!(stats.executed_bets, 1);
        assert_eq!(stats.win_rate, dec!(100));
        assert_eq!(stats.average_bet_size, dec!(500));
        assert_eq!(stats.top_performer, "Bob");
    }

    #[test]
    fn test_cancel_market_voids_but_keeps_stakes() {
        let engine = WagerEngine::with_defaults();
        let market = open_market(&engine);
        engine.place_bet(&market, "option_0", "alice", dec!(60)).unwrap();
        engine.place_bet(&market, "option_1", "bob", dec!(40)).unwrap();

        assert_eq!(engine.cancel_market(&market).unwrap(), 2);

        let overview = engine.market_overview(&market).unwrap();
        assert_eq!(overview.market.status, MarketStatus::Cancelled);
        // The pool keeps its final numbers as a record
        assert_eq!(overview.market.total_staked, dec!(100));
        // But the registry counts no live bets
        assert_eq!(overview.total_bet_count, 0);
    }

    #[test]
    fn test_vault_stats_on_fresh_vault() {
        let engine = WagerEngine::with_defaults();
        let vault = engine
            .create_vault(CreateVaultRequest {
                name: "Quiet".to_string(),
                description: String::new(),
                creator: "alice".to_string(),
                ..CreateVaultRequest::default()
            })
            .unwrap()
            .id;

        let stats = engine.vault_stats(&vault).unwrap();
        assert_eq!(stats.total_members, 1);
        assert_eq!(stats.executed_bets, 0);
        assert_eq!(stats.win_rate, dec!(0));
        assert_eq!(stats.top_performer, "Creator");
    }
}
