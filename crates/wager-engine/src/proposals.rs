//! Team bet proposals: weighted voting and exactly-once execution.
//!
//! A proposal is a candidate bet drawn on a vault's pooled deposits. Members
//! vote approve or reject; after every vote the engine evaluates the vault's
//! strategy against the votes recorded at that instant and, once the quorum
//! holds, places the bet with the vault itself as the bettor.
//!
//! ## Exactly-once execution
//!
//! The whole vote-record / quorum-check / execute sequence runs under the
//! proposal's `DashMap` entry guard. Two members voting at the same moment
//! are serialized: whichever lands second sees either a still-pending
//! proposal (and votes normally) or an executed one (`ProposalNotPending`).
//! A proposal therefore executes at most once no matter how many votes
//! arrive concurrently.
//!
//! ## No terminal rejection
//!
//! Rejections weigh against majority quorums but there is no rejected
//! state; a proposal that never reaches quorum simply stays pending.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use wager_common::{BettingStrategy, ProposalStatus, VoteChoice};

use crate::bets::{BetError, BetRegistry};
use crate::config::VotingConfig;
use crate::vault::{TeamVault, VaultError, VaultRegistry};

/// Errors from proposal operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProposalError {
    #[error("Proposal not found: {proposal_id}")]
    ProposalNotFound { proposal_id: String },

    #[error("Proposal {proposal_id} is no longer pending")]
    ProposalNotPending { proposal_id: String },

    #[error("{address} is not a member of vault {vault_id}")]
    NotAMember { vault_id: String, address: String },

    #[error("{address} is not an active member of vault {vault_id}")]
    InactiveMember { vault_id: String, address: String },

    #[error("{voter} has already voted on proposal {proposal_id}")]
    AlreadyVoted { proposal_id: String, voter: String },

    #[error("Proposal amount must be positive, got {amount}")]
    InvalidAmount { amount: Decimal },

    #[error("Proposal amount {amount} exceeds the vault balance of {available}")]
    ExceedsVaultBalance { amount: Decimal, available: Decimal },

    #[error(transparent)]
    Vault(#[from] VaultError),

    #[error(transparent)]
    Bet(#[from] BetError),
}

/// A candidate team bet and the votes it has gathered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamProposal {
    pub id: String,
    pub vault_id: String,
    pub market_id: String,
    pub option_id: String,
    pub amount: Decimal,
    pub proposer: String,
    pub description: String,
    /// Voter addresses, in voting order. A voter appears in at most one set.
    pub approved_by: Vec<String>,
    pub rejected_by: Vec<String>,
    pub status: ProposalStatus,
    pub created_at: DateTime<Utc>,
    pub executed_at: Option<DateTime<Utc>>,
    /// The bet placed on execution.
    pub bet_id: Option<String>,
}

/// What one vote did: the post-vote proposal plus the tally it was judged
/// against.
#[derive(Debug, Clone)]
pub struct VoteOutcome {
    pub proposal: TeamProposal,
    pub executed: bool,
    pub approved_power: Decimal,
    pub rejected_power: Decimal,
    pub total_power: Decimal,
}

/// Filter for proposal listings. Empty filter matches everything.
#[derive(Debug, Clone, Default)]
pub struct ProposalFilter {
    pub vault_id: Option<String>,
    pub status: Option<ProposalStatus>,
}

/// Proposals keyed by id, wired to the vaults they draw on and the bet
/// registry that executes them.
#[derive(Debug)]
pub struct ProposalEngine {
    proposals: DashMap<String, TeamProposal>,
    vaults: Arc<VaultRegistry>,
    bets: Arc<BetRegistry>,
    config: VotingConfig,
}

impl ProposalEngine {
    pub fn new(vaults: Arc<VaultRegistry>, bets: Arc<BetRegistry>, config: VotingConfig) -> Self {
        Self {
            proposals: DashMap::new(),
            vaults,
            bets,
            config,
        }
    }

    /// Propose a bet against a vault's pooled deposits.
    ///
    /// Only active members of an active vault may propose, for a positive
    /// amount no larger than the vault's current deposits (equality is
    /// fine). The proposer does not implicitly approve; they vote like
    /// everyone else.
    pub fn propose_bet(
        &self,
        vault_id: &str,
        market_id: &str,
        option_id: &str,
        proposer: &str,
        description: &str,
        amount: Decimal,
    ) -> Result<TeamProposal, ProposalError> {
        let vault = self.vaults.snapshot(vault_id)?;
        if !vault.is_active {
            return Err(VaultError::VaultInactive {
                vault_id: vault_id.to_string(),
            }
            .into());
        }

        let member = vault
            .member(proposer)
            .ok_or_else(|| ProposalError::NotAMember {
                vault_id: vault_id.to_string(),
                address: proposer.to_string(),
            })?;
        if !member.is_active {
            return Err(ProposalError::InactiveMember {
                vault_id: vault_id.to_string(),
                address: proposer.to_string(),
            });
        }

        if amount <= Decimal::ZERO {
            return Err(ProposalError::InvalidAmount { amount });
        }
        if amount > vault.total_deposits {
            return Err(ProposalError::ExceedsVaultBalance {
                amount,
                available: vault.total_deposits,
            });
        }

        let proposal = TeamProposal {
            id: Uuid::new_v4().to_string(),
            vault_id: vault_id.to_string(),
            market_id: market_id.to_string(),
            option_id: option_id.to_string(),
            amount,
            proposer: proposer.to_string(),
            description: description.to_string(),
            approved_by: Vec::new(),
            rejected_by: Vec::new(),
            status: ProposalStatus::Pending,
            created_at: Utc::now(),
            executed_at: None,
            bet_id: None,
        };

        info!(
            proposal_id = %proposal.id,
            vault_id,
            market_id,
            option_id,
            proposer,
            %amount,
            "team bet proposed"
        );
        let snapshot = proposal.clone();
        self.proposals.insert(proposal.id.clone(), proposal);
        Ok(snapshot)
    }

    /// Record a vote and execute the proposal if its vault's quorum now
    /// holds.
    ///
    /// Runs entirely under the proposal's entry guard; see the module docs
    /// for the exactly-once argument. If the quorum holds but placing the
    /// bet fails (say the market closed while votes were gathering), the
    /// vote stays recorded, the proposal stays pending, and the placement
    /// error propagates to this voter.
    pub fn cast_vote(
        &self,
        proposal_id: &str,
        voter: &str,
        choice: VoteChoice,
    ) -> Result<VoteOutcome, ProposalError> {
        let mut proposal =
            self.proposals
                .get_mut(proposal_id)
                .ok_or_else(|| ProposalError::ProposalNotFound {
                    proposal_id: proposal_id.to_string(),
                })?;

        if proposal.status != ProposalStatus::Pending {
            return Err(ProposalError::ProposalNotPending {
                proposal_id: proposal_id.to_string(),
            });
        }

        let vault = self.vaults.snapshot(&proposal.vault_id)?;
        let member = vault
            .member(voter)
            .ok_or_else(|| ProposalError::NotAMember {
                vault_id: proposal.vault_id.clone(),
                address: voter.to_string(),
            })?;
        if !member.is_active {
            return Err(ProposalError::InactiveMember {
                vault_id: proposal.vault_id.clone(),
                address: voter.to_string(),
            });
        }
        if proposal.approved_by.iter().any(|v| v == voter)
            || proposal.rejected_by.iter().any(|v| v == voter)
        {
            return Err(ProposalError::AlreadyVoted {
                proposal_id: proposal_id.to_string(),
                voter: voter.to_string(),
            });
        }

        match choice {
            VoteChoice::Approve => proposal.approved_by.push(voter.to_string()),
            VoteChoice::Reject => proposal.rejected_by.push(voter.to_string()),
        }

        let total_power = vault.total_voting_power();
        let approved_power = voting_power_of(&vault, &proposal.approved_by);
        let rejected_power = voting_power_of(&vault, &proposal.rejected_by);
        let quorum = self.quorum_met(vault.strategy, approved_power, rejected_power, total_power);

        info!(
            proposal_id,
            voter,
            choice = %choice,
            %approved_power,
            %rejected_power,
            %total_power,
            quorum,
            "vote recorded"
        );

        let mut executed = false;
        if quorum {
            let bet = self.bets.place_bet(
                &proposal.market_id,
                &proposal.option_id,
                &proposal.vault_id,
                proposal.amount,
            )?;
            proposal.status = ProposalStatus::Executed;
            proposal.executed_at = Some(Utc::now());
            proposal.bet_id = Some(bet.id.clone());
            self.vaults
                .record_wager(&proposal.vault_id, &proposal.proposer, proposal.amount)?;
            executed = true;

            info!(
                proposal_id,
                bet_id = %bet.id,
                vault_id = %proposal.vault_id,
                amount = %proposal.amount,
                "team bet executed"
            );
        }

        Ok(VoteOutcome {
            proposal: proposal.clone(),
            executed,
            approved_power,
            rejected_power,
            total_power,
        })
    }

    pub fn get_proposal(&self, proposal_id: &str) -> Result<TeamProposal, ProposalError> {
        self.proposals
            .get(proposal_id)
            .map(|r| r.value().clone())
            .ok_or_else(|| ProposalError::ProposalNotFound {
                proposal_id: proposal_id.to_string(),
            })
    }

    /// Proposals matching the filter, newest first.
    pub fn list_proposals(&self, filter: &ProposalFilter) -> Vec<TeamProposal> {
        let mut proposals: Vec<TeamProposal> = self
            .proposals
            .iter()
            .filter(|entry| {
                filter
                    .vault_id
                    .as_ref()
                    .map_or(true, |v| &entry.vault_id == v)
                    && filter.status.map_or(true, |s| entry.status == s)
            })
            .map(|entry| entry.value().clone())
            .collect();
        proposals.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        proposals
    }

    /// The proposal a given bet was placed for, if any. Settlement uses
    /// this to route a team bet's payout back to its vault and proposer.
    pub fn find_by_bet(&self, bet_id: &str) -> Option<TeamProposal> {
        self.proposals
            .iter()
            .find(|entry| entry.bet_id.as_deref() == Some(bet_id))
            .map(|entry| entry.value().clone())
    }

    fn quorum_met(
        &self,
        strategy: BettingStrategy,
        approved: Decimal,
        rejected: Decimal,
        total: Decimal,
    ) -> bool {
        match strategy {
            BettingStrategy::Consensus => approved >= self.config.consensus_threshold * total,
            // Strict: a tie does not execute
            BettingStrategy::Majority => approved > rejected,
            BettingStrategy::Individual => approved >= self.config.individual_threshold * total,
        }
    }
}

/// Combined voting power of the given voters, read from the vault's member
/// list.
fn voting_power_of(vault: &TeamVault, voters: &[String]) -> Decimal {
    voters
        .iter()
        .filter_map(|v| vault.member(v))
        .map(|m| m.voting_power)
        .sum()
}
