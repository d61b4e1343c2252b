//! Team vaults: shared wagering accounts with weighted membership.
//!
//! A vault is created by one member (the creator, seeded with a baseline
//! voting power at zero deposit) and joined by others, whose voting power is
//! their deposit divided by the configured divisor, fixed at join time.
//! Member records are append-only: suspension flips a flag and releases the
//! deposit from `total_deposits`, but the member keeps their slot, their
//! weight in quorum denominators, and their history.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use wager_common::{BettingStrategy, TeamType};

use crate::config::VaultConfig;

/// Errors from vault registry operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum VaultError {
    #[error("Vault not found: {vault_id}")]
    VaultNotFound { vault_id: String },

    #[error("Vault {vault_id} is not active")]
    VaultInactive { vault_id: String },

    #[error("Vault {vault_id} is full ({max_members} members)")]
    VaultFull { vault_id: String, max_members: usize },

    #[error("{address} is already a member of vault {vault_id}")]
    AlreadyMember { vault_id: String, address: String },

    #[error("Deposit {amount} is below the vault minimum of {minimum}")]
    BelowMinimumDeposit { amount: Decimal, minimum: Decimal },

    #[error("Minimum deposit cannot be negative, got {amount}")]
    InvalidMinDeposit { amount: Decimal },

    #[error("Unknown betting strategy: {value}")]
    InvalidStrategy { value: String },

    #[error("Unknown team type: {value}")]
    InvalidTeamType { value: String },

    #[error("Member limit {requested} is outside the allowed range {min}..={max}")]
    InvalidMemberLimit {
        requested: usize,
        min: usize,
        max: usize,
    },

    #[error("Only the creator of vault {vault_id} may do this, not {requester}")]
    NotCreator { vault_id: String, requester: String },

    #[error("The creator of vault {vault_id} cannot be suspended")]
    CannotSuspendCreator { vault_id: String },

    #[error("{address} is not a member of vault {vault_id}")]
    MemberNotFound { vault_id: String, address: String },

    #[error("{address} is not an active member of vault {vault_id}")]
    MemberInactive { vault_id: String, address: String },
}

/// One member of a team vault.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamMember {
    pub address: String,
    pub nickname: String,
    pub deposit: Decimal,
    pub joined_at: DateTime<Utc>,
    pub is_active: bool,
    /// `deposit / divisor`, fixed when the member joined.
    pub voting_power: Decimal,
    /// Executed proposals this member authored.
    pub bet_count: u64,
    /// Payouts credited from this member's winning proposals.
    pub total_winnings: Decimal,
}

/// A shared wagering account, collectively controlled by its members.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamVault {
    pub id: String,
    pub name: String,
    pub description: String,
    pub creator: String,
    /// In join order; never removed, only suspended.
    pub members: Vec<TeamMember>,
    /// Sum of active members' deposits.
    pub total_deposits: Decimal,
    /// Cumulative amount wagered through executed proposals.
    pub total_wagered: Decimal,
    /// Cumulative payouts credited from winning team bets.
    pub total_payouts: Decimal,
    pub is_active: bool,
    pub team_type: TeamType,
    pub min_deposit: Decimal,
    pub max_members: usize,
    pub strategy: BettingStrategy,
    pub created_at: DateTime<Utc>,
}

impl TeamVault {
    pub fn member(&self, address: &str) -> Option<&TeamMember> {
        self.members.iter().find(|m| m.address == address)
    }

    fn member_mut(&mut self, address: &str) -> Option<&mut TeamMember> {
        self.members.iter_mut().find(|m| m.address == address)
    }

    /// Quorum denominator: every member's power, suspended ones included.
    pub fn total_voting_power(&self) -> Decimal {
        self.members.iter().map(|m| m.voting_power).sum()
    }
}

/// Parameters for creating a vault. Strategy and team type arrive as raw
/// strings and are parsed against the recognized values; `None` fields fall
/// back to the configured defaults.
#[derive(Debug, Clone, Default)]
pub struct CreateVaultRequest {
    pub name: String,
    pub description: String,
    pub creator: String,
    pub strategy: Option<String>,
    pub team_type: Option<String>,
    pub min_deposit: Option<Decimal>,
    pub max_members: Option<usize>,
}

/// Filter for vault listings. Empty filter matches everything.
#[derive(Debug, Clone, Default)]
pub struct VaultFilter {
    pub team_type: Option<TeamType>,
    pub active: Option<bool>,
}

/// Aggregate record for one vault, including proposal outcomes.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultStats {
    pub vault_id: String,
    /// All members, suspended included.
    pub total_members: usize,
    pub total_deposits: Decimal,
    pub total_wagered: Decimal,
    pub total_payouts: Decimal,
    /// Executed proposals.
    pub executed_bets: usize,
    /// Winning share of executed proposals, 0..=100.
    pub win_rate: Decimal,
    pub average_bet_size: Decimal,
    /// Nickname of the member with the highest `total_winnings`; the
    /// earliest joiner wins ties.
    pub top_performer: String,
}

/// Team vaults keyed by id.
#[derive(Debug)]
pub struct VaultRegistry {
    vaults: DashMap<String, TeamVault>,
    config: VaultConfig,
}

impl VaultRegistry {
    pub fn new(config: VaultConfig) -> Self {
        Self {
            vaults: DashMap::new(),
            config,
        }
    }

    /// Create a vault with the creator as its first member, holding the
    /// baseline voting power at zero deposit.
    pub fn create_vault(&self, request: CreateVaultRequest) -> Result<TeamVault, VaultError> {
        let strategy = match &request.strategy {
            Some(value) => value
                .parse::<BettingStrategy>()
                .map_err(|_| VaultError::InvalidStrategy {
                    value: value.clone(),
                })?,
            None => self.config.default_strategy,
        };
        let team_type = match &request.team_type {
            Some(value) => value
                .parse::<TeamType>()
                .map_err(|_| VaultError::InvalidTeamType {
                    value: value.clone(),
                })?,
            None => TeamType::default(),
        };

        let min_deposit = request.min_deposit.unwrap_or(self.config.min_deposit);
        if min_deposit < Decimal::ZERO {
            return Err(VaultError::InvalidMinDeposit {
                amount: min_deposit,
            });
        }

        let max_members = request
            .max_members
            .unwrap_or(self.config.default_max_members);
        if max_members < self.config.member_limit_min || max_members > self.config.member_limit_max
        {
            return Err(VaultError::InvalidMemberLimit {
                requested: max_members,
                min: self.config.member_limit_min,
                max: self.config.member_limit_max,
            });
        }

        let now = Utc::now();
        let creator_member = TeamMember {
            address: request.creator.clone(),
            nickname: "Creator".to_string(),
            deposit: Decimal::ZERO,
            joined_at: now,
            is_active: true,
            voting_power: self.config.creator_voting_power,
            bet_count: 0,
            total_winnings: Decimal::ZERO,
        };

        let vault = TeamVault {
            id: Uuid::new_v4().to_string(),
            name: request.name,
            description: request.description,
            creator: request.creator,
            members: vec![creator_member],
            total_deposits: Decimal::ZERO,
            total_wagered: Decimal::ZERO,
            total_payouts: Decimal::ZERO,
            is_active: true,
            team_type,
            min_deposit,
            max_members,
            strategy,
            created_at: now,
        };

        info!(
            vault_id = %vault.id,
            name = %vault.name,
            creator = %vault.creator,
            strategy = %vault.strategy,
            team_type = %vault.team_type,
            max_members,
            "team vault created"
        );
        let snapshot = vault.clone();
        self.vaults.insert(vault.id.clone(), vault);
        Ok(snapshot)
    }

    /// Join a vault with a deposit; voting power is fixed here and never
    /// recomputed.
    pub fn join_vault(
        &self,
        vault_id: &str,
        address: &str,
        nickname: &str,
        deposit: Decimal,
    ) -> Result<TeamMember, VaultError> {
        let mut vault = self
            .vaults
            .get_mut(vault_id)
            .ok_or_else(|| VaultError::VaultNotFound {
                vault_id: vault_id.to_string(),
            })?;

        if !vault.is_active {
            return Err(VaultError::VaultInactive {
                vault_id: vault_id.to_string(),
            });
        }
        if vault.member(address).is_some() {
            return Err(VaultError::AlreadyMember {
                vault_id: vault_id.to_string(),
                address: address.to_string(),
            });
        }
        if vault.members.len() >= vault.max_members {
            return Err(VaultError::VaultFull {
                vault_id: vault_id.to_string(),
                max_members: vault.max_members,
            });
        }
        if deposit < vault.min_deposit {
            return Err(VaultError::BelowMinimumDeposit {
                amount: deposit,
                minimum: vault.min_deposit,
            });
        }

        let member = TeamMember {
            address: address.to_string(),
            nickname: nickname.to_string(),
            deposit,
            joined_at: Utc::now(),
            is_active: true,
            voting_power: deposit / self.config.voting_power_divisor,
            bet_count: 0,
            total_winnings: Decimal::ZERO,
        };
        vault.members.push(member.clone());
        vault.total_deposits += deposit;

        info!(
            vault_id,
            address,
            nickname,
            %deposit,
            voting_power = %member.voting_power,
            "member joined vault"
        );
        Ok(member)
    }

    /// Flip the vault inactive. Creator only; inactive vaults refuse joins
    /// and new proposals.
    pub fn deactivate_vault(&self, vault_id: &str, requester: &str) -> Result<(), VaultError> {
        let mut vault = self
            .vaults
            .get_mut(vault_id)
            .ok_or_else(|| VaultError::VaultNotFound {
                vault_id: vault_id.to_string(),
            })?;

        if vault.creator != requester {
            return Err(VaultError::NotCreator {
                vault_id: vault_id.to_string(),
                requester: requester.to_string(),
            });
        }
        if !vault.is_active {
            return Err(VaultError::VaultInactive {
                vault_id: vault_id.to_string(),
            });
        }

        vault.is_active = false;
        info!(vault_id, "vault deactivated");
        Ok(())
    }

    /// Suspend a member: creator only, not the creator themselves. The
    /// deposit leaves `total_deposits`; the voting power stays in the quorum
    /// denominator.
    pub fn suspend_member(
        &self,
        vault_id: &str,
        requester: &str,
        address: &str,
    ) -> Result<(), VaultError> {
        let mut vault = self
            .vaults
            .get_mut(vault_id)
            .ok_or_else(|| VaultError::VaultNotFound {
                vault_id: vault_id.to_string(),
            })?;

        if vault.creator != requester {
            return Err(VaultError::NotCreator {
                vault_id: vault_id.to_string(),
                requester: requester.to_string(),
            });
        }
        if vault.creator == address {
            return Err(VaultError::CannotSuspendCreator {
                vault_id: vault_id.to_string(),
            });
        }

        let index = vault
            .members
            .iter()
            .position(|m| m.address == address)
            .ok_or_else(|| VaultError::MemberNotFound {
                vault_id: vault_id.to_string(),
                address: address.to_string(),
            })?;
        if !vault.members[index].is_active {
            return Err(VaultError::MemberInactive {
                vault_id: vault_id.to_string(),
                address: address.to_string(),
            });
        }

        let deposit = vault.members[index].deposit;
        vault.members[index].is_active = false;
        vault.total_deposits -= deposit;

        info!(vault_id, address, %deposit, "member suspended");
        Ok(())
    }

    /// Record an executed proposal: bump the wagered total and the
    /// proposer's bet count.
    pub fn record_wager(
        &self,
        vault_id: &str,
        proposer: &str,
        amount: Decimal,
    ) -> Result<(), VaultError> {
        let mut vault = self
            .vaults
            .get_mut(vault_id)
            .ok_or_else(|| VaultError::VaultNotFound {
                vault_id: vault_id.to_string(),
            })?;

        let member = vault
            .member_mut(proposer)
            .ok_or_else(|| VaultError::MemberNotFound {
                vault_id: vault_id.to_string(),
                address: proposer.to_string(),
            })?;
        member.bet_count += 1;
        vault.total_wagered += amount;

        debug!(vault_id, proposer, %amount, "team wager recorded");
        Ok(())
    }

    /// Credit a winning team bet: payout lands on the vault total and on the
    /// proposer's personal winnings.
    pub fn record_payout(
        &self,
        vault_id: &str,
        proposer: &str,
        payout: Decimal,
    ) -> Result<(), VaultError> {
        let mut vault = self
            .vaults
            .get_mut(vault_id)
            .ok_or_else(|| VaultError::VaultNotFound {
                vault_id: vault_id.to_string(),
            })?;

        let member = vault
            .member_mut(proposer)
            .ok_or_else(|| VaultError::MemberNotFound {
                vault_id: vault_id.to_string(),
                address: proposer.to_string(),
            })?;
        member.total_winnings += payout;
        vault.total_payouts += payout;

        debug!(vault_id, proposer, %payout, "team payout recorded");
        Ok(())
    }

    /// Read-only clone of one vault.
    pub fn snapshot(&self, vault_id: &str) -> Result<TeamVault, VaultError> {
        self.vaults
            .get(vault_id)
            .map(|r| r.value().clone())
            .ok_or_else(|| VaultError::VaultNotFound {
                vault_id: vault_id.to_string(),
            })
    }

    /// Vaults matching the filter, newest first.
    pub fn list_vaults(&self, filter: &VaultFilter) -> Vec<TeamVault> {
        let mut vaults: Vec<TeamVault> = self
            .vaults
            .iter()
            .filter(|entry| {
                filter.team_type.map_or(true, |t| entry.team_type == t)
                    && filter.active.map_or(true, |a| entry.is_active == a)
            })
            .map(|entry| entry.value().clone())
            .collect();
        vaults.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        vaults
    }
}
