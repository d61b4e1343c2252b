//! Pari-mutuel wagering and team-vault voting engine.
//!
//! This crate implements the accounting core of a prediction-market
//! application: per-option stake pools with deterministically derived odds,
//! bet records with locked-in odds, shared team vaults with weighted
//! membership, and a voting engine that turns approved proposals into real
//! bets exactly once.
//!
//! ## Architecture
//!
//! - **Per-aggregate serialization**: every market, bet, vault, and proposal
//!   lives in a DashMap; mutations run under the entry guard, so unrelated
//!   aggregates proceed in parallel while a single aggregate never sees
//!   interleaved read-modify-write
//! - **Full recompute**: odds and percentages are recomputed for the whole
//!   option set on every stake mutation, never incrementally
//! - **Locked odds**: a bet captures the odds that stood before its own
//!   stake landed, atomically with the stake application
//!
//! ## Modules
//!
//! - `config`: Policy constants, TOML loading, and validation
//! - `pool`: Market pools, stake accounting, odds derivation, lifecycle
//! - `bets`: Bet records, placement/cancellation, settlement, statistics
//! - `vault`: Team vaults, membership, deposits, voting power
//! - `proposals`: Team bet proposals, weighted voting, quorum execution
//! - `engine`: Facade wiring the four components together

pub mod bets;
pub mod config;
pub mod engine;
pub mod pool;
pub mod proposals;
pub mod vault;

pub use bets::{
    Bet, BetError, BetFilter, BetPage, BetRegistry, BettorStats, SettledBet, SettlementReport,
};
pub use config::{BettingConfig, EngineConfig, VaultConfig, VotingConfig};
pub use engine::{MarketOverview, WagerEngine};
pub use pool::{
    MarketFilter, MarketOption, MarketView, OpenMarketRequest, PoolError, PoolLedger, StakeReceipt,
};
pub use proposals::{ProposalEngine, ProposalError, ProposalFilter, TeamProposal, VoteOutcome};
pub use vault::{
    CreateVaultRequest, TeamMember, TeamVault, VaultError, VaultFilter, VaultRegistry, VaultStats,
};

pub use wager_common::{
    BetStatus, BettingStrategy, MarketStatus, ProposalStatus, TeamType, VoteChoice,
};
