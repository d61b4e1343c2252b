//! Shared vocabulary types for the wagering engine.
//!
//! All wire representations are lowercase strings, matching what transports
//! send and store. Every enum provides `as_str`, `Display`, and `FromStr`
//! (case-insensitive parse with a descriptive error).

use serde::{Deserialize, Serialize};

/// Lifecycle status of a market pool.
///
/// A pool accepts stake mutations only while `Active`. Both terminal states
/// freeze the pool permanently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MarketStatus {
    /// Open for placements and cancellations.
    #[default]
    Active,
    /// Resolved with a winning option; frozen.
    Resolved,
    /// Cancelled without a winner; frozen.
    Cancelled,
}

impl MarketStatus {
    /// Returns the display name.
    pub fn as_str(&self) -> &'static str {
        match self {
            MarketStatus::Active => "active",
            MarketStatus::Resolved => "resolved",
            MarketStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for MarketStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for MarketStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(MarketStatus::Active),
            "resolved" | "settled" => Ok(MarketStatus::Resolved),
            "cancelled" | "canceled" => Ok(MarketStatus::Cancelled),
            _ => Err(format!("Unknown market status: {}", s)),
        }
    }
}

/// Lifecycle status of a single bet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BetStatus {
    /// Placed, market not yet resolved.
    #[default]
    Pending,
    /// Settled on the winning option.
    Won,
    /// Settled on a losing option.
    Lost,
    /// Cancelled by the bettor (or voided with its market).
    Cancelled,
}

impl BetStatus {
    /// Returns the display name.
    pub fn as_str(&self) -> &'static str {
        match self {
            BetStatus::Pending => "pending",
            BetStatus::Won => "won",
            BetStatus::Lost => "lost",
            BetStatus::Cancelled => "cancelled",
        }
    }

    /// True for `Won`/`Lost` (the bet went through settlement).
    pub fn is_settled(&self) -> bool {
        matches!(self, BetStatus::Won | BetStatus::Lost)
    }

    /// True once no further transition is permitted.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, BetStatus::Pending)
    }
}

impl std::fmt::Display for BetStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for BetStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(BetStatus::Pending),
            "won" => Ok(BetStatus::Won),
            "lost" => Ok(BetStatus::Lost),
            "cancelled" | "canceled" => Ok(BetStatus::Cancelled),
            _ => Err(format!("Unknown bet status: {}", s)),
        }
    }
}

/// Lifecycle status of a team bet proposal.
///
/// There is deliberately no terminal rejected state: a proposal that
/// accumulates rejections stays `Pending`, since later approvals can still
/// satisfy quorum under the majority strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProposalStatus {
    /// Awaiting votes.
    #[default]
    Pending,
    /// Quorum reached; the team bet was placed.
    Executed,
}

impl ProposalStatus {
    /// Returns the display name.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProposalStatus::Pending => "pending",
            ProposalStatus::Executed => "executed",
        }
    }
}

impl std::fmt::Display for ProposalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ProposalStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(ProposalStatus::Pending),
            "executed" => Ok(ProposalStatus::Executed),
            _ => Err(format!("Unknown proposal status: {}", s)),
        }
    }
}

/// A member's vote on a team bet proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteChoice {
    Approve,
    Reject,
}

impl VoteChoice {
    /// Returns the display name.
    pub fn as_str(&self) -> &'static str {
        match self {
            VoteChoice::Approve => "approve",
            VoteChoice::Reject => "reject",
        }
    }
}

impl std::fmt::Display for VoteChoice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for VoteChoice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "approve" | "yes" => Ok(VoteChoice::Approve),
            "reject" | "no" => Ok(VoteChoice::Reject),
            _ => Err(format!("Unknown vote choice: {}", s)),
        }
    }
}

/// Quorum rule a team vault uses to execute proposed bets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BettingStrategy {
    /// Approved voting power must reach 80% of the vault's total power.
    Consensus,
    /// Approved voting power must strictly exceed rejected power.
    #[default]
    Majority,
    /// Approved voting power must reach 50% of the total; rejections are
    /// not considered.
    Individual,
}

impl BettingStrategy {
    /// Returns the display name.
    pub fn as_str(&self) -> &'static str {
        match self {
            BettingStrategy::Consensus => "consensus",
            BettingStrategy::Majority => "majority",
            BettingStrategy::Individual => "individual",
        }
    }
}

impl std::fmt::Display for BettingStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for BettingStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "consensus" => Ok(BettingStrategy::Consensus),
            "majority" => Ok(BettingStrategy::Majority),
            "individual" => Ok(BettingStrategy::Individual),
            _ => Err(format!("Unknown betting strategy: {}", s)),
        }
    }
}

/// Flavor of a team vault. Purely descriptive; no policy hangs off it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TeamType {
    /// Private vault for a known group.
    #[default]
    Friends,
    /// Open to anyone who meets the minimum deposit.
    Public,
    /// Ranked against other vaults.
    Competitive,
}

impl TeamType {
    /// Returns the display name.
    pub fn as_str(&self) -> &'static str {
        match self {
            TeamType::Friends => "friends",
            TeamType::Public => "public",
            TeamType::Competitive => "competitive",
        }
    }
}

impl std::fmt::Display for TeamType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for TeamType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "friends" => Ok(TeamType::Friends),
            "public" => Ok(TeamType::Public),
            "competitive" => Ok(TeamType::Competitive),
            _ => Err(format!("Unknown team type: {}", s)),
        }
    }
}
