//! Configuration for the wagering engine.
//!
//! Supports loading from a TOML file. All policy constants — minimum bet,
//! vault deposit floors, quorum thresholds — are defined here so transports
//! and tests can tune them without touching engine code.

use std::path::Path;

use anyhow::{bail, Context, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use wager_common::BettingStrategy;

/// Top-level configuration for the wagering engine.
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    /// Bet and market policy.
    pub betting: BettingConfig,

    /// Team vault policy.
    pub vault: VaultConfig,

    /// Quorum thresholds for proposal voting.
    pub voting: VotingConfig,
}

/// Bet and market policy constants.
#[derive(Debug, Clone)]
pub struct BettingConfig {
    /// Minimum stake for a single bet.
    pub min_bet: Decimal,

    /// Minimum seed liquidity required to open a market.
    pub min_seed_liquidity: Decimal,

    /// Minimum number of options a market must offer.
    pub min_options: usize,

    /// Default page size for bet listings.
    pub default_page_limit: usize,
}

impl Default for BettingConfig {
    fn default() -> Self {
        Self {
            min_bet: Decimal::ONE,
            min_seed_liquidity: Decimal::new(10, 0),
            min_options: 2,
            default_page_limit: 50,
        }
    }
}

/// Team vault policy constants.
#[derive(Debug, Clone)]
pub struct VaultConfig {
    /// Minimum deposit to join a vault, unless the vault raises it.
    pub min_deposit: Decimal,

    /// Member cap applied when vault creation does not specify one.
    pub default_max_members: usize,

    /// Smallest member cap a vault may be created with.
    pub member_limit_min: usize,

    /// Largest member cap a vault may be created with.
    pub member_limit_max: usize,

    /// Strategy applied when vault creation does not specify one.
    pub default_strategy: BettingStrategy,

    /// Deposit-to-voting-power divisor (power = deposit / divisor).
    pub voting_power_divisor: Decimal,

    /// Baseline voting power granted to the creator's zero-deposit seat.
    pub creator_voting_power: Decimal,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            min_deposit: Decimal::ONE_HUNDRED,
            default_max_members: 10,
            member_limit_min: 2,
            member_limit_max: 50,
            default_strategy: BettingStrategy::Majority,
            voting_power_divisor: Decimal::ONE_HUNDRED,
            creator_voting_power: Decimal::ONE_HUNDRED,
        }
    }
}

/// Quorum thresholds for the strategy rules that admit one.
///
/// Majority has no threshold (strict comparison of approved vs rejected
/// power), so only consensus and individual appear here.
#[derive(Debug, Clone)]
pub struct VotingConfig {
    /// Fraction of total voting power required under consensus (default 0.8).
    pub consensus_threshold: Decimal,

    /// Fraction of total voting power required under individual (default 0.5).
    pub individual_threshold: Decimal,
}

impl Default for VotingConfig {
    fn default() -> Self {
        Self {
            consensus_threshold: Decimal::new(8, 1),
            individual_threshold: Decimal::new(5, 1),
        }
    }
}

impl EngineConfig {
    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: TomlConfig = toml::from_str(content).context("Failed to parse TOML config")?;
        let config = Self::from(file);
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration and return errors for invalid values.
    pub fn validate(&self) -> Result<()> {
        if self.betting.min_bet <= Decimal::ZERO {
            bail!("min_bet must be positive");
        }
        if self.betting.min_seed_liquidity <= Decimal::ZERO {
            bail!("min_seed_liquidity must be positive");
        }
        if self.betting.min_options < 2 {
            bail!("min_options must be at least 2");
        }
        if self.betting.default_page_limit == 0 {
            bail!("default_page_limit must be at least 1");
        }

        if self.vault.min_deposit <= Decimal::ZERO {
            bail!("min_deposit must be positive");
        }
        if self.vault.voting_power_divisor <= Decimal::ZERO {
            bail!("voting_power_divisor must be positive");
        }
        if self.vault.creator_voting_power < Decimal::ZERO {
            bail!("creator_voting_power cannot be negative");
        }
        if self.vault.member_limit_min < 2 {
            bail!("member_limit_min must be at least 2");
        }
        if self.vault.member_limit_min > self.vault.member_limit_max {
            bail!("member_limit_min cannot exceed member_limit_max");
        }
        if self.vault.default_max_members < self.vault.member_limit_min
            || self.vault.default_max_members > self.vault.member_limit_max
        {
            bail!("default_max_members must fall within the member limit bounds");
        }

        for (name, threshold) in [
            ("consensus_threshold", self.voting.consensus_threshold),
            ("individual_threshold", self.voting.individual_threshold),
        ] {
            if threshold <= Decimal::ZERO || threshold > Decimal::ONE {
                bail!("{} must be within (0, 1]", name);
            }
        }

        Ok(())
    }
}

// ============================================================================
// TOML deserialization structures
// ============================================================================

#[derive(Debug, Default, Deserialize)]
struct TomlConfig {
    #[serde(default)]
    betting: BettingToml,
    #[serde(default)]
    vault: VaultToml,
    #[serde(default)]
    voting: VotingToml,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct BettingToml {
    min_bet: f64,
    min_seed_liquidity: f64,
    min_options: usize,
    default_page_limit: usize,
}

impl Default for BettingToml {
    fn default() -> Self {
        Self {
            min_bet: 1.0,
            min_seed_liquidity: 10.0,
            min_options: 2,
            default_page_limit: 50,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct VaultToml {
    min_deposit: f64,
    default_max_members: usize,
    member_limit_min: usize,
    member_limit_max: usize,
    default_strategy: String,
    voting_power_divisor: f64,
    creator_voting_power: f64,
}

impl Default for VaultToml {
    fn default() -> Self {
        Self {
            min_deposit: 100.0,
            default_max_members: 10,
            member_limit_min: 2,
            member_limit_max: 50,
            default_strategy: "majority".to_string(),
            voting_power_divisor: 100.0,
            creator_voting_power: 100.0,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct VotingToml {
    consensus_threshold: f64,
    individual_threshold: f64,
}

impl Default for VotingToml {
    fn default() -> Self {
        Self {
            consensus_threshold: 0.8,
            individual_threshold: 0.5,
        }
    }
}

/// Convert f64 to Decimal.
fn f64_to_decimal(val: f64) -> Decimal {
    Decimal::try_from(val).unwrap_or(Decimal::ZERO)
}

impl From<TomlConfig> for EngineConfig {
    fn from(toml: TomlConfig) -> Self {
        Self {
            betting: BettingConfig {
                min_bet: f64_to_decimal(toml.betting.min_bet),
                min_seed_liquidity: f64_to_decimal(toml.betting.min_seed_liquidity),
                min_options: toml.betting.min_options,
                default_page_limit: toml.betting.default_page_limit,
            },
            vault: VaultConfig {
                min_deposit: f64_to_decimal(toml.vault.min_deposit),
                default_max_members: toml.vault.default_max_members,
                member_limit_min: toml.vault.member_limit_min,
                member_limit_max: toml.vault.member_limit_max,
                default_strategy: toml
                    .vault
                    .default_strategy
                    .parse()
                    .unwrap_or(BettingStrategy::Majority),
                voting_power_divisor: f64_to_decimal(toml.vault.voting_power_divisor),
                creator_voting_power: f64_to_decimal(toml.vault.creator_voting_power),
            },
            voting: VotingConfig {
                consensus_threshold: f64_to_decimal(toml.voting.consensus_threshold),
                individual_threshold: f64_to_decimal(toml.voting.individual_threshold),
            },
        }
    }
}
