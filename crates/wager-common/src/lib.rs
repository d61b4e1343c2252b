//! Shared types for the wagering engine.
//!
//! This crate contains the vocabulary enums used across the pool ledger,
//! bet registry, vault registry, and proposal engine: lifecycle statuses,
//! vote choices, betting strategies, and team types.

pub mod types;

pub use types::*;
