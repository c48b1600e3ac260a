//! Stellar Core -- numeric and accounting foundation of the progression engine.
//!
//! Everything above this crate counts in [`numeral::Numeral`], pays through a
//! [`ledger::Purse`], and reads tuning from [`config::EngineConfig`].
//!
//! # Key Types
//!
//! - [`numeral::Numeral`] -- mantissa/exponent number that stays exact enough
//!   past `1e170` and renders with K/M/B suffixes or exponential notation.
//! - [`ledger::ResourceLedger`] -- per-resource amount, rate and lifetime
//!   total; integrates production and performs checked spends.
//! - [`ledger::CurrencyPool`] -- integer currency owned by a prestige layer.
//! - [`rng::SeededRng`] -- SplitMix64 source for reproducible forge pulls.
//! - [`id`] -- string-backed ids shared by content and saves.

pub mod config;
pub mod id;
pub mod ledger;
pub mod numeral;
pub mod rng;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use numeral::Numeral;
