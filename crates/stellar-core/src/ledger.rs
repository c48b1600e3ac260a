//! Resource accounts, time integration and checked spending.
//!
//! The ledger is the single debit path for every resource it holds: callers
//! go through [`ResourceLedger::spend`] (or a [`Purse`] borrowed from it),
//! never through the fields, so `amount >= 0` holds at every committed state.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::id::ResourceId;
use crate::numeral::Numeral;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LedgerError {
    #[error("time delta must be non-negative, got {0}")]
    NegativeDelta(f64),
    #[error("time delta must be finite")]
    NonFiniteDelta,
    #[error("cannot credit a negative amount ({0}) to {1:?}")]
    NegativeCredit(Numeral, ResourceId),
    #[error("cannot set a negative production rate ({0}) on {1:?}")]
    NegativeRate(Numeral, ResourceId),
}

fn check_delta(delta_seconds: f64) -> Result<(), LedgerError> {
    if !delta_seconds.is_finite() {
        return Err(LedgerError::NonFiniteDelta);
    }
    if delta_seconds < 0.0 {
        return Err(LedgerError::NegativeDelta(delta_seconds));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Purse
// ---------------------------------------------------------------------------

/// Something upgrades can be paid from.
pub trait Purse {
    fn balance(&self) -> Numeral;

    /// Checked debit. Returns `false` and leaves state untouched when the
    /// balance is short or the amount is negative.
    fn spend(&mut self, amount: Numeral) -> bool;
}

/// Layer-owned integer currency (ascension points, echo fragments).
///
/// Mints are floored so fractional currency never accumulates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CurrencyPool {
    amount: Numeral,
    total_earned: Numeral,
}

impl CurrencyPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn amount(&self) -> Numeral {
        self.amount
    }

    pub fn total_earned(&self) -> Numeral {
        self.total_earned
    }

    /// Add `amount`, floored. Negative mints are ignored. Returns what was
    /// actually added.
    pub fn mint(&mut self, amount: Numeral) -> Numeral {
        let whole = amount.floor();
        if !whole.is_positive() {
            return Numeral::ZERO;
        }
        self.amount += whole;
        self.total_earned += whole;
        whole
    }

    /// Zero the spendable amount; lifetime earnings are kept.
    pub fn clear(&mut self) {
        self.amount = Numeral::ZERO;
    }
}

impl Purse for CurrencyPool {
    fn balance(&self) -> Numeral {
        self.amount
    }

    fn spend(&mut self, amount: Numeral) -> bool {
        if amount.is_negative() || amount > self.amount {
            return false;
        }
        self.amount -= amount;
        true
    }
}

// ---------------------------------------------------------------------------
// Accounts
// ---------------------------------------------------------------------------

/// Amount and production rate of one resource.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourceAccount {
    amount: Numeral,
    production_rate: Numeral,
    total_generated: Numeral,
}

impl ResourceAccount {
    pub fn amount(&self) -> Numeral {
        self.amount
    }

    pub fn production_rate(&self) -> Numeral {
        self.production_rate
    }

    /// Lifetime income of this resource. Never decreases; spending does not
    /// touch it.
    pub fn total_generated(&self) -> Numeral {
        self.total_generated
    }

    fn integrate(&mut self, seconds: f64) -> Numeral {
        let gain = self.production_rate.scale(seconds);
        self.amount += gain;
        self.total_generated += gain;
        gain
    }
}

/// Policy the owning layers apply to offline catch-up.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OfflinePolicy {
    multipliers: BTreeMap<ResourceId, f64>,
    cap_seconds: Option<f64>,
}

impl OfflinePolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scale offline gains of `resource` by `factor`.
    pub fn with_multiplier(mut self, resource: ResourceId, factor: f64) -> Self {
        self.multipliers.insert(resource, factor.max(0.0));
        self
    }

    pub fn with_cap(mut self, cap_seconds: Option<f64>) -> Self {
        self.cap_seconds = cap_seconds;
        self
    }

    fn multiplier(&self, resource: ResourceId) -> f64 {
        self.multipliers.get(&resource).copied().unwrap_or(1.0)
    }
}

/// What an offline catch-up applied.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OfflineReport {
    pub seconds_applied: f64,
    pub gains: BTreeMap<ResourceId, Numeral>,
}

/// Holds every resource account of a play-through.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourceLedger {
    accounts: [ResourceAccount; 3],
}

fn slot(resource: ResourceId) -> usize {
    match resource {
        ResourceId::Energy => 0,
        ResourceId::Quanta => 1,
        ResourceId::FateTokens => 2,
    }
}

impl ResourceLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn account(&self, resource: ResourceId) -> &ResourceAccount {
        &self.accounts[slot(resource)]
    }

    pub fn amount(&self, resource: ResourceId) -> Numeral {
        self.account(resource).amount
    }

    pub fn rate(&self, resource: ResourceId) -> Numeral {
        self.account(resource).production_rate
    }

    pub fn total_generated(&self, resource: ResourceId) -> Numeral {
        self.account(resource).total_generated
    }

    /// Integrate every account over `delta_seconds`.
    pub fn tick(&mut self, delta_seconds: f64) -> Result<(), LedgerError> {
        check_delta(delta_seconds)?;
        for account in &mut self.accounts {
            account.integrate(delta_seconds);
        }
        Ok(())
    }

    /// Same math as [`tick`](Self::tick), applied once over the gap since the
    /// last save. The ledger itself never caps the gap; the policy carries
    /// any cap or bonus chosen by the owning layers.
    pub fn catch_up_offline(
        &mut self,
        elapsed_seconds: f64,
        policy: &OfflinePolicy,
    ) -> Result<OfflineReport, LedgerError> {
        check_delta(elapsed_seconds)?;
        let seconds = match policy.cap_seconds {
            Some(cap) => elapsed_seconds.min(cap.max(0.0)),
            None => elapsed_seconds,
        };
        let mut report = OfflineReport {
            seconds_applied: seconds,
            gains: BTreeMap::new(),
        };
        for resource in ResourceId::ALL {
            let factor = policy.multiplier(resource);
            let gain = self.accounts[slot(resource)].integrate(seconds * factor);
            if gain.is_positive() {
                report.gains.insert(resource, gain);
            }
        }
        debug!(seconds, gains = ?report.gains, "Offline catch-up applied");
        Ok(report)
    }

    pub fn can_afford(&self, resource: ResourceId, amount: Numeral) -> bool {
        !amount.is_negative() && amount <= self.amount(resource)
    }

    /// Checked subtraction.
    pub fn spend(&mut self, resource: ResourceId, amount: Numeral) -> bool {
        if !self.can_afford(resource, amount) {
            return false;
        }
        self.accounts[slot(resource)].amount -= amount;
        true
    }

    /// Non-production income (rewards, forge payouts). Counts toward the
    /// lifetime total.
    pub fn credit(&mut self, resource: ResourceId, amount: Numeral) -> Result<(), LedgerError> {
        if amount.is_negative() {
            return Err(LedgerError::NegativeCredit(amount, resource));
        }
        let account = &mut self.accounts[slot(resource)];
        account.amount += amount;
        account.total_generated += amount;
        Ok(())
    }

    /// Replace the cached rate. Returns whether it changed.
    pub fn set_rate(&mut self, resource: ResourceId, rate: Numeral) -> Result<bool, LedgerError> {
        if rate.is_negative() {
            return Err(LedgerError::NegativeRate(rate, resource));
        }
        let account = &mut self.accounts[slot(resource)];
        if account.production_rate == rate {
            return Ok(false);
        }
        account.production_rate = rate;
        Ok(true)
    }

    /// Layer-reset path: reinitialise the amount. Lifetime totals survive.
    pub fn reset(&mut self, resource: ResourceId, starting: Numeral) {
        self.accounts[slot(resource)].amount = starting.max(Numeral::ZERO);
    }

    /// Load path: restore persisted fields; rates are recomputed by the owner.
    pub fn restore(&mut self, resource: ResourceId, amount: Numeral, total_generated: Numeral) {
        let account = &mut self.accounts[slot(resource)];
        account.amount = amount.max(Numeral::ZERO);
        account.total_generated = total_generated.max(Numeral::ZERO);
    }

    /// Borrow one account as a [`Purse`].
    pub fn purse(&mut self, resource: ResourceId) -> AccountPurse<'_> {
        AccountPurse {
            ledger: self,
            resource,
        }
    }
}

/// A ledger account viewed as a [`Purse`].
pub struct AccountPurse<'a> {
    ledger: &'a mut ResourceLedger,
    resource: ResourceId,
}

impl Purse for AccountPurse<'_> {
    fn balance(&self) -> Numeral {
        self.ledger.amount(self.resource)
    }

    fn spend(&mut self, amount: Numeral) -> bool {
        self.ledger.spend(self.resource, amount)
    }
}
