//! Shared helpers for tests in this and downstream crates.

use crate::id::ResourceId;
use crate::ledger::ResourceLedger;
use crate::numeral::Numeral;

/// Shorthand for a numeral from an `f64` literal.
pub fn num(value: f64) -> Numeral {
    Numeral::from(value)
}

/// A ledger holding `energy` Energy and nothing else.
pub fn funded_ledger(energy: f64) -> ResourceLedger {
    let mut ledger = ResourceLedger::new();
    ledger.reset(ResourceId::Energy, num(energy));
    ledger
}

/// Relative closeness for values that went through non-integer powers.
pub fn approx_eq(a: Numeral, b: Numeral, relative: f64) -> bool {
    let scale = a.abs().max(b.abs());
    if scale.is_zero() {
        return true;
    }
    (a - b).abs() <= scale * relative
}
