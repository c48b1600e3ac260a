//! Arbitrary-magnitude numbers for amounts, rates and costs.
//!
//! A [`Numeral`] keeps a normalised `f64` mantissa in `[1, 10)` (the sign
//! rides on the mantissa) and an `i64` base-10 exponent. Values far past
//! `f64::MAX` keep roughly fifteen significant digits, which is what every
//! amount in the economy needs once production passes `1e170`.
//!
//! Serialised form is `"<mantissa>e<exponent>"` with the shortest mantissa
//! text that round-trips, e.g. `"2.25e1"` or `"1e35"`.

use std::cmp::Ordering;
use std::fmt;
use std::iter::{Product, Sum};
use std::ops::{Add, AddAssign, Div, Mul, MulAssign, Neg, Sub, SubAssign};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Exponent gap past which the smaller addend is lost to mantissa precision.
const SIGNIFICANT_DIGITS: i64 = 17;

/// Exponent bound below which values are handled as plain `f64`.
const SMALL_EXPONENT: i64 = 15;

/// Default exponent at which display switches from suffixes to exponential.
pub const DEFAULT_EXPONENTIAL_FROM: i64 = 12;

/// Powers of ten that are exact in `f64`.
const EXACT_POWERS: [f64; 23] = [
    1e0, 1e1, 1e2, 1e3, 1e4, 1e5, 1e6, 1e7, 1e8, 1e9, 1e10, 1e11, 1e12, 1e13, 1e14, 1e15, 1e16,
    1e17, 1e18, 1e19, 1e20, 1e21, 1e22,
];

/// `value * 10^places`, multiplying or dividing by exact powers so the
/// result is correctly rounded for the common small shifts.
fn shift_decimal(mut value: f64, mut places: i64) -> f64 {
    while places > 22 {
        value *= 1e22;
        places -= 22;
    }
    while places < -22 {
        value /= 1e22;
        places += 22;
    }
    if places >= 0 {
        value * EXACT_POWERS[places as usize]
    } else {
        value / EXACT_POWERS[(-places) as usize]
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Failure to read a [`Numeral`] from text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("empty numeral")]
    Empty,
    #[error("invalid mantissa in {0:?}")]
    InvalidMantissa(String),
    #[error("invalid exponent in {0:?}")]
    InvalidExponent(String),
    #[error("numeral {0:?} is not finite")]
    NonFinite(String),
}

// ---------------------------------------------------------------------------
// Numeral
// ---------------------------------------------------------------------------

/// A magnitude value supporting the full economy range.
///
/// Always normalised: either exactly zero, or `1 <= |mantissa| < 10`. Because
/// the form is unique, equality and ordering compare the two fields directly.
#[derive(Debug, Clone, Copy)]
pub struct Numeral {
    mantissa: f64,
    exponent: i64,
}

impl Numeral {
    pub const ZERO: Self = Self {
        mantissa: 0.0,
        exponent: 0,
    };
    pub const ONE: Self = Self {
        mantissa: 1.0,
        exponent: 0,
    };
    /// Saturation value for results that leave the exponent range.
    pub const MAX: Self = Self {
        mantissa: 9.999_999_999_999_998,
        exponent: i64::MAX,
    };

    /// Build from a mantissa and exponent, normalising as needed.
    /// Non-finite mantissas produce zero.
    pub fn new(mantissa: f64, exponent: i64) -> Self {
        Self::normalized(mantissa, exponent)
    }

    /// Build from an `f64`, going through its shortest decimal text so that
    /// `Numeral::from_f64(1e35)` and `"1e35".parse()` are identical.
    ///
    /// Non-finite inputs produce zero; untrusted text should go through
    /// [`str::parse`] instead, which reports them.
    pub fn from_f64(value: f64) -> Self {
        if value == 0.0 || !value.is_finite() {
            return Self::ZERO;
        }
        let text = format!("{value:e}");
        text.parse().unwrap_or_else(|_| Self::normalized(value, 0))
    }

    fn normalized(mantissa: f64, exponent: i64) -> Self {
        if mantissa == 0.0 || !mantissa.is_finite() {
            return Self::ZERO;
        }
        let abs = mantissa.abs();
        if (1.0..10.0).contains(&abs) {
            return Self { mantissa, exponent };
        }
        let shift = abs.log10().floor() as i64;
        let mut m = shift_decimal(mantissa, -shift);
        let mut e = exponent.saturating_add(shift);
        if m.abs() >= 10.0 {
            m /= 10.0;
            e = e.saturating_add(1);
        } else if m.abs() < 1.0 {
            m *= 10.0;
            e = e.saturating_sub(1);
        }
        Self {
            mantissa: m,
            exponent: e,
        }
    }

    pub fn mantissa(&self) -> f64 {
        self.mantissa
    }

    pub fn exponent(&self) -> i64 {
        self.exponent
    }

    pub fn is_zero(&self) -> bool {
        self.mantissa == 0.0
    }

    pub fn is_negative(&self) -> bool {
        self.mantissa < 0.0
    }

    pub fn is_positive(&self) -> bool {
        self.mantissa > 0.0
    }

    pub fn abs(self) -> Self {
        Self {
            mantissa: self.mantissa.abs(),
            exponent: self.exponent,
        }
    }

    /// Lossy conversion back to `f64`; saturates to infinity past `f64::MAX`.
    pub fn to_f64(self) -> f64 {
        if self.is_zero() {
            return 0.0;
        }
        if self.exponent > 308 {
            return self.mantissa.signum() * f64::INFINITY;
        }
        if self.exponent < -330 {
            return 0.0;
        }
        shift_decimal(self.mantissa, self.exponent)
    }

    /// Base-10 logarithm. Zero yields negative infinity, negatives yield NaN.
    pub fn log10(self) -> f64 {
        if self.is_zero() {
            return f64::NEG_INFINITY;
        }
        if self.is_negative() {
            return f64::NAN;
        }
        self.exponent as f64 + self.mantissa.log10()
    }

    /// Raise to a real power.
    ///
    /// Small integer powers multiply the mantissa directly so cost curves
    /// like `1.5^level` stay exact. `0^0` is one; zero to a negative power is
    /// zero, matching division by zero. A negative base with a fractional
    /// power has no real value and yields zero.
    pub fn pow(self, power: f64) -> Self {
        if power == 0.0 {
            return Self::ONE;
        }
        if self.is_zero() || !power.is_finite() {
            return Self::ZERO;
        }
        if power.fract() == 0.0 && power.abs() <= 64.0 {
            let n = power as i32;
            return Self::normalized(
                self.mantissa.powi(n),
                self.exponent.saturating_mul(n as i64),
            );
        }
        if self.is_negative() {
            return Self::ZERO;
        }
        let log = self.log10() * power;
        if !log.is_finite() || log >= i64::MAX as f64 {
            return if log > 0.0 { Self::MAX } else { Self::ZERO };
        }
        let exponent = log.floor();
        Self::normalized(10f64.powf(log - exponent), exponent as i64)
    }

    /// Round toward negative infinity. Values of `1e16` and above have no
    /// fractional digits left in the mantissa and are returned unchanged.
    pub fn floor(self) -> Self {
        if self.is_zero() || self.exponent >= 16 {
            return self;
        }
        if self.exponent < 0 {
            return if self.is_negative() {
                -Self::ONE
            } else {
                Self::ZERO
            };
        }
        // The f64 product may round up across an integer boundary.
        let candidate = Self::from_f64(self.to_f64().floor());
        if candidate > self {
            candidate - Self::ONE
        } else {
            candidate
        }
    }

    /// Round toward positive infinity.
    pub fn ceil(self) -> Self {
        -(-self).floor()
    }

    /// Multiply by a plain factor without a decimal round-trip. Used on the
    /// tick path where the factor is a time delta or a percentage.
    pub fn scale(self, factor: f64) -> Self {
        if self.is_zero() || factor == 1.0 {
            return self;
        }
        if self.is_small() {
            return Self::normalized(self.to_f64() * factor, 0);
        }
        Self::normalized(self.mantissa * factor, self.exponent)
    }

    /// Magnitudes where plain `f64` holds whole numbers exactly. Arithmetic
    /// between such values goes through `f64` so integer costs and balances
    /// add and subtract without drift.
    fn is_small(&self) -> bool {
        self.exponent.abs() < SMALL_EXPONENT
    }

    /// Human-scaled rendering with the default exponential threshold.
    pub fn to_display_string(&self, precision: usize) -> String {
        self.display_with(precision, DEFAULT_EXPONENTIAL_FROM)
    }

    /// Human-scaled rendering: plain digits below a thousand, `K`/`M`/`B`
    /// suffixes up to `10^exponential_from`, exponential notation from there.
    pub fn display_with(&self, precision: usize, exponential_from: i64) -> String {
        if self.is_negative() {
            return format!("-{}", (-*self).display_with(precision, exponential_from));
        }
        if self.exponent >= exponential_from {
            let scale = shift_decimal(1.0, precision.min(15) as i64);
            let mut mantissa = (self.mantissa * scale).round() / scale;
            let mut exponent = self.exponent;
            if mantissa >= 10.0 {
                mantissa /= 10.0;
                exponent = exponent.saturating_add(1);
            }
            return format!("{mantissa:.precision$}e{exponent}");
        }
        let value = self.to_f64();
        match self.exponent {
            e if e >= 9 => format!("{:.precision$}B", value / 1e9),
            6..=8 => format!("{:.precision$}M", value / 1e6),
            3..=5 => format!("{:.precision$}K", value / 1e3),
            _ => format!("{value:.precision$}"),
        }
    }
}

impl Default for Numeral {
    fn default() -> Self {
        Self::ZERO
    }
}

// ---------------------------------------------------------------------------
// Ordering
// ---------------------------------------------------------------------------

impl Numeral {
    fn sign_class(&self) -> i8 {
        if self.is_zero() {
            0
        } else if self.is_negative() {
            -1
        } else {
            1
        }
    }
}

impl Ord for Numeral {
    fn cmp(&self, other: &Self) -> Ordering {
        let (a, b) = (self.sign_class(), other.sign_class());
        if a != b {
            return a.cmp(&b);
        }
        match a {
            0 => Ordering::Equal,
            1 => self
                .exponent
                .cmp(&other.exponent)
                .then(self.mantissa.total_cmp(&other.mantissa)),
            _ => other
                .exponent
                .cmp(&self.exponent)
                .then(self.mantissa.total_cmp(&other.mantissa)),
        }
    }
}

impl PartialOrd for Numeral {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Numeral {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Numeral {}

// ---------------------------------------------------------------------------
// Arithmetic
// ---------------------------------------------------------------------------

impl Add for Numeral {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        if self.is_zero() {
            return rhs;
        }
        if rhs.is_zero() {
            return self;
        }
        if self.is_small() && rhs.is_small() {
            return Self::normalized(self.to_f64() + rhs.to_f64(), 0);
        }
        let (big, small) = if self.exponent >= rhs.exponent {
            (self, rhs)
        } else {
            (rhs, self)
        };
        let gap = big.exponent.saturating_sub(small.exponent);
        if gap > SIGNIFICANT_DIGITS {
            return big;
        }
        Self::normalized(big.mantissa + shift_decimal(small.mantissa, -gap), big.exponent)
    }
}

impl Sub for Numeral {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        self + (-rhs)
    }
}

impl Neg for Numeral {
    type Output = Self;

    fn neg(self) -> Self {
        if self.is_zero() {
            return self;
        }
        Self {
            mantissa: -self.mantissa,
            exponent: self.exponent,
        }
    }
}

impl Mul for Numeral {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self {
        if self.is_zero() || rhs.is_zero() {
            return Self::ZERO;
        }
        if rhs == Self::ONE {
            return self;
        }
        if self == Self::ONE {
            return rhs;
        }
        if self.is_small() && rhs.is_small() && self.exponent + rhs.exponent < SMALL_EXPONENT - 1 {
            return Self::normalized(self.to_f64() * rhs.to_f64(), 0);
        }
        Self::normalized(
            self.mantissa * rhs.mantissa,
            self.exponent.saturating_add(rhs.exponent),
        )
    }
}

impl Mul<f64> for Numeral {
    type Output = Self;

    fn mul(self, rhs: f64) -> Self {
        self.scale(rhs)
    }
}

impl Div for Numeral {
    type Output = Self;

    /// Division by zero yields zero.
    fn div(self, rhs: Self) -> Self {
        if self.is_zero() || rhs.is_zero() {
            return Self::ZERO;
        }
        Self::normalized(
            self.mantissa / rhs.mantissa,
            self.exponent.saturating_sub(rhs.exponent),
        )
    }
}

impl AddAssign for Numeral {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl SubAssign for Numeral {
    fn sub_assign(&mut self, rhs: Self) {
        *self = *self - rhs;
    }
}

impl MulAssign for Numeral {
    fn mul_assign(&mut self, rhs: Self) {
        *self = *self * rhs;
    }
}

impl Sum for Numeral {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

impl Product for Numeral {
    fn product<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ONE, Mul::mul)
    }
}

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

impl From<f64> for Numeral {
    fn from(value: f64) -> Self {
        Self::from_f64(value)
    }
}

impl From<u64> for Numeral {
    fn from(value: u64) -> Self {
        Self::from_f64(value as f64)
    }
}

impl From<u32> for Numeral {
    fn from(value: u32) -> Self {
        Self::normalized(value as f64, 0)
    }
}

impl From<i64> for Numeral {
    fn from(value: i64) -> Self {
        Self::from_f64(value as f64)
    }
}

impl From<i32> for Numeral {
    fn from(value: i32) -> Self {
        Self::normalized(value as f64, 0)
    }
}

impl FromStr for Numeral {
    type Err = ParseError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(ParseError::Empty);
        }
        let Some(split) = trimmed.find(['e', 'E']) else {
            let value: f64 = trimmed
                .parse()
                .map_err(|_| ParseError::InvalidMantissa(text.to_string()))?;
            if !value.is_finite() {
                return Err(ParseError::NonFinite(text.to_string()));
            }
            return Ok(Self::normalized(value, 0));
        };
        let (mantissa_text, exponent_text) = (&trimmed[..split], &trimmed[split + 1..]);
        let mantissa: f64 = mantissa_text
            .parse()
            .map_err(|_| ParseError::InvalidMantissa(text.to_string()))?;
        if !mantissa.is_finite() {
            return Err(ParseError::NonFinite(text.to_string()));
        }
        let exponent: i64 = exponent_text
            .parse()
            .map_err(|_| ParseError::InvalidExponent(text.to_string()))?;
        Ok(Self::normalized(mantissa, exponent))
    }
}

/// Compact round-trip form, not the human display.
impl fmt::Display for Numeral {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_zero() {
            return f.write_str("0");
        }
        write!(f, "{}e{}", self.mantissa, self.exponent)
    }
}

impl Serialize for Numeral {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Numeral {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Text(String),
            Number(f64),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Text(text) => text.parse().map_err(serde::de::Error::custom),
            Repr::Number(value) if value.is_finite() => Ok(Self::from_f64(value)),
            Repr::Number(value) => Err(serde::de::Error::custom(ParseError::NonFinite(
                value.to_string(),
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn n(text: &str) -> Numeral {
        text.parse().unwrap()
    }

    // -----------------------------------------------------------------------
    // Test 1: Construction normalises every input route to the same form
    // -----------------------------------------------------------------------
    #[test]
    fn construction_routes_agree() {
        assert_eq!(Numeral::from(1e35), n("1e35"));
        assert_eq!(Numeral::from(250u32), n("2.5e2"));
        assert_eq!(Numeral::new(25.0, 1), n("250"));
        assert_eq!(Numeral::from(-42i64), n("-4.2e1"));
        assert_eq!(Numeral::from(0.0), Numeral::ZERO);
        assert_eq!(n("12.5e3").mantissa(), 1.25);
        assert_eq!(n("12.5e3").exponent(), 4);
    }

    // -----------------------------------------------------------------------
    // Test 2: Arithmetic beyond f64 range
    // -----------------------------------------------------------------------
    #[test]
    fn arithmetic_at_extreme_scale() {
        let big = n("3e170");
        let product = big * big;
        assert_eq!(product.exponent(), 340);
        assert!((product.mantissa() - 9.0).abs() < 1e-12);

        let sum = n("1e400") + n("1e400");
        assert_eq!(sum, n("2e400"));

        // Tiny addend vanishes instead of corrupting the big one.
        assert_eq!(n("1e400") + Numeral::ONE, n("1e400"));
        assert_eq!(n("5e300") / n("5e100"), n("1e200"));
    }

    #[test]
    fn subtraction_can_cross_zero() {
        let a = n("1.5e3");
        let b = n("2e3");
        assert_eq!(a - b, n("-5e2"));
        assert!((a - a).is_zero());
    }

    // -----------------------------------------------------------------------
    // Test 3: Zero handling never panics
    // -----------------------------------------------------------------------
    #[test]
    fn zero_is_well_defined() {
        assert_eq!(n("5e10") / Numeral::ZERO, Numeral::ZERO);
        assert_eq!(Numeral::ZERO / n("5e10"), Numeral::ZERO);
        assert_eq!(Numeral::ZERO.log10(), f64::NEG_INFINITY);
        assert_eq!(Numeral::ZERO.pow(0.0), Numeral::ONE);
        assert_eq!(Numeral::ZERO.pow(-2.0), Numeral::ZERO);
        assert!(Numeral::ZERO < Numeral::ONE);
        assert!(-Numeral::ONE < Numeral::ZERO);
    }

    // -----------------------------------------------------------------------
    // Test 4: Powers and logarithms
    // -----------------------------------------------------------------------
    #[test]
    fn integer_powers_are_exact() {
        assert_eq!(n("1.5").pow(2.0), n("2.25"));
        assert_eq!(n("10").pow(35.0), n("1e35"));
        assert_eq!(n("2").pow(-1.0), n("0.5"));
    }

    #[test]
    fn fractional_powers_and_log() {
        let root = n("1e300").pow(0.5);
        assert_eq!(root.exponent(), 150);
        assert!((root.mantissa() - 1.0).abs() < 1e-9);
        assert!((n("1e170").log10() - 170.0).abs() < 1e-12);
        assert!((n("2e5").log10() - (5.0 + 2f64.log10())).abs() < 1e-12);
        assert!(n("-4").log10().is_nan());
    }

    // -----------------------------------------------------------------------
    // Test 5: Floor and ceil
    // -----------------------------------------------------------------------
    #[test]
    fn floor_truncates_fraction() {
        assert_eq!(n("22.5").floor(), n("22"));
        assert_eq!(n("0.75").floor(), Numeral::ZERO);
        assert_eq!(n("-0.5").floor(), -Numeral::ONE);
        assert_eq!(n("1.23456e40").floor(), n("1.23456e40"));
        assert_eq!(n("10.5").ceil(), n("11"));
    }

    // -----------------------------------------------------------------------
    // Test 6: Ordering across signs and exponents
    // -----------------------------------------------------------------------
    #[test]
    fn ordering_is_total() {
        let mut values = vec![n("1e5"), n("-3e5"), n("2e1"), Numeral::ZERO, n("-2e6"), n("9e4")];
        values.sort();
        assert_eq!(
            values,
            vec![n("-2e6"), n("-3e5"), Numeral::ZERO, n("2e1"), n("9e4"), n("1e5")]
        );
        assert_eq!(n("3e5").max(n("2e6")), n("2e6"));
        assert_eq!(n("3e5").min(n("2e6")), n("3e5"));
    }

    // -----------------------------------------------------------------------
    // Test 7: Display
    // -----------------------------------------------------------------------
    #[test]
    fn display_uses_suffixes_then_exponential() {
        assert_eq!(n("12.5").to_display_string(2), "12.50");
        assert_eq!(n("1234").to_display_string(2), "1.23K");
        assert_eq!(n("1.5e6").to_display_string(2), "1.50M");
        assert_eq!(n("2e9").to_display_string(1), "2.0B");
        assert_eq!(n("1.2345e12").to_display_string(2), "1.23e12");
        assert_eq!(n("9.999e170").to_display_string(2), "1.00e171");
        assert_eq!(n("-1.5e6").to_display_string(2), "-1.50M");
        assert_eq!(n("1234").display_with(0, 3), "1e3");
    }

    #[test]
    fn display_does_not_mutate() {
        let value = n("1.23456e7");
        let _ = value.to_display_string(1);
        assert_eq!(value, n("1.23456e7"));
    }

    // -----------------------------------------------------------------------
    // Test 8: Parse errors are typed
    // -----------------------------------------------------------------------
    #[test]
    fn malformed_text_is_rejected() {
        assert_eq!("".parse::<Numeral>(), Err(ParseError::Empty));
        assert!(matches!(
            "abc".parse::<Numeral>(),
            Err(ParseError::InvalidMantissa(_))
        ));
        assert!(matches!(
            "1.5e".parse::<Numeral>(),
            Err(ParseError::InvalidExponent(_))
        ));
        assert!(matches!(
            "inf".parse::<Numeral>(),
            Err(ParseError::NonFinite(_))
        ));
        assert!(matches!(
            "NaNe5".parse::<Numeral>(),
            Err(ParseError::NonFinite(_))
        ));
    }

    // -----------------------------------------------------------------------
    // Test 9: Serde form
    // -----------------------------------------------------------------------
    #[test]
    fn serializes_to_compact_string() {
        let json = serde_json::to_string(&n("1.5e170")).unwrap();
        assert_eq!(json, "\"1.5e170\"");
        let back: Numeral = serde_json::from_str(&json).unwrap();
        assert_eq!(back, n("1.5e170"));
        assert_eq!(serde_json::to_string(&Numeral::ZERO).unwrap(), "\"0\"");
    }

    #[test]
    fn deserializes_plain_numbers() {
        let value: Numeral = serde_json::from_str("1250").unwrap();
        assert_eq!(value, n("1.25e3"));
        assert!(serde_json::from_str::<Numeral>("\"oops\"").is_err());
    }
}
