//! # Pricing Module
//!
//! Percentage price adjustment used by the bulk price tool.
//!
//! ## Rounding Rules
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Results are whole currency units.                                      │
//! │                                                                         │
//! │  Increase p%:  ceil (price × (1 + p/100))     999 +10% ──► 1099         │
//! │  Decrease p%:  floor(price × (1 − p/100))     999 −10% ──►  899         │
//! │                                                                         │
//! │  Computed as integers:                                                  │
//! │    kobo × (10 000 ± bps) / (10 000 × 100)                               │
//! │  so 999 × 1.10 never turns into 1098.9999…                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::error::ValidationError;
use crate::money::{Money, MINOR_PER_MAJOR};
use crate::validation::ValidationResult;

/// Basis points in one hundred percent.
const BPS_PER_WHOLE: i64 = 10_000;

/// Largest accepted adjustment, 10 000%.
pub const MAX_PERCENTAGE_BPS: i64 = 1_000_000;

// =============================================================================
// Direction
// =============================================================================

/// Which way a bulk adjustment moves prices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum PriceDirection {
    Increase,
    Decrease,
}

impl fmt::Display for PriceDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PriceDirection::Increase => f.write_str("increase"),
            PriceDirection::Decrease => f.write_str("decrease"),
        }
    }
}

impl FromStr for PriceDirection {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "increase" | "inc" | "+" => Ok(PriceDirection::Increase),
            "decrease" | "dec" | "-" => Ok(PriceDirection::Decrease),
            _ => Err(ValidationError::NotAllowed {
                field: "direction".to_string(),
                allowed: vec!["increase".to_string(), "decrease".to_string()],
            }),
        }
    }
}

// =============================================================================
// Percentage
// =============================================================================

/// A strictly positive percentage stored in basis points (1% = 100 bps).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Percentage(i64);

impl Percentage {
    /// Creates a percentage from basis points, at most 10 000%.
    pub fn from_bps(bps: i64) -> ValidationResult<Self> {
        if bps <= 0 {
            return Err(ValidationError::MustBePositive {
                field: "percentage".to_string(),
            });
        }
        if bps > MAX_PERCENTAGE_BPS {
            return Err(ValidationError::OutOfRange {
                field: "percentage".to_string(),
                min: 0,
                max: MAX_PERCENTAGE_BPS / 100,
            });
        }
        Ok(Percentage(bps))
    }

    pub const fn bps(&self) -> i64 {
        self.0
    }

    /// Rejects a decrease of 100% or more, which would zero every price.
    pub fn check_direction(&self, direction: PriceDirection) -> ValidationResult<()> {
        if direction == PriceDirection::Decrease && self.0 >= BPS_PER_WHOLE {
            return Err(ValidationError::OutOfRange {
                field: "percentage".to_string(),
                min: 0,
                max: 100,
            });
        }
        Ok(())
    }
}

impl FromStr for Percentage {
    type Err = ValidationError;

    /// Parses `"10"`, `"12.5"`, `"0.25"` or `"10%"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim().trim_end_matches('%').trim();
        let invalid = |reason: &str| ValidationError::invalid_format("percentage", reason);

        if trimmed.is_empty() {
            return Err(ValidationError::required("percentage"));
        }
        if trimmed.starts_with('-') {
            return Err(ValidationError::MustBePositive {
                field: "percentage".to_string(),
            });
        }

        let (whole, fraction) = trimmed.split_once('.').unwrap_or((trimmed, ""));
        if whole.is_empty() && fraction.is_empty() {
            return Err(invalid("no digits"));
        }
        if !whole.chars().all(|c| c.is_ascii_digit()) || !fraction.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid("must be a number"));
        }
        if fraction.len() > 2 {
            return Err(invalid("at most two decimal places"));
        }

        let whole: i64 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| invalid("too large"))?
        };
        let fraction: i64 = match fraction.len() {
            0 => 0,
            1 => fraction.parse::<i64>().map_err(|_| invalid("must be a number"))? * 10,
            _ => fraction.parse().map_err(|_| invalid("must be a number"))?,
        };

        let bps = whole
            .checked_mul(100)
            .and_then(|b| b.checked_add(fraction))
            .ok_or_else(|| invalid("too large"))?;

        Percentage::from_bps(bps)
    }
}

impl fmt::Display for Percentage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / 100;
        let fraction = self.0 % 100;
        match fraction {
            0 => write!(f, "{}", whole),
            n if n % 10 == 0 => write!(f, "{}.{}", whole, n / 10),
            n => write!(f, "{}.{:02}", whole, n),
        }
    }
}

// =============================================================================
// Adjustment
// =============================================================================

/// Applies a percentage change and rounds to whole currency units.
///
/// Decreases never go below zero. A result too large to store is an
/// `OutOfRange` error on `price`.
///
/// ## Example
/// ```rust
/// use tally_core::money::Money;
/// use tally_core::pricing::{adjust_price, Percentage, PriceDirection};
///
/// let pct: Percentage = "10".parse().unwrap();
/// assert_eq!(
///     adjust_price(Money::from_major(999), PriceDirection::Increase, pct).unwrap(),
///     Money::from_major(1099)
/// );
/// ```
pub fn adjust_price(price: Money, direction: PriceDirection, percent: Percentage) -> ValidationResult<Money> {
    let factor = match direction {
        PriceDirection::Increase => BPS_PER_WHOLE.saturating_add(percent.bps()),
        PriceDirection::Decrease => (BPS_PER_WHOLE - percent.bps()).max(0),
    };

    let numerator = i128::from(price.cents()) * i128::from(factor);
    let denominator = i128::from(BPS_PER_WHOLE) * i128::from(MINOR_PER_MAJOR);

    let major = match direction {
        PriceDirection::Increase => -((-numerator).div_euclid(denominator)),
        PriceDirection::Decrease => numerator.div_euclid(denominator),
    };

    let too_large = || ValidationError::OutOfRange {
        field: "price".to_string(),
        min: 0,
        max: i64::MAX / MINOR_PER_MAJOR,
    };
    let major = i64::try_from(major.max(0)).map_err(|_| too_large())?;
    Money::checked_from_major(major).ok_or_else(too_large)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn pct(s: &str) -> Percentage {
        s.parse().unwrap()
    }

    #[test]
    fn test_boundary_prices() {
        let price = Money::from_major(999);
        assert_eq!(adjust_price(price, PriceDirection::Increase, pct("10")).unwrap(), Money::from_major(1099));
        assert_eq!(adjust_price(price, PriceDirection::Decrease, pct("10")).unwrap(), Money::from_major(899));
    }

    #[test]
    fn test_exact_results_are_not_bumped() {
        let price = Money::from_major(1000);
        assert_eq!(adjust_price(price, PriceDirection::Increase, pct("10")).unwrap(), Money::from_major(1100));
        assert_eq!(adjust_price(price, PriceDirection::Decrease, pct("10")).unwrap(), Money::from_major(900));
    }

    #[test]
    fn test_fractional_prices_round_to_whole_units() {
        let price = Money::from_cents(10_050); // ₦100.50
        assert_eq!(adjust_price(price, PriceDirection::Increase, pct("1")).unwrap(), Money::from_major(102));
        assert_eq!(adjust_price(price, PriceDirection::Decrease, pct("1")).unwrap(), Money::from_major(99));
    }

    #[test]
    fn test_zero_price_stays_zero() {
        assert_eq!(adjust_price(Money::zero(), PriceDirection::Increase, pct("50")).unwrap(), Money::zero());
    }

    #[test]
    fn test_huge_results_are_rejected_not_wrapped() {
        let capped = adjust_price(Money::from_major(999), PriceDirection::Increase, pct("10000"));
        assert_eq!(capped.unwrap(), Money::from_major(100_899));

        let near_max = Money::from_cents(i64::MAX / 2);
        assert!(matches!(
            adjust_price(near_max, PriceDirection::Increase, pct("200")),
            Err(ValidationError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_parse_percentage() {
        assert_eq!(pct("10").bps(), 1000);
        assert_eq!(pct("12.5").bps(), 1250);
        assert_eq!(pct(" 7% ").bps(), 700);
        assert_eq!(pct(".25").bps(), 25);

        assert!("0".parse::<Percentage>().is_err());
        assert!("-5".parse::<Percentage>().is_err());
        assert!("abc".parse::<Percentage>().is_err());
        assert!("NaN".parse::<Percentage>().is_err());
        assert!("".parse::<Percentage>().is_err());
        assert!("1.234".parse::<Percentage>().is_err());
        assert!("10000.01".parse::<Percentage>().is_err());
        assert!(matches!(
            "9300000000000000".parse::<Percentage>(),
            Err(ValidationError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_percentage_display() {
        assert_eq!(pct("10").to_string(), "10");
        assert_eq!(pct("12.5").to_string(), "12.5");
        assert_eq!(pct("0.25").to_string(), "0.25");
    }

    #[test]
    fn test_decrease_must_stay_below_whole() {
        assert!(pct("99.99").check_direction(PriceDirection::Decrease).is_ok());
        assert!(pct("100").check_direction(PriceDirection::Decrease).is_err());
        assert!(pct("250").check_direction(PriceDirection::Increase).is_ok());
    }

    #[test]
    fn test_direction_from_str() {
        assert_eq!("Increase".parse::<PriceDirection>().unwrap(), PriceDirection::Increase);
        assert_eq!("dec".parse::<PriceDirection>().unwrap(), PriceDirection::Decrease);
        assert!("sideways".parse::<PriceDirection>().is_err());
    }
}
