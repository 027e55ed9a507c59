//! Amount type with 18-decimal precision
//!
//! GigClear uses fixed-point arithmetic with i128 for amounts to ensure
//! overflow-safe operations. Every amount is stored in smallest units at a
//! uniform 18-decimal precision regardless of the currency's on-chain
//! decimals, so ledger arithmetic never has to rescale.

use crate::{Currency, GigClearError, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, Sub};

/// Uniform precision for internal calculations (18 decimals)
pub const STANDARD_DECIMALS: u8 = 18;

/// The multiplier for 18 decimals
pub const STANDARD_MULTIPLIER: i128 = 1_000_000_000_000_000_000;

/// High-precision amount with currency
///
/// Uses i128 for the value (in smallest units). This provides:
/// - Support for very large amounts (up to ~170 undecillion)
/// - Support for negative values (signed deltas in event logs)
/// - Safe arithmetic with overflow checking
/// - Currency-aware operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Amount {
    /// Raw value in smallest units (10^-18 of a whole unit)
    pub value: i128,
    /// The currency
    pub currency: Currency,
}

impl Amount {
    /// Create a new amount from smallest units
    pub fn new(value: i128, currency: Currency) -> Self {
        Self { value, currency }
    }

    /// Create a zero amount
    pub fn zero(currency: Currency) -> Self {
        Self { value: 0, currency }
    }

    /// Create an amount from a human-readable value (e.g., 100.50)
    pub fn from_human(human_value: f64, currency: Currency) -> Self {
        let value = (human_value * STANDARD_MULTIPLIER as f64) as i128;
        Self { value, currency }
    }

    /// Get the human-readable value
    pub fn to_human(&self) -> f64 {
        self.value as f64 / STANDARD_MULTIPLIER as f64
    }

    /// Check if the amount is zero
    pub fn is_zero(&self) -> bool {
        self.value == 0
    }

    /// Check if the amount is positive
    pub fn is_positive(&self) -> bool {
        self.value > 0
    }

    /// Check if the amount is negative
    pub fn is_negative(&self) -> bool {
        self.value < 0
    }

    /// Get the absolute value
    pub fn abs(&self) -> Self {
        Self {
            value: self.value.abs(),
            ..*self
        }
    }

    /// Checked addition (currencies must match)
    pub fn checked_add(self, other: Self) -> Result<Self> {
        if self.currency != other.currency {
            return Err(GigClearError::CurrencyMismatch {
                expected: self.currency.symbol().to_string(),
                actual: other.currency.symbol().to_string(),
            });
        }

        let value = self
            .value
            .checked_add(other.value)
            .ok_or(GigClearError::AmountOverflow)?;

        Ok(Self { value, ..self })
    }

    /// Checked subtraction (currencies must match)
    pub fn checked_sub(self, other: Self) -> Result<Self> {
        if self.currency != other.currency {
            return Err(GigClearError::CurrencyMismatch {
                expected: self.currency.symbol().to_string(),
                actual: other.currency.symbol().to_string(),
            });
        }

        let value = self
            .value
            .checked_sub(other.value)
            .ok_or(GigClearError::AmountUnderflow)?;

        Ok(Self { value, ..self })
    }

    /// Checked multiplication by a scalar
    pub fn checked_mul(self, multiplier: i128) -> Result<Self> {
        let value = self
            .value
            .checked_mul(multiplier)
            .ok_or(GigClearError::AmountOverflow)?;
        Ok(Self { value, ..self })
    }

    /// Checked division by a scalar
    pub fn checked_div(self, divisor: i128) -> Result<Self> {
        if divisor == 0 {
            return Err(GigClearError::DivisionByZero);
        }
        Ok(Self {
            value: self.value / divisor,
            ..self
        })
    }

    /// Multiply by a percentage (0-100)
    pub fn percentage(self, percent: u8) -> Result<Self> {
        let value = self
            .value
            .checked_mul(percent as i128)
            .ok_or(GigClearError::AmountOverflow)?
            / 100;
        Ok(Self { value, ..self })
    }

    /// Multiply by basis points (0-10000, where 100 = 1%)
    pub fn basis_points(self, bps: u32) -> Result<Self> {
        let value = self
            .value
            .checked_mul(bps as i128)
            .ok_or(GigClearError::AmountOverflow)?
            / 10000;
        Ok(Self { value, ..self })
    }

    // Convenience constructors

    /// Create a USDC amount from human value
    pub fn usdc(value: f64) -> Self {
        Self::from_human(value, Currency::Usdc)
    }

    /// Create an ETH amount from human value
    pub fn eth(value: f64) -> Self {
        Self::from_human(value, Currency::Eth)
    }

    /// Create a zero USDC amount
    pub fn usdc_zero() -> Self {
        Self::zero(Currency::Usdc)
    }
}

impl Default for Amount {
    fn default() -> Self {
        Self::usdc_zero()
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let precision = match self.currency {
            Currency::Eth => 6,
            Currency::Usdc => 2,
        };
        write!(f, "{:.prec$} {}", self.to_human(), self.currency, prec = precision)
    }
}

impl PartialOrd for Amount {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        if self.currency != other.currency {
            return None;
        }
        self.value.partial_cmp(&other.value)
    }
}

impl Ord for Amount {
    fn cmp(&self, other: &Self) -> Ordering {
        self.partial_cmp(other).unwrap_or(Ordering::Equal)
    }
}

// Implement Add trait for convenience (panics on error)
impl Add for Amount {
    type Output = Self;

    fn add(self, other: Self) -> Self::Output {
        self.checked_add(other).expect("Amount addition overflow")
    }
}

// Implement Sub trait for convenience (panics on error)
impl Sub for Amount {
    type Output = Self;

    fn sub(self, other: Self) -> Self::Output {
        self.checked_sub(other).expect("Amount subtraction underflow")
    }
}
