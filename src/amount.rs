use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use thiserror::Error;

/// Fixed-point currency amount with 2 decimal places, stored as scaled cents.
///
/// The payment gateway hashes and displays amounts as exact 2-decimal strings
/// ("5000" is "5000.00", "8000.5" is "8000.50"), so the `Display` output is
/// part of the wire contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Amount(i64);

impl Amount {
    const SCALE: i64 = 100;

    /// Whole currency units, e.g. a price-table entry.
    pub const fn from_major(value: i64) -> Self {
        Amount(value * Self::SCALE)
    }

    pub const fn from_cents(value: i64) -> Self {
        Amount(value)
    }

    pub const fn cents(self) -> i64 {
        self.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.abs();
        write!(f, "{sign}{}.{:02}", abs / Self::SCALE, abs % Self::SCALE)
    }
}

/// Serialized as the 2-decimal string the gateway expects.
impl Serialize for Amount {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid amount '{0}'")]
pub struct ParseAmountError(String);

impl FromStr for Amount {
    type Err = ParseAmountError;

    /// Parse a decimal string with at most 2 fractional digits.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ParseAmountError(s.to_string());
        let (negative, digits) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s),
        };
        let (whole, frac) = match digits.split_once('.') {
            Some((whole, frac)) => (whole, frac),
            None => (digits, ""),
        };
        if whole.is_empty() && frac.is_empty() {
            return Err(invalid());
        }

        let whole: i64 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| invalid())?
        };
        let frac: i64 = match frac.len() {
            0 => 0,
            1 | 2 => {
                if !frac.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(invalid());
                }
                // "5" means 50 cents, "50" means 50 cents
                let parsed: i64 = frac.parse().map_err(|_| invalid())?;
                if frac.len() == 1 { parsed * 10 } else { parsed }
            }
            _ => return Err(invalid()),
        };

        let cents = whole * Self::SCALE + frac;
        Ok(Amount(if negative { -cents } else { cents }))
    }
}
