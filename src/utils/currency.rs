//! Integer cent amounts and their USD rendering.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A non-negative amount of money in cents.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cents(u64);

impl Cents {
    pub const ZERO: Cents = Cents(0);

    pub const fn new(value: u64) -> Self {
        Cents(value)
    }

    pub const fn get(self) -> u64 {
        self.0
    }

    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, other: Cents) -> Option<Cents> {
        self.0.checked_add(other.0).map(Cents)
    }

    pub fn saturating_add(self, other: Cents) -> Cents {
        Cents(self.0.saturating_add(other.0))
    }

    pub fn saturating_sub(self, other: Cents) -> Cents {
        Cents(self.0.saturating_sub(other.0))
    }

    /// Signed ledger delta for this amount. Saturates at `i64::MAX`.
    pub fn as_delta(self) -> i64 {
        i64::try_from(self.0).unwrap_or(i64::MAX)
    }
}

impl From<u64> for Cents {
    fn from(value: u64) -> Self {
        Cents(value)
    }
}

impl fmt::Display for Cents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_usd(*self))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AmountError {
    #[error("Enter an amount like 12.50")]
    Malformed,
    #[error("Enter an amount greater than zero")]
    NotPositive,
    #[error("Amount is too large")]
    Overflow,
}

impl FromStr for Cents {
    type Err = AmountError;

    /// Parses a dollar amount such as `"1500"`, `"12.5"` or `".99"`.
    /// Fractions past two digits are rounded half up. Zero is rejected.
    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let trimmed = input.trim();
        let (whole, fraction) = match trimmed.split_once('.') {
            Some((whole, fraction)) => (whole, fraction),
            None => (trimmed, ""),
        };

        if whole.is_empty() && fraction.is_empty() {
            return Err(AmountError::Malformed);
        }
        if !whole.chars().all(|c| c.is_ascii_digit()) || !fraction.chars().all(|c| c.is_ascii_digit()) {
            if whole.starts_with('-') {
                return Err(AmountError::NotPositive);
            }
            return Err(AmountError::Malformed);
        }

        let dollars: u64 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| AmountError::Overflow)?
        };

        let digits: Vec<u64> = fraction
            .bytes()
            .map(|b| u64::from(b - b'0'))
            .collect();
        let tenths = digits.first().copied().unwrap_or(0);
        let hundredths = digits.get(1).copied().unwrap_or(0);
        let round_up = digits.get(2).is_some_and(|d| *d >= 5);

        let cents = dollars
            .checked_mul(100)
            .and_then(|v| v.checked_add(tenths * 10 + hundredths + u64::from(round_up)))
            .ok_or(AmountError::Overflow)?;

        if cents == 0 {
            return Err(AmountError::NotPositive);
        }

        Ok(Cents(cents))
    }
}

/// Renders cents as US dollars with grouping and two fraction digits,
/// e.g. `150000` becomes `$1,500.00`.
pub fn format_usd(amount: Cents) -> String {
    let dollars = amount.0 / 100;
    let cents = amount.0 % 100;
    format!("${}.{:02}", group_thousands(dollars), cents)
}

/// Same as [`format_usd`] for ledger deltas, which may be negative.
pub fn format_signed_usd(delta: i64) -> String {
    let formatted = format_usd(Cents(delta.unsigned_abs()));
    if delta < 0 {
        format!("-{}", formatted)
    } else {
        formatted
    }
}

fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);

    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    grouped
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0, "$0.00")]
    #[case(5, "$0.05")]
    #[case(99_999, "$999.99")]
    #[case(150_000, "$1,500.00")]
    #[case(123_456_789, "$1,234,567.89")]
    fn formats_cents_as_usd(#[case] cents: u64, #[case] expected: &str) {
        assert_eq!(format_usd(Cents::new(cents)), expected);
    }

    #[test]
    fn formats_negative_deltas() {
        assert_eq!(format_signed_usd(-2_500), "-$25.00");
        assert_eq!(format_signed_usd(2_500), "$25.00");
    }

    #[rstest]
    #[case("1500", 150_000)]
    #[case("12.5", 1_250)]
    #[case(" 12.50 ", 1_250)]
    #[case(".99", 99)]
    #[case("12.345", 1_235)]
    #[case("12.344", 1_234)]
    #[case("0.005", 1)]
    fn parses_amounts(#[case] input: &str, #[case] expected: u64) {
        assert_eq!(input.parse::<Cents>(), Ok(Cents::new(expected)));
    }

    #[rstest]
    #[case("", AmountError::Malformed)]
    #[case(".", AmountError::Malformed)]
    #[case("abc", AmountError::Malformed)]
    #[case("1.2.3", AmountError::Malformed)]
    #[case("-1", AmountError::NotPositive)]
    #[case("0", AmountError::NotPositive)]
    #[case("0.00", AmountError::NotPositive)]
    #[case("99999999999999999999", AmountError::Overflow)]
    fn rejects_bad_amounts(#[case] input: &str, #[case] expected: AmountError) {
        assert_eq!(input.parse::<Cents>(), Err(expected));
    }
}
