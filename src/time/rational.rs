//! Exact fractions used for every musical position and length.
//!
//! A [`RationalTime`] always keeps a strictly positive denominator, the sign lives in the
//! numerator. Values are not reduced implicitly, call [`RationalTime::reduce`] when the
//! smallest representation matters (e.g. to read off the denominator of a position).

use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, Mul, Neg, Sub};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RationalError {
    #[error("division by zero")]
    DivisionByZero,
}

/// Greatest common divisor of `|a|` and `|b|`.
///
/// `gcd(0, x)` is `|x|`, so only `gcd(0, 0)` yields 0.
pub const fn gcd(a: i64, b: i64) -> i64 {
    let mut a = a.abs();
    let mut b = b.abs();
    while b != 0 {
        let r = a % b;
        a = b;
        b = r;
    }
    a
}

/// Least common multiple, 0 when either side is 0.
pub const fn lcm(a: i64, b: i64) -> i64 {
    if a == 0 || b == 0 {
        return 0;
    }
    (a / gcd(a, b) * b).abs()
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RationalTime {
    numerator: i64,
    denominator: i64,
}

impl RationalTime {
    pub const ZERO: Self = Self {
        numerator: 0,
        denominator: 1,
    };

    pub const ONE: Self = Self {
        numerator: 1,
        denominator: 1,
    };

    pub const fn new(numerator: i64, denominator: i64) -> Result<Self, RationalError> {
        if denominator == 0 {
            return Err(RationalError::DivisionByZero);
        }
        if denominator < 0 {
            Ok(Self {
                numerator: -numerator,
                denominator: -denominator,
            })
        } else {
            Ok(Self {
                numerator,
                denominator,
            })
        }
    }

    pub const fn from_integer(value: i64) -> Self {
        Self {
            numerator: value,
            denominator: 1,
        }
    }

    pub const fn numerator(&self) -> i64 {
        self.numerator
    }

    pub const fn denominator(&self) -> i64 {
        self.denominator
    }

    pub const fn is_zero(&self) -> bool {
        self.numerator == 0
    }

    /// Divide numerator and denominator by their gcd, zero collapses to `0/1`.
    #[must_use]
    pub const fn reduce(self) -> Self {
        if self.numerator == 0 {
            return Self::ZERO;
        }
        let divisor = gcd(self.numerator, self.denominator);
        Self {
            numerator: self.numerator / divisor,
            denominator: self.denominator / divisor,
        }
    }

    /// Re-express `self` over `denominator`, which must be a multiple of the current one.
    pub const fn with_denominator(self, denominator: i64) -> Option<Self> {
        if denominator <= 0 || denominator % self.denominator != 0 {
            return None;
        }
        Some(Self {
            numerator: self.numerator * (denominator / self.denominator),
            denominator,
        })
    }

    /// Express both operands over their least common denominator.
    const fn common_numerators(self, other: Self) -> (i64, i64, i64) {
        let denominator = lcm(self.denominator, other.denominator);
        let lhs = self.numerator * (denominator / self.denominator);
        let rhs = other.numerator * (denominator / other.denominator);
        (lhs, rhs, denominator)
    }

    pub fn checked_div(self, rhs: Self) -> Result<Self, RationalError> {
        if rhs.numerator == 0 {
            return Err(RationalError::DivisionByZero);
        }
        Self::new(
            self.numerator * rhs.denominator,
            self.denominator * rhs.numerator,
        )
    }

    pub fn to_f64(self) -> f64 {
        self.numerator as f64 / self.denominator as f64
    }
}

impl Default for RationalTime {
    fn default() -> Self {
        Self::ZERO
    }
}

impl PartialEq for RationalTime {
    fn eq(&self, other: &Self) -> bool {
        let (lhs, rhs, _) = self.common_numerators(*other);
        lhs == rhs
    }
}

impl Eq for RationalTime {}

impl PartialOrd for RationalTime {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for RationalTime {
    fn cmp(&self, other: &Self) -> Ordering {
        let (lhs, rhs, _) = self.common_numerators(*other);
        lhs.cmp(&rhs)
    }
}

impl Add for RationalTime {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        let (lhs, rhs, denominator) = self.common_numerators(rhs);
        Self {
            numerator: lhs + rhs,
            denominator,
        }
    }
}

impl Sub for RationalTime {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        let (lhs, rhs, denominator) = self.common_numerators(rhs);
        Self {
            numerator: lhs - rhs,
            denominator,
        }
    }
}

impl Mul for RationalTime {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self {
        Self {
            numerator: self.numerator * rhs.numerator,
            denominator: self.denominator * rhs.denominator,
        }
    }
}

impl Mul<i64> for RationalTime {
    type Output = Self;

    fn mul(self, rhs: i64) -> Self {
        Self {
            numerator: self.numerator * rhs,
            denominator: self.denominator,
        }
    }
}

impl Neg for RationalTime {
    type Output = Self;

    fn neg(self) -> Self {
        Self {
            numerator: -self.numerator,
            denominator: self.denominator,
        }
    }
}

impl From<i64> for RationalTime {
    fn from(value: i64) -> Self {
        Self::from_integer(value)
    }
}

impl fmt::Display for RationalTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.numerator, self.denominator)
    }
}

impl FromStr for RationalTime {
    type Err = String;

    /// Accepts `"n/d"` or a bare integer.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (numerator, denominator) = match s.split_once('/') {
            Some((n, d)) => (n.trim(), d.trim()),
            None => (s, "1"),
        };
        let numerator: i64 = numerator
            .parse()
            .map_err(|err| format!("invalid numerator in {s:?}: {err}"))?;
        let denominator: i64 = denominator
            .parse()
            .map_err(|err| format!("invalid denominator in {s:?}: {err}"))?;
        Self::new(numerator, denominator).map_err(|err| format!("{s:?}: {err}"))
    }
}

impl TryFrom<String> for RationalTime {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<RationalTime> for String {
    fn from(value: RationalTime) -> Self {
        value.to_string()
    }
}
