use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Money in ten-thousandths of a currency unit.
///
/// Nightly rates, place prices and order totals all use it, so sums over many
/// nights stay exact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Hash)]
pub struct Amount(i64);

impl Amount {
    const SCALE: i64 = 10_000;

    pub const ZERO: Amount = Amount(0);

    /// Nearest representable amount.
    pub fn from_float(value: f64) -> Self {
        Self((value * Self::SCALE as f64).round() as i64)
    }

    pub fn from_scaled(scaled: i64) -> Self {
        Self(scaled)
    }

    /// This amount with `percent` percent taken off. The discount is rounded
    /// toward zero, so the customer never pays less than the exact price.
    pub fn discounted(self, percent: u8) -> Self {
        let off = self.0 * i64::from(percent.min(100)) / 100;
        Self(self.0 - off)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let units = self.0.unsigned_abs() / Self::SCALE as u64;
        let fraction = self.0.unsigned_abs() % Self::SCALE as u64;
        if self.0 < 0 {
            f.write_str("-")?;
        }
        write!(f, "{units}.{fraction:04}")
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        f64::deserialize(deserializer).map(Amount::from_float)
    }
}

impl Add for Amount {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl AddAssign for Amount {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl Sum for Amount {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Amount::ZERO, Add::add)
    }
}
