use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, Mul, Neg, Sub, SubAssign},
};

use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

use crate::op;

pub const NAIRA_CURRENCY_CODE: &str = "NGN";
pub const NAIRA_CURRENCY_CODE_LOWER: &str = "ngn";

//--------------------------------------       Kobo        -----------------------------------------------------------
/// An amount of money in minor currency units (kobo). All amounts in the payment engine are integer kobo; conversion
/// to display currency happens at the presentation edge only.
#[derive(Debug, Clone, Copy, Default, Type, Ord, PartialOrd, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct Kobo(i64);

op!(binary Kobo, Add, add);
op!(binary Kobo, Sub, sub);
op!(inplace Kobo, SubAssign, sub_assign);
op!(unary Kobo, Neg, neg);

impl Mul<i64> for Kobo {
    type Output = Self;

    fn mul(self, rhs: i64) -> Self::Output {
        Self::from(self.value() * rhs)
    }
}

impl Sum for Kobo {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

#[derive(Debug, Clone, Error)]
#[error("Value cannot be represented in kobo: {0}")]
pub struct KoboConversionError(String);

impl From<i64> for Kobo {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl PartialEq for Kobo {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for Kobo {}

impl TryFrom<u64> for Kobo {
    type Error = KoboConversionError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        if value > i64::MAX as u64 {
            Err(KoboConversionError(format!("Value {} is too large to convert to Kobo", value)))
        } else {
            #[allow(clippy::cast_possible_wrap)]
            let value = value as i64;
            Ok(Self(value))
        }
    }
}

impl Display for Kobo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0.abs() < 100 {
            write!(f, "{}k", self.0)
        } else {
            let naira = self.0 as f64 / 100.0;
            write!(f, "₦{naira:0.2}")
        }
    }
}

impl Kobo {
    pub fn value(&self) -> i64 {
        self.0
    }

    pub fn from_naira(naira: i64) -> Self {
        Self(naira * 100)
    }

    /// Clamp negative amounts to zero. Staged payloads and gateway metadata are not trusted to be non-negative.
    pub fn clamped(self) -> Self {
        if self.0 < 0 {
            Self(0)
        } else {
            self
        }
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

#[cfg(test)]
mod test {
    use super::Kobo;

    #[test]
    fn arithmetic() {
        let a = Kobo::from(750);
        let b = Kobo::from(250);
        assert_eq!(a + b, Kobo::from(1000));
        assert_eq!(a - b, Kobo::from(500));
        assert_eq!(-b, Kobo::from(-250));
        assert_eq!(b * 4, Kobo::from(1000));
        let total: Kobo = [a, b, b].into_iter().sum();
        assert_eq!(total, Kobo::from(1250));
    }

    #[test]
    fn clamping() {
        assert_eq!(Kobo::from(-50).clamped(), Kobo::from(0));
        assert_eq!(Kobo::from(50).clamped(), Kobo::from(50));
    }

    #[test]
    fn display() {
        assert_eq!(Kobo::from(99).to_string(), "99k");
        assert_eq!(Kobo::from(150000).to_string(), "₦1500.00");
    }
}
