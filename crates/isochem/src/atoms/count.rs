use std::{
    fmt::{self, Display, Formatter},
    ops::{Add, Mul},
};

use rust_decimal::{Decimal, prelude::ToPrimitive};

use crate::{AverageMass, Count, MonoisotopicMass};

impl Count {
    pub const ZERO: Self = Self(Decimal::ZERO);
    pub const ONE: Self = Self(Decimal::ONE);

    /// Returns `None` for negative counts
    #[must_use]
    pub fn new(n: impl Into<Decimal>) -> Option<Self> {
        let n = n.into();
        (!n.is_sign_negative() || n.is_zero()).then(|| Self(n.normalize()))
    }

    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    #[must_use]
    pub fn is_integer(&self) -> bool {
        self.0.fract().is_zero()
    }

    /// Fractional counts above one (like `1.5`) must be bracketed when written out, since `C1.5H3` is read as the
    /// hydrate `C + 5*H3`, in the same way as `CuSO4.5H2O`
    #[must_use]
    pub(crate) fn needs_brackets(&self) -> bool {
        self.0 > Decimal::ONE && !self.is_integer()
    }

    /// Whole counts that fit into a `u64`
    #[must_use]
    pub fn to_u64(&self) -> Option<u64> {
        self.is_integer().then(|| self.0.to_u64()).flatten()
    }

    pub(crate) fn checked_mul(self, rhs: Self) -> Option<Self> {
        self.0.checked_mul(rhs.0).map(|n| Self(n.normalize()))
    }

    pub(crate) fn checked_add(self, rhs: Self) -> Option<Self> {
        self.0.checked_add(rhs.0).map(|n| Self(n.normalize()))
    }
}

macro_rules! mass_mul_impls {
    // NOTE: `$mass_type` is a `tt` since it actually has to play the role of both a type (`ty`) and expression (`expr`)
    // in this impl, and `tt` appears to be the only way to pull off that sort of "metavariable polymorphism"
    ($($mass_type:tt),+ $(,)?) => {
        $(
            impl Mul<$mass_type> for Count {
                type Output = $mass_type;

                fn mul(self, rhs: $mass_type) -> Self::Output {
                    $mass_type(self.0 * rhs.0)
                }
            }
        )+
    };
}

mass_mul_impls!(MonoisotopicMass, AverageMass);

impl Add for Count {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self((self.0 + rhs.0).normalize())
    }
}

impl Display for Count {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if *self != Self::ONE {
            write!(f, "{}", self.0)?;
        }
        Ok(())
    }
}

impl From<u64> for Count {
    fn from(n: u64) -> Self {
        Self(Decimal::from(n))
    }
}

impl Default for Count {
    fn default() -> Self {
        Self::ONE
    }
}
