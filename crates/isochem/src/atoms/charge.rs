use std::fmt::{self, Display, Formatter};

use crate::Charge;

impl Charge {
    pub const ZERO: Self = Self(0);

    #[must_use]
    pub const fn abs(&self) -> Self {
        Self(self.0.abs())
    }

    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

// NOTE: Charges are written in the `2+` / `-` style used for ions, with a magnitude of one left implicit
impl Display for Charge {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { '-' } else { '+' };
        match self.0.unsigned_abs() {
            0 => Ok(()),
            1 => write!(f, "{sign}"),
            magnitude => write!(f, "{magnitude}{sign}"),
        }
    }
}
