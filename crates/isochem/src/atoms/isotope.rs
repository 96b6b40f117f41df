use rust_decimal::Decimal;

use crate::{Isotope, MassNumber};

impl Isotope {
    #[must_use]
    pub const fn mass_number(&self) -> MassNumber {
        self.mass_number
    }

    #[must_use]
    pub const fn relative_mass(&self) -> Decimal {
        self.relative_mass
    }

    /// The natural abundance of this isotope, as a fraction between 0 and 1
    #[must_use]
    pub const fn abundance(&self) -> Decimal {
        self.abundance
    }
}
