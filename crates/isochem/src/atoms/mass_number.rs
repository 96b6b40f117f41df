use std::num::NonZeroU32;

use crate::MassNumber;

impl MassNumber {
    /// Returns `None` for a mass number of zero
    #[must_use]
    pub fn new(n: u32) -> Option<Self> {
        NonZeroU32::new(n).map(Self)
    }

    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0.get()
    }
}

impl From<MassNumber> for u32 {
    fn from(value: MassNumber) -> Self {
        value.get()
    }
}
