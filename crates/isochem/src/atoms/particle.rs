use std::fmt::{self, Display, Formatter};

use crate::{AverageMass, Charge, Charged, Massive, MonoisotopicMass, Particle};

use super::{atomic_database::AtomicDatabase, errors::AtomicLookupError};

const ELECTRON: &str = "e";

impl<'a> Particle<'a> {
    pub(crate) fn new(
        db: &'a AtomicDatabase,
        symbol: impl AsRef<str>,
    ) -> Result<Self, AtomicLookupError> {
        let symbol = symbol.as_ref();
        let (symbol, description) = db
            .particle_entry(symbol)
            .ok_or_else(|| AtomicLookupError::particle(symbol))?;
        Ok(Self {
            symbol,
            name: &description.name,
            mass: &description.mass,
            charge: &description.charge,
        })
    }

    /// The particle gained or lost whenever an ion picks up its charge
    pub(crate) fn electron(db: &'a AtomicDatabase) -> Result<Self, AtomicLookupError> {
        Self::new(db, ELECTRON)
    }

    #[must_use]
    pub const fn symbol(&self) -> &'a str {
        self.symbol
    }

    #[must_use]
    pub const fn name(&self) -> &'a str {
        self.name
    }
}

impl Display for Particle<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol)
    }
}

// NOTE: Free particles have no isotopes, so their monoisotopic and average masses are one and the same
impl Massive for Particle<'_> {
    fn monoisotopic_mass(&self) -> MonoisotopicMass {
        MonoisotopicMass(*self.mass)
    }

    fn average_mass(&self) -> AverageMass {
        AverageMass(*self.mass)
    }
}

impl Charged for Particle<'_> {
    fn charge(&self) -> Charge {
        *self.charge
    }
}
