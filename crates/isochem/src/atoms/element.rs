use std::fmt::{self, Display, Formatter};

use crate::{AverageMass, Element, Isotope, MassNumber, Massive, MonoisotopicMass};

use super::{atomic_database::AtomicDatabase, errors::AtomicLookupError};

impl<'a> Element<'a> {
    pub(crate) fn new(
        db: &'a AtomicDatabase,
        symbol: impl AsRef<str>,
    ) -> Result<Self, AtomicLookupError> {
        Self::lookup(db, symbol, None)
    }

    pub(crate) fn new_isotope(
        db: &'a AtomicDatabase,
        symbol: impl AsRef<str>,
        mass_number: MassNumber,
    ) -> Result<Self, AtomicLookupError> {
        Self::lookup(db, symbol, Some(mass_number))
    }

    fn lookup(
        db: &'a AtomicDatabase,
        symbol: impl AsRef<str>,
        mass_number: Option<MassNumber>,
    ) -> Result<Self, AtomicLookupError> {
        let symbol = symbol.as_ref();
        let (symbol, description) = db
            .element_entry(symbol)
            .ok_or_else(|| AtomicLookupError::element(symbol))?;

        let element = Self {
            symbol,
            name: &description.name,
            mass_number,
            description,
        };

        if let Some(mass_number) = mass_number {
            if element.labelled_isotope().is_none() {
                return Err(AtomicLookupError::isotope(
                    symbol,
                    mass_number,
                    element.name,
                    &description.isotopes,
                ));
            }
        }

        Ok(element)
    }

    #[must_use]
    pub const fn symbol(&self) -> &'a str {
        self.symbol
    }

    #[must_use]
    pub const fn name(&self) -> &'a str {
        self.name
    }

    #[must_use]
    pub const fn mass_number(&self) -> Option<MassNumber> {
        self.mass_number
    }

    #[must_use]
    pub const fn atomic_number(&self) -> u32 {
        self.description.atomic_number
    }

    /// All of this element's isotopes, whether or not a specific one has been selected
    #[must_use]
    pub fn isotopes(&self) -> &'a [Isotope] {
        &self.description.isotopes
    }

    /// The isotope used for monoisotopic and nominal masses: either the explicitly labelled isotope, or the most
    /// abundant one (with ties going to the lightest)
    #[must_use]
    pub fn principal_isotope(&self) -> &'a Isotope {
        self.labelled_isotope().unwrap_or_else(|| {
            // SAFETY: Validation of the `AtomicDatabase` ensures there is always at least one isotope per element
            self.isotopes()
                .iter()
                .reduce(|best, i| if i.abundance > best.abundance { i } else { best })
                .unwrap()
        })
    }

    /// The isotopes contributing to this element's isotopic pattern (only the labelled one, if there is a label)
    pub(crate) fn isotope_distribution(&self) -> Vec<&'a Isotope> {
        self.labelled_isotope().map_or_else(
            || {
                self.isotopes()
                    .iter()
                    .filter(|i| !i.abundance.is_zero())
                    .collect()
            },
            |isotope| vec![isotope],
        )
    }

    fn labelled_isotope(&self) -> Option<&'a Isotope> {
        let isotopes = self.isotopes();
        self.mass_number.and_then(|a| {
            isotopes
                .binary_search_by_key(&a, |i| i.mass_number)
                .ok()
                .map(|idx| &isotopes[idx])
        })
    }
}

impl Display for Element<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let symbol = self.symbol;
        if let Some(mass_number) = self.mass_number {
            write!(f, "[{mass_number}{symbol}]")
        } else {
            write!(f, "{symbol}")
        }
    }
}

impl Massive for Element<'_> {
    fn monoisotopic_mass(&self) -> MonoisotopicMass {
        MonoisotopicMass(self.principal_isotope().relative_mass)
    }

    fn average_mass(&self) -> AverageMass {
        AverageMass(
            self.labelled_isotope()
                .map_or(self.description.average_mass, |i| i.relative_mass),
        )
    }
}
