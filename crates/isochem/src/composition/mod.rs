//! Flat elemental compositions, resolved from parsed formulas, and everything that can be calculated from them

pub mod errors;
pub mod records;
pub mod resolver;

// Standard Library Imports
use std::{
    cmp::Ordering,
    fmt::{self, Display, Formatter},
};

// External Crate Imports
use rust_decimal::{Decimal, prelude::ToPrimitive};

// Local Crate Imports
use crate::{
    AtomicDatabase, AverageMass, AverageMz, Charge, Charged, Composition, Count, Element,
    EmpiricalConfig, GcdPolicy, MassReport, Massive, MixtureConfig, MonoisotopicMass,
    MonoisotopicMz, NominalMass, Result, Spectrum, SpectrumConfig, parse,
    spectrum::errors::SpectrumError,
};

// Re-exports
pub use records::{CompositionRecord, CompositionTable};

// Public API ==========================================================================================================

impl<'a> Composition<'a> {
    /// Parses and resolves a formula in one go
    ///
    /// # Errors
    ///
    /// Returns an error if the formula isn't valid syntax, or if it doesn't describe a valid composition
    pub fn new(db: &'a AtomicDatabase, formula: impl AsRef<str>) -> Result<Self> {
        Self::new_with_config(db, formula, &MixtureConfig::default())
    }

    /// Like [`Composition::new`], but with control over how mixtures are converted into counts
    ///
    /// # Errors
    ///
    /// Returns an error if the formula isn't valid syntax, or if it doesn't describe a valid composition
    pub fn new_with_config(
        db: &'a AtomicDatabase,
        formula: impl AsRef<str>,
        config: &MixtureConfig,
    ) -> Result<Self> {
        let tree = parse(formula.as_ref())?;
        Ok(resolver::resolve_with_config(db, &tree, config)?)
    }

    /// Every element and labelled isotope in the composition, in Hill order
    #[must_use]
    pub fn atoms(&self) -> &[(Element<'a>, Count)] {
        &self.atoms
    }

    /// The total number of atoms
    #[must_use]
    pub fn atom_count(&self) -> Count {
        self.atoms.iter().map(|&(_, count)| count).fold(Count::ZERO, |total, count| total + count)
    }

    /// The number of distinct elements, counting labelled isotopes as part of their element
    #[must_use]
    pub fn element_count(&self) -> usize {
        let mut symbols: Vec<_> = self.atoms.iter().map(|(element, _)| element.symbol()).collect();
        symbols.dedup();
        symbols.len()
    }

    /// The greatest common divisor of the atom counts (and, optionally, the charge)
    ///
    /// Returns one whenever no reduction is possible, including for fractional counts under [`GcdPolicy::Integral`]
    #[must_use]
    pub fn gcd(&self, config: &EmpiricalConfig) -> Count {
        let charge = (config.include_charge && !self.charge.is_zero())
            .then(|| Decimal::from(self.charge.0.unsigned_abs()));
        let values: Vec<Decimal> = self
            .atoms
            .iter()
            .map(|&(_, count)| count.into())
            .chain(charge)
            .collect();

        let scale = match config.gcd {
            GcdPolicy::Integral if values.iter().any(|v| !v.fract().is_zero()) => return Count::ONE,
            GcdPolicy::Integral => 0,
            GcdPolicy::Rational => values.iter().map(|v| v.normalize().scale()).max().unwrap_or(0),
        };

        // NOTE: Scaling by a power of ten turns every (terminating) decimal into a whole number
        let Ok(power) = Decimal::try_from_i128_with_scale(10_i128.pow(scale), 0) else {
            return Count::ONE;
        };
        let scaled: Option<Vec<u128>> = values
            .iter()
            .map(|v| v.checked_mul(power).and_then(|v| v.to_u128()))
            .collect();
        let Some(gcd) = scaled.and_then(|s| s.into_iter().reduce(euclid)) else {
            return Count::ONE;
        };

        i128::try_from(gcd)
            .ok()
            .and_then(|gcd| Decimal::try_from_i128_with_scale(gcd, scale).ok())
            .and_then(Count::new)
            .filter(|gcd| !gcd.is_zero())
            .unwrap_or(Count::ONE)
    }

    /// The composition with every count divided by their greatest common divisor, so `C6H12O6` becomes `CH2O`
    ///
    /// When `config.include_charge` is `false`, the empirical formula is left uncharged
    #[must_use]
    pub fn empirical(&self, config: &EmpiricalConfig) -> Self {
        let gcd: Decimal = self.gcd(config).into();
        let atoms = self
            .atoms
            .iter()
            .map(|&(element, count)| (element, Count((Decimal::from(count) / gcd).normalize())))
            .collect();
        let charge = if config.include_charge {
            (Decimal::from(self.charge.0) / gcd)
                .to_i64()
                .map_or(self.charge, Charge)
        } else {
            Charge::ZERO
        };
        let electron = if charge.is_zero() { None } else { self.electron };

        Self {
            atoms,
            charge,
            electron,
        }
    }

    /// The sum of the mass numbers of the principal isotope of every atom, rounded to the nearest whole number
    #[must_use]
    pub fn nominal_mass(&self) -> NominalMass {
        let mass: Decimal = self
            .atoms
            .iter()
            .map(|(element, count)| {
                let mass_number = element.principal_isotope().mass_number().get();
                Decimal::from(*count) * Decimal::from(mass_number)
            })
            .sum();
        // NOTE: Resolution rejects compositions whose masses are too large for this conversion
        NominalMass(mass.round().to_u64().unwrap_or(u64::MAX))
    }

    /// The monoisotopic mass of the ion, with the electrons gained or lost to reach its charge taken into account
    #[must_use]
    pub fn monoisotopic_ion_mass(&self) -> MonoisotopicMass {
        MonoisotopicMass(Decimal::from(self.monoisotopic_mz()) * self.charge_magnitude())
    }

    /// The average mass of the ion, with the electrons gained or lost to reach its charge taken into account
    #[must_use]
    pub fn average_ion_mass(&self) -> AverageMass {
        AverageMass(Decimal::from(self.average_mz()) * self.charge_magnitude())
    }

    /// The monoisotopic mass-to-charge ratio (or just the monoisotopic mass, for uncharged compositions)
    #[must_use]
    pub fn monoisotopic_mz(&self) -> MonoisotopicMz {
        self.monoisotopic_mass().to_mz(self.charge, self.electron_mass())
    }

    /// The average mass-to-charge ratio (or just the average mass, for uncharged compositions)
    #[must_use]
    pub fn average_mz(&self) -> AverageMz {
        self.average_mass().to_mz(self.charge, self.electron_mass())
    }

    /// A table of how much each element and labelled isotope contributes to the total mass
    #[must_use]
    pub fn records(&self) -> CompositionTable<'a> {
        CompositionTable::new(self, false)
    }

    /// Like [`Composition::records`], but with every isotope of an element merged into a single record
    #[must_use]
    pub fn records_by_element(&self) -> CompositionTable<'a> {
        CompositionTable::new(self, true)
    }

    /// Every mass of this composition worth reporting, with the default empirical formula settings
    #[must_use]
    pub fn mass_report(&self) -> MassReport {
        MassReport::compute(self)
    }

    /// The isotopic mass spectrum of this composition
    ///
    /// # Errors
    ///
    /// Fails if any count isn't a whole number, or if the calculation exceeds the budget set in `config`
    pub fn spectrum(&self, config: &SpectrumConfig) -> Result<Spectrum, SpectrumError> {
        Spectrum::compute(self, config)
    }

    pub(crate) fn electron_mass(&self) -> Decimal {
        self.electron
            .map_or(Decimal::ZERO, |e| e.monoisotopic_mass().into())
    }

    fn charge_magnitude(&self) -> Decimal {
        Decimal::from(self.charge.0.unsigned_abs().max(1))
    }
}

/// Checks that the masses of `atoms` can be summed without overflowing, so that later calculations don't have to
pub(crate) fn masses_fit(atoms: &[(Element, Count)]) -> bool {
    let mut average = Decimal::ZERO;
    let mut monoisotopic = Decimal::ZERO;
    let mut nominal = Decimal::ZERO;
    for (element, count) in atoms {
        let count = Decimal::from(*count);
        let terms = [
            (&mut average, Decimal::from(element.average_mass())),
            (&mut monoisotopic, Decimal::from(element.monoisotopic_mass())),
            (&mut nominal, Decimal::from(element.principal_isotope().mass_number().get())),
        ];
        for (total, unit) in terms {
            match count.checked_mul(unit).and_then(|m| total.checked_add(m)) {
                Some(sum) => *total = sum,
                None => return false,
            }
        }
    }
    nominal.round().to_u64().is_some()
}

fn euclid(mut a: u128, mut b: u128) -> u128 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

// Hill Ordering =======================================================================================================

/// Sorts atoms into Hill order: carbon, then hydrogen (if there is carbon), then everything else alphabetically, with
/// labelled isotopes following their natural element in order of mass number
pub(crate) fn hill_sort(atoms: &mut [(Element, Count)]) {
    let has_carbon = atoms.iter().any(|(element, _)| element.symbol() == "C");
    let rank = |element: &Element| match element.symbol() {
        "C" => 0,
        "H" if has_carbon => 1,
        _ => 2,
    };
    atoms.sort_unstable_by(|(a, _), (b, _)| {
        rank(a)
            .cmp(&rank(b))
            .then_with(|| a.symbol().cmp(b.symbol()))
            .then_with(|| compare_mass_numbers(a, b))
    });
}

fn compare_mass_numbers(a: &Element, b: &Element) -> Ordering {
    // NOTE: `None` sorts before `Some`, so natural elements come before their labelled isotopes
    a.mass_number().cmp(&b.mass_number())
}

// Trait Implementations ===============================================================================================

// NOTE: Displays the composition in Hill notation, using square brackets (like `[O4S]2-`) for ions and round brackets
// around fractional counts above one (like `(C1.5)H3`), so that the output can always be parsed again
impl Display for Composition<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let charged = !self.charge.is_zero();
        if charged {
            write!(f, "[")?;
        }
        for (idx, (element, count)) in self.atoms.iter().enumerate() {
            if count.needs_brackets() && idx + 1 < self.atoms.len() {
                write!(f, "({element}{count})")?;
            } else {
                write!(f, "{element}{count}")?;
            }
        }
        if charged {
            write!(f, "]{}", self.charge)?;
        }
        Ok(())
    }
}

impl Massive for Composition<'_> {
    fn monoisotopic_mass(&self) -> MonoisotopicMass {
        self.atoms
            .iter()
            .map(|(element, count)| *count * element.monoisotopic_mass())
            .sum()
    }

    fn average_mass(&self) -> AverageMass {
        self.atoms
            .iter()
            .map(|(element, count)| *count * element.average_mass())
            .sum()
    }
}

impl Charged for Composition<'_> {
    fn charge(&self) -> Charge {
        self.charge
    }
}

// Module Tests ========================================================================================================
