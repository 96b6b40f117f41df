// Standard Library Imports
use std::fmt::{self, Display, Formatter};

// External Crate Imports
use itertools::Itertools;
use rust_decimal::{Decimal, prelude::ToPrimitive};
use serde::Serialize;

// Local Crate Imports
use crate::{AverageMass, Composition, Count, MassNumber, Massive};

/// How much of a composition's mass comes from a single element (or labelled isotope)
#[derive(Clone, Eq, PartialEq, Debug, Serialize)]
pub struct CompositionRecord<'a> {
    pub symbol: &'a str,
    pub mass_number: Option<MassNumber>,
    pub count: Count,
    /// The count multiplied by the average mass of a single atom
    pub relative_mass: AverageMass,
    /// The share of the total mass, as a fraction between 0 and 1
    pub fraction: Decimal,
}

impl CompositionRecord<'_> {
    /// The symbol of the element, prefixed by its mass number if it's a labelled isotope (like `13C`)
    #[must_use]
    pub fn label(&self) -> String {
        self.mass_number.map_or_else(
            || self.symbol.to_owned(),
            |mass_number| format!("{mass_number}{}", self.symbol),
        )
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Serialize)]
pub struct CompositionTable<'a> {
    records: Vec<CompositionRecord<'a>>,
}

impl<'a> CompositionTable<'a> {
    pub(crate) fn new(composition: &Composition<'a>, merge_isotopes: bool) -> Self {
        let total: Decimal = composition.average_mass().into();
        let record = |symbol, mass_number, count, relative_mass: AverageMass| CompositionRecord {
            symbol,
            mass_number,
            count,
            relative_mass,
            fraction: Decimal::from(relative_mass) / total,
        };

        let atoms = composition
            .atoms()
            .iter()
            .map(|(element, count)| (element, *count, *count * element.average_mass()));
        let records = if merge_isotopes {
            // NOTE: Hill ordering keeps every isotope of an element next to each other
            let chunks = atoms.chunk_by(|(element, ..)| element.symbol());
            chunks
                .into_iter()
                .map(|(symbol, isotopes)| {
                    let (count, mass) = isotopes.fold(
                        (Count::ZERO, AverageMass::default()),
                        |(count, mass), (_, c, m)| (count + c, mass + m),
                    );
                    record(symbol, None, count, mass)
                })
                .collect()
        } else {
            atoms
                .map(|(element, count, mass)| {
                    record(element.symbol(), element.mass_number(), count, mass)
                })
                .collect()
        };

        Self { records }
    }

    #[must_use]
    pub fn records(&self) -> &[CompositionRecord<'a>] {
        &self.records
    }

    #[must_use]
    pub fn total_count(&self) -> Count {
        self.records
            .iter()
            .fold(Count::ZERO, |total, record| total + record.count)
    }

    #[must_use]
    pub fn total_mass(&self) -> AverageMass {
        self.records.iter().map(|record| record.relative_mass).sum()
    }

    #[must_use]
    pub fn total_fraction(&self) -> Decimal {
        self.records.iter().map(|record| record.fraction).sum()
    }
}

/// The number of decimal places that fit `value` into roughly `width` characters
pub(crate) fn precision_digits(value: Decimal, width: u32) -> u32 {
    let whole_digits = value
        .abs()
        .trunc()
        .to_u128()
        .filter(|&whole| whole > 0)
        .map_or(1, |whole| whole.ilog10() + 1);
    width.saturating_sub(whole_digits + 1).max(1)
}

impl Display for CompositionTable<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let precision = precision_digits(self.total_mass().into(), 9);
        let row = |f: &mut Formatter<'_>,
                   label: &str,
                   count: Count,
                   mass: AverageMass,
                   fraction: Decimal| {
            let count = Decimal::from(count);
            let mass = Decimal::from(mass).round_dp(precision);
            let percentage: Decimal = (fraction * Decimal::ONE_HUNDRED).round_dp(4);
            write!(
                f,
                "\n{label:<6} {count:>8}  {mass:>13.prec$} {percentage:>11.4}",
                prec = precision as usize
            )
        };

        write!(f, "Element  Number  Relative mass  Fraction %")?;
        for record in &self.records {
            row(f, &record.label(), record.count, record.relative_mass, record.fraction)?;
        }
        if self.records.len() > 1 {
            row(
                f,
                "Total:",
                self.total_count(),
                self.total_mass(),
                self.total_fraction(),
            )?;
        }
        Ok(())
    }
}

// Module Tests ========================================================================================================
