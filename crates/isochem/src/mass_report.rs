//! A summary of every mass that can be calculated for a composition without a spectrum

// Standard Library Imports
use std::fmt::{self, Display, Formatter};

// External Crate Imports
use rust_decimal::Decimal;
use serde::Serialize;

// Local Crate Imports
use crate::{
    AverageMass, AverageMz, Charge, Charged, Composition, Count, EmpiricalConfig, Massive,
    MonoisotopicMass, MonoisotopicMz, NominalMass, composition::records::precision_digits,
};

#[derive(Clone, Eq, PartialEq, Debug, Serialize)]
pub struct MassReport {
    /// The composition in Hill notation
    pub formula: String,
    pub empirical: String,
    pub atom_count: Count,
    pub charge: Charge,
    pub monoisotopic_mass: MonoisotopicMass,
    pub average_mass: AverageMass,
    pub nominal_mass: NominalMass,
    pub monoisotopic_mz: MonoisotopicMz,
    pub average_mz: AverageMz,
}

impl MassReport {
    #[must_use]
    pub fn compute(composition: &Composition) -> Self {
        Self::compute_with_config(composition, &EmpiricalConfig::default())
    }

    /// Like [`MassReport::compute`], but with control over how the empirical formula is reduced
    #[must_use]
    pub fn compute_with_config(composition: &Composition, config: &EmpiricalConfig) -> Self {
        Self {
            formula: composition.to_string(),
            empirical: composition.empirical(config).to_string(),
            atom_count: composition.atom_count(),
            charge: composition.charge(),
            monoisotopic_mass: composition.monoisotopic_mass(),
            average_mass: composition.average_mass(),
            nominal_mass: composition.nominal_mass(),
            monoisotopic_mz: composition.monoisotopic_mz(),
            average_mz: composition.average_mz(),
        }
    }
}

fn rounded(mass: impl Into<Decimal>) -> String {
    let mass = mass.into();
    let precision = precision_digits(mass, 9);
    format!("{:.*}", precision as usize, mass.round_dp(precision))
}

impl Display for MassReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        writeln!(f, "Formula: {}", self.formula)?;
        writeln!(f, "Empirical formula: {}", self.empirical)?;
        writeln!(f, "Nominal mass: {}", self.nominal_mass)?;
        writeln!(f, "Average mass: {}", rounded(self.average_mass))?;
        writeln!(f, "Monoisotopic mass: {}", rounded(self.monoisotopic_mass))?;
        if !self.charge.is_zero() {
            writeln!(f, "Charge: {}", self.charge)?;
            writeln!(f, "Average m/z: {}", rounded(self.average_mz))?;
            writeln!(f, "Monoisotopic m/z: {}", rounded(self.monoisotopic_mz))?;
        }
        write!(f, "Number of atoms: {}", Decimal::from(self.atom_count))
    }
}

// Module Tests ========================================================================================================
