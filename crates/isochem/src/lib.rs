//! Chemical formula parsing, exact molecular masses, and isotopic mass spectra

pub mod atoms;
pub mod composition;
pub mod config;
pub mod errors;
mod formula;
pub mod mass_report;
pub mod parsers;
pub mod spectrum;
#[cfg(test)]
mod testing_tools;

use std::num::NonZeroU32;

// External Crate Imports
use derive_more::{Add, AddAssign, Display, From, Into, Neg, Sub, Sum};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub use atoms::atomic_database::AtomicDatabase;
pub use composition::{
    CompositionRecord, CompositionTable,
    errors::ValidationError,
    resolver::{resolve, resolve_with_config},
};
pub use config::{
    ComputationBudget, Config, EmpiricalConfig, GcdPolicy, MergeLabel, MixtureConfig,
    SpectrumConfig,
};
pub use errors::{IsochemError, Result};
pub use formula::parse;
pub use mass_report::MassReport;
pub use parsers::errors::ParseError;
pub use spectrum::{
    Spectrum, SpectrumPeak,
    errors::{ComputationLimitError, SpectrumError},
};

// NOTE: For the types in this module, 'a lifetimes indicate references to the AtomicDatabase, whilst 's lifetimes
// indicate references to the formula text being parsed

// Formula Syntax Trees ================================================================================================

/// A parsed (but not yet validated) chemical formula, along with the text it was parsed from
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct FormulaTree<'s> {
    source: &'s str,
    root: FormulaNode<'s>,
}

#[derive(Clone, Eq, PartialEq, Debug)]
pub enum FormulaNode<'s> {
    Atom(Atom<'s>),
    Group(Group<'s>),
    Charge(Charge),
    Mixture(Vec<Part<'s>>),
}

/// An element or explicitly labelled isotope, like `C`, `[13C]2`, or `D`
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct Atom<'s> {
    pub symbol: &'s str,
    pub mass_number: Option<MassNumber>,
    pub count: Count,
    /// The slice of the formula this atom was parsed from
    pub text: &'s str,
}

/// A bracketed sub-formula, or (when `bracket` is `None`) a term joined to its neighbours by `.` or `+`
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct Group<'s> {
    pub bracket: Option<BracketKind>,
    pub children: Vec<FormulaNode<'s>>,
    pub multiplier: Count,
    pub charge: Option<Charge>,
    /// The slice of the formula this group was parsed from, including any brackets, count, or charge
    pub text: &'s str,
}

/// One weighted component of a mixture, like the `30Si: 0.74` in `O: 0.26, 30Si: 0.74`
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct Part<'s> {
    pub formula: FormulaNode<'s>,
    pub weight: Decimal,
    pub text: &'s str,
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub enum BracketKind {
    Round,
    Square,
    Curly,
}

// Resolved Chemistry ==================================================================================================

/// A flat, validated elemental composition with a net charge
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct Composition<'a> {
    atoms: Vec<(Element<'a>, Count)>,
    charge: Charge,
    electron: Option<Particle<'a>>,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct Element<'a> {
    symbol: &'a str,
    name: &'a str,
    mass_number: Option<MassNumber>,
    description: &'a atoms::atomic_database::ElementDescription,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct Particle<'a> {
    symbol: &'a str,
    name: &'a str,
    mass: &'a Decimal,
    charge: &'a Charge,
}

#[derive(Clone, Eq, PartialEq, Debug, Serialize)]
pub struct Isotope {
    mass_number: MassNumber,
    relative_mass: Decimal,
    abundance: Decimal,
}

// ---------------------------------------------------------------------------------------------------------------------

/// A non-negative (and possibly fractional) number of atoms or groups
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize, Into)]
pub struct Count(Decimal);

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Display, Serialize, Deserialize)]
pub struct MassNumber(NonZeroU32);

#[derive(
    Copy,
    Clone,
    Eq,
    PartialEq,
    Ord,
    PartialOrd,
    Hash,
    Debug,
    Default,
    Serialize,
    Deserialize,
    From,
    Into,
    Add,
    AddAssign,
    Neg,
    Sum,
)]
pub struct Charge(i64);

// ---------------------------------------------------------------------------------------------------------------------

macro_rules! newtype_masses {
    ($($mass_type:ident),+ $(,)?) => {
        $(
            #[derive(
                Copy,
                Clone,
                Eq,
                PartialEq,
                Ord,
                PartialOrd,
                Hash,
                Debug,
                Default,
                Display,
                Serialize,
                From,
                Into,
                Add,
                Sub,
                Sum,
            )]
            pub struct $mass_type(Decimal);
        )+
    };
}

newtype_masses!(MonoisotopicMass, AverageMass, MonoisotopicMz, AverageMz);

/// The sum of the mass numbers of every atom, rounded to the nearest whole number
#[derive(
    Copy,
    Clone,
    Eq,
    PartialEq,
    Ord,
    PartialOrd,
    Hash,
    Debug,
    Default,
    Display,
    Serialize,
    From,
    Into,
    Add,
    Sum,
)]
pub struct NominalMass(u64);

// =====================================================================================================================

pub trait Massive {
    fn monoisotopic_mass(&self) -> MonoisotopicMass;
    fn average_mass(&self) -> AverageMass;
}

pub trait Charged {
    fn charge(&self) -> Charge;
}

// Blanket impls

macro_rules! massive_ref_impls {
    ($($ref_type:ty),+ $(,)?) => {
        $(
            impl<T: Massive> Massive for $ref_type {
                fn monoisotopic_mass(&self) -> MonoisotopicMass {
                    (**self).monoisotopic_mass()
                }

                fn average_mass(&self) -> AverageMass {
                    (**self).average_mass()
                }
            }
        )+
    };
}

massive_ref_impls!(&T, &mut T, Box<T>);

macro_rules! charged_ref_impls {
    ($($ref_type:ty),+ $(,)?) => {
        $(
            impl<T: Charged> Charged for $ref_type {
                fn charge(&self) -> Charge {
                    (**self).charge()
                }
            }
        )+
    };
}

charged_ref_impls!(&T, &mut T, Box<T>);
