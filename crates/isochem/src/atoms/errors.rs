use miette::{Diagnostic, NamedSource, SourceSpan};
use rust_decimal::Decimal;
use thiserror::Error;

use crate::{Isotope, MassNumber};

#[derive(Debug, Diagnostic, Clone, Eq, PartialEq, Error)]
pub enum AtomicLookupError {
    #[diagnostic(help("double-check for typos, or add a new entry to the atomic database"))]
    #[error("the element {0:?} could not be found in the supplied atomic database")]
    Element(String),

    #[diagnostic(help("double-check for typos, or add a new entry to the atomic database"))]
    #[error(
        "the isotope \"{0}-{1}\" could not be found in the supplied atomic database, though the following {2} \
        isotopes were found: {3}"
    )]
    Isotope(String, MassNumber, String, String),

    #[diagnostic(help("double-check for typos, or add a new entry to the atomic database"))]
    #[error("the particle {0:?} could not be found in the supplied atomic database")]
    Particle(String),
}

impl AtomicLookupError {
    pub(crate) fn element(symbol: &str) -> Self {
        Self::Element(symbol.to_owned())
    }

    pub(crate) fn isotope(
        symbol: &str,
        mass_number: MassNumber,
        name: &str,
        isotopes: &[Isotope],
    ) -> Self {
        let known: Vec<_> = isotopes.iter().map(|i| i.mass_number.to_string()).collect();
        Self::Isotope(
            symbol.to_owned(),
            mass_number,
            name.to_owned(),
            format!("[{}]", known.join(", ")),
        )
    }

    pub(crate) fn particle(symbol: &str) -> Self {
        Self::Particle(symbol.to_owned())
    }
}

#[derive(Debug, Diagnostic, Clone, Eq, PartialEq, Error)]
pub enum InvalidAtomicSymbolError {
    #[error(
        "expected a single uppercase ASCII letter optionally followed by up to two lowercase ASCII letters, got {0:?}"
    )]
    Element(String),

    #[error("expected a single lowercase ASCII letter, got {0:?}")]
    Particle(String),
}

// FIXME: Only `Syntax` errors can point into the file; semantic errors should eventually carry spans too
#[derive(Debug, Diagnostic, Error)]
pub enum DatabaseError {
    #[diagnostic(help("check that the database is valid JSON matching the expected schema"))]
    #[error("failed to parse the database: {reason}")]
    Syntax {
        #[source_code]
        src: NamedSource<String>,
        #[label("{reason}")]
        span: SourceSpan,
        reason: String,
    },

    #[error("the element {0:?} was defined more than once")]
    DuplicateElement(String),

    #[error("the particle {0:?} was defined more than once")]
    DuplicateParticle(String),

    #[error("the isotope \"{0}-{1}\" was defined more than once")]
    DuplicateIsotope(String, MassNumber),

    #[diagnostic(help("every element needs at least one isotope to calculate masses from"))]
    #[error("the element {0:?} doesn't have any isotopes")]
    NoIsotopes(String),

    #[error("the isotope \"{0}-{1}\" has an abundance of {2}, which is outside of the range 0 to 1")]
    AbundanceRange(String, MassNumber, Decimal),

    #[diagnostic(help("the natural abundances of an element's isotopes should sum to 1"))]
    #[error("the isotopic abundances of {0:?} sum to {1}")]
    AbundanceSum(String, Decimal),

    #[diagnostic(help("abbreviations are written like element symbols, as an uppercase letter then lowercase ones"))]
    #[error("the abbreviation {0:?} can't be told apart from the rest of a formula")]
    InvalidAbbreviation(String),

    #[error("the abbreviation {0:?} was defined more than once")]
    DuplicateAbbreviation(String),

    #[diagnostic(help("abbreviations and residues must expand to plain formulas, like C6H11NO"))]
    #[error("the formula {1:?} given for {0:?} isn't a plain list of elements and counts")]
    InvalidFragment(String, String),

    #[error("the polymer name {0:?} must be made of lowercase ASCII letters")]
    InvalidPolymerName(String),

    #[error("the polymer {0:?} was defined more than once")]
    DuplicatePolymer(String),

    #[diagnostic(help("residues are written as single uppercase ASCII letters"))]
    #[error("the {0:?} polymer refers to the residue {1:?}, which it doesn't define")]
    InvalidResidue(String, String),

    #[diagnostic(help("polymers with complements need one for every residue, so both strands can be counted"))]
    #[error("the residue {1:?} of the {0:?} polymer doesn't have a complement")]
    UnpairedResidue(String, char),
}

impl DatabaseError {
    pub(crate) fn syntax(file_name: &str, text: &str, error: &serde_json::Error) -> Self {
        // NOTE: `serde_json` reports one-based lines and columns, which need converting back into a byte offset
        let line_start: usize = text
            .split_inclusive('\n')
            .take(error.line().saturating_sub(1))
            .map(str::len)
            .sum();
        let offset = (line_start + error.column().saturating_sub(1)).min(text.len());
        let reason = error.to_string();

        Self::Syntax {
            src: NamedSource::new(file_name, text.to_owned()),
            span: SourceSpan::from((offset, 0)),
            reason,
        }
    }
}
