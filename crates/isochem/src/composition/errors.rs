// Standard Library Imports
use std::{fmt::Display, iter};

// External Crate Imports
use miette::{Diagnostic, LabeledSpan, SourceCode, SourceSpan};
use rust_decimal::Decimal;
use thiserror::Error;

// Local Crate Imports
use crate::atoms::errors::AtomicLookupError;

/// A formula that parsed successfully, but doesn't describe a real chemical composition
#[derive(Clone, Eq, PartialEq, Debug, Error)]
#[error("{kind}")]
pub struct ValidationError {
    // NOTE: Like `ParseError`, holds the formula followed by a single space
    source_code: String,
    span: SourceSpan,
    kind: ValidationErrorKind,
}

#[non_exhaustive]
#[derive(Clone, Eq, PartialEq, Debug, Diagnostic, Error)]
pub enum ValidationErrorKind {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Lookup(#[from] AtomicLookupError),

    #[diagnostic(help("counts of zero remove atoms from a formula, so at least one atom needs a non-zero count"))]
    #[error("the formula doesn't contain any atoms")]
    NoAtoms,

    #[diagnostic(help(
        "charges on fractional groups (like [SO4]2-0.5) need to add up to a whole number of elementary charges"
    ))]
    #[error("the net charge of the formula, {0}, is not a whole number")]
    FractionalCharge(Decimal),

    #[error("{0} is too large to represent")]
    Overflow(String),

    #[diagnostic(help("give at least one part of the mixture a weight greater than zero"))]
    #[error("the weights of a mixture must add up to more than zero")]
    MixtureWeights,
}

impl ValidationErrorKind {
    fn label(&self) -> &'static str {
        match self {
            Self::Lookup(AtomicLookupError::Element(_)) => "unknown element",
            Self::Lookup(AtomicLookupError::Isotope(..)) => "unknown isotope",
            Self::Lookup(AtomicLookupError::Particle(_)) => "unknown particle",
            Self::NoAtoms => "no atoms",
            Self::FractionalCharge(_) => "fractional charge",
            Self::Overflow(_) => "count too large",
            Self::MixtureWeights => "no weight",
        }
    }
}

impl ValidationError {
    pub(crate) fn new(
        formula: &str,
        span: SourceSpan,
        kind: impl Into<ValidationErrorKind>,
    ) -> Self {
        Self {
            source_code: format!("{formula} "),
            span,
            kind: kind.into(),
        }
    }

    /// The formula that failed validation
    #[must_use]
    pub fn formula(&self) -> &str {
        &self.source_code[..self.source_code.len() - 1]
    }

    #[must_use]
    pub const fn span(&self) -> SourceSpan {
        self.span
    }

    #[must_use]
    pub const fn kind(&self) -> &ValidationErrorKind {
        &self.kind
    }

    /// The part of the formula that failed validation
    #[must_use]
    pub fn offending_text(&self) -> &str {
        let formula = self.formula();
        let start = self.span.offset().min(formula.len());
        let end = (start + self.span.len()).min(formula.len());
        &formula[start..end]
    }
}

impl Diagnostic for ValidationError {
    fn help<'a>(&'a self) -> Option<Box<dyn Display + 'a>> {
        self.kind.help()
    }

    fn source_code(&self) -> Option<&dyn SourceCode> {
        Some(&self.source_code)
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        let label = LabeledSpan::new_with_span(Some(self.kind.label().to_owned()), self.span);
        Some(Box::new(iter::once(label)))
    }
}
