// Standard Library Imports
use std::time::Duration;

// External Crate Imports
use miette::Diagnostic;
use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Clone, Eq, PartialEq, Debug, Diagnostic, Error)]
pub enum SpectrumError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Limit(#[from] ComputationLimitError),

    #[diagnostic(help(
        "isotope distributions can only be calculated for whole numbers of atoms, so try multiplying the formula \
        through (like (Fe0.95O)20 instead of Fe0.95O)"
    ))]
    #[error("the formula contains {count} {element} atoms, which is not a whole number")]
    FractionalCount { element: String, count: Decimal },
}

/// A spectrum calculation that was abandoned for exceeding its [`ComputationBudget`](crate::ComputationBudget)
#[derive(Clone, Eq, PartialEq, Debug, Diagnostic, Error)]
pub enum ComputationLimitError {
    #[diagnostic(help(
        "raise the bin limit, or raise min_fraction so that more improbable isotope combinations are discarded"
    ))]
    #[error("the isotope distribution needed {bins} bins, which is more than the limit of {max_bins}")]
    Bins { bins: usize, max_bins: usize },

    #[diagnostic(help("raise the time limit, or try a smaller formula"))]
    #[error("the isotope distribution took longer than the limit of {limit:?} to calculate")]
    Duration { limit: Duration },
}
