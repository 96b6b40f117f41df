use miette::Diagnostic;
use thiserror::Error;

use crate::{
    atoms::errors::DatabaseError, composition::errors::ValidationError,
    parsers::errors::ParseError, spectrum::errors::SpectrumError,
};

pub type Result<T, E = Box<IsochemError>> = std::result::Result<T, E>;

#[derive(Debug, Diagnostic, Error)]
pub enum IsochemError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Spectrum(#[from] SpectrumError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Database(#[from] DatabaseError),

    #[diagnostic(help("configuration files are JSON objects, and any missing fields take their default values"))]
    #[error("failed to read the configuration from {name:?}")]
    Config {
        name: String,
        #[source]
        source: serde_json::Error,
    },
}

impl IsochemError {
    pub(crate) fn config(name: &str, source: serde_json::Error) -> Self {
        let name = name.to_owned();

        Self::Config { name, source }
    }
}

// NOTE: A blanket `impl<E: Into<IsochemError>> From<E> for Box<IsochemError>` would overlap with the standard
// library's `From<T> for Box<T>`, so each wrapped error gets its own impl
macro_rules! boxed_error_impls {
    ($($error_type:ty),+ $(,)?) => {
        $(
            impl From<$error_type> for Box<IsochemError> {
                fn from(value: $error_type) -> Self {
                    Box::new(value.into())
                }
            }
        )+
    };
}

boxed_error_impls!(ParseError, ValidationError, SpectrumError, DatabaseError);
