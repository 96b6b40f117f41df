pub(crate) mod abbreviations;
pub mod errors;
pub(crate) mod formula;
pub mod primitives;

// Re-exports
pub use formula::MAX_DEPTH;
