pub mod atomic_database;
mod charge;
mod count;
mod element;
pub mod errors;
mod isotope;
mod mass_number;
mod mz;
mod particle;
