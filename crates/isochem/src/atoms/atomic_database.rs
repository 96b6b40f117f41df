// Standard Library Imports
use std::str::FromStr;

// External Crate Imports
use ahash::{HashMap, HashMapExt};
use itertools::Itertools;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, de};
use tracing::debug;

// Local Crate Imports
use super::errors::{AtomicLookupError, DatabaseError, InvalidAtomicSymbolError};
use crate::{Charge, Element, Isotope, MassNumber, Particle, Result};

/// The bundled element, isotope, and particle data used by [`AtomicDatabase::default()`]
pub const DEFAULT_JSON: &str = include_str!("../../data/atomic_database.json");

// NOTE: Equal to 0.0001
const ABUNDANCE_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 4);

// Public API ==========================================================================================================

#[derive(Clone, Eq, PartialEq, Debug)]
pub struct AtomicDatabase {
    elements: HashMap<String, ElementDescription>,
    particles: HashMap<String, ParticleDescription>,
}

impl AtomicDatabase {
    pub fn from_json(file_name: impl AsRef<str>, text: impl AsRef<str>) -> Result<Self> {
        let (file_name, text) = (file_name.as_ref(), text.as_ref());
        let parsed_db: AtomicDatabaseJson = serde_json::from_str(text)
            .map_err(|e| DatabaseError::syntax(file_name, text, &e))?;

        let mut elements = HashMap::with_capacity(parsed_db.elements.len());
        for element in parsed_db.elements {
            let (symbol, description) = ElementEntry::try_from(element)?;
            if elements.contains_key(&symbol) {
                return Err(DatabaseError::DuplicateElement(symbol).into());
            }
            elements.insert(symbol, description);
        }

        let mut particles = HashMap::with_capacity(parsed_db.particles.len());
        for ParticleJson {
            symbol,
            name,
            mass,
            charge,
        } in parsed_db.particles
        {
            let description = ParticleDescription {
                name,
                mass: mass.0,
                charge,
            };
            if particles.insert(symbol.0.clone(), description).is_some() {
                return Err(DatabaseError::DuplicateParticle(symbol.0).into());
            }
        }

        let db = Self {
            elements,
            particles,
        };
        debug!(
            elements = db.elements.len(),
            isotopes = db.isotope_count(),
            particles = db.particles.len(),
            "loaded atomic database {file_name:?}"
        );
        Ok(db)
    }

    pub fn lookup(&self, symbol: impl AsRef<str>) -> Result<Element<'_>, AtomicLookupError> {
        Element::new(self, symbol)
    }

    pub fn lookup_isotope(
        &self,
        symbol: impl AsRef<str>,
        mass_number: MassNumber,
    ) -> Result<Element<'_>, AtomicLookupError> {
        Element::new_isotope(self, symbol, mass_number)
    }

    /// The isotopes of an element, in ascending order of mass number
    pub fn isotopes(&self, symbol: impl AsRef<str>) -> Result<&[Isotope], AtomicLookupError> {
        let symbol = symbol.as_ref();
        self.elements
            .get(symbol)
            .map(|e| e.isotopes.as_slice())
            .ok_or_else(|| AtomicLookupError::element(symbol))
    }

    pub fn particle(&self, symbol: impl AsRef<str>) -> Result<Particle<'_>, AtomicLookupError> {
        Particle::new(self, symbol)
    }

    #[must_use]
    pub fn element_count(&self) -> usize {
        self.elements.len()
    }

    #[must_use]
    pub fn isotope_count(&self) -> usize {
        self.elements.values().map(|e| e.isotopes.len()).sum()
    }

    pub(crate) fn element_entry(&self, symbol: &str) -> Option<(&String, &ElementDescription)> {
        self.elements.get_key_value(symbol)
    }

    pub(crate) fn particle_entry(&self, symbol: &str) -> Option<(&String, &ParticleDescription)> {
        self.particles.get_key_value(symbol)
    }
}

impl Default for AtomicDatabase {
    fn default() -> Self {
        // SAFETY: The bundled database is checked by the tests in this module, so loading it can't fail
        Self::from_json("atomic_database.json", DEFAULT_JSON).unwrap()
    }
}

// ---------------------------------------------------------------------------------------------------------------------

#[derive(Clone, Eq, PartialEq, Debug)]
pub(crate) struct ElementDescription {
    pub(crate) name: String,
    pub(crate) atomic_number: u32,
    pub(crate) average_mass: Decimal,
    // NOTE: Kept sorted by mass number, which makes lookups a binary search
    pub(crate) isotopes: Vec<Isotope>,
}

#[derive(Clone, Eq, PartialEq, Debug)]
pub(crate) struct ParticleDescription {
    pub(crate) name: String,
    pub(crate) mass: Decimal,
    pub(crate) charge: Charge,
}

// JSON File Schema ====================================================================================================

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct AtomicDatabaseJson {
    elements: Vec<ElementJson>,
    #[serde(default)]
    particles: Vec<ParticleJson>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ElementJson {
    symbol: ElementSymbol,
    name: String,
    atomic_number: u32,
    average_mass: DecimalJson,
    isotopes: Vec<IsotopeJson>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct IsotopeJson {
    mass_number: MassNumber,
    relative_mass: DecimalJson,
    abundance: DecimalJson,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ParticleJson {
    symbol: ParticleSymbol,
    name: String,
    mass: DecimalJson,
    charge: Charge,
}

// Lossless Parsing of JSON Strings to Decimal =========================================================================

#[derive(Debug, Default)]
struct DecimalJson(Decimal);

impl<'de> Deserialize<'de> for DecimalJson {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let res = if s.contains(['e', 'E']) {
            Decimal::from_scientific(&s)
        } else {
            Decimal::from_str_exact(&s)
        };
        res.map(Self)
            .map_err(|e| de::Error::custom(format!("expected a decimal number, got {s:?}: {e}")))
    }
}

// Element and Particle Symbol Validation ==============================================================================

#[derive(Debug, Deserialize)]
#[serde(try_from = "String")]
struct ElementSymbol(String);

impl FromStr for ElementSymbol {
    type Err = InvalidAtomicSymbolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.chars();
        let leading_uppercase = chars.next().is_some_and(|c| c.is_ascii_uppercase());
        let trailing_lowercase = chars.clone().all(|c| c.is_ascii_lowercase());
        if leading_uppercase && trailing_lowercase && chars.count() <= 2 {
            Ok(Self(s.to_owned()))
        } else {
            Err(InvalidAtomicSymbolError::Element(s.to_owned()))
        }
    }
}

impl TryFrom<String> for ElementSymbol {
    type Error = InvalidAtomicSymbolError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Debug, Deserialize)]
#[serde(try_from = "String")]
struct ParticleSymbol(String);

impl FromStr for ParticleSymbol {
    type Err = InvalidAtomicSymbolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) if c.is_ascii_lowercase() => Ok(Self(s.to_owned())),
            _ => Err(InvalidAtomicSymbolError::Particle(s.to_owned())),
        }
    }
}

impl TryFrom<String> for ParticleSymbol {
    type Error = InvalidAtomicSymbolError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

// Conversion From Parsed JSON to Internal Representation ==============================================================

type ElementEntry = (String, ElementDescription);

impl TryFrom<ElementJson> for ElementEntry {
    type Error = DatabaseError;

    fn try_from(
        ElementJson {
            symbol: ElementSymbol(symbol),
            name,
            atomic_number,
            average_mass,
            isotopes,
        }: ElementJson,
    ) -> Result<Self, Self::Error> {
        let isotopes: Vec<_> = isotopes
            .into_iter()
            .map(
                |IsotopeJson {
                     mass_number,
                     relative_mass,
                     abundance,
                 }| Isotope {
                    mass_number,
                    relative_mass: relative_mass.0,
                    abundance: abundance.0,
                },
            )
            .sorted_unstable_by_key(|i| i.mass_number)
            .collect();

        if isotopes.is_empty() {
            return Err(DatabaseError::NoIsotopes(symbol));
        }

        if let Some(mass_number) = isotopes.iter().map(|i| i.mass_number).duplicates().next() {
            return Err(DatabaseError::DuplicateIsotope(symbol, mass_number));
        }

        if let Some(isotope) = isotopes
            .iter()
            .find(|i| !(Decimal::ZERO..=Decimal::ONE).contains(&i.abundance))
        {
            return Err(DatabaseError::AbundanceRange(
                symbol,
                isotope.mass_number,
                isotope.abundance,
            ));
        }

        let total_abundance: Decimal = isotopes.iter().map(|i| i.abundance).sum();
        if (total_abundance - Decimal::ONE).abs() > ABUNDANCE_TOLERANCE {
            return Err(DatabaseError::AbundanceSum(symbol, total_abundance));
        }

        let description = ElementDescription {
            name,
            atomic_number,
            average_mass: average_mass.0,
            isotopes,
        };
        Ok((symbol, description))
    }
}

// Module Tests ========================================================================================================

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use rust_decimal_macros::dec;

    use crate::{IsochemError, testing_tools::render_diagnostic};

    use super::*;

    #[test]
    fn build_default_atomic_database() {
        let db = AtomicDatabase::from_json("atomic_database.json", DEFAULT_JSON).unwrap();
        // Basic property checking
        assert_eq!(db.element_count(), 109);
        assert_eq!(db.isotope_count(), 313);
        assert_eq!(db.particles.len(), 2);
        // Isotopes are kept in order of mass number
        for description in db.elements.values() {
            assert!(
                description
                    .isotopes
                    .iter()
                    .tuple_windows()
                    .all(|(a, b)| a.mass_number < b.mass_number)
            );
        }
    }

    #[test]
    fn lookup_isotopes() {
        let db = AtomicDatabase::default();
        let mass_numbers: Vec<_> = db
            .isotopes("Cl")
            .unwrap()
            .iter()
            .map(|i| i.mass_number.to_string())
            .collect();
        assert_eq!(mass_numbers, ["35", "37"]);

        let tin = db.isotopes("Sn").unwrap();
        assert_eq!(tin.len(), 10);
        assert_eq!(tin[0].relative_mass, dec!(111.90482387));

        let carbon = db.lookup_isotope("C", MassNumber::new(13).unwrap()).unwrap();
        assert_eq!(carbon.mass_number(), MassNumber::new(13));
        assert!(db.lookup_isotope("C", MassNumber::new(15).unwrap()).is_err());

        assert_eq!(
            db.isotopes("Xx"),
            Err(AtomicLookupError::Element("Xx".to_owned()))
        );
    }

    #[test]
    fn scientific_abundances() {
        // Uranium-234 is listed with a scientific-notation abundance in the bundled data
        let db = AtomicDatabase::default();
        let uranium = db.isotopes("U").unwrap();
        assert_eq!(uranium[0].abundance, dec!(0.000054));
        assert_eq!(uranium[0].abundance.to_string(), "0.000054");
    }

    const HYDROGEN: &str = indoc! {r#"
        {
          "elements": [
            {
              "symbol": "H",
              "name": "Hydrogen",
              "atomic_number": 1,
              "average_mass": "1.007941",
              "isotopes": [
                { "mass_number": 2, "relative_mass": "2.01410177812", "abundance": "0.000115" },
                { "mass_number": 1, "relative_mass": "1.00782503223", "abundance": "0.999885" }
              ]
            }
          ]
        }
    "#};

    #[test]
    fn minimal_database() {
        let db = AtomicDatabase::from_json("test", HYDROGEN).unwrap();
        assert_eq!(db.element_count(), 1);
        assert_eq!(db.isotope_count(), 2);
        // Isotopes are sorted, regardless of the order they were listed in
        let isotopes = db.isotopes("H").unwrap();
        assert_eq!(isotopes[0].relative_mass, dec!(1.00782503223));
        assert_eq!(isotopes[1].relative_mass, dec!(2.01410177812));
        // No particles were provided
        assert!(db.particle("e").is_err());
    }

    fn database_error(json: &str) -> DatabaseError {
        match *AtomicDatabase::from_json("test", json).unwrap_err() {
            IsochemError::Database(error) => error,
            other => panic!("expected a database error, got {other:?}"),
        }
    }

    #[test]
    fn lowercase_element_symbol() {
        let json = HYDROGEN.replace(r#""symbol": "H""#, r#""symbol": "h""#);
        let error = database_error(&json);
        assert!(matches!(error, DatabaseError::Syntax { .. }));
        let report = render_diagnostic(&error);
        assert!(report.contains("expected a single uppercase ASCII letter"));
    }

    #[test]
    fn uppercase_particle_symbol() {
        let json = indoc! {r#"
            {
              "elements": [],
              "particles": [
                { "symbol": "P", "name": "Proton", "mass": "1.007276466621", "charge": 1 }
              ]
            }
        "#};
        let error = database_error(json);
        let report = render_diagnostic(&error);
        assert!(report.contains("expected a single lowercase ASCII letter"));
    }

    #[test]
    fn invalid_decimal() {
        let json = HYDROGEN.replace(r#""1.007941""#, r#""1.0o7941""#);
        let error = database_error(&json);
        let report = render_diagnostic(&error);
        assert!(report.contains("expected a decimal number"));
    }

    #[test]
    fn bad_abundances() {
        let json = HYDROGEN.replace("0.999885", "0.899885");
        assert!(matches!(
            database_error(&json),
            DatabaseError::AbundanceSum(symbol, total) if symbol == "H" && total == dec!(0.9)
        ));

        let json = HYDROGEN.replace("0.999885", "1.999885");
        assert!(matches!(
            database_error(&json),
            DatabaseError::AbundanceRange(..)
        ));
    }

    #[test]
    fn duplicate_entries() {
        let json = HYDROGEN.replace(r#""mass_number": 2"#, r#""mass_number": 1"#);
        assert!(matches!(
            database_error(&json),
            DatabaseError::DuplicateIsotope(..)
        ));

        let element = indoc! {r#"
            { "symbol": "He", "name": "Helium", "atomic_number": 2, "average_mass": "4.002602",
              "isotopes": [ { "mass_number": 4, "relative_mass": "4.00260325413", "abundance": "1" } ] }
        "#};
        let json = format!(r#"{{ "elements": [{element}, {element}] }}"#);
        assert!(matches!(
            database_error(&json),
            DatabaseError::DuplicateElement(symbol) if symbol == "He"
        ));
    }

    #[test]
    fn missing_isotopes() {
        let json = indoc! {r#"
            { "elements": [ { "symbol": "Xx", "name": "Nothing", "atomic_number": 0,
                              "average_mass": "0", "isotopes": [] } ] }
        "#};
        assert!(matches!(
            database_error(json),
            DatabaseError::NoIsotopes(symbol) if symbol == "Xx"
        ));
    }
}
