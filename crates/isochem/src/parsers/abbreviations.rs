// Standard Library Imports
use std::{collections::BTreeMap, sync::LazyLock};

// External Crate Imports
use ahash::{HashMap, HashMapExt};
use nom::{
    combinator::{all_consuming, opt, recognize},
    multi::{many0, many1},
    sequence::pair,
};
use serde::Deserialize;
use tracing::debug;

// Local Crate Imports
use super::primitives::{count, lowercase, uppercase};
use crate::{Count, Result, atoms::errors::DatabaseError};

/// The bundled group abbreviations and polymer residues used by [`AbbreviationTable::default()`]
pub const DEFAULT_JSON: &str = include_str!("../../data/abbreviations.json");

/// The table consulted while parsing, so that formulas like `PhNH2` or `peptide(GG)` can be expanded
pub(crate) static ABBREVIATIONS: LazyLock<AbbreviationTable> =
    LazyLock::new(AbbreviationTable::default);

/// The element symbols and counts that an abbreviation or residue stands for
pub(crate) type Fragment = Vec<(String, Count)>;

/// How many of each residue a sequence contains, in alphabetical order of residue
pub(crate) type ResidueCounts = BTreeMap<char, u64>;

// Public API ==========================================================================================================

#[derive(Clone, Eq, PartialEq, Debug)]
pub(crate) struct AbbreviationTable {
    groups: HashMap<String, Fragment>,
    // NOTE: Kept in file order, which is the order that bare sequences are matched against each polymer
    polymers: Vec<Polymer>,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub(crate) enum Strands {
    Single,
    Double,
}

/// A polymer written as a sequence of one-letter residues, like a peptide or an oligonucleotide
#[derive(Clone, Eq, PartialEq, Debug)]
pub(crate) struct Polymer {
    name: String,
    /// A bare sequence is only read as this polymer if it contains at least one of these residues
    markers: Vec<char>,
    /// Added once per strand to close off the chain of residues
    ends: Fragment,
    residues: BTreeMap<char, Fragment>,
    complements: Option<HashMap<char, char>>,
}

impl AbbreviationTable {
    pub(crate) fn from_json(file_name: &str, text: &str) -> Result<Self> {
        let parsed_table: AbbreviationsJson = serde_json::from_str(text)
            .map_err(|e| DatabaseError::syntax(file_name, text, &e))?;

        let mut groups = HashMap::with_capacity(parsed_table.groups.len());
        for GroupJson {
            abbreviation,
            formula,
        } in parsed_table.groups
        {
            if !is_symbol(&abbreviation) {
                return Err(DatabaseError::InvalidAbbreviation(abbreviation).into());
            }
            let atoms = fragment(&abbreviation, &formula)?;
            if groups.insert(abbreviation.clone(), atoms).is_some() {
                return Err(DatabaseError::DuplicateAbbreviation(abbreviation).into());
            }
        }

        let mut polymers: Vec<Polymer> = Vec::with_capacity(parsed_table.polymers.len());
        for polymer in parsed_table.polymers {
            let polymer = Polymer::try_from(polymer)?;
            if polymers.iter().any(|p| p.name == polymer.name) {
                return Err(DatabaseError::DuplicatePolymer(polymer.name).into());
            }
            polymers.push(polymer);
        }

        let table = Self { groups, polymers };
        debug!(
            groups = table.groups.len(),
            polymers = table.polymers.len(),
            "loaded abbreviations {file_name:?}"
        );
        Ok(table)
    }

    pub(crate) fn group(&self, abbreviation: &str) -> Option<&Fragment> {
        self.groups.get(abbreviation)
    }

    /// Finds the polymer that a sequence function (like `peptide` or `dsdna`) refers to. Polymers with complementary
    /// residues are named with an `ss` or `ds` prefix, for single or double strands
    pub(crate) fn polymer(&self, name: &str) -> Option<(&Polymer, Strands)> {
        self.polymers.iter().find_map(|polymer| {
            if polymer.complements.is_none() {
                return (name == polymer.name).then_some((polymer, Strands::Single));
            }
            match name.split_at_checked(2) {
                Some(("ss", rest)) if rest == polymer.name => Some((polymer, Strands::Single)),
                Some(("ds", rest)) if rest == polymer.name => Some((polymer, Strands::Double)),
                _ => None,
            }
        })
    }

    /// Reads a formula made only of residue letters (like `GGA` or `ATCG`) as a single strand of the first polymer
    /// that can spell it out, provided it's longer than one residue and contains one of that polymer's markers
    pub(crate) fn detect(&self, sequence: &str) -> Option<(&Polymer, ResidueCounts)> {
        if sequence.chars().filter(|&c| c != ' ').nth(1).is_none() {
            return None;
        }
        self.polymers.iter().find_map(|polymer| {
            let counts = polymer.count(sequence, Strands::Single).ok()?;
            let marked = counts.keys().any(|r| polymer.markers.contains(r));
            marked.then_some((polymer, counts))
        })
    }
}

impl Default for AbbreviationTable {
    fn default() -> Self {
        // SAFETY: The bundled table is checked by the tests in this module, so loading it can't fail
        Self::from_json("abbreviations.json", DEFAULT_JSON).unwrap()
    }
}

impl Polymer {
    /// Counts the residues of a sequence (skipping spaces), adding the complementary strand if there are two.
    /// Returns the byte offset and character of the first unknown residue on failure
    pub(crate) fn count(
        &self,
        sequence: &str,
        strands: Strands,
    ) -> Result<ResidueCounts, (usize, char)> {
        let mut counts = ResidueCounts::new();
        for (offset, residue) in sequence.char_indices().filter(|&(_, c)| c != ' ') {
            if !self.residues.contains_key(&residue) {
                return Err((offset, residue));
            }
            *counts.entry(residue).or_default() += 1;

            if let (Strands::Double, Some(complements)) = (strands, &self.complements) {
                // NOTE: Every residue was checked for a complement when the table was loaded
                if let Some(&complement) = complements.get(&residue) {
                    *counts.entry(complement).or_default() += 1;
                }
            }
        }
        Ok(counts)
    }

    pub(crate) fn residue(&self, residue: char) -> Option<&Fragment> {
        self.residues.get(&residue)
    }

    pub(crate) const fn ends(&self) -> &Fragment {
        &self.ends
    }
}

// JSON File Schema ====================================================================================================

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct AbbreviationsJson {
    groups: Vec<GroupJson>,
    #[serde(default)]
    polymers: Vec<PolymerJson>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct GroupJson {
    abbreviation: String,
    formula: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PolymerJson {
    name: String,
    markers: String,
    ends: String,
    residues: BTreeMap<String, String>,
    complements: Option<BTreeMap<String, String>>,
}

// Conversion From Parsed JSON to Internal Representation ==============================================================

impl TryFrom<PolymerJson> for Polymer {
    type Error = DatabaseError;

    fn try_from(
        PolymerJson {
            name,
            markers,
            ends,
            residues,
            complements,
        }: PolymerJson,
    ) -> Result<Self, Self::Error> {
        if name.is_empty() || !name.chars().all(|c| c.is_ascii_lowercase()) {
            return Err(DatabaseError::InvalidPolymerName(name));
        }

        let residue = |r: &str| {
            let mut chars = r.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) if c.is_ascii_uppercase() => Ok(c),
                _ => Err(DatabaseError::InvalidResidue(name.clone(), r.to_owned())),
            }
        };

        let residues = residues
            .iter()
            .map(|(r, formula)| -> Result<_, DatabaseError> {
                Ok((residue(r)?, fragment(r, formula)?))
            })
            .collect::<Result<BTreeMap<_, _>, _>>()?;
        let known = |r: char| {
            if residues.contains_key(&r) {
                Ok(r)
            } else {
                Err(DatabaseError::InvalidResidue(name.clone(), r.to_string()))
            }
        };

        let markers = markers.chars().map(&known).collect::<Result<Vec<_>, _>>()?;
        let complements = complements
            .map(|pairs| {
                pairs
                    .iter()
                    .map(|(r, c)| -> Result<_, DatabaseError> {
                        Ok((known(residue(r)?)?, known(residue(c)?)?))
                    })
                    .collect::<Result<HashMap<_, _>, _>>()
            })
            .transpose()?;

        let unpaired = complements
            .as_ref()
            .and_then(|pairs| residues.keys().find(|r| !pairs.contains_key(r)));
        if let Some(&unpaired) = unpaired {
            return Err(DatabaseError::UnpairedResidue(name, unpaired));
        }

        let ends = fragment(&name, &ends)?;
        Ok(Self {
            name,
            markers,
            ends,
            residues,
            complements,
        })
    }
}

/// Fragment = uppercase , { lowercase } , [ Count ] , { uppercase , { lowercase } , [ Count ] } ;
fn fragment(name: &str, formula: &str) -> Result<Fragment, DatabaseError> {
    let symbol = recognize(pair(uppercase, many0(lowercase)));
    let mut parser = all_consuming(many1(pair(symbol, opt(count))));
    let (_, atoms) = parser(formula)
        .map_err(|_| DatabaseError::InvalidFragment(name.to_owned(), formula.to_owned()))?;
    Ok(atoms
        .into_iter()
        .map(|(symbol, count)| (symbol.to_owned(), count.unwrap_or_default()))
        .collect())
}

fn is_symbol(abbreviation: &str) -> bool {
    let mut chars = abbreviation.chars();
    chars.next().is_some_and(|c| c.is_ascii_uppercase()) && chars.all(|c| c.is_ascii_lowercase())
}

// Module Tests ========================================================================================================

#[cfg(test)]
mod tests {
    use indoc::indoc;

    use super::*;
    use crate::errors::IsochemError;

    const PEPTIDE: &str = indoc! {r#"
        {
          "groups": [
            { "abbreviation": "Me", "formula": "CH3" }
          ],
          "polymers": [
            {
              "name": "peptide",
              "markers": "G",
              "ends": "H2O",
              "residues": { "A": "C3H5NO", "G": "C2H3NO" }
            }
          ]
        }
    "#};

    const DNA: &str = indoc! {r#"
        {
          "groups": [],
          "polymers": [
            {
              "name": "dna",
              "markers": "AGT",
              "ends": "H2O",
              "residues": { "A": "C10H12N5O5P", "C": "C9H12N3O6P", "G": "C10H12N5O6P", "T": "C10H13N2O7P" },
              "complements": { "A": "T", "C": "G", "G": "C", "T": "A" }
            }
          ]
        }
    "#};

    fn table_error(json: &str) -> DatabaseError {
        match *AbbreviationTable::from_json("test", json).unwrap_err() {
            IsochemError::Database(error) => error,
            other => panic!("expected a database error, got {other:?}"),
        }
    }

    fn atoms(fragment: &Fragment) -> Vec<String> {
        fragment.iter().map(|(symbol, count)| format!("{symbol}{count}")).collect()
    }

    #[test]
    fn bundled_table() {
        let table = AbbreviationTable::default();
        assert_eq!(table.groups.len(), 112);
        assert_eq!(table.polymers.len(), 3);

        assert_eq!(atoms(table.group("Ph").unwrap()), ["C6", "H5"]);
        assert_eq!(atoms(table.group("Leu").unwrap()), ["C6", "H11", "N", "O"]);
        assert_eq!(atoms(table.group("Valohp").unwrap()), ["C5", "H8", "N", "O2"]);
        // Abbreviations are case-sensitive, and element symbols aren't abbreviations
        assert!(table.group("PH").is_none());
        assert!(table.group("C").is_none());
        assert!(table.group("Xx").is_none());
    }

    #[test]
    fn polymer_names() {
        let table = AbbreviationTable::default();
        let name = |n| table.polymer(n).map(|(polymer, strands)| (polymer.name.as_str(), strands));
        assert_eq!(name("peptide"), Some(("peptide", Strands::Single)));
        assert_eq!(name("ssdna"), Some(("dna", Strands::Single)));
        assert_eq!(name("dsdna"), Some(("dna", Strands::Double)));
        assert_eq!(name("ssrna"), Some(("rna", Strands::Single)));
        assert_eq!(name("dsrna"), Some(("rna", Strands::Double)));
        // Strands only make sense for polymers with complements
        assert_eq!(name("dna"), None);
        assert_eq!(name("sspeptide"), None);
        assert_eq!(name("dspeptide"), None);
        assert_eq!(name("protein"), None);
        assert_eq!(name("s"), None);
    }

    #[test]
    fn bare_sequences() {
        let table = AbbreviationTable::default();
        let detect = |s| table.detect(s).map(|(polymer, _)| polymer.name.as_str());
        assert_eq!(detect("ATC"), Some("dna"));
        assert_eq!(detect("AC"), Some("dna"));
        assert_eq!(detect("AUC"), Some("rna"));
        assert_eq!(detect("WQ"), Some("peptide"));
        assert_eq!(detect("GPAVL IMCFY WHKRQ NEDST"), Some("peptide"));
        // Sequences need more than one residue, and at least one marker
        assert_eq!(detect("A"), None);
        assert_eq!(detect(" G "), None);
        assert_eq!(detect("CC"), None);
        assert_eq!(detect("CH"), None);
        // And can't contain anything but residues
        assert_eq!(detect("H2O"), None);
        assert_eq!(detect("NaCl"), None);
        assert_eq!(detect("GGX"), None);
        assert_eq!(detect(""), None);
    }

    #[test]
    fn residue_counts() {
        let table = AbbreviationTable::default();
        let (dna, _) = table.polymer("ssdna").unwrap();
        let counts = |sequence, strands| {
            let counts = dna.count(sequence, strands)?;
            Ok::<_, (usize, char)>(counts.into_iter().collect::<Vec<_>>())
        };
        assert_eq!(
            counts("CGCG AATT CGCG", Strands::Single),
            Ok(vec![('A', 2), ('C', 4), ('G', 4), ('T', 2)])
        );
        // A second strand adds the complement of every residue
        assert_eq!(
            counts("AAC", Strands::Double),
            Ok(vec![('A', 2), ('C', 1), ('G', 1), ('T', 2)])
        );
        // Unknown residues are reported with their offset
        assert_eq!(counts("AT U", Strands::Single), Err((3, 'U')));
        assert_eq!(atoms(dna.ends()), ["H2", "O"]);
        assert_eq!(atoms(dna.residue('T').unwrap()), ["C10", "H13", "N2", "O7", "P"]);
        assert!(dna.residue('U').is_none());
    }

    #[test]
    fn minimal_tables() {
        let table = AbbreviationTable::from_json("test", PEPTIDE).unwrap();
        assert_eq!(atoms(table.group("Me").unwrap()), ["C", "H3"]);
        assert!(table.polymer("peptide").is_some());
        assert!(table.detect("GA").is_some());
        assert!(table.detect("AA").is_none());

        let table = AbbreviationTable::from_json("test", DNA).unwrap();
        assert!(table.group("Me").is_none());
        assert!(table.polymer("dsdna").is_some());
    }

    #[test]
    fn invalid_groups() {
        let json = PEPTIDE.replace(r#""Me""#, r#""me""#);
        assert!(matches!(
            table_error(&json),
            DatabaseError::InvalidAbbreviation(name) if name == "me"
        ));

        let json = PEPTIDE.replace(r#""CH3""#, r#""CH3+""#);
        assert!(matches!(
            table_error(&json),
            DatabaseError::InvalidFragment(name, formula) if name == "Me" && formula == "CH3+"
        ));

        let json = PEPTIDE.replace(r#""CH3""#, r#""(CH3)""#);
        assert!(matches!(table_error(&json), DatabaseError::InvalidFragment(..)));

        let methyl = r#"{ "abbreviation": "Me", "formula": "CH3" }"#;
        let json = PEPTIDE.replace(methyl, &format!("{methyl}, {methyl}"));
        assert!(matches!(
            table_error(&json),
            DatabaseError::DuplicateAbbreviation(name) if name == "Me"
        ));
    }

    #[test]
    fn invalid_polymers() {
        let json = PEPTIDE.replace(r#""A": "C3H5NO""#, r#""Ala": "C3H5NO""#);
        assert!(matches!(
            table_error(&json),
            DatabaseError::InvalidResidue(polymer, residue)
                if polymer == "peptide" && residue == "Ala"
        ));

        let json = PEPTIDE.replace(r#""markers": "G""#, r#""markers": "W""#);
        assert!(matches!(
            table_error(&json),
            DatabaseError::InvalidResidue(_, residue) if residue == "W"
        ));

        let json = PEPTIDE.replace(r#""ends": "H2O""#, r#""ends": "water""#);
        assert!(matches!(table_error(&json), DatabaseError::InvalidFragment(..)));

        let json = PEPTIDE.replace(r#""name": "peptide""#, r#""name": "Peptide""#);
        assert!(matches!(table_error(&json), DatabaseError::InvalidPolymerName(..)));

        let json = DNA.replace(r#""C": "G", "#, "");
        assert!(matches!(
            table_error(&json),
            DatabaseError::UnpairedResidue(polymer, 'C') if polymer == "dna"
        ));

        let json = DNA.replace(r#""T": "A""#, r#""T": "U""#);
        assert!(matches!(
            table_error(&json),
            DatabaseError::InvalidResidue(_, residue) if residue == "U"
        ));

        let polymer = indoc! {r#"
            { "name": "peptide", "markers": "G", "ends": "H2O", "residues": { "G": "C2H3NO" } }
        "#};
        let json = format!(r#"{{ "groups": [], "polymers": [{polymer}, {polymer}] }}"#);
        assert!(matches!(
            table_error(&json),
            DatabaseError::DuplicatePolymer(name) if name == "peptide"
        ));
    }

    #[test]
    fn unknown_fields() {
        let json = PEPTIDE.replace(r#""ends""#, r#""terminus""#);
        assert!(matches!(table_error(&json), DatabaseError::Syntax { .. }));
    }
}
