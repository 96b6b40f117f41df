// Standard Library Imports
use std::num::NonZeroU32;

// External Crate Imports
use ahash::{HashMap, HashMapExt};
use miette::SourceSpan;
use rust_decimal::{Decimal, prelude::ToPrimitive};
use tracing::trace;

// Local Crate Imports
use super::errors::{ValidationError, ValidationErrorKind};
use crate::{
    AtomicDatabase, Charge, Composition, Count, Element, FormulaNode, FormulaTree, MassNumber,
    Massive, MixtureConfig, Part, Particle,
};

/// `D` is shorthand for deuterium, which is stored in the database as `[2H]`
const DEUTERIUM: (&str, &str) = ("D", "H");
// SAFETY: 2 is non-zero, so this can never panic
const DEUTERIUM_MASS_NUMBER: MassNumber = MassNumber(NonZeroU32::new(2).unwrap());

// Public API ==========================================================================================================

/// Flattens a parsed formula into a validated composition, multiplying through every group and summing repeated
/// atoms
///
/// # Errors
///
/// Returns a [`ValidationError`] pointing at the part of the formula that names an unknown element or isotope, or if
/// the formula contains no atoms, has a fractional net charge, or has counts too large to represent
pub fn resolve<'a>(
    db: &'a AtomicDatabase,
    tree: &FormulaTree,
) -> Result<Composition<'a>, ValidationError> {
    resolve_with_config(db, tree, &MixtureConfig::default())
}

/// Like [`resolve`], but with control over how the weights of mixtures are converted into counts
///
/// # Errors
///
/// See [`resolve`], which additionally fails if the weights of a mixture sum to zero
pub fn resolve_with_config<'a>(
    db: &'a AtomicDatabase,
    tree: &FormulaTree,
    config: &MixtureConfig,
) -> Result<Composition<'a>, ValidationError> {
    let mut resolver = Resolver::new(db, tree);
    if let FormulaNode::Mixture(parts) = tree.root() {
        let counts = mixture_counts(db, tree, parts, config)?;
        for (part, count) in parts.iter().zip(counts) {
            resolver.node(&part.formula, count)?;
        }
    } else {
        resolver.node(tree.root(), Count::ONE)?;
    }
    let composition = resolver.finish()?;
    trace!(formula = tree.source(), "resolved to {composition}");
    Ok(composition)
}

// Composition Resolution ==============================================================================================

type AtomKey<'a> = (&'a str, Option<MassNumber>);

struct Resolver<'a, 't, 's> {
    db: &'a AtomicDatabase,
    tree: &'t FormulaTree<'s>,
    atoms: HashMap<AtomKey<'a>, (Element<'a>, Count)>,
    charge: Decimal,
}

impl<'a, 't, 's> Resolver<'a, 't, 's> {
    fn new(db: &'a AtomicDatabase, tree: &'t FormulaTree<'s>) -> Self {
        Self {
            db,
            tree,
            atoms: HashMap::new(),
            charge: Decimal::ZERO,
        }
    }

    fn node(&mut self, node: &FormulaNode<'s>, multiplier: Count) -> Result<(), ValidationError> {
        match node {
            FormulaNode::Atom(atom) => {
                let element = match (atom.symbol, atom.mass_number) {
                    (symbol, None) if symbol == DEUTERIUM.0 => {
                        Element::new_isotope(self.db, DEUTERIUM.1, DEUTERIUM_MASS_NUMBER)
                    }
                    (symbol, Some(mass_number)) => {
                        Element::new_isotope(self.db, symbol, mass_number)
                    }
                    (symbol, None) => Element::new(self.db, symbol),
                }
                .map_err(|e| error_at(self.tree, atom.text, e))?;

                let tree = self.tree;
                let overflow = || {
                    let kind = ValidationErrorKind::Overflow(format!("the count of {element}"));
                    error_at(tree, atom.text, kind)
                };
                let count = atom.count.checked_mul(multiplier).ok_or_else(overflow)?;
                let key = (element.symbol(), element.mass_number());
                let (_, total) = self.atoms.entry(key).or_insert((element, Count::ZERO));
                *total = total.checked_add(count).ok_or_else(overflow)?;
            }
            FormulaNode::Group(group) => {
                let text = group.text;
                let multiplier = group.multiplier.checked_mul(multiplier).ok_or_else(|| {
                    let kind = ValidationErrorKind::Overflow(format!("the count of {text}"));
                    error_at(self.tree, text, kind)
                })?;
                if let Some(charge) = group.charge {
                    self.add_charge(charge, multiplier, group.text)?;
                }
                for child in &group.children {
                    self.node(child, multiplier)?;
                }
            }
            FormulaNode::Charge(charge) => {
                self.add_charge(*charge, multiplier, self.tree.source())?;
            }
            // NOTE: The parser only ever produces mixtures at the root of a formula
            FormulaNode::Mixture(parts) => {
                for part in parts {
                    self.node(&part.formula, multiplier)?;
                }
            }
        }
        Ok(())
    }

    fn add_charge(
        &mut self,
        charge: Charge,
        multiplier: Count,
        text: &str,
    ) -> Result<(), ValidationError> {
        let multiplier: Decimal = multiplier.into();
        self.charge = Decimal::from(charge.0)
            .checked_mul(multiplier)
            .and_then(|c| self.charge.checked_add(c))
            .ok_or_else(|| {
                let kind = ValidationErrorKind::Overflow("the net charge".to_owned());
                error_at(self.tree, text, kind)
            })?;
        Ok(())
    }

    fn finish(self) -> Result<Composition<'a>, ValidationError> {
        let Self {
            db,
            tree,
            atoms,
            charge,
        } = self;

        let charge = charge.normalize();
        if !charge.fract().is_zero() {
            return Err(whole_formula_error(tree, ValidationErrorKind::FractionalCharge(charge)));
        }
        let charge = charge.to_i64().map(Charge).ok_or_else(|| {
            whole_formula_error(tree, ValidationErrorKind::Overflow("the net charge".to_owned()))
        })?;

        let mut atoms: Vec<_> = atoms
            .into_values()
            .filter(|(_, count)| !count.is_zero())
            .collect();
        if atoms.is_empty() {
            return Err(whole_formula_error(tree, ValidationErrorKind::NoAtoms));
        }
        if !super::masses_fit(&atoms) {
            let kind = ValidationErrorKind::Overflow("the total mass".to_owned());
            return Err(whole_formula_error(tree, kind));
        }
        super::hill_sort(&mut atoms);

        // NOTE: The electron is only needed (and so only looked up) to correct the masses of ions
        let electron = if charge.is_zero() {
            None
        } else {
            let electron = Particle::electron(db).map_err(|e| whole_formula_error(tree, e))?;
            Some(electron)
        };

        Ok(Composition {
            atoms,
            charge,
            electron,
        })
    }
}

fn error_at(
    tree: &FormulaTree,
    text: &str,
    kind: impl Into<ValidationErrorKind>,
) -> ValidationError {
    ValidationError::new(tree.source(), tree.span_of(text), kind)
}

fn whole_formula_error(
    tree: &FormulaTree,
    kind: impl Into<ValidationErrorKind>,
) -> ValidationError {
    let span = SourceSpan::new(0.into(), tree.source().len());
    ValidationError::new(tree.source(), span, kind)
}

// Mixture Weights =====================================================================================================

/// Converts the relative weights of a mixture's parts into the smallest whole-number counts that reproduce them
fn mixture_counts(
    db: &AtomicDatabase,
    tree: &FormulaTree,
    parts: &[Part],
    config: &MixtureConfig,
) -> Result<Vec<Count>, ValidationError> {
    let overflow = || {
        let kind = ValidationErrorKind::Overflow("a mixture weight".to_owned());
        whole_formula_error(tree, kind)
    };

    let total_weight = parts
        .iter()
        .try_fold(Decimal::ZERO, |sum, part| sum.checked_add(part.weight))
        .ok_or_else(overflow)?;
    if total_weight.is_zero() {
        return Err(whole_formula_error(tree, ValidationErrorKind::MixtureWeights));
    }

    // NOTE: Every part must be a valid formula in its own right, and its mass converts weight into an amount
    let mut amounts = Vec::with_capacity(parts.len());
    for part in parts {
        let mut resolver = Resolver::new(db, tree);
        resolver.node(&part.formula, Count::ONE)?;
        let mass: Decimal = resolver
            .finish()
            .map_err(|e| match e.kind() {
                ValidationErrorKind::NoAtoms => {
                    error_at(tree, part.text, ValidationErrorKind::NoAtoms)
                }
                _ => e,
            })?
            .average_mass()
            .into();
        let amount = total_weight
            .checked_mul(mass)
            .and_then(|d| part.weight.checked_div(d))
            .ok_or_else(overflow)?;
        amounts.push(amount);
    }

    // NOTE: Parts with a weight of zero end up with a count of zero, so they're left out of the scaling
    let smallest = amounts
        .iter()
        .copied()
        .filter(|a| a.is_sign_positive() && !a.is_zero())
        .min()
        .ok_or_else(|| whole_formula_error(tree, ValidationErrorKind::MixtureWeights))?;
    let amounts: Vec<_> = amounts
        .into_iter()
        .map(|a| a.checked_div(smallest).ok_or_else(overflow))
        .collect::<Result<_, _>>()?;

    let precision = config.precision * Decimal::from(parts.len());
    let mut best_error = Decimal::MAX;
    let mut factor = Decimal::ONE;
    for i in (1..config.max_count).map(Decimal::from) {
        let error: Decimal = amounts.iter().map(|a| (i * a - (i * a).round()).abs()).sum();
        if error < best_error {
            best_error = error;
            factor = i;
            if best_error < i * precision {
                break;
            }
        }
    }
    trace!(formula = tree.source(), %factor, %best_error, "converted mixture weights into counts");

    amounts
        .into_iter()
        .map(|a| Count::new((factor * a).round()).ok_or_else(overflow))
        .collect()
}

// Module Tests ========================================================================================================

#[cfg(test)]
mod tests {
    use std::sync::LazyLock;

    use rust_decimal_macros::dec;

    use super::*;
    use crate::{atoms::errors::AtomicLookupError, parse, testing_tools::assert_miette_snapshot};

    static DB: LazyLock<AtomicDatabase> = LazyLock::new(AtomicDatabase::default);

    fn composition(formula: &str) -> Composition<'static> {
        resolve(&DB, &parse(formula).unwrap()).unwrap()
    }

    fn counts(formula: &str) -> Vec<(String, String)> {
        composition(formula)
            .atoms()
            .iter()
            .map(|(element, count)| (element.to_string(), Decimal::from(*count).to_string()))
            .collect()
    }

    fn error(formula: &str) -> ValidationError {
        resolve(&DB, &parse(formula).unwrap()).unwrap_err()
    }

    macro_rules! assert_counts {
        ($formula:expr, [$(($element:expr, $count:expr)),* $(,)?]) => {
            let expected: Vec<(String, String)> =
                vec![$(($element.to_owned(), $count.to_owned())),*];
            assert_eq!(counts($formula), expected);
        };
    }

    #[test]
    fn simple_compositions() {
        assert_counts!("H2O", [("H", "2"), ("O", "1")]);
        assert_counts!("C8H10N4O2", [("C", "8"), ("H", "10"), ("N", "4"), ("O", "2")]);
        assert_counts!("NaCl", [("Cl", "1"), ("Na", "1")]);
        assert_counts!("Fe0.95O", [("Fe", "0.95"), ("O", "1")]);
    }

    #[test]
    fn repeated_atoms_are_summed() {
        assert_counts!("CH3COOH", [("C", "2"), ("H", "4"), ("O", "2")]);
        assert_counts!("HOH", [("H", "2"), ("O", "1")]);
        assert_eq!(composition("CH3COOH").atom_count(), Count::new(8).unwrap());
    }

    #[test]
    fn nested_multipliers() {
        assert_counts!("(CH3)3COH", [("C", "4"), ("H", "10"), ("O", "1")]);
        assert_counts!(
            "[(CH3)3Si2]2NNa",
            [("C", "6"), ("H", "18"), ("N", "1"), ("Na", "1"), ("Si", "4")]
        );
        assert_counts!("{[(H)2]3}4", [("H", "24")]);
        assert_counts!("(CH2)0.5", [("C", "0.5"), ("H", "1")]);
    }

    #[test]
    fn hydrates_and_multipliers() {
        assert_counts!("CuSO4.5H2O", [("Cu", "1"), ("H", "10"), ("O", "9"), ("S", "1")]);
        assert_counts!("CuSO4+5*H2O", [("Cu", "1"), ("H", "10"), ("O", "9"), ("S", "1")]);
        assert_counts!("2*H2O", [("H", "4"), ("O", "2")]);
        assert_eq!(composition("CuSO4.5H2O").atom_count(), Count::new(21).unwrap());
    }

    #[test]
    fn isotopes() {
        assert_counts!("[13C]O2", [("[13C]", "1"), ("O", "2")]);
        assert_counts!("13CO2", [("[13C]", "1"), ("O", "2")]);
        assert_counts!("C[13C]H4", [("C", "1"), ("[13C]", "1"), ("H", "4")]);
        assert_counts!("[13C]C[12C]", [("C", "1"), ("[12C]", "1"), ("[13C]", "1")]);
        // Deuterium is shorthand for hydrogen-2
        assert_counts!("D2O", [("[2H]", "2"), ("O", "1")]);
        assert_counts!("HDO", [("H", "1"), ("[2H]", "1"), ("O", "1")]);
        assert_counts!("[2H]DO", [("[2H]", "2"), ("O", "1")]);
    }

    #[test]
    fn zero_counts_are_dropped() {
        assert_counts!("(H)0C", [("C", "1")]);
        assert_counts!("C6H0", [("C", "6")]);
        assert_counts!("0*H2O.O", [("O", "1")]);
    }

    #[test]
    fn charges() {
        let charge = |formula| composition(formula).charge;
        assert_eq!(charge("H2O"), Charge::ZERO);
        assert_eq!(charge("H3O+"), Charge(1));
        assert_eq!(charge("SO4_2-"), Charge(-2));
        assert_eq!(charge("SO4-2"), Charge(-2));
        assert_eq!(charge("Ca++"), Charge(2));
        assert_eq!(charge("[SO4]2-"), Charge(-2));
        assert_eq!(charge("[Fe(CN)6]4-"), Charge(-4));
        // Group charges are multiplied through by any enclosing counts
        assert_eq!(charge("([SO4]2-)3"), Charge(-6));
        assert_eq!(charge("2*[NH4]+.[SO4]2-"), Charge::ZERO);
        assert_eq!(charge("[SO4]2_4-"), Charge(-4));
        assert_eq!(charge("([SO4]2-)0.5"), Charge(-1));
        // Only charged compositions carry an electron
        assert!(composition("H2O").electron.is_none());
        assert!(composition("H3O+").electron.is_some());
    }

    #[test]
    fn unknown_atoms() {
        let err = error("Xx2");
        assert_eq!(
            err.kind(),
            &ValidationErrorKind::Lookup(AtomicLookupError::Element("Xx".to_owned()))
        );
        assert_eq!(err.span(), SourceSpan::new(0.into(), 2));
        assert_eq!(err.offending_text(), "Xx");

        let err = error("CuSO4.5Xx2O");
        assert_eq!(err.span(), SourceSpan::new(7.into(), 2));

        let err = error("H2[3O]");
        assert!(matches!(err.kind(), ValidationErrorKind::Lookup(AtomicLookupError::Isotope(..))));
        assert_eq!(err.offending_text(), "[3O]");
        assert!(err.to_string().contains("[16, 17, 18]"));

        // Deuterium can't be given a mass number of its own
        let err = error("[2D]");
        assert!(matches!(err.kind(), ValidationErrorKind::Lookup(AtomicLookupError::Element(_))));

        // Unknown elements are caught even when they don't contribute any atoms
        assert!(matches!(error("(Xx)0C").kind(), ValidationErrorKind::Lookup(_)));
    }

    #[test]
    fn formulas_without_atoms() {
        for formula in ["()", "H0", "(H2O)0", "[]2-"] {
            let err = error(formula);
            assert_eq!(err.kind(), &ValidationErrorKind::NoAtoms, "{formula}");
            assert_eq!(err.span(), SourceSpan::new(0.into(), formula.len()));
        }
    }

    #[test]
    fn fractional_charges() {
        let err = error("([SO4]2-)0.25");
        assert_eq!(err.kind(), &ValidationErrorKind::FractionalCharge(dec!(-0.5)));
        assert_eq!(err.to_string(), "the net charge of the formula, -0.5, is not a whole number");
    }

    #[test]
    fn huge_counts() {
        let huge = format!("(H{0}){0}", "9".repeat(20));
        assert!(matches!(error(&huge).kind(), ValidationErrorKind::Overflow(_)));
    }

    #[test]
    fn order_independence() {
        let reference = composition("C2H5OH");
        for formula in ["HOC2H5", "OHHHHHHCC", "(OH)C2H5", "H5C2.OH"] {
            assert_eq!(composition(formula), reference, "{formula}");
        }
    }

    #[test]
    fn mixtures() {
        assert_eq!(composition("O: 0.26, 30Si: 0.74").to_string(), "O2[30Si]3");
        assert_eq!(composition("H: 0.112, O: 0.888").to_string(), "H2O");
        assert_eq!(composition("D: 0.2, O: 0.8").to_string(), "[2H]2O");
        assert_eq!(composition("H2O: 1 / D2O: 1").to_string(), "H20[2H]18O19");
        assert_eq!(composition("C: 1").to_string(), "C");
        // Parts with a weight of zero don't contribute any atoms
        assert_eq!(composition("C: 1, O: 0").to_string(), "C");
    }

    #[test]
    fn mixture_errors() {
        let err = error("C: 0, O: 0");
        assert_eq!(err.kind(), &ValidationErrorKind::MixtureWeights);

        let err = error("C: 1, (H)0: 1");
        assert_eq!(err.kind(), &ValidationErrorKind::NoAtoms);
        assert_eq!(err.offending_text(), "(H)0");

        let err = error("C: 1, Xx: 1");
        assert_eq!(err.offending_text(), "Xx");
    }

    #[test]
    fn mixture_configs() {
        let tree = parse("H: 0.112, O: 0.888").unwrap();
        // Without room to search for a better factor, the raw ratio is simply rounded
        let config = MixtureConfig::default().with_max_count(1);
        let composition = resolve_with_config(&DB, &tree, &config).unwrap();
        assert_eq!(composition.to_string(), "H2O");

        let tree = parse("O: 0.26, 30Si: 0.74").unwrap();
        let composition = resolve_with_config(&DB, &tree, &config).unwrap();
        assert_eq!(composition.to_string(), "O[30Si]2");
    }

    #[test]
    fn render_validation_errors() {
        assert_miette_snapshot!(resolve(&DB, &parse("CH3Xx").unwrap()), @r#"
          × the element "Xx" could not be found in the supplied atomic database
           ╭────
         1 │ CH3Xx
           ·    ─┬
           ·     ╰── unknown element
           ╰────
          help: double-check for typos, or add a new entry to the atomic database
        "#);
        assert_miette_snapshot!(resolve(&DB, &parse("(H)0").unwrap()), @r"
          × the formula doesn't contain any atoms
           ╭────
         1 │ (H)0
           · ──┬─
           ·   ╰── no atoms
           ╰────
          help: counts of zero remove atoms from a formula, so at least one atom needs
                a non-zero count
        ");
    }
}
