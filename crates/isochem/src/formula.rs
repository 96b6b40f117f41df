// Standard Library Imports
use std::fmt::{self, Display, Formatter};

// External Crate Imports
use miette::SourceSpan;
use nom::Offset;
use tracing::trace;

// Local Crate Imports
use crate::{
    Atom, BracketKind, Charge, Count, FormulaNode, FormulaTree, Group, Part,
    parsers::{
        self,
        errors::{LabeledParseError, ParseError, ParseErrorKind, final_parser},
    },
};

// Public API ==========================================================================================================

/// Parses a chemical formula into a syntax tree, without checking that any of its elements actually exist
///
/// # Errors
///
/// Returns a [`ParseError`] pointing at the first part of the formula that isn't valid syntax
pub fn parse(formula: &str) -> Result<FormulaTree<'_>, ParseError> {
    if formula.trim().is_empty() {
        let error = LabeledParseError::new(formula, ParseErrorKind::EmptyFormula);
        return Err(error.into_final_error(formula));
    }

    let root = final_parser(parsers::formula::formula)(formula)?;
    trace!(formula, "parsed {root:?}");
    Ok(FormulaTree {
        source: formula,
        root,
    })
}

impl<'s> FormulaTree<'s> {
    /// The formula text this tree was parsed from
    #[must_use]
    pub const fn source(&self) -> &'s str {
        self.source
    }

    #[must_use]
    pub const fn root(&self) -> &FormulaNode<'s> {
        &self.root
    }

    // NOTE: `text` must be a slice of `self.source`, which is true of every slice stored in the tree
    pub(crate) fn span_of(&self, text: &str) -> SourceSpan {
        SourceSpan::new(self.source.offset(text).into(), text.len())
    }
}

// Formula Display =====================================================================================================

// NOTE: The `Display` impls here write formulas that parse back into the same tree, though not always in the way the
// user originally wrote them (`D` is left alone, but `13C` becomes `[13C]` and `CuSO4.5H2O` becomes `CuSO4.5*H2O`).
// Abbreviations and sequences are written out in full, so `Ph` becomes `(C6H5)`

impl Display for FormulaTree<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.root)
    }
}

impl Display for FormulaNode<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Atom(atom) => write!(f, "{atom}"),
            Self::Group(group) => write!(f, "{group}"),
            // NOTE: Multi-unit charges need the `_` so that their magnitude isn't mistaken for a count
            Self::Charge(charge) if charge.abs() > Charge(1) => write!(f, "_{charge}"),
            Self::Charge(charge) => write!(f, "{charge}"),
            Self::Mixture(parts) => {
                for (idx, part) in parts.iter().enumerate() {
                    if idx > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{part}")?;
                }
                Ok(())
            }
        }
    }
}

impl Display for Atom<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let Self { symbol, count, .. } = self;
        if let Some(mass_number) = self.mass_number {
            write!(f, "[{mass_number}{symbol}]{count}")
        } else {
            write!(f, "{symbol}{count}")
        }
    }
}

impl Display for Group<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let (open, close) = match self.bracket {
            Some(BracketKind::Round) => ("(", ")"),
            Some(BracketKind::Square) => ("[", "]"),
            Some(BracketKind::Curly) => ("{", "}"),
            None => ("", ""),
        };

        if self.bracket.is_none() && self.multiplier != Count::ONE {
            write!(f, "{}*", self.multiplier)?;
        }

        write!(f, "{open}")?;
        for (idx, child) in self.children.iter().enumerate() {
            // NOTE: Implicit groups are the terms of a sum, so they need re-joining, using `+` after a fractional count
            // like `2.5` that a `.` would otherwise extend
            if idx > 0 && is_term(child) {
                let join = if ends_in_fraction(&self.children[idx - 1]) { '+' } else { '.' };
                write!(f, "{join}")?;
            }
            write!(f, "{child}")?;
        }
        write!(f, "{close}")?;

        if self.bracket.is_some() {
            match self.charge {
                Some(charge) => write!(f, "{charge}")?,
                None => write!(f, "{}", self.multiplier)?,
            }
        }
        Ok(())
    }
}

fn is_term(node: &FormulaNode) -> bool {
    matches!(node, FormulaNode::Group(Group { bracket: None, .. }))
}

/// Whether the text of `node` ends with a fractional count above one, like `1.5`
fn ends_in_fraction(node: &FormulaNode) -> bool {
    match node {
        FormulaNode::Atom(atom) => atom.count.needs_brackets(),
        FormulaNode::Group(group) if group.bracket.is_none() => {
            group.children.last().is_some_and(ends_in_fraction)
        }
        FormulaNode::Group(group) => group.charge.is_none() && group.multiplier.needs_brackets(),
        _ => false,
    }
}

impl Display for Part<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.formula, self.weight)
    }
}

// Module Tests ========================================================================================================
