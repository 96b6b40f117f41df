// External Crate Imports
use nom::{
    Offset,
    branch::alt,
    character::complete::{char, one_of, space0},
    combinator::{consumed, cut, eof, map, opt, peek, recognize},
    multi::{many0, many1, separated_list1},
    sequence::{delimited, pair, preceded, terminated, tuple},
};

// Local Crate Imports
use super::{
    abbreviations::{ABBREVIATIONS, Fragment, Polymer, ResidueCounts, Strands},
    errors::{LabeledParseError, ParseErrorKind, ParseResult, expect, failure, wrap_err},
    primitives::{
        count, lowercase, magnitude, mass_number, multiplier, sign, signs, unit_start, uppercase,
        weight,
    },
};
use crate::{Atom, BracketKind, Charge, Count, FormulaNode, Group, Part};

/// The deepest that brackets can be nested before parsing gives up
pub const MAX_DEPTH: usize = 64;

// Public API ==========================================================================================================

/// Formula = Mixture | Residues | Sum , [ Charge ] ;
pub fn formula(i: &str) -> ParseResult<FormulaNode> {
    // NOTE: Only mixtures contain colons, so this saves backtracking over (potentially very long) sums
    if i.contains(':') {
        mixture(i)
    } else if let Some((polymer, counts)) = ABBREVIATIONS.detect(i) {
        // NOTE: Formulas made only of residue letters (like `GGA` or `ATCG`) are single-stranded polymers
        let node = polymer_node(polymer, Strands::Single, &counts, i, Count::ONE, i);
        Ok(("", node))
    } else {
        charged_sum(i)
    }
}

// Private Sub-Parsers =================================================================================================

fn charged_sum(i: &str) -> ParseResult<FormulaNode> {
    let (rest, (text, (mut children, charge))) = consumed(pair(|i| sum(i, 0), opt(charge)))(i)?;
    children.extend(charge.map(FormulaNode::Charge));
    let root = Group {
        bracket: None,
        children,
        multiplier: Count::ONE,
        charge: None,
        text,
    };
    Ok((rest, FormulaNode::Group(root)))
}

/// Mixture = Part , { ( "," | "/" ) , Part } ;
fn mixture(i: &str) -> ParseResult<FormulaNode> {
    let separator = delimited(space0, one_of(",/"), space0);
    let parts = separated_list1(separator, part);
    map(delimited(space0, parts, space0), FormulaNode::Mixture)(i)
}

/// Part = Sequence , ":" , Weight ;
fn part(i: &str) -> ParseResult<Part> {
    let formula = consumed(|i| sequence(i, 0, true));
    let colon = expect(
        delimited(space0, char(':'), space0),
        ParseErrorKind::ExpectedWeightSeparator,
    );
    let parser = map(
        tuple((formula, cut(colon), cut(weight))),
        |((text, children), _, weight)| {
            let formula = FormulaNode::Group(Group {
                bracket: None,
                children,
                multiplier: Count::ONE,
                charge: None,
                text,
            });
            Part {
                formula,
                weight,
                text,
            }
        },
    );
    wrap_err(parser, ParseErrorKind::ExpectedPart)(i)
}

// ---------------------------------------------------------------------------------------------------------------------

struct Term<'s> {
    multiplier: Option<Count>,
    units: Vec<FormulaNode<'s>>,
    text: &'s str,
}

/// Sum = Leading Term , { ( "." | "+" ) , Term } ;
fn sum(i: &str, depth: usize) -> ParseResult<Vec<FormulaNode>> {
    let (rest, first) = leading_term(i, depth)?;
    let (rest, others) = many0(preceded(one_of(".+"), |i| term(i, depth)))(rest)?;

    // NOTE: A lone term doesn't need wrapping, but joined or multiplied terms are kept apart as implicit groups
    if others.is_empty() && first.multiplier.is_none() {
        return Ok((rest, first.units));
    }
    let terms = [first].into_iter().chain(others);
    let groups = terms
        .map(|Term { multiplier, units, text }| {
            FormulaNode::Group(Group {
                bracket: None,
                children: units,
                multiplier: multiplier.unwrap_or_default(),
                charge: None,
                text,
            })
        })
        .collect();
    Ok((rest, groups))
}

/// Leading Term = [ Multiplier ] , Sequence ;
fn leading_term(i: &str, depth: usize) -> ParseResult<Term> {
    let (rest, multiplier) = opt(multiplier)(i)?;
    // NOTE: Without an explicit `*`, digits at the start of a formula are a mass number (like 13CO2)
    let (rest, units) = sequence(rest, depth, multiplier.is_none())?;
    let text = &i[..i.offset(rest)];
    Ok((
        rest,
        Term {
            multiplier,
            units,
            text,
        },
    ))
}

/// Term = [ Multiplier | Count ] , Sequence ;
fn term(i: &str, depth: usize) -> ParseResult<Term> {
    let (rest, multiplier) = opt(alt((multiplier, count)))(i)?;
    let (rest, units) = sequence(rest, depth, false)?;
    let text = &i[..i.offset(rest)];
    Ok((
        rest,
        Term {
            multiplier,
            units,
            text,
        },
    ))
}

/// Sequence = ( Prefixed Atom | Unit ) , { Unit } ;
fn sequence(i: &str, depth: usize, isotope_prefix: bool) -> ParseResult<Vec<FormulaNode>> {
    let (rest, first) = if isotope_prefix {
        alt((|i| unit(i, depth), prefixed_atom))(i)?
    } else {
        unit(i, depth)?
    };
    let (rest, others) = many0(|i| unit(i, depth))(rest)?;
    let units = [first].into_iter().chain(others).collect();
    Ok((rest, units))
}

/// Unit = Isotope | Group | Polymer | Abbreviation | Atom ;
fn unit(i: &str, depth: usize) -> ParseResult<FormulaNode> {
    let parser = alt((isotope, |i| group(i, depth), polymer, abbreviation, atom));
    expect(parser, ParseErrorKind::ExpectedUnit)(i)
}

// ---------------------------------------------------------------------------------------------------------------------

/// Atom = Symbol , [ Count ] ;
fn atom(i: &str) -> ParseResult<FormulaNode> {
    let (rest, (text, symbol)) = consumed(symbol)(i)?;
    let (rest, count) = opt(count)(rest)?;
    let atom = Atom {
        symbol,
        mass_number: None,
        count: count.unwrap_or_default(),
        text,
    };
    Ok((rest, FormulaNode::Atom(atom)))
}

/// Prefixed Atom = Mass Number , Symbol , [ Count ] ;
fn prefixed_atom(i: &str) -> ParseResult<FormulaNode> {
    let (rest, (text, (mass_number, symbol))) = consumed(pair(mass_number, symbol))(i)?;
    let (rest, count) = opt(count)(rest)?;
    let atom = Atom {
        symbol,
        mass_number: Some(mass_number),
        count: count.unwrap_or_default(),
        text,
    };
    Ok((rest, FormulaNode::Atom(atom)))
}

// NOTE: These are not meant to be links, it's just EBNF
#[allow(clippy::doc_link_with_quotes)]
/// Isotope = "[" , Mass Number , Symbol , "]" , [ Count ] ;
fn isotope(i: &str) -> ParseResult<FormulaNode> {
    let closing_bracket = expect(char(']'), ParseErrorKind::ExpectedIsotopeEnd);
    let label = delimited(char('['), pair(mass_number, symbol), closing_bracket);
    let (rest, (text, (mass_number, symbol))) = consumed(label)(i)?;
    let (rest, count) = opt(count)(rest)?;
    let atom = Atom {
        symbol,
        mass_number: Some(mass_number),
        count: count.unwrap_or_default(),
        text,
    };
    Ok((rest, FormulaNode::Atom(atom)))
}

/// Abbreviation = Symbol , [ Count ] ;
fn abbreviation(i: &str) -> ParseResult<FormulaNode> {
    let (rest, text) = symbol(i)?;
    let Some(atoms) = ABBREVIATIONS.group(text) else {
        return Err(nom::Err::Error(LabeledParseError::new(i, ParseErrorKind::ExpectedUnit)));
    };
    let (rest, count) = opt(count)(rest)?;
    let group = Group {
        bracket: Some(BracketKind::Round),
        children: expand(atoms, text),
        multiplier: count.unwrap_or_default(),
        charge: None,
        text: &i[..i.offset(rest)],
    };
    Ok((rest, FormulaNode::Group(group)))
}

/// Symbol = uppercase , { lowercase } ;
fn symbol(i: &str) -> ParseResult<&str> {
    let parser = recognize(pair(uppercase, many0(lowercase)));
    wrap_err(parser, ParseErrorKind::ExpectedElementSymbol)(i)
}

// ---------------------------------------------------------------------------------------------------------------------

// NOTE: These are not meant to be links, it's just EBNF
#[allow(clippy::doc_link_with_quotes)]
/// Group = ( "(" , [ Sum ] , ")" | "{" , [ Sum ] , "}" ) , [ Count ]
///       | "[" , [ Sum ] , "]" , ( Group Charge | [ Count ] )
///       ;
fn group(i: &str, depth: usize) -> ParseResult<FormulaNode> {
    let (body, open) = one_of("([{")(i)?;
    if depth >= MAX_DEPTH {
        return failure(i, 1, ParseErrorKind::NestingTooDeep(MAX_DEPTH));
    }

    let (bracket, close) = match open {
        '(' => (BracketKind::Round, ')'),
        '[' => (BracketKind::Square, ']'),
        _ => (BracketKind::Curly, '}'),
    };

    let (rest, children) = opt(|i| sum(i, depth + 1))(body)?;
    let Some(rest) = rest.strip_prefix(close) else {
        let length = rest.chars().next().map_or(0, |c| c.len_utf8());
        return failure(rest, length, ParseErrorKind::unexpected(rest, Some(close)));
    };

    let mut multiplier = map(opt(count), |c| (c.unwrap_or_default(), None));
    let (rest, (multiplier, charge)) = if bracket == BracketKind::Square {
        // NOTE: A charge after a closing square bracket can't run straight into another unit, like `[NH4]+Cl-`
        if let Ok((_, (signs, _))) = peek(pair(recognize(charge_signs), unit_start))(rest) {
            return failure(rest, signs.len(), ParseErrorKind::MisplacedCharge);
        }
        let charge = map(group_charge, |c| (Count::ONE, Some(c)));
        alt((charge, multiplier))(rest)?
    } else {
        multiplier(rest)?
    };

    let group = Group {
        bracket: Some(bracket),
        children: children.unwrap_or_default(),
        multiplier,
        charge,
        text: &i[..i.offset(rest)],
    };
    Ok((rest, FormulaNode::Group(group)))
}

// ---------------------------------------------------------------------------------------------------------------------

/// Polymer = lowercase , { lowercase } , "(" , { letter | " " } , ")" , [ Count ] ;
fn polymer(i: &str) -> ParseResult<FormulaNode> {
    let (body, name) = terminated(recognize(many1(lowercase)), char('('))(i)?;
    let Some((polymer, strands)) = ABBREVIATIONS.polymer(name) else {
        return failure(i, name.len(), ParseErrorKind::UnknownPolymer(name.to_owned()));
    };

    let end = body
        .find(|c: char| !c.is_ascii_alphabetic() && c != ' ')
        .unwrap_or(body.len());
    let (residues, rest) = body.split_at(end);
    let Some(rest) = rest.strip_prefix(')') else {
        let length = rest.chars().next().map_or(0, |c| c.len_utf8());
        return failure(rest, length, ParseErrorKind::unexpected(rest, Some(')')));
    };

    let counts = match polymer.count(residues, strands) {
        Ok(counts) => counts,
        Err((offset, residue)) => {
            let kind = ParseErrorKind::UnknownResidue {
                residue,
                polymer: name.to_owned(),
            };
            return failure(&residues[offset..], residue.len_utf8(), kind);
        }
    };

    let (rest, count) = opt(count)(rest)?;
    let text = &i[..i.offset(rest)];
    let multiplier = count.unwrap_or_default();
    let node = polymer_node(polymer, strands, &counts, residues, multiplier, text);
    Ok((rest, node))
}

/// Builds a bracketed group holding one group per residue (in alphabetical order) and the ends of each strand
fn polymer_node<'s>(
    polymer: &'static Polymer,
    strands: Strands,
    counts: &ResidueCounts,
    residues: &'s str,
    multiplier: Count,
    text: &'s str,
) -> FormulaNode<'s> {
    let bracketed = |children, multiplier| {
        FormulaNode::Group(Group {
            bracket: Some(BracketKind::Round),
            children,
            multiplier,
            charge: None,
            text: residues,
        })
    };

    let mut children: Vec<_> = counts
        .iter()
        .filter_map(|(&residue, &n)| {
            let atoms = polymer.residue(residue)?;
            Some(bracketed(expand(atoms, residues), Count::from(n)))
        })
        .collect();
    let ends = expand(polymer.ends(), residues);
    match strands {
        Strands::Single => children.extend(ends),
        Strands::Double => children.push(bracketed(ends, Count::from(2_u64))),
    }

    FormulaNode::Group(Group {
        bracket: Some(BracketKind::Round),
        children,
        multiplier,
        charge: None,
        text,
    })
}

/// Turns the atoms an abbreviation or residue stands for into nodes pointing back at the text that named them
fn expand<'s>(atoms: &'static Fragment, text: &'s str) -> Vec<FormulaNode<'s>> {
    atoms
        .iter()
        .map(|(symbol, count)| {
            FormulaNode::Atom(Atom {
                symbol,
                mass_number: None,
                count: *count,
                text,
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------------------------------------------------

/// Charge = "_" , ( Magnitude , Sign | Signs ) | Sign , Magnitude | Signs ;
fn charge(i: &str) -> ParseResult<Charge> {
    let sign_magnitude = map(pair(sign, magnitude), |(Charge(s), n)| Charge(s * n));
    let underscored = preceded(char('_'), alt((magnitude_sign, signs)));
    // NOTE: Charges must come at the very end of a formula, otherwise a '+' is just joining two terms
    let parser = terminated(alt((underscored, sign_magnitude, signs)), eof);
    expect(parser, ParseErrorKind::ExpectedCharge)(i)
}

/// Group Charge = ( Magnitude , Sign | Signs ) , & ( ")" | "]" | "}" | "." | End ) ;
fn group_charge(i: &str) -> ParseResult<Charge> {
    let lookahead = peek(alt((eof, recognize(one_of(")]}.")))));
    let parser = terminated(charge_signs, lookahead);
    expect(parser, ParseErrorKind::ExpectedCharge)(i)
}

fn charge_signs(i: &str) -> ParseResult<Charge> {
    alt((magnitude_sign, signs))(i)
}

fn magnitude_sign(i: &str) -> ParseResult<Charge> {
    map(pair(magnitude, sign), |(n, Charge(s))| Charge(n * s))(i)
}

// Module Tests ========================================================================================================
