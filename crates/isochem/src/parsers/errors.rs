// Standard Library Imports
use std::{fmt::Display, mem};

// External Crate Imports
use miette::{Diagnostic, LabeledSpan, SourceCode, SourceSpan};
use nom::{
    Err, Finish, IResult, Offset, Parser,
    combinator::{all_consuming, complete},
    error::ErrorKind,
};
use thiserror::Error;

pub type ParseResult<'s, O> = IResult<&'s str, O, LabeledParseError<'s>>;

// Error Kinds =========================================================================================================

// NOTE: Public so that callers can programmatically inspect what went wrong, but marked #[non_exhaustive] so that new
// kinds of errors don't become a SemVer hazard
#[non_exhaustive]
#[derive(Clone, Eq, PartialEq, Debug, Diagnostic, Error)]
pub enum ParseErrorKind {
    #[diagnostic(help("try a formula like H2O, CuSO4.5H2O, [13C]O2, or [SO4]2-"))]
    #[error("the formula is empty")]
    EmptyFormula,

    #[error("expected an element (like Au), an isotope (like [15N]), or a bracketed group (like (OH)2)")]
    ExpectedUnit,

    #[error("expected an uppercase ASCII letter")]
    ExpectedUppercase,

    #[error("expected a lowercase ASCII letter")]
    ExpectedLowercase,

    #[error("expected an element symbol")]
    ExpectedElementSymbol,

    #[error("expected an isotopic mass number")]
    ExpectedMassNumber,

    #[error("expected ']' to close isotope brackets")]
    ExpectedIsotopeEnd,

    #[error("expected a count (like 2 or 0.5)")]
    ExpectedCount,

    #[diagnostic(help(
        "a leading 0 is only allowed before a decimal point, if you've mistakenly included a leading zero, like \
        NH02, try just NH2 instead"
    ))]
    #[error("counts cannot start with 0")]
    ExpectedNoLeadingZero,

    #[error("the number {0} is too large to be used as a count")]
    CountTooLarge(String),

    #[error("expected a charge (like +, 2-, or _3+)")]
    ExpectedCharge,

    #[diagnostic(help("every opening bracket needs a matching closing bracket of the same shape"))]
    #[error("expected '{0}' to close the group")]
    UnclosedBracket(char),

    #[diagnostic(help("groups must be closed with the same kind of bracket that opened them"))]
    #[error("expected '{expected}' to close the group, but found '{found}'")]
    MismatchedBracket { expected: char, found: char },

    #[diagnostic(help("remove this bracket, or add a matching opening bracket earlier in the formula"))]
    #[error("found '{0}' without a matching opening bracket")]
    UnexpectedCloser(char),

    #[error("the character {0:?} can't appear in a chemical formula")]
    InvalidCharacter(char),

    #[diagnostic(help(
        "charges can only be written at the very end of a formula (like H3O+ or PO4_3-), or directly after a \
        closing square bracket (like [SO4]2-)"
    ))]
    #[error("this charge is in the wrong place")]
    MisplacedCharge,

    #[diagnostic(help(
        "only addition is supported: terms can be joined with '.' or '+' (like CuSO4.5H2O), and negative charges \
        must come at the very end of the formula"
    ))]
    #[error("subtracting part of a formula is not supported")]
    Subtraction,

    #[diagnostic(help("try simplifying the formula by expanding some of the innermost brackets"))]
    #[error("groups can't be nested more than {0} levels deep")]
    NestingTooDeep(usize),

    #[diagnostic(help("sequences can be written as peptide(...), ssdna(...), dsdna(...), ssrna(...), or dsrna(...)"))]
    #[error("{0:?} isn't a known kind of polymer")]
    UnknownPolymer(String),

    #[diagnostic(help(
        "residues are written with their one-letter codes, like GPAV for amino acids or ACGT for deoxynucleotides"
    ))]
    #[error("{residue:?} isn't a residue of {polymer}")]
    UnknownResidue { residue: char, polymer: String },

    #[error("expected a mixture part, like O: 0.26")]
    ExpectedPart,

    #[error("expected a ':' between a formula and its relative weight")]
    ExpectedWeightSeparator,

    #[error("expected a numeric weight (like 0.74)")]
    ExpectedWeight,

    #[diagnostic(help(
        "this is an internal error that you shouldn't ever see! If you have gotten this error, then please report it \
        as a bug!"
    ))]
    #[error("internal `nom` error: {0:?}")]
    NomError(ErrorKind),

    #[diagnostic(help("check the unparsed region for errors, or remove it from the rest of the formula"))]
    #[error("could not interpret the full input as a valid chemical formula")]
    Incomplete,
}

impl ParseErrorKind {
    fn label(&self) -> Option<&'static str> {
        Some(match self {
            Self::EmptyFormula => "nothing to parse",
            Self::ExpectedUnit => "expected an atom or group",
            Self::ExpectedUppercase => "expected uppercase",
            Self::ExpectedLowercase => "expected lowercase",
            Self::ExpectedMassNumber => "expected a mass number",
            Self::ExpectedIsotopeEnd => "expected ']'",
            Self::ExpectedCount => "expected a count",
            Self::ExpectedNoLeadingZero => "leading zero",
            Self::CountTooLarge(_) => "count too large",
            Self::UnclosedBracket(_) => "unclosed group",
            Self::MismatchedBracket { .. } => "mismatched bracket",
            Self::UnexpectedCloser(_) => "unmatched bracket",
            Self::InvalidCharacter(_) => "invalid character",
            Self::MisplacedCharge => "misplaced charge",
            Self::Subtraction => "subtraction",
            Self::NestingTooDeep(_) => "too deeply nested",
            Self::UnknownPolymer(_) => "unknown polymer",
            Self::UnknownResidue { .. } => "unknown residue",
            Self::ExpectedWeightSeparator => "expected ':'",
            Self::ExpectedWeight => "expected a number",
            Self::NomError(_) => "the region that triggered this bug!",
            Self::Incomplete => "input was valid up until this point",
            _ => return None,
        })
    }

    /// Works out why parsing stopped at the start of `unparsed`, given the closing bracket (if any) that the parser
    /// was hoping to find there
    pub(crate) fn unexpected(unparsed: &str, expected_closer: Option<char>) -> Self {
        let Some(next) = unparsed.chars().next() else {
            return expected_closer.map_or(Self::Incomplete, Self::UnclosedBracket);
        };
        match (next, expected_closer) {
            ('-', _) => Self::Subtraction,
            (')' | ']' | '}', Some(expected)) => Self::MismatchedBracket {
                expected,
                found: next,
            },
            (')' | ']' | '}', None) => Self::UnexpectedCloser(next),
            ('_' | '+' | '^', _) => Self::MisplacedCharge,
            (c, _) if !is_formula_char(c) => Self::InvalidCharacter(c),
            (_, Some(expected)) => Self::UnclosedBracket(expected),
            (_, None) => Self::Incomplete,
        }
    }
}

fn is_formula_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || "()[]{}.+-*_".contains(c)
}

// User-Facing Errors ==================================================================================================

/// A syntax error in a chemical formula, pointing at the region of the formula that couldn't be parsed
#[derive(Clone, Eq, PartialEq, Debug, Error)]
#[error("{kind}")]
pub struct ParseError {
    // NOTE: Holds the formula followed by a single space, so that labels can point at the end of the input
    source_code: String,
    span: SourceSpan,
    labels: Vec<LabeledSpan>,
    kind: ParseErrorKind,
    #[source]
    source: Option<Box<ParseError>>,
}

impl ParseError {
    /// The formula that failed to parse
    #[must_use]
    pub fn formula(&self) -> &str {
        &self.source_code[..self.source_code.len() - 1]
    }

    #[must_use]
    pub const fn span(&self) -> SourceSpan {
        self.span
    }

    #[must_use]
    pub const fn kind(&self) -> &ParseErrorKind {
        &self.kind
    }

    /// The innermost error, which is the most specific description of what went wrong
    #[must_use]
    pub fn cause(&self) -> &Self {
        let mut error = self;
        while let Some(source) = &error.source {
            error = source;
        }
        error
    }

    /// The text of the formula at the root cause of the error (or the single character that parsing stopped at)
    #[must_use]
    pub fn offending_text(&self) -> &str {
        let cause = self.cause();
        let formula = self.formula();
        let start = cause.span.offset().min(formula.len());
        let end = if cause.span.is_empty() {
            formula[start..]
                .chars()
                .next()
                .map_or(start, |c| start + c.len_utf8())
        } else {
            start + cause.span.len()
        };
        &formula[start..end.min(formula.len())]
    }
}

impl Diagnostic for ParseError {
    fn help<'a>(&'a self) -> Option<Box<dyn Display + 'a>> {
        self.kind.help()
    }

    fn source_code(&self) -> Option<&dyn SourceCode> {
        Some(&self.source_code)
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        if self.labels.is_empty() {
            None
        } else {
            Some(Box::new(self.labels.iter().cloned()))
        }
    }

    fn diagnostic_source(&self) -> Option<&dyn Diagnostic> {
        self.source.as_deref().map(|e| e as &dyn Diagnostic)
    }
}

// Intermediate Parser Errors ==========================================================================================

#[derive(Clone, Eq, PartialEq, Debug)]
pub struct LabeledParseError<'s> {
    input: &'s str,
    length: usize,
    kind: ParseErrorKind,
    source: Option<Box<LabeledParseError<'s>>>,
}

impl<'s> LabeledParseError<'s> {
    pub(crate) fn new(input: &'s str, kind: ParseErrorKind) -> Self {
        Self {
            input,
            length: 0,
            kind,
            source: None,
        }
    }

    pub(crate) fn new_with_source(input: &'s str, kind: ParseErrorKind, source: Self) -> Self {
        Self {
            source: Some(Box::new(source)),
            ..Self::new(input, kind)
        }
    }

    pub(crate) fn with_length(self, length: usize) -> Self {
        Self { length, ..self }
    }

    /// How much input was left over when the innermost error occurred (less means the parser got further)
    fn unparsed_len(&self) -> usize {
        self.source
            .as_ref()
            .map_or(self.input.len(), |e| e.unparsed_len().min(self.input.len()))
    }

    pub(crate) fn into_final_error(self, full_input: &str) -> ParseError {
        let mut source = self.source.map(|e| Box::new(e.into_final_error(full_input)));
        let span = SourceSpan::new(full_input.offset(self.input).into(), self.length);

        // NOTE: Errors without labels of their own borrow the labels of their nearest labelled cause, so that the
        // outermost diagnostic still points at the problem
        let labels = match (self.kind.label(), &mut source) {
            (Some(label), _) => vec![LabeledSpan::new_with_span(Some(label.to_owned()), span)],
            (None, Some(source)) => mem::take(&mut source.labels),
            (None, None) => Vec::new(),
        };

        ParseError {
            source_code: format!("{full_input} "),
            span,
            labels,
            kind: self.kind,
            source,
        }
    }
}

impl<'s> nom::error::ParseError<&'s str> for LabeledParseError<'s> {
    fn from_error_kind(input: &'s str, kind: ErrorKind) -> Self {
        let kind = match kind {
            // NOTE: `all_consuming` reports leftover input as `Eof`, so work out why that input was left behind
            ErrorKind::Eof => ParseErrorKind::unexpected(input, None),
            kind => ParseErrorKind::NomError(kind),
        };
        Self::new(input, kind)
    }

    fn append(_input: &'s str, _kind: ErrorKind, other: Self) -> Self {
        other
    }

    // NOTE: Of two failed alternatives, the one that made it further through the input is the most informative
    fn or(self, other: Self) -> Self {
        if other.unparsed_len() < self.unparsed_len() {
            other
        } else {
            self
        }
    }
}

// Error-Wrapping Combinators ==========================================================================================

pub(crate) fn final_parser<'s, O, P>(parser: P) -> impl FnMut(&'s str) -> Result<O, ParseError>
where
    P: Parser<&'s str, O, LabeledParseError<'s>>,
{
    let mut parser = all_consuming(complete(parser));
    move |input| {
        parser
            .parse(input)
            .finish()
            .map(|(_, o)| o)
            .map_err(|e| e.into_final_error(input))
    }
}

/// Adds context to any error returned by `parser`, keeping the original error as its source
pub(crate) fn wrap_err<'s, O, P>(
    mut parser: P,
    kind: ParseErrorKind,
) -> impl FnMut(&'s str) -> ParseResult<'s, O>
where
    P: Parser<&'s str, O, LabeledParseError<'s>>,
{
    move |i| {
        parser
            .parse(i)
            .map_err(|e| e.map(|e| LabeledParseError::new_with_source(i, kind.clone(), e)))
    }
}

/// Replaces recoverable errors returned by `parser` with `kind`, leaving failures untouched
pub(crate) fn expect<'s, O, P>(
    mut parser: P,
    kind: ParseErrorKind,
) -> impl FnMut(&'s str) -> ParseResult<'s, O>
where
    P: Parser<&'s str, O, LabeledParseError<'s>>,
{
    move |i| match parser.parse(i) {
        Err(Err::Error(_)) => Err(Err::Error(LabeledParseError::new(i, kind.clone()))),
        result => result,
    }
}

/// Builds an unrecoverable error at `input`, stopping any surrounding alternatives from being tried
pub(crate) fn failure<'s, O>(
    input: &'s str,
    length: usize,
    kind: ParseErrorKind,
) -> ParseResult<'s, O> {
    Err(Err::Failure(
        LabeledParseError::new(input, kind).with_length(length),
    ))
}

// Module Tests ========================================================================================================

#[cfg(test)]
mod tests {
    use nom::error::ParseError as _;

    use super::*;

    #[test]
    fn unexpected_input() {
        use ParseErrorKind::*;
        assert_eq!(ParseErrorKind::unexpected("", None), Incomplete);
        assert_eq!(ParseErrorKind::unexpected("", Some(')')), UnclosedBracket(')'));
        assert_eq!(ParseErrorKind::unexpected("-H2O", None), Subtraction);
        assert_eq!(ParseErrorKind::unexpected(")", None), UnexpectedCloser(')'));
        assert_eq!(
            ParseErrorKind::unexpected("]", Some(')')),
            MismatchedBracket {
                expected: ')',
                found: ']'
            }
        );
        assert_eq!(ParseErrorKind::unexpected("_2-", None), MisplacedCharge);
        assert_eq!(ParseErrorKind::unexpected("$", None), InvalidCharacter('$'));
        assert_eq!(ParseErrorKind::unexpected(" H", None), InvalidCharacter(' '));
        assert_eq!(ParseErrorKind::unexpected(".", None), Incomplete);
        assert_eq!(ParseErrorKind::unexpected(".", Some('}')), UnclosedBracket('}'));
    }

    #[test]
    fn furthest_alternative_wins() {
        let input = "H2O$";
        let early = LabeledParseError::new(&input[1..], ParseErrorKind::ExpectedUnit);
        let late = LabeledParseError::new(&input[3..], ParseErrorKind::InvalidCharacter('$'));
        assert_eq!(early.clone().or(late.clone()), late);
        assert_eq!(late.clone().or(early.clone()), late);
        // Ties go to the first alternative
        let tie = LabeledParseError::new(&input[1..], ParseErrorKind::ExpectedCount);
        assert_eq!(early.clone().or(tie), early);
    }

    #[test]
    fn labels_bubble_up() {
        let input = "(H2O";
        let cause = LabeledParseError::new(&input[4..], ParseErrorKind::UnclosedBracket(')'));
        let wrapper =
            LabeledParseError::new_with_source(input, ParseErrorKind::ExpectedPart, cause);
        let error = wrapper.into_final_error(input);

        assert_eq!(error.formula(), "(H2O");
        assert_eq!(error.kind(), &ParseErrorKind::ExpectedPart);
        assert_eq!(error.cause().kind(), &ParseErrorKind::UnclosedBracket(')'));
        assert_eq!(error.cause().span(), SourceSpan::new(4.into(), 0));
        // The wrapper has no label, so it takes the label of its cause
        let labels: Vec<_> = error.labels().unwrap().collect();
        assert_eq!(labels.len(), 1);
        assert_eq!(labels[0].label(), Some("unclosed group"));
        assert!(error.cause().labels().is_none());
        // The span at the end of the input has nothing to point at
        assert_eq!(error.offending_text(), "");
    }

    #[test]
    fn offending_text() {
        let input = "H2O$";
        let error = LabeledParseError::new(&input[3..], ParseErrorKind::InvalidCharacter('$'))
            .into_final_error(input);
        assert_eq!(error.offending_text(), "$");
        let error = LabeledParseError::new(input, ParseErrorKind::CountTooLarge("H2".to_owned()))
            .with_length(2)
            .into_final_error(input);
        assert_eq!(error.offending_text(), "H2");
    }
}
