// External Crate Imports
use nom::{
    branch::alt,
    character::complete::{char, digit0, digit1, one_of, satisfy, u32},
    combinator::{eof, map, map_opt, opt, peek, recognize},
    multi::many1,
    sequence::{pair, terminated, tuple},
};
use rust_decimal::Decimal;

// Local Crate Imports
use super::errors::{ParseErrorKind, ParseResult, expect, failure};
use crate::{Charge, Count, MassNumber};

/// uppercase
///   = "A" | "B" | "C" | "D" | "E" | "F" | "G"
///   | "H" | "I" | "J" | "K" | "L" | "M" | "N"
///   | "O" | "P" | "Q" | "R" | "S" | "T" | "U"
///   | "V" | "W" | "X" | "Y" | "Z"
///   ;
pub fn uppercase(i: &str) -> ParseResult<char> {
    let parser = satisfy(|c| c.is_ascii_uppercase());
    expect(parser, ParseErrorKind::ExpectedUppercase)(i)
}

/// lowercase
///   = "a" | "b" | "c" | "d" | "e" | "f" | "g"
///   | "h" | "i" | "j" | "k" | "l" | "m" | "n"
///   | "o" | "p" | "q" | "r" | "s" | "t" | "u"
///   | "v" | "w" | "x" | "y" | "z"
///   ;
pub fn lowercase(i: &str) -> ParseResult<char> {
    let parser = satisfy(|c| c.is_ascii_lowercase());
    expect(parser, ParseErrorKind::ExpectedLowercase)(i)
}

/// Count = "0" , [ "." , digit , { digit } ]
///       | Whole , [ "." , digit , { digit } , & Count End ]
///       ;
pub fn count(i: &str) -> ParseResult<Count> {
    let fraction = recognize(pair(char('0'), opt(pair(char('.'), digit1))));
    // NOTE: After a whole number, a decimal point only belongs to the count when nothing but a closing bracket, a
    // charge, or a separator follows its digits, otherwise it's joining a hydrate (like the `.5H2O` in `CuSO4.5H2O`)
    let bounded = terminated(decimal, peek(count_end));
    let parser = alt((fraction, bounded, whole));
    let (rest, digits) = expect(parser, ParseErrorKind::ExpectedCount)(i)?;

    // NOTE: Natural numbers consume every digit, so any digits left over must follow a leading zero
    if rest.starts_with(|c: char| c.is_ascii_digit()) {
        return failure(i, 1, ParseErrorKind::ExpectedNoLeadingZero);
    }
    into_count(i, rest, digits)
}

/// Multiplier = ( Whole , "." , digit , { digit } | Count ) , "*" ;
pub fn multiplier(i: &str) -> ParseResult<Count> {
    terminated(alt((starred_decimal, count)), char('*'))(i)
}

/// Unit Start = uppercase | "(" | "[" | "{" ;
pub fn unit_start(i: &str) -> ParseResult<char> {
    satisfy(|c| c.is_ascii_uppercase() || "([{".contains(c))(i)
}

/// Whole = digit - "0" , { digit } ;
fn whole(i: &str) -> ParseResult<&str> {
    recognize(pair(one_of("123456789"), digit0))(i)
}

fn decimal(i: &str) -> ParseResult<&str> {
    recognize(tuple((whole, char('.'), digit1)))(i)
}

fn starred_decimal(i: &str) -> ParseResult<Count> {
    let (rest, digits) = terminated(decimal, peek(char('*')))(i)?;
    into_count(i, rest, digits)
}

/// Count End = ")" | "]" | "}" | "+" | "-" | "_" | "," | "/" | ":" | " " | End ;
fn count_end(i: &str) -> ParseResult<&str> {
    alt((eof, recognize(one_of(")]}+-_,/: "))))(i)
}

fn into_count<'s>(i: &'s str, rest: &'s str, digits: &str) -> ParseResult<'s, Count> {
    match Decimal::from_str_exact(digits).ok().and_then(Count::new) {
        Some(count) => Ok((rest, count)),
        None => failure(
            i,
            digits.len(),
            ParseErrorKind::CountTooLarge(digits.to_owned()),
        ),
    }
}

/// Mass Number = digit - "0" , { digit } ;
pub fn mass_number(i: &str) -> ParseResult<MassNumber> {
    let parser = map_opt(whole, |n: &str| {
        n.parse().ok().and_then(MassNumber::new)
    });
    expect(parser, ParseErrorKind::ExpectedMassNumber)(i)
}

/// Sign = "+" | "-" ;
pub fn sign(i: &str) -> ParseResult<Charge> {
    map(one_of("+-"), |c| Charge(if c == '+' { 1 } else { -1 }))(i)
}

/// Signs = Sign , { Sign } ;
pub fn signs(i: &str) -> ParseResult<Charge> {
    map(many1(sign), |signs| signs.into_iter().sum())(i)
}

/// Magnitude = digit , { digit } ;
pub fn magnitude(i: &str) -> ParseResult<i64> {
    map(u32, i64::from)(i)
}

/// Weight = digit , { digit } , [ "." , { digit } ] | "." , digit , { digit } ;
pub fn weight(i: &str) -> ParseResult<Decimal> {
    let whole = recognize(pair(digit1, opt(pair(char('.'), digit0))));
    let fraction = recognize(pair(char('.'), digit1));
    let parser = map_opt(alt((whole, fraction)), |w: &str| {
        let w = w.trim_end_matches('.');
        if w.starts_with('.') {
            Decimal::from_str_exact(&format!("0{w}")).ok()
        } else {
            Decimal::from_str_exact(w).ok()
        }
    });
    expect(parser, ParseErrorKind::ExpectedWeight)(i)
}
