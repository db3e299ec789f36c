//! Typed literal values and the literal-operator back-end.
//!
//! A `Literal` is the value payload of a literal leaf: booleans,
//! arbitrary-precision numerals and rationals, bitvector spellings
//! (binary/hexadecimal), strings, and symbols. Symbols are stored alongside
//! the others so the evaluator can refuse them uniformly; they never
//! evaluate.
//!
//! `Literal::eval` is the computation layer behind the `Eval*` operators:
//! it receives already-reduced literal arguments and either produces a new
//! literal or reports that the operator does not reduce (`None`, the
//! counterpart of an invalid-result tag).

use std::fmt;

use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{One, Signed, ToPrimitive, Zero};

use crate::kind::Kind;

/// A typed literal value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Literal {
    Bool(bool),
    Numeral(BigInt),
    Rational(BigRational),
    /// A bitvector given in binary, most significant bit first.
    Binary(String),
    /// A bitvector given in hexadecimal, lowercase digits.
    Hex(String),
    Str(String),
    /// The name of a declared symbol. Stored for uniformity; never evaluates.
    Symbol(String),
}

impl Literal {
    /// The expression kind of this literal's leaf.
    pub fn kind(&self) -> Kind {
        match self {
            Literal::Bool(_) => Kind::Boolean,
            Literal::Numeral(_) => Kind::Numeral,
            Literal::Rational(_) => Kind::Decimal,
            Literal::Binary(_) => Kind::Binary,
            Literal::Hex(_) => Kind::Hexadecimal,
            Literal::Str(_) => Kind::String,
            Literal::Symbol(_) => Kind::Const,
        }
    }

    /// The canonical spelling: what `parse` accepts and what two equal
    /// values always agree on. Strings are unquoted here.
    pub fn spelling(&self) -> String {
        match self {
            Literal::Bool(b) => b.to_string(),
            Literal::Numeral(n) => n.to_string(),
            Literal::Rational(r) => format!("{}/{}", r.numer(), r.denom()),
            Literal::Binary(bits) => format!("#b{}", bits),
            Literal::Hex(digits) => format!("#x{}", digits),
            Literal::Str(s) => s.clone(),
            Literal::Symbol(s) => s.clone(),
        }
    }

    /// Parse a spelling for the given literal kind.
    ///
    /// Accepts prefixed (`#b0101`, `#xa0`) and bare bitvector digits, and
    /// both `n/d` and decimal-point spellings for rationals. Returns `None`
    /// when the spelling does not denote a value of the kind.
    pub fn parse(kind: Kind, spelling: &str) -> Option<Literal> {
        match kind {
            Kind::Boolean => match spelling {
                "true" => Some(Literal::Bool(true)),
                "false" => Some(Literal::Bool(false)),
                _ => None,
            },
            Kind::Numeral => spelling.parse::<BigInt>().ok().map(Literal::Numeral),
            Kind::Decimal => parse_rational(spelling).map(Literal::Rational),
            Kind::Binary => {
                let digits = spelling.strip_prefix("#b").unwrap_or(spelling);
                if digits.is_empty() || !digits.bytes().all(|b| b == b'0' || b == b'1') {
                    return None;
                }
                Some(Literal::Binary(digits.to_string()))
            }
            Kind::Hexadecimal => {
                let digits = spelling.strip_prefix("#x").unwrap_or(spelling);
                if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
                    return None;
                }
                Some(Literal::Hex(digits.to_ascii_lowercase()))
            }
            Kind::String => {
                let s = spelling
                    .strip_prefix('"')
                    .and_then(|s| s.strip_suffix('"'))
                    .unwrap_or(spelling);
                Some(Literal::Str(s.to_string()))
            }
            _ => None,
        }
    }

    /// Apply a literal operator to reduced literal arguments.
    ///
    /// `None` means the operator does not reduce on these arguments: wrong
    /// sorts, mismatched bitvector widths, division by zero, out-of-range
    /// indices. Symbols never reduce.
    pub fn eval(k: Kind, args: &[&Literal]) -> Option<Literal> {
        use Literal::*;
        match (k, args) {
            (Kind::EvalNot, [Bool(b)]) => Some(Bool(!b)),
            (Kind::EvalNot, [Binary(a)]) => Some(Binary(
                a.bytes().map(|b| if b == b'0' { '1' } else { '0' }).collect(),
            )),
            (Kind::EvalAnd, [Bool(a), Bool(b)]) => Some(Bool(*a && *b)),
            (Kind::EvalOr, [Bool(a), Bool(b)]) => Some(Bool(*a || *b)),
            (Kind::EvalAnd, [Binary(a), Binary(b)]) => bitwise(a, b, |x, y| x & y),
            (Kind::EvalOr, [Binary(a), Binary(b)]) => bitwise(a, b, |x, y| x | y),

            (Kind::EvalAdd, [Numeral(a), Numeral(b)]) => Some(Numeral(a + b)),
            (Kind::EvalAdd, [Rational(a), Rational(b)]) => Some(Rational(a + b)),
            (Kind::EvalMul, [Numeral(a), Numeral(b)]) => Some(Numeral(a * b)),
            (Kind::EvalMul, [Rational(a), Rational(b)]) => Some(Rational(a * b)),
            (Kind::EvalNeg, [Numeral(a)]) => Some(Numeral(-a)),
            (Kind::EvalNeg, [Rational(a)]) => Some(Rational(-a)),
            (Kind::EvalIntDiv, [Numeral(a), Numeral(b)]) => {
                if b.is_zero() {
                    None
                } else {
                    Some(Numeral(a / b))
                }
            }
            (Kind::EvalRatDiv, [Numeral(a), Numeral(b)]) => {
                if b.is_zero() {
                    None
                } else {
                    Some(Rational(BigRational::new((*a).clone(), (*b).clone())))
                }
            }
            (Kind::EvalRatDiv, [Rational(a), Rational(b)]) => {
                if b.is_zero() {
                    None
                } else {
                    Some(Rational(a / b))
                }
            }
            (Kind::EvalIsNeg, [Numeral(a)]) => Some(Bool(a.is_negative())),
            (Kind::EvalIsNeg, [Rational(a)]) => Some(Bool(a.is_negative())),
            (Kind::EvalIsZero, [Numeral(a)]) => Some(Bool(a.is_zero())),
            (Kind::EvalIsZero, [Rational(a)]) => Some(Bool(a.is_zero())),

            (Kind::EvalConcat, [Str(a), Str(b)]) => Some(Str(format!("{}{}", a, b))),
            (Kind::EvalConcat, [Binary(a), Binary(b)]) => Some(Binary(format!("{}{}", a, b))),
            (Kind::EvalConcat, [Hex(a), Hex(b)]) => Some(Hex(format!("{}{}", a, b))),
            (Kind::EvalLength, [Str(s)]) => Some(Numeral(BigInt::from(s.chars().count()))),
            (Kind::EvalLength, [Binary(a)]) => Some(Numeral(BigInt::from(a.len()))),
            (Kind::EvalLength, [Hex(a)]) => Some(Numeral(BigInt::from(4 * a.len()))),
            (Kind::EvalExtract, [Str(s), Numeral(i), Numeral(j)]) => {
                let (i, j) = (i.to_usize()?, j.to_usize()?);
                let chars: Vec<char> = s.chars().collect();
                if i > j || i >= chars.len() {
                    return Some(Str(String::new()));
                }
                let end = j.min(chars.len() - 1);
                Some(Str(chars[i..=end].iter().collect()))
            }
            (Kind::EvalExtract, [Binary(a), Numeral(i), Numeral(j)]) => {
                extract_digits(a, i, j).map(Binary)
            }
            (Kind::EvalExtract, [Hex(a), Numeral(i), Numeral(j)]) => {
                extract_digits(a, i, j).map(Hex)
            }
            (Kind::EvalToBv, [Numeral(w), Numeral(n)]) => {
                let width = w.to_usize().filter(|w| *w > 0)?;
                let modulus = BigInt::one() << width;
                let value = ((n % &modulus) + &modulus) % &modulus;
                let bits = value.to_str_radix(2);
                Some(Binary(format!("{}{}", "0".repeat(width - bits.len().min(width)), bits)))
            }

            (Kind::EvalToInt, [Numeral(a)]) => Some(Numeral((*a).clone())),
            (Kind::EvalToInt, [Rational(a)]) => Some(Numeral(a.floor().to_integer())),
            (Kind::EvalToInt, [Binary(a)]) => {
                BigInt::parse_bytes(a.as_bytes(), 2).map(Numeral)
            }
            (Kind::EvalToInt, [Hex(a)]) => BigInt::parse_bytes(a.as_bytes(), 16).map(Numeral),
            (Kind::EvalToRat, [Numeral(a)]) => {
                Some(Rational(BigRational::from_integer((*a).clone())))
            }
            (Kind::EvalToRat, [Rational(a)]) => Some(Rational((*a).clone())),
            (Kind::EvalToString, [arg]) => match arg {
                Symbol(_) => None,
                other => Some(Str(other.spelling())),
            },

            _ => None,
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Str(s) => write!(f, "\"{}\"", s),
            other => f.write_str(&other.spelling()),
        }
    }
}

/// Parse `n/d`, `a.b`, or plain integer spellings into a reduced rational.
fn parse_rational(spelling: &str) -> Option<BigRational> {
    if let Some((n, d)) = spelling.split_once('/') {
        let n = n.parse::<BigInt>().ok()?;
        let d = d.parse::<BigInt>().ok()?;
        if d.is_zero() {
            return None;
        }
        return Some(BigRational::new(n, d));
    }
    let (negative, body) = match spelling.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, spelling),
    };
    let value = if let Some((int, frac)) = body.split_once('.') {
        if frac.is_empty() || !frac.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let int = if int.is_empty() { BigInt::zero() } else { int.parse::<BigInt>().ok()? };
        let frac_val = frac.parse::<BigInt>().ok()?;
        let denom = num_traits::pow(BigInt::from(10), frac.len());
        BigRational::new(int * &denom + frac_val, denom)
    } else {
        BigRational::from_integer(body.parse::<BigInt>().ok()?)
    };
    Some(if negative { -value } else { value })
}

/// Combine two equal-width digit strings bitwise.
fn bitwise(a: &str, b: &str, f: impl Fn(u8, u8) -> u8) -> Option<Literal> {
    if a.len() != b.len() {
        return None;
    }
    let bits = a
        .bytes()
        .zip(b.bytes())
        .map(|(x, y)| (f(x - b'0', y - b'0') + b'0') as char)
        .collect();
    Some(Literal::Binary(bits))
}

/// Slice digit positions `i..=j` out of a bitvector spelling.
fn extract_digits(digits: &str, i: &BigInt, j: &BigInt) -> Option<String> {
    let (i, j) = (i.to_usize()?, j.to_usize()?);
    if i > j || j >= digits.len() {
        return None;
    }
    Some(digits[i..=j].to_string())
}
