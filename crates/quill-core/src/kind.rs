//! Kind tags for expression nodes.
//!
//! Every expression node carries exactly one `Kind`. The enumeration is
//! closed and falls into four groups:
//! - structural types (`Type`, `BoolType`, `FunctionType`, ...)
//! - term formers (`Apply`, `Lambda`, symbol leaves, `Nil`, `Fail`, ...)
//! - literal sorts (`Boolean` through `String`)
//! - literal operators (every `Eval*` tag), the built-in computation layer

use std::fmt;

use serde::Serialize;

/// The syntactic/semantic tag of an expression node.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Kind {
    None,
    // structural types
    Type,
    BoolType,
    FunctionType,
    ProofType,
    QuoteType,
    AbstractType,
    // term formers
    Apply,
    Lambda,
    Const,
    Variable,
    Param,
    VariableList,
    Tuple,
    Nil,
    Fail,
    ProgramConst,
    Oracle,
    // literal sorts
    Boolean,
    Numeral,
    Decimal,
    Hexadecimal,
    Binary,
    String,
    // literal operators
    EvalIsEq,
    EvalIfThenElse,
    EvalRequires,
    EvalCons,
    EvalAppend,
    EvalToList,
    EvalFromList,
    EvalNot,
    EvalAnd,
    EvalOr,
    EvalAdd,
    EvalMul,
    EvalNeg,
    EvalIntDiv,
    EvalRatDiv,
    EvalIsNeg,
    EvalIsZero,
    EvalConcat,
    EvalLength,
    EvalExtract,
    EvalToBv,
    EvalToInt,
    EvalToRat,
    EvalToString,
}

impl Kind {
    /// Whether this tag is one of the six literal sorts.
    pub fn is_literal(self) -> bool {
        matches!(
            self,
            Kind::Boolean
                | Kind::Numeral
                | Kind::Decimal
                | Kind::Hexadecimal
                | Kind::Binary
                | Kind::String
        )
    }

    /// Whether this tag is a literal operator (an `Eval*` kind).
    pub fn is_literal_op(self) -> bool {
        matches!(
            self,
            Kind::EvalIsEq
                | Kind::EvalIfThenElse
                | Kind::EvalRequires
                | Kind::EvalCons
                | Kind::EvalAppend
                | Kind::EvalToList
                | Kind::EvalFromList
                | Kind::EvalNot
                | Kind::EvalAnd
                | Kind::EvalOr
                | Kind::EvalAdd
                | Kind::EvalMul
                | Kind::EvalNeg
                | Kind::EvalIntDiv
                | Kind::EvalRatDiv
                | Kind::EvalIsNeg
                | Kind::EvalIsZero
                | Kind::EvalConcat
                | Kind::EvalLength
                | Kind::EvalExtract
                | Kind::EvalToBv
                | Kind::EvalToInt
                | Kind::EvalToRat
                | Kind::EvalToString
        )
    }

    /// The canonical surface spelling, used by the debug printer for nodes
    /// that carry no registered name.
    pub fn spelling(self) -> &'static str {
        match self {
            Kind::None => "none",
            Kind::Type => "Type",
            Kind::BoolType => "Bool",
            Kind::FunctionType => "->",
            Kind::ProofType => "Proof",
            Kind::QuoteType => "Quote",
            Kind::AbstractType => "?",
            Kind::Apply => "_",
            Kind::Lambda => "lambda",
            Kind::Const => "const",
            Kind::Variable => "var",
            Kind::Param => "param",
            Kind::VariableList => "varlist",
            Kind::Tuple => "tuple",
            Kind::Nil => "nil",
            Kind::Fail => "fail",
            Kind::ProgramConst => "program",
            Kind::Oracle => "oracle",
            Kind::Boolean => "bool",
            Kind::Numeral => "int",
            Kind::Decimal => "rat",
            Kind::Hexadecimal => "hex",
            Kind::Binary => "bin",
            Kind::String => "str",
            Kind::EvalIsEq => "eval.is_eq",
            Kind::EvalIfThenElse => "eval.ite",
            Kind::EvalRequires => "eval.requires",
            Kind::EvalCons => "eval.cons",
            Kind::EvalAppend => "eval.append",
            Kind::EvalToList => "eval.to_list",
            Kind::EvalFromList => "eval.from_list",
            Kind::EvalNot => "eval.not",
            Kind::EvalAnd => "eval.and",
            Kind::EvalOr => "eval.or",
            Kind::EvalAdd => "eval.add",
            Kind::EvalMul => "eval.mul",
            Kind::EvalNeg => "eval.neg",
            Kind::EvalIntDiv => "eval.int_div",
            Kind::EvalRatDiv => "eval.rat_div",
            Kind::EvalIsNeg => "eval.is_neg",
            Kind::EvalIsZero => "eval.is_zero",
            Kind::EvalConcat => "eval.concat",
            Kind::EvalLength => "eval.length",
            Kind::EvalExtract => "eval.extract",
            Kind::EvalToBv => "eval.to_bv",
            Kind::EvalToInt => "eval.to_int",
            Kind::EvalToRat => "eval.to_rat",
            Kind::EvalToString => "eval.to_str",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.spelling())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_classification() {
        assert!(Kind::Numeral.is_literal());
        assert!(Kind::String.is_literal());
        assert!(!Kind::Apply.is_literal());
        assert!(!Kind::EvalAdd.is_literal());
    }

    #[test]
    fn literal_op_classification() {
        assert!(Kind::EvalAdd.is_literal_op());
        assert!(Kind::EvalToString.is_literal_op());
        assert!(!Kind::Apply.is_literal_op());
        assert!(!Kind::Boolean.is_literal_op());
    }

    #[test]
    fn display_spellings() {
        assert_eq!(Kind::FunctionType.to_string(), "->");
        assert_eq!(Kind::EvalIfThenElse.to_string(), "eval.ite");
        assert_eq!(Kind::Nil.to_string(), "nil");
    }
}
