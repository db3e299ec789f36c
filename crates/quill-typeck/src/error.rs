//! Type errors with rendered-term diagnostics.
//!
//! The checker is fail-fast: the first failing subterm aborts synthesis for
//! the whole root, and the error describes that subterm. Expressions are
//! rendered to their S-expression form at construction so errors stay
//! self-contained and serializable.

use std::fmt;

use serde::Serialize;

use quill_core::Kind;

/// An error encountered while synthesizing a type.
#[derive(Clone, Debug, Serialize)]
pub enum TypeError {
    /// Wrong number of children for a fixed-arity kind.
    Arity { kind: Kind, found: usize },
    /// The head of an application does not have a function type.
    NonFunctionHead { head: String },
    /// An application supplies the wrong number of arguments.
    ApplyArity { head: String, expected: usize, found: usize },
    /// An argument's type failed to match the declared parameter type.
    ArgMismatch {
        head: String,
        position: usize,
        expected: String,
        found: String,
    },
    /// The argument of `Proof` is not of Bool type.
    NonBoolProof { found: String },
    /// A kind with no synthesis rule.
    UnknownKind { kind: Kind },
    /// A literal operator with no type rule (usable only in patterns).
    NoLiteralOpType { kind: Kind },
    /// A literal type rule was requested or installed for a non-literal kind.
    NotALiteralKind { kind: Kind },
    /// A literal type rule was installed twice with different types.
    ConflictingTypeRule {
        kind: Kind,
        existing: String,
        requested: String,
    },
}

impl fmt::Display for TypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeError::Arity { kind, found } => {
                write!(f, "incorrect arity for {}: {} children", kind, found)
            }
            TypeError::NonFunctionHead { head } => {
                write!(f, "non-function `{}` as head of application", head)
            }
            TypeError::ApplyArity {
                head,
                expected,
                found,
            } => {
                write!(
                    f,
                    "incorrect arity for `{}`: expected {} terms, found {}",
                    head, expected, found
                )
            }
            TypeError::ArgMismatch {
                head,
                position,
                expected,
                found,
            } => {
                write!(
                    f,
                    "unexpected type for argument {} of `{}`: expected `{}`, found `{}`",
                    position, head, expected, found
                )
            }
            TypeError::NonBoolProof { found } => {
                write!(f, "non-Bool `{}` as argument of Proof", found)
            }
            TypeError::UnknownKind { kind } => write!(f, "unknown kind {}", kind),
            TypeError::NoLiteralOpType { kind } => {
                write!(f, "unknown type for literal operator {}", kind)
            }
            TypeError::NotALiteralKind { kind } => {
                write!(f, "cannot set a literal type rule for kind {}", kind)
            }
            TypeError::ConflictingTypeRule {
                kind,
                existing,
                requested,
            } => {
                write!(
                    f,
                    "cannot set type rule for {} to `{}`: already set to `{}`",
                    kind, requested, existing
                )
            }
        }
    }
}

impl std::error::Error for TypeError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        let err = TypeError::Arity {
            kind: Kind::EvalNot,
            found: 2,
        };
        assert_eq!(err.to_string(), "incorrect arity for eval.not: 2 children");
        let err = TypeError::ArgMismatch {
            head: "f".into(),
            position: 0,
            expected: "Int".into(),
            found: "Bool".into(),
        };
        assert_eq!(
            err.to_string(),
            "unexpected type for argument 0 of `f`: expected `Int`, found `Bool`"
        );
    }
}
