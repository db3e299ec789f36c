//! Bottom-up type synthesis.
//!
//! `TypeChecker` owns the expression [`State`] plus the program table, the
//! literal type rules, and the evaluator's memoization trie. Synthesis is
//! non-recursive: an explicit work stack visits each subterm twice (push
//! children, then compute), so arbitrarily deep terms cannot exhaust the
//! native stack. Results are cached on the nodes themselves and never
//! recomputed; the first failing subterm aborts the whole synthesis.

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::trace;

use quill_core::{Ctx, Expr, Kind, State};

use crate::error::TypeError;
use crate::eval::ExprTrie;
use crate::matcher::match_with_visited;
use crate::oracle::{OracleParser, ShellRunner, SubprocessRunner};

/// The type checker and evaluator of the Quill core.
pub struct TypeChecker {
    pub(crate) state: State,
    /// Registered programs: program constant to its tuple of arms.
    pub(crate) programs: FxHashMap<Expr, Expr>,
    /// Type rules for the literal kinds; `None` until set or defaulted.
    literal_type_rules: FxHashMap<Kind, Option<Expr>>,
    /// Identity-keyed memo of program/oracle applications.
    pub(crate) eval_trie: ExprTrie,
    pub(crate) runner: Box<dyn SubprocessRunner>,
    pub(crate) oracle_parser: Option<OracleParser>,
}

const LITERAL_KINDS: [Kind; 6] = [
    Kind::Boolean,
    Kind::Numeral,
    Kind::Decimal,
    Kind::Hexadecimal,
    Kind::Binary,
    Kind::String,
];

impl TypeChecker {
    pub fn new(state: State) -> TypeChecker {
        let mut literal_type_rules = FxHashMap::default();
        for k in LITERAL_KINDS {
            literal_type_rules.insert(k, None);
        }
        TypeChecker {
            state,
            programs: FxHashMap::default(),
            literal_type_rules,
            eval_trie: ExprTrie::default(),
            runner: Box::new(ShellRunner),
            oracle_parser: None,
        }
    }

    pub fn state(&self) -> &State {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut State {
        &mut self.state
    }

    /// Replace the oracle subprocess runner (tests inject a fake here).
    pub fn set_runner(&mut self, runner: Box<dyn SubprocessRunner>) {
        self.runner = runner;
    }

    /// Install the parser applied to oracle responses. Without one, oracle
    /// applications are irreducible.
    pub fn set_oracle_parser(&mut self, parser: OracleParser) {
        self.oracle_parser = Some(parser);
    }

    // ── Programs ────────────────────────────────────────────────────────

    /// Register a program: `body` is an ordered tuple of arms, each arm a
    /// pair of an application pattern and its right-hand side.
    pub fn define_program(&mut self, sym: &Expr, body: &Expr) {
        self.programs.insert(sym.clone(), body.clone());
    }

    pub fn has_program(&self, sym: &Expr) -> bool {
        self.programs.contains_key(sym)
    }

    // ── Literal type rules ──────────────────────────────────────────────

    /// Install the type rule for a literal kind. Installing a different
    /// rule twice is an error, as is naming a non-literal kind.
    pub fn set_literal_type_rule(&mut self, kind: Kind, ty: Expr) -> Result<(), TypeError> {
        match self.literal_type_rules.get(&kind) {
            None => Err(TypeError::NotALiteralKind { kind }),
            Some(Some(existing)) if *existing != ty => Err(TypeError::ConflictingTypeRule {
                kind,
                existing: self.state.display(existing).to_string(),
                requested: self.state.display(&ty).to_string(),
            }),
            _ => {
                self.literal_type_rules.insert(kind, Some(ty));
                Ok(())
            }
        }
    }

    /// The type rule for a literal kind, defaulting to the built-in type
    /// for that kind on first use.
    pub fn get_or_set_literal_type_rule(&mut self, kind: Kind) -> Result<Expr, TypeError> {
        match self.literal_type_rules.get(&kind) {
            None => Err(TypeError::NotALiteralKind { kind }),
            Some(Some(ty)) => Ok(ty.clone()),
            Some(None) => {
                let ty = self.state.mk_builtin_type(kind);
                self.literal_type_rules.insert(kind, Some(ty.clone()));
                Ok(ty)
            }
        }
    }

    // ── Type synthesis ──────────────────────────────────────────────────

    /// Synthesize (and cache) the type of `e`.
    ///
    /// Re-entry returns the cached type without re-synthesis. On error the
    /// root's cache stays empty and the error names the failing subterm.
    pub fn get_type(&mut self, e: &Expr) -> Result<Expr, TypeError> {
        let mut visited: FxHashSet<Expr> = FxHashSet::default();
        let mut to_visit = vec![e.clone()];
        while let Some(cur) = to_visit.last().cloned() {
            if cur.ty().is_some() {
                // already computed
                to_visit.pop();
                continue;
            }
            if visited.insert(cur.clone()) {
                to_visit.extend(cur.children().iter().cloned());
            } else {
                // children are typed now; any failure aborts the root
                let ty = self.get_type_internal(&cur)?;
                trace!(
                    target: "type_checker",
                    "TYPE {} : {}",
                    self.state.display(&cur),
                    self.state.display(&ty)
                );
                cur.cache_ty(ty);
                to_visit.pop();
            }
        }
        e.ty().ok_or(TypeError::UnknownKind { kind: e.kind() })
    }

    fn get_type_internal(&mut self, e: &Expr) -> Result<Expr, TypeError> {
        let k = e.kind();
        if !check_arity(k, e.num_children()) {
            return Err(TypeError::Arity {
                kind: k,
                found: e.num_children(),
            });
        }
        match k {
            Kind::Apply => self.get_type_app(e),
            Kind::Lambda => {
                let mut args = Vec::new();
                for v in e[0].children() {
                    args.push(self.child_type(v)?);
                }
                let ret = self.child_type(&e[1])?;
                Ok(self.state.mk_function_type(args, ret))
            }
            // nil and fail are their own type
            Kind::Nil | Kind::Fail => Ok(e.clone()),
            Kind::Type
            | Kind::AbstractType
            | Kind::BoolType
            | Kind::FunctionType
            | Kind::QuoteType => Ok(self.state.mk_type()),
            Kind::ProofType => {
                let ctype = self.child_type(&e[0])?;
                if ctype.kind() != Kind::BoolType {
                    return Err(TypeError::NonBoolProof {
                        found: self.state.display(&e[0]).to_string(),
                    });
                }
                Ok(self.state.mk_type())
            }
            // binder lists and tuples are not terms
            Kind::Tuple | Kind::VariableList => Ok(self.state.mk_abstract_type()),
            Kind::Boolean => Ok(self.state.mk_bool_type()),
            Kind::Numeral | Kind::Decimal | Kind::Hexadecimal | Kind::Binary | Kind::String => {
                let rule = self.get_or_set_literal_type_rule(k)?;
                if rule.is_ground() {
                    Ok(rule)
                } else {
                    // the rule mentions the `self` parameter
                    let mut ctx = Ctx::default();
                    ctx.insert(self.state.mk_self(), e.clone());
                    Ok(self.evaluate(&rule, &ctx))
                }
            }
            _ if k.is_literal_op() => {
                let mut ctypes = Vec::new();
                for c in e.children() {
                    ctypes.push(self.child_type(c)?);
                }
                self.get_literal_op_type(k, &ctypes)
            }
            _ => Err(TypeError::UnknownKind { kind: k }),
        }
    }

    /// A child's cached type; children are always typed before their parent.
    fn child_type(&self, c: &Expr) -> Result<Expr, TypeError> {
        c.ty().ok_or(TypeError::UnknownKind { kind: c.kind() })
    }

    /// Application typing: match each argument against its declared
    /// parameter type (arguments in quoted positions are matched as terms,
    /// the implicit upcast), then evaluate the declared return type under
    /// the accumulated bindings.
    fn get_type_app(&mut self, e: &Expr) -> Result<Expr, TypeError> {
        let children = e.children().to_vec();
        let hd = match children.first() {
            Some(hd) => hd,
            None => {
                return Err(TypeError::Arity {
                    kind: Kind::Apply,
                    found: 0,
                })
            }
        };
        let hd_type = self.child_type(hd)?;
        if hd_type.kind() != Kind::FunctionType {
            return Err(TypeError::NonFunctionHead {
                head: self.state.display(hd).to_string(),
            });
        }
        let hdtypes = hd_type.children().to_vec();
        if hdtypes.len() != children.len() {
            return Err(TypeError::ApplyArity {
                head: self.state.display(hd).to_string(),
                expected: hdtypes.len(),
                found: children.len(),
            });
        }
        let mut ctypes = Vec::new();
        for i in 1..children.len() {
            // a (Quote t) parameter implicitly upcasts the argument to its
            // quotation: the matcher sees the evaluated argument itself
            // rather than its type
            let arg = if hdtypes[i - 1].kind() == Kind::QuoteType {
                self.evaluate(&children[i], &Ctx::default())
            } else {
                self.child_type(&children[i])?
            };
            ctypes.push(arg);
        }
        let mut ctx = Ctx::default();
        let mut visited = FxHashSet::default();
        for (i, ctype) in ctypes.iter().enumerate() {
            let hdt = &hdtypes[i];
            let pattern = if hdt.kind() == Kind::QuoteType {
                hdt[0].clone()
            } else {
                hdt.clone()
            };
            if !match_with_visited(&pattern, ctype, &mut ctx, &mut visited) {
                let expected = self.evaluate(hdt, &ctx);
                return Err(TypeError::ArgMismatch {
                    head: self.state.display(hd).to_string(),
                    position: i,
                    expected: self.state.display(&expected).to_string(),
                    found: self.state.display(ctype).to_string(),
                });
            }
        }
        let ret = hdtypes[hdtypes.len() - 1].clone();
        Ok(self.evaluate(&ret, &ctx))
    }

    /// The fixed synthesis table for literal operators.
    fn get_literal_op_type(&mut self, k: Kind, ctypes: &[Expr]) -> Result<Expr, TypeError> {
        match k {
            Kind::EvalAdd | Kind::EvalMul | Kind::EvalConcat | Kind::EvalNeg => {
                Ok(ctypes[0].clone())
            }
            Kind::EvalRequires => Ok(ctypes[2].clone()),
            Kind::EvalIfThenElse
            | Kind::EvalCons
            | Kind::EvalAppend
            | Kind::EvalToList
            | Kind::EvalFromList => Ok(ctypes[1].clone()),
            Kind::EvalIsEq
            | Kind::EvalNot
            | Kind::EvalAnd
            | Kind::EvalOr
            | Kind::EvalIsNeg
            | Kind::EvalIsZero => Ok(self.state.mk_bool_type()),
            Kind::EvalIntDiv | Kind::EvalToInt | Kind::EvalLength => {
                self.get_or_set_literal_type_rule(Kind::Numeral)
            }
            Kind::EvalRatDiv | Kind::EvalToRat => {
                self.get_or_set_literal_type_rule(Kind::Decimal)
            }
            _ => Err(TypeError::NoLiteralOpType { kind: k }),
        }
    }
}

/// Arity table for fixed-arity kinds; kinds not listed accept any arity.
pub(crate) fn check_arity(k: Kind, nargs: usize) -> bool {
    match k {
        Kind::Nil => nargs == 0,
        Kind::ProofType
        | Kind::EvalNot
        | Kind::EvalNeg
        | Kind::EvalIsNeg
        | Kind::EvalIsZero
        | Kind::EvalLength
        | Kind::EvalToInt
        | Kind::EvalToRat
        | Kind::EvalToString => nargs == 1,
        Kind::Lambda
        | Kind::EvalIsEq
        | Kind::EvalToList
        | Kind::EvalFromList
        | Kind::EvalAnd
        | Kind::EvalOr
        | Kind::EvalAdd
        | Kind::EvalMul
        | Kind::EvalIntDiv
        | Kind::EvalRatDiv
        | Kind::EvalConcat
        | Kind::EvalToBv => nargs == 2,
        Kind::EvalRequires | Kind::EvalIfThenElse | Kind::EvalCons | Kind::EvalAppend
        | Kind::EvalExtract => nargs == 3,
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arity_table() {
        assert!(check_arity(Kind::Nil, 0));
        assert!(!check_arity(Kind::Nil, 1));
        assert!(check_arity(Kind::EvalNot, 1));
        assert!(!check_arity(Kind::EvalNot, 2));
        assert!(check_arity(Kind::EvalAdd, 2));
        assert!(check_arity(Kind::EvalRequires, 3));
        assert!(!check_arity(Kind::EvalExtract, 2));
        // unlisted kinds accept any arity
        assert!(check_arity(Kind::Apply, 7));
    }
}
