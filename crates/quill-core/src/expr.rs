//! The shared expression DAG.
//!
//! An `Expr` is a cheap handle to an immutable node: a kind, ordered
//! children, a write-once type cache, and two flags computed at
//! construction (groundness and evaluatability). The owning `State`
//! hash-conses nodes, so handle identity *is* structural equality; `Expr`
//! compares and hashes by node identity.

use std::cell::RefCell;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Index;
use std::rc::Rc;

use indexmap::IndexMap;
use rustc_hash::{FxBuildHasher, FxHashSet};

use crate::kind::Kind;

/// An ordered substitution from `Param`/`Variable` leaves to expressions.
///
/// Insertion order is preserved so traces and diagnostics render
/// deterministically. The empty context is the identity substitution.
pub type Ctx = IndexMap<Expr, Expr, FxBuildHasher>;

/// The payload of an expression node. Created only by the factory.
pub struct ExprValue {
    kind: Kind,
    children: Vec<Expr>,
    /// Synthesized type, filled at most once by the type checker.
    ty: RefCell<Option<Expr>>,
    ground: bool,
    evaluatable: bool,
}

/// A shared reference to an expression node.
///
/// Equality and hashing are by node identity, which the factory's
/// hash-consing makes coincide with structural equality.
#[derive(Clone)]
pub struct Expr(Rc<ExprValue>);

impl Expr {
    /// Node constructor; only the factory in [`crate::state`] calls this.
    pub(crate) fn new(kind: Kind, children: Vec<Expr>) -> Expr {
        let ground = kind != Kind::Param && children.iter().all(|c| c.is_ground());
        let evaluatable = kind == Kind::Fail
            || kind.is_literal_op()
            || (kind == Kind::Apply
                && matches!(
                    children.first().map(|c| c.kind()),
                    Some(Kind::ProgramConst) | Some(Kind::Oracle)
                ))
            || children.iter().any(|c| c.is_evaluatable());
        Expr(Rc::new(ExprValue {
            kind,
            children,
            ty: RefCell::new(None),
            ground,
            evaluatable,
        }))
    }

    pub fn kind(&self) -> Kind {
        self.0.kind
    }

    pub fn children(&self) -> &[Expr] {
        &self.0.children
    }

    pub fn num_children(&self) -> usize {
        self.0.children.len()
    }

    /// Whether the term contains no `Param` subterm.
    pub fn is_ground(&self) -> bool {
        self.0.ground
    }

    /// Whether evaluation could change the term: its kind is a literal
    /// operator or `Fail`, it applies a program or oracle, or some subterm
    /// does.
    pub fn is_evaluatable(&self) -> bool {
        self.0.evaluatable
    }

    /// The cached synthesized type, if the type checker has filled it.
    pub fn ty(&self) -> Option<Expr> {
        self.0.ty.borrow().clone()
    }

    /// Fill the type cache. Write-once: a second call with the same type is
    /// a no-op, and the cache is never overwritten.
    pub fn cache_ty(&self, ty: Expr) {
        let mut slot = self.0.ty.borrow_mut();
        if slot.is_none() {
            *slot = Some(ty);
        }
    }

    /// Stable address of the underlying node, for identity-keyed traces.
    pub fn addr(&self) -> usize {
        Rc::as_ptr(&self.0) as usize
    }

    /// Structural matching with `Variable` leaves as metavariables.
    ///
    /// On success, bindings for previously unbound variables have been
    /// added to `ctx`; a variable seen again has its earlier binding
    /// re-checked structurally against the new target. Bindings are not
    /// rolled back on failure.
    pub fn matches(&self, target: &Expr, ctx: &mut Ctx) -> bool {
        let mut visited: FxHashSet<(Expr, Expr)> = FxHashSet::default();
        let mut stack = vec![(self.clone(), target.clone())];
        while let Some(curr) = stack.pop() {
            if curr.0 == curr.1 {
                // holds trivially
                continue;
            }
            if !visited.insert(curr.clone()) {
                continue;
            }
            let (p, t) = curr;
            if p.num_children() == 0 {
                if p.kind() != Kind::Variable {
                    return false;
                }
                match ctx.get(&p) {
                    None => {
                        ctx.insert(p, t);
                    }
                    // seen before: the earlier binding must match the new
                    // target as well
                    Some(bound) => stack.push((bound.clone(), t)),
                }
            } else {
                if p.num_children() != t.num_children() || p.kind() != t.kind() {
                    return false;
                }
                for i in 0..p.num_children() {
                    stack.push((p[i].clone(), t[i].clone()));
                }
            }
        }
        true
    }
}

impl PartialEq for Expr {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Expr {}

impl Hash for Expr {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_usize(self.addr());
    }
}

impl Index<usize> for Expr {
    type Output = Expr;

    fn index(&self, i: usize) -> &Expr {
        &self.0.children[i]
    }
}

impl fmt::Debug for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}@{:x}", self.kind(), self.num_children(), self.addr())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::State;

    #[test]
    fn flags_propagate_from_children() {
        let mut s = State::new();
        let ty = s.mk_type();
        let x = s.mk_symbol(Kind::Param, "x", ty.clone());
        let c = s.mk_symbol(Kind::Const, "c", ty.clone());
        let app = s.mk_expr(Kind::Tuple, vec![c.clone(), x.clone()]);
        assert!(!x.is_ground());
        assert!(c.is_ground());
        assert!(!app.is_ground());
        assert!(!app.is_evaluatable());
        let add = s.mk_expr(Kind::EvalAdd, vec![c.clone(), c.clone()]);
        assert!(add.is_evaluatable());
        let wrapped = s.mk_expr(Kind::Tuple, vec![add]);
        assert!(wrapped.is_evaluatable());
    }

    #[test]
    fn apply_of_program_is_evaluatable() {
        let mut s = State::new();
        let ty = s.mk_type();
        let p = s.mk_symbol(Kind::ProgramConst, "p", ty.clone());
        let c = s.mk_symbol(Kind::Const, "c", ty);
        let call = s.mk_expr(Kind::Apply, vec![p, c.clone()]);
        assert!(call.is_evaluatable());
        let plain = s.mk_expr(Kind::Apply, vec![c.clone(), c]);
        assert!(!plain.is_evaluatable());
    }

    #[test]
    fn type_cache_is_write_once() {
        let mut s = State::new();
        let ty = s.mk_type();
        let other = s.mk_bool_type();
        let e = s.mk_expr(Kind::Tuple, vec![]);
        assert!(e.ty().is_none());
        e.cache_ty(ty.clone());
        e.cache_ty(other);
        assert_eq!(e.ty(), Some(ty));
    }

    #[test]
    fn variable_match_binds_and_rechecks() {
        let mut s = State::new();
        let ty = s.mk_type();
        let v = s.mk_symbol(Kind::Variable, "v", ty.clone());
        let a = s.mk_symbol(Kind::Const, "a", ty.clone());
        let b = s.mk_symbol(Kind::Const, "b", ty);
        let pat = s.mk_expr(Kind::Tuple, vec![v.clone(), v.clone()]);
        let same = s.mk_expr(Kind::Tuple, vec![a.clone(), a.clone()]);
        let diff = s.mk_expr(Kind::Tuple, vec![a.clone(), b]);

        let mut ctx = Ctx::default();
        assert!(pat.matches(&same, &mut ctx));
        assert_eq!(ctx.get(&v), Some(&a));

        let mut ctx = Ctx::default();
        assert!(!pat.matches(&diff, &mut ctx));
    }

    #[test]
    fn ground_pattern_matches_only_itself() {
        let mut s = State::new();
        let ty = s.mk_type();
        let a = s.mk_symbol(Kind::Const, "a", ty.clone());
        let b = s.mk_symbol(Kind::Const, "b", ty);
        let pa = s.mk_expr(Kind::Tuple, vec![a.clone()]);
        let pb = s.mk_expr(Kind::Tuple, vec![b]);
        let mut ctx = Ctx::default();
        assert!(pa.matches(&pa.clone(), &mut ctx));
        assert!(ctx.is_empty());
        assert!(!pa.matches(&pb, &mut ctx));
    }
}
