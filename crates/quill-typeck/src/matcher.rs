//! First-order matching with `Param` metavariables.
//!
//! This is the matcher the type checker and program dispatcher use. It is
//! the same algorithm as the preliminary `Variable`-keyed matcher on
//! expressions, but the two metavariable roles are distinct and this
//! variant requires a re-encountered parameter to map to the identical
//! prior binding (no structural re-check).

use rustc_hash::FxHashSet;

use quill_core::{Ctx, Expr, Kind};

/// Match `pattern` against `term`, capturing `Param` bindings into `ctx`.
///
/// Bindings already present in `ctx` constrain the match; bindings added by
/// a failed match are not rolled back (callers clear `ctx` between
/// attempts).
pub fn match_expr(pattern: &Expr, term: &Expr, ctx: &mut Ctx) -> bool {
    let mut visited: FxHashSet<(Expr, Expr)> = FxHashSet::default();
    match_with_visited(pattern, term, ctx, &mut visited)
}

/// Matching with a caller-shared visited set, so the pairs checked for one
/// argument position are skipped for the next.
pub(crate) fn match_with_visited(
    pattern: &Expr,
    term: &Expr,
    ctx: &mut Ctx,
    visited: &mut FxHashSet<(Expr, Expr)>,
) -> bool {
    let mut stack = vec![(pattern.clone(), term.clone())];
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
            if p.kind() != Kind::Param {
                return false;
            }
            match ctx.get(&p) {
                None => {
                    ctx.insert(p, t);
                }
                // a parameter seen before must map to the same subterm
                Some(bound) => {
                    if *bound != t {
                        return false;
                    }
                }
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
