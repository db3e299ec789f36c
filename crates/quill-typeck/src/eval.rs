//! The reduction engine.
//!
//! `evaluate` reduces a term under a substitution, call-by-value except for
//! `eval.ite` (lazy in the branches once the condition is a boolean
//! literal) and `fail` (which aborts the whole call). The engine manages an
//! explicit stack of evaluation frames -- one per program application being
//! reduced under its matched context -- so deeply nested terms and deep
//! program call chains never grow the native stack.
//!
//! Each frame holds its local context, a work stack, and a memo table whose
//! `None` entry means "children pushed, not yet reduced". Program and
//! oracle applications with ground arguments are additionally memoized in a
//! global trie keyed by the identity of the reduced argument list, which is
//! sound because the factory hash-conses nodes.

use rustc_hash::FxHashMap;
use tracing::{debug, trace, warn};

use quill_core::{Assoc, Ctx, Expr, Kind, Literal};

use crate::checker::{check_arity, TypeChecker};
use crate::matcher::match_expr;

/// Identity-keyed trie memoizing program/oracle results across frames.
#[derive(Default)]
pub(crate) struct ExprTrie {
    children: FxHashMap<Expr, ExprTrie>,
    data: Option<Expr>,
}

impl ExprTrie {
    fn get(&self, key: &[Expr]) -> Option<&Expr> {
        let mut node = self;
        for e in key {
            node = node.children.get(e)?;
        }
        node.data.as_ref()
    }

    fn insert(&mut self, key: &[Expr], value: Expr) {
        let mut node = self;
        for e in key {
            node = node.children.entry(e.clone()).or_default();
        }
        node.data = Some(value);
    }
}

/// One evaluation scope: a substitution, a work stack, and a memo table.
struct Frame {
    ctx: Ctx,
    visit: Vec<Expr>,
    /// `None` value = children pushed, result pending.
    memo: FxHashMap<Expr, Option<Expr>>,
    /// The term this frame is reducing.
    init: Expr,
    /// Trie slot to fill with this frame's result (program applications).
    trie_key: Option<Vec<Expr>>,
}

impl Frame {
    fn new(ctx: Ctx, init: Expr, trie_key: Option<Vec<Expr>>) -> Frame {
        Frame {
            ctx,
            visit: vec![init.clone()],
            memo: FxHashMap::default(),
            init,
            trie_key,
        }
    }
}

impl TypeChecker {
    /// Reduce `e` under the substitution `ctx`.
    ///
    /// Irreducible subterms are returned as-is (rebuilt over their reduced
    /// children); a `fail` subterm aborts the whole call and is returned
    /// verbatim.
    pub fn evaluate(&mut self, e: &Expr, ctx: &Ctx) -> Expr {
        let mut frames: Vec<Frame> = vec![Frame::new(ctx.clone(), e.clone(), None)];
        let mut evaluated = e.clone();
        'frames: while !frames.is_empty() {
            // run the top frame until it empties or pushes a child frame
            loop {
                let cur = match frames.last().and_then(|f| f.visit.last()).cloned() {
                    Some(c) => c,
                    None => break,
                };
                let ctx_empty = frames.last().map_or(true, |f| f.ctx.is_empty());
                // the term stays the same if it is not evaluatable and
                // either it is ground or the context is empty
                if !cur.is_evaluatable() && (cur.is_ground() || ctx_empty) {
                    if let Some(f) = frames.last_mut() {
                        f.memo.insert(cur.clone(), Some(cur));
                        f.visit.pop();
                    }
                    continue;
                }
                if cur.kind() == Kind::Param {
                    // substitute if bound; unbound parameters stand
                    let res = frames
                        .last()
                        .and_then(|f| f.ctx.get(&cur))
                        .cloned()
                        .unwrap_or_else(|| cur.clone());
                    if let Some(f) = frames.last_mut() {
                        f.memo.insert(cur, Some(res));
                        f.visit.pop();
                    }
                    continue;
                }
                let ck = cur.kind();
                if frames.last().map_or(false, |f| !f.memo.contains_key(&cur)) {
                    // first visit: push children
                    if let Some(f) = frames.last_mut() {
                        f.memo.insert(cur.clone(), None);
                        if ck == Kind::EvalIfThenElse && cur.num_children() == 3 {
                            // lazy branches: visit only the condition
                            f.visit.push(cur[0].clone());
                        } else {
                            f.visit.extend(cur.children().iter().cloned());
                        }
                    }
                    continue;
                }
                if let Some(Some(_)) = frames.last().and_then(|f| f.memo.get(&cur)) {
                    // already reduced via another occurrence
                    if let Some(f) = frames.last_mut() {
                        f.visit.pop();
                    }
                    continue;
                }
                // revisit: gather the children's results from the memo
                let cchildren: Vec<Option<Expr>> = match frames.last() {
                    Some(f) => cur
                        .children()
                        .iter()
                        .map(|c| f.memo.get(c).cloned().flatten())
                        .collect(),
                    None => break,
                };
                let mut result: Option<Expr> = None;
                let mut can_evaluate = true;
                match ck {
                    Kind::Fail => {
                        // a fail term aborts the entire evaluation
                        return cur;
                    }
                    Kind::Apply => {
                        let hd_kind = cchildren.first().and_then(|c| c.as_ref()).map(Expr::kind);
                        if matches!(hd_kind, Some(Kind::ProgramConst) | Some(Kind::Oracle)) {
                            if let Some(key) =
                                cchildren.iter().cloned().collect::<Option<Vec<Expr>>>()
                            {
                                if let Some(hit) = self.eval_trie.get(&key) {
                                    result = Some(hit.clone());
                                } else {
                                    let mut new_ctx = Ctx::default();
                                    match self.evaluate_program_internal(&key, &mut new_ctx) {
                                        Some(rhs) if !new_ctx.is_empty() => {
                                            // open a scope reducing the arm's
                                            // right-hand side under the match
                                            frames.push(Frame::new(new_ctx, rhs, Some(key)));
                                            continue 'frames;
                                        }
                                        other => {
                                            if let Some(r) = &other {
                                                self.eval_trie.insert(&key, r.clone());
                                            }
                                            result = other;
                                        }
                                    }
                                }
                            }
                        }
                    }
                    Kind::EvalIfThenElse if cchildren.len() == 3 => {
                        let cond_lit = cchildren[0]
                            .as_ref()
                            .and_then(|c| self.state.get_literal(c))
                            .cloned();
                        if let Some(Literal::Bool(b)) = cond_lit {
                            let index = if b { 1 } else { 2 };
                            match cchildren[index].clone() {
                                Some(branch) => result = Some(branch),
                                None => {
                                    can_evaluate = false;
                                    if let Some(f) = frames.last_mut() {
                                        f.visit.push(cur[index].clone());
                                    }
                                }
                            }
                        } else {
                            // evaluate both branches so substitution is
                            // accurate for non-ground terms
                            for index in 1..3 {
                                if cchildren[index].is_none() {
                                    can_evaluate = false;
                                    if let Some(f) = frames.last_mut() {
                                        f.visit.push(cur[index].clone());
                                    }
                                }
                            }
                        }
                    }
                    _ if ck.is_literal_op() => {
                        if let Some(args) =
                            cchildren.iter().cloned().collect::<Option<Vec<Expr>>>()
                        {
                            result = self.evaluate_literal_op_internal(ck, &args);
                        }
                    }
                    _ => {}
                }
                if can_evaluate {
                    let reduced = match result {
                        Some(r) => r,
                        None => match cchildren.into_iter().collect::<Option<Vec<Expr>>>() {
                            // irreducible: rebuild over the reduced children
                            Some(rc) => self.state.mk_expr(ck, rc),
                            None => cur.clone(),
                        },
                    };
                    if let Some(f) = frames.last_mut() {
                        f.memo.insert(cur, Some(reduced));
                        f.visit.pop();
                    }
                }
            }
            // the top frame is exhausted: propagate its result
            if let Some(done) = frames.pop() {
                let result = done
                    .memo
                    .get(&done.init)
                    .cloned()
                    .flatten()
                    .unwrap_or(done.init);
                if let Some(parent) = frames.last_mut() {
                    trace!(
                        target: "type_checker",
                        "EVALUATE under program context = {}",
                        self.state.display(&result)
                    );
                    if let Some(app) = parent.visit.pop() {
                        parent.memo.insert(app, Some(result.clone()));
                    }
                    if let Some(key) = done.trie_key {
                        self.eval_trie.insert(&key, result.clone());
                    }
                }
                evaluated = result;
            }
        }
        trace!(
            target: "type_checker",
            "EVALUATE {} = {}",
            self.state.display(e),
            self.state.display(&evaluated)
        );
        evaluated
    }

    // ── Program dispatch ────────────────────────────────────────────────

    /// Reduce a program/oracle application, or return the application
    /// itself when it does not reduce.
    pub fn evaluate_program(&mut self, children: &[Expr], new_ctx: &mut Ctx) -> Expr {
        match self.evaluate_program_internal(children, new_ctx) {
            Some(rhs) => rhs,
            None => self.state.mk_expr(Kind::Apply, children.to_vec()),
        }
    }

    /// Try the registered reduction of `children[0]` applied to the rest.
    ///
    /// For a program constant, arms are tried in declaration order; the
    /// first arm whose patterns match every argument position returns its
    /// right-hand side with the bindings in `new_ctx` (cleared before each
    /// attempt). For an oracle, the command is run and its stdout parsed.
    /// `None` means no reduction.
    pub(crate) fn evaluate_program_internal(
        &mut self,
        children: &[Expr],
        new_ctx: &mut Ctx,
    ) -> Option<Expr> {
        if children.iter().any(|c| !c.is_ground()) {
            // do not evaluate on non-ground arguments
            return None;
        }
        let hd = children.first()?;
        match hd.kind() {
            Kind::ProgramConst => {
                let prog = self.programs.get(hd)?.clone();
                trace!(
                    target: "type_checker",
                    "INTERPRET program {}",
                    self.state.display(&children[0])
                );
                let nargs = children.len();
                for arm in prog.children() {
                    new_ctx.clear();
                    let arm_head = &arm[0];
                    if nargs != arm_head.num_children() {
                        warn!(
                            "bad number of arguments in call to {}: expected {}, found {}",
                            self.state.display(arm_head),
                            arm_head.num_children(),
                            nargs
                        );
                        return None;
                    }
                    let mut matched = true;
                    for i in 1..nargs {
                        if !match_expr(&arm_head[i], &children[i], new_ctx) {
                            matched = false;
                            break;
                        }
                    }
                    if matched {
                        trace!(target: "type_checker", "matched arm {}", self.state.display(arm_head));
                        return Some(arm[1].clone());
                    }
                }
                trace!(target: "type_checker", "failed to match");
                None
            }
            Kind::Oracle => {
                let cmd = self.state.get_oracle_cmd(hd)?.to_string();
                let mut input = String::new();
                for arg in &children[1..] {
                    input.push_str(&self.state.display(arg).to_string());
                    input.push('\n');
                }
                debug!(target: "oracles", command = %cmd, input = %input, "calling oracle");
                let (code, response) = self.runner.run(&format!("{} input.txt", cmd), &input);
                if code != 0 {
                    debug!(target: "oracles", code, "oracle failed to run");
                    return None;
                }
                debug!(target: "oracles", response = %response, "oracle responded");
                let parser = self.oracle_parser.as_mut()?;
                parser(&mut self.state, &response)
            }
            _ => None,
        }
    }

    // ── Literal operators ───────────────────────────────────────────────

    /// Reduce a literal-operator application, or return the application
    /// itself when it does not reduce.
    pub fn evaluate_literal_op(&mut self, k: Kind, args: &[Expr]) -> Expr {
        match self.evaluate_literal_op_internal(k, args) {
            Some(r) => r,
            None => self.state.mk_expr(k, args.to_vec()),
        }
    }

    pub(crate) fn evaluate_literal_op_internal(
        &mut self,
        k: Kind,
        args: &[Expr],
    ) -> Option<Expr> {
        if !check_arity(k, args.len()) {
            // malformed operator applications do not reduce
            return None;
        }
        match k {
            Kind::EvalIsEq => {
                // identity is decisive regardless of literal-ness
                if args[0] == args[1] {
                    Some(self.state.mk_true())
                } else if args.iter().all(Expr::is_ground) {
                    Some(self.state.mk_false())
                } else {
                    None
                }
            }
            Kind::EvalIfThenElse => match self.state.get_literal(&args[0]) {
                Some(Literal::Bool(b)) => Some(args[if *b { 1 } else { 2 }].clone()),
                _ => None,
            },
            Kind::EvalRequires => {
                if args[0] == args[1] {
                    Some(args[2].clone())
                } else {
                    trace!(
                        target: "type_checker",
                        "requires failed: {} == {}",
                        self.state.display(&args[0]),
                        self.state.display(&args[1])
                    );
                    None
                }
            }
            Kind::EvalCons | Kind::EvalAppend | Kind::EvalToList | Kind::EvalFromList => {
                self.evaluate_list_op(k, args)
            }
            _ => {
                if args.iter().any(|a| !a.is_ground()) {
                    return None;
                }
                // convert the arguments to literals; symbols do not evaluate
                let mut lits = Vec::new();
                for a in args {
                    match self.state.get_literal(a) {
                        Some(l) if !matches!(l, Literal::Symbol(_)) => lits.push(l.clone()),
                        _ => return None,
                    }
                }
                let refs: Vec<&Literal> = lits.iter().collect();
                let value = Literal::eval(k, &refs)?;
                Some(self.state.intern_literal(value))
            }
        }
    }

    /// The associative list primitives. The head operator must carry a
    /// list-constructor attribute (direction + nil term).
    fn evaluate_list_op(&mut self, k: Kind, args: &[Expr]) -> Option<Expr> {
        let cons = self
            .state
            .get_app_info(&args[0])
            .and_then(|info| info.cons.clone())?;
        let is_left = cons.assoc == Assoc::Left;
        let op = args[0].clone();
        let nil = cons.nil;
        let (head_index, tail_index) = if is_left { (2usize, 1usize) } else { (1usize, 2usize) };
        // the head (cons/append) or the sole argument (to_list/from_list)
        let harg = if args.len() == 2 {
            args[1].clone()
        } else {
            args[head_index].clone()
        };
        if !harg.is_ground() {
            return None;
        }
        let mut helems: Vec<Expr> = Vec::new();
        let mut ret: Expr;
        match k {
            Kind::EvalToList => {
                if harg == nil {
                    // already the empty list
                    return Some(harg);
                }
                let tail = get_nary_children(&harg, &op, &mut helems, is_left, false);
                if !helems.is_empty() {
                    // already a list
                    return Some(harg);
                }
                ret = nil;
                helems.push(tail);
            }
            Kind::EvalFromList => {
                let tail = get_nary_children(&harg, &op, &mut helems, is_left, false);
                if helems.len() == 1 {
                    if tail != nil {
                        warn!("failed to decompose {} in from_list", self.state.display(&harg));
                        return None;
                    }
                    // unwrap the singleton
                    return Some(helems.remove(0));
                }
                return Some(harg);
            }
            Kind::EvalCons => {
                ret = args[tail_index].clone();
                helems.push(harg);
            }
            Kind::EvalAppend => {
                ret = args[tail_index].clone();
                let tail = get_nary_children(&harg, &op, &mut helems, is_left, true);
                if tail != nil {
                    warn!("failed to decompose {} in append", self.state.display(&harg));
                    return None;
                }
            }
            _ => return None,
        }
        // rebuild the list form on top of `ret`, innermost element first
        let n = helems.len();
        for i in 0..n {
            let head = helems[if is_left { i } else { n - 1 - i }].clone();
            let cell = if is_left {
                [op.clone(), ret, head]
            } else {
                [op.clone(), head, ret]
            };
            ret = self.state.mk_apply(&cell);
        }
        Some(ret)
    }
}

/// Walk the list form of `e` headed by `op`, pushing elements into
/// `children` and returning the final tail. Stops after two elements unless
/// `extract_all` is set.
fn get_nary_children(
    e: &Expr,
    op: &Expr,
    children: &mut Vec<Expr>,
    is_left: bool,
    extract_all: bool,
) -> Expr {
    let mut e = e.clone();
    while e.kind() == Kind::Apply {
        let cop = e[0].clone();
        if cop.kind() != Kind::Apply {
            break;
        }
        if cop[0] != *op {
            break;
        }
        children.push(if is_left { e[1].clone() } else { cop[1].clone() });
        e = if is_left { cop[1].clone() } else { e[1].clone() };
        if !extract_all && children.len() == 2 {
            return e;
        }
    }
    e
}
