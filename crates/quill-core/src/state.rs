//! The state registry and expression factory.
//!
//! `State` exclusively owns every expression node for the lifetime of a
//! run. It hash-conses composite nodes (equal inputs return the identical
//! node), interns literal leaves by canonical spelling, mints fresh symbol
//! leaves with their types pre-cached, and keeps the side tables the rest
//! of the system consults:
//! - literal records for literal leaves (and symbol records for symbols)
//! - printable names (`ExprInfo`)
//! - per-operator attributes (`AppInfo`: list associativity + nil term)
//! - oracle shell commands
//! - the name-to-expression symbol table

use std::fmt;

use rustc_hash::FxHashMap;
use serde::Serialize;

use crate::expr::Expr;
use crate::kind::Kind;
use crate::literal::Literal;

/// Direction of an associative list operator.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub enum Assoc {
    Right,
    Left,
}

/// The list-constructor attribute of an operator: its direction and the
/// designated nil element terminating its lists.
#[derive(Clone, Debug)]
pub struct ListCons {
    pub assoc: Assoc,
    pub nil: Expr,
}

/// Per-operator attributes.
#[derive(Clone, Debug, Default)]
pub struct AppInfo {
    pub cons: Option<ListCons>,
}

/// Printable information registered for a leaf (its source name).
#[derive(Clone, Debug)]
pub struct ExprInfo {
    pub name: String,
}

/// The expression factory and registry. See the module docs.
pub struct State {
    /// Hash-consing table for composite and 0-ary structural nodes.
    intern: FxHashMap<(Kind, Vec<Expr>), Expr>,
    /// Literal interning, keyed by kind and canonical spelling.
    literal_index: FxHashMap<(Kind, String), Expr>,
    /// Literal records of literal leaves and symbols.
    literals: FxHashMap<Expr, Literal>,
    infos: FxHashMap<Expr, ExprInfo>,
    app_infos: FxHashMap<Expr, AppInfo>,
    oracle_cmds: FxHashMap<Expr, String>,
    /// Name bindings; the latest binding for a name wins.
    symbols: FxHashMap<String, Expr>,
    /// Built-in types assigned to literal kinds with no explicit type rule.
    builtin_types: FxHashMap<Kind, Expr>,
    /// The distinguished `self` parameter of literal type rules.
    self_param: Expr,
}

impl State {
    pub fn new() -> State {
        let self_param = Expr::new(Kind::Param, Vec::new());
        let mut state = State {
            intern: FxHashMap::default(),
            literal_index: FxHashMap::default(),
            literals: FxHashMap::default(),
            infos: FxHashMap::default(),
            app_infos: FxHashMap::default(),
            oracle_cmds: FxHashMap::default(),
            symbols: FxHashMap::default(),
            builtin_types: FxHashMap::default(),
            self_param: self_param.clone(),
        };
        state.infos.insert(self_param, ExprInfo { name: "self".to_string() });
        state
    }

    // ── Construction ────────────────────────────────────────────────────

    /// Hash-consing constructor: returns the unique node with this kind and
    /// these children. Pure and deterministic in its arguments.
    ///
    /// Literal leaves must be built with [`State::mk_literal`] and symbol
    /// leaves with [`State::mk_symbol`]; those carry registry records this
    /// constructor does not create.
    pub fn mk_expr(&mut self, kind: Kind, children: Vec<Expr>) -> Expr {
        let key = (kind, children);
        if let Some(e) = self.intern.get(&key) {
            return e.clone();
        }
        let e = Expr::new(key.0, key.1.clone());
        self.intern.insert(key, e.clone());
        e
    }

    /// Build a left-curried `Apply` chain: `(((c0 c1) c2) ...)`. This is
    /// the cell shape of associative list forms.
    pub fn mk_apply(&mut self, children: &[Expr]) -> Expr {
        let mut iter = children.iter();
        let mut ret = match iter.next() {
            Some(first) => first.clone(),
            None => return self.mk_expr(Kind::Apply, Vec::new()),
        };
        for c in iter {
            ret = self.mk_expr(Kind::Apply, vec![ret, c.clone()]);
        }
        ret
    }

    pub fn mk_type(&mut self) -> Expr {
        self.mk_expr(Kind::Type, Vec::new())
    }

    pub fn mk_bool_type(&mut self) -> Expr {
        self.mk_expr(Kind::BoolType, Vec::new())
    }

    pub fn mk_abstract_type(&mut self) -> Expr {
        self.mk_expr(Kind::AbstractType, Vec::new())
    }

    pub fn mk_nil(&mut self) -> Expr {
        self.mk_expr(Kind::Nil, Vec::new())
    }

    /// A function type `(-> args ret)`; the return type is the last child.
    pub fn mk_function_type(&mut self, args: Vec<Expr>, ret: Expr) -> Expr {
        let mut children = args;
        children.push(ret);
        self.mk_expr(Kind::FunctionType, children)
    }

    /// The built-in type assigned to a literal kind when no explicit type
    /// rule has been installed.
    pub fn mk_builtin_type(&mut self, kind: Kind) -> Expr {
        if kind == Kind::Boolean {
            return self.mk_bool_type();
        }
        if let Some(e) = self.builtin_types.get(&kind) {
            return e.clone();
        }
        let name = match kind {
            Kind::Numeral => "Int",
            Kind::Decimal => "Rat",
            Kind::Hexadecimal => "Hex",
            Kind::Binary => "Bin",
            Kind::String => "Str",
            _ => return self.mk_abstract_type(),
        };
        let ty = self.mk_type();
        let e = self.mk_symbol(Kind::Const, name, ty);
        self.builtin_types.insert(kind, e.clone());
        e
    }

    /// The distinguished `self` parameter substituted by literal type rules.
    pub fn mk_self(&self) -> Expr {
        self.self_param.clone()
    }

    pub fn mk_true(&mut self) -> Expr {
        self.intern_literal(Literal::Bool(true))
    }

    pub fn mk_false(&mut self) -> Expr {
        self.intern_literal(Literal::Bool(false))
    }

    /// Parse and intern a literal leaf. Equal spellings of the same kind
    /// return the identical node; spellings are canonicalized first
    /// (`#xAB` and `ab` intern to the same hexadecimal). `None` when the
    /// spelling does not denote a value of the kind.
    pub fn mk_literal(&mut self, kind: Kind, spelling: &str) -> Option<Expr> {
        Literal::parse(kind, spelling).map(|lit| self.intern_literal(lit))
    }

    /// Intern an already-built literal value.
    pub fn intern_literal(&mut self, lit: Literal) -> Expr {
        let key = (lit.kind(), lit.spelling());
        if let Some(e) = self.literal_index.get(&key) {
            return e.clone();
        }
        let e = Expr::new(key.0, Vec::new());
        self.infos.insert(e.clone(), ExprInfo { name: lit.to_string() });
        self.literals.insert(e.clone(), lit);
        self.literal_index.insert(key, e.clone());
        e
    }

    /// Mint a fresh symbol leaf (`Const`, `Variable`, `Param`,
    /// `ProgramConst`, `Oracle`) with its type pre-cached. Symbols are
    /// never interned: two declarations of the same name are distinct
    /// nodes. The name is bound in the symbol table (last binding wins).
    pub fn mk_symbol(&mut self, kind: Kind, name: &str, ty: Expr) -> Expr {
        let e = Expr::new(kind, Vec::new());
        e.cache_ty(ty);
        self.infos.insert(e.clone(), ExprInfo { name: name.to_string() });
        self.literals.insert(e.clone(), Literal::Symbol(name.to_string()));
        self.symbols.insert(name.to_string(), e.clone());
        e
    }

    /// Declare an oracle: a symbol whose applications are reduced by an
    /// external command.
    pub fn declare_oracle(&mut self, name: &str, cmd: &str, ty: Expr) -> Expr {
        let e = self.mk_symbol(Kind::Oracle, name, ty);
        self.oracle_cmds.insert(e.clone(), cmd.to_string());
        e
    }

    /// Record the list-constructor attribute of an operator.
    pub fn mark_assoc_nil(&mut self, op: &Expr, assoc: Assoc, nil: Expr) {
        self.app_infos.entry(op.clone()).or_default().cons = Some(ListCons { assoc, nil });
    }

    // ── Lookups ─────────────────────────────────────────────────────────

    pub fn get_literal(&self, e: &Expr) -> Option<&Literal> {
        self.literals.get(e)
    }

    pub fn get_info(&self, e: &Expr) -> Option<&ExprInfo> {
        self.infos.get(e)
    }

    pub fn get_app_info(&self, e: &Expr) -> Option<&AppInfo> {
        self.app_infos.get(e)
    }

    pub fn get_oracle_cmd(&self, e: &Expr) -> Option<&str> {
        self.oracle_cmds.get(e).map(String::as_str)
    }

    pub fn get_symbol(&self, name: &str) -> Option<Expr> {
        self.symbols.get(name).cloned()
    }

    // ── Printing ────────────────────────────────────────────────────────

    /// Debug S-expression printer: `(spelling child ... child)` for
    /// non-`Apply` inner nodes, `(child0 child1 ...)` for `Apply`, leaves
    /// by registered name or kind spelling.
    pub fn display<'a>(&'a self, e: &'a Expr) -> ExprDisplay<'a> {
        ExprDisplay { state: self, expr: e }
    }
}

impl Default for State {
    fn default() -> Self {
        State::new()
    }
}

/// Borrowing display adapter returned by [`State::display`].
pub struct ExprDisplay<'a> {
    state: &'a State,
    expr: &'a Expr,
}

impl fmt::Display for ExprDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // iterative: (node, index of the next child to print)
        let mut visit: Vec<(Expr, usize)> = vec![(self.expr.clone(), 0)];
        loop {
            let (cur, idx) = match visit.last() {
                Some(top) => (top.0.clone(), top.1),
                None => return Ok(()),
            };
            if idx == 0 && cur.num_children() == 0 {
                match self.state.get_info(&cur) {
                    Some(info) => f.write_str(&info.name)?,
                    None => write!(f, "{}", cur.kind())?,
                }
                visit.pop();
                continue;
            }
            if idx == cur.num_children() {
                f.write_str(")")?;
                visit.pop();
                continue;
            }
            if idx == 0 {
                f.write_str("(")?;
                if cur.kind() != Kind::Apply {
                    write!(f, "{} ", cur.kind())?;
                }
            } else {
                f.write_str(" ")?;
            }
            if let Some(top) = visit.last_mut() {
                top.1 = idx + 1;
            }
            visit.push((cur[idx].clone(), 0));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mk_expr_hash_conses() {
        let mut s = State::new();
        let t1 = s.mk_type();
        let t2 = s.mk_type();
        assert_eq!(t1, t2);
        let f1 = s.mk_function_type(vec![t1.clone()], t1.clone());
        let f2 = s.mk_function_type(vec![t2.clone()], t2);
        assert_eq!(f1, f2);
        assert_eq!(f1.addr(), f2.addr());
    }

    #[test]
    fn symbols_are_fresh() {
        let mut s = State::new();
        let ty = s.mk_type();
        let a = s.mk_symbol(Kind::Const, "a", ty.clone());
        let b = s.mk_symbol(Kind::Const, "a", ty);
        assert_ne!(a, b);
        // the symbol table keeps the latest binding
        assert_eq!(s.get_symbol("a"), Some(b));
    }

    #[test]
    fn literals_intern_by_canonical_spelling() {
        let mut s = State::new();
        let a = s.mk_literal(Kind::Numeral, "5").unwrap();
        let b = s.mk_literal(Kind::Numeral, "5").unwrap();
        assert_eq!(a, b);
        let h1 = s.mk_literal(Kind::Hexadecimal, "#xAB").unwrap();
        let h2 = s.mk_literal(Kind::Hexadecimal, "ab").unwrap();
        assert_eq!(h1, h2);
        assert!(s.get_literal(&a).is_some());
        assert_eq!(s.mk_literal(Kind::Numeral, "five"), None);
    }

    #[test]
    fn builtin_types_are_stable() {
        let mut s = State::new();
        let i1 = s.mk_builtin_type(Kind::Numeral);
        let i2 = s.mk_builtin_type(Kind::Numeral);
        assert_eq!(i1, i2);
        let b = s.mk_builtin_type(Kind::Boolean);
        let bt = s.mk_bool_type();
        assert_eq!(b, bt);
    }

    #[test]
    fn app_info_round_trip() {
        let mut s = State::new();
        let ty = s.mk_type();
        let or = s.mk_symbol(Kind::Const, "or", ty);
        let nil = s.mk_false();
        s.mark_assoc_nil(&or, Assoc::Right, nil.clone());
        let info = s.get_app_info(&or).unwrap();
        let cons = info.cons.as_ref().unwrap();
        assert_eq!(cons.assoc, Assoc::Right);
        assert_eq!(cons.nil, nil);
    }

    #[test]
    fn printer_renders_s_expressions() {
        let mut s = State::new();
        let ty = s.mk_type();
        let or = s.mk_symbol(Kind::Const, "or", ty.clone());
        let a = s.mk_symbol(Kind::Const, "a", ty);
        let nil = s.mk_false();
        let cell = s.mk_apply(&[or, a, nil]);
        insta::assert_snapshot!(s.display(&cell).to_string(), @"((or a) false)");

        let two = s.mk_literal(Kind::Numeral, "2").unwrap();
        let three = s.mk_literal(Kind::Numeral, "3").unwrap();
        let add = s.mk_expr(Kind::EvalAdd, vec![two, three]);
        insta::assert_snapshot!(s.display(&add).to_string(), @"(eval.add 2 3)");

        let t = s.mk_type();
        let bt = s.mk_bool_type();
        let fun = s.mk_function_type(vec![t], bt);
        insta::assert_snapshot!(s.display(&fun).to_string(), @"(-> Type Bool)");
    }

    #[test]
    fn printer_renders_string_literals_quoted() {
        let mut s = State::new();
        let lit = s.mk_literal(Kind::String, "ok").unwrap();
        assert_eq!(s.display(&lit).to_string(), "\"ok\"");
    }
}
