//! Integration tests for program and oracle dispatch.
//!
//! These tests exercise:
//! - Arm selection in declaration order with per-arm context clearing
//! - Reduction of the selected right-hand side under the match bindings
//! - Memoization of applications by argument identity
//! - Oracle dispatch through an injected runner and response parser

use std::cell::RefCell;
use std::rc::Rc;

use quill_core::{Ctx, Expr, Kind, State};
use quill_typeck::{SubprocessRunner, TypeChecker};

// ── Helpers ────────────────────────────────────────────────────────────

fn checker() -> TypeChecker {
    TypeChecker::new(State::new())
}

fn num(tc: &mut TypeChecker, spelling: &str) -> Expr {
    tc.state_mut().mk_literal(Kind::Numeral, spelling).expect("numeral spelling")
}

fn param(tc: &mut TypeChecker, name: &str) -> Expr {
    let ty = tc.state_mut().mk_abstract_type();
    tc.state_mut().mk_symbol(Kind::Param, name, ty)
}

fn eval(tc: &mut TypeChecker, e: &Expr) -> Expr {
    tc.evaluate(e, &Ctx::default())
}

/// Define a two-arm addition program:
/// `P(x, 0) -> x` and `P(x, y) -> x + y`. Returns the program constant.
fn define_add_program(tc: &mut TypeChecker) -> Expr {
    let int_ty = tc.state_mut().mk_builtin_type(Kind::Numeral);
    let p_ty = {
        let args = vec![int_ty.clone(), int_ty.clone()];
        tc.state_mut().mk_function_type(args, int_ty)
    };
    let p = tc.state_mut().mk_symbol(Kind::ProgramConst, "P", p_ty);
    let x = param(tc, "x");
    let y = param(tc, "y");
    let zero = num(tc, "0");

    let head1 = tc
        .state_mut()
        .mk_expr(Kind::Apply, vec![p.clone(), x.clone(), zero]);
    let arm1 = tc.state_mut().mk_expr(Kind::Tuple, vec![head1, x.clone()]);

    let head2 = tc
        .state_mut()
        .mk_expr(Kind::Apply, vec![p.clone(), x.clone(), y.clone()]);
    let rhs2 = tc.state_mut().mk_expr(Kind::EvalAdd, vec![x, y]);
    let arm2 = tc.state_mut().mk_expr(Kind::Tuple, vec![head2, rhs2]);

    let body = tc.state_mut().mk_expr(Kind::Tuple, vec![arm1, arm2]);
    tc.define_program(&p, &body);
    p
}

// ── Programs ───────────────────────────────────────────────────────────

/// The first arm whose patterns match wins; its rhs is reduced under the
/// bindings.
#[test]
fn test_program_arm_selection() {
    let mut tc = checker();
    let p = define_add_program(&mut tc);
    assert!(tc.has_program(&p));

    let five = num(&mut tc, "5");
    let zero = num(&mut tc, "0");
    let two = num(&mut tc, "2");
    let seven = num(&mut tc, "7");

    let first = tc
        .state_mut()
        .mk_expr(Kind::Apply, vec![p.clone(), five.clone(), zero]);
    assert_eq!(eval(&mut tc, &first), five);

    let second = tc.state_mut().mk_expr(Kind::Apply, vec![p, five, two]);
    assert_eq!(eval(&mut tc, &second), seven);
}

/// Applications with non-ground arguments do not dispatch.
#[test]
fn test_non_ground_arguments_block_dispatch() {
    let mut tc = checker();
    let p = define_add_program(&mut tc);
    let q = param(&mut tc, "q");
    let zero = num(&mut tc, "0");
    let app = tc.state_mut().mk_expr(Kind::Apply, vec![p, q, zero]);
    assert_eq!(eval(&mut tc, &app), app);
}

/// No arm matching: the application is irreducible.
#[test]
fn test_no_matching_arm() {
    let mut tc = checker();
    let int_ty = tc.state_mut().mk_builtin_type(Kind::Numeral);
    let p_ty = tc.state_mut().mk_function_type(vec![int_ty.clone()], int_ty);
    let p = tc.state_mut().mk_symbol(Kind::ProgramConst, "Q", p_ty);
    let zero = num(&mut tc, "0");
    let head = tc.state_mut().mk_expr(Kind::Apply, vec![p.clone(), zero.clone()]);
    let arm = tc.state_mut().mk_expr(Kind::Tuple, vec![head, zero]);
    let body = tc.state_mut().mk_expr(Kind::Tuple, vec![arm]);
    tc.define_program(&p, &body);

    let one = num(&mut tc, "1");
    let app = tc.state_mut().mk_expr(Kind::Apply, vec![p, one]);
    assert_eq!(eval(&mut tc, &app), app);
}

/// `evaluate_program` surfaces the matched rhs and bindings without
/// reducing them.
#[test]
fn test_evaluate_program_returns_raw_rhs() {
    let mut tc = checker();
    let p = define_add_program(&mut tc);
    let five = num(&mut tc, "5");
    let zero = num(&mut tc, "0");
    let children = [p, five.clone(), zero];
    let mut ctx = Ctx::default();
    let rhs = tc.evaluate_program(&children, &mut ctx);
    assert_eq!(rhs.kind(), Kind::Param);
    assert_eq!(ctx.get(&rhs), Some(&five));
}

/// A program whose rhs is `fail` aborts the evaluation with the fail term.
#[test]
fn test_program_failure_propagates() {
    let mut tc = checker();
    let int_ty = tc.state_mut().mk_builtin_type(Kind::Numeral);
    let p_ty = tc.state_mut().mk_function_type(vec![int_ty.clone()], int_ty);
    let p = tc.state_mut().mk_symbol(Kind::ProgramConst, "R", p_ty);
    let x = param(&mut tc, "x");
    let fail = tc.state_mut().mk_expr(Kind::Fail, vec![]);
    let head = tc.state_mut().mk_expr(Kind::Apply, vec![p.clone(), x]);
    let arm = tc.state_mut().mk_expr(Kind::Tuple, vec![head, fail.clone()]);
    let body = tc.state_mut().mk_expr(Kind::Tuple, vec![arm]);
    tc.define_program(&p, &body);

    let one = num(&mut tc, "1");
    let app = tc.state_mut().mk_expr(Kind::Apply, vec![p, one]);
    assert_eq!(eval(&mut tc, &app), fail);
}

// ── Oracles ────────────────────────────────────────────────────────────

/// A runner that records its calls and replays a canned response.
struct FakeRunner {
    calls: Rc<RefCell<Vec<(String, String)>>>,
    code: i32,
    response: String,
}

impl SubprocessRunner for FakeRunner {
    fn run(&mut self, command: &str, input: &str) -> (i32, String) {
        self.calls
            .borrow_mut()
            .push((command.to_string(), input.to_string()));
        (self.code, self.response.clone())
    }
}

fn oracle_checker(code: i32, response: &str) -> (TypeChecker, Rc<RefCell<Vec<(String, String)>>>) {
    let mut tc = checker();
    let calls = Rc::new(RefCell::new(Vec::new()));
    tc.set_runner(Box::new(FakeRunner {
        calls: Rc::clone(&calls),
        code,
        response: response.to_string(),
    }));
    tc.set_oracle_parser(Box::new(|state, response| {
        state.mk_literal(Kind::Numeral, response.trim())
    }));
    (tc, calls)
}

/// Oracle dispatch: serialize arguments line-per-line, run the command,
/// parse stdout.
#[test]
fn test_oracle_round_trip() {
    let (mut tc, calls) = oracle_checker(0, "10\n");
    let int_ty = tc.state_mut().mk_builtin_type(Kind::Numeral);
    let o_ty = tc.state_mut().mk_function_type(vec![int_ty.clone()], int_ty);
    let orc = tc.state_mut().declare_oracle("double", "double.sh", o_ty);

    let five = num(&mut tc, "5");
    let ten = num(&mut tc, "10");
    let app = tc.state_mut().mk_expr(Kind::Apply, vec![orc, five]);
    assert_eq!(eval(&mut tc, &app), ten);

    let recorded = calls.borrow();
    assert_eq!(recorded.len(), 1);
    assert_eq!(recorded[0].0, "double.sh input.txt");
    assert_eq!(recorded[0].1, "5\n");
}

/// Oracle results are memoized by argument identity: the command runs once.
#[test]
fn test_oracle_memoization() {
    let (mut tc, calls) = oracle_checker(0, "10\n");
    let int_ty = tc.state_mut().mk_builtin_type(Kind::Numeral);
    let o_ty = tc.state_mut().mk_function_type(vec![int_ty.clone()], int_ty);
    let orc = tc.state_mut().declare_oracle("double", "double.sh", o_ty);

    let five = num(&mut tc, "5");
    let app = tc.state_mut().mk_expr(Kind::Apply, vec![orc, five]);
    let r1 = eval(&mut tc, &app);
    let r2 = eval(&mut tc, &app);
    assert_eq!(r1.addr(), r2.addr());
    assert_eq!(calls.borrow().len(), 1);
}

/// A nonzero exit code leaves the application irreducible.
#[test]
fn test_oracle_failure() {
    let (mut tc, _calls) = oracle_checker(1, "");
    let int_ty = tc.state_mut().mk_builtin_type(Kind::Numeral);
    let o_ty = tc.state_mut().mk_function_type(vec![int_ty.clone()], int_ty);
    let orc = tc.state_mut().declare_oracle("broken", "broken.sh", o_ty);
    let five = num(&mut tc, "5");
    let app = tc.state_mut().mk_expr(Kind::Apply, vec![orc, five]);
    assert_eq!(eval(&mut tc, &app), app);
}

/// With no response parser installed, oracles are irreducible.
#[test]
fn test_oracle_without_parser() {
    let mut tc = checker();
    let calls = Rc::new(RefCell::new(Vec::new()));
    tc.set_runner(Box::new(FakeRunner {
        calls: Rc::clone(&calls),
        code: 0,
        response: "10".to_string(),
    }));
    let int_ty = tc.state_mut().mk_builtin_type(Kind::Numeral);
    let o_ty = tc.state_mut().mk_function_type(vec![int_ty.clone()], int_ty);
    let orc = tc.state_mut().declare_oracle("double", "double.sh", o_ty);
    let five = num(&mut tc, "5");
    let app = tc.state_mut().mk_expr(Kind::Apply, vec![orc, five]);
    assert_eq!(eval(&mut tc, &app), app);
}
