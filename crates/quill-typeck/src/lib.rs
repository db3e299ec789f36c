//! Type checker and evaluator for the Quill proof language.
//!
//! The core of the assistant: given a term over the shared expression DAG
//! of `quill-core`, synthesize its type (`TypeChecker::get_type`), reduce
//! it under a substitution (`TypeChecker::evaluate`), and match patterns
//! against terms (`match_expr`). Programs (ordered pattern/rhs arms) and
//! oracles (external subprocesses) extend the reduction relation; both are
//! dispatched through the evaluator with identity-keyed memoization.
//!
//! Everything traverses with explicit work stacks, so deeply nested terms
//! are safe on any native stack.

pub mod checker;
pub mod error;
mod eval;
pub mod matcher;
pub mod oracle;

pub use checker::TypeChecker;
pub use error::TypeError;
pub use matcher::match_expr;
pub use oracle::{OracleParser, ShellRunner, SubprocessRunner};
