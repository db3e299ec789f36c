//! Shared expression representation for the Quill proof checker.
//!
//! This crate holds everything below the type checker: the closed [`Kind`]
//! registry, the hash-consed expression DAG ([`Expr`]), typed literal
//! values with their operator back-end ([`Literal`]), and the owning
//! [`State`] -- factory, symbol table, attribute and oracle registries, and
//! the debug S-expression printer.

pub mod expr;
pub mod kind;
pub mod literal;
pub mod state;

pub use expr::{Ctx, Expr};
pub use kind::Kind;
pub use literal::Literal;
pub use state::{AppInfo, Assoc, ExprInfo, ListCons, State};
