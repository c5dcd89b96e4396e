//! The contract an embedded language implementation fulfills to be driven by a [Session]
//!
//! [Session]: crate::Session
use crate::{Globals, Result, Thread};
use std::fmt::Display;

/// Values produced by an [Engine]
pub trait Value: Clone + Display {
    /// Whether this is the canonical "no value" sentinel, which the REPL does not print
    fn is_none(&self) -> bool;
}

/// Shape of a top-level statement, as far as input classification cares
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StmtKind {
    Assign,
    Load,
    Other,
}

/// A parsed statement list
pub trait Stmts {
    /// Kind of each top-level statement, in order
    fn stmt_kinds(&self) -> Vec<StmtKind>;
}

/// A language implementation: parser plus evaluator.
///
/// `name` arguments identify the source in positions and tracebacks, e.g. `<stdin>`.
pub trait Engine: Sized {
    type Value: Value;
    type Expr;
    type Program: Stmts;

    /// Parse text that is exactly one complete expression
    fn parse_expr(&self, name: &str, text: &str) -> Result<Self::Expr>;

    /// Parse text as a statement list
    fn parse_program(&self, name: &str, text: &str) -> Result<Self::Program>;

    /// Evaluate an expression against `globals`
    fn eval(
        &self,
        thread: &mut Thread<'_, Self>,
        globals: &Globals<Self::Value>,
        expr: &Self::Expr,
    ) -> Result<Self::Value>;

    /// Execute statements, writing assigned globals back into `globals` as they are
    /// assigned.  Bindings made before a failure are kept.  With `freeze` the globals are
    /// frozen once execution succeeds.
    fn exec(
        &self,
        thread: &mut Thread<'_, Self>,
        globals: &mut Globals<Self::Value>,
        program: &Self::Program,
        freeze: bool,
    ) -> Result<()>;

    /// Execute the module identified by `module` in fresh globals and return them frozen
    fn exec_file(&self, thread: &mut Thread<'_, Self>, module: &str)
        -> Result<Globals<Self::Value>>;
}
