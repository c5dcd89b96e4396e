//! Classification of interactive input into complete units
use crate::{Engine, Result, StmtKind, Stmts};
use std::fmt;
use tracing::debug;

/// A complete unit of program text
pub enum Unit<E: Engine> {
    /// Evaluated for its value
    Expr(E::Expr),
    /// Executed for its side effects on globals
    Stmts(E::Program),
}

/// Classification of a single line
pub enum Line<E: Engine> {
    Complete(Unit<E>),
    /// More lines are needed
    Incomplete,
}

impl<E: Engine> fmt::Debug for Unit<E>
where
    E::Expr: fmt::Debug,
    E::Program: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Unit::Expr(e) => f.debug_tuple("Expr").field(e).finish(),
            Unit::Stmts(p) => f.debug_tuple("Stmts").field(p).finish(),
        }
    }
}

impl<E: Engine> fmt::Debug for Line<E>
where
    E::Expr: fmt::Debug,
    E::Program: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Line::Complete(u) => f.debug_tuple("Complete").field(u).finish(),
            Line::Incomplete => write!(f, "Incomplete"),
        }
    }
}

/// Classify one line typed at the primary prompt.
///
/// A line is complete on its own if it is an expression, or a single assignment or load
/// statement.  Anything else starts a block.
pub fn classify_line<E: Engine>(engine: &E, name: &str, line: &str) -> Line<E> {
    if let Ok(expr) = engine.parse_expr(name, line) {
        debug!("classified line as expression");
        return Line::Complete(Unit::Expr(expr));
    }
    if let Ok(program) = engine.parse_program(name, line) {
        if let [StmtKind::Assign | StmtKind::Load] = program.stmt_kinds()[..] {
            debug!("classified line as statement");
            return Line::Complete(Unit::Stmts(program));
        }
    }
    debug!("classified line as incomplete");
    Line::Incomplete
}

/// Classify a block of lines terminated by a blank line.
///
/// Blocks that are a single expression, such as a call spread over several lines, are
/// evaluated; everything else is a statement list.  Fails with the statement list's
/// parse error if the block is neither.
pub fn classify_block<E: Engine>(engine: &E, name: &str, text: &str) -> Result<Unit<E>> {
    if let Ok(expr) = engine.parse_expr(name, text) {
        debug!("classified block as expression");
        return Ok(Unit::Expr(expr));
    }
    debug!("classified block as statements");
    engine.parse_program(name, text).map(Unit::Stmts)
}

/// Lines accumulated while a block is being typed
#[derive(Debug, Default)]
pub struct PendingBlock {
    lines: Vec<String>,
}

impl PendingBlock {
    /// Start a block with its first line
    pub fn new(first: String) -> Self {
        Self { lines: vec![first] }
    }

    pub fn push(&mut self, line: String) {
        self.lines.push(line);
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Join lines into program text, each line newline-terminated
    pub fn into_text(self) -> String {
        self.lines.iter().fold(String::new(), |mut text, line| {
            text.push_str(line);
            text.push('\n');
            text
        })
    }
}
