//! Errors surfaced by engines and the session machinery
use std::fmt;

/// A location in source text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Position {
    pub file: String,
    pub line: u32,
    pub col: u32,
}

impl Position {
    pub fn new(file: impl Into<String>, line: u32, col: u32) -> Self {
        Self {
            file: file.into(),
            line,
            col,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.col)
    }
}

/// A single active call at the point of failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Position of the call site (or of the failing operation for the innermost frame)
    pub pos: Position,
    /// Name of the enclosing function, `<toplevel>` for module level code
    pub name: String,
}

impl Frame {
    pub fn new(pos: Position, name: impl Into<String>) -> Self {
        Self {
            pos,
            name: name.into(),
        }
    }
}

/// Ordered call stack, outermost frame first
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallStack(Vec<Frame>);

impl CallStack {
    pub fn new(frames: Vec<Frame>) -> Self {
        Self(frames)
    }

    /// Frames from the outermost active call down to the point of failure
    pub fn frames(&self) -> &[Frame] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<Frame>> for CallStack {
    fn from(frames: Vec<Frame>) -> Self {
        Self(frames)
    }
}

/// Errors from parsing, evaluating, or loading program text
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("{pos}: {msg}")]
    Parse { pos: Position, msg: String },

    #[error("{msg}")]
    Eval {
        msg: String,
        stack: Option<CallStack>,
    },

    #[error("cycle in load graph - {0}")]
    Cycle(String),

    #[error("cannot load {module} - {msg}")]
    Load { module: String, msg: String },

    #[error("evaluation cancelled")]
    Cancelled,
}

impl Error {
    /// Parse error at given position
    pub fn parse(pos: Position, msg: impl Into<String>) -> Self {
        Self::Parse {
            pos,
            msg: msg.into(),
        }
    }

    /// Evaluation error without call stack
    pub fn eval(msg: impl Into<String>) -> Self {
        Self::Eval {
            msg: msg.into(),
            stack: None,
        }
    }

    /// Evaluation error carrying the call stack active at the point of failure
    pub fn eval_with_stack(msg: impl Into<String>, stack: CallStack) -> Self {
        Self::Eval {
            msg: msg.into(),
            stack: Some(stack),
        }
    }

    /// The call stack, if this error carries one
    pub fn call_stack(&self) -> Option<&CallStack> {
        match self {
            Self::Eval { stack, .. } => stack.as_ref(),
            _ => None,
        }
    }
}
