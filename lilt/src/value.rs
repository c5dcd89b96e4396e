//! Runtime values
use std::fmt;
use std::sync::{Arc, OnceLock, Weak};

use crate::ast::FuncDef;
use sprig::Globals;

/// A Lilt value
#[derive(Debug, Clone)]
pub enum Val {
    None,
    Bool(bool),
    Int(i64),
    Str(String),
    Function(Arc<Function>),
    Builtin(Builtin),
}

/// A user defined function and the file it was defined in
pub struct Function {
    pub def: Arc<FuncDef>,
    pub file: String,
    /// Globals of the defining module once it has finished executing. The engine owns them.
    /// Unset for functions defined interactively, which resolve names in the caller's globals.
    pub module: OnceLock<Weak<Globals<Val>>>,
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function")
            .field("name", &self.def.name)
            .field("file", &self.file)
            .finish_non_exhaustive()
    }
}

/// Functions provided by the interpreter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Fail,
    Len,
    Str,
}

impl Builtin {
    pub const ALL: [Builtin; 3] = [Builtin::Fail, Builtin::Len, Builtin::Str];

    pub fn name(&self) -> &'static str {
        match self {
            Builtin::Fail => "fail",
            Builtin::Len => "len",
            Builtin::Str => "str",
        }
    }
}

impl Val {
    pub fn type_name(&self) -> &'static str {
        match self {
            Val::None => "NoneType",
            Val::Bool(_) => "bool",
            Val::Int(_) => "int",
            Val::Str(_) => "string",
            Val::Function(_) => "function",
            Val::Builtin(_) => "builtin_function_or_method",
        }
    }

    pub fn truth(&self) -> bool {
        match self {
            Val::None => false,
            Val::Bool(b) => *b,
            Val::Int(i) => *i != 0,
            Val::Str(s) => !s.is_empty(),
            Val::Function(_) | Val::Builtin(_) => true,
        }
    }

    /// Representation used by `str()`: strings are not quoted
    pub fn to_str(&self) -> String {
        match self {
            Val::Str(s) => s.clone(),
            v => v.to_string(),
        }
    }
}

impl PartialEq for Val {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Val::None, Val::None) => true,
            (Val::Bool(a), Val::Bool(b)) => a == b,
            (Val::Int(a), Val::Int(b)) => a == b,
            (Val::Str(a), Val::Str(b)) => a == b,
            (Val::Function(a), Val::Function(b)) => Arc::ptr_eq(a, b),
            (Val::Builtin(a), Val::Builtin(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Val {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Val::None => write!(f, "None"),
            Val::Bool(true) => write!(f, "True"),
            Val::Bool(false) => write!(f, "False"),
            Val::Int(i) => write!(f, "{i}"),
            Val::Str(s) => write!(f, "{s:?}"),
            Val::Function(func) => write!(f, "<function {}>", func.def.name),
            Val::Builtin(b) => write!(f, "<built-in function {}>", b.name()),
        }
    }
}

impl sprig::Value for Val {
    fn is_none(&self) -> bool {
        matches!(self, Val::None)
    }
}

impl From<i64> for Val {
    fn from(i: i64) -> Self {
        Val::Int(i)
    }
}

impl From<bool> for Val {
    fn from(b: bool) -> Self {
        Val::Bool(b)
    }
}

impl From<&str> for Val {
    fn from(s: &str) -> Self {
        Val::Str(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sprig::Value;

    #[test]
    fn display() {
        assert_eq!(Val::None.to_string(), "None");
        assert_eq!(Val::from(true).to_string(), "True");
        assert_eq!(Val::from(-3).to_string(), "-3");
        assert_eq!(Val::from("hi").to_string(), "\"hi\"");
        assert_eq!(Val::from("hi").to_str(), "hi");
        assert_eq!(Val::Builtin(Builtin::Len).to_string(), "<built-in function len>");
    }

    #[test]
    fn only_none_is_none() {
        assert!(Val::None.is_none());
        assert!(!Val::from(0).is_none());
        assert!(!Val::from(false).is_none());
    }

    #[test]
    fn truth() {
        assert!(!Val::from(0).truth());
        assert!(!Val::from("").truth());
        assert!(Val::from("x").truth());
        assert!(!Val::None.truth());
    }
}
