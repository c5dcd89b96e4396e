//! Lilt: a small indentation-structured scripting language.
//!
//! Lilt exists to drive a [sprig::Session]: integers, strings, booleans and `None`,
//! arithmetic and comparisons, function calls, `def` / `return` / `if` / `while` / `pass`,
//! assignment, `load`, and the builtins `fail`, `len` and `str`.
mod ast;
mod eval;
mod lex;
mod parse;
mod value;

pub use ast::{Expr, FuncDef, Program, Span, Stmt};
pub use value::{Builtin, Function, Val};

use eval::Interp;
use sprig::{Engine, Error, Globals, Result, Thread};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

/// Where module text comes from
#[derive(Debug, Clone)]
enum Source {
    /// Files relative to a root directory
    Dir(PathBuf),
    /// Fixed set of named modules
    Memory(HashMap<String, String>),
}

/// The Lilt engine
#[derive(Debug, Clone)]
pub struct Lilt {
    source: Source,
    /// Globals of executed modules, referenced weakly by their functions
    modules: Arc<Mutex<Vec<Arc<Globals<Val>>>>>,
}

impl Lilt {
    /// Engine reading modules from the current directory
    pub fn new() -> Self {
        Self::with_root(".")
    }

    /// Engine reading modules from files under `root`
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            source: Source::Dir(root.into()),
            modules: Default::default(),
        }
    }

    /// Engine whose modules are the given `(name, text)` pairs
    pub fn with_modules<'a>(modules: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let modules = modules
            .into_iter()
            .map(|(name, text)| (name.to_string(), text.to_string()))
            .collect();
        Self {
            source: Source::Memory(modules),
            modules: Default::default(),
        }
    }

    fn read(&self, module: &str) -> Result<String> {
        let load_err = |msg: String| Error::Load {
            module: module.to_string(),
            msg,
        };
        match &self.source {
            Source::Dir(root) => {
                std::fs::read_to_string(root.join(module)).map_err(|e| load_err(e.to_string()))
            }
            Source::Memory(modules) => modules
                .get(module)
                .cloned()
                .ok_or_else(|| load_err("no such module".to_string())),
        }
    }
}

impl Default for Lilt {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine for Lilt {
    type Value = Val;
    type Expr = Expr;
    type Program = Program;

    fn parse_expr(&self, name: &str, text: &str) -> Result<Expr> {
        parse::parse_expr(name, text)
    }

    fn parse_program(&self, name: &str, text: &str) -> Result<Program> {
        parse::parse_program(name, text)
    }

    fn eval(
        &self,
        thread: &mut Thread<'_, Self>,
        globals: &Globals<Val>,
        expr: &Expr,
    ) -> Result<Val> {
        Interp::new(self, thread).eval_expr(globals, expr)
    }

    fn exec(
        &self,
        thread: &mut Thread<'_, Self>,
        globals: &mut Globals<Val>,
        program: &Program,
        freeze: bool,
    ) -> Result<()> {
        Interp::new(self, thread).exec_module(globals, &program.stmts)?;
        if freeze {
            globals.freeze();
        }
        Ok(())
    }

    fn exec_file(&self, thread: &mut Thread<'_, Self>, module: &str) -> Result<Globals<Val>> {
        debug!("exec_file {module}");
        let text = self.read(module)?;
        let program = self.parse_program(module, &text)?;
        let mut globals = Globals::new();
        self.exec(thread, &mut globals, &program, true)?;

        // functions defined here resolve names in this module from now on
        let shared = Arc::new(globals.clone());
        for (_, v) in globals.iter() {
            if let Val::Function(func) = v {
                if func.file == module {
                    let _ = func.module.set(Arc::downgrade(&shared));
                }
            }
        }
        self.modules
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(shared);
        Ok(globals)
    }
}
