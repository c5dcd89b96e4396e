//! A scripted engine for unit tests.
//!
//! Expressions are integer literals, names, or `None`.  Statements are one per line:
//! `name = <int>`, `load <module>` (binds the module's `value`), `fail <msg>`, and
//! `def <name>:` followed by at least one indented line.
use crate::{Engine, Error, Globals, Position, Result, StmtKind, Stmts, Thread};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum MockValue {
    None,
    Int(i64),
}

impl fmt::Display for MockValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MockValue::None => write!(f, "None"),
            MockValue::Int(i) => write!(f, "{i}"),
        }
    }
}

impl crate::Value for MockValue {
    fn is_none(&self) -> bool {
        matches!(self, MockValue::None)
    }
}

#[derive(Debug)]
pub(crate) enum MockExpr {
    Value(MockValue),
    Name(String),
}

#[derive(Debug)]
pub(crate) enum MockStmt {
    Assign(String, i64),
    Load(String),
    Fail(String),
    Def(String),
}

#[derive(Debug)]
pub(crate) struct MockProgram(pub(crate) Vec<MockStmt>);

impl Stmts for MockProgram {
    fn stmt_kinds(&self) -> Vec<StmtKind> {
        self.0
            .iter()
            .map(|s| match s {
                MockStmt::Assign(..) => StmtKind::Assign,
                MockStmt::Load(_) => StmtKind::Load,
                _ => StmtKind::Other,
            })
            .collect()
    }
}

/// Module source: modules it loads, then its result
struct MockModule {
    deps: Vec<String>,
    result: std::result::Result<i64, String>,
}

#[derive(Default)]
pub(crate) struct MockEngine {
    modules: HashMap<String, MockModule>,
    exec_counts: RefCell<HashMap<String, usize>>,
    load_errors: RefCell<Vec<(String, Error)>>,
}

impl MockEngine {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Register a module that loads `deps` and then yields `result` as its `value`
    pub(crate) fn module(
        mut self,
        name: &str,
        deps: &[&str],
        result: std::result::Result<i64, &str>,
    ) -> Self {
        self.modules.insert(
            name.to_string(),
            MockModule {
                deps: deps.iter().map(|d| d.to_string()).collect(),
                result: result.map_err(str::to_string),
            },
        );
        self
    }

    /// Number of times module was executed
    pub(crate) fn exec_count(&self, module: &str) -> usize {
        self.exec_counts
            .borrow()
            .get(module)
            .copied()
            .unwrap_or_default()
    }

    /// Errors from nested loads, as (loading module, error)
    pub(crate) fn load_errors(&self) -> Vec<(String, Error)> {
        self.load_errors.borrow().clone()
    }
}

fn parse_error(name: &str, line: usize, msg: &str) -> Error {
    Error::parse(Position::new(name, line as u32 + 1, 1), msg)
}

impl Engine for MockEngine {
    type Value = MockValue;
    type Expr = MockExpr;
    type Program = MockProgram;

    fn parse_expr(&self, name: &str, text: &str) -> Result<MockExpr> {
        let text = text.trim();
        if text == "None" {
            return Ok(MockExpr::Value(MockValue::None));
        }
        if let Ok(i) = text.parse() {
            return Ok(MockExpr::Value(MockValue::Int(i)));
        }
        if !text.is_empty() && text.chars().all(|c| c.is_alphanumeric() || c == '_') {
            return Ok(MockExpr::Name(text.to_string()));
        }
        Err(parse_error(name, 0, "not an expression"))
    }

    fn parse_program(&self, name: &str, text: &str) -> Result<MockProgram> {
        let lines: Vec<&str> = text.lines().collect();
        let mut stmts = vec![];
        let mut i = 0;
        while i < lines.len() {
            let line = lines[i].trim();
            if line.is_empty() {
                i += 1;
                continue;
            }
            if let Some(def) = line.strip_prefix("def ") {
                let fname = def.trim_end_matches(':').trim().to_string();
                i += 1;
                let body_start = i;
                while i < lines.len() && lines[i].starts_with(char::is_whitespace) {
                    i += 1;
                }
                if i == body_start {
                    return Err(parse_error(name, i, "expected indented block"));
                }
                stmts.push(MockStmt::Def(fname));
                continue;
            }
            let stmt = if let Some(module) = line.strip_prefix("load ") {
                MockStmt::Load(module.trim().to_string())
            } else if let Some(msg) = line.strip_prefix("fail ") {
                MockStmt::Fail(msg.to_string())
            } else if let Some((lhs, rhs)) = line.split_once('=') {
                let value = rhs
                    .trim()
                    .parse()
                    .map_err(|_| parse_error(name, i, "expected integer"))?;
                MockStmt::Assign(lhs.trim().to_string(), value)
            } else {
                return Err(parse_error(name, i, "not a statement"));
            };
            stmts.push(stmt);
            i += 1;
        }
        Ok(MockProgram(stmts))
    }

    fn eval(
        &self,
        thread: &mut Thread<'_, Self>,
        globals: &Globals<MockValue>,
        expr: &MockExpr,
    ) -> Result<MockValue> {
        thread.check_cancelled()?;
        match expr {
            MockExpr::Value(v) => Ok(v.clone()),
            MockExpr::Name(n) => globals
                .get(n)
                .cloned()
                .ok_or_else(|| Error::eval(format!("undefined: {n}"))),
        }
    }

    fn exec(
        &self,
        thread: &mut Thread<'_, Self>,
        globals: &mut Globals<MockValue>,
        program: &MockProgram,
        freeze: bool,
    ) -> Result<()> {
        for stmt in &program.0 {
            thread.check_cancelled()?;
            match stmt {
                MockStmt::Assign(n, v) => globals.set(n.as_str(), MockValue::Int(*v))?,
                MockStmt::Load(m) => {
                    let module = thread.load(self, m)?;
                    let value = module.get("value").cloned().unwrap_or(MockValue::None);
                    globals.set(m.as_str(), value)?;
                }
                MockStmt::Fail(msg) => return Err(Error::eval(msg.as_str())),
                MockStmt::Def(n) => globals.set(n.as_str(), MockValue::Int(0))?,
            }
        }
        if freeze {
            globals.freeze();
        }
        Ok(())
    }

    fn exec_file(&self, thread: &mut Thread<'_, Self>, module: &str) -> Result<Globals<MockValue>> {
        *self
            .exec_counts
            .borrow_mut()
            .entry(module.to_string())
            .or_default() += 1;
        thread.check_cancelled()?;
        let m = self.modules.get(module).ok_or_else(|| Error::Load {
            module: module.to_string(),
            msg: "no such module".to_string(),
        })?;
        for dep in &m.deps {
            if let Err(e) = thread.load(self, dep) {
                self.load_errors.borrow_mut().push((module.to_string(), e));
            }
        }
        let value = m.result.clone().map_err(Error::eval)?;
        let mut globals = Globals::new();
        globals.set("value", MockValue::Int(value))?;
        globals.freeze();
        Ok(globals)
    }
}
