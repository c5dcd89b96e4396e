//! Tree-walking evaluator
use std::collections::HashMap;
use std::sync::{Arc, OnceLock, Weak};

use crate::ast::{BinOp, Expr, FuncDef, Span, Stmt, UnaryOp};
use crate::value::{Builtin, Function, Val};
use crate::Lilt;
use sprig::{CallStack, Error, Frame, Globals, Position, Result, Thread};
use tracing::debug;

/// Deepest call nesting before evaluation fails
const MAX_DEPTH: usize = 100;

/// Name of the outermost frame
const TOPLEVEL: &str = "<toplevel>";

/// Where names resolve and assignments land
enum Scope<'g> {
    /// Module level statements, assigning globals
    Module(&'g mut Globals<Val>),
    /// A standalone expression, reading globals
    Expr(&'g Globals<Val>),
    /// A function body
    Function {
        globals: &'g Globals<Val>,
        locals: HashMap<String, Val>,
    },
}

impl Scope<'_> {
    fn globals(&self) -> &Globals<Val> {
        match self {
            Scope::Module(g) => &**g,
            Scope::Expr(g) => *g,
            Scope::Function { globals, .. } => *globals,
        }
    }

    fn lookup(&self, name: &str) -> Option<Val> {
        if let Scope::Function { locals, .. } = self {
            if let Some(v) = locals.get(name) {
                return Some(v.clone());
            }
        }
        self.globals()
            .get(name)
            .cloned()
            .or_else(|| Builtin::ALL.into_iter().find(|b| b.name() == name).map(Val::Builtin))
    }
}

/// Control flow out of a statement
enum Flow {
    Next,
    Return(Val),
}

/// A call in progress
struct ActiveFrame {
    name: String,
    file: String,
    /// Current execution point within this frame
    span: Span,
}

/// Evaluation state for one engine call
pub(crate) struct Interp<'e, 't, 'a> {
    engine: &'e Lilt,
    thread: &'t mut Thread<'a, Lilt>,
    frames: Vec<ActiveFrame>,
}

impl<'e, 't, 'a> Interp<'e, 't, 'a> {
    pub(crate) fn new(engine: &'e Lilt, thread: &'t mut Thread<'a, Lilt>) -> Self {
        let root = ActiveFrame {
            name: TOPLEVEL.to_string(),
            file: thread.name().to_string(),
            span: Span::default(),
        };
        Self {
            engine,
            thread,
            frames: vec![root],
        }
    }

    /// Evaluate a standalone expression
    pub(crate) fn eval_expr(&mut self, globals: &Globals<Val>, expr: &Expr) -> Result<Val> {
        self.thread.check_cancelled()?;
        self.eval(&Scope::Expr(globals), expr)
    }

    /// Execute module level statements
    pub(crate) fn exec_module(&mut self, globals: &mut Globals<Val>, stmts: &[Stmt]) -> Result<()> {
        let mut scope = Scope::Module(globals);
        self.exec_block(&mut scope, stmts).map(|_| ())
    }

    /// Error at `span` in the innermost frame, carrying the active call stack
    fn fail(&mut self, span: Span, msg: impl Into<String>) -> Error {
        if let Some(top) = self.frames.last_mut() {
            top.span = span;
        }
        let frames: Vec<Frame> = self
            .frames
            .iter()
            .map(|f| Frame::new(Position::new(&f.file, f.span.line, f.span.col), &f.name))
            .collect();
        Error::eval_with_stack(msg, CallStack::from(frames))
    }

    fn file(&self) -> String {
        self.frames
            .last()
            .map(|f| f.file.clone())
            .unwrap_or_else(|| self.thread.name().to_string())
    }

    fn exec_block(&mut self, scope: &mut Scope<'_>, stmts: &[Stmt]) -> Result<Flow> {
        for stmt in stmts {
            if let Flow::Return(v) = self.exec_stmt(scope, stmt)? {
                return Ok(Flow::Return(v));
            }
        }
        Ok(Flow::Next)
    }

    fn exec_stmt(&mut self, scope: &mut Scope<'_>, stmt: &Stmt) -> Result<Flow> {
        self.thread.check_cancelled()?;
        match stmt {
            Stmt::Pass => (),
            Stmt::Expr(expr, _) => {
                self.eval(scope, expr)?;
            }
            Stmt::Assign { name, value, span } => {
                let v = self.eval(scope, value)?;
                self.assign(scope, name, v, *span)?;
            }
            Stmt::Def(def) => {
                let func = Function {
                    def: Arc::clone(def),
                    file: self.file(),
                    module: OnceLock::new(),
                };
                self.assign(scope, &def.name, Val::Function(Arc::new(func)), def.span)?;
            }
            Stmt::Return(value, _) => {
                let v = match value {
                    Some(expr) => self.eval(scope, expr)?,
                    None => Val::None,
                };
                return Ok(Flow::Return(v));
            }
            Stmt::If {
                cond,
                then,
                orelse,
                ..
            } => {
                let branch = if self.eval(scope, cond)?.truth() {
                    then
                } else {
                    orelse
                };
                return self.exec_block(scope, branch);
            }
            Stmt::While { cond, body, .. } => {
                while self.eval(scope, cond)?.truth() {
                    if let Flow::Return(v) = self.exec_block(scope, body)? {
                        return Ok(Flow::Return(v));
                    }
                    self.thread.check_cancelled()?;
                }
            }
            Stmt::Load {
                module,
                names,
                span,
            } => self.load(scope, module, names, *span)?,
        }
        Ok(Flow::Next)
    }

    fn assign(&mut self, scope: &mut Scope<'_>, name: &str, v: Val, span: Span) -> Result<()> {
        match scope {
            Scope::Module(globals) => globals
                .set(name, v)
                .map_err(|e| self.fail(span, e.to_string())),
            Scope::Function { locals, .. } => {
                locals.insert(name.to_string(), v);
                Ok(())
            }
            Scope::Expr(_) => Err(self.fail(span, format!("cannot assign to {name} in an expression"))),
        }
    }

    fn load(
        &mut self,
        scope: &mut Scope<'_>,
        module: &str,
        names: &[(String, String)],
        span: Span,
    ) -> Result<()> {
        debug!("load {module} from {}", self.thread.name());
        let exports = self.thread.load(self.engine, module)?;
        for (local, exported) in names {
            if exported.starts_with('_') {
                return Err(self.fail(span, format!("load: {exported} is not exported by {module}")));
            }
            let Some(v) = exports.get(exported) else {
                return Err(self.fail(span, format!("load: name {exported} not found in module {module}")));
            };
            self.assign(scope, local, v.clone(), span)?;
        }
        Ok(())
    }

    fn eval(&mut self, scope: &Scope<'_>, expr: &Expr) -> Result<Val> {
        match expr {
            Expr::None => Ok(Val::None),
            Expr::Bool(b) => Ok(Val::Bool(*b)),
            Expr::Int(i) => Ok(Val::Int(*i)),
            Expr::Str(s) => Ok(Val::Str(s.clone())),
            Expr::Name(name, span) => match scope.lookup(name) {
                Some(v) => Ok(v),
                None => Err(self.fail(*span, format!("undefined: {name}"))),
            },
            Expr::Unary { op, operand, span } => {
                let v = self.eval(scope, operand)?;
                match (op, v) {
                    (UnaryOp::Not, v) => Ok(Val::Bool(!v.truth())),
                    (UnaryOp::Neg, Val::Int(i)) => i
                        .checked_neg()
                        .map(Val::Int)
                        .ok_or_else(|| self.fail(*span, "integer overflow")),
                    (UnaryOp::Neg, v) => {
                        Err(self.fail(*span, format!("unknown unary op: -{}", v.type_name())))
                    }
                }
            }
            Expr::Binary {
                op: BinOp::And,
                lhs,
                rhs,
                ..
            } => {
                let l = self.eval(scope, lhs)?;
                if !l.truth() {
                    return Ok(l);
                }
                self.eval(scope, rhs)
            }
            Expr::Binary {
                op: BinOp::Or,
                lhs,
                rhs,
                ..
            } => {
                let l = self.eval(scope, lhs)?;
                if l.truth() {
                    return Ok(l);
                }
                self.eval(scope, rhs)
            }
            Expr::Binary { op, lhs, rhs, span } => {
                let l = self.eval(scope, lhs)?;
                let r = self.eval(scope, rhs)?;
                binary(*op, &l, &r).map_err(|msg| self.fail(*span, msg))
            }
            Expr::Call { func, args, span } => {
                let f = self.eval(scope, func)?;
                let mut vals = Vec::with_capacity(args.len());
                for arg in args {
                    vals.push(self.eval(scope, arg)?);
                }
                self.call(scope, f, vals, *span)
            }
        }
    }

    fn call(&mut self, scope: &Scope<'_>, f: Val, args: Vec<Val>, span: Span) -> Result<Val> {
        self.thread.check_cancelled()?;
        match f {
            Val::Builtin(b) => self.call_builtin(b, args, span),
            Val::Function(func) => {
                let def: &FuncDef = &func.def;
                if args.len() != def.params.len() {
                    return Err(self.fail(
                        span,
                        format!(
                            "function {} accepts {} arguments ({} given)",
                            def.name,
                            def.params.len(),
                            args.len()
                        ),
                    ));
                }
                if self.frames.len() >= MAX_DEPTH {
                    return Err(self.fail(span, "call stack exceeds maximum depth"));
                }

                if let Some(top) = self.frames.last_mut() {
                    top.span = span;
                }
                self.frames.push(ActiveFrame {
                    name: def.name.clone(),
                    file: func.file.clone(),
                    span: def.span,
                });

                let module = func.module.get().and_then(Weak::upgrade);
                let globals = module.as_deref().unwrap_or_else(|| scope.globals());
                let mut inner = Scope::Function {
                    globals,
                    locals: def.params.iter().cloned().zip(args).collect(),
                };
                let result = self.exec_block(&mut inner, &def.body);
                self.frames.pop();

                match result? {
                    Flow::Return(v) => Ok(v),
                    Flow::Next => Ok(Val::None),
                }
            }
            v => Err(self.fail(span, format!("invalid call of non-function ({})", v.type_name()))),
        }
    }

    fn call_builtin(&mut self, b: Builtin, args: Vec<Val>, span: Span) -> Result<Val> {
        match (b, args.as_slice()) {
            (Builtin::Fail, args) => {
                let msg: Vec<String> = args.iter().map(Val::to_str).collect();
                Err(self.fail(span, format!("fail: {}", msg.join(" "))))
            }
            (Builtin::Len, [Val::Str(s)]) => Ok(Val::Int(s.chars().count() as i64)),
            (Builtin::Len, [v]) => Err(self.fail(
                span,
                format!("len: value of type {} has no len", v.type_name()),
            )),
            (Builtin::Str, [v]) => Ok(Val::Str(v.to_str())),
            (b, args) => Err(self.fail(
                span,
                format!("{}: got {} arguments, want 1", b.name(), args.len()),
            )),
        }
    }
}

/// Apply a strict binary operator
fn binary(op: BinOp, l: &Val, r: &Val) -> std::result::Result<Val, String> {
    use Val::{Int, Str};
    let overflow = || "integer overflow".to_string();
    match (op, l, r) {
        (BinOp::Eq, l, r) => Ok(Val::Bool(l == r)),
        (BinOp::NotEq, l, r) => Ok(Val::Bool(l != r)),
        (BinOp::Add, Int(a), Int(b)) => a.checked_add(*b).map(Int).ok_or_else(overflow),
        (BinOp::Add, Str(a), Str(b)) => Ok(Str(format!("{a}{b}"))),
        (BinOp::Sub, Int(a), Int(b)) => a.checked_sub(*b).map(Int).ok_or_else(overflow),
        (BinOp::Mul, Int(a), Int(b)) => a.checked_mul(*b).map(Int).ok_or_else(overflow),
        (BinOp::FloorDiv, Int(_), Int(0)) => Err("floored division by zero".to_string()),
        (BinOp::FloorDiv, Int(a), Int(b)) => floor_div(*a, *b).map(Int).ok_or_else(overflow),
        (BinOp::Mod, Int(_), Int(0)) => Err("integer modulo by zero".to_string()),
        (BinOp::Mod, Int(a), Int(b)) => floor_mod(*a, *b).map(Int).ok_or_else(overflow),
        (BinOp::Lt | BinOp::LtEq | BinOp::Gt | BinOp::GtEq, l, r) => {
            let ord = match (l, r) {
                (Int(a), Int(b)) => a.cmp(b),
                (Str(a), Str(b)) => a.cmp(b),
                _ => {
                    return Err(format!(
                        "{} not supported between {} and {}",
                        op_str(op),
                        l.type_name(),
                        r.type_name()
                    ))
                }
            };
            Ok(Val::Bool(match op {
                BinOp::Lt => ord.is_lt(),
                BinOp::LtEq => ord.is_le(),
                BinOp::Gt => ord.is_gt(),
                _ => ord.is_ge(),
            }))
        }
        (op, l, r) => Err(format!(
            "unknown binary op: {} {} {}",
            l.type_name(),
            op_str(op),
            r.type_name()
        )),
    }
}

/// Integer division rounding toward negative infinity
fn floor_div(a: i64, b: i64) -> Option<i64> {
    let q = a.checked_div(b)?;
    if a % b != 0 && (a < 0) != (b < 0) {
        Some(q - 1)
    } else {
        Some(q)
    }
}

/// Remainder with the sign of the divisor
fn floor_mod(a: i64, b: i64) -> Option<i64> {
    let r = a.checked_rem(b)?;
    if r != 0 && (r < 0) != (b < 0) {
        Some(r + b)
    } else {
        Some(r)
    }
}

fn op_str(op: BinOp) -> &'static str {
    match op {
        BinOp::Add => "+",
        BinOp::Sub => "-",
        BinOp::Mul => "*",
        BinOp::FloorDiv => "//",
        BinOp::Mod => "%",
        BinOp::Eq => "==",
        BinOp::NotEq => "!=",
        BinOp::Lt => "<",
        BinOp::LtEq => "<=",
        BinOp::Gt => ">",
        BinOp::GtEq => ">=",
        BinOp::And => "and",
        BinOp::Or => "or",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn floor_semantics() {
        assert_eq!(floor_div(7, 2), Some(3));
        assert_eq!(floor_div(-7, 2), Some(-4));
        assert_eq!(floor_div(7, -2), Some(-4));
        assert_eq!(floor_div(i64::MIN, -1), None);
        assert_eq!(floor_mod(-7, 2), Some(1));
        assert_eq!(floor_mod(7, -2), Some(-1));
        assert_eq!(floor_mod(6, 3), Some(0));
    }

    #[test]
    fn binary_type_errors() {
        assert_eq!(
            binary(BinOp::Add, &Val::Int(1), &Val::from("a")),
            Err("unknown binary op: int + string".to_string())
        );
        assert_eq!(
            binary(BinOp::Lt, &Val::Int(1), &Val::None),
            Err("< not supported between int and NoneType".to_string())
        );
        assert_eq!(
            binary(BinOp::FloorDiv, &Val::Int(1), &Val::Int(0)),
            Err("floored division by zero".to_string())
        );
    }

    #[test]
    fn equality_across_types() {
        assert_eq!(
            binary(BinOp::Eq, &Val::Int(1), &Val::from("1")),
            Ok(Val::Bool(false))
        );
        assert_eq!(
            binary(BinOp::NotEq, &Val::None, &Val::None),
            Ok(Val::Bool(false))
        );
    }
}
