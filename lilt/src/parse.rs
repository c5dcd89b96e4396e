//! Recursive descent parser for Lilt
use std::sync::Arc;

use crate::ast::{BinOp, Expr, FuncDef, Program, Span, Stmt, UnaryOp};
use crate::lex::{lex, Mode, Spanned, Token};
use sprig::{Error, Position, Result};

/// Deepest syntax tree the parser builds, counting operators, calls, parentheses and blocks
const MAX_NESTING: usize = 200;

/// Parse text that is exactly one expression, possibly spanning several lines
pub fn parse_expr(name: &str, text: &str) -> Result<Expr> {
    let mut p = Parser::new(name, lex(name, text, Mode::Expr)?);
    p.skip_newlines();
    let expr = p.expr()?;
    p.skip_newlines();
    p.expect(Token::Eof)?;
    Ok(expr)
}

/// Parse text as a list of statements
pub fn parse_program(name: &str, text: &str) -> Result<Program> {
    let mut p = Parser::new(name, lex(name, text, Mode::Program)?);
    let mut stmts = vec![];
    loop {
        p.skip_newlines();
        if p.peek() == &Token::Eof {
            break;
        }
        stmts.push(p.stmt()?);
    }
    Ok(Program { stmts })
}

struct Parser<'a> {
    name: &'a str,
    tokens: Vec<Spanned>,
    pos: usize,
    /// Nesting depth of function bodies being parsed
    in_def: usize,
    /// Depth of the syntax tree above the current token
    depth: usize,
}

impl<'a> Parser<'a> {
    fn new(name: &'a str, tokens: Vec<Spanned>) -> Self {
        Self {
            name,
            tokens,
            pos: 0,
            in_def: 0,
            depth: 0,
        }
    }

    fn peek(&self) -> &Token {
        &self.current().token
    }

    fn span(&self) -> Span {
        self.current().span
    }

    fn current(&self) -> &Spanned {
        // lexer always terminates with Eof
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> Spanned {
        let t = self.current().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        t
    }

    /// Consume token if it matches
    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == token {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: Token) -> Result<Span> {
        if self.peek() == &token {
            Ok(self.advance().span)
        } else {
            Err(self.unexpected(&format!("expected {token}")))
        }
    }

    fn error(&self, span: Span, msg: impl Into<String>) -> Error {
        Error::parse(Position::new(self.name, span.line, span.col), msg)
    }

    fn unexpected(&self, context: &str) -> Error {
        self.error(self.span(), format!("got {}, {context}", self.peek()))
    }

    /// Enter one more level of nesting. Callers leaving the level restore `depth`.
    fn nest(&mut self, what: &str) -> Result<()> {
        self.depth += 1;
        if self.depth > MAX_NESTING {
            return Err(self.error(self.span(), format!("{what} nested too deeply")));
        }
        Ok(())
    }

    fn skip_newlines(&mut self) {
        while self.eat(&Token::Newline) {}
    }

    fn ident(&mut self) -> Result<String> {
        match self.peek().clone() {
            Token::Ident(name) => {
                self.advance();
                Ok(name)
            }
            _ => Err(self.unexpected("want identifier")),
        }
    }

    fn stmt(&mut self) -> Result<Stmt> {
        match self.peek() {
            Token::Def => self.def_stmt(),
            Token::If => self.if_stmt(),
            Token::While => self.while_stmt(),
            _ => {
                let stmt = self.simple_stmt()?;
                self.expect(Token::Newline)?;
                Ok(stmt)
            }
        }
    }

    fn simple_stmt(&mut self) -> Result<Stmt> {
        let span = self.span();
        match self.peek() {
            Token::Pass => {
                self.advance();
                Ok(Stmt::Pass)
            }
            Token::Return => {
                if self.in_def == 0 {
                    return Err(self.error(span, "return statement not within a function"));
                }
                self.advance();
                let value = match self.peek() {
                    Token::Newline => None,
                    _ => Some(self.expr()?),
                };
                Ok(Stmt::Return(value, span))
            }
            Token::Load => self.load_stmt(),
            _ => {
                let expr = self.expr()?;
                if !self.eat(&Token::Assign) {
                    return Ok(Stmt::Expr(expr, span));
                }
                let Expr::Name(name, _) = expr else {
                    return Err(self.error(span, "can only assign to a name"));
                };
                let value = self.expr()?;
                Ok(Stmt::Assign { name, value, span })
            }
        }
    }

    /// `load("module", "name", local="name", ...)`
    fn load_stmt(&mut self) -> Result<Stmt> {
        let span = self.expect(Token::Load)?;
        if self.in_def > 0 {
            return Err(self.error(span, "load statement within a function"));
        }
        self.expect(Token::ParenLeft)?;
        let Token::Str(module) = self.advance().token else {
            return Err(self.error(span, "first operand of load statement must be a string literal"));
        };
        let mut names = vec![];
        while self.eat(&Token::Comma) {
            match self.peek().clone() {
                Token::ParenRight => break,
                Token::Str(name) => {
                    self.advance();
                    names.push((name.clone(), name));
                }
                Token::Ident(local) => {
                    self.advance();
                    self.expect(Token::Assign)?;
                    let Token::Str(remote) = self.advance().token else {
                        return Err(self.error(span, "load operand must be a string literal"));
                    };
                    names.push((local, remote));
                }
                _ => return Err(self.unexpected("want load operand")),
            }
        }
        self.expect(Token::ParenRight)?;
        if names.is_empty() {
            return Err(self.error(span, "load statement must import at least 1 symbol"));
        }
        Ok(Stmt::Load {
            module,
            names,
            span,
        })
    }

    fn def_stmt(&mut self) -> Result<Stmt> {
        let span = self.expect(Token::Def)?;
        let name = self.ident()?;
        self.expect(Token::ParenLeft)?;
        let mut params = vec![];
        while self.peek() != &Token::ParenRight {
            params.push(self.ident()?);
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        self.expect(Token::ParenRight)?;
        self.expect(Token::Colon)?;
        self.in_def += 1;
        let body = self.suite();
        self.in_def -= 1;
        Ok(Stmt::Def(Arc::new(FuncDef {
            name,
            params,
            body: body?,
            span,
        })))
    }

    fn if_stmt(&mut self) -> Result<Stmt> {
        // `if` or `elif`
        let span = self.advance().span;
        let cond = self.expr()?;
        self.expect(Token::Colon)?;
        let then = self.suite()?;
        let orelse = match self.peek() {
            Token::Elif => vec![self.if_stmt()?],
            Token::Else => {
                self.advance();
                self.expect(Token::Colon)?;
                self.suite()?
            }
            _ => vec![],
        };
        Ok(Stmt::If {
            cond,
            then,
            orelse,
            span,
        })
    }

    fn while_stmt(&mut self) -> Result<Stmt> {
        let span = self.expect(Token::While)?;
        let cond = self.expr()?;
        self.expect(Token::Colon)?;
        let body = self.suite()?;
        Ok(Stmt::While { cond, body, span })
    }

    /// Indented block, or a simple statement on the same line
    fn suite(&mut self) -> Result<Vec<Stmt>> {
        self.nest("block")?;
        let stmts = self.suite_stmts()?;
        self.depth -= 1;
        Ok(stmts)
    }

    fn suite_stmts(&mut self) -> Result<Vec<Stmt>> {
        if !self.eat(&Token::Newline) {
            let stmt = self.simple_stmt()?;
            self.expect(Token::Newline)?;
            return Ok(vec![stmt]);
        }
        if !self.eat(&Token::Indent) {
            return Err(self.unexpected("expected an indented block"));
        }
        let mut stmts = vec![];
        while !self.eat(&Token::Dedent) {
            if self.peek() == &Token::Eof {
                break;
            }
            stmts.push(self.stmt()?);
        }
        Ok(stmts)
    }

    pub(crate) fn expr(&mut self) -> Result<Expr> {
        self.nest("expression")?;
        let expr = self.or_expr()?;
        self.depth -= 1;
        Ok(expr)
    }

    // Operator loops build left-leaning trees, so every iteration counts as a level

    fn or_expr(&mut self) -> Result<Expr> {
        let depth = self.depth;
        let mut lhs = self.and_expr()?;
        while self.peek() == &Token::Or {
            self.nest("expression")?;
            let span = self.advance().span;
            let rhs = self.and_expr()?;
            lhs = binary(BinOp::Or, lhs, rhs, span);
        }
        self.depth = depth;
        Ok(lhs)
    }

    fn and_expr(&mut self) -> Result<Expr> {
        let depth = self.depth;
        let mut lhs = self.not_expr()?;
        while self.peek() == &Token::And {
            self.nest("expression")?;
            let span = self.advance().span;
            let rhs = self.not_expr()?;
            lhs = binary(BinOp::And, lhs, rhs, span);
        }
        self.depth = depth;
        Ok(lhs)
    }

    fn not_expr(&mut self) -> Result<Expr> {
        if self.peek() != &Token::Not {
            return self.comparison();
        }
        self.nest("expression")?;
        let span = self.advance().span;
        let operand = self.not_expr()?;
        self.depth -= 1;
        Ok(Expr::Unary {
            op: UnaryOp::Not,
            operand: Box::new(operand),
            span,
        })
    }

    fn comparison(&mut self) -> Result<Expr> {
        let lhs = self.arith()?;
        let op = match self.peek() {
            Token::Eq => BinOp::Eq,
            Token::NotEq => BinOp::NotEq,
            Token::Lt => BinOp::Lt,
            Token::LtEq => BinOp::LtEq,
            Token::Gt => BinOp::Gt,
            Token::GtEq => BinOp::GtEq,
            _ => return Ok(lhs),
        };
        let span = self.advance().span;
        let rhs = self.arith()?;
        Ok(binary(op, lhs, rhs, span))
    }

    fn arith(&mut self) -> Result<Expr> {
        let depth = self.depth;
        let mut lhs = self.term()?;
        loop {
            let op = match self.peek() {
                Token::Plus => BinOp::Add,
                Token::Minus => BinOp::Sub,
                _ => break,
            };
            self.nest("expression")?;
            let span = self.advance().span;
            let rhs = self.term()?;
            lhs = binary(op, lhs, rhs, span);
        }
        self.depth = depth;
        Ok(lhs)
    }

    fn term(&mut self) -> Result<Expr> {
        let depth = self.depth;
        let mut lhs = self.unary()?;
        loop {
            let op = match self.peek() {
                Token::Star => BinOp::Mul,
                Token::SlashSlash => BinOp::FloorDiv,
                Token::Percent => BinOp::Mod,
                _ => break,
            };
            self.nest("expression")?;
            let span = self.advance().span;
            let rhs = self.unary()?;
            lhs = binary(op, lhs, rhs, span);
        }
        self.depth = depth;
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Expr> {
        if self.peek() != &Token::Minus {
            return self.call();
        }
        self.nest("expression")?;
        let span = self.advance().span;
        let operand = self.unary()?;
        self.depth -= 1;
        Ok(Expr::Unary {
            op: UnaryOp::Neg,
            operand: Box::new(operand),
            span,
        })
    }

    fn call(&mut self) -> Result<Expr> {
        let depth = self.depth;
        let mut expr = self.primary()?;
        while self.peek() == &Token::ParenLeft {
            self.nest("expression")?;
            let span = self.advance().span;
            let mut args = vec![];
            while self.peek() != &Token::ParenRight {
                args.push(self.expr()?);
                if !self.eat(&Token::Comma) {
                    break;
                }
            }
            self.expect(Token::ParenRight)?;
            expr = Expr::Call {
                func: Box::new(expr),
                args,
                span,
            };
        }
        self.depth = depth;
        Ok(expr)
    }

    fn primary(&mut self) -> Result<Expr> {
        let Spanned { token, span } = self.current().clone();
        let expr = match token {
            Token::Int(i) => Expr::Int(i),
            Token::Str(s) => Expr::Str(s),
            Token::Ident(name) => Expr::Name(name, span),
            Token::None => Expr::None,
            Token::True => Expr::Bool(true),
            Token::False => Expr::Bool(false),
            Token::ParenLeft => {
                self.advance();
                let expr = self.expr()?;
                self.expect(Token::ParenRight)?;
                return Ok(expr);
            }
            _ => return Err(self.unexpected("want primary expression")),
        };
        self.advance();
        Ok(expr)
    }
}

fn binary(op: BinOp, lhs: Expr, rhs: Expr, span: Span) -> Expr {
    Expr::Binary {
        op,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
        span,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use sprig::{StmtKind, Stmts};

    #[test]
    fn expr_precedence() {
        let e = parse_expr("t", "1 + 2 * 3").unwrap();
        assert_matches!(
            e,
            Expr::Binary { op: BinOp::Add, rhs, .. } if matches!(*rhs, Expr::Binary { op: BinOp::Mul, .. })
        );
    }

    #[test]
    fn expr_spanning_lines() {
        let e = parse_expr("t", "f(\n    1,\n    2,\n)\n").unwrap();
        assert_matches!(e, Expr::Call { args, .. } if args.len() == 2);
    }

    #[test]
    fn expr_rejects_statements() {
        assert_matches!(parse_expr("t", "x = 1"), Err(Error::Parse { .. }));
        assert_matches!(parse_expr("t", "def f():"), Err(Error::Parse { .. }));
        assert_matches!(parse_expr("t", "1\n2\n"), Err(Error::Parse { .. }));
        assert_matches!(parse_expr("t", ""), Err(Error::Parse { .. }));
    }

    #[test]
    fn program_statement_kinds() {
        let p = parse_program("t", "x = 1\nload(\"m\", \"a\", b=\"c\")\nx\n").unwrap();
        assert_eq!(
            p.stmt_kinds(),
            vec![StmtKind::Assign, StmtKind::Load, StmtKind::Other]
        );
        assert_matches!(
            &p.stmts[1],
            Stmt::Load { names, .. } if names == &[("a".to_string(), "a".to_string()), ("b".to_string(), "c".to_string())]
        );
    }

    #[test]
    fn def_needs_indented_block() {
        assert_matches!(
            parse_program("t", "def f():\n"),
            Err(Error::Parse { msg, .. }) if msg.contains("expected an indented block")
        );
        let p = parse_program("t", "def f():\n    return 1\n").unwrap();
        assert_matches!(&p.stmts[..], [Stmt::Def(def)] if def.name == "f" && def.body.len() == 1);
    }

    #[test]
    fn single_line_suite() {
        let p = parse_program("t", "def f(x): return x\nif True: pass\n").unwrap();
        assert_eq!(p.stmts.len(), 2);
    }

    #[test]
    fn if_elif_else() {
        let p = parse_program(
            "t",
            "if x:\n    a = 1\nelif y:\n    a = 2\nelse:\n    a = 3\n",
        )
        .unwrap();
        assert_matches!(&p.stmts[..], [Stmt::If { orelse, .. }] if matches!(orelse[..], [Stmt::If { .. }]));
    }

    #[test]
    fn return_outside_function() {
        assert_matches!(
            parse_program("t", "return 1\n"),
            Err(Error::Parse { msg, .. }) if msg == "return statement not within a function"
        );
    }

    #[test]
    fn error_positions() {
        let err = parse_program("t.lilt", "x = 1\ny = )\n").unwrap_err();
        assert_eq!(err.to_string(), "t.lilt:2:5: got ), want primary expression");
    }

    #[test]
    fn nesting_limit() {
        let parens = |n: usize| format!("{}1{}", "(".repeat(n), ")".repeat(n));
        assert!(parse_expr("t", &parens(100)).is_ok());
        assert_matches!(
            parse_expr("t", &parens(MAX_NESTING + 1)),
            Err(Error::Parse { msg, .. }) if msg == "expression nested too deeply"
        );

        let sum = vec!["1"; 150].join(" + ");
        assert!(parse_expr("t", &sum).is_ok());
        // sibling chains do not add up
        assert!(parse_expr("t", &format!("f({sum}, {sum})")).is_ok());
        let sum = vec!["1"; MAX_NESTING + 2].join(" + ");
        assert_matches!(
            parse_expr("t", &sum),
            Err(Error::Parse { msg, .. }) if msg == "expression nested too deeply"
        );
        assert_matches!(
            parse_expr("t", &"-".repeat(MAX_NESTING + 1)),
            Err(Error::Parse { msg, .. }) if msg == "expression nested too deeply"
        );
    }

    #[test]
    fn block_nesting_limit() {
        let mut text = String::new();
        for level in 0..=MAX_NESTING {
            text.push_str(&"    ".repeat(level));
            text.push_str("def f():\n");
        }
        text.push_str(&"    ".repeat(MAX_NESTING + 1));
        text.push_str("pass\n");
        assert_matches!(
            parse_program("t", &text),
            Err(Error::Parse { msg, .. }) if msg == "block nested too deeply"
        );
    }
}
