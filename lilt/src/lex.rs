//! Lexer for Lilt
use std::iter::Peekable;
use std::str::Chars;

use crate::ast::Span;
use sprig::{Error, Position, Result};

/// Parsed tokens from source text
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    Int(i64),
    Str(String),
    Ident(String),
    // keywords
    Def,
    Return,
    If,
    Elif,
    Else,
    While,
    Pass,
    Load,
    And,
    Or,
    Not,
    None,
    True,
    False,
    // punctuation
    ParenLeft,
    ParenRight,
    Comma,
    Colon,
    Assign,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Plus,
    Minus,
    Star,
    SlashSlash,
    Percent,
    // layout
    Newline,
    Indent,
    Dedent,
    Eof,
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Int(i) => write!(f, "{i}"),
            Token::Str(s) => write!(f, "{s:?}"),
            Token::Ident(s) => write!(f, "{s}"),
            Token::Newline => write!(f, "newline"),
            Token::Indent => write!(f, "indent"),
            Token::Dedent => write!(f, "outdent"),
            Token::Eof => write!(f, "end of input"),
            t => write!(f, "{}", punct_or_keyword(t)),
        }
    }
}

fn punct_or_keyword(t: &Token) -> &'static str {
    match t {
        Token::Def => "def",
        Token::Return => "return",
        Token::If => "if",
        Token::Elif => "elif",
        Token::Else => "else",
        Token::While => "while",
        Token::Pass => "pass",
        Token::Load => "load",
        Token::And => "and",
        Token::Or => "or",
        Token::Not => "not",
        Token::None => "None",
        Token::True => "True",
        Token::False => "False",
        Token::ParenLeft => "(",
        Token::ParenRight => ")",
        Token::Comma => ",",
        Token::Colon => ":",
        Token::Assign => "=",
        Token::Eq => "==",
        Token::NotEq => "!=",
        Token::Lt => "<",
        Token::LtEq => "<=",
        Token::Gt => ">",
        Token::GtEq => ">=",
        Token::Plus => "+",
        Token::Minus => "-",
        Token::Star => "*",
        Token::SlashSlash => "//",
        Token::Percent => "%",
        _ => "?",
    }
}

/// A token and where it starts
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Spanned {
    pub token: Token,
    pub span: Span,
}

/// Whether indentation is significant
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Mode {
    /// Statement lists: indentation produces `Indent` / `Dedent`
    Program,
    /// Single expressions: indentation is ignored
    Expr,
}

/// Tokenize source text, ending with `Newline` (if any tokens), closing `Dedent`s and `Eof`
pub(crate) fn lex(name: &str, text: &str, mode: Mode) -> Result<Vec<Spanned>> {
    Lexer::new(name, text, mode).run()
}

struct Lexer<'a> {
    name: &'a str,
    inner: Peekable<Chars<'a>>,
    mode: Mode,
    line: u32,
    col: u32,
    /// Nesting depth of parentheses; newlines inside are insignificant
    depth: usize,
    indents: Vec<usize>,
    tokens: Vec<Spanned>,
}

impl<'a> Lexer<'a> {
    fn new(name: &'a str, text: &'a str, mode: Mode) -> Self {
        Self {
            name,
            inner: text.chars().peekable(),
            mode,
            line: 1,
            col: 1,
            depth: 0,
            indents: vec![0],
            tokens: vec![],
        }
    }

    fn span(&self) -> Span {
        Span::new(self.line, self.col)
    }

    fn error(&self, span: Span, msg: impl Into<String>) -> Error {
        Error::parse(Position::new(self.name, span.line, span.col), msg)
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.inner.next()?;
        if ch == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(ch)
    }

    fn push(&mut self, token: Token, span: Span) {
        self.tokens.push(Spanned { token, span });
    }

    fn skip_comment(&mut self) {
        while self.inner.next_if(|ch| *ch != '\n').is_some() {
            self.col += 1;
        }
    }

    fn run(mut self) -> Result<Vec<Spanned>> {
        let mut at_line_start = true;
        loop {
            if at_line_start && self.depth == 0 {
                let Some(width) = self.indentation() else {
                    break;
                };
                match self.inner.peek() {
                    Some('\n') | Some('\r') => {
                        self.bump();
                        continue;
                    }
                    Some('#') => {
                        self.skip_comment();
                        continue;
                    }
                    _ => (),
                }
                at_line_start = false;
                if self.mode == Mode::Program {
                    self.layout(width)?;
                }
            }

            let Some(&ch) = self.inner.peek() else {
                break;
            };
            let span = self.span();
            match ch {
                '\n' => {
                    self.bump();
                    if self.depth == 0 {
                        self.push(Token::Newline, span);
                        at_line_start = true;
                    }
                }
                ' ' | '\t' | '\r' => {
                    self.bump();
                }
                '#' => self.skip_comment(),
                '\\' => {
                    self.bump();
                    if self.bump() != Some('\n') {
                        return Err(self.error(span, "unexpected character after line continuation"));
                    }
                }
                '"' | '\'' => {
                    let s = self.string()?;
                    self.push(Token::Str(s), span);
                }
                _ if ch.is_ascii_digit() => {
                    let i = self.int()?;
                    self.push(Token::Int(i), span);
                }
                _ if ch.is_alphabetic() || ch == '_' => {
                    let t = self.word();
                    self.push(t, span);
                }
                _ => {
                    let t = self.punct()?;
                    self.push(t, span);
                }
            }
        }

        let end = self.span();
        if !matches!(self.tokens.last(), None | Some(Spanned { token: Token::Newline, .. })) {
            self.push(Token::Newline, end);
        }
        while self.indents.len() > 1 {
            self.indents.pop();
            self.push(Token::Dedent, end);
        }
        self.push(Token::Eof, end);
        Ok(self.tokens)
    }

    /// Consume leading whitespace of a line and return its width, or `None` at end of input
    fn indentation(&mut self) -> Option<usize> {
        let mut width = 0;
        while let Some(ch) = self.inner.next_if(|ch| *ch == ' ' || *ch == '\t') {
            self.col += 1;
            width += if ch == '\t' { 8 - width % 8 } else { 1 };
        }
        self.inner.peek().map(|_| width)
    }

    /// Emit indent / dedent tokens for a line starting at given width
    fn layout(&mut self, width: usize) -> Result<()> {
        let span = self.span();
        let top = *self.indents.last().unwrap_or(&0);
        if width > top {
            self.indents.push(width);
            self.push(Token::Indent, span);
            return Ok(());
        }
        while width < *self.indents.last().unwrap_or(&0) {
            self.indents.pop();
            self.push(Token::Dedent, span);
        }
        if width != *self.indents.last().unwrap_or(&0) {
            return Err(self.error(span, "unindent does not match any outer indentation level"));
        }
        Ok(())
    }

    fn int(&mut self) -> Result<i64> {
        let span = self.span();
        let mut digits = String::new();
        while let Some(ch) = self.inner.next_if(|ch| ch.is_ascii_alphanumeric() || *ch == '_') {
            self.col += 1;
            digits.push(ch);
        }
        digits
            .parse()
            .map_err(|_| self.error(span, format!("invalid integer literal - {digits}")))
    }

    fn word(&mut self) -> Token {
        let mut word = String::new();
        while let Some(ch) = self.inner.next_if(|ch| ch.is_alphanumeric() || *ch == '_') {
            self.col += 1;
            word.push(ch);
        }
        match word.as_str() {
            "def" => Token::Def,
            "return" => Token::Return,
            "if" => Token::If,
            "elif" => Token::Elif,
            "else" => Token::Else,
            "while" => Token::While,
            "pass" => Token::Pass,
            "load" => Token::Load,
            "and" => Token::And,
            "or" => Token::Or,
            "not" => Token::Not,
            "None" => Token::None,
            "True" => Token::True,
            "False" => Token::False,
            _ => Token::Ident(word),
        }
    }

    fn string(&mut self) -> Result<String> {
        let span = self.span();
        let Some(quote) = self.bump() else {
            return Err(self.error(span, "expected string"));
        };
        let mut s = String::new();
        loop {
            match self.bump() {
                None | Some('\n') => return Err(self.error(span, "unterminated string literal")),
                Some(ch) if ch == quote => return Ok(s),
                Some('\\') => match self.bump() {
                    Some('n') => s.push('\n'),
                    Some('t') => s.push('\t'),
                    Some(ch @ ('\\' | '"' | '\'')) => s.push(ch),
                    _ => return Err(self.error(span, "invalid escape sequence")),
                },
                Some(ch) => s.push(ch),
            }
        }
    }

    fn punct(&mut self) -> Result<Token> {
        let span = self.span();
        let Some(ch) = self.bump() else {
            return Err(self.error(span, "expected punctuation"));
        };
        let followed_by = |lexer: &mut Self, next: char| {
            if lexer.inner.next_if_eq(&next).is_some() {
                lexer.col += 1;
                true
            } else {
                false
            }
        };
        let token = match ch {
            '(' => {
                self.depth += 1;
                Token::ParenLeft
            }
            ')' => {
                self.depth = self.depth.saturating_sub(1);
                Token::ParenRight
            }
            ',' => Token::Comma,
            ':' => Token::Colon,
            '+' => Token::Plus,
            '-' => Token::Minus,
            '*' => Token::Star,
            '%' => Token::Percent,
            '=' if followed_by(self, '=') => Token::Eq,
            '=' => Token::Assign,
            '!' if followed_by(self, '=') => Token::NotEq,
            '<' if followed_by(self, '=') => Token::LtEq,
            '<' => Token::Lt,
            '>' if followed_by(self, '=') => Token::GtEq,
            '>' => Token::Gt,
            '/' if followed_by(self, '/') => Token::SlashSlash,
            _ => return Err(self.error(span, format!("unexpected character - {ch}"))),
        };
        Ok(token)
    }
}
