//! Read-eval-print loop over an [Engine]
use crate::classify::{self, Line, PendingBlock, Unit};
use crate::line::{LineReader, ReadError};
use crate::{report, CancellationBridge, Config, Engine, Globals, ModuleLoader, Thread, Value};
use std::io::{self, Write};
use tracing::{debug, trace, warn};

/// Destination for results and error reports
pub struct Output {
    out: Box<dyn Write + Send>,
    err: Box<dyn Write + Send>,
}

impl Output {
    pub fn new(out: impl Write + Send + 'static, err: impl Write + Send + 'static) -> Self {
        Self {
            out: Box::new(out),
            err: Box::new(err),
        }
    }

    /// Results to stdout, errors to stderr
    pub fn stdio() -> Self {
        Self::new(io::stdout(), io::stderr())
    }
}

impl Default for Output {
    fn default() -> Self {
        Self::stdio()
    }
}

impl std::fmt::Debug for Output {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Output").finish_non_exhaustive()
    }
}

/// An interactive session: globals that persist across evaluations, a module loader,
/// and the bridge that cancels evaluations on interrupt.
///
/// Only one evaluation runs at a time, in the order its input was completed.
pub struct Session<E: Engine> {
    engine: E,
    globals: Globals<E::Value>,
    loader: ModuleLoader<E>,
    bridge: CancellationBridge,
    output: Output,
    config: Config,
}

impl<E: Engine> Session<E> {
    pub fn new(engine: E, bridge: CancellationBridge) -> Self {
        Self {
            engine,
            globals: Globals::new(),
            loader: ModuleLoader::new(),
            bridge,
            output: Output::default(),
            config: Config::default(),
        }
    }

    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    pub fn with_output(mut self, output: Output) -> Self {
        self.output = output;
        self
    }

    /// Current global bindings
    pub fn globals(&self) -> &Globals<E::Value> {
        &self.globals
    }

    /// Run until input ends.
    ///
    /// Interrupts while reading are reported and the loop continues. Returns `Ok` at end of
    /// input, or the error that made reading fail.
    pub fn run(&mut self, lines: &mut dyn LineReader) -> Result<(), ReadError> {
        loop {
            match self.rep(lines) {
                Ok(()) => (),
                Err(ReadError::Interrupted) => {
                    if let Err(e) = writeln!(self.output.out, "{}", ReadError::Interrupted) {
                        warn!("Failed to write output - {e}");
                    }
                }
                Err(ReadError::Eof) => {
                    if let Err(e) = writeln!(self.output.out) {
                        warn!("Failed to write output - {e}");
                    }
                    return Ok(());
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Read, evaluate, and print one unit.
    ///
    /// Returns an error only if reading failed; evaluation errors are printed.
    pub fn rep(&mut self, lines: &mut dyn LineReader) -> Result<(), ReadError> {
        if self.bridge.take_stale() {
            return Err(ReadError::Interrupted);
        }

        let line = lines.read_line(&self.config.prompt)?;
        trace!("read line {line:?}");

        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            return Ok(());
        }

        if let Line::Complete(unit) = classify::classify_line(&self.engine, &self.config.filename, &line) {
            self.execute(unit);
            return Ok(());
        }

        // first line of a block ending with a blank line
        let mut block = PendingBlock::new(line);
        loop {
            let line = lines.read_line(&self.config.continuation)?;
            trace!("read continuation line {line:?}");
            if line.trim().is_empty() {
                break;
            }
            block.push(line);
        }
        debug!("block of {} lines complete", block.len());

        let text = block.into_text();
        match classify::classify_block(&self.engine, &self.config.filename, &text) {
            Ok(unit) => self.execute(unit),
            Err(e) => report::print_error(&mut self.output.err, Some(&e)),
        }
        Ok(())
    }

    /// Evaluate `text` as one complete unit, printing its value.
    pub fn eval_str(&mut self, text: &str) -> crate::Result<()> {
        let unit = classify::classify_block(&self.engine, &self.config.filename, text)?;
        if let Some(v) = self.evaluate(unit)? {
            self.print_value(&v);
        }
        Ok(())
    }

    /// Evaluate a unit, printing its value or error
    fn execute(&mut self, unit: Unit<E>) {
        match self.evaluate(unit) {
            Ok(Some(v)) => self.print_value(&v),
            Ok(None) => (),
            Err(e) => report::print_error(&mut self.output.err, Some(&e)),
        }
    }

    /// Evaluate a unit under a fresh cancellation token.
    /// Expressions produce a value; statements produce `None`.
    fn evaluate(&mut self, unit: Unit<E>) -> crate::Result<Option<E::Value>> {
        let eval = self.bridge.begin();
        let result = {
            let mut thread = Thread::new(self.config.filename.as_str(), eval.token())
                .with_loader(&mut self.loader);
            match &unit {
                Unit::Expr(expr) => self
                    .engine
                    .eval(&mut thread, &self.globals, expr)
                    .map(Some),
                Unit::Stmts(program) => self
                    .engine
                    .exec(&mut thread, &mut self.globals, program, false)
                    .map(|()| None),
            }
        };
        if eval.finish() {
            debug!("evaluation was interrupted");
        }
        result
    }

    fn print_value(&mut self, v: &E::Value) {
        if !v.is_none() {
            if let Err(e) = writeln!(self.output.out, "{v}") {
                warn!("Failed to write value - {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interrupt;
    use crate::testing::{MockEngine, MockValue};
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};
    use tokio::runtime::{Builder, Runtime};
    use tracing_test::traced_test;

    /// Shared in-memory writer
    #[derive(Clone, Default)]
    struct Buf(Arc<Mutex<Vec<u8>>>);

    impl Buf {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    impl Write for Buf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    /// Scripted input; `None` entries simulate Control-C at the prompt
    struct Script {
        lines: VecDeque<Option<&'static str>>,
        prompts: Vec<String>,
    }

    impl Script {
        fn new(lines: &[Option<&'static str>]) -> Self {
            Self {
                lines: lines.iter().copied().collect(),
                prompts: vec![],
            }
        }
    }

    impl LineReader for Script {
        fn read_line(&mut self, prompt: &str) -> Result<String, ReadError> {
            self.prompts.push(prompt.to_string());
            match self.lines.pop_front() {
                Some(Some(line)) => Ok(line.to_string()),
                Some(None) => Err(ReadError::Interrupted),
                None => Err(ReadError::Eof),
            }
        }
    }

    struct Fixture {
        _rt: Runtime,
        session: Session<MockEngine>,
        out: Buf,
        err: Buf,
    }

    fn fixture(engine: MockEngine) -> Fixture {
        let rt = Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .unwrap();
        let (_tx, rx) = interrupt::channel();
        let out = Buf::default();
        let err = Buf::default();
        let session = Session::new(engine, CancellationBridge::new(rx, rt.handle().clone()))
            .with_output(Output::new(out.clone(), err.clone()));
        Fixture {
            _rt: rt,
            session,
            out,
            err,
        }
    }

    #[test]
    fn prints_expression_values_but_not_none() {
        let mut f = fixture(MockEngine::new());
        let mut input = Script::new(&[Some("3"), Some("None"), Some("# comment"), Some("  ")]);
        f.session.run(&mut input).unwrap();
        assert_eq!(f.out.contents(), "3\n\n");
        assert_eq!(f.err.contents(), "");
    }

    #[test]
    fn single_assignment_runs_immediately() {
        let mut f = fixture(MockEngine::new());
        let mut input = Script::new(&[Some("x = 3"), Some("x")]);
        f.session.run(&mut input).unwrap();
        assert_eq!(f.out.contents(), "3\n\n");
        assert_eq!(input.prompts, vec![">>> ", ">>> ", ">>> "]);
        assert_eq!(f.session.globals().get("x"), Some(&MockValue::Int(3)));
    }

    #[test]
    fn block_uses_continuation_prompt() {
        let mut f = fixture(MockEngine::new());
        let mut input = Script::new(&[Some("def f:"), Some("    body"), Some("")]);
        f.session.run(&mut input).unwrap();
        assert_eq!(input.prompts, vec![">>> ", "... ", "... ", ">>> "]);
        assert!(f.session.globals().contains("f"));
    }

    #[test]
    fn errors_are_printed_and_loop_continues() {
        let mut f = fixture(MockEngine::new());
        let mut input = Script::new(&[Some("y"), Some("fail oops"), Some(""), Some("1")]);
        f.session.run(&mut input).unwrap();
        assert_eq!(f.err.contents(), "undefined: y\noops\n");
        assert_eq!(f.out.contents(), "1\n\n");
    }

    #[test]
    fn interrupt_at_prompt_is_reported() {
        let mut f = fixture(MockEngine::new());
        let mut input = Script::new(&[None, Some("1")]);
        f.session.run(&mut input).unwrap();
        assert_eq!(f.out.contents(), "Interrupted\n1\n\n");
    }

    #[test]
    fn interrupt_during_block_discards_it() {
        let mut f = fixture(MockEngine::new());
        let mut input = Script::new(&[Some("def f:"), None, Some("2")]);
        f.session.run(&mut input).unwrap();
        assert_eq!(f.out.contents(), "Interrupted\n2\n\n");
        assert!(!f.session.globals().contains("f"));
    }

    #[test]
    fn eval_str_returns_errors() {
        let mut f = fixture(MockEngine::new());
        assert!(f.session.eval_str("x = 4").is_ok());
        assert!(f.session.eval_str("x").is_ok());
        assert!(f.session.eval_str("nope").is_err());
        assert_eq!(f.out.contents(), "4\n");
    }

    struct Closed;

    impl Write for Closed {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::ErrorKind::BrokenPipe.into())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    #[traced_test]
    fn output_failures_are_logged_and_loop_continues() {
        let Fixture { _rt, session, .. } = fixture(MockEngine::new());
        let mut session = session.with_output(Output::new(Closed, Closed));
        let mut input = Script::new(&[Some("3"), None, Some("x = 4")]);
        session.run(&mut input).unwrap();
        assert_eq!(session.globals().get("x"), Some(&MockValue::Int(4)));
        assert!(logs_contain("Failed to write value"));
        assert!(logs_contain("Failed to write output"));
    }
}
