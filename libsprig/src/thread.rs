//! Per-evaluation execution context handed to an [Engine]
use crate::{CancelToken, Engine, Error, Globals, Result};

/// Loads modules on behalf of a running evaluation
pub trait Load<E: Engine> {
    /// Load `module`, returning its exported bindings
    fn load(
        &mut self,
        engine: &E,
        cancel: &CancelToken,
        module: &str,
    ) -> Result<Globals<E::Value>>;
}

/// State of one evaluation: its name, cancellation token, and module loader.
///
/// A thread lives only for the duration of one engine call.
pub struct Thread<'a, E: Engine> {
    name: String,
    cancel: CancelToken,
    loader: Option<&'a mut dyn Load<E>>,
}

impl<'a, E: Engine> Thread<'a, E> {
    pub fn new(name: impl Into<String>, cancel: CancelToken) -> Self {
        Self {
            name: name.into(),
            cancel,
            loader: None,
        }
    }

    /// Use given loader for `load` requests made during this evaluation
    pub fn with_loader(mut self, loader: &'a mut dyn Load<E>) -> Self {
        self.loader = Some(loader);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Poll point for cooperative cancellation
    pub fn check_cancelled(&self) -> Result<()> {
        self.cancel.check()
    }

    /// Load a module through this thread's loader
    pub fn load(&mut self, engine: &E, module: &str) -> Result<Globals<E::Value>> {
        match &mut self.loader {
            Some(loader) => loader.load(engine, &self.cancel, module),
            None => Err(Error::eval(format!(
                "load not implemented by this application - {module}"
            ))),
        }
    }
}

impl<E: Engine> std::fmt::Debug for Thread<'_, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Thread")
            .field("name", &self.name)
            .field("cancel", &self.cancel)
            .field("has_loader", &self.loader.is_some())
            .finish()
    }
}
