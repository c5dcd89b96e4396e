//! Memoizing module loader with cycle detection
use crate::{CancelToken, Engine, Error, Globals, Load, Result, Thread};
use std::collections::HashMap;
use tracing::debug;

/// State of a module in the loader's cache
#[derive(Debug)]
enum Entry<V> {
    /// Load is in progress further up the current call chain
    Pending,
    Loaded(Globals<V>),
    Failed(Error),
}

/// Sequential module loader.
///
/// Each module is executed at most once per loader; later requests get the cached
/// bindings or error.  A request for a module whose load is still in progress is a cycle.
/// A load cut short by cancellation is the one result that is not cached, so the module
/// runs again on the next request.
/// Loaders are not shared between unrelated sessions or file executions.
pub struct ModuleLoader<E: Engine> {
    cache: HashMap<String, Entry<E::Value>>,
}

impl<E: Engine> Default for ModuleLoader<E> {
    fn default() -> Self {
        Self {
            cache: HashMap::new(),
        }
    }
}

impl<E: Engine> ModuleLoader<E> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<E: Engine> Load<E> for ModuleLoader<E> {
    fn load(
        &mut self,
        engine: &E,
        cancel: &CancelToken,
        module: &str,
    ) -> Result<Globals<E::Value>> {
        match self.cache.get(module) {
            Some(Entry::Pending) => {
                debug!("load {module} - cycle");
                return Err(Error::Cycle(module.to_string()));
            }
            Some(Entry::Loaded(globals)) => {
                debug!("load {module} - cached");
                return Ok(globals.clone());
            }
            Some(Entry::Failed(e)) => {
                debug!("load {module} - cached failure");
                return Err(e.clone());
            }
            None => (),
        }

        debug!("load {module} - executing");
        self.cache.insert(module.to_string(), Entry::Pending);

        let result = {
            let mut thread = Thread::new(module, cancel.clone()).with_loader(&mut *self);
            engine.exec_file(&mut thread, module)
        };

        let entry = match &result {
            Ok(globals) => Entry::Loaded(globals.clone()),
            Err(Error::Cancelled) => {
                debug!("load {module} - cancelled");
                self.cache.remove(module);
                return result;
            }
            Err(e) => Entry::Failed(e.clone()),
        };
        self.cache.insert(module.to_string(), entry);
        result
    }
}

impl<E: Engine> std::fmt::Debug for ModuleLoader<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleLoader")
            .field("modules", &self.cache.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Execute `filename` as a top-level program with its own fresh loader
pub fn exec_file<E: Engine>(
    engine: &E,
    filename: &str,
    cancel: CancelToken,
) -> Result<Globals<E::Value>> {
    let mut loader = ModuleLoader::<E>::new();
    let mut thread = Thread::new(filename, cancel).with_loader(&mut loader);
    engine.exec_file(&mut thread, filename)
}
