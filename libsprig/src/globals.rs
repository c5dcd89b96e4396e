//! Global bindings shared across evaluations of a session
use crate::{Error, Result};
use std::collections::BTreeMap;

/// Mapping from global name to value.
///
/// Once frozen (as after a one-shot file execution) the bindings can no longer be
/// assigned.  Sessions never freeze their globals so each evaluation can build on the
/// previous one.
#[derive(Debug, Clone, PartialEq)]
pub struct Globals<V> {
    bindings: BTreeMap<String, V>,
    frozen: bool,
}

impl<V> Default for Globals<V> {
    fn default() -> Self {
        Self {
            bindings: BTreeMap::new(),
            frozen: false,
        }
    }
}

impl<V> Globals<V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get value bound to name
    pub fn get(&self, name: &str) -> Option<&V> {
        self.bindings.get(name)
    }

    /// Whether or not name is bound
    pub fn contains(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    /// Bind name to value, replacing any previous binding
    pub fn set(&mut self, name: impl Into<String>, value: V) -> Result<()> {
        let name = name.into();
        if self.frozen {
            return Err(Error::eval(format!(
                "cannot assign to {name} - globals are frozen"
            )));
        }
        self.bindings.insert(name, value);
        Ok(())
    }

    /// Make bindings immutable
    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Iterate bindings ordered by name
    pub fn iter(&self) -> impl Iterator<Item = (&String, &V)> {
        self.bindings.iter()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

impl<V> FromIterator<(String, V)> for Globals<V> {
    fn from_iter<I: IntoIterator<Item = (String, V)>>(iter: I) -> Self {
        Self {
            bindings: iter.into_iter().collect(),
            frozen: false,
        }
    }
}
