//! Session configuration

/// Presentation settings for a [Session](crate::Session)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Prompt shown at the start of a new unit
    pub prompt: String,
    /// Prompt shown while a block is being accumulated
    pub continuation: String,
    /// Name used for interactive input in positions and tracebacks
    pub filename: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            prompt: ">>> ".to_string(),
            continuation: "... ".to_string(),
            filename: "<stdin>".to_string(),
        }
    }
}
