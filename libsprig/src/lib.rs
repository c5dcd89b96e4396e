//! Interactive front-end for embedded scripting languages.
//!
//! A [Session] reads lines, decides when they form a complete unit, evaluates the unit
//! through an [Engine], and reports results or errors.  Evaluations can be interrupted
//! through an injectable [interrupt] channel, and `load` requests go through a memoizing
//! [ModuleLoader].
mod cancel;
mod config;
mod engine;
mod error;
mod globals;
mod loader;
mod session;
mod thread;

pub mod classify;
pub mod interrupt;
pub mod line;
pub mod report;

#[cfg(test)]
mod testing;

pub use cancel::{CancelToken, CancellationBridge, Evaluation};
pub use config::Config;
pub use engine::{Engine, StmtKind, Stmts, Value};
pub use error::{CallStack, Error, Frame, Position};
pub use globals::Globals;
pub use line::{BufLines, LineReader, ReadError};
pub use loader::{exec_file, ModuleLoader};
pub use session::{Output, Session};
pub use thread::{Load, Thread};

pub type Result<T> = std::result::Result<T, Error>;
