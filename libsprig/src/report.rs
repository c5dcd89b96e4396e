//! Human-readable rendering of errors
use crate::Error;
use std::io::Write;
use tracing::warn;

/// Render an error for display.
///
/// Errors carrying a call stack render as a traceback, outermost frame first, followed by
/// the message. Others render as their message. Absent errors render as nothing.
pub fn render(err: Option<&Error>) -> Option<String> {
    let err = err?;
    let Some(stack) = err.call_stack().filter(|s| !s.is_empty()) else {
        return Some(err.to_string());
    };

    let mut out = String::from("Traceback (most recent call last):\n");
    for frame in stack.frames() {
        out.push_str(&format!("  {}: in {}\n", frame.pos, frame.name));
    }
    out.push_str(&format!("Error: {err}"));
    Some(out)
}

/// Write a rendered error to `w`, followed by a newline. Write failures are logged.
pub fn print_error(w: &mut dyn Write, err: Option<&Error>) {
    if let Some(text) = render(err) {
        if let Err(e) = writeln!(w, "{text}") {
            warn!("Failed to write error - {e}");
        }
    }
}
