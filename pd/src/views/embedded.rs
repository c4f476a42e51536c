//! Embedded views
//!
//! These are compiled into the binary from the HTML files in `templates/`.

use tracing::debug;

/// Listing of stored prompts
pub const INDEX: &str = include_str!("../../templates/index.html");

/// A single prompt
pub const PROMPT: &str = include_str!("../../templates/prompt.html");

/// Get the embedded view source by name
pub fn get_embedded(name: &str) -> Option<&'static str> {
    debug!(%name, "get_embedded: called");
    match name {
        "index" => Some(INDEX),
        "prompt" => Some(PROMPT),
        _ => {
            debug!("get_embedded: no match found");
            None
        }
    }
}
