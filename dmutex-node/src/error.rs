use std::fmt;

/// Marker error for process bootstrap. Use `error_stack::Report<NodeError>`
/// with attachments for details.
#[derive(Debug)]
pub struct NodeError;

impl fmt::Display for NodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("node bootstrap failed")
    }
}

impl std::error::Error for NodeError {}
