//! Error types shared by the graph repository, the diffusion engine and the
//! genetic optimizer.

use thiserror::Error;

/// Errors reported by fallible operations in this crate.
///
/// None of these are fatal to a running simulation or search: every operation
/// that returns one leaves the state it was called on unchanged.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SpreadError {
    /// A diffusion step was requested before a PRNG was initialized.
    ///
    /// This is a programming error on the caller's side; initialize the PRNG
    /// (e.g. via `DiffusionEngine::start`) and retry.
    #[error("PRNG not initialized; start the simulation before stepping")]
    PrngUninitialized,

    /// No node with the given id exists in the graph.
    #[error("node `{0}` not found")]
    NodeNotFound(String),

    /// No link between the given endpoints exists in the graph.
    #[error("link `{source_id}` -> `{target_id}` not found")]
    LinkNotFound {
        /// Id of the source node.
        source_id: String,
        /// Id of the target node.
        target_id: String,
    },

    /// A node with the given id already exists.
    #[error("node `{0}` already exists")]
    DuplicateNode(String),

    /// A link between the given endpoints already exists.
    #[error("link `{source_id}` -> `{target_id}` already exists")]
    DuplicateLink {
        /// Id of the source node.
        source_id: String,
        /// Id of the target node.
        target_id: String,
    },

    /// Links from a node to itself are not allowed.
    #[error("cannot link node `{0}` to itself")]
    SelfLink(String),

    /// A snapshot failed validation and was not restored.
    #[error("invalid snapshot: {0}")]
    InvalidSnapshot(String),

    /// The speed multiplier must be a positive, finite number.
    #[error("speed multiplier must be positive, got {0}")]
    InvalidSpeed(f64),
}

/// Result alias for operations in this crate.
pub type SpreadResult<T> = Result<T, SpreadError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SpreadError::LinkNotFound {
            source_id: "a".into(),
            target_id: "b".into(),
        };
        assert_eq!(err.to_string(), "link `a` -> `b` not found");

        let msg = SpreadError::PrngUninitialized.to_string();
        assert!(msg.contains("PRNG"), "Unexpected message: {}", msg);
    }
}
