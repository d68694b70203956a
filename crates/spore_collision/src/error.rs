//! # Collision Data Errors
//!
//! Only parsing can fail. Queries report misses as `None`.

use thiserror::Error;

/// Errors raised while decoding a collision command stream.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CollisionDataError {
    /// The stream ended inside a command.
    #[error("collision data ended unexpectedly at word {offset}")]
    UnexpectedEnd {
        /// Word offset where more data was expected.
        offset: usize,
    },

    /// A triangle refers to a vertex that was never defined.
    #[error("vertex index {index} out of range ({count} vertices)")]
    BadVertexIndex {
        /// Index found in the triangle.
        index: i16,
        /// Number of vertices loaded.
        count: usize,
    },

    /// A word that is neither a surface type nor a known command.
    #[error("unknown collision command {command:#06x} at word {offset}")]
    UnknownCommand {
        /// The offending word.
        command: i16,
        /// Word offset of the command.
        offset: usize,
    },

    /// The stream does not start with a vertex block.
    #[error("collision data does not begin with a vertex list")]
    MissingVertices,

    /// A negative element count.
    #[error("negative count {count} at word {offset}")]
    BadCount {
        /// The count word.
        count: i16,
        /// Word offset of the count.
        offset: usize,
    },
}

/// Result type for collision data decoding.
pub type CollisionResult<T> = Result<T, CollisionDataError>;
