//! Document model error types

use thiserror::Error;

use crate::dom::NodeId;

/// Errors raised by document queries and mutations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomError {
    /// The node id does not refer to a live element
    #[error("node {0:?} does not exist")]
    NodeNotFound(NodeId),

    /// The node exists but is not attached under the document root
    #[error("node {0:?} is not connected to the document")]
    Detached(NodeId),

    /// Appending would make a node its own ancestor
    #[error("cannot insert {child:?} under {parent:?}: would create a cycle")]
    HierarchyCycle { parent: NodeId, child: NodeId },

    /// Selector text could not be parsed
    #[error("invalid selector `{selector}`: {reason}")]
    InvalidSelector { selector: String, reason: String },
}

/// Result type for document operations
pub type Result<T> = std::result::Result<T, DomError>;
