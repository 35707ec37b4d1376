use std::fmt;

// === StoreError ===

/// Errors related to settings-store operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The hosting extension context became unreachable.
    ContextInvalidated,
    /// An I/O error occurred while reading or writing the backing store.
    Io(String),
    /// Failed to serialize or deserialize stored settings.
    Serialization(String),
    /// The backing store reported a transient failure.
    Backend(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::ContextInvalidated => write!(f, "Extension context invalidated"),
            StoreError::Io(msg) => write!(f, "Settings store I/O error: {}", msg),
            StoreError::Serialization(msg) => {
                write!(f, "Settings store serialization error: {}", msg)
            }
            StoreError::Backend(msg) => write!(f, "Settings store backend error: {}", msg),
        }
    }
}

impl std::error::Error for StoreError {}

// === PatternError ===

/// Errors related to building a search pattern for a configured word.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatternError {
    /// The pattern for the given word failed to compile.
    Construction(String),
}

impl fmt::Display for PatternError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatternError::Construction(msg) => write!(f, "Pattern construction failed: {}", msg),
        }
    }
}

impl std::error::Error for PatternError {}

// === DomError ===

/// Errors related to document tree mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomError {
    /// The node is not attached to the tree.
    Detached(String),
    /// The reference node is not a child of the given parent.
    NotAChild(String),
    /// The requested mutation would corrupt the tree structure.
    InvalidStructure(String),
}

impl fmt::Display for DomError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DomError::Detached(msg) => write!(f, "Node is detached: {}", msg),
            DomError::NotAChild(msg) => write!(f, "Node is not a child: {}", msg),
            DomError::InvalidStructure(msg) => write!(f, "Invalid tree mutation: {}", msg),
        }
    }
}

impl std::error::Error for DomError {}

// === TransportError ===

/// Errors related to the cross-context query round-trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The query did not complete within the allowed time (milliseconds).
    Timeout(u64),
    /// The response channel closed before a reply arrived.
    ChannelClosed(String),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::Timeout(ms) => write!(f, "Query timed out after {}ms", ms),
            TransportError::ChannelClosed(msg) => {
                write!(f, "Query channel closed: {}", msg)
            }
        }
    }
}

impl std::error::Error for TransportError {}
