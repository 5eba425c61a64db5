//! Resource lifecycle operations

use serde::{Deserialize, Serialize};

/// Entry point the host invoked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    /// Create a new remote object
    Create,
    /// Refresh stored state from the remote object
    Read,
    /// Apply configuration changes in place
    Update,
    /// Destroy the remote object
    Delete,
    /// Adopt an existing remote object by ID
    Import,
}

impl Operation {
    /// Whether the operation changes the remote object
    pub fn is_mutating(&self) -> bool {
        matches!(
            self,
            Operation::Create | Operation::Update | Operation::Delete
        )
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operation::Create => write!(f, "create"),
            Operation::Read => write!(f, "read"),
            Operation::Update => write!(f, "update"),
            Operation::Delete => write!(f, "delete"),
            Operation::Import => write!(f, "import"),
        }
    }
}
