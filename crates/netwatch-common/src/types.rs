//! Core types shared by the Netwatch agents

use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity of a monitored resource's current state
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Ready,
    Warning,
    Error,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Level::Ready => write!(f, "ready"),
            Level::Warning => write!(f, "warning"),
            Level::Error => write!(f, "error"),
        }
    }
}

/// Human-facing descriptor attached to a check result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Status {
    /// Stable identifier ("echo-reply", "timeout", ...)
    pub name: &'static str,

    pub level: Level,

    /// Short label suitable for a dashboard ("Active", "Unreachable")
    pub label: &'static str,

    /// One-line summary of what the state means
    pub summary: &'static str,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_ordering() {
        assert!(Level::Ready < Level::Warning);
        assert!(Level::Warning < Level::Error);
    }
}
