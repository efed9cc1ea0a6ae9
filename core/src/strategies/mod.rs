#![deny(missing_docs)]

//! # Strategies
//!
//! This module defines the architecture for pluggable test rendering.
//!
//! - **traits**: Defines `TestStrategy` for implementing new frameworks.
//! - **pytest**: The default implementation (pytest + requests).
//! - **ureq**: Rust integration tests using ureq.

pub mod pytest;
pub mod traits;
pub mod ureq;
pub mod utils;

// Re-export for easier access downstream
pub use pytest::PytestStrategy;
pub use traits::TestStrategy;
pub use ureq::UreqStrategy;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

static PYTEST: PytestStrategy = PytestStrategy;
static UREQ: UreqStrategy = UreqStrategy;

/// Selects a built-in strategy by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    /// pytest + requests.
    #[default]
    Pytest,
    /// Rust + ureq.
    Ureq,
}

impl StrategyKind {
    /// The strategy implementation.
    pub fn strategy(&self) -> &'static dyn TestStrategy {
        match self {
            Self::Pytest => &PYTEST,
            Self::Ureq => &UREQ,
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.strategy().name())
    }
}

impl FromStr for StrategyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pytest" | "python" => Ok(Self::Pytest),
            "ureq" | "rust" => Ok(Self::Ureq),
            other => Err(format!("unknown strategy '{}' (expected pytest or ureq)", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_kind_parse() {
        assert_eq!("pytest".parse::<StrategyKind>().unwrap(), StrategyKind::Pytest);
        assert_eq!("Rust".parse::<StrategyKind>().unwrap(), StrategyKind::Ureq);
        assert!("jest".parse::<StrategyKind>().is_err());
        assert_eq!(StrategyKind::default().to_string(), "pytest");
        assert_eq!(StrategyKind::Ureq.strategy().comment_prefix(), "//");
    }
}
