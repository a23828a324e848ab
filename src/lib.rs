//! treewalk - XML configurable tree walking
//!
//! Walks a source tree and runs configured shell actions over selected files
//! against a destination tree.

pub mod config;
pub mod error;
pub mod rules;
pub mod runner;
pub mod walker;

pub use config::Registry;
pub use error::{Error, Result};
pub use rules::{Action, Condition, OptionSet, Pattern, RuleEngine, Subdir, TargetCheck};
pub use runner::{ActionEnv, CommandRunner, DryRunner, ShellRunner};
pub use walker::{WalkStats, Walker};

/// Current version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
