//! Configuration management

mod loader;
mod schema;

pub use schema::Registry;

use std::path::Path;
use tracing::debug;

use crate::error::{Error, Result};
use crate::rules::OptionSet;

/// Configuration file used when none is given
pub const DEFAULT_CONFIG: &str = "treewalk.xml";

impl Registry {
    /// Load the configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| Error::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;

        let registry = Self::parse(&content)?;
        debug!(
            "Loaded {}: {} options, {} actions, {} subdirs, {} target checks",
            path.display(),
            registry.options.len(),
            registry.actions.len(),
            registry.subdirs.len(),
            registry.target_checks.len()
        );
        Ok(registry)
    }

    /// Parse a configuration document
    pub fn parse(xml: &str) -> Result<Self> {
        loader::parse(xml)
    }

    /// Validate command-line option tokens against the declared options
    pub fn option_set<I, S>(&self, tokens: I) -> Result<OptionSet>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut selected = Vec::new();
        for token in tokens {
            let token = token.as_ref();
            if token.is_empty() {
                continue;
            }
            if !self.options.contains_key(token) {
                return Err(Error::UnknownOption {
                    option: token.to_string(),
                });
            }
            selected.push(token.to_string());
        }
        Ok(OptionSet::new(selected))
    }

    /// Help lines for the declared options, one per option
    pub fn option_help(&self) -> Vec<String> {
        self.options
            .iter()
            .map(|(name, help)| format!("{name}\t{help}"))
            .collect()
    }
}
