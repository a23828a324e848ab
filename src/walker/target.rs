//! Destination tree sanity checks

use std::path::Path;
use tracing::debug;

use crate::error::{Error, Result};
use crate::rules::TargetCheck;

/// Verify every check against the destination tree
///
/// A check fails if its file cannot be read or no line of it matches.
pub fn check_targets(checks: &[&TargetCheck], dst_base: &Path) -> Result<()> {
    for check in checks {
        let path = dst_base.join(&check.file);
        let passed = match std::fs::read(&path) {
            Ok(content) => check.accepts(&content),
            Err(e) => {
                debug!("Cannot read {}: {}", path.display(), e);
                false
            }
        };

        if !passed {
            return Err(Error::TargetCheck {
                file: path,
                help: check.help.clone(),
            });
        }
        debug!("Target check passed: {}", path.display());
    }
    Ok(())
}
