//! Configuration schema

use indexmap::IndexMap;

use crate::rules::{Action, Subdir, TargetCheck};

/// Everything a configuration document declares
///
/// Built once by the loader and read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    /// Selectable option tokens with their help text, in declaration order
    pub options: IndexMap<String, String>,

    /// Actions by name, in declaration order
    pub actions: IndexMap<String, Action>,

    /// Action order used by subdirs that do not name their own actions
    pub action_order: Vec<String>,

    /// Directory rules, in declaration order
    pub subdirs: Vec<Subdir>,

    /// Destination tree checks run before walking
    pub target_checks: Vec<TargetCheck>,
}
