//! Rule engine - the registry resolved against the selected options

use indexmap::IndexMap;
use std::ffi::OsStr;
use tracing::{debug, trace, warn};

use super::{Action, OptionSet, Pattern, Subdir, TargetCheck};
use crate::config::Registry;

/// A subdirectory rule with everything that does not apply to this run
/// filtered out
#[derive(Debug, Clone)]
pub struct ResolvedSubdir<'r> {
    pub rule: &'r Subdir,
    pub actions: Vec<&'r Action>,
    pub updates: Vec<&'r Pattern>,
    pub excludes: Vec<&'r Pattern>,
}

impl ResolvedSubdir<'_> {
    /// Check whether any active exclude pattern matches `name`
    pub fn is_excluded(&self, name: &OsStr) -> bool {
        self.excludes.iter().any(|p| p.matches(name))
    }
}

/// Engine holding the rules that apply to one run
///
/// Every condition is evaluated exactly once, here; the walker only sees
/// active rules.
#[derive(Debug)]
pub struct RuleEngine<'r> {
    active_actions: IndexMap<&'r str, &'r Action>,
    default_actions: Vec<&'r Action>,
    subdirs: Vec<ResolvedSubdir<'r>>,
    checks: Vec<&'r TargetCheck>,
}

impl<'r> RuleEngine<'r> {
    /// Resolve `registry` against the selected options
    pub fn new(registry: &'r Registry, options: OptionSet) -> Self {
        let active_actions: IndexMap<&str, &Action> = registry
            .actions
            .values()
            .filter(|action| {
                let active = action.condition.is_active(&options);
                if !active {
                    trace!("Action '{}' inactive", action.name);
                }
                active
            })
            .map(|action| (action.name.as_str(), action))
            .collect();

        let mut engine = Self {
            active_actions,
            default_actions: Vec::new(),
            subdirs: Vec::new(),
            checks: Vec::new(),
        };

        engine.default_actions = engine.lookup(registry, &registry.action_order, "ACTIONORDER");

        for subdir in &registry.subdirs {
            if !subdir.condition.is_active(&options) {
                debug!("Skipping inactive subdir: {}", subdir.name);
                continue;
            }

            let actions = if subdir.actions.is_empty() {
                engine.default_actions.clone()
            } else {
                engine.lookup(registry, &subdir.actions, &subdir.name)
            };
            if actions.is_empty() {
                debug!("Skipping subdir without active actions: {}", subdir.name);
                continue;
            }

            let updates = active_patterns(&subdir.updates, &options);
            let excludes = active_patterns(&subdir.excludes, &options);
            engine.subdirs.push(ResolvedSubdir {
                rule: subdir,
                actions,
                updates,
                excludes,
            });
        }

        engine.checks = registry
            .target_checks
            .iter()
            .filter(|check| check.condition.is_active(&options))
            .collect();

        engine
    }

    /// Map action names to active actions, keeping their order
    fn lookup(&self, registry: &Registry, names: &[String], owner: &str) -> Vec<&'r Action> {
        names
            .iter()
            .filter_map(|name| match self.active_actions.get(name.as_str()) {
                Some(action) => Some(*action),
                None => {
                    if !registry.actions.contains_key(name) {
                        warn!("{owner}: unknown action '{name}' ignored");
                    }
                    None
                }
            })
            .collect()
    }

    /// Check whether the named action is defined and active
    pub fn is_action_active(&self, name: &str) -> bool {
        self.active_actions.contains_key(name)
    }

    /// The default action order filtered to active actions
    pub fn default_actions(&self) -> &[&'r Action] {
        &self.default_actions
    }

    /// Active subdirectory rules with at least one action, in declaration order
    pub fn subdirs(&self) -> &[ResolvedSubdir<'r>] {
        &self.subdirs
    }

    /// Active destination checks
    pub fn target_checks(&self) -> &[&'r TargetCheck] {
        &self.checks
    }
}

fn active_patterns<'r>(patterns: &'r [Pattern], options: &OptionSet) -> Vec<&'r Pattern> {
    patterns
        .iter()
        .filter(|p| p.condition.is_active(options))
        .collect()
}
