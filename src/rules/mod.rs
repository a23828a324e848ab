//! Rule model - actions, subdirectory rules and file patterns

mod action;
mod condition;
mod engine;
mod pattern;

pub use action::{Action, Mode};
pub use condition::{Condition, OptionSet, is_active, split_list};
pub use engine::{ResolvedSubdir, RuleEngine};
pub use pattern::{Pattern, TargetCheck, translate_template};

/// A directory rule: which files to select below a directory and which
/// actions to run on them
#[derive(Debug, Clone)]
pub struct Subdir {
    /// Directory relative to the source and destination roots
    pub name: String,

    pub condition: Condition,

    /// Actions to run, in order; empty means the default action order
    pub actions: Vec<String>,

    /// Patterns selecting files, processed in declaration order
    pub updates: Vec<Pattern>,

    /// Patterns removing files from every update selection
    pub excludes: Vec<Pattern>,

    /// Apply the same rule to every directory below this one
    pub recurse: bool,
}

impl Subdir {
    pub fn new(name: impl Into<String>, condition: Condition, actions: Vec<String>, recurse: bool) -> Self {
        Self {
            name: name.into(),
            condition,
            actions,
            updates: Vec::new(),
            excludes: Vec::new(),
            recurse,
        }
    }

    /// Add an update pattern
    pub fn add_update(&mut self, pattern: Pattern) {
        self.updates.push(pattern);
    }

    /// Add an exclude pattern
    pub fn add_exclude(&mut self, pattern: Pattern) {
        self.excludes.push(pattern);
    }
}
