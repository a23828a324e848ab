//! Rule conditions - except/depends applicability against selected options

use std::collections::BTreeSet;

/// The option tokens selected on the command line
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptionSet {
    tokens: BTreeSet<String>,
}

impl OptionSet {
    /// Build an option set, ignoring empty tokens
    pub fn new<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tokens: tokens
                .into_iter()
                .map(Into::into)
                .filter(|t| !t.is_empty())
                .collect(),
        }
    }

    pub fn contains(&self, token: &str) -> bool {
        self.tokens.contains(token)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.tokens.iter().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

/// Except/depends pair deciding whether a rule applies to a run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Condition {
    /// The rule is inactive if any of these options is selected
    pub excepts: Vec<String>,

    /// The rule is inactive unless all of these options are selected
    pub depends: Vec<String>,
}

impl Condition {
    /// Build a condition from the comma-separated `except` and `depends` attributes
    pub fn from_attrs(excepts: Option<&str>, depends: Option<&str>) -> Self {
        Self {
            excepts: split_list(excepts),
            depends: split_list(depends),
        }
    }

    /// Check whether this condition holds for the selected options
    pub fn is_active(&self, options: &OptionSet) -> bool {
        is_active(&self.excepts, &self.depends, options)
    }
}

/// A rule is active iff none of `excepts` and all of `depends` are selected.
pub fn is_active(excepts: &[String], depends: &[String], options: &OptionSet) -> bool {
    if excepts.iter().any(|e| options.contains(e)) {
        return false;
    }
    depends.iter().all(|d| options.contains(d))
}

/// Split a comma-separated attribute value, dropping empty elements
pub fn split_list(value: Option<&str>) -> Vec<String> {
    value
        .map(|v| {
            v.split(',')
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}
