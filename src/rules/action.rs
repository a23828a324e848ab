//! Rule actions - named shell command templates

use regex::Regex;
use std::collections::BTreeSet;
use std::sync::LazyLock;
use tracing::debug;

use super::Condition;
use crate::error::Result;
use crate::runner::{ActionEnv, CommandRunner, ENV_VARS, FileGroup};

/// How an action is invoked for a group of matched files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Once per group, with space-joined file lists
    All,
    /// Once per (source, destination) pair
    #[default]
    PerFile,
}

impl Mode {
    /// Parse the `mode` attribute; anything but `all` is per-file
    pub fn from_attr(value: Option<&str>) -> Self {
        match value {
            Some("all") => Mode::All,
            _ => Mode::PerFile,
        }
    }
}

/// A named shell command run over matched files
#[derive(Debug, Clone)]
pub struct Action {
    pub name: String,

    /// Command passed to `sh -c`
    pub command: String,

    pub condition: Condition,

    pub mode: Mode,
}

impl Action {
    pub fn new(
        name: impl Into<String>,
        command: impl Into<String>,
        condition: Condition,
        mode: Mode,
    ) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            condition,
            mode,
        }
    }

    /// Run this action over a matched file group, returning the number of
    /// commands executed
    pub fn process<R: CommandRunner + ?Sized>(
        &self,
        group: &FileGroup<'_>,
        runner: &mut R,
    ) -> Result<usize> {
        let envs = match self.mode {
            Mode::All => vec![ActionEnv::for_group(group)],
            Mode::PerFile => ActionEnv::per_file(group),
        };

        for env in &envs {
            debug!(
                "Action: {} ({} -> {})",
                self.name,
                env.get("srcfiles").unwrap_or_default(),
                env.get("dstfiles").unwrap_or_default()
            );
            runner.run(self, env)?;
        }

        Ok(envs.len())
    }

    /// Variables the command reads that nothing will provide
    ///
    /// Names set by the walker, assigned or looped over inside the command,
    /// or present in the process environment are considered provided.
    pub fn unresolved_vars(&self) -> Vec<String> {
        static VAR_RE: LazyLock<Regex> = LazyLock::new(|| {
            Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)[^}]*\}|\$([A-Za-z_][A-Za-z0-9_]*)")
                .expect("invalid variable regex")
        });
        static ASSIGN_RE: LazyLock<Regex> = LazyLock::new(|| {
            Regex::new(r"(?:^|[\s;&|(])(?:for\s+|read\s+(?:-\w+\s+)*|local\s+|export\s+)?([A-Za-z_][A-Za-z0-9_]*)(?:=|\s+in\b)")
                .expect("invalid assignment regex")
        });

        let assigned: BTreeSet<&str> = ASSIGN_RE
            .captures_iter(&self.command)
            .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
            .collect();

        let mut unresolved: Vec<String> = VAR_RE
            .captures_iter(&self.command)
            .filter_map(|caps| caps.get(1).or_else(|| caps.get(2)))
            .map(|m| m.as_str())
            .filter(|name| !ENV_VARS.contains(name))
            .filter(|name| !assigned.contains(name))
            .filter(|name| std::env::var_os(name).is_none())
            .map(str::to_string)
            .collect();
        unresolved.sort();
        unresolved.dedup();
        unresolved
    }
}
