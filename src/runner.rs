//! Command runner - executes action commands with a structured environment

use indexmap::IndexMap;
use std::borrow::Cow;
use std::ffi::{OsStr, OsString};
use std::path::{Component, Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::rules::Action;

/// Variables every action command receives
pub const ENV_VARS: [&str; 9] = [
    "srcpath",
    "dstpath",
    "options",
    "srcbase",
    "dstbase",
    "srcrelpath",
    "dstrelpath",
    "srcfiles",
    "dstfiles",
];

/// The files one UPDATE pattern selected in one directory
#[derive(Debug, Clone)]
pub struct FileGroup<'a> {
    pub src_base: &'a Path,
    pub dst_base: &'a Path,
    pub src_path: PathBuf,
    pub dst_path: PathBuf,
    pub src_files: Vec<OsString>,
    pub dst_files: Vec<OsString>,
    pub options: Option<&'a str>,
}

/// Environment handed to a single action invocation
///
/// Values are kept as OS strings so paths and filenames reach the command
/// byte for byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionEnv {
    vars: IndexMap<&'static str, OsString>,
}

impl ActionEnv {
    /// Environment shared by every invocation for `group`, without the file lists
    fn base(group: &FileGroup<'_>) -> Self {
        let mut vars = IndexMap::new();
        vars.insert("srcpath", group.src_path.clone().into_os_string());
        vars.insert("dstpath", group.dst_path.clone().into_os_string());
        vars.insert("options", group.options.unwrap_or_default().into());
        vars.insert("srcbase", group.src_base.as_os_str().to_os_string());
        vars.insert("dstbase", group.dst_base.as_os_str().to_os_string());
        vars.insert("srcrelpath", relative(&group.src_path, group.src_base));
        vars.insert("dstrelpath", relative(&group.dst_path, group.dst_base));
        Self { vars }
    }

    /// One environment covering the whole group, file lists space-joined
    pub fn for_group(group: &FileGroup<'_>) -> Self {
        let mut env = Self::base(group);
        env.vars.insert("srcfiles", join(&group.src_files));
        env.vars.insert("dstfiles", join(&group.dst_files));
        env
    }

    /// One environment per (source, destination) pair, in group order
    pub fn per_file(group: &FileGroup<'_>) -> Vec<Self> {
        let base = Self::base(group);
        group
            .src_files
            .iter()
            .zip(&group.dst_files)
            .map(|(src, dst)| {
                let mut env = base.clone();
                env.vars.insert("srcfiles", src.clone());
                env.vars.insert("dstfiles", dst.clone());
                env
            })
            .collect()
    }

    /// Value of `name` for display; undecodable bytes are replaced
    pub fn get(&self, name: &str) -> Option<Cow<'_, str>> {
        self.vars.get(name).map(|v| v.to_string_lossy())
    }

    /// Exact value of `name`, as the command sees it
    pub fn get_os(&self, name: &str) -> Option<&OsStr> {
        self.vars.get(name).map(OsString::as_os_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &OsStr)> {
        self.vars.iter().map(|(k, v)| (*k, v.as_os_str()))
    }

    /// Render the invocation as a copy-pasteable shell line
    pub fn command_line(&self, command: &str) -> String {
        let mut words: Vec<String> = self
            .iter()
            .map(|(k, v)| format!("{k}={}", quote(&v.to_string_lossy())))
            .collect();
        words.push("sh".to_string());
        words.push("-c".to_string());
        words.push(quote(command));
        words.join(" ")
    }
}

fn quote(value: &str) -> String {
    shlex::try_quote(value)
        .map(|q| q.into_owned())
        .unwrap_or_else(|_| value.escape_debug().to_string())
}

fn join(names: &[OsString]) -> OsString {
    let mut joined = OsString::new();
    for (i, name) in names.iter().enumerate() {
        if i > 0 {
            joined.push(" ");
        }
        joined.push(name);
    }
    joined
}

/// Strip the base prefix from a path, keeping the leading separator
fn relative(path: &Path, base: &Path) -> OsString {
    match path.strip_prefix(base) {
        Ok(rel) if rel.as_os_str().is_empty() => OsString::new(),
        Ok(rel) => {
            let mut out = OsString::new();
            for component in rel.components() {
                if let Component::Normal(part) = component {
                    out.push(std::path::MAIN_SEPARATOR_STR);
                    out.push(part);
                }
            }
            out
        }
        Err(_) => path.as_os_str().to_os_string(),
    }
}

/// Captured result of a finished command
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub code: Option<i32>,
    /// stdout and stderr, interleaved as the command wrote them
    pub output: String,
}

/// Executes action commands
pub trait CommandRunner {
    /// Run `action` once with `env`; a failing command is an error
    fn run(&mut self, action: &Action, env: &ActionEnv) -> Result<CommandOutput>;
}

/// Runs commands through `sh -c`
#[derive(Debug, Clone)]
pub struct ShellRunner {
    shell: PathBuf,
}

impl Default for ShellRunner {
    fn default() -> Self {
        Self {
            shell: PathBuf::from("sh"),
        }
    }
}

impl ShellRunner {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CommandRunner for ShellRunner {
    fn run(&mut self, action: &Action, env: &ActionEnv) -> Result<CommandOutput> {
        // Route stderr into the stdout pipe so the output keeps its order.
        let script = format!("exec 2>&1\n{}", action.command);

        let output = Command::new(&self.shell)
            .arg("-c")
            .arg(&script)
            .envs(env.iter())
            .stdin(Stdio::null())
            .output()
            .map_err(|source| Error::Spawn {
                action: action.name.clone(),
                source,
            })?;

        let result = CommandOutput {
            code: output.status.code(),
            output: String::from_utf8_lossy(&output.stdout).into_owned(),
        };

        if !output.status.success() {
            return Err(Error::CommandFailed {
                action: action.name.clone(),
                command: env.command_line(&action.command),
                status: output.status.to_string(),
                output: result.output,
            });
        }

        if !result.output.is_empty() {
            debug!("{}: {}", action.name, result.output.trim_end());
        }
        Ok(result)
    }
}

/// Prints what would run instead of running it
#[derive(Debug, Clone, Default)]
pub struct DryRunner {
    /// Number of commands that would have run
    pub planned: usize,
}

impl CommandRunner for DryRunner {
    fn run(&mut self, action: &Action, env: &ActionEnv) -> Result<CommandOutput> {
        let line = env.command_line(&action.command);
        info!("[dry-run] {}", action.name);
        println!("{line}");
        self.planned += 1;
        Ok(CommandOutput {
            code: Some(0),
            output: String::new(),
        })
    }
}
