//! File selection patterns and destination sanity checks
//!
//! Filenames and checked files are matched as raw bytes, so names and
//! contents that are not valid UTF-8 still match and are passed on intact.

use regex::bytes::{Regex, RegexBuilder};
use std::borrow::Cow;
use std::ffi::{OsStr, OsString};
use std::path::PathBuf;

use super::condition::Condition;
use crate::error::{Error, Result};

/// A filename pattern used by UPDATE and EXCLUDE rules
#[derive(Debug, Clone)]
pub struct Pattern {
    regex: Regex,

    /// Replacement producing the destination name, in regex crate syntax
    target: Option<String>,

    pub condition: Condition,

    /// Opaque options handed to actions through `$options`
    pub options: Option<String>,
}

impl Pattern {
    pub fn new(
        pattern: &str,
        target: Option<&str>,
        condition: Condition,
        options: Option<String>,
    ) -> Result<Self> {
        let regex = compile(pattern)?;
        let target = target
            .map(|t| translate_template(t, &regex))
            .transpose()?;
        Ok(Self {
            regex,
            target,
            condition,
            options,
        })
    }

    /// Check whether `name` matches at its start
    pub fn matches(&self, name: impl AsRef<OsStr>) -> bool {
        let name = name_bytes(name.as_ref());
        // Leftmost-first search finds a match at 0 whenever one exists there.
        self.regex.find(&name).is_some_and(|m| m.start() == 0)
    }

    /// Derive the destination filename for a matched source filename
    pub fn destination(&self, name: impl AsRef<OsStr>) -> OsString {
        let name = name.as_ref();
        match &self.target {
            Some(template) => {
                let bytes = name_bytes(name);
                let replaced = self.regex.replace_all(&bytes, template.as_bytes());
                name_from_bytes(replaced.into_owned())
            }
            None => name.to_os_string(),
        }
    }
}

/// A CHECKTARGET entry: `file` in the destination tree must contain a line
/// matching `pattern`
#[derive(Debug, Clone)]
pub struct TargetCheck {
    regex: Regex,
    pub file: PathBuf,
    pub condition: Condition,
    pub help: String,
}

impl TargetCheck {
    pub fn new(pattern: &str, file: &str, condition: Condition, help: Option<String>) -> Result<Self> {
        Ok(Self {
            regex: compile(pattern)?,
            file: PathBuf::from(file),
            condition,
            help: help.unwrap_or_default(),
        })
    }

    /// Check whether any line of `content` contains a match
    pub fn accepts(&self, content: &[u8]) -> bool {
        content
            .split(|&b| b == b'\n')
            .any(|line| self.regex.is_match(line))
    }
}

/// Compile with byte semantics: `.` and classes match any byte, not only
/// UTF-8 sequences
fn compile(pattern: &str) -> Result<Regex> {
    RegexBuilder::new(pattern)
        .unicode(false)
        .build()
        .map_err(|e| Error::InvalidPattern {
            pattern: pattern.to_string(),
            message: e.to_string(),
        })
}

#[cfg(unix)]
fn name_bytes(name: &OsStr) -> Cow<'_, [u8]> {
    use std::os::unix::ffi::OsStrExt;
    Cow::Borrowed(name.as_bytes())
}

#[cfg(unix)]
fn name_from_bytes(bytes: Vec<u8>) -> OsString {
    use std::os::unix::ffi::OsStringExt;
    OsString::from_vec(bytes)
}

// Without raw byte access to names, fall back to their lossy UTF-8 form.
#[cfg(not(unix))]
fn name_bytes(name: &OsStr) -> Cow<'_, [u8]> {
    match name.to_string_lossy() {
        Cow::Borrowed(s) => Cow::Borrowed(s.as_bytes()),
        Cow::Owned(s) => Cow::Owned(s.into_bytes()),
    }
}

#[cfg(not(unix))]
fn name_from_bytes(bytes: Vec<u8>) -> OsString {
    String::from_utf8_lossy(&bytes).into_owned().into()
}

/// Translate a `\1` / `\g<name>` style replacement into regex crate syntax.
///
/// Literal `$` is escaped, group references become `${..}`, and the usual
/// character escapes (`\n`, `\t`, `\\`) are resolved. A reference to a group
/// `regex` does not have is an error.
pub fn translate_template(template: &str, regex: &Regex) -> Result<String> {
    let check_group = |group: &str| -> Result<()> {
        let known = match group.parse::<usize>() {
            Ok(index) => index < regex.captures_len(),
            Err(_) => regex.capture_names().flatten().any(|n| n == group),
        };
        if known {
            Ok(())
        } else {
            Err(Error::InvalidPattern {
                pattern: regex.as_str().to_string(),
                message: format!("target '{template}' refers to unknown group '{group}'"),
            })
        }
    };

    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '$' => out.push_str("$$"),
            '\\' => match chars.peek().copied() {
                Some(d) if d.is_ascii_digit() => {
                    let mut group = String::new();
                    while let Some(&d) = chars.peek() {
                        if !d.is_ascii_digit() || group.len() == 2 {
                            break;
                        }
                        group.push(d);
                        chars.next();
                    }
                    check_group(&group)?;
                    out.push_str(&format!("${{{group}}}"));
                }
                Some('g') => {
                    chars.next();
                    if chars.peek() == Some(&'<') {
                        chars.next();
                        let name: String = chars.by_ref().take_while(|&c| c != '>').collect();
                        check_group(&name)?;
                        out.push_str(&format!("${{{name}}}"));
                    } else {
                        out.push_str("\\g");
                    }
                }
                Some('n') => {
                    chars.next();
                    out.push('\n');
                }
                Some('t') => {
                    chars.next();
                    out.push('\t');
                }
                Some('\\') => {
                    chars.next();
                    out.push('\\');
                }
                _ => out.push('\\'),
            },
            c => out.push(c),
        }
    }

    Ok(out)
}
