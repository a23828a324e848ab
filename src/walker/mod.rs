//! Tree walker - applies the resolved rules to the source tree

mod target;

pub use target::check_targets;

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::{debug, info, trace};

use crate::error::{Error, Result};
use crate::rules::{ResolvedSubdir, RuleEngine};
use crate::runner::{CommandRunner, FileGroup};

/// Counters reported after a walk
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WalkStats {
    pub directories: usize,
    pub groups: usize,
    pub commands: usize,
}

/// Walks a source tree and runs actions against a destination tree
pub struct Walker<'e, 'r, R> {
    engine: &'e RuleEngine<'r>,
    src_base: PathBuf,
    dst_base: PathBuf,
    runner: R,
    stats: WalkStats,
}

impl<'e, 'r, R: CommandRunner> Walker<'e, 'r, R> {
    pub fn new(
        engine: &'e RuleEngine<'r>,
        src_base: impl Into<PathBuf>,
        dst_base: impl Into<PathBuf>,
        runner: R,
    ) -> Self {
        Self {
            engine,
            src_base: src_base.into(),
            dst_base: dst_base.into(),
            runner,
            stats: WalkStats::default(),
        }
    }

    /// Check the destination tree, then process every subdirectory rule
    pub fn run(&mut self) -> Result<WalkStats> {
        let engine = self.engine;
        check_targets(engine.target_checks(), &self.dst_base)?;

        for subdir in engine.subdirs() {
            self.process_subdir(subdir, Path::new(&subdir.rule.name))?;
        }

        info!(
            "Walk finished: {} directories, {} file groups, {} commands",
            self.stats.directories, self.stats.groups, self.stats.commands
        );
        Ok(self.stats)
    }

    /// The runner, e.g. to inspect what it recorded
    pub fn runner(&self) -> &R {
        &self.runner
    }

    pub fn into_runner(self) -> R {
        self.runner
    }

    /// Process `dir` for the directory `rel` below both roots, then recurse
    fn process_subdir(&mut self, dir: &ResolvedSubdir<'r>, rel: &Path) -> Result<()> {
        let src_path = self.src_base.join(rel);
        let dst_path = self.dst_base.join(rel);

        let entries = list_dir(&src_path)?;
        info!("Processing {}", src_path.display());
        self.stats.directories += 1;

        self.process_updates(dir, &src_path, &dst_path, &entries)?;

        if !dir.rule.recurse {
            return Ok(());
        }

        for name in &entries {
            if src_path.join(name).is_dir() {
                self.process_subdir(dir, &rel.join(name))?;
            }
        }
        Ok(())
    }

    fn process_updates(
        &mut self,
        dir: &ResolvedSubdir<'r>,
        src_path: &Path,
        dst_path: &Path,
        entries: &[OsString],
    ) -> Result<()> {
        for update in &dir.updates {
            let src_files: Vec<OsString> = entries
                .iter()
                .filter(|name| update.matches(name))
                .filter(|name| {
                    let excluded = dir.is_excluded(name);
                    if excluded {
                        trace!("Excluded {}", name.to_string_lossy());
                    }
                    !excluded
                })
                .cloned()
                .collect();

            if src_files.is_empty() {
                continue;
            }

            let dst_files: Vec<OsString> = src_files
                .iter()
                .map(|name| {
                    let dst = update.destination(name);
                    debug!("{}", dst.to_string_lossy());
                    dst
                })
                .collect();

            let group = FileGroup {
                src_base: &self.src_base,
                dst_base: &self.dst_base,
                src_path: src_path.to_path_buf(),
                dst_path: dst_path.to_path_buf(),
                src_files,
                dst_files,
                options: update.options.as_deref(),
            };
            self.stats.groups += 1;

            for action in &dir.actions {
                self.stats.commands += action.process(&group, &mut self.runner)?;
            }
        }
        Ok(())
    }
}

/// Names of the immediate entries of `path`, sorted
fn list_dir(path: &Path) -> Result<Vec<OsString>> {
    let read_err = |source| Error::ReadDir {
        path: path.to_path_buf(),
        source,
    };

    let mut names = Vec::new();
    for entry in std::fs::read_dir(path).map_err(read_err)? {
        let entry = entry.map_err(read_err)?;
        names.push(entry.file_name());
    }
    names.sort();
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Registry;
    use crate::rules::{Action, OptionSet};
    use crate::runner::{ActionEnv, CommandOutput, ShellRunner};
    use std::fs;

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct Call {
        action: String,
        srcrelpath: String,
        srcfiles: String,
        dstfiles: String,
        options: String,
    }

    #[derive(Default)]
    struct Recorder {
        calls: Vec<Call>,
    }

    impl CommandRunner for Recorder {
        fn run(&mut self, action: &Action, env: &ActionEnv) -> Result<CommandOutput> {
            let var = |name| env.get(name).unwrap_or_default().into_owned();
            self.calls.push(Call {
                action: action.name.clone(),
                srcrelpath: var("srcrelpath"),
                srcfiles: var("srcfiles"),
                dstfiles: var("dstfiles"),
                options: var("options"),
            });
            Ok(CommandOutput::default())
        }
    }

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, rel).unwrap();
    }

    fn walk(xml: &str, options: &[&str], src: &Path, dst: &Path) -> Result<Vec<Call>> {
        let registry = Registry::parse(xml).unwrap();
        let engine = RuleEngine::new(&registry, OptionSet::new(options.iter().copied()));
        let mut walker = Walker::new(&engine, src, dst, Recorder::default());
        walker.run()?;
        Ok(walker.into_runner().calls)
    }

    #[test]
    fn test_all_and_per_file_actions_in_order() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();
        for f in ["fs/b.c", "fs/a.c", "fs/a.h", "fs/README"] {
            touch(src.path(), f);
        }

        let xml = r#"<T>
            <ACTION name="patch" mode="all">true</ACTION>
            <ACTION name="copy">true</ACTION>
            <ACTIONORDER order="patch,copy"/>
            <SUBDIR name="fs">
                <UPDATE pattern=".*\.c$" options="-p1"/>
                <UPDATE pattern=".*\.h$"/>
            </SUBDIR>
        </T>"#;

        let calls = walk(xml, &[], src.path(), dst.path()).unwrap();
        let summary: Vec<_> = calls
            .iter()
            .map(|c| (c.action.as_str(), c.srcfiles.as_str(), c.options.as_str()))
            .collect();
        assert_eq!(
            summary,
            [
                ("patch", "a.c b.c", "-p1"),
                ("copy", "a.c", "-p1"),
                ("copy", "b.c", "-p1"),
                ("patch", "a.h", ""),
                ("copy", "a.h", ""),
            ]
        );
        assert!(calls.iter().all(|c| c.srcrelpath == "/fs"));
    }

    #[test]
    fn test_exclude_wins_over_update() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();
        for f in ["d/keep.c", "d/skip.c", "d/other.c"] {
            touch(src.path(), f);
        }

        let xml = r#"<T>
            <ACTION name="copy">true</ACTION>
            <ACTIONORDER order="copy"/>
            <SUBDIR name="d">
                <UPDATE pattern=".*\.c$"/>
                <EXCLUDE pattern="skip"/>
                <EXCLUDE pattern="other" depends="strict"/>
            </SUBDIR>
        </T>"#;

        let calls = walk(xml, &[], src.path(), dst.path()).unwrap();
        let files: Vec<_> = calls.iter().map(|c| c.srcfiles.as_str()).collect();
        assert_eq!(files, ["keep.c", "other.c"]);

        let calls = walk(xml, &["strict"], src.path(), dst.path()).unwrap();
        let files: Vec<_> = calls.iter().map(|c| c.srcfiles.as_str()).collect();
        assert_eq!(files, ["keep.c"]);
    }

    #[test]
    fn test_exclude_filters_source_names_not_destinations() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();
        for f in ["d/a.c", "d/a.h", "d/b.o"] {
            touch(src.path(), f);
        }

        let xml = r#"<T>
            <ACTION name="gen" mode="all">true</ACTION>
            <ACTIONORDER order="gen"/>
            <SUBDIR name="d">
                <UPDATE pattern="(.*)\.c$" target="\1.h"/>
                <EXCLUDE pattern="a\.h"/>
            </SUBDIR>
        </T>"#;

        let calls = walk(xml, &[], src.path(), dst.path()).unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].srcfiles, "a.c");
        assert_eq!(calls[0].dstfiles, "a.h");
    }

    #[test]
    fn test_recursion_inherits_rule() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();
        for f in ["drivers/top.c", "drivers/mtd/nand/x.c", "drivers/mtd/y.c", "drivers/usb/z.c"] {
            touch(src.path(), f);
        }

        let xml = r#"<T>
            <ACTION name="copy" mode="all">true</ACTION>
            <ACTION name="diff" mode="all" depends="diff">true</ACTION>
            <ACTIONORDER order="copy,diff"/>
            <SUBDIR name="drivers" recurse="yes">
                <UPDATE pattern=".*\.c$"/>
            </SUBDIR>
        </T>"#;

        let calls = walk(xml, &[], src.path(), dst.path()).unwrap();
        let visited: Vec<_> = calls
            .iter()
            .map(|c| (c.action.as_str(), c.srcrelpath.as_str(), c.srcfiles.as_str()))
            .collect();
        assert_eq!(
            visited,
            [
                ("copy", "/drivers", "top.c"),
                ("copy", "/drivers/mtd", "y.c"),
                ("copy", "/drivers/mtd/nand", "x.c"),
                ("copy", "/drivers/usb", "z.c"),
            ]
        );
    }

    #[test]
    fn test_no_recursion_without_flag() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();
        touch(src.path(), "fs/a.c");
        touch(src.path(), "fs/sub/b.c");

        let xml = r#"<T>
            <ACTION name="copy">true</ACTION>
            <SUBDIR name="fs" actions="copy"><UPDATE pattern=".*\.c$"/></SUBDIR>
        </T>"#;

        let calls = walk(xml, &[], src.path(), dst.path()).unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].srcfiles, "a.c");
    }

    #[test]
    fn test_missing_source_dir_is_fatal() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();

        let xml = r#"<T>
            <ACTION name="copy">true</ACTION>
            <SUBDIR name="nowhere" actions="copy"><UPDATE pattern="."/></SUBDIR>
        </T>"#;

        let err = walk(xml, &[], src.path(), dst.path()).unwrap_err();
        assert!(matches!(err, Error::ReadDir { .. }));
    }

    #[test]
    fn test_failed_target_check_runs_nothing() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();
        touch(src.path(), "fs/a.c");

        let xml = r#"<T>
            <ACTION name="copy">true</ACTION>
            <SUBDIR name="fs" actions="copy"><UPDATE pattern="."/></SUBDIR>
            <CHECKTARGET pattern="^2\.6" file="VERSION" help="wrong tree"/>
        </T>"#;

        let registry = Registry::parse(xml).unwrap();
        let engine = RuleEngine::new(&registry, OptionSet::default());
        let mut walker = Walker::new(&engine, src.path(), dst.path(), Recorder::default());

        let err = walker.run().unwrap_err();
        assert!(matches!(err, Error::TargetCheck { ref help, .. } if help == "wrong tree"));
        assert!(walker.runner().calls.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_copy_walk_is_idempotent() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();
        for f in ["lib/a.c", "lib/b.c", "lib/sub/c.c"] {
            touch(src.path(), f);
        }

        let xml = r#"<T>
            <ACTION name="copy">mkdir -p "$dstpath" &amp;&amp; cmp -s "$srcpath/$srcfiles" "$dstpath/$dstfiles" || cp "$srcpath/$srcfiles" "$dstpath/$dstfiles"</ACTION>
            <ACTIONORDER order="copy"/>
            <SUBDIR name="lib" recurse="yes"><UPDATE pattern=".*\.c$"/></SUBDIR>
        </T>"#;
        let registry = Registry::parse(xml).unwrap();
        let engine = RuleEngine::new(&registry, OptionSet::default());

        let stats = Walker::new(&engine, src.path(), dst.path(), ShellRunner::new())
            .run()
            .unwrap();
        assert_eq!(stats.commands, 3);

        let snapshot = |root: &Path| -> Vec<(String, String)> {
            ["lib/a.c", "lib/b.c", "lib/sub/c.c"]
                .iter()
                .map(|f| (f.to_string(), fs::read_to_string(root.join(f)).unwrap()))
                .collect()
        };
        let first = snapshot(dst.path());

        Walker::new(&engine, src.path(), dst.path(), ShellRunner::new())
            .run()
            .unwrap();
        assert_eq!(snapshot(dst.path()), first);
        assert_eq!(first, snapshot(src.path()));
    }

    #[cfg(unix)]
    #[test]
    fn test_failing_command_aborts_walk() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();
        touch(src.path(), "a/x.c");
        touch(src.path(), "b/y.c");

        let xml = r#"<T>
            <ACTION name="fail">echo "no $srcfiles"; exit 1</ACTION>
            <ACTIONORDER order="fail"/>
            <SUBDIR name="a"><UPDATE pattern="."/></SUBDIR>
            <SUBDIR name="b"><UPDATE pattern="."/></SUBDIR>
        </T>"#;
        let registry = Registry::parse(xml).unwrap();
        let engine = RuleEngine::new(&registry, OptionSet::default());

        let err = Walker::new(&engine, src.path(), dst.path(), ShellRunner::new())
            .run()
            .unwrap_err();
        match err {
            Error::CommandFailed { action, output, .. } => {
                assert_eq!(action, "fail");
                assert_eq!(output.trim(), "no x.c");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_names_are_walked_and_passed_intact() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        #[derive(Default)]
        struct Paths {
            seen: Vec<PathBuf>,
        }

        impl CommandRunner for Paths {
            fn run(&mut self, _action: &Action, env: &ActionEnv) -> Result<CommandOutput> {
                let dir = Path::new(env.get_os("srcpath").unwrap_or_default());
                self.seen.push(dir.join(env.get_os("srcfiles").unwrap_or_default()));
                Ok(CommandOutput::default())
            }
        }

        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();
        let latin1_dir = src.path().join("d").join(OsStr::from_bytes(b"caf\xe9"));
        fs::create_dir_all(&latin1_dir).unwrap();
        fs::write(latin1_dir.join("x.c"), "x").unwrap();
        fs::write(src.path().join("d").join(OsStr::from_bytes(b"f\xe9.c")), "f").unwrap();

        let xml = r#"<T>
            <ACTION name="copy">true</ACTION>
            <SUBDIR name="d" actions="copy" recurse="yes"><UPDATE pattern=".*\.c$"/></SUBDIR>
        </T>"#;
        let registry = Registry::parse(xml).unwrap();
        let engine = RuleEngine::new(&registry, OptionSet::default());
        let mut walker = Walker::new(&engine, src.path(), dst.path(), Paths::default());

        let stats = walker.run().unwrap();
        assert_eq!(stats.directories, 2);

        let seen = &walker.runner().seen;
        assert_eq!(seen.len(), 2);
        assert!(seen.contains(&latin1_dir.join("x.c")));
        assert!(seen.iter().all(|p| p.is_file()), "{seen:?}");
    }
}
