// ENA Webin-CLI Launcher
// Copyright (c) 2024-2025 The Mapleseed Inc.
// Licensed under GPL-3.0 License

//! # Launcher - Webin-CLI jar discovery and invocation
//!
//! This module routes the launcher's command line into JVM options and
//! Webin-CLI arguments, locates the single `webin-cli-*.jar` to run and
//! starts it on the Java runtime:
//! - `-D*` and `-XX*` tokens become property options
//! - `-Xm*` tokens become memory options
//! - `--exec_dir=<path>` selects (and if needed populates) the jar directory
//! - everything else is forwarded to Webin-CLI in its original order
//!
//! When no memory option is given and `_JAVA_OPTIONS` is unset, the default
//! heap bounds from [`DEFAULT_JVM_MEM_OPTS`] are injected. An empty
//! `_JAVA_OPTIONS` still counts as set.

use std::{
    env,
    ffi::{OsStr, OsString},
    fs,
    io,
    path::{Path, PathBuf},
    process::{Command, ExitStatus},
};

use glob::{glob, GlobError, Pattern};
use log::{debug, info, trace, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Heap bounds used when neither the caller nor the environment supplies any
pub const DEFAULT_JVM_MEM_OPTS: [&str; 2] = ["-Xms2g", "-Xmx4g"];

/// Prefix of the execution directory override token
pub const EXEC_DIR_PREFIX: &str = "--exec_dir=";

/// Launcher configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LauncherConfig {
    /// File name prefix of the archive to run
    pub archive_prefix: String,
    /// File name suffix of the archive to run
    pub archive_suffix: String,
    /// Runtime executable, looked up under `<runtime home>/bin/` or on PATH
    pub runtime_name: String,
    /// Variable naming the runtime home directory
    pub runtime_home_var: String,
    /// Variable whose presence suppresses the default memory options
    pub runtime_options_var: String,
    /// Memory options injected when none are supplied
    pub default_mem_opts: Vec<String>,
    /// Runtime flag preceding the archive path
    pub archive_flag: String,
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            archive_prefix: "webin-cli-".to_string(),
            archive_suffix: ".jar".to_string(),
            runtime_name: "java".to_string(),
            runtime_home_var: "JAVA_HOME".to_string(),
            runtime_options_var: "_JAVA_OPTIONS".to_string(),
            default_mem_opts: DEFAULT_JVM_MEM_OPTS.iter().map(|opt| opt.to_string()).collect(),
            archive_flag: "-jar".to_string(),
        }
    }
}

impl LauncherConfig {
    /// Load a JSON configuration file. Missing fields keep their defaults.
    pub fn load(path: &Path) -> LauncherResult<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| LauncherError::Config(format!("{}: {}", path.display(), e)))?;

        serde_json::from_str(&content)
            .map_err(|e| LauncherError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Glob pattern matching the archive file name
    pub fn archive_pattern(&self) -> String {
        format!(
            "{}*{}",
            Pattern::escape(&self.archive_prefix),
            Pattern::escape(&self.archive_suffix)
        )
    }
}

/// Error types for launcher operations
#[derive(Error, Debug)]
pub enum LauncherError {
    #[error("IO error: {0}")]
    IOError(#[from] io::Error),

    #[error("Could not find the jar file in {}", .dir.display())]
    ArchiveNotFound { dir: PathBuf },

    #[error("Too many jar files found in {} - {}", .dir.display(), display_paths(.matches))]
    ArchiveAmbiguous { dir: PathBuf, matches: Vec<PathBuf> },

    #[error("Failed to copy {} to {}: {source}", .from.display(), .to.display())]
    ExecDirCopy {
        from: PathBuf,
        to: PathBuf,
        source: io::Error,
    },

    #[error("Failed to launch {}: {source}", .program.display())]
    Launch { program: PathBuf, source: io::Error },

    #[error("Invalid archive pattern: {0}")]
    Pattern(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type LauncherResult<T> = Result<T, LauncherError>;

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|path| path.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Bucket a command-line token is routed to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    MemoryOption,
    PropertyOption,
    ExecDirOverride,
    PassThrough,
}

impl TokenKind {
    /// Classify a token by prefix. The first matching rule wins.
    ///
    /// Prefixes are ASCII, so a lossy view of a non UTF-8 token classifies
    /// the same as its raw bytes.
    pub fn of(token: impl AsRef<OsStr>) -> Self {
        let token = token.as_ref().to_string_lossy();

        if token.starts_with("-D") || token.starts_with("-XX") {
            TokenKind::PropertyOption
        } else if token.starts_with("-Xm") {
            TokenKind::MemoryOption
        } else if token.starts_with(EXEC_DIR_PREFIX) {
            TokenKind::ExecDirOverride
        } else {
            TokenKind::PassThrough
        }
    }
}

/// Remove one layer of matching `"` or `'` quotes around a value
pub fn strip_matched_quotes(value: &[u8]) -> &[u8] {
    match value {
        [first, inner @ .., last] if first == last && matches!(first, b'"' | b'\'') => inner,
        _ => value,
    }
}

/// Path named by an `--exec_dir=` token, with surrounding quotes removed
#[cfg(unix)]
fn exec_dir_value(token: &OsStr) -> PathBuf {
    use std::os::unix::ffi::OsStrExt;

    let value = &token.as_bytes()[EXEC_DIR_PREFIX.len()..];
    PathBuf::from(OsStr::from_bytes(strip_matched_quotes(value)))
}

#[cfg(not(unix))]
fn exec_dir_value(token: &OsStr) -> PathBuf {
    let token = token.to_string_lossy();
    let value = strip_matched_quotes(token[EXEC_DIR_PREFIX.len()..].as_bytes());
    PathBuf::from(String::from_utf8_lossy(value).into_owned())
}

/// Command-line tokens split into their buckets, each in original order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassifiedArguments {
    memory_options: Vec<OsString>,
    property_options: Vec<OsString>,
    pass_through: Vec<OsString>,
    exec_dirs: Vec<PathBuf>,
}

impl ClassifiedArguments {
    /// Route tokens (without the program name) into buckets.
    ///
    /// This does not touch the filesystem; execution directories are only
    /// recorded here and populated by [`Launcher::route`].
    pub fn classify<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        let mut classified = Self::default();

        for token in tokens {
            let token = token.into();
            match TokenKind::of(&token) {
                TokenKind::MemoryOption => classified.memory_options.push(token),
                TokenKind::PropertyOption => classified.property_options.push(token),
                TokenKind::ExecDirOverride => {
                    let value = exec_dir_value(&token);
                    trace!("Execution directory override: {}", value.display());
                    classified.exec_dirs.push(value);
                }
                TokenKind::PassThrough => classified.pass_through.push(token),
            }
        }

        classified
    }

    /// Inject `defaults` when no memory option was given and the runtime
    /// options variable is unset. Returns whether the defaults were applied.
    pub fn apply_default_memory_options(&mut self, defaults: &[String], env: &LaunchEnv) -> bool {
        if self.memory_options.is_empty() && !env.runtime_options_set() {
            self.memory_options = defaults.iter().map(OsString::from).collect();
            true
        } else {
            false
        }
    }

    pub fn memory_options(&self) -> &[OsString] {
        &self.memory_options
    }

    pub fn property_options(&self) -> &[OsString] {
        &self.property_options
    }

    pub fn pass_through(&self) -> &[OsString] {
        &self.pass_through
    }

    /// Every `--exec_dir=` value, in order
    pub fn exec_dirs(&self) -> &[PathBuf] {
        &self.exec_dirs
    }

    /// The effective execution directory override (last one given)
    pub fn exec_dir(&self) -> Option<&Path> {
        self.exec_dirs.last().map(PathBuf::as_path)
    }
}

/// Snapshot of the environment variables the launcher consults.
///
/// `None` means unset; `Some("")` means set to the empty string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LaunchEnv {
    pub runtime_home: Option<OsString>,
    pub runtime_options: Option<OsString>,
}

impl LaunchEnv {
    /// Read the variables named by `config` from the process environment
    pub fn from_process(config: &LauncherConfig) -> Self {
        Self {
            runtime_home: env::var_os(&config.runtime_home_var),
            runtime_options: env::var_os(&config.runtime_options_var),
        }
    }

    pub fn runtime_options_set(&self) -> bool {
        self.runtime_options.is_some()
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    fs::metadata(path)
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

/// Determine the runtime executable.
///
/// Uses `<runtime home>/bin/<runtime>` when it is executable, otherwise the
/// bare runtime name for a PATH lookup.
pub fn resolve_runtime(env: &LaunchEnv, config: &LauncherConfig) -> PathBuf {
    if let Some(home) = env.runtime_home.as_deref().filter(|home| !home.is_empty()) {
        let candidate = Path::new(home).join("bin").join(&config.runtime_name);
        if is_executable(&candidate) {
            debug!("Using runtime from {}: {}", config.runtime_home_var, candidate.display());
            return candidate;
        }
        warn!(
            "{} is set but {} is not executable, falling back to PATH",
            config.runtime_home_var,
            candidate.display()
        );
    }

    PathBuf::from(&config.runtime_name)
}

/// Locate the single archive matching the configured pattern in `dir`
pub fn find_archive(dir: &Path, config: &LauncherConfig) -> LauncherResult<PathBuf> {
    let pattern = Path::new(&Pattern::escape(&dir.to_string_lossy())).join(config.archive_pattern());
    debug!("Searching for archive: {}", pattern.display());

    let entries = glob(&pattern.to_string_lossy())
        .map_err(|e| LauncherError::Pattern(e.to_string()))?;

    let mut matches = Vec::new();
    for entry in entries {
        let path = entry.map_err(GlobError::into_error)?;
        if path.is_file() {
            matches.push(path);
        }
    }
    matches.sort();

    if matches.len() > 1 {
        return Err(LauncherError::ArchiveAmbiguous {
            dir: dir.to_path_buf(),
            matches,
        });
    }

    match matches.pop() {
        Some(archive) => Ok(fs::canonicalize(archive)?),
        None => Err(LauncherError::ArchiveNotFound {
            dir: dir.to_path_buf(),
        }),
    }
}

/// Symlink-resolved directory holding the running launcher
pub fn launcher_dir() -> LauncherResult<PathBuf> {
    let exe = fs::canonicalize(env::current_exe()?)?;

    exe.parent().map(Path::to_path_buf).ok_or_else(|| {
        LauncherError::IOError(io::Error::new(
            io::ErrorKind::NotFound,
            format!("{} has no parent directory", exe.display()),
        ))
    })
}

/// Recursively copy `src` to `dst`, copying symlink targets as real files.
///
/// A `dst` nested anywhere inside `src` is skipped during the walk, and a
/// directory symlink pointing back at one of its ancestors is an error.
pub fn copy_dir_resolved(src: &Path, dst: &Path) -> io::Result<()> {
    fs::metadata(src)?;
    fs::create_dir_all(dst)?;
    let dst_root = fs::canonicalize(dst)?;
    copy_tree(src, dst, &dst_root, &mut Vec::new())
}

fn copy_tree(src: &Path, dst: &Path, dst_root: &Path, ancestors: &mut Vec<PathBuf>) -> io::Result<()> {
    let real = fs::canonicalize(src)?;
    if ancestors.contains(&real) {
        return Err(io::Error::new(
            io::ErrorKind::Other,
            format!("symlink loop at {}", src.display()),
        ));
    }
    ancestors.push(real);
    fs::create_dir_all(dst)?;

    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let from = entry.path();
        let to = dst.join(entry.file_name());

        if fs::metadata(&from)?.is_dir() {
            if fs::canonicalize(&from)? == dst_root {
                debug!("Skipping copy destination {}", from.display());
                continue;
            }
            copy_tree(&from, &to, dst_root, ancestors)?;
        } else {
            trace!("Copying {} to {}", from.display(), to.display());
            fs::copy(&from, &to)?;
        }
    }

    ancestors.pop();
    Ok(())
}

/// Populate `target` from `source` unless something already exists there.
///
/// Existence check and copy are not atomic.
pub fn ensure_exec_dir(target: &Path, source: &Path) -> LauncherResult<()> {
    if target.exists() {
        debug!("Execution directory {} already exists", target.display());
        return Ok(());
    }

    info!("Copying {} to execution directory {}", source.display(), target.display());
    copy_dir_resolved(source, target).map_err(|e| LauncherError::ExecDirCopy {
        from: source.to_path_buf(),
        to: target.to_path_buf(),
        source: e,
    })
}

/// Map a child exit status onto the launcher's own exit code
fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;

        if let Some(signal) = status.signal() {
            warn!("Runtime terminated by signal {}", signal);
            return 128 + signal;
        }
    }

    1
}

/// Fully resolved runtime invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchPlan {
    program: PathBuf,
    args: Vec<OsString>,
}

impl LaunchPlan {
    /// `program` + memory options + property options + `flag archive` + pass-through
    pub fn assemble(
        program: PathBuf,
        arguments: &ClassifiedArguments,
        archive_flag: &str,
        archive: &Path,
    ) -> Self {
        let mut args: Vec<OsString> = Vec::new();
        args.extend(arguments.memory_options().iter().cloned());
        args.extend(arguments.property_options().iter().cloned());
        args.push(OsString::from(archive_flag));
        args.push(archive.as_os_str().to_os_string());
        args.extend(arguments.pass_through().iter().cloned());

        Self { program, args }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn args(&self) -> &[OsString] {
        &self.args
    }

    /// Program and arguments as display strings
    pub fn command_line(&self) -> Vec<String> {
        std::iter::once(self.program.to_string_lossy().into_owned())
            .chain(self.args.iter().map(|arg| arg.to_string_lossy().into_owned()))
            .collect()
    }

    /// Run the plan to completion and return the child's exit code
    pub fn execute(&self) -> LauncherResult<i32> {
        info!("Executing: {}", self.command_line().join(" "));

        let status = Command::new(&self.program)
            .args(&self.args)
            .status()
            .map_err(|e| LauncherError::Launch {
                program: self.program.clone(),
                source: e,
            })?;

        let code = exit_code(status);
        debug!("Runtime exited with code {}", code);
        Ok(code)
    }
}

/// Routes arguments and launches the archive found next to the launcher
#[derive(Debug, Clone)]
pub struct Launcher {
    config: LauncherConfig,
    env: LaunchEnv,
    home_dir: PathBuf,
}

impl Launcher {
    /// Create a launcher whose own directory is `home_dir`
    pub fn new(config: LauncherConfig, env: LaunchEnv, home_dir: impl Into<PathBuf>) -> Self {
        Self {
            config,
            env,
            home_dir: home_dir.into(),
        }
    }

    /// Create a launcher from the process environment and executable location
    pub fn from_process(config: LauncherConfig) -> LauncherResult<Self> {
        let env = LaunchEnv::from_process(&config);
        let home_dir = launcher_dir()?;
        Ok(Self::new(config, env, home_dir))
    }

    pub fn config(&self) -> &LauncherConfig {
        &self.config
    }

    pub fn home_dir(&self) -> &Path {
        &self.home_dir
    }

    /// Classify tokens, populate execution directories and apply the default
    /// memory options
    pub fn route<I, S>(&self, tokens: I) -> LauncherResult<ClassifiedArguments>
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        let mut arguments = ClassifiedArguments::classify(tokens);

        for exec_dir in arguments.exec_dirs() {
            ensure_exec_dir(exec_dir, &self.home_dir)?;
        }

        if arguments.apply_default_memory_options(&self.config.default_mem_opts, &self.env) {
            debug!("Applied default memory options: {:?}", self.config.default_mem_opts);
        }

        Ok(arguments)
    }

    /// Build the runtime invocation without running it
    pub fn plan<I, S>(&self, tokens: I) -> LauncherResult<LaunchPlan>
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        let runtime = resolve_runtime(&self.env, &self.config);
        let arguments = self.route(tokens)?;

        let search_dir = arguments.exec_dir().unwrap_or(&self.home_dir);
        let archive = find_archive(search_dir, &self.config)?;
        info!("Found archive: {}", archive.display());

        Ok(LaunchPlan::assemble(
            runtime,
            &arguments,
            &self.config.archive_flag,
            &archive,
        ))
    }

    /// Plan and execute, returning the child's exit code
    pub fn launch<I, S>(&self, tokens: I) -> LauncherResult<i32>
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.plan(tokens)?.execute()
    }
}
