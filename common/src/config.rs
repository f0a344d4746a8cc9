use std::{
    env,
    ffi::OsString,
    fmt,
    path::{Path, PathBuf},
};

use crate::error::{BinderError, Result};

/// Socket whose duplicate is handed to the consumer
pub const DATA_SOCKET_NAME: &str = "data";
/// Single-use socket the consumer connects to in order to receive `data`
pub const PASS_SOCKET_NAME: &str = "pass";
/// Last line of the announcement
pub const DONE_TOKEN: &str = "done";
/// Pending connection queue length for both listeners
pub const LISTEN_BACKLOG: i32 = 10;
/// Suffix that `mkdtemp` replaces with random characters
pub const DIR_TEMPLATE_SUFFIX: &str = "XXXXXX";

/// Preferred base for the private directory
pub const RUNTIME_DIR_ENV: &str = "XDG_RUNTIME_DIR";
/// Fallback base when no runtime directory is set
pub const TEMP_DIR_ENV: &str = "TMPDIR";
/// Base used when neither variable is set
pub const DEFAULT_BASE_DIR: &str = "/tmp";

/// Where the base directory came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaseDirSource {
    /// `XDG_RUNTIME_DIR`
    RuntimeDir,
    /// `TMPDIR`
    TempDir,
    /// Built-in `/tmp`
    Default,
}

impl fmt::Display for BaseDirSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BaseDirSource::RuntimeDir => f.write_str(RUNTIME_DIR_ENV),
            BaseDirSource::TempDir => f.write_str(TEMP_DIR_ENV),
            BaseDirSource::Default => f.write_str("default"),
        }
    }
}

/// Resolved configuration for one helper run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinderConfig {
    /// Absolute directory the private directory is created in
    pub base_dir:    PathBuf,
    /// Which setting provided `base_dir`
    pub base_source: BaseDirSource,
}

impl BinderConfig {
    /// Resolves the base directory from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var_os(key))
    }

    /// Resolves the base directory using `lookup` in place of the environment.
    ///
    /// Precedence is `XDG_RUNTIME_DIR`, then `TMPDIR`, then `/tmp`. A variable
    /// that is set but empty counts as unset. A relative base is joined onto
    /// the current directory so every announced path is absolute.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<OsString>,
    {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.is_empty());

        let (base, base_source) = if let Some(dir) = non_empty(RUNTIME_DIR_ENV) {
            (PathBuf::from(dir), BaseDirSource::RuntimeDir)
        } else if let Some(dir) = non_empty(TEMP_DIR_ENV) {
            (PathBuf::from(dir), BaseDirSource::TempDir)
        } else {
            (PathBuf::from(DEFAULT_BASE_DIR), BaseDirSource::Default)
        };

        let base_dir = if base.is_absolute() {
            base
        } else {
            tracing::debug!("Base directory {:?} is relative, anchoring it", base);
            env::current_dir()
                .map_err(BinderError::ResolveBase)?
                .join(base)
        };

        Ok(Self {
            base_dir,
            base_source,
        })
    }

    /// Uses `base_dir` directly, bypassing the environment.
    pub fn with_base_dir<P: AsRef<Path>>(base_dir: P) -> Result<Self> {
        let base = base_dir.as_ref().as_os_str().to_owned();
        Self::from_lookup(|key| (key == RUNTIME_DIR_ENV).then(|| base.clone()))
    }

    /// The `mkdtemp` template for the private directory.
    pub fn dir_template(&self) -> PathBuf {
        self.base_dir.join(DIR_TEMPLATE_SUFFIX)
    }
}
