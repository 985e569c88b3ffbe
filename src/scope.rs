//! Scope layout and discovery.
//!
//! A scope is a directory holding one task list:
//!
//! ```text
//! <root>/
//!   .punchlist/          # marker directory
//!     config.toml        # ScopeConfig
//!   tasks/               # one <id>-<slug>.md per task
//!   .trash/              # deleted tasks
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::debug;

use crate::config::ScopeConfig;
use crate::error::{Error, Result};
use crate::store::FsStore;

/// Name of the marker directory
pub const MARKER_DIR: &str = ".punchlist";

pub const CONFIG_FILE: &str = "config.toml";

pub const TASKS_DIR: &str = "tasks";

pub const TRASH_DIR: &str = ".trash";

/// Environment variable that pins the scope root
pub const ROOT_ENV: &str = "PUNCHLIST_ROOT";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scope {
    root: PathBuf,
}

/// What `init` found and did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitReport {
    pub scope: Scope,
    pub already_initialized: bool,
    /// `tasks/` existed before init and was left untouched
    pub tasks_dir_existed: bool,
}

impl Scope {
    /// Scope rooted at `root`, without checking it exists
    pub fn at(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Walk up from `start` to the nearest directory holding `.punchlist/`
    pub fn discover(start: &Path) -> Result<Self> {
        for dir in start.ancestors() {
            if dir.join(MARKER_DIR).is_dir() {
                debug!(root = %dir.display(), "found scope");
                return Ok(Self::at(dir));
            }
        }
        Err(Error::ScopeNotFound(start.to_path_buf()))
    }

    /// Use `explicit` when given (it must be initialized), otherwise discover
    /// from the current directory.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(root) => {
                let scope = Self::at(absolute(root)?);
                if !scope.is_initialized() {
                    return Err(Error::ScopeNotFound(scope.root));
                }
                Ok(scope)
            }
            None => {
                let cwd = std::env::current_dir().map_err(|err| Error::io(".", err))?;
                Self::discover(&cwd)
            }
        }
    }

    /// Create the scope layout under `root`. Existing state is never
    /// overwritten.
    pub fn init(root: &Path) -> Result<InitReport> {
        let scope = Self::at(absolute(root)?);
        if scope.marker_dir().exists() {
            return Ok(InitReport {
                scope,
                already_initialized: true,
                tasks_dir_existed: true,
            });
        }

        let tasks_dir = scope.tasks_dir();
        let tasks_dir_existed = tasks_dir.exists();
        if tasks_dir_existed && !tasks_dir.is_dir() {
            return Err(Error::InvalidArgument(format!(
                "{} exists and is not a directory",
                tasks_dir.display()
            )));
        }

        let marker = scope.marker_dir();
        fs::create_dir_all(&marker).map_err(|err| Error::io(&marker, err))?;
        fs::create_dir_all(&tasks_dir).map_err(|err| Error::io(&tasks_dir, err))?;
        scope.save_config(&ScopeConfig::default())?;

        debug!(root = %scope.root.display(), "initialized scope");
        Ok(InitReport {
            scope,
            already_initialized: false,
            tasks_dir_existed,
        })
    }

    // =========================================================================
    // Path accessors
    // =========================================================================

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn marker_dir(&self) -> PathBuf {
        self.root.join(MARKER_DIR)
    }

    pub fn config_file(&self) -> PathBuf {
        self.marker_dir().join(CONFIG_FILE)
    }

    pub fn tasks_dir(&self) -> PathBuf {
        self.root.join(TASKS_DIR)
    }

    pub fn trash_dir(&self) -> PathBuf {
        self.root.join(TRASH_DIR)
    }

    pub fn is_initialized(&self) -> bool {
        self.marker_dir().is_dir()
    }

    // =========================================================================
    // State
    // =========================================================================

    pub fn load_config(&self) -> Result<ScopeConfig> {
        ScopeConfig::load_or_default(&self.config_file())
    }

    pub fn save_config(&self, config: &ScopeConfig) -> Result<()> {
        config.save(&self.config_file())
    }

    pub fn store(&self) -> FsStore {
        FsStore::new(self.tasks_dir())
    }

    /// Move a task file into `.trash/`. A name already taken there gets a
    /// unix timestamp suffix.
    pub fn trash(&self, path: &Path) -> Result<PathBuf> {
        let trash = self.trash_dir();
        fs::create_dir_all(&trash).map_err(|err| Error::io(&trash, err))?;

        let name = path
            .file_name()
            .ok_or_else(|| Error::InvalidArgument(format!("not a file: {}", path.display())))?;
        let mut dest = trash.join(name);
        if dest.exists() {
            dest = unique_trash_path(&dest);
        }

        fs::rename(path, &dest).map_err(|err| Error::io(path, err))?;
        debug!(from = %path.display(), to = %dest.display(), "trashed task");
        Ok(dest)
    }
}

fn unique_trash_path(dest: &Path) -> PathBuf {
    let stamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or_default();
    let stem = dest
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match dest.extension() {
        Some(ext) => format!("{stem}-{stamp}.{}", ext.to_string_lossy()),
        None => format!("{stem}-{stamp}"),
    };
    dest.with_file_name(name)
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir().map_err(|err| Error::io(path, err))?;
    Ok(cwd.join(path))
}
