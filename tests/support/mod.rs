#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use punchlist::scope::{Scope, ROOT_ENV};
use tempfile::TempDir;

pub struct TestScope {
    dir: TempDir,
}

impl TestScope {
    /// A temp directory with an initialized scope
    pub fn init() -> Self {
        let scope = Self::empty();
        Scope::init(scope.path()).expect("init scope");
        scope
    }

    /// A temp directory with nothing in it
    pub fn empty() -> Self {
        let dir = tempfile::tempdir().expect("failed to create tempdir");
        Self { dir }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn scope(&self) -> Scope {
        Scope::at(self.path())
    }

    pub fn tasks_dir(&self) -> PathBuf {
        self.path().join("tasks")
    }

    pub fn write_task(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.tasks_dir().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create tasks dir");
        }
        fs::write(&path, contents).expect("write task");
        path
    }

    pub fn read_task(&self, name: &str) -> String {
        fs::read_to_string(self.tasks_dir().join(name)).expect("read task")
    }

    /// File names directly under `tasks/`, sorted
    pub fn task_names(&self) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(self.tasks_dir())
            .expect("read tasks dir")
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_file())
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }
}

/// Minimal task file with the given header fields
pub fn task_text(id: u32, title: &str, state: &str) -> String {
    format!(
        "---\nid: {id}\ntitle: {title}\nstate: {state}\ncreated_at: 2025-01-01T09:00:00+00:00\nupdated_at: 2025-01-01T09:00:00+00:00\n---\n\n# {title}\n"
    )
}

pub fn pin_cmd() -> Command {
    let mut cmd = Command::cargo_bin("pin").expect("binary");
    cmd.env_remove(ROOT_ENV);
    cmd.env_remove("RUST_LOG");
    cmd
}

/// `pin` running inside `scope`
pub fn pin_in(scope: &TestScope) -> Command {
    let mut cmd = pin_cmd();
    cmd.current_dir(scope.path());
    cmd
}
