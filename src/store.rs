//! Record storage.
//!
//! [`RecordStore`] is the repository seam between task operations and the
//! place records live. [`FsStore`] is backed by a scope's `tasks/`
//! directory; [`MemoryStore`] keeps serialized files in a map and can inject
//! failures, which is how compaction crash behaviour is tested.
//!
//! Both adapters go through the record codec, so what a `MemoryStore` holds
//! is byte-for-byte what an `FsStore` would write.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::record::{self, Record, State, RECORD_EXT};

/// A decoded record and the file it came from
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRecord {
    pub path: PathBuf,
    pub record: Record,
}

impl AsRef<Record> for StoredRecord {
    fn as_ref(&self) -> &Record {
        &self.record
    }
}

impl AsRef<Record> for Record {
    fn as_ref(&self) -> &Record {
        self
    }
}

pub trait RecordStore {
    /// Directory new record files are placed in
    fn root(&self) -> &Path;

    /// Resolve an id to its file by filename prefix. First match wins.
    fn find(&self, id: u32) -> Result<PathBuf>;

    /// Every decodable record under the root. Undecodable files are skipped.
    fn list(&self) -> Result<Vec<StoredRecord>>;

    fn load(&self, path: &Path) -> Result<Record>;

    fn save(&mut self, path: &Path, record: &Record) -> Result<()>;

    fn rename(&mut self, from: &Path, to: &Path) -> Result<()>;

    fn remove(&mut self, path: &Path) -> Result<()>;
}

fn is_record_file(path: &Path) -> bool {
    path.extension().and_then(|ext| ext.to_str()) == Some(RECORD_EXT)
}

fn file_name_of(path: &Path) -> Option<&str> {
    path.file_name().and_then(|name| name.to_str())
}

// =========================================================================
// Filesystem adapter
// =========================================================================

/// Records stored as files under one directory
#[derive(Debug, Clone)]
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl RecordStore for FsStore {
    fn root(&self) -> &Path {
        &self.root
    }

    fn find(&self, id: u32) -> Result<PathBuf> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Err(Error::NotFound(id)),
            Err(err) => return Err(Error::io(&self.root, err)),
        };

        for entry in entries {
            let entry = entry.map_err(|err| Error::io(&self.root, err))?;
            let path = entry.path();
            if !is_record_file(&path) {
                continue;
            }
            if file_name_of(&path).and_then(record::id_from_file_name) == Some(id) {
                return Ok(path);
            }
        }
        Err(Error::NotFound(id))
    }

    fn list(&self) -> Result<Vec<StoredRecord>> {
        if !self.root.is_dir() {
            debug!(root = %self.root.display(), "records directory missing");
            return Ok(Vec::new());
        }

        let mut records = Vec::new();
        for entry in WalkDir::new(&self.root).sort_by_file_name() {
            let entry = entry.map_err(|err| {
                let path = err.path().unwrap_or(&self.root).to_path_buf();
                Error::io(path, io::Error::from(err))
            })?;
            if !entry.file_type().is_file() || !is_record_file(entry.path()) {
                continue;
            }
            match record::parse(entry.path()) {
                Ok(record) => records.push(StoredRecord {
                    path: entry.into_path(),
                    record,
                }),
                Err(err) => warn!(path = %entry.path().display(), error = %err, "skipping unreadable task"),
            }
        }
        Ok(records)
    }

    fn load(&self, path: &Path) -> Result<Record> {
        record::parse(path)
    }

    fn save(&mut self, path: &Path, record: &Record) -> Result<()> {
        let text = record::serialize(record)?;
        write_atomic(path, text.as_bytes())
    }

    fn rename(&mut self, from: &Path, to: &Path) -> Result<()> {
        fs::rename(from, to).map_err(|err| Error::io(from, err))
    }

    fn remove(&mut self, path: &Path) -> Result<()> {
        fs::remove_file(path).map_err(|err| Error::io(path, err))
    }
}

/// Write data atomically using temp file + rename
///
/// The temp file sits next to the target so the rename stays on one volume.
/// Its extension is not `.md`, so listings never pick it up.
pub fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|err| Error::io(parent, err))?;
    }

    let temp_path = path.with_extension(format!(
        "{}.tmp.{}",
        path.extension().and_then(|e| e.to_str()).unwrap_or(""),
        std::process::id()
    ));

    let mut temp_file = File::create(&temp_path).map_err(|err| Error::io(&temp_path, err))?;
    temp_file
        .write_all(data)
        .and_then(|_| temp_file.sync_all())
        .map_err(|err| Error::io(&temp_path, err))?;
    drop(temp_file);

    fs::rename(&temp_path, path).map_err(|err| Error::io(path, err))
}

// =========================================================================
// In-memory adapter
// =========================================================================

/// Records held as serialized text keyed by path.
///
/// Stricter than a filesystem: `rename` refuses to overwrite an existing
/// file, so a test that reuses a name fails loudly instead of clobbering.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    root: PathBuf,
    files: BTreeMap<PathBuf, String>,
    mutations: usize,
    fail_at: Option<usize>,
}

impl MemoryStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    /// Place raw file content at `root/name`
    pub fn insert_raw(&mut self, name: &str, content: impl Into<String>) -> PathBuf {
        let path = self.root.join(name);
        self.files.insert(path.clone(), content.into());
        path
    }

    /// Serialize and place a record at `root/name`
    pub fn insert(&mut self, name: &str, record: &Record) -> Result<PathBuf> {
        let text = record::serialize(record)?;
        Ok(self.insert_raw(name, text))
    }

    pub fn contents(&self, path: &Path) -> Option<&str> {
        self.files.get(path).map(String::as_str)
    }

    /// All file names directly under the root, sorted
    pub fn file_names(&self) -> Vec<String> {
        self.files
            .keys()
            .filter(|path| path.parent() == Some(self.root.as_path()))
            .filter_map(|path| file_name_of(path).map(str::to_string))
            .collect()
    }

    /// Number of save/rename/remove calls made so far
    pub fn mutations(&self) -> usize {
        self.mutations
    }

    /// Make the `n`-th mutating call from now fail (1-based)
    pub fn fail_after(&mut self, n: usize) {
        self.fail_at = Some(self.mutations + n);
    }

    fn mutate(&mut self, path: &Path) -> Result<()> {
        self.mutations += 1;
        if self.fail_at == Some(self.mutations) {
            self.fail_at = None;
            return Err(Error::io(
                path,
                io::Error::new(io::ErrorKind::Other, "injected failure"),
            ));
        }
        Ok(())
    }

    fn missing(path: &Path) -> Error {
        Error::io(path, io::Error::from(io::ErrorKind::NotFound))
    }
}

impl RecordStore for MemoryStore {
    fn root(&self) -> &Path {
        &self.root
    }

    fn find(&self, id: u32) -> Result<PathBuf> {
        self.files
            .keys()
            .filter(|path| path.parent() == Some(self.root.as_path()) && is_record_file(path))
            .find(|path| file_name_of(path).and_then(record::id_from_file_name) == Some(id))
            .cloned()
            .ok_or(Error::NotFound(id))
    }

    fn list(&self) -> Result<Vec<StoredRecord>> {
        let mut records = Vec::new();
        for (path, text) in &self.files {
            if !path.starts_with(&self.root) || !is_record_file(path) {
                continue;
            }
            match record::parse_str(text) {
                Ok(record) => records.push(StoredRecord {
                    path: path.clone(),
                    record,
                }),
                Err(err) => warn!(path = %path.display(), error = %err, "skipping unreadable task"),
            }
        }
        Ok(records)
    }

    fn load(&self, path: &Path) -> Result<Record> {
        let text = self.files.get(path).ok_or_else(|| Self::missing(path))?;
        record::parse_str(text).map_err(|source| Error::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    fn save(&mut self, path: &Path, record: &Record) -> Result<()> {
        self.mutate(path)?;
        let text = record::serialize(record)?;
        self.files.insert(path.to_path_buf(), text);
        Ok(())
    }

    fn rename(&mut self, from: &Path, to: &Path) -> Result<()> {
        self.mutate(from)?;
        if self.files.contains_key(to) {
            return Err(Error::io(
                to,
                io::Error::from(io::ErrorKind::AlreadyExists),
            ));
        }
        let text = self.files.remove(from).ok_or_else(|| Self::missing(from))?;
        self.files.insert(to.to_path_buf(), text);
        Ok(())
    }

    fn remove(&mut self, path: &Path) -> Result<()> {
        self.mutate(path)?;
        self.files
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| Self::missing(path))
    }
}

// =========================================================================
// Filtering and ordering
// =========================================================================

/// Listing filter. Empty fields match everything.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    pub state: Option<State>,
    /// 0 means no priority filter
    pub priority: i64,
    /// Match records carrying any of these tags
    pub tags: Vec<String>,
}

impl Filter {
    pub fn matches(&self, record: &Record) -> bool {
        if self.state.is_some_and(|state| state != record.state) {
            return false;
        }
        if self.priority != 0 && self.priority != record.priority {
            return false;
        }
        if !self.tags.is_empty() && !self.tags.iter().any(|tag| record.tags.contains(tag)) {
            return false;
        }
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    State,
    Id,
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "state" => Ok(SortOrder::State),
            "id" => Ok(SortOrder::Id),
            other => Err(format!("unknown order '{other}' (expected state|id)")),
        }
    }
}

/// Map a configured order label to a state, accepting common aliases
pub fn normalize_order_label(label: &str) -> Option<State> {
    match label.trim().to_ascii_uppercase().as_str() {
        "TODO" => Some(State::Todo),
        "BEGUN" | "DOING" | "INPROGRESS" | "IN-PROGRESS" => Some(State::Begun),
        "BLOCK" | "BLOCKED" => Some(State::Block),
        "CONFIRM" | "FOLLOWUP" | "FOLLOW-UP" | "CHASE" => Some(State::Confirm),
        "DONE" => Some(State::Done),
        "NOTDO" | "DEFER" | "DEFERRED" => Some(State::NotDo),
        _ => None,
    }
}

/// Rank every state. Configured labels come first in their given order, a
/// repeated label keeping its last position. Unrecognized labels are ignored
/// and states left out follow in canonical order.
pub fn state_order_index(labels: &[String]) -> HashMap<State, usize> {
    let mut index = HashMap::with_capacity(State::ALL.len());
    for (rank, label) in labels.iter().enumerate() {
        if let Some(state) = normalize_order_label(label) {
            index.insert(state, rank);
        }
    }
    let mut next = labels.len();
    for state in State::ALL {
        index.entry(state).or_insert_with(|| {
            next += 1;
            next - 1
        });
    }
    index
}

/// Sort by id, or by configured state order with id as tie-break
pub fn sort_records<T: AsRef<Record>>(
    records: &mut [T],
    order: SortOrder,
    reverse: bool,
    state_order: &[String],
) {
    let index = state_order_index(state_order);
    let rank = |record: &Record| index.get(&record.state).copied().unwrap_or(usize::MAX);

    records.sort_by(|left, right| {
        let (left, right) = (left.as_ref(), right.as_ref());
        let ordering = match order {
            SortOrder::Id => left.id.cmp(&right.id),
            SortOrder::State => rank(left)
                .cmp(&rank(right))
                .then_with(|| left.id.cmp(&right.id)),
        };
        if reverse {
            ordering.reverse()
        } else {
            ordering
        }
    });
}

/// Ascending by id, then path. The order compaction numbers records in.
pub fn compare_id_then_path(left: &StoredRecord, right: &StoredRecord) -> Ordering {
    left.record
        .id
        .cmp(&right.record.id)
        .then_with(|| left.path.cmp(&right.path))
}
