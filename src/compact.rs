//! Id compaction.
//!
//! Renumbers every record in a store to `1..=N` in (old id, path) order.
//! The run is two explicit phases over an in-memory ledger:
//!
//! 1. **stage**: every file is renamed to `.compact-<nanos>-<name>` in its own
//!    directory, freeing all final names before any is reused.
//! 2. **commit**: each staged file either goes back to its name (id kept) or
//!    is rewritten with its new id, a log line, and a new filename.
//!
//! A run that fails part way leaves committed entries committed and the rest
//! staged. Staged files are still `*.md` records, so running compaction again
//! picks them up and finishes the job. Staging is not rolled back.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, info, warn};

use crate::clock::Timestamp;
use crate::config::ScopeConfig;
use crate::error::Result;
use crate::record::{self, Record, STAGED_PREFIX};
use crate::section;
use crate::store::{self, RecordStore};

/// One record's journey through a compaction run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    /// Where the record was found
    pub original: PathBuf,
    /// Staging name, next to `original`
    pub temp: PathBuf,
    /// Final name
    pub target: PathBuf,
    pub old_id: u32,
    pub new_id: u32,
    pub staged: bool,
    pub committed: bool,
}

impl LedgerEntry {
    pub fn changes_id(&self) -> bool {
        self.old_id != self.new_id
    }

    /// Left over from an interrupted run
    fn was_staged(&self) -> bool {
        self.original != self.target && !self.changes_id()
    }
}

#[derive(Debug)]
struct Pending {
    entry: LedgerEntry,
    record: Record,
}

/// Result of [`compact`]
#[derive(Debug, Clone, PartialEq)]
pub enum CompactOutcome {
    /// Ids were already contiguous; nothing was written
    NothingToCompact,
    Compacted {
        ledger: Vec<LedgerEntry>,
        /// Config to persist: `next_id = N + 1` and the width used
        config: ScopeConfig,
    },
}

/// A compaction run ready to stage
#[derive(Debug)]
pub struct CompactPlan {
    pending: Vec<Pending>,
    id_width: usize,
}

/// Load every record and assign new ids.
pub fn plan<S: RecordStore + ?Sized>(store: &S, id_width: usize) -> Result<CompactPlan> {
    let mut records = store.list()?;
    records.sort_by(store::compare_id_then_path);

    let stamp = staging_stamp();
    let root = store.root().to_path_buf();
    let mut pending = Vec::with_capacity(records.len());

    for (rank, stored) in records.into_iter().enumerate() {
        let new_id = u32::try_from(rank + 1).unwrap_or(u32::MAX);
        let old_id = stored.record.id;
        let name = stored
            .path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_default();
        let base = record::strip_staged_prefix(name).to_string();
        let dir = stored.path.parent().unwrap_or(&root).to_path_buf();

        let target = if old_id == new_id {
            dir.join(&base)
        } else {
            let slug = record::slug_from_file_name(&base)
                .map(str::to_string)
                .unwrap_or_else(|| record::slugify(&stored.record.title));
            root.join(record::file_name(new_id, id_width, &slug))
        };

        pending.push(Pending {
            entry: LedgerEntry {
                temp: dir.join(format!("{STAGED_PREFIX}{stamp}-{base}")),
                original: stored.path,
                target,
                old_id,
                new_id,
                staged: false,
                committed: false,
            },
            record: stored.record,
        });
    }

    Ok(CompactPlan { pending, id_width })
}

fn staging_stamp() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_nanos())
        .unwrap_or_default()
}

impl CompactPlan {
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// True when some id changes or a previous run left files staged
    pub fn has_work(&self) -> bool {
        self.pending
            .iter()
            .any(|p| p.entry.changes_id() || p.entry.was_staged())
    }

    pub fn ledger(&self) -> impl Iterator<Item = &LedgerEntry> {
        self.pending.iter().map(|p| &p.entry)
    }

    pub fn into_ledger(self) -> Vec<LedgerEntry> {
        self.pending.into_iter().map(|p| p.entry).collect()
    }

    /// Rename every file to its staging name. Stops at the first failure.
    pub fn stage<S: RecordStore + ?Sized>(&mut self, store: &mut S) -> Result<()> {
        for pending in &mut self.pending {
            let entry = &mut pending.entry;
            if let Err(err) = store.rename(&entry.original, &entry.temp) {
                warn!(path = %entry.original.display(), error = %err, "failed to stage task");
                return Err(err);
            }
            entry.staged = true;
            debug!(from = %entry.original.display(), to = %entry.temp.display(), "staged");
        }
        Ok(())
    }

    /// Move every staged file to its final name. Stops at the first failure.
    pub fn commit<S: RecordStore + ?Sized>(&mut self, store: &mut S, now: Timestamp) -> Result<()> {
        for pending in &mut self.pending {
            if pending.entry.committed {
                continue;
            }
            if let Err(err) = commit_one(store, pending, now) {
                warn!(
                    path = %pending.entry.temp.display(),
                    old_id = pending.entry.old_id,
                    new_id = pending.entry.new_id,
                    error = %err,
                    "failed to commit task"
                );
                return Err(err);
            }
            pending.entry.committed = true;
        }
        Ok(())
    }

    /// Config after a completed run
    pub fn next_config(&self, config: &ScopeConfig) -> ScopeConfig {
        let count = u32::try_from(self.pending.len()).unwrap_or(u32::MAX - 1);
        ScopeConfig {
            next_id: count + 1,
            id_width: self.id_width,
            ..config.clone()
        }
    }
}

fn commit_one<S: RecordStore + ?Sized>(store: &mut S, pending: &mut Pending, now: Timestamp) -> Result<()> {
    let entry = &pending.entry;
    if !entry.changes_id() {
        return store.rename(&entry.temp, &entry.target);
    }

    let mut record = pending.record.clone();
    record.id = entry.new_id;
    record.touch(now);
    record.body = section::append_log(
        &record.body,
        &format!("compacted id from {} to {}", entry.old_id, entry.new_id),
        now,
    );

    // rewrite in place first so the staged file is never lost
    store.save(&entry.temp, &record)?;
    store.rename(&entry.temp, &entry.target)?;
    debug!(
        path = %entry.target.display(),
        old_id = entry.old_id,
        new_id = entry.new_id,
        "renumbered"
    );
    pending.record = record;
    Ok(())
}

/// Renumber all records in `store` and report the config to persist.
pub fn compact<S: RecordStore + ?Sized>(
    store: &mut S,
    config: &ScopeConfig,
    now: Timestamp,
) -> Result<CompactOutcome> {
    let mut plan = plan(store, config.id_width)?;
    if !plan.has_work() {
        debug!(count = plan.len(), "ids already contiguous");
        return Ok(CompactOutcome::NothingToCompact);
    }

    plan.stage(store)?;
    plan.commit(store, now)?;

    let config = plan.next_config(config);
    let ledger = plan.into_ledger();
    info!(
        total = ledger.len(),
        renumbered = ledger.iter().filter(|e| e.changes_id()).count(),
        "compacted task ids"
    );
    Ok(CompactOutcome::Compacted { ledger, config })
}

/// Whether a file name is a compaction staging name
pub fn is_staged(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| record::strip_staged_prefix(name) != name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock;
    use crate::record::State;
    use crate::store::MemoryStore;

    fn ts(raw: &str) -> Timestamp {
        clock::parse(raw).expect("timestamp")
    }

    fn task(id: u32, title: &str) -> Record {
        let mut r = Record::new(id, title, State::Todo, ts("2025-01-01T09:00:00+00:00")).unwrap();
        r.tags = vec![format!("t{id}")];
        r
    }

    fn store_with(ids: &[(u32, &str)]) -> MemoryStore {
        let mut store = MemoryStore::new("/scope/tasks");
        for (id, slug) in ids {
            let name = record::file_name(*id, 3, slug);
            store.insert(&name, &task(*id, slug)).unwrap();
        }
        store
    }

    #[test]
    fn contiguous_ids_write_nothing() {
        let mut store = store_with(&[(1, "a"), (2, "b")]);
        let before = store.mutations();
        let outcome = compact(&mut store, &ScopeConfig::default(), clock::now()).unwrap();
        assert_eq!(outcome, CompactOutcome::NothingToCompact);
        assert_eq!(store.mutations(), before);
    }

    #[test]
    fn plan_orders_by_id_then_path() {
        let store = store_with(&[(5, "e"), (2, "b"), (2, "a"), (9, "z")]);
        let plan = plan(&store, 3).unwrap();
        let ids: Vec<(u32, u32)> = plan.ledger().map(|e| (e.old_id, e.new_id)).collect();
        assert_eq!(ids, vec![(2, 1), (2, 2), (5, 3), (9, 4)]);
        let names: Vec<String> = plan
            .ledger()
            .map(|e| e.target.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["001-a.md", "002-b.md", "003-e.md", "004-z.md"]);
        assert!(plan.ledger().all(|e| is_staged(&e.temp)));
    }

    #[test]
    fn compaction_renumbers_and_logs() {
        let mut store = store_with(&[(5, "e"), (2, "b"), (2, "a"), (9, "z")]);
        let now = ts("2025-03-01T12:00:00+00:00");
        let config = ScopeConfig {
            next_id: 10,
            ..ScopeConfig::default()
        };

        let outcome = compact(&mut store, &config, now).unwrap();
        let CompactOutcome::Compacted { ledger, config } = outcome else {
            panic!("expected compaction");
        };
        assert_eq!(config.next_id, 5);
        assert_eq!(ledger.len(), 4);
        assert!(ledger.iter().all(|e| e.staged && e.committed));

        assert_eq!(
            store.file_names(),
            vec!["001-a.md", "002-b.md", "003-e.md", "004-z.md"]
        );
        let third = store.load(Path::new("/scope/tasks/003-e.md")).unwrap();
        assert_eq!(third.id, 3);
        assert_eq!(third.title, "e");
        assert_eq!(third.tags, vec!["t5"]);
        assert_eq!(third.updated_at, now);
        assert!(third.body.ends_with("compacted id from 5 to 3"));

        // "a" sorts ahead of "b", which keeps id 2 and is restored untouched
        let second = store.load(Path::new("/scope/tasks/002-b.md")).unwrap();
        assert_eq!(second.updated_at, ts("2025-01-01T09:00:00+00:00"));
        assert!(!second.body.contains("compacted"));

        let again = compact(&mut store, &config, now).unwrap();
        assert_eq!(again, CompactOutcome::NothingToCompact);
    }

    #[test]
    fn updated_at_never_moves_backwards() {
        let mut store = MemoryStore::new("/t");
        let mut r = task(4, "later");
        r.updated_at = ts("2030-01-01T00:00:00+00:00");
        store.insert("004-later.md", &r).unwrap();

        compact(&mut store, &ScopeConfig::default(), ts("2025-01-01T00:00:00+00:00")).unwrap();
        let loaded = store.load(Path::new("/t/001-later.md")).unwrap();
        assert_eq!(loaded.updated_at, ts("2030-01-01T00:00:00+00:00"));
    }

    #[test]
    fn slug_falls_back_to_title() {
        let mut store = MemoryStore::new("/t");
        store.insert("7.md", &task(7, "Write Release Notes")).unwrap();
        compact(&mut store, &ScopeConfig::default(), clock::now()).unwrap();
        assert_eq!(store.file_names(), vec!["001-write-release-notes.md"]);
    }

    #[test]
    fn commit_failure_leaves_rest_staged_and_rerun_recovers() {
        let mut store = store_with(&[(3, "a"), (6, "b"), (8, "c")]);
        let now = ts("2025-03-01T12:00:00+00:00");

        let mut plan = plan(&store, 3).unwrap();
        plan.stage(&mut store).unwrap();
        // first commit is save+rename; fail the second entry's save
        store.fail_after(3);
        assert!(plan.commit(&mut store, now).is_err());

        let committed: Vec<bool> = plan.ledger().map(|e| e.committed).collect();
        assert_eq!(committed, vec![true, false, false]);
        let names = store.file_names();
        assert!(names.contains(&"001-a.md".to_string()));
        assert_eq!(names.iter().filter(|n| n.starts_with(STAGED_PREFIX)).count(), 2);

        let outcome = compact(&mut store, &ScopeConfig::default(), now).unwrap();
        assert!(matches!(outcome, CompactOutcome::Compacted { .. }));
        assert_eq!(store.file_names(), vec!["001-a.md", "002-b.md", "003-c.md"]);
        let b = store.load(Path::new("/scope/tasks/002-b.md")).unwrap();
        assert_eq!(b.id, 2);
        assert_eq!(b.body.matches("compacted id").count(), 1);
    }

    #[test]
    fn staging_failure_aborts_before_commit() {
        let mut store = store_with(&[(3, "a"), (6, "b")]);
        store.fail_after(2);
        let err = compact(&mut store, &ScopeConfig::default(), clock::now());
        assert!(err.is_err());

        let names = store.file_names();
        assert_eq!(names.iter().filter(|n| n.starts_with(STAGED_PREFIX)).count(), 1);
        assert!(names.contains(&"006-b.md".to_string()));

        compact(&mut store, &ScopeConfig::default(), clock::now()).unwrap();
        assert_eq!(store.file_names(), vec!["001-a.md", "002-b.md"]);
    }

    #[test]
    fn leftover_staged_file_with_correct_id_is_restored() {
        let mut store = MemoryStore::new("/t");
        store.insert("001-a.md", &task(1, "a")).unwrap();
        store
            .insert(".compact-123-002-b.md", &task(2, "b"))
            .unwrap();

        let outcome = compact(&mut store, &ScopeConfig::default(), clock::now()).unwrap();
        assert!(matches!(outcome, CompactOutcome::Compacted { .. }));
        assert_eq!(store.file_names(), vec!["001-a.md", "002-b.md"]);
        let b = store.load(Path::new("/t/002-b.md")).unwrap();
        assert!(!b.body.contains("compacted"));
    }

    #[test]
    fn empty_store_has_nothing_to_do() {
        let mut store = MemoryStore::new("/t");
        assert_eq!(
            compact(&mut store, &ScopeConfig::default(), clock::now()).unwrap(),
            CompactOutcome::NothingToCompact
        );
    }
}
