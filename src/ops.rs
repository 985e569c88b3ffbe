//! Task operations.
//!
//! Everything here is a find → load → edit → save round trip against a
//! [`RecordStore`]. Batch variants attempt every id and collect per-id
//! failures instead of stopping at the first one.

use std::path::PathBuf;

use tracing::{debug, info};

use crate::clock::{self, Timestamp};
use crate::config::ScopeConfig;
use crate::error::{Error, Result};
use crate::record::{self, Record, State};
use crate::scope::Scope;
use crate::section;
use crate::store::{self, Filter, RecordStore, SortOrder, StoredRecord};

/// Fields for a new task
#[derive(Debug, Clone, Default)]
pub struct NewTask {
    pub title: String,
    pub state: State,
    pub priority: i64,
    pub due: Option<Timestamp>,
    pub tags: Vec<String>,
}

impl NewTask {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }
}

/// Per-id results of a batch operation
#[derive(Debug)]
pub struct BatchReport<T> {
    pub succeeded: Vec<(u32, T)>,
    pub failed: Vec<(u32, Error)>,
}

impl<T> Default for BatchReport<T> {
    fn default() -> Self {
        Self {
            succeeded: Vec::new(),
            failed: Vec::new(),
        }
    }
}

impl<T> BatchReport<T> {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    fn record(&mut self, id: u32, result: Result<T>) {
        match result {
            Ok(value) => self.succeeded.push((id, value)),
            Err(err) => {
                debug!(id, error = %err, "batch item failed");
                self.failed.push((id, err));
            }
        }
    }
}

/// Create a task under the next free id and advance `config.next_id`.
///
/// Ids already present in the store are skipped so a stale counter never
/// produces a second file for the same id. The caller persists `config`.
pub fn create<S: RecordStore + ?Sized>(
    store: &mut S,
    config: &mut ScopeConfig,
    task: NewTask,
    now: Timestamp,
) -> Result<StoredRecord> {
    let id = loop {
        let candidate = config.allocate_id();
        match store.find(candidate) {
            Err(Error::NotFound(_)) => break candidate,
            Ok(existing) => {
                debug!(id = candidate, path = %existing.display(), "id already taken, skipping")
            }
            Err(err) => return Err(err),
        }
    };

    let mut record = Record::new(id, &task.title, task.state, now)?;
    record.priority = task.priority;
    record.due = task.due;
    record.tags = task.tags;
    match record.state {
        State::Begun => record.started_at = Some(now),
        State::Done => record.completed_at = Some(now),
        _ => {}
    }

    let name = record::file_name(id, config.id_width, &record::slugify(&record.title));
    let path = store.root().join(name);
    store.save(&path, &record)?;
    info!(id, path = %path.display(), "created task");
    Ok(StoredRecord { path, record })
}

/// Load the task with `id`, apply `edit`, and write it back in place.
pub fn update<S, F>(store: &mut S, id: u32, edit: F) -> Result<StoredRecord>
where
    S: RecordStore + ?Sized,
    F: FnOnce(&mut Record) -> Result<()>,
{
    let path = store.find(id)?;
    let mut record = store.load(&path)?;
    edit(&mut record)?;
    store.save(&path, &record)?;
    Ok(StoredRecord { path, record })
}

pub fn set_state<S: RecordStore + ?Sized>(
    store: &mut S,
    id: u32,
    state: State,
    now: Timestamp,
) -> Result<StoredRecord> {
    let stored = update(store, id, |record| {
        record.transition(state, now);
        Ok(())
    })?;
    info!(id, state = %state, "task moved");
    Ok(stored)
}

/// Move every id to `state`, continuing past failures
pub fn set_states<S: RecordStore + ?Sized>(
    store: &mut S,
    ids: &[u32],
    state: State,
    now: Timestamp,
) -> BatchReport<StoredRecord> {
    let mut report = BatchReport::default();
    for &id in ids {
        report.record(id, set_state(store, id, state, now));
    }
    report
}

fn require_message(message: &str) -> Result<&str> {
    let message = message.trim();
    if message.is_empty() {
        return Err(Error::InvalidArgument("missing message".to_string()));
    }
    Ok(message)
}

/// Append a timestamped line to the task's `## Log`
pub fn append_log<S: RecordStore + ?Sized>(
    store: &mut S,
    id: u32,
    message: &str,
    now: Timestamp,
) -> Result<StoredRecord> {
    let message = require_message(message)?;
    update(store, id, |record| {
        record.body = section::append_log(&record.body, message, now);
        record.touch(now);
        Ok(())
    })
}

/// Append a timestamped line to the task's `## Notes`
pub fn add_note<S: RecordStore + ?Sized>(
    store: &mut S,
    id: u32,
    message: &str,
    now: Timestamp,
) -> Result<StoredRecord> {
    let message = require_message(message)?;
    update(store, id, |record| {
        record.body = section::append_note(&record.body, message, now);
        record.touch(now);
        Ok(())
    })
}

/// Set or replace the due date, recording the change in the log
pub fn set_due<S: RecordStore + ?Sized>(
    store: &mut S,
    id: u32,
    due: Timestamp,
    now: Timestamp,
) -> Result<StoredRecord> {
    update(store, id, |record| {
        let due_text = clock::format(&due);
        let message = match record.due {
            None => format!("added due date: {due_text}"),
            Some(_) => format!("due date changed to: {due_text}"),
        };
        record.due = Some(due);
        record.body = section::append_log(&record.body, &message, now);
        record.touch(now);
        Ok(())
    })
}

/// Move each task to the scope's trash, continuing past failures
pub fn delete(scope: &Scope, ids: &[u32]) -> BatchReport<PathBuf> {
    let store = scope.store();
    let mut report = BatchReport::default();
    for &id in ids {
        let result = store.find(id).and_then(|path| scope.trash(&path));
        if let Ok(dest) = &result {
            info!(id, dest = %dest.display(), "moved task to trash");
        }
        report.record(id, result);
    }
    report
}

/// Filtered and ordered listing
pub fn list<S: RecordStore + ?Sized>(
    store: &S,
    filter: &Filter,
    order: SortOrder,
    reverse: bool,
    state_order: &[String],
) -> Result<Vec<StoredRecord>> {
    let mut records: Vec<StoredRecord> = store
        .list()?
        .into_iter()
        .filter(|stored| filter.matches(&stored.record))
        .collect();
    store::sort_records(&mut records, order, reverse, state_order);
    Ok(records)
}
