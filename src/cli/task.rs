//! pin task command implementations.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::clock;
use crate::error::{Error, Result};
use crate::ops::{self, BatchReport, NewTask};
use crate::output::{emit_success, HumanOutput, OutputOptions};
use crate::record::{Record, State};
use crate::scope::Scope;
use crate::selector;
use crate::store::{Filter, RecordStore, SortOrder, StoredRecord};

/// Global flags every command sees
pub struct Context {
    pub root: Option<PathBuf>,
    pub json: bool,
    pub quiet: bool,
}

impl Context {
    pub fn scope(&self) -> Result<Scope> {
        Scope::resolve(self.root.as_deref())
    }

    pub fn output(&self) -> OutputOptions {
        OutputOptions {
            json: self.json,
            quiet: self.quiet,
        }
    }
}

pub struct AddOptions {
    pub title: String,
    pub state: State,
    pub priority: i64,
    pub due: Option<String>,
    pub tags: Vec<String>,
}

pub struct ListOptions {
    pub state: Option<State>,
    pub priority: i64,
    pub tags: Vec<String>,
    pub order: SortOrder,
    pub reverse: bool,
}

/// A record as shown to users, body and location included
#[derive(Serialize)]
pub(crate) struct TaskView<'a> {
    #[serde(flatten)]
    record: &'a Record,
    path: &'a Path,
    #[serde(skip_serializing_if = "is_blank")]
    body: &'a str,
}

fn is_blank(body: &&str) -> bool {
    body.is_empty()
}

impl<'a> From<&'a StoredRecord> for TaskView<'a> {
    fn from(stored: &'a StoredRecord) -> Self {
        Self {
            record: &stored.record,
            path: &stored.path,
            body: &stored.record.body,
        }
    }
}

#[derive(Serialize)]
struct TaskListOutput<'a> {
    total: usize,
    tasks: Vec<TaskView<'a>>,
}

#[derive(Serialize)]
struct TaskRef {
    id: u32,
    path: PathBuf,
}

#[derive(Serialize)]
struct TaskFailure {
    id: u32,
    error: String,
}

#[derive(Serialize)]
struct BatchOutput<T: Serialize> {
    updated: Vec<T>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    failed: Vec<TaskFailure>,
}

pub fn run_add(ctx: &Context, options: AddOptions) -> Result<()> {
    let scope = ctx.scope()?;
    let mut config = scope.load_config()?;
    let due = options.due.as_deref().map(clock::parse_due).transpose()?;

    let mut store = scope.store();
    let created = ops::create(
        &mut store,
        &mut config,
        NewTask {
            title: options.title,
            state: options.state,
            priority: options.priority,
            due,
            tags: options.tags,
        },
        clock::now(),
    )?;
    scope.save_config(&config)?;

    let mut human = HumanOutput::new(format!("Created task {}", created.record.id));
    human.push_summary("Title", created.record.title.clone());
    human.push_summary("State", created.record.state.to_string());
    human.push_summary("Path", created.path.display().to_string());

    emit_success(ctx.output(), "add", &TaskView::from(&created), Some(&human))
}

pub fn run_list(ctx: &Context, options: ListOptions) -> Result<()> {
    let scope = ctx.scope()?;
    let config = scope.load_config()?;
    let filter = Filter {
        state: options.state,
        priority: options.priority,
        tags: options.tags,
    };

    let tasks = ops::list(
        &scope.store(),
        &filter,
        options.order,
        options.reverse,
        &config.ls_state_order,
    )?;

    let width = tasks
        .iter()
        .map(|t| t.record.id.to_string().len())
        .max()
        .unwrap_or(0)
        .max(config.id_width);

    let mut human = HumanOutput::new("Tasks");
    human.push_summary("Total", tasks.len().to_string());
    for task in &tasks {
        human.push_detail(list_line(&task.record, width));
    }

    let output = TaskListOutput {
        total: tasks.len(),
        tasks: tasks.iter().map(TaskView::from).collect(),
    };
    emit_success(ctx.output(), "ls", &output, Some(&human))
}

fn list_line(record: &Record, width: usize) -> String {
    let mut line = format!(
        "{:>width$} {} {} pri:{} due:{}",
        record.id,
        record.state,
        record.title,
        record.priority,
        optional_time(record.due.as_ref()),
    );
    if !record.tags.is_empty() {
        line.push_str(&format!(" {{{}}}", record.tags.join(",")));
    }
    line
}

pub fn run_show(ctx: &Context, id: u32) -> Result<()> {
    let scope = ctx.scope()?;
    let store = scope.store();
    let path = store.find(id)?;
    let stored = StoredRecord {
        record: store.load(&path)?,
        path,
    };
    let record = &stored.record;

    let mut human = HumanOutput::new(format!("Task {}", record.id));
    human.push_summary("Title", record.title.clone());
    human.push_summary("State", record.state.to_string());
    human.push_summary("Priority", record.priority.to_string());
    human.push_summary("Due", optional_time(record.due.as_ref()));
    human.push_summary("Tags", list_or_dash(&record.tags));
    human.push_summary("Created", clock::format(&record.created_at));
    human.push_summary("Updated", clock::format(&record.updated_at));
    human.push_summary("Started", optional_time(record.started_at.as_ref()));
    human.push_summary("Completed", optional_time(record.completed_at.as_ref()));
    human.push_summary("External refs", list_or_dash(&record.external_refs));
    human.push_summary("Path", stored.path.display().to_string());
    human.set_body(record.body.clone());

    emit_success(ctx.output(), "show", &TaskView::from(&stored), Some(&human))
}

pub fn run_state(ctx: &Context, ids: &[String], state: State) -> Result<()> {
    let ids = selector::parse_ids(ids)?;
    let scope = ctx.scope()?;
    let mut store = scope.store();
    let report = ops::set_states(&mut store, &ids, state, clock::now());

    emit_batch(ctx, &format!("moved to {state}"), "state", report, |id, stored| TaskRef {
        id,
        path: stored.path,
    })
}

pub fn run_log(ctx: &Context, id: u32, message: &str) -> Result<()> {
    let scope = ctx.scope()?;
    let stored = ops::append_log(&mut scope.store(), id, message, clock::now())?;
    emit_updated(ctx, "log", format!("Added log to task {id}"), stored)
}

pub fn run_note(ctx: &Context, id: u32, message: &str) -> Result<()> {
    let scope = ctx.scope()?;
    let stored = ops::add_note(&mut scope.store(), id, message, clock::now())?;
    emit_updated(ctx, "note", format!("Added note to task {id}"), stored)
}

pub fn run_due(ctx: &Context, id: u32, date: &str) -> Result<()> {
    let due = clock::parse_due(date)?;
    let scope = ctx.scope()?;
    let stored = ops::set_due(&mut scope.store(), id, due, clock::now())?;
    emit_updated(ctx, "due", format!("Updated due date for task {id}"), stored)
}

pub fn run_delete(ctx: &Context, ids: &[String]) -> Result<()> {
    let ids = selector::parse_ids(ids)?;
    let scope = ctx.scope()?;
    let report = ops::delete(&scope, &ids);

    emit_batch(ctx, "moved to trash", "del", report, |id, path| TaskRef { id, path })
}

fn emit_updated(ctx: &Context, command: &str, header: String, stored: StoredRecord) -> Result<()> {
    let mut human = HumanOutput::new(header);
    human.push_summary("Path", stored.path.display().to_string());
    emit_success(ctx.output(), command, &TaskView::from(&stored), Some(&human))
}

/// Report a batch: all failed → first error; otherwise success with
/// failures listed as warnings.
fn emit_batch<T, R, F>(
    ctx: &Context,
    verb: &str,
    command: &str,
    report: BatchReport<T>,
    to_ref: F,
) -> Result<()>
where
    R: Serialize,
    F: Fn(u32, T) -> R,
{
    let BatchReport { succeeded, failed } = report;
    if succeeded.is_empty() {
        if let Some((_, err)) = failed.into_iter().next() {
            return Err(err);
        }
        return Err(Error::InvalidArgument("no task IDs given".to_string()));
    }

    let mut human = HumanOutput::new(format!(
        "{} {} {verb}",
        succeeded.len(),
        if succeeded.len() == 1 { "task" } else { "tasks" }
    ));
    for (id, _) in &succeeded {
        human.push_detail(format!("task {id}"));
    }
    let failed: Vec<TaskFailure> = failed
        .into_iter()
        .map(|(id, err)| {
            human.push_warning(format!("task {id}: {err}"));
            TaskFailure {
                id,
                error: err.to_string(),
            }
        })
        .collect();

    let output = BatchOutput {
        updated: succeeded
            .into_iter()
            .map(|(id, item)| to_ref(id, item))
            .collect(),
        failed,
    };
    emit_success(ctx.output(), command, &output, Some(&human))
}

fn optional_time(ts: Option<&clock::Timestamp>) -> String {
    ts.map(clock::format).unwrap_or_else(|| "n/a".to_string())
}

fn list_or_dash(items: &[String]) -> String {
    if items.is_empty() {
        "-".to_string()
    } else {
        items.join(",")
    }
}
