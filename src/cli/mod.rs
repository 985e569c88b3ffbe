//! Command-line interface for pin
//!
//! This module defines the CLI structure using clap derive macros.
//! Command bodies live in submodules.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::error::Result;
use crate::record::State;
use crate::scope::ROOT_ENV;

mod compact;
mod init;
mod task;

/// pin - a punchlist of plain-text task files
#[derive(Parser, Debug)]
#[command(name = "pin")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Scope root (defaults to the nearest directory holding .punchlist/)
    #[arg(long, global = true, env = ROOT_ENV)]
    pub root: Option<PathBuf>,

    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Task ids: `3`, `2 5-7`, or `[1, 2, 4-5]`
#[derive(Args, Debug)]
pub struct IdsArgs {
    #[arg(required = true, num_args = 1..)]
    pub ids: Vec<String>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a punchlist in the current directory (or --root)
    Init,

    /// Create a task
    #[command(visible_alias = "pin")]
    Add {
        /// Task title
        #[arg(required = true, num_args = 1..)]
        title: Vec<String>,

        /// Initial state
        #[arg(long)]
        state: Option<State>,

        /// Priority (0 = unset)
        #[arg(long, default_value_t = 0)]
        pri: i64,

        /// Due date: today, tomorrow, friday, "next friday", 2025-03-01, ...
        #[arg(long)]
        due: Option<String>,

        /// Tag (repeatable)
        #[arg(long = "tag")]
        tags: Vec<String>,
    },

    /// List tasks
    Ls {
        /// Only show tasks in this state
        state: Option<State>,

        /// Only show tasks with this priority
        #[arg(long, default_value_t = 0)]
        pri: i64,

        /// Only show tasks carrying any of these tags (repeatable)
        #[arg(long = "tag")]
        tags: Vec<String>,

        /// Order by state or id
        #[arg(long, default_value = "state")]
        order: crate::store::SortOrder,

        /// Reverse sort order
        #[arg(long)]
        reverse: bool,
    },

    /// Show a task in detail
    Show {
        id: u32,
    },

    /// Mark tasks BEGUN
    #[command(visible_alias = "begun")]
    Start(IdsArgs),

    /// Mark tasks DONE
    Done(IdsArgs),

    /// Mark tasks NOTDO
    #[command(visible_alias = "defer")]
    Notdo(IdsArgs),

    /// Mark tasks BLOCK
    Block(IdsArgs),

    /// Mark tasks CONFIRM
    Confirm(IdsArgs),

    /// Mark tasks TODO
    Todo(IdsArgs),

    /// Append a timestamped entry to a task's log
    Log {
        id: u32,
        #[arg(required = true, num_args = 1..)]
        message: Vec<String>,
    },

    /// Append a timestamped entry to a task's notes
    Note {
        id: u32,
        #[arg(required = true, num_args = 1..)]
        message: Vec<String>,
    },

    /// Set or change a task's due date
    Due {
        id: u32,
        #[arg(required = true, num_args = 1..)]
        date: Vec<String>,
    },

    /// Move tasks to the trash
    #[command(visible_aliases = ["rm", "delete"])]
    Del(IdsArgs),

    /// Renumber tasks into a contiguous sequence
    Compact,

    /// Show the scope configuration
    Config,
}

impl Cli {
    /// Execute the CLI command
    pub fn run(self) -> Result<()> {
        let ctx = task::Context {
            root: self.root,
            json: self.json,
            quiet: self.quiet,
        };
        match self.command {
            Commands::Init => init::run(&ctx),
            Commands::Add {
                title,
                state,
                pri,
                due,
                tags,
            } => task::run_add(
                &ctx,
                task::AddOptions {
                    title: title.join(" "),
                    state: state.unwrap_or_default(),
                    priority: pri,
                    due,
                    tags,
                },
            ),
            Commands::Ls {
                state,
                pri,
                tags,
                order,
                reverse,
            } => task::run_list(
                &ctx,
                task::ListOptions {
                    state,
                    priority: pri,
                    tags,
                    order,
                    reverse,
                },
            ),
            Commands::Show { id } => task::run_show(&ctx, id),
            Commands::Start(args) => task::run_state(&ctx, &args.ids, State::Begun),
            Commands::Done(args) => task::run_state(&ctx, &args.ids, State::Done),
            Commands::Notdo(args) => task::run_state(&ctx, &args.ids, State::NotDo),
            Commands::Block(args) => task::run_state(&ctx, &args.ids, State::Block),
            Commands::Confirm(args) => task::run_state(&ctx, &args.ids, State::Confirm),
            Commands::Todo(args) => task::run_state(&ctx, &args.ids, State::Todo),
            Commands::Log { id, message } => task::run_log(&ctx, id, &message.join(" ")),
            Commands::Note { id, message } => task::run_note(&ctx, id, &message.join(" ")),
            Commands::Due { id, date } => task::run_due(&ctx, id, &date.join(" ")),
            Commands::Del(args) => task::run_delete(&ctx, &args.ids),
            Commands::Compact => compact::run_compact(&ctx),
            Commands::Config => compact::run_config(&ctx),
        }
    }
}
