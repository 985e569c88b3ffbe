//! pin compact and config commands.

use std::path::PathBuf;

use serde::Serialize;

use crate::cli::task::Context;
use crate::clock;
use crate::compact::{self, CompactOutcome};
use crate::error::Result;
use crate::output::{emit_success, HumanOutput};

#[derive(Serialize)]
struct Renumbered {
    old_id: u32,
    new_id: u32,
    path: PathBuf,
}

#[derive(Serialize)]
struct CompactOutput {
    compacted: bool,
    total: usize,
    renumbered: Vec<Renumbered>,
    next_id: u32,
}

pub fn run_compact(ctx: &Context) -> Result<()> {
    let scope = ctx.scope()?;
    let config = scope.load_config()?;
    let mut store = scope.store();

    let outcome = compact::compact(&mut store, &config, clock::now())?;
    let (output, human) = match outcome {
        CompactOutcome::NothingToCompact => (
            CompactOutput {
                compacted: false,
                total: 0,
                renumbered: Vec::new(),
                next_id: config.next_id,
            },
            HumanOutput::new("Nothing to compact"),
        ),
        CompactOutcome::Compacted {
            ledger,
            config: updated,
        } => {
            scope.save_config(&updated)?;

            let renumbered: Vec<Renumbered> = ledger
                .iter()
                .filter(|entry| entry.changes_id())
                .map(|entry| Renumbered {
                    old_id: entry.old_id,
                    new_id: entry.new_id,
                    path: entry.target.clone(),
                })
                .collect();

            let mut human = HumanOutput::new(format!("Compacted {} tasks", ledger.len()));
            human.push_summary("Renumbered", renumbered.len().to_string());
            human.push_summary("Next ID", updated.next_id.to_string());
            for entry in &renumbered {
                human.push_detail(format!("{} -> {}", entry.old_id, entry.new_id));
            }

            (
                CompactOutput {
                    compacted: true,
                    total: ledger.len(),
                    renumbered,
                    next_id: updated.next_id,
                },
                human,
            )
        }
    };

    emit_success(ctx.output(), "compact", &output, Some(&human))
}

pub fn run_config(ctx: &Context) -> Result<()> {
    let scope = ctx.scope()?;
    let config = scope.load_config()?;

    let mut human = HumanOutput::new("Configuration");
    human.push_summary("Next ID", config.next_id.to_string());
    human.push_summary("ID width", config.id_width.to_string());
    human.push_summary("ls state order", config.ls_state_order.join(", "));
    human.push_summary("File", scope.config_file().display().to_string());

    emit_success(ctx.output(), "config", &config, Some(&human))
}
