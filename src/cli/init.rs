//! pin init command implementation
//!
//! Creates the `.punchlist/` marker, default config and `tasks/` directory.

use std::path::PathBuf;

use crate::cli::task::Context;
use crate::error::{Error, Result};
use crate::output::{emit_success, HumanOutput};
use crate::scope::{Scope, CONFIG_FILE, MARKER_DIR, TASKS_DIR};

#[derive(serde::Serialize)]
struct InitOutput {
    root: PathBuf,
    created: bool,
    tasks_dir_existed: bool,
}

pub fn run(ctx: &Context) -> Result<()> {
    let start = match &ctx.root {
        Some(path) => path.clone(),
        None => std::env::current_dir().map_err(|err| Error::io(".", err))?,
    };

    let report = Scope::init(&start)?;
    let root = report.scope.root().to_path_buf();

    let header = if report.already_initialized {
        "pin init: already initialized"
    } else {
        "pin init: initialized punchlist"
    };
    let mut human = HumanOutput::new(header);
    human.push_summary("root", root.display().to_string());
    if !report.already_initialized {
        human.push_summary(
            "created",
            format!("{MARKER_DIR}/{CONFIG_FILE}, {TASKS_DIR}/"),
        );
        if report.tasks_dir_existed {
            human.push_warning(format!(
                "{TASKS_DIR}/ already existed; left it untouched"
            ));
        }
        human.push_next_step("pin add <title>");
    }

    emit_success(
        ctx.output(),
        "init",
        &InitOutput {
            root,
            created: !report.already_initialized,
            tasks_dir_existed: report.tasks_dir_existed,
        },
        Some(&human),
    )
}
