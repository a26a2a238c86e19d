//! `fqcn convert`

use anyhow::Result;
use clap::Args;

use super::common::{self, BatchArgs, Session};
use super::output::Output;
use crate::batch::{BatchCoordinator, BatchResult, Mode};

#[derive(Args, Debug)]
pub struct ConvertArgs {
    #[command(flatten)]
    pub batch: BatchArgs,

    /// Show what would change without writing anything
    #[arg(long)]
    pub dry_run: bool,

    /// Do not keep a backup of the original files
    #[arg(long)]
    pub no_backup: bool,

    /// Suffix for backup files
    #[arg(long, value_name = "SUFFIX")]
    pub backup_suffix: Option<String>,

    /// Overwrite existing backups
    #[arg(long)]
    pub force: bool,

    /// Print a line diff for every changed file
    #[arg(long)]
    pub diff: bool,
}

pub fn run(args: ConvertArgs, session: &Session, output: &Output) -> Result<()> {
    let mut options = session.config.options.clone();
    args.batch.apply(&mut options);
    options.dry_run |= args.dry_run;
    options.force |= args.force;
    if args.no_backup {
        options.create_backup = false;
    }
    if let Some(suffix) = args.backup_suffix {
        options.backup_suffix = suffix;
    }
    output.verbose_ctx("convert", &format!("Options: {:?}", options));

    let store = session.store(output)?;
    let coordinator = BatchCoordinator::new(store, options);
    let batch = coordinator.process_projects(&args.batch.paths, Mode::Convert)?;

    if let Some(path) = &args.batch.report {
        common::write_report(path, &batch)?;
        output.verbose_ctx("convert", &format!("Wrote report to {}", path.display()));
    }

    if output.is_json() {
        output.data(&batch);
    } else {
        print_text(&batch, args.diff, output);
    }

    common::finish(&batch, args.batch.fail_on_error)
}

fn print_text(batch: &BatchResult, diff: bool, output: &Output) {
    let verb = if batch.dry_run { "Would convert" } else { "Converted" };

    for result in batch.results().filter_map(|r| r.as_conversion()) {
        if !result.success {
            continue;
        }
        if !result.has_changes() {
            output.verbose_ctx("convert", &format!("Unchanged {}", result.file_path.display()));
        } else {
            let backup = match &result.backup_path {
                Some(path) => format!(" (backup: {})", path.display()),
                None => String::new(),
            };
            println!(
                "{} {}: {} change(s){}",
                verb,
                result.file_path.display(),
                result.changes_made,
                backup
            );
            for change in &result.changes {
                println!("  line {}: {} -> {}", change.line, change.old_name, change.new_name);
            }
            if diff {
                print!("{}", common::render_diff(result));
            }
        }
        for warning in &result.warnings {
            println!("  warning: {}: {}", result.file_path.display(), warning);
        }
    }

    common::print_failures(output, batch);

    let summary = &batch.summary;
    println!(
        "Run {}: {} file(s), {} succeeded, {} failed, {} change(s) in {} file(s){}",
        batch.run_id,
        summary.files,
        summary.succeeded,
        summary.failed,
        summary.changes,
        summary.files_changed,
        if batch.dry_run { " [dry run]" } else { "" }
    );
    if batch.aborted {
        println!("Aborted: {} file(s) not processed", summary.skipped);
    }
}
