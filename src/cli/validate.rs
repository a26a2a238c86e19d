//! `fqcn validate`

use anyhow::Result;
use clap::Args;

use super::common::{self, BatchArgs, Session};
use super::output::Output;
use crate::batch::{BatchCoordinator, BatchResult, Mode};

#[derive(Args, Debug)]
pub struct ValidateArgs {
    #[command(flatten)]
    pub batch: BatchArgs,

    /// Treat convertible short names as errors (non-zero exit)
    #[arg(long)]
    pub strict: bool,
}

pub fn run(args: ValidateArgs, session: &Session, output: &Output) -> Result<()> {
    let mut options = session.config.options.clone();
    args.batch.apply(&mut options);
    options.strict |= args.strict;
    output.verbose_ctx("validate", &format!("Options: {:?}", options));

    let store = session.store(output)?;
    let coordinator = BatchCoordinator::new(store, options);
    let batch = coordinator.process_projects(&args.batch.paths, Mode::Validate)?;

    if let Some(path) = &args.batch.report {
        common::write_report(path, &batch)?;
        output.verbose_ctx("validate", &format!("Wrote report to {}", path.display()));
    }

    if output.is_json() {
        output.data(&batch);
    } else {
        print_text(&batch, output);
    }

    common::finish(&batch, args.batch.fail_on_error)
}

fn print_text(batch: &BatchResult, output: &Output) {
    for result in batch.results().filter_map(|r| r.as_validation()) {
        if !result.success {
            continue;
        }
        if result.issues.is_empty() && result.warnings.is_empty() {
            output.verbose_ctx("validate", &format!("Compliant {}", result.file_path.display()));
            continue;
        }

        println!(
            "{}: score {:.2} ({}/{} qualified)",
            result.file_path.display(),
            result.score,
            result.fqcn_modules,
            result.total_modules
        );
        for issue in &result.issues {
            let fix = match &issue.suggested_fix {
                Some(fqcn) => format!(" (use {})", fqcn),
                None => String::new(),
            };
            println!(
                "  {}:{} {:<7} {}{}",
                issue.line,
                issue.column,
                issue.severity.as_str(),
                issue.message,
                fix
            );
        }
        for warning in &result.warnings {
            println!("  warning: {}", warning);
        }
    }

    common::print_failures(output, batch);

    let summary = &batch.summary;
    println!(
        "Compliance: {:.1}% ({}/{} modules) across {} file(s); {} error(s), {} warning(s), {} info, {} skipped task(s), {} failed",
        summary.compliance() * 100.0,
        summary.fqcn_modules,
        summary.total_modules,
        summary.files,
        summary.error_issues,
        summary.warning_issues,
        summary.info_issues,
        common::warning_count(batch),
        summary.failed
    );
}
