//! fqcn - convert Ansible module names to fully-qualified collection names

use std::process::ExitCode;

fn main() -> ExitCode {
    if let Err(e) = fqcn_converter::cli::run() {
        eprintln!("Error: {:#}", e);
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
