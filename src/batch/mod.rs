//! # Batch Processing
//!
//! Runs the conversion or validation engine over every playbook under a set
//! of roots with a bounded pool of worker threads.
//!
//! ## Flow
//!
//! 1. [`Discovery`](crate::storage::Discovery) groups files into projects
//! 2. Files go onto a shared queue drained by the workers
//! 3. Each worker sends its [`UnitResult`] back over a channel
//! 4. The coordinator files results under their project as they arrive and
//!    computes the [`Summary`] once the pool is done
//!
//! With `continue_on_error = false` the first failed unit stops workers from
//! taking new files; units already running are allowed to finish.

mod coordinator;
mod report;
mod unit;

pub use coordinator::BatchCoordinator;
pub use report::{BatchResult, Mode, ProjectReport, RunId, Summary, UnitResult};
pub use unit::{convert_file, read_text, run_bounded, validate_file};
