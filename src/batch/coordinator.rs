//! Batch coordinator
//!
//! Discovers projects under each root, then runs a fixed pool of scoped
//! worker threads over a shared work queue. Workers send finished results
//! back over a channel; only the coordinator thread touches the report.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use chrono::Utc;
use crossbeam::channel;

use super::report::{BatchResult, Mode, ProjectReport, RunId, Summary, UnitResult};
use super::unit::{convert_file, validate_file};
use crate::domain::{ConfigurationError, MappingStore};
use crate::storage::{Discovery, RunOptions};

struct WorkItem {
    project: String,
    path: PathBuf,
}

struct Finished {
    project: String,
    result: UnitResult,
}

/// Runs conversion or validation over many files
pub struct BatchCoordinator {
    store: Arc<MappingStore>,
    options: RunOptions,
}

impl BatchCoordinator {
    pub fn new(store: Arc<MappingStore>, options: RunOptions) -> Self {
        Self { store, options }
    }

    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    /// Processes every project found under `roots`.
    ///
    /// Only bad patterns in the options fail the call; everything that goes
    /// wrong with a file or a root is recorded in the returned report.
    pub fn process_projects(&self, roots: &[PathBuf], mode: Mode) -> Result<BatchResult, ConfigurationError> {
        let discovery = Discovery::new(&self.options)?;
        let started = Instant::now();
        let started_at = Utc::now();

        let mut projects: BTreeMap<String, ProjectReport> = BTreeMap::new();
        let mut queue = Vec::new();

        for root in roots {
            match discovery.discover(root) {
                Ok(found) => {
                    for project in found {
                        let key = project_key(&project.root);
                        projects
                            .entry(key.clone())
                            .or_insert_with(|| ProjectReport::new(&project.root));
                        queue.extend(project.files.into_iter().map(|path| WorkItem {
                            project: key.clone(),
                            path,
                        }));
                    }
                }
                Err(err) => {
                    tracing::warn!(root = %root.display(), error = %err, "discovery failed");
                    projects.insert(project_key(root), ProjectReport::failed(root, err.to_string()));
                }
            }
        }

        let total = queue.len();
        let workers = self.options.workers().min(total.max(1));
        tracing::info!(
            mode = mode.as_str(),
            projects = projects.len(),
            files = total,
            workers,
            "starting batch"
        );

        let (aborted, completed) = self.run_pool(queue, workers, mode, &mut projects);

        let mut batch = BatchResult {
            run_id: RunId::new(roots, started_at),
            mode,
            dry_run: self.options.dry_run || mode == Mode::Validate,
            strict: self.options.strict,
            aborted,
            started_at,
            finished_at: Utc::now(),
            duration: started.elapsed(),
            projects,
            summary: Summary::default(),
        };
        batch.finalize(total - completed);

        tracing::info!(
            run_id = %batch.run_id,
            succeeded = batch.summary.succeeded,
            failed = batch.summary.failed,
            skipped = batch.summary.skipped,
            aborted,
            "batch finished"
        );
        Ok(batch)
    }

    /// Drains `queue` with `workers` threads; returns (aborted, completed)
    fn run_pool(
        &self,
        queue: Vec<WorkItem>,
        workers: usize,
        mode: Mode,
        projects: &mut BTreeMap<String, ProjectReport>,
    ) -> (bool, usize) {
        if queue.is_empty() {
            return (false, 0);
        }

        let (work_tx, work_rx) = channel::unbounded::<WorkItem>();
        let (done_tx, done_rx) = channel::unbounded::<Finished>();
        for item in queue {
            // The receiver is alive for the whole scope
            let _ = work_tx.send(item);
        }
        drop(work_tx);

        let abort = AtomicBool::new(false);
        let mut completed = 0;

        thread::scope(|scope| {
            for id in 0..workers {
                let work_rx = work_rx.clone();
                let done_tx = done_tx.clone();
                let abort = &abort;
                let store = &self.store;
                let options = &self.options;

                let spawned = thread::Builder::new()
                    .name(format!("fqcn-worker-{}", id))
                    .spawn_scoped(scope, move || {
                        while !abort.load(Ordering::SeqCst) {
                            let Ok(item) = work_rx.recv() else { break };
                            let result = match mode {
                                Mode::Convert => UnitResult::Conversion(convert_file(&item.path, store, options)),
                                Mode::Validate => UnitResult::Validation(validate_file(&item.path, store, options)),
                            };
                            if !result.success() && !options.continue_on_error {
                                abort.store(true, Ordering::SeqCst);
                            }
                            if done_tx
                                .send(Finished {
                                    project: item.project,
                                    result,
                                })
                                .is_err()
                            {
                                break;
                            }
                        }
                    });

                if let Err(err) = spawned {
                    tracing::warn!(worker = id, error = %err, "failed to spawn worker");
                }
            }
            drop(done_tx);

            for finished in done_rx.iter() {
                completed += 1;
                if let Some(project) = projects.get_mut(&finished.project) {
                    project.push(finished.result);
                }
            }
        });

        (abort.load(Ordering::SeqCst), completed)
    }
}

fn project_key(root: &Path) -> String {
    root.display().to_string()
}
