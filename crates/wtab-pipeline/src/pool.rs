//! Worker process pool
//!
//! Each chunk runs in its own OS process so that a crashed or wedged browser
//! takes down one chunk, not the run. Workers are the current executable
//! started with a hidden subcommand; the job travels as JSON on the command
//! line and the [`ChunkReport`] comes back as the last line of stdout.

use crate::chunk::ChunkRange;
use crate::error::{PipelineError, Result};
use crate::worker::{ChunkJob, ChunkReport};
use log::{debug, error, info};
use rayon::ThreadPoolBuilder;
use std::ffi::OsString;
use std::io;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::mpsc;

/// Result of one dispatched chunk
#[derive(Debug)]
pub struct ChunkOutcome {
    pub range: ChunkRange,
    pub result: Result<ChunkReport>,
}

/// Runs chunk jobs concurrently, one outcome per job, in completion order
pub trait Dispatch {
    fn run(&self, jobs: &[ChunkJob]) -> Vec<ChunkOutcome>;
}

/// Spawns one child process per job
#[derive(Debug, Clone)]
pub struct WorkerPool {
    program: PathBuf,
    args: Vec<OsString>,
}

impl WorkerPool {
    /// Workers run `program args... --job <json>`.
    pub fn new<P, I, S>(program: P, args: I) -> Self
    where
        P: Into<PathBuf>,
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Workers run `<current exe> worker --job <json>`.
    ///
    /// # Errors
    ///
    /// The path of the running executable cannot be determined.
    pub fn current_exe() -> Result<Self> {
        Ok(Self::new(std::env::current_exe()?, ["worker"]))
    }

    fn run_one(&self, job: &ChunkJob) -> Result<ChunkReport> {
        let range = job.range;
        let encoded = serde_json::to_string(job)?;

        let output = Command::new(&self.program)
            .args(&self.args)
            .arg("--job")
            .arg(encoded)
            .stdin(Stdio::null())
            .stderr(Stdio::inherit())
            .output()
            .map_err(|source| PipelineError::WorkerSpawn { range, source })?;

        if !output.status.success() {
            return Err(PipelineError::WorkerFailed {
                range,
                status: output.status.to_string(),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let last = stdout
            .lines()
            .rev()
            .find(|line| !line.trim().is_empty())
            .ok_or_else(|| PipelineError::WorkerReport {
                range,
                detail: "empty output".into(),
            })?;
        serde_json::from_str(last).map_err(|e| PipelineError::WorkerReport {
            range,
            detail: e.to_string(),
        })
    }
}

impl Dispatch for WorkerPool {
    fn run(&self, jobs: &[ChunkJob]) -> Vec<ChunkOutcome> {
        if jobs.is_empty() {
            return Vec::new();
        }
        // One thread per job: every child process runs at once, whatever the core count
        let threads = match ThreadPoolBuilder::new()
            .num_threads(jobs.len())
            .thread_name(|i| format!("wtab-chunk-{i}"))
            .build()
        {
            Ok(threads) => threads,
            Err(e) => {
                error!("cannot start dispatch threads: {e}");
                return jobs
                    .iter()
                    .map(|job| ChunkOutcome {
                        range: job.range,
                        result: Err(PipelineError::WorkerSpawn {
                            range: job.range,
                            source: io::Error::other(e.to_string()),
                        }),
                    })
                    .collect();
            }
        };

        let (tx, rx) = mpsc::channel();
        threads.scope(|scope| {
            for job in jobs {
                let tx = tx.clone();
                scope.spawn(move |_| {
                    debug!("dispatching chunk {}", job.range);
                    let result = self.run_one(job);
                    match &result {
                        Ok(report) => info!(
                            "chunk {} done: {} samples, {} errors",
                            job.range,
                            report.samples,
                            report.errors()
                        ),
                        Err(e) => error!("{e}"),
                    }
                    if tx
                        .send(ChunkOutcome {
                            range: job.range,
                            result,
                        })
                        .is_err()
                    {
                        debug!("outcome of chunk {} dropped: receiver gone", job.range);
                    }
                });
            }
        });
        drop(tx);

        rx.into_iter().collect()
    }
}
