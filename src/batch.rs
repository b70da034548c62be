//! Apply one edit to many workbooks.
//!
//! With the `parallel` feature the jobs run on the rayon thread pool; without
//! it they run one after another. Either way each job gets its own result and
//! one failure does not stop the others.

use crate::config::EngineConfig;
use crate::error::Result;
use crate::workbook::Workbook;
use std::path::{Path, PathBuf};

/// One input file and where its edited copy goes. Input and output may be the
/// same path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditJob {
    pub input: PathBuf,
    pub output: PathBuf,
}

impl EditJob {
    pub fn new(input: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        EditJob {
            input: input.into(),
            output: output.into(),
        }
    }

    /// Edit a file and write it back over itself
    pub fn in_place(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        EditJob {
            input: path.clone(),
            output: path,
        }
    }
}

/// Result of one job, in the same order as the jobs were given
#[derive(Debug)]
pub struct EditOutcome {
    pub job: EditJob,
    pub result: Result<()>,
}

impl EditOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

fn run_job<F>(job: &EditJob, config: &EngineConfig, edit: &F) -> Result<()>
where
    F: Fn(&mut Workbook) -> Result<()>,
{
    let mut workbook = Workbook::open_with_config(&job.input, config.clone())?;
    edit(&mut workbook)?;
    workbook.save(&job.output)
}

fn log_outcome(job: &EditJob, result: &Result<()>) {
    match result {
        Ok(()) => log::debug!("edited {} -> {}", job.input.display(), job.output.display()),
        Err(e) => log::warn!("edit of {} failed: {e}", job.input.display()),
    }
}

/// Open each input, run `edit` on it and save it to the job's output
pub fn edit_many<F>(jobs: Vec<EditJob>, config: &EngineConfig, edit: F) -> Vec<EditOutcome>
where
    F: Fn(&mut Workbook) -> Result<()> + Sync,
{
    let total = jobs.len();

    #[cfg(feature = "parallel")]
    let outcomes: Vec<EditOutcome> = {
        use rayon::prelude::*;
        jobs.into_par_iter()
            .map(|job| {
                let result = run_job(&job, config, &edit);
                log_outcome(&job, &result);
                EditOutcome { job, result }
            })
            .collect()
    };

    #[cfg(not(feature = "parallel"))]
    let outcomes: Vec<EditOutcome> = jobs
        .into_iter()
        .map(|job| {
            let result = run_job(&job, config, &edit);
            log_outcome(&job, &result);
            EditOutcome { job, result }
        })
        .collect();

    let failed = outcomes.iter().filter(|o| !o.is_ok()).count();
    log::info!("batch edit: {} of {total} workbooks saved", total - failed);
    outcomes
}

/// Jobs that write every input into `output_dir` under the same file name
pub fn jobs_into_dir<P: AsRef<Path>>(inputs: &[P], output_dir: impl AsRef<Path>) -> Vec<EditJob> {
    let output_dir = output_dir.as_ref();
    inputs
        .iter()
        .map(|input| {
            let input = input.as_ref();
            let file_name = input.file_name().unwrap_or(input.as_os_str());
            EditJob::new(input, output_dir.join(file_name))
        })
        .collect()
}
