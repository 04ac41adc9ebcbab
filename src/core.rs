pub mod jobs;
pub mod launch_config;
pub mod queues;

#[cfg(test)]
mod tests;

use std::fs;
use std::path::Path;

use chrono::Local;
use log::{debug, warn};

use crate::core::jobs::{
  GeneratedScript, JobCommands, JobError, JobId, LocalTempFactory, ResolvedAllocation,
  SbatchClient, SchedulerClient, ScriptContext, SubmissionRequest, TempFileFactory,
  parse_time_to_seconds, render_script, resolve_allocation,
};
use crate::core::launch_config::LaunchConfigError;
use crate::core::queues::QueueTable;

pub struct Launcher {
  queues: QueueTable,
  scheduler: Box<dyn SchedulerClient>,
  temp_files: Box<dyn TempFileFactory>,
}

#[derive(thiserror::Error, Debug)]
pub enum LaunchError {
  #[error("Config Error: {0}")]
  ConfigError(#[from] LaunchConfigError),
  #[error("Job Error: {0}")]
  JobError(#[from] JobError),
}

/// Outcome of a submission. `job_id` is absent for dry runs and when the
/// scheduler did not acknowledge the job.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionResult {
  pub script: GeneratedScript,
  pub allocation: ResolvedAllocation,
  pub job_id: Option<JobId>,
  pub retained: bool,
}

impl Launcher {
  /// Launcher submitting with `sbatch` and writing scripts to the current directory.
  pub fn new(queues: QueueTable) -> Self {
    Self::with_clients(
      queues,
      Box::new(SbatchClient::default()),
      Box::new(LocalTempFactory::in_dir(".")),
    )
  }

  pub fn with_clients(
    queues: QueueTable,
    scheduler: Box<dyn SchedulerClient>,
    temp_files: Box<dyn TempFileFactory>,
  ) -> Self {
    let _ = env_logger::try_init();
    Launcher {
      queues,
      scheduler,
      temp_files,
    }
  }

  /// Loads the queue table from `config` (or the default location) and
  /// builds a launcher on top of it.
  pub fn from_config(config: Option<&Path>) -> Result<Self, LaunchError> {
    let location = launch_config::find_config(config);
    debug!("Using queue configuration {:?}", location);
    let queues = launch_config::load_queue_table(location.as_ref())?;
    Ok(Self::new(queues))
  }

  /// Validates the request, computes the allocation and writes the control
  /// file. Nothing touches the filesystem until validation has passed.
  pub fn generate(
    &self,
    request: &SubmissionRequest,
  ) -> Result<(GeneratedScript, ResolvedAllocation), LaunchError> {
    let commands = request.source.load()?;
    match &commands {
      JobCommands::Single(command) => println!("Running serial command: {}", command),
      JobCommands::List { path, count } => {
        println!("Found {} commands", count);
        println!("Submitting parametric job file: {}", path.display());
      }
    }

    parse_time_to_seconds(&request.runtime)?;

    if !self.queues.resolve(&request.queue).is_known() {
      warn!(
        "Queue '{}' has no configured or built-in capacities",
        request.queue
      );
    }
    let allocation =
      resolve_allocation(&commands, request, &self.queues).map_err(JobError::from)?;
    if allocation.parametric {
      println!(
        "Requesting {} nodes and {} tasks",
        allocation.nodes, allocation.tasks
      );
    }

    let working_dir = match &request.working_dir {
      Some(dir) => dir.clone(),
      None => std::env::current_dir().map_err(JobError::from)?,
    };
    let text = render_script(&ScriptContext {
      request,
      commands: &commands,
      allocation: &allocation,
      working_dir: &working_dir,
      created: Local::now(),
    });

    let path = match &request.script_path {
      Some(path) => path.clone(),
      None => self.temp_files.create(&request.job_name)?,
    };
    println!("Outputting SLURM commands to {}", path.display());
    if let Err(e) = fs::write(&path, &text) {
      let _ = fs::remove_file(&path);
      return Err(JobError::from(e).into());
    }

    Ok((GeneratedScript { path, text }, allocation))
  }

  /// Generates the control file, submits it unless this is a dry run, then
  /// removes it unless it should be kept.
  pub fn submit(&self, request: &SubmissionRequest) -> Result<SubmissionResult, LaunchError> {
    let (script, allocation) = self.generate(request)?;

    let outcome = if request.dry_run {
      debug!("Dry run, skipping submission of {:?}", script.path);
      Ok(None)
    } else {
      self.scheduler.submit(&script.path)
    };

    // Cleanup happens whether or not the submission went through
    if !request.keep_script {
      println!("Deleting control file: {}", script.path.display());
      if let Err(e) = fs::remove_file(&script.path) {
        warn!("Could not delete {:?}: {}", script.path, e);
      }
    }

    let job_id = outcome?;
    Ok(SubmissionResult {
      script,
      allocation,
      job_id,
      retained: request.keep_script,
    })
  }
}
