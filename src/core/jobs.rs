mod allocation;
mod script;
mod slurm;
mod utils;


use std::fs;
use std::io;
use std::num::NonZeroU32;
use std::path::{Path, PathBuf};

use log::debug;
use strum::{Display, EnumString};
use thiserror::Error;

use crate::core::queues::QueueError;

pub use allocation::{ResolvedAllocation, resolve_allocation};
pub use script::{GeneratedScript, ScriptContext, render_script};
pub use slurm::SbatchClient;
pub use utils::{LocalTempFactory, parse_time_to_seconds};

pub type JobId = u64;

#[derive(Error, Debug)]
pub enum JobError {
  #[error("You must either specify a command file (using -s) or a command to run")]
  MissingCommandSource,
  #[error("Command file does not exist: {0}")]
  CommandFileNotFound(PathBuf),
  #[error("Command file {path:?} contains an empty line (line {line}), please remove it first")]
  EmptyLine { path: PathBuf, line: usize },
  #[error("Command file {0:?} contains no commands")]
  EmptyCommandFile(PathBuf),
  #[error("Invalid Time Format: {0}")]
  InvalidTimeFormat(String),
  #[error("Queue Error: {0}")]
  Queue(#[from] QueueError),
  #[error("Could not start the submission process: {0}")]
  SubmissionProcess(io::Error),
  #[error("IO Error: {0}")]
  IoError(#[from] io::Error),
}

/// Submits a control file to the batch scheduler.
pub trait SchedulerClient {
  /// Returns the job id reported by the scheduler, if any.
  fn submit(&self, script_path: &Path) -> Result<Option<JobId>, JobError>;
}

/// Hands out a fresh, collision-free path for a control file.
pub trait TempFileFactory {
  fn create(&self, job_name: &str) -> Result<PathBuf, JobError>;
}

/// Where the commands of a job come from.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandSource {
  Single(String),
  List(PathBuf),
}

impl CommandSource {
  /// Builds the source from the two mutually exclusive CLI inputs.
  /// An empty inline command counts as absent.
  pub fn from_parts(
    command: Option<String>,
    command_file: Option<PathBuf>,
  ) -> Result<Self, JobError> {
    match (command.filter(|c| !c.trim().is_empty()), command_file) {
      (Some(command), _) => Ok(CommandSource::Single(command)),
      (None, Some(path)) => Ok(CommandSource::List(path)),
      (None, None) => Err(JobError::MissingCommandSource),
    }
  }

  /// Reads and validates the commands. A blank line anywhere in a command
  /// file rejects the whole request.
  pub fn load(&self) -> Result<JobCommands, JobError> {
    let path = match self {
      CommandSource::Single(command) => return Ok(JobCommands::Single(command.clone())),
      CommandSource::List(path) => path,
    };

    let text = fs::read_to_string(path).map_err(|e| match e.kind() {
      io::ErrorKind::NotFound => JobError::CommandFileNotFound(path.clone()),
      _ => JobError::IoError(e),
    })?;

    let lines: Vec<&str> = text.lines().collect();
    if let Some(idx) = lines.iter().position(|l| l.trim().is_empty()) {
      return Err(JobError::EmptyLine {
        path: path.clone(),
        line: idx + 1,
      });
    }

    match lines.as_slice() {
      [] => Err(JobError::EmptyCommandFile(path.clone())),
      // The launcher misbehaves with a single task, run it directly instead
      [command] => Ok(JobCommands::Single(command.trim_end().to_string())),
      _ => {
        let path = fs::canonicalize(path)?;
        debug!("Found {} commands in {:?}", lines.len(), path);
        Ok(JobCommands::List {
          path,
          count: u32::try_from(lines.len()).unwrap_or(u32::MAX),
        })
      }
    }
  }
}

/// Validated commands of a job.
#[derive(Debug, Clone, PartialEq)]
pub enum JobCommands {
  Single(String),
  List { path: PathBuf, count: u32 },
}

impl JobCommands {
  pub fn is_parametric(&self) -> bool {
    matches!(self, JobCommands::List { .. })
  }

  pub fn count(&self) -> u32 {
    match self {
      JobCommands::Single(_) => 1,
      JobCommands::List { count, .. } => *count,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, EnumString, Display)]
#[strum(serialize_all = "lowercase")]
pub enum Compiler {
  #[default]
  Intel,
  Gcc,
}

/// Task distribution policy of the parametric launcher (`LAUNCHER_SCHED`).
#[derive(Debug, Clone, Copy, PartialEq, Default, EnumString, Display)]
#[strum(serialize_all = "lowercase")]
pub enum LauncherSchedule {
  #[default]
  Dynamic,
  Interleaved,
  Block,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionRequest {
  pub source: CommandSource,
  pub queue: String,
  pub runtime: String,
  pub job_name: String,
  pub output: Option<String>,
  pub project: Option<String>,
  pub email: Option<String>,
  pub hold: Option<JobId>,
  pub nodes: Option<NonZeroU32>,
  pub tasks: Option<NonZeroU32>,
  pub tasks_per_node: Option<NonZeroU32>,
  pub schedule: LauncherSchedule,
  pub working_dir: Option<PathBuf>,
  pub compiler: Compiler,
  /// Destination of remora profiling output; enables remora when set.
  pub remora: Option<PathBuf>,
  pub threads: Option<NonZeroU32>,
  pub dry_run: bool,
  pub keep_script: bool,
  pub script_path: Option<PathBuf>,
}

impl SubmissionRequest {
  pub fn new(source: CommandSource) -> Self {
    SubmissionRequest {
      source,
      queue: "normal".to_string(),
      runtime: "01:00:00".to_string(),
      job_name: "launch".to_string(),
      output: None,
      project: None,
      email: None,
      hold: None,
      nodes: None,
      tasks: None,
      tasks_per_node: None,
      schedule: LauncherSchedule::default(),
      working_dir: None,
      compiler: Compiler::default(),
      remora: None,
      threads: None,
      dry_run: false,
      keep_script: false,
      script_path: None,
    }
  }
}
