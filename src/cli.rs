use std::num::NonZeroU32;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use crate::core::Launcher;
use crate::core::jobs::{CommandSource, Compiler, JobId, LauncherSchedule, SubmissionRequest};

/// Generate and submit a SLURM job for a single command, or for a file of
/// independent commands run through the parametric launcher.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
  /// Command to run as a serial job
  #[arg(trailing_var_arg = true, allow_hyphen_values = true, conflicts_with = "script")]
  command: Vec<String>,

  /// File with one command per line, run with the parametric launcher
  #[arg(short, long, value_name = "FILE")]
  script: Option<PathBuf>,

  #[arg(short, long, default_value = "normal")]
  queue: String,

  /// Wall-clock limit, HH:MM:SS or D-HH:MM:SS
  #[arg(short, long, default_value = "01:00:00")]
  runtime: String,

  #[arg(short, long, default_value = "launch")]
  jobname: String,

  /// Output file, defaults to <JOBNAME>.o<JOBID>
  #[arg(short, long)]
  outfile: Option<String>,

  /// Project to charge the job to
  #[arg(short = 'A', long)]
  project: Option<String>,

  /// Send job notifications to this address
  #[arg(short = 'm', long)]
  email: Option<String>,

  /// Hold the job until this job id completes successfully
  #[arg(short = 'i', long, value_name = "JOBID")]
  hold: Option<JobId>,

  #[arg(short = 'N', long)]
  nodes: Option<NonZeroU32>,

  #[arg(short = 'n', long)]
  ntasks: Option<NonZeroU32>,

  #[arg(short = 'e', long)]
  tasks_per_node: Option<NonZeroU32>,

  /// Launcher scheduling: dynamic, interleaved or block
  #[arg(long, default_value_t = LauncherSchedule::Dynamic)]
  schedule: LauncherSchedule,

  /// Working directory of the job
  #[arg(short = 'd', long)]
  cwd: Option<PathBuf>,

  /// Compiler toolchain: intel or gcc
  #[arg(short, long, default_value_t = Compiler::Intel)]
  compiler: Compiler,

  /// Profile with remora and move its results here
  #[arg(long, value_name = "DEST")]
  remora: Option<PathBuf>,

  /// Thread count exported as ITK_GLOBAL_DEFAULT_NUMBER_OF_THREADS
  #[arg(long)]
  threads: Option<NonZeroU32>,

  /// Write the control file but do not submit it
  #[arg(short, long)]
  test: bool,

  /// Keep the control file after submission
  #[arg(short, long)]
  keep: bool,

  /// Write the control file here instead of a temporary file
  #[arg(short = 'f', long, value_name = "PATH")]
  script_file: Option<PathBuf>,

  /// Queue configuration file [default: $LAUNCH_CONFIG or ~/.launch.toml]
  #[arg(long, value_name = "PATH")]
  config: Option<PathBuf>,
}

impl Cli {
  fn into_request(self, source: CommandSource) -> SubmissionRequest {
    let mut request = SubmissionRequest::new(source);
    request.queue = self.queue;
    request.runtime = self.runtime;
    request.job_name = self.jobname;
    request.output = self.outfile;
    request.project = self.project;
    request.email = self.email;
    request.hold = self.hold;
    request.nodes = self.nodes;
    request.tasks = self.ntasks;
    request.tasks_per_node = self.tasks_per_node;
    request.schedule = self.schedule;
    request.working_dir = self.cwd;
    request.compiler = self.compiler;
    request.remora = self.remora;
    request.threads = self.threads;
    request.dry_run = self.test;
    request.keep_script = self.keep;
    request.script_path = self.script_file;
    request
  }
}

pub fn main() -> Result<()> {
  let mut cli = Cli::parse();

  let command = (!cli.command.is_empty()).then(|| cli.command.join(" "));
  let source = CommandSource::from_parts(command, cli.script.take())?;

  let launcher =
    Launcher::from_config(cli.config.as_deref()).context("Failed to load queue configuration")?;
  let request = cli.into_request(source);
  let result = launcher
    .submit(&request)
    .context("Failed to launch job")?;

  if request.dry_run {
    print!("{}", result.script.text);
  }
  if result.retained {
    println!("Control file kept at {}", result.script.path.display());
  }
  match result.job_id {
    Some(job_id) => println!(
      "✅ Submitted job {} ({} nodes, {} tasks)",
      job_id, result.allocation.nodes, result.allocation.tasks
    ),
    None if !request.dry_run => println!("No job id reported by the scheduler"),
    None => {}
  }
  Ok(())
}
