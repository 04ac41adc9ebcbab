use std::io::{BufRead, BufReader};
use std::path::Path;
use std::process::{Command, Stdio};

use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::core::jobs::{JobError, JobId, SchedulerClient};

static SUBMITTED_RE: Lazy<Regex> =
  Lazy::new(|| Regex::new(r"^Submitted batch job\s+(\d+)").expect("valid job id regex"));

/// Extracts the job id from an sbatch acknowledgment such as
/// `Submitted batch job 11`.
pub fn parse_job_id(line: &str) -> Option<JobId> {
  SUBMITTED_RE
    .captures(line.trim_end())
    .and_then(|caps| caps.get(1))
    .and_then(|id| id.as_str().parse().ok())
}

/// Submits control files with `sbatch`.
#[derive(Debug, Clone, PartialEq)]
pub struct SbatchClient {
  program: String,
}

impl Default for SbatchClient {
  fn default() -> Self {
    Self::with_program("sbatch")
  }
}

impl SbatchClient {
  pub fn with_program(program: impl Into<String>) -> Self {
    SbatchClient {
      program: program.into(),
    }
  }
}

impl SchedulerClient for SbatchClient {
  fn submit(&self, script_path: &Path) -> Result<Option<JobId>, JobError> {
    debug!("Running {} {:?}", self.program, script_path);
    let mut child = Command::new(&self.program)
      .arg(script_path)
      .stdout(Stdio::piped())
      .spawn()
      .map_err(JobError::SubmissionProcess)?;

    // sbatch may already have queued the job, so a bad read must not skip
    // the remaining output or the wait below
    let mut job_id = None;
    if let Some(stdout) = child.stdout.take() {
      let mut reader = BufReader::new(stdout);
      let mut buf = Vec::new();
      loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
          Ok(0) => break,
          Ok(_) => {
            let line = String::from_utf8_lossy(&buf);
            println!("{}", line.trim());
            if let Some(id) = parse_job_id(&line) {
              job_id = Some(id);
            }
          }
          Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
          Err(e) => {
            warn!("Could not read output of {}: {}", self.program, e);
            break;
          }
        }
      }
    }

    let status = child.wait().map_err(JobError::SubmissionProcess)?;
    if !status.success() {
      warn!("{} exited with {}", self.program, status);
    }
    Ok(job_id)
  }
}
