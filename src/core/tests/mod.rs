use std::cell::{Cell, RefCell};
use std::fs;
use std::io;
use std::num::NonZeroU32;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use tempfile::TempDir;

use crate::core::jobs::{
  CommandSource, JobError, JobId, SchedulerClient, SubmissionRequest, TempFileFactory,
};
use crate::core::queues::{QueueError, QueueTable};
use crate::core::{LaunchError, Launcher};

type Calls = Rc<RefCell<Vec<(PathBuf, String)>>>;

/// Records what it was asked to submit, reading the script while it exists.
struct FakeScheduler {
  calls: Calls,
  reply: Option<JobId>,
  fail: bool,
}

impl SchedulerClient for FakeScheduler {
  fn submit(&self, script_path: &Path) -> Result<Option<JobId>, JobError> {
    let text = fs::read_to_string(script_path)?;
    self.calls.borrow_mut().push((script_path.to_path_buf(), text));
    if self.fail {
      return Err(JobError::SubmissionProcess(io::Error::new(
        io::ErrorKind::NotFound,
        "sbatch: command not found",
      )));
    }
    Ok(self.reply)
  }
}

/// Always hands out the same path.
struct FixedTempFactory {
  path: PathBuf,
  created: Rc<Cell<u32>>,
}

impl TempFileFactory for FixedTempFactory {
  fn create(&self, _job_name: &str) -> Result<PathBuf, JobError> {
    self.created.set(self.created.get() + 1);
    Ok(self.path.clone())
  }
}

struct Harness {
  launcher: Launcher,
  calls: Calls,
  created: Rc<Cell<u32>>,
  temp_path: PathBuf,
  dir: TempDir,
}

fn harness(reply: Option<JobId>, fail: bool) -> Harness {
  let dir = TempDir::new().unwrap();
  let calls = Calls::default();
  let created = Rc::new(Cell::new(0));
  let temp_path = dir.path().join("launch_fixed.slurm");
  let launcher = Launcher::with_clients(
    QueueTable::builtin(),
    Box::new(FakeScheduler {
      calls: calls.clone(),
      reply,
      fail,
    }),
    Box::new(FixedTempFactory {
      path: temp_path.clone(),
      created: created.clone(),
    }),
  );
  Harness {
    launcher,
    calls,
    created,
    temp_path,
    dir,
  }
}

fn serial_request(dir: &Path) -> SubmissionRequest {
  let mut request = SubmissionRequest::new(CommandSource::Single("echo hello".to_string()));
  request.working_dir = Some(dir.to_path_buf());
  request
}

fn list_request(dir: &Path, text: &str) -> SubmissionRequest {
  let path = dir.join("commands.txt");
  fs::write(&path, text).unwrap();
  let mut request = SubmissionRequest::new(CommandSource::List(path));
  request.working_dir = Some(dir.to_path_buf());
  request
}

#[test]
fn test_submit_serial_job() {
  let h = harness(Some(1234), false);
  let request = serial_request(h.dir.path());
  let result = h.launcher.submit(&request).unwrap();

  assert_eq!(result.job_id, Some(1234));
  assert!(!result.retained);
  assert_eq!(result.script.path, h.temp_path);
  assert_eq!(result.allocation.nodes, 1);
  assert_eq!(result.allocation.tasks, 1);

  let calls = h.calls.borrow();
  assert_eq!(calls.len(), 1);
  assert_eq!(calls[0].0, h.temp_path);
  assert_eq!(calls[0].1, result.script.text);
  // Deleted once submitted
  assert!(!h.temp_path.exists());
}

#[test]
fn test_submit_parametric_job() {
  let h = harness(Some(99), false);
  let commands: String = (0..100).map(|i| format!("echo {}\n", i)).collect();
  let mut request = list_request(h.dir.path(), &commands);
  request.tasks_per_node = NonZeroU32::new(24);
  let result = h.launcher.submit(&request).unwrap();

  assert!(result.allocation.parametric);
  assert_eq!((result.allocation.nodes, result.allocation.tasks), (5, 120));
  assert!(result.script.text.contains("#SBATCH -N 5\n#SBATCH -n 120\n"));
  assert!(result.script.text.contains("$LAUNCHER_DIR/paramrun\n"));
  assert_eq!(h.calls.borrow().len(), 1);
}

#[test]
fn test_keep_script() {
  let h = harness(Some(1), false);
  let mut request = serial_request(h.dir.path());
  request.keep_script = true;
  let result = h.launcher.submit(&request).unwrap();

  assert!(result.retained);
  assert_eq!(fs::read_to_string(&h.temp_path).unwrap(), result.script.text);
}

#[test]
fn test_dry_run_never_submits() {
  let h = harness(Some(1), false);
  let mut request = serial_request(h.dir.path());
  request.dry_run = true;
  request.keep_script = true;
  let result = h.launcher.submit(&request).unwrap();

  assert_eq!(result.job_id, None);
  assert!(h.calls.borrow().is_empty());
  assert!(h.temp_path.exists());

  request.keep_script = false;
  let result = h.launcher.submit(&request).unwrap();
  assert_eq!(result.job_id, None);
  assert!(h.calls.borrow().is_empty());
  assert!(!h.temp_path.exists());
}

#[test]
fn test_caller_supplied_script_path() {
  let h = harness(Some(5), false);
  let mut request = serial_request(h.dir.path());
  let chosen = h.dir.path().join("mine.slurm");
  request.script_path = Some(chosen.clone());
  request.keep_script = true;
  let result = h.launcher.submit(&request).unwrap();

  assert_eq!(result.script.path, chosen);
  assert!(chosen.exists());
  assert_eq!(h.created.get(), 0);
  assert!(!h.temp_path.exists());
}

#[test]
fn test_unwritable_script_path() {
  let h = harness(Some(5), false);
  let mut request = serial_request(h.dir.path());
  let missing_dir = h.dir.path().join("missing");
  let chosen = missing_dir.join("sub.slurm");
  request.script_path = Some(chosen.clone());
  let err = h.launcher.submit(&request).unwrap_err();

  assert!(matches!(err, LaunchError::JobError(JobError::IoError(_))));
  assert!(!chosen.exists());
  assert!(!missing_dir.exists());
  assert!(h.calls.borrow().is_empty());
  assert_eq!(h.created.get(), 0);
  assert!(!h.temp_path.exists());
}

#[test]
fn test_submission_failure_still_cleans_up() {
  let h = harness(None, true);
  let request = serial_request(h.dir.path());
  let err = h.launcher.submit(&request).unwrap_err();

  assert!(matches!(
    err,
    LaunchError::JobError(JobError::SubmissionProcess(_))
  ));
  assert_eq!(h.calls.borrow().len(), 1);
  assert!(!h.temp_path.exists());
}

#[test]
fn test_no_acknowledgment_means_no_job_id() {
  let h = harness(None, false);
  let request = serial_request(h.dir.path());
  let result = h.launcher.submit(&request).unwrap();
  assert_eq!(result.job_id, None);
  assert_eq!(h.calls.borrow().len(), 1);
}

// ============================================================================
// Validation happens before anything is written
// ============================================================================

#[test]
fn test_empty_line_rejects_whole_request() {
  let h = harness(Some(1), false);
  let request = list_request(h.dir.path(), "echo 1\n\necho 2\n");
  let err = h.launcher.submit(&request).unwrap_err();

  assert!(matches!(
    err,
    LaunchError::JobError(JobError::EmptyLine { line: 2, .. })
  ));
  assert_eq!(h.created.get(), 0);
  assert!(h.calls.borrow().is_empty());
  assert!(!h.temp_path.exists());
}

#[test]
fn test_missing_command_file() {
  let h = harness(Some(1), false);
  let mut request = serial_request(h.dir.path());
  request.source = CommandSource::List(h.dir.path().join("absent.txt"));
  assert!(matches!(
    h.launcher.submit(&request),
    Err(LaunchError::JobError(JobError::CommandFileNotFound(_)))
  ));
  assert_eq!(h.created.get(), 0);
}

#[test]
fn test_invalid_runtime() {
  let h = harness(Some(1), false);
  let mut request = serial_request(h.dir.path());
  request.runtime = "90 minutes".to_string();
  assert!(matches!(
    h.launcher.submit(&request),
    Err(LaunchError::JobError(JobError::InvalidTimeFormat(_)))
  ));
  assert_eq!(h.created.get(), 0);
  assert!(h.calls.borrow().is_empty());
}

#[test]
fn test_unknown_queue() {
  let h = harness(Some(1), false);
  let mut request = list_request(h.dir.path(), "echo 1\necho 2\n");
  request.queue = "mystery".to_string();
  assert!(matches!(
    h.launcher.submit(&request),
    Err(LaunchError::JobError(JobError::Queue(
      QueueError::UnknownQueue { .. }
    )))
  ));
  assert_eq!(h.created.get(), 0);

  request.nodes = NonZeroU32::new(2);
  request.tasks = NonZeroU32::new(10);
  let result = h.launcher.submit(&request).unwrap();
  assert_eq!((result.allocation.nodes, result.allocation.tasks), (2, 10));
  assert!(result.script.text.contains("#SBATCH -p mystery\n"));

  let mut request = serial_request(h.dir.path());
  request.queue = "mystery".to_string();
  assert!(h.launcher.submit(&request).is_ok());
}

#[test]
fn test_single_line_file_submits_serially() {
  let h = harness(Some(8), false);
  let mut request = list_request(h.dir.path(), "echo only\n");
  request.nodes = NonZeroU32::new(4);
  let result = h.launcher.submit(&request).unwrap();

  assert!(!result.allocation.parametric);
  assert_eq!((result.allocation.nodes, result.allocation.tasks), (1, 1));
  assert!(result.script.text.contains("set -x\necho only\nset +x\n"));
}
