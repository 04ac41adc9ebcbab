use std::path::PathBuf;

use crate::core::jobs::{JobError, TempFileFactory};

/// Parse time string in format "HH:MM:SS" or "D-HH:MM:SS" to seconds.
/// Hours may exceed 23 unless a day count is given, as sbatch allows.
pub fn parse_time_to_seconds(time_str: &str) -> Result<u64, JobError> {
  let invalid = || JobError::InvalidTimeFormat(time_str.to_string());

  // Split possible "D-" prefix
  let (days, time_part) = match time_str.split_once('-') {
    Some((d, t)) => (Some(parse_field(d).ok_or_else(invalid)?), t),
    None => (None, time_str),
  };

  let fields: Vec<&str> = time_part.split(':').collect();
  let [hours, minutes, seconds] = fields.as_slice() else {
    return Err(invalid());
  };
  let (hours, minutes, seconds) = match (
    parse_field(hours),
    parse_field(minutes),
    parse_field(seconds),
  ) {
    (Some(h), Some(m), Some(s)) if m < 60 && s < 60 => (h, m, s),
    _ => return Err(invalid()),
  };
  if days.is_some() && hours >= 24 {
    return Err(invalid());
  }

  Ok(days.unwrap_or(0) * 86_400 + hours * 3_600 + minutes * 60 + seconds)
}

fn parse_field(field: &str) -> Option<u64> {
  if field.is_empty() || !field.chars().all(|c| c.is_ascii_digit()) {
    return None;
  }
  field.parse().ok()
}

/// Creates `<job>_XXXXXX.slurm` files with unique names in `dir`.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalTempFactory {
  dir: PathBuf,
}

impl LocalTempFactory {
  pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
    LocalTempFactory { dir: dir.into() }
  }
}

impl TempFileFactory for LocalTempFactory {
  fn create(&self, job_name: &str) -> Result<PathBuf, JobError> {
    let (_, path) = tempfile::Builder::new()
      .prefix(&format!("{}_", job_name))
      .suffix(".slurm")
      .tempfile_in(&self.dir)?
      .keep()
      .map_err(|e| e.error)?;
    Ok(path)
  }
}
