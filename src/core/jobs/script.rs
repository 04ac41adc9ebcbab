use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};

use crate::core::jobs::{Compiler, JobCommands, ResolvedAllocation, SubmissionRequest};

/// A rendered control file and where it was written.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedScript {
  pub path: PathBuf,
  pub text: String,
}

/// Everything the renderer needs, resolved up front so rendering is pure.
pub struct ScriptContext<'a> {
  pub request: &'a SubmissionRequest,
  pub commands: &'a JobCommands,
  pub allocation: &'a ResolvedAllocation,
  /// Explicit working directory, or the directory the tool was run from.
  pub working_dir: &'a Path,
  pub created: DateTime<Local>,
}

pub fn render_script(ctx: &ScriptContext) -> String {
  let mut script = String::new();
  add_header(&mut script, ctx);
  add_directives(&mut script, ctx);
  add_environment(&mut script, ctx);
  add_start_banner(&mut script, ctx);
  match ctx.commands {
    JobCommands::Single(command) => add_single_command(&mut script, ctx, command),
    JobCommands::List { path, .. } => add_launcher(&mut script, ctx, path),
  }
  add_end_banner(&mut script);
  script
}

fn add_header(script: &mut String, ctx: &ScriptContext) {
  script.push_str("#!/bin/bash\n#\n");
  script.push_str("# SLURM control file automatically created by ezlaunch\n#\n");
  script.push_str(&format!(
    "# Created on: {}\n",
    ctx.created.format("%Y-%m-%d %H:%M:%S%.6f")
  ));
  match ctx.commands {
    JobCommands::Single(command) => {
      // Every line must stay a comment or sbatch stops reading directives
      let mut lines = command.lines();
      script.push_str(&format!(
        "# Launching single command: {}\n",
        lines.next().unwrap_or_default()
      ));
      for line in lines {
        script.push_str(&format!("# {}\n", line));
      }
      script.push_str("#\n");
    }
    JobCommands::List { path, .. } => {
      script.push_str(&format!(
        "# Using parametric launcher with control file: {}\n#\n",
        path.display()
      ));
    }
  }
}

fn add_directives(script: &mut String, ctx: &ScriptContext) {
  let request = ctx.request;
  script.push_str(&format!("#SBATCH -N {}\n", ctx.allocation.nodes));
  script.push_str(&format!("#SBATCH -n {}\n", ctx.allocation.tasks));
  if let Some(dir) = &request.working_dir {
    script.push_str(&format!("#SBATCH -D {}\n", dir.display()));
  }
  script.push_str(&format!("#SBATCH -J {}\n", request.job_name));
  match &request.output {
    Some(output) => script.push_str(&format!("#SBATCH -o {}\n", output)),
    None => script.push_str(&format!("#SBATCH -o {}.o%j\n", request.job_name)),
  }
  script.push_str(&format!("#SBATCH -p {}\n", request.queue));
  script.push_str(&format!("#SBATCH -t {}\n", request.runtime));
  if let Some(hold) = request.hold {
    script.push_str(&format!("#SBATCH -d afterok:{}\n", hold));
  }
  if let Some(project) = &request.project {
    script.push_str(&format!("#SBATCH -A {}\n", project));
  }
  if let Some(email) = &request.email {
    script.push_str("#SBATCH --mail-type=ALL\n");
    script.push_str(&format!("#SBATCH --mail-user={}\n", email));
  }
}

fn add_environment(script: &mut String, ctx: &ScriptContext) {
  script.push_str("\numask 2\n\n");
  if ctx.request.compiler == Compiler::Gcc {
    script.push_str("module swap intel gcc\n");
  }
  if ctx.request.remora.is_some() {
    script.push_str("module load remora\n");
  }
  if let Some(threads) = ctx.request.threads {
    script.push_str(&format!(
      "export ITK_GLOBAL_DEFAULT_NUMBER_OF_THREADS={}\n",
      threads
    ));
  }
}

fn add_start_banner(script: &mut String, ctx: &ScriptContext) {
  script.push_str("echo \" Starting at $(date)\"\n");
  script.push_str("start=$(date +%s)\n");
  script.push_str(&format!(
    "echo \" WORKING DIR: {}/\"\n",
    ctx.working_dir.display()
  ));
  script.push_str("echo \" JOB ID:      $SLURM_JOB_ID\"\n");
  script.push_str("echo \" JOB NAME:    $SLURM_JOB_NAME\"\n");
  script.push_str("echo \" NODES:       $SLURM_NODELIST\"\n");
  script.push_str("echo \" N NODES:     $SLURM_NNODES\"\n");
  script.push_str("echo \" N TASKS:     $SLURM_NTASKS\"\n");
}

fn add_single_command(script: &mut String, ctx: &ScriptContext, command: &str) {
  script.push_str("set -x\n");
  match &ctx.request.remora {
    Some(_) => script.push_str(&format!("remora {}\n", command)),
    None => script.push_str(&format!("{}\n", command)),
  }
  script.push_str("set +x\n");
  if let Some(dest) = &ctx.request.remora {
    script.push_str(&format!(
      "mv {}/remora_$SLURM_JOB_ID {}\n",
      ctx.working_dir.display(),
      dest.display()
    ));
  }
}

fn add_launcher(script: &mut String, ctx: &ScriptContext, command_file: &Path) {
  script.push_str(&format!("export LAUNCHER_SCHED={}\n", ctx.request.schedule));
  script.push_str(&format!(
    "export LAUNCHER_JOB_FILE={}\n",
    command_file.display()
  ));
  script.push_str(&format!(
    "export LAUNCHER_WORKDIR={}\n",
    ctx.working_dir.display()
  ));
  script.push_str("$LAUNCHER_DIR/paramrun\n");
}

fn add_end_banner(script: &mut String) {
  script.push_str("echo \" \"\necho \" Job complete at $(date)\"\necho \" \"\n");
  script.push_str("finish=$(date +%s)\n");
  script.push_str(concat!(
    "printf \"Job duration: %02d:%02d:%02d (%d s)\\n\" ",
    "$(((finish-start)/3600)) $(((finish-start)%3600/60)) ",
    "$(((finish-start)%60)) $((finish-start))\n"
  ));
}
