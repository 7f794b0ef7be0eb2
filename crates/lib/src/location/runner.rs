//! Subprocess invocation of the external VCS tool.
//!
//! All remote access goes through the tool's own binary; this crate speaks no
//! network protocol itself. Invocations are synchronous and block the calling
//! thread until the tool exits.

use std::path::{Path, PathBuf};
use std::process::Command;

use thiserror::Error;
use tracing::debug;

use super::kind::VcsKind;

/// The tool binary could not be located or spawned.
#[derive(Debug, Error)]
pub enum RunnerError {
  /// The binary is absent from PATH. Fatal; never retried.
  #[error(
    "the '{tool}' executable was not found on PATH. Install {tool} before \
     fetching cookbooks from {kind} repositories"
  )]
  NotInstalled {
    kind: &'static str,
    tool: &'static str,
  },

  /// The process could not be spawned or its output collected.
  #[error("failed to run '{command}': {source}")]
  Spawn {
    command: String,
    #[source]
    source: std::io::Error,
  },
}

/// A tool invocation that exited non-zero.
///
/// Carries everything an operator needs: the failing command, the cache
/// directory to remove if the failure persists, and the captured output.
#[derive(Debug, Error)]
#[error(
  "command '{command}' failed. If this error persists, try removing the \
   cache directory at '{}'. Output from the command:\n{output}",
  cache_path.display()
)]
pub struct CommandFailed {
  pub command: String,
  pub cache_path: PathBuf,
  pub output: String,
}

/// Captured result of one tool invocation.
#[derive(Debug, Clone)]
pub struct CommandOutput {
  /// Exit code, if the process exited normally.
  pub status: Option<i32>,
  pub stdout: String,
  pub stderr: String,
}

impl CommandOutput {
  pub fn success(&self) -> bool {
    self.status == Some(0)
  }

  /// Both streams joined; tools put diagnostics on either one.
  pub fn combined(&self) -> String {
    let mut out = self.stdout.trim_end().to_string();
    let stderr = self.stderr.trim_end();
    if !stderr.is_empty() {
      if !out.is_empty() {
        out.push('\n');
      }
      out.push_str(stderr);
    }
    out
  }
}

/// Runs one tool's commands as subprocesses.
#[derive(Debug, Clone, Copy)]
pub struct CommandRunner {
  kind: VcsKind,
}

impl CommandRunner {
  pub fn new(kind: VcsKind) -> Self {
    Self { kind }
  }

  pub fn kind(&self) -> VcsKind {
    self.kind
  }

  /// Check the tool is present on PATH without invoking it.
  ///
  /// Used to fail before any filesystem path has been touched.
  pub fn ensure_installed(&self) -> Result<(), RunnerError> {
    let tool = self.kind.command_name();
    which::which(tool)
      .map(|_| ())
      .map_err(|_| RunnerError::NotInstalled {
        kind: self.kind.as_str(),
        tool,
      })
  }

  /// Run the tool with `args`, optionally inside `cwd`.
  ///
  /// A non-zero exit is not an error here; callers decide what failure
  /// means. Binary presence is re-checked on every call since PATH can
  /// change over the life of the process.
  pub fn run(&self, cwd: Option<&Path>, args: &[String]) -> Result<CommandOutput, RunnerError> {
    let tool = self.kind.command_name();
    let binary = which::which(tool).map_err(|_| RunnerError::NotInstalled {
      kind: self.kind.as_str(),
      tool,
    })?;

    debug!(tool, ?args, cwd = ?cwd, "invoking vcs tool");

    let mut command = Command::new(binary);
    command.args(args);
    if let Some(dir) = cwd {
      command.current_dir(dir);
    }

    let output = command.output().map_err(|e| RunnerError::Spawn {
      command: render_command(tool, args),
      source: e,
    })?;

    Ok(CommandOutput {
      status: output.status.code(),
      stdout: String::from_utf8_lossy(&output.stdout).to_string(),
      stderr: String::from_utf8_lossy(&output.stderr).to_string(),
    })
  }
}

/// Human-readable command line carried in errors.
pub fn render_command(tool: &str, args: &[String]) -> String {
  let mut out = String::from(tool);
  for arg in args {
    out.push(' ');
    out.push_str(arg);
  }
  out
}
