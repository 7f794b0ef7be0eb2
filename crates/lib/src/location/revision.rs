//! Pinning a working copy to an immutable revision id.
//!
//! The resolver describes the state actually checked out in the cache
//! directory, not the branch tip, so a later install of the pinned revision
//! reproduces exactly what was validated. The resolved id is opaque to the
//! pipeline apart from store-key sanitization.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use super::runner::{CommandFailed, CommandRunner, RunnerError, render_command};

#[derive(Debug, Error)]
pub enum RevisionError {
  #[error(transparent)]
  Runner(#[from] RunnerError),

  #[error(transparent)]
  Failed(#[from] CommandFailed),

  /// The tool output held no revision marker. Never swallowed; an absent id
  /// would corrupt the store key.
  #[error(
    "unable to find a revision id in '{command}' output for '{}'",
    cache_path.display()
  )]
  Unresolvable { command: String, cache_path: PathBuf },
}

/// Resolve the revision currently checked out in `cache_dir`.
pub fn resolve(runner: &CommandRunner, cache_dir: &Path) -> Result<String, RevisionError> {
  let kind = runner.kind();
  let args = kind.revision_args();
  let output = runner.run(Some(cache_dir), &args)?;
  let command = render_command(kind.command_name(), &args);

  if !output.success() {
    return Err(
      CommandFailed {
        command,
        cache_path: cache_dir.to_path_buf(),
        output: output.combined(),
      }
      .into(),
    );
  }

  let revision = kind
    .parse_revision(&output.stdout)
    .ok_or_else(|| RevisionError::Unresolvable {
      command,
      cache_path: cache_dir.to_path_buf(),
    })?;

  debug!(rev = %revision, path = %cache_dir.display(), "resolved checked-out revision");
  Ok(revision)
}

/// Make a revision id safe for use in a store directory name.
///
/// Bazaar revision ids embed `-`, the separator between cookbook name and
/// revision in store paths; substitute it so the key stays unambiguous. The
/// substitution is deterministic, so repeated installs of one revision agree.
pub fn sanitize(revision: &str) -> String {
  revision.replace('-', "_")
}
