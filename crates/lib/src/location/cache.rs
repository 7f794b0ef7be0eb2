//! Per-URI working copies of remote sources.
//!
//! The cache keeps exactly one working copy per distinct source URI at
//! `cache_root/<kind>/<hex(sha256(uri))>`, however many refs are requested
//! against it. The checked-out state is transient and rewritten by every
//! [`Cache::ensure`]; entries are deleted only when detected stale.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::kind::VcsKind;
use super::runner::{CommandFailed, CommandOutput, CommandRunner, RunnerError, render_command};
use crate::locks::KeyedLocks;

/// When to compare a cached working copy's upstream identity against the
/// live URI before refreshing.
///
/// An alias-style URI can move between underlying branches over time;
/// refreshing a copy of the old branch would silently serve stale content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StalenessPolicy {
  /// Probe only when the requested target is the tool's floating default
  /// ref, the case where an alias indirection is in play.
  #[default]
  AliasRefsOnly,
  /// Probe before every refresh.
  Always,
  /// Never probe; always refresh in place.
  Never,
}

#[derive(Debug, Clone, Default)]
pub struct CacheOptions {
  pub staleness: StalenessPolicy,
}

#[derive(Debug, Error)]
pub enum CacheError {
  #[error(transparent)]
  Runner(#[from] RunnerError),

  #[error(transparent)]
  Failed(#[from] CommandFailed),

  #[error("failed to create cache directory '{}': {source}", path.display())]
  CreateDir {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to remove stale cache '{}': {source}", path.display())]
  RemoveStale {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
}

/// On-disk cache of VCS working copies, one per source URI.
#[derive(Debug)]
pub struct Cache {
  root: PathBuf,
  locks: KeyedLocks,
}

impl Cache {
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self {
      root: root.into(),
      locks: KeyedLocks::new(),
    }
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  /// The working-copy directory for `uri`.
  pub fn dir(&self, kind: VcsKind, uri: &str) -> PathBuf {
    self.root.join(kind.as_str()).join(uri_digest(uri))
  }

  /// Mutex serializing ensure+resolve for one URI.
  ///
  /// Callers hold the guard across both steps so concurrent locations
  /// sharing a cache directory cannot interleave and observe a revision
  /// belonging to someone else's checkout.
  pub fn key_lock(&self, kind: VcsKind, uri: &str) -> Arc<Mutex<()>> {
    self.locks.get(&format!("{}:{uri}", kind.as_str()))
  }

  /// Bring the working copy for `uri` into existence, checked out at
  /// `target` (a ref or a pinned revision).
  ///
  /// Missing copies are created with a full fetch-and-checkout; existing
  /// ones are refreshed in place unless the staleness probe says the URI now
  /// points at a different upstream, in which case the copy is discarded and
  /// recreated. Either way the checked-out state reflects `target` exactly
  /// on return.
  pub fn ensure(
    &self,
    runner: &CommandRunner,
    uri: &str,
    target: &str,
    options: &CacheOptions,
  ) -> Result<PathBuf, CacheError> {
    // Fail on a missing tool before any path is touched.
    runner.ensure_installed()?;

    let kind = runner.kind();
    let dir = self.dir(kind, uri);

    let mut present = dir.exists();
    if present && self.is_stale(runner, uri, &dir, target, options)? {
      warn!(uri, path = %dir.display(), "cached copy tracks a different upstream; discarding");
      fs::remove_dir_all(&dir).map_err(|e| CacheError::RemoveStale {
        path: dir.clone(),
        source: e,
      })?;
      present = false;
    }

    if present {
      debug!(uri, path = %dir.display(), "refreshing cached working copy");
      self.run_in(runner, &dir, kind.refresh_args())?;
    } else {
      if let Some(parent) = dir.parent() {
        fs::create_dir_all(parent).map_err(|e| CacheError::CreateDir {
          path: parent.to_path_buf(),
          source: e,
        })?;
      }
      info!(uri, path = %dir.display(), "fetching working copy");
      let args = kind.branch_args(uri, &dir.to_string_lossy());
      let output = runner.run(None, &args)?;
      check(kind, &args, &dir, output)?;
    }

    // Both paths end with a targeted update so a later resolve against this
    // directory describes `target`, not whatever was checked out before.
    self.run_in(runner, &dir, kind.update_args(target))?;

    Ok(dir)
  }

  fn run_in(
    &self,
    runner: &CommandRunner,
    dir: &Path,
    args: Vec<String>,
  ) -> Result<CommandOutput, CacheError> {
    let output = runner.run(Some(dir), &args)?;
    check(runner.kind(), &args, dir, output)
  }

  /// Compare the cached copy's upstream identity with the live URI's.
  fn is_stale(
    &self,
    runner: &CommandRunner,
    uri: &str,
    dir: &Path,
    target: &str,
    options: &CacheOptions,
  ) -> Result<bool, CacheError> {
    let kind = runner.kind();
    let Some(probe) = kind.upstream_probe() else {
      return Ok(false);
    };

    let applies = match options.staleness {
      StalenessPolicy::Never => false,
      StalenessPolicy::Always => true,
      StalenessPolicy::AliasRefsOnly => target == kind.default_ref(),
    };
    if !applies {
      return Ok(false);
    }

    let local_args: Vec<String> = probe.local_args.iter().map(|s| s.to_string()).collect();
    let cached = self.run_in(runner, dir, local_args)?;

    let mut remote_args: Vec<String> = probe.remote_args.iter().map(|s| s.to_string()).collect();
    remote_args.push(uri.to_string());
    let live = runner.run(None, &remote_args)?;
    let live = check(kind, &remote_args, dir, live)?;

    let cached_id = probe.parse(&cached.stdout);
    let live_id = probe.parse(&live.stdout);
    debug!(uri, ?cached_id, ?live_id, "upstream identity probe");
    Ok(cached_id != live_id)
  }
}

fn check(
  kind: VcsKind,
  args: &[String],
  dir: &Path,
  output: CommandOutput,
) -> Result<CommandOutput, CacheError> {
  if output.success() {
    Ok(output)
  } else {
    Err(
      CommandFailed {
        command: render_command(kind.command_name(), args),
        cache_path: dir.to_path_buf(),
        output: output.combined(),
      }
      .into(),
    )
  }
}

fn uri_digest(uri: &str) -> String {
  let mut hasher = Sha256::new();
  hasher.update(uri.as_bytes());
  hex::encode(hasher.finalize())
}
