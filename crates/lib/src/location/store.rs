//! Content-addressed cookbook store.
//!
//! Installed cookbooks live at `store_root/<name>-<sanitizedRevision>`,
//! keyed by revision rather than ref, so two locations resolving to the same
//! revision share one entry. An entry, if present, is always a complete,
//! previously validated copy: commits replace the whole directory and a
//! partial write is never left behind under an existing key.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::locks::KeyedLocks;

#[derive(Debug, Error)]
pub enum StoreError {
  #[error("failed to remove previous install at '{}': {source}", path.display())]
  RemovePrevious {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to copy '{}' into the store at '{}': {source}", from.display(), to.display())]
  Copy {
    from: PathBuf,
    to: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to walk '{}': {source}", path.display())]
  Walk {
    path: PathBuf,
    #[source]
    source: walkdir::Error,
  },

  #[error("failed to set permissions on '{}': {source}", path.display())]
  Permissions {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
}

/// The store of installed cookbooks.
#[derive(Debug)]
pub struct Store {
  root: PathBuf,
  locks: KeyedLocks,
}

impl Store {
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self {
      root: root.into(),
      locks: KeyedLocks::new(),
    }
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  /// The entry path for `(name, sanitized_revision)`.
  pub fn install_path(&self, name: &str, sanitized_revision: &str) -> PathBuf {
    self.root.join(format!("{name}-{sanitized_revision}"))
  }

  /// Whether a complete install exists for this key.
  pub fn contains(&self, name: &str, sanitized_revision: &str) -> bool {
    self.install_path(name, sanitized_revision).is_dir()
  }

  /// Mutex serializing commits to one store key.
  pub fn key_lock(&self, name: &str, sanitized_revision: &str) -> Arc<Mutex<()>> {
    self.locks.get(&format!("{name}-{sanitized_revision}"))
  }

  /// Replace the entry for `(name, sanitized_revision)` with a copy of
  /// `source`.
  ///
  /// Any previous entry is removed first, then the working copy is
  /// deep-copied in with the tool's `control_dir` stripped, and the entry is
  /// made world-usable modulo the process umask since a different user may
  /// load it. Interleaved commits to the same key are serialized.
  pub fn commit(
    &self,
    source: &Path,
    name: &str,
    sanitized_revision: &str,
    control_dir: &str,
  ) -> Result<PathBuf, StoreError> {
    let dest = self.install_path(name, sanitized_revision);

    let key = self.key_lock(name, sanitized_revision);
    let _guard = key.lock().unwrap();

    if dest.exists() {
      debug!(path = %dest.display(), "removing previous install");
      fs::remove_dir_all(&dest).map_err(|e| StoreError::RemovePrevious {
        path: dest.clone(),
        source: e,
      })?;
    }

    copy_tree(source, &dest, control_dir)?;
    set_install_permissions(&dest)?;

    info!(name, path = %dest.display(), "installed into store");
    Ok(dest)
  }
}

/// Deep-copy `from` into `to`, skipping the VCS control subtree.
fn copy_tree(from: &Path, to: &Path, control_dir: &str) -> Result<(), StoreError> {
  let copy_err = |source: std::io::Error| StoreError::Copy {
    from: from.to_path_buf(),
    to: to.to_path_buf(),
    source,
  };

  let walker = WalkDir::new(from)
    .into_iter()
    .filter_entry(|entry| entry.file_name().to_string_lossy() != control_dir);

  for entry in walker {
    let entry = entry.map_err(|e| StoreError::Walk {
      path: from.to_path_buf(),
      source: e,
    })?;
    let Ok(relative) = entry.path().strip_prefix(from) else {
      continue;
    };
    let dest = to.join(relative);

    let file_type = entry.file_type();
    if file_type.is_dir() {
      fs::create_dir_all(&dest).map_err(copy_err)?;
    } else if file_type.is_symlink() {
      copy_link(entry.path(), &dest).map_err(copy_err)?;
    } else {
      fs::copy(entry.path(), &dest).map_err(copy_err)?;
    }
  }

  Ok(())
}

#[cfg(unix)]
fn copy_link(from: &Path, to: &Path) -> std::io::Result<()> {
  let target = fs::read_link(from)?;
  std::os::unix::fs::symlink(target, to)
}

#[cfg(not(unix))]
fn copy_link(from: &Path, to: &Path) -> std::io::Result<()> {
  fs::copy(from, to).map(|_| ())
}

/// World-usable modulo the process umask.
#[cfg(unix)]
fn set_install_permissions(path: &Path) -> Result<(), StoreError> {
  use std::os::unix::fs::PermissionsExt;

  use rustix::fs::Mode;
  use rustix::process::umask;

  // There is no read-only umask accessor; set and restore.
  let mask = umask(Mode::empty());
  umask(mask);

  let mode = 0o777 & !u32::from(mask.bits());
  fs::set_permissions(path, fs::Permissions::from_mode(mode)).map_err(|e| {
    StoreError::Permissions {
      path: path.to_path_buf(),
      source: e,
    }
  })
}

#[cfg(not(unix))]
fn set_install_permissions(_path: &Path) -> Result<(), StoreError> {
  Ok(())
}
