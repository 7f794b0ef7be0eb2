//! Interfaces consumed from the artifact-format layer.
//!
//! The location pipeline does not understand cookbook metadata. It asks a
//! [`Validator`] to vet a fetched working copy before promotion to the store,
//! and hands back an [`Artifact`] loaded from the installed path. The real
//! implementations live with the cookbook-format code; tests plug in
//! closures.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// A fetched directory that is not a well-formed cookbook.
///
/// Fatal for the fetch; the cache directory is left intact for inspection.
#[derive(Debug, Error)]
#[error("'{}' is not a valid cookbook: {reason}", path.display())]
pub struct InvalidArtifact {
  pub path: PathBuf,
  pub reason: String,
}

impl InvalidArtifact {
  pub fn new(path: &Path, reason: impl Into<String>) -> Self {
    Self {
      path: path.to_path_buf(),
      reason: reason.into(),
    }
  }
}

/// Checks that a directory holds a well-formed cookbook.
///
/// Always called against the cache directory, never the store, so an invalid
/// fetch can never displace a previously good install.
pub trait Validator {
  fn validate(&self, dir: &Path) -> Result<(), InvalidArtifact>;
}

impl<F> Validator for F
where
  F: Fn(&Path) -> Result<(), InvalidArtifact>,
{
  fn validate(&self, dir: &Path) -> Result<(), InvalidArtifact> {
    self(dir)
  }
}

/// A validator that accepts any directory.
///
/// Stands in when the artifact-format layer is not wired up.
pub fn accept_all(_dir: &Path) -> Result<(), InvalidArtifact> {
  Ok(())
}

/// Handle to an installed cookbook, owned by the dependency resolver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
  name: String,
  path: PathBuf,
}

impl Artifact {
  /// Load the artifact installed at `path`.
  pub fn load_from_path(name: &str, path: &Path) -> Result<Self, InvalidArtifact> {
    if !path.is_dir() {
      return Err(InvalidArtifact::new(path, "install directory is missing"));
    }
    Ok(Self {
      name: name.to_string(),
      path: path.to_path_buf(),
    })
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn path(&self) -> &Path {
    &self.path
  }
}
