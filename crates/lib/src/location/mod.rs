//! Cookbook source locations: fetch, pin, validate, install.
//!
//! A [`Location`] describes one declared dependency source (VCS kind, URI,
//! requested ref) and drives the pipeline that turns it into an installed
//! artifact:
//!
//! 1. Fast path: a pinned revision already present in the store is returned
//!    with zero VCS work.
//! 2. [`Cache::ensure`] brings the per-URI working copy to the target ref.
//! 3. The checked-out state is resolved to an immutable revision, once per
//!    location lifetime.
//! 4. The cache copy is validated; a bad fetch never reaches the store.
//! 5. [`Store::commit`] replaces the entry for `(name, revision)`.
//!
//! # Modules
//!
//! - [`kind`] - the closed set of supported VCS tools
//! - [`runner`] - subprocess invocation
//! - [`revision`] - revision resolution and store-key sanitization
//! - [`cache`] - per-URI working copies
//! - [`store`] - the content-addressed install destination
//! - [`lock`] - the durable lock entry

pub mod cache;
pub mod kind;
pub mod lock;
pub mod revision;
pub mod runner;
pub mod store;

pub use cache::{Cache, CacheError, CacheOptions, StalenessPolicy};
pub use kind::{UpstreamProbe, VcsKind};
pub use lock::LockEntry;
pub use revision::RevisionError;
pub use runner::{CommandFailed, CommandOutput, CommandRunner, RunnerError};
pub use store::{Store, StoreError};

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;
use tracing::{debug, info};

use crate::artifact::{Artifact, InvalidArtifact, Validator};

/// Whether a location has been pinned to an immutable revision.
///
/// A location is effectively immutable after construction except for the one
/// transition from `Unresolved` to `Resolved`, made by a successful
/// `install`/`download`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevisionPin {
  /// Never fetched; only the floating ref is known.
  Unresolved,
  /// Pinned. The revision is a stable, tool-assigned identifier, never a
  /// floating ref, and this location will not resolve again.
  Resolved { revision: String },
}

impl RevisionPin {
  pub fn revision(&self) -> Option<&str> {
    match self {
      RevisionPin::Unresolved => None,
      RevisionPin::Resolved { revision } => Some(revision),
    }
  }

  pub fn is_resolved(&self) -> bool {
    matches!(self, RevisionPin::Resolved { .. })
  }
}

/// Any failure in the install/download pipeline.
///
/// Every variant aborts the whole call; nothing is downgraded to a log line.
/// A failed fetch never leaves a partial store entry and never moves the pin.
#[derive(Debug, Error)]
pub enum LocationError {
  #[error(transparent)]
  Cache(#[from] CacheError),

  #[error(transparent)]
  Revision(#[from] RevisionError),

  #[error(transparent)]
  Store(#[from] StoreError),

  #[error(transparent)]
  InvalidArtifact(#[from] InvalidArtifact),
}

/// One declared dependency source and its pin state.
#[derive(Debug, Clone)]
pub struct Location {
  name: String,
  kind: VcsKind,
  uri: String,
  reference: String,
  explicit_ref: bool,
  pin: RevisionPin,
}

impl Location {
  /// Declare a location for dependency `name` at `uri`.
  ///
  /// With no `reference` the tool's floating default is requested.
  pub fn new(
    name: impl Into<String>,
    kind: VcsKind,
    uri: impl Into<String>,
    reference: Option<&str>,
  ) -> Self {
    Self {
      name: name.into(),
      kind,
      uri: uri.into(),
      explicit_ref: reference.is_some(),
      reference: reference
        .map(str::to_string)
        .unwrap_or_else(|| kind.default_ref().to_string()),
      pin: RevisionPin::Unresolved,
    }
  }

  /// Recreate a location from a lock entry's pinned revision.
  pub fn pinned(
    name: impl Into<String>,
    kind: VcsKind,
    uri: impl Into<String>,
    reference: Option<&str>,
    revision: impl Into<String>,
  ) -> Self {
    let mut location = Self::new(name, kind, uri, reference);
    location.pin = RevisionPin::Resolved {
      revision: revision.into(),
    };
    location
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn kind(&self) -> VcsKind {
    self.kind
  }

  pub fn uri(&self) -> &str {
    &self.uri
  }

  pub fn reference(&self) -> &str {
    &self.reference
  }

  pub fn pin(&self) -> &RevisionPin {
    &self.pin
  }

  pub fn revision(&self) -> Option<&str> {
    self.pin.revision()
  }

  /// The store path this location installs to, once its revision is known.
  pub fn install_path(&self, store: &Store) -> Option<PathBuf> {
    self
      .revision()
      .map(|rev| store.install_path(&self.name, &revision::sanitize(rev)))
  }

  /// Whether the pinned revision is already present in the store.
  pub fn installed(&self, store: &Store) -> bool {
    self
      .install_path(store)
      .is_some_and(|path| path.is_dir())
  }

  /// Run the full pipeline and load the installed artifact.
  pub fn install<V: Validator>(
    &mut self,
    cache: &Cache,
    store: &Store,
    options: &CacheOptions,
    validator: &V,
  ) -> Result<Artifact, LocationError> {
    let installed = self.download(cache, store, options, validator)?;
    Ok(Artifact::load_from_path(&self.name, &installed)?)
  }

  /// Fetch, pin, validate and commit; returns the installed path.
  ///
  /// Repeated calls for an already-installed revision are a no-op that
  /// performs zero VCS subprocess invocations.
  pub fn download<V: Validator>(
    &mut self,
    cache: &Cache,
    store: &Store,
    options: &CacheOptions,
    validator: &V,
  ) -> Result<PathBuf, LocationError> {
    if let RevisionPin::Resolved { revision } = &self.pin {
      let sanitized = revision::sanitize(revision);
      if store.contains(&self.name, &sanitized) {
        debug!(name = %self.name, rev = %revision, "already installed; skipping fetch");
        return Ok(store.install_path(&self.name, &sanitized));
      }
    }

    let runner = CommandRunner::new(self.kind);

    // The per-URI lock is held across ensure+resolve so two locations
    // sharing a cache directory cannot interleave a checkout between the
    // other's update and resolve.
    let uri_lock = cache.key_lock(self.kind, &self.uri);
    let (cache_dir, revision) = {
      let _guard = uri_lock.lock().unwrap();
      let target = self.pin.revision().unwrap_or(&self.reference).to_string();
      let cache_dir = cache.ensure(&runner, &self.uri, &target, options)?;
      let revision = match &self.pin {
        RevisionPin::Resolved { revision } => revision.clone(),
        RevisionPin::Unresolved => revision::resolve(&runner, &cache_dir)?,
      };
      (cache_dir, revision)
    };

    // Validate the cache copy, never the store copy: on rejection the store
    // keeps whatever good entry it had, and the cache stays on disk for
    // inspection.
    validator.validate(&cache_dir)?;

    let installed = store.commit(
      &cache_dir,
      &self.name,
      &revision::sanitize(&revision),
      self.kind.control_dir(),
    )?;

    info!(name = %self.name, rev = %revision, path = %installed.display(), "location installed");
    self.pin = RevisionPin::Resolved { revision };
    Ok(installed)
  }

  /// The lock entry recorded for this location.
  ///
  /// The ref line is carried only when the dependency declared one
  /// explicitly; the revision is empty until a fetch has resolved.
  pub fn lock_entry(&self) -> LockEntry {
    LockEntry {
      kind: self.kind.as_str().to_string(),
      uri: self.uri.clone(),
      revision: self.revision().unwrap_or_default().to_string(),
      reference: self.explicit_ref.then(|| self.reference.clone()),
    }
  }
}

/// Identity: kind, URI, requested ref, and pin. Two locations differing only
/// in pinned revision are not interchangeable. The dependency name is not
/// identity; it keys the store, not the source.
impl PartialEq for Location {
  fn eq(&self, other: &Self) -> bool {
    self.kind == other.kind
      && self.uri == other.uri
      && self.reference == other.reference
      && self.pin == other.pin
  }
}

impl Eq for Location {}

impl fmt::Display for Location {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} (at ref: {})", self.uri, self.reference)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  mod identity {
    use super::*;

    #[test]
    fn equal_when_uri_and_ref_match() {
      let a = Location::new("one", VcsKind::Bazaar, "https://example.com/repo", Some("tip"));
      let b = Location::new("two", VcsKind::Bazaar, "https://example.com/repo", Some("tip"));
      assert_eq!(a, b);
    }

    #[test]
    fn unequal_on_different_ref() {
      let a = Location::new("c", VcsKind::Bazaar, "https://example.com/repo", Some("tip"));
      let b = Location::new("c", VcsKind::Bazaar, "https://example.com/repo", Some("branch-x"));
      assert_ne!(a, b);
    }

    #[test]
    fn unequal_on_different_uri() {
      let a = Location::new("c", VcsKind::Bazaar, "https://example.com/a", Some("tip"));
      let b = Location::new("c", VcsKind::Bazaar, "https://example.com/b", Some("tip"));
      assert_ne!(a, b);
    }

    #[test]
    fn unequal_on_different_kind() {
      let a = Location::new("c", VcsKind::Bazaar, "https://example.com/repo", Some("tip"));
      let b = Location::new("c", VcsKind::Git, "https://example.com/repo", Some("tip"));
      assert_ne!(a, b);
    }

    #[test]
    fn pin_is_part_of_identity() {
      let floating = Location::new("c", VcsKind::Bazaar, "https://example.com/repo", Some("tip"));
      let pinned = Location::pinned(
        "c",
        VcsKind::Bazaar,
        "https://example.com/repo",
        Some("tip"),
        "r-0001",
      );
      assert_ne!(floating, pinned);
    }
  }

  mod construction {
    use super::*;

    #[test]
    fn defaults_to_the_kinds_floating_ref() {
      let location = Location::new("c", VcsKind::Bazaar, "https://example.com/repo", None);
      assert_eq!(location.reference(), "last:");
      assert!(!location.pin().is_resolved());
    }

    #[test]
    fn pinned_locations_start_resolved() {
      let location = Location::pinned(
        "c",
        VcsKind::Bazaar,
        "https://example.com/repo",
        None,
        "r-0001",
      );
      assert_eq!(location.revision(), Some("r-0001"));
    }

    #[test]
    fn display_shows_uri_and_ref() {
      let location = Location::new("c", VcsKind::Bazaar, "https://example.com/repo", Some("tip"));
      assert_eq!(
        location.to_string(),
        "https://example.com/repo (at ref: tip)"
      );
    }
  }

  mod lock_entries {
    use super::*;

    #[test]
    fn carries_kind_uri_revision_and_ref() {
      let location = Location::pinned(
        "c",
        VcsKind::Bazaar,
        "https://example.com/repo",
        Some("tip"),
        "r-0001",
      );
      let entry = location.lock_entry();
      assert_eq!(entry.kind, "bzr");
      assert_eq!(entry.uri, "https://example.com/repo");
      assert_eq!(entry.revision, "r-0001");
      assert_eq!(entry.reference.as_deref(), Some("tip"));
    }

    #[test]
    fn omits_ref_when_not_declared() {
      let location = Location::new("c", VcsKind::Bazaar, "https://example.com/repo", None);
      assert_eq!(location.lock_entry().reference, None);
    }
  }

  mod store_paths {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn install_path_uses_the_sanitized_revision() {
      let temp = TempDir::new().unwrap();
      let store = Store::new(temp.path());
      let location = Location::pinned(
        "mycookbook",
        VcsKind::Bazaar,
        "https://example.com/repo",
        None,
        "r-0001",
      );
      let path = location.install_path(&store).unwrap();
      assert!(path.ends_with("mycookbook-r_0001"));
      assert!(!location.installed(&store));
    }

    #[test]
    fn unresolved_locations_have_no_install_path() {
      let temp = TempDir::new().unwrap();
      let store = Store::new(temp.path());
      let location = Location::new("mycookbook", VcsKind::Bazaar, "https://example.com/repo", None);
      assert_eq!(location.install_path(&store), None);
    }
  }
}
