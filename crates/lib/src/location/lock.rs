//! The durable record a lockfile persists for a fetched location.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A pinned location entry.
///
/// Written once a location has resolved, so a later run can reconstruct the
/// exact same fetch without re-resolving a floating ref. Field order in the
/// rendered block is stable: kind tag, then revision, then ref.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockEntry {
  /// Source-kind tag ("bzr", "git", ...) the entry is keyed under.
  pub kind: String,

  /// The source URI.
  pub uri: String,

  /// The resolved immutable revision.
  pub revision: String,

  /// The requested ref; omitted when the dependency declared none.
  #[serde(rename = "ref", skip_serializing_if = "Option::is_none")]
  pub reference: Option<String>,
}

impl fmt::Display for LockEntry {
  /// The `key: value` block the lockfile writer embeds under a dependency
  /// heading, four-space indented.
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    writeln!(f, "    {}: {}", self.kind, self.uri)?;
    writeln!(f, "    revision: {}", self.revision)?;
    if let Some(reference) = &self.reference {
      writeln!(f, "    ref: {reference}")?;
    }
    Ok(())
  }
}
