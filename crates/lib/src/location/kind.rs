//! The closed set of supported version-control tools.
//!
//! Each variant supplies only its command syntax and output-parsing
//! patterns. The pipeline itself (cache, resolve, install) is shared; nothing
//! here touches the filesystem or spawns a process.

use std::fmt;

/// A version-control tool a location can fetch from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VcsKind {
  Bazaar,
  Mercurial,
  Git,
  Subversion,
}

/// How a tool reports which upstream a working copy tracks.
///
/// Only tools whose working copies can silently follow a moved alias need
/// one; the staleness check compares the cached identity against the live
/// URI's identity before refreshing.
#[derive(Debug, Clone, Copy)]
pub struct UpstreamProbe {
  /// argv run inside the working copy for the cached identity.
  pub local_args: &'static [&'static str],
  /// argv run against the live URI (the URI is appended).
  pub remote_args: &'static [&'static str],
  /// Marker prefixes whose trailing text is the identity; first match wins.
  pub markers: &'static [&'static str],
}

impl UpstreamProbe {
  /// Extract the upstream identity from a tool's output.
  pub fn parse(&self, output: &str) -> Option<String> {
    for marker in self.markers {
      for line in output.lines() {
        if let Some(rest) = line.trim_start().strip_prefix(marker) {
          let rest = rest.trim();
          if !rest.is_empty() {
            return Some(rest.to_string());
          }
        }
      }
    }
    None
  }
}

impl VcsKind {
  /// The executable looked up on PATH.
  pub fn command_name(&self) -> &'static str {
    match self {
      VcsKind::Bazaar => "bzr",
      VcsKind::Mercurial => "hg",
      VcsKind::Git => "git",
      VcsKind::Subversion => "svn",
    }
  }

  /// Short tag used for cache paths and lock entries.
  pub fn as_str(&self) -> &'static str {
    match self {
      VcsKind::Bazaar => "bzr",
      VcsKind::Mercurial => "hg",
      VcsKind::Git => "git",
      VcsKind::Subversion => "svn",
    }
  }

  /// The floating ref used when a dependency declares none.
  pub fn default_ref(&self) -> &'static str {
    match self {
      VcsKind::Bazaar => "last:",
      VcsKind::Mercurial => "default",
      VcsKind::Git => "HEAD",
      VcsKind::Subversion => "HEAD",
    }
  }

  /// The tool's control directory, stripped from installed copies.
  pub fn control_dir(&self) -> &'static str {
    match self {
      VcsKind::Bazaar => ".bzr",
      VcsKind::Mercurial => ".hg",
      VcsKind::Git => ".git",
      VcsKind::Subversion => ".svn",
    }
  }

  /// argv for a full fetch-and-checkout of `uri` into `dest`.
  pub fn branch_args(&self, uri: &str, dest: &str) -> Vec<String> {
    let verb = match self {
      VcsKind::Bazaar => "branch",
      VcsKind::Mercurial | VcsKind::Git => "clone",
      VcsKind::Subversion => "checkout",
    };
    vec![verb.to_string(), uri.to_string(), dest.to_string()]
  }

  /// argv for an incremental refresh of an existing working copy.
  pub fn refresh_args(&self) -> Vec<String> {
    match self {
      VcsKind::Bazaar | VcsKind::Mercurial => vec!["pull".to_string()],
      VcsKind::Git => vec!["fetch".to_string()],
      VcsKind::Subversion => vec!["update".to_string()],
    }
  }

  /// argv moving the working copy to `target` (a ref or a pinned revision).
  pub fn update_args(&self, target: &str) -> Vec<String> {
    match self {
      VcsKind::Bazaar | VcsKind::Mercurial | VcsKind::Subversion => {
        vec!["update".to_string(), "-r".to_string(), target.to_string()]
      }
      VcsKind::Git => vec!["checkout".to_string(), target.to_string()],
    }
  }

  /// argv emitting the strict revision descriptor for the checked-out state.
  ///
  /// This describes what is on disk, not the branch tip.
  pub fn revision_args(&self) -> Vec<String> {
    match self {
      VcsKind::Bazaar => vec!["testament".to_string(), "--strict".to_string()],
      VcsKind::Mercurial => vec![
        "identify".to_string(),
        "--debug".to_string(),
        "--id".to_string(),
      ],
      VcsKind::Git => vec!["rev-parse".to_string(), "HEAD".to_string()],
      VcsKind::Subversion => vec!["info".to_string()],
    }
  }

  /// Extract the revision id from [`Self::revision_args`] output.
  ///
  /// Returns `None` when the expected marker line is absent; callers turn
  /// that into a hard error since an empty revision would corrupt store keys.
  pub fn parse_revision(&self, output: &str) -> Option<String> {
    match self {
      VcsKind::Bazaar => parse_marker_line(output, "revision-id:"),
      VcsKind::Subversion => parse_marker_line(output, "Revision:"),
      VcsKind::Git => first_word(output),
      // `identify --id` may suffix '+' for a dirty working copy.
      VcsKind::Mercurial => first_word(output).map(|id| id.trim_end_matches('+').to_string()),
    }
  }

  /// The staleness probe, for tools whose URIs can be moving aliases.
  pub fn upstream_probe(&self) -> Option<UpstreamProbe> {
    match self {
      VcsKind::Bazaar => Some(UpstreamProbe {
        local_args: &["info"],
        remote_args: &["info"],
        markers: &["repository branch:", "parent branch:"],
      }),
      VcsKind::Subversion => Some(UpstreamProbe {
        local_args: &["info"],
        remote_args: &["info"],
        markers: &["URL:"],
      }),
      VcsKind::Mercurial | VcsKind::Git => None,
    }
  }
}

impl fmt::Display for VcsKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

fn parse_marker_line(output: &str, marker: &str) -> Option<String> {
  for line in output.lines() {
    if let Some(rest) = line.trim_start().strip_prefix(marker) {
      let rest = rest.trim();
      if !rest.is_empty() {
        return Some(rest.to_string());
      }
    }
  }
  None
}

fn first_word(output: &str) -> Option<String> {
  output.split_whitespace().next().map(str::to_string)
}

#[cfg(test)]
mod tests {
  use super::*;

  mod parse_revision {
    use super::*;

    #[test]
    fn bazaar_testament_marker() {
      let output = "bazaar testament version 3 strict\n\
                    revision-id: abc-def@host-20140320-r010\n\
                    committer: someone@example.com\n";
      assert_eq!(
        VcsKind::Bazaar.parse_revision(output),
        Some("abc-def@host-20140320-r010".to_string())
      );
    }

    #[test]
    fn bazaar_missing_marker_is_none() {
      assert_eq!(VcsKind::Bazaar.parse_revision("committer: x\n"), None);
      assert_eq!(VcsKind::Bazaar.parse_revision(""), None);
    }

    #[test]
    fn bazaar_empty_marker_is_none() {
      assert_eq!(VcsKind::Bazaar.parse_revision("revision-id:   \n"), None);
    }

    #[test]
    fn git_takes_first_word() {
      assert_eq!(
        VcsKind::Git.parse_revision("4c149e17e1e8725e0a7d3a1bc6d1b25d7d985dfc\n"),
        Some("4c149e17e1e8725e0a7d3a1bc6d1b25d7d985dfc".to_string())
      );
    }

    #[test]
    fn mercurial_strips_dirty_suffix() {
      assert_eq!(
        VcsKind::Mercurial.parse_revision("8580ff85d3e0+\n"),
        Some("8580ff85d3e0".to_string())
      );
    }

    #[test]
    fn subversion_revision_line() {
      let output = "Path: .\nURL: https://example.com/repo\nRevision: 1234\n";
      assert_eq!(
        VcsKind::Subversion.parse_revision(output),
        Some("1234".to_string())
      );
    }
  }

  mod upstream_probe {
    use super::*;

    #[test]
    fn bazaar_prefers_repository_branch() {
      let probe = VcsKind::Bazaar.upstream_probe().unwrap();
      let output = "Standalone tree (format: 2a)\n\
                    Location:\n\
                    repository branch: bzr+ssh://example.com/trunk\n\
                    parent branch: bzr+ssh://example.com/other\n";
      assert_eq!(
        probe.parse(output),
        Some("bzr+ssh://example.com/trunk".to_string())
      );
    }

    #[test]
    fn bazaar_falls_back_to_parent_branch() {
      let probe = VcsKind::Bazaar.upstream_probe().unwrap();
      let output = "Location:\n  parent branch: bzr+ssh://example.com/trunk\n";
      assert_eq!(
        probe.parse(output),
        Some("bzr+ssh://example.com/trunk".to_string())
      );
    }

    #[test]
    fn no_marker_is_none() {
      let probe = VcsKind::Bazaar.upstream_probe().unwrap();
      assert_eq!(probe.parse("Standalone tree\n"), None);
    }

    #[test]
    fn git_and_mercurial_have_no_probe() {
      assert!(VcsKind::Git.upstream_probe().is_none());
      assert!(VcsKind::Mercurial.upstream_probe().is_none());
    }
  }

  #[test]
  fn default_refs_are_floating() {
    assert_eq!(VcsKind::Bazaar.default_ref(), "last:");
    assert_eq!(VcsKind::Git.default_ref(), "HEAD");
  }

  #[test]
  fn branch_args_place_uri_then_dest() {
    let args = VcsKind::Bazaar.branch_args("https://example.com/repo", "/tmp/cache");
    assert_eq!(args, vec!["branch", "https://example.com/repo", "/tmp/cache"]);
  }
}
