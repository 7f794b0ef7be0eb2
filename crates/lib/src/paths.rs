//! Filesystem roots for the working-copy cache and the cookbook store.

use std::path::{Path, PathBuf};

use crate::consts::APP_NAME;

/// Returns the user's home directory
#[cfg(windows)]
pub fn home_dir() -> PathBuf {
  let userprofile = std::env::var("USERPROFILE").expect("USERPROFILE not set");
  PathBuf::from(userprofile)
}

/// Returns the user's home directory
#[cfg(not(windows))]
pub fn home_dir() -> PathBuf {
  let home = std::env::var("HOME").expect("HOME not set");
  PathBuf::from(home)
}

/// Returns the directory for data files for the application
#[cfg(windows)]
pub fn data_dir() -> PathBuf {
  let appdata = std::env::var("APPDATA").expect("APPDATA not set");
  PathBuf::from(appdata).join(APP_NAME)
}

/// Returns the directory for data files for the application
#[cfg(not(windows))]
pub fn data_dir() -> PathBuf {
  let data_home = std::env::var("XDG_DATA_HOME")
    .map(PathBuf::from)
    .unwrap_or_else(|_| home_dir().join(".local").join("share"));
  data_home.join(APP_NAME)
}

/// The two directory roots every location pipeline works against.
///
/// The cache root holds one VCS working copy per source URI; the store root
/// holds installed cookbooks keyed by name and revision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Roots {
  pub cache_root: PathBuf,
  pub store_root: PathBuf,
}

impl Roots {
  /// Detect the default roots under the application data directory.
  pub fn detect() -> Self {
    let data = data_dir();
    Self {
      cache_root: data.join(".cache"),
      store_root: data.join("cookbooks"),
    }
  }

  /// Roots under an explicit base directory.
  ///
  /// Used by tests and by embedders that configure their own layout.
  pub fn at(base: &Path) -> Self {
    Self {
      cache_root: base.join(".cache"),
      store_root: base.join("cookbooks"),
    }
  }
}

#[cfg(test)]
#[cfg(not(windows))]
mod tests {
  use super::*;
  use serial_test::serial;

  #[test]
  #[serial]
  fn xdg_data_home_takes_precedence() {
    temp_env::with_vars(
      [
        ("XDG_DATA_HOME", Some("/custom/data")),
        ("HOME", Some("/home/user")),
      ],
      || {
        assert_eq!(data_dir(), PathBuf::from("/custom/data").join(APP_NAME));
      },
    );
  }

  #[test]
  #[serial]
  fn xdg_fallback_to_home_directory() {
    temp_env::with_vars(
      [("XDG_DATA_HOME", None::<&str>), ("HOME", Some("/home/user"))],
      || {
        assert_eq!(
          data_dir(),
          PathBuf::from("/home/user/.local/share").join(APP_NAME)
        );
      },
    );
  }

  #[test]
  #[serial]
  fn detect_places_cache_and_store_under_data_dir() {
    temp_env::with_vars(
      [("XDG_DATA_HOME", None::<&str>), ("HOME", Some("/home/user"))],
      || {
        let roots = Roots::detect();
        assert_eq!(roots.cache_root, data_dir().join(".cache"));
        assert_eq!(roots.store_root, data_dir().join("cookbooks"));
      },
    );
  }

  #[test]
  fn at_uses_explicit_base() {
    let roots = Roots::at(Path::new("/tmp/base"));
    assert_eq!(roots.cache_root, PathBuf::from("/tmp/base/.cache"));
    assert_eq!(roots.store_root, PathBuf::from("/tmp/base/cookbooks"));
  }
}
