//! stockpot-lib: Source-location pipeline for the stockpot cookbook manager
//!
//! This crate resolves one declared dependency ("fetch cookbook X at ref R
//! from VCS URI U") into a validated, locally installed artifact:
//! - `Location`: a source descriptor plus the install/download pipeline
//! - `Cache`: one on-disk working copy per source URI
//! - `Store`: the content-addressed destination for installed cookbooks
//! - `Artifact`/`Validator`: the artifact-format layer's interfaces
//!
//! Version solving, cookbook metadata parsing, and the CLI live elsewhere.

pub mod artifact;
pub mod consts;
pub mod location;
pub mod locks;
pub mod paths;
