//! # Utilities Module
//!
//! Random source construction and the shortlist file-naming contract.

use crate::model::Mode;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::{Path, PathBuf};

/// Stream id for positive-label subsampling.
pub const POLICY_STREAM: u64 = 0x5157_0001;
/// Stream id for negative sampling.
pub const SAMPLER_STREAM: u64 = 0x5157_0002;

/// Build a random source; a fixed seed gives a reproducible stream per `stream` id.
pub fn seeded_rng(seed: Option<u64>, stream: u64) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed ^ stream),
        None => StdRng::from_os_rng(),
    }
}

/// Kind of file in a shortlist table pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShortlistFile {
    Indices,
    Sim,
}

impl ShortlistFile {
    pub fn extension(self) -> &'static str {
        match self {
            ShortlistFile::Indices => "indices",
            ShortlistFile::Sim => "sim",
        }
    }
}

/// `{model_dir}/{fname}.{train|test}.shortlist.{indices|sim}`, written while building.
pub fn build_path(model_dir: &Path, fname: &str, mode: Mode, kind: ShortlistFile) -> PathBuf {
    model_dir.join(format!(
        "{}.{}.shortlist.{}",
        fname,
        mode.file_prefix(),
        kind.extension()
    ))
}

/// `{model_dir}/{fname}.shortlist.{indices|sim}`, the saved artifact.
pub fn artifact_path(model_dir: &Path, fname: &str, kind: ShortlistFile) -> PathBuf {
    model_dir.join(format!("{}.shortlist.{}", fname, kind.extension()))
}
