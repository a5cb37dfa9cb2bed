//! # Model Module
//!
//! Core value types shared by tables, samplers and handlers.

use crate::error::{Result, ShortlistError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Label index in `[0, num_labels)`; `num_labels` itself is the padding index.
pub type LabelId = i64;

/// Operating mode of a handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Train,
    Test,
    Val,
}

impl Mode {
    pub fn is_train(self) -> bool {
        matches!(self, Mode::Train)
    }

    /// Infix used in build-time file names: `train` for training, `test` otherwise.
    pub fn file_prefix(self) -> &'static str {
        if self.is_train() {
            "train"
        } else {
            "test"
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Mode::Train => "train",
            Mode::Test => "test",
            Mode::Val => "val",
        };
        f.write_str(name)
    }
}

/// Where a handler's raw candidates come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ShortlistMethod {
    /// Persisted table only.
    #[default]
    Static,
    /// Persisted table plus an externally supplied label array.
    Extended,
    /// Persisted table plus freshly sampled labels.
    Hybrid,
    /// Sampled labels only.
    Dynamic,
}

impl ShortlistMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            ShortlistMethod::Static => "static",
            ShortlistMethod::Extended => "extended",
            ShortlistMethod::Hybrid => "hybrid",
            ShortlistMethod::Dynamic => "dynamic",
        }
    }

    /// Variants whose effective width is `size_shortlist + corruption`.
    pub fn widens_shortlist(self) -> bool {
        matches!(self, ShortlistMethod::Extended | ShortlistMethod::Hybrid)
    }
}

impl FromStr for ShortlistMethod {
    type Err = ShortlistError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "static" => Ok(ShortlistMethod::Static),
            "extended" => Ok(ShortlistMethod::Extended),
            "hybrid" => Ok(ShortlistMethod::Hybrid),
            "dynamic" => Ok(ShortlistMethod::Dynamic),
            other => Err(ShortlistError::UnsupportedMethod(other.to_string())),
        }
    }
}

impl TryFrom<String> for ShortlistMethod {
    type Error = ShortlistError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<ShortlistMethod> for String {
    fn from(method: ShortlistMethod) -> Self {
        method.as_str().to_string()
    }
}

impl fmt::Display for ShortlistMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Target of a table write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RowSlot {
    /// Write after the last row.
    Append,
    /// Overwrite (or fill) the row with this key.
    At(u64),
}

impl TryFrom<i64> for RowSlot {
    type Error = ShortlistError;

    fn try_from(idx: i64) -> Result<Self> {
        match idx {
            -1 => Ok(RowSlot::Append),
            k if k >= 0 => Ok(RowSlot::At(k as u64)),
            k => Err(ShortlistError::InvalidSlot(k)),
        }
    }
}

impl From<usize> for RowSlot {
    fn from(idx: usize) -> Self {
        RowSlot::At(idx as u64)
    }
}

/// Candidate labels with their similarity scores, as produced by `query`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawCandidates {
    pub labels: Vec<LabelId>,
    pub sim: Vec<f32>,
}

impl RawCandidates {
    pub fn new(labels: Vec<LabelId>, sim: Vec<f32>) -> Result<Self> {
        if labels.len() != sim.len() {
            return Err(ShortlistError::invalid_config(format!(
                "shortlist has {} labels but {} similarities",
                labels.len(),
                sim.len()
            )));
        }
        Ok(Self { labels, sim })
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Append another candidate list after this one.
    pub fn extend(&mut self, other: RawCandidates) {
        self.labels.extend(other.labels);
        self.sim.extend(other.sim);
    }
}

/// Fixed-width model input for one instance.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FixedShortlist {
    /// Label indices, padded with the padding index.
    pub labels: Vec<LabelId>,
    /// 1.0 where the slot holds a positive label.
    pub labels_mask: Vec<f32>,
    /// Similarity per slot in test/val mode; positive indicator in train mode.
    pub sim_mask: Vec<f32>,
}

impl FixedShortlist {
    /// All-zero triple returned before any shortlist data exists.
    pub fn zeros(width: usize) -> Self {
        Self {
            labels: vec![0; width],
            labels_mask: vec![0.0; width],
            sim_mask: vec![0.0; width],
        }
    }

    /// Padding-filled triple: every label is `padding_index`, masks are zero.
    pub fn padded(width: usize, padding_index: LabelId) -> Self {
        Self {
            labels: vec![padding_index; width],
            labels_mask: vec![0.0; width],
            sim_mask: vec![0.0; width],
        }
    }

    pub fn width(&self) -> usize {
        self.labels.len()
    }

    /// Number of slots flagged as positive.
    pub fn num_positives(&self) -> usize {
        self.labels_mask.iter().filter(|&&m| m > 0.0).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_slot_from_index() {
        assert_eq!(RowSlot::try_from(-1_i64).unwrap(), RowSlot::Append);
        assert_eq!(RowSlot::try_from(7_i64).unwrap(), RowSlot::At(7));
        assert!(matches!(
            RowSlot::try_from(-2_i64),
            Err(ShortlistError::InvalidSlot(-2))
        ));
    }

    #[test]
    fn test_method_parse() {
        assert_eq!("hybrid".parse::<ShortlistMethod>().unwrap(), ShortlistMethod::Hybrid);
        let err = "ann".parse::<ShortlistMethod>().unwrap_err();
        assert!(err.to_string().contains("ann"));
    }

    #[test]
    fn test_mode_file_prefix() {
        assert_eq!(Mode::Train.file_prefix(), "train");
        assert_eq!(Mode::Test.file_prefix(), "test");
        assert_eq!(Mode::Val.file_prefix(), "test");
    }

    #[test]
    fn test_raw_candidates_length_check() {
        assert!(RawCandidates::new(vec![1, 2], vec![0.5]).is_err());
        let raw = RawCandidates::new(vec![1, 2], vec![0.5, 0.25]).unwrap();
        assert_eq!(raw.len(), 2);
    }

    #[test]
    fn test_zero_triple() {
        let zeros = FixedShortlist::zeros(4);
        assert_eq!(zeros.labels, vec![0; 4]);
        assert_eq!(zeros.num_positives(), 0);
        assert_eq!(zeros.width(), 4);
    }
}
