//! # Policy Module
//!
//! Turns raw candidates plus an instance's positive labels into the
//! fixed-width triple consumed by the model.
//!
//! - **train**: positives first, then raw candidates that are not positive,
//!   truncated to width. When positives would leave fewer than `min_nneg`
//!   slots for negatives they are subsampled without replacement.
//! - **test/val**: raw candidates exactly as retrieved, with `labels_mask`
//!   flagging the ones that are positive and `sim_mask` holding their scores.

use crate::config::HandlerConfig;
use crate::model::{FixedShortlist, LabelId, Mode, RawCandidates};
use crate::utils::{seeded_rng, POLICY_STREAM};
use hashbrown::HashSet;
use rand::rngs::StdRng;
use std::borrow::Cow;
use std::sync::Arc;
use tracing::debug;

/// Mode-aware shortlist adjustment shared by every handler.
#[derive(Debug, Clone)]
pub struct ShortlistPolicy {
    mode: Mode,
    size_shortlist: usize,
    num_labels: usize,
    min_nneg: usize,
    rng: StdRng,
    label_mapping: Option<Arc<[LabelId]>>,
}

impl ShortlistPolicy {
    pub fn new(
        mode: Mode,
        size_shortlist: usize,
        num_labels: usize,
        min_nneg: usize,
        rng: StdRng,
    ) -> Self {
        Self {
            mode,
            size_shortlist,
            num_labels,
            min_nneg,
            rng,
            label_mapping: None,
        }
    }

    /// Policy for a handler built from `config`, at the config's effective width.
    pub fn from_config(config: &HandlerConfig) -> Self {
        Self::new(
            config.mode,
            config.effective_size(),
            config.num_labels,
            config.min_nneg,
            seeded_rng(config.seed, POLICY_STREAM),
        )
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn size_shortlist(&self) -> usize {
        self.size_shortlist
    }

    pub fn num_labels(&self) -> usize {
        self.num_labels
    }

    pub fn min_nneg(&self) -> usize {
        self.min_nneg
    }

    pub fn padding_index(&self) -> LabelId {
        self.num_labels as LabelId
    }

    /// Translate raw candidate ids into label space before adjustment.
    pub fn set_label_mapping(&mut self, mapping: Option<Arc<[LabelId]>>) {
        self.label_mapping = mapping;
    }

    pub fn label_mapping(&self) -> Option<&[LabelId]> {
        self.label_mapping.as_deref()
    }

    /// Most positives a training shortlist keeps.
    pub fn max_positives(&self) -> usize {
        self.size_shortlist - self.min_nneg.min(self.size_shortlist)
    }

    /// Apply the label mapping, if any. Unmapped ids become padding.
    pub fn map_labels(&self, mut raw: RawCandidates) -> RawCandidates {
        let Some(mapping) = self.label_mapping.as_deref() else {
            return raw;
        };
        let padding = self.padding_index();
        let mut unmapped = 0usize;
        for label in raw.labels.iter_mut() {
            *label = match usize::try_from(*label).ok().and_then(|id| mapping.get(id)) {
                Some(&mapped) => mapped,
                None => {
                    unmapped += 1;
                    padding
                }
            };
        }
        if unmapped > 0 {
            debug!(unmapped, "raw candidates outside label mapping");
        }
        raw
    }

    pub fn adjust(&mut self, pos_labels: &[LabelId], raw: &RawCandidates) -> FixedShortlist {
        if self.mode.is_train() {
            self.adjust_train(pos_labels, raw)
        } else {
            self.adjust_eval(pos_labels, raw)
        }
    }

    fn adjust_train(&mut self, pos_labels: &[LabelId], raw: &RawCandidates) -> FixedShortlist {
        let width = self.size_shortlist;
        let keep = self.max_positives();
        let mut out = FixedShortlist::padded(width, self.padding_index());

        let positives: Cow<'_, [LabelId]> = if pos_labels.len() > keep {
            rand::seq::index::sample(&mut self.rng, pos_labels.len(), keep)
                .into_iter()
                .map(|i| pos_labels[i])
                .collect::<Vec<_>>()
                .into()
        } else {
            Cow::Borrowed(pos_labels)
        };

        let positive_set: HashSet<LabelId> = positives.iter().copied().collect();
        let negatives = raw
            .labels
            .iter()
            .copied()
            .filter(|label| !positive_set.contains(label));

        for (slot, label) in out
            .labels
            .iter_mut()
            .zip(positives.iter().copied().chain(negatives))
        {
            *slot = label;
        }

        // sim_mask only mirrors the positive run here; it carries no score.
        let num_positives = positives.len().min(width);
        out.labels_mask[..num_positives].fill(1.0);
        out.sim_mask[..num_positives].fill(1.0);
        out
    }

    fn adjust_eval(&self, pos_labels: &[LabelId], raw: &RawCandidates) -> FixedShortlist {
        let mut out = FixedShortlist::padded(self.size_shortlist, self.padding_index());
        let positive_set: HashSet<LabelId> = pos_labels.iter().copied().collect();

        for (i, (&label, &sim)) in raw
            .labels
            .iter()
            .zip(raw.sim.iter())
            .take(self.size_shortlist)
            .enumerate()
        {
            out.labels[i] = label;
            out.sim_mask[i] = sim;
            if positive_set.contains(&label) {
                out.labels_mask[i] = 1.0;
            }
        }
        out
    }
}
