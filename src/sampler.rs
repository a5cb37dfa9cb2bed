//! # Sampler Module
//!
//! Label candidates drawn independently of any persisted shortlist.

use crate::config::defaults::SAMPLED_SIM;
use crate::error::{Result, ShortlistError};
use crate::model::{LabelId, RawCandidates};
use rand::rngs::StdRng;
use rand::Rng;

/// Anything that can produce a fresh candidate set on demand.
pub trait CandidateSource: Send {
    /// Draw one candidate set.
    fn draw(&mut self) -> RawCandidates;

    /// Number of candidates per draw.
    fn sample_size(&self) -> usize;
}

/// Uniform label sampler over `[0, num_labels)`.
#[derive(Debug, Clone)]
pub struct NegativeSampler {
    num_labels: usize,
    sample_size: usize,
    replace: bool,
    rng: StdRng,
}

impl NegativeSampler {
    pub fn new(num_labels: usize, sample_size: usize, replace: bool, rng: StdRng) -> Result<Self> {
        if num_labels == 0 {
            return Err(ShortlistError::invalid_config(
                "negative sampler needs at least one label",
            ));
        }
        if !replace && sample_size > num_labels {
            return Err(ShortlistError::invalid_config(format!(
                "cannot draw {sample_size} distinct labels out of {num_labels}"
            )));
        }
        Ok(Self {
            num_labels,
            sample_size,
            replace,
            rng,
        })
    }

    pub fn num_labels(&self) -> usize {
        self.num_labels
    }

    pub fn replace(&self) -> bool {
        self.replace
    }

    /// Draw `num_samples` batches of `sample_size` labels, concatenated.
    ///
    /// Without replacement, labels are distinct within each batch.
    pub fn query(&mut self, num_samples: usize) -> RawCandidates {
        let total = num_samples * self.sample_size;
        let mut labels: Vec<LabelId> = Vec::with_capacity(total);
        for _ in 0..num_samples {
            if self.replace {
                labels.extend(
                    (0..self.sample_size).map(|_| self.rng.random_range(0..self.num_labels) as LabelId),
                );
            } else {
                labels.extend(
                    rand::seq::index::sample(&mut self.rng, self.num_labels, self.sample_size)
                        .into_iter()
                        .map(|label| label as LabelId),
                );
            }
        }
        RawCandidates {
            sim: vec![SAMPLED_SIM; labels.len()],
            labels,
        }
    }
}

impl CandidateSource for NegativeSampler {
    fn draw(&mut self) -> RawCandidates {
        self.query(1)
    }

    fn sample_size(&self) -> usize {
        self.sample_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::{seeded_rng, SAMPLER_STREAM};
    use hashbrown::HashSet;

    fn sampler(num_labels: usize, sample_size: usize, replace: bool) -> NegativeSampler {
        NegativeSampler::new(num_labels, sample_size, replace, seeded_rng(Some(3), SAMPLER_STREAM))
            .unwrap()
    }

    #[test]
    fn test_draw_size_and_range() {
        let mut sampler = sampler(50, 20, true);
        for _ in 0..20 {
            let raw = sampler.draw();
            assert_eq!(raw.len(), 20);
            assert_eq!(raw.sim, vec![SAMPLED_SIM; 20]);
            assert!(raw.labels.iter().all(|&l| (0..50).contains(&l)));
        }
    }

    #[test]
    fn test_query_concatenates_batches() {
        let mut sampler = sampler(10, 4, true);
        assert_eq!(sampler.query(3).len(), 12);
        assert!(sampler.query(0).is_empty());
    }

    #[test]
    fn test_without_replacement_is_distinct() {
        let mut sampler = sampler(8, 8, false);
        let raw = sampler.draw();
        let unique: HashSet<_> = raw.labels.iter().copied().collect();
        assert_eq!(unique.len(), 8);
    }

    #[test]
    fn test_invalid_construction() {
        let rng = seeded_rng(Some(1), SAMPLER_STREAM);
        assert!(NegativeSampler::new(0, 4, true, rng.clone()).is_err());
        assert!(NegativeSampler::new(3, 4, false, rng.clone()).is_err());
        let sampler = NegativeSampler::new(3, 4, true, rng).unwrap();
        assert_eq!(sampler.num_labels(), 3);
        assert!(sampler.replace());
    }

    #[test]
    fn test_seeded_sampler_is_reproducible() {
        let a = sampler(1000, 16, true).draw();
        let b = sampler(1000, 16, true).draw();
        assert_eq!(a, b);
    }
}
