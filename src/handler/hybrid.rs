use super::{ShortlistHandler, ShortlistTables};
use crate::config::defaults::SAMPLED_SIM;
use crate::config::HandlerConfig;
use crate::error::Result;
use crate::model::{LabelId, RawCandidates, ShortlistMethod};
use crate::policy::ShortlistPolicy;
use crate::sampler::NegativeSampler;
use crate::utils::{seeded_rng, SAMPLER_STREAM};
use hashbrown::HashSet;

/// Persisted shortlists widened with `corruption` freshly sampled labels.
#[derive(Debug)]
pub struct ShortlistHandlerHybrid {
    policy: ShortlistPolicy,
    tables: ShortlistTables,
    sampler: NegativeSampler,
    corruption: usize,
}

impl ShortlistHandlerHybrid {
    pub fn new(config: &HandlerConfig) -> Result<Self> {
        config.validate()?;
        // Sampled with replacement, so draw extra and de-duplicate.
        let sampler = NegativeSampler::new(
            config.num_labels,
            config.hybrid_sample_size(),
            true,
            seeded_rng(config.seed, SAMPLER_STREAM),
        )?;
        Ok(Self {
            policy: ShortlistPolicy::from_config(config),
            tables: ShortlistTables::new(&config.model_dir, config.mode, config.backend()),
            sampler,
            corruption: config.corruption,
        })
    }

    pub fn corruption(&self) -> usize {
        self.corruption
    }

    /// Exactly `corruption` sampled labels, unique ones not already in `existing` first.
    fn sample_corruption(&mut self, existing: &[LabelId]) -> Vec<LabelId> {
        let draw = self.sampler.query(1);
        let mut seen: HashSet<LabelId> = existing.iter().copied().collect();
        let mut picked = Vec::with_capacity(self.corruption);
        let mut repeats = Vec::new();
        for label in draw.labels {
            if picked.len() == self.corruption {
                break;
            }
            if seen.insert(label) {
                picked.push(label);
            } else {
                repeats.push(label);
            }
        }
        let missing = self.corruption - picked.len();
        picked.extend(repeats.into_iter().take(missing));
        picked
    }
}

impl ShortlistHandler for ShortlistHandlerHybrid {
    fn method(&self) -> ShortlistMethod {
        ShortlistMethod::Hybrid
    }

    fn policy(&self) -> &ShortlistPolicy {
        &self.policy
    }

    fn policy_mut(&mut self) -> &mut ShortlistPolicy {
        &mut self.policy
    }

    fn is_initialized(&self) -> bool {
        self.tables.data_init()
    }

    fn query(&mut self, index: usize) -> Result<RawCandidates> {
        let mut raw = self.tables.query(index)?;
        let sampled = self.sample_corruption(&raw.labels);
        raw.extend(RawCandidates {
            sim: vec![SAMPLED_SIM; sampled.len()],
            labels: sampled,
        });
        Ok(raw)
    }

    fn tables(&self) -> Option<&ShortlistTables> {
        Some(&self.tables)
    }

    fn tables_mut(&mut self) -> Option<&mut ShortlistTables> {
        Some(&mut self.tables)
    }
}
