use super::ShortlistHandler;
use crate::config::HandlerConfig;
use crate::error::Result;
use crate::model::{RawCandidates, ShortlistMethod};
use crate::policy::ShortlistPolicy;
use crate::sampler::{CandidateSource, NegativeSampler};
use crate::utils::{seeded_rng, SAMPLER_STREAM};

/// Shortlists drawn fresh from a candidate source on every call.
///
/// Nothing is persisted and the instance index is ignored, so every epoch
/// sees new candidates.
pub struct ShortlistHandlerDynamic {
    policy: ShortlistPolicy,
    source: Box<dyn CandidateSource>,
}

impl ShortlistHandlerDynamic {
    /// Dynamic handler backed by a uniform [`NegativeSampler`].
    pub fn new(config: &HandlerConfig) -> Result<Self> {
        config.validate()?;
        let sampler = NegativeSampler::new(
            config.num_labels,
            config.dynamic_sample_size(),
            config.sampler.replace,
            seeded_rng(config.seed, SAMPLER_STREAM),
        )?;
        Self::with_source(config, Box::new(sampler))
    }

    pub fn with_source(config: &HandlerConfig, source: Box<dyn CandidateSource>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            policy: ShortlistPolicy::from_config(config),
            source,
        })
    }
}

impl ShortlistHandler for ShortlistHandlerDynamic {
    fn method(&self) -> ShortlistMethod {
        ShortlistMethod::Dynamic
    }

    fn policy(&self) -> &ShortlistPolicy {
        &self.policy
    }

    fn policy_mut(&mut self) -> &mut ShortlistPolicy {
        &mut self.policy
    }

    fn is_initialized(&self) -> bool {
        true
    }

    fn query(&mut self, _index: usize) -> Result<RawCandidates> {
        Ok(self.source.draw())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{LabelId, Mode};

    struct FixedSource(Vec<LabelId>);

    impl CandidateSource for FixedSource {
        fn draw(&mut self) -> RawCandidates {
            RawCandidates {
                sim: vec![0.0; self.0.len()],
                labels: self.0.clone(),
            }
        }

        fn sample_size(&self) -> usize {
            self.0.len()
        }
    }

    fn config(mode: Mode) -> HandlerConfig {
        HandlerConfig {
            mode,
            min_nneg: 2,
            seed: Some(9),
            ..HandlerConfig::new(ShortlistMethod::Dynamic, 40, 6)
        }
    }

    #[test]
    fn test_draws_are_in_range_and_fixed_width() {
        let mut handler = ShortlistHandlerDynamic::new(&config(Mode::Test)).unwrap();
        assert!(handler.is_initialized());
        for index in 0..10 {
            let out = handler.get_shortlist(index, None).unwrap();
            assert_eq!(out.width(), 6);
            assert!(out.labels.iter().all(|&l| (0..40).contains(&l)));
        }
    }

    #[test]
    fn test_query_ignores_index() {
        let mut handler =
            ShortlistHandlerDynamic::with_source(&config(Mode::Test), Box::new(FixedSource(vec![4, 5])))
                .unwrap();
        assert_eq!(handler.query(0).unwrap(), handler.query(123).unwrap());
    }

    #[test]
    fn test_train_mode_merges_positives() {
        let mut handler = ShortlistHandlerDynamic::with_source(
            &config(Mode::Train),
            Box::new(FixedSource(vec![4, 5, 6, 7])),
        )
        .unwrap();
        let out = handler.get_shortlist(0, Some(&[5, 30])).unwrap();
        assert_eq!(out.labels, vec![5, 30, 4, 6, 7, 40]);
        assert_eq!(out.labels_mask, vec![1.0, 1.0, 0.0, 0.0, 0.0, 0.0]);
    }
}
