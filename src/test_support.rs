use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::Result;
use crate::handler::ShortlistHandler;
use crate::model::{LabelId, RawCandidates, RowSlot};
use hashbrown::HashSet;

/// One synthetic instance: its ground truth and what the index retrieved.
#[derive(Debug, Clone)]
pub struct SyntheticInstance {
    pub positives: Vec<LabelId>,
    pub shortlist: RawCandidates,
}

#[derive(Debug, Clone)]
pub struct GeneratedShortlists {
    pub instances: Vec<SyntheticInstance>,
    pub num_labels: usize,
    pub width: usize,
}

/// Generate index output for `count` instances.
///
/// Each instance gets 1 to `max_positives` positives. The shortlist holds
/// `width` distinct labels sorted by descending similarity; each positive is
/// retrieved with probability `recall`.
pub fn generate_shortlists(
    count: usize,
    width: usize,
    num_labels: usize,
    max_positives: usize,
    recall: f64,
    seed: u64,
) -> GeneratedShortlists {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut instances = Vec::with_capacity(count);

    for _ in 0..count {
        let num_positives = rng.random_range(1..=max_positives.max(1));
        let mut used: HashSet<LabelId> = HashSet::with_capacity(width + num_positives);
        let mut positives = Vec::with_capacity(num_positives);
        while positives.len() < num_positives.min(num_labels) {
            let label = rng.random_range(0..num_labels) as LabelId;
            if used.insert(label) {
                positives.push(label);
            }
        }

        let mut labels: Vec<LabelId> = positives
            .iter()
            .copied()
            .filter(|_| rng.random_bool(recall))
            .take(width)
            .collect();
        let missed = positives.len() - labels.len();
        let target = width.min(num_labels - missed);
        while labels.len() < target {
            let label = rng.random_range(0..num_labels) as LabelId;
            if used.insert(label) {
                labels.push(label);
            }
        }

        let mut sim: Vec<f32> = (0..labels.len()).map(|_| rng.random::<f32>()).collect();
        sim.sort_by(|a, b| b.total_cmp(a));
        instances.push(SyntheticInstance {
            positives,
            shortlist: RawCandidates { labels, sim },
        });
    }

    GeneratedShortlists {
        instances,
        num_labels,
        width,
    }
}

/// Write every generated shortlist into `handler`, instance `i` under key `i`.
pub fn populate(
    handler: &mut dyn ShortlistHandler,
    data: &GeneratedShortlists,
    fname: &str,
) -> Result<()> {
    let rows: Vec<RawCandidates> = data
        .instances
        .iter()
        .map(|instance| instance.shortlist.clone())
        .collect();
    handler.update_shortlist_batch(&rows, fname, RowSlot::At(0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_shape() {
        let data = generate_shortlists(20, 8, 500, 3, 0.5, 4);
        assert_eq!(data.instances.len(), 20);
        for instance in &data.instances {
            assert_eq!(instance.shortlist.len(), 8);
            assert_eq!(instance.shortlist.sim.len(), 8);
            assert!(!instance.positives.is_empty() && instance.positives.len() <= 3);
            let unique: HashSet<_> = instance.shortlist.labels.iter().collect();
            assert_eq!(unique.len(), 8);
            assert!(instance.shortlist.sim.windows(2).all(|w| w[0] >= w[1]));
        }
    }

    #[test]
    fn test_generation_is_seeded() {
        let a = generate_shortlists(5, 4, 100, 2, 0.7, 99);
        let b = generate_shortlists(5, 4, 100, 2, 0.7, 99);
        for (x, y) in a.instances.iter().zip(&b.instances) {
            assert_eq!(x.positives, y.positives);
            assert_eq!(x.shortlist, y.shortlist);
        }
    }
}
