//! Weighted consistent hashing over a discrete distribution
//!
//! Each choice `i` with probability `p_i` draws `xi_i = ExpHash(seed, i) / p_i`
//! and the smallest `xi` wins. Since `xi_i ~ Exp(p_i)`, choice `i` wins with
//! probability `p_i`, and a small change of the distribution changes the winner
//! for only a proportionally small set of seeds.

use crate::errors::{LabelerError, Result};
use crate::hash::exp_hash;

/// Tolerance allowed on the sum of probabilities
const NORMALIZE_ERROR: f64 = 1e-7;

/// One weighted choice of a distribution
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DistributionChoice {
    pub choice_id: usize,
    pub probability: f64,
}

impl DistributionChoice {
    pub fn new(choice_id: usize, probability: f64) -> Self {
        Self {
            choice_id,
            probability,
        }
    }
}

/// Consistent hashing of a seed string into one of the configured choices.
#[derive(Debug, Clone)]
pub struct DistributedConsistentHashing {
    distribution: Vec<DistributionChoice>,
}

impl DistributedConsistentHashing {
    /// Builds the hashing from a distribution whose probabilities are
    /// non-negative and sum to 1 (within `1e-7`). The stored distribution is
    /// normalized by the sum.
    pub fn new(distribution: Vec<DistributionChoice>) -> Result<Self> {
        if distribution.is_empty() {
            return Err(LabelerError::model("The given distribution is empty."));
        }

        let mut sum = 0.0;
        for choice in &distribution {
            if choice.probability < 0.0 {
                return Err(LabelerError::model(format!(
                    "Negative probability {} is provided.",
                    choice.probability
                )));
            }
            sum += choice.probability;
        }
        if !(1.0 - NORMALIZE_ERROR..=1.0 + NORMALIZE_ERROR).contains(&sum) {
            return Err(LabelerError::model(format!(
                "Probabilities do not sum to 1. {sum}"
            )));
        }

        let distribution = distribution
            .into_iter()
            .map(|c| DistributionChoice::new(c.choice_id, c.probability / sum))
            .collect();
        Ok(Self { distribution })
    }

    /// Returns the choice id selected by `random_seed`.
    pub fn hash(&self, random_seed: &str) -> usize {
        let xi = |choice: &DistributionChoice| {
            exp_hash(&format!(
                "consistent-hashing-{random_seed}-{}",
                choice.choice_id
            )) / choice.probability
        };
        // `new` rejects an empty distribution
        let (first, rest) = match self.distribution.split_first() {
            Some(split) => split,
            None => return 0,
        };
        let mut choice_id = first.choice_id;
        let mut min_xi = xi(first);
        for choice in rest {
            let candidate = xi(choice);
            if candidate < min_xi {
                choice_id = choice.choice_id;
                min_xi = candidate;
            }
        }
        choice_id
    }

    pub fn len(&self) -> usize {
        self.distribution.len()
    }

    pub fn is_empty(&self) -> bool {
        self.distribution.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    const SEED_NUMBER: usize = 10_000;

    fn choices(pairs: &[(usize, f64)]) -> Vec<DistributionChoice> {
        pairs
            .iter()
            .map(|&(id, p)| DistributionChoice::new(id, p))
            .collect()
    }

    fn counts(hashing: &DistributedConsistentHashing) -> BTreeMap<usize, usize> {
        let mut out = BTreeMap::new();
        for seed in 0..SEED_NUMBER {
            *out.entry(hashing.hash(&seed.to_string())).or_insert(0) += 1;
        }
        out
    }

    #[test]
    fn empty_distribution_fails() {
        let err = DistributedConsistentHashing::new(vec![]).unwrap_err();
        assert!(err.to_string().contains("The given distribution is empty"));
    }

    #[test]
    fn zero_sum_fails() {
        assert!(DistributedConsistentHashing::new(choices(&[(0, 0.0), (1, 0.0)])).is_err());
    }

    #[test]
    fn negative_probability_fails() {
        let err = DistributedConsistentHashing::new(choices(&[(0, -1.0)])).unwrap_err();
        assert!(err.to_string().contains("Negative probability"));
    }

    #[test]
    fn not_normalized_fails() {
        let err =
            DistributedConsistentHashing::new(choices(&[(0, 0.8), (1, 0.4), (2, 0.4), (3, 0.4)]))
                .unwrap_err();
        assert!(err.to_string().contains("Probabilities do not sum to 1"));
    }

    #[test]
    fn output_distribution_matches_reference() {
        let hashing =
            DistributedConsistentHashing::new(choices(&[(0, 0.4), (1, 0.2), (2, 0.2), (3, 0.2)]))
                .unwrap();
        let counts = counts(&hashing);
        assert_eq!(counts.len(), 4);
        assert_eq!(counts[&0], 4032);
        assert_eq!(counts[&1], 2012);
        assert_eq!(counts[&2], 1996);
        assert_eq!(counts[&3], 1960);
    }

    #[test]
    fn non_consecutive_choice_ids_match_reference() {
        let hashing =
            DistributedConsistentHashing::new(choices(&[(0, 0.4), (2, 0.2), (4, 0.2), (6, 0.2)]))
                .unwrap();
        let counts = counts(&hashing);
        assert_eq!(counts.keys().copied().collect::<Vec<_>>(), vec![0, 2, 4, 6]);
        assert_eq!(counts[&0], 4049);
        assert_eq!(counts[&2], 1961);
        assert_eq!(counts[&4], 2028);
        assert_eq!(counts[&6], 1962);
    }

    #[test]
    fn zero_probability_is_never_chosen() {
        let hashing = DistributedConsistentHashing::new(choices(&[(0, 0.0), (1, 1.0)])).unwrap();
        for seed in 0..SEED_NUMBER {
            assert_eq!(hashing.hash(&seed.to_string()), 1);
        }
    }

    #[test]
    fn unreachable_choices_fall_back_to_first() {
        // every xi is infinite, so no comparison ever succeeds
        let hashing = DistributedConsistentHashing {
            distribution: choices(&[(7, 0.0), (9, 0.0)]),
        };
        for seed in 0..100 {
            assert_eq!(hashing.hash(&seed.to_string()), 7);
        }
    }

    #[test]
    fn perturbation_moves_bounded_share_of_seeds() {
        let first =
            DistributedConsistentHashing::new(choices(&[(0, 0.4), (1, 0.2), (2, 0.2), (3, 0.2)]))
                .unwrap();
        let second =
            DistributedConsistentHashing::new(choices(&[(0, 0.2), (1, 0.2), (2, 0.2), (3, 0.4)]))
                .unwrap();
        let diff = (0..SEED_NUMBER)
            .filter(|seed| {
                let seed = seed.to_string();
                first.hash(&seed) != second.hash(&seed)
            })
            .count();
        assert!(diff < SEED_NUMBER * 4 / 10, "diff = {diff}");
    }
}
