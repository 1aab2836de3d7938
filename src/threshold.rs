//! Citation-count threshold split.
//!
//! Partitions a batch into identifiers cited at least `threshold` times and
//! the rest. The partition is total and keeps input order; an unknown count
//! lands below the threshold.

use crate::record::Pmid;

/// Result of splitting one batch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThresholdSplit {
    /// Identifiers with `count >= threshold`
    pub above: Vec<Pmid>,
    /// Identifiers with `count < threshold` or no count
    pub below: Vec<Pmid>,
    /// How many of `below` are there because the count was unavailable
    pub unknown: usize,
}

impl ThresholdSplit {
    /// Partition `(identifier, count)` pairs against `threshold`.
    pub fn partition<I>(threshold: u32, counts: I) -> Self
    where
        I: IntoIterator<Item = (Pmid, Option<u32>)>,
    {
        let mut split = Self::default();
        for (pmid, count) in counts {
            match count {
                Some(n) if n >= threshold => split.above.push(pmid),
                Some(_) => split.below.push(pmid),
                None => {
                    split.unknown += 1;
                    split.below.push(pmid);
                }
            }
        }
        split
    }

    /// Total number of identifiers partitioned
    pub fn len(&self) -> usize {
        self.above.len() + self.below.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(counts: &[Option<u32>]) -> Vec<(Pmid, Option<u32>)> {
        counts
            .iter()
            .enumerate()
            .map(|(i, c)| (Pmid::new((i + 1).to_string()), *c))
            .collect()
    }

    #[test]
    fn test_partition_example() {
        let split = ThresholdSplit::partition(5, pairs(&[Some(10), Some(3), Some(5), Some(7)]));
        assert_eq!(split.above, vec![Pmid::new("1"), Pmid::new("3"), Pmid::new("4")]);
        assert_eq!(split.below, vec![Pmid::new("2")]);
        assert_eq!(split.unknown, 0);
    }

    #[test]
    fn test_unknown_count_is_below() {
        let split = ThresholdSplit::partition(0, pairs(&[None, Some(0)]));
        assert_eq!(split.above, vec![Pmid::new("2")]);
        assert_eq!(split.below, vec![Pmid::new("1")]);
        assert_eq!(split.unknown, 1);
    }

    #[test]
    fn test_partition_is_total_and_disjoint() {
        let input = pairs(&[Some(1), None, Some(20), Some(9), Some(10), None, Some(11)]);
        let split = ThresholdSplit::partition(10, input.clone());

        assert_eq!(split.len(), input.len());
        for (pmid, count) in &input {
            let in_above = split.above.contains(pmid);
            let in_below = split.below.contains(pmid);
            assert!(in_above ^ in_below, "{} must land in exactly one side", pmid);
            assert_eq!(in_above, count.is_some_and(|n| n >= 10));
        }
    }

    #[test]
    fn test_partition_is_stable() {
        let input = pairs(&[Some(4), Some(12), None, Some(30)]);
        assert_eq!(
            ThresholdSplit::partition(10, input.clone()),
            ThresholdSplit::partition(10, input)
        );
    }
}
