//! Apply-timing classification of parameter modifications

use crate::model::{ApplyTiming, Parameter};

/// Modifications split by when they take effect
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classified {
    pub immediate: Vec<Parameter>,
    pub deferred: Vec<Parameter>,
}

impl Classified {
    /// Total number of classified parameters
    pub fn len(&self) -> usize {
        self.immediate.len() + self.deferred.len()
    }

    pub fn is_empty(&self) -> bool {
        self.immediate.is_empty() && self.deferred.is_empty()
    }

    /// Buckets in the order they should be sent: immediate first
    pub fn into_buckets(self) -> Vec<Vec<Parameter>> {
        vec![self.immediate, self.deferred]
    }
}

/// Partition modifications by their apply timing, keeping input order
/// within each bucket
pub fn classify(to_modify: Vec<Parameter>) -> Classified {
    let (immediate, deferred) = to_modify
        .into_iter()
        .partition(|p| p.apply_timing == ApplyTiming::Immediate);
    Classified {
        immediate,
        deferred,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_empty() {
        let classified = classify(Vec::new());
        assert!(classified.is_empty());
        assert_eq!(classified.len(), 0);
    }

    #[test]
    fn test_classify_preserves_every_parameter() {
        let input = vec![
            Parameter::user("tx_isolation", "repeatable-read", ApplyTiming::Deferred),
            Parameter::user("binlog_cache_size", "131072", ApplyTiming::Immediate),
            Parameter::user("innodb_read_io_threads", "64", ApplyTiming::Deferred),
            Parameter::user("character_set_server", "utf8", ApplyTiming::Immediate),
        ];

        let classified = classify(input.clone());

        assert_eq!(classified.len(), input.len());
        assert!(
            classified
                .immediate
                .iter()
                .all(|p| p.apply_timing == ApplyTiming::Immediate)
        );
        assert!(
            classified
                .deferred
                .iter()
                .all(|p| p.apply_timing == ApplyTiming::Deferred)
        );
        for p in &input {
            let hits = classified
                .immediate
                .iter()
                .chain(&classified.deferred)
                .filter(|c| *c == p)
                .count();
            assert_eq!(hits, 1, "{} should appear exactly once", p.name);
        }
    }

    #[test]
    fn test_into_buckets_orders_immediate_first() {
        let classified = classify(vec![
            Parameter::user("a", "1", ApplyTiming::Deferred),
            Parameter::user("b", "2", ApplyTiming::Immediate),
        ]);
        let buckets = classified.into_buckets();
        assert_eq!(buckets.len(), 2);
        assert_eq!(buckets[0][0].name, "b");
        assert_eq!(buckets[1][0].name, "a");
    }
}
