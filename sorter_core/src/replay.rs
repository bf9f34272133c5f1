//! Offline classification of a recorded sample trace.
//!
//! Feeds every sample through a fresh `Classifier` exactly as the Operation
//! handler would and tallies the commits. No hardware is involved.
use sorter_traits::ColorSample;
use tracing::debug;

use crate::classifier::{Category, Classifier};
use crate::config::ClassifierCfg;
use crate::counters::BinCounters;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Commit {
    /// Index of the sample that closed the pass.
    pub index: usize,
    pub category: Category,
}

#[derive(Debug, Clone)]
pub struct ReplayReport {
    pub samples: usize,
    pub counters: BinCounters,
    pub commits: Vec<Commit>,
    /// A pass was still open when the trace ran out; it is not counted.
    pub open_at_end: bool,
}

pub fn replay(cfg: &ClassifierCfg, samples: impl IntoIterator<Item = ColorSample>) -> ReplayReport {
    let mut classifier = Classifier::new(cfg.clone());
    let mut counters = BinCounters::zero();
    let mut commits = Vec::new();
    let mut n = 0;
    for (index, sample) in samples.into_iter().enumerate() {
        n = index + 1;
        if let Some(category) = classifier.feed(sample) {
            debug!(index, %category, "pass committed");
            counters.record(category);
            commits.push(Commit { index, category });
        }
    }
    ReplayReport {
        samples: n,
        counters,
        commits,
        open_at_end: classifier.in_pass(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_trace_commits_nothing() {
        let r = replay(&ClassifierCfg::default(), Vec::new());
        assert_eq!(r.samples, 0);
        assert!(r.commits.is_empty());
        assert!(!r.open_at_end);
    }

    #[test]
    fn trace_ending_mid_pass_is_reported_open() {
        let s = vec![ColorSample::new(10, 3, 3, 3), ColorSample::new(60, 20, 20, 20)];
        let r = replay(&ClassifierCfg::default(), s);
        assert!(r.commits.is_empty());
        assert!(r.open_at_end);
        assert_eq!(r.counters.total(), 0);
    }
}
