/// Counters accumulated over one scheduler run.
#[derive(Debug, Default, Clone)]
pub struct SchedulerMetrics {
    /// Completed rounds (applies).
    pub rounds: u64,
    /// Contributions admitted into an aggregate.
    pub admitted: u64,
    /// Contributions discarded for exceeding the staleness bound.
    pub discarded: u64,
    /// Compute failures that were re-dispatched.
    pub retries: u64,
    /// Workers permanently excluded after exhausting their retry budget.
    pub failed_workers: u64,
    /// Largest `max(update_count) - min(update_count)` ever observed.
    pub max_skew: u64,
    /// Final per-worker admitted-contribution counts.
    pub update_counts: Vec<u64>,
}

impl SchedulerMetrics {
    #[inline]
    pub(crate) fn bump_round(&mut self) {
        self.rounds += 1;
    }

    #[inline]
    pub(crate) fn add_admitted(&mut self, n: usize) {
        self.admitted += n as u64;
    }

    #[inline]
    pub(crate) fn bump_discarded(&mut self) {
        self.discarded += 1;
    }

    #[inline]
    pub(crate) fn bump_retries(&mut self) {
        self.retries += 1;
    }

    #[inline]
    pub(crate) fn bump_failed(&mut self) {
        self.failed_workers += 1;
    }

    #[inline]
    pub(crate) fn observe_skew(&mut self, skew: u64) {
        self.max_skew = self.max_skew.max(skew);
    }
}
