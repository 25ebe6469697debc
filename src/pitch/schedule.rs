//! Declarative "run every Nth tick" policy for estimator invocation.
//!
//! The capture worker reads and records a frame on every tick, but heavier
//! estimators only run on tick 0 of every `n`:
//!
//! ```text
//! tick:     0   1   2   3   4   5   6 …
//! every(3): run  -   -  run  -   -  run
//! ```

/// Decides which capture ticks run the estimator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EstimationSchedule {
    interval: u32,
    tick: u64,
}

impl EstimationSchedule {
    /// Run on tick 0 of every `n` ticks.  `n == 0` is treated as `1`.
    pub fn every(n: u32) -> Self {
        Self {
            interval: n.max(1),
            tick: 0,
        }
    }

    /// Run on every tick.
    pub fn always() -> Self {
        Self::every(1)
    }

    pub fn interval(&self) -> u32 {
        self.interval
    }

    /// Advance one tick; returns `true` when this tick should run the
    /// estimator.
    pub fn next_tick(&mut self) -> bool {
        let run = self.tick % self.interval as u64 == 0;
        self.tick += 1;
        run
    }
}

impl Default for EstimationSchedule {
    fn default() -> Self {
        Self::always()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_third_runs_on_ticks_0_3_6() {
        let mut s = EstimationSchedule::every(3);
        let runs: Vec<bool> = (0..7).map(|_| s.next_tick()).collect();
        assert_eq!(runs, vec![true, false, false, true, false, false, true]);
    }

    #[test]
    fn always_runs_every_tick() {
        let mut s = EstimationSchedule::always();
        assert!((0..10).all(|_| s.next_tick()));
    }

    #[test]
    fn zero_interval_means_every_tick() {
        let mut s = EstimationSchedule::every(0);
        assert_eq!(s.interval(), 1);
        assert!(s.next_tick() && s.next_tick());
    }
}
