//! Per-run spending ceiling.
//!
//! The breaker admits a call only if `spent + reserved + estimate <= limit`.
//! Admission hands out a [`Reservation`] holding the estimate; the worker
//! settles it with the actual cost on success, or drops it to release the
//! hold. Once a call is refused the breaker stays tripped for the rest of
//! the run, so no new work starts even if later records are cheaper.
//!
//! In-flight calls always run to completion. Actual costs may exceed their
//! estimates, so `spent` can pass `limit` by at most the overshoot of the
//! calls in flight when the ceiling was reached.

use std::sync::{Arc, Mutex, PoisonError};

use tracing::warn;

#[derive(Debug)]
struct BudgetState {
    spent_so_far: f64,
    reserved: f64,
    limit: f64,
    tripped: bool,
}

/// Shared spending counter for one dispatch.
#[derive(Debug, Clone)]
pub struct BudgetBreaker {
    state: Arc<Mutex<BudgetState>>,
}

impl BudgetBreaker {
    pub fn new(limit: f64) -> Self {
        Self {
            state: Arc::new(Mutex::new(BudgetState {
                spent_so_far: 0.0,
                reserved: 0.0,
                limit,
                tripped: false,
            })),
        }
    }

    /// A breaker that never refuses.
    pub fn unlimited() -> Self {
        Self::new(f64::INFINITY)
    }

    /// Try to admit a call expected to cost `estimate`.
    ///
    /// Returns `None` (and trips the breaker) if admitting it could push the
    /// run over its limit, or if the breaker has already tripped.
    pub fn try_reserve(&self, estimate: f64) -> Option<Reservation> {
        let mut state = self.lock();
        if state.tripped {
            return None;
        }
        if state.spent_so_far + state.reserved + estimate > state.limit {
            state.tripped = true;
            warn!(
                spent = state.spent_so_far,
                reserved = state.reserved,
                estimate,
                limit = state.limit,
                "budget ceiling reached, no new calls will be started"
            );
            return None;
        }
        state.reserved += estimate;
        Some(Reservation {
            breaker: self.clone(),
            estimate,
            settled: false,
        })
    }

    /// Actual cost of all settled calls.
    pub fn spent(&self) -> f64 {
        self.lock().spent_so_far
    }

    pub fn limit(&self) -> f64 {
        self.lock().limit
    }

    pub fn is_tripped(&self) -> bool {
        self.lock().tripped
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BudgetState> {
        // The state is plain numbers; a panic elsewhere cannot leave it torn.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// An admitted call's hold on the budget. Released on drop unless settled.
#[derive(Debug)]
pub struct Reservation {
    breaker: BudgetBreaker,
    estimate: f64,
    settled: bool,
}

impl Reservation {
    pub fn estimate(&self) -> f64 {
        self.estimate
    }

    /// Replace the hold with the call's actual cost.
    pub fn settle(mut self, actual: f64) {
        let mut state = self.breaker.lock();
        state.reserved = (state.reserved - self.estimate).max(0.0);
        state.spent_so_far += actual;
        self.settled = true;
    }
}

impl Drop for Reservation {
    fn drop(&mut self) {
        if !self.settled {
            let mut state = self.breaker.lock();
            state.reserved = (state.reserved - self.estimate).max(0.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admits_until_estimate_would_cross_limit() {
        let breaker = BudgetBreaker::new(1.0);
        let a = breaker.try_reserve(0.4).unwrap();
        let b = breaker.try_reserve(0.4).unwrap();
        assert!(breaker.try_reserve(0.4).is_none());
        assert!(breaker.is_tripped());
        a.settle(0.4);
        b.settle(0.4);
        assert!((breaker.spent() - 0.8).abs() < 1e-9);
    }

    #[test]
    fn stays_tripped_for_cheaper_calls() {
        let breaker = BudgetBreaker::new(1.0);
        assert!(breaker.try_reserve(2.0).is_none());
        assert!(breaker.try_reserve(0.01).is_none());
    }

    #[test]
    fn dropped_reservation_releases_hold() {
        let breaker = BudgetBreaker::new(1.0);
        let r = breaker.try_reserve(0.9).unwrap();
        drop(r);
        assert!(breaker.try_reserve(0.9).is_some());
        assert_eq!(breaker.spent(), 0.0);
    }

    #[test]
    fn settled_cost_may_exceed_estimate() {
        let breaker = BudgetBreaker::new(1.0);
        breaker.try_reserve(0.5).unwrap().settle(1.2);
        assert!(breaker.spent() > breaker.limit());
        assert!(breaker.try_reserve(0.0).is_none());
    }

    #[test]
    fn unlimited_never_trips() {
        let breaker = BudgetBreaker::unlimited();
        for _ in 0..1000 {
            breaker.try_reserve(1e6).unwrap().settle(1e6);
        }
        assert!(!breaker.is_tripped());
    }
}
