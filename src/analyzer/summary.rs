//! What a run produced and what it could not.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::Serialize;
use uuid::Uuid;

use crate::FailureKind;
use crate::types::AnalysisResult;

/// Records that ended without a result, keyed by id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FailureSummary {
    pub failures: BTreeMap<String, FailureKind>,
}

impl FailureSummary {
    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn total(&self) -> usize {
        self.failures.len()
    }

    pub fn count(&self, kind: FailureKind) -> usize {
        self.failures.values().filter(|k| **k == kind).count()
    }

    /// Failure count per kind, omitting kinds with no failures.
    pub fn counts(&self) -> BTreeMap<FailureKind, usize> {
        let mut counts = BTreeMap::new();
        for kind in self.failures.values() {
            *counts.entry(*kind).or_insert(0) += 1;
        }
        counts
    }

    /// Ids that failed with `kind`, sorted.
    pub fn ids(&self, kind: FailureKind) -> Vec<&str> {
        self.failures
            .iter()
            .filter(|(_, k)| **k == kind)
            .map(|(id, _)| id.as_str())
            .collect()
    }

    /// Records never attempted (budget or cancellation), as opposed to
    /// records that failed at a provider.
    pub fn skipped(&self) -> usize {
        self.failures.values().filter(|k| k.is_skip()).count()
    }
}

/// Bookkeeping for one [`BatchAnalyzer::analyze`](super::BatchAnalyzer::analyze) call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    /// Distinct records in the batch.
    pub total_records: usize,
    pub cache_hits: usize,
    /// Cached entries ignored because another model produced them.
    pub stale_hits: usize,
    /// Newly analyzed records (and cost ledger entries written).
    pub fetched: usize,
    pub duplicates_ignored: usize,
    pub tokens_in: u64,
    pub tokens_out: u64,
    pub cost: f64,
    pub budget_limit: f64,
    /// Set when a provider rejected the credentials and no fallback recovered.
    pub credentials_rejected: bool,
    pub failures: FailureSummary,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "run {}", self.run_id)?;
        writeln!(
            f,
            "  records: {} ({} cached, {} fetched, {} failed)",
            self.total_records,
            self.cache_hits,
            self.fetched,
            self.failures.total()
        )?;
        if self.stale_hits > 0 {
            writeln!(f, "  stale cache entries re-analyzed: {}", self.stale_hits)?;
        }
        if self.duplicates_ignored > 0 {
            writeln!(f, "  duplicate ids ignored: {}", self.duplicates_ignored)?;
        }
        writeln!(
            f,
            "  tokens: {} in / {} out, cost {:.4} (limit {})",
            self.tokens_in, self.tokens_out, self.cost, self.budget_limit
        )?;
        for (kind, count) in self.failures.counts() {
            writeln!(f, "  {kind}: {count}")?;
        }
        if self.credentials_rejected {
            writeln!(f, "  credentials were rejected; check the API key")?;
        }
        Ok(())
    }
}

/// Merged results plus the run's summary.
#[derive(Debug, Clone)]
pub struct AnalysisOutcome {
    /// Cached and newly fetched results. Failed records are absent.
    pub results: HashMap<String, AnalysisResult>,
    pub summary: RunSummary,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_and_skips() {
        let mut summary = FailureSummary::default();
        summary.failures.insert("a".into(), FailureKind::Auth);
        summary.failures.insert("b".into(), FailureKind::BudgetExceeded);
        summary.failures.insert("c".into(), FailureKind::BudgetExceeded);
        summary.failures.insert("d".into(), FailureKind::Cancelled);

        assert_eq!(summary.total(), 4);
        assert_eq!(summary.count(FailureKind::BudgetExceeded), 2);
        assert_eq!(summary.skipped(), 3);
        assert_eq!(summary.ids(FailureKind::BudgetExceeded), vec!["b", "c"]);
        assert_eq!(summary.counts().get(&FailureKind::Auth), Some(&1));
        assert!(!summary.counts().contains_key(&FailureKind::Other));
    }
}
