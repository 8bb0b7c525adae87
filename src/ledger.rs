//! Append-only cost ledger.
//!
//! One [`CostRecord`] per successful provider call, stored as JSON Lines.
//! Records are only ever appended; the core never rewrites or deletes them.

use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::Result;
use crate::types::{Analyzed, ProviderKind};

/// Default ledger location: `<data_local_dir>/huginn/cost_ledger.jsonl`.
pub fn default_ledger_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from(".local"))
        .join("huginn")
        .join("cost_ledger.jsonl")
}

/// A completed, billable call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostRecord {
    pub run_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub provider: ProviderKind,
    pub model_name: String,
    pub tokens_in: u32,
    pub tokens_out: u32,
    pub cost: f64,
}

impl CostRecord {
    pub fn for_call(run_id: Uuid, analyzed: &Analyzed) -> Self {
        Self {
            run_id,
            timestamp: Utc::now(),
            provider: analyzed.provider,
            model_name: analyzed.model_name.clone(),
            tokens_in: analyzed.usage.prompt_tokens,
            tokens_out: analyzed.usage.completion_tokens,
            cost: analyzed.cost,
        }
    }
}

/// Aggregate over every ledger record of one provider/model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LedgerTotal {
    pub provider: ProviderKind,
    pub model_name: String,
    pub calls: u64,
    pub tokens_in: u64,
    pub tokens_out: u64,
    pub cost: f64,
}

/// JSON Lines ledger file. Appends from concurrent threads are serialized
/// and block on `fsync`; async callers run them on the blocking pool.
#[derive(Debug)]
pub struct CostLedger {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl CostLedger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append `records`, one line each, flushed before returning.
    pub fn append(&self, records: &[CostRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let mut writer = BufWriter::new(file);
        for record in records {
            serde_json::to_writer(&mut writer, record)?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;
        writer.get_ref().sync_data()?;
        debug!(path = %self.path.display(), appended = records.len(), "cost ledger updated");
        Ok(())
    }

    /// Every readable record, oldest first. Malformed lines are skipped.
    pub fn read_all(&self) -> Result<Vec<CostRecord>> {
        let file = match File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut records = Vec::new();
        for (number, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(&line) {
                Ok(record) => records.push(record),
                Err(e) => warn!(
                    path = %self.path.display(),
                    line = number + 1,
                    error = %e,
                    "skipping malformed ledger line"
                ),
            }
        }
        Ok(records)
    }

    /// Per provider/model totals across all runs.
    pub fn totals(&self) -> Result<Vec<LedgerTotal>> {
        let mut by_model: BTreeMap<(&'static str, String), LedgerTotal> = BTreeMap::new();
        for record in self.read_all()? {
            let total = by_model
                .entry((record.provider.as_str(), record.model_name.clone()))
                .or_insert_with(|| LedgerTotal {
                    provider: record.provider,
                    model_name: record.model_name.clone(),
                    calls: 0,
                    tokens_in: 0,
                    tokens_out: 0,
                    cost: 0.0,
                });
            total.calls += 1;
            total.tokens_in += u64::from(record.tokens_in);
            total.tokens_out += u64::from(record.tokens_out);
            total.cost += record.cost;
        }
        Ok(by_model.into_values().collect())
    }
}
