//! In-memory dedup table owned by a single parse invocation.

use crate::models::{DedupKey, WorkloadRecord};
use crate::parser::row::BillingRow;
use std::collections::HashMap;

/// Records keyed by `(resource id, service, region)`, in first-seen order.
#[derive(Debug, Default)]
pub struct DedupTable {
    index: HashMap<DedupKey, usize>,
    records: Vec<WorkloadRecord>,
    estimated_bytes: usize,
    date_cap: usize,
}

impl DedupTable {
    pub fn new(date_cap: usize) -> Self {
        Self {
            date_cap,
            ..Self::default()
        }
    }

    /// Insert or accumulate; returns `true` when a new record was created.
    pub fn upsert(&mut self, row: BillingRow) -> bool {
        let key = DedupKey {
            resource_id: row.resource_id.clone(),
            service: row.service.name.clone(),
            region: row.region.clone(),
        };

        if let Some(&pos) = self.index.get(&key) {
            let record = &mut self.records[pos];
            let before = record.estimated_size();
            row.apply_to(record, self.date_cap);
            self.estimated_bytes = self.estimated_bytes.saturating_sub(before) + record.estimated_size();
            return false;
        }

        let record = row.into_record(self.date_cap);
        self.estimated_bytes += record.estimated_size() + key_size(&key);
        self.index.insert(key, self.records.len());
        self.records.push(record);
        true
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn estimated_bytes(&self) -> usize {
        self.estimated_bytes
    }

    /// Trim per-record history to `keep` usage dates.
    pub fn compact(&mut self, keep: usize) {
        for record in &mut self.records {
            record.compact(keep);
        }
        self.index.shrink_to_fit();
        self.records.shrink_to_fit();
        self.estimated_bytes = self
            .records
            .iter()
            .map(|r| r.estimated_size())
            .sum::<usize>()
            + self.index.keys().map(key_size).sum::<usize>();
    }

    /// Hand out every record and reset the table.
    pub fn drain(&mut self) -> Vec<WorkloadRecord> {
        self.index = HashMap::new();
        self.estimated_bytes = 0;
        std::mem::take(&mut self.records)
    }

    pub fn into_records(self) -> Vec<WorkloadRecord> {
        self.records
    }
}

fn key_size(key: &DedupKey) -> usize {
    std::mem::size_of::<DedupKey>()
        + std::mem::size_of::<usize>()
        + key.resource_id.len()
        + key.service.len()
        + key.region.len()
}
