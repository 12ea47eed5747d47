//! Persistent store for condition records

use chrono::{DateTime, Utc};
use parcel_types::{ConditionRecord, EventType, Result, StoreError};
use serde::Serialize;
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::PathBuf;

/// Condition records keyed by record id, persisted as a single JSON file
pub struct ConditionStore {
    store_path: Option<PathBuf>,
    records: HashMap<String, ConditionRecord>,
}

impl ConditionStore {
    /// Create or load a store
    pub fn open(store_dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&store_dir)?;
        let store_path = store_dir.join("conditions.json");

        let records = if store_path.exists() {
            let file = File::open(&store_path)?;
            let reader = BufReader::new(file);
            serde_json::from_reader(reader)
                .map_err(|e| StoreError::IoError(format!("corrupt condition store: {}", e)))?
        } else {
            HashMap::new()
        };

        Ok(Self {
            store_path: Some(store_path),
            records,
        })
    }

    /// Store that lives only as long as the process
    pub fn in_memory() -> Self {
        Self {
            store_path: None,
            records: HashMap::new(),
        }
    }

    /// Save store to disk
    fn save(&self) -> Result<()> {
        let Some(ref path) = self.store_path else {
            return Ok(());
        };
        let tmp_path = path.with_extension("json.tmp");
        {
            let file = File::create(&tmp_path)?;
            let writer = BufWriter::new(file);
            serde_json::to_writer_pretty(writer, &self.records)?;
        }
        fs::rename(&tmp_path, path)?;
        Ok(())
    }

    /// Insert a record unless the order already has one for the same event
    pub fn insert(&mut self, record: ConditionRecord) -> Result<()> {
        if self
            .get_by_order_event(&record.order_id, record.event_type)
            .is_some()
        {
            return Err(StoreError::Duplicate {
                order_id: record.order_id.clone(),
                event: record.event_type,
            }
            .into());
        }

        let id = record.id.clone();
        self.records.insert(id.clone(), record);
        if let Err(e) = self.save() {
            self.records.remove(&id);
            return Err(e);
        }
        Ok(())
    }

    /// Apply an update to an existing record and persist
    pub fn update<F>(&mut self, id: &str, apply: F) -> Result<()>
    where
        F: FnOnce(&mut ConditionRecord),
    {
        let record = self
            .records
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        let previous = record.clone();
        apply(record);
        if let Err(e) = self.save() {
            self.records.insert(id.to_string(), previous);
            return Err(e);
        }
        Ok(())
    }

    /// Get record by id
    pub fn get(&self, id: &str) -> Option<&ConditionRecord> {
        self.records.get(id)
    }

    /// Get the record for an (order, event) pair
    pub fn get_by_order_event(&self, order_id: &str, event: EventType) -> Option<&ConditionRecord> {
        self.records
            .values()
            .find(|r| r.order_id == order_id && r.event_type == event)
    }

    /// All records of an order, arrival before handover
    pub fn find_by_order(&self, order_id: &str) -> Vec<&ConditionRecord> {
        let mut records: Vec<_> = self
            .records
            .values()
            .filter(|r| r.order_id == order_id)
            .collect();
        records.sort_by_key(|r| match r.event_type {
            EventType::Arrival => 0,
            EventType::Handover => 1,
        });
        records
    }

    /// Get all records (newest first)
    pub fn all_records(&self) -> Vec<&ConditionRecord> {
        let mut records: Vec<_> = self.records.values().collect();
        records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        records
    }

    /// Records flagged for review with no resolution yet
    pub fn awaiting_review(&self) -> Vec<&ConditionRecord> {
        self.all_records()
            .into_iter()
            .filter(|r| r.awaiting_review())
            .collect()
    }

    /// Get total record count
    pub fn count(&self) -> usize {
        self.records.len()
    }

    /// Summary statistics over the whole store
    pub fn stats(&self) -> StoreStats {
        StoreStats::from_records(self.records.values())
    }
}

/// Store summary
#[derive(Debug, Clone, Default, Serialize)]
pub struct StoreStats {
    pub record_count: usize,
    pub arrivals: usize,
    pub handovers: usize,
    pub awaiting_damage_confirmation: usize,
    pub flagged_for_review: usize,
    pub awaiting_review: usize,
    /// Measurements produced by the fallback estimator
    pub estimated_measurements: usize,
    pub mean_measurement_confidence: f64,
    pub latest_record_at: Option<DateTime<Utc>>,
}

impl StoreStats {
    pub fn from_records<'a>(records: impl Iterator<Item = &'a ConditionRecord>) -> Self {
        let mut stats = Self::default();
        let mut confidence_sum = 0.0;
        let mut measured = 0usize;

        for record in records {
            stats.record_count += 1;
            match record.event_type {
                EventType::Arrival => stats.arrivals += 1,
                EventType::Handover => stats.handovers += 1,
            }
            if record.damage.is_none() {
                stats.awaiting_damage_confirmation += 1;
            }
            if record.flagged_for_review {
                stats.flagged_for_review += 1;
            }
            if record.awaiting_review() {
                stats.awaiting_review += 1;
            }
            if let Some(ref m) = record.dimension_measurement {
                measured += 1;
                confidence_sum += m.confidence;
                if !m.source.is_authoritative() {
                    stats.estimated_measurements += 1;
                }
            }
            stats.latest_record_at = match stats.latest_record_at {
                Some(t) if t >= record.timestamp => Some(t),
                _ => Some(record.timestamp),
            };
        }

        if measured > 0 {
            stats.mean_measurement_confidence = confidence_sum / measured as f64;
        }
        stats
    }

    pub fn display(&self) -> String {
        format!(
            "Condition Store\n\
             ===============\n\
             Records:              {}\n\
             Arrivals:             {}\n\
             Handovers:            {}\n\
             Awaiting damage conf: {}\n\
             Flagged for review:   {}\n\
             Awaiting review:      {}\n\
             Estimated measures:   {}\n\
             Mean confidence:      {:.0}%",
            self.record_count,
            self.arrivals,
            self.handovers,
            self.awaiting_damage_confirmation,
            self.flagged_for_review,
            self.awaiting_review,
            self.estimated_measurements,
            self.mean_measurement_confidence * 100.0
        )
    }
}
