use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use plunge_core::gateways::PersistenceGateway;
use plunge_core::models::{LeakRecord, OzoneEntry, TemperatureSample};
use plunge_core::{PlungeError, Result};

#[derive(Debug, Default)]
struct Tables {
    samples: Vec<TemperatureSample>,
    ozone: Vec<OzoneEntry>,
    leaks: Vec<LeakRecord>,
}

/// Process-local store. Row ids start at 1 and follow insertion order.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    writes: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of mutating calls served so far (seeding excluded). Test
    /// support only.
    #[cfg(any(test, feature = "test-support"))]
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn temperature_samples(&self) -> Vec<TemperatureSample> {
        self.tables.lock().samples.clone()
    }

    pub fn ozone_entries(&self) -> Vec<OzoneEntry> {
        self.tables.lock().ozone.clone()
    }

    pub fn leak_records(&self) -> Vec<LeakRecord> {
        self.tables.lock().leaks.clone()
    }

    /// Insert a row as if left behind by an earlier process. The id is
    /// reassigned. Test support only.
    #[cfg(any(test, feature = "test-support"))]
    pub fn seed_ozone_entry(&self, mut entry: OzoneEntry) -> OzoneEntry {
        let mut tables = self.tables.lock();
        entry.id = tables.ozone.len() as i64 + 1;
        tables.ozone.push(entry.clone());
        entry
    }

    /// Insert a leak record as if left behind by an earlier process. Test
    /// support only.
    #[cfg(any(test, feature = "test-support"))]
    pub fn seed_leak_record(&self, mut record: LeakRecord) -> LeakRecord {
        let mut tables = self.tables.lock();
        record.id = tables.leaks.len() as i64 + 1;
        tables.leaks.push(record.clone());
        record
    }

    fn record_write(&self) {
        self.writes.fetch_add(1, Ordering::SeqCst);
    }

    fn update_ozone<F>(&self, id: i64, update: F) -> Result<OzoneEntry>
    where
        F: FnOnce(&mut OzoneEntry),
    {
        self.record_write();
        let mut tables = self.tables.lock();
        let entry = tables
            .ozone
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or_else(|| PlungeError::NotFound(format!("ozone entry {id}")))?;
        update(entry);
        Ok(entry.clone())
    }
}

impl PersistenceGateway for MemoryStore {
    async fn save_temperature_sample(
        &self,
        room_temp_f: Option<f64>,
        water_temp_f: Option<f64>,
    ) -> Result<TemperatureSample> {
        self.record_write();
        let mut tables = self.tables.lock();
        let sample = TemperatureSample {
            id: tables.samples.len() as i64 + 1,
            room_temp_f,
            water_temp_f,
            timestamp: Utc::now(),
        };
        tables.samples.push(sample.clone());
        Ok(sample)
    }

    async fn get_latest_ozone_entry(&self) -> Result<Option<OzoneEntry>> {
        Ok(self.tables.lock().ozone.last().cloned())
    }

    async fn start_ozone_entry(
        &self,
        start_time: DateTime<Utc>,
        duration_minutes: u32,
    ) -> Result<OzoneEntry> {
        self.record_write();
        let mut tables = self.tables.lock();
        let entry = OzoneEntry {
            id: tables.ozone.len() as i64 + 1,
            start_time,
            end_time: None,
            duration_minutes,
            running: true,
            status_message: "Running".to_string(),
        };
        tables.ozone.push(entry.clone());
        Ok(entry)
    }

    async fn stop_ozone_entry(&self, id: i64) -> Result<OzoneEntry> {
        self.update_ozone(id, |entry| {
            entry.end_time = Some(Utc::now());
            entry.running = false;
        })
    }

    async fn update_ozone_entry_status(&self, id: i64, status: &str) -> Result<OzoneEntry> {
        self.update_ozone(id, |entry| entry.status_message = status.to_string())
    }

    async fn get_latest_leak_record(&self) -> Result<Option<LeakRecord>> {
        Ok(self.tables.lock().leaks.last().cloned())
    }

    async fn create_leak_record(&self, detected_at: DateTime<Utc>) -> Result<LeakRecord> {
        self.record_write();
        let mut tables = self.tables.lock();
        let record = LeakRecord {
            id: tables.leaks.len() as i64 + 1,
            detected_at,
            cleared_at: None,
        };
        tables.leaks.push(record.clone());
        Ok(record)
    }

    async fn clear_leak_record(&self, id: i64) -> Result<LeakRecord> {
        self.record_write();
        let mut tables = self.tables.lock();
        let record = tables
            .leaks
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| PlungeError::NotFound(format!("leak record {id}")))?;
        record.cleared_at = Some(Utc::now());
        Ok(record.clone())
    }
}
