//! Boundary to the external audit and metrics collaborator.
//!
//! The protocol core reports authentication results, simple commands and
//! file transfers here. Storage of the records (CSV files, dashboards) lives
//! outside this crate; [`LogEventSink`] just writes them to the log.

use chrono::{DateTime, Local};
use log::info;

use crate::constants::MIB;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthOutcome {
    Authenticated,
    Rejected,
    Disconnected,
}

impl AuthOutcome {
    pub fn as_status(&self) -> &'static str {
        match self {
            AuthOutcome::Authenticated => "OK",
            AuthOutcome::Rejected => "FAIL",
            AuthOutcome::Disconnected => "DISCONNECTED",
        }
    }
}

#[derive(Debug, Clone)]
pub struct EventRecord {
    pub role: String,
    pub event: String,
    pub start: DateTime<Local>,
    pub end: DateTime<Local>,
    pub status: String,
    pub note: String,
}

#[derive(Debug, Clone)]
pub struct TransferRecord {
    pub role: String,
    pub operation: String,
    pub filename: String,
    pub bytes: u64,
    pub start: DateTime<Local>,
    pub end: DateTime<Local>,
    pub status: String,
}

impl TransferRecord {
    pub fn duration_secs(&self) -> f64 {
        let micros = (self.end - self.start).num_microseconds().unwrap_or(0).max(0);
        micros as f64 / 1_000_000.0
    }

    pub fn rate_mib_per_sec(&self) -> f64 {
        let secs = self.duration_secs();
        if secs > 0.0 {
            self.bytes as f64 / secs / MIB as f64
        } else {
            0.0
        }
    }
}

pub trait EventSink: Send + Sync {
    fn record_event(&self, record: EventRecord);

    fn record_transfer(&self, record: TransferRecord);

    fn on_auth_result(
        &self,
        role: &str,
        username: &str,
        outcome: AuthOutcome,
        start: DateTime<Local>,
        end: DateTime<Local>,
    ) {
        self.record_event(EventRecord {
            role: role.to_string(),
            event: "AUTH".to_string(),
            start,
            end,
            status: outcome.as_status().to_string(),
            note: format!("user={}", username),
        });
    }
}

#[derive(Debug, Default)]
pub struct LogEventSink;

impl EventSink for LogEventSink {
    fn record_event(&self, record: EventRecord) {
        info!(
            "[event] role={} event={} status={} duration={:.6}s {}",
            record.role,
            record.event,
            record.status,
            (record.end - record.start).num_microseconds().unwrap_or(0) as f64 / 1_000_000.0,
            record.note
        );
    }

    fn record_transfer(&self, record: TransferRecord) {
        info!(
            "[transfer] role={} op={} file={} bytes={} duration={:.6}s rate={:.3}MB/s status={}",
            record.role,
            record.operation,
            record.filename,
            record.bytes,
            record.duration_secs(),
            record.rate_mib_per_sec(),
            record.status
        );
    }
}
