//! Sync-run status model
//!
//! Persisted once per source at the end of each run so operators can see when
//! the catalog was last synchronized and how it went.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Status of the last sync run for a source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncRunStatus {
    /// Source name
    pub source: String,

    /// When the last run finished
    pub last_sync_at: Option<DateTime<Utc>>,

    /// Outcome of the last run
    pub status: SyncRunStatusValue,

    /// Error message if the last run failed
    pub error_message: Option<String>,

    /// Number of records upserted by the last run
    pub records_count: u64,
}

impl SyncRunStatus {
    /// Create a new pending status for a source
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            last_sync_at: None,
            status: SyncRunStatusValue::Pending,
            error_message: None,
            records_count: 0,
        }
    }

    /// Mark as successful with the given record count
    pub fn success(mut self, records_count: u64) -> Self {
        self.status = SyncRunStatusValue::Success;
        self.last_sync_at = Some(Utc::now());
        self.records_count = records_count;
        self.error_message = None;
        self
    }

    /// Mark as failed with the given error message
    pub fn failed(mut self, message: impl Into<String>) -> Self {
        self.status = SyncRunStatusValue::Failed;
        self.last_sync_at = Some(Utc::now());
        self.error_message = Some(message.into());
        self
    }
}

/// Outcome value for a sync run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncRunStatusValue {
    /// Sync has never been run
    #[default]
    Pending,
    /// Last run completed successfully
    Success,
    /// Last run failed
    Failed,
}

impl std::fmt::Display for SyncRunStatusValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncRunStatusValue::Pending => write!(f, "pending"),
            SyncRunStatusValue::Success => write!(f, "success"),
            SyncRunStatusValue::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for SyncRunStatusValue {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(SyncRunStatusValue::Pending),
            "success" => Ok(SyncRunStatusValue::Success),
            "failed" => Ok(SyncRunStatusValue::Failed),
            other => Err(format!("unknown sync status: {other}")),
        }
    }
}
