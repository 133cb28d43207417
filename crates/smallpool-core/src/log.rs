//! Structured pool lifecycle records.
//!
//! The pool records notable decisions (pass-through, refills, arena growth,
//! salvage, scavenging, exhaustion) as in-memory records. Callers inspect or
//! drain them; nothing in the allocation path reads them back.

use serde::Serialize;

/// Pool lifecycle log level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PoolLogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl PoolLogLevel {
    /// Parse from string (case-insensitive). Unknown values map to `Warn`.
    #[must_use]
    pub fn from_str_loose(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "trace" => Self::Trace,
            "debug" => Self::Debug,
            "info" => Self::Info,
            "error" => Self::Error,
            _ => Self::Warn,
        }
    }
}

/// Structured pool lifecycle record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PoolLogRecord {
    /// Monotonic decision/event id.
    pub decision_id: u64,
    /// Correlation id for this record.
    pub trace_id: String,
    /// Severity level.
    pub level: PoolLogLevel,
    /// API symbol (`allocate`, `deallocate`, `reallocate`, `refill`, `chunk_alloc`).
    pub symbol: &'static str,
    /// Event kind (`arena_grow`, `scavenge`, ...).
    pub event: &'static str,
    /// Byte count involved in the event.
    pub size: Option<usize>,
    /// Size class involved in the event.
    pub class: Option<usize>,
    /// Machine-readable outcome label.
    pub outcome: &'static str,
    /// Free-form details.
    pub details: String,
    /// Snapshot: bytes acquired from the system allocator so far.
    pub total_acquired: usize,
}

/// In-memory sink for [`PoolLogRecord`]s, filtered by level.
#[derive(Debug)]
pub struct LifecycleLog {
    level: Option<PoolLogLevel>,
    next_decision_id: u64,
    records: Vec<PoolLogRecord>,
}

impl LifecycleLog {
    /// Creates an empty log retaining records at or above `level`.
    #[must_use]
    pub const fn new(level: Option<PoolLogLevel>) -> Self {
        Self {
            level,
            next_decision_id: 1,
            records: Vec::new(),
        }
    }

    /// Returns true if records at `level` are retained.
    #[must_use]
    pub fn enabled(&self, level: PoolLogLevel) -> bool {
        self.level.is_some_and(|min| level >= min)
    }

    /// Appends a record. `details` is only evaluated when the level is enabled.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn record(
        &mut self,
        level: PoolLogLevel,
        symbol: &'static str,
        event: &'static str,
        size: Option<usize>,
        class: Option<usize>,
        outcome: &'static str,
        total_acquired: usize,
        details: impl FnOnce() -> String,
    ) {
        if !self.enabled(level) {
            return;
        }
        let decision_id = self.next_decision_id;
        self.next_decision_id = self.next_decision_id.wrapping_add(1);
        self.records.push(PoolLogRecord {
            decision_id,
            trace_id: format!("smallpool::{}::{:016x}", symbol, decision_id),
            level,
            symbol,
            event,
            size,
            class,
            outcome,
            details: details(),
            total_acquired,
        });
    }

    /// Returns a view of the retained records.
    #[must_use]
    pub fn records(&self) -> &[PoolLogRecord] {
        &self.records
    }

    /// Drains the retained records.
    pub fn drain(&mut self) -> Vec<PoolLogRecord> {
        std::mem::take(&mut self.records)
    }
}
