use chrono::{DateTime, Duration, FixedOffset, Timelike, Utc};

use crate::timezone::TimeZoneRules;

pub const UNSYNCED_STAMP: &str = "00:00:00";

/// A feed of current UTC. `None` means the read failed or the source has
/// nothing valid yet.
pub trait TimeSource {
    fn poll(&mut self) -> Option<DateTime<Utc>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    NotDue,
    Synced { first: bool },
    Failed,
}

/// Local time kept by ticking, corrected from a time source every
/// `resync_interval_ms`.
///
/// Starts unsynchronized and switches to synchronized on the first good read;
/// it never goes back. Failed reads leave the ticking time untouched.
#[derive(Debug, Clone)]
pub struct LocalClock {
    rules: TimeZoneRules,
    utc: Option<DateTime<Utc>>,
    last_sync_ms: Option<u64>,
    resync_interval_ms: u64,
}

impl LocalClock {
    pub fn new(rules: TimeZoneRules, resync_interval_ms: u64) -> Self {
        Self {
            rules,
            utc: None,
            last_sync_ms: None,
            resync_interval_ms,
        }
    }

    pub fn rules(&self) -> &TimeZoneRules {
        &self.rules
    }

    pub fn is_synchronized(&self) -> bool {
        self.utc.is_some()
    }

    pub fn resync_due(&self, now_ms: u64) -> bool {
        match self.last_sync_ms {
            Some(last) => now_ms.saturating_sub(last) >= self.resync_interval_ms,
            None => true,
        }
    }

    pub fn sync(&mut self, utc: DateTime<Utc>, now_ms: u64) -> bool {
        let first = self.utc.is_none();
        self.utc = Some(utc);
        self.last_sync_ms = Some(now_ms);
        first
    }

    /// Reads `source` if a re-sync is due.
    pub fn refresh(&mut self, source: &mut impl TimeSource, now_ms: u64) -> SyncOutcome {
        if !self.resync_due(now_ms) {
            return SyncOutcome::NotDue;
        }
        match source.poll() {
            Some(utc) => SyncOutcome::Synced {
                first: self.sync(utc, now_ms),
            },
            None => SyncOutcome::Failed,
        }
    }

    /// Local heartbeat between syncs.
    pub fn advance(&mut self, elapsed: Duration) {
        if let Some(utc) = self.utc.as_mut() {
            *utc += elapsed;
        }
    }

    pub fn local(&self) -> Option<DateTime<FixedOffset>> {
        self.utc.map(|utc| self.rules.to_local(utc))
    }

    /// Local hour 0..=23, or `None` before the first sync.
    pub fn hour(&self) -> Option<u8> {
        self.local().map(|local| local.hour() as u8)
    }

    pub fn seconds_of_day(&self) -> Option<u32> {
        self.local()
            .map(|local| local.num_seconds_from_midnight())
    }

    pub fn formatted(&self) -> String {
        self.local()
            .map(|local| local.format("%H:%M:%S").to_string())
            .unwrap_or_else(|| UNSYNCED_STAMP.to_string())
    }
}
