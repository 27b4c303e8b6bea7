use std::sync::{
    atomic::{AtomicU32, Ordering},
    Arc, Mutex, PoisonError,
};

use lights_common::{clock::UNSYNCED_STAMP, DiagnosticLog, DiagnosticsConfig, LogStream};
use tracing::info;

const UNKNOWN_TIME: u32 = u32::MAX;

/// Shared handle to the diagnostic log.
///
/// Lines are stamped with the local time last published by the tick loop, so
/// recording never needs the controller lock.
#[derive(Clone)]
pub struct Diagnostics {
    log: Arc<Mutex<DiagnosticLog>>,
    seconds_of_day: Arc<AtomicU32>,
}

impl Diagnostics {
    pub fn new(config: &DiagnosticsConfig) -> Self {
        Self {
            log: Arc::new(Mutex::new(DiagnosticLog::new(
                config.budget_bytes,
                config.reserve_bytes,
            ))),
            seconds_of_day: Arc::new(AtomicU32::new(UNKNOWN_TIME)),
        }
    }

    pub fn set_local_time(&self, seconds_of_day: Option<u32>) {
        self.seconds_of_day
            .store(seconds_of_day.unwrap_or(UNKNOWN_TIME), Ordering::Relaxed);
    }

    pub fn stamp(&self) -> String {
        match self.seconds_of_day.load(Ordering::Relaxed) {
            UNKNOWN_TIME => UNSYNCED_STAMP.to_string(),
            secs => format!(
                "{:02}:{:02}:{:02}",
                secs / 3600,
                secs / 60 % 60,
                secs % 60
            ),
        }
    }

    pub fn record(&self, message: impl AsRef<str>) {
        let message = message.as_ref();
        info!("{message}");
        let line = format!("{} - {message}", self.stamp());
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(&line);
    }

    pub fn free_bytes(&self) -> usize {
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .free_bytes()
    }

    pub fn fill(&self, stream: &mut LogStream, buf: &mut [u8], index: usize) -> usize {
        let log = self.log.lock().unwrap_or_else(PoisonError::into_inner);
        stream.fill(&log, buf, index)
    }
}
