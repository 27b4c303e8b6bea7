pub mod clock;
pub mod config;
pub mod control;
pub mod diagnostics;
pub mod engine;
pub mod error;
pub mod schedule;
pub mod timezone;
pub mod types;

pub use clock::{LocalClock, SyncOutcome, TimeSource};
pub use config::{ControllerConfig, DiagnosticsConfig, OutputConfig};
pub use diagnostics::{DiagnosticLog, LogStream};
pub use engine::{LightingController, OutputAction};
pub use error::ControlError;
pub use schedule::{Schedule, SLOT_COUNT};
pub use timezone::{DayOfWeek, TimeChangeRule, TimeZoneRules, Week};
pub use types::{Channel, ControllerStatus, Levels, Override};
