use serde::{Deserialize, Serialize};

use crate::timezone::TimeZoneRules;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    #[serde(rename = "httpPort")]
    pub http_port: u16,
    #[serde(rename = "webRoot")]
    pub web_root: Option<String>,
    #[serde(rename = "tickIntervalMs")]
    pub tick_interval_ms: u64,
    #[serde(rename = "resyncIntervalSecs")]
    pub resync_interval_secs: u64,
    pub timezone: TimeZoneRules,
    pub diagnostics: DiagnosticsConfig,
    pub output: OutputConfig,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            http_port: 8080,
            web_root: None,
            tick_interval_ms: 1_000,
            resync_interval_secs: 600,
            timezone: TimeZoneRules::default(),
            diagnostics: DiagnosticsConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagnosticsConfig {
    #[serde(rename = "budgetBytes")]
    pub budget_bytes: usize,
    #[serde(rename = "reserveBytes")]
    pub reserve_bytes: usize,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            budget_bytes: 64 * 1024,
            reserve_bytes: 8_000,
        }
    }
}

/// Where channel duty cycles go.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum OutputConfig {
    /// Writes are only logged.
    Log,
    /// Linux sysfs PWM, one chip with a channel per lamp.
    Sysfs {
        chip: u32,
        #[serde(rename = "channelA")]
        channel_a: u32,
        #[serde(rename = "channelB")]
        channel_b: u32,
        #[serde(rename = "periodNs")]
        period_ns: u64,
    },
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self::Log
    }
}

impl ControllerConfig {
    pub fn from_json(raw: &[u8]) -> Result<Self, serde_json::Error> {
        let mut config: Self = serde_json::from_slice(raw)?;
        config.sanitize();
        Ok(config)
    }

    pub fn sanitize(&mut self) {
        if self.http_port == 0 {
            self.http_port = 8080;
        }
        self.tick_interval_ms = self.tick_interval_ms.clamp(100, 60_000);
        self.resync_interval_secs = self.resync_interval_secs.clamp(10, 86_400);
        self.timezone.sanitize();

        let defaults = DiagnosticsConfig::default();
        if self.diagnostics.budget_bytes == 0 {
            self.diagnostics.budget_bytes = defaults.budget_bytes;
        }
        if self.diagnostics.reserve_bytes >= self.diagnostics.budget_bytes {
            self.diagnostics.reserve_bytes = self.diagnostics.budget_bytes / 8;
        }

        if let OutputConfig::Sysfs { period_ns, .. } = &mut self.output {
            *period_ns = (*period_ns).clamp(1_000, 100_000_000);
        }
    }
}
