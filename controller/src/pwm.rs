use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::Context;
use lights_common::{types::MAX_INTENSITY, Channel, OutputAction, OutputConfig};
use tracing::{info, warn};

use crate::diagnostics::Diagnostics;

/// Sink for channel duty cycles in percent.
pub trait OutputDriver: Send {
    fn write_duty(&mut self, channel: Channel, duty: u8) -> anyhow::Result<()>;
}

/// Driver for hosts without PWM hardware; writes only show up in the log.
pub struct LogOutput;

impl OutputDriver for LogOutput {
    fn write_duty(&mut self, channel: Channel, duty: u8) -> anyhow::Result<()> {
        info!("lamp {} duty {duty}%", channel.as_str());
        Ok(())
    }
}

struct SysfsChannel {
    dir: PathBuf,
}

/// Linux sysfs PWM (`/sys/class/pwm/pwmchipN/pwmM`).
pub struct SysfsPwm {
    channels: [SysfsChannel; 2],
    period_ns: u64,
}

impl SysfsPwm {
    pub fn open(
        root: &Path,
        chip: u32,
        channel_a: u32,
        channel_b: u32,
        period_ns: u64,
    ) -> anyhow::Result<Self> {
        let chip_dir = root.join(format!("pwmchip{chip}"));
        let channels = [
            Self::export(&chip_dir, channel_a, period_ns)?,
            Self::export(&chip_dir, channel_b, period_ns)?,
        ];
        Ok(Self {
            channels,
            period_ns,
        })
    }

    fn export(chip_dir: &Path, channel: u32, period_ns: u64) -> anyhow::Result<SysfsChannel> {
        let dir = chip_dir.join(format!("pwm{channel}"));
        if !dir.exists() {
            fs::write(chip_dir.join("export"), channel.to_string()).with_context(|| {
                format!("failed to export pwm{channel} on {}", chip_dir.display())
            })?;
        }
        write_attr(&dir, "period", period_ns)?;
        write_attr(&dir, "duty_cycle", 0)?;
        write_attr(&dir, "enable", 1)?;
        Ok(SysfsChannel { dir })
    }
}

impl OutputDriver for SysfsPwm {
    fn write_duty(&mut self, channel: Channel, duty: u8) -> anyhow::Result<()> {
        let duty_ns = self.period_ns * duty.min(MAX_INTENSITY) as u64 / MAX_INTENSITY as u64;
        write_attr(&self.channels[channel.index()].dir, "duty_cycle", duty_ns)
    }
}

fn write_attr(dir: &Path, attr: &str, value: u64) -> anyhow::Result<()> {
    let path = dir.join(attr);
    fs::write(&path, value.to_string())
        .with_context(|| format!("failed to write {}", path.display()))
}

pub fn build_driver(output: &OutputConfig) -> anyhow::Result<Box<dyn OutputDriver>> {
    match output {
        OutputConfig::Log => Ok(Box::new(LogOutput)),
        OutputConfig::Sysfs {
            chip,
            channel_a,
            channel_b,
            period_ns,
        } => Ok(Box::new(SysfsPwm::open(
            Path::new("/sys/class/pwm"),
            *chip,
            *channel_a,
            *channel_b,
            *period_ns,
        )?)),
    }
}

/// Drives both channels to zero so the tick's last-written state matches the
/// hardware.
pub fn switch_off(driver: &mut dyn OutputDriver) {
    for channel in Channel::ALL {
        if let Err(err) = driver.write_duty(channel, 0) {
            warn!("failed to switch off lamp {}: {err:#}", channel.as_str());
        }
    }
}

pub fn apply_actions(
    driver: &mut dyn OutputDriver,
    actions: &[OutputAction],
    diagnostics: &Diagnostics,
) {
    for action in actions {
        let OutputAction::SetDuty { channel, duty } = *action;
        match driver.write_duty(channel, duty) {
            Ok(()) => diagnostics.record(format!(
                "Intensity lamp {} set to {duty}",
                channel.as_str()
            )),
            Err(err) => {
                warn!("pwm write failed: {err:#}");
                diagnostics.record(format!("PWM write lamp {} failed", channel.as_str()));
            }
        }
    }
}
