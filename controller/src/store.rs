use std::{io::ErrorKind, path::PathBuf, sync::Arc};

use lights_common::{ControllerConfig, Schedule, SLOT_COUNT};
use tokio::sync::Mutex;

/// Files under the data directory: `config.json` and the 48-byte
/// `settings.bin` block.
#[derive(Clone)]
pub struct AppStore {
    config_path: Arc<PathBuf>,
    settings_path: Arc<PathBuf>,
    lock: Arc<Mutex<()>>,
}

impl AppStore {
    pub fn new(data_dir: PathBuf) -> Self {
        Self {
            config_path: Arc::new(data_dir.join("config.json")),
            settings_path: Arc::new(data_dir.join("settings.bin")),
            lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn from_env() -> Self {
        let data_dir = std::env::var("LIGHTS_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./.lights"));
        Self::new(data_dir)
    }

    pub async fn load_config(&self) -> anyhow::Result<ControllerConfig> {
        let _guard = self.lock.lock().await;
        match tokio::fs::read(self.config_path.as_ref()).await {
            Ok(raw) => Ok(ControllerConfig::from_json(&raw)?),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(ControllerConfig::default()),
            Err(err) => Err(err.into()),
        }
    }

    /// A missing block reads as all zeros and a short one is zero-padded.
    pub async fn load_schedule(&self) -> anyhow::Result<Schedule> {
        let _guard = self.lock.lock().await;
        match tokio::fs::read(self.settings_path.as_ref()).await {
            Ok(raw) => Ok(Schedule::from_block(&raw)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(Schedule::default()),
            Err(err) => Err(err.into()),
        }
    }

    pub async fn save_schedule(&self, schedule: &Schedule) -> anyhow::Result<()> {
        let _guard = self.lock.lock().await;
        let path = self.settings_path.as_ref().clone();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let block: &[u8; SLOT_COUNT] = schedule.values();
        tokio::fs::write(path, block).await?;
        Ok(())
    }
}
