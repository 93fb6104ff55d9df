use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    pub device: DeviceConfig,
    pub serial: SerialConfig,
    pub storage: StorageConfig,
    pub remote: RemoteConfig,
    pub camera: CameraConfig,
    pub dispatch: DispatchConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize)]
pub struct DeviceConfig {
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub struct SerialConfig {
    pub path: PathBuf,
    /// Wait after opening the port before reading (controller resets on open)
    #[serde(default)]
    pub settle_ms: u64,
}

#[derive(Debug, Deserialize)]
pub struct StorageConfig {
    pub root: PathBuf,
}

#[derive(Debug, Deserialize)]
pub struct RemoteConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize)]
pub struct CameraConfig {
    pub enabled: bool,
    /// Still-capture command; `{output}` is replaced by the image path
    pub command: String,
}

#[derive(Debug, Deserialize)]
pub struct DispatchConfig {
    pub initial_delay_secs: f64,
}

#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl Config {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config file {:?}: {}", path, e))?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Failed to parse config file: {}", e))?;
        Ok(config)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.serial.settle_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.remote.timeout_secs)
    }

    pub fn initial_delay(&self) -> anyhow::Result<Duration> {
        Duration::try_from_secs_f64(self.dispatch.initial_delay_secs).map_err(|e| {
            anyhow::anyhow!(
                "Invalid dispatch.initial_delay_secs {}: {}",
                self.dispatch.initial_delay_secs,
                e
            )
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            device: DeviceConfig::default(),
            serial: SerialConfig::default(),
            storage: StorageConfig::default(),
            remote: RemoteConfig::default(),
            camera: CameraConfig::default(),
            dispatch: DispatchConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            id: "pi_zero_999".to_string(),
        }
    }
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("/dev/ttyACM0"),
            settle_ms: 2000,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("/home/pi/data"),
        }
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/prod".to_string(),
            timeout_secs: 10,
        }
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            command: "fswebcam -r 640x480 --no-banner {output}".to_string(),
        }
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            initial_delay_secs: 20.0,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}
