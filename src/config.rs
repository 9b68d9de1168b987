//! Static configuration
//!
//! One TOML file, loaded once at startup and never reloaded. Every
//! section has defaults matching the stock 4x4 keypad, so a file only
//! needs the values that differ (broker host and credentials, usually).
//!
//! ```toml
//! debug_mode = false
//!
//! [mqtt]
//! host = "192.168.1.10"
//! username = "keypad"
//! password = "secret"
//!
//! [keypad]
//! layout = "dual"
//! idle_color = [6, 6, 6]
//!
//! [[colors]]
//! default = { color = [255, 0, 0], label = "Red" }
//! [[colors.rules]]
//! x = 1
//! y = 0
//! color = [0, 0, 255]
//! label = "Blue"
//! ```
//!
//! All validation failures are [`ConfigError`]s and stop the process
//! before any hardware or network is touched.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::keypad::rgb_keypad::RgbKeypadSettings;
use crate::keypad::{GridSize, KeyId, Rgb};
use crate::mapping::{ColorPolicy, ColorTableConfig};
use crate::mqtt::{MqttConfig, PayloadLayout};

const CONFIG_DIR: &str = ".config/mqttkeypad";
const CONFIG_FILE: &str = "keypad.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// A color table has no `default` entry
    #[error("Color table for button set {button_set} has no default rule")]
    MissingDefaultRule { button_set: usize },

    #[error("Layout '{layout}' needs {required} color tables, found {found}")]
    MissingColorTables {
        layout: PayloadLayout,
        required: usize,
        found: usize,
    },

    #[error("No color table for button set {0}")]
    UnknownButtonSet(u8),

    #[error("Invalid key grid: {0}")]
    InvalidGrid(String),

    #[error("Invalid control key: {0}")]
    InvalidControlKey(String),

    #[error("Invalid setting: {0}")]
    Invalid(String),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SurfaceDriver {
    #[default]
    RgbKeypad,
    Headless,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoardConfig {
    pub driver: SurfaceDriver,
    pub columns: u8,
    pub rows: u8,
    pub layout: PayloadLayout,
    /// Baseline color of a key that is not signalling
    pub idle_color: Rgb,
    pub brightness: f32,
    pub i2c_bus: u8,
    pub i2c_address: u16,
    pub spi_clock_hz: u32,
    // Tables last so the TOML writer never puts a value after a table
    pub power_key: KeyId,
    pub button_set_key: KeyId,
}

impl BoardConfig {
    pub fn grid(&self) -> GridSize {
        GridSize::new(self.columns, self.rows)
    }

    pub fn rgb_keypad_settings(&self) -> RgbKeypadSettings {
        RgbKeypadSettings {
            i2c_bus: self.i2c_bus,
            i2c_address: self.i2c_address,
            spi_clock_hz: self.spi_clock_hz,
            brightness: self.brightness,
        }
    }
}

impl Default for BoardConfig {
    fn default() -> Self {
        let rgb = RgbKeypadSettings::default();
        Self {
            driver: SurfaceDriver::RgbKeypad,
            columns: 4,
            rows: 4,
            layout: PayloadLayout::Single,
            idle_color: Rgb(6, 6, 6),
            brightness: rgb.brightness,
            i2c_bus: rgb.i2c_bus,
            i2c_address: rgb.i2c_address,
            spi_clock_hz: rgb.spi_clock_hz,
            power_key: KeyId::new(0, 3),
            button_set_key: KeyId::new(3, 3),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub debounce_ms: u64,
    pub scan_interval_ms: u64,
    pub check_interval_ms: u64,
    pub tick_ms: u64,
    pub reconnect_backoff_secs: u64,
    pub link_poll_ms: u64,
}

impl TimingConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn scan_interval(&self) -> Duration {
        Duration::from_millis(self.scan_interval_ms)
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_millis(self.check_interval_ms)
    }

    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    pub fn reconnect_backoff(&self) -> Duration {
        Duration::from_secs(self.reconnect_backoff_secs)
    }

    pub fn link_poll(&self) -> Duration {
        Duration::from_millis(self.link_poll_ms)
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 200,
            scan_interval_ms: 100,
            check_interval_ms: 50,
            tick_ms: 10,
            reconnect_backoff_secs: 5,
            link_poll_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeypadConfig {
    pub debug_mode: bool,
    pub mqtt: MqttConfig,
    pub keypad: BoardConfig,
    pub timing: TimingConfig,
    pub colors: Vec<ColorTableConfig>,
}

impl Default for KeypadConfig {
    fn default() -> Self {
        Self {
            debug_mode: false,
            mqtt: MqttConfig::default(),
            keypad: BoardConfig::default(),
            timing: TimingConfig::default(),
            colors: ColorPolicy::reference().to_config(),
        }
    }
}

impl KeypadConfig {
    /// `~/.config/mqttkeypad/keypad.toml`, or relative to the working
    /// directory when there is no home directory.
    pub fn default_path() -> PathBuf {
        let mut path = dirs::home_dir().unwrap_or_else(|| {
            warn!("Could not determine home directory, using current directory");
            PathBuf::from(".")
        });
        path.push(CONFIG_DIR);
        path.push(CONFIG_FILE);
        path
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        debug!("Loading config from {}", path.display());
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_toml(&content)
    }

    /// Load `path`, writing the default configuration there first if the
    /// file does not exist yet.
    pub async fn load_or_init(path: &Path) -> Result<Self, ConfigError> {
        let io_err = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };

        if !tokio::fs::try_exists(path).await.map_err(io_err)? {
            info!("Creating default configuration at {}", path.display());
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
            }
            let content = toml::to_string_pretty(&Self::default())?;
            tokio::fs::write(path, content).await.map_err(io_err)?;
            warn!("Default configuration written, edit broker settings in {}", path.display());
        }

        Self::load(path).await
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let grid = self.keypad.grid();
        if grid.is_empty() || grid.len() > GridSize::MAX_KEYS {
            return Err(ConfigError::InvalidGrid(format!(
                "{}x{} grid must have 1..={} keys",
                grid.columns,
                grid.rows,
                GridSize::MAX_KEYS
            )));
        }
        // Coordinates travel as single digits
        if grid.columns > 10 || grid.rows > 10 {
            return Err(ConfigError::InvalidGrid(
                "columns and rows must be at most 10".to_string(),
            ));
        }
        if grid.rows < 2 {
            return Err(ConfigError::InvalidGrid(
                "need at least one publishing row above the control row".to_string(),
            ));
        }
        if self.keypad.driver == SurfaceDriver::RgbKeypad && grid != GridSize::new(4, 4) {
            return Err(ConfigError::InvalidGrid(
                "the rgb-keypad driver is a fixed 4x4 grid".to_string(),
            ));
        }

        for (name, key) in [
            ("power_key", self.keypad.power_key),
            ("button_set_key", self.keypad.button_set_key),
        ] {
            if !grid.contains(key) || key.y != grid.bottom_row() {
                return Err(ConfigError::InvalidControlKey(format!(
                    "{} {} must be on the bottom row {}",
                    name,
                    key,
                    grid.bottom_row()
                )));
            }
        }
        if self.keypad.power_key == self.keypad.button_set_key {
            return Err(ConfigError::InvalidControlKey(
                "power_key and button_set_key must differ".to_string(),
            ));
        }

        let required = self.keypad.layout.button_sets();
        if self.colors.len() < required {
            return Err(ConfigError::MissingColorTables {
                layout: self.keypad.layout,
                required,
                found: self.colors.len(),
            });
        }
        ColorPolicy::from_config(&self.colors)?;

        if self.mqtt.client_id.is_empty() {
            return Err(ConfigError::Invalid("mqtt.client_id is empty".to_string()));
        }
        if self.mqtt.publish_root.is_empty() || self.mqtt.subscribe_topic.is_empty() {
            return Err(ConfigError::Invalid("mqtt topics must not be empty".to_string()));
        }
        if self.mqtt.keep_alive_secs < 5 {
            return Err(ConfigError::Invalid(
                "mqtt.keep_alive_secs must be at least 5".to_string(),
            ));
        }
        if self.mqtt.qos > 1 {
            return Err(ConfigError::Invalid("mqtt.qos must be 0 or 1".to_string()));
        }
        if self.mqtt.connect_timeout_ms == 0 || self.mqtt.receive_timeout_ms == 0 {
            return Err(ConfigError::Invalid("mqtt timeouts must be non-zero".to_string()));
        }

        let t = &self.timing;
        if [t.scan_interval_ms, t.check_interval_ms, t.tick_ms, t.link_poll_ms].contains(&0) {
            return Err(ConfigError::Invalid("timing periods must be non-zero".to_string()));
        }
        if !(0.0..=1.0).contains(&self.keypad.brightness) {
            return Err(ConfigError::Invalid(
                "keypad.brightness must be within 0.0-1.0".to_string(),
            ));
        }

        Ok(())
    }
}
