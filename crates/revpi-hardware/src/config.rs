//! Board configuration.

use revpi_core::constants::{DEFAULT_DEVICE_PATH, DEFAULT_GPIO_CHIP, DEFAULT_LINE_CONSUMER};
use revpi_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for a [`RevPiBoard`](crate::board::RevPiBoard).
///
/// Missing fields take their defaults when deserialized.
///
/// # Examples
///
/// ```
/// use revpi_hardware::config::BoardConfig;
///
/// let config = BoardConfig::new("/dev/piControl0")
///     .analog_reader("InputValue_1")
///     .analog_reader("InputValue_2");
///
/// assert!(config.validate().is_ok());
/// assert_eq!(config.gpio_chip, "piControl0");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoardConfig {
    /// Path of the piControl device node
    pub device_path: PathBuf,

    /// GPIO chip carrying the edge lines
    pub gpio_chip: String,

    /// Consumer label attached to requested lines
    pub line_consumer: String,

    /// Variable names exposed as analog readers
    pub analog_readers: Vec<String>,

    /// Pending-event capacity of mock edge lines
    pub event_buffer: usize,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            device_path: PathBuf::from(DEFAULT_DEVICE_PATH),
            gpio_chip: DEFAULT_GPIO_CHIP.to_string(),
            line_consumer: DEFAULT_LINE_CONSUMER.to_string(),
            analog_readers: Vec::new(),
            event_buffer: 64,
        }
    }
}

impl BoardConfig {
    /// Create a configuration for the device node at `device_path`.
    pub fn new(device_path: impl Into<PathBuf>) -> Self {
        Self {
            device_path: device_path.into(),
            ..Default::default()
        }
    }

    /// Set the GPIO chip name
    pub fn gpio_chip(mut self, chip: impl Into<String>) -> Self {
        self.gpio_chip = chip.into();
        self
    }

    /// Add an analog reader
    pub fn analog_reader(mut self, name: impl Into<String>) -> Self {
        self.analog_readers.push(name.into());
        self
    }

    /// Set the edge-event buffer size
    pub fn event_buffer(mut self, size: usize) -> Self {
        self.event_buffer = size;
        self
    }

    /// Check the configuration for values the board cannot work with.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for an empty device path, an empty chip
    /// name, a zero event buffer or a blank analog reader name.
    pub fn validate(&self) -> Result<()> {
        if self.device_path.as_os_str().is_empty() {
            return Err(Error::config("device_path must not be empty"));
        }
        if self.gpio_chip.is_empty() {
            return Err(Error::config("gpio_chip must not be empty"));
        }
        if self.event_buffer == 0 {
            return Err(Error::config("event_buffer must be at least 1"));
        }
        if let Some(index) = self.analog_readers.iter().position(|n| n.trim().is_empty()) {
            return Err(Error::config(format!(
                "analog_readers[{index}] must not be blank"
            )));
        }
        Ok(())
    }
}
