//! The RevPi board facade.
//!
//! `RevPiBoard` ties the components together behind the handful of queries
//! a host framework needs: analog readers, digital interrupts, counter and
//! encoder values, process-image pins and a status dump of the discovered
//! modules.
//!
//! # Examples
//!
//! ```
//! use revpi_hardware::board::RevPiBoard;
//! use revpi_hardware::config::BoardConfig;
//! use revpi_hardware::devices::LineSource;
//! use revpi_hardware::mock::{MockLineBank, MockPiControl};
//!
//! # fn main() -> revpi_core::Result<()> {
//! let (device, handle) = MockPiControl::builder().dio_module(32, 113, 1).build();
//! handle.set_input_mode(113, 0, 1);
//! handle.set_counter(113, 0, 17);
//!
//! let board = RevPiBoard::with_device(
//!     BoardConfig::default(),
//!     device.into(),
//!     LineSource::Mock(MockLineBank::default()),
//! )?;
//!
//! assert_eq!(board.counter_value("I_1")?, 17);
//! assert_eq!(board.status()?.devices[0].name, "RevPi DIO");
//! # Ok(())
//! # }
//! ```

use crate::analog::AnalogReader;
use crate::catalog::DeviceCatalog;
use crate::channel::ControlChannel;
use crate::config::BoardConfig;
use crate::counter::{CounterInput, CounterPin, CounterPinController, EncoderInput, PinKind};
use crate::devices::{AnyControlDevice, LineSource};
use crate::monitor::{EventMonitor, InterruptSubscription, TickHandler};
use crate::pin::ProcessPin;
use crate::resolver::AddressResolver;
use chrono::{DateTime, Utc};
use revpi_core::types::{DeviceRecord, InputMode, Region};
use revpi_core::{Error, Result};
use serde::Serialize;
use std::ops::Range;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// One discovered module, as reported by [`RevPiBoard::status`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceSummary {
    pub slot: u8,
    pub module_type: u16,
    pub name: String,
    pub serial_number: u32,
    pub input: Range<u16>,
    pub output: Range<u16>,
    pub config: Range<u16>,
    pub digital_io: bool,
}

impl From<&DeviceRecord> for DeviceSummary {
    fn from(record: &DeviceRecord) -> Self {
        Self {
            slot: record.slot,
            module_type: record.module_type,
            name: record.friendly_name().to_string(),
            serial_number: record.serial_number,
            input: record.region(Region::Input),
            output: record.region(Region::Output),
            config: record.region(Region::Config),
            digital_io: record.is_digital_io(),
        }
    }
}

/// Snapshot of the modules attached to the fieldbus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    pub devices: Vec<DeviceSummary>,
    pub taken_at: DateTime<Utc>,
}

/// Process-state query surface of a Revolution Pi.
#[derive(Debug)]
pub struct RevPiBoard {
    config: BoardConfig,
    channel: Arc<ControlChannel>,
    resolver: AddressResolver,
    pins: CounterPinController,
    monitor: EventMonitor,
}

impl RevPiBoard {
    /// Open the device node named in `config` and request edge lines from
    /// its GPIO chip.
    ///
    /// The discovered modules are logged once at startup.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for an invalid configuration or
    /// [`Error::DeviceOpenFailed`] if the node cannot be opened.
    pub fn open(config: BoardConfig) -> Result<Self> {
        config.validate()?;
        let channel = ControlChannel::open(&config.device_path)?;
        let lines = LineSource::Gpiod {
            chip: config.gpio_chip.clone(),
            consumer: config.line_consumer.clone(),
        };
        Self::assemble(config, channel, lines)
    }

    /// Build a board on an already opened device and line source.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for an invalid configuration, or the error
    /// of the initial device enumeration.
    pub fn with_device(
        config: BoardConfig,
        device: AnyControlDevice,
        lines: LineSource,
    ) -> Result<Self> {
        config.validate()?;
        Self::assemble(config, ControlChannel::new(device), lines)
    }

    fn assemble(config: BoardConfig, channel: ControlChannel, lines: LineSource) -> Result<Self> {
        let channel = Arc::new(channel);
        let board = Self {
            resolver: AddressResolver::new(Arc::clone(&channel)),
            pins: CounterPinController::new(Arc::clone(&channel)),
            monitor: EventMonitor::new(lines),
            channel,
            config,
        };
        board.status()?;
        Ok(board)
    }

    /// The shared driver channel.
    pub fn channel(&self) -> &Arc<ControlChannel> {
        &self.channel
    }

    pub fn catalog(&self) -> &DeviceCatalog {
        self.resolver.catalog()
    }

    pub fn resolver(&self) -> &AddressResolver {
        &self.resolver
    }

    pub fn config(&self) -> &BoardConfig {
        &self.config
    }

    /// Names of the configured analog readers.
    pub fn analog_reader_names(&self) -> &[String] {
        &self.config.analog_readers
    }

    /// Analog reader for `name`.
    ///
    /// The name is resolved once here so that a typo fails early.
    pub fn analog_reader(&self, name: &str) -> Result<AnalogReader> {
        let variable = self.resolver.find_variable(name)?;
        debug!(name, address = variable.address, "Analog reader created");
        Ok(AnalogReader::new(Arc::clone(&self.channel), name))
    }

    /// Digital input `name` as an interrupt-capable pin.
    ///
    /// Counter mode is tried first; a line the firmware runs as an encoder
    /// is accepted as an encoder.
    pub fn digital_interrupt(&self, name: &str) -> Result<CounterPin> {
        let resolved = self.resolver.resolve(name)?;
        let located = CounterPin::locate(Arc::clone(&self.channel), &resolved)?;
        match located.enable(PinKind::Counter) {
            Err(Error::NotConfiguredAsCounter { mode, .. }) if mode == InputMode::ENCODER_BYTE => {
                located.enable(PinKind::Encoder)
            }
            other => other,
        }
    }

    /// Digital input `name` as a pulse counter.
    pub fn counter(&self, name: &str) -> Result<CounterInput> {
        self.pins.counter(name)
    }

    /// Digital input `name` as a quadrature encoder.
    pub fn encoder(&self, name: &str) -> Result<EncoderInput> {
        self.pins.encoder(name)
    }

    /// Current counter or encoder value of `name`.
    pub fn counter_value(&self, name: &str) -> Result<u32> {
        self.digital_interrupt(name)?.value()
    }

    /// Process-image pin `name`.
    pub fn gpio_pin(&self, name: &str) -> Result<ProcessPin> {
        ProcessPin::open(Arc::clone(&self.channel), name)
    }

    /// Start delivering edges of digital input `name` to `handler`.
    ///
    /// # Errors
    ///
    /// Any error of [`digital_interrupt`](Self::digital_interrupt), or
    /// `EventLine` if the line cannot be requested.
    pub async fn subscribe(
        &self,
        name: &str,
        handler: TickHandler,
    ) -> Result<InterruptSubscription> {
        let pin = self.digital_interrupt(name)?;
        self.monitor.subscribe(pin, handler).await
    }

    /// Enumerate the active modules and log one line per module.
    pub fn status(&self) -> Result<StatusReport> {
        let devices = self.catalog().list_devices()?;
        for device in &devices {
            info!(
                slot = device.slot,
                module_type = device.module_type,
                name = device.friendly_name(),
                input_offset = device.input_offset,
                output_offset = device.output_offset,
                "Device"
            );
        }
        Ok(StatusReport {
            devices: devices.iter().map(DeviceSummary::from).collect(),
            taken_at: Utc::now(),
        })
    }

    /// Analog outputs are not driven by this board.
    pub fn write_analog(&self, name: &str, _value: i32) -> Result<()> {
        Err(Error::unsupported(format!("write_analog {name}")))
    }

    pub fn set_power_mode(&self, _duration: Option<Duration>) -> Result<()> {
        Err(Error::unsupported("set_power_mode"))
    }

    pub fn spi(&self, name: &str) -> Result<()> {
        Err(Error::unsupported(format!("spi {name}")))
    }

    pub fn i2c(&self, name: &str) -> Result<()> {
        Err(Error::unsupported(format!("i2c {name}")))
    }

    /// Cancel every subscription and close the device handle.
    ///
    /// Subscriptions are only signalled, not awaited. If pins created by
    /// this board are still alive, the handle closes when the last of them
    /// is dropped and this returns `Ok`.
    ///
    /// # Errors
    ///
    /// Returns the close error of the device handle.
    pub fn close(self) -> Result<()> {
        info!("Closing RevPi board");
        self.monitor.shutdown();

        let Self {
            channel,
            resolver,
            pins,
            ..
        } = self;
        drop(resolver);
        drop(pins);

        match Arc::try_unwrap(channel) {
            Ok(channel) => channel.close()?,
            Err(_) => warn!("piControl channel still shared; closing when released"),
        }
        info!("Board closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockLineBank, MockPiControl, MockPiControlHandle};
    use crate::traits::{PositionEncoder, PulseCounter};

    fn board() -> (RevPiBoard, MockPiControlHandle) {
        let (device, handle) = MockPiControl::builder()
            .dio_module(32, 113, 1)
            .dio_module(33, 305, 2)
            .build();
        let config = BoardConfig::default().analog_reader("InputValue_1");
        let lines = LineSource::Mock(MockLineBank::default());
        let board = RevPiBoard::with_device(config, device.into(), lines).unwrap();
        (board, handle)
    }

    #[test]
    fn test_status_report() {
        let (board, _handle) = board();
        let report = board.status().unwrap();
        assert_eq!(report.devices.len(), 2);
        assert_eq!(report.devices[1].slot, 33);
        assert_eq!(report.devices[0].input, 113..183);
        assert!(report.devices[0].digital_io);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["devices"][0]["name"], "RevPi DIO");
    }

    #[test]
    fn test_digital_interrupt_falls_back_to_encoder() {
        let (board, handle) = board();
        handle.set_input_mode(113, 0, 1);
        handle.set_input_mode(113, 2, InputMode::ENCODER_BYTE);

        assert_eq!(board.digital_interrupt("I_1").unwrap().mode(), InputMode::Counter);
        assert_eq!(board.digital_interrupt("I_3").unwrap().mode(), InputMode::Encoder);
        assert!(matches!(
            board.digital_interrupt("I_2"),
            Err(Error::NotConfiguredAsCounter { mode: 0, .. })
        ));
    }

    #[test]
    fn test_counter_and_encoder_views() {
        let (board, handle) = board();
        handle.set_input_mode(305, 4, 1);
        handle.set_input_mode(305, 6, InputMode::ENCODER_BYTE);
        handle.set_counter(305, 4, 12);
        handle.set_counter(305, 6, u32::MAX);

        assert_eq!(board.counter("I_5_i02").unwrap().count().unwrap(), 12);
        assert_eq!(board.encoder("Counter_7_i02").unwrap().position().unwrap(), -1);
        assert!(board.encoder("I_5_i02").is_err());
    }

    #[test]
    fn test_analog_reader_names() {
        let (board, _handle) = board();
        assert_eq!(board.analog_reader_names(), ["InputValue_1".to_string()]);
        assert!(matches!(
            board.analog_reader("InputValue_1"),
            Err(Error::VariableNotFound { .. })
        ));
    }

    #[test]
    fn test_unsupported_operations() {
        let (board, _handle) = board();
        assert!(matches!(board.set_power_mode(None), Err(Error::Unsupported { .. })));
        assert!(board.write_analog("OutputValue_1", 5).is_err());
        assert!(board.spi("spi0").is_err());
        assert!(board.i2c("i2c1").is_err());
    }

    #[test]
    fn test_close_releases_handle() {
        let (board, handle) = board();
        board.close().unwrap();
        assert!(handle.is_closed());
    }

    #[test]
    fn test_close_with_live_pin() {
        let (board, handle) = board();
        handle.set_input_mode(113, 0, 1);
        let pin = board.digital_interrupt("I_1").unwrap();

        board.close().unwrap();
        assert!(!handle.is_closed());
        assert!(pin.value().is_ok());
    }
}
