//! Exclusive access to the piControl device handle.
//!
//! `ControlChannel` owns the single device handle of the process. Control
//! codes are dispatched through a mutex gate because several of them have
//! driver-global side effects (stopping I/O cycling, resetting the driver).
//! Process-image transfers bypass the gate: they use positioned I/O and may
//! run concurrently at disjoint offsets.
//!
//! Nothing here retries. A driver error is returned to the caller as-is.

use crate::devices::AnyControlDevice;
use crate::picontrol::PiControlFile;
use crate::traits::ControlDevice;
use parking_lot::Mutex;
use revpi_core::command::Command;
use revpi_core::constants::{DEVICE_INFO_SIZE, EVENT_RESET, LAST_MESSAGE_LEN, VALUE_REQUEST_SIZE};
use revpi_core::types::{CounterReset, DeviceRecord, ValueRequest};
use revpi_core::{Error, Result};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Requested state change of the driver's I/O cycling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoCycling {
    /// Resume exchanging process data with the modules.
    Start,
    /// Freeze the process image.
    Stop,
    /// Flip the current state.
    Toggle,
}

impl IoCycling {
    fn request(self) -> i32 {
        match self {
            Self::Start => 0,
            Self::Stop => 1,
            Self::Toggle => 2,
        }
    }
}

/// Event reported by wait-for-event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverEvent {
    /// The driver was reset and reloaded its configuration.
    Reset,
    /// Any other event code.
    Other(i32),
}

impl DriverEvent {
    fn from_code(code: i32) -> Self {
        if code == EVENT_RESET {
            Self::Reset
        } else {
            Self::Other(code)
        }
    }
}

/// The process-wide piControl handle.
///
/// Share it behind an `Arc`; every component takes a reference, none opens
/// its own handle.
///
/// # Examples
///
/// ```
/// use revpi_hardware::channel::ControlChannel;
/// use revpi_hardware::mock::MockPiControl;
///
/// let (device, handle) = MockPiControl::new();
/// let channel = ControlChannel::new(device.into());
///
/// channel.write_at(40, &[0xAB]).unwrap();
/// assert_eq!(channel.read_at(40, 1).unwrap(), vec![0xAB]);
/// assert_eq!(handle.read_image(40, 1), vec![0xAB]);
/// ```
#[derive(Debug)]
pub struct ControlChannel {
    device: AnyControlDevice,
    gate: Mutex<()>,
}

impl ControlChannel {
    /// Open the device node at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DeviceOpenFailed`] if the node cannot be opened.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = PiControlFile::open(path).map_err(|source| Error::DeviceOpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        info!(path = %path.display(), "piControl channel open");
        Ok(Self::new(AnyControlDevice::PiControl(file)))
    }

    /// Wrap an already opened device.
    pub fn new(device: AnyControlDevice) -> Self {
        Self {
            device,
            gate: Mutex::new(()),
        }
    }

    /// Dispatch `command` with an optional in/out payload.
    ///
    /// Returns the driver's return value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ControlCodeFailed`] carrying the OS error.
    pub fn send_control(&self, command: Command, payload: Option<&mut [u8]>) -> Result<i32> {
        let _gate = self.gate.lock();
        self.dispatch(command, payload)
    }

    fn dispatch(&self, command: Command, payload: Option<&mut [u8]>) -> Result<i32> {
        self.device
            .control(command.code(), payload)
            .map_err(|source| {
                warn!(%command, error = %source, "Control code failed");
                Error::control(command, source)
            })
    }

    /// Read up to `len` bytes of the process image at `offset`.
    ///
    /// The returned buffer holds the bytes the driver actually delivered,
    /// which may be fewer than `len`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the transfer fails.
    pub fn read_at(&self, offset: u64, len: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        let n = self.device.read_at(&mut buf, offset)?;
        buf.truncate(n);
        Ok(buf)
    }

    /// Fill `buf` from the process image at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ShortRead`] if the driver delivers fewer bytes than
    /// `buf` holds, or [`Error::Io`] if the transfer fails.
    pub fn read_exact_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let actual = self.device.read_at(buf, offset)?;
        if actual != buf.len() {
            return Err(Error::ShortRead {
                offset,
                expected: buf.len(),
                actual,
            });
        }
        Ok(())
    }

    /// Write `bytes` into the process image at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ShortWrite`] if the driver accepts fewer bytes, or
    /// [`Error::Io`] if the transfer fails.
    pub fn write_at(&self, offset: u64, bytes: &[u8]) -> Result<()> {
        let actual = self.device.write_at(bytes, offset)?;
        if actual != bytes.len() {
            return Err(Error::ShortWrite {
                offset,
                expected: bytes.len(),
                actual,
            });
        }
        Ok(())
    }

    /// Reset the driver; it reloads its configuration file.
    pub fn reset_driver(&self) -> Result<()> {
        self.send_control(Command::Reset, None)?;
        info!("piControl driver reset");
        Ok(())
    }

    /// The driver's last diagnostic message.
    pub fn last_message(&self) -> Result<String> {
        let mut raw = [0u8; LAST_MESSAGE_LEN];
        self.send_control(Command::GetLastMessage, Some(&mut raw))?;
        let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
        Ok(String::from_utf8_lossy(&raw[..end]).into_owned())
    }

    /// Start, stop or toggle I/O cycling.
    ///
    /// Returns `true` if I/O cycling is stopped afterwards.
    pub fn set_io_cycling(&self, request: IoCycling) -> Result<bool> {
        let mut raw = request.request().to_ne_bytes();
        let stopped = self.send_control(Command::StopIo, Some(&mut raw))? != 0;
        info!(?request, stopped, "I/O cycling changed");
        Ok(stopped)
    }

    /// Arm the output watchdog of this handle.
    ///
    /// If the handle performs no write within `period`, the driver resets
    /// all outputs to zero. A zero period disarms the watchdog.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the period does not fit the driver's
    /// millisecond field.
    pub fn set_output_watchdog(&self, period: Duration) -> Result<()> {
        let millis = libc::c_ulong::try_from(period.as_millis())
            .map_err(|_| Error::config(format!("watchdog period {period:?} is too long")))?;
        let mut raw = millis.to_ne_bytes();
        self.send_control(Command::SetOutputWatchdog, Some(&mut raw))?;
        debug!(millis, "Output watchdog set");
        Ok(())
    }

    /// Block until the driver reports an event.
    ///
    /// This call does not hold the control-code gate, so other commands can
    /// be dispatched while it waits.
    pub fn wait_for_event(&self) -> Result<DriverEvent> {
        let mut raw = [0u8; 4];
        self.dispatch(Command::WaitForEvent, Some(&mut raw))?;
        Ok(DriverEvent::from_code(i32::from_ne_bytes(raw)))
    }

    /// Read one bit (or a whole byte when `bit >= 8`) via get-value.
    pub fn get_value(&self, address: u16, bit: u8) -> Result<u8> {
        let mut raw = ValueRequest {
            address,
            bit,
            value: 0,
        }
        .encode();
        self.send_control(Command::GetValue, Some(&mut raw))?;
        Ok(ValueRequest::decode(&raw[..VALUE_REQUEST_SIZE])?.value)
    }

    /// Write one bit (or a whole byte when `bit >= 8`) via set-value.
    pub fn set_value(&self, address: u16, bit: u8, value: u8) -> Result<()> {
        let mut raw = ValueRequest {
            address,
            bit,
            value,
        }
        .encode();
        self.send_control(Command::SetValue, Some(&mut raw))?;
        Ok(())
    }

    /// Read one bit of the process image.
    pub fn get_bit(&self, address: u16, bit: u8) -> Result<bool> {
        Ok(self.get_value(address, bit)? != 0)
    }

    /// Set or clear one bit of the process image.
    pub fn set_bit(&self, address: u16, bit: u8, value: bool) -> Result<()> {
        self.set_value(address, bit, u8::from(value))
    }

    /// Reset counters or encoders of a digital-I/O module.
    pub fn reset_counters(&self, request: CounterReset) -> Result<()> {
        let mut raw = request.encode();
        self.send_control(Command::ResetCounter, Some(&mut raw))?;
        debug!(slot = request.slot, bitfield = request.bitfield, "Counters reset");
        Ok(())
    }

    /// Descriptor of the device at slot address `slot`.
    pub fn device_info_by_address(&self, slot: u8) -> Result<DeviceRecord> {
        let mut raw = [0u8; DEVICE_INFO_SIZE];
        raw[0] = slot;
        self.send_control(Command::GetDeviceInfo, Some(&mut raw))?;
        DeviceRecord::decode(&raw)
    }

    /// Close the device handle.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the OS reports a close failure. The handle is
    /// gone either way.
    pub fn close(self) -> Result<()> {
        self.device.close().map_err(|e| {
            warn!(error = %e, "Failed to close piControl channel");
            Error::Io(e)
        })?;
        info!("piControl channel closed");
        Ok(())
    }
}
