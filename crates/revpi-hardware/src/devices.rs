//! Enum wrappers for hardware device dispatch.
//!
//! `EdgeLine` carries an `async fn`, so `Box<dyn EdgeLine>` is not
//! available. The enums in this module give concrete dispatch over the
//! real and mock backends instead; hardware-only variants sit behind feature
//! flags.
//!
//! # Examples
//!
//! ```
//! use revpi_hardware::devices::AnyControlDevice;
//! use revpi_hardware::mock::MockPiControl;
//!
//! let (device, _handle) = MockPiControl::new();
//! let any_device = AnyControlDevice::Mock(device);
//! ```

#[cfg(feature = "hardware-gpiod")]
use crate::gpiod::GpiodLine;
use crate::mock::{MockEdgeLine, MockLineBank, MockPiControl};
use crate::picontrol::PiControlFile;
use crate::traits::{ControlDevice, EdgeEvent, EdgeLine};
use revpi_core::Result;
#[cfg(not(feature = "hardware-gpiod"))]
use revpi_core::Error;
use std::io;
use std::task::{Context, Poll};

/// Enum wrapper for the piControl device handle.
#[derive(Debug)]
#[non_exhaustive]
pub enum AnyControlDevice {
    /// The kernel driver's device node.
    PiControl(PiControlFile),

    /// In-memory driver emulation.
    Mock(MockPiControl),
}

impl ControlDevice for AnyControlDevice {
    fn control(&self, code: u32, arg: Option<&mut [u8]>) -> io::Result<i32> {
        match self {
            Self::PiControl(device) => device.control(code, arg),
            Self::Mock(device) => device.control(code, arg),
        }
    }

    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        match self {
            Self::PiControl(device) => device.read_at(buf, offset),
            Self::Mock(device) => device.read_at(buf, offset),
        }
    }

    fn write_at(&self, buf: &[u8], offset: u64) -> io::Result<usize> {
        match self {
            Self::PiControl(device) => device.write_at(buf, offset),
            Self::Mock(device) => device.write_at(buf, offset),
        }
    }

    fn close(self) -> io::Result<()> {
        match self {
            Self::PiControl(device) => device.close(),
            Self::Mock(device) => device.close(),
        }
    }
}

impl From<MockPiControl> for AnyControlDevice {
    fn from(device: MockPiControl) -> Self {
        Self::Mock(device)
    }
}

/// Enum wrapper for edge-line dispatch.
#[derive(Debug)]
#[non_exhaustive]
pub enum AnyEdgeLine {
    /// Channel-fed line for development and testing.
    Mock(MockEdgeLine),

    /// GPIO character-device line.
    #[cfg(feature = "hardware-gpiod")]
    Gpiod(GpiodLine),
}

impl EdgeLine for AnyEdgeLine {
    fn poll_next_edge(&mut self, cx: &mut Context<'_>) -> Poll<Result<EdgeEvent>> {
        match self {
            Self::Mock(line) => line.poll_next_edge(cx),
            #[cfg(feature = "hardware-gpiod")]
            Self::Gpiod(line) => line.poll_next_edge(cx),
        }
    }
}

/// Where edge lines are requested from.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum LineSource {
    /// A GPIO chip, by name, with the consumer label to attach.
    Gpiod { chip: String, consumer: String },

    /// A mock bank.
    Mock(MockLineBank),
}

impl LineSource {
    /// Request the line at `offset` for both-edge events.
    ///
    /// # Errors
    ///
    /// Returns `EventLine` if the line cannot be requested, or if GPIO
    /// support was not compiled in.
    pub async fn request(&self, offset: u32) -> Result<AnyEdgeLine> {
        match self {
            Self::Mock(bank) => Ok(AnyEdgeLine::Mock(bank.request(offset))),
            #[cfg(feature = "hardware-gpiod")]
            Self::Gpiod { chip, consumer } => Ok(AnyEdgeLine::Gpiod(
                GpiodLine::request(chip, offset, consumer).await?,
            )),
            #[cfg(not(feature = "hardware-gpiod"))]
            Self::Gpiod { chip, .. } => Err(Error::event_line(format!(
                "cannot request line {offset} on {chip}: built without hardware-gpiod"
            ))),
        }
    }
}
