//! piControl control codes.
//!
//! Every operation that is not a plain process-image transfer is dispatched
//! to the driver as a control code. A code packs a command number and the
//! `'K'` family magic into one 32-bit value; the direction and size fields
//! are always zero because the payload length is implied by the command.
//!
//! ```text
//!  31   30 29          16 15          8 7            0
//! +-------+--------------+-------------+--------------+
//! |  dir  |     size     |    magic    |    number    |
//! |   0   |      0       |     'K'     |     nr       |
//! +-------+--------------+-------------+--------------+
//! ```
//!
//! # Examples
//!
//! ```
//! use revpi_core::command::{Command, control_code};
//!
//! assert_eq!(control_code(13), 0x4B0D);
//! assert_eq!(Command::GetDeviceInfoList.code(), 0x4B0D);
//! assert_eq!(Command::from_code(0x4B11), Some(Command::FindVariable));
//! ```

use crate::constants::{
    CONTROL_CODE_DIR_SHIFT, CONTROL_CODE_MAGIC, CONTROL_CODE_NR_SHIFT, CONTROL_CODE_SIZE_MASK,
    CONTROL_CODE_SIZE_SHIFT, CONTROL_CODE_TYPE_SHIFT,
};
use std::fmt;

/// Build a control code from a command number.
///
/// Bit-for-bit compatible with the driver's `_IO('K', nr)`. The direction
/// and size fields stay zero.
#[must_use]
pub const fn control_code(number: u8) -> u32 {
    ((CONTROL_CODE_MAGIC as u32) << CONTROL_CODE_TYPE_SHIFT)
        | ((number as u32) << CONTROL_CODE_NR_SHIFT)
}

/// Extract the command number from a control code.
///
/// Returns `None` if the code does not belong to the piControl family or
/// carries direction/size metadata.
#[must_use]
pub const fn command_number(code: u32) -> Option<u8> {
    let magic = ((code >> CONTROL_CODE_TYPE_SHIFT) & 0xFF) as u8;
    let size = (code >> CONTROL_CODE_SIZE_SHIFT) & CONTROL_CODE_SIZE_MASK;
    let dir = code >> CONTROL_CODE_DIR_SHIFT;
    if magic != CONTROL_CODE_MAGIC || size != 0 || dir != 0 {
        return None;
    }
    Some(((code >> CONTROL_CODE_NR_SHIFT) & 0xFF) as u8)
}

/// Commands understood by the piControl driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Command {
    /// Reset the driver and reload its configuration.
    Reset,

    /// Fetch the descriptors of all detected devices.
    GetDeviceInfoList,

    /// Fetch the descriptor of one device.
    GetDeviceInfo,

    /// Read one bit or byte of the process image.
    GetValue,

    /// Write one bit or byte of the process image.
    SetValue,

    /// Look up a variable by name.
    FindVariable,

    /// Reset counters or encoders of a digital-I/O module.
    ResetCounter,

    /// Copy the driver's last error message.
    GetLastMessage,

    /// Stop, start or toggle I/O cycling.
    StopIo,

    /// Arm the output watchdog of this handle.
    SetOutputWatchdog,

    /// Block until the driver reports an event.
    WaitForEvent,
}

impl Command {
    /// All commands, in ascending command-number order.
    pub const ALL: [Command; 11] = [
        Command::Reset,
        Command::GetDeviceInfoList,
        Command::GetDeviceInfo,
        Command::GetValue,
        Command::SetValue,
        Command::FindVariable,
        Command::ResetCounter,
        Command::GetLastMessage,
        Command::StopIo,
        Command::SetOutputWatchdog,
        Command::WaitForEvent,
    ];

    /// Driver command number.
    #[must_use]
    pub const fn number(self) -> u8 {
        match self {
            Self::Reset => 12,
            Self::GetDeviceInfoList => 13,
            Self::GetDeviceInfo => 14,
            Self::GetValue => 15,
            Self::SetValue => 16,
            Self::FindVariable => 17,
            Self::ResetCounter => 20,
            Self::GetLastMessage => 21,
            Self::StopIo => 22,
            Self::SetOutputWatchdog => 26,
            Self::WaitForEvent => 50,
        }
    }

    /// Encoded control code.
    #[must_use]
    pub const fn code(self) -> u32 {
        control_code(self.number())
    }

    /// Look up a command by its command number.
    #[must_use]
    pub fn from_number(number: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|cmd| cmd.number() == number)
    }

    /// Look up a command by its encoded control code.
    #[must_use]
    pub fn from_code(code: u32) -> Option<Self> {
        command_number(code).and_then(Self::from_number)
    }

    /// Short name used in logs and error messages.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Reset => "reset",
            Self::GetDeviceInfoList => "get-device-info-list",
            Self::GetDeviceInfo => "get-device-info",
            Self::GetValue => "get-value",
            Self::SetValue => "set-value",
            Self::FindVariable => "find-variable",
            Self::ResetCounter => "reset-counter",
            Self::GetLastMessage => "get-last-message",
            Self::StopIo => "stop-io",
            Self::SetOutputWatchdog => "set-output-watchdog",
            Self::WaitForEvent => "wait-for-event",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (0x{:04X})", self.name(), self.code())
    }
}
