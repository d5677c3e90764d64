//! Constants of the piControl driver contract.
//!
//! This module collects every fixed number the runtime needs to talk to the
//! `piControl` kernel driver: the device node, the control-code family, the
//! sizes of the fixed-layout records exchanged through control codes, and the
//! process-image layout of the digital-I/O modules.
//!
//! # Process Image Layout of a Digital-I/O Module
//!
//! Offsets below are relative to the module's `input_offset`:
//!
//! ```text
//! +0   input word 1      (I_1 .. I_8)
//! +1   input word 2      (I_9 .. I_16)
//! +2   input status      (2 bytes)
//! +4   output status     (2 bytes)
//! +6   counter table     (16 x u32, one slot per input line)
//! +70  output region     (output_offset)
//! +88  input mode table  (16 x u8, one byte per input line)
//! ```
//!
//! The values must not be changed: they mirror what the module firmware
//! publishes into the process image.

// ============================================================================
// Device Handle
// ============================================================================

/// Well-known path of the piControl device node.
pub const DEFAULT_DEVICE_PATH: &str = "/dev/piControl0";

/// Name of the GPIO chip exposing the piControl edge lines.
pub const DEFAULT_GPIO_CHIP: &str = "piControl0";

/// Consumer label attached to requested GPIO lines.
pub const DEFAULT_LINE_CONSUMER: &str = "revpi-interrupt";

// ============================================================================
// Control Codes
// ============================================================================

/// Family magic of every piControl control code (`'K'`).
pub const CONTROL_CODE_MAGIC: u8 = b'K';

/// Bit position of the command number inside a control code.
pub const CONTROL_CODE_NR_SHIFT: u32 = 0;

/// Bit position of the family magic inside a control code.
pub const CONTROL_CODE_TYPE_SHIFT: u32 = 8;

/// Bit position of the size field (always zero for piControl codes).
pub const CONTROL_CODE_SIZE_SHIFT: u32 = 16;

/// Bit position of the direction field (always zero for piControl codes).
pub const CONTROL_CODE_DIR_SHIFT: u32 = 30;

/// Mask of the size field once shifted down.
pub const CONTROL_CODE_SIZE_MASK: u32 = 0x3FFF;

// ============================================================================
// Record Sizes
// ============================================================================

/// Maximum number of device descriptors returned by the device-info list.
pub const MAX_DEVICES: usize = 64;

/// Size in bytes of one device descriptor.
pub const DEVICE_INFO_SIZE: usize = 72;

/// Width of the NUL-padded name field of a variable descriptor.
pub const VARIABLE_NAME_LEN: usize = 32;

/// Size in bytes of one variable descriptor.
pub const VARIABLE_INFO_SIZE: usize = 38;

/// Size in bytes of a single-value request.
pub const VALUE_REQUEST_SIZE: usize = 4;

/// Size in bytes of a counter reset request.
pub const COUNTER_RESET_SIZE: usize = 4;

/// Size of the buffer receiving the driver's last error message.
pub const LAST_MESSAGE_LEN: usize = 256;

// ============================================================================
// Digital-I/O Module Layout
// ============================================================================

/// Offset of the counter table relative to the module's input offset.
pub const COUNTER_TABLE_OFFSET: u16 = 6;

/// Offset of the input mode table relative to the module's input offset.
pub const MODE_TABLE_OFFSET: u16 = 88;

/// Width in bytes of one counter table slot.
pub const COUNTER_SLOT_WIDTH: u16 = 4;

/// Number of input lines per bank (one input word).
pub const LINES_PER_BANK: u8 = 8;

/// Number of input lines of a digital-I/O module.
pub const MAX_INPUT_LINES: u8 = 16;

/// Bit positions at or above this value address a whole byte.
pub const WHOLE_BYTE_BIT: u8 = 8;

// ============================================================================
// Driver Events
// ============================================================================

/// Event code reported by wait-for-event after a driver reset.
pub const EVENT_RESET: i32 = 1;
