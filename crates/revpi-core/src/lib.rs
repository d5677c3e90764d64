//! Binary contract of the piControl fieldbus driver.
//!
//! This crate holds everything that must match the kernel driver byte for
//! byte: control-code encoding, fixed-layout records and their codecs, the
//! process-image layout of digital-I/O modules, and module classification.
//! It performs no I/O; the runtime lives in `revpi-hardware`.
//!
//! # Examples
//!
//! ```
//! use revpi_core::command::Command;
//! use revpi_core::types::{DeviceRecord, InputMode};
//!
//! let code = Command::GetDeviceInfoList.code();
//! assert_eq!(code, 0x4B0D);
//!
//! let record = DeviceRecord { module_type: 96, active: true, ..Default::default() };
//! assert!(record.is_digital_io());
//! assert_eq!(InputMode::from_byte(3), InputMode::Encoder);
//! ```

pub mod command;
pub mod constants;
pub mod error;
pub mod module;
pub mod types;

pub use command::Command;
pub use error::{Error, Result};
pub use types::{
    BitLength, CounterReset, DeviceRecord, InputMode, Region, ValueRequest, VariableDescriptor,
};

/// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
