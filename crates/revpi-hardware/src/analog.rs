//! Raw analog sample reads.
//!
//! Analog modules publish their samples as 8, 16 or 32-bit little-endian
//! values in the input region. No calibration or scaling is applied.

use crate::channel::ControlChannel;
use crate::resolver::AddressResolver;
use revpi_core::types::{BitLength, VariableDescriptor};
use revpi_core::{Error, Result};
use std::sync::Arc;

/// Decode a sample of `length` from `raw`, which must hold exactly
/// `length.byte_width()` bytes.
///
/// A 1-bit variable yields the bit at `bit`.
///
/// # Errors
///
/// Returns [`Error::Decode`] if `raw` has the wrong width.
pub fn decode_sample(length: BitLength, bit: u8, raw: &[u8]) -> Result<u32> {
    let value = match (length, raw) {
        (BitLength::Bit, &[byte]) => u32::from((byte >> (bit & 7)) & 1),
        (BitLength::Byte, &[byte]) => u32::from(byte),
        (BitLength::Word, &[lo, hi]) => u32::from(u16::from_le_bytes([lo, hi])),
        (BitLength::DoubleWord, &[a, b, c, d]) => u32::from_le_bytes([a, b, c, d]),
        _ => {
            return Err(Error::decode(format!(
                "{}-bit sample needs {} bytes, got {}",
                length.bits(),
                length.byte_width(),
                raw.len()
            )));
        }
    };
    Ok(value)
}

/// Reads one named analog value.
///
/// The name is resolved again on every read.
///
/// # Examples
///
/// ```
/// use revpi_core::types::BitLength;
/// use revpi_hardware::analog::AnalogReader;
/// use revpi_hardware::channel::ControlChannel;
/// use revpi_hardware::mock::MockPiControl;
/// use std::sync::Arc;
///
/// let (device, handle) = MockPiControl::builder()
///     .variable("InputValue_1", 500, 0, BitLength::Word)
///     .build();
/// handle.write_image(500, &[0x10, 0x27]);
///
/// let reader = AnalogReader::new(Arc::new(ControlChannel::new(device.into())), "InputValue_1");
/// assert_eq!(reader.read().unwrap(), 10_000);
/// ```
#[derive(Debug, Clone)]
pub struct AnalogReader {
    name: String,
    channel: Arc<ControlChannel>,
    resolver: AddressResolver,
}

impl AnalogReader {
    pub fn new(channel: Arc<ControlChannel>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            resolver: AddressResolver::new(Arc::clone(&channel)),
            channel,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current raw sample.
    ///
    /// # Errors
    ///
    /// Returns [`Error::VariableNotFound`] if the name no longer resolves,
    /// or [`Error::ShortRead`] if the driver delivers fewer bytes than the
    /// variable width.
    pub fn read(&self) -> Result<u32> {
        let variable = self.resolver.find_variable(&self.name)?;
        read_value(&self.channel, &variable)
    }
}

/// Read and decode the current value of `variable`.
pub(crate) fn read_value(channel: &ControlChannel, variable: &VariableDescriptor) -> Result<u32> {
    let mut raw = vec![0u8; variable.length.byte_width()];
    channel.read_exact_at(u64::from(variable.address), &mut raw)?;
    decode_sample(variable.length, variable.bit, &raw)
}
