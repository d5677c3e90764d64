//! Fixed-layout records exchanged with the piControl driver.
//!
//! The driver is C code and lays its records out with natural alignment,
//! little-endian on every RevPi target. Each record here owns its byte
//! codec; nothing outside this module depends on field offsets.
//!
//! | Record                 | Size | Used by                               |
//! |------------------------|------|---------------------------------------|
//! | [`DeviceRecord`]       | 72   | get-device-info(-list)                |
//! | [`VariableDescriptor`] | 38   | find-variable                         |
//! | [`ValueRequest`]       | 4    | get-value, set-value                  |
//! | [`CounterReset`]       | 4    | reset-counter                         |

use crate::constants::{
    COUNTER_RESET_SIZE, DEVICE_INFO_SIZE, VALUE_REQUEST_SIZE, VARIABLE_INFO_SIZE,
    VARIABLE_NAME_LEN, WHOLE_BYTE_BIT,
};
use crate::error::{Error, Result};
use crate::module;
use bytes::{Buf, BufMut};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;

fn ensure_len(raw: &[u8], expected: usize, record: &str) -> Result<()> {
    if raw.len() < expected {
        return Err(Error::decode(format!(
            "{record} needs {expected} bytes, got {}",
            raw.len()
        )));
    }
    Ok(())
}

// ============================================================================
// Variable Descriptor
// ============================================================================

/// Width of a process-image variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BitLength {
    /// Single bit.
    Bit,
    /// One byte.
    Byte,
    /// Two bytes.
    Word,
    /// Four bytes.
    DoubleWord,
}

impl BitLength {
    /// Parse a raw bit count.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] for anything other than 1, 8, 16 or 32.
    pub fn from_bits(bits: u16) -> Result<Self> {
        match bits {
            1 => Ok(Self::Bit),
            8 => Ok(Self::Byte),
            16 => Ok(Self::Word),
            32 => Ok(Self::DoubleWord),
            other => Err(Error::decode(format!("illegal bit length {other}"))),
        }
    }

    /// Raw bit count.
    #[must_use]
    pub fn bits(self) -> u16 {
        match self {
            Self::Bit => 1,
            Self::Byte => 8,
            Self::Word => 16,
            Self::DoubleWord => 32,
        }
    }

    /// Number of process-image bytes covered by the variable.
    #[must_use]
    pub fn byte_width(self) -> usize {
        match self {
            Self::Bit | Self::Byte => 1,
            Self::Word => 2,
            Self::DoubleWord => 4,
        }
    }
}

/// A named variable of the process image, as resolved by the driver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableDescriptor {
    /// Variable name (at most 31 bytes).
    pub name: String,

    /// Byte offset in the process image.
    pub address: u16,

    /// Bit position 0-7, or 8 and above for whole-byte access.
    pub bit: u8,

    /// Variable width.
    pub length: BitLength,
}

impl VariableDescriptor {
    /// Encode a find-variable request carrying `name`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the name is empty, contains a NUL byte or
    /// does not fit the fixed-width name field.
    pub fn lookup_request(name: &str) -> Result<[u8; VARIABLE_INFO_SIZE]> {
        if name.is_empty() || name.len() >= VARIABLE_NAME_LEN || name.contains('\0') {
            return Err(Error::config(format!(
                "variable name {name:?} must be 1-{} bytes without NUL",
                VARIABLE_NAME_LEN - 1
            )));
        }
        let mut raw = [0u8; VARIABLE_INFO_SIZE];
        raw[..name.len()].copy_from_slice(name.as_bytes());
        Ok(raw)
    }

    /// Decode a find-variable response.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] on a short buffer, a non UTF-8 name or an
    /// illegal bit length.
    pub fn decode(raw: &[u8]) -> Result<Self> {
        ensure_len(raw, VARIABLE_INFO_SIZE, "variable descriptor")?;
        let mut buf = &raw[..VARIABLE_INFO_SIZE];

        let name_field = &buf[..VARIABLE_NAME_LEN];
        let end = name_field
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(VARIABLE_NAME_LEN);
        let name = std::str::from_utf8(&name_field[..end])
            .map_err(|e| Error::decode(format!("variable name is not UTF-8: {e}")))?
            .to_string();
        buf.advance(VARIABLE_NAME_LEN);

        let address = buf.get_u16_le();
        let bit = buf.get_u8();
        buf.advance(1);
        let length = BitLength::from_bits(buf.get_u16_le())?;

        Ok(Self {
            name,
            address,
            bit,
            length,
        })
    }

    /// Encode the descriptor in driver layout.
    #[must_use]
    pub fn encode(&self) -> [u8; VARIABLE_INFO_SIZE] {
        let mut raw = [0u8; VARIABLE_INFO_SIZE];
        let name = self.name.as_bytes();
        let n = name.len().min(VARIABLE_NAME_LEN - 1);
        raw[..n].copy_from_slice(&name[..n]);

        let mut tail = &mut raw[VARIABLE_NAME_LEN..];
        tail.put_u16_le(self.address);
        tail.put_u8(self.bit);
        tail.put_u8(0);
        tail.put_u16_le(self.length.bits());
        raw
    }

    /// Whether the variable addresses a whole byte rather than one bit.
    #[must_use]
    pub fn is_whole_byte(&self) -> bool {
        self.bit >= WHOLE_BYTE_BIT || self.length != BitLength::Bit
    }
}

// ============================================================================
// Device Record
// ============================================================================

/// Process-image region of a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Region {
    /// Input bytes written by the module.
    Input,
    /// Output bytes read by the module.
    Output,
    /// Configuration (memory) bytes.
    Config,
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Input => write!(f, "input"),
            Self::Output => write!(f, "output"),
            Self::Config => write!(f, "config"),
        }
    }
}

/// One fieldbus module as reported by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DeviceRecord {
    /// Address of the module in the current configuration.
    pub slot: u8,
    pub serial_number: u32,
    pub module_type: u16,
    pub hw_revision: u16,
    pub sw_major: u16,
    pub sw_minor: u16,
    pub svn_revision: u32,
    pub input_length: u16,
    pub output_length: u16,
    pub config_length: u16,
    pub base_offset: u16,
    pub input_offset: u16,
    pub output_offset: u16,
    pub config_offset: u16,
    pub first_entry: u16,
    pub entry_count: u16,
    pub module_state: u8,
    /// `false` when the module is configured but not present.
    pub active: bool,
}

impl DeviceRecord {
    /// Decode one device descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] if fewer than [`DEVICE_INFO_SIZE`] bytes are given.
    pub fn decode(raw: &[u8]) -> Result<Self> {
        ensure_len(raw, DEVICE_INFO_SIZE, "device descriptor")?;
        let mut buf = &raw[..DEVICE_INFO_SIZE];

        let slot = buf.get_u8();
        buf.advance(3);
        Ok(Self {
            slot,
            serial_number: buf.get_u32_le(),
            module_type: buf.get_u16_le(),
            hw_revision: buf.get_u16_le(),
            sw_major: buf.get_u16_le(),
            sw_minor: buf.get_u16_le(),
            svn_revision: buf.get_u32_le(),
            input_length: buf.get_u16_le(),
            output_length: buf.get_u16_le(),
            config_length: buf.get_u16_le(),
            base_offset: buf.get_u16_le(),
            input_offset: buf.get_u16_le(),
            output_offset: buf.get_u16_le(),
            config_offset: buf.get_u16_le(),
            first_entry: buf.get_u16_le(),
            entry_count: buf.get_u16_le(),
            module_state: buf.get_u8(),
            active: buf.get_u8() != 0,
        })
    }

    /// Decode an array of descriptors, keeping the first `count` entries.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] if the buffer holds fewer than `count` records.
    pub fn decode_list(raw: &[u8], count: usize) -> Result<Vec<Self>> {
        ensure_len(raw, count * DEVICE_INFO_SIZE, "device descriptor list")?;
        raw.chunks_exact(DEVICE_INFO_SIZE)
            .take(count)
            .map(Self::decode)
            .collect()
    }

    /// Encode the descriptor in driver layout.
    #[must_use]
    pub fn encode(&self) -> [u8; DEVICE_INFO_SIZE] {
        let mut raw = [0u8; DEVICE_INFO_SIZE];
        let mut buf = &mut raw[..];
        buf.put_u8(self.slot);
        buf.put_bytes(0, 3);
        buf.put_u32_le(self.serial_number);
        buf.put_u16_le(self.module_type);
        buf.put_u16_le(self.hw_revision);
        buf.put_u16_le(self.sw_major);
        buf.put_u16_le(self.sw_minor);
        buf.put_u32_le(self.svn_revision);
        buf.put_u16_le(self.input_length);
        buf.put_u16_le(self.output_length);
        buf.put_u16_le(self.config_length);
        buf.put_u16_le(self.base_offset);
        buf.put_u16_le(self.input_offset);
        buf.put_u16_le(self.output_offset);
        buf.put_u16_le(self.config_offset);
        buf.put_u16_le(self.first_entry);
        buf.put_u16_le(self.entry_count);
        buf.put_u8(self.module_state);
        buf.put_u8(u8::from(self.active));
        raw
    }

    /// Byte range of a region.
    #[must_use]
    pub fn region(&self, region: Region) -> Range<u16> {
        let (offset, length) = match region {
            Region::Input => (self.input_offset, self.input_length),
            Region::Output => (self.output_offset, self.output_length),
            Region::Config => (self.config_offset, self.config_length),
        };
        offset..offset.saturating_add(length)
    }

    /// Region containing `address`, if any.
    #[must_use]
    pub fn region_of(&self, address: u16) -> Option<Region> {
        [Region::Input, Region::Output, Region::Config]
            .into_iter()
            .find(|&region| self.region(region).contains(&address))
    }

    /// Whether the module belongs to the digital-I/O family.
    #[must_use]
    pub fn is_digital_io(&self) -> bool {
        module::is_digital_io(self.module_type)
    }

    /// Human-readable module name.
    #[must_use]
    pub fn friendly_name(&self) -> &'static str {
        module::friendly_name(self.module_type)
    }
}

// ============================================================================
// Single-Value and Counter Requests
// ============================================================================

/// A get-value / set-value request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValueRequest {
    /// Byte offset in the process image.
    pub address: u16,
    /// Bit position 0-7, or 8 and above for whole-byte access.
    pub bit: u8,
    /// 0/1 for bit access, the byte value otherwise.
    pub value: u8,
}

impl ValueRequest {
    /// Encode in driver layout.
    #[must_use]
    pub fn encode(&self) -> [u8; VALUE_REQUEST_SIZE] {
        let mut raw = [0u8; VALUE_REQUEST_SIZE];
        let mut buf = &mut raw[..];
        buf.put_u16_le(self.address);
        buf.put_u8(self.bit);
        buf.put_u8(self.value);
        raw
    }

    /// Decode a request echoed back by the driver.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] on a short buffer.
    pub fn decode(raw: &[u8]) -> Result<Self> {
        ensure_len(raw, VALUE_REQUEST_SIZE, "value request")?;
        let mut buf = &raw[..VALUE_REQUEST_SIZE];
        Ok(Self {
            address: buf.get_u16_le(),
            bit: buf.get_u8(),
            value: buf.get_u8(),
        })
    }
}

/// A reset-counter request: one bit per input line of a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterReset {
    /// Slot address of the module.
    pub slot: u8,
    /// Bit `n` set resets the counter of input line `n`.
    pub bitfield: u16,
}

impl CounterReset {
    /// Encode in driver layout.
    #[must_use]
    pub fn encode(&self) -> [u8; COUNTER_RESET_SIZE] {
        let mut raw = [0u8; COUNTER_RESET_SIZE];
        let mut buf = &mut raw[..];
        buf.put_u8(self.slot);
        buf.put_u8(0);
        buf.put_u16_le(self.bitfield);
        raw
    }

    /// Decode a request.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] on a short buffer.
    pub fn decode(raw: &[u8]) -> Result<Self> {
        ensure_len(raw, COUNTER_RESET_SIZE, "counter reset request")?;
        let mut buf = &raw[..COUNTER_RESET_SIZE];
        let slot = buf.get_u8();
        buf.advance(1);
        Ok(Self {
            slot,
            bitfield: buf.get_u16_le(),
        })
    }
}

// ============================================================================
// Input Mode
// ============================================================================

/// Firmware-side mode of a digital input line.
///
/// Decoded from one byte of the module's input mode table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InputMode {
    /// Plain input, no edge counting.
    Disabled,
    /// Free-running edge counter.
    Counter,
    /// Quadrature encoder.
    Encoder,
}

impl InputMode {
    /// Raw mode byte for an encoder line.
    pub const ENCODER_BYTE: u8 = 3;

    /// Decode a mode table byte.
    #[must_use]
    pub fn from_byte(raw: u8) -> Self {
        match raw {
            0 => Self::Disabled,
            Self::ENCODER_BYTE => Self::Encoder,
            _ => Self::Counter,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn dio_record() -> DeviceRecord {
        DeviceRecord {
            slot: 32,
            serial_number: 0x0102_0304,
            module_type: 96,
            hw_revision: 4,
            sw_major: 1,
            sw_minor: 5,
            svn_revision: 0xDEAD_BEEF,
            input_length: 70,
            output_length: 18,
            config_length: 104,
            base_offset: 113,
            input_offset: 113,
            output_offset: 183,
            config_offset: 201,
            first_entry: 40,
            entry_count: 96,
            module_state: 0,
            active: true,
        }
    }

    #[rstest]
    #[case(1, BitLength::Bit, 1)]
    #[case(8, BitLength::Byte, 1)]
    #[case(16, BitLength::Word, 2)]
    #[case(32, BitLength::DoubleWord, 4)]
    fn test_bit_length_legal(#[case] bits: u16, #[case] expected: BitLength, #[case] width: usize) {
        let length = BitLength::from_bits(bits).unwrap();
        assert_eq!(length, expected);
        assert_eq!(length.bits(), bits);
        assert_eq!(length.byte_width(), width);
    }

    #[rstest]
    #[case(0)]
    #[case(2)]
    #[case(24)]
    #[case(64)]
    #[case(0xFFFF)]
    fn test_bit_length_illegal(#[case] bits: u16) {
        assert!(BitLength::from_bits(bits).unwrap_err().is_decode());
    }

    #[test]
    fn test_variable_decode_driver_layout() {
        let mut raw = [0u8; VARIABLE_INFO_SIZE];
        raw[..9].copy_from_slice(b"Counter_1");
        raw[32..34].copy_from_slice(&119u16.to_le_bytes());
        raw[34] = 0;
        raw[36..38].copy_from_slice(&32u16.to_le_bytes());

        let var = VariableDescriptor::decode(&raw).unwrap();
        assert_eq!(var.name, "Counter_1");
        assert_eq!(var.address, 119);
        assert_eq!(var.bit, 0);
        assert_eq!(var.length, BitLength::DoubleWord);
    }

    #[test]
    fn test_variable_decode_rejects_bad_length() {
        let mut raw = VariableDescriptor {
            name: "I_1".to_string(),
            address: 0,
            bit: 0,
            length: BitLength::Bit,
        }
        .encode();
        raw[36..38].copy_from_slice(&12u16.to_le_bytes());
        assert!(VariableDescriptor::decode(&raw).unwrap_err().is_decode());
    }

    #[test]
    fn test_variable_decode_short_buffer() {
        assert!(VariableDescriptor::decode(&[0u8; 20]).is_err());
    }

    #[test]
    fn test_lookup_request() {
        let raw = VariableDescriptor::lookup_request("InputValue_1").unwrap();
        assert_eq!(&raw[..12], b"InputValue_1");
        assert!(raw[12..].iter().all(|&b| b == 0));
    }

    #[rstest]
    #[case("")]
    #[case("a_name_that_is_far_too_long_for_it")]
    #[case("nul\0inside")]
    fn test_lookup_request_rejects(#[case] name: &str) {
        assert!(VariableDescriptor::lookup_request(name).is_err());
    }

    #[test]
    fn test_whole_byte() {
        let mut var = VariableDescriptor {
            name: "I_1".to_string(),
            address: 0,
            bit: 3,
            length: BitLength::Bit,
        };
        assert!(!var.is_whole_byte());
        var.bit = 8;
        assert!(var.is_whole_byte());
    }

    #[test]
    fn test_device_record_field_offsets() {
        let raw = dio_record().encode();
        assert_eq!(raw[0], 32);
        assert_eq!(&raw[1..4], &[0, 0, 0]);
        assert_eq!(&raw[4..8], &0x0102_0304u32.to_le_bytes());
        assert_eq!(&raw[8..10], &96u16.to_le_bytes());
        assert_eq!(&raw[16..20], &0xDEAD_BEEFu32.to_le_bytes());
        assert_eq!(&raw[28..30], &113u16.to_le_bytes());
        assert_eq!(&raw[30..32], &183u16.to_le_bytes());
        assert_eq!(raw[39], 1);
        assert!(raw[40..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_device_record_decode() {
        let record = dio_record();
        assert_eq!(DeviceRecord::decode(&record.encode()).unwrap(), record);
    }

    #[test]
    fn test_decode_list_takes_count() {
        let mut raw = Vec::new();
        for slot in 0..4u8 {
            let mut record = dio_record();
            record.slot = slot;
            raw.extend_from_slice(&record.encode());
        }
        let records = DeviceRecord::decode_list(&raw, 3).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[2].slot, 2);

        assert!(DeviceRecord::decode_list(&raw, 5).is_err());
    }

    #[test]
    fn test_regions() {
        let record = dio_record();
        assert_eq!(record.region(Region::Input), 113..183);
        assert_eq!(record.region_of(113), Some(Region::Input));
        assert_eq!(record.region_of(182), Some(Region::Input));
        assert_eq!(record.region_of(183), Some(Region::Output));
        assert_eq!(record.region_of(201), Some(Region::Config));
        assert_eq!(record.region_of(305), None);
        assert_eq!(record.region_of(0), None);
        assert!(record.is_digital_io());
        assert_eq!(record.friendly_name(), "RevPi DIO");
    }

    #[test]
    fn test_value_request_layout() {
        let request = ValueRequest {
            address: 0x0102,
            bit: 5,
            value: 1,
        };
        assert_eq!(request.encode(), [0x02, 0x01, 5, 1]);
        assert_eq!(ValueRequest::decode(&request.encode()).unwrap(), request);
    }

    #[test]
    fn test_counter_reset_layout() {
        let request = CounterReset {
            slot: 31,
            bitfield: 1 << 9,
        };
        assert_eq!(request.encode(), [31, 0, 0x00, 0x02]);
        assert_eq!(CounterReset::decode(&request.encode()).unwrap(), request);
    }

    #[rstest]
    #[case(0, InputMode::Disabled)]
    #[case(1, InputMode::Counter)]
    #[case(2, InputMode::Counter)]
    #[case(3, InputMode::Encoder)]
    #[case(7, InputMode::Counter)]
    fn test_input_mode(#[case] raw: u8, #[case] expected: InputMode) {
        assert_eq!(InputMode::from_byte(raw), expected);
    }

    #[test]
    fn test_device_record_serialization() {
        let record = dio_record();
        let json = serde_json::to_string(&record).unwrap();
        let deserialized: DeviceRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(record, deserialized);
    }
}
