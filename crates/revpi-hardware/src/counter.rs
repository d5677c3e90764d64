//! Counter and encoder pins of digital-I/O modules.
//!
//! A digital input line of a DIO/DI module can be configured in PiCtory to
//! count edges or, paired with its neighbour, to decode a quadrature
//! encoder. The firmware publishes the configuration in the module's input
//! mode table and the running value in its counter table:
//!
//! ```text
//! input_offset + 0    input word 1     lines 0-7
//! input_offset + 1    input word 2     lines 8-15
//! input_offset + 6    counter table    16 x u32 LE
//! input_offset + 88   mode table       16 x u8
//! ```
//!
//! A pin can be requested either by one of its input bits (`I_n`) or by its
//! counter slot (`Counter_n`); both resolve to the same line.
//!
//! Only two 8-line input words per module are assumed. A module variant
//! with a wider input bank would need its own layout.

use crate::channel::ControlChannel;
use crate::resolver::{AddressResolver, ResolvedVariable};
use crate::traits::{PositionEncoder, PulseCounter};
use revpi_core::constants::{
    COUNTER_SLOT_WIDTH, COUNTER_TABLE_OFFSET, LINES_PER_BANK, MAX_INPUT_LINES, MODE_TABLE_OFFSET,
};
use revpi_core::types::{BitLength, CounterReset, DeviceRecord, InputMode};
use revpi_core::{Error, Result};
use std::sync::Arc;
use tracing::{debug, info};

/// What a caller wants from a digital input line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinKind {
    /// Free-running edge counter.
    Counter,
    /// Quadrature encoder.
    Encoder,
}

/// Where a digital input line lives in its module's tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineLocation {
    /// Index into the mode table and counter table (0-15).
    pub mode_index: u8,

    /// Address of the line's 4-byte counter slot.
    pub interrupt_address: u16,
}

/// Locate the input line addressed by `address`/`bit` inside `owner`.
///
/// Returns `None` if the address is neither one of the two input words
/// nor a slot of the counter table.
///
/// # Examples
///
/// ```
/// use revpi_core::types::DeviceRecord;
/// use revpi_hardware::counter::locate_line;
///
/// let dio = DeviceRecord { input_offset: 113, output_offset: 183, ..Default::default() };
///
/// // I_11: second input word, bit 2
/// let line = locate_line(114, 2, &dio).unwrap();
/// assert_eq!(line.mode_index, 10);
/// assert_eq!(line.interrupt_address, 113 + 6 + 40);
///
/// // Counter_3 is already a counter slot
/// assert_eq!(locate_line(127, 0, &dio).unwrap().interrupt_address, 127);
/// ```
#[must_use]
pub fn locate_line(address: u16, bit: u8, owner: &DeviceRecord) -> Option<LineLocation> {
    let input = owner.input_offset;
    let counter_table = input.checked_add(COUNTER_TABLE_OFFSET)?;

    if (counter_table..owner.output_offset).contains(&address) {
        let mode_index = u8::try_from((address - counter_table) / COUNTER_SLOT_WIDTH).ok()?;
        return (mode_index < MAX_INPUT_LINES).then_some(LineLocation {
            mode_index,
            interrupt_address: address,
        });
    }

    let bank = if address == input {
        0
    } else if input.checked_add(1) == Some(address) {
        LINES_PER_BANK
    } else {
        return None;
    };
    if bit >= LINES_PER_BANK {
        return None;
    }

    let mode_index = bit + bank;
    Some(LineLocation {
        mode_index,
        interrupt_address: counter_table
            .checked_add(u16::from(mode_index) * COUNTER_SLOT_WIDTH)?,
    })
}

/// Check a raw mode byte against the requested kind.
fn check_mode(name: &str, raw: u8, kind: PinKind) -> Result<InputMode> {
    match (InputMode::from_byte(raw), kind) {
        (InputMode::Disabled, _) | (InputMode::Encoder, PinKind::Counter) => {
            Err(Error::NotConfiguredAsCounter {
                name: name.to_string(),
                mode: raw,
            })
        }
        (InputMode::Counter, PinKind::Encoder) => Err(Error::NotConfiguredAsEncoder {
            name: name.to_string(),
            mode: raw,
        }),
        (mode, _) => Ok(mode),
    }
}

/// A digital input line that can deliver a 32-bit running value.
///
/// Built in two steps: [`locate`](Self::locate) maps the variable to its
/// line and yields a disabled pin, and [`enable`](Self::enable) validates
/// the firmware mode and yields a new, enabled pin. A pin is never patched
/// in place; reconfiguring means building a new one.
#[derive(Debug, Clone)]
pub struct CounterPin {
    name: String,
    address: u16,
    bit: u8,
    bit_length: BitLength,
    owner: DeviceRecord,
    input_offset: u16,
    output_offset: u16,
    mode_index: u8,
    interrupt_address: u16,
    mode: InputMode,
    enabled: bool,
    channel: Arc<ControlChannel>,
}

impl CounterPin {
    /// Map a resolved variable to its input line.
    ///
    /// The returned pin is disabled.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotADigitalInput`] if the owner is not a digital-I/O
    /// module, or the variable is neither an input bit nor a counter slot.
    pub fn locate(channel: Arc<ControlChannel>, resolved: &ResolvedVariable) -> Result<Self> {
        let variable = &resolved.variable;
        let owner = resolved.device;
        let location = owner
            .is_digital_io()
            .then(|| locate_line(variable.address, variable.bit, &owner))
            .flatten()
            .ok_or_else(|| Error::NotADigitalInput {
                name: variable.name.clone(),
                address: variable.address,
            })?;

        Ok(Self {
            name: variable.name.clone(),
            address: variable.address,
            bit: variable.bit,
            bit_length: variable.length,
            owner,
            input_offset: owner.input_offset,
            output_offset: owner.output_offset,
            mode_index: location.mode_index,
            interrupt_address: location.interrupt_address,
            mode: InputMode::Disabled,
            enabled: false,
            channel,
        })
    }

    /// Validate the firmware mode of the line and return an enabled pin.
    ///
    /// # Errors
    ///
    /// - [`Error::NotConfiguredAsCounter`] if the mode byte is zero, or is
    ///   the encoder mode while a counter was requested
    /// - [`Error::NotConfiguredAsEncoder`] if an encoder was requested and
    ///   the line is a plain counter
    /// - [`Error::AddressOutOfRange`] if the mode table lies past the end of
    ///   the process image address space
    /// - [`Error::ShortRead`] / [`Error::Io`] if the mode byte cannot be read
    pub fn enable(&self, kind: PinKind) -> Result<Self> {
        let mode_address = self
            .input_offset
            .checked_add(MODE_TABLE_OFFSET)
            .and_then(|table| table.checked_add(u16::from(self.mode_index)))
            .ok_or(Error::AddressOutOfRange {
                address: self.input_offset,
            })?;
        let mut raw = [0u8; 1];
        self.channel
            .read_exact_at(u64::from(mode_address), &mut raw)?;
        let mode = check_mode(&self.name, raw[0], kind)?;

        info!(
            name = %self.name,
            slot = self.owner.slot,
            line = self.mode_index,
            ?mode,
            interrupt_address = self.interrupt_address,
            "Input pin enabled"
        );
        Ok(Self {
            mode,
            enabled: true,
            ..self.clone()
        })
    }

    /// Current 32-bit counter or encoder value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PinDisabled`] without touching the driver if the pin
    /// was never enabled, or [`Error::ShortRead`] if fewer than 4 bytes are
    /// delivered.
    pub fn value(&self) -> Result<u32> {
        self.ensure_enabled()?;
        let mut raw = [0u8; 4];
        self.channel
            .read_exact_at(u64::from(self.interrupt_address), &mut raw)?;
        Ok(u32::from_le_bytes(raw))
    }

    /// Reset the line's counter (or encoder position) to zero.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PinDisabled`] if the pin was never enabled, or the
    /// driver's error.
    pub fn reset(&self) -> Result<()> {
        self.ensure_enabled()?;
        self.channel.reset_counters(CounterReset {
            slot: self.owner.slot,
            bitfield: 1 << self.mode_index,
        })?;
        debug!(name = %self.name, "Counter reset");
        Ok(())
    }

    fn ensure_enabled(&self) -> Result<()> {
        if self.enabled {
            Ok(())
        } else {
            Err(Error::PinDisabled {
                name: self.name.clone(),
            })
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn address(&self) -> u16 {
        self.address
    }

    pub fn bit(&self) -> u8 {
        self.bit
    }

    pub fn bit_length(&self) -> BitLength {
        self.bit_length
    }

    /// Module the line belongs to, as it was at construction time.
    pub fn owner(&self) -> &DeviceRecord {
        &self.owner
    }

    pub fn input_offset(&self) -> u16 {
        self.input_offset
    }

    pub fn output_offset(&self) -> u16 {
        self.output_offset
    }

    /// Line index within the module (0-15).
    pub fn mode_index(&self) -> u8 {
        self.mode_index
    }

    /// Address of the 4-byte counter slot read by [`value`](Self::value).
    pub fn interrupt_address(&self) -> u16 {
        self.interrupt_address
    }

    /// Firmware mode decoded by [`enable`](Self::enable).
    pub fn mode(&self) -> InputMode {
        self.mode
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}

/// Builds counter pins by name.
#[derive(Debug, Clone)]
pub struct CounterPinController {
    channel: Arc<ControlChannel>,
    resolver: AddressResolver,
}

impl CounterPinController {
    pub fn new(channel: Arc<ControlChannel>) -> Self {
        let resolver = AddressResolver::new(Arc::clone(&channel));
        Self { channel, resolver }
    }

    /// Resolve `name`, locate its line and validate its firmware mode.
    ///
    /// # Errors
    ///
    /// Any resolution, location or validation error.
    pub fn open(&self, name: &str, kind: PinKind) -> Result<CounterPin> {
        let resolved = self.resolver.resolve(name)?;
        CounterPin::locate(Arc::clone(&self.channel), &resolved)?.enable(kind)
    }

    /// Open `name` as a pulse counter.
    pub fn counter(&self, name: &str) -> Result<CounterInput> {
        self.open(name, PinKind::Counter).map(CounterInput)
    }

    /// Open `name` as a quadrature encoder.
    pub fn encoder(&self, name: &str) -> Result<EncoderInput> {
        self.open(name, PinKind::Encoder).map(EncoderInput)
    }
}

/// Pulse-counter view of a [`CounterPin`].
#[derive(Debug, Clone)]
pub struct CounterInput(CounterPin);

impl CounterInput {
    pub fn pin(&self) -> &CounterPin {
        &self.0
    }

    pub fn into_pin(self) -> CounterPin {
        self.0
    }
}

impl PulseCounter for CounterInput {
    fn name(&self) -> &str {
        self.0.name()
    }

    fn count(&self) -> Result<u32> {
        self.0.value()
    }

    fn reset(&self) -> Result<()> {
        self.0.reset()
    }
}

/// Position-encoder view of a [`CounterPin`].
///
/// The firmware stores the position as a two's-complement 32-bit value.
#[derive(Debug, Clone)]
pub struct EncoderInput(CounterPin);

impl EncoderInput {
    pub fn pin(&self) -> &CounterPin {
        &self.0
    }

    pub fn into_pin(self) -> CounterPin {
        self.0
    }
}

impl PositionEncoder for EncoderInput {
    fn name(&self) -> &str {
        self.0.name()
    }

    fn position(&self) -> Result<i32> {
        Ok(self.0.value()?.cast_signed())
    }

    fn reset(&self) -> Result<()> {
        self.0.reset()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockPiControl, MockPiControlHandle};
    use revpi_core::command::Command;
    use revpi_core::types::{Region, VariableDescriptor};
    use rstest::rstest;

    const INPUT: u16 = 113;

    fn dio() -> DeviceRecord {
        DeviceRecord {
            slot: 32,
            module_type: 96,
            input_length: 70,
            output_length: 18,
            config_length: 104,
            base_offset: INPUT,
            input_offset: INPUT,
            output_offset: INPUT + 70,
            config_offset: INPUT + 88,
            active: true,
            ..Default::default()
        }
    }

    fn controller() -> (CounterPinController, MockPiControlHandle) {
        let (device, handle) = MockPiControl::builder().dio_module(32, INPUT, 1).build();
        (
            CounterPinController::new(Arc::new(ControlChannel::new(device.into()))),
            handle,
        )
    }

    #[rstest]
    fn test_first_word_mode_index(#[values(0, 1, 2, 3, 4, 5, 6, 7)] bit: u8) {
        let line = locate_line(INPUT, bit, &dio()).unwrap();
        assert_eq!(line.mode_index, bit);
        assert_eq!(
            line.interrupt_address,
            INPUT + COUNTER_TABLE_OFFSET + u16::from(bit) * 4
        );
    }

    #[rstest]
    fn test_second_word_mode_index(#[values(0, 1, 2, 3, 4, 5, 6, 7)] bit: u8) {
        let line = locate_line(INPUT + 1, bit, &dio()).unwrap();
        assert_eq!(line.mode_index, bit + 8);
        assert_eq!(
            line.interrupt_address,
            INPUT + COUNTER_TABLE_OFFSET + u16::from(bit + 8) * 4
        );
    }

    #[test]
    fn test_counter_region_is_identity() {
        let device = dio();
        for address in INPUT + COUNTER_TABLE_OFFSET..device.output_offset {
            let line = locate_line(address, 0, &device).unwrap();
            assert_eq!(line.interrupt_address, address);
            assert_eq!(
                u16::from(line.mode_index),
                (address - INPUT - COUNTER_TABLE_OFFSET) / 4
            );
        }
    }

    #[rstest]
    #[case(INPUT + 2, 0)]
    #[case(INPUT + 5, 0)]
    #[case(INPUT + 70, 0)]
    #[case(INPUT + 88, 0)]
    #[case(INPUT - 1, 0)]
    #[case(INPUT, 8)]
    #[case(INPUT + 1, 9)]
    fn test_not_a_digital_input(#[case] address: u16, #[case] bit: u8) {
        assert_eq!(locate_line(address, bit, &dio()), None);
    }

    fn dio_at_top(input_offset: u16) -> DeviceRecord {
        DeviceRecord {
            input_offset,
            output_offset: u16::MAX,
            ..dio()
        }
    }

    #[test]
    fn test_counter_slot_past_address_space() {
        // counter table starts at 65531; line 7 would need 65559
        let device = dio_at_top(u16::MAX - 10);
        assert_eq!(locate_line(u16::MAX - 10, 7, &device), None);
        assert_eq!(locate_line(u16::MAX - 9, 0, &device), None);
        assert_eq!(
            locate_line(u16::MAX - 10, 0, &device).unwrap().interrupt_address,
            u16::MAX - 4
        );
        assert_eq!(locate_line(u16::MAX, 0, &dio_at_top(u16::MAX - 2)), None);
    }

    #[test]
    fn test_mode_table_past_address_space() {
        let (device, _handle) = MockPiControl::new();
        let channel = Arc::new(ControlChannel::new(device.into()));
        let owner = dio_at_top(u16::MAX - 40);
        let resolved = ResolvedVariable {
            variable: VariableDescriptor {
                name: "I_1".to_string(),
                address: owner.input_offset,
                bit: 0,
                length: BitLength::Bit,
            },
            device: owner,
            region: Region::Input,
        };

        let pin = CounterPin::locate(channel, &resolved).unwrap();
        assert!(matches!(
            pin.enable(PinKind::Counter),
            Err(Error::AddressOutOfRange { address }) if address == u16::MAX - 40
        ));
    }

    #[rstest]
    #[case(0, PinKind::Counter)]
    #[case(0, PinKind::Encoder)]
    #[case(3, PinKind::Counter)]
    fn test_mode_rejects_as_counter(#[case] raw: u8, #[case] kind: PinKind) {
        let error = check_mode("I_1", raw, kind).unwrap_err();
        assert!(matches!(error, Error::NotConfiguredAsCounter { mode, .. } if mode == raw));
        assert!(error.is_configuration());
    }

    #[rstest]
    #[case(1)]
    #[case(2)]
    fn test_mode_rejects_as_encoder(#[case] raw: u8) {
        assert!(matches!(
            check_mode("I_1", raw, PinKind::Encoder),
            Err(Error::NotConfiguredAsEncoder { .. })
        ));
    }

    #[rstest]
    #[case(1, PinKind::Counter, InputMode::Counter)]
    #[case(2, PinKind::Counter, InputMode::Counter)]
    #[case(3, PinKind::Encoder, InputMode::Encoder)]
    fn test_mode_accepts(#[case] raw: u8, #[case] kind: PinKind, #[case] expected: InputMode) {
        assert_eq!(check_mode("I_1", raw, kind).unwrap(), expected);
    }

    #[test]
    fn test_open_reads_mode_table() {
        let (controller, handle) = controller();
        handle.set_input_mode(INPUT, 10, 1);

        let pin = controller.open("I_11", PinKind::Counter).unwrap();
        assert!(pin.is_enabled());
        assert_eq!(pin.mode(), InputMode::Counter);
        assert_eq!(pin.mode_index(), 10);
        assert_eq!(pin.owner().slot, 32);
        assert_eq!(pin.output_offset(), INPUT + 70);
    }

    #[test]
    fn test_open_disabled_line_fails() {
        let (controller, _handle) = controller();
        assert!(matches!(
            controller.open("I_1", PinKind::Counter),
            Err(Error::NotConfiguredAsCounter { mode: 0, .. })
        ));
    }

    #[test]
    fn test_encoder_line() {
        let (controller, handle) = controller();
        handle.set_input_mode(INPUT, 0, InputMode::ENCODER_BYTE);

        assert!(controller.open("I_1", PinKind::Counter).is_err());
        let encoder = controller.encoder("Counter_1").unwrap();
        handle.set_counter(INPUT, 0, (-5i32).cast_unsigned());
        assert_eq!(encoder.position().unwrap(), -5);
    }

    #[test]
    fn test_output_is_not_a_digital_input() {
        let (controller, _handle) = controller();
        assert!(matches!(
            controller.open("O_1", PinKind::Counter),
            Err(Error::NotADigitalInput { .. })
        ));
    }

    #[rstest]
    #[case([0x01, 0x00, 0x00, 0x00], 1)]
    #[case([0xFF, 0xFF, 0xFF, 0xFF], 4_294_967_295)]
    #[case([0x78, 0x56, 0x34, 0x12], 0x1234_5678)]
    fn test_value_decodes_little_endian(#[case] raw: [u8; 4], #[case] expected: u32) {
        let (controller, handle) = controller();
        handle.set_input_mode(INPUT, 4, 1);
        handle.write_image(INPUT + COUNTER_TABLE_OFFSET + 16, &raw);

        let counter = controller.counter("I_5").unwrap();
        assert_eq!(counter.count().unwrap(), expected);
    }

    #[test]
    fn test_disabled_pin_never_reads() {
        let (controller, handle) = controller();
        let resolved = controller.resolver.resolve("I_1").unwrap();
        let pin = CounterPin::locate(Arc::clone(&controller.channel), &resolved).unwrap();
        assert!(!pin.is_enabled());

        let reads = handle.read_count();
        assert!(matches!(pin.value(), Err(Error::PinDisabled { .. })));
        assert!(matches!(pin.reset(), Err(Error::PinDisabled { .. })));
        assert_eq!(handle.read_count(), reads);
    }

    #[test]
    fn test_short_value_read() {
        let (controller, handle) = controller();
        handle.set_input_mode(INPUT, 0, 1);
        let pin = controller.open("I_1", PinKind::Counter).unwrap();

        handle.truncate_reads(3);
        assert!(matches!(
            pin.value(),
            Err(Error::ShortRead {
                expected: 4,
                actual: 3,
                ..
            })
        ));
    }

    #[test]
    fn test_enable_returns_new_instance() {
        let (controller, handle) = controller();
        handle.set_input_mode(INPUT, 2, 1);
        let resolved = controller.resolver.resolve("I_3").unwrap();
        let located = CounterPin::locate(Arc::clone(&controller.channel), &resolved).unwrap();

        let enabled = located.enable(PinKind::Counter).unwrap();
        assert!(enabled.is_enabled());
        assert!(!located.is_enabled());
    }

    #[test]
    fn test_reset_sends_line_bit() {
        let (controller, handle) = controller();
        handle.set_input_mode(INPUT, 9, 1);
        handle.set_counter(INPUT, 9, 1234);

        let counter = controller.counter("I_10").unwrap();
        counter.reset().unwrap();

        assert_eq!(
            handle.counter_resets(),
            vec![CounterReset {
                slot: 32,
                bitfield: 1 << 9
            }]
        );
        assert_eq!(counter.count().unwrap(), 0);
        assert!(handle.control_log().contains(&Command::ResetCounter));
    }
}
