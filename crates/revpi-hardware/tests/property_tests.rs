//! Property-based tests for input line location.
//!
//! These tests generate digital-I/O module layouts at arbitrary offsets and
//! check that every input bit and every counter slot lands on the right
//! line of the mode and counter tables.

use proptest::prelude::*;
use revpi_core::constants::{COUNTER_SLOT_WIDTH, COUNTER_TABLE_OFFSET, LINES_PER_BANK};
use revpi_core::types::DeviceRecord;
use revpi_hardware::counter::locate_line;

/// Strategy for DIO module records placed anywhere in a 4 KiB image.
fn dio_module() -> impl Strategy<Value = DeviceRecord> {
    (0u16..4000, any::<u8>()).prop_map(|(input_offset, slot)| DeviceRecord {
        slot,
        module_type: 96,
        input_length: 70,
        output_length: 18,
        config_length: 104,
        base_offset: input_offset,
        input_offset,
        output_offset: input_offset + 70,
        config_offset: input_offset + 88,
        active: true,
        ..Default::default()
    })
}

proptest! {
    #[test]
    fn prop_input_bits_select_mode_index(device in dio_module(), word in 0u16..2, bit in 0u8..8) {
        let line = locate_line(device.input_offset + word, bit, &device).unwrap();
        let expected = bit + if word == 1 { LINES_PER_BANK } else { 0 };

        prop_assert_eq!(line.mode_index, expected);
        prop_assert_eq!(
            line.interrupt_address,
            device.input_offset + COUNTER_TABLE_OFFSET + u16::from(expected) * COUNTER_SLOT_WIDTH
        );
    }

    #[test]
    fn prop_counter_slots_map_to_themselves(device in dio_module(), delta in 0u16..64, bit in any::<u8>()) {
        let address = device.input_offset + COUNTER_TABLE_OFFSET + delta;
        let line = locate_line(address, bit, &device).unwrap();
        prop_assert_eq!(line.interrupt_address, address);
        prop_assert!(line.mode_index < 16);
    }

    #[test]
    fn prop_bit_and_slot_agree(device in dio_module(), index in 0u8..16) {
        let word = device.input_offset + u16::from(index / 8);
        let from_bit = locate_line(word, index % 8, &device).unwrap();
        let slot = from_bit.interrupt_address;
        let from_slot = locate_line(slot, 0, &device).unwrap();

        prop_assert_eq!(from_bit.mode_index, index);
        prop_assert_eq!(from_slot, from_bit);
    }

    #[test]
    fn prop_other_addresses_rejected(device in dio_module(), delta in 2u16..6, bit in 0u8..8) {
        prop_assert!(locate_line(device.input_offset + delta, bit, &device).is_none());
        prop_assert!(locate_line(device.output_offset, bit, &device).is_none());
    }
}
