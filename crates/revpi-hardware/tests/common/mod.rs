//! Shared fixtures for integration tests.

#![allow(dead_code)]

use revpi_core::types::{BitLength, DeviceRecord};
use revpi_hardware::board::RevPiBoard;
use revpi_hardware::config::BoardConfig;
use revpi_hardware::devices::LineSource;
use revpi_hardware::mock::{MockLineBank, MockPiControl, MockPiControlHandle};

/// Input offset of the first DIO module.
pub const DIO_1: u16 = 113;

/// Input offset of the second DIO module.
pub const DIO_2: u16 = 305;

/// A RevPi Connect with two DIO modules and an AIO module.
///
/// ```text
/// slot 31  RevPi Core   0..113
/// slot 32  RevPi DIO    113..305   (variables I_1, Counter_1, ...)
/// slot 33  RevPi DIO    305..497   (variables I_1_i02, ...)
/// slot 34  RevPi AIO    497..600   (InputValue_1 at 497)
/// ```
pub struct Fixture {
    pub board: RevPiBoard,
    pub driver: MockPiControlHandle,
    pub lines: MockLineBank,
}

pub fn core_module() -> DeviceRecord {
    DeviceRecord {
        slot: 31,
        module_type: 95,
        input_length: 6,
        output_length: 5,
        config_length: 102,
        input_offset: 0,
        output_offset: 6,
        config_offset: 11,
        active: true,
        ..Default::default()
    }
}

pub fn aio_module() -> DeviceRecord {
    DeviceRecord {
        slot: 34,
        module_type: 103,
        input_length: 56,
        output_length: 12,
        config_length: 35,
        base_offset: 497,
        input_offset: 497,
        output_offset: 553,
        config_offset: 565,
        active: true,
        ..Default::default()
    }
}

pub fn fixture() -> Fixture {
    init_tracing();
    let (device, driver) = MockPiControl::builder()
        .device(core_module())
        .dio_module(32, DIO_1, 1)
        .dio_module(33, DIO_2, 2)
        .device(aio_module())
        .variable("InputValue_1", 497, 0, BitLength::Word)
        .variable("InputValue_2", 499, 0, BitLength::Word)
        .variable("RevPiStatus", 0, 0, BitLength::Byte)
        .build();
    let lines = MockLineBank::new(16);
    let config = BoardConfig::default()
        .analog_reader("InputValue_1")
        .analog_reader("InputValue_2");

    let board = RevPiBoard::with_device(config, device.into(), LineSource::Mock(lines.clone()))
        .expect("mock board");
    Fixture {
        board,
        driver,
        lines,
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("revpi_hardware=debug")
        .with_test_writer()
        .try_init();
}
