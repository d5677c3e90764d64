//! Integration tests for RevPiBoard against the mock driver.
//!
//! These tests walk the full path from variable name to decoded value:
//! name lookup, owner location, firmware mode validation and the final
//! positioned read.

mod common;

use common::{DIO_1, DIO_2, fixture};
use revpi_core::Error;
use revpi_core::command::Command;
use revpi_core::types::{InputMode, Region};
use revpi_hardware::channel::IoCycling;
use revpi_hardware::traits::{PositionEncoder, PulseCounter};
use std::time::Duration;

#[test]
fn test_status_lists_every_active_module() {
    let f = fixture();
    let report = f.board.status().unwrap();

    let names: Vec<_> = report.devices.iter().map(|d| d.name.as_str()).collect();
    assert_eq!(names, ["RevPi Core", "RevPi DIO", "RevPi DIO", "RevPi AIO"]);
    assert!(report.devices.windows(2).all(|w| w[0].input.end <= w[1].input.start));

    f.driver.set_active(34, false);
    assert_eq!(f.board.status().unwrap().devices.len(), 3);
}

#[test]
fn test_counter_by_input_bit_and_by_slot_agree() {
    let f = fixture();
    f.driver.set_input_mode(DIO_2, 11, 1);
    f.driver.set_counter(DIO_2, 11, 4242);

    let by_bit = f.board.counter("I_12_i02").unwrap();
    let by_slot = f.board.counter("Counter_12_i02").unwrap();

    assert_eq!(by_bit.pin().interrupt_address(), by_slot.pin().interrupt_address());
    assert_eq!(by_bit.pin().mode_index(), 11);
    assert_eq!(by_bit.count().unwrap(), 4242);
    assert_eq!(by_slot.count().unwrap(), 4242);
}

#[test]
fn test_counter_value_follows_process_image() {
    let f = fixture();
    f.driver.set_input_mode(DIO_1, 0, 2);

    for value in [0, 1, 65_535, u32::MAX] {
        f.driver.set_counter(DIO_1, 0, value);
        assert_eq!(f.board.counter_value("I_1").unwrap(), value);
    }
}

#[test]
fn test_reconfiguration_is_seen_by_next_lookup() {
    let f = fixture();
    f.driver.set_input_mode(DIO_1, 3, 1);
    let before = f.board.digital_interrupt("I_4").unwrap();
    assert_eq!(before.mode(), InputMode::Counter);

    f.driver.set_input_mode(DIO_1, 3, InputMode::ENCODER_BYTE);
    let after = f.board.digital_interrupt("I_4").unwrap();
    assert_eq!(after.mode(), InputMode::Encoder);
    assert_eq!(before.mode(), InputMode::Counter);

    f.driver.set_input_mode(DIO_1, 3, 0);
    let error = f.board.digital_interrupt("I_4").unwrap_err();
    assert!(error.is_configuration());
}

#[test]
fn test_encoder_reset() {
    let f = fixture();
    f.driver.set_input_mode(DIO_1, 8, InputMode::ENCODER_BYTE);
    f.driver.set_counter(DIO_1, 8, (-300i32).cast_unsigned());

    let encoder = f.board.encoder("I_9").unwrap();
    assert_eq!(encoder.position().unwrap(), -300);

    encoder.reset().unwrap();
    assert_eq!(encoder.position().unwrap(), 0);
    assert_eq!(f.driver.counter_resets()[0].bitfield, 1 << 8);
}

#[test]
fn test_non_inputs_are_rejected() {
    let f = fixture();
    for name in ["O_1", "InputMode_1", "InputValue_1"] {
        let error = f.board.digital_interrupt(name).unwrap_err();
        assert!(
            matches!(error, Error::NotADigitalInput { .. }),
            "{name}: {error}"
        );
    }
    assert!(matches!(
        f.board.digital_interrupt("Missing"),
        Err(Error::VariableNotFound { .. })
    ));
}

#[test]
fn test_analog_readers() {
    let f = fixture();
    f.driver.write_image(497, &1500u16.to_le_bytes());
    f.driver.write_image(499, &[0xFF, 0xFF]);

    let readers: Vec<_> = f
        .board
        .analog_reader_names()
        .iter()
        .map(|name| f.board.analog_reader(name).unwrap())
        .collect();

    assert_eq!(readers[0].read().unwrap(), 1500);
    assert_eq!(readers[1].read().unwrap(), 65_535);
}

#[test]
fn test_gpio_pins() {
    let f = fixture();
    let output = f.board.gpio_pin("O_9").unwrap();
    assert_eq!(output.region(), Region::Output);
    output.set(true).unwrap();
    assert_eq!(f.driver.read_image(DIO_1 + 71, 1), vec![1]);

    let status = f.board.gpio_pin("RevPiStatus").unwrap();
    assert!(matches!(status.set(true), Err(Error::Unsupported { .. })));
}

#[test]
fn test_driver_controls() {
    let f = fixture();
    let channel = f.board.channel();

    assert!(channel.set_io_cycling(IoCycling::Stop).unwrap());
    assert!(!channel.set_io_cycling(IoCycling::Toggle).unwrap());
    channel.set_output_watchdog(Duration::from_secs(1)).unwrap();
    assert_eq!(f.driver.watchdog(), Some(1000));

    channel.reset_driver().unwrap();
    assert!(f.driver.control_log().ends_with(&[Command::Reset]));
}

#[test]
fn test_driver_failure_surfaces_unchanged() {
    let f = fixture();
    f.driver.fail_command(Command::GetDeviceInfoList);

    let error = f.board.status().unwrap_err();
    assert!(matches!(
        error,
        Error::ControlCodeFailed {
            command: Command::GetDeviceInfoList,
            ..
        }
    ));
    assert!(!error.is_configuration());
}

#[test]
fn test_close_closes_handle() {
    let f = fixture();
    f.board.close().unwrap();
    assert!(f.driver.is_closed());
}
