//! Module-type classification.
//!
//! Module-type codes are reported by the driver in every device descriptor.
//! The names below are used for diagnostics only; address arithmetic never
//! depends on them.

/// Module-type codes of the digital-I/O module family (DIO, DI, DO).
pub const DIGITAL_IO_MODULE_TYPES: [u16; 3] = [96, 97, 98];

const MODULE_NAMES: &[(u16, &str)] = &[
    (71, "Gateway CANopen"),
    (73, "Gateway DeviceNet"),
    (74, "Gateway EtherCAT"),
    (75, "Gateway EtherNet/IP"),
    (76, "Gateway Powerlink"),
    (77, "Gateway Profibus"),
    (79, "Gateway Profinet IRT"),
    (81, "Gateway SercosIII"),
    (93, "Gateway ModbusTCP"),
    (95, "RevPi Core"),
    (96, "RevPi DIO"),
    (97, "RevPi DI"),
    (98, "RevPi DO"),
    (100, "Gateway DMX"),
    (103, "RevPi AIO"),
    (136, "RevPi Connect 4"),
    (0x6001, "ModbusTCP Slave Adapter"),
    (0x6002, "ModbusRTU Slave Adapter"),
    (0x6003, "ModbusTCP Master Adapter"),
    (0x6004, "ModbusRTU Master Adapter"),
];

/// Name reported for module types missing from the lookup table.
pub const UNKNOWN_MODULE: &str = "unknown moduletype";

/// Human-readable name of a module type.
///
/// # Examples
///
/// ```
/// use revpi_core::module::friendly_name;
///
/// assert_eq!(friendly_name(96), "RevPi DIO");
/// assert_eq!(friendly_name(0x6003), "ModbusTCP Master Adapter");
/// assert_eq!(friendly_name(1), "unknown moduletype");
/// ```
#[must_use]
pub fn friendly_name(module_type: u16) -> &'static str {
    MODULE_NAMES
        .iter()
        .find(|(code, _)| *code == module_type)
        .map_or(UNKNOWN_MODULE, |(_, name)| name)
}

/// Whether the module type belongs to the digital-I/O family.
#[must_use]
pub fn is_digital_io(module_type: u16) -> bool {
    DIGITAL_IO_MODULE_TYPES.contains(&module_type)
}
