//! Enumeration of the modules attached to the fieldbus.
//!
//! Every call re-queries the driver. Nothing is cached, so a driver reset
//! or reconfiguration is picked up by the next lookup without any
//! invalidation step.

use crate::channel::ControlChannel;
use revpi_core::command::Command;
use revpi_core::constants::{DEVICE_INFO_SIZE, MAX_DEVICES};
use revpi_core::types::{DeviceRecord, Region};
use revpi_core::{Error, Result};
use std::sync::Arc;
use tracing::debug;

/// The device that owns `address`, and the region it falls in.
///
/// Regions of active devices never overlap, so the first match is the only
/// one.
#[must_use]
pub fn find_containing(devices: &[DeviceRecord], address: u16) -> Option<(DeviceRecord, Region)> {
    devices
        .iter()
        .find_map(|device| device.region_of(address).map(|region| (*device, region)))
}

/// Device enumeration over a [`ControlChannel`].
#[derive(Debug, Clone)]
pub struct DeviceCatalog {
    channel: Arc<ControlChannel>,
}

impl DeviceCatalog {
    /// Create a catalog on top of `channel`.
    pub fn new(channel: Arc<ControlChannel>) -> Self {
        Self { channel }
    }

    /// Active devices, in driver order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ControlCodeFailed`] if the driver rejects the
    /// request, or [`Error::Decode`] if it reports an impossible count.
    pub fn list_devices(&self) -> Result<Vec<DeviceRecord>> {
        let mut raw = vec![0u8; MAX_DEVICES * DEVICE_INFO_SIZE];
        let reported = self
            .channel
            .send_control(Command::GetDeviceInfoList, Some(&mut raw))?;
        let count = usize::try_from(reported)
            .ok()
            .filter(|&count| count <= MAX_DEVICES)
            .ok_or_else(|| Error::decode(format!("driver reported {reported} devices")))?;

        let devices: Vec<_> = DeviceRecord::decode_list(&raw, count)?
            .into_iter()
            .filter(|device| device.active)
            .collect();
        debug!(reported = count, active = devices.len(), "Enumerated devices");
        Ok(devices)
    }

    /// The active device whose input, output or config region contains
    /// `address`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AddressOutOfRange`] if no region contains it.
    pub fn find_device_containing(&self, address: u16) -> Result<(DeviceRecord, Region)> {
        let devices = self.list_devices()?;
        find_containing(&devices, address).ok_or(Error::AddressOutOfRange { address })
    }

    /// Descriptor of the device at slot address `slot`.
    pub fn device(&self, slot: u8) -> Result<DeviceRecord> {
        self.channel.device_info_by_address(slot)
    }
}
