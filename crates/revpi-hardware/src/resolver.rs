//! Variable name resolution.
//!
//! Names are resolved by the driver from the PiCtory configuration it has
//! loaded. Every lookup is one find-variable round trip; results are never
//! cached because a reconfiguration can move any variable.

use crate::catalog::DeviceCatalog;
use crate::channel::ControlChannel;
use revpi_core::command::Command;
use revpi_core::types::{DeviceRecord, Region, VariableDescriptor};
use revpi_core::{Error, Result};
use std::io;
use std::sync::Arc;
use tracing::debug;

/// Address returned by some driver versions for unknown names.
const UNKNOWN_ADDRESS: u16 = u16::MAX;

/// A variable together with the device and region that own it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedVariable {
    /// Descriptor returned by the driver.
    pub variable: VariableDescriptor,

    /// Device whose region contains the variable's address.
    pub device: DeviceRecord,

    /// Region of `device` the address falls in.
    pub region: Region,
}

/// Maps variable names to process-image locations.
#[derive(Debug, Clone)]
pub struct AddressResolver {
    channel: Arc<ControlChannel>,
    catalog: DeviceCatalog,
}

impl AddressResolver {
    /// Create a resolver on top of `channel`.
    pub fn new(channel: Arc<ControlChannel>) -> Self {
        let catalog = DeviceCatalog::new(Arc::clone(&channel));
        Self { channel, catalog }
    }

    /// The catalog used to locate owning devices.
    pub fn catalog(&self) -> &DeviceCatalog {
        &self.catalog
    }

    /// Look up `name` in the driver's variable table.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if the name cannot be encoded
    /// - [`Error::VariableNotFound`] if the driver does not know the name
    /// - [`Error::Decode`] if the descriptor carries an illegal bit length
    pub fn find_variable(&self, name: &str) -> Result<VariableDescriptor> {
        let mut raw = VariableDescriptor::lookup_request(name)?;
        match self.channel.send_control(Command::FindVariable, Some(&mut raw)) {
            Ok(_) => {}
            Err(Error::ControlCodeFailed { source, .. })
                if source.kind() == io::ErrorKind::NotFound =>
            {
                return Err(Error::variable_not_found(name));
            }
            Err(e) => return Err(e),
        }

        let variable = VariableDescriptor::decode(&raw)?;
        if variable.address == UNKNOWN_ADDRESS {
            return Err(Error::variable_not_found(name));
        }
        debug!(
            name,
            address = variable.address,
            bit = variable.bit,
            bits = variable.length.bits(),
            "Resolved variable"
        );
        Ok(variable)
    }

    /// Look up `name` and locate the device that owns it.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`find_variable`](Self::find_variable), or
    /// [`Error::AddressOutOfRange`] if no active device contains the
    /// address.
    pub fn resolve(&self, name: &str) -> Result<ResolvedVariable> {
        let variable = self.find_variable(name)?;
        self.locate(variable)
    }

    /// Locate the owner of a raw descriptor that did not come from a name
    /// lookup.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AddressOutOfRange`] if no active device contains the
    /// address.
    pub fn locate(&self, variable: VariableDescriptor) -> Result<ResolvedVariable> {
        let (device, region) = self.catalog.find_device_containing(variable.address)?;
        Ok(ResolvedVariable {
            variable,
            device,
            region,
        })
    }
}
