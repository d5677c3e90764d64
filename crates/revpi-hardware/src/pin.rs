//! Named process-image pins.

use crate::channel::ControlChannel;
use crate::resolver::{AddressResolver, ResolvedVariable};
use revpi_core::constants::WHOLE_BYTE_BIT;
use revpi_core::types::Region;
use revpi_core::{Error, Result};
use std::sync::Arc;
use tracing::debug;

/// A single process-image bit addressed by variable name.
///
/// Reads go through get-value and writes through set-value, so the driver
/// does the read-modify-write of the containing byte. Whole-byte variables
/// read as `true` when non-zero and write `0` or `1`.
#[derive(Debug, Clone)]
pub struct ProcessPin {
    resolved: ResolvedVariable,
    channel: Arc<ControlChannel>,
}

impl ProcessPin {
    /// Resolve `name` to a pin.
    ///
    /// # Errors
    ///
    /// Returns the resolver's lookup errors.
    pub fn open(channel: Arc<ControlChannel>, name: &str) -> Result<Self> {
        let resolved = AddressResolver::new(Arc::clone(&channel)).resolve(name)?;
        Ok(Self { resolved, channel })
    }

    pub fn name(&self) -> &str {
        &self.resolved.variable.name
    }

    /// Region the pin lives in. Only output pins can be set.
    pub fn region(&self) -> Region {
        self.resolved.region
    }

    /// Current level of the pin.
    pub fn get(&self) -> Result<bool> {
        let address = self.resolved.variable.address;
        Ok(self.channel.get_value(address, self.access_bit())? != 0)
    }

    /// Drive the pin.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unsupported`] unless the pin is in an output region.
    pub fn set(&self, high: bool) -> Result<()> {
        if self.resolved.region != Region::Output {
            return Err(Error::unsupported(format!(
                "set {} ({} region)",
                self.name(),
                self.resolved.region
            )));
        }
        let address = self.resolved.variable.address;
        self.channel
            .set_value(address, self.access_bit(), u8::from(high))?;
        debug!(name = %self.name(), high, "Pin set");
        Ok(())
    }

    fn access_bit(&self) -> u8 {
        let variable = &self.resolved.variable;
        if variable.is_whole_byte() {
            WHOLE_BYTE_BIT
        } else {
            variable.bit
        }
    }

    /// PWM is not available on process-image pins.
    pub fn pwm(&self) -> Result<f64> {
        Err(Error::unsupported(format!("pwm on {}", self.name())))
    }

    /// PWM is not available on process-image pins.
    pub fn set_pwm(&self, _duty_cycle: f64) -> Result<()> {
        Err(Error::unsupported(format!("set_pwm on {}", self.name())))
    }
}
