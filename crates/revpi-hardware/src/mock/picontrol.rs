//! Mock piControl driver for testing and development.
//!
//! `MockPiControl` emulates the driver side of the control-code contract
//! against an in-memory process image. Tests configure it with a builder,
//! then inspect or mutate the emulated state through a cloneable
//! [`MockPiControlHandle`].

use crate::traits::ControlDevice;
use parking_lot::{Condvar, Mutex, RwLock};
use revpi_core::command::{Command, command_number};
use revpi_core::constants::{
    COUNTER_SLOT_WIDTH, COUNTER_TABLE_OFFSET, DEVICE_INFO_SIZE, LAST_MESSAGE_LEN, MAX_DEVICES,
    MODE_TABLE_OFFSET, VARIABLE_INFO_SIZE, VARIABLE_NAME_LEN, WHOLE_BYTE_BIT,
};
use revpi_core::types::{BitLength, CounterReset, DeviceRecord, ValueRequest, VariableDescriptor};
use std::collections::{HashMap, HashSet, VecDeque};
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// Default size of the emulated process image.
pub const DEFAULT_IMAGE_SIZE: usize = 4096;

/// Input, output and config lengths of an emulated DIO module.
const DIO_LENGTHS: (u16, u16, u16) = (70, 18, 104);

/// Holds dispatches of one command until opened.
#[derive(Debug, Default)]
struct Latch {
    state: Mutex<LatchState>,
    changed: Condvar,
}

#[derive(Debug, Default)]
struct LatchState {
    waiting: usize,
    open: bool,
}

impl Latch {
    fn pass(&self) {
        let mut state = self.state.lock();
        state.waiting += 1;
        self.changed.notify_all();
        while !state.open {
            self.changed.wait(&mut state);
        }
        state.waiting -= 1;
    }

    fn open(&self) {
        self.state.lock().open = true;
        self.changed.notify_all();
    }

    fn wait_for_waiter(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        while state.waiting == 0 {
            if self.changed.wait_until(&mut state, deadline).timed_out() {
                return state.waiting > 0;
            }
        }
        true
    }
}

/// Control codes currently inside the mock, and the most seen at once.
#[derive(Debug, Default)]
struct Dispatches {
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl Dispatches {
    fn enter(&self) -> InFlight<'_> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        InFlight(self)
    }
}

struct InFlight<'a>(&'a Dispatches);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[derive(Debug)]
struct DriverState {
    image: Vec<u8>,
    devices: Vec<DeviceRecord>,
    variables: Vec<VariableDescriptor>,
    failing: HashSet<Command>,
    read_limit: Option<usize>,
    parked: HashMap<Command, Arc<Latch>>,
    control_log: Vec<Command>,
    read_count: AtomicUsize,
    counter_resets: Vec<CounterReset>,
    events: VecDeque<i32>,
    watchdog_ms: Option<u64>,
    io_stopped: bool,
    last_message: String,
    closed: bool,
}

impl DriverState {
    fn new(image_size: usize) -> Self {
        Self {
            image: vec![0; image_size],
            devices: Vec::new(),
            variables: Vec::new(),
            failing: HashSet::new(),
            read_limit: None,
            parked: HashMap::new(),
            control_log: Vec::new(),
            read_count: AtomicUsize::new(0),
            counter_resets: Vec::new(),
            events: VecDeque::new(),
            watchdog_ms: None,
            io_stopped: false,
            last_message: String::new(),
            closed: false,
        }
    }

    fn byte(&self, address: u16) -> io::Result<u8> {
        self.image
            .get(usize::from(address))
            .copied()
            .ok_or_else(|| invalid_argument("address outside process image"))
    }

    fn byte_mut(&mut self, address: u16) -> io::Result<&mut u8> {
        self.image
            .get_mut(usize::from(address))
            .ok_or_else(|| invalid_argument("address outside process image"))
    }

    fn dispatch(&mut self, command: Command, arg: Option<&mut [u8]>) -> io::Result<i32> {
        match command {
            Command::Reset => {
                self.io_stopped = false;
                Ok(0)
            }
            Command::GetDeviceInfoList => {
                let buf = required(arg, MAX_DEVICES * DEVICE_INFO_SIZE)?;
                let count = self.devices.len().min(MAX_DEVICES);
                for (record, chunk) in self
                    .devices
                    .iter()
                    .zip(buf.chunks_exact_mut(DEVICE_INFO_SIZE))
                {
                    chunk.copy_from_slice(&record.encode());
                }
                i32::try_from(count).map_err(|_| invalid_argument("device count overflow"))
            }
            Command::GetDeviceInfo => {
                let buf = required(arg, DEVICE_INFO_SIZE)?;
                let slot = buf[0];
                let record = self
                    .devices
                    .iter()
                    .find(|record| record.slot == slot)
                    .ok_or_else(|| io::Error::from_raw_os_error(libc::ENXIO))?;
                buf[..DEVICE_INFO_SIZE].copy_from_slice(&record.encode());
                Ok(0)
            }
            Command::GetValue => {
                let buf = required(arg, 4)?;
                let mut request =
                    ValueRequest::decode(buf).map_err(|e| invalid_argument(&e.to_string()))?;
                let byte = self.byte(request.address)?;
                request.value = if request.bit >= WHOLE_BYTE_BIT {
                    byte
                } else {
                    (byte >> request.bit) & 1
                };
                buf[..4].copy_from_slice(&request.encode());
                Ok(0)
            }
            Command::SetValue => {
                let buf = required(arg, 4)?;
                let request =
                    ValueRequest::decode(buf).map_err(|e| invalid_argument(&e.to_string()))?;
                let byte = self.byte_mut(request.address)?;
                if request.bit >= WHOLE_BYTE_BIT {
                    *byte = request.value;
                } else if request.value != 0 {
                    *byte |= 1 << request.bit;
                } else {
                    *byte &= !(1 << request.bit);
                }
                Ok(0)
            }
            Command::FindVariable => {
                let buf = required(arg, VARIABLE_INFO_SIZE)?;
                let field = &buf[..VARIABLE_NAME_LEN];
                let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
                let name = String::from_utf8_lossy(&field[..end]).into_owned();
                let variable = self
                    .variables
                    .iter()
                    .find(|variable| variable.name == name)
                    .ok_or_else(|| io::Error::from(io::ErrorKind::NotFound))?;
                buf[..VARIABLE_INFO_SIZE].copy_from_slice(&variable.encode());
                Ok(0)
            }
            Command::ResetCounter => {
                let buf = required(arg, 4)?;
                let request =
                    CounterReset::decode(buf).map_err(|e| invalid_argument(&e.to_string()))?;
                let device = self
                    .devices
                    .iter()
                    .find(|record| record.slot == request.slot && record.is_digital_io())
                    .copied()
                    .ok_or_else(|| invalid_argument("no digital-I/O module at slot"))?;
                for line in (0..16u16).filter(|line| request.bitfield & (1u16 << *line) != 0) {
                    let start = usize::from(device.input_offset)
                        + usize::from(COUNTER_TABLE_OFFSET)
                        + usize::from(line * COUNTER_SLOT_WIDTH);
                    if let Some(slot) = self.image.get_mut(start..start + 4) {
                        slot.fill(0);
                    }
                }
                self.counter_resets.push(request);
                Ok(0)
            }
            Command::GetLastMessage => {
                let buf = required(arg, LAST_MESSAGE_LEN)?;
                let message = self.last_message.as_bytes();
                let n = message.len().min(LAST_MESSAGE_LEN - 1);
                buf[..n].copy_from_slice(&message[..n]);
                buf[n] = 0;
                Ok(0)
            }
            Command::StopIo => {
                let buf = required(arg, 4)?;
                let request = i32::from_ne_bytes([buf[0], buf[1], buf[2], buf[3]]);
                self.io_stopped = match request {
                    0 => false,
                    1 => true,
                    2 => !self.io_stopped,
                    _ => return Err(invalid_argument("illegal stop-io request")),
                };
                Ok(i32::from(self.io_stopped))
            }
            Command::SetOutputWatchdog => {
                let width = std::mem::size_of::<libc::c_ulong>();
                let buf = required(arg, width)?;
                let mut raw = [0u8; 8];
                raw[..width].copy_from_slice(&buf[..width]);
                let millis = u64::from_ne_bytes(raw);
                self.watchdog_ms = (millis != 0).then_some(millis);
                Ok(0)
            }
            Command::WaitForEvent => {
                let buf = required(arg, 4)?;
                let event = self
                    .events
                    .pop_front()
                    .ok_or_else(|| io::Error::from(io::ErrorKind::WouldBlock))?;
                buf[..4].copy_from_slice(&event.to_ne_bytes());
                Ok(0)
            }
            _ => Err(invalid_argument("unsupported command")),
        }
    }
}

fn invalid_argument(message: &str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidInput, message.to_string())
}

fn required(arg: Option<&mut [u8]>, len: usize) -> io::Result<&mut [u8]> {
    match arg {
        Some(buf) if buf.len() >= len => Ok(buf),
        _ => Err(invalid_argument("argument buffer too small")),
    }
}

/// Mock piControl device handle.
///
/// # Examples
///
/// ```
/// use revpi_hardware::mock::MockPiControl;
/// use revpi_hardware::traits::ControlDevice;
///
/// let (device, handle) = MockPiControl::builder()
///     .dio_module(32, 113, 1)
///     .build();
///
/// handle.write_image(119, &[7, 0, 0, 0]);
/// let mut buf = [0u8; 4];
/// assert_eq!(device.read_at(&mut buf, 119).unwrap(), 4);
/// assert_eq!(u32::from_le_bytes(buf), 7);
/// ```
#[derive(Debug, Clone)]
pub struct MockPiControl {
    state: Arc<RwLock<DriverState>>,
    dispatches: Arc<Dispatches>,
}

impl MockPiControl {
    /// Start configuring a mock driver.
    pub fn builder() -> MockPiControlBuilder {
        MockPiControlBuilder::new()
    }

    /// Create an empty mock driver with the default image size.
    pub fn new() -> (Self, MockPiControlHandle) {
        Self::builder().build()
    }
}

impl ControlDevice for MockPiControl {
    fn control(&self, code: u32, arg: Option<&mut [u8]>) -> io::Result<i32> {
        let command = command_number(code)
            .and_then(Command::from_number)
            .ok_or_else(|| io::Error::from_raw_os_error(libc::EINVAL))?;

        let _in_flight = self.dispatches.enter();
        let latch = self.state.read().parked.get(&command).cloned();
        if let Some(latch) = latch {
            latch.pass();
        }

        let mut state = self.state.write();
        if state.closed {
            return Err(io::Error::from_raw_os_error(libc::EBADF));
        }
        state.control_log.push(command);
        if state.failing.contains(&command) {
            return Err(io::Error::from_raw_os_error(libc::EIO));
        }
        state.dispatch(command, arg)
    }

    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        let state = self.state.read();
        if state.closed {
            return Err(io::Error::from_raw_os_error(libc::EBADF));
        }
        state.read_count.fetch_add(1, Ordering::Relaxed);

        let start = usize::try_from(offset).unwrap_or(usize::MAX);
        let Some(available) = state.image.get(start..) else {
            return Ok(0);
        };
        let mut n = buf.len().min(available.len());
        if let Some(limit) = state.read_limit {
            n = n.min(limit);
        }
        buf[..n].copy_from_slice(&available[..n]);
        Ok(n)
    }

    fn write_at(&self, buf: &[u8], offset: u64) -> io::Result<usize> {
        let mut state = self.state.write();
        if state.closed {
            return Err(io::Error::from_raw_os_error(libc::EBADF));
        }
        let start = usize::try_from(offset).unwrap_or(usize::MAX);
        let Some(available) = state.image.get_mut(start..) else {
            return Ok(0);
        };
        let n = buf.len().min(available.len());
        available[..n].copy_from_slice(&buf[..n]);
        Ok(n)
    }

    fn close(self) -> io::Result<()> {
        let mut state = self.state.write();
        if state.closed {
            return Err(io::Error::from_raw_os_error(libc::EBADF));
        }
        state.closed = true;
        Ok(())
    }
}

/// Builder for [`MockPiControl`].
#[derive(Debug)]
pub struct MockPiControlBuilder {
    state: DriverState,
}

impl MockPiControlBuilder {
    fn new() -> Self {
        Self {
            state: DriverState::new(DEFAULT_IMAGE_SIZE),
        }
    }

    /// Resize the emulated process image.
    pub fn image_size(mut self, size: usize) -> Self {
        self.state.image.resize(size, 0);
        self
    }

    /// Add a device descriptor as returned by the device-info list.
    pub fn device(mut self, record: DeviceRecord) -> Self {
        self.state.devices.push(record);
        self
    }

    /// Add a variable to the driver's variable table.
    pub fn variable(mut self, name: &str, address: u16, bit: u8, length: BitLength) -> Self {
        self.state.variables.push(VariableDescriptor {
            name: name.to_string(),
            address,
            bit,
            length,
        });
        self
    }

    /// Add an active DIO module at `input_offset` together with its
    /// variables, named with `suffix` the way PiCtory numbers them:
    /// `I_1..I_16`, `Counter_1..Counter_16`, `InputMode_1..InputMode_16`
    /// and `O_1..O_16`. The module's input lines start with their mode
    /// byte set to zero (interrupts disabled).
    pub fn dio_module(mut self, slot: u8, input_offset: u16, suffix: usize) -> Self {
        let (input_length, output_length, config_length) = DIO_LENGTHS;
        let output_offset = input_offset + input_length;
        let config_offset = output_offset + output_length;
        self.state.devices.push(DeviceRecord {
            slot,
            serial_number: 10_000 + u32::from(slot),
            module_type: 96,
            hw_revision: 4,
            sw_major: 1,
            sw_minor: 5,
            input_length,
            output_length,
            config_length,
            base_offset: input_offset,
            input_offset,
            output_offset,
            config_offset,
            entry_count: 64,
            active: true,
            ..Default::default()
        });

        let tag = |prefix: &str, line: u16| {
            if suffix <= 1 {
                format!("{prefix}_{line}")
            } else {
                format!("{prefix}_{line}_i{suffix:02}")
            }
        };
        for line in 1..=16u16 {
            let index = line - 1;
            let word = input_offset + index / 8;
            let bit = u8::try_from(index % 8).unwrap_or(0);
            self.state.variables.extend([
                VariableDescriptor {
                    name: tag("I", line),
                    address: word,
                    bit,
                    length: BitLength::Bit,
                },
                VariableDescriptor {
                    name: tag("Counter", line),
                    address: input_offset + COUNTER_TABLE_OFFSET + index * COUNTER_SLOT_WIDTH,
                    bit: 0,
                    length: BitLength::DoubleWord,
                },
                VariableDescriptor {
                    name: tag("InputMode", line),
                    address: input_offset + MODE_TABLE_OFFSET + index,
                    bit: 0,
                    length: BitLength::Byte,
                },
                VariableDescriptor {
                    name: tag("O", line),
                    address: output_offset + index / 8,
                    bit,
                    length: BitLength::Bit,
                },
            ]);
        }
        self
    }

    /// Finish the mock and hand out its control handle.
    pub fn build(self) -> (MockPiControl, MockPiControlHandle) {
        let state = Arc::new(RwLock::new(self.state));
        let dispatches = Arc::new(Dispatches::default());
        (
            MockPiControl {
                state: Arc::clone(&state),
                dispatches: Arc::clone(&dispatches),
            },
            MockPiControlHandle { state, dispatches },
        )
    }
}

/// Handle for driving and inspecting a [`MockPiControl`].
#[derive(Debug, Clone)]
pub struct MockPiControlHandle {
    state: Arc<RwLock<DriverState>>,
    dispatches: Arc<Dispatches>,
}

impl MockPiControlHandle {
    /// Write raw bytes into the process image.
    ///
    /// # Panics
    ///
    /// Panics if the range lies outside the image.
    pub fn write_image(&self, offset: u16, bytes: &[u8]) {
        let start = usize::from(offset);
        self.state.write().image[start..start + bytes.len()].copy_from_slice(bytes);
    }

    /// Copy raw bytes out of the process image.
    pub fn read_image(&self, offset: u16, len: usize) -> Vec<u8> {
        let start = usize::from(offset);
        self.state
            .read()
            .image
            .get(start..start + len)
            .map(<[u8]>::to_vec)
            .unwrap_or_default()
    }

    /// Set the firmware mode byte of input line `line` (0-15) of the module
    /// whose input region starts at `input_offset`.
    pub fn set_input_mode(&self, input_offset: u16, line: u16, mode: u8) {
        self.write_image(input_offset + MODE_TABLE_OFFSET + line, &[mode]);
    }

    /// Store a counter value for input line `line` (0-15).
    pub fn set_counter(&self, input_offset: u16, line: u16, value: u32) {
        self.write_image(
            input_offset + COUNTER_TABLE_OFFSET + line * COUNTER_SLOT_WIDTH,
            &value.to_le_bytes(),
        );
    }

    /// Make every subsequent dispatch of `command` fail with `EIO`.
    pub fn fail_command(&self, command: Command) {
        self.state.write().failing.insert(command);
    }

    /// Cap every positioned read at `limit` bytes.
    pub fn truncate_reads(&self, limit: usize) {
        self.state.write().read_limit = Some(limit);
    }

    /// Commands dispatched so far, in order.
    pub fn control_log(&self) -> Vec<Command> {
        self.state.read().control_log.clone()
    }

    /// Number of positioned reads served.
    pub fn read_count(&self) -> usize {
        self.state.read().read_count.load(Ordering::Relaxed)
    }

    /// Hold every dispatch of `command` inside the driver until
    /// [`release_command`](Self::release_command) is called.
    ///
    /// A held dispatch does not lock the process image.
    pub fn park_command(&self, command: Command) {
        self.state
            .write()
            .parked
            .insert(command, Arc::new(Latch::default()));
    }

    /// Wait up to `timeout` for a dispatch of `command` to be held.
    pub fn wait_parked(&self, command: Command, timeout: Duration) -> bool {
        let latch = self.state.read().parked.get(&command).cloned();
        latch.is_some_and(|latch| latch.wait_for_waiter(timeout))
    }

    /// Let held and future dispatches of `command` through.
    pub fn release_command(&self, command: Command) {
        let latch = self.state.write().parked.remove(&command);
        if let Some(latch) = latch {
            latch.open();
        }
    }

    /// Most control codes that were inside the driver at the same time.
    pub fn peak_dispatches(&self) -> usize {
        self.dispatches.peak.load(Ordering::SeqCst)
    }

    /// Counter reset requests received.
    pub fn counter_resets(&self) -> Vec<CounterReset> {
        self.state.read().counter_resets.clone()
    }

    /// Queue an event for wait-for-event.
    pub fn push_event(&self, event: i32) {
        self.state.write().events.push_back(event);
    }

    /// Set the text returned by get-last-message.
    pub fn set_last_message(&self, message: &str) {
        self.state.write().last_message = message.to_string();
    }

    /// Armed watchdog period in milliseconds.
    pub fn watchdog(&self) -> Option<u64> {
        self.state.read().watchdog_ms
    }

    /// Whether I/O cycling is stopped.
    pub fn io_stopped(&self) -> bool {
        self.state.read().io_stopped
    }

    /// Whether the device handle was closed.
    pub fn is_closed(&self) -> bool {
        self.state.read().closed
    }

    /// Mark a configured device active or inactive.
    pub fn set_active(&self, slot: u8, active: bool) {
        if let Some(record) = self
            .state
            .write()
            .devices
            .iter_mut()
            .find(|record| record.slot == slot)
        {
            record.active = active;
        }
    }
}
