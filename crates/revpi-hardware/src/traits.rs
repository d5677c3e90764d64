//! Hardware trait definitions.
//!
//! These traits are the seams between the runtime components and the
//! hardware: the piControl device handle, the GPIO edge lines, and the two
//! capability contracts a digital input line can offer once the module
//! firmware has configured it (pulse counter or quadrature encoder).
//!
//! Device traits are implemented by a real backend and by a mock backend in
//! [`crate::mock`]; dispatch goes through the enum wrappers in
//! [`crate::devices`].

#![allow(async_fn_in_trait)]

use revpi_core::Result;
use std::future::poll_fn;
use std::io;
use std::task::{Context, Poll};

/// Low-level access to the piControl device handle.
///
/// Implementations must use positioned I/O for `read_at`/`write_at` so that
/// concurrent transfers at disjoint offsets never share a cursor.
/// Serialization of `control` is the caller's job
/// ([`ControlChannel`](crate::channel::ControlChannel) holds the gate).
pub trait ControlDevice: Send + Sync {
    /// Dispatch a control code with an optional in/out argument buffer.
    ///
    /// Returns the driver's non-negative return value.
    ///
    /// # Errors
    ///
    /// Returns the OS error reported by the driver.
    fn control(&self, code: u32, arg: Option<&mut [u8]>) -> io::Result<i32>;

    /// Read process-image bytes at `offset` into `buf`.
    ///
    /// Returns the number of bytes read, which may be short.
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize>;

    /// Write `buf` into the process image at `offset`.
    ///
    /// Returns the number of bytes written, which may be short.
    fn write_at(&self, buf: &[u8], offset: u64) -> io::Result<usize>;

    /// Release the handle, reporting close failures.
    fn close(self) -> io::Result<()>
    where
        Self: Sized;
}

/// A rising or falling transition reported by an edge line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeEvent {
    /// `true` for a rising edge.
    pub rising: bool,

    /// Detection time in nanoseconds, as reported by the line.
    pub timestamp_nanos: u64,
}

impl EdgeEvent {
    /// Create a rising edge event.
    pub fn rising(timestamp_nanos: u64) -> Self {
        Self {
            rising: true,
            timestamp_nanos,
        }
    }

    /// Create a falling edge event.
    pub fn falling(timestamp_nanos: u64) -> Self {
        Self {
            rising: false,
            timestamp_nanos,
        }
    }
}

/// A GPIO line requested for both-edge notification.
///
/// The line is released when the value is dropped. Reads are poll-based, so
/// an owner may drop the line between two polls even while a task is
/// waiting on it.
pub trait EdgeLine: Send {
    /// Poll for the next edge event.
    ///
    /// Events are returned in the order the line reports them.
    ///
    /// # Errors
    ///
    /// Returns [`revpi_core::Error::EventLine`] if the line was closed or
    /// could not be read.
    fn poll_next_edge(&mut self, cx: &mut Context<'_>) -> Poll<Result<EdgeEvent>>;

    /// Wait for the next edge event.
    async fn next_edge(&mut self) -> Result<EdgeEvent> {
        poll_fn(|cx| self.poll_next_edge(cx)).await
    }
}

/// A digital input line configured by firmware as a pulse counter.
pub trait PulseCounter {
    /// Variable name of the line.
    fn name(&self) -> &str;

    /// Current counter value.
    ///
    /// # Errors
    ///
    /// Returns an error if the process-image read fails or is short.
    fn count(&self) -> Result<u32>;

    /// Reset the counter to zero.
    ///
    /// # Errors
    ///
    /// Returns an error if the driver rejects the reset request.
    fn reset(&self) -> Result<()>;
}

/// A digital input line configured by firmware as a quadrature encoder.
pub trait PositionEncoder {
    /// Variable name of the line.
    fn name(&self) -> &str;

    /// Current position in encoder ticks.
    ///
    /// # Errors
    ///
    /// Returns an error if the process-image read fails or is short.
    fn position(&self) -> Result<i32>;

    /// Reset the position to zero.
    ///
    /// # Errors
    ///
    /// Returns an error if the driver rejects the reset request.
    fn reset(&self) -> Result<()>;
}
