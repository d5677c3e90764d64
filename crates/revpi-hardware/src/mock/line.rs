//! Mock GPIO edge lines.
//!
//! A [`MockLineBank`] stands in for a GPIO chip: requesting a line returns a
//! [`MockEdgeLine`] fed by a channel, and the bank keeps a
//! [`MockEdgeLineHandle`] for every requested offset so tests can inject
//! edges after a subscription has been created.

use crate::traits::{EdgeEvent, EdgeLine};
use parking_lot::Mutex;
use revpi_core::{Error, Result};
use std::collections::HashMap;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::mpsc;

/// Mock edge line that yields injected events.
///
/// # Examples
///
/// ```
/// use revpi_hardware::mock::MockEdgeLine;
/// use revpi_hardware::traits::{EdgeEvent, EdgeLine};
///
/// #[tokio::main]
/// async fn main() -> revpi_core::Result<()> {
///     let (mut line, handle) = MockEdgeLine::new(113, 8);
///
///     handle.inject(EdgeEvent::rising(100)).await?;
///     assert_eq!(line.next_edge().await?, EdgeEvent::rising(100));
///
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct MockEdgeLine {
    offset: u32,
    event_rx: mpsc::Receiver<EdgeEvent>,
}

impl MockEdgeLine {
    /// Create a line at `offset` with room for `buffer` pending events.
    pub fn new(offset: u32, buffer: usize) -> (Self, MockEdgeLineHandle) {
        let (event_tx, event_rx) = mpsc::channel(buffer.max(1));
        (
            Self { offset, event_rx },
            MockEdgeLineHandle { offset, event_tx },
        )
    }

    /// Line offset on the chip.
    pub fn offset(&self) -> u32 {
        self.offset
    }
}

impl EdgeLine for MockEdgeLine {
    fn poll_next_edge(&mut self, cx: &mut Context<'_>) -> Poll<Result<EdgeEvent>> {
        let offset = self.offset;
        self.event_rx
            .poll_recv(cx)
            .map(|event| event.ok_or_else(|| Error::event_line(format!("line {offset} closed"))))
    }
}

/// Handle for injecting edges into a [`MockEdgeLine`].
#[derive(Debug, Clone)]
pub struct MockEdgeLineHandle {
    offset: u32,
    event_tx: mpsc::Sender<EdgeEvent>,
}

impl MockEdgeLineHandle {
    /// Line offset on the chip.
    pub fn offset(&self) -> u32 {
        self.offset
    }

    /// Deliver an edge to the line.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EventLine`] if the line has been released.
    pub async fn inject(&self, event: EdgeEvent) -> Result<()> {
        self.event_tx
            .send(event)
            .await
            .map_err(|_| Error::event_line(format!("line {} released", self.offset)))
    }

    /// Whether the line has been released by its owner.
    pub fn is_released(&self) -> bool {
        self.event_tx.is_closed()
    }
}

/// Mock GPIO chip handing out [`MockEdgeLine`]s.
#[derive(Debug, Clone)]
pub struct MockLineBank {
    buffer: usize,
    handles: Arc<Mutex<HashMap<u32, MockEdgeLineHandle>>>,
}

impl MockLineBank {
    /// Create a bank whose lines buffer up to `buffer` events.
    pub fn new(buffer: usize) -> Self {
        Self {
            buffer,
            handles: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Request a line; a second request for the same offset replaces the
    /// handle of the first.
    pub fn request(&self, offset: u32) -> MockEdgeLine {
        let (line, handle) = MockEdgeLine::new(offset, self.buffer);
        self.handles.lock().insert(offset, handle);
        line
    }

    /// Handle of the most recently requested line at `offset`.
    pub fn handle(&self, offset: u32) -> Option<MockEdgeLineHandle> {
        self.handles.lock().get(&offset).cloned()
    }
}

impl Default for MockLineBank {
    fn default() -> Self {
        Self::new(64)
    }
}
