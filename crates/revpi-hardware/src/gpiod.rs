//! Edge lines backed by the GPIO character device.
//!
//! The piControl driver registers a GPIO chip whose line offsets are
//! process-image addresses; requesting a line with both-edge detection
//! yields one kernel event per transition of that input.
//!
//! A pending read owns the requested lines, so dropping a [`GpiodLine`]
//! releases the kernel line request even while a read is outstanding.

use crate::traits::{EdgeEvent, EdgeLine};
use revpi_core::{Error, Result};
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio_gpiod::{Chip, Edge, EdgeDetect, Event, Input, Lines, Options};
use tracing::debug;

type PendingRead = Pin<Box<dyn Future<Output = (Lines<Input>, io::Result<Event>)> + Send>>;

enum ReadState {
    Idle(Lines<Input>),
    Reading(PendingRead),
    Empty,
}

/// A requested GPIO line with both-edge detection enabled.
pub struct GpiodLine {
    offset: u32,
    state: ReadState,
}

impl std::fmt::Debug for GpiodLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpiodLine")
            .field("offset", &self.offset)
            .field("reading", &matches!(self.state, ReadState::Reading(_)))
            .finish_non_exhaustive()
    }
}

impl GpiodLine {
    /// Request `offset` on `chip` for both-edge events.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EventLine`] if the chip cannot be opened or the line
    /// is already in use.
    pub async fn request(chip: &str, offset: u32, consumer: &str) -> Result<Self> {
        let chip = Chip::new(chip)
            .await
            .map_err(|e| Error::event_line(format!("failed to open GPIO chip {chip}: {e}")))?;

        let options = Options::input([offset])
            .edge(EdgeDetect::Both)
            .consumer(consumer);
        let lines = chip
            .request_lines(options)
            .await
            .map_err(|e| Error::event_line(format!("failed to request line {offset}: {e}")))?;

        debug!(chip = %chip.name(), offset, "Requested edge line");
        Ok(Self {
            offset,
            state: ReadState::Idle(lines),
        })
    }

    fn to_edge(&self, event: io::Result<Event>) -> Result<EdgeEvent> {
        let event = event.map_err(|e| Error::event_line(format!("line {}: {e}", self.offset)))?;
        Ok(EdgeEvent {
            rising: matches!(event.edge, Edge::Rising),
            timestamp_nanos: u64::try_from(event.time.as_nanos()).unwrap_or(u64::MAX),
        })
    }
}

impl EdgeLine for GpiodLine {
    fn poll_next_edge(&mut self, cx: &mut Context<'_>) -> Poll<Result<EdgeEvent>> {
        loop {
            match std::mem::replace(&mut self.state, ReadState::Empty) {
                ReadState::Idle(mut lines) => {
                    self.state = ReadState::Reading(Box::pin(async move {
                        let event = lines.read_event().await;
                        (lines, event)
                    }));
                }
                ReadState::Reading(mut read) => {
                    return match read.as_mut().poll(cx) {
                        Poll::Pending => {
                            self.state = ReadState::Reading(read);
                            Poll::Pending
                        }
                        Poll::Ready((lines, event)) => {
                            self.state = ReadState::Idle(lines);
                            Poll::Ready(self.to_edge(event))
                        }
                    };
                }
                ReadState::Empty => {
                    return Poll::Ready(Err(Error::event_line(format!(
                        "line {} is no longer requested",
                        self.offset
                    ))));
                }
            }
        }
    }
}
