//! Edge-event monitoring for digital input pins.
//!
//! Each subscription owns one tokio task and one requested GPIO line. The
//! task waits on "next edge or cancellation", checking cancellation first,
//! and hands every edge to the subscriber's callback in the order the line
//! reports it.
//!
//! ```text
//! ┌──────────┐  edge   ┌────────────────┐  (rising, ns)  ┌──────────┐
//! │ GPIO     │────────►│ monitor task   │───────────────►│ callback │
//! │ line     │         │ select! biased │                └──────────┘
//! └──────────┘         └───────▲────────┘
//!                              │ cancel
//!                     InterruptSubscription
//! ```
//!
//! The line itself sits in a slot shared by the subscription and its task.
//! The task holds the slot's lock only while polling the line, never across
//! an await or a callback, so closing a subscription signals the task and
//! drops the line at once. It does not wait for the task to exit: a callback
//! already running when `close` is called may finish afterwards. No callback
//! starts once the task has seen the signal.

use crate::counter::CounterPin;
use crate::devices::{AnyEdgeLine, LineSource};
use crate::traits::{EdgeEvent, EdgeLine};
use parking_lot::Mutex;
use revpi_core::{Error, Result};
use std::future::poll_fn;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Callback invoked with `(rising_edge, timestamp_nanos)` for every edge.
///
/// Errors are logged and do not stop the monitor.
pub type TickHandler = Arc<dyn Fn(bool, u64) -> anyhow::Result<()> + Send + Sync>;

/// The requested line of one subscription.
#[derive(Debug)]
struct LineSlot {
    offset: u32,
    line: Mutex<Option<AnyEdgeLine>>,
}

impl LineSlot {
    fn new(offset: u32, line: AnyEdgeLine) -> Self {
        Self {
            offset,
            line: Mutex::new(Some(line)),
        }
    }

    fn poll_next_edge(&self, cx: &mut Context<'_>) -> Poll<Result<EdgeEvent>> {
        match self.line.lock().as_mut() {
            Some(line) => line.poll_next_edge(cx),
            None => Poll::Ready(Err(Error::event_line(format!(
                "line {} released",
                self.offset
            )))),
        }
    }

    /// Drop the line. Returns `false` if it was already gone.
    fn release(&self) -> bool {
        let line = self.line.lock().take();
        line.is_some()
    }
}

/// Spawns one monitoring task per subscribed pin.
///
/// # Examples
///
/// ```no_run
/// use revpi_hardware::devices::LineSource;
/// use revpi_hardware::monitor::EventMonitor;
/// use std::sync::Arc;
///
/// # async fn example(pin: revpi_hardware::counter::CounterPin) -> revpi_core::Result<()> {
/// let monitor = EventMonitor::new(LineSource::Gpiod {
///     chip: "piControl0".to_string(),
///     consumer: "revpi-interrupt".to_string(),
/// });
///
/// let subscription = monitor
///     .subscribe(pin, Arc::new(|rising, nanos| {
///         println!("edge rising={rising} at {nanos}ns");
///         Ok(())
///     }))
///     .await?;
///
/// subscription.close();
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct EventMonitor {
    lines: LineSource,
    shutdown: CancellationToken,
    in_use: Mutex<Vec<Weak<LineSlot>>>,
}

impl EventMonitor {
    /// Create a monitor requesting lines from `lines`.
    pub fn new(lines: LineSource) -> Self {
        Self {
            lines,
            shutdown: CancellationToken::new(),
            in_use: Mutex::new(Vec::new()),
        }
    }

    /// Request the pin's line and start monitoring it.
    ///
    /// The line offset is the pin's process-image address.
    ///
    /// # Errors
    ///
    /// Returns `EventLine` if the line cannot be requested.
    pub async fn subscribe(
        &self,
        pin: CounterPin,
        handler: TickHandler,
    ) -> Result<InterruptSubscription> {
        let line = self.lines.request(u32::from(pin.address())).await?;
        Ok(self.spawn(pin, line, handler))
    }

    fn spawn(
        &self,
        pin: CounterPin,
        line: AnyEdgeLine,
        handler: TickHandler,
    ) -> InterruptSubscription {
        let token = self.shutdown.child_token();
        let ticks = Arc::new(AtomicU64::new(0));
        let line = Arc::new(LineSlot::new(u32::from(pin.address()), line));

        {
            let mut in_use = self.in_use.lock();
            in_use.retain(|slot| slot.strong_count() > 0);
            in_use.push(Arc::downgrade(&line));
        }

        let task = tokio::spawn(run_monitor(
            pin.name().to_string(),
            Arc::clone(&line),
            token.clone(),
            handler,
            Arc::clone(&ticks),
        ));
        info!(pin = %pin.name(), address = pin.address(), "Interrupt subscription started");

        InterruptSubscription {
            pin,
            token,
            line,
            ticks,
            task,
        }
    }

    /// Cancel every subscription created by this monitor and release their
    /// lines.
    pub fn shutdown(&self) {
        debug!("Cancelling all interrupt subscriptions");
        self.shutdown.cancel();

        let slots: Vec<_> = self.in_use.lock().drain(..).collect();
        let released = slots
            .iter()
            .filter_map(Weak::upgrade)
            .filter(|slot| slot.release())
            .count();
        debug!(released, "Edge lines released");
    }

    /// Whether [`shutdown`](Self::shutdown) has been called.
    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }
}

async fn run_monitor(
    name: String,
    line: Arc<LineSlot>,
    token: CancellationToken,
    handler: TickHandler,
    ticks: Arc<AtomicU64>,
) {
    loop {
        tokio::select! {
            biased;

            () = token.cancelled() => {
                debug!(pin = %name, "Monitor cancelled");
                break;
            }

            edge = poll_fn(|cx| line.poll_next_edge(cx)) => {
                match edge {
                    Ok(event) => {
                        ticks.fetch_add(1, Ordering::Relaxed);
                        if let Err(e) = handler(event.rising, event.timestamp_nanos) {
                            warn!(pin = %name, error = %e, "Tick callback failed");
                        }
                    }
                    Err(e) => {
                        error!(pin = %name, error = %e, "Edge line failed, monitor stopped");
                        break;
                    }
                }
            }
        }
    }
    line.release();
}

/// A running edge subscription.
///
/// Dropping the subscription cancels it, like [`close`](Self::close).
#[derive(Debug)]
pub struct InterruptSubscription {
    pin: CounterPin,
    token: CancellationToken,
    line: Arc<LineSlot>,
    ticks: Arc<AtomicU64>,
    task: JoinHandle<()>,
}

impl InterruptSubscription {
    /// The monitored pin.
    pub fn pin(&self) -> &CounterPin {
        &self.pin
    }

    /// Number of edges delivered so far.
    pub fn tick_count(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    /// Signal the task to stop and release the line.
    ///
    /// The line is free for a new request when this returns. The task is
    /// not awaited.
    pub fn close(&self) {
        self.token.cancel();
        if self.line.release() {
            info!(pin = %self.pin.name(), "Interrupt subscription closed");
        }
    }

    /// Whether the subscription was closed, directly or through its monitor.
    pub fn is_closed(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Whether the monitoring task has exited.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for InterruptSubscription {
    fn drop(&mut self) {
        self.token.cancel();
        self.line.release();
    }
}
