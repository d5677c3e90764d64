//! Process-image runtime for the Revolution Pi piControl driver.
//!
//! This crate turns variable names from a PiCtory configuration into live
//! I/O: counter and encoder values of digital-I/O modules, raw analog
//! samples, single process-image bits, and edge events delivered to
//! callbacks.
//!
//! # Components
//!
//! ```text
//! RevPiBoard
//!   ├── AnalogReader ─────────┐
//!   ├── CounterPinController ─┤
//!   │                         ├── AddressResolver ── DeviceCatalog ──┐
//!   ├── ProcessPin ───────────┘                                      │
//!   └── EventMonitor ── InterruptSubscription (one task each)        │
//!                                                     ControlChannel ┘
//! ```
//!
//! - [`ControlChannel`](channel::ControlChannel) owns the single device
//!   handle, serializes control codes and performs positioned transfers.
//! - [`DeviceCatalog`](catalog::DeviceCatalog) enumerates active modules.
//! - [`AddressResolver`](resolver::AddressResolver) maps names to addresses
//!   and owning modules.
//! - [`CounterPin`](counter::CounterPin) validates the firmware mode of an
//!   input line and reads its 32-bit value.
//! - [`EventMonitor`](monitor::EventMonitor) watches GPIO edge lines.
//!
//! Lookups are never cached; every call re-queries the driver.
//!
//! # Examples
//!
//! ```no_run
//! use revpi_hardware::board::RevPiBoard;
//! use revpi_hardware::config::BoardConfig;
//! use revpi_hardware::traits::PulseCounter;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> revpi_core::Result<()> {
//!     let board = RevPiBoard::open(BoardConfig::default())?;
//!
//!     let counter = board.counter("Counter_1")?;
//!     println!("{} = {}", counter.name(), counter.count()?);
//!
//!     let subscription = board
//!         .subscribe("I_1", Arc::new(|rising, nanos| {
//!             println!("I_1 rising={rising} at {nanos}");
//!             Ok(())
//!         }))
//!         .await?;
//!
//!     subscription.close();
//!     board.close()
//! }
//! ```
//!
//! # Mock Implementations
//!
//! [`mock::MockPiControl`] emulates the driver against an in-memory process
//! image, and [`mock::MockLineBank`] hands out edge lines fed by channels.
//! Both are used throughout the tests and need no hardware.

pub mod analog;
pub mod board;
pub mod catalog;
pub mod channel;
pub mod config;
pub mod counter;
pub mod devices;
#[cfg(feature = "hardware-gpiod")]
pub mod gpiod;
pub mod mock;
pub mod monitor;
pub mod picontrol;
pub mod pin;
pub mod resolver;
pub mod traits;

// Re-export commonly used types for convenience
pub use analog::AnalogReader;
pub use board::{DeviceSummary, RevPiBoard, StatusReport};
pub use catalog::DeviceCatalog;
pub use channel::{ControlChannel, DriverEvent, IoCycling};
pub use config::BoardConfig;
pub use counter::{CounterInput, CounterPin, CounterPinController, EncoderInput, PinKind};
pub use monitor::{EventMonitor, InterruptSubscription, TickHandler};
pub use pin::ProcessPin;
pub use resolver::{AddressResolver, ResolvedVariable};
pub use revpi_core::{Error, Result};
pub use traits::{ControlDevice, EdgeEvent, EdgeLine, PositionEncoder, PulseCounter};
