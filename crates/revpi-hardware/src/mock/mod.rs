//! Mock device implementations for testing and development.
//!
//! This module provides a simulated piControl driver and simulated GPIO
//! edge lines that can be controlled programmatically without a RevPi.

pub mod line;
pub mod picontrol;

pub use line::{MockEdgeLine, MockEdgeLineHandle, MockLineBank};
pub use picontrol::{MockPiControl, MockPiControlBuilder, MockPiControlHandle};
