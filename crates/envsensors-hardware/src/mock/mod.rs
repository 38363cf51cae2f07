//! Mock device implementations for testing and development.
//!
//! This module provides simulated devices that produce realistic instrument
//! output without requiring physical hardware.

pub mod temperature;

pub use temperature::MockTemperatureSensor;
