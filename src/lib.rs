//! Thermocouple calibration run analysis.
//!
//! Reads a multi-channel calibration capture, converts it to temperature,
//! derives error columns and writes an Excel workbook of scatter charts.
//! The `device` module drives the DAC simulator board that produces the
//! captures.

pub mod config;
pub mod data;
pub mod device;
pub mod pipeline;
pub mod report;
