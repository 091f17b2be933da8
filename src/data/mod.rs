//! Data layer: the measurement table and everything derived from it.
//!
//! ```text
//!  .csv / .tsv / .txt / .parquet
//!        │
//!        ▼
//!   ┌──────────┐
//!   │  loader   │  parse file → MeasurementTable (voltages)
//!   └──────────┘
//!        │                    ┌─────────────┐
//!        ├───────────────────▶│ calibration │  volts → °C (type K)
//!        │                    └─────────────┘
//!        ▼
//!   ┌───────────┐
//!   │ transform │  %error / variance columns, max variance, partitions
//!   └───────────┘
//! ```

pub mod calibration;
pub mod loader;
pub mod model;
pub mod transform;
