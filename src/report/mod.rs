//! Workbook output: one sheet per analysis and variant, with scatter charts
//! anchored beside the data.

pub mod analysis;
pub mod builder;
pub mod color;
