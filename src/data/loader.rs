use std::path::Path;

use anyhow::{bail, Context, Result};
use arrow::array::{Array, ArrayRef, AsArray};
use arrow::datatypes::{DataType, Float32Type, Float64Type, Int32Type, Int64Type};
use arrow::util::display::array_value_to_string;
use chrono::{NaiveDateTime, NaiveTime};
use log::{debug, info, warn};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

use super::calibration::Calibration;
use super::model::{channel_label, Cell, ChannelColumns, Column, MeasurementTable, Role};
use crate::config::Layout;

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Load a calibration run from a file.  Dispatch by extension.
///
/// Supported formats:
/// * `.csv` / `.txt` – comma-separated, header row first
/// * `.tsv`          – tab-separated, header row first
/// * `.parquet`      – flat columns, one per CSV column
pub fn load_file(path: &Path, layout: &Layout) -> Result<MeasurementTable> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let (headers, columns) = match ext.as_str() {
        "csv" | "txt" => read_delimited(path, b',')?,
        "tsv" => read_delimited(path, b'\t')?,
        "parquet" | "pq" => read_parquet(path)?,
        other => bail!("Unsupported file extension: .{other}"),
    };

    let table = build_table(headers, columns, layout)
        .with_context(|| format!("laying out {}", path.display()))?;
    info!(
        "Loaded {} rows x {} channels from {}",
        table.row_count(),
        table.channel_count(),
        path.display()
    );
    Ok(table)
}

/// Turn raw header/column data into a [`MeasurementTable`]: resolve each
/// channel's block, pick the set-point key and normalize timestamps.
pub fn build_table(
    headers: Vec<String>,
    mut columns: Vec<Vec<Cell>>,
    layout: &Layout,
) -> Result<MeasurementTable> {
    let channels = resolve_channels(&headers, layout);

    let group_column = headers
        .iter()
        .position(|h| h == &layout.group_column)
        .or_else(|| channels.first().map(|ch| ch.input_row))
        .context("no set-point key column")?;

    for ch in &channels {
        if let Some(cells) = columns.get_mut(ch.time) {
            for cell in cells.iter_mut() {
                if let Some(trimmed) = cell.as_text().and_then(normalize_time) {
                    *cell = Cell::Text(trimmed);
                }
            }
        }
    }

    let columns = headers
        .into_iter()
        .zip(columns)
        .map(|(name, cells)| Column { name, cells })
        .collect();
    let table = MeasurementTable::new(columns, channels, group_column)?;
    warn_on_time_regressions(&table);
    Ok(table)
}

/// Column indices per channel. Header names win; a missing name falls back
/// to the fixed 4-wide block position after the header block.
fn resolve_channels(headers: &[String], layout: &Layout) -> Vec<ChannelColumns> {
    (0..layout.channels)
        .map(|i| {
            let label = channel_label(i);
            let find = |role: Role| {
                let name = format!("{label}{}", layout.suffix(role));
                headers.iter().position(|h| *h == name).unwrap_or_else(|| {
                    let fallback = layout.header_columns + 4 * i + role.offset();
                    debug!("{name} not found, using column {fallback}");
                    fallback
                })
            };
            ChannelColumns {
                input_row: find(Role::InputRow),
                measured: find(Role::Measured),
                expected: find(Role::Expected),
                time: find(Role::Time),
                label,
            }
        })
        .collect()
}

fn warn_on_time_regressions(table: &MeasurementTable) {
    let keys = table.group_keys();
    for (ch, columns) in table.channels().iter().enumerate() {
        let times = table.channel_cells(ch, Role::Time);
        let regressed = (1..table.row_count()).find(|&r| {
            keys[r] == keys[r - 1]
                && matches!(
                    (times[r - 1].as_text(), times[r].as_text()),
                    (Some(a), Some(b)) if b < a
                )
        });
        if let Some(row) = regressed {
            warn!("{}: timestamp goes backwards at row {row}", columns.label);
        }
    }
}

// ---------------------------------------------------------------------------
// Timestamps
// ---------------------------------------------------------------------------

const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y/%m/%d %H:%M:%S%.f"];

/// Reduce a capture timestamp to `HH:MM:SS`. Already-trimmed input is
/// returned as is; anything unparseable yields `None` and stays untouched.
pub fn normalize_time(raw: &str) -> Option<String> {
    let s = raw.trim();
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.format("%H:%M:%S").to_string());
        }
    }
    NaiveTime::parse_from_str(s, "%H:%M:%S%.f")
        .ok()
        .map(|t| t.format("%H:%M:%S").to_string())
}

// ---------------------------------------------------------------------------
// Temperature table
// ---------------------------------------------------------------------------

/// Copy of `voltages` with every measured and expected cell run through the
/// calibration curve. Failed conversions become [`Cell::Empty`].
pub fn temperature_table(voltages: &MeasurementTable, calibration: &Calibration) -> MeasurementTable {
    let mut temps = voltages.clone();
    let mut invalid = 0usize;
    for ch in 0..temps.channel_count() {
        for role in [Role::Measured, Role::Expected] {
            let source = voltages.channel_cells(ch, role);
            invalid += source
                .iter()
                .filter(|c| c.as_f64().and_then(|v| calibration.to_temperature(v)).is_none())
                .count();
            let name = &voltages.column(voltages.channels()[ch].column(role)).name;
            let rename = name.strip_suffix("Volt").map(|stem| format!("{stem}Temp"));
            temps.map_channel_column(ch, role, rename, |cell| {
                cell.as_f64()
                    .and_then(|v| calibration.to_temperature(v))
                    .into()
            });
        }
    }
    if invalid > 0 {
        info!("{invalid} voltage cell(s) have no valid temperature conversion");
    }
    temps
}

// ---------------------------------------------------------------------------
// Delimited loader
// ---------------------------------------------------------------------------

/// Header row with column names, then one record per test input.
fn read_delimited(path: &Path, delimiter: u8) -> Result<(Vec<String>, Vec<Vec<Cell>>)> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .trim(csv::Trim::All)
        .from_path(path)
        .context("opening delimited file")?;
    let headers: Vec<String> = reader
        .headers()
        .context("reading headers")?
        .iter()
        .map(|h| h.to_string())
        .collect();

    let mut columns: Vec<Vec<Cell>> = vec![Vec::new(); headers.len()];
    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("row {row_no}"))?;
        for (col, value) in columns.iter_mut().zip(record.iter()) {
            col.push(guess_cell_type(value));
        }
    }
    Ok((headers, columns))
}

fn guess_cell_type(s: &str) -> Cell {
    if s.is_empty() {
        return Cell::Empty;
    }
    if let Ok(i) = s.parse::<i64>() {
        return Cell::Integer(i);
    }
    if let Ok(f) = s.parse::<f64>() {
        return Cell::from_f64(f);
    }
    Cell::Text(s.to_string())
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Flat Parquet file, one column per CSV column. Works with files written by
/// both Pandas and Polars.
fn read_parquet(path: &Path) -> Result<(Vec<String>, Vec<Vec<Cell>>)> {
    let file = std::fs::File::open(path).context("opening parquet file")?;
    let builder =
        ParquetRecordBatchReaderBuilder::try_new(file).context("reading parquet metadata")?;
    let headers: Vec<String> = builder
        .schema()
        .fields()
        .iter()
        .map(|f| f.name().clone())
        .collect();
    let reader = builder.build().context("building parquet reader")?;

    let mut columns: Vec<Vec<Cell>> = vec![Vec::new(); headers.len()];
    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;
        for (col_idx, cells) in columns.iter_mut().enumerate() {
            let array = batch.column(col_idx);
            for row in 0..batch.num_rows() {
                cells.push(extract_cell(array, row)?);
            }
        }
    }
    Ok((headers, columns))
}

fn extract_cell(col: &ArrayRef, row: usize) -> Result<Cell> {
    if col.is_null(row) {
        return Ok(Cell::Empty);
    }
    let cell = match col.data_type() {
        DataType::Int32 => Cell::Integer(col.as_primitive::<Int32Type>().value(row) as i64),
        DataType::Int64 => Cell::Integer(col.as_primitive::<Int64Type>().value(row)),
        DataType::Float32 => Cell::from_f64(col.as_primitive::<Float32Type>().value(row) as f64),
        DataType::Float64 => Cell::from_f64(col.as_primitive::<Float64Type>().value(row)),
        DataType::Utf8 => guess_cell_type(col.as_string::<i32>().value(row)),
        DataType::LargeUtf8 => guess_cell_type(col.as_string::<i64>().value(row)),
        _ => Cell::Text(
            array_value_to_string(col, row)
                .with_context(|| format!("formatting {:?} value", col.data_type()))?,
        ),
    };
    Ok(cell)
}
