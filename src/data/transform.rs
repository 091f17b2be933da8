use std::collections::BTreeMap;
use std::ops::Range;

use log::debug;

use super::model::{Cell, MeasurementTable, Role, TableError};

// ---------------------------------------------------------------------------
// Per-cell derivations
// ---------------------------------------------------------------------------

/// `(expected - measured) / expected`. A zero expected value, a missing
/// operand or a ratio above `threshold` in magnitude yields [`Cell::Empty`].
pub fn percent_error(expected: &Cell, measured: &Cell, threshold: f64) -> Cell {
    match (expected.as_f64(), measured.as_f64()) {
        (Some(e), Some(m)) if e != 0.0 => discard_large((e - m) / e, threshold),
        _ => Cell::Empty,
    }
}

/// Signed `expected - measured`; magnitudes above `threshold` are discarded.
pub fn variance(expected: &Cell, measured: &Cell, threshold: f64) -> Cell {
    match (expected.as_f64(), measured.as_f64()) {
        (Some(e), Some(m)) => discard_large(e - m, threshold),
        _ => Cell::Empty,
    }
}

fn discard_large(value: f64, threshold: f64) -> Cell {
    if value.abs() > threshold {
        Cell::Empty
    } else {
        Cell::from_f64(value)
    }
}

// ---------------------------------------------------------------------------
// Derived columns
// ---------------------------------------------------------------------------

/// Indices of the columns appended by [`append_derived`], one per channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedColumns {
    pub percent_error: Vec<usize>,
    pub variance: Vec<usize>,
}

/// Append `<label>%Error` and `<label>Variance` for every channel.
pub fn append_derived(
    table: &mut MeasurementTable,
    large_error_threshold: f64,
) -> Result<DerivedColumns, TableError> {
    let mut derived = DerivedColumns {
        percent_error: Vec::with_capacity(table.channel_count()),
        variance: Vec::with_capacity(table.channel_count()),
    };

    for ch in 0..table.channel_count() {
        let label = table.channels()[ch].label.clone();
        let expected = table.channel_cells(ch, Role::Expected);
        let measured = table.channel_cells(ch, Role::Measured);

        let errors: Vec<Cell> = expected
            .iter()
            .zip(measured)
            .map(|(e, m)| percent_error(e, m, large_error_threshold))
            .collect();
        let variances: Vec<Cell> = expected
            .iter()
            .zip(measured)
            .map(|(e, m)| variance(e, m, large_error_threshold))
            .collect();

        debug!(
            "{label}: {} empty percent-error cell(s), {} empty variance cell(s)",
            errors.iter().filter(|c| c.is_empty()).count(),
            variances.iter().filter(|c| c.is_empty()).count()
        );
        derived
            .percent_error
            .push(table.append_column(format!("{label}%Error"), errors)?);
        derived
            .variance
            .push(table.append_column(format!("{label}Variance"), variances)?);
    }
    Ok(derived)
}

// ---------------------------------------------------------------------------
// Max variance per set point
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct ChannelMax {
    /// Expected value of the group's first captured row.
    pub set_point: Cell,
    pub max_variance: Cell,
}

/// One row of the summary: a distinct `InputRow` value and, per channel, its
/// set point and largest signed variance.
#[derive(Debug, Clone, PartialEq)]
pub struct SetPointRow {
    pub key: Cell,
    pub channels: Vec<ChannelMax>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MaxVarianceSummary {
    pub labels: Vec<String>,
    pub rows: Vec<SetPointRow>,
}

/// Group rows by set-point key (ordered by key) and take the maximum signed
/// variance of each group. Variances have already been through the
/// large-error filter, so a discarded row never wins a group.
pub fn max_variance_per_set_point(
    table: &MeasurementTable,
    derived: &DerivedColumns,
) -> MaxVarianceSummary {
    let mut groups: BTreeMap<&Cell, Vec<usize>> = BTreeMap::new();
    for (row, key) in table.group_keys().iter().enumerate() {
        groups.entry(key).or_default().push(row);
    }

    let rows = groups
        .into_iter()
        .map(|(key, members)| SetPointRow {
            key: key.clone(),
            channels: (0..table.channel_count())
                .map(|ch| {
                    let expected = table.channel_cells(ch, Role::Expected);
                    let variances = &table.column(derived.variance[ch]).cells;
                    let max = members
                        .iter()
                        .filter_map(|&r| variances[r].as_f64())
                        .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |a| a.max(v))));
                    ChannelMax {
                        set_point: expected[members[0]].clone(),
                        max_variance: max.into(),
                    }
                })
                .collect(),
        })
        .collect();

    MaxVarianceSummary {
        labels: table.channels().iter().map(|c| c.label.clone()).collect(),
        rows,
    }
}

// ---------------------------------------------------------------------------
// Set-point partitions
// ---------------------------------------------------------------------------

/// Split capture order into contiguous runs of identical keys.
pub fn set_point_partitions(keys: &[Cell]) -> Vec<Range<usize>> {
    let mut partitions = Vec::new();
    let mut start = 0;
    for row in 1..=keys.len() {
        if row == keys.len() || keys[row] != keys[row - 1] {
            partitions.push(start..row);
            start = row;
        }
    }
    partitions
}
