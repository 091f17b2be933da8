use std::cmp::Ordering;
use std::fmt;

use thiserror::Error;

// ---------------------------------------------------------------------------
// Cell – a single value in a table column
// ---------------------------------------------------------------------------

/// A dynamically-typed cell mirroring what a CSV column can hold.
///
/// `Empty` doubles as the invalid-conversion marker: a calibration lookup
/// that fails, a division by zero or a discarded outlier all end up here and
/// are written to the report as blank cells.
#[derive(Debug, Clone)]
pub enum Cell {
    Integer(i64),
    Number(f64),
    Text(String),
    Empty,
}

// -- Manual Eq/Ord so cells can key BTreeMaps and drive stable sorts --

// Equality follows the ordering, so `Integer(1) == Number(1.0)` both when
// grouping through a map and when comparing neighbouring rows.
impl PartialEq for Cell {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Cell {}

impl PartialOrd for Cell {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Cell {
    fn cmp(&self, other: &Self) -> Ordering {
        use Cell::*;
        fn rank(c: &Cell) -> u8 {
            match c {
                Empty => 0,
                Integer(_) | Number(_) => 1,
                Text(_) => 2,
            }
        }
        let (ra, rb) = (rank(self), rank(other));
        if ra != rb {
            return ra.cmp(&rb);
        }
        match (self, other) {
            (Integer(a), Integer(b)) => a.cmp(b),
            (Text(a), Text(b)) => a.cmp(b),
            (Empty, Empty) => Ordering::Equal,
            // Mixed numeric kinds compare by value.
            _ => match (self.as_f64(), other.as_f64()) {
                (Some(a), Some(b)) => a.total_cmp(&b),
                _ => Ordering::Equal,
            },
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Integer(i) => write!(f, "{i}"),
            Cell::Number(v) => write!(f, "{v}"),
            Cell::Text(s) => write!(f, "{s}"),
            Cell::Empty => Ok(()),
        }
    }
}

impl Cell {
    /// Wrap a computed value, turning non-finite results into `Empty`.
    pub fn from_f64(value: f64) -> Self {
        if value.is_finite() {
            Cell::Number(value)
        } else {
            Cell::Empty
        }
    }

    /// Interpret the cell as an `f64`; text and empty cells have no value.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Number(v) => Some(*v),
            Cell::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Cell::Empty)
    }
}

impl From<Option<f64>> for Cell {
    fn from(value: Option<f64>) -> Self {
        value.map_or(Cell::Empty, Cell::from_f64)
    }
}

// ---------------------------------------------------------------------------
// Channel addressing
// ---------------------------------------------------------------------------

/// What a column means inside a channel's 4-wide block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    InputRow,
    Measured,
    Expected,
    Time,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::InputRow, Role::Measured, Role::Expected, Role::Time];

    /// Position of the role inside a channel block.
    pub fn offset(self) -> usize {
        match self {
            Role::InputRow => 0,
            Role::Measured => 1,
            Role::Expected => 2,
            Role::Time => 3,
        }
    }
}

/// Series label for a zero-based channel index: `TC01`..`TC09`, `TC10`, ...
pub fn channel_label(index: usize) -> String {
    format!("TC{:02}", index + 1)
}

/// Column indices of one channel, resolved once at load time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelColumns {
    pub label: String,
    pub input_row: usize,
    pub measured: usize,
    pub expected: usize,
    pub time: usize,
}

impl ChannelColumns {
    pub fn column(&self, role: Role) -> usize {
        match role {
            Role::InputRow => self.input_row,
            Role::Measured => self.measured,
            Role::Expected => self.expected,
            Role::Time => self.time,
        }
    }
}

// ---------------------------------------------------------------------------
// MeasurementTable – the loaded run
// ---------------------------------------------------------------------------

#[derive(Debug, Error, PartialEq)]
pub enum TableError {
    #[error("column '{0}' already exists")]
    DuplicateColumn(String),
    #[error("column '{name}' has {actual} cells but the table has {expected} rows")]
    LengthMismatch {
        name: String,
        expected: usize,
        actual: usize,
    },
    #[error("layout needs {needed} columns for {channels} channel(s) but the file has {available}")]
    LayoutTooWide {
        channels: usize,
        needed: usize,
        available: usize,
    },
    #[error("channel count must be at least 1")]
    NoChannels,
    #[error("no column named '{0}'")]
    UnknownColumn(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub cells: Vec<Cell>,
}

/// A whole calibration run: every source column plus any derived columns,
/// with per-channel role lookups.
#[derive(Debug, Clone)]
pub struct MeasurementTable {
    columns: Vec<Column>,
    channels: Vec<ChannelColumns>,
    group_column: usize,
    rows: usize,
}

impl MeasurementTable {
    /// Assemble a table from already-resolved parts. All columns must have
    /// the same length.
    pub fn new(
        columns: Vec<Column>,
        channels: Vec<ChannelColumns>,
        group_column: usize,
    ) -> Result<Self, TableError> {
        if channels.is_empty() {
            return Err(TableError::NoChannels);
        }
        let rows = columns.first().map_or(0, |c| c.cells.len());
        for col in &columns {
            if col.cells.len() != rows {
                return Err(TableError::LengthMismatch {
                    name: col.name.clone(),
                    expected: rows,
                    actual: col.cells.len(),
                });
            }
        }
        let needed = channels
            .iter()
            .flat_map(|ch| Role::ALL.map(|r| ch.column(r)))
            .chain(std::iter::once(group_column))
            .max()
            .map_or(0, |m| m + 1);
        if needed > columns.len() {
            return Err(TableError::LayoutTooWide {
                channels: channels.len(),
                needed,
                available: columns.len(),
            });
        }
        Ok(Self {
            columns,
            channels,
            group_column,
            rows,
        })
    }

    pub fn row_count(&self) -> usize {
        self.rows
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn channels(&self) -> &[ChannelColumns] {
        &self.channels
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, index: usize) -> &Column {
        &self.columns[index]
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn column_by_name(&self, name: &str) -> Result<&Column, TableError> {
        self.column_index(name)
            .map(|i| &self.columns[i])
            .ok_or_else(|| TableError::UnknownColumn(name.to_string()))
    }

    /// Cells of one channel's role column.
    pub fn channel_cells(&self, channel: usize, role: Role) -> &[Cell] {
        &self.columns[self.channels[channel].column(role)].cells
    }

    /// Set-point key of every row.
    pub fn group_keys(&self) -> &[Cell] {
        &self.columns[self.group_column].cells
    }

    pub fn group_column_index(&self) -> usize {
        self.group_column
    }

    /// Append a derived column; existing columns are never touched.
    pub fn append_column(&mut self, name: String, cells: Vec<Cell>) -> Result<usize, TableError> {
        if self.column_index(&name).is_some() {
            return Err(TableError::DuplicateColumn(name));
        }
        if cells.len() != self.rows {
            return Err(TableError::LengthMismatch {
                name,
                expected: self.rows,
                actual: cells.len(),
            });
        }
        self.columns.push(Column { name, cells });
        Ok(self.columns.len() - 1)
    }

    /// Replace every cell of a channel role column through `f`, optionally
    /// renaming it. Used to build the temperature table from a copy of the
    /// voltage table.
    pub(crate) fn map_channel_column<F>(&mut self, channel: usize, role: Role, rename: Option<String>, f: F)
    where
        F: Fn(&Cell) -> Cell,
    {
        let idx = self.channels[channel].column(role);
        let column = &mut self.columns[idx];
        column.cells = column.cells.iter().map(f).collect();
        if let Some(name) = rename {
            column.name = name;
        }
    }

    /// Row order sorted by `key` (stable, so equal keys keep capture order).
    pub fn sorted_rows_by<'a, F>(&'a self, key: F) -> Vec<usize>
    where
        F: Fn(usize) -> &'a Cell,
    {
        let mut order: Vec<usize> = (0..self.rows).collect();
        order.sort_by(|&a, &b| key(a).cmp(key(b)));
        order
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny_table() -> MeasurementTable {
        let col = |name: &str, cells: Vec<Cell>| Column {
            name: name.to_string(),
            cells,
        };
        MeasurementTable::new(
            vec![
                col("InputRow", vec![Cell::Integer(2), Cell::Integer(1)]),
                col("TC01InputRow", vec![Cell::Integer(2), Cell::Integer(1)]),
                col("TC01MeasuredVolt", vec![Cell::Number(0.2), Cell::Number(0.1)]),
                col("TC01ExpectedVolt", vec![Cell::Number(0.2), Cell::Number(0.1)]),
                col("TC01Time", vec![Cell::Text("10:00:01".into()), Cell::Text("10:00:02".into())]),
            ],
            vec![ChannelColumns {
                label: channel_label(0),
                input_row: 1,
                measured: 2,
                expected: 3,
                time: 4,
            }],
            0,
        )
        .unwrap()
    }

    #[test]
    fn channel_labels_are_zero_padded() {
        assert_eq!(channel_label(0), "TC01");
        assert_eq!(channel_label(8), "TC09");
        assert_eq!(channel_label(9), "TC10");
        assert_eq!(channel_label(28), "TC29");
    }

    #[test]
    fn empty_sorts_before_numbers_and_numbers_mix() {
        let mut cells = vec![
            Cell::Number(2.5),
            Cell::Empty,
            Cell::Integer(1),
            Cell::Text("a".into()),
            Cell::Integer(3),
        ];
        cells.sort();
        assert_eq!(
            cells,
            vec![
                Cell::Empty,
                Cell::Integer(1),
                Cell::Number(2.5),
                Cell::Integer(3),
                Cell::Text("a".into()),
            ]
        );
    }

    #[test]
    fn equality_agrees_with_ordering_across_numeric_kinds() {
        assert_eq!(Cell::Integer(1), Cell::Number(1.0));
        assert_eq!(Cell::Integer(1).cmp(&Cell::Number(1.0)), Ordering::Equal);
        assert_ne!(Cell::Integer(1), Cell::Number(1.5));
        assert_ne!(Cell::Integer(1), Cell::Text("1".into()));
        assert_ne!(Cell::Empty, Cell::Number(0.0));
    }

    #[test]
    fn non_finite_values_become_empty() {
        assert_eq!(Cell::from_f64(f64::INFINITY), Cell::Empty);
        assert_eq!(Cell::from_f64(f64::NAN), Cell::Empty);
        assert_eq!(Cell::from(None), Cell::Empty);
        assert_eq!(Cell::from(Some(1.5)), Cell::Number(1.5));
        assert_eq!(Cell::Empty.to_string(), "");
    }

    #[test]
    fn append_rejects_duplicates_and_wrong_length() {
        let mut table = tiny_table();
        assert_eq!(
            table.append_column("TC01MeasuredVolt".into(), vec![Cell::Empty; 2]),
            Err(TableError::DuplicateColumn("TC01MeasuredVolt".into()))
        );
        assert!(matches!(
            table.append_column("extra".into(), vec![Cell::Empty]),
            Err(TableError::LengthMismatch { actual: 1, expected: 2, .. })
        ));
        let idx = table.append_column("extra".into(), vec![Cell::Empty; 2]).unwrap();
        assert_eq!(idx, 5);
        assert_eq!(table.channel_cells(0, Role::Measured)[0], Cell::Number(0.2));
    }

    #[test]
    fn layout_wider_than_file_is_rejected() {
        let err = MeasurementTable::new(
            vec![Column {
                name: "InputRow".into(),
                cells: vec![],
            }],
            vec![ChannelColumns {
                label: channel_label(0),
                input_row: 1,
                measured: 2,
                expected: 3,
                time: 4,
            }],
            0,
        )
        .unwrap_err();
        assert_eq!(
            err,
            TableError::LayoutTooWide {
                channels: 1,
                needed: 5,
                available: 1
            }
        );
    }

    #[test]
    fn sort_by_group_key_is_stable() {
        let table = tiny_table();
        let keys = table.group_keys();
        assert_eq!(table.sorted_rows_by(|r| &keys[r]), vec![1, 0]);
    }
}
