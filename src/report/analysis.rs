use log::info;
use rust_xlsxwriter::{ColNum, RowNum, XlsxError};

use super::builder::{ChartSpec, ChartStyle, ReportBuilder, SeriesSpec, SheetLayout};
use crate::data::model::{MeasurementTable, Role};
use crate::data::transform::{max_variance_per_set_point, set_point_partitions, DerivedColumns};

// ---------------------------------------------------------------------------
// Variant – which table an analysis runs against
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    Voltage,
    Temperature,
}

impl Variant {
    /// Sheet-name suffix letter.
    pub fn tag(self) -> &'static str {
        match self {
            Variant::Voltage => "V",
            Variant::Temperature => "T",
        }
    }

    pub fn noun(self) -> &'static str {
        match self {
            Variant::Voltage => "Voltage",
            Variant::Temperature => "Temperature",
        }
    }

    pub fn plural(self) -> &'static str {
        match self {
            Variant::Voltage => "Voltages",
            Variant::Temperature => "Temperatures",
        }
    }

    fn sheet(self, base: &str) -> String {
        format!("{base}({})", self.tag())
    }
}

/// A table with its derived columns, labelled by variant.
#[derive(Debug, Clone, Copy)]
pub struct AnalysisInput<'a> {
    pub table: &'a MeasurementTable,
    pub derived: &'a DerivedColumns,
    pub variant: Variant,
}

// ---------------------------------------------------------------------------
// Analysis catalogue
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Analysis {
    ExpectedVsMeasured,
    TimeVsExpected,
    TimeVsMeasured,
    ExpectedVsPercentError,
    ExpectedVsVariance,
}

impl Analysis {
    /// Run order of the report.
    pub const ALL: [Analysis; 5] = [
        Analysis::ExpectedVsMeasured,
        Analysis::TimeVsExpected,
        Analysis::TimeVsMeasured,
        Analysis::ExpectedVsPercentError,
        Analysis::ExpectedVsVariance,
    ];

    pub fn emit(self, report: &mut ReportBuilder, input: &AnalysisInput<'_>) -> Result<(), XlsxError> {
        info!("{self:?} ({})", input.variant.tag());
        match self {
            Analysis::ExpectedVsMeasured => expected_vs_measured(report, input),
            Analysis::TimeVsExpected => time_vs_expected(report, input),
            Analysis::TimeVsMeasured => time_vs_measured(report, input),
            Analysis::ExpectedVsPercentError => expected_vs_percent_error(report, input),
            Analysis::ExpectedVsVariance => expected_vs_variance(report, input),
        }
    }
}

// ---------------------------------------------------------------------------
// Row orders
// ---------------------------------------------------------------------------

fn capture_order(table: &MeasurementTable) -> Vec<usize> {
    (0..table.row_count()).collect()
}

fn set_point_order(table: &MeasurementTable) -> Vec<usize> {
    let keys = table.group_keys();
    table.sorted_rows_by(|r| &keys[r])
}

fn first_expected_order(table: &MeasurementTable) -> Vec<usize> {
    let expected = table.channel_cells(0, Role::Expected);
    table.sorted_rows_by(|r| &expected[r])
}

// ---------------------------------------------------------------------------
// Series helpers
// ---------------------------------------------------------------------------

/// One series per channel over sheet rows `first..=last`, with x/y taken from
/// the table columns picked by `x` and `y`.
fn channel_series<X, Y>(
    table: &MeasurementTable,
    first: RowNum,
    last: RowNum,
    x: X,
    y: Y,
) -> Vec<SeriesSpec>
where
    X: Fn(usize) -> usize,
    Y: Fn(usize) -> usize,
{
    table
        .channels()
        .iter()
        .enumerate()
        .map(|(ch, columns)| SeriesSpec {
            name: columns.label.clone(),
            x_col: SheetLayout::table_column(x(ch)),
            y_col: SheetLayout::table_column(y(ch)),
            first_row: first,
            last_row: last,
        })
        .collect()
}

fn role(table: &MeasurementTable, which: Role) -> impl Fn(usize) -> usize + '_ {
    move |ch| table.channels()[ch].column(which)
}

/// Write `order` of the table to `sheet_name` and chart it over all rows.
fn table_with_chart(
    report: &mut ReportBuilder,
    input: &AnalysisInput<'_>,
    sheet_name: String,
    order: &[usize],
    chart: impl FnOnce(&SheetLayout) -> ChartSpec,
) -> Result<SheetLayout, XlsxError> {
    let layout = report.write_table(&sheet_name, input.table, order)?;
    if !layout.is_empty() {
        let spec = chart(&layout);
        report.insert_chart(&layout, &spec, 0)?;
    }
    Ok(layout)
}

// ---------------------------------------------------------------------------
// Analyses
// ---------------------------------------------------------------------------

/// Expected against measured, rows ordered by set point.
pub fn expected_vs_measured(report: &mut ReportBuilder, input: &AnalysisInput<'_>) -> Result<(), XlsxError> {
    let table = input.table;
    let v = input.variant;
    table_with_chart(
        report,
        input,
        v.sheet("expectedVsMeasured"),
        &set_point_order(table),
        |layout| ChartSpec {
            title: format!("Expected {} vs Measured {}", v.plural(), v.plural()),
            x_axis: format!("Set {}", v.noun()),
            y_axis: format!("Measured {}", v.noun()),
            style: ChartStyle::Lines,
            series: channel_series(
                table,
                SheetLayout::FIRST_DATA_ROW,
                layout.last_data_row(),
                role(table, Role::Expected),
                role(table, Role::Measured),
            ),
        },
    )?;
    Ok(())
}

/// Expected values over capture time.
pub fn time_vs_expected(report: &mut ReportBuilder, input: &AnalysisInput<'_>) -> Result<(), XlsxError> {
    let table = input.table;
    let v = input.variant;
    table_with_chart(
        report,
        input,
        v.sheet("timeVsExpected"),
        &capture_order(table),
        |layout| ChartSpec {
            title: format!("Time vs Expected {}", v.plural()),
            x_axis: "Time".to_owned(),
            y_axis: format!("Set {}", v.noun()),
            style: ChartStyle::Lines,
            series: channel_series(
                table,
                SheetLayout::FIRST_DATA_ROW,
                layout.last_data_row(),
                role(table, Role::Time),
                role(table, Role::Expected),
            ),
        },
    )?;
    Ok(())
}

/// Measured values over capture time, then the same data split into one
/// chart per set-point hold.
pub fn time_vs_measured(report: &mut ReportBuilder, input: &AnalysisInput<'_>) -> Result<(), XlsxError> {
    let table = input.table;
    let v = input.variant;
    let order = capture_order(table);
    table_with_chart(report, input, v.sheet("timeVsMeasured"), &order, |layout| ChartSpec {
        title: format!("Time vs Measured {}", v.plural()),
        x_axis: "Time".to_owned(),
        y_axis: format!("Measured {}", v.noun()),
        style: ChartStyle::Lines,
        series: channel_series(
            table,
            SheetLayout::FIRST_DATA_ROW,
            layout.last_data_row(),
            role(table, Role::Time),
            role(table, Role::Measured),
        ),
    })?;

    let layout = report.write_table(&v.sheet("timeVsMeasured - Ind."), table, &order)?;
    for (k, partition) in set_point_partitions(table.group_keys()).into_iter().enumerate() {
        let first = SheetLayout::FIRST_DATA_ROW + partition.start as RowNum;
        let last = SheetLayout::FIRST_DATA_ROW + partition.end as RowNum - 1;
        let spec = ChartSpec {
            title: format!("Input Row {}", k + 1),
            x_axis: "Time".to_owned(),
            y_axis: format!("Measured {}", v.noun()),
            style: ChartStyle::LinesWithMarkers,
            series: channel_series(table, first, last, role(table, Role::Time), role(table, Role::Measured)),
        };
        report.insert_chart(&layout, &spec, k as u32)?;
    }
    Ok(())
}

/// Expected against percent error, rows ordered by the first channel's
/// expected value.
pub fn expected_vs_percent_error(
    report: &mut ReportBuilder,
    input: &AnalysisInput<'_>,
) -> Result<(), XlsxError> {
    let table = input.table;
    let v = input.variant;
    let errors = &input.derived.percent_error;
    table_with_chart(
        report,
        input,
        v.sheet("expectedVsError"),
        &first_expected_order(table),
        |layout| ChartSpec {
            title: format!("Expected {} vs Percent Error", v.plural()),
            x_axis: format!("Set {}", v.noun()),
            y_axis: format!("Percentage Error of Measured {}", v.plural()),
            style: ChartStyle::Lines,
            series: channel_series(
                table,
                SheetLayout::FIRST_DATA_ROW,
                layout.last_data_row(),
                role(table, Role::Expected),
                |ch| errors[ch],
            ),
        },
    )?;
    Ok(())
}

/// Expected against signed variance ordered by set point, followed by the
/// max-variance-per-set-point summary sheet.
pub fn expected_vs_variance(report: &mut ReportBuilder, input: &AnalysisInput<'_>) -> Result<(), XlsxError> {
    let table = input.table;
    let v = input.variant;
    let variances = &input.derived.variance;
    let y_axis = format!("Diff Between Expected and Measured {}", v.plural());
    table_with_chart(
        report,
        input,
        v.sheet("expectedVsVariance"),
        &set_point_order(table),
        |layout| ChartSpec {
            title: format!("Expected {} vs Variances", v.plural()),
            x_axis: format!("Set {}", v.noun()),
            y_axis: y_axis.clone(),
            style: ChartStyle::Lines,
            series: channel_series(
                table,
                SheetLayout::FIRST_DATA_ROW,
                layout.last_data_row(),
                role(table, Role::Expected),
                |ch| variances[ch],
            ),
        },
    )?;

    let summary = max_variance_per_set_point(table, input.derived);
    let layout = report.write_summary(&v.sheet("Max Variances"), &summary)?;
    if !layout.is_empty() {
        // Summary columns are written directly, not through the table mapping.
        let series = summary
            .labels
            .iter()
            .enumerate()
            .map(|(ch, label)| {
                let set_col = (1 + 2 * ch) as ColNum;
                SeriesSpec {
                    name: label.clone(),
                    x_col: set_col,
                    y_col: set_col + 1,
                    first_row: SheetLayout::FIRST_DATA_ROW,
                    last_row: layout.last_data_row(),
                }
            })
            .collect();
        let spec = ChartSpec {
            title: format!("Max Variances vs Set {}", v.noun()),
            x_axis: format!("Set {}", v.noun()),
            y_axis,
            style: ChartStyle::Markers,
            series,
        };
        report.insert_chart(&layout, &spec, 0)?;
    }
    Ok(())
}
