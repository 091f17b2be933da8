use chrono::{NaiveTime, Timelike};
use log::debug;
use rust_xlsxwriter::{
    Chart, ChartAxisLabelPosition, ChartFormat, ChartLine, ChartMarker, ChartMarkerType,
    ChartSolidFill, ChartType, ColNum, Color, Format, RowNum, Workbook, Worksheet, XlsxError,
};

use super::color::generate_palette;
use crate::data::model::{Cell, MeasurementTable};
use crate::data::transform::MaxVarianceSummary;

/// Rows between stacked charts on one sheet.
const CHART_SLOT_ROWS: RowNum = 16;

// ---------------------------------------------------------------------------
// Chart description
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartStyle {
    /// Points joined in row order.
    Lines,
    /// Joined points with circle markers.
    LinesWithMarkers,
    /// Unconnected markers.
    Markers,
}

impl ChartStyle {
    fn chart_type(self) -> ChartType {
        match self {
            ChartStyle::Lines => ChartType::ScatterStraight,
            ChartStyle::LinesWithMarkers => ChartType::ScatterStraightWithMarkers,
            ChartStyle::Markers => ChartType::Scatter,
        }
    }
}

/// One series: x/y columns over an inclusive sheet row range.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesSpec {
    pub name: String,
    pub x_col: ColNum,
    pub y_col: ColNum,
    pub first_row: RowNum,
    pub last_row: RowNum,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChartSpec {
    pub title: String,
    pub x_axis: String,
    pub y_axis: String,
    pub style: ChartStyle,
    pub series: Vec<SeriesSpec>,
}

/// Where a table landed on its sheet.
#[derive(Debug, Clone, PartialEq)]
pub struct SheetLayout {
    pub name: String,
    /// Number of data rows below the header.
    pub rows: RowNum,
    /// First free column right of the data, used for charts.
    pub chart_column: ColNum,
}

impl SheetLayout {
    pub const FIRST_DATA_ROW: RowNum = 1;

    /// Sheet column holding table column `index` (column A is the row number).
    pub fn table_column(index: usize) -> ColNum {
        (index + 1) as ColNum
    }

    pub fn last_data_row(&self) -> RowNum {
        self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }
}

// ---------------------------------------------------------------------------
// ReportBuilder
// ---------------------------------------------------------------------------

/// Owns the output workbook while analyses add sheets and charts to it.
/// Nothing is written to disk; [`ReportBuilder::into_bytes`] serializes the
/// finished workbook.
pub struct ReportBuilder {
    workbook: Workbook,
    time_format: Format,
    sheets: Vec<String>,
    charts: usize,
}

impl Default for ReportBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportBuilder {
    pub fn new() -> Self {
        Self {
            workbook: Workbook::new(),
            time_format: Format::new().set_num_format("hh:mm:ss"),
            sheets: Vec::new(),
            charts: 0,
        }
    }

    pub fn sheet_names(&self) -> &[String] {
        &self.sheets
    }

    pub fn chart_count(&self) -> usize {
        self.charts
    }

    /// Write every column of `table` with rows in `order`. Column A holds the
    /// capture index of each row.
    pub fn write_table(
        &mut self,
        name: &str,
        table: &MeasurementTable,
        order: &[usize],
    ) -> Result<SheetLayout, XlsxError> {
        let time_columns: Vec<usize> = table.channels().iter().map(|c| c.time).collect();
        let worksheet = self.workbook.add_worksheet();
        worksheet.set_name(name)?;

        worksheet.write_string(0, 0, "Row")?;
        for (c, column) in table.columns().iter().enumerate() {
            worksheet.write_string(0, SheetLayout::table_column(c), &column.name)?;
        }

        for (i, &source_row) in order.iter().enumerate() {
            let row = SheetLayout::FIRST_DATA_ROW + i as RowNum;
            worksheet.write_number(row, 0, source_row as f64)?;
            for (c, column) in table.columns().iter().enumerate() {
                write_cell(
                    worksheet,
                    row,
                    SheetLayout::table_column(c),
                    &column.cells[source_row],
                    time_columns.contains(&c).then_some(&self.time_format),
                )?;
            }
        }

        self.sheets.push(name.to_owned());
        debug!("sheet '{name}': {} rows", order.len());
        Ok(SheetLayout {
            name: name.to_owned(),
            rows: order.len() as RowNum,
            chart_column: SheetLayout::table_column(table.columns().len()) + 1,
        })
    }

    /// Write the max-variance summary: `InputRow`, then a set point / max
    /// variance column pair per channel.
    pub fn write_summary(
        &mut self,
        name: &str,
        summary: &MaxVarianceSummary,
    ) -> Result<SheetLayout, XlsxError> {
        let worksheet = self.workbook.add_worksheet();
        worksheet.set_name(name)?;

        worksheet.write_string(0, 0, "InputRow")?;
        for (ch, label) in summary.labels.iter().enumerate() {
            let (set_col, max_col) = summary_columns(ch);
            worksheet.write_string(0, set_col, format!("{label} Set Point"))?;
            worksheet.write_string(0, max_col, format!("{label} Max Variance"))?;
        }

        for (i, set_point) in summary.rows.iter().enumerate() {
            let row = SheetLayout::FIRST_DATA_ROW + i as RowNum;
            write_cell(worksheet, row, 0, &set_point.key, None)?;
            for (ch, entry) in set_point.channels.iter().enumerate() {
                let (set_col, max_col) = summary_columns(ch);
                write_cell(worksheet, row, set_col, &entry.set_point, None)?;
                write_cell(worksheet, row, max_col, &entry.max_variance, None)?;
            }
        }

        self.sheets.push(name.to_owned());
        Ok(SheetLayout {
            name: name.to_owned(),
            rows: summary.rows.len() as RowNum,
            chart_column: summary_columns(summary.labels.len()).0 + 1,
        })
    }

    /// Build a scatter chart from `spec` and place it in chart slot `slot`
    /// (stacked top to bottom) right of the sheet's data.
    pub fn insert_chart(
        &mut self,
        sheet: &SheetLayout,
        spec: &ChartSpec,
        slot: u32,
    ) -> Result<(), XlsxError> {
        let mut chart = Chart::new(spec.style.chart_type());
        let colors = generate_palette(spec.series.len());

        for (series_spec, color) in spec.series.iter().zip(colors) {
            let series = chart
                .add_series()
                .set_categories((
                    sheet.name.as_str(),
                    series_spec.first_row,
                    series_spec.x_col,
                    series_spec.last_row,
                    series_spec.x_col,
                ))
                .set_values((
                    sheet.name.as_str(),
                    series_spec.first_row,
                    series_spec.y_col,
                    series_spec.last_row,
                    series_spec.y_col,
                ))
                .set_name(series_spec.name.as_str());
            style_series(series, spec.style, color);
        }

        chart.title().set_name(spec.title.as_str());
        chart
            .x_axis()
            .set_name(spec.x_axis.as_str())
            .set_label_position(ChartAxisLabelPosition::Low);
        chart.y_axis().set_name(spec.y_axis.as_str());

        let worksheet = self.workbook.worksheet_from_name(&sheet.name)?;
        worksheet.insert_chart(1 + slot * CHART_SLOT_ROWS, sheet.chart_column, &chart)?;
        self.charts += 1;
        Ok(())
    }

    /// Serialize the workbook to xlsx bytes.
    pub fn into_bytes(mut self) -> Result<Vec<u8>, XlsxError> {
        self.workbook.save_to_buffer()
    }
}

fn summary_columns(channel: usize) -> (ColNum, ColNum) {
    let set_col = (1 + 2 * channel) as ColNum;
    (set_col, set_col + 1)
}

fn style_series(series: &mut rust_xlsxwriter::ChartSeries, style: ChartStyle, color: Color) {
    if style != ChartStyle::Markers {
        series.set_format(ChartFormat::new().set_line(ChartLine::new().set_color(color)));
    }
    if style != ChartStyle::Lines {
        series.set_marker(
            ChartMarker::new()
                .set_type(ChartMarkerType::Circle)
                .set_format(
                    ChartFormat::new().set_solid_fill(ChartSolidFill::new().set_color(color)),
                ),
        );
    }
}

/// Empty cells are skipped, so invalid values show up blank. Text parsed as
/// `HH:MM:SS` is written as an Excel time when `time_format` is given.
fn write_cell(
    worksheet: &mut Worksheet,
    row: RowNum,
    col: ColNum,
    cell: &Cell,
    time_format: Option<&Format>,
) -> Result<(), XlsxError> {
    match cell {
        Cell::Integer(i) => {
            worksheet.write_number(row, col, *i as f64)?;
        }
        Cell::Number(v) => {
            worksheet.write_number(row, col, *v)?;
        }
        Cell::Text(s) => match time_format.zip(excel_time(s)) {
            Some((format, t)) => {
                worksheet.write_number_with_format(row, col, t, format)?;
            }
            None => {
                worksheet.write_string(row, col, s)?;
            }
        },
        Cell::Empty => {}
    }
    Ok(())
}

/// `HH:MM:SS` as a fraction of a day.
fn excel_time(s: &str) -> Option<f64> {
    NaiveTime::parse_from_str(s, "%H:%M:%S")
        .ok()
        .map(|t| f64::from(t.num_seconds_from_midnight()) / 86_400.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::{channel_label, ChannelColumns, Column};
    use crate::data::transform::{ChannelMax, SetPointRow};

    fn table() -> MeasurementTable {
        MeasurementTable::new(
            vec![
                Column {
                    name: "InputRow".into(),
                    cells: vec![Cell::Integer(1), Cell::Integer(2)],
                },
                Column {
                    name: "TC01MeasuredVolt".into(),
                    cells: vec![Cell::Empty, Cell::Number(0.2)],
                },
                Column {
                    name: "TC01ExpectedVolt".into(),
                    cells: vec![Cell::Number(0.1), Cell::Number(0.2)],
                },
                Column {
                    name: "TC01Time".into(),
                    cells: vec![Cell::Text("12:00:00".into()), Cell::Text("n/a".into())],
                },
            ],
            vec![ChannelColumns {
                label: channel_label(0),
                input_row: 0,
                measured: 1,
                expected: 2,
                time: 3,
            }],
            0,
        )
        .unwrap()
    }

    #[test]
    fn excel_time_is_day_fraction() {
        assert_eq!(excel_time("12:00:00"), Some(0.5));
        assert_eq!(excel_time("00:00:00"), Some(0.0));
        assert_eq!(excel_time("bad"), None);
    }

    #[test]
    fn table_layout_reports_rows_and_chart_column() {
        let mut report = ReportBuilder::new();
        let layout = report.write_table("expectedVsMeasured(V)", &table(), &[1, 0]).unwrap();
        assert_eq!(layout.rows, 2);
        assert_eq!(layout.last_data_row(), 2);
        // Row column + 4 table columns + one gap.
        assert_eq!(layout.chart_column, 6);
        assert_eq!(SheetLayout::table_column(0), 1);
        assert_eq!(report.sheet_names(), &["expectedVsMeasured(V)".to_string()]);
    }

    #[test]
    fn charts_and_summary_serialize() {
        let mut report = ReportBuilder::new();
        let layout = report.write_table("timeVsMeasured - Ind.(V)", &table(), &[0, 1]).unwrap();
        let spec = ChartSpec {
            title: "Input Row 1".into(),
            x_axis: "Time".into(),
            y_axis: "Measured Voltage".into(),
            style: ChartStyle::LinesWithMarkers,
            series: vec![SeriesSpec {
                name: "TC01".into(),
                x_col: 4,
                y_col: 2,
                first_row: 1,
                last_row: 2,
            }],
        };
        report.insert_chart(&layout, &spec, 0).unwrap();
        report.insert_chart(&layout, &spec, 1).unwrap();

        let summary = MaxVarianceSummary {
            labels: vec!["TC01".into()],
            rows: vec![SetPointRow {
                key: Cell::Integer(1),
                channels: vec![ChannelMax {
                    set_point: Cell::Number(0.1),
                    max_variance: Cell::Empty,
                }],
            }],
        };
        let summary_layout = report.write_summary("Max Variances(V)", &summary).unwrap();
        assert_eq!(summary_layout.rows, 1);
        assert_eq!(summary_layout.chart_column, 4);
        assert_eq!(summary_columns(1), (3, 4));

        assert_eq!(report.chart_count(), 2);
        let bytes = report.into_bytes().unwrap();
        assert_eq!(&bytes[..2], b"PK");
    }

    #[test]
    fn chart_on_unknown_sheet_fails() {
        let mut report = ReportBuilder::new();
        let ghost = SheetLayout {
            name: "missing".into(),
            rows: 1,
            chart_column: 1,
        };
        let spec = ChartSpec {
            title: String::new(),
            x_axis: String::new(),
            y_axis: String::new(),
            style: ChartStyle::Lines,
            series: Vec::new(),
        };
        assert!(report.insert_chart(&ghost, &spec, 0).is_err());
    }
}
