use std::io::{Cursor, Read};
use std::path::Path;

use thermocal::config::{Layout, RunConfig};
use thermocal::data::loader::{load_file, temperature_table};
use thermocal::data::model::Cell;
use thermocal::data::transform::{append_derived, max_variance_per_set_point};
use thermocal::pipeline::{self, NoPrompt};

const SCENARIO: &str = "InputRow,Step,Mode,Note,TC01InputRow,TC01MeasuredVolt,TC01ExpectedVolt,TC01Time\n\
                        1,0,a,,1,1.0,1.0,2017-08-01 14:57:36.5\n\
                        1,1,a,,1,1.1,1.0,2017-08-01 14:57:37.5\n\
                        2,2,a,,2,2.0,2.0,2017-08-01 14:57:38.5\n";

fn write(dir: &Path, name: &str, body: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, body).unwrap();
    path
}

fn approx(cell: &Cell, want: f64) -> bool {
    cell.as_f64().is_some_and(|v| (v - want).abs() < 1e-9)
}

#[test]
fn three_row_scenario_derivations() {
    let dir = tempfile::tempdir().unwrap();
    let input = write(dir.path(), "scenario.csv", SCENARIO);
    let layout = Layout {
        channels: 1,
        ..Layout::default()
    };

    let mut table = load_file(&input, &layout).unwrap();
    let derived = append_derived(&mut table, 1e18).unwrap();

    let errors = &table.column(derived.percent_error[0]).cells;
    assert!(approx(&errors[0], 0.0));
    assert!(approx(&errors[1], -0.1));
    assert!(approx(&errors[2], 0.0));

    let variances = &table.column(derived.variance[0]).cells;
    assert!(approx(&variances[0], 0.0));
    assert!(approx(&variances[1], -0.1));
    assert!(approx(&variances[2], 0.0));

    let summary = max_variance_per_set_point(&table, &derived);
    assert_eq!(summary.labels, vec!["TC01"]);
    assert_eq!(summary.rows.len(), 2);
    assert!(approx(&summary.rows[0].channels[0].max_variance, 0.0));
    assert!(approx(&summary.rows[1].channels[0].max_variance, 0.0));
}

#[test]
fn out_of_range_voltage_is_empty_in_temperature_table() {
    let dir = tempfile::tempdir().unwrap();
    let body = SCENARIO.replacen("1,1.1,1.0", "1,-10,0.1", 1);
    let input = write(dir.path(), "low.csv", &body);
    let layout = Layout {
        channels: 1,
        ..Layout::default()
    };

    let voltages = load_file(&input, &layout).unwrap();
    let temperatures = temperature_table(&voltages, &Default::default());
    let measured = temperatures.channel_cells(0, thermocal::data::model::Role::Measured);
    assert_eq!(measured[1], Cell::Empty);
}

#[test]
fn toml_config_drives_a_full_run() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "scenario.csv", SCENARIO);
    let config_path = write(
        dir.path(),
        "run.toml",
        r#"
input = "scenario.csv"
output = "report.xlsx"
channels = 1

[save]
interactive = false
"#,
    );

    let config = RunConfig::load(&config_path).unwrap();
    let summary = pipeline::run(&config, &mut NoPrompt).unwrap();

    assert_eq!(summary.output, dir.path().join("report.xlsx"));
    assert_eq!(summary.sheets, 14);
    let bytes = std::fs::read(&summary.output).unwrap();
    assert!(bytes.len() > 4);
    assert!(bytes.starts_with(b"PK"));
}

fn xlsx_part(xlsx: &[u8], name: &str) -> String {
    let mut archive = zip::ZipArchive::new(Cursor::new(xlsx)).unwrap();
    let mut part = archive.by_name(name).unwrap();
    let mut xml = String::new();
    part.read_to_string(&mut xml).unwrap();
    xml
}

/// XML of the `index`-th worksheet (1-based, in sheet order).
fn sheet_xml(xlsx: &[u8], index: usize) -> String {
    xlsx_part(xlsx, &format!("xl/worksheets/sheet{index}.xml"))
}

#[test]
fn out_of_range_voltage_is_blank_in_the_workbook() {
    let dir = tempfile::tempdir().unwrap();
    let input = write(
        dir.path(),
        "low.csv",
        "InputRow,Step,Mode,Note,TC01InputRow,TC01MeasuredVolt,TC01ExpectedVolt,TC01Time\n\
         1,0,a,,1,0.04096,0.04,12:00:00\n\
         1,1,a,,1,-10,0.04,12:00:01\n\
         2,2,a,,2,0.02,0.02,12:00:02\n",
    );
    let mut config = RunConfig::new(input);
    config.layout.channels = 1;
    config.save.interactive = false;

    let summary = pipeline::run(&config, &mut NoPrompt).unwrap();
    let bytes = std::fs::read(&summary.output).unwrap();

    // Column A is the row number, so TC01MeasuredVolt/Temp lands in G and
    // the expected column in H; capture row 1 is sheet row 3.
    let volts = sheet_xml(&bytes, 1);
    assert!(volts.contains(r#"<c r="G3""#));

    let temps = sheet_xml(&bytes, 2);
    assert!(temps.contains(r#"<c r="G2""#));
    assert!(!temps.contains(r#"<c r="G3""#));
    assert!(temps.contains(r#"<c r="H3""#));
    assert!(xlsx_part(&bytes, "xl/sharedStrings.xml").contains("TC01MeasuredTemp"));
}
