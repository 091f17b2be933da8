use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{info, warn};

use crate::config::{RunConfig, SaveConfig};
use crate::data::loader::{load_file, temperature_table};
use crate::data::model::MeasurementTable;
use crate::data::transform::append_derived;
use crate::report::analysis::{Analysis, AnalysisInput, Variant};
use crate::report::builder::ReportBuilder;

/// What a finished run produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub output: PathBuf,
    pub rows: usize,
    pub channels: usize,
    pub sheets: usize,
    pub charts: usize,
    /// Write attempts needed, including the successful one.
    pub attempts: u32,
}

/// Load, analyse and save one calibration run.
pub fn run(config: &RunConfig, prompt: &mut dyn SavePrompt) -> Result<RunSummary> {
    config.validate()?;
    let voltages = load_file(&config.input, &config.layout)?;
    let rows = voltages.row_count();
    let channels = voltages.channel_count();

    let report = render(voltages, config)?;
    let sheets = report.sheet_names().len();
    let charts = report.chart_count();
    let bytes = report.into_bytes().context("serializing workbook")?;

    let output = config.output_path();
    let attempts = save_bytes(&output, &bytes, &config.save, prompt)?;
    info!("Wrote {sheets} sheets and {charts} charts to {}", output.display());

    Ok(RunSummary {
        output,
        rows,
        channels,
        sheets,
        charts,
        attempts,
    })
}

/// Build every sheet for the voltage table and its temperature counterpart.
///
/// Derived columns are appended to both tables before any sheet is written,
/// so every sheet of a variant shows the same columns.
pub fn render(mut voltages: MeasurementTable, config: &RunConfig) -> Result<ReportBuilder> {
    let mut temperatures = temperature_table(&voltages, &config.calibration);
    let threshold = config.large_error_threshold;
    let voltage_derived = append_derived(&mut voltages, threshold)?;
    let temperature_derived = append_derived(&mut temperatures, threshold)?;

    let inputs = [
        AnalysisInput {
            table: &voltages,
            derived: &voltage_derived,
            variant: Variant::Voltage,
        },
        AnalysisInput {
            table: &temperatures,
            derived: &temperature_derived,
            variant: Variant::Temperature,
        },
    ];

    let mut report = ReportBuilder::new();
    for analysis in Analysis::ALL {
        for input in &inputs {
            analysis
                .emit(&mut report, input)
                .with_context(|| format!("{analysis:?} ({})", input.variant.tag()))?;
        }
    }
    Ok(report)
}

// ---------------------------------------------------------------------------
// Saving
// ---------------------------------------------------------------------------

/// Asked whether to try again after the output file turned out to be locked.
pub trait SavePrompt {
    fn retry(&mut self, path: &Path, attempt: u32, error: &io::Error) -> bool;
}

/// Never retries.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPrompt;

impl SavePrompt for NoPrompt {
    fn retry(&mut self, _path: &Path, _attempt: u32, _error: &io::Error) -> bool {
        false
    }
}

/// Asks the operator on a line-oriented console. An empty line or `y`
/// retries; `n`, `q` or end of input gives up.
pub struct ConsolePrompt<R> {
    input: R,
}

impl<R: BufRead> ConsolePrompt<R> {
    pub fn new(input: R) -> Self {
        Self { input }
    }
}

impl ConsolePrompt<io::StdinLock<'static>> {
    pub fn stdin() -> Self {
        Self::new(io::stdin().lock())
    }
}

impl<R: BufRead> SavePrompt for ConsolePrompt<R> {
    fn retry(&mut self, path: &Path, attempt: u32, error: &io::Error) -> bool {
        eprint!(
            "{} is in use ({error}). Close it and press Enter to retry, or 'q' to give up [attempt {attempt}]: ",
            path.display()
        );
        let _ = io::stderr().flush();

        let mut line = String::new();
        match self.input.read_line(&mut line) {
            Ok(0) | Err(_) => false,
            Ok(_) => !matches!(line.trim().to_ascii_lowercase().as_str(), "n" | "no" | "q" | "quit"),
        }
    }
}

/// A write failed because another program holds the file.
pub fn is_file_in_use(error: &io::Error) -> bool {
    // 32/33: Windows sharing and lock violations.
    error.kind() == io::ErrorKind::PermissionDenied
        || (cfg!(windows) && matches!(error.raw_os_error(), Some(32 | 33)))
}

/// Write `bytes` to `path`, consulting `prompt` after each locked-file
/// failure. Returns the number of attempts made.
pub fn save_bytes(
    path: &Path,
    bytes: &[u8],
    save: &SaveConfig,
    prompt: &mut dyn SavePrompt,
) -> Result<u32> {
    if save.interactive {
        save_with(path, bytes, save.max_attempts, prompt, |p, b| std::fs::write(p, b))
    } else {
        save_with(path, bytes, save.max_attempts, &mut NoPrompt, |p, b| std::fs::write(p, b))
    }
}

fn save_with<W>(
    path: &Path,
    bytes: &[u8],
    max_attempts: u32,
    prompt: &mut dyn SavePrompt,
    mut write: W,
) -> Result<u32>
where
    W: FnMut(&Path, &[u8]) -> io::Result<()>,
{
    let mut attempt = 1;
    loop {
        match write(path, bytes) {
            Ok(()) => return Ok(attempt),
            Err(e) if is_file_in_use(&e) && attempt < max_attempts => {
                warn!("{} is locked: {e}", path.display());
                if !prompt.retry(path, attempt, &e) {
                    return Err(anyhow::Error::new(e).context(format!(
                        "{} is in use, gave up after {attempt} attempt(s)",
                        path.display()
                    )));
                }
                attempt += 1;
            }
            Err(e) => {
                return Err(anyhow::Error::new(e).context(format!("writing {}", path.display())));
            }
        }
    }
}
