use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use log::error;

use thermocal::device::serial::{self, DEFAULT_BAUD};
use thermocal::device::{DacBoard, DacCommand};

const USAGE: &str = "usage: dacctl [--port NAME] [--baud N] <command> [arg]\n\
                     commands: set <v1,v2,...> | default | random | clear | version |\n          \
                     rtdmux <b0,b1,b2,b3,b4> | boardid | setboardid <id>";

fn main() -> ExitCode {
    env_logger::init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    let mut port = None;
    let mut baud = DEFAULT_BAUD;
    let mut words = Vec::new();

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => {
                println!("{USAGE}");
                return Ok(());
            }
            "--port" => port = Some(args.next().context("--port needs a name")?),
            "--baud" => {
                let value = args.next().context("--baud needs a value")?;
                baud = value
                    .parse()
                    .with_context(|| format!("bad baud rate '{value}'"))?;
            }
            _ => words.push(arg),
        }
    }
    if words.is_empty() {
        bail!("{USAGE}");
    }

    let command: DacCommand = words.join(" ").parse()?;
    let port = match port {
        Some(p) => p,
        None => serial::find_arduino_port()?,
    };

    let mut board = DacBoard::new(serial::open(&port, baud)?);
    board
        .send(&command)
        .with_context(|| format!("sending '{command}' on {port}"))?;
    for line in board.read_lines()? {
        println!("{line}");
    }
    Ok(())
}
