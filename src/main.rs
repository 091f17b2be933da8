use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use log::{error, info};

use thermocal::config::RunConfig;
use thermocal::pipeline::{self, ConsolePrompt, NoPrompt, SavePrompt};

const USAGE: &str = "usage: thermocal <config.toml|config.json>\n       thermocal <input> [output.xlsx] [--channels N]";

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
    let args: Vec<String> = std::env::args().skip(1).collect();
    let config = parse_args(&args)?;

    let mut prompt: Box<dyn SavePrompt> = if config.save.interactive {
        Box::new(ConsolePrompt::stdin())
    } else {
        Box::new(NoPrompt)
    };
    let summary = pipeline::run(&config, prompt.as_mut())?;
    info!(
        "{} rows x {} channels -> {} ({} sheets, {} charts)",
        summary.rows,
        summary.channels,
        summary.output.display(),
        summary.sheets,
        summary.charts
    );
    println!("{}", summary.output.display());
    Ok(())
}

fn parse_args(args: &[String]) -> Result<RunConfig> {
    let mut positional = Vec::new();
    let mut channels = None;

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-h" | "--help" => {
                println!("{USAGE}");
                std::process::exit(0);
            }
            "--channels" => {
                let value = iter.next().context("--channels needs a value")?;
                channels = Some(
                    value
                        .parse::<usize>()
                        .with_context(|| format!("bad channel count '{value}'"))?,
                );
            }
            flag if flag.starts_with("--") => bail!("unknown option {flag}\n{USAGE}"),
            _ => positional.push(PathBuf::from(arg)),
        }
    }

    let mut config = match positional.as_slice() {
        [single] if is_config_file(single) => RunConfig::load(single)?,
        [input] => RunConfig::new(input.clone()),
        [input, output] => {
            let mut config = RunConfig::new(input.clone());
            config.output = Some(output.clone());
            config
        }
        _ => bail!("{USAGE}"),
    };
    if let Some(n) = channels {
        config.layout.channels = n;
    }
    config.validate()?;
    Ok(config)
}

fn is_config_file(path: &std::path::Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase).as_deref(),
        Some("toml" | "json")
    )
}
