use std::fmt;
use std::str::FromStr;

use super::DeviceError;

/// Commands understood by the serial parser firmware.
#[derive(Debug, Clone, PartialEq)]
pub enum DacCommand {
    /// Push one voltage per DAC channel.
    Set(Vec<f64>),
    /// Channel n set to n/10 V.
    Default,
    Random,
    Clear,
    Version,
    /// The 5 RTD mux select bits, LSB first.
    RtdMux([u8; 5]),
    BoardId,
    SetBoardId(i64),
}

impl DacCommand {
    /// Validate and build an RTD mux command.
    pub fn rtd_mux(bits: &[u8]) -> Result<Self, DeviceError> {
        match <[u8; 5]>::try_from(bits) {
            Ok(arr) if arr.iter().all(|&b| b <= 1) => Ok(DacCommand::RtdMux(arr)),
            _ => Err(DeviceError::BadRtdBits(bits.to_vec())),
        }
    }

    /// Keyword sent on the first line.
    pub fn keyword(&self) -> &'static str {
        match self {
            DacCommand::Set(_) => "set",
            DacCommand::Default => "default",
            DacCommand::Random => "random",
            DacCommand::Clear => "clear",
            DacCommand::Version => "version",
            DacCommand::RtdMux(_) => "RTDMUX",
            DacCommand::BoardId => "boardid",
            DacCommand::SetBoardId(_) => "setboardid",
        }
    }

    /// Argument line, for commands that take one.
    fn argument(&self) -> Option<String> {
        match self {
            DacCommand::Set(volts) => Some(join(volts)),
            DacCommand::RtdMux(bits) => Some(join(bits)),
            DacCommand::SetBoardId(id) => Some(id.to_string()),
            _ => None,
        }
    }

    /// Wire form: keyword line, then the argument line if any.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = format!("{}\n", self.keyword());
        if let Some(arg) = self.argument() {
            out.push_str(&arg);
            out.push('\n');
        }
        out.into_bytes()
    }
}

fn join<T: ToString>(values: &[T]) -> String {
    values
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

impl fmt::Display for DacCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.argument() {
            Some(arg) => write!(f, "{} {arg}", self.keyword()),
            None => f.write_str(self.keyword()),
        }
    }
}

#[derive(Debug, PartialEq)]
pub struct ParseCommandError(pub String);

impl fmt::Display for ParseCommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for ParseCommandError {}

/// Parses the `dacctl` form: `<keyword> [argument]`, argument lists comma
/// separated (`set 1,2.5,-3`, `rtdmux 1,1,1,0,0`, `setboardid 4`).
impl FromStr for DacCommand {
    type Err = ParseCommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.trim().splitn(2, char::is_whitespace);
        let keyword = parts.next().unwrap_or("").to_ascii_lowercase();
        let arg = parts.next().map(str::trim).unwrap_or("");
        let need_arg = |what: &str| {
            if arg.is_empty() {
                Err(ParseCommandError(format!("'{keyword}' needs {what}")))
            } else {
                Ok(arg)
            }
        };

        match keyword.as_str() {
            "set" => {
                let volts = need_arg("a comma-separated voltage list")?
                    .split(',')
                    .map(|v| {
                        v.trim()
                            .parse::<f64>()
                            .map_err(|_| ParseCommandError(format!("bad voltage '{v}'")))
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(DacCommand::Set(volts))
            }
            "default" => Ok(DacCommand::Default),
            "random" => Ok(DacCommand::Random),
            "clear" => Ok(DacCommand::Clear),
            "version" => Ok(DacCommand::Version),
            "rtdmux" => {
                let bits = need_arg("5 comma-separated bits")?
                    .split(',')
                    .map(|b| {
                        b.trim()
                            .parse::<u8>()
                            .map_err(|_| ParseCommandError(format!("bad bit '{b}'")))
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                DacCommand::rtd_mux(&bits).map_err(|e| ParseCommandError(e.to_string()))
            }
            "boardid" => Ok(DacCommand::BoardId),
            "setboardid" => need_arg("an integer id")?
                .parse()
                .map(DacCommand::SetBoardId)
                .map_err(|_| ParseCommandError(format!("bad board id '{arg}'"))),
            "" => Err(ParseCommandError("empty command".to_owned())),
            other => Err(ParseCommandError(format!("unknown command '{other}'"))),
        }
    }
}
