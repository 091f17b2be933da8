use std::thread;
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use super::{DacCommand, DeviceError, DeviceLink, DeviceResult};

/// Wait before checking for the board's acknowledgement.
pub const DEFAULT_ACK_DELAY: Duration = Duration::from_millis(20);

/// Silence on the line that marks the end of a reply.
pub const DEFAULT_QUIET_PERIOD: Duration = Duration::from_millis(100);

/// Upper bound on collecting one reply.
const MAX_REPLY_TIME: Duration = Duration::from_secs(2);

/// The DAC simulator board behind a [`DeviceLink`].
///
/// Every command is fire-and-forget followed by a single check that the
/// board produced some output; silence is an error and the caller is
/// expected to stop rather than continue with an unknown board state.
pub struct DacBoard<L: DeviceLink> {
    link: L,
    ack_delay: Duration,
    quiet_period: Duration,
}

impl<L: DeviceLink> DacBoard<L> {
    pub fn new(link: L) -> Self {
        Self {
            link,
            ack_delay: DEFAULT_ACK_DELAY,
            quiet_period: DEFAULT_QUIET_PERIOD,
        }
    }

    pub fn with_ack_delay(mut self, delay: Duration) -> Self {
        self.ack_delay = delay;
        self
    }

    pub fn with_quiet_period(mut self, quiet: Duration) -> Self {
        self.quiet_period = quiet;
        self
    }

    /// Send one command and confirm the board answered.
    pub fn send(&mut self, command: &DacCommand) -> DeviceResult<()> {
        debug!("-> {command}");
        self.link.write_all(&command.encode())?;
        self.confirm(command)
    }

    fn confirm(&mut self, command: &DacCommand) -> DeviceResult<()> {
        thread::sleep(self.ack_delay);
        if self.link.bytes_waiting()? == 0 {
            return Err(DeviceError::NoResponse(command.to_string()));
        }
        Ok(())
    }

    pub fn set_voltages(&mut self, volts: &[f64]) -> DeviceResult<()> {
        self.send(&DacCommand::Set(volts.to_vec()))
    }

    pub fn set_default(&mut self) -> DeviceResult<()> {
        self.send(&DacCommand::Default)
    }

    pub fn set_random(&mut self) -> DeviceResult<()> {
        self.send(&DacCommand::Random)
    }

    pub fn clear(&mut self) -> DeviceResult<()> {
        self.send(&DacCommand::Clear)
    }

    pub fn version(&mut self) -> DeviceResult<()> {
        self.send(&DacCommand::Version)
    }

    pub fn set_rtd_mux(&mut self, bits: &[u8]) -> DeviceResult<()> {
        self.send(&DacCommand::rtd_mux(bits)?)
    }

    pub fn board_id(&mut self) -> DeviceResult<()> {
        self.send(&DacCommand::BoardId)
    }

    pub fn set_board_id(&mut self, id: i64) -> DeviceResult<()> {
        self.send(&DacCommand::SetBoardId(id))
    }

    /// The board's reply, split into lines. Reads until the line has been
    /// quiet for the quiet period, so replies longer than what arrived
    /// during the acknowledgement delay come through whole.
    pub fn read_lines(&mut self) -> DeviceResult<Vec<String>> {
        let bytes = self.drain()?;
        let text = String::from_utf8_lossy(&bytes);
        let lines: Vec<String> = text
            .lines()
            .map(|l| l.trim_end_matches('\r').to_owned())
            .filter(|l| !l.is_empty())
            .collect();
        info!("<- {} line(s)", lines.len());
        Ok(lines)
    }

    fn drain(&mut self) -> DeviceResult<Vec<u8>> {
        let deadline = Instant::now() + MAX_REPLY_TIME;
        let mut reply = Vec::new();
        loop {
            reply.extend(self.link.read_waiting()?);
            thread::sleep(self.quiet_period);
            if self.link.bytes_waiting()? == 0 {
                break;
            }
            if Instant::now() >= deadline {
                warn!("reply still streaming after {MAX_REPLY_TIME:?}, stopping");
                break;
            }
        }
        debug!("<- {} byte(s)", reply.len());
        Ok(reply)
    }

    pub fn into_link(self) -> L {
        self.link
    }
}
