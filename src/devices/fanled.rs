//! Serial bridge to the fan/LED controller
//!
//! Five fans (4 intake + 1 main) and four zone LEDs hang off a secondary
//! MCU on USB serial. The line protocol is fixed by the MCU firmware:
//!
//! ```text
//! SETF f1 f2 f3 f4 big            -> ACK:SETF:...
//! SETL c1 c2 c3 c4                -> ACK:SETL:...
//! SETALL f1 f2 f3 f4 big c1..c4   -> ACK:SETALL:...
//! GET?                            -> DATA:STATE:ch1,ch2,ch3,ch4,big
//! ```
//!
//! Fan duties are 0..=100; LED tokens are R/G/B/W/OFF. Rev-A boards have
//! the blue and green LED lines swapped, compensated with `swap_blue_green`
//! just before transmit so callers always speak in true colors.

use crate::error::{Error, Result};
use crate::transport::Transport;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

const ACK_FANS: &str = "ACK:SETF:";
const ACK_LEDS: &str = "ACK:SETL:";
const ACK_ALL: &str = "ACK:SETALL:";
const DATA_STATE: &str = "DATA:STATE:";

/// Send attempts per command before giving up
const COMMAND_RETRIES: usize = 2;

/// Zone LED color token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedColor {
    Red,
    Green,
    Blue,
    White,
    Off,
}

impl LedColor {
    /// Protocol token for this color
    pub fn token(self) -> &'static str {
        match self {
            LedColor::Red => "R",
            LedColor::Green => "G",
            LedColor::Blue => "B",
            LedColor::White => "W",
            LedColor::Off => "OFF",
        }
    }

    /// Parse a protocol token (case-insensitive)
    pub fn from_token(token: &str) -> Result<Self> {
        match token.to_ascii_uppercase().as_str() {
            "R" => Ok(LedColor::Red),
            "G" => Ok(LedColor::Green),
            "B" => Ok(LedColor::Blue),
            "W" => Ok(LedColor::White),
            "OFF" => Ok(LedColor::Off),
            other => Err(Error::InvalidParameter(format!(
                "unknown LED color token: {}",
                other
            ))),
        }
    }

    /// Blue↔green compensation for miswired strips
    fn swapped_bg(self) -> Self {
        match self {
            LedColor::Blue => LedColor::Green,
            LedColor::Green => LedColor::Blue,
            other => other,
        }
    }
}

/// Reported fan controller state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FanBankState {
    /// Intake fan duties as reported by the MCU
    pub intake: [i32; 4],
    /// Main fan duty
    pub main: i32,
}

/// Bridge to the fan/LED MCU over a byte-stream transport
pub struct FanLedBridge {
    transport: Box<dyn Transport>,
    swap_blue_green: bool,
    reply_timeout: Duration,
    pending: Vec<u8>,
}

impl FanLedBridge {
    pub fn new(
        transport: Box<dyn Transport>,
        swap_blue_green: bool,
        reply_timeout: Duration,
    ) -> Self {
        Self {
            transport,
            swap_blue_green,
            reply_timeout,
            pending: Vec::new(),
        }
    }

    /// Wait briefly for the MCU's boot banner after port open
    ///
    /// The MCU resets when the port opens and prints READY once it is up.
    /// Not receiving the banner is tolerated; the command protocol still
    /// recovers through its retry path.
    pub fn connect(&mut self) -> Result<()> {
        let deadline = Instant::now() + self.reply_timeout;
        while Instant::now() < deadline {
            match self.read_line(deadline)? {
                Some(line) if !line.is_empty() => {
                    log::debug!("Fan/LED MCU banner: {}", line);
                    return Ok(());
                }
                _ => {}
            }
        }
        log::warn!("Fan/LED MCU sent no boot banner, continuing anyway");
        Ok(())
    }

    /// Apply five fan duties: four intake fans plus the main fan
    pub fn set_fans(&mut self, intake: [i32; 4], main: i32) -> Result<()> {
        Self::check_duties(&intake, main)?;
        let cmd = format!(
            "SETF {} {} {} {} {}",
            intake[0], intake[1], intake[2], intake[3], main
        );
        self.command(&cmd, ACK_FANS)?;
        Ok(())
    }

    /// Apply four zone LED colors
    pub fn set_leds(&mut self, colors: [LedColor; 4]) -> Result<()> {
        let out = self.wire_colors(colors);
        let cmd = format!(
            "SETL {} {} {} {}",
            out[0].token(),
            out[1].token(),
            out[2].token(),
            out[3].token()
        );
        self.command(&cmd, ACK_LEDS)?;
        Ok(())
    }

    /// Apply fans and LEDs in one shot
    pub fn set_all(&mut self, intake: [i32; 4], main: i32, colors: [LedColor; 4]) -> Result<()> {
        Self::check_duties(&intake, main)?;
        let out = self.wire_colors(colors);
        let cmd = format!(
            "SETALL {} {} {} {} {} {} {} {} {}",
            intake[0],
            intake[1],
            intake[2],
            intake[3],
            main,
            out[0].token(),
            out[1].token(),
            out[2].token(),
            out[3].token()
        );
        self.command(&cmd, ACK_ALL)?;
        Ok(())
    }

    /// Query the MCU's current fan state
    pub fn query_state(&mut self) -> Result<FanBankState> {
        let reply = self.command("GET?", DATA_STATE)?;
        let payload = reply
            .strip_prefix(DATA_STATE)
            .ok_or_else(|| Error::Protocol(format!("malformed state reply: {}", reply)))?;
        let values: Vec<i32> = payload
            .split(',')
            .map(|v| v.trim().parse::<i32>())
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| Error::Protocol(format!("state parse failed: {} ({})", e, reply)))?;
        if values.len() != 5 {
            return Err(Error::Protocol(format!(
                "expected 5 state values, got {} ({})",
                values.len(),
                reply
            )));
        }
        Ok(FanBankState {
            intake: [values[0], values[1], values[2], values[3]],
            main: values[4],
        })
    }

    fn check_duties(intake: &[i32; 4], main: i32) -> Result<()> {
        for duty in intake.iter().chain(std::iter::once(&main)) {
            if !(0..=100).contains(duty) {
                return Err(Error::InvalidParameter(format!(
                    "fan duty must be 0..=100, got {}",
                    duty
                )));
            }
        }
        Ok(())
    }

    fn wire_colors(&self, colors: [LedColor; 4]) -> [LedColor; 4] {
        if self.swap_blue_green {
            colors.map(LedColor::swapped_bg)
        } else {
            colors
        }
    }

    /// Drain stale input, send one command line, and wait for the expected
    /// reply prefix
    fn command(&mut self, cmd: &str, expect: &str) -> Result<String> {
        for attempt in 0..=COMMAND_RETRIES {
            if attempt > 0 {
                log::debug!("Fan/LED retry {} for '{}'", attempt, cmd);
            }
            self.drain()?;
            self.write_all(format!("{}\n", cmd).as_bytes())?;
            self.transport.flush()?;

            let deadline = Instant::now() + self.reply_timeout;
            while let Some(line) = self.read_line(deadline)? {
                if line.is_empty() {
                    continue;
                }
                if line.starts_with(expect) {
                    return Ok(line);
                }
                log::trace!("Fan/LED ignoring line: {}", line);
            }
        }
        Err(Error::Protocol(format!(
            "no '{}' reply to '{}'",
            expect, cmd
        )))
    }

    fn drain(&mut self) -> Result<()> {
        self.pending.clear();
        self.transport.drain()
    }

    fn write_all(&mut self, mut data: &[u8]) -> Result<()> {
        while !data.is_empty() {
            let n = self.transport.write(data)?;
            if n == 0 {
                return Err(Error::Protocol("transport accepted no bytes".to_string()));
            }
            data = &data[n..];
        }
        Ok(())
    }

    /// Read one newline-terminated line, or `None` on deadline
    fn read_line(&mut self, deadline: Instant) -> Result<Option<String>> {
        loop {
            if let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
                let line: Vec<u8> = self.pending.drain(..=pos).collect();
                let text = String::from_utf8_lossy(&line).trim().to_string();
                return Ok(Some(text));
            }
            if Instant::now() >= deadline {
                return Ok(None);
            }
            let mut buf = [0u8; 64];
            let n = self.transport.read(&mut buf)?;
            if n == 0 {
                std::thread::sleep(Duration::from_millis(2));
                continue;
            }
            self.pending.extend_from_slice(&buf[..n]);
        }
    }
}
