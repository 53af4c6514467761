// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::io;
use std::path::PathBuf;

use tokio::{sync::mpsc::Sender, task::JoinHandle};
use tracing::{info, span, warn, Level};

use super::Event;
use crate::audio::{ParseVolumeError, Volume};
use crate::notes::{ParseNoteError, PitchClass};
use crate::pads::{PadInstrument, ParsePadInstrumentError};
use crate::range::{InstrumentSelector, ParseSelectorError, PAD_COUNT};
use crate::router::Command;

const INSTRUMENT: &str = "instrument";
const START: &str = "start";
const ENABLE: &str = "enable";
const DISABLE: &str = "disable";
const ASSIGN: &str = "assign";
const UPLOAD: &str = "upload";
const UNLOAD: &str = "unload";
const VOLUME: &str = "volume";
const HELP: &str = "help";

const USAGE: &str = "\
instrument <piano|secondary|custom>
start <note> <octave>         e.g. start C# 3
enable <pad|all>
disable <pad|all>
assign <pad> <piano|secondary|uploaded|none>
upload <pad> <file>
unload <pad>
volume <master|piano|secondary|uploaded> <gain>";

#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("unknown command '{0}', try 'help'")]
    Unknown(String),

    #[error("usage: {0}")]
    Usage(&'static str),

    #[error("'{0}' is not a pad between 1 and 20")]
    Pad(String),

    #[error("'{0}' is not an octave")]
    Octave(String),

    #[error("'{0}' is not a gain")]
    Gain(String),

    #[error(transparent)]
    Note(#[from] ParseNoteError),

    #[error(transparent)]
    Selector(#[from] ParseSelectorError),

    #[error(transparent)]
    Instrument(#[from] ParsePadInstrumentError),

    #[error(transparent)]
    Volume(#[from] ParseVolumeError),
}

/// Parses a 1-based pad number into a pad index.
fn pad(value: &str) -> Result<usize, CommandError> {
    value
        .parse::<usize>()
        .ok()
        .filter(|pad| (1..=PAD_COUNT).contains(pad))
        .map(|pad| pad - 1)
        .ok_or_else(|| CommandError::Pad(value.to_string()))
}

fn octave(value: &str) -> Result<i32, CommandError> {
    value
        .parse()
        .map_err(|_| CommandError::Octave(value.to_string()))
}

/// Parses `C# 3` or `C#3`.
fn start_note(args: &[&str]) -> Result<(PitchClass, i32), CommandError> {
    match args {
        [note, oct] => Ok((note.parse()?, octave(oct)?)),
        [joined] => {
            let split = joined
                .find(|c: char| c.is_ascii_digit() || c == '-')
                .ok_or(CommandError::Usage("start <note> <octave>"))?;
            Ok((joined[..split].parse()?, octave(&joined[split..])?))
        }
        _ => Err(CommandError::Usage("start <note> <octave>")),
    }
}

fn toggle(args: &[&str], enabled: bool, usage: &'static str) -> Result<Command, CommandError> {
    match args {
        [all] if all.eq_ignore_ascii_case("all") => Ok(Command::SetAllPadsEnabled(enabled)),
        [value] => Ok(Command::SetPadEnabled(pad(value)?, enabled)),
        _ => Err(CommandError::Usage(usage)),
    }
}

/// Parses a console line into a router command.
pub fn parse_command(line: &str) -> Result<Command, CommandError> {
    let line = line.trim();
    let (name, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    let rest = rest.trim();
    let args: Vec<&str> = rest.split_whitespace().collect();

    match name.to_lowercase().as_str() {
        INSTRUMENT => match args.as_slice() {
            [selector] => Ok(Command::SelectInstrument(selector.parse::<InstrumentSelector>()?)),
            _ => Err(CommandError::Usage("instrument <piano|secondary|custom>")),
        },
        START => {
            let (pitch, octave) = start_note(&args)?;
            Ok(Command::SetStartNote(pitch, octave))
        }
        ENABLE => toggle(&args, true, "enable <pad|all>"),
        DISABLE => toggle(&args, false, "disable <pad|all>"),
        ASSIGN => match args.as_slice() {
            [value, instrument] => Ok(Command::AssignInstrument(
                pad(value)?,
                instrument.parse::<PadInstrument>()?,
            )),
            _ => Err(CommandError::Usage(
                "assign <pad> <piano|secondary|uploaded|none>",
            )),
        },
        UPLOAD => {
            // The file name may contain spaces.
            let (value, file) = rest
                .split_once(char::is_whitespace)
                .ok_or(CommandError::Usage("upload <pad> <file>"))?;
            let file = file.trim();
            if file.is_empty() {
                return Err(CommandError::Usage("upload <pad> <file>"));
            }
            Ok(Command::SetUploadedFile(pad(value)?, Some(PathBuf::from(file))))
        }
        UNLOAD => match args.as_slice() {
            [value] => Ok(Command::SetUploadedFile(pad(value)?, None)),
            _ => Err(CommandError::Usage("unload <pad>")),
        },
        VOLUME => match args.as_slice() {
            [volume, gain] => Ok(Command::SetVolume(
                volume.parse::<Volume>()?,
                gain.parse::<f32>()
                    .ok()
                    .filter(|gain| gain.is_finite())
                    .ok_or_else(|| CommandError::Gain(gain.to_string()))?,
            )),
            _ => Err(CommandError::Usage(
                "volume <master|piano|secondary|uploaded> <gain>",
            )),
        },
        _ => Err(CommandError::Unknown(name.to_string())),
    }
}

/// Reads user commands from the terminal.
pub struct Driver {}

impl Driver {
    pub fn new() -> Driver {
        Driver {}
    }

    /// Reads and forwards one command. Returns false once input is exhausted
    /// or the controller has gone away.
    fn monitor_io<R, W>(events_tx: &Sender<Event>, mut reader: R, mut writer: W) -> Result<bool, io::Error>
    where
        R: io::BufRead,
        W: io::Write,
    {
        write!(writer, "> ")?;
        writer.flush()?;

        let mut input = String::default();
        if reader.read_line(&mut input)? == 0 {
            return Ok(false);
        }

        let input = input.trim();
        if input.is_empty() {
            return Ok(true);
        }
        if input.eq_ignore_ascii_case(HELP) {
            writeln!(writer, "{}", USAGE)?;
            return Ok(true);
        }

        match parse_command(input) {
            Ok(command) => Ok(events_tx.blocking_send(Event::Command(command)).is_ok()),
            Err(e) => {
                warn!(input, err = %e, "Unrecognized input");
                writeln!(writer, "{}", e)?;
                Ok(true)
            }
        }
    }
}

impl super::Driver for Driver {
    fn monitor_events(&self, events_tx: Sender<Event>) -> JoinHandle<Result<(), io::Error>> {
        tokio::task::spawn_blocking(move || {
            let span = span!(Level::INFO, "console driver");
            let _enter = span.enter();

            info!("Console driver started.");

            while Self::monitor_io(&events_tx, io::stdin().lock(), io::stdout())? {}

            info!("Console closed.");
            Ok(())
        })
    }
}
