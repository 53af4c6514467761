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
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};

use tokio::{sync::mpsc::Sender, task::JoinHandle};
use tracing::{info, span, warn, Level};

use super::Event;
use crate::trigger::Trigger;

/// The source name that reads triggers from stdin.
pub const STDIN: &str = "-";

/// Reads newline-delimited trigger lines from the sensor board.
///
/// The source is a path to a tty (line settings are left to the OS) or `-`
/// for stdin.
pub struct Driver {
    source: PathBuf,
}

impl Driver {
    pub fn new(source: &Path) -> Driver {
        Driver {
            source: source.to_path_buf(),
        }
    }

    /// Whether this driver reads from stdin.
    pub fn is_stdin(&self) -> bool {
        self.source == Path::new(STDIN)
    }

    /// Forwards every valid trigger until EOF or until the receiver hangs up.
    fn monitor_lines<R: BufRead>(events_tx: &Sender<Event>, mut reader: R) -> Result<(), io::Error> {
        let mut buf = Vec::new();
        loop {
            buf.clear();
            if reader.read_until(b'\n', &mut buf)? == 0 {
                info!("Trigger source closed.");
                return Ok(());
            }

            let line = String::from_utf8_lossy(&buf);
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let trigger = match line.parse::<Trigger>() {
                Ok(trigger) => trigger,
                Err(e) => {
                    warn!(line, err = %e, "Malformed trigger line");
                    continue;
                }
            };

            if events_tx.blocking_send(Event::Trigger(trigger)).is_err() {
                return Ok(());
            }
        }
    }
}

impl super::Driver for Driver {
    fn monitor_events(&self, events_tx: Sender<Event>) -> JoinHandle<Result<(), io::Error>> {
        let source = self.source.clone();
        let stdin = self.is_stdin();
        tokio::task::spawn_blocking(move || {
            let span = span!(Level::INFO, "serial driver");
            let _enter = span.enter();

            info!(source = %source.display(), "Serial driver started.");

            if stdin {
                Self::monitor_lines(&events_tx, io::stdin().lock())
            } else {
                Self::monitor_lines(&events_tx, BufReader::new(File::open(&source)?))
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use std::io::{self, BufReader};
    use std::path::Path;

    use tokio::sync::mpsc;

    use super::Driver;
    use crate::controller::Event;
    use crate::trigger::{Action, Trigger};

    fn read_all(input: &[u8]) -> Result<Vec<Event>, io::Error> {
        let (sender, mut receiver) = mpsc::channel::<Event>(16);
        Driver::monitor_lines(&sender, BufReader::new(input))?;
        drop(sender);

        let mut events = Vec::new();
        while let Some(event) = receiver.blocking_recv() {
            events.push(event);
        }
        Ok(events)
    }

    #[test]
    fn test_skips_malformed_lines() -> Result<(), io::Error> {
        let events = read_all(b"5,100,1\nbad\n\n21,3,0\r\n5,1")?;
        assert_eq!(
            events,
            vec![
                Event::Trigger(Trigger::new(5, 100, Action::Start)),
                Event::Trigger(Trigger::new(21, 3, Action::Stop)),
            ]
        );
        Ok(())
    }

    #[test]
    fn test_invalid_utf8() -> Result<(), io::Error> {
        let events = read_all(b"\xff\xfe\n1,0,1\n")?;
        assert_eq!(events, vec![Event::Trigger(Trigger::new(1, 0, Action::Start))]);
        Ok(())
    }

    #[test]
    fn test_stdin_source() {
        assert!(Driver::new(Path::new("-")).is_stdin());
        assert!(!Driver::new(Path::new("/dev/ttyACM0")).is_stdin());
    }
}
