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
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc::{self, error::TryRecvError, Sender};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, span, warn, Instrument, Level};

use crate::router::{Command, RouteError, Router};
use crate::trigger::Trigger;

pub mod console;
pub mod serial;

/// Pending events the drivers may queue before they block.
const EVENT_BUFFER: usize = 64;

/// Events that drive the router.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// A trigger from the sensor board.
    Trigger(Trigger),

    /// A user command.
    Command(Command),
}

pub trait Driver: Send + Sync + 'static {
    fn monitor_events(&self, events_tx: Sender<Event>) -> JoinHandle<Result<(), io::Error>>;
}

/// Owns the router and feeds it events from the drivers.
pub struct Controller {
    handle: JoinHandle<Router>,
}

impl Controller {
    /// Starts the poll loop. It runs until every driver has hung up.
    pub fn new(router: Router, drivers: Vec<Arc<dyn Driver>>, poll_interval: Duration) -> Controller {
        let span = span!(Level::INFO, "controller");
        Controller {
            handle: tokio::spawn(
                Controller::poll_events(router, drivers, poll_interval).instrument(span),
            ),
        }
    }

    /// Waits for the controller to finish and hands the router back.
    pub async fn join(self) -> Result<Router, JoinError> {
        self.handle.await
    }

    async fn poll_events(
        mut router: Router,
        drivers: Vec<Arc<dyn Driver>>,
        poll_interval: Duration,
    ) -> Router {
        let (events_tx, mut events_rx) = mpsc::channel(EVENT_BUFFER);
        let join_handles: Vec<_> = drivers
            .iter()
            .map(|driver| driver.monitor_events(events_tx.clone()))
            .collect();
        drop(events_tx);

        let mut interval = tokio::time::interval(poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            drivers = join_handles.len(),
            poll_interval = ?poll_interval,
            "Controller started."
        );

        loop {
            interval.tick().await;

            let closed = loop {
                match events_rx.try_recv() {
                    Ok(event) => Controller::dispatch(&mut router, event),
                    Err(TryRecvError::Empty) => break false,
                    Err(TryRecvError::Disconnected) => break true,
                }
            };
            router.tick(Instant::now());

            if closed {
                break;
            }
        }

        info!("Controller closing.");
        for join_handle in join_handles {
            match join_handle.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!(err = %e, "Driver stopped with an error"),
                Err(e) => error!(err = %e, "Error waiting for driver to stop"),
            }
        }
        router.stop_all();
        router
    }

    fn dispatch(router: &mut Router, event: Event) {
        match event {
            Event::Trigger(trigger) => match router.on_trigger(&trigger) {
                Ok(()) => {}
                Err(e @ (RouteError::Voice(_) | RouteError::NoSample { .. })) => {
                    warn!(trigger = %trigger, err = %e, "Trigger dropped")
                }
                Err(e) => info!(trigger = %trigger, err = %e, "Trigger ignored"),
            },
            Event::Command(command) => {
                debug!(command = ?command, "Received command.");
                router.apply(command);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error;
    use std::io;
    use std::path::Path;
    use std::sync::Arc;
    use std::time::Duration;

    use parking_lot::Mutex;
    use tokio::sync::{mpsc::Sender, oneshot};
    use tokio::task::JoinHandle;

    use super::{Controller, Driver, Event};
    use crate::audio::{mock, Bus, Volume};
    use crate::catalog::{Instrument, Layout, NoteTable};
    use crate::range::{Bounds, InstrumentSelector};
    use crate::router::{Command, Router};
    use crate::samples::VoiceManager;
    use crate::testutil;

    /// Sends a fixed list of events and hangs up.
    struct TestDriver {
        events: Vec<Event>,
    }

    impl Driver for TestDriver {
        fn monitor_events(&self, events_tx: Sender<Event>) -> JoinHandle<Result<(), io::Error>> {
            let events = self.events.clone();
            tokio::spawn(async move {
                for event in events {
                    events_tx
                        .send(event)
                        .await
                        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
                }
                Ok(())
            })
        }
    }

    /// Sends one event, then holds the channel open until released.
    struct HeldDriver {
        event: Event,
        release: Mutex<Option<oneshot::Receiver<()>>>,
    }

    impl Driver for HeldDriver {
        fn monitor_events(&self, events_tx: Sender<Event>) -> JoinHandle<Result<(), io::Error>> {
            let event = self.event.clone();
            let release = self.release.lock().take();
            tokio::spawn(async move {
                events_tx
                    .send(event)
                    .await
                    .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
                if let Some(release) = release {
                    let _ = release.await;
                }
                Ok(())
            })
        }
    }

    fn event(line: &str) -> Event {
        Event::Trigger(line.parse().unwrap())
    }

    fn router(dir: &Path, device: Arc<mock::Device>) -> Router {
        let piano = Layout::new(dir.to_path_buf(), Bounds::new(21, 108), 2);
        let secondary = Layout::new(dir.join("missing"), Bounds::new(50, 94), 2);
        Router::new(
            Instrument::new("Piano", NoteTable::build(&piano), Duration::from_secs(2)),
            Instrument::new("Clarinet", NoteTable::build(&secondary), Duration::from_secs(3)),
            Duration::from_secs(2),
            Bounds::full(),
            VoiceManager::new(device, 0.5),
        )
    }

    #[tokio::test]
    async fn test_controller_dispatches_in_order() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        testutil::write_sample_dir(dir.path(), &["C4v1.wav", "C4v2.wav"], 44100)?;
        let device = Arc::new(mock::Device::get("mock"));
        let router = router(dir.path(), device.clone());

        let driver = Arc::new(TestDriver {
            events: vec![
                event("1,10,1"),
                // Missing sample, out of range pad: both dropped without stopping the loop.
                event("2,10,1"),
                event("21,10,1"),
                Event::Command(Command::SetVolume(Volume::Bus(Bus::Piano), 0.25)),
                event("1,100,0"),
                event("1,100,1"),
                Event::Command(Command::SelectInstrument(InstrumentSelector::Piano)),
            ],
        });

        let controller = Controller::new(router, vec![driver], Duration::from_millis(5));
        let router = controller.join().await?;

        let played = device.played();
        assert_eq!(played.len(), 2);
        assert_eq!(played[0].path, dir.path().join("C4v1.wav"));
        assert_eq!(played[0].control.fade(), Some(Duration::from_secs(2)));
        assert_eq!(played[1].path, dir.path().join("C4v2.wav"));
        assert!(played[1].control.is_cancelled());
        assert_eq!(device.volume(Volume::Bus(Bus::Piano)), Some(0.25));
        assert_eq!(router.voices().active_count(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_controller_dispatches_while_drivers_run() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        testutil::write_sample_dir(dir.path(), &["C4v2.wav"], 100)?;
        let device = Arc::new(mock::Device::get("mock"));

        let (release_tx, release_rx) = oneshot::channel();
        let driver = Arc::new(HeldDriver {
            event: event("1,127,1"),
            release: Mutex::new(Some(release_rx)),
        });
        let controller = Controller::new(
            router(dir.path(), device.clone()),
            vec![driver],
            Duration::from_millis(5),
        );

        testutil::eventually_async(
            || {
                let device = device.clone();
                async move { device.played().len() == 1 }
            },
            "Trigger was never dispatched",
        )
        .await;

        device.render(200);
        assert!(device.played()[0].control.is_finished());

        let _ = release_tx.send(());
        let router = controller.join().await?;
        assert_eq!(router.voices().active_count(), 0);
        Ok(())
    }
}
