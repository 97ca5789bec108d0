//! The control loop.
//!
//! A single [`Controller`] task owns the [`ControllerState`] and handles one
//! [`Event`] at a time. Router requests and delays run in spawned tasks that
//! post their result back as an event, so the state never needs a lock and a
//! status read always sees a consistent picture.

pub mod ip;
pub mod state;

use crate::router_client::RouterClient;
use anyhow::{Context, Result, anyhow};
use log::{debug, error, warn};
pub use state::{
    AttemptCounters, ControllerState, CycleStart, NextTick, OutcomeCounts, PAUSE_MINUTES,
    RestartRejected, RunOutcome, RunStatus, StatusSnapshot,
};
use std::{sync::Arc, time::Duration};
use tokio::{
    sync::{mpsc, oneshot},
    time::sleep,
};

const AUTH_RETRY_DELAY: Duration = Duration::from_secs(1);
const REBOOT_GRACE_PERIOD: Duration = Duration::from_millis(150_000);
const PAUSE_DURATION: Duration = Duration::from_secs(PAUSE_MINUTES as u64 * 60);
const EVENT_QUEUE_SIZE: usize = 32;

enum Event {
    Tick,
    Polled(Result<String>),
    PauseElapsed(u64),
    RebootElapsed(u64),
    Stop(oneshot::Sender<()>),
    Pause(oneshot::Sender<()>),
    Restart(oneshot::Sender<Result<(), RestartRejected>>),
    Snapshot(oneshot::Sender<StatusSnapshot>),
}

pub struct Controller<C> {
    state: ControllerState,
    client: Arc<C>,
    check_interval: Duration,
    events_tx: mpsc::Sender<Event>,
    events_rx: mpsc::Receiver<Event>,
}

/// Cloneable access to a running [`Controller`]
#[derive(Clone)]
pub struct ControllerHandle {
    events: mpsc::Sender<Event>,
}

impl<C> Controller<C>
where
    C: RouterClient + Send + Sync + 'static,
{
    pub fn new(
        state: ControllerState,
        client: C,
        check_interval: Duration,
    ) -> (Self, ControllerHandle) {
        let (events_tx, events_rx) = mpsc::channel(EVENT_QUEUE_SIZE);
        let handle = ControllerHandle {
            events: events_tx.clone(),
        };

        let controller = Controller {
            state,
            client: Arc::new(client),
            check_interval,
            events_tx,
            events_rx,
        };

        (controller, handle)
    }

    /// Poll immediately, then process events forever
    pub async fn run(mut self) {
        self.tick();

        while let Some(event) = self.events_rx.recv().await {
            self.handle(event);
        }
    }

    fn handle(&mut self, event: Event) {
        match event {
            Event::Tick => self.tick(),
            Event::Polled(page) => self.polled(page),
            Event::PauseElapsed(generation) => {
                self.state.pause_elapsed(generation);
            }
            Event::RebootElapsed(generation) => {
                self.state.reboot_elapsed(generation);
            }
            Event::Stop(reply) => {
                self.state.stop();
                let _ = reply.send(());
            }
            Event::Pause(reply) => {
                let generation = self.state.pause();
                self.schedule(PAUSE_DURATION, Event::PauseElapsed(generation));
                let _ = reply.send(());
            }
            Event::Restart(reply) => {
                let _ = reply.send(self.state.restart());
            }
            Event::Snapshot(reply) => {
                let _ = reply.send(self.state.snapshot());
            }
        }
    }

    fn tick(&mut self) {
        match self.state.begin_cycle() {
            CycleStart::Skipped => self.schedule(self.check_interval, Event::Tick),
            CycleStart::Fetch => self.fetch(),
        }
    }

    fn fetch(&self) {
        let client = self.client.clone();
        let events = self.events_tx.clone();

        tokio::spawn(async move {
            let page = client.status_page().await;
            if events.send(Event::Polled(page)).await.is_err() {
                error!("failed to deliver router answer: controller gone");
            }
        });
    }

    fn polled(&mut self, page: Result<String>) {
        let effects = self.state.complete_cycle(page);

        if effects.prime {
            self.prime();
        }

        if let Some(generation) = effects.reboot {
            self.reboot();
            self.schedule(REBOOT_GRACE_PERIOD, Event::RebootElapsed(generation));
        }

        let delay = match effects.next_tick {
            NextTick::Interval => self.check_interval,
            NextTick::AuthRetry => AUTH_RETRY_DELAY,
        };
        self.schedule(delay, Event::Tick);
    }

    fn prime(&self) {
        let client = self.client.clone();

        tokio::spawn(async move {
            if let Err(e) = client.prime().await {
                warn!("priming fetch failed: {e:#}");
            }
        });
    }

    fn reboot(&self) {
        let client = self.client.clone();

        tokio::spawn(async move {
            match client.reboot().await {
                Ok(()) => debug!("reboot command accepted"),
                Err(e) => error!("reboot command failed: {e:#}"),
            }
        });
    }

    fn schedule(&self, delay: Duration, event: Event) {
        let events = self.events_tx.clone();

        tokio::spawn(async move {
            sleep(delay).await;
            if events.send(event).await.is_err() {
                error!("failed to deliver scheduled event: controller gone");
            }
        });
    }
}

impl ControllerHandle {
    pub async fn stop(&self) -> Result<()> {
        self.request(Event::Stop).await
    }

    pub async fn pause(&self) -> Result<()> {
        self.request(Event::Pause).await
    }

    /// Resume from STOPPED or PAUSED; the inner error tells why it was refused
    pub async fn restart(&self) -> Result<Result<(), RestartRejected>> {
        self.request(Event::Restart).await
    }

    pub async fn snapshot(&self) -> Result<StatusSnapshot> {
        self.request(Event::Snapshot).await
    }

    async fn request<T>(&self, event: impl FnOnce(oneshot::Sender<T>) -> Event) -> Result<T> {
        let (reply_tx, reply_rx) = oneshot::channel();

        self.events
            .send(event(reply_tx))
            .await
            .map_err(|_| anyhow!("failed to reach controller: not running"))?;

        reply_rx.await.context("controller dropped the request")
    }
}
