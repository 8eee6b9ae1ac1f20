use crate::boundary::{BoundaryAssets, BoundaryRepository, BoundarySource};
use crate::config::AppConfig;
use crate::error::SessionClosed;
use crate::stats::{HttpStatsSource, StatsAggregateClient, StatsSource};
use crate::types::Filters;
use crate::view::{Command, Frame, MapEvent, MapView};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::debug;

/// Outbound signals of the overlay, implemented by whatever embeds it.
pub trait MapHost: Send + 'static {
    fn invalidate_size(&mut self) {}

    fn close(&mut self);

    fn navigate(&mut self, postal_code: &str);
}

#[derive(Clone)]
pub struct SessionHandle {
    events: mpsc::UnboundedSender<MapEvent>,
    frames: watch::Receiver<Frame>,
}

impl SessionHandle {
    pub fn send(&self, event: MapEvent) -> Result<(), SessionClosed> {
        self.events.send(event).map_err(|_| SessionClosed)
    }

    pub fn frame(&self) -> Frame {
        self.frames.borrow().clone()
    }

    /// Waits for the first published frame matching `predicate`, including the current one.
    pub async fn wait_for(&mut self, predicate: impl Fn(&Frame) -> bool) -> Result<Frame, SessionClosed> {
        loop {
            {
                let frame = self.frames.borrow_and_update();
                if predicate(&frame) {
                    return Ok(frame.clone());
                }
            }
            self.frames.changed().await.map_err(|_| SessionClosed)?;
        }
    }

    /// Waits until the view is ready and nothing is loading.
    pub async fn settled(&mut self) -> Result<Frame, SessionClosed> {
        self.wait_for(Frame::is_settled).await
    }
}

pub struct MapSession<B, S, H> {
    view: MapView,
    boundaries: Arc<BoundaryRepository<B>>,
    stats: Arc<StatsAggregateClient<S>>,
    host: H,
    frames: watch::Sender<Frame>,
    resize_timer: Option<JoinHandle<()>>,
}

impl<B, S, H> MapSession<B, S, H>
where
    B: BoundarySource + 'static,
    S: StatsSource + 'static,
    H: MapHost,
{
    /// Starts the loop on the current runtime. It stops, handing back the host,
    /// once every [`SessionHandle`] has been dropped.
    pub fn spawn(
        view: MapView,
        boundaries: Arc<BoundaryRepository<B>>,
        stats: Arc<StatsAggregateClient<S>>,
        host: H,
    ) -> (SessionHandle, JoinHandle<H>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (frames_tx, frames_rx) = watch::channel(view.frame());
        let session = MapSession {
            view,
            boundaries,
            stats,
            host,
            frames: frames_tx,
            resize_timer: None,
        };
        let task = tokio::spawn(session.run(events_rx));
        let handle = SessionHandle {
            events: events_tx,
            frames: frames_rx,
        };
        (handle, task)
    }

    async fn run(mut self, mut inbox: mpsc::UnboundedReceiver<MapEvent>) -> H {
        let (results_tx, mut results) = mpsc::unbounded_channel();

        loop {
            let event = tokio::select! {
                event = inbox.recv() => match event {
                    Some(event) => event,
                    None => break,
                },
                Some(event) = results.recv() => event,
            };

            for command in self.view.handle(event) {
                self.execute(command, &results_tx);
            }
            self.frames.send_replace(self.view.frame());
        }

        if let Some(timer) = self.resize_timer.take() {
            timer.abort();
        }
        debug!("Map session stopped");
        self.host
    }

    fn execute(&mut self, command: Command, results: &mpsc::UnboundedSender<MapEvent>) {
        match command {
            Command::ScheduleResize { ticket, delay } => {
                if let Some(previous) = self.resize_timer.take() {
                    previous.abort();
                }
                let results = results.clone();
                self.resize_timer = Some(tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    let _ = results.send(MapEvent::ResizeElapsed { ticket });
                }));
            }
            Command::CancelResize { ticket } => {
                if let Some(timer) = self.resize_timer.take() {
                    debug!("Cancelling resize timer {}", ticket);
                    timer.abort();
                }
            }
            Command::InvalidateSize => self.host.invalidate_size(),
            Command::LoadBoundaries { generation, city } => {
                let repository = self.boundaries.clone();
                let results = results.clone();
                tokio::spawn(async move {
                    let result = repository.load(&city).await;
                    let _ = results.send(MapEvent::BoundariesLoaded { generation, result });
                });
            }
            Command::FetchStats { generation, filters } => {
                let client = self.stats.clone();
                let results = results.clone();
                tokio::spawn(async move {
                    let stats = Arc::new(client.fetch(&filters).await);
                    let _ = results.send(MapEvent::StatsLoaded { generation, stats });
                });
            }
            Command::Close => self.host.close(),
            Command::Navigate { postal_code } => self.host.navigate(&postal_code),
        }
    }
}

pub type LiveSession<H> = MapSession<BoundaryAssets, HttpStatsSource, H>;

pub fn spawn_live<H: MapHost>(
    config: &AppConfig,
    filters: Filters,
    host: H,
) -> anyhow::Result<(SessionHandle, JoinHandle<H>)> {
    let catalog = config.catalog()?;
    let boundaries = Arc::new(BoundaryRepository::new(
        BoundaryAssets::from_base(&config.map.geo_base),
        &catalog,
    ));
    let stats = Arc::new(StatsAggregateClient::new(HttpStatsSource::new(&config.map.api_base)));
    let view = MapView::new(catalog, filters, Duration::from_millis(config.map.resize_delay_ms));
    Ok(LiveSession::spawn(view, boundaries, stats, host))
}
