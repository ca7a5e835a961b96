//! The chart refresh loop
//!
//! `ChartSync` owns the plotted state and a recurring timer task. Each cycle
//! fetches the feed, builds a complete replacement series set, then swaps it
//! in and redraws under one lock, so the chart never observes series that are
//! out of step with the label axis.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::api::datafeed::{DataSource, FeedError};
use crate::config::SyncConfig;
use crate::models::chart::{ChartDataError, SeriesSet};

/// A widget the loop pushes freshly built series into
pub trait RenderSurface: Send {
    fn redraw(&mut self, series: &SeriesSet) -> Result<(), RenderError>;
}

/// Drawing failure in a render surface
#[derive(Debug, Clone, Error)]
pub enum RenderError {
    #[error("failed to draw chart: {0}")]
    Draw(String),
}

/// One refresh cycle's failure modes
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Feed(#[from] FeedError),
    #[error(transparent)]
    Data(#[from] ChartDataError),
    #[error(transparent)]
    Render(#[from] RenderError),
    /// A previous cycle is still running; this one was skipped, not queued
    #[error("refresh skipped: previous cycle still in flight")]
    InFlight,
}

/// Series buffers plus the surface they are drawn on, mutated only under the
/// one lock in `refresh_inner`.
struct ChartState {
    series: SeriesSet,
    surface: Box<dyn RenderSurface>,
}

struct SyncShared {
    config: SyncConfig,
    source: Box<dyn DataSource>,
    chart: Mutex<ChartState>,
    in_flight: AtomicBool,
    stop: Notify,
}

/// A periodically refreshed chart, owned by the caller.
///
/// Construct with a data source and a render surface, then `start()` the
/// timer. Instances are independent; nothing global is shared between charts.
pub struct ChartSync {
    shared: Arc<SyncShared>,
    task: Option<JoinHandle<()>>,
}

impl ChartSync {
    pub fn new(
        config: SyncConfig,
        source: Box<dyn DataSource>,
        surface: Box<dyn RenderSurface>,
    ) -> Self {
        let series = SeriesSet::empty(&config.series);
        Self {
            shared: Arc::new(SyncShared {
                config,
                source,
                chart: Mutex::new(ChartState { series, surface }),
                in_flight: AtomicBool::new(false),
                stop: Notify::new(),
            }),
            task: None,
        }
    }

    /// Spawn the periodic refresh task. Starting an already started sync is
    /// a no-op.
    pub fn start(&mut self) {
        if self.task.is_some() {
            debug!("Refresh loop already running");
            return;
        }
        self.task = Some(tokio::spawn(run_loop(self.shared.clone())));
    }

    /// Signal the refresh task and wait for it to finish.
    ///
    /// A cycle already in progress completes first; no timer outlives this
    /// call.
    pub async fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            self.shared.stop.notify_one();
            if let Err(e) = task.await {
                warn!("Refresh task ended abnormally: {}", e);
            }
        }
    }

    /// Run one refresh cycle outside the timer
    pub async fn refresh_now(&self) -> Result<(), SyncError> {
        self.shared.refresh().await
    }

    /// Clone of the currently plotted state
    pub fn snapshot(&self) -> SeriesSet {
        self.shared.chart.lock().unwrap().series.clone()
    }
}

async fn run_loop(shared: Arc<SyncShared>) {
    info!(
        "Refresh loop started: {} every {:?}",
        shared.config.endpoint, shared.config.interval
    );

    let mut ticker = time::interval(shared.config.interval);
    // A fetch overrunning its window must not burst; the late ticks are dropped
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    // The first tick completes immediately and backs the eager initial render
    ticker.tick().await;
    if shared.config.render_immediately {
        shared.refresh_logged().await;
    }

    loop {
        tokio::select! {
            biased;
            _ = shared.stop.notified() => break,
            _ = ticker.tick() => shared.refresh_logged().await,
        }
    }

    info!("Refresh loop stopped");
}

impl SyncShared {
    async fn refresh_logged(&self) {
        match self.refresh().await {
            Ok(()) => {}
            Err(SyncError::InFlight) => debug!("Tick skipped: refresh already in flight"),
            Err(e) => warn!("Refresh cycle dropped: {}", e),
        }
    }

    async fn refresh(&self) -> Result<(), SyncError> {
        if self.in_flight.swap(true, Ordering::SeqCst) {
            return Err(SyncError::InFlight);
        }
        let result = self.refresh_inner().await;
        self.in_flight.store(false, Ordering::SeqCst);
        result
    }

    /// Fetch, build the full replacement set, then swap and redraw under one
    /// lock. Nothing is mutated until the new set has validated completely,
    /// so a failed cycle leaves the previous state untouched.
    async fn refresh_inner(&self) -> Result<(), SyncError> {
        let records = self.source.fetch_data().await?;
        let next = SeriesSet::from_records(&self.config.series, &records)?;

        let mut chart = self.chart.lock().unwrap();
        chart.series = next;
        let ChartState { series, surface } = &mut *chart;
        surface.redraw(series)?;

        info!(
            "Chart refreshed: {} points, latest {}",
            series.len(),
            series.latest_label().unwrap_or("-")
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use async_trait::async_trait;

    use crate::api::datafeed::DataPoint;
    use crate::config::{full_series, ratio_series};
    use crate::models::chart::SeriesSpec;

    fn point(date: &str, ratio: f64) -> DataPoint {
        DataPoint {
            date: date.to_string(),
            ratio,
            btc_price: None,
            sqm_price: None,
        }
    }

    fn full_point(date: &str, ratio: f64, btc: f64, sqm: f64) -> DataPoint {
        DataPoint {
            date: date.to_string(),
            ratio,
            btc_price: Some(btc),
            sqm_price: Some(sqm),
        }
    }

    fn test_config(
        interval: Duration,
        render_immediately: bool,
        series: Vec<SeriesSpec>,
    ) -> SyncConfig {
        SyncConfig {
            endpoint: "http://feed.test/data".to_string(),
            interval,
            render_immediately,
            series,
        }
    }

    /// Returns the scripted responses in order, then empty payloads
    struct ScriptedSource {
        responses: Mutex<VecDeque<Result<Vec<DataPoint>, FeedError>>>,
        calls: Arc<AtomicUsize>,
    }

    impl ScriptedSource {
        fn new(
            responses: Vec<Result<Vec<DataPoint>, FeedError>>,
        ) -> (Self, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            (
                Self {
                    responses: Mutex::new(responses.into()),
                    calls: calls.clone(),
                },
                calls,
            )
        }
    }

    #[async_trait]
    impl DataSource for ScriptedSource {
        async fn fetch_data(&self) -> Result<Vec<DataPoint>, FeedError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(Vec::new()))
        }
    }

    /// Blocks inside the fetch until released, to hold a cycle in flight
    struct GatedSource {
        gate: Arc<Notify>,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl DataSource for GatedSource {
        async fn fetch_data(&self) -> Result<Vec<DataPoint>, FeedError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.gate.notified().await;
            Ok(vec![point("d1", 1.0)])
        }
    }

    struct CountingSurface {
        redraws: Arc<AtomicUsize>,
    }

    impl CountingSurface {
        fn new() -> (Self, Arc<AtomicUsize>) {
            let redraws = Arc::new(AtomicUsize::new(0));
            (
                Self {
                    redraws: redraws.clone(),
                },
                redraws,
            )
        }
    }

    impl RenderSurface for CountingSurface {
        fn redraw(&mut self, _series: &SeriesSet) -> Result<(), RenderError> {
            self.redraws.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    /// Let the spawned refresh task run under the paused clock
    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn refresh_replaces_series_in_feed_order() {
        let (source, _) = ScriptedSource::new(vec![Ok(vec![
            point("2023-01", 1.1),
            point("2023-02", 1.3),
        ])]);
        let (surface, redraws) = CountingSurface::new();
        let sync = ChartSync::new(
            test_config(Duration::from_secs(60), false, ratio_series()),
            Box::new(source),
            Box::new(surface),
        );

        sync.refresh_now().await.unwrap();

        let snapshot = sync.snapshot();
        assert_eq!(snapshot.labels, vec!["2023-01", "2023-02"]);
        assert_eq!(snapshot.series[0].data, vec![1.1, 1.3]);
        assert_eq!(redraws.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn refresh_rebuilds_instead_of_appending() {
        let (source, _) = ScriptedSource::new(vec![
            Ok(vec![
                point("2023-01", 1.1),
                point("2023-02", 1.3),
                point("2023-03", 1.5),
            ]),
            Ok(vec![point("2023-02", 1.3), point("2023-03", 1.6)]),
        ]);
        let (surface, _) = CountingSurface::new();
        let sync = ChartSync::new(
            test_config(Duration::from_secs(60), false, ratio_series()),
            Box::new(source),
            Box::new(surface),
        );

        sync.refresh_now().await.unwrap();
        sync.refresh_now().await.unwrap();

        let snapshot = sync.snapshot();
        assert_eq!(snapshot.labels, vec!["2023-02", "2023-03"]);
        assert_eq!(snapshot.series[0].data, vec![1.3, 1.6]);
    }

    #[tokio::test]
    async fn same_payload_twice_is_idempotent() {
        let payload = vec![full_point("d1", 2.0, 30000.0, 4000.0)];
        let (source, _) =
            ScriptedSource::new(vec![Ok(payload.clone()), Ok(payload)]);
        let (surface, _) = CountingSurface::new();
        let sync = ChartSync::new(
            test_config(Duration::from_secs(60), false, full_series()),
            Box::new(source),
            Box::new(surface),
        );

        sync.refresh_now().await.unwrap();
        let first = sync.snapshot();
        sync.refresh_now().await.unwrap();
        let second = sync.snapshot();

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn failed_fetch_keeps_previous_state() {
        let (source, _) = ScriptedSource::new(vec![
            Ok(vec![point("2023-01", 1.1)]),
            Err(FeedError::Network("connection reset".to_string())),
        ]);
        let (surface, redraws) = CountingSurface::new();
        let sync = ChartSync::new(
            test_config(Duration::from_secs(60), false, ratio_series()),
            Box::new(source),
            Box::new(surface),
        );

        sync.refresh_now().await.unwrap();
        let before = sync.snapshot();

        let result = sync.refresh_now().await;
        assert!(matches!(result, Err(SyncError::Feed(_))));

        assert_eq!(sync.snapshot(), before);
        assert_eq!(redraws.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn malformed_record_keeps_previous_state() {
        let (source, _) = ScriptedSource::new(vec![
            Ok(vec![full_point("d1", 2.0, 30000.0, 4000.0)]),
            // Second payload is missing btc_price for a configured series
            Ok(vec![point("d2", 2.1)]),
        ]);
        let (surface, _) = CountingSurface::new();
        let sync = ChartSync::new(
            test_config(Duration::from_secs(60), false, full_series()),
            Box::new(source),
            Box::new(surface),
        );

        sync.refresh_now().await.unwrap();
        let before = sync.snapshot();

        let result = sync.refresh_now().await;
        assert!(matches!(result, Err(SyncError::Data(_))));
        assert_eq!(sync.snapshot(), before);
    }

    #[tokio::test(start_paused = true)]
    async fn eager_start_fetches_once_per_window() {
        let (source, calls) = ScriptedSource::new(vec![]);
        let (surface, _) = CountingSurface::new();
        let mut sync = ChartSync::new(
            test_config(Duration::from_secs(60), true, ratio_series()),
            Box::new(source),
            Box::new(surface),
        );

        sync.start();
        settle().await;
        assert_eq!(calls.load(Ordering::SeqCst), 1, "one immediate fetch at start");

        for expected in 2..=4 {
            time::advance(Duration::from_secs(60)).await;
            settle().await;
            assert_eq!(calls.load(Ordering::SeqCst), expected);
        }

        sync.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn without_eager_start_first_fetch_waits_a_full_window() {
        let (source, calls) = ScriptedSource::new(vec![]);
        let (surface, _) = CountingSurface::new();
        let mut sync = ChartSync::new(
            test_config(Duration::from_secs(60), false, ratio_series()),
            Box::new(source),
            Box::new(surface),
        );

        sync.start();
        settle().await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        time::advance(Duration::from_secs(59)).await;
        settle().await;
        assert_eq!(calls.load(Ordering::SeqCst), 0, "window not elapsed yet");

        time::advance(Duration::from_secs(1)).await;
        settle().await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        sync.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn stop_halts_ticking() {
        let (source, calls) = ScriptedSource::new(vec![]);
        let (surface, _) = CountingSurface::new();
        let mut sync = ChartSync::new(
            test_config(Duration::from_secs(60), false, ratio_series()),
            Box::new(source),
            Box::new(surface),
        );

        sync.start();
        settle().await;
        time::advance(Duration::from_secs(60)).await;
        settle().await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        sync.stop().await;

        time::advance(Duration::from_secs(180)).await;
        settle().await;
        assert_eq!(calls.load(Ordering::SeqCst), 1, "no fetches after stop");
    }

    #[tokio::test]
    async fn overlapping_refresh_is_skipped() {
        let gate = Arc::new(Notify::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let source = GatedSource {
            gate: gate.clone(),
            calls: calls.clone(),
        };
        let (surface, _) = CountingSurface::new();
        let sync = Arc::new(ChartSync::new(
            test_config(Duration::from_secs(60), false, ratio_series()),
            Box::new(source),
            Box::new(surface),
        ));

        let background = {
            let sync = sync.clone();
            tokio::spawn(async move { sync.refresh_now().await })
        };

        // Wait until the first cycle is parked inside its fetch
        while calls.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }

        let second = sync.refresh_now().await;
        assert!(matches!(second, Err(SyncError::InFlight)));

        gate.notify_one();
        background.await.unwrap().unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1, "skipped cycle never fetched");
        assert_eq!(sync.snapshot().labels, vec!["d1"]);
    }
}
