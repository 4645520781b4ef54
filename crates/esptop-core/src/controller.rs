//! The dashboard loop.
//!
//! Each iteration: honour quit, follow the pause flag, pull at most one line
//! from the link (bounded wait) when running, fold it into state and
//! history, then build and submit a full view. Rendering happens on every
//! iteration whether or not data arrived, so the screen never freezes.
//!
//! When a read fails after startup the controller enters
//! [`Phase::Disconnected`], keeps rendering the last good data, and retries
//! [`LineSource::reconnect`] every `reconnect_interval`.

use std::io;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::history::Histories;
use crate::input::SharedFlags;
use crate::panels::{DashboardView, build_view};
use crate::rate::{RateEstimator, UPLOAD_TICK_SECS};
use crate::record::parse_record;
use crate::state::{DashboardState, LinkInfo, Phase};
use crate::transport::{LineSource, TransportError};

/// Receives a freshly built view for display.
pub trait Renderer {
    fn submit(&mut self, view: &DashboardView) -> io::Result<()>;
}

/// Source of monotonic time. Swappable so tests can control the clock.
pub trait Clock {
    fn now(&self) -> Instant;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    #[error("render failed: {0}")]
    Render(#[source] io::Error),
}

/// Loop timing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControllerConfig {
    /// Minimum time between iterations (render cadence).
    pub tick: Duration,
    /// Pause between reconnect attempts while disconnected.
    pub reconnect_interval: Duration,
    /// Seconds each upload sample is assumed to cover.
    pub upload_tick_secs: f64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            tick: Duration::from_millis(50),
            reconnect_interval: Duration::from_secs(2),
            upload_tick_secs: UPLOAD_TICK_SECS,
        }
    }
}

/// Owns the dashboard state and drives read → parse → estimate → render.
pub struct DashboardController<S, R, C = SystemClock> {
    source: S,
    renderer: R,
    clock: C,
    flags: Arc<SharedFlags>,
    state: DashboardState,
    histories: Histories,
    config: ControllerConfig,
    last_reconnect: Option<Instant>,
}

impl<S: LineSource, R: Renderer> DashboardController<S, R, SystemClock> {
    /// Acquire the link with `open` and start in [`Phase::Running`].
    ///
    /// Failure to acquire is fatal and returned to the caller.
    pub fn connect(
        open: impl FnOnce() -> Result<S, TransportError>,
        renderer: R,
        flags: Arc<SharedFlags>,
        link: LinkInfo,
        config: ControllerConfig,
    ) -> Result<Self, TransportError> {
        Self::connect_with_clock(open, renderer, SystemClock, flags, link, config)
    }
}

impl<S: LineSource, R: Renderer, C: Clock> DashboardController<S, R, C> {
    pub fn connect_with_clock(
        open: impl FnOnce() -> Result<S, TransportError>,
        renderer: R,
        clock: C,
        flags: Arc<SharedFlags>,
        link: LinkInfo,
        config: ControllerConfig,
    ) -> Result<Self, TransportError> {
        log::info!("connecting to {} at {} baud", link.port, link.baud);
        let source = match open() {
            Ok(source) => source,
            Err(e) => {
                log::error!("{}: {e}; shutting down", Phase::Connecting);
                return Err(e);
            }
        };

        let start = clock.now();
        let rates = RateEstimator::with_upload_tick(start, config.upload_tick_secs);
        let mut controller = Self {
            source,
            renderer,
            clock,
            flags,
            state: DashboardState::with_rates(link, start, rates),
            histories: Histories::default(),
            config,
            last_reconnect: None,
        };
        controller.set_phase(Phase::Running);
        Ok(controller)
    }

    /// Run until quit is requested or rendering fails.
    pub fn run(&mut self) -> Result<(), ControllerError> {
        loop {
            let started = Instant::now();
            if !self.tick()? {
                break;
            }
            if let Some(rest) = self.config.tick.checked_sub(started.elapsed()) {
                thread::sleep(rest);
            }
        }
        log::info!(
            "stopped after {} records ({} parse errors, {} read errors, {} reconnects)",
            self.state.records_received,
            self.state.parse_errors,
            self.state.read_errors,
            self.state.reconnects
        );
        Ok(())
    }

    /// One loop iteration. Returns `false` once the dashboard is shutting down.
    pub fn tick(&mut self) -> Result<bool, ControllerError> {
        if self.flags.quit_requested() {
            self.set_phase(Phase::ShuttingDown);
            return Ok(false);
        }

        self.follow_pause_flag();

        if self.state.phase.reads_telemetry() {
            self.poll_link();
        } else if self.state.phase == Phase::Disconnected {
            self.try_reconnect();
        }

        let view = self.view();
        if let Err(e) = self.renderer.submit(&view) {
            self.set_phase(Phase::ShuttingDown);
            return Err(ControllerError::Render(e));
        }
        Ok(true)
    }

    /// Build the view for the current instant without touching state.
    pub fn view(&self) -> DashboardView {
        build_view(
            &self.state,
            &self.histories,
            self.flags.show_all_tasks(),
            self.clock.now(),
        )
    }

    pub fn state(&self) -> &DashboardState {
        &self.state
    }

    pub fn histories(&self) -> &Histories {
        &self.histories
    }

    pub fn phase(&self) -> Phase {
        self.state.phase
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    fn follow_pause_flag(&mut self) {
        let paused = self.flags.is_paused();
        match self.state.phase {
            Phase::Running if paused => self.set_phase(Phase::Paused),
            Phase::Paused if !paused => self.set_phase(Phase::Running),
            _ => {}
        }
    }

    fn poll_link(&mut self) {
        match self.source.read_line() {
            Ok(Some(line)) => {
                let arrived = self.clock.now();
                self.ingest(&line, arrived);
            }
            Ok(None) => {}
            Err(e) => {
                self.state.read_errors += 1;
                log::warn!("telemetry link lost: {e}");
                self.last_reconnect = Some(self.clock.now());
                self.set_phase(Phase::Disconnected);
            }
        }
    }

    fn ingest(&mut self, line: &[u8], arrived: Instant) {
        let record = match parse_record(line) {
            Ok(record) => record,
            Err(e) => {
                self.state.parse_errors += 1;
                log::debug!("dropped {}-byte line: {e}", line.len());
                return;
            }
        };

        let rates = &mut self.state.rates;
        let down = rates.record_download(line.len(), arrived);
        let up = rates.record_upload(record.tx_rate);
        self.histories.download.push(down);
        self.histories.upload.push(up);
        self.histories.cpu.push(record.cpu_percent());
        self.histories.memory.push(record.heap_percent());

        self.state.records_received += 1;
        self.state.record = Some(record);
        self.state.record_at = Some(arrived);
    }

    fn try_reconnect(&mut self) {
        let now = self.clock.now();
        let due = self.last_reconnect.is_none_or(|at| {
            now.saturating_duration_since(at) >= self.config.reconnect_interval
        });
        if !due {
            return;
        }
        self.last_reconnect = Some(now);

        match self.source.reconnect() {
            Ok(()) => {
                self.state.reconnects += 1;
                log::info!("telemetry link re-established");
                let next = if self.flags.is_paused() {
                    Phase::Paused
                } else {
                    Phase::Running
                };
                self.set_phase(next);
            }
            Err(e) => log::debug!("reconnect failed: {e}"),
        }
    }

    fn set_phase(&mut self, phase: Phase) {
        if self.state.phase != phase {
            log::info!("{} -> {}", self.state.phase, phase);
            self.state.phase = phase;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::Command;
    use crate::panels::PanelView;
    use std::cell::Cell;
    use std::collections::VecDeque;
    use std::rc::Rc;

    #[derive(Clone)]
    struct TestClock(Rc<Cell<Instant>>);

    impl TestClock {
        fn new() -> Self {
            Self(Rc::new(Cell::new(Instant::now())))
        }
        fn advance(&self, d: Duration) {
            self.0.set(self.0.get() + d);
        }
    }

    impl Clock for TestClock {
        fn now(&self) -> Instant {
            self.0.get()
        }
    }

    type Step = Result<Option<Vec<u8>>, TransportError>;

    #[derive(Default)]
    struct Scripted {
        steps: VecDeque<Step>,
        reads: usize,
        reconnect_ok: bool,
        reconnects: usize,
    }

    impl Scripted {
        fn lines(lines: &[&str]) -> Self {
            Self {
                steps: lines
                    .iter()
                    .map(|l| Ok(Some(format!("{l}\n").into_bytes())))
                    .collect(),
                ..Self::default()
            }
        }
    }

    impl LineSource for Scripted {
        fn read_line(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
            self.reads += 1;
            self.steps.pop_front().unwrap_or(Ok(None))
        }

        fn reconnect(&mut self) -> Result<(), TransportError> {
            self.reconnects += 1;
            if self.reconnect_ok {
                Ok(())
            } else {
                Err(TransportError::Closed)
            }
        }
    }

    #[derive(Default)]
    struct Recorder {
        views: Vec<DashboardView>,
        fail: bool,
    }

    impl Renderer for Recorder {
        fn submit(&mut self, view: &DashboardView) -> io::Result<()> {
            if self.fail {
                return Err(io::Error::other("terminal gone"));
            }
            self.views.push(view.clone());
            Ok(())
        }
    }

    fn link() -> LinkInfo {
        LinkInfo {
            port: "/dev/null".into(),
            baud: 115_200,
        }
    }

    fn controller(
        source: Scripted,
    ) -> (
        DashboardController<Scripted, Recorder, TestClock>,
        Arc<SharedFlags>,
        TestClock,
    ) {
        let flags = Arc::new(SharedFlags::new());
        let clock = TestClock::new();
        let c = DashboardController::connect_with_clock(
            || Ok(source),
            Recorder::default(),
            clock.clone(),
            Arc::clone(&flags),
            link(),
            ControllerConfig::default(),
        )
        .unwrap();
        (c, flags, clock)
    }

    #[test]
    fn failed_acquisition_is_returned() {
        let result = DashboardController::<Scripted, Recorder>::connect(
            || Err(TransportError::Closed),
            Recorder::default(),
            Arc::new(SharedFlags::new()),
            link(),
            ControllerConfig::default(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn connect_starts_running() {
        let (c, _, _) = controller(Scripted::default());
        assert_eq!(c.phase(), Phase::Running);
    }

    #[test]
    fn renders_even_without_data() {
        let (mut c, _, _) = controller(Scripted::default());
        for _ in 0..3 {
            assert!(c.tick().unwrap());
        }
        assert_eq!(c.renderer().views.len(), 3);
        assert!(c.renderer().views.iter().all(|v| v.cpu.is_waiting()));
        assert_eq!(c.state().parse_errors, 0);
    }

    #[test]
    fn good_line_updates_state_and_histories() {
        let (mut c, _, clock) = controller(Scripted::lines(&[
            r#"{"heap":163840,"cpu_mhz":240,"tx_rate":4}"#,
        ]));
        clock.advance(Duration::from_secs(1));
        c.tick().unwrap();
        let s = c.state();
        assert_eq!(s.records_received, 1);
        assert_eq!(s.record.as_ref().unwrap().heap, 163_840);
        assert_eq!(c.histories().cpu.snapshot(), vec![100.0]);
        assert_eq!(c.histories().memory.snapshot(), vec![50.0]);
        assert_eq!(c.histories().upload.snapshot(), vec![4.0]);
        assert_eq!(c.histories().download.len(), 1);
        assert!(c.renderer().views[0].cpu.ready().is_some());
    }

    #[test]
    fn bad_line_keeps_previous_record() {
        let (mut c, _, _) = controller(Scripted::lines(&[r#"{"heap":42}"#, r#"{"heap":"#]));
        c.tick().unwrap();
        let before = c.state().record.clone();
        c.tick().unwrap();
        assert_eq!(c.state().record, before);
        assert_eq!(c.state().parse_errors, 1);
        assert_eq!(c.state().records_received, 1);
        assert_eq!(c.histories().download.len(), 1);
    }

    #[test]
    fn paused_does_not_read() {
        let (mut c, flags, _) = controller(Scripted::lines(&[r#"{"heap":1}"#]));
        flags.apply(Command::TogglePause);
        c.tick().unwrap();
        c.tick().unwrap();
        assert_eq!(c.phase(), Phase::Paused);
        assert_eq!(c.source().reads, 0);
        assert_eq!(c.renderer().views.len(), 2);
        assert_eq!(c.renderer().views[1].cpu, PanelView::Paused);

        flags.apply(Command::TogglePause);
        c.tick().unwrap();
        assert_eq!(c.phase(), Phase::Running);
        assert_eq!(c.source().reads, 1);
        assert_eq!(c.state().records_received, 1);
    }

    #[test]
    fn quit_stops_the_loop() {
        let (mut c, flags, _) = controller(Scripted::default());
        flags.apply(Command::Quit);
        assert!(!c.tick().unwrap());
        assert_eq!(c.phase(), Phase::ShuttingDown);
        assert!(c.renderer().views.is_empty());
        c.run().unwrap();
    }

    #[test]
    fn read_error_disconnects_and_reconnects_on_interval() {
        let mut source = Scripted::default();
        source
            .steps
            .push_back(Err(TransportError::Read(io::Error::other("unplugged"))));
        let (mut c, _, clock) = controller(source);

        c.tick().unwrap();
        assert_eq!(c.phase(), Phase::Disconnected);
        assert_eq!(c.state().read_errors, 1);

        // Not yet due.
        c.tick().unwrap();
        assert_eq!(c.source().reconnects, 0);

        clock.advance(Duration::from_secs(2));
        c.tick().unwrap();
        assert_eq!(c.source().reconnects, 1);
        assert_eq!(c.phase(), Phase::Disconnected);

        c.source.reconnect_ok = true;
        clock.advance(Duration::from_secs(2));
        c.tick().unwrap();
        assert_eq!(c.phase(), Phase::Running);
        assert_eq!(c.state().reconnects, 1);
        assert_eq!(c.renderer().views.len(), 4);
        assert_eq!(c.renderer().views[2].footer.reconnects, 0);
        assert_eq!(c.renderer().views[3].footer.reconnects, 1);
    }

    #[test]
    fn reconnect_while_paused_lands_in_paused() {
        let mut source = Scripted {
            reconnect_ok: true,
            ..Scripted::default()
        };
        source.steps.push_back(Err(TransportError::Closed));
        let (mut c, flags, clock) = controller(source);
        c.tick().unwrap();
        assert_eq!(c.phase(), Phase::Disconnected);

        flags.apply(Command::TogglePause);
        clock.advance(Duration::from_secs(3));
        c.tick().unwrap();
        assert_eq!(c.phase(), Phase::Paused);
    }

    #[test]
    fn render_failure_is_fatal() {
        let (mut c, _, _) = controller(Scripted::default());
        c.renderer.fail = true;
        assert!(matches!(c.tick(), Err(ControllerError::Render(_))));
        assert_eq!(c.phase(), Phase::ShuttingDown);
    }

    #[test]
    fn task_filter_flag_reaches_the_view() {
        let (mut c, flags, _) = controller(Scripted::lines(&[
            r#"{"tasks":[{"name":"IDLE0"},{"name":"WorkerA"}]}"#,
        ]));
        c.tick().unwrap();
        assert_eq!(c.renderer().views[0].tasks.ready().unwrap().rows.len(), 1);
        flags.apply(Command::ToggleAllTasks);
        c.tick().unwrap();
        assert_eq!(c.renderer().views[1].tasks.ready().unwrap().rows.len(), 2);
    }
}
