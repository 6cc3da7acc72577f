//! Single flight processing lifecycle.
//!
//! [ProcessingSession] validates a configuration, prepares the product
//! files, assembles the engine option set and invokes the engine, on a
//! background thread so the caller never blocks on the computation.
//! Lifecycle and progress are delivered as one ordered event stream
//! over a channel; the run may be cancelled cooperatively at any
//! milestone before the engine call. Only one run is in flight at a
//! time: a start request during an active run is rejected, never queued.
use crate::config::ProcessingConfiguration;
use crate::engine::{Engine, EngineOptions};
use crate::path::engine_path;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// A run is already in flight: not queued, try again once it resolved
    #[error("a processing run is already in flight")]
    Busy,
}

/// Lifecycle states of one session
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub enum State {
    /// No run in flight (initial, and after every outcome)
    #[default]
    Idle,
    /// Checking configuration invariants
    Validating,
    /// Product file checks and option assembly
    Preparing,
    /// Engine invoked, computation in progress
    Running,
    /// Last run resolved successfully
    Succeeded,
    /// Last run failed
    Failed,
}

impl State {
    /// True while a run holds the session (start requests are rejected)
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Validating | Self::Preparing | Self::Running)
    }
}

/// Run resolution. Exactly one is produced per run.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Success,
    Failure(String),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::Success => write!(f, "PPP processing completed"),
            Self::Failure(reason) => write!(f, "PPP processing failed: {}", reason),
        }
    }
}

/// Ordered lifecycle event stream of one run: exactly one [Started],
/// progress milestones with non decreasing percentages closing at 100,
/// then exactly one [Finished].
///
/// [Started]: SessionEvent::Started
/// [Finished]: SessionEvent::Finished
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Started,
    Progress { percent: u8, message: String },
    Finished(Outcome),
}

/// Handle over one in flight run.
pub struct RunHandle {
    events: mpsc::Receiver<SessionEvent>,
    cancel: Arc<AtomicBool>,
    join: thread::JoinHandle<Outcome>,
}

impl RunHandle {
    /// The event stream, in emission order. Iterate (blocking) or
    /// poll with `try_recv` at the caller's own pace.
    pub fn events(&self) -> &mpsc::Receiver<SessionEvent> {
        &self.events
    }
    /// Requests cooperative cancellation. Honored at every milestone
    /// up to the engine invocation; once the engine call is made,
    /// the computation can no longer be aborted.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }
    /// Blocks until the run resolved, returning its outcome.
    pub fn wait(self) -> Outcome {
        self.join
            .join()
            .unwrap_or_else(|_| Outcome::Failure("processing thread panicked".to_string()))
    }
}

/// Single flight lifecycle controller. Reusable across runs, but
/// drives at most one at a time.
#[derive(Default)]
pub struct ProcessingSession {
    state: Arc<Mutex<State>>,
}

impl ProcessingSession {
    pub fn new() -> Self {
        Self::default()
    }
    /// Current lifecycle state
    pub fn state(&self) -> State {
        *self.state.lock().unwrap()
    }
    /// Starts one processing run on a background thread, consuming a
    /// read only snapshot of `cfg`. Returns immediately with a
    /// [RunHandle], or [Error::Busy] (without touching the in flight
    /// run) if one is already active.
    pub fn start<E: Engine + Send + 'static>(
        &self,
        cfg: ProcessingConfiguration,
        engine: E,
    ) -> Result<RunHandle, Error> {
        {
            let mut state = self.state.lock().unwrap();
            if state.is_active() {
                return Err(Error::Busy);
            }
            *state = State::Validating;
        }
        let (tx, rx) = mpsc::channel();
        let cancel = Arc::new(AtomicBool::new(false));
        let worker = Worker {
            cfg,
            tx,
            cancel: cancel.clone(),
            state: self.state.clone(),
            percent: 0,
        };
        let join = thread::spawn(move || worker.run(engine));
        Ok(RunHandle {
            events: rx,
            cancel,
            join,
        })
    }
}

struct Worker {
    cfg: ProcessingConfiguration,
    tx: mpsc::Sender<SessionEvent>,
    cancel: Arc<AtomicBool>,
    state: Arc<Mutex<State>>,
    percent: u8,
}

impl Worker {
    fn set_state(&self, state: State) {
        *self.state.lock().unwrap() = state;
    }
    fn emit(&self, event: SessionEvent) {
        // a dropped receiver only means nobody watches anymore
        let _ = self.tx.send(event);
    }
    fn progress(&mut self, percent: u8, message: String) {
        info!("{}", message);
        // monotonic, whatever milestone ordering bugs may creep in
        self.percent = self.percent.max(percent);
        self.emit(SessionEvent::Progress {
            percent: self.percent,
            message,
        });
    }
    fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    /// Full lifecycle of one run. Every path resolves in exactly one
    /// outcome; no panic escapes past this boundary.
    fn run<E: Engine>(mut self, engine: E) -> Outcome {
        self.emit(SessionEvent::Started);
        self.progress(0, "starting PPP processing".to_string());

        let outcome = match self.resolve(&engine) {
            Ok(_) => Outcome::Success,
            Err(reason) => Outcome::Failure(reason),
        };

        self.progress(100, outcome.to_string());
        self.set_state(if outcome.is_success() {
            State::Succeeded
        } else {
            State::Failed
        });
        self.emit(SessionEvent::Finished(outcome.clone()));
        outcome
    }

    fn resolve<E: Engine>(&mut self, engine: &E) -> Result<(), String> {
        // Validating: configuration invariants
        if let Err(e) = self.cfg.validate() {
            return Err(e.to_string());
        }
        if self.cancelled() {
            return Err("run cancelled".to_string());
        }

        // Preparing: product existence
        self.set_state(State::Preparing);
        self.progress(5, "checking product files".to_string());
        self.check_products();
        self.progress(10, "product files checked".to_string());

        let opts = self.configure();
        if self.cancelled() {
            return Err("run cancelled".to_string());
        }

        // windowing
        let window = if self.cfg.window_enabled {
            self.progress(
                20,
                format!("processing window: {:?} - {:?}", self.cfg.start, self.cfg.end),
            );
            Some((self.cfg.start, self.cfg.end))
        } else {
            self.progress(20, "processing the full observation span".to_string());
            None
        };
        if self.cfg.interval_s > 0.0 {
            self.progress(
                22,
                format!("processing interval: {:.1} s", self.cfg.interval_s),
            );
        }

        let inputs = self.register_inputs();
        // observation + one ephemeris source at the very least
        if inputs.len() < 2 {
            self.progress(50, "insufficient input files".to_string());
            return Err(
                "insufficient input files: observation and navigation/ephemeris required"
                    .to_string(),
            );
        }

        self.progress(
            45,
            format!("constellations: {}", self.cfg.nav_systems),
        );
        if self.cancelled() {
            return Err("run cancelled".to_string());
        }

        // Running: hand over to the engine. Blocking call, no abort
        // path from here on.
        self.set_state(State::Running);
        self.progress(50, "invoking PPP engine".to_string());
        let output = self
            .cfg
            .output
            .as_deref()
            .map(engine_path)
            .unwrap_or_default();
        let status = engine.run(window, self.cfg.interval_s, &opts, &inputs, &output);
        if status == 0 {
            self.progress(90, "PPP engine resolved".to_string());
            Ok(())
        } else {
            self.progress(90, format!("PPP engine failed, status code: {}", status));
            Err(format!("engine status code: {}", status))
        }
    }

    /// Stats every optional product. A missing optional product is
    /// dropped (field cleared) and processing carries on. The
    /// mandatory observation file is stat'ed too but a failure is only
    /// reported: the engine call itself will reject it. Local policy
    /// enforces presence as configured, not existence on disk.
    fn check_products(&mut self) {
        for (field, label) in [
            (&mut self.cfg.ephemeris, "precise ephemeris"),
            (&mut self.cfg.clock, "precise clock"),
            (&mut self.cfg.navigation, "navigation"),
            (&mut self.cfg.antenna, "antenna phase center"),
            (&mut self.cfg.dcb, "differential code bias"),
            (&mut self.cfg.erp, "earth rotation parameters"),
        ] {
            if let Some(path) = field {
                if !Path::new(path).exists() {
                    warn!("{} file \"{}\" not found: dropped", label, path);
                    *field = None;
                }
            }
        }
        if let Some(obs) = &self.cfg.observation {
            if !Path::new(obs).exists() {
                warn!("observation file \"{}\" not found", obs);
            }
        }
    }

    fn configure(&mut self) -> EngineOptions {
        self.progress(15, "configuring engine options".to_string());
        self.progress(16, format!("processing mode: {} PPP", self.cfg.mode));
        self.progress(
            17,
            format!("iteration cap: {}", self.cfg.max_iterations),
        );
        self.progress(
            18,
            format!("troposphere model: {}", self.cfg.troposphere),
        );
        self.progress(19, format!("ionosphere model: {}", self.cfg.ionosphere));
        EngineOptions::from_config(&self.cfg)
    }

    /// Input file list in the engine's expected order: observation,
    /// navigation, precise orbits, precise clocks. Only present
    /// products, in the engine path convention.
    fn register_inputs(&mut self) -> Vec<String> {
        let mut inputs = Vec::with_capacity(4);
        let products = [
            (25, self.cfg.observation.clone(), "observation"),
            (30, self.cfg.navigation.clone(), "navigation"),
            (35, self.cfg.ephemeris.clone(), "precise ephemeris"),
            (40, self.cfg.clock.clone(), "precise clock"),
        ];
        for (percent, field, label) in products {
            if let Some(path) = field {
                inputs.push(engine_path(&path));
                self.progress(percent, format!("registered {} file \"{}\"", label, path));
            }
        }
        inputs
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::engine::MockEngine;
    use hifitime::prelude::Epoch;

    /// Scratch directory with a real observation + navigation pair:
    /// optional products are stat'ed during Preparing, so sessions
    /// meant to reach the engine need them on disk.
    fn fixture(tag: &str) -> (std::path::PathBuf, ProcessingConfiguration) {
        let dir = std::env::temp_dir().join(format!(
            "gnss-ppp-session-{}-{}",
            std::process::id(),
            tag
        ));
        std::fs::create_dir_all(&dir).unwrap();
        let obs = dir.join("roam.obs");
        let nav = dir.join("brdc.nav");
        for f in [&obs, &nav] {
            std::fs::write(f, b"").unwrap();
        }
        let mut cfg = ProcessingConfiguration::default();
        cfg.set_observation_file(obs.to_str().unwrap());
        cfg.set_navigation_file(nav.to_str().unwrap());
        cfg.set_output_file(dir.join("out.pos").to_str().unwrap());
        (dir, cfg)
    }

    fn drain(handle: RunHandle) -> (Vec<SessionEvent>, Outcome) {
        let events: Vec<SessionEvent> = handle.events().iter().collect();
        let outcome = handle.wait();
        (events, outcome)
    }

    #[test]
    fn engine_success_resolves_session() {
        let (dir, cfg) = fixture("success");
        let session = ProcessingSession::new();
        let handle = session.start(cfg.clone(), MockEngine::with_status(0)).unwrap();
        let (events, outcome) = drain(handle);
        assert_eq!(outcome, Outcome::Success);
        assert_eq!(events.first(), Some(&SessionEvent::Started));
        assert!(matches!(events.last(), Some(SessionEvent::Finished(o)) if o.is_success()));
        assert_eq!(session.state(), State::Succeeded);
        // reusable: a new run may start
        let handle = session.start(cfg, MockEngine::with_status(0)).unwrap();
        let _ = drain(handle);
        let _ = std::fs::remove_dir_all(&dir);
    }
    #[test]
    fn engine_failure_code_is_surfaced() {
        let (dir, cfg) = fixture("status-2");
        let session = ProcessingSession::new();
        let handle = session.start(cfg, MockEngine::with_status(2)).unwrap();
        let (events, outcome) = drain(handle);
        match &outcome {
            Outcome::Failure(reason) => assert!(reason.contains('2'), "{}", reason),
            _ => panic!("expected failure"),
        }
        assert_eq!(session.state(), State::Failed);
        let finishes = events
            .iter()
            .filter(|ev| matches!(ev, SessionEvent::Finished(_)))
            .count();
        assert_eq!(finishes, 1);
        let _ = std::fs::remove_dir_all(&dir);
    }
    #[test]
    fn progress_is_monotonic_and_closes_at_100() {
        let (dir, cfg) = fixture("progress");
        let session = ProcessingSession::new();
        let handle = session.start(cfg, MockEngine::with_status(0)).unwrap();
        let (events, _) = drain(handle);
        let _ = std::fs::remove_dir_all(&dir);
        let percents: Vec<u8> = events
            .iter()
            .filter_map(|ev| match ev {
                SessionEvent::Progress { percent, .. } => Some(*percent),
                _ => None,
            })
            .collect();
        assert!(percents.windows(2).all(|w| w[0] <= w[1]), "{:?}", percents);
        assert_eq!(percents.last(), Some(&100));
    }
    #[test]
    fn invalid_configuration_never_reaches_engine() {
        let session = ProcessingSession::new();
        let mut cfg = ProcessingConfiguration::default();
        // observation missing, navigation set
        cfg.set_navigation_file("/tmp/missing/brdc.nav");
        cfg.set_output_file("/tmp/missing/out.pos");
        let engine = Arc::new(MockEngine::with_status(0));
        let handle = session.start(cfg, engine.clone()).unwrap();
        let (_, outcome) = drain(handle);
        assert!(matches!(outcome, Outcome::Failure(_)));
        assert!(engine.runs().is_empty());
        assert_eq!(session.state(), State::Failed);
    }
    #[test]
    fn missing_optional_product_is_dropped() {
        let (dir, mut cfg) = fixture("optional-drop");
        cfg.set_antenna_file(dir.join("igs20.atx").to_str().unwrap());
        let session = ProcessingSession::new();
        let engine = Arc::new(MockEngine::with_status(0));
        let handle = session.start(cfg, engine.clone()).unwrap();
        let (_, outcome) = drain(handle);
        assert_eq!(outcome, Outcome::Success);
        let runs = engine.runs();
        assert_eq!(runs.len(), 1);
        // field was cleared, run proceeded to the engine regardless
        assert!(runs[0].options.antenna_file.is_none());
        let _ = std::fs::remove_dir_all(&dir);
    }
    #[test]
    fn every_ephemeris_source_dropped_aborts_before_engine() {
        // navigation passes validation but fails the Preparing stat
        // check: with one single resolvable input, the run must abort
        // before the engine is called
        let (dir, mut cfg) = fixture("insufficient");
        let _ = std::fs::remove_file(dir.join("brdc.nav"));
        cfg.set_navigation_file(dir.join("brdc.nav").to_str().unwrap());
        let session = ProcessingSession::new();
        let engine = Arc::new(MockEngine::with_status(0));
        let handle = session.start(cfg, engine.clone()).unwrap();
        let (_, outcome) = drain(handle);
        match outcome {
            Outcome::Failure(reason) => assert!(reason.contains("insufficient")),
            _ => panic!("expected failure"),
        }
        assert!(engine.runs().is_empty());
        let _ = std::fs::remove_dir_all(&dir);
    }
    #[test]
    fn input_order_with_present_files() {
        let (dir, mut cfg) = fixture("inputs");
        let sp3 = dir.join("grg.sp3");
        std::fs::write(&sp3, b"").unwrap();
        cfg.set_ephemeris_file(sp3.to_str().unwrap());

        let session = ProcessingSession::new();
        let engine = Arc::new(MockEngine::with_status(0));
        let handle = session.start(cfg, engine.clone()).unwrap();
        let (_, outcome) = drain(handle);
        assert_eq!(outcome, Outcome::Success);
        let runs = engine.runs();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].input_files.len(), 3);
        // observation, then navigation, then precise orbits
        assert!(runs[0].input_files[0].ends_with("roam.obs"));
        assert!(runs[0].input_files[1].ends_with("brdc.nav"));
        assert!(runs[0].input_files[2].ends_with("grg.sp3"));
        let _ = std::fs::remove_dir_all(&dir);
    }
    #[test]
    fn second_start_is_rejected_while_active() {
        // a run that blocks in the engine until released
        struct Gate(Arc<Mutex<()>>);
        impl Engine for Gate {
            fn run(
                &self,
                _: Option<(Epoch, Epoch)>,
                _: f64,
                _: &EngineOptions,
                _: &[String],
                _: &str,
            ) -> i32 {
                let _guard = self.0.lock().unwrap();
                0
            }
        }
        let gate = Arc::new(Mutex::new(()));
        let guard = gate.lock().unwrap();

        let (dir, cfg) = fixture("busy");
        let session = ProcessingSession::new();
        let handle = session.start(cfg.clone(), Gate(gate.clone())).unwrap();
        // wait for the engine invocation milestone
        for ev in handle.events().iter() {
            if matches!(ev, SessionEvent::Progress { percent: 50, .. }) {
                break;
            }
        }
        assert_eq!(session.state(), State::Running);
        assert_eq!(
            session.start(cfg, MockEngine::with_status(0)).err(),
            Some(Error::Busy)
        );
        // in flight run untouched by the rejection
        assert_eq!(session.state(), State::Running);
        drop(guard);
        let (_, outcome) = drain(handle);
        assert_eq!(outcome, Outcome::Success);
        let _ = std::fs::remove_dir_all(&dir);
    }
    #[test]
    fn cancellation_before_engine_call() {
        let (dir, cfg) = fixture("cancel");
        let session = ProcessingSession::new();
        let engine = Arc::new(MockEngine::with_status(0));
        let handle = session.start(cfg, engine.clone()).unwrap();
        handle.cancel();
        let (events, outcome) = drain(handle);
        // cancel raced the worker: either it resolved before the flag
        // was seen, or it failed without invoking the engine
        match outcome {
            Outcome::Failure(reason) => {
                assert!(reason.contains("cancelled"));
                assert!(engine.runs().is_empty());
            },
            Outcome::Success => assert_eq!(engine.runs().len(), 1),
        }
        assert!(matches!(events.last(), Some(SessionEvent::Finished(_))));
        let _ = std::fs::remove_dir_all(&dir);
    }
}
