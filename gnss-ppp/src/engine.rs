//! Call contract towards the PPP solver.
//!
//! The solver is treated as an opaque engine: this module defines the
//! numeric option space it understands, the option assembly from a
//! [ProcessingConfiguration], and the [Engine] trait the session
//! invokes. How positions are actually estimated is not our concern.
use crate::config::{IonosphereModel, ProcessingConfiguration, RunMode, TroposphereModel};
use crate::path::engine_path;
use hifitime::prelude::Epoch;
use std::sync::Mutex;

/// Numeric constants of the engine option space.
/// These values are part of the solver ABI and must not be renumbered.
pub mod constants {
    /// Static PPP resolution
    pub const PMODE_PPP_STATIC: i32 = 8;
    /// Kinematic PPP resolution
    pub const PMODE_PPP_KINEMA: i32 = 7;

    pub const TROPOPT_OFF: i32 = 0;
    pub const TROPOPT_SAAS: i32 = 1;
    pub const TROPOPT_SBAS: i32 = 2;
    pub const TROPOPT_EST: i32 = 3;
    pub const TROPOPT_ESTG: i32 = 4;

    pub const IONOOPT_OFF: i32 = 0;
    pub const IONOOPT_BRDC: i32 = 1;
    pub const IONOOPT_SBAS: i32 = 2;
    pub const IONOOPT_IFLC: i32 = 3;
    pub const IONOOPT_EST: i32 = 4;
    pub const IONOOPT_TEC: i32 = 5;

    /// Satellite states from precise products
    pub const EPHOPT_PREC: i32 = 1;
    /// Solid earth + ocean loading + pole tide corrections
    pub const TIDECORR_ALL: i32 = 2;
    /// Ambiguities fixed then held
    pub const ARMODE_FIX_HOLD: i32 = 3;
}

impl RunMode {
    /// Engine processing mode code
    pub fn to_engine(self) -> i32 {
        match self {
            Self::Static => constants::PMODE_PPP_STATIC,
            Self::Kinematic => constants::PMODE_PPP_KINEMA,
        }
    }
}

impl TroposphereModel {
    /// Engine troposphere option code
    pub fn to_engine(self) -> i32 {
        match self {
            Self::Off => constants::TROPOPT_OFF,
            Self::Saastamoinen => constants::TROPOPT_SAAS,
            Self::Sbas => constants::TROPOPT_SBAS,
            Self::ZtdEstimate => constants::TROPOPT_EST,
            Self::ZtdGradientEstimate => constants::TROPOPT_ESTG,
        }
    }
}

impl IonosphereModel {
    /// Engine ionosphere option code
    pub fn to_engine(self) -> i32 {
        match self {
            Self::Off => constants::IONOOPT_OFF,
            Self::Broadcast => constants::IONOOPT_BRDC,
            Self::Sbas => constants::IONOOPT_SBAS,
            Self::IonoFreeCombination => constants::IONOOPT_IFLC,
            Self::StecEstimate => constants::IONOOPT_EST,
            Self::TecMap => constants::IONOOPT_TEC,
        }
    }
}

/// Complete option set handed to the engine for one run.
/// Everything here is already in the engine's vocabulary:
/// numeric codes, mask bits, native path separators.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineOptions {
    /// Processing mode code
    pub mode: i32,
    /// Troposphere option code
    pub troposphere: i32,
    /// Ionosphere option code
    pub ionosphere: i32,
    /// Solver iteration cap
    pub max_iterations: u8,
    /// Constellation mask bits
    pub nav_systems: u32,
    /// Trace verbosity forwarded to the engine logger
    pub trace_level: u8,
    /// Trace log sink the adapter may open when tracing is active,
    /// named after the run start instant (see [trace_log_name])
    pub trace_file: Option<String>,
    /// Ephemeris source policy (always precise products)
    pub ephemeris_source: i32,
    /// Tide correction policy (fixed)
    pub tide_correction: i32,
    /// Ambiguity resolution policy (fixed: fix and hold)
    pub ambiguity_resolution: i32,
    /// Receiver antenna phase center file, engine path convention
    pub antenna_file: Option<String>,
    /// Differential code bias file, engine path convention
    pub dcb_file: Option<String>,
    /// Earth rotation parameters file, engine path convention
    pub erp_file: Option<String>,
}

/// Engine trace log file name for a run started at `instant`:
/// `ppp_log_YYYYMMDD_HHMMSS.txt` (UTC).
pub fn trace_log_name(instant: Epoch) -> String {
    let (y, m, d, hh, mm, ss, _) = instant.to_gregorian_utc();
    format!(
        "ppp_log_{:04}{:02}{:02}_{:02}{:02}{:02}.txt",
        y, m, d, hh, mm, ss
    )
}

impl EngineOptions {
    /// Assembles the engine option set from a user level configuration.
    /// Product file references are rewritten to the engine separator
    /// convention here, whatever representation the caller used.
    /// A non zero trace level names a trace sink after the current
    /// instant; level 0 disables tracing entirely.
    pub fn from_config(cfg: &ProcessingConfiguration) -> Self {
        Self {
            mode: cfg.mode.to_engine(),
            troposphere: cfg.troposphere.to_engine(),
            ionosphere: cfg.ionosphere.to_engine(),
            max_iterations: cfg.max_iterations,
            nav_systems: cfg.nav_systems.bits(),
            trace_level: cfg.trace_level,
            trace_file: if cfg.trace_level > 0 {
                Epoch::now().ok().map(trace_log_name)
            } else {
                None
            },
            ephemeris_source: constants::EPHOPT_PREC,
            tide_correction: constants::TIDECORR_ALL,
            ambiguity_resolution: constants::ARMODE_FIX_HOLD,
            antenna_file: cfg.antenna.as_deref().map(engine_path),
            dcb_file: cfg.dcb.as_deref().map(engine_path),
            erp_file: cfg.erp.as_deref().map(engine_path),
        }
    }
}

/// Contract of the (opaque) PPP solver.
///
/// `window` is the explicit processing span, or None to process the
/// full span present in the observation file. `input_files` come in
/// the engine's expected order (observation, navigation, precise
/// orbits, precise clocks; absent products omitted) and in its native
/// path convention. Returns the engine status code: 0 on success,
/// anything else is an opaque failure surfaced verbatim to the user.
pub trait Engine {
    fn run(
        &self,
        window: Option<(Epoch, Epoch)>,
        interval_s: f64,
        options: &EngineOptions,
        input_files: &[String],
        output_file: &str,
    ) -> i32;
}

impl<E: Engine + ?Sized> Engine for std::sync::Arc<E> {
    fn run(
        &self,
        window: Option<(Epoch, Epoch)>,
        interval_s: f64,
        options: &EngineOptions,
        input_files: &[String],
        output_file: &str,
    ) -> i32 {
        (**self).run(window, interval_s, options, input_files, output_file)
    }
}

/// One recorded [MockEngine] invocation.
#[derive(Debug, Clone)]
pub struct RecordedRun {
    pub window: Option<(Epoch, Epoch)>,
    pub interval_s: f64,
    pub options: EngineOptions,
    pub input_files: Vec<String>,
    pub output_file: String,
}

/// Scripted engine for test benches: returns a fixed status code and
/// records every invocation.
#[derive(Debug, Default)]
pub struct MockEngine {
    /// Status code returned by every run
    pub status: i32,
    runs: Mutex<Vec<RecordedRun>>,
}

impl MockEngine {
    /// Mock engine resolving every run with `status`
    pub fn with_status(status: i32) -> Self {
        Self {
            status,
            runs: Mutex::new(Vec::new()),
        }
    }
    /// All invocations recorded so far
    pub fn runs(&self) -> Vec<RecordedRun> {
        self.runs.lock().unwrap().clone()
    }
}

impl Engine for MockEngine {
    fn run(
        &self,
        window: Option<(Epoch, Epoch)>,
        interval_s: f64,
        options: &EngineOptions,
        input_files: &[String],
        output_file: &str,
    ) -> i32 {
        self.runs.lock().unwrap().push(RecordedRun {
            window,
            interval_s,
            options: options.clone(),
            input_files: input_files.to_vec(),
            output_file: output_file.to_string(),
        });
        self.status
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::{NavSystems, ProcessingConfiguration};

    #[test]
    fn mode_codes() {
        assert_eq!(RunMode::Static.to_engine(), 8);
        assert_eq!(RunMode::Kinematic.to_engine(), 7);
    }
    #[test]
    fn troposphere_codes() {
        assert_eq!(TroposphereModel::Off.to_engine(), 0);
        assert_eq!(TroposphereModel::Saastamoinen.to_engine(), 1);
        assert_eq!(TroposphereModel::Sbas.to_engine(), 2);
        assert_eq!(TroposphereModel::ZtdEstimate.to_engine(), 3);
        assert_eq!(TroposphereModel::ZtdGradientEstimate.to_engine(), 4);
    }
    #[test]
    fn ionosphere_codes() {
        assert_eq!(IonosphereModel::Off.to_engine(), 0);
        assert_eq!(IonosphereModel::Broadcast.to_engine(), 1);
        assert_eq!(IonosphereModel::Sbas.to_engine(), 2);
        assert_eq!(IonosphereModel::IonoFreeCombination.to_engine(), 3);
        assert_eq!(IonosphereModel::StecEstimate.to_engine(), 4);
        assert_eq!(IonosphereModel::TecMap.to_engine(), 5);
    }
    #[test]
    fn option_assembly() {
        let mut cfg = ProcessingConfiguration::default();
        cfg.set_antenna_file("products/igs20.atx");
        cfg.set_dcb_file("products/casv.bsx");
        cfg.set_nav_systems(NavSystems::GPS | NavSystems::GALILEO);
        let opts = EngineOptions::from_config(&cfg);
        assert_eq!(opts.mode, constants::PMODE_PPP_STATIC);
        assert_eq!(opts.troposphere, constants::TROPOPT_ESTG);
        assert_eq!(opts.ionosphere, constants::IONOOPT_IFLC);
        assert_eq!(opts.max_iterations, 8);
        assert_eq!(opts.nav_systems, 0x01 | 0x08);
        assert_eq!(opts.ephemeris_source, constants::EPHOPT_PREC);
        assert_eq!(opts.tide_correction, constants::TIDECORR_ALL);
        assert_eq!(opts.ambiguity_resolution, constants::ARMODE_FIX_HOLD);
        // paths already in engine convention
        assert_eq!(opts.antenna_file.as_deref(), Some("products\\igs20.atx"));
        assert_eq!(opts.dcb_file.as_deref(), Some("products\\casv.bsx"));
        assert!(opts.erp_file.is_none());
        // default trace level is 3: a trace sink is named
        let trace = opts.trace_file.unwrap();
        assert!(trace.starts_with("ppp_log_"));
        assert!(trace.ends_with(".txt"));
    }
    #[test]
    fn trace_sink_naming() {
        let t = Epoch::from_gregorian_utc(2021, 1, 4, 12, 30, 59, 0);
        assert_eq!(trace_log_name(t), "ppp_log_20210104_123059.txt");
        let mut cfg = ProcessingConfiguration::default();
        cfg.set_trace_level(0);
        let opts = EngineOptions::from_config(&cfg);
        assert!(opts.trace_file.is_none());
    }
}
