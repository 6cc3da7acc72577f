//! Processing configuration: every parameter a PPP run requires.
use crate::gnss::prelude::Constellation;
use bitflags::bitflags;
use hifitime::prelude::Epoch;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// Configuration invariant violations. Any of these aborts a run
/// before the engine is ever invoked.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// An observation file is always required
    #[error("an observation file must be specified")]
    MissingObservationFile,
    /// Satellite states must come from somewhere: either broadcast
    /// radio messages or a precise orbit product
    #[error("either a navigation file or a precise ephemeris file must be specified")]
    MissingEphemerisSource,
    /// The engine writes its solutions to a file, unconditionally
    #[error("an output file must be specified")]
    MissingOutputFile,
}

/// Invalid user description of one of the option families.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParsingError {
    #[error("unknown run mode \"{0}\"")]
    UnknownRunMode(String),
    #[error("unknown troposphere model \"{0}\"")]
    UnknownTroposphereModel(String),
    #[error("unknown ionosphere model \"{0}\"")]
    UnknownIonosphereModel(String),
}

/// PPP run mode
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunMode {
    /// Receiver is static over the whole observation span
    #[default]
    Static,
    /// Receiver is moving: one state per epoch
    Kinematic,
}

impl std::fmt::Display for RunMode {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::Static => write!(f, "static"),
            Self::Kinematic => write!(f, "kinematic"),
        }
    }
}

impl FromStr for RunMode {
    type Err = ParsingError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "static" => Ok(Self::Static),
            "kinematic" | "kinematics" => Ok(Self::Kinematic),
            _ => Err(ParsingError::UnknownRunMode(s.to_string())),
        }
    }
}

/// Troposphere delay compensation
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TroposphereModel {
    /// No compensation
    Off,
    /// Saastamoinen empirical model
    Saastamoinen,
    /// SBAS broadcast empirical model
    Sbas,
    /// Zenith Tropospheric Delay estimated as a nuisance parameter
    ZtdEstimate,
    /// ZTD and horizontal gradients estimated
    #[default]
    ZtdGradientEstimate,
}

impl std::fmt::Display for TroposphereModel {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::Off => write!(f, "off"),
            Self::Saastamoinen => write!(f, "saastamoinen"),
            Self::Sbas => write!(f, "sbas"),
            Self::ZtdEstimate => write!(f, "ztd"),
            Self::ZtdGradientEstimate => write!(f, "ztd-grad"),
        }
    }
}

impl FromStr for TroposphereModel {
    type Err = ParsingError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "off" => Ok(Self::Off),
            "saastamoinen" | "saas" => Ok(Self::Saastamoinen),
            "sbas" => Ok(Self::Sbas),
            "ztd" | "est" => Ok(Self::ZtdEstimate),
            "ztd-grad" | "ztdgrad" | "estg" => Ok(Self::ZtdGradientEstimate),
            _ => Err(ParsingError::UnknownTroposphereModel(s.to_string())),
        }
    }
}

/// Ionosphere delay compensation
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum IonosphereModel {
    /// No compensation
    Off,
    /// Klobuchar broadcast model
    Broadcast,
    /// SBAS broadcast corrections
    Sbas,
    /// Dual frequency ionosphere free combination:
    /// cancels first order delay
    #[default]
    IonoFreeCombination,
    /// Slant Total Electron Content estimated per satellite
    StecEstimate,
    /// Total Electron Content maps
    TecMap,
}

impl std::fmt::Display for IonosphereModel {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::Off => write!(f, "off"),
            Self::Broadcast => write!(f, "broadcast"),
            Self::Sbas => write!(f, "sbas"),
            Self::IonoFreeCombination => write!(f, "iflc"),
            Self::StecEstimate => write!(f, "stec"),
            Self::TecMap => write!(f, "tec"),
        }
    }
}

impl FromStr for IonosphereModel {
    type Err = ParsingError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "off" => Ok(Self::Off),
            "broadcast" | "brdc" => Ok(Self::Broadcast),
            "sbas" => Ok(Self::Sbas),
            "iflc" | "if" => Ok(Self::IonoFreeCombination),
            "stec" | "est" => Ok(Self::StecEstimate),
            "tec" => Ok(Self::TecMap),
            _ => Err(ParsingError::UnknownIonosphereModel(s.to_string())),
        }
    }
}

bitflags! {
    /// Satellite systems contributing to the solution.
    /// Bit assignment is the engine's own constellation mask space
    /// and is passed verbatim in the option set.
    #[derive(Debug, Copy, Clone)]
    #[derive(PartialEq, Eq, PartialOrd)]
    #[derive(Serialize, Deserialize)]
    pub struct NavSystems: u32 {
        const GPS = 0x01;
        const SBAS = 0x02;
        const GLONASS = 0x04;
        const GALILEO = 0x08;
        const QZSS = 0x10;
        const BEIDOU = 0x20;
        const IRNSS = 0x40;
    }
}

impl Default for NavSystems {
    /// GPS + BeiDou, like the historical receiver deployments
    /// this tool was built around.
    fn default() -> Self {
        Self::GPS | Self::BEIDOU
    }
}

impl NavSystems {
    /// Maps a [Constellation] to its engine mask bit.
    /// Any augmentation system folds into the single SBAS bit.
    pub fn from_constellation(c: Constellation) -> Option<Self> {
        match c {
            Constellation::GPS => Some(Self::GPS),
            Constellation::Glonass => Some(Self::GLONASS),
            Constellation::Galileo => Some(Self::GALILEO),
            Constellation::BeiDou => Some(Self::BEIDOU),
            Constellation::QZSS => Some(Self::QZSS),
            Constellation::IRNSS => Some(Self::IRNSS),
            c if c.is_sbas() => Some(Self::SBAS),
            _ => None,
        }
    }
    /// Returns selected [Constellation]s, in mask bit order.
    pub fn constellations(&self) -> Vec<Constellation> {
        let mut ret = Vec::with_capacity(7);
        if self.contains(Self::GPS) {
            ret.push(Constellation::GPS);
        }
        if self.contains(Self::SBAS) {
            ret.push(Constellation::SBAS);
        }
        if self.contains(Self::GLONASS) {
            ret.push(Constellation::Glonass);
        }
        if self.contains(Self::GALILEO) {
            ret.push(Constellation::Galileo);
        }
        if self.contains(Self::QZSS) {
            ret.push(Constellation::QZSS);
        }
        if self.contains(Self::BEIDOU) {
            ret.push(Constellation::BeiDou);
        }
        if self.contains(Self::IRNSS) {
            ret.push(Constellation::IRNSS);
        }
        ret
    }
}

impl std::fmt::Display for NavSystems {
    /// Comma separated selection, in mask bit order, with our own
    /// labels: session reports and the engine adapter rely on this
    /// layout whatever the constellation crate renders.
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        use itertools::Itertools;
        const LABELS: [(NavSystems, &str); 7] = [
            (NavSystems::GPS, "GPS"),
            (NavSystems::SBAS, "SBAS"),
            (NavSystems::GLONASS, "Glonass"),
            (NavSystems::GALILEO, "Galileo"),
            (NavSystems::QZSS, "QZSS"),
            (NavSystems::BEIDOU, "BeiDou"),
            (NavSystems::IRNSS, "IRNSS"),
        ];
        write!(
            f,
            "{}",
            LABELS
                .iter()
                .filter(|(flag, _)| self.contains(*flag))
                .map(|(_, label)| *label)
                .join(", ")
        )
    }
}

fn default_window() -> (Epoch, Epoch) {
    let now = Epoch::now().unwrap_or_else(|_| Epoch::from_gregorian_utc_at_midnight(2000, 1, 1));
    let (y, m, d, _, _, _, _) = now.to_gregorian_utc();
    (
        Epoch::from_gregorian_utc_at_midnight(y, m, d),
        Epoch::from_gregorian_utc(y, m, d, 23, 59, 59, 0),
    )
}

/// Complete description of one PPP run. Mutated field by field
/// by the caller, then consumed read-only at run start.
/// Not persisted beyond the process lifetime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingConfiguration {
    /// Observation file (mandatory)
    pub observation: Option<String>,
    /// Broadcast navigation file
    pub navigation: Option<String>,
    /// Precise orbit product (SP3)
    pub ephemeris: Option<String>,
    /// Precise clock product (CLK)
    pub clock: Option<String>,
    /// Antenna phase center product (ATX)
    pub antenna: Option<String>,
    /// Differential code bias product (DCB)
    pub dcb: Option<String>,
    /// Earth rotation parameters (ERP)
    pub erp: Option<String>,
    /// Solutions file the engine will produce (mandatory)
    pub output: Option<String>,
    /// Static or kinematic resolution
    pub mode: RunMode,
    /// Engine trace verbosity
    pub trace_level: u8,
    /// Start of the processing window
    pub start: Epoch,
    /// End of the processing window
    pub end: Epoch,
    /// When false, the full observation span is processed
    /// and [Self::start]/[Self::end] are ignored
    pub window_enabled: bool,
    /// Processing interval in seconds. 0 means every available epoch.
    pub interval_s: f64,
    /// Solver iteration cap
    pub max_iterations: u8,
    pub troposphere: TroposphereModel,
    pub ionosphere: IonosphereModel,
    /// Constellation selection, never empty once committed
    pub nav_systems: NavSystems,
}

impl Default for ProcessingConfiguration {
    fn default() -> Self {
        let (start, end) = default_window();
        Self {
            observation: None,
            navigation: None,
            ephemeris: None,
            clock: None,
            antenna: None,
            dcb: None,
            erp: None,
            output: None,
            mode: RunMode::default(),
            trace_level: 3,
            start,
            end,
            window_enabled: false,
            interval_s: 0.0,
            max_iterations: 8,
            troposphere: TroposphereModel::default(),
            ionosphere: IonosphereModel::default(),
            nav_systems: NavSystems::default(),
        }
    }
}

fn non_empty(path: &str) -> Option<String> {
    let trimmed = path.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

impl ProcessingConfiguration {
    pub fn set_observation_file(&mut self, path: &str) {
        self.observation = non_empty(path);
    }
    pub fn set_navigation_file(&mut self, path: &str) {
        self.navigation = non_empty(path);
    }
    pub fn set_ephemeris_file(&mut self, path: &str) {
        self.ephemeris = non_empty(path);
    }
    pub fn set_clock_file(&mut self, path: &str) {
        self.clock = non_empty(path);
    }
    pub fn set_antenna_file(&mut self, path: &str) {
        self.antenna = non_empty(path);
    }
    pub fn set_dcb_file(&mut self, path: &str) {
        self.dcb = non_empty(path);
    }
    pub fn set_erp_file(&mut self, path: &str) {
        self.erp = non_empty(path);
    }
    pub fn set_output_file(&mut self, path: &str) {
        self.output = non_empty(path);
    }
    pub fn set_mode(&mut self, mode: RunMode) {
        self.mode = mode;
    }
    pub fn set_trace_level(&mut self, level: u8) {
        self.trace_level = level;
    }
    /// Defines the explicit processing window (second resolution)
    /// and activates it.
    pub fn set_time_window(&mut self, start: Epoch, end: Epoch) {
        self.start = start;
        self.end = end;
        self.window_enabled = true;
    }
    pub fn use_time_window(&mut self, enabled: bool) {
        self.window_enabled = enabled;
    }
    pub fn set_interval(&mut self, interval_s: f64) {
        self.interval_s = interval_s;
    }
    pub fn set_max_iterations(&mut self, n: u8) {
        self.max_iterations = n;
    }
    pub fn set_troposphere_model(&mut self, model: TroposphereModel) {
        self.troposphere = model;
    }
    pub fn set_ionosphere_model(&mut self, model: IonosphereModel) {
        self.ionosphere = model;
    }
    /// Commits the constellation selection. An empty selection is
    /// never stored: it is substituted by GPS alone, and the
    /// substitution is reported (returns true) so the caller may
    /// notify the user. This is informational, never an error.
    pub fn set_nav_systems(&mut self, systems: NavSystems) -> bool {
        if systems.is_empty() {
            info!("empty constellation selection: substituting GPS");
            self.nav_systems = NavSystems::GPS;
            true
        } else {
            self.nav_systems = systems;
            false
        }
    }
    /// Verifies all run invariants, returning the first violation:
    /// the observation file, at least one ephemeris source (navigation
    /// or precise orbits), and the output file must all be specified.
    /// Only the presence of the references is verified here; on disk
    /// existence is the session's concern.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.observation.is_none() {
            return Err(ConfigError::MissingObservationFile);
        }
        if self.navigation.is_none() && self.ephemeris.is_none() {
            return Err(ConfigError::MissingEphemerisSource);
        }
        if self.output.is_none() {
            return Err(ConfigError::MissingOutputFile);
        }
        Ok(())
    }
}
