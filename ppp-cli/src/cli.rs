//! Command line interface definition.
use clap::{value_parser, Arg, ArgAction, ArgMatches, ColorChoice, Command};
use std::fs::read_to_string;
use std::path::Path;
use std::str::FromStr;

use gnss::prelude::Constellation;
use gnss_ppp::prelude::{
    Epoch, IonosphereModel, NavSystems, ProcessingConfiguration, RunMode, TroposphereModel,
};

use crate::Error;

pub struct Cli {
    /// Arguments passed by user
    pub matches: ArgMatches,
}

impl Default for Cli {
    fn default() -> Self {
        Self::new()
    }
}

impl Cli {
    /// Build new command line interface
    pub fn new() -> Self {
        let cmd =
            Command::new("ppp-cli")
                .author("Guillaume W. Bres <guillaume.bressaix@gmail.com>")
                .version(env!("CARGO_PKG_VERSION"))
                .about("GNSS Precise Point Positioning")
                .long_about("ppp-cli configures and drives a PPP engine over your
observation file and precise products, then loads the resolved
positions and may export them as CSV.")
                .arg_required_else_help(true)
                .color(ColorChoice::Always)
                .next_help_heading("Input products")
                .arg(Arg::new("obs")
                    .short('o')
                    .long("obs")
                    .value_name("FILE")
                    .help("Observation file (mandatory)."))
                .arg(Arg::new("nav")
                    .short('n')
                    .long("nav")
                    .value_name("FILE")
                    .help("Broadcast navigation file. Either this or --sp3 is mandatory."))
                .arg(Arg::new("sp3")
                    .short('s')
                    .long("sp3")
                    .value_name("FILE")
                    .help("Precise orbit product (SP3). Either this or --nav is mandatory."))
                .arg(Arg::new("clk")
                    .long("clk")
                    .value_name("FILE")
                    .help("Precise clock product (CLK)."))
                .arg(Arg::new("atx")
                    .long("atx")
                    .value_name("FILE")
                    .help("Antenna phase center product (ATX)."))
                .arg(Arg::new("dcb")
                    .long("dcb")
                    .value_name("FILE")
                    .help("Differential code bias product (DCB/BSX)."))
                .arg(Arg::new("erp")
                    .long("erp")
                    .value_name("FILE")
                    .help("Earth rotation parameters (ERP)."))
                .next_help_heading("Session")
                .arg(Arg::new("output")
                    .short('O')
                    .long("output")
                    .value_name("FILE")
                    .help("Solutions file the engine will produce (mandatory)."))
                .arg(Arg::new("cfg")
                    .short('c')
                    .long("cfg")
                    .value_name("FILE")
                    .help("Load a complete processing configuration (JSON). Individual
flags still apply on top of it, last write wins."))
                .arg(Arg::new("engine")
                    .long("engine")
                    .value_name("EXECUTABLE")
                    .default_value("rnx2rtkp")
                    .help("PPP engine executable to drive."))
                .arg(Arg::new("quiet")
                    .short('q')
                    .long("quiet")
                    .action(ArgAction::SetTrue)
                    .help("Disable terminal progress output."))
                .next_help_heading("Processing options")
                .arg(Arg::new("mode")
                    .short('p')
                    .long("mode")
                    .value_name("MODE")
                    .help("Run mode: \"static\" or \"kinematic\". Defaults to static."))
                .arg(Arg::new("start")
                    .long("start")
                    .value_name("EPOCH")
                    .help("Start of the processing window, in Epoch description,
for example \"2020-06-25T00:00:00 UTC\". Requires --end; without an
explicit window the full observation span is processed."))
                .arg(Arg::new("end")
                    .long("end")
                    .value_name("EPOCH")
                    .help("End of the processing window, in Epoch description. Requires --start."))
                .arg(Arg::new("interval")
                    .short('i')
                    .long("interval")
                    .value_name("SECONDS")
                    .value_parser(value_parser!(f64))
                    .help("Processing interval [s]. 0 processes every available epoch."))
                .arg(Arg::new("niter")
                    .long("niter")
                    .value_name("N")
                    .value_parser(value_parser!(u8))
                    .help("Solver iteration cap. Defaults to 8."))
                .arg(Arg::new("trace")
                    .long("trace")
                    .value_name("LEVEL")
                    .value_parser(value_parser!(u8))
                    .help("Engine trace verbosity. Defaults to 3."))
                .arg(Arg::new("tropo")
                    .long("tropo")
                    .value_name("MODEL")
                    .help("Troposphere model: off, saastamoinen, sbas, ztd, ztd-grad.
Defaults to ztd-grad."))
                .arg(Arg::new("iono")
                    .long("iono")
                    .value_name("MODEL")
                    .help("Ionosphere model: off, broadcast, sbas, iflc, stec, tec.
Defaults to iflc."))
                .arg(Arg::new("constellation")
                    .short('C')
                    .long("constellation")
                    .value_name("NAME")
                    .action(ArgAction::Append)
                    .help("Select one contributing constellation (repeat as needed):
GPS, Glonass, Galileo, BeiDou, QZSS, IRNSS, SBAS. Defaults to GPS+BeiDou.
An empty selection is substituted by GPS."))
                .next_help_heading("Solutions")
                .arg(Arg::new("csv")
                    .long("csv")
                    .value_name("FILE")
                    .num_args(0..=1)
                    .default_missing_value("")
                    .help("Export parsed solutions as CSV. Without a value, the table
lands next to the solutions file."));
        Self {
            matches: cmd.get_matches(),
        }
    }

    pub fn quiet(&self) -> bool {
        self.matches.get_flag("quiet")
    }

    pub fn engine_executable(&self) -> &str {
        self.matches
            .get_one::<String>("engine")
            .map(|s| s.as_str())
            .unwrap_or("rnx2rtkp")
    }

    /// CSV export requested by user: explicit path, or a default
    /// location next to the solutions file.
    pub fn csv_export(&self, output: &str) -> Option<String> {
        let value = self.matches.get_one::<String>("csv")?;
        if value.is_empty() {
            let parent = Path::new(output).parent().unwrap_or_else(|| Path::new("."));
            Some(parent.join("solutions.csv").to_string_lossy().to_string())
        } else {
            Some(value.to_string())
        }
    }

    /// Processing configuration described by the user: optional JSON
    /// preset, then individual flags on top (last write wins).
    pub fn configuration(&self) -> Result<ProcessingConfiguration, Error> {
        let mut cfg = match self.matches.get_one::<String>("cfg") {
            Some(fp) => {
                let content = read_to_string(fp)?;
                let cfg: ProcessingConfiguration = serde_json::from_str(&content)?;
                info!("using configuration preset \"{}\"", fp);
                cfg
            },
            None => ProcessingConfiguration::default(),
        };
        for (arg, setter) in [
            ("obs", ProcessingConfiguration::set_observation_file as fn(&mut _, &str)),
            ("nav", ProcessingConfiguration::set_navigation_file),
            ("sp3", ProcessingConfiguration::set_ephemeris_file),
            ("clk", ProcessingConfiguration::set_clock_file),
            ("atx", ProcessingConfiguration::set_antenna_file),
            ("dcb", ProcessingConfiguration::set_dcb_file),
            ("erp", ProcessingConfiguration::set_erp_file),
            ("output", ProcessingConfiguration::set_output_file),
        ] {
            if let Some(path) = self.matches.get_one::<String>(arg) {
                setter(&mut cfg, path);
            }
        }
        if let Some(mode) = self.matches.get_one::<String>("mode") {
            cfg.set_mode(RunMode::from_str(mode)?);
        }
        if let Some(model) = self.matches.get_one::<String>("tropo") {
            cfg.set_troposphere_model(TroposphereModel::from_str(model)?);
        }
        if let Some(model) = self.matches.get_one::<String>("iono") {
            cfg.set_ionosphere_model(IonosphereModel::from_str(model)?);
        }
        if let Some(interval) = self.matches.get_one::<f64>("interval") {
            cfg.set_interval(*interval);
        }
        if let Some(niter) = self.matches.get_one::<u8>("niter") {
            cfg.set_max_iterations(*niter);
        }
        if let Some(level) = self.matches.get_one::<u8>("trace") {
            cfg.set_trace_level(*level);
        }
        match (
            self.matches.get_one::<String>("start"),
            self.matches.get_one::<String>("end"),
        ) {
            (Some(start), Some(end)) => {
                let start =
                    Epoch::from_str(start).map_err(|_| Error::InvalidEpoch(start.to_string()))?;
                let end = Epoch::from_str(end).map_err(|_| Error::InvalidEpoch(end.to_string()))?;
                cfg.set_time_window(start, end);
            },
            (None, None) => {},
            _ => return Err(Error::IncompleteTimeWindow),
        }
        if self.matches.contains_id("constellation") {
            let mut systems = NavSystems::empty();
            for name in self.matches.get_many::<String>("constellation").unwrap() {
                let constellation = Constellation::from_str(name.trim())
                    .map_err(|_| Error::UnknownConstellation(name.to_string()))?;
                systems |= NavSystems::from_constellation(constellation)
                    .ok_or_else(|| Error::UnknownConstellation(name.to_string()))?;
            }
            if cfg.set_nav_systems(systems) {
                warn!("empty constellation selection: GPS was substituted");
            }
        }
        Ok(cfg)
    }
}
