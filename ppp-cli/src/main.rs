//! Command line tool to configure and drive a PPP engine,
//! then load and export its solutions.
mod cli;
mod engine;

use cli::Cli;
use engine::CommandEngine;

extern crate gnss_rs as gnss;

use gnss_ppp::prelude::{
    parse_file, write_csv_file, Outcome, ProcessingSession, ResultStore, SessionEvent,
};

use env_logger::{Builder, Target};

#[macro_use]
extern crate log;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("i/o error")]
    StdioError(#[from] std::io::Error),
    #[error("invalid configuration preset")]
    PresetError(#[from] serde_json::Error),
    #[error("invalid option value")]
    OptionError(#[from] gnss_ppp::config::ParsingError),
    #[error("invalid epoch description \"{0}\"")]
    InvalidEpoch(String),
    #[error("--start and --end must be passed together")]
    IncompleteTimeWindow,
    #[error("unknown constellation \"{0}\"")]
    UnknownConstellation(String),
    #[error("session error")]
    SessionError(#[from] gnss_ppp::session::Error),
    #[error("{0}")]
    ProcessingFailure(String),
    #[error("failed to parse solutions")]
    SolutionsError(#[from] gnss_ppp::solution::parser::ParseError),
    #[error("failed to export solutions")]
    ExportError(#[from] gnss_ppp::solution::csv::ExportError),
}

pub fn main() -> Result<(), Error> {
    let mut builder = Builder::from_default_env();
    builder
        .target(Target::Stdout)
        .format_timestamp_secs()
        .format_module_path(false)
        .init();

    let cli = Cli::new();
    let quiet = cli.quiet();
    let cfg = cli.configuration()?;
    // solutions file reference, for post run consumption:
    // the run itself revalidates
    let output = cfg.output.clone().unwrap_or_default();

    let session = ProcessingSession::new();
    let engine = CommandEngine::new(cli.engine_executable());
    let handle = session.start(cfg, engine)?;

    // single ordered event stream, delivered while the engine works
    for event in handle.events().iter() {
        match event {
            SessionEvent::Started => info!("processing started"),
            SessionEvent::Progress { percent, message } => {
                if !quiet {
                    println!("[{:3}%] {}", percent, message);
                }
            },
            SessionEvent::Finished(_) => {},
        }
    }
    let outcome = handle.wait();

    match outcome {
        Outcome::Success => info!("processing completed"),
        Outcome::Failure(reason) => {
            error!("processing failed: {}", reason);
            return Err(Error::ProcessingFailure(reason));
        },
    }

    // ingest the engine solutions
    let mut solutions = ResultStore::new();
    match parse_file(&output, &mut solutions) {
        Ok(count) => info!("{} solutions resolved", count),
        Err(e) => {
            // the run itself did succeed: report and carry on
            warn!("no solution parsed from \"{}\": {}", output, e);
        },
    }

    if let Some(csv_path) = cli.csv_export(&output) {
        if solutions.is_empty() {
            warn!("nothing to export");
        } else {
            write_csv_file(&solutions, &csv_path)?;
        }
    }

    Ok(())
}
