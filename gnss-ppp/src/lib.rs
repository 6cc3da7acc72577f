//! GNSS Precise Point Positioning (PPP) orchestration.
//!
//! This library prepares and drives a PPP computation performed by an
//! external engine, then re-exposes its tabular solutions:
//!
//! - [config::ProcessingConfiguration] gathers and validates all
//!   processing parameters (products, mode, time window, models,
//!   constellation selection),
//! - [session::ProcessingSession] runs the single flight lifecycle on a
//!   background thread and streams lifecycle events,
//! - [engine::Engine] is the call contract towards the (opaque) solver,
//! - [solution] parses the engine output file and serializes it to CSV.
//!
//! The numerical solver itself is not part of this crate: anything that
//! implements [engine::Engine] may be driven.

extern crate gnss_rs as gnss;

#[macro_use]
extern crate log;

pub mod config;
pub mod engine;
pub mod path;
pub mod session;
pub mod solution;

pub mod prelude {
    pub use crate::config::{
        ConfigError, IonosphereModel, NavSystems, ProcessingConfiguration, RunMode,
        TroposphereModel,
    };
    pub use crate::engine::{Engine, EngineOptions, MockEngine};
    pub use crate::path::engine_path;
    pub use crate::session::{Outcome, ProcessingSession, RunHandle, SessionEvent, State};
    pub use crate::solution::{
        csv::{write_csv, write_csv_file},
        parser::{parse_file, ParseError},
        quality_label, ResultRecord, ResultStore,
    };
    // pub re-export
    pub use gnss::prelude::Constellation;
    pub use hifitime::prelude::{Duration, Epoch};
}
