//! Engine adapter: drives an external PPP solver executable.
use gnss_ppp::prelude::{Engine, EngineOptions, Epoch};
use gnss_ppp::solution::format_epoch;
use std::process::{Command, Stdio};

/// [Engine] implementation spawning a solver executable (RTKLIB
/// `rnx2rtkp` compatible flag surface). The child's exit code is the
/// engine status code; a spawn failure resolves as status -1.
pub struct CommandEngine {
    executable: String,
}

impl CommandEngine {
    pub fn new(executable: &str) -> Self {
        Self {
            executable: executable.to_string(),
        }
    }
    fn command(
        &self,
        window: Option<(Epoch, Epoch)>,
        interval_s: f64,
        options: &EngineOptions,
        input_files: &[String],
        output_file: &str,
    ) -> Command {
        let mut cmd = Command::new(&self.executable);
        if let Some((start, end)) = window {
            cmd.arg("-ts").arg(format_epoch(start));
            cmd.arg("-te").arg(format_epoch(end));
        }
        if interval_s > 0.0 {
            cmd.arg("-ti").arg(format!("{}", interval_s));
        }
        cmd.arg("-mode").arg(options.mode.to_string());
        cmd.arg("-trop").arg(options.troposphere.to_string());
        cmd.arg("-iono").arg(options.ionosphere.to_string());
        cmd.arg("-niter").arg(options.max_iterations.to_string());
        cmd.arg("-sys").arg(options.nav_systems.to_string());
        cmd.arg("-eph").arg(options.ephemeris_source.to_string());
        cmd.arg("-tide").arg(options.tide_correction.to_string());
        cmd.arg("-ar").arg(options.ambiguity_resolution.to_string());
        cmd.arg("-x").arg(options.trace_level.to_string());
        if let Some(atx) = &options.antenna_file {
            cmd.arg("-atx").arg(atx);
        }
        if let Some(dcb) = &options.dcb_file {
            cmd.arg("-dcb").arg(dcb);
        }
        if let Some(erp) = &options.erp_file {
            cmd.arg("-erp").arg(erp);
        }
        cmd.arg("-o").arg(output_file);
        cmd.args(input_files);
        cmd
    }
}

impl Engine for CommandEngine {
    fn run(
        &self,
        window: Option<(Epoch, Epoch)>,
        interval_s: f64,
        options: &EngineOptions,
        input_files: &[String],
        output_file: &str,
    ) -> i32 {
        let mut cmd = self.command(window, interval_s, options, input_files, output_file);
        // solver diagnostics land in the run's trace log when one is
        // named; a sink that cannot be opened only disables tracing
        if let Some(trace) = &options.trace_file {
            match std::fs::File::create(trace) {
                Ok(fd) => {
                    info!("engine trace log: \"{}\"", trace);
                    cmd.stderr(Stdio::from(fd));
                },
                Err(e) => warn!("failed to open trace log \"{}\": {}", trace, e),
            }
        }
        debug!("engine command: {:?}", cmd);
        match cmd.status() {
            Ok(status) => status.code().unwrap_or(-1),
            Err(e) => {
                error!("failed to spawn \"{}\": {}", self.executable, e);
                -1
            },
        }
    }
}
