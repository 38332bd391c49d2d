use pace_traits::{BoxError, Shaker};
use tracing::{debug, info};

use crate::error::Result;
use crate::remote::CommandRunner;

/// Placeholder for the speed in the start command template.
pub const RPM_PLACEHOLDER: &str = "{rpm}";

/// Orbital shaker commanded over a serial line through a helper program.
pub struct SerialShaker {
    runner: CommandRunner,
    start_template: String,
    stop_command: String,
    disabled: bool,
}

impl SerialShaker {
    pub fn new(
        runner: CommandRunner,
        start_template: impl Into<String>,
        stop_command: impl Into<String>,
    ) -> Self {
        Self {
            runner: runner.with_extension("txt"),
            start_template: start_template.into(),
            stop_command: stop_command.into(),
            disabled: false,
        }
    }

    pub fn disable(&mut self) {
        self.disabled = true;
    }

    pub fn start_command(&self, rpm: u32) -> String {
        self.start_template.replace(RPM_PLACEHOLDER, &rpm.to_string())
    }

    fn send(&self, command: &str) -> Result<()> {
        if self.disabled {
            debug!(command, "shaker disabled; serial command skipped");
            return Ok(());
        }
        self.runner.run_with_file(command)
    }
}

impl Shaker for SerialShaker {
    fn start(&mut self, rpm: u32) -> std::result::Result<(), BoxError> {
        info!(rpm, "shaker start");
        Ok(self.send(&self.start_command(rpm))?)
    }

    fn stop(&mut self) -> std::result::Result<(), BoxError> {
        info!("shaker stop");
        Ok(self.send(&self.stop_command)?)
    }
}
