use pace_traits::{BoxError, Pumps};
use tracing::{error, info};

use crate::error::Result;
use crate::remote::CommandRunner;

/// Media pumps driven by a script on a remote controller.
///
/// Every action runs `<interpreter> <run_script> <action> [args]` through the
/// command runner. When disabled, the command line is only logged.
pub struct RemotePumps {
    runner: CommandRunner,
    interpreter: String,
    run_script: String,
    abort_script: String,
    disabled: bool,
}

impl RemotePumps {
    pub fn new(
        runner: CommandRunner,
        interpreter: impl Into<String>,
        run_script: impl Into<String>,
        abort_script: impl Into<String>,
    ) -> Self {
        Self {
            runner,
            interpreter: interpreter.into(),
            run_script: run_script.into(),
            abort_script: abort_script.into(),
            disabled: false,
        }
    }

    pub fn disable(&mut self) {
        self.disabled = true;
    }

    /// Command line for a pump action.
    pub fn command_line(&self, action: &str, args: &[String]) -> String {
        let mut parts = vec![self.interpreter.as_str(), self.run_script.as_str(), action];
        parts.extend(args.iter().map(String::as_str));
        parts.join(" ")
    }

    fn run(&self, action: &str, args: &[String]) -> Result<()> {
        let line = self.command_line(action, args);
        if self.disabled {
            info!(command = %line, "pumps disabled; command would be executed remotely here");
            return Ok(());
        }
        info!(action, ?args, "running deck pump action");
        self.runner.run_with_file(&line)
    }

    /// Source the abort script on the remote controller.
    pub fn abort(&self) -> Result<()> {
        if self.disabled {
            return Ok(());
        }
        self.runner.run_with_file(&format!(". {}", self.abort_script))
    }
}

impl Pumps for RemotePumps {
    fn bleach_clean(&mut self) -> std::result::Result<(), BoxError> {
        Ok(self.run("clean", &[])?)
    }

    fn prime(&mut self) -> std::result::Result<(), BoxError> {
        Ok(self.run("prime", &[])?)
    }

    fn refill(&mut self, ml: f64) -> std::result::Result<(), BoxError> {
        Ok(self.run("fresh", &[ml.to_string()])?)
    }

    fn empty(&mut self, ml: f64) -> std::result::Result<(), BoxError> {
        Ok(self.run("empty", &[ml.to_string()])?)
    }
}

impl Drop for RemotePumps {
    fn drop(&mut self) {
        if let Err(e) = self.abort() {
            error!(error = %e, "pump abort script failed");
        }
    }
}
