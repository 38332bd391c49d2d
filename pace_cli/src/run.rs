//! Config mapping, station assembly and the scheduler loop.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use eyre::WrapErr;
use pace_config::Config;
use pace_core::error::{BuildError, PaceError, Result};
use pace_core::{
    ControllerParams, ExperimentParams, JsonlLog, RunSummary, ScheduleParams, Scheduler,
    ShakerParams, SharedClock, Station, register_station,
};
use pace_hardware::{
    CommandRunner, RemotePumps, SerialShaker, SimReadings, SimulatedLiquidHandler, SimulatedReader,
};
use pace_traits::MonotonicClock;

#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    pub simulate: bool,
    pub sim_deck: bool,
    pub no_pumps: bool,
    pub no_equilibrate: bool,
    pub max_firings: Option<usize>,
}

/// Load and validate the config; failures are typed as configuration errors.
pub fn load_config(path: &Path) -> Result<Config> {
    pace_config::load_file(path).map_err(|e| PaceError::Config(format!("{e:#}")).into())
}

fn pumps_from(cfg: &Config, disabled: bool) -> RemotePumps {
    let p = &cfg.pumps;
    let runner = CommandRunner::new(p.program.clone(), p.args.clone(), p.temp_dir.clone());
    let mut pumps = RemotePumps::new(runner, &p.interpreter, &p.run_script, &p.abort_script);
    if disabled {
        pumps.disable();
    }
    pumps
}

fn shaker_from(cfg: &Config, disabled: bool) -> SerialShaker {
    let s = &cfg.shaker;
    let runner = CommandRunner::new(s.program.clone(), s.args.clone(), s.temp_dir.clone());
    let mut shaker = SerialShaker::new(runner, &s.start_template, &s.stop_command);
    if disabled {
        shaker.disable();
    }
    shaker
}

impl RunOptions {
    /// Pumps only log their commands in simulation or when asked to.
    pub fn pumps_disabled(&self) -> bool {
        self.simulate || self.no_pumps
    }

    pub fn shaker_disabled(&self) -> bool {
        self.simulate
    }

    fn simulated_deck(&self) -> bool {
        self.simulate || self.sim_deck
    }
}

/// Assemble the station for `opts`. Only the simulated robot and reader are
/// built in; a run without them fails with `BuildError::MissingRobot`.
pub fn build_station(cfg: &Config, opts: RunOptions, clock: SharedClock) -> Result<Station> {
    if !opts.simulated_deck() {
        return Err(BuildError::MissingRobot)
            .wrap_err("a live run needs a liquid handler backend");
    }
    if !opts.simulate {
        tracing::warn!(
            pumps_disabled = opts.pumps_disabled(),
            "simulated robot and reader on the real schedule"
        );
    }
    let readings = SimReadings {
        absorbance: cfg.simulation.absorbance,
        luminescence: cfg.simulation.luminescence,
    };
    let log_path = &cfg.measurements.path;
    tracing::info!(path = %log_path, "measurement log");

    Station::builder()
        .robot(SimulatedLiquidHandler::new())
        .reader(SimulatedReader::new(readings))
        .pumps(pumps_from(cfg, opts.pumps_disabled()))
        .shaker(shaker_from(cfg, opts.shaker_disabled()))
        .clock(clock)
        .measurement_log(JsonlLog::new(log_path))
        .experiment(ExperimentParams::from(&cfg.experiment))
        .controller(ControllerParams::from(&cfg.controller))
        .shaker_params(ShakerParams::from(&cfg.shaker))
        .equilibrated(opts.no_equilibrate)
        .try_build()
}

/// Start the deck and service it until `shutdown` is set or the firing limit
/// is reached.
pub fn run(cfg: &Config, opts: RunOptions, shutdown: &AtomicBool) -> Result<RunSummary> {
    let clock: SharedClock = Arc::new(MonotonicClock::new());
    let mut station = build_station(cfg, opts, clock.clone())?;
    let periods = ScheduleParams::from(cfg);

    let mut scheduler = Scheduler::new(clock).with_poll_interval(periods.poll_interval);
    if opts.simulate {
        tracing::warn!(
            period_ms = periods.sim_period.as_millis() as u64,
            "simulation mode: every routine runs on the short period"
        );
        scheduler = scheduler.simulate(periods.sim_period);
    }
    if let Some(n) = opts.max_firings {
        scheduler = scheduler.with_max_firings(n);
    }
    register_station(&mut scheduler, &periods);

    station.start_up()?;
    let summary = scheduler.run_until(&mut station, shutdown)?;
    tracing::info!(
        firings = summary.firings,
        reason = ?summary.reason,
        rounds_used = station.context().slots.rounds_used(),
        equilibrated = station.context().latch.is_equilibrated(),
        "run finished"
    );
    Ok(summary)
}

/// Build a simulated station from the config and run start-up once.
pub fn self_check(cfg: &Config) -> Result<()> {
    let opts = RunOptions {
        simulate: true,
        no_pumps: true,
        ..RunOptions::default()
    };
    let mut station = build_station(cfg, opts, Arc::new(MonotonicClock::new()))?;
    station.start_up().wrap_err("self-check start-up")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pump_disable_is_independent_of_the_deck_backend() {
        let live = RunOptions {
            sim_deck: true,
            ..RunOptions::default()
        };
        assert!(!live.pumps_disabled());
        assert!(!live.shaker_disabled());

        let no_pumps = RunOptions {
            no_pumps: true,
            ..live
        };
        assert!(no_pumps.pumps_disabled());
        assert!(!no_pumps.shaker_disabled());

        let sim = RunOptions {
            simulate: true,
            ..RunOptions::default()
        };
        assert!(sim.pumps_disabled() && sim.shaker_disabled());
    }

    #[test]
    fn live_deck_is_rejected_before_any_device_is_built() {
        let cfg = Config::default();
        let opts = RunOptions {
            no_pumps: true,
            ..RunOptions::default()
        };
        let err = build_station(&cfg, opts, Arc::new(MonotonicClock::new())).unwrap_err();
        assert_eq!(
            err.downcast_ref::<BuildError>(),
            Some(&BuildError::MissingRobot)
        );
    }
}
