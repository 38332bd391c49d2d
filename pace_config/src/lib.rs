#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schema for the continuous-culture rig.
//!
//! Every section has defaults matching the 24-vessel deck, so an empty file is
//! a valid configuration. `Config::validate` rejects values the rig cannot
//! physically honor before any hardware is touched.
use serde::Deserialize;

/// Shaker speed limits accepted by the orbital shaker controller.
pub const SHAKER_MIN_RPM: u32 = 60;
pub const SHAKER_MAX_RPM: u32 = 3570;
/// Largest logical vessel grid the deck layout supports.
pub const MAX_VESSELS: usize = 24;

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ExperimentCfg {
    /// Prefix for reader plate ids.
    pub name: String,
    pub vessel_count: usize,
    /// Reader plates on deck; each is used for four service rounds.
    pub reader_plates: usize,
    pub turb_vol_ul: f64,
    pub turb_cycles_per_hour: u32,
    /// Lagoon service period in seconds.
    pub generation_time_s: u64,
    pub read_sample_vol_ul: f64,
    pub max_transfer_vol_ul: f64,
    /// Volume moved from each turbidostat into its lagoon per lagoon service.
    pub cycle_replace_vol_ul: f64,
    /// Media refilled into the reservoir per vessel, in mL.
    pub media_ml_per_vessel: f64,
    pub lagoon_height_mm: f64,
    pub rinse_cycles: u32,
    pub abs_protocol: String,
    pub lum_protocol: String,
    /// Vessels without bacteria, excluded from the equilibration check.
    pub control_vessels: Vec<usize>,
}

impl Default for ExperimentCfg {
    fn default() -> Self {
        Self {
            name: "personal_turbs".into(),
            vessel_count: 24,
            reader_plates: 7,
            turb_vol_ul: 1000.0,
            turb_cycles_per_hour: 6,
            generation_time_s: 30 * 60,
            read_sample_vol_ul: 100.0,
            max_transfer_vol_ul: 985.0,
            cycle_replace_vol_ul: 187.5,
            media_ml_per_vessel: 1.2,
            lagoon_height_mm: 19.0,
            rinse_cycles: 4,
            abs_protocol: "17_8_12_abs".into(),
            lum_protocol: "17_8_12_lum".into(),
            control_vessels: Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ControllerCfg {
    pub target_od: f64,
    pub margin: f64,
    pub max_od: f64,
    pub min_od: f64,
    /// Flow rate (culture volumes per hour) above `max_od`.
    pub max_rate: f64,
    pub decrease_rate: f64,
    pub increase_rate: f64,
    /// Linear absorbance-to-OD calibration: `od = od_slope * abs + od_intercept`.
    pub od_slope: f64,
    pub od_intercept: f64,
    /// A vessel counts as grown once its OD exceeds this.
    pub acceptable_od: f64,
}

impl Default for ControllerCfg {
    fn default() -> Self {
        Self {
            target_od: 0.45,
            margin: 0.05,
            max_od: 0.7,
            min_od: 0.2,
            max_rate: 3.8,
            decrease_rate: 3.8,
            increase_rate: 1.5,
            od_slope: 4.171_943_074,
            od_intercept: -0.107_575_031_7,
            acceptable_od: 0.2,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ScheduleCfg {
    /// Sleep between scheduler polls when nothing is due.
    pub poll_ms: u64,
    /// Period used for every routine under `--simulate`.
    pub sim_period_ms: u64,
}

impl Default for ScheduleCfg {
    fn default() -> Self {
        Self {
            poll_ms: 200,
            sim_period_ms: 1000,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ShakerCfg {
    pub normal_rpm: u32,
    pub vortex_rpm: u32,
    /// How long the vortex burst lasts after excess removal.
    pub vortex_ms: u64,
    /// Helper program that pushes a command file down the serial line.
    pub program: String,
    /// Arguments for `program`; `{file}` is replaced by the command file path.
    pub args: Vec<String>,
    /// `{rpm}` is replaced by the requested speed.
    pub start_template: String,
    pub stop_command: String,
    pub temp_dir: String,
}

impl Default for ShakerCfg {
    fn default() -> Self {
        Self {
            normal_rpm: 400,
            vortex_rpm: 800,
            vortex_ms: 3500,
            program: "plink_serial.bat".into(),
            args: vec!["serial.bat".into(), "shaker".into(), "{file}".into()],
            start_template: "SET SPEED {rpm}\rSTART".into(),
            stop_command: "STOP".into(),
            temp_dir: "tmp/shaker".into(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct PumpsCfg {
    /// Remote shell used to reach the pump controller.
    pub program: String,
    /// Arguments for `program`; `{file}` is replaced by the command file path.
    pub args: Vec<String>,
    pub interpreter: String,
    pub run_script: String,
    pub abort_script: String,
    pub temp_dir: String,
}

impl Default for PumpsCfg {
    fn default() -> Self {
        Self {
            program: "plink".into(),
            args: vec!["pumps".into(), "-m".into(), "{file}".into()],
            interpreter: "python".into(),
            run_script: "auxpump/run.py".into(),
            abort_script: "auxpump/abort.sh".into(),
            temp_dir: "tmp/pumps".into(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct MeasurementsCfg {
    /// JSON-lines measurement log, appended to across runs.
    pub path: String,
}

impl Default for MeasurementsCfg {
    fn default() -> Self {
        Self {
            path: "measurements.jsonl".into(),
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SimulationCfg {
    pub absorbance: f64,
    pub luminescence: f64,
}

impl Default for SimulationCfg {
    fn default() -> Self {
        Self {
            absorbance: 0.134,
            luminescence: 1200.0,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub experiment: ExperimentCfg,
    pub controller: ControllerCfg,
    pub schedule: ScheduleCfg,
    pub shaker: ShakerCfg,
    pub pumps: PumpsCfg,
    pub measurements: MeasurementsCfg,
    pub logging: Logging,
    pub simulation: SimulationCfg,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

pub fn load_file(path: &std::path::Path) -> eyre::Result<Config> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| eyre::eyre!("read config {}: {}", path.display(), e))?;
    let cfg = load_toml(&text).map_err(|e| eyre::eyre!("parse config {}: {}", path.display(), e))?;
    cfg.validate()?;
    Ok(cfg)
}

fn positive(v: f64) -> bool {
    v.is_finite() && v > 0.0
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Experiment
        let e = &self.experiment;
        if e.vessel_count == 0 || e.vessel_count > MAX_VESSELS {
            eyre::bail!("experiment.vessel_count must be in [1, {MAX_VESSELS}]");
        }
        if e.reader_plates == 0 {
            eyre::bail!("experiment.reader_plates must be >= 1");
        }
        if !positive(e.turb_vol_ul) {
            eyre::bail!("experiment.turb_vol_ul must be > 0");
        }
        if e.turb_cycles_per_hour == 0 {
            eyre::bail!("experiment.turb_cycles_per_hour must be >= 1");
        }
        if e.generation_time_s == 0 {
            eyre::bail!("experiment.generation_time_s must be >= 1");
        }
        if !positive(e.read_sample_vol_ul) {
            eyre::bail!("experiment.read_sample_vol_ul must be > 0");
        }
        if !positive(e.max_transfer_vol_ul) || e.max_transfer_vol_ul > 1000.0 {
            eyre::bail!("experiment.max_transfer_vol_ul must be in (0, 1000]");
        }
        if !positive(e.cycle_replace_vol_ul) || e.cycle_replace_vol_ul > e.max_transfer_vol_ul {
            eyre::bail!("experiment.cycle_replace_vol_ul must be in (0, max_transfer_vol_ul]");
        }
        if 2.0 * e.read_sample_vol_ul > e.max_transfer_vol_ul {
            eyre::bail!("experiment.read_sample_vol_ul must be at most half of max_transfer_vol_ul");
        }
        if !positive(e.media_ml_per_vessel) {
            eyre::bail!("experiment.media_ml_per_vessel must be > 0");
        }
        if !positive(e.lagoon_height_mm) {
            eyre::bail!("experiment.lagoon_height_mm must be > 0");
        }
        if e.abs_protocol.trim().is_empty() || e.lum_protocol.trim().is_empty() {
            eyre::bail!("experiment.abs_protocol and experiment.lum_protocol must be set");
        }
        if let Some(v) = e.control_vessels.iter().find(|&&v| v >= e.vessel_count) {
            eyre::bail!(
                "experiment.control_vessels entry {v} is not below vessel_count {}",
                e.vessel_count
            );
        }

        // Controller
        let c = &self.controller;
        let all_finite = [
            c.target_od,
            c.margin,
            c.max_od,
            c.min_od,
            c.max_rate,
            c.decrease_rate,
            c.increase_rate,
            c.od_slope,
            c.od_intercept,
            c.acceptable_od,
        ]
        .iter()
        .all(|v| v.is_finite());
        if !all_finite {
            eyre::bail!("controller values must be finite");
        }
        if c.margin < 0.0 {
            eyre::bail!("controller.margin must be >= 0");
        }
        if !(c.min_od < c.target_od && c.target_od < c.max_od) {
            eyre::bail!("controller requires min_od < target_od < max_od");
        }
        if c.max_rate < 0.0 || c.decrease_rate < 0.0 || c.increase_rate < 0.0 {
            eyre::bail!("controller rates must be >= 0");
        }
        if c.od_slope == 0.0 {
            eyre::bail!("controller.od_slope must be non-zero");
        }

        // Schedule
        if self.schedule.poll_ms == 0 {
            eyre::bail!("schedule.poll_ms must be >= 1");
        }
        if self.schedule.sim_period_ms == 0 {
            eyre::bail!("schedule.sim_period_ms must be >= 1");
        }

        // Shaker
        let s = &self.shaker;
        for (field, rpm) in [("normal_rpm", s.normal_rpm), ("vortex_rpm", s.vortex_rpm)] {
            if !(SHAKER_MIN_RPM..=SHAKER_MAX_RPM).contains(&rpm) {
                eyre::bail!("shaker.{field} must be in [{SHAKER_MIN_RPM}, {SHAKER_MAX_RPM}]");
            }
        }
        if s.vortex_ms > 60_000 {
            eyre::bail!("shaker.vortex_ms is unreasonably large (>60s)");
        }
        if s.program.trim().is_empty() {
            eyre::bail!("shaker.program must be set");
        }

        // Pumps
        if self.pumps.program.trim().is_empty() {
            eyre::bail!("pumps.program must be set");
        }

        // Measurements
        if self.measurements.path.trim().is_empty() {
            eyre::bail!("measurements.path must be set");
        }

        // Logging
        if let Some(rotation) = self.logging.rotation.as_deref()
            && !matches!(rotation, "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never|daily|hourly");
        }

        // Simulation
        if !self.simulation.absorbance.is_finite() || !self.simulation.luminescence.is_finite() {
            eyre::bail!("simulation readings must be finite");
        }

        Ok(())
    }
}
