//! Runtime configuration used by the orchestrator.
//!
//! These are separate from the TOML-deserialized config in `pace_config`;
//! see `conversions` for the bridge.

use std::time::Duration;

/// Flow controller and OD calibration parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerParams {
    pub target_od: f64,
    pub margin: f64,
    pub max_od: f64,
    pub min_od: f64,
    /// Culture volumes per hour above `max_od`.
    pub max_rate: f64,
    pub decrease_rate: f64,
    pub increase_rate: f64,
    pub od_slope: f64,
    pub od_intercept: f64,
    pub acceptable_od: f64,
}

impl Default for ControllerParams {
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

/// Volumes, heights and reader protocols for one experiment.
#[derive(Debug, Clone, PartialEq)]
pub struct ExperimentParams {
    /// Prefix for reader plate ids.
    pub name: String,
    pub vessel_count: usize,
    pub reader_plates: usize,
    pub turb_vol_ul: f64,
    pub turb_cycles_per_hour: u32,
    pub read_sample_vol_ul: f64,
    pub max_transfer_vol_ul: f64,
    pub cycle_replace_vol_ul: f64,
    pub media_ml_per_vessel: f64,
    pub lagoon_height_mm: f64,
    pub rinse_cycles: u32,
    pub abs_protocol: String,
    pub lum_protocol: String,
    /// Vessels without bacteria; their OD does not hold back equilibration.
    pub control_vessels: Vec<usize>,
}

impl Default for ExperimentParams {
    fn default() -> Self {
        Self {
            name: "personal_turbs".into(),
            vessel_count: 24,
            reader_plates: 7,
            turb_vol_ul: 1000.0,
            turb_cycles_per_hour: 6,
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

impl ExperimentParams {
    /// Liquid height of a full turbidostat. 1.3 mL measured 9 mm in the
    /// 24-well plate; other volumes scale linearly.
    pub fn turb_height_mm(&self) -> f64 {
        9.0 / 1300.0 * self.turb_vol_ul
    }

    /// Dispense height above a full turbidostat.
    pub fn turb_fly_height_mm(&self) -> f64 {
        self.turb_height_mm() + 5.0
    }

    pub fn lagoon_fly_height_mm(&self) -> f64 {
        self.lagoon_height_mm + 15.0
    }

    /// Media the reservoir is refilled with per turbidostat round, in mL.
    pub fn media_supply_ml(&self) -> f64 {
        self.vessel_count as f64 * self.media_ml_per_vessel
    }

    /// Volume pulled off to bring vessels back down to constant volume.
    pub fn excess_vol_ul(&self) -> f64 {
        self.max_transfer_vol_ul * 0.8
    }

    /// Rinse volume used in the wash station.
    pub fn wash_vol_ul(&self) -> f64 {
        self.max_transfer_vol_ul
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShakerParams {
    pub normal_rpm: u32,
    pub vortex_rpm: u32,
    pub vortex: Duration,
}

impl Default for ShakerParams {
    fn default() -> Self {
        Self {
            normal_rpm: 400,
            vortex_rpm: 800,
            vortex: Duration::from_millis(3500),
        }
    }
}

/// Periods for the two recurring service routines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleParams {
    pub turbidostat_period: Duration,
    pub lagoon_period: Duration,
    pub poll_interval: Duration,
    /// Replaces both periods when simulating.
    pub sim_period: Duration,
}

impl Default for ScheduleParams {
    fn default() -> Self {
        Self {
            turbidostat_period: Duration::from_secs(600),
            lagoon_period: Duration::from_secs(1800),
            poll_interval: Duration::from_millis(200),
            sim_period: Duration::from_secs(1),
        }
    }
}
