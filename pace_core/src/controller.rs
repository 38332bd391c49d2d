//! Turbidostat flow-rate controller.
//!
//! Maps a measured optical density to a dilution rate in culture volumes per
//! hour, then to the volume added per service round. All functions are pure.

use crate::config::{ControllerParams, ExperimentParams};

#[derive(Debug, Clone, Default)]
pub struct FlowController {
    params: ControllerParams,
}

impl FlowController {
    pub fn new(params: ControllerParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &ControllerParams {
        &self.params
    }

    /// Banded policy, first match wins: saturate above `max_od`, slow the
    /// culture down above the dead band, stop diluting below `min_od`, speed up
    /// below the dead band, otherwise the mean of the two adjustment rates.
    pub fn flow_rate(&self, od: f64) -> f64 {
        let p = &self.params;
        if od > p.max_od {
            p.max_rate
        } else if od > p.target_od + p.margin {
            p.decrease_rate
        } else if od < p.min_od {
            0.0
        } else if od < p.target_od - p.margin {
            p.increase_rate
        } else {
            (p.increase_rate + p.decrease_rate) / 2.0
        }
    }

    /// Linear absorbance calibration.
    pub fn absorbance_to_od(&self, absorbance: f64) -> f64 {
        self.params.od_slope * absorbance + self.params.od_intercept
    }

    pub fn acceptable_od(&self, od: f64) -> bool {
        od > self.params.acceptable_od
    }

    /// Volume in µL that realizes `rate` over one service round.
    pub fn replacement_volume(&self, rate: f64, exp: &ExperimentParams) -> f64 {
        rate * exp.turb_vol_ul / f64::from(exp.turb_cycles_per_hour.max(1))
    }

    /// Volume actually added: never less than two read samples, so the next
    /// round still has liquid to sample.
    pub fn dilution_volume(&self, rate: f64, exp: &ExperimentParams) -> f64 {
        self.replacement_volume(rate, exp)
            .max(2.0 * exp.read_sample_vol_ul)
    }

    /// Absorbance straight to the dilution volume.
    pub fn volume_for_absorbance(&self, absorbance: f64, exp: &ExperimentParams) -> Setpoint {
        let od = self.absorbance_to_od(absorbance);
        let rate = self.flow_rate(od);
        Setpoint {
            absorbance,
            od,
            rate,
            volume_ul: self.dilution_volume(rate, exp),
            acceptable: self.acceptable_od(od),
        }
    }
}

/// One controller decision, kept whole for logging.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Setpoint {
    pub absorbance: f64,
    pub od: f64,
    pub rate: f64,
    pub volume_ul: f64,
    pub acceptable: bool,
}
