//! `From` implementations bridging `pace_config` types to `pace_core` types.

use std::time::Duration;

use crate::config::{ControllerParams, ExperimentParams, ScheduleParams, ShakerParams};

// ── ControllerParams ─────────────────────────────────────────────────────────

impl From<&pace_config::ControllerCfg> for ControllerParams {
    fn from(c: &pace_config::ControllerCfg) -> Self {
        Self {
            target_od: c.target_od,
            margin: c.margin,
            max_od: c.max_od,
            min_od: c.min_od,
            max_rate: c.max_rate,
            decrease_rate: c.decrease_rate,
            increase_rate: c.increase_rate,
            od_slope: c.od_slope,
            od_intercept: c.od_intercept,
            acceptable_od: c.acceptable_od,
        }
    }
}

// ── ExperimentParams ─────────────────────────────────────────────────────────

impl From<&pace_config::ExperimentCfg> for ExperimentParams {
    fn from(c: &pace_config::ExperimentCfg) -> Self {
        Self {
            name: c.name.clone(),
            vessel_count: c.vessel_count,
            reader_plates: c.reader_plates,
            turb_vol_ul: c.turb_vol_ul,
            turb_cycles_per_hour: c.turb_cycles_per_hour,
            read_sample_vol_ul: c.read_sample_vol_ul,
            max_transfer_vol_ul: c.max_transfer_vol_ul,
            cycle_replace_vol_ul: c.cycle_replace_vol_ul,
            media_ml_per_vessel: c.media_ml_per_vessel,
            lagoon_height_mm: c.lagoon_height_mm,
            rinse_cycles: c.rinse_cycles,
            abs_protocol: c.abs_protocol.clone(),
            lum_protocol: c.lum_protocol.clone(),
            control_vessels: c.control_vessels.clone(),
        }
    }
}

// ── ShakerParams ─────────────────────────────────────────────────────────────

impl From<&pace_config::ShakerCfg> for ShakerParams {
    fn from(c: &pace_config::ShakerCfg) -> Self {
        Self {
            normal_rpm: c.normal_rpm,
            vortex_rpm: c.vortex_rpm,
            vortex: Duration::from_millis(c.vortex_ms),
        }
    }
}

// ── ScheduleParams ───────────────────────────────────────────────────────────

impl From<&pace_config::Config> for ScheduleParams {
    fn from(c: &pace_config::Config) -> Self {
        let cycles = f64::from(c.experiment.turb_cycles_per_hour.max(1));
        Self {
            turbidostat_period: Duration::from_secs_f64(3600.0 / cycles),
            lagoon_period: Duration::from_secs(c.experiment.generation_time_s),
            poll_interval: Duration::from_millis(c.schedule.poll_ms),
            sim_period: Duration::from_millis(c.schedule.sim_period_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_maps_to_default_params() {
        let cfg = pace_config::Config::default();
        assert_eq!(ControllerParams::from(&cfg.controller), ControllerParams::default());
        assert_eq!(ShakerParams::from(&cfg.shaker), ShakerParams::default());
        assert_eq!(ScheduleParams::from(&cfg), ScheduleParams::default());
        let exp = ExperimentParams::from(&cfg.experiment);
        assert_eq!(exp.vessel_count, 24);
        assert!((exp.media_supply_ml() - 28.8).abs() < 1e-9);
    }

    #[test]
    fn turbidostat_period_keeps_fractional_seconds() {
        let mut cfg = pace_config::Config::default();
        cfg.experiment.turb_cycles_per_hour = 7;
        let periods = ScheduleParams::from(&cfg);
        let secs = periods.turbidostat_period.as_secs_f64();
        assert!((secs - 3600.0 / 7.0).abs() < 1e-6, "period {secs}");
        assert!(secs > 514.28);
    }
}
