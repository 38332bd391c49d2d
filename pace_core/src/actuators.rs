//! Range-checked handles for the shaker and the media pumps.

use std::sync::Arc;

use pace_config::{SHAKER_MAX_RPM, SHAKER_MIN_RPM};
use pace_traits::{Clock, Pumps, Shaker};
use tracing::{debug, info};

use crate::config::ShakerParams;
use crate::error::{PaceError, Result};
use crate::hw_error::HwResultExt;
use crate::shared::Shared;

const SHAKER: &str = "shaker";
const PUMPS: &str = "pumps";

/// Clock shared with background tasks.
pub type SharedClock = Arc<dyn Clock + Send + Sync>;

#[derive(Clone, Debug)]
pub struct ShakerControl {
    dev: Shared<dyn Shaker + Send>,
}

impl ShakerControl {
    pub fn new(dev: Box<dyn Shaker + Send>) -> Self {
        Self {
            dev: Shared::new(SHAKER, dev),
        }
    }

    /// Start (or change speed). Speeds the controller cannot hold are
    /// rejected before anything is sent.
    pub fn start(&self, rpm: u32) -> Result<()> {
        if !(SHAKER_MIN_RPM..=SHAKER_MAX_RPM).contains(&rpm) {
            return Err(PaceError::OutOfRange {
                what: "shaker rpm",
                value: f64::from(rpm),
                min: f64::from(SHAKER_MIN_RPM),
                max: f64::from(SHAKER_MAX_RPM),
            }
            .into());
        }
        debug!(rpm, "shaker start");
        self.dev.with(|d| d.start(rpm))?.hw(SHAKER, "start")
    }

    pub fn stop(&self) -> Result<()> {
        debug!("shaker stop");
        self.dev.with(|d| d.stop())?.hw(SHAKER, "stop")
    }

    /// Burst at vortex speed, then settle back to normal shaking.
    pub fn vortex(&self, params: &ShakerParams, clock: &dyn Clock) -> Result<()> {
        info!(rpm = params.vortex_rpm, ms = params.vortex.as_millis() as u64, "vortexing");
        self.start(params.vortex_rpm)?;
        clock.sleep(params.vortex);
        self.start(params.normal_rpm)
    }
}

#[derive(Clone, Debug)]
pub struct PumpControl {
    dev: Shared<dyn Pumps + Send>,
}

impl PumpControl {
    pub fn new(dev: Box<dyn Pumps + Send>) -> Self {
        Self {
            dev: Shared::new(PUMPS, dev),
        }
    }

    pub fn bleach_clean(&self) -> Result<()> {
        info!("bleaching media reservoir");
        self.dev.with(|d| d.bleach_clean())?.hw(PUMPS, "bleach_clean")
    }

    pub fn prime(&self) -> Result<()> {
        info!("priming pump lines");
        self.dev.with(|d| d.prime())?.hw(PUMPS, "prime")
    }

    pub fn refill(&self, ml: f64) -> Result<()> {
        check_ml(ml)?;
        info!(ml, "refilling media reservoir");
        self.dev.with(|d| d.refill(ml))?.hw(PUMPS, "refill")
    }

    pub fn empty(&self, ml: f64) -> Result<()> {
        check_ml(ml)?;
        info!(ml, "emptying media reservoir");
        self.dev.with(|d| d.empty(ml))?.hw(PUMPS, "empty")
    }
}

fn check_ml(ml: f64) -> std::result::Result<(), PaceError> {
    if !ml.is_finite() || ml <= 0.0 {
        return Err(PaceError::OutOfRange {
            what: "pump volume (mL)",
            value: ml,
            min: f64::MIN_POSITIVE,
            max: f64::MAX,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pace_hardware::{PumpCall, ShakerCall, SimulatedPumps, SimulatedShaker};
    use pace_traits::clock::test_clock::TestClock;
    use std::time::Duration;

    #[test]
    fn rpm_outside_controller_range_is_never_sent() {
        let sim = SimulatedShaker::new();
        let journal = sim.journal();
        let shaker = ShakerControl::new(Box::new(sim));
        for rpm in [0, 59, 3571] {
            let err = shaker.start(rpm).unwrap_err();
            assert!(matches!(
                err.downcast_ref::<PaceError>(),
                Some(PaceError::OutOfRange { .. })
            ));
        }
        assert!(journal.is_empty());
        shaker.start(60).unwrap();
        shaker.start(3570).unwrap();
        assert_eq!(journal.snapshot(), vec![ShakerCall::Start(60), ShakerCall::Start(3570)]);
    }

    #[test]
    fn vortex_returns_to_normal_speed() {
        let sim = SimulatedShaker::new();
        let journal = sim.journal();
        let shaker = ShakerControl::new(Box::new(sim));
        let clock = TestClock::new();
        shaker.vortex(&ShakerParams::default(), &clock).unwrap();
        assert_eq!(journal.snapshot(), vec![ShakerCall::Start(800), ShakerCall::Start(400)]);
        assert_eq!(clock.offset(), Duration::from_millis(3500));
    }

    #[test]
    fn refill_rejects_non_positive_volume() {
        let sim = SimulatedPumps::new();
        let journal = sim.journal();
        let pumps = PumpControl::new(Box::new(sim));
        assert!(pumps.refill(0.0).is_err());
        assert!(pumps.refill(f64::NAN).is_err());
        pumps.refill(28.8).unwrap();
        assert_eq!(journal.snapshot(), vec![PumpCall::Refill(28.8)]);
    }
}
