//! The two recurring service routines and the station that owns them.
//!
//! A [`Station`] bundles the devices ([`Rig`]), the deck layout, the
//! controller and the cross-call state ([`ServiceContext`]). Routines take
//! `&mut self`, so a routine can never start while another is running.

use eyre::WrapErr;
use pace_traits::{LiquidHandler, LiquidOptions, PlateReader, Pumps, Shaker};
use tracing::{debug, info};

use crate::actuators::{PumpControl, SharedClock, ShakerControl};
use crate::batch::{DilutionPlan, DilutionReport, dilute_turbidostats};
use crate::config::{ControllerParams, ExperimentParams, ShakerParams};
use crate::controller::FlowController;
use crate::error::{BuildError, PaceError, Result};
use crate::latch::EquilibrationLatch;
use crate::layout::{Deck, ReaderSlot, ReaderSlots};
use crate::measurement::{DataType, MeasurementLog, Vessel, records_from_plate};
use crate::robot::{Reader, Robot, WashStation, read_plate};
use crate::task::{self, Step};

/// Fan speed for the hood's HEPA unit.
pub const HEPA_FAN_SPEED: u8 = 15;
/// Height above the reader well bottom when dispensing samples.
const READ_DISPENSE_HEIGHT_MM: f64 = 5.0;
/// Height of the bleach chamber dispense.
const WASTE_DISPENSE_HEIGHT_MM: f64 = 10.0;
/// Aspirate height when drawing culture for the lagoons.
const TURB_DRAW_HEIGHT_MM: f64 = 4.0;
/// Sample aspiration sits this far below the fixed liquid level.
const SAMPLE_DEPTH_MM: f64 = 3.0;
const LAGOON_MIX_CYCLES: u32 = 2;
const LAGOON_MIX_VOL_UL: f64 = 500.0;

/// Devices a routine drives. Cheap to clone; clones share the devices.
#[derive(Clone)]
pub struct Rig {
    pub robot: Robot,
    pub reader: Reader,
    pub pumps: PumpControl,
    pub shaker: ShakerControl,
    pub clock: SharedClock,
}

impl std::fmt::Debug for Rig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rig")
            .field("robot", &self.robot)
            .field("reader", &self.reader)
            .field("pumps", &self.pumps)
            .field("shaker", &self.shaker)
            .finish_non_exhaustive()
    }
}

/// State carried from one routine firing to the next.
pub struct ServiceContext {
    pub latch: EquilibrationLatch,
    pub slots: ReaderSlots,
    pub log: Box<dyn MeasurementLog + Send>,
}

/// Where a routine is within its current firing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServicePhase {
    Idle,
    Sample,
    Transfer,
    Cleanup,
    Done,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ServiceOutcome {
    /// Turbidostats serviced; carries the controller decisions.
    Diluted(DilutionReport),
    /// Lagoons fed and read.
    Fed,
    /// Lagoons not serviced because the turbidostats have not equilibrated.
    Skipped,
}

pub struct Station {
    rig: Rig,
    deck: Deck,
    controller: FlowController,
    experiment: ExperimentParams,
    shaker_params: ShakerParams,
    ctx: ServiceContext,
    phase: ServicePhase,
}

impl std::fmt::Debug for Station {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Station")
            .field("vessels", &self.deck.vessel_count())
            .field("equilibrated", &self.ctx.latch.is_equilibrated())
            .field("rounds_used", &self.ctx.slots.rounds_used())
            .field("phase", &self.phase)
            .finish()
    }
}

impl Station {
    pub fn builder() -> StationBuilder {
        StationBuilder::default()
    }

    pub fn context(&self) -> &ServiceContext {
        &self.ctx
    }

    pub fn rig(&self) -> &Rig {
        &self.rig
    }

    pub fn deck(&self) -> &Deck {
        &self.deck
    }

    pub fn experiment(&self) -> &ExperimentParams {
        &self.experiment
    }

    pub fn phase(&self) -> ServicePhase {
        self.phase
    }

    fn enter(&mut self, phase: ServicePhase) {
        debug!(from = ?self.phase, to = ?phase, "service phase");
        self.phase = phase;
    }

    fn wash_station(&self) -> WashStation {
        WashStation {
            bleach_site: self.deck.bleach_site.clone(),
            rinse_site: self.deck.rinse_site.clone(),
            wash_vol_ul: self.experiment.wash_vol_ul(),
            rinse_cycles: self.experiment.rinse_cycles,
        }
    }

    fn plate_id(&self, slot: &ReaderSlot) -> String {
        format!("{} plate {}", self.experiment.name, slot.plate_index)
    }

    /// Background bleach of the tips on the 96 head, racking them back at
    /// `rack`. Runs while the reader measures.
    fn bleach_task(&self, rack: &pace_traits::Labware) -> Step {
        let robot = self.rig.robot.clone();
        let wash = self.wash_station();
        let rack = rack.clone();
        Box::new(move || robot.bleach_mounted_tips(&wash, Some(&rack)))
    }

    /// Bring the deck up: initialize the robot while the shaker starts and
    /// the pump lines prime, then switch on the HEPA fan.
    pub fn start_up(&mut self) -> Result<()> {
        info!(vessels = self.deck.vessel_count(), "starting up");
        let robot = self.rig.robot.clone();
        let init = task::spawn("robot initialize", move || robot.initialize());
        self.rig
            .shaker
            .start(self.shaker_params.normal_rpm)
            .wrap_err("start-up: start shaker")?;
        self.rig.pumps.prime().wrap_err("start-up: prime pump lines")?;
        init.join().wrap_err("start-up: initialize robot")?;
        self.rig
            .robot
            .hepa_on(HEPA_FAN_SPEED)
            .wrap_err("start-up: HEPA fan")?;
        Ok(())
    }

    /// Sample every turbidostat, read OD, dilute toward the setpoint and
    /// bring each vessel back to constant volume.
    pub fn service_turbidostats(&mut self) -> Result<ServiceOutcome> {
        info!(vessels = self.deck.vessel_count(), "servicing turbidostats");
        self.enter(ServicePhase::Sample);
        let result = self.turbidostat_round();
        self.enter(if result.is_ok() {
            ServicePhase::Done
        } else {
            ServicePhase::Idle
        });
        result.wrap_err("turbidostat service")
    }

    fn turbidostat_round(&mut self) -> Result<ServiceOutcome> {
        let rig = self.rig.clone();
        let deck = self.deck.clone();
        let exp = self.experiment.clone();
        let normal_rpm = self.shaker_params.normal_rpm;

        info!("sampling turbidostats into reader plate");
        rig.robot.pick_up_tips_96(&deck.turb_tips)?;
        rig.shaker.stop()?;
        rig.robot.aspirate_96(
            &deck.turbidostats,
            exp.read_sample_vol_ul,
            &LiquidOptions::at_height(exp.turb_height_mm() - SAMPLE_DEPTH_MM).following(),
        )?;
        rig.shaker.start(normal_rpm)?;
        let slot = self.ctx.slots.next_slot()?;
        rig.robot.dispense_96(
            &slot.site,
            exp.read_sample_vol_ul,
            &LiquidOptions::at_height(READ_DISPENSE_HEIGHT_MM).blowout(),
        )?;

        let media_fill = {
            let clean = rig.pumps.clone();
            let refill = rig.pumps.clone();
            let ml = exp.media_supply_ml();
            task::spawn_sequence(
                "media reservoir",
                vec![
                    Box::new(move || clean.bleach_clean()) as Step,
                    Box::new(move || refill.refill(ml)) as Step,
                ],
            )
        };

        let abs_protocol = exp.abs_protocol.as_str();
        let tables = read_plate(
            &rig.robot,
            &rig.reader,
            &deck.reader_tray,
            &slot.plate,
            &[abs_protocol],
            &self.plate_id(&slot),
            Some(self.bleach_task(&deck.turb_tips)),
        )?;
        let abs = tables.first().ok_or_else(|| PaceError::MissingReading {
            protocol: exp.abs_protocol.clone(),
        })?;
        let records =
            records_from_plate(abs, &DataType::Abs, &slot.plate, &slot.wells, Vessel::Turbidostat)?;
        self.ctx.log.append(&records)?;

        self.enter(ServicePhase::Transfer);
        let plan = DilutionPlan {
            robot: &rig.robot,
            shaker: &rig.shaker,
            deck: &deck,
            controller: &self.controller,
            experiment: &exp,
            normal_rpm,
        };
        let report = dilute_turbidostats(&plan, abs, &slot, Some(media_fill))?;
        if self.ctx.latch.record_cycle_result(report.all_acceptable) {
            info!(">>>>>>>>>> turbidostats have equilibrated <<<<<<<<<<");
        }

        self.enter(ServicePhase::Cleanup);
        info!("removing liquid from turbidostats down to constant volume");
        rig.robot.pick_up_tips_96(&deck.turb_corral)?;
        rig.shaker.stop()?;
        let excess = exp.excess_vol_ul();
        rig.robot.aspirate_96(
            &deck.turbidostats,
            excess,
            &LiquidOptions::at_height(exp.turb_height_mm()),
        )?;
        let vortex = {
            let shaker = rig.shaker.clone();
            let clock = rig.clock.clone();
            let params = self.shaker_params.clone();
            task::spawn("vortex", move || shaker.vortex(&params, clock.as_ref()))
        };
        rig.robot.dispense_96(
            &deck.bleach_site,
            excess,
            &LiquidOptions::at_height(WASTE_DISPENSE_HEIGHT_MM).blowout(),
        )?;
        info!("bleaching tips and re-racking");
        rig.robot
            .bleach_mounted_tips(&self.wash_station(), Some(&deck.turb_tips))?;
        vortex.join()?;
        info!("done servicing turbidostats");
        Ok(ServiceOutcome::Diluted(report))
    }

    /// Feed each lagoon from its turbidostat and read luminescence and
    /// absorbance. Skipped until the turbidostats have equilibrated.
    pub fn service_lagoons(&mut self) -> Result<ServiceOutcome> {
        if !self.ctx.latch.is_equilibrated() {
            info!("not yet equilibrated, lagoons not serviced");
            return Ok(ServiceOutcome::Skipped);
        }
        info!(vessels = self.deck.vessel_count(), "servicing lagoons");
        self.enter(ServicePhase::Transfer);
        let result = self.lagoon_round();
        self.enter(if result.is_ok() {
            ServicePhase::Done
        } else {
            ServicePhase::Idle
        });
        result.wrap_err("lagoon service")
    }

    fn lagoon_round(&mut self) -> Result<ServiceOutcome> {
        let rig = self.rig.clone();
        let deck = self.deck.clone();
        let exp = self.experiment.clone();

        info!("moving fresh bacteria into lagoons");
        rig.robot.pick_up_tips_96(&deck.lagoon_tips)?;
        rig.shaker.stop()?;
        rig.robot.aspirate_96(
            &deck.turbidostats,
            exp.cycle_replace_vol_ul,
            &LiquidOptions::at_height(TURB_DRAW_HEIGHT_MM),
        )?;
        rig.shaker.start(self.shaker_params.normal_rpm)?;
        rig.robot.dispense_96(
            &deck.lagoons,
            exp.cycle_replace_vol_ul,
            &LiquidOptions::at_height(exp.lagoon_fly_height_mm()).blowout(),
        )?;

        self.enter(ServicePhase::Sample);
        info!("removing liquid from lagoons to reader plate");
        rig.robot.aspirate_96(
            &deck.lagoons,
            exp.read_sample_vol_ul,
            &LiquidOptions::at_height(exp.lagoon_height_mm - SAMPLE_DEPTH_MM)
                .following()
                .mixing(LAGOON_MIX_CYCLES, LAGOON_MIX_VOL_UL),
        )?;
        let slot = self.ctx.slots.next_slot()?;
        rig.robot.dispense_96(
            &slot.site,
            exp.read_sample_vol_ul,
            &LiquidOptions::at_height(READ_DISPENSE_HEIGHT_MM).blowout(),
        )?;

        self.enter(ServicePhase::Cleanup);
        let excess = exp.excess_vol_ul();
        rig.robot.aspirate_96(
            &deck.lagoons,
            excess,
            &LiquidOptions::at_height(exp.lagoon_height_mm),
        )?;
        rig.robot.dispense_96(
            &deck.bleach_site,
            excess,
            &LiquidOptions::at_height(WASTE_DISPENSE_HEIGHT_MM).blowout(),
        )?;

        let protocols = [exp.lum_protocol.as_str(), exp.abs_protocol.as_str()];
        let tables = read_plate(
            &rig.robot,
            &rig.reader,
            &deck.reader_tray,
            &slot.plate,
            &protocols,
            &self.plate_id(&slot),
            Some(self.bleach_task(&deck.lagoon_tips)),
        )?;
        for (table, data_type) in tables.iter().zip([DataType::Lum, DataType::Abs]) {
            let records =
                records_from_plate(table, &data_type, &slot.plate, &slot.wells, Vessel::Lagoon)?;
            self.ctx.log.append(&records)?;
        }
        rig.reader.plate_in(false)?;
        info!("done servicing lagoons");
        Ok(ServiceOutcome::Fed)
    }
}

/// Builder for `Station`. Devices are required; everything else defaults.
#[derive(Default)]
pub struct StationBuilder {
    robot: Option<Box<dyn LiquidHandler + Send>>,
    reader: Option<Box<dyn PlateReader + Send>>,
    pumps: Option<Box<dyn Pumps + Send>>,
    shaker: Option<Box<dyn Shaker + Send>>,
    clock: Option<SharedClock>,
    log: Option<Box<dyn MeasurementLog + Send>>,
    experiment: Option<ExperimentParams>,
    controller: Option<ControllerParams>,
    shaker_params: Option<ShakerParams>,
    equilibrated: bool,
}

impl StationBuilder {
    pub fn robot(mut self, robot: impl LiquidHandler + Send + 'static) -> Self {
        self.robot = Some(Box::new(robot));
        self
    }

    pub fn reader(mut self, reader: impl PlateReader + Send + 'static) -> Self {
        self.reader = Some(Box::new(reader));
        self
    }

    pub fn pumps(mut self, pumps: impl Pumps + Send + 'static) -> Self {
        self.pumps = Some(Box::new(pumps));
        self
    }

    pub fn shaker(mut self, shaker: impl Shaker + Send + 'static) -> Self {
        self.shaker = Some(Box::new(shaker));
        self
    }

    pub fn clock(mut self, clock: SharedClock) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn measurement_log(mut self, log: impl MeasurementLog + Send + 'static) -> Self {
        self.log = Some(Box::new(log));
        self
    }

    pub fn experiment(mut self, exp: ExperimentParams) -> Self {
        self.experiment = Some(exp);
        self
    }

    pub fn controller(mut self, params: ControllerParams) -> Self {
        self.controller = Some(params);
        self
    }

    pub fn shaker_params(mut self, params: ShakerParams) -> Self {
        self.shaker_params = Some(params);
        self
    }

    /// Start with the equilibration latch already set.
    pub fn equilibrated(mut self, yes: bool) -> Self {
        self.equilibrated = yes;
        self
    }

    pub fn try_build(self) -> Result<Station> {
        let robot = self.robot.ok_or(BuildError::MissingRobot)?;
        let reader = self.reader.ok_or(BuildError::MissingReader)?;
        let pumps = self.pumps.ok_or(BuildError::MissingPumps)?;
        let shaker = self.shaker.ok_or(BuildError::MissingShaker)?;
        let experiment = self.experiment.unwrap_or_default();
        if experiment.vessel_count == 0 {
            return Err(BuildError::InvalidConfig("vessel_count must be >= 1").into());
        }
        if experiment.reader_plates == 0 {
            return Err(BuildError::InvalidConfig("reader_plates must be >= 1").into());
        }
        let deck = Deck::new(experiment.vessel_count)?;
        let slots = ReaderSlots::new(experiment.reader_plates, experiment.vessel_count)?;
        let clock = self
            .clock
            .unwrap_or_else(|| std::sync::Arc::new(pace_traits::MonotonicClock::new()));
        let log = self
            .log
            .unwrap_or_else(|| Box::new(crate::measurement::MemoryLog::new()));

        Ok(Station {
            rig: Rig {
                robot: Robot::new(robot),
                reader: Reader::new(reader),
                pumps: PumpControl::new(pumps),
                shaker: ShakerControl::new(shaker),
                clock,
            },
            deck,
            controller: FlowController::new(self.controller.unwrap_or_default()),
            experiment,
            shaker_params: self.shaker_params.unwrap_or_default(),
            ctx: ServiceContext {
                latch: if self.equilibrated {
                    EquilibrationLatch::preset()
                } else {
                    EquilibrationLatch::new()
                },
                slots,
                log,
            },
            phase: ServicePhase::Idle,
        })
    }
}
