//! Validated, logged access to the liquid handler and the plate reader.
//!
//! Every batched call checks channel alignment before anything reaches the
//! device, and every device error leaves here as `PaceError::Hardware` with
//! the component and operation attached.

use eyre::WrapErr;
use pace_traits::{Channel, Labware, LiquidHandler, LiquidOptions, PlateData, PlateReader, Position};
use tracing::{debug, info};

use crate::batch::check_channels;
use crate::error::{PaceError, Result};
use crate::hw_error::HwResultExt;
use crate::layout::CHANNELS;
use crate::shared::Shared;
use crate::task::{self, Step};

const ROBOT: &str = "robot";
const READER: &str = "reader";

/// Volume cycled through the bleach chamber when bleaching mounted tips.
const BLEACH_SMALL_VOL_UL: f64 = 10.0;
/// Dispense height in the wash chambers.
const WASH_DISPENSE_HEIGHT_MM: f64 = 10.0;

fn describe(positions: &[Channel<Position>]) -> String {
    positions
        .iter()
        .map(|p| match p {
            Channel::Engaged(pos) => pos.to_string(),
            Channel::Skipped => "(skip)".into(),
        })
        .collect::<Vec<_>>()
        .join("; ")
}

fn engaged_volumes(volumes: &[Channel<f64>]) -> Vec<f64> {
    volumes.iter().filter_map(|v| v.engaged().copied()).collect()
}

/// Liquid handler shared between the control thread and background tasks.
#[derive(Clone, Debug)]
pub struct Robot {
    dev: Shared<dyn LiquidHandler + Send>,
}

impl Robot {
    pub fn new(dev: Box<dyn LiquidHandler + Send>) -> Self {
        Self {
            dev: Shared::new(ROBOT, dev),
        }
    }

    pub fn initialize(&self) -> Result<()> {
        info!("initializing liquid handler");
        self.dev.with(|d| d.initialize())?.hw(ROBOT, "initialize")
    }

    pub fn hepa_on(&self, fan_speed: u8) -> Result<()> {
        info!(fan_speed, "HEPA fan on");
        self.dev.with(|d| d.hepa_on(fan_speed))?.hw(ROBOT, "hepa_on")
    }

    pub fn pick_up_tips(&self, positions: &[Channel<Position>]) -> Result<()> {
        check_count(positions.len())?;
        info!(
            pattern = %Channel::pattern(positions),
            positions = %describe(positions),
            "pick up tips"
        );
        self.dev.with(|d| d.pick_up_tips(positions))?.hw(ROBOT, "pick_up_tips")
    }

    pub fn eject_tips(&self, positions: &[Channel<Position>]) -> Result<()> {
        check_count(positions.len())?;
        info!(
            pattern = %Channel::pattern(positions),
            positions = %describe(positions),
            "eject tips"
        );
        self.dev.with(|d| d.eject_tips(positions))?.hw(ROBOT, "eject_tips")
    }

    pub fn aspirate(
        &self,
        positions: &[Channel<Position>],
        volumes: &[Channel<f64>],
        opts: &LiquidOptions,
    ) -> Result<()> {
        check_channels(positions, volumes)?;
        info!(
            volumes = ?engaged_volumes(volumes),
            positions = %describe(positions),
            "aspirate"
        );
        self.dev
            .with(|d| d.aspirate(positions, volumes, opts))?
            .hw(ROBOT, "aspirate")
    }

    pub fn dispense(
        &self,
        positions: &[Channel<Position>],
        volumes: &[Channel<f64>],
        opts: &LiquidOptions,
    ) -> Result<()> {
        check_channels(positions, volumes)?;
        info!(
            volumes = ?engaged_volumes(volumes),
            positions = %describe(positions),
            "dispense"
        );
        self.dev
            .with(|d| d.dispense(positions, volumes, opts))?
            .hw(ROBOT, "dispense")
    }

    pub fn pick_up_tips_96(&self, rack: &Labware) -> Result<()> {
        info!(rack = %rack, "pick up 96 tips");
        self.dev.with(|d| d.pick_up_tips_96(rack))?.hw(ROBOT, "pick_up_tips_96")
    }

    pub fn eject_tips_96(&self, rack: &Labware) -> Result<()> {
        info!(rack = %rack, "eject 96 tips");
        self.dev.with(|d| d.eject_tips_96(rack))?.hw(ROBOT, "eject_tips_96")
    }

    pub fn aspirate_96(&self, plate: &Labware, volume: f64, opts: &LiquidOptions) -> Result<()> {
        check_volume(volume)?;
        info!(plate = %plate, volume, "aspirate 96");
        self.dev
            .with(|d| d.aspirate_96(plate, volume, opts))?
            .hw(ROBOT, "aspirate_96")
    }

    pub fn dispense_96(&self, plate: &Labware, volume: f64, opts: &LiquidOptions) -> Result<()> {
        check_volume(volume)?;
        info!(plate = %plate, volume, "dispense 96");
        self.dev
            .with(|d| d.dispense_96(plate, volume, opts))?
            .hw(ROBOT, "dispense_96")
    }

    pub fn wash_empty_refill(&self) -> Result<()> {
        debug!("wash station empty and refill");
        self.dev
            .with(|d| d.wash_empty_refill())?
            .hw(ROBOT, "wash_empty_refill")
    }

    pub fn move_plate(&self, from: &Labware, to: &Labware) -> Result<()> {
        info!(from = %from, to = %to, "move plate");
        self.dev.with(|d| d.move_plate(from, to))?.hw(ROBOT, "move_plate")
    }

    /// Bleach and rinse the tips on the 96 head, then rack them at
    /// `destination` if given.
    pub fn bleach_mounted_tips(&self, wash: &WashStation, destination: Option<&Labware>) -> Result<()> {
        info!(
            destination = destination.map_or("(kept mounted)", Labware::name),
            "bleaching mounted tips"
        );
        self.wash_empty_refill()?;
        self.aspirate_96(
            &wash.bleach_site,
            BLEACH_SMALL_VOL_UL,
            &LiquidOptions::default().mixing(2, wash.wash_vol_ul),
        )?;
        self.dispense_96(
            &wash.bleach_site,
            BLEACH_SMALL_VOL_UL,
            &LiquidOptions::at_height(WASH_DISPENSE_HEIGHT_MM).blowout(),
        )?;
        debug!(cycles = wash.rinse_cycles, "rinsing");
        self.aspirate_96(
            &wash.rinse_site,
            wash.wash_vol_ul,
            &LiquidOptions::default().mixing(wash.rinse_cycles, wash.wash_vol_ul),
        )?;
        self.dispense_96(
            &wash.rinse_site,
            wash.wash_vol_ul,
            &LiquidOptions::at_height(WASH_DISPENSE_HEIGHT_MM).blowout(),
        )?;
        if let Some(dest) = destination {
            self.eject_tips_96(dest)?;
        }
        info!("done bleaching tips");
        Ok(())
    }
}

/// The dual-chamber wash station and how it is used.
#[derive(Debug, Clone, PartialEq)]
pub struct WashStation {
    pub bleach_site: Labware,
    pub rinse_site: Labware,
    pub wash_vol_ul: f64,
    pub rinse_cycles: u32,
}

fn check_count(got: usize) -> std::result::Result<(), PaceError> {
    if got > CHANNELS {
        return Err(PaceError::ChannelCount { got, max: CHANNELS });
    }
    Ok(())
}

fn check_volume(volume: f64) -> std::result::Result<(), PaceError> {
    if !volume.is_finite() || volume < 0.0 {
        return Err(PaceError::OutOfRange {
            what: "volume (uL)",
            value: volume,
            min: 0.0,
            max: f64::MAX,
        });
    }
    Ok(())
}

/// Plate reader shared with the robot-side plate handling.
#[derive(Clone, Debug)]
pub struct Reader {
    dev: Shared<dyn PlateReader + Send>,
}

impl Reader {
    pub fn new(dev: Box<dyn PlateReader + Send>) -> Self {
        Self {
            dev: Shared::new(READER, dev),
        }
    }

    pub fn plate_out(&self, block: bool) -> Result<()> {
        debug!(block, "reader tray out");
        self.dev.with(|d| d.plate_out(block))?.hw(READER, "plate_out")
    }

    pub fn plate_in(&self, block: bool) -> Result<()> {
        debug!(block, "reader tray in");
        self.dev.with(|d| d.plate_in(block))?.hw(READER, "plate_in")
    }

    /// One table per protocol, in protocol order.
    pub fn run_protocols(&self, protocols: &[&str], plate_id: &str) -> Result<Vec<PlateData>> {
        info!(protocols = ?protocols, plate_id, "running reader protocols");
        let data = self
            .dev
            .with(|d| d.run_protocols(protocols, plate_id))?
            .hw(READER, "run_protocols")?;
        if let Some(missing) = protocols.get(data.len()) {
            return Err(PaceError::MissingReading {
                protocol: (*missing).to_string(),
            }
            .into());
        }
        Ok(data)
    }
}

/// Move `plate` into the reader, run `protocols` and bring it back.
///
/// `background` starts once the plate is in the reader and is joined before
/// the plate moves back, so it may use the robot but not the reader.
pub fn read_plate(
    robot: &Robot,
    reader: &Reader,
    tray: &Labware,
    plate: &Labware,
    protocols: &[&str],
    plate_id: &str,
    background: Option<Step>,
) -> Result<Vec<PlateData>> {
    info!(plate = %plate, plate_id, protocols = ?protocols, "read plate");
    reader.plate_out(false)?;
    robot.move_plate(plate, tray)?;
    let bg = background.map(|f| task::spawn(format!("read {plate}: background"), f));

    let data = reader.run_protocols(protocols, plate_id);
    let tray_out = if data.is_ok() {
        reader.plate_out(false)
    } else {
        Ok(())
    };
    let joined = bg.map_or(Ok(()), task::TaskHandle::join);

    let data = data?;
    tray_out?;
    joined.wrap_err("background work during plate read")?;
    robot.move_plate(tray, plate)?;
    Ok(data)
}
