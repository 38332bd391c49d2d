//! Simulated deck: robot, reader, pumps and shaker that record what they
//! were asked to do.
//!
//! Each simulator keeps a [`Journal`] handle that stays readable after the
//! device itself has been boxed and handed to the orchestrator.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use pace_traits::{
    BoxError, Channel, Labware, LiquidHandler, LiquidOptions, PlateData, PlateReader, Position,
    Pumps, Shaker,
};
use tracing::debug;

use crate::error::HwError;

/// Shared append-only call log.
#[derive(Debug)]
pub struct Journal<T> {
    inner: Arc<Mutex<Vec<T>>>,
}

impl<T> Clone for Journal<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Default for Journal<T> {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl<T: Clone> Journal<T> {
    fn push(&self, entry: T) {
        if let Ok(mut v) = self.inner.lock() {
            v.push(entry);
        }
    }

    pub fn snapshot(&self) -> Vec<T> {
        self.inner.lock().map(|v| v.clone()).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map(|v| v.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RobotCall {
    Initialize,
    HepaOn(u8),
    PickUpTips(Vec<Channel<Position>>),
    EjectTips(Vec<Channel<Position>>),
    Aspirate {
        positions: Vec<Channel<Position>>,
        volumes: Vec<Channel<f64>>,
    },
    Dispense {
        positions: Vec<Channel<Position>>,
        volumes: Vec<Channel<f64>>,
    },
    PickUpTips96(Labware),
    EjectTips96(Labware),
    Aspirate96 { plate: Labware, volume: f64 },
    Dispense96 { plate: Labware, volume: f64 },
    WashEmptyRefill,
    MovePlate { from: Labware, to: Labware },
}

impl RobotCall {
    pub fn operation(&self) -> &'static str {
        match self {
            Self::Initialize => "initialize",
            Self::HepaOn(_) => "hepa_on",
            Self::PickUpTips(_) => "pick_up_tips",
            Self::EjectTips(_) => "eject_tips",
            Self::Aspirate { .. } => "aspirate",
            Self::Dispense { .. } => "dispense",
            Self::PickUpTips96(_) => "pick_up_tips_96",
            Self::EjectTips96(_) => "eject_tips_96",
            Self::Aspirate96 { .. } => "aspirate_96",
            Self::Dispense96 { .. } => "dispense_96",
            Self::WashEmptyRefill => "wash_empty_refill",
            Self::MovePlate { .. } => "move_plate",
        }
    }
}

/// Robot that accepts every command instantly, optionally failing one
/// operation to exercise error paths.
#[derive(Default)]
pub struct SimulatedLiquidHandler {
    journal: Journal<RobotCall>,
    fail_on: Option<&'static str>,
}

impl SimulatedLiquidHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the first and every later call of `operation` (e.g. `"dispense"`).
    pub fn with_fault(mut self, operation: &'static str) -> Self {
        self.fail_on = Some(operation);
        self
    }

    pub fn journal(&self) -> Journal<RobotCall> {
        self.journal.clone()
    }

    fn record(&self, call: RobotCall) -> Result<(), BoxError> {
        let operation = call.operation();
        if self.fail_on == Some(operation) {
            return Err(Box::new(HwError::Injected { operation }));
        }
        debug!(operation, "simulated robot call");
        self.journal.push(call);
        Ok(())
    }
}

impl LiquidHandler for SimulatedLiquidHandler {
    fn initialize(&mut self) -> Result<(), BoxError> {
        self.record(RobotCall::Initialize)
    }

    fn hepa_on(&mut self, fan_speed: u8) -> Result<(), BoxError> {
        self.record(RobotCall::HepaOn(fan_speed))
    }

    fn pick_up_tips(&mut self, positions: &[Channel<Position>]) -> Result<(), BoxError> {
        self.record(RobotCall::PickUpTips(positions.to_vec()))
    }

    fn eject_tips(&mut self, positions: &[Channel<Position>]) -> Result<(), BoxError> {
        self.record(RobotCall::EjectTips(positions.to_vec()))
    }

    fn aspirate(
        &mut self,
        positions: &[Channel<Position>],
        volumes: &[Channel<f64>],
        _opts: &LiquidOptions,
    ) -> Result<(), BoxError> {
        self.record(RobotCall::Aspirate {
            positions: positions.to_vec(),
            volumes: volumes.to_vec(),
        })
    }

    fn dispense(
        &mut self,
        positions: &[Channel<Position>],
        volumes: &[Channel<f64>],
        _opts: &LiquidOptions,
    ) -> Result<(), BoxError> {
        self.record(RobotCall::Dispense {
            positions: positions.to_vec(),
            volumes: volumes.to_vec(),
        })
    }

    fn pick_up_tips_96(&mut self, rack: &Labware) -> Result<(), BoxError> {
        self.record(RobotCall::PickUpTips96(rack.clone()))
    }

    fn eject_tips_96(&mut self, rack: &Labware) -> Result<(), BoxError> {
        self.record(RobotCall::EjectTips96(rack.clone()))
    }

    fn aspirate_96(
        &mut self,
        plate: &Labware,
        volume: f64,
        _opts: &LiquidOptions,
    ) -> Result<(), BoxError> {
        self.record(RobotCall::Aspirate96 {
            plate: plate.clone(),
            volume,
        })
    }

    fn dispense_96(
        &mut self,
        plate: &Labware,
        volume: f64,
        _opts: &LiquidOptions,
    ) -> Result<(), BoxError> {
        self.record(RobotCall::Dispense96 {
            plate: plate.clone(),
            volume,
        })
    }

    fn wash_empty_refill(&mut self) -> Result<(), BoxError> {
        self.record(RobotCall::WashEmptyRefill)
    }

    fn move_plate(&mut self, from: &Labware, to: &Labware) -> Result<(), BoxError> {
        self.record(RobotCall::MovePlate {
            from: from.clone(),
            to: to.clone(),
        })
    }
}

/// Readings the simulated reader hands out.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimReadings {
    pub absorbance: f64,
    pub luminescence: f64,
}

impl Default for SimReadings {
    fn default() -> Self {
        // Absorbance that calibrates to an OD inside the controller dead band.
        Self {
            absorbance: 0.134,
            luminescence: 1200.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReaderCall {
    PlateOut { block: bool },
    PlateIn { block: bool },
    Run { protocols: Vec<String>, plate_id: String },
}

/// Reader returning uniform plates. Protocol names containing `"lum"` get the
/// luminescence value, everything else the absorbance value.
#[derive(Default)]
pub struct SimulatedReader {
    readings: SimReadings,
    journal: Journal<ReaderCall>,
}

impl SimulatedReader {
    pub fn new(readings: SimReadings) -> Self {
        Self {
            readings,
            journal: Journal::default(),
        }
    }

    pub fn journal(&self) -> Journal<ReaderCall> {
        self.journal.clone()
    }
}

impl PlateReader for SimulatedReader {
    fn plate_out(&mut self, block: bool) -> Result<(), BoxError> {
        self.journal.push(ReaderCall::PlateOut { block });
        Ok(())
    }

    fn plate_in(&mut self, block: bool) -> Result<(), BoxError> {
        self.journal.push(ReaderCall::PlateIn { block });
        Ok(())
    }

    fn run_protocols(
        &mut self,
        protocols: &[&str],
        plate_id: &str,
    ) -> Result<Vec<PlateData>, BoxError> {
        self.journal.push(ReaderCall::Run {
            protocols: protocols.iter().map(|p| (*p).to_string()).collect(),
            plate_id: plate_id.to_string(),
        });
        let readings = self.readings;
        let now = SystemTime::now();
        Ok(protocols
            .iter()
            .map(|p| {
                let value = if p.contains("lum") {
                    readings.luminescence
                } else {
                    readings.absorbance
                };
                PlateData::uniform(PathBuf::from(format!("sim://{p}")), plate_id, now, value)
            })
            .collect())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PumpCall {
    BleachClean,
    Prime,
    Refill(f64),
    Empty(f64),
}

impl PumpCall {
    pub fn operation(&self) -> &'static str {
        match self {
            Self::BleachClean => "bleach_clean",
            Self::Prime => "prime",
            Self::Refill(_) => "refill",
            Self::Empty(_) => "empty",
        }
    }
}

/// Pumps that log every action; one action can be made to fail.
#[derive(Default)]
pub struct SimulatedPumps {
    journal: Journal<PumpCall>,
    fail_on: Option<&'static str>,
}

impl SimulatedPumps {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every call of `operation` (e.g. `"refill"`).
    pub fn with_fault(mut self, operation: &'static str) -> Self {
        self.fail_on = Some(operation);
        self
    }

    pub fn journal(&self) -> Journal<PumpCall> {
        self.journal.clone()
    }

    fn record(&self, call: PumpCall) -> Result<(), BoxError> {
        let operation = call.operation();
        if self.fail_on == Some(operation) {
            return Err(Box::new(HwError::Injected { operation }));
        }
        debug!(operation, "simulated pump call");
        self.journal.push(call);
        Ok(())
    }
}

impl Pumps for SimulatedPumps {
    fn bleach_clean(&mut self) -> Result<(), BoxError> {
        self.record(PumpCall::BleachClean)
    }

    fn prime(&mut self) -> Result<(), BoxError> {
        self.record(PumpCall::Prime)
    }

    fn refill(&mut self, ml: f64) -> Result<(), BoxError> {
        self.record(PumpCall::Refill(ml))
    }

    fn empty(&mut self, ml: f64) -> Result<(), BoxError> {
        self.record(PumpCall::Empty(ml))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShakerCall {
    Start(u32),
    Stop,
}

#[derive(Default)]
pub struct SimulatedShaker {
    journal: Journal<ShakerCall>,
}

impl SimulatedShaker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn journal(&self) -> Journal<ShakerCall> {
        self.journal.clone()
    }
}

impl Shaker for SimulatedShaker {
    fn start(&mut self, rpm: u32) -> Result<(), BoxError> {
        self.journal.push(ShakerCall::Start(rpm));
        Ok(())
    }

    fn stop(&mut self) -> Result<(), BoxError> {
        self.journal.push(ShakerCall::Stop);
        Ok(())
    }
}
