pub mod clock;
pub mod deck;

pub use clock::{Clock, MonotonicClock};
#[cfg(any(test, feature = "test-util"))]
pub use clock::test_clock;
pub use deck::{Channel, Labware, LabwareKind, LiquidOptions, PlateData, Position};

/// Error type at the hardware trait boundary.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Liquid-handling robot. Every call blocks until the physical action has
/// completed or failed.
pub trait LiquidHandler {
    fn initialize(&mut self) -> Result<(), BoxError>;
    fn hepa_on(&mut self, fan_speed: u8) -> Result<(), BoxError>;

    fn pick_up_tips(&mut self, positions: &[Channel<Position>]) -> Result<(), BoxError>;
    fn eject_tips(&mut self, positions: &[Channel<Position>]) -> Result<(), BoxError>;
    fn aspirate(
        &mut self,
        positions: &[Channel<Position>],
        volumes: &[Channel<f64>],
        opts: &LiquidOptions,
    ) -> Result<(), BoxError>;
    fn dispense(
        &mut self,
        positions: &[Channel<Position>],
        volumes: &[Channel<f64>],
        opts: &LiquidOptions,
    ) -> Result<(), BoxError>;

    fn pick_up_tips_96(&mut self, rack: &Labware) -> Result<(), BoxError>;
    fn eject_tips_96(&mut self, rack: &Labware) -> Result<(), BoxError>;
    fn aspirate_96(
        &mut self,
        plate: &Labware,
        volume: f64,
        opts: &LiquidOptions,
    ) -> Result<(), BoxError>;
    fn dispense_96(
        &mut self,
        plate: &Labware,
        volume: f64,
        opts: &LiquidOptions,
    ) -> Result<(), BoxError>;

    /// Empty and refill both chambers of the 96-head wash station.
    fn wash_empty_refill(&mut self) -> Result<(), BoxError>;
    fn move_plate(&mut self, from: &Labware, to: &Labware) -> Result<(), BoxError>;
}

/// Plate reader. The tray is driven separately from protocol runs.
pub trait PlateReader {
    fn plate_out(&mut self, block: bool) -> Result<(), BoxError>;
    fn plate_in(&mut self, block: bool) -> Result<(), BoxError>;
    /// Run each protocol on the plate currently in the tray, returning one
    /// table per protocol in order.
    fn run_protocols(
        &mut self,
        protocols: &[&str],
        plate_id: &str,
    ) -> Result<Vec<PlateData>, BoxError>;
}

/// Media reservoir pumps.
pub trait Pumps {
    fn bleach_clean(&mut self) -> Result<(), BoxError>;
    fn prime(&mut self) -> Result<(), BoxError>;
    fn refill(&mut self, ml: f64) -> Result<(), BoxError>;
    fn empty(&mut self, ml: f64) -> Result<(), BoxError>;
}

/// Orbital shaker under the turbidostat plate.
pub trait Shaker {
    fn start(&mut self, rpm: u32) -> Result<(), BoxError>;
    fn stop(&mut self) -> Result<(), BoxError>;
}
