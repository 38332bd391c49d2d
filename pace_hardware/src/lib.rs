//! Device backends for the rig: command-file transports for the media pumps
//! and the shaker, plus a simulated deck used by `--simulate` and the tests.

pub mod error;
pub mod pumps;
pub mod remote;
pub mod shaker;
pub mod sim;

pub use error::HwError;
pub use pumps::RemotePumps;
pub use remote::{CommandRunner, FILE_PLACEHOLDER, remove_with_retry};
pub use shaker::SerialShaker;
pub use sim::{
    Journal, PumpCall, ReaderCall, RobotCall, ShakerCall, SimReadings, SimulatedLiquidHandler,
    SimulatedPumps, SimulatedReader, SimulatedShaker,
};
