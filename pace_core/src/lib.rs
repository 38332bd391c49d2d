#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Orchestration core for the continuous-culture rig (hardware-agnostic).
//!
//! All hardware goes through the `pace_traits` device traits.
//!
//! ## Architecture
//!
//! - **Layout**: vessel index to deck well mapping, reader plate round robin (`layout`)
//! - **Control**: OD calibration and banded flow-rate controller (`controller`)
//! - **Equilibration**: one-way latch gating lagoon service (`latch`)
//! - **Background work**: joinable task handles (`task`)
//! - **Batching**: 8-channel batch validation and the dilution pass (`batch`)
//! - **Routines**: turbidostat and lagoon service on a [`Station`] (`service`)
//! - **Scheduling**: drift-corrected periodic dispatcher (`schedule`)
//! - **Persistence**: append-only measurement log (`measurement`)

pub mod actuators;
pub mod batch;
pub mod config;
pub mod controller;
pub mod conversions;
pub mod error;
pub mod hw_error;
pub mod latch;
pub mod layout;
pub mod measurement;
pub mod robot;
pub mod schedule;
pub mod service;
pub mod shared;
pub mod task;

pub use actuators::{PumpControl, ShakerControl, SharedClock};
pub use batch::{DilutionPlan, DilutionReport, batches, check_channels, dilute_turbidostats};
pub use config::{ControllerParams, ExperimentParams, ScheduleParams, ShakerParams};
pub use controller::{FlowController, Setpoint};
pub use error::{BuildError, PaceError, Report, Result};
pub use latch::EquilibrationLatch;
pub use layout::{CHANNELS, Deck, ReaderSite, ReaderSlot, ReaderSlots, logical_to_physical};
pub use measurement::{DataType, JsonlLog, MeasurementLog, MeasurementRecord, MemoryLog, Vessel};
pub use robot::{Reader, Robot, WashStation, read_plate};
pub use schedule::{Firing, RunSummary, Scheduler, StopReason};
pub use service::{Rig, ServiceContext, ServiceOutcome, ServicePhase, Station, StationBuilder};
pub use task::{TaskHandle, TaskState, spawn, spawn_sequence};

/// Routine names the station registers with the scheduler, in order.
pub const LAGOON_ROUTINE: &str = "service_lagoons";
pub const TURBIDOSTAT_ROUTINE: &str = "service_turbidostats";

/// Register both service routines, lagoons first.
pub fn register_station<C: pace_traits::Clock>(
    scheduler: &mut Scheduler<Station, C>,
    periods: &ScheduleParams,
) {
    scheduler.register(LAGOON_ROUTINE, periods.lagoon_period, |s: &mut Station| {
        s.service_lagoons().map(|_| ())
    });
    scheduler.register(
        TURBIDOSTAT_ROUTINE,
        periods.turbidostat_period,
        |s: &mut Station| s.service_turbidostats().map(|_| ()),
    );
}
