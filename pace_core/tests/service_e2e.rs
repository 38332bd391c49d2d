use std::sync::Arc;

use pace_core::{
    DataType, ExperimentParams, JsonlLog, MemoryLog, PaceError, ServiceOutcome, ServicePhase,
    Station, Vessel,
};
use pace_hardware::{
    Journal, PumpCall, ReaderCall, RobotCall, ShakerCall, SimReadings, SimulatedLiquidHandler,
    SimulatedPumps, SimulatedReader, SimulatedShaker,
};
use pace_traits::Channel;
use pace_traits::clock::test_clock::TestClock;

/// Absorbance the default calibration maps to OD 0.6.
const ABS_AT_OD_0_6: f64 = (0.6 + 0.107_575_031_7) / 4.171_943_074;

struct Harness {
    station: Station,
    robot: Journal<RobotCall>,
    reader: Journal<ReaderCall>,
    pumps: Journal<PumpCall>,
    shaker: Journal<ShakerCall>,
    log: MemoryLog,
    clock: TestClock,
}

fn harness(robot: SimulatedLiquidHandler, exp: ExperimentParams, equilibrated: bool) -> Harness {
    harness_with(robot, SimulatedPumps::new(), exp, equilibrated)
}

fn harness_with(
    robot: SimulatedLiquidHandler,
    pumps: SimulatedPumps,
    exp: ExperimentParams,
    equilibrated: bool,
) -> Harness {
    let reader = SimulatedReader::new(SimReadings {
        absorbance: ABS_AT_OD_0_6,
        luminescence: 5000.0,
    });
    let shaker = SimulatedShaker::new();
    let log = MemoryLog::new();
    let clock = TestClock::new();
    let journals = (
        robot.journal(),
        reader.journal(),
        pumps.journal(),
        shaker.journal(),
    );
    let station = Station::builder()
        .robot(robot)
        .reader(reader)
        .pumps(pumps)
        .shaker(shaker)
        .clock(Arc::new(clock.clone()))
        .measurement_log(log.clone())
        .experiment(exp)
        .equilibrated(equilibrated)
        .try_build()
        .unwrap();
    Harness {
        station,
        robot: journals.0,
        reader: journals.1,
        pumps: journals.2,
        shaker: journals.3,
        log,
        clock,
    }
}

fn default_harness() -> Harness {
    harness(SimulatedLiquidHandler::new(), ExperimentParams::default(), false)
}

#[test]
fn turbidostat_round_dilutes_records_and_equilibrates() {
    let mut h = default_harness();
    let outcome = h.station.service_turbidostats().unwrap();

    let report = match outcome {
        ServiceOutcome::Diluted(report) => report,
        other => panic!("expected a dilution report, got {other:?}"),
    };
    assert_eq!(report.setpoints.len(), 24);
    assert!(report.all_acceptable);
    assert!(h.station.context().latch.is_equilibrated());
    assert_eq!(h.station.phase(), ServicePhase::Done);

    let dispenses: Vec<Vec<Channel<f64>>> = h
        .robot
        .snapshot()
        .into_iter()
        .filter_map(|c| match c {
            RobotCall::Dispense { volumes, .. } => Some(volumes),
            _ => None,
        })
        .collect();
    assert_eq!(dispenses.len(), 3);
    for v in dispenses.iter().flatten() {
        let ul = *v.engaged().unwrap();
        assert!((ul - 633.333_333).abs() < 1e-3, "dispensed {ul}");
    }

    let records = h.log.records();
    assert_eq!(records.len(), 24);
    assert!(records.iter().all(|r| r.data_type == DataType::Abs));
    assert_eq!(records[3].vessel, Vessel::Turbidostat(3));
    assert_eq!(records[0].plate_id, "personal_turbs plate 0");

    assert_eq!(
        h.pumps.snapshot(),
        vec![PumpCall::BleachClean, PumpCall::Refill(24.0 * 1.2)]
    );
    // Shaker ends the round at normal speed after the vortex.
    assert_eq!(h.shaker.snapshot().last(), Some(&ShakerCall::Start(400)));
    assert!(h.shaker.snapshot().contains(&ShakerCall::Start(800)));
    assert_eq!(h.clock.offset(), std::time::Duration::from_millis(3500));
}

#[test]
fn read_plate_moves_the_plate_around_the_reader() {
    let mut h = default_harness();
    h.station.service_turbidostats().unwrap();

    assert_eq!(
        h.reader.snapshot(),
        vec![
            ReaderCall::PlateOut { block: false },
            ReaderCall::Run {
                protocols: vec!["17_8_12_abs".into()],
                plate_id: "personal_turbs plate 0".into(),
            },
            ReaderCall::PlateOut { block: false },
        ]
    );
    let moves: Vec<(String, String)> = h
        .robot
        .snapshot()
        .into_iter()
        .filter_map(|c| match c {
            RobotCall::MovePlate { from, to } => Some((from.name().into(), to.name().into())),
            _ => None,
        })
        .collect();
    assert_eq!(
        moves,
        vec![
            ("reader_tl_0".to_string(), "reader_tray".to_string()),
            ("reader_tray".to_string(), "reader_tl_0".to_string()),
        ]
    );
}

#[test]
fn dilution_follows_the_batch_step_order() {
    let mut h = default_harness();
    h.station.service_turbidostats().unwrap();
    let ops: Vec<&'static str> = h.robot.snapshot().iter().map(RobotCall::operation).collect();
    let first_pick = ops.iter().position(|o| *o == "pick_up_tips").unwrap();
    assert_eq!(
        &ops[first_pick..first_pick + 4],
        ["pick_up_tips", "aspirate", "dispense", "eject_tips"]
    );
}

#[test]
fn lagoons_are_skipped_until_equilibrated() {
    let mut h = default_harness();
    let outcome = h.station.service_lagoons().unwrap();
    assert_eq!(outcome, ServiceOutcome::Skipped);
    assert!(h.robot.is_empty());
    assert!(h.reader.is_empty());
    assert!(h.log.is_empty());
    assert_eq!(h.station.context().slots.rounds_used(), 0);
}

#[test]
fn equilibrated_lagoon_round_records_lum_then_abs() {
    let mut h = harness(SimulatedLiquidHandler::new(), ExperimentParams::default(), true);
    let outcome = h.station.service_lagoons().unwrap();
    assert_eq!(outcome, ServiceOutcome::Fed);

    let records = h.log.records();
    assert_eq!(records.len(), 48);
    assert!(records[..24].iter().all(|r| r.data_type == DataType::Lum));
    assert!(records[24..].iter().all(|r| r.data_type == DataType::Abs));
    assert_eq!(records[0].vessel, Vessel::Lagoon(0));
    assert_eq!(records[0].reading, 5000.0);

    let reads = h.reader.snapshot();
    assert_eq!(reads.last(), Some(&ReaderCall::PlateIn { block: false }));
    assert!(reads.contains(&ReaderCall::Run {
        protocols: vec!["17_8_12_lum".into(), "17_8_12_abs".into()],
        plate_id: "personal_turbs plate 0".into(),
    }));
}

#[test]
fn consecutive_rounds_share_the_reader_plate() {
    let mut h = harness(SimulatedLiquidHandler::new(), ExperimentParams::default(), true);
    h.station.service_lagoons().unwrap();
    h.station.service_turbidostats().unwrap();
    let records = h.log.records();
    // Lagoon round used the top-left quadrant, turbidostats the top-right.
    assert_eq!(records[0].well, "A1");
    assert_eq!(records[48].well, "A2");
    assert_eq!(h.station.context().slots.rounds_used(), 2);
}

#[test]
fn reader_pool_exhaustion_is_fatal() {
    let exp = ExperimentParams {
        reader_plates: 1,
        ..ExperimentParams::default()
    };
    let mut h = harness(SimulatedLiquidHandler::new(), exp, false);
    for _ in 0..4 {
        h.station.service_turbidostats().unwrap();
    }
    let err = h.station.service_turbidostats().unwrap_err();
    assert_eq!(
        err.downcast_ref::<PaceError>(),
        Some(&PaceError::ReaderPoolExhausted { rounds: 4 })
    );
    assert_eq!(h.station.phase(), ServicePhase::Idle);
}

#[test]
fn robot_fault_names_the_batch_and_step() {
    let mut h = harness(
        SimulatedLiquidHandler::new().with_fault("dispense"),
        ExperimentParams::default(),
        false,
    );
    let err = h.station.service_turbidostats().unwrap_err();
    let text = format!("{err:#}");
    assert!(text.contains("turbidostat service"), "{text}");
    assert!(text.contains("dilution batch 0: dispense into turbidostats"), "{text}");
    assert!(matches!(
        err.downcast_ref::<PaceError>(),
        Some(PaceError::Hardware {
            component: "robot",
            operation: "dispense",
            ..
        })
    ));
    assert!(!h.station.context().latch.is_equilibrated());
}

#[test]
fn failed_tip_bleach_during_plate_read_aborts_the_round() {
    let mut h = harness(
        SimulatedLiquidHandler::new().with_fault("wash_empty_refill"),
        ExperimentParams::default(),
        false,
    );
    let err = h.station.service_turbidostats().unwrap_err();
    let text = format!("{err:#}");
    assert!(text.contains("turbidostat service"), "{text}");
    assert!(text.contains("background work during plate read"), "{text}");
    assert!(matches!(
        err.downcast_ref::<PaceError>(),
        Some(PaceError::Hardware {
            component: "robot",
            operation: "wash_empty_refill",
            ..
        })
    ));
    // The round stops before any dilution or record.
    assert!(
        !h.robot
            .snapshot()
            .iter()
            .any(|c| matches!(c, RobotCall::Dispense { .. }))
    );
    assert!(h.log.records().is_empty());
    assert!(!h.station.context().latch.is_equilibrated());
    assert_eq!(h.station.phase(), ServicePhase::Idle);
}

#[test]
fn failed_media_refill_stops_dilution_before_aspirating_media() {
    let mut h = harness_with(
        SimulatedLiquidHandler::new(),
        SimulatedPumps::new().with_fault("refill"),
        ExperimentParams::default(),
        false,
    );
    let err = h.station.service_turbidostats().unwrap_err();
    let text = format!("{err:#}");
    assert!(text.contains("dilution batch 0: waiting for media refill"), "{text}");
    assert!(text.contains("media reservoir: step 2 of 2"), "{text}");
    assert!(matches!(
        err.downcast_ref::<PaceError>(),
        Some(PaceError::Hardware {
            component: "pumps",
            operation: "refill",
            ..
        })
    ));
    assert_eq!(h.pumps.snapshot(), vec![PumpCall::BleachClean]);
    assert!(
        !h.robot
            .snapshot()
            .iter()
            .any(|c| matches!(c, RobotCall::Aspirate { .. }))
    );
    assert!(!h.station.context().latch.is_equilibrated());
}

#[test]
fn control_vessels_do_not_hold_back_equilibration() {
    // Every vessel reads blank, but all of them are controls.
    let exp = ExperimentParams {
        control_vessels: (0..24).collect(),
        ..ExperimentParams::default()
    };
    let reader = SimulatedReader::new(SimReadings {
        absorbance: 0.0,
        luminescence: 0.0,
    });
    let mut station = Station::builder()
        .robot(SimulatedLiquidHandler::new())
        .reader(reader)
        .pumps(SimulatedPumps::new())
        .shaker(SimulatedShaker::new())
        .clock(Arc::new(TestClock::new()))
        .experiment(exp)
        .try_build()
        .unwrap();
    station.service_turbidostats().unwrap();
    assert!(station.context().latch.is_equilibrated());
}

#[test]
fn start_up_initializes_primes_and_starts_the_fan() {
    let mut h = default_harness();
    h.station.start_up().unwrap();
    let ops: Vec<&'static str> = h.robot.snapshot().iter().map(RobotCall::operation).collect();
    assert_eq!(ops, ["initialize", "hepa_on"]);
    assert_eq!(h.pumps.snapshot(), vec![PumpCall::Prime]);
    assert_eq!(h.shaker.snapshot(), vec![ShakerCall::Start(400)]);
}

#[test]
fn missing_device_fails_to_build() {
    let err = Station::builder()
        .robot(SimulatedLiquidHandler::new())
        .try_build()
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<pace_core::BuildError>(),
        Some(pace_core::BuildError::MissingReader)
    ));
}

#[test]
fn jsonl_log_appends_one_line_per_record() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("measurements.jsonl");
    let reader = SimulatedReader::new(SimReadings {
        absorbance: ABS_AT_OD_0_6,
        luminescence: 1.0,
    });
    let mut station = Station::builder()
        .robot(SimulatedLiquidHandler::new())
        .reader(reader)
        .pumps(SimulatedPumps::new())
        .shaker(SimulatedShaker::new())
        .clock(Arc::new(TestClock::new()))
        .measurement_log(JsonlLog::new(&path))
        .try_build()
        .unwrap();
    station.service_turbidostats().unwrap();
    station.service_turbidostats().unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 48);
    let row: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
    assert_eq!(row["turb_number"], 0);
    assert!(row["lagoon_number"].is_null());
    assert_eq!(row["data_type"], "abs");
    assert_eq!(row["well"], "A1");
    assert_eq!(row["plate_id"], "personal_turbs plate 0");
}
