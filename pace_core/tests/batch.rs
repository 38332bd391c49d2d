use pace_core::{PaceError, Robot, batches};
use pace_hardware::sim::SimulatedLiquidHandler;
use pace_traits::{Channel, Labware, LabwareKind, LiquidOptions};
use rstest::rstest;

#[rstest]
#[case(0, 0)]
#[case(1, 1)]
#[case(8, 1)]
#[case(9, 2)]
#[case(24, 3)]
fn batches_cover_every_item_in_order(#[case] n: usize, #[case] expected: usize) {
    let items: Vec<usize> = (0..n).collect();
    let runs: Vec<&[usize]> = batches(&items, 8).collect();
    assert_eq!(runs.len(), expected);
    assert!(runs.iter().all(|b| !b.is_empty() && b.len() <= 8));
    let flat: Vec<usize> = runs.concat();
    assert_eq!(flat, items);
}

#[test]
fn zero_size_is_treated_as_one() {
    let items = [1, 2, 3];
    assert_eq!(batches(&items, 0).count(), 3);
}

fn robot() -> (Robot, pace_hardware::sim::Journal<pace_hardware::sim::RobotCall>) {
    let dev = SimulatedLiquidHandler::new();
    let journal = dev.journal();
    (Robot::new(Box::new(dev)), journal)
}

#[test]
fn misaligned_aspirate_sends_nothing() {
    let (robot, journal) = robot();
    let plate = Labware::new("turbidostats", LabwareKind::Plate96);
    let positions = [Channel::Engaged(plate.at(0)), Channel::Skipped];
    let volumes = [Channel::Engaged(100.0), Channel::Engaged(100.0)];
    let err = robot
        .aspirate(&positions, &volumes, &LiquidOptions::default())
        .unwrap_err();
    assert_eq!(
        err.downcast_ref::<PaceError>(),
        Some(&PaceError::MisalignedChannels { channel: 1 })
    );
    assert!(journal.is_empty());
}

#[test]
fn nine_channels_are_rejected_before_the_device() {
    let (robot, journal) = robot();
    let plate = Labware::new("turbidostats", LabwareKind::Plate96);
    let positions: Vec<_> = (0..9).map(|w| Channel::Engaged(plate.at(w))).collect();
    let volumes: Vec<_> = (0..9).map(|_| Channel::Engaged(50.0)).collect();
    let err = robot
        .dispense(&positions, &volumes, &LiquidOptions::default())
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<PaceError>(),
        Some(PaceError::ChannelCount { got: 9, max: 8 })
    ));
    assert!(journal.is_empty());
}

#[test]
fn skipped_channels_pass_through() {
    let (robot, journal) = robot();
    let plate = Labware::new("lagoons", LabwareKind::Plate96);
    let positions = [Channel::Skipped, Channel::Engaged(plate.at(2))];
    let volumes = [Channel::Skipped, Channel::Engaged(20.0)];
    robot
        .aspirate(&positions, &volumes, &LiquidOptions::at_height(2.0))
        .unwrap();
    assert_eq!(journal.len(), 1);
    assert_eq!(journal.snapshot()[0].operation(), "aspirate");
}
