//! Channel-sized batching of per-vessel work on the 8-channel arm.

use eyre::WrapErr;
use pace_traits::{Channel, Labware, LiquidOptions, PlateData, Position};
use tracing::info;

use crate::actuators::ShakerControl;
use crate::config::ExperimentParams;
use crate::controller::{FlowController, Setpoint};
use crate::error::{PaceError, Result};
use crate::layout::{CHANNELS, Deck, ReaderSlot};
use crate::robot::Robot;
use crate::task::TaskHandle;

/// Split `items` into ordered, non-overlapping, non-empty runs of at most
/// `size` (the last may be shorter).
pub fn batches<T>(items: &[T], size: usize) -> std::slice::Chunks<'_, T> {
    items.chunks(size.max(1))
}

/// Validate a batched command: no more slots than channels, and volumes
/// engaged exactly where positions are.
pub fn check_channels<P, V>(
    positions: &[Channel<P>],
    volumes: &[Channel<V>],
) -> std::result::Result<(), PaceError> {
    if positions.len() > CHANNELS {
        return Err(PaceError::ChannelCount {
            got: positions.len(),
            max: CHANNELS,
        });
    }
    if positions.len() != volumes.len() {
        return Err(PaceError::MisalignedChannels {
            channel: positions.len().min(volumes.len()),
        });
    }
    match positions
        .iter()
        .zip(volumes)
        .position(|(p, v)| p.is_engaged() != v.is_engaged())
    {
        Some(channel) => Err(PaceError::MisalignedChannels { channel }),
        None => Ok(()),
    }
}

/// Everything the dilution pass drives or reads.
#[derive(Debug, Clone, Copy)]
pub struct DilutionPlan<'a> {
    pub robot: &'a Robot,
    pub shaker: &'a ShakerControl,
    pub deck: &'a Deck,
    pub controller: &'a FlowController,
    pub experiment: &'a ExperimentParams,
    pub normal_rpm: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DilutionReport {
    /// Controller decision per vessel, in vessel order.
    pub setpoints: Vec<(usize, Setpoint)>,
    /// Every non-control vessel read an acceptable OD.
    pub all_acceptable: bool,
}

/// Absorbance a reader table holds for `well` of `plate`.
pub fn absorbance_at(
    readings: &PlateData,
    plate: &Labware,
    well: usize,
    protocol: &str,
) -> std::result::Result<f64, PaceError> {
    plate
        .well_coords(well)
        .and_then(|(col, row)| readings.value_at(col, row))
        .ok_or_else(|| PaceError::MissingReading {
            protocol: protocol.to_string(),
        })
}

/// Top up every turbidostat with fresh media, eight at a time.
///
/// Each batch works out its own volumes from `readings` before touching the
/// hardware. `media_fill` is joined before the first aspirate from the
/// reservoir. Failures name the batch and step and are not retried.
pub fn dilute_turbidostats(
    plan: &DilutionPlan<'_>,
    readings: &PlateData,
    slot: &ReaderSlot,
    mut media_fill: Option<TaskHandle>,
) -> Result<DilutionReport> {
    let exp = plan.experiment;
    let vessels: Vec<usize> = (0..plan.deck.vessel_count()).collect();
    let mut setpoints = Vec::with_capacity(vessels.len());
    let mut all_acceptable = true;

    info!("moving fresh media into turbidostats");
    for (b, batch) in batches(&vessels, CHANNELS).enumerate() {
        let mut batch_points = Vec::with_capacity(batch.len());
        for &v in batch {
            let well = *slot
                .wells
                .get(v)
                .ok_or_else(|| PaceError::MissingReading {
                    protocol: exp.abs_protocol.clone(),
                })?;
            let absorbance = absorbance_at(readings, &slot.plate, well, &exp.abs_protocol)?;
            let sp = plan.controller.volume_for_absorbance(absorbance, exp);
            info!(
                vessel = v,
                plate = %slot.plate,
                well = %slot.plate.position_id(well).unwrap_or_default(),
                absorbance,
                od = sp.od,
                rate = sp.rate,
                volume_ul = sp.volume_ul,
                "turbidostat setpoint"
            );
            batch_points.push((v, sp));
        }

        let tips = positions(batch, |v| plan.deck.turb_tip(v))?;
        let media = positions(batch, |v| plan.deck.media_for(v))?;
        let turbs = positions(batch, |v| plan.deck.turbidostat(v))?;
        let corral = positions(batch, |v| plan.deck.turb_corral_slot(v))?;
        let volumes: Vec<Channel<f64>> = batch_points
            .iter()
            .map(|(_, sp)| Channel::Engaged(sp.volume_ul))
            .collect();

        plan.robot
            .pick_up_tips(&tips)
            .wrap_err_with(|| format!("dilution batch {b}: pick up tips"))?;
        if let Some(task) = media_fill.take() {
            task.join()
                .wrap_err_with(|| format!("dilution batch {b}: waiting for media refill"))?;
        }
        plan.robot
            .aspirate(&media, &volumes, &LiquidOptions::at_height(1.0))
            .wrap_err_with(|| format!("dilution batch {b}: aspirate media"))?;
        plan.shaker
            .stop()
            .wrap_err_with(|| format!("dilution batch {b}: stop shaker"))?;
        plan.robot
            .dispense(
                &turbs,
                &volumes,
                &LiquidOptions::at_height(exp.turb_fly_height_mm()).blowout(),
            )
            .wrap_err_with(|| format!("dilution batch {b}: dispense into turbidostats"))?;
        plan.shaker
            .start(plan.normal_rpm)
            .wrap_err_with(|| format!("dilution batch {b}: restart shaker"))?;
        plan.robot
            .eject_tips(&corral)
            .wrap_err_with(|| format!("dilution batch {b}: eject tips"))?;

        all_acceptable &= batch_points
            .iter()
            .filter(|(v, _)| !exp.control_vessels.contains(v))
            .all(|(_, sp)| sp.acceptable);
        setpoints.extend(batch_points);
    }

    // Nothing to dilute still means the refill must finish.
    if let Some(task) = media_fill.take() {
        task.join().wrap_err("waiting for media refill")?;
    }

    Ok(DilutionReport {
        setpoints,
        all_acceptable,
    })
}

fn positions(
    batch: &[usize],
    at: impl Fn(usize) -> std::result::Result<Position, PaceError>,
) -> std::result::Result<Vec<Channel<Position>>, PaceError> {
    batch.iter().map(|&v| at(v).map(Channel::Engaged)).collect()
}
