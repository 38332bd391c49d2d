//! Deck layout: vessel index to physical well mapping and the reader plate
//! round robin.
//!
//! Vessels live in a 6 x 4 logical grid that the 96-channel head and the
//! 8-channel arm address through a 12 x 8 template. Every logical well maps
//! to the top-left well of a 2 x 2 block, which leaves the other three wells
//! of that block free for the remaining reader quadrants.

use pace_traits::{Labware, LabwareKind, Position};

use crate::error::PaceError;

/// Channels on the independent pipetting arm.
pub const CHANNELS: usize = 8;
/// Largest logical vessel grid.
pub const MAX_VESSELS: usize = 24;
/// 96-well offsets selecting the top-left, top-right, bottom-left and
/// bottom-right well of each 2 x 2 block.
pub const QUADRANT_OFFSETS: [usize; 4] = [0, 8, 1, 9];
/// Service rounds one reader plate holds.
pub const ROUNDS_PER_PLATE: usize = QUADRANT_OFFSETS.len();

const LOGICAL: LabwareKind = LabwareKind::Plate24;
const PHYSICAL_ROWS: usize = 8;

/// Map a logical vessel index to its well on a 96-well template.
pub fn logical_to_physical(idx: usize, vessel_count: usize) -> Result<usize, PaceError> {
    if vessel_count > MAX_VESSELS {
        return Err(PaceError::OutOfRange {
            what: "vessel count",
            value: vessel_count as f64,
            min: 1.0,
            max: MAX_VESSELS as f64,
        });
    }
    if idx >= vessel_count {
        return Err(PaceError::OutOfRange {
            what: "vessel index",
            value: idx as f64,
            min: 0.0,
            max: vessel_count.saturating_sub(1) as f64,
        });
    }
    let col = idx / LOGICAL.rows();
    let row = idx % LOGICAL.rows();
    Ok(2 * col * PHYSICAL_ROWS + 2 * row)
}

/// Reader deck site a quadrant of a reader plate is addressed through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReaderSite {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

impl ReaderSite {
    pub const ALL: [Self; 4] = [
        Self::TopLeft,
        Self::TopRight,
        Self::BottomLeft,
        Self::BottomRight,
    ];

    pub const fn prefix(self) -> &'static str {
        match self {
            Self::TopLeft => "reader_tl_",
            Self::TopRight => "reader_tr_",
            Self::BottomLeft => "reader_bl_",
            Self::BottomRight => "reader_br_",
        }
    }

    pub const fn offset(self) -> usize {
        match self {
            Self::TopLeft => QUADRANT_OFFSETS[0],
            Self::TopRight => QUADRANT_OFFSETS[1],
            Self::BottomLeft => QUADRANT_OFFSETS[2],
            Self::BottomRight => QUADRANT_OFFSETS[3],
        }
    }
}

/// Where one service round deposits its samples.
#[derive(Debug, Clone, PartialEq)]
pub struct ReaderSlot {
    pub round: usize,
    pub plate_index: usize,
    /// The plate as the reader and the plate mover know it.
    pub plate: Labware,
    /// Deck site the 96 head dispenses through for this quadrant.
    pub site: Labware,
    pub quadrant: ReaderSite,
    /// Well on `plate` holding each vessel's sample, indexed by vessel.
    pub wells: Vec<usize>,
}

/// Finite pool of reader plates used four rounds each.
#[derive(Debug, Clone)]
pub struct ReaderSlots {
    plates: usize,
    base_wells: Vec<usize>,
    cursor: usize,
}

impl ReaderSlots {
    pub fn new(plates: usize, vessel_count: usize) -> Result<Self, PaceError> {
        let base_wells = (0..vessel_count)
            .map(|v| logical_to_physical(v, vessel_count))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            plates,
            base_wells,
            cursor: 0,
        })
    }

    /// Total rounds before the pool runs dry.
    pub fn capacity(&self) -> usize {
        self.plates * ROUNDS_PER_PLATE
    }

    /// Rounds handed out so far.
    pub fn rounds_used(&self) -> usize {
        self.cursor
    }

    pub fn remaining(&self) -> usize {
        self.capacity().saturating_sub(self.cursor)
    }

    pub fn slot_for_round(&self, round: usize) -> Result<ReaderSlot, PaceError> {
        if round >= self.capacity() {
            return Err(PaceError::ReaderPoolExhausted {
                rounds: self.capacity(),
            });
        }
        let plate_index = round / ROUNDS_PER_PLATE;
        let quadrant = ReaderSite::ALL[round % ROUNDS_PER_PLATE];
        Ok(ReaderSlot {
            round,
            plate_index,
            plate: reader_plate(ReaderSite::TopLeft, plate_index),
            site: reader_plate(quadrant, plate_index),
            quadrant,
            wells: self
                .base_wells
                .iter()
                .map(|w| w + quadrant.offset())
                .collect(),
        })
    }

    /// Hand out the next round's slot. The cursor does not move once the
    /// pool is exhausted.
    pub fn next_slot(&mut self) -> Result<ReaderSlot, PaceError> {
        let slot = self.slot_for_round(self.cursor)?;
        self.cursor += 1;
        Ok(slot)
    }
}

fn reader_plate(site: ReaderSite, index: usize) -> Labware {
    Labware::new(format!("{}{index}", site.prefix()), LabwareKind::Plate96)
}

/// Named labware on the deck.
#[derive(Debug, Clone)]
pub struct Deck {
    pub lagoons: Labware,
    pub turbidostats: Labware,
    pub media: Labware,
    pub turb_tips: Labware,
    pub lagoon_tips: Labware,
    pub turb_corral: Labware,
    pub lagoon_corral: Labware,
    pub reader_tray: Labware,
    pub bleach_site: Labware,
    pub rinse_site: Labware,
    vessel_count: usize,
}

impl Deck {
    pub fn new(vessel_count: usize) -> Result<Self, PaceError> {
        // Validates the count once; per-vessel lookups only check the index.
        if vessel_count > 0 {
            logical_to_physical(vessel_count - 1, vessel_count)?;
        }
        Ok(Self {
            lagoons: Labware::new("lagoons", LabwareKind::Plate96),
            turbidostats: Labware::new("turbidostats", LabwareKind::Plate96),
            media: Labware::new("waffle", LabwareKind::Plate96),
            turb_tips: Labware::new("turbidostat_tips", LabwareKind::Tip96),
            lagoon_tips: Labware::new("lagoon_tips", LabwareKind::Tip96),
            turb_corral: Labware::new("turbidostat_dirty_tips", LabwareKind::Tip96),
            lagoon_corral: Labware::new("lagoon_dirty_tips", LabwareKind::Tip96),
            reader_tray: Labware::new("reader_tray", LabwareKind::Plate96),
            bleach_site: Labware::new("RT300_HW_96WashDualChamber1_bleach", LabwareKind::Tip96),
            rinse_site: Labware::new("RT300_HW_96WashDualChamber1_water", LabwareKind::Tip96),
            vessel_count,
        })
    }

    pub fn vessel_count(&self) -> usize {
        self.vessel_count
    }

    fn mapped(&self, labware: &Labware, idx: usize) -> Result<Position, PaceError> {
        Ok(labware.at(logical_to_physical(idx, self.vessel_count)?))
    }

    pub fn turbidostat(&self, idx: usize) -> Result<Position, PaceError> {
        self.mapped(&self.turbidostats, idx)
    }

    pub fn turb_tip(&self, idx: usize) -> Result<Position, PaceError> {
        self.mapped(&self.turb_tips, idx)
    }

    pub fn turb_corral_slot(&self, idx: usize) -> Result<Position, PaceError> {
        self.mapped(&self.turb_corral, idx)
    }

    pub fn lagoon(&self, idx: usize) -> Result<Position, PaceError> {
        self.mapped(&self.lagoons, idx)
    }

    pub fn lagoon_tip(&self, idx: usize) -> Result<Position, PaceError> {
        self.mapped(&self.lagoon_tips, idx)
    }

    pub fn lagoon_corral_slot(&self, idx: usize) -> Result<Position, PaceError> {
        self.mapped(&self.lagoon_corral, idx)
    }

    /// Media is drawn from the first reservoir column only.
    pub fn media_for(&self, idx: usize) -> Result<Position, PaceError> {
        logical_to_physical(idx, self.vessel_count)?;
        Ok(self.media.at(idx % CHANNELS))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_and_last_vessel() {
        assert_eq!(logical_to_physical(0, 24), Ok(0));
        assert_eq!(logical_to_physical(1, 24), Ok(2));
        assert_eq!(logical_to_physical(4, 24), Ok(16));
        assert_eq!(logical_to_physical(23, 24), Ok(86));
    }

    #[test]
    fn quadrant_names_follow_round() {
        let slots = ReaderSlots::new(2, 24).unwrap();
        let s = slots.slot_for_round(5).unwrap();
        assert_eq!(s.plate.name(), "reader_tl_1");
        assert_eq!(s.site.name(), "reader_tr_1");
        assert_eq!(s.wells[0], 8);
    }

    #[test]
    fn media_uses_first_column() {
        let deck = Deck::new(24).unwrap();
        assert_eq!(deck.media_for(9).unwrap().well, 1);
        assert!(deck.media_for(24).is_err());
    }
}
