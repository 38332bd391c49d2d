//! Deck value types shared between the hardware traits and the orchestrator.

use std::fmt;
use std::path::PathBuf;
use std::time::SystemTime;

/// Physical labware footprint. Wells are numbered column-major: index
/// `col * rows + row`, matching the robot's own position numbering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LabwareKind {
    /// 6 columns x 4 rows culture plate.
    Plate24,
    /// 12 columns x 8 rows plate.
    Plate96,
    /// 12 columns x 8 rows tip rack.
    Tip96,
}

impl LabwareKind {
    pub const fn cols(self) -> usize {
        match self {
            Self::Plate24 => 6,
            Self::Plate96 | Self::Tip96 => 12,
        }
    }

    pub const fn rows(self) -> usize {
        match self {
            Self::Plate24 => 4,
            Self::Plate96 | Self::Tip96 => 8,
        }
    }

    pub const fn wells(self) -> usize {
        self.cols() * self.rows()
    }
}

/// A named piece of labware on the deck.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Labware {
    name: String,
    kind: LabwareKind,
}

impl Labware {
    pub fn new(name: impl Into<String>, kind: LabwareKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> LabwareKind {
        self.kind
    }

    /// `(col, row)` of a well index, or `None` past the last well.
    pub fn well_coords(&self, idx: usize) -> Option<(usize, usize)> {
        if idx >= self.kind.wells() {
            return None;
        }
        let rows = self.kind.rows();
        Some((idx / rows, idx % rows))
    }

    /// Human-readable well id such as `"B2"`.
    pub fn position_id(&self, idx: usize) -> Option<String> {
        let (col, row) = self.well_coords(idx)?;
        let letter = char::from(b'A' + row as u8);
        Some(format!("{letter}{}", col + 1))
    }

    /// Position of a single well on this labware.
    pub fn at(&self, well: usize) -> Position {
        Position {
            labware: self.clone(),
            well,
        }
    }
}

impl fmt::Display for Labware {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// One well on one piece of labware.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Position {
    pub labware: Labware,
    pub well: usize,
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.labware.position_id(self.well) {
            Some(id) => write!(f, "{}, {id}", self.labware),
            None => write!(f, "{}, #{}", self.labware, self.well),
        }
    }
}

/// Per-channel slot of a batched pipetting command.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Channel<T> {
    Engaged(T),
    Skipped,
}

impl<T> Channel<T> {
    pub fn is_engaged(&self) -> bool {
        matches!(self, Self::Engaged(_))
    }

    pub fn engaged(&self) -> Option<&T> {
        match self {
            Self::Engaged(v) => Some(v),
            Self::Skipped => None,
        }
    }

    /// 16-character channel mask, `'1'` for engaged slots.
    pub fn pattern(slots: &[Channel<T>]) -> String {
        let mut mask = vec!['0'; 16];
        for (i, slot) in slots.iter().enumerate().take(16) {
            if slot.is_engaged() {
                mask[i] = '1';
            }
        }
        mask.into_iter().collect()
    }
}

impl<T> From<Option<T>> for Channel<T> {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Skipped, Self::Engaged)
    }
}

/// Opaque pipetting parameters forwarded to the robot.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LiquidOptions {
    /// Height above the well bottom in mm; `None` leaves the robot default.
    pub liquid_height_mm: Option<f64>,
    pub liquid_following: bool,
    /// Dispense with blowout.
    pub blowout: bool,
    pub mix_cycles: u32,
    pub mix_volume_ul: f64,
}

impl LiquidOptions {
    pub fn at_height(mm: f64) -> Self {
        Self {
            liquid_height_mm: Some(mm),
            ..Self::default()
        }
    }

    pub fn following(mut self) -> Self {
        self.liquid_following = true;
        self
    }

    pub fn blowout(mut self) -> Self {
        self.blowout = true;
        self
    }

    pub fn mixing(mut self, cycles: u32, volume_ul: f64) -> Self {
        self.mix_cycles = cycles;
        self.mix_volume_ul = volume_ul;
        self
    }
}

/// One measurement table returned by the plate reader for one protocol.
#[derive(Debug, Clone, PartialEq)]
pub struct PlateData {
    pub path: PathBuf,
    pub plate_id: String,
    pub time: SystemTime,
    cols: usize,
    rows: usize,
    values: Vec<f64>,
}

impl PlateData {
    /// `values` is row-major, `rows * cols` entries.
    pub fn new(
        path: impl Into<PathBuf>,
        plate_id: impl Into<String>,
        time: SystemTime,
        cols: usize,
        rows: usize,
        values: Vec<f64>,
    ) -> Option<Self> {
        if values.len() != cols * rows {
            return None;
        }
        Some(Self {
            path: path.into(),
            plate_id: plate_id.into(),
            time,
            cols,
            rows,
            values,
        })
    }

    /// Same reading in every well.
    pub fn uniform(
        path: impl Into<PathBuf>,
        plate_id: impl Into<String>,
        time: SystemTime,
        value: f64,
    ) -> Self {
        Self {
            path: path.into(),
            plate_id: plate_id.into(),
            time,
            cols: 12,
            rows: 8,
            values: vec![value; 96],
        }
    }

    pub fn value_at(&self, col: usize, row: usize) -> Option<f64> {
        if col >= self.cols || row >= self.rows {
            return None;
        }
        self.values.get(row * self.cols + col).copied()
    }
}
