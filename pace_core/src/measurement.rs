//! Append-only measurement log.
//!
//! One record per vessel per reader protocol. The JSON shape carries
//! `lagoon_number` and `turb_number`, exactly one of them non-null.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use eyre::WrapErr;
use pace_traits::{Labware, PlateData};
use serde::{Serialize, Serializer};

use crate::error::{PaceError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Vessel {
    Turbidostat(usize),
    Lagoon(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataType {
    Abs,
    Lum,
    /// Spectral scan label, e.g. the fluorescence wavelengths.
    Spectrum(String),
}

impl DataType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Abs => "abs",
            Self::Lum => "lum",
            Self::Spectrum(s) => s,
        }
    }
}

impl Serialize for DataType {
    fn serialize<S: Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        s.serialize_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementRecord {
    pub vessel: Vessel,
    /// Reader output the value came from.
    pub filename: PathBuf,
    pub plate_id: String,
    pub timestamp: DateTime<Utc>,
    /// Reader plate well, e.g. `"B2"`.
    pub well: String,
    /// Minutes between pipetting and reading.
    pub delay_minutes: f64,
    pub reading: f64,
    pub data_type: DataType,
}

#[derive(Serialize)]
struct Row<'a> {
    lagoon_number: Option<usize>,
    turb_number: Option<usize>,
    filename: &'a Path,
    plate_id: &'a str,
    timestamp: &'a DateTime<Utc>,
    well: &'a str,
    measurement_delay_time: f64,
    reading: f64,
    data_type: &'a DataType,
}

impl Serialize for MeasurementRecord {
    fn serialize<S: Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        let (lagoon_number, turb_number) = match self.vessel {
            Vessel::Lagoon(n) => (Some(n), None),
            Vessel::Turbidostat(n) => (None, Some(n)),
        };
        Row {
            lagoon_number,
            turb_number,
            filename: &self.filename,
            plate_id: &self.plate_id,
            timestamp: &self.timestamp,
            well: &self.well,
            measurement_delay_time: self.delay_minutes,
            reading: self.reading,
            data_type: &self.data_type,
        }
        .serialize(s)
    }
}

/// Build one record per vessel from a reader table. `wells[v]` is the reader
/// plate well holding vessel `v`'s sample.
pub fn records_from_plate(
    data: &PlateData,
    data_type: &DataType,
    plate: &Labware,
    wells: &[usize],
    vessel: fn(usize) -> Vessel,
) -> std::result::Result<Vec<MeasurementRecord>, PaceError> {
    let timestamp = DateTime::<Utc>::from(data.time);
    wells
        .iter()
        .enumerate()
        .map(|(v, &well)| {
            let missing = || PaceError::MissingReading {
                protocol: data_type.as_str().to_string(),
            };
            let (col, row) = plate.well_coords(well).ok_or_else(missing)?;
            Ok::<_, PaceError>(MeasurementRecord {
                vessel: vessel(v),
                filename: data.path.clone(),
                plate_id: data.plate_id.clone(),
                timestamp,
                well: plate.position_id(well).ok_or_else(missing)?,
                delay_minutes: 0.0,
                reading: data.value_at(col, row).ok_or_else(missing)?,
                data_type: data_type.clone(),
            })
        })
        .collect()
}

pub trait MeasurementLog {
    fn append(&mut self, records: &[MeasurementRecord]) -> Result<()>;
}

/// JSON-lines file, opened in append mode for every batch of records.
#[derive(Debug, Clone)]
pub struct JsonlLog {
    path: PathBuf,
}

impl JsonlLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl MeasurementLog for JsonlLog {
    fn append(&mut self, records: &[MeasurementRecord]) -> Result<()> {
        let mut buf = Vec::new();
        for r in records {
            serde_json::to_writer(&mut buf, r).wrap_err("serialize measurement")?;
            buf.push(b'\n');
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .wrap_err_with(|| format!("open measurement log {}", self.path.display()))?;
        file.write_all(&buf)
            .and_then(|()| file.flush())
            .wrap_err_with(|| format!("append to measurement log {}", self.path.display()))?;
        tracing::debug!(count = records.len(), path = %self.path.display(), "measurements appended");
        Ok(())
    }
}

/// In-memory log; clones share the same records.
#[derive(Debug, Clone, Default)]
pub struct MemoryLog {
    records: Arc<Mutex<Vec<MeasurementRecord>>>,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<MeasurementRecord> {
        self.records.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl MeasurementLog for MemoryLog {
    fn append(&mut self, records: &[MeasurementRecord]) -> Result<()> {
        self.records
            .lock()
            .map_err(|_| PaceError::Poisoned("measurement log"))?
            .extend_from_slice(records);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pace_traits::LabwareKind;
    use std::time::SystemTime;

    #[test]
    fn exactly_one_vessel_number_is_set() {
        let plate = Labware::new("reader_tl_0", LabwareKind::Plate96);
        let data = PlateData::uniform("abs.csv", "p0", SystemTime::UNIX_EPOCH, 0.25);
        let recs = records_from_plate(&data, &DataType::Lum, &plate, &[9], Vessel::Lagoon).unwrap();
        let v = serde_json::to_value(&recs[0]).unwrap();
        assert_eq!(v["lagoon_number"], 0);
        assert!(v["turb_number"].is_null());
        assert_eq!(v["well"], "B2");
        assert_eq!(v["data_type"], "lum");
        assert_eq!(v["measurement_delay_time"], 0.0);
        assert!(v["timestamp"].as_str().unwrap().starts_with("1970-01-01T00:00:00"));
    }

    #[test]
    fn spectrum_labels_serialize_verbatim() {
        let v = serde_json::to_value(DataType::Spectrum("485/520".into())).unwrap();
        assert_eq!(v, "485/520");
    }
}
