use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDateTime, TimeDelta};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::SatfetchError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Order {
    Ascending,
    #[default]
    Descending,
}

/// Half-open datetime interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct TimeRange {
    start: NaiveDateTime,
    end: NaiveDateTime,
}

impl TimeRange {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Result<Self, SatfetchError> {
        if start >= end {
            return Err(SatfetchError::InvalidRange { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> NaiveDateTime {
        self.start
    }

    pub fn end(&self) -> NaiveDateTime {
        self.end
    }

    pub fn duration(&self) -> TimeDelta {
        self.end - self.start
    }

    pub fn contains(&self, instant: NaiveDateTime) -> bool {
        self.start <= instant && instant < self.end
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "['{}', '{}')", self.start, self.end)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    Amsu,
    Avhrr,
    Mhs,
    #[default]
    Seviri,
}

impl Collection {
    pub fn query_string(&self) -> &'static str {
        match self {
            Collection::Amsu => "EO:EUM:DAT:METOP:AMSUL1",
            Collection::Avhrr => "EO:EUM:DAT:METOP:AVHRRL1",
            Collection::Mhs => "EO:EUM:DAT:METOP:MHSL1",
            Collection::Seviri => "EO:EUM:DAT:MSG:HRSEVIRI",
        }
    }

    pub fn product_type(&self) -> &'static str {
        match self {
            Collection::Amsu => "AMSUL1",
            Collection::Avhrr => "AVHRRL1",
            Collection::Mhs => "MHSL1",
            Collection::Seviri => "HRSEVIRI",
        }
    }

    /// Minutes past the hour at which the instrument completes a scan.
    pub fn snapshot_minutes(&self) -> &'static [u32] {
        match self {
            Collection::Seviri => &[12, 27, 42, 57],
            Collection::Amsu | Collection::Avhrr | Collection::Mhs => &[],
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Collection::Amsu => write!(f, "amsu"),
            Collection::Avhrr => write!(f, "avhrr"),
            Collection::Mhs => write!(f, "mhs"),
            Collection::Seviri => write!(f, "seviri"),
        }
    }
}

/// Region of interest as (north, south, west, east) limits in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 4]", into = "[f64; 4]")]
pub struct BoundingBox {
    pub north: f64,
    pub south: f64,
    pub west: f64,
    pub east: f64,
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self {
            north: 90.0,
            south: -90.0,
            west: -180.0,
            east: 180.0,
        }
    }
}

impl From<[f64; 4]> for BoundingBox {
    fn from([north, south, west, east]: [f64; 4]) -> Self {
        Self {
            north,
            south,
            west,
            east,
        }
    }
}

impl From<BoundingBox> for [f64; 4] {
    fn from(value: BoundingBox) -> Self {
        [value.north, value.south, value.west, value.east]
    }
}

/// Closed ring of `(lon, lat)` vertices used as a catalog geo filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polygon {
    pub vertices: Vec<(f64, f64)>,
}

impl fmt::Display for Polygon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let coordinates = self
            .vertices
            .iter()
            .map(|(lon, lat)| format!("{lon} {lat}"))
            .collect::<Vec<_>>()
            .join(",");
        write!(f, "POLYGON(({coordinates}))")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Netcdf4,
    Geotiff,
    Hdf5,
    Msgnative,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Netcdf4 => ".nc",
            OutputFormat::Geotiff => ".tif",
            OutputFormat::Hdf5 => ".h5",
            OutputFormat::Msgnative => ".nat",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Netcdf4 => write!(f, "netcdf4"),
            OutputFormat::Geotiff => write!(f, "geotiff"),
            OutputFormat::Hdf5 => write!(f, "hdf5"),
            OutputFormat::Msgnative => write!(f, "msgnative"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProductId(String);

impl ProductId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ProductId {
    type Err = SatfetchError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim();
        if normalized.is_empty() || normalized.chars().any(char::is_whitespace) {
            return Err(SatfetchError::InvalidProductId(value.to_string()));
        }
        Ok(Self(normalized.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Product {
    pub id: ProductId,
    pub sensing_start: Option<NaiveDateTime>,
}

impl Product {
    pub fn new(id: ProductId) -> Self {
        Self {
            id,
            sensing_start: None,
        }
    }

    pub fn with_sensing_start(mut self, sensing_start: NaiveDateTime) -> Self {
        self.sensing_start = Some(sensing_start);
        self
    }
}

/// Width of one catalog query window, written as `<n>d`, `<n>h`, `<n>m` or `<n>s`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchInterval(TimeDelta);

impl BatchInterval {
    pub fn as_delta(&self) -> TimeDelta {
        self.0
    }
}

impl Default for BatchInterval {
    fn default() -> Self {
        Self(TimeDelta::days(30))
    }
}

impl FromStr for BatchInterval {
    type Err = SatfetchError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        let invalid = || SatfetchError::InvalidInterval(value.to_string());
        let split = trimmed.len().checked_sub(1).ok_or_else(invalid)?;
        if !trimmed.is_char_boundary(split) {
            return Err(invalid());
        }
        let (amount, unit) = trimmed.split_at(split);
        let amount: i64 = amount.parse().map_err(|_| invalid())?;
        if amount <= 0 {
            return Err(invalid());
        }
        let delta = match unit {
            "d" => TimeDelta::try_days(amount),
            "h" => TimeDelta::try_hours(amount),
            "m" => TimeDelta::try_minutes(amount),
            "s" => TimeDelta::try_seconds(amount),
            _ => None,
        }
        .ok_or_else(invalid)?;
        Ok(Self(delta))
    }
}
