//! Coordinates and great-circle distance.
//!
//! Distances are measured in whole yards, which is the unit the scoring
//! curve is expressed in.

use crate::error::{GameError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Mean Earth radius in statute miles.
pub const EARTH_RADIUS_MILES: f64 = 3959.0;
pub const YARDS_PER_MILE: f64 = 1760.0;

/// A (latitude, longitude) pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawCoordinate")]
pub struct Coordinate {
    lat: f64,
    lon: f64,
}

/// Unchecked wire form; deserialization goes through [`Coordinate::new`].
#[derive(Deserialize)]
struct RawCoordinate {
    lat: f64,
    lon: f64,
}

impl TryFrom<RawCoordinate> for Coordinate {
    type Error = GameError;

    fn try_from(raw: RawCoordinate) -> Result<Self> {
        Coordinate::new(raw.lat, raw.lon)
    }
}

impl Coordinate {
    pub fn new(lat: f64, lon: f64) -> Result<Self> {
        let in_range = (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lon);
        if !in_range {
            return Err(GameError::InvalidCoordinate { lat, lon });
        }
        Ok(Self { lat, lon })
    }

    pub fn lat(&self) -> f64 {
        self.lat
    }

    pub fn lon(&self) -> f64 {
        self.lon
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.5}, {:.5}", self.lat, self.lon)
    }
}

/// Parses `"lat,lon"` with optional surrounding whitespace.
impl FromStr for Coordinate {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (lat, lon) = s
            .split_once(',')
            .ok_or_else(|| format!("expected \"lat,lon\", got {s:?}"))?;
        let lat: f64 = lat
            .trim()
            .parse()
            .map_err(|_| format!("bad latitude {:?}", lat.trim()))?;
        let lon: f64 = lon
            .trim()
            .parse()
            .map_err(|_| format!("bad longitude {:?}", lon.trim()))?;
        Coordinate::new(lat, lon).map_err(|e| e.to_string())
    }
}

/// Haversine distance between two coordinates, rounded to the nearest yard.
pub fn distance_yards(a: Coordinate, b: Coordinate) -> u64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lon = (b.lon - a.lon).to_radians();

    let sin_dlat = (d_lat / 2.0).sin();
    let sin_dlon = (d_lon / 2.0).sin();
    // rounding can push h a hair above 1 for antipodal points
    let h = (sin_dlat * sin_dlat + lat1.cos() * lat2.cos() * sin_dlon * sin_dlon).min(1.0);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    (EARTH_RADIUS_MILES * c * YARDS_PER_MILE).round() as u64
}

/// Arithmetic mean of a set of coordinates. `None` for an empty set.
pub fn centroid<I>(points: I) -> Option<Coordinate>
where
    I: IntoIterator<Item = Coordinate>,
{
    let (count, lat_sum, lon_sum) = points
        .into_iter()
        .fold((0usize, 0.0, 0.0), |(n, lat, lon), p| {
            (n + 1, lat + p.lat, lon + p.lon)
        });
    if count == 0 {
        return None;
    }
    Some(Coordinate {
        lat: lat_sum / count as f64,
        lon: lon_sum / count as f64,
    })
}

/// Axis-aligned lat/lon box around a set of points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub south_west: Coordinate,
    pub north_east: Coordinate,
}

impl Bounds {
    pub fn around<I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = Coordinate>,
    {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let mut bounds = Bounds {
            south_west: first,
            north_east: first,
        };
        for p in iter {
            bounds.extend(p);
        }
        Some(bounds)
    }

    pub fn extend(&mut self, p: Coordinate) {
        self.south_west.lat = self.south_west.lat.min(p.lat);
        self.south_west.lon = self.south_west.lon.min(p.lon);
        self.north_east.lat = self.north_east.lat.max(p.lat);
        self.north_east.lon = self.north_east.lon.max(p.lon);
    }

    /// Grows the box on every side by `ratio` of its height/width, clamped to
    /// valid coordinate ranges.
    pub fn pad(&self, ratio: f64) -> Self {
        let lat_pad = (self.north_east.lat - self.south_west.lat).abs() * ratio;
        let lon_pad = (self.north_east.lon - self.south_west.lon).abs() * ratio;
        Bounds {
            south_west: Coordinate {
                lat: (self.south_west.lat - lat_pad).max(-90.0),
                lon: (self.south_west.lon - lon_pad).max(-180.0),
            },
            north_east: Coordinate {
                lat: (self.north_east.lat + lat_pad).min(90.0),
                lon: (self.north_east.lon + lon_pad).min(180.0),
            },
        }
    }

    pub fn contains(&self, p: Coordinate) -> bool {
        (self.south_west.lat..=self.north_east.lat).contains(&p.lat)
            && (self.south_west.lon..=self.north_east.lon).contains(&p.lon)
    }
}
