//! Geohash grid encoding.
//!
//! The world is split by alternately halving longitude and latitude; every
//! five halvings pick one base32 character. A hash of length `p` names a cell
//! at precision level `p`, and the hash of a point at level `p` is a prefix
//! of its hash at every finer level. That prefix property is what lets a
//! spatially indexed field store one synthetic term per level and answer
//! containment queries with a single term lookup.

use crate::error::{Result, TesseraError};
use crate::spatial::point::GeoPoint;

/// Finest supported precision level (about 3.7cm x 1.9cm cells).
pub const MAX_PRECISION: usize = 12;

/// Prefix of the reserved field namespace holding cell terms.
pub const CELL_FIELD_PREFIX: &str = "$geo:";

const BASE32: &[u8; 32] = b"0123456789bcdefghjkmnpqrstuvwxyz";

/// Latitude/longitude extent of one grid cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellBounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl CellBounds {
    /// Whether the point falls inside this cell (lower edges inclusive).
    pub fn contains(&self, point: &GeoPoint) -> bool {
        let lat_ok = point.lat >= self.min_lat
            && (point.lat < self.max_lat || (self.max_lat == 90.0 && point.lat == 90.0));
        let lon_ok = point.lon >= self.min_lon
            && (point.lon < self.max_lon || (self.max_lon == 180.0 && point.lon == 180.0));
        lat_ok && lon_ok
    }

    /// Center of the cell.
    pub fn center(&self) -> (f64, f64) {
        (
            (self.min_lat + self.max_lat) / 2.0,
            (self.min_lon + self.max_lon) / 2.0,
        )
    }
}

fn check_precision(precision: usize) -> Result<()> {
    if precision == 0 || precision > MAX_PRECISION {
        return Err(TesseraError::validation(format!(
            "geohash precision must be in 1..={MAX_PRECISION}, got {precision}"
        )));
    }
    Ok(())
}

/// Encode a point as a geohash of `precision` characters.
pub fn encode(point: &GeoPoint, precision: usize) -> Result<String> {
    check_precision(precision)?;

    let mut lat_range = (-90.0f64, 90.0f64);
    let mut lon_range = (-180.0f64, 180.0f64);
    let mut hash = String::with_capacity(precision);
    let mut even = true;
    let mut bits = 0u8;
    let mut ch = 0usize;

    while hash.len() < precision {
        let (range, value) = if even {
            (&mut lon_range, point.lon)
        } else {
            (&mut lat_range, point.lat)
        };

        let mid = (range.0 + range.1) / 2.0;
        ch <<= 1;
        if value >= mid {
            ch |= 1;
            range.0 = mid;
        } else {
            range.1 = mid;
        }

        even = !even;
        bits += 1;
        if bits == 5 {
            hash.push(BASE32[ch] as char);
            bits = 0;
            ch = 0;
        }
    }

    Ok(hash)
}

/// Decode a geohash into the bounds of the cell it names.
pub fn decode_bounds(hash: &str) -> Result<CellBounds> {
    check_precision(hash.len())?;

    let mut lat_range = (-90.0f64, 90.0f64);
    let mut lon_range = (-180.0f64, 180.0f64);
    let mut even = true;

    for c in hash.bytes() {
        let index = BASE32
            .iter()
            .position(|&b| b == c)
            .ok_or_else(|| TesseraError::validation(format!("invalid geohash character '{}'", c as char)))?;

        for shift in (0..5).rev() {
            let range = if even { &mut lon_range } else { &mut lat_range };
            let mid = (range.0 + range.1) / 2.0;
            if (index >> shift) & 1 == 1 {
                range.0 = mid;
            } else {
                range.1 = mid;
            }
            even = !even;
        }
    }

    Ok(CellBounds {
        min_lat: lat_range.0,
        max_lat: lat_range.1,
        min_lon: lon_range.0,
        max_lon: lon_range.1,
    })
}

/// Cell terms covering `point` at each of the given precision levels.
///
/// Levels outside `1..=MAX_PRECISION` are rejected; duplicates collapse.
pub fn cell_terms(point: &GeoPoint, levels: &[usize]) -> Result<Vec<String>> {
    let finest = match levels.iter().max() {
        Some(&finest) => finest,
        None => return Ok(Vec::new()),
    };
    for &level in levels {
        check_precision(level)?;
    }

    let full = encode(point, finest)?;
    let mut sorted = levels.to_vec();
    sorted.sort_unstable();
    sorted.dedup();

    Ok(sorted.into_iter().map(|level| full[..level].to_string()).collect())
}

/// Name of the reserved field holding cell terms for `field`.
pub fn cell_field(field: &str) -> String {
    format!("{CELL_FIELD_PREFIX}{field}")
}
