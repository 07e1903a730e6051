//! Geohash scores for members of a sorted set.
//!
//! A position is stored as a 52-bit interleaved geohash: latitude bits at even
//! positions, longitude bits at odd ones, 26 bits each. The score decodes to the
//! center of its grid cell, so positions read back are close to, not equal to, what
//! was stored.

pub const MIN_LONGITUDE: f64 = -180.0;
pub const MAX_LONGITUDE: f64 = 180.0;
pub const MIN_LATITUDE: f64 = -85.05112878;
pub const MAX_LATITUDE: f64 = 85.05112878;

const LONGITUDE_RANGE: f64 = MAX_LONGITUDE - MIN_LONGITUDE;
const LATITUDE_RANGE: f64 = MAX_LATITUDE - MIN_LATITUDE;
const GRID_CELLS: f64 = (1u64 << 26) as f64;

const EARTH_RADIUS_IN_METERS: f64 = 6372797.560856;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub longitude: f64,
    pub latitude: f64,
}

impl Coordinates {
    /// `None` outside the area a geohash can represent.
    pub fn new(longitude: f64, latitude: f64) -> Option<Self> {
        let valid = (MIN_LONGITUDE..=MAX_LONGITUDE).contains(&longitude)
            && (MIN_LATITUDE..=MAX_LATITUDE).contains(&latitude);

        valid.then_some(Self {
            longitude,
            latitude,
        })
    }

    pub fn encode(&self) -> u64 {
        let longitude = (GRID_CELLS * (self.longitude - MIN_LONGITUDE) / LONGITUDE_RANGE) as u32;
        let latitude = (GRID_CELLS * (self.latitude - MIN_LATITUDE) / LATITUDE_RANGE) as u32;

        spread(latitude) | (spread(longitude) << 1)
    }

    pub fn decode(score: u64) -> Self {
        let longitude_cell = compact(score >> 1) as f64;
        let latitude_cell = compact(score) as f64;

        Self {
            longitude: MIN_LONGITUDE + LONGITUDE_RANGE * (longitude_cell + 0.5) / GRID_CELLS,
            latitude: MIN_LATITUDE + LATITUDE_RANGE * (latitude_cell + 0.5) / GRID_CELLS,
        }
    }

    /// Great-circle (haversine) distance in meters.
    pub fn distance_to(&self, other: &Coordinates) -> f64 {
        let latitude_delta = (other.latitude - self.latitude).to_radians();
        let longitude_delta = (other.longitude - self.longitude).to_radians();

        let a = (latitude_delta / 2.0).sin().powi(2)
            + (longitude_delta / 2.0).sin().powi(2)
                * self.latitude.to_radians().cos()
                * other.latitude.to_radians().cos();

        2.0 * EARTH_RADIUS_IN_METERS * a.sqrt().asin()
    }
}

/// Moves bit `i` of `value` to bit `2i`.
fn spread(value: u32) -> u64 {
    let mut result = value as u64;
    result = (result | (result << 16)) & 0x0000_FFFF_0000_FFFF;
    result = (result | (result << 8)) & 0x00FF_00FF_00FF_00FF;
    result = (result | (result << 4)) & 0x0F0F_0F0F_0F0F_0F0F;
    result = (result | (result << 2)) & 0x3333_3333_3333_3333;
    (result | (result << 1)) & 0x5555_5555_5555_5555
}

fn compact(value: u64) -> u32 {
    let mut result = value & 0x5555_5555_5555_5555;
    result = (result | (result >> 1)) & 0x3333_3333_3333_3333;
    result = (result | (result >> 2)) & 0x0F0F_0F0F_0F0F_0F0F;
    result = (result | (result >> 4)) & 0x00FF_00FF_00FF_00FF;
    result = (result | (result >> 8)) & 0x0000_FFFF_0000_FFFF;
    ((result | (result >> 16)) & 0x0000_0000_FFFF_FFFF) as u32
}
