use serde::{Deserialize, Serialize};

/// Reference ellipsoid of a coordinate system.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Datum {
    semimajor: f64,
}

impl Datum {
    /// WGS84 ellipsoid.
    pub const WGS84: Self = Datum {
        semimajor: 6_378_137.0,
    };

    /// Semimajor axis in meters.
    pub fn semimajor(&self) -> f64 {
        self.semimajor
    }

    /// Length of one degree of longitude at the equator, in meters.
    pub fn meters_per_degree(&self) -> f64 {
        2.0 * std::f64::consts::PI * self.semimajor / 360.0
    }
}

impl Default for Datum {
    fn default() -> Self {
        Self::WGS84
    }
}
