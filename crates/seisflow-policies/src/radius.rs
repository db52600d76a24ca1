//! Magnitude-to-search-radius schedule (§4.6).
//!
//! A piecewise-linear function of four scalars: below `min_mag` the radius
//! is clamped to `min_mag_radius`, above `max_mag` to `max_mag_radius`,
//! linear in between.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RadiusSchedule {
    pub min_mag: f64,
    pub max_mag: f64,
    pub min_mag_radius_deg: f64,
    pub max_mag_radius_deg: f64,
}

impl RadiusSchedule {
    /// Search radius in degrees for the given event magnitude.
    pub fn radius_deg(&self, magnitude: f64) -> f64 {
        if self.max_mag <= self.min_mag {
            // Degenerate schedule: no interpolation is possible, clamp to
            // whichever bound is reached first.
            return if magnitude <= self.min_mag { self.min_mag_radius_deg } else { self.max_mag_radius_deg };
        }
        let clamped = magnitude.clamp(self.min_mag, self.max_mag);
        let t = (clamped - self.min_mag) / (self.max_mag - self.min_mag);
        self.min_mag_radius_deg + t * (self.max_mag_radius_deg - self.min_mag_radius_deg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schedule() -> RadiusSchedule {
        RadiusSchedule { min_mag: 3.0, max_mag: 7.0, min_mag_radius_deg: 1.0, max_mag_radius_deg: 10.0 }
    }

    #[test]
    fn below_min_mag_uses_min_radius() {
        assert_eq!(schedule().radius_deg(1.0), 1.0);
    }

    #[test]
    fn above_max_mag_uses_max_radius() {
        assert_eq!(schedule().radius_deg(9.0), 10.0);
    }

    #[test]
    fn linear_in_between() {
        // magnitude 5.0 is the midpoint of [3, 7] -> midpoint of [1, 10].
        let r = schedule().radius_deg(5.0);
        assert!((r - 5.5).abs() < 1e-9);
    }

    #[test]
    fn matches_spec_worked_example() {
        // spec.md §8 scenario 1: (3, 7, 1, 10) at magnitude 5 -> 5.5deg.
        let s = RadiusSchedule { min_mag: 3.0, max_mag: 7.0, min_mag_radius_deg: 1.0, max_mag_radius_deg: 10.0 };
        assert!((s.radius_deg(5.0) - 5.5).abs() < 1e-9);
    }
}
