use crate::error::{GameError, Result};
use serde::{Deserialize, Serialize};

pub const MAX_ROUND_POINTS: u32 = 5000;
pub const PERFECT_RADIUS_YARDS: u64 = 12;
pub const ZERO_POINTS_YARDS: u64 = 500;

/// Maps a guess distance to round points.
///
/// Guesses inside `perfect_radius_yards` earn full points. Beyond that the
/// award decays linearly and reaches zero at `zero_points_yards`. A timed-out
/// round always scores zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoringPolicy {
    pub max_points: u32,
    pub perfect_radius_yards: u64,
    pub zero_points_yards: u64,
}

impl Default for ScoringPolicy {
    fn default() -> Self {
        Self {
            max_points: MAX_ROUND_POINTS,
            perfect_radius_yards: PERFECT_RADIUS_YARDS,
            zero_points_yards: ZERO_POINTS_YARDS,
        }
    }
}

impl ScoringPolicy {
    pub fn validate(&self) -> Result<()> {
        if self.zero_points_yards == 0 {
            return Err(GameError::InvalidConfiguration(
                "zero_points_yards must be positive".to_string(),
            ));
        }
        if self.perfect_radius_yards >= self.zero_points_yards {
            return Err(GameError::InvalidConfiguration(format!(
                "perfect radius ({} yd) must be below the zero-points radius ({} yd)",
                self.perfect_radius_yards, self.zero_points_yards
            )));
        }
        Ok(())
    }

    pub fn points(&self, distance_yards: u64, timed_out: bool) -> u32 {
        if timed_out {
            return 0;
        }
        if distance_yards < self.perfect_radius_yards {
            return self.max_points;
        }
        let fraction = 1.0 - distance_yards as f64 / self.zero_points_yards as f64;
        (self.max_points as f64 * fraction).round().max(0.0) as u32
    }

    pub fn max_session_points(&self, rounds: usize) -> u64 {
        self.max_points as u64 * rounds as u64
    }
}
