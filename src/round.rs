use crate::error::{GameError, Result};
use crate::geo::{distance_yards, Coordinate};
use crate::scoring::ScoringPolicy;
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Ground truth for one round, as handed over by the place loader.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundTarget {
    pub id: u32,
    /// `None` while the loader has not produced a coordinate for this place.
    pub location: Option<Coordinate>,
    /// Fun fact shown once the round resolves.
    pub annotation: Option<String>,
    pub image: Option<String>,
}

impl RoundTarget {
    pub fn new(id: u32, location: Coordinate) -> Self {
        Self {
            id,
            location: Some(location),
            annotation: None,
            image: None,
        }
    }

    pub fn with_annotation(mut self, annotation: impl Into<String>) -> Self {
        self.annotation = Some(annotation.into());
        self
    }
}

/// How a round ended.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Resolution {
    Guess(Coordinate),
    /// The countdown ran out. `pointer` is the last pin position, if any; it
    /// is recorded for display but never scored.
    Timeout { pointer: Option<Coordinate> },
}

impl Resolution {
    pub fn guess(&self) -> Option<Coordinate> {
        match *self {
            Resolution::Guess(c) => Some(c),
            Resolution::Timeout { pointer } => pointer,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Resolution::Timeout { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundResult {
    /// 1-based
    pub round: usize,
    pub target_id: u32,
    pub guess: Option<Coordinate>,
    pub target: Coordinate,
    pub distance_yards: Option<u64>,
    pub timed_out: bool,
    pub points: u32,
    pub annotation: Option<String>,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RoundStatus {
    Blocked,
    Pending,
    Resolved(RoundResult),
}

/// The live round: which target it plays and whether it has been decided.
#[derive(Debug, Clone)]
pub struct RoundState {
    index: usize,
    target: RoundTarget,
    started_at: Instant,
    status: RoundStatus,
}

impl RoundState {
    pub fn new(index: usize, target: RoundTarget) -> Self {
        let status = if target.location.is_some() {
            RoundStatus::Pending
        } else {
            RoundStatus::Blocked
        };
        Self {
            index,
            target,
            started_at: Instant::now(),
            status,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn target(&self) -> &RoundTarget {
        &self.target
    }

    pub fn status(&self) -> &RoundStatus {
        &self.status
    }

    pub fn is_pending(&self) -> bool {
        self.status == RoundStatus::Pending
    }

    pub fn result(&self) -> Option<&RoundResult> {
        match &self.status {
            RoundStatus::Resolved(result) => Some(result),
            _ => None,
        }
    }

    /// Supplies the coordinate a blocked round was waiting for. The round's
    /// clock restarts since guessing only becomes possible now.
    pub fn attach_location(&mut self, location: Coordinate) -> Result<()> {
        match self.status {
            RoundStatus::Blocked => {
                self.target.location = Some(location);
                self.status = RoundStatus::Pending;
                self.started_at = Instant::now();
                Ok(())
            }
            RoundStatus::Pending | RoundStatus::Resolved(_) => Err(
                GameError::InvalidConfiguration(format!(
                    "round {} already has a target location",
                    self.index + 1
                )),
            ),
        }
    }

    /// Decides the round. Only a pending round can be resolved; the stored
    /// result is never replaced.
    pub fn resolve(&mut self, resolution: Resolution, policy: &ScoringPolicy) -> Result<RoundResult> {
        let target = match (&self.status, self.target.location) {
            (RoundStatus::Pending, Some(target)) => target,
            (RoundStatus::Resolved(_), _) => {
                return Err(GameError::AlreadyResolved {
                    round: self.index + 1,
                })
            }
            _ => {
                return Err(GameError::RoundBlocked {
                    round: self.index + 1,
                })
            }
        };

        let guess = resolution.guess();
        let timed_out = resolution.is_timeout();
        let distance = guess.map(|g| distance_yards(g, target));
        let points = match distance {
            Some(d) => policy.points(d, timed_out),
            None => 0,
        };

        let result = RoundResult {
            round: self.index + 1,
            target_id: self.target.id,
            guess,
            target,
            distance_yards: distance,
            timed_out,
            points,
            annotation: self.target.annotation.clone(),
            elapsed_ms: self.started_at.elapsed().as_millis() as u64,
        };
        self.status = RoundStatus::Resolved(result.clone());
        Ok(result)
    }
}
