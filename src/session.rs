use crate::error::{GameError, Result};
use crate::geo::{centroid, Bounds, Coordinate};
use crate::round::{Resolution, RoundResult, RoundState, RoundTarget};
use crate::scoring::ScoringPolicy;
use chrono::{DateTime, Local};
use log::info;
use serde::{Deserialize, Serialize};

/// Padding applied around the summary map so pins do not sit on the edge.
const MAP_PADDING: f64 = 0.2;

#[derive(Debug, Clone)]
struct SessionState {
    targets: Vec<RoundTarget>,
    current_index: usize,
    round: RoundState,
    results: Vec<RoundResult>,
    terminal: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MapView {
    pub center: Coordinate,
    pub bounds: Bounds,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub total_points: u64,
    pub max_points: u64,
    pub round_count: usize,
    pub results: Vec<RoundResult>,
    pub played_at: DateTime<Local>,
}

impl SessionSummary {
    fn new(results: Vec<RoundResult>, policy: &ScoringPolicy) -> Self {
        let round_count = results.len();
        Self {
            total_points: results.iter().map(|r| r.points as u64).sum(),
            max_points: policy.max_session_points(round_count),
            round_count,
            results,
            played_at: Local::now(),
        }
    }

    pub fn score_percentage(&self) -> f64 {
        if self.max_points == 0 {
            return 0.0;
        }
        self.total_points as f64 / self.max_points as f64 * 100.0
    }

    pub fn timed_out_rounds(&self) -> usize {
        self.results.iter().filter(|r| r.timed_out).count()
    }

    /// Every guess and target location, in round order.
    pub fn pins(&self) -> impl Iterator<Item = Coordinate> + '_ {
        self.results
            .iter()
            .flat_map(|r| r.guess.into_iter().chain(std::iter::once(r.target)))
    }

    /// Centre and padded bounds covering all pins of the session.
    pub fn map_view(&self) -> Option<MapView> {
        let center = centroid(self.pins())?;
        let bounds = Bounds::around(self.pins())?.pad(MAP_PADDING);
        Some(MapView { center, bounds })
    }
}

/// Drives one fixed-length game.
///
/// Guesses and timer expiries both end up in [`SessionEngine::resolve_round`],
/// which only accepts the round that is currently live. Anything else is
/// rejected and leaves the recorded results untouched.
#[derive(Debug, Clone)]
pub struct SessionEngine {
    state: SessionState,
    policy: ScoringPolicy,
    summary: Option<SessionSummary>,
}

impl SessionEngine {
    pub fn start(targets: Vec<RoundTarget>, policy: ScoringPolicy) -> Result<Self> {
        policy.validate()?;
        let first = targets.first().cloned().ok_or_else(|| {
            GameError::InvalidConfiguration("a session needs at least one round".to_string())
        })?;

        info!("starting session with {} rounds", targets.len());
        Ok(Self {
            state: SessionState {
                round: RoundState::new(0, first),
                results: Vec::with_capacity(targets.len()),
                targets,
                current_index: 0,
                terminal: false,
            },
            policy,
            summary: None,
        })
    }

    pub fn round_count(&self) -> usize {
        self.state.targets.len()
    }

    /// 0-based index of the live round.
    pub fn current_index(&self) -> usize {
        self.state.current_index
    }

    pub fn is_terminal(&self) -> bool {
        self.state.terminal
    }

    pub fn results(&self) -> &[RoundResult] {
        &self.state.results
    }

    pub fn running_total(&self) -> u64 {
        self.state.results.iter().map(|r| r.points as u64).sum()
    }

    pub fn current_round(&self) -> Result<&RoundState> {
        if self.state.terminal {
            return Err(GameError::OutOfRange {
                index: self.state.current_index + 1,
                len: self.round_count(),
            });
        }
        Ok(&self.state.round)
    }

    pub fn current_target(&self) -> Result<&RoundTarget> {
        self.current_round().map(RoundState::target)
    }

    /// Unblocks the live round once its target coordinate is known.
    pub fn attach_location(&mut self, location: Coordinate) -> Result<()> {
        if self.state.terminal {
            return Err(GameError::SessionFinalized);
        }
        self.state.round.attach_location(location)?;
        self.state.targets[self.state.current_index].location = Some(location);
        Ok(())
    }

    pub fn submit_guess(&mut self, guess: Coordinate) -> Result<RoundResult> {
        self.resolve_current_round(Resolution::Guess(guess))
    }

    /// Handles a countdown expiry armed for `round_index`.
    pub fn on_timeout(&mut self, round_index: usize, pointer: Option<Coordinate>) -> Result<RoundResult> {
        self.resolve_round(round_index, Resolution::Timeout { pointer })
    }

    pub fn resolve_current_round(&mut self, resolution: Resolution) -> Result<RoundResult> {
        self.resolve_round(self.state.current_index, resolution)
    }

    /// Resolves round `round_index` (0-based) if, and only if, it is the live
    /// round, then advances or finalizes the session.
    pub fn resolve_round(&mut self, round_index: usize, resolution: Resolution) -> Result<RoundResult> {
        if self.state.terminal {
            return Err(GameError::SessionFinalized);
        }
        if round_index < self.state.current_index {
            return Err(GameError::AlreadyResolved {
                round: round_index + 1,
            });
        }
        if round_index > self.state.current_index {
            return Err(GameError::OutOfRange {
                index: round_index,
                len: self.round_count(),
            });
        }

        let result = self.state.round.resolve(resolution, &self.policy)?;
        self.state.results.push(result.clone());

        let next = self.state.current_index + 1;
        if next < self.round_count() {
            self.state.current_index = next;
            self.state.round = RoundState::new(next, self.state.targets[next].clone());
        } else {
            self.state.terminal = true;
            let summary = SessionSummary::new(self.state.results.clone(), &self.policy);
            info!(
                "session finished: {} / {} points",
                summary.total_points, summary.max_points
            );
            self.summary = Some(summary);
        }

        Ok(result)
    }

    pub fn summary(&self) -> Result<&SessionSummary> {
        self.summary.as_ref().ok_or(GameError::InProgress)
    }

    /// Hands the finished summary over, discarding the session state.
    pub fn into_summary(self) -> Result<SessionSummary> {
        self.summary.ok_or(GameError::InProgress)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn coord(lat: f64, lon: f64) -> Coordinate {
        Coordinate::new(lat, lon).unwrap()
    }

    fn targets(n: u32) -> Vec<RoundTarget> {
        (0..n)
            .map(|i| RoundTarget::new(i + 1, coord(42.3398 + i as f64 * 0.001, -71.0892)))
            .collect()
    }

    #[test]
    fn test_start_requires_targets() {
        let err = SessionEngine::start(vec![], ScoringPolicy::default()).unwrap_err();
        assert_matches!(err, GameError::InvalidConfiguration(_));
    }

    #[test]
    fn test_start_rejects_bad_policy() {
        let policy = ScoringPolicy {
            zero_points_yards: 0,
            ..ScoringPolicy::default()
        };
        assert!(SessionEngine::start(targets(1), policy).is_err());
    }

    #[test]
    fn test_start_state() {
        let engine = SessionEngine::start(targets(5), ScoringPolicy::default()).unwrap();
        assert_eq!(engine.current_index(), 0);
        assert_eq!(engine.round_count(), 5);
        assert!(engine.results().is_empty());
        assert!(!engine.is_terminal());
        assert_eq!(engine.current_target().unwrap().id, 1);
        assert_matches!(engine.summary(), Err(GameError::InProgress));
    }

    #[test]
    fn test_rounds_advance_in_order() {
        let mut engine = SessionEngine::start(targets(3), ScoringPolicy::default()).unwrap();
        engine.submit_guess(coord(0.0, 0.0)).unwrap();
        assert_eq!(engine.current_index(), 1);
        assert_eq!(engine.current_target().unwrap().id, 2);
        engine.on_timeout(1, None).unwrap();
        assert_eq!(engine.current_target().unwrap().id, 3);
    }

    #[test]
    fn test_terminal_after_exactly_n_resolutions() {
        let n = 4;
        let mut engine = SessionEngine::start(targets(n), ScoringPolicy::default()).unwrap();
        for i in 0..n as usize {
            assert!(!engine.is_terminal(), "terminal before round {}", i + 1);
            engine.submit_guess(coord(42.3398, -71.0892)).unwrap();
        }
        assert!(engine.is_terminal());
        assert_matches!(engine.current_target(), Err(GameError::OutOfRange { .. }));
        assert_matches!(
            engine.submit_guess(coord(0.0, 0.0)),
            Err(GameError::SessionFinalized)
        );
    }

    #[test]
    fn test_stale_timeout_is_rejected() {
        let mut engine = SessionEngine::start(targets(2), ScoringPolicy::default()).unwrap();
        let first = engine.submit_guess(coord(42.3398, -71.0892)).unwrap();

        // Countdown for round 0 fires after the guess already moved us on.
        let err = engine.on_timeout(0, None).unwrap_err();
        assert_matches!(err, GameError::AlreadyResolved { round: 1 });
        assert_eq!(engine.results(), &[first]);
        assert_eq!(engine.current_index(), 1);
    }

    #[test]
    fn test_resolving_same_index_twice_keeps_first_result() {
        let mut engine = SessionEngine::start(targets(3), ScoringPolicy::default()).unwrap();
        let first = engine
            .resolve_round(0, Resolution::Guess(coord(42.3398, -71.0892)))
            .unwrap();
        let err = engine
            .resolve_round(0, Resolution::Guess(coord(10.0, 10.0)))
            .unwrap_err();
        assert_matches!(err, GameError::AlreadyResolved { .. });
        assert_eq!(engine.results()[0], first);
        assert_eq!(engine.results().len(), 1);
    }

    #[test]
    fn test_future_round_is_out_of_range() {
        let mut engine = SessionEngine::start(targets(2), ScoringPolicy::default()).unwrap();
        assert_matches!(
            engine.on_timeout(1, None),
            Err(GameError::OutOfRange { index: 1, len: 2 })
        );
        assert!(engine.results().is_empty());
    }

    #[test]
    fn test_late_timeout_after_final_guess_is_rejected() {
        let mut engine = SessionEngine::start(targets(1), ScoringPolicy::default()).unwrap();
        engine.submit_guess(coord(42.3398, -71.0892)).unwrap();
        assert_matches!(engine.on_timeout(0, None), Err(GameError::SessionFinalized));
        assert_eq!(engine.summary().unwrap().total_points, 5000);
    }

    #[test]
    fn test_blocked_round_waits_for_location() {
        let mut t = targets(2);
        t[0].location = None;
        let mut engine = SessionEngine::start(t, ScoringPolicy::default()).unwrap();

        assert_matches!(
            engine.submit_guess(coord(0.0, 0.0)),
            Err(GameError::RoundBlocked { round: 1 })
        );
        assert_matches!(
            engine.on_timeout(0, None),
            Err(GameError::RoundBlocked { round: 1 })
        );

        engine.attach_location(coord(1.0, 1.0)).unwrap();
        assert_eq!(engine.current_target().unwrap().location, Some(coord(1.0, 1.0)));
        let result = engine.submit_guess(coord(1.0, 1.0)).unwrap();
        assert_eq!(result.points, 5000);
    }

    #[test]
    fn test_summary_totals_and_map_view() {
        let mut engine = SessionEngine::start(targets(2), ScoringPolicy::default()).unwrap();
        engine.submit_guess(coord(42.3398, -71.0892)).unwrap();
        engine.on_timeout(1, None).unwrap();

        let summary = engine.summary().unwrap();
        assert_eq!(summary.round_count, 2);
        assert_eq!(summary.max_points, 10_000);
        assert_eq!(
            summary.total_points,
            summary.results.iter().map(|r| r.points as u64).sum::<u64>()
        );
        assert_eq!(summary.timed_out_rounds(), 1);
        assert!((summary.score_percentage() - 50.0).abs() < f64::EPSILON);

        // Guess + target for round 1, target only for the timed-out round 2
        assert_eq!(summary.pins().count(), 3);
        let view = summary.map_view().unwrap();
        for pin in summary.pins() {
            assert!(view.bounds.contains(pin));
        }
    }

    #[test]
    fn test_into_summary() {
        let engine = SessionEngine::start(targets(1), ScoringPolicy::default()).unwrap();
        assert_matches!(engine.clone().into_summary(), Err(GameError::InProgress));

        let mut engine = engine;
        engine.on_timeout(0, None).unwrap();
        let summary = engine.into_summary().unwrap();
        assert_eq!(summary.total_points, 0);
    }
}
