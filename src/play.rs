//! Plays one session from runtime events.
//!
//! Player guesses and countdown expiries are the two producers feeding the
//! engine. Both arrive through the same [`Runner`], so they are handled one
//! at a time; a producer that loses the race gets a rejection which is
//! logged and dropped.

use crate::error::{GameError, PlayError};
use crate::geo::Coordinate;
use crate::round::{RoundResult, RoundTarget};
use crate::runtime::{GameEvent, GameEventSource, Runner, Ticker};
use crate::session::{SessionEngine, SessionSummary};
use crate::timer::{Countdown, TimerEvent};
use log::debug;
use std::io::Write;
use std::time::Instant;

#[derive(Debug, Clone, PartialEq)]
pub enum PlayOutcome {
    Finished(SessionSummary),
    Quit { completed_rounds: usize },
}

/// Plays every remaining round of `engine`.
///
/// `locate` is polled on every tick while the live round is blocked and may
/// supply the missing target coordinate.
pub fn play_session<E, T, W, L>(
    mut engine: SessionEngine,
    runner: &Runner<E, T>,
    round_secs: u64,
    out: &mut W,
    mut locate: L,
) -> Result<PlayOutcome, PlayError>
where
    E: GameEventSource,
    T: Ticker,
    W: Write,
    L: FnMut(&RoundTarget) -> Option<Coordinate>,
{
    while !engine.is_terminal() {
        let index = engine.current_index();
        let round = engine.current_round()?;
        let blocked = !round.is_pending();
        announce_round(out, &engine, round.target())?;

        let mut countdown = if blocked {
            writeln!(out, "No location for this photo yet, waiting...")?;
            None
        } else {
            let countdown = Countdown::from_secs(index, round_secs);
            writeln!(out, "Place your pin as lat,lon ({} left)", countdown.label())?;
            Some(countdown)
        };
        // The countdown follows wall-clock time whatever event woke the loop.
        let mut last = Instant::now();

        loop {
            let event = runner.step();

            if let Some(timer) = countdown.as_mut() {
                let now = Instant::now();
                let tick = timer.tick(now - last);
                last = now;
                if let TimerEvent::Expired { round } = tick {
                    match engine.on_timeout(round, None) {
                        Ok(result) => report_round(out, &engine, &result)?,
                        Err(err) => swallow_stale(err)?,
                    }
                    break;
                }
            }

            match event {
                GameEvent::Tick => {
                    if countdown.is_some() {
                        continue;
                    }
                    let target = engine.current_target()?.clone();
                    if let Some(location) = locate(&target) {
                        engine.attach_location(location)?;
                        let timer = Countdown::from_secs(index, round_secs);
                        writeln!(out, "Location found. Place your pin ({} left)", timer.label())?;
                        countdown = Some(timer);
                        last = Instant::now();
                    }
                }
                GameEvent::Guess(guess) => match engine.submit_guess(guess) {
                    Ok(result) => {
                        if let Some(timer) = countdown.as_mut() {
                            timer.cancel();
                        }
                        report_round(out, &engine, &result)?;
                        break;
                    }
                    Err(GameError::RoundBlocked { .. }) => {
                        writeln!(out, "This round has no location yet, hold on.")?;
                    }
                    Err(err) => swallow_stale(err)?,
                },
                GameEvent::Invalid(reason) => {
                    writeln!(out, "Couldn't read that guess: {reason}")?;
                }
                GameEvent::Quit => {
                    return Ok(PlayOutcome::Quit {
                        completed_rounds: engine.results().len(),
                    });
                }
            }
        }
    }

    let summary = engine.into_summary()?;
    report_summary(out, &summary)?;
    Ok(PlayOutcome::Finished(summary))
}

/// Late or duplicate resolutions are expected when a guess and an expiry
/// race; anything else is a real error.
fn swallow_stale(err: GameError) -> Result<(), GameError> {
    match err {
        GameError::AlreadyResolved { .. } | GameError::SessionFinalized => {
            debug!("ignoring stale resolution: {err}");
            Ok(())
        }
        other => Err(other),
    }
}

fn announce_round<W: Write>(
    out: &mut W,
    engine: &SessionEngine,
    target: &RoundTarget,
) -> std::io::Result<()> {
    writeln!(out)?;
    writeln!(
        out,
        "Round {}/{}",
        engine.current_index() + 1,
        engine.round_count()
    )?;
    if let Some(image) = &target.image {
        writeln!(out, "Photo: {image}")?;
    }
    Ok(())
}

fn report_round<W: Write>(
    out: &mut W,
    engine: &SessionEngine,
    result: &RoundResult,
) -> std::io::Result<()> {
    if result.timed_out {
        writeln!(out, "Time's up! {} points", result.points)?;
    } else if let Some(distance) = result.distance_yards {
        writeln!(
            out,
            "Your guess was {distance} yards from the correct location. {} points",
            result.points
        )?;
    }
    writeln!(out, "Answer: {}", result.target)?;
    if let Some(fact) = &result.annotation {
        writeln!(out, "Fun fact: {fact}")?;
    }
    writeln!(out, "Running total: {}", engine.running_total())
}

fn report_summary<W: Write>(out: &mut W, summary: &SessionSummary) -> std::io::Result<()> {
    writeln!(out)?;
    writeln!(
        out,
        "Your total score was {} points ({:.1}% of {})",
        summary.total_points,
        summary.score_percentage(),
        summary.max_points
    )?;
    for r in &summary.results {
        let distance = r
            .distance_yards
            .map_or_else(|| "-".to_string(), |d| format!("{d} yd"));
        writeln!(
            out,
            "  #{} {:>9} {:>5} pts{}",
            r.round,
            distance,
            r.points,
            if r.timed_out { " (timed out)" } else { "" }
        )?;
    }
    if let Some(view) = summary.map_view() {
        writeln!(out, "Map centre: {}", view.center)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{FixedTicker, TestEventSource};
    use crate::scoring::ScoringPolicy;
    use assert_matches::assert_matches;
    use std::sync::mpsc;
    use std::time::Duration;

    fn coord(lat: f64, lon: f64) -> Coordinate {
        Coordinate::new(lat, lon).unwrap()
    }

    fn engine(targets: Vec<RoundTarget>) -> SessionEngine {
        SessionEngine::start(targets, ScoringPolicy::default()).unwrap()
    }

    #[test]
    fn test_swallow_stale() {
        assert!(swallow_stale(GameError::AlreadyResolved { round: 1 }).is_ok());
        assert!(swallow_stale(GameError::SessionFinalized).is_ok());
        assert!(swallow_stale(GameError::InProgress).is_err());
    }

    #[test]
    fn test_guess_then_timeout() {
        let (tx, rx) = mpsc::channel();
        tx.send(GameEvent::Guess(coord(42.3398, -71.0892))).unwrap();
        let runner = Runner::new(
            TestEventSource::new(rx),
            FixedTicker::new(Duration::from_millis(20)),
        );
        let targets = vec![
            RoundTarget::new(1, coord(42.3398, -71.0892)).with_annotation("Checkerboard lawn"),
            RoundTarget::new(2, coord(42.3400, -71.0900)),
        ];

        let mut out = Vec::new();
        let outcome = play_session(engine(targets), &runner, 1, &mut out, |_| None).unwrap();
        drop(tx);

        let summary = assert_matches!(outcome, PlayOutcome::Finished(s) => s);
        assert_eq!(summary.total_points, 5000);
        assert_eq!(summary.results.len(), 2);
        assert!(summary.results[1].timed_out);

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Fun fact: Checkerboard lawn"));
        assert!(text.contains("Time's up!"));
        assert!(text.contains("Your total score was 5000 points"));
    }

    #[test]
    fn test_quit_mid_session() {
        let (tx, rx) = mpsc::channel();
        tx.send(GameEvent::Invalid("bad".to_string())).unwrap();
        tx.send(GameEvent::Quit).unwrap();
        let runner = Runner::new(
            TestEventSource::new(rx),
            FixedTicker::new(Duration::from_millis(5)),
        );

        let mut out = Vec::new();
        let outcome = play_session(
            engine(vec![RoundTarget::new(1, coord(0.0, 0.0))]),
            &runner,
            45,
            &mut out,
            |_| None,
        )
        .unwrap();

        assert_eq!(outcome, PlayOutcome::Quit { completed_rounds: 0 });
        assert!(String::from_utf8(out).unwrap().contains("Couldn't read that guess"));
    }

    #[test]
    fn test_blocked_round_is_unblocked_by_locator() {
        let (tx, rx) = mpsc::channel();
        tx.send(GameEvent::Guess(coord(1.0, 1.0))).unwrap();
        let runner = Runner::new(
            TestEventSource::new(rx),
            FixedTicker::new(Duration::from_millis(20)),
        );
        let mut blocked = RoundTarget::new(3, coord(1.0, 1.0));
        blocked.location = None;

        let mut polls = 0;
        let mut out = Vec::new();
        let outcome = play_session(engine(vec![blocked]), &runner, 1, &mut out, |_| {
            polls += 1;
            (polls >= 2).then(|| coord(1.0, 1.0))
        })
        .unwrap();
        drop(tx);

        // The early guess is refused, so the unblocked round ends on timeout.
        let summary = assert_matches!(outcome, PlayOutcome::Finished(s) => s);
        assert_eq!(summary.results[0].target, coord(1.0, 1.0));
        assert!(summary.results[0].timed_out);
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("no location yet"));
        assert!(text.contains("Location found"));
    }

    #[test]
    fn test_countdown_runs_while_input_keeps_arriving() {
        let (tx, rx) = mpsc::channel();
        // Bad input arrives faster than the tick interval for longer than
        // the round lasts.
        let chatter = std::thread::spawn(move || {
            for _ in 0..100 {
                if tx.send(GameEvent::Invalid("noise".to_string())).is_err() {
                    return;
                }
                std::thread::sleep(Duration::from_millis(30));
            }
        });
        let runner = Runner::new(
            TestEventSource::new(rx),
            FixedTicker::new(Duration::from_millis(100)),
        );

        let started = Instant::now();
        let mut out = Vec::new();
        let outcome = play_session(
            engine(vec![RoundTarget::new(1, coord(0.0, 0.0))]),
            &runner,
            1,
            &mut out,
            |_| None,
        )
        .unwrap();
        let took = started.elapsed();
        drop(runner);
        chatter.join().unwrap();

        let summary = assert_matches!(outcome, PlayOutcome::Finished(s) => s);
        assert!(summary.results[0].timed_out);
        assert!(took >= Duration::from_millis(950), "expired early after {took:?}");
        assert!(took < Duration::from_millis(1500), "expired late after {took:?}");
    }
}
