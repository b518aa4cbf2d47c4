use std::time::Duration;

/// Product default for one round.
pub const DEFAULT_ROUND_SECS: u64 = 45;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerStatus {
    Running,
    Expired,
    Cancelled,
}

/// What a tick produced. `Expired` is reported at most once per countdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerEvent {
    Running { remaining: Duration },
    Expired { round: usize },
    Idle,
}

/// Per-round countdown.
///
/// The countdown is armed for a specific round index and reports that index
/// when it runs out, so a late expiry can be told apart from the round that
/// is live by the time it is handled.
#[derive(Debug, Clone)]
pub struct Countdown {
    round: usize,
    remaining: Duration,
    status: TimerStatus,
}

impl Countdown {
    pub fn new(round: usize, duration: Duration) -> Self {
        Self {
            round,
            remaining: duration,
            status: TimerStatus::Running,
        }
    }

    pub fn from_secs(round: usize, secs: u64) -> Self {
        Self::new(round, Duration::from_secs(secs))
    }

    pub fn remaining(&self) -> Duration {
        self.remaining
    }

    pub fn status(&self) -> TimerStatus {
        self.status
    }

    pub fn is_running(&self) -> bool {
        self.status == TimerStatus::Running
    }

    pub fn tick(&mut self, elapsed: Duration) -> TimerEvent {
        if self.status != TimerStatus::Running {
            return TimerEvent::Idle;
        }

        self.remaining = self.remaining.saturating_sub(elapsed);
        if self.remaining.is_zero() {
            self.status = TimerStatus::Expired;
            TimerEvent::Expired { round: self.round }
        } else {
            TimerEvent::Running {
                remaining: self.remaining,
            }
        }
    }

    /// Stops the countdown without firing. Has no effect once expired.
    pub fn cancel(&mut self) {
        if self.status == TimerStatus::Running {
            self.status = TimerStatus::Cancelled;
        }
    }

    /// Remaining time as `MM:SS`, rounding partial seconds up.
    pub fn label(&self) -> String {
        let secs = self.remaining.as_secs() + u64::from(self.remaining.subsec_nanos() > 0);
        format!("{:02}:{:02}", secs / 60, secs % 60)
    }
}
