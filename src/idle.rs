//! Inactivity timers and the cancellable step sequences they trigger.

use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};

/// Settle delay between the visual steps of idle and launch sequences.
pub const SETTLE: Duration = Duration::from_millis(500);

/// Cooperative cancellation flag shared between a sequence and whoever may
/// interrupt it. Checked before every step.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Rc<Cell<bool>>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.set(true);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.get()
    }
}

/// Single-shot countdown re-armed on activity.
#[derive(Debug, Clone)]
pub struct IdleTimer {
    enabled: bool,
    interval: Duration,
    deadline: Option<Instant>,
}

impl IdleTimer {
    pub fn new(enabled: bool, interval: Duration) -> Self {
        IdleTimer {
            enabled,
            interval,
            deadline: None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Restart the countdown from `now`. Disabled timers never arm.
    pub fn arm(&mut self, now: Instant) {
        if self.enabled {
            self.deadline = Some(now + self.interval);
        }
    }

    pub fn disarm(&mut self) {
        self.deadline = None;
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// True exactly once when the deadline has passed.
    pub fn fire(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(d) if now >= d => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequencePoll<S> {
    /// Waiting for the current step's delay.
    Pending,
    /// Run this step, then call `wait` if it needs time.
    Step(S),
    Cancelled,
    Finished,
}

/// A fixed list of steps executed one per poll, with optional waits between
/// them and a cancellation check at every suspension point.
#[derive(Debug, Clone)]
pub struct CancellableSequence<S: Copy + 'static> {
    steps: &'static [S],
    next: usize,
    wake_at: Instant,
    token: CancelToken,
}

impl<S: Copy + 'static> CancellableSequence<S> {
    pub fn start(steps: &'static [S], now: Instant) -> Self {
        CancellableSequence {
            steps,
            next: 0,
            wake_at: now,
            token: CancelToken::new(),
        }
    }

    pub fn token(&self) -> CancelToken {
        self.token.clone()
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn poll(&mut self, now: Instant) -> SequencePoll<S> {
        if self.token.is_cancelled() {
            return SequencePoll::Cancelled;
        }
        if now < self.wake_at {
            return SequencePoll::Pending;
        }
        match self.steps.get(self.next) {
            Some(step) => {
                self.next += 1;
                SequencePoll::Step(*step)
            }
            None => SequencePoll::Finished,
        }
    }

    /// Suspend until `now + delay` before the next step.
    pub fn wait(&mut self, now: Instant, delay: Duration) {
        self.wake_at = now + delay;
    }
}

/// Attract mode: fade out, pick a random game, fade back in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttractStep {
    FadeOut,
    Settle,
    PickRandomGame,
    FadeIn,
    Rearm,
}

pub const ATTRACT_STEPS: &[AttractStep] = &[
    AttractStep::FadeOut,
    AttractStep::Settle,
    AttractStep::PickRandomGame,
    AttractStep::Settle,
    AttractStep::FadeIn,
    AttractStep::Rearm,
];

/// Screen sleep entry and the wake-up that follows the next input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SleepStep {
    FadeOut,
    PowerSave,
    FadeIn,
    Resume,
}

pub const SLEEP_STEPS: &[SleepStep] = &[SleepStep::FadeOut, SleepStep::PowerSave];
pub const WAKE_STEPS: &[SleepStep] = &[SleepStep::FadeIn, SleepStep::Resume];

/// Pick a uniformly random game index other than `current` among those
/// accepted by `eligible`. None when no other eligible game exists.
pub fn pick_random_game<R: rand::Rng + ?Sized>(
    rng: &mut R,
    len: usize,
    current: Option<usize>,
    eligible: impl Fn(usize) -> bool,
) -> Option<usize> {
    let candidates: Vec<usize> = (0..len)
        .filter(|&i| Some(i) != current && eligible(i))
        .collect();
    if candidates.is_empty() {
        return None;
    }
    Some(candidates[rng.gen_range(0..candidates.len())])
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn timer_fires_once_after_interval() {
        let now = Instant::now();
        let mut t = IdleTimer::new(true, Duration::from_secs(10));
        t.arm(now);
        assert!(!t.fire(now + Duration::from_secs(9)));
        assert!(t.fire(now + Duration::from_secs(10)));
        assert!(!t.fire(now + Duration::from_secs(11)));
    }

    #[test]
    fn rearm_pushes_deadline_back() {
        let now = Instant::now();
        let mut t = IdleTimer::new(true, Duration::from_secs(10));
        t.arm(now);
        t.arm(now + Duration::from_secs(8));
        assert!(!t.fire(now + Duration::from_secs(12)));
        assert!(t.fire(now + Duration::from_secs(18)));
    }

    #[test]
    fn disabled_timer_never_arms() {
        let now = Instant::now();
        let mut t = IdleTimer::new(false, Duration::from_secs(1));
        t.arm(now);
        assert_eq!(t.deadline(), None);
        assert!(!t.fire(now + Duration::from_secs(60)));
    }

    #[test]
    fn sequence_honours_waits_and_cancel() {
        let now = Instant::now();
        let mut seq = CancellableSequence::start(ATTRACT_STEPS, now);
        assert_eq!(seq.poll(now), SequencePoll::Step(AttractStep::FadeOut));
        seq.wait(now, Duration::from_secs(1));
        assert_eq!(seq.poll(now + Duration::from_millis(500)), SequencePoll::Pending);
        let later = now + Duration::from_secs(1);
        assert_eq!(seq.poll(later), SequencePoll::Step(AttractStep::Settle));
        let token = seq.token();
        token.cancel();
        assert_eq!(seq.poll(later), SequencePoll::Cancelled);
    }

    #[test]
    fn sequence_finishes_after_last_step() {
        let now = Instant::now();
        let mut seq = CancellableSequence::start(WAKE_STEPS, now);
        assert_eq!(seq.poll(now), SequencePoll::Step(SleepStep::FadeIn));
        assert_eq!(seq.poll(now), SequencePoll::Step(SleepStep::Resume));
        assert_eq!(seq.poll(now), SequencePoll::Finished);
    }

    #[test]
    fn random_pick_never_repeats_current() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..500 {
            let pick = pick_random_game(&mut rng, 5, Some(2), |_| true).unwrap();
            assert_ne!(pick, 2);
        }
    }

    #[test]
    fn random_pick_skips_ineligible_and_handles_single_game() {
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(pick_random_game(&mut rng, 1, Some(0), |_| true), None);
        assert_eq!(pick_random_game(&mut rng, 0, None, |_| true), None);
        assert_eq!(pick_random_game(&mut rng, 3, Some(0), |i| i != 1), Some(2));
    }

    #[test]
    fn random_pick_covers_all_candidates() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut seen = [false; 4];
        for _ in 0..400 {
            seen[pick_random_game(&mut rng, 4, Some(0), |_| true).unwrap()] = true;
        }
        assert_eq!(seen, [false, true, true, true]);
    }
}
