//! Rotation state and its single auto-advance timer.
//!
//! `Rotation` is a plain state machine: it never sleeps or spawns. The engine
//! task asks it for [`Rotation::deadline`], waits until then, and feeds the
//! tick back in. Keeping the timer as one `Option` field makes a second live
//! timer unrepresentable; starting while armed is additionally asserted.

use std::sync::Arc;
use std::time::Duration;

use content_model::Settings;
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::slide::{Direction, Slide};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No slides and no timer.
    Idle,
    /// Slides present; the timer runs iff auto-rotation is on.
    Active,
    /// Slides present; the timer is suspended on request.
    Paused,
}

/// What a manual navigation does to the auto-advance countdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ManualNavPolicy {
    /// Leave the recurring timer alone; the next natural tick continues from
    /// the newly selected slide.
    #[default]
    KeepCadence,
    /// Restart the countdown from the moment of the manual action.
    RestartTimer,
}

impl ManualNavPolicy {
    pub fn from_reset_flag(reset_timer_on_manual_nav: bool) -> Self {
        if reset_timer_on_manual_nav {
            Self::RestartTimer
        } else {
            Self::KeepCadence
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Navigation {
    Next,
    Previous,
    JumpTo(usize),
}

/// Counters for diagnostics; `timer_starts - timer_cancels` is the number of
/// armed timers and can only ever be 0 or 1.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RotationStats {
    pub ticks: u64,
    pub auto_advances: u64,
    pub manual_moves: u64,
    pub timer_starts: u64,
    pub timer_cancels: u64,
}

#[derive(Debug, Clone, Copy)]
struct AdvanceTimer {
    due: Instant,
    period: Duration,
}

/// `(i + 1) mod n`, or `None` when there is nothing to advance through.
pub fn next_index(current: usize, len: usize) -> Option<usize> {
    if len == 0 {
        return None;
    }
    Some((current + 1) % len)
}

/// `(i - 1 + n) mod n`, or `None` when there is nothing to step back through.
pub fn previous_index(current: usize, len: usize) -> Option<usize> {
    if len == 0 {
        return None;
    }
    Some((current % len + len - 1) % len)
}

#[derive(Debug)]
pub struct Rotation {
    slides: Arc<[Slide]>,
    current: Option<usize>,
    direction: Direction,
    settings: Settings,
    paused: bool,
    timer: Option<AdvanceTimer>,
    policy: ManualNavPolicy,
    stats: RotationStats,
}

impl Rotation {
    pub fn new(settings: Settings, policy: ManualNavPolicy) -> Self {
        Self {
            slides: Arc::from(Vec::new()),
            current: None,
            direction: Direction::Forward,
            settings,
            paused: false,
            timer: None,
            policy,
            stats: RotationStats::default(),
        }
    }

    pub fn slides(&self) -> &Arc<[Slide]> {
        &self.slides
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current
    }

    pub fn current_slide(&self) -> Option<&Slide> {
        self.current.and_then(|idx| self.slides.get(idx))
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn stats(&self) -> RotationStats {
        self.stats
    }

    pub fn policy(&self) -> ManualNavPolicy {
        self.policy
    }

    pub fn phase(&self) -> Phase {
        if self.slides.is_empty() {
            Phase::Idle
        } else if self.paused {
            Phase::Paused
        } else {
            Phase::Active
        }
    }

    /// When the next auto-advance is due, if a timer is armed.
    pub fn deadline(&self) -> Option<Instant> {
        self.timer.map(|t| t.due)
    }

    pub fn is_timer_armed(&self) -> bool {
        self.timer.is_some()
    }

    /// Replaces settings and slides in one step and re-evaluates the timer.
    ///
    /// The current slide is kept by id when it survives the recomposition;
    /// otherwise the index is clamped to the new length. A commit that leaves
    /// the settings and the sequence of slide ids as they were keeps the
    /// running countdown.
    pub fn commit(&mut self, settings: Settings, slides: Vec<Slide>, now: Instant) {
        let previous_id = self.current_slide().map(|s| s.id.clone());
        let previous_index = self.current;
        let unchanged = settings == self.settings
            && slides.len() == self.slides.len()
            && slides.iter().zip(self.slides.iter()).all(|(a, b)| a.id == b.id);
        let slides: Arc<[Slide]> = Arc::from(slides);

        let current = if slides.is_empty() {
            None
        } else {
            previous_id
                .and_then(|id| slides.iter().position(|s| s.id == id))
                .or_else(|| previous_index.map(|idx| idx.min(slides.len() - 1)))
                .or(Some(0))
        };

        debug!(
            total = slides.len(),
            ?current,
            advance_ms = settings.advance.as_millis() as u64,
            auto_rotate = settings.auto_rotate,
            "rotation committed"
        );

        self.settings = settings;
        self.slides = slides;
        self.current = current;
        if unchanged && self.timer.is_some() == self.should_run() {
            trace!("composition unchanged; countdown kept");
            return;
        }
        self.reschedule(now);
    }

    /// Handles an expired timer. Returns `true` when the slide advanced.
    pub fn tick(&mut self, now: Instant) -> bool {
        let Some(timer) = self.timer else {
            return false;
        };
        if now < timer.due {
            return false;
        }
        self.stats.ticks += 1;

        let Some(target) = self.current.and_then(|idx| next_index(idx, self.slides.len())) else {
            // Armed timers imply slides; stay safe if that ever breaks.
            self.cancel_timer();
            return false;
        };
        self.step(target, Direction::Forward);
        self.stats.auto_advances += 1;

        let mut due = timer.due + timer.period;
        if due <= now {
            due = now + timer.period;
        }
        self.timer = Some(AdvanceTimer { due, ..timer });
        trace!(index = target, "auto-advanced");
        true
    }

    /// Applies a manual navigation request. Out-of-range jumps and requests
    /// against an empty rotation are no-ops and return `false`.
    pub fn navigate(&mut self, request: Navigation, now: Instant) -> bool {
        let len = self.slides.len();
        let Some(current) = self.current else {
            return false;
        };
        let (target, direction) = match request {
            Navigation::Next => match next_index(current, len) {
                Some(idx) => (idx, Direction::Forward),
                None => return false,
            },
            Navigation::Previous => match previous_index(current, len) {
                Some(idx) => (idx, Direction::Backward),
                None => return false,
            },
            Navigation::JumpTo(idx) if idx < len => {
                let direction = if idx >= current {
                    Direction::Forward
                } else {
                    Direction::Backward
                };
                (idx, direction)
            }
            Navigation::JumpTo(idx) => {
                debug!(requested = idx, total = len, "ignoring out-of-range jump");
                return false;
            }
        };

        self.step(target, direction);
        self.stats.manual_moves += 1;
        if self.policy == ManualNavPolicy::RestartTimer && self.timer.is_some() {
            self.reschedule(now);
        }
        true
    }

    /// Suspends auto-advance. Returns `false` if already paused.
    pub fn pause(&mut self, now: Instant) -> bool {
        if self.paused {
            return false;
        }
        self.paused = true;
        self.reschedule(now);
        true
    }

    /// Lifts a pause. Returns `false` if not paused.
    pub fn resume(&mut self, now: Instant) -> bool {
        if !self.paused {
            return false;
        }
        self.paused = false;
        self.reschedule(now);
        true
    }

    /// Drops the timer and all slides; the rotation is `Idle` afterwards.
    pub fn teardown(&mut self) {
        self.cancel_timer();
        self.slides = Arc::from(Vec::new());
        self.current = None;
    }

    /// The only place `current` and `direction` change after a commit.
    fn step(&mut self, index: usize, direction: Direction) {
        debug_assert!(index < self.slides.len());
        self.current = Some(index);
        self.direction = direction;
    }

    fn should_run(&self) -> bool {
        !self.slides.is_empty() && self.settings.auto_rotate && !self.paused
    }

    fn reschedule(&mut self, now: Instant) {
        self.cancel_timer();
        if self.should_run() {
            self.start_timer(now);
        }
    }

    fn cancel_timer(&mut self) {
        if self.timer.take().is_some() {
            self.stats.timer_cancels += 1;
        }
    }

    fn start_timer(&mut self, now: Instant) {
        debug_assert!(
            self.timer.is_none(),
            "rotation timer started while another is armed"
        );
        let period = self.settings.advance;
        self.timer = Some(AdvanceTimer {
            due: now + period,
            period,
        });
        self.stats.timer_starts += 1;
    }
}
