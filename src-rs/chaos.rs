//! Time-boxed randomized input ("chaos monkey").
//!
//! With an input injector bound, every tick picks a click, a key press or a
//! scroll uniformly at random. Clicks land in the central half of the screen
//! in each dimension, where the focused application most likely sits,
//! without needing its window geometry. Without an injector the engine only
//! polls liveness and stops as soon as the target disappears.

use crate::backend::{BackendOutcome, InputInjector, Key};
use crate::config::Timings;
use rand::Rng;
use serde::Serialize;
use std::collections::HashSet;
use std::ops::RangeInclusive;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

pub const SCROLL_RANGE: RangeInclusive<i32> = -10..=10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Click,
    KeyPress,
    Scroll,
}

impl ActionKind {
    pub const ALL: [ActionKind; 3] = [ActionKind::Click, ActionKind::KeyPress, ActionKind::Scroll];

    pub fn pick<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self::ALL[rng.gen_range(0..Self::ALL.len())]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChaosAction {
    Click { x: i32, y: i32 },
    KeyPress(Key),
    Scroll(i32),
}

impl ChaosAction {
    /// Concrete parameters for `kind`. `None` for a click when the screen
    /// size is unknown.
    pub fn generate<R: Rng + ?Sized>(
        kind: ActionKind,
        rng: &mut R,
        screen: Option<(u32, u32)>,
    ) -> Option<Self> {
        match kind {
            ActionKind::Click => {
                let (xs, ys) = center_region(screen?);
                Some(ChaosAction::Click {
                    x: rng.gen_range(xs),
                    y: rng.gen_range(ys),
                })
            }
            ActionKind::KeyPress => Some(ChaosAction::KeyPress(
                Key::ALL[rng.gen_range(0..Key::ALL.len())],
            )),
            ActionKind::Scroll => Some(ChaosAction::Scroll(rng.gen_range(SCROLL_RANGE))),
        }
    }

    pub fn kind(&self) -> ActionKind {
        match self {
            ChaosAction::Click { .. } => ActionKind::Click,
            ChaosAction::KeyPress(_) => ActionKind::KeyPress,
            ChaosAction::Scroll(_) => ActionKind::Scroll,
        }
    }
}

/// Inclusive x and y ranges covering the central 50% x 50% of the screen.
pub fn center_region((width, height): (u32, u32)) -> (RangeInclusive<i32>, RangeInclusive<i32>) {
    let w = i32::try_from(width).unwrap_or(i32::MAX);
    let h = i32::try_from(height).unwrap_or(i32::MAX);
    (w / 4..=w / 4 * 3, h / 4..=h / 4 * 3)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChaosMode {
    Full,
    Degraded,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChaosSummary {
    pub mode: ChaosMode,
    pub ticks: u64,
    pub clicks: u64,
    pub key_presses: u64,
    pub scrolls: u64,
    pub failures: u64,
    pub unsupported: u64,
    pub liveness_polls: u64,
    pub target_died: bool,
    pub elapsed_ms: u64,
}

impl ChaosSummary {
    fn new(mode: ChaosMode) -> Self {
        Self {
            mode,
            ticks: 0,
            clicks: 0,
            key_presses: 0,
            scrolls: 0,
            failures: 0,
            unsupported: 0,
            liveness_polls: 0,
            target_died: false,
            elapsed_ms: 0,
        }
    }

    fn delivered(&mut self, kind: ActionKind) {
        match kind {
            ActionKind::Click => self.clicks += 1,
            ActionKind::KeyPress => self.key_presses += 1,
            ActionKind::Scroll => self.scrolls += 1,
        }
    }
}

pub struct ChaosEngine<'a, R: Rng> {
    input: &'a dyn InputInjector,
    rng: R,
    tick: Duration,
    poll: Duration,
}

impl<'a, R: Rng> ChaosEngine<'a, R> {
    pub fn new(input: &'a dyn InputInjector, rng: R, timings: &Timings) -> Self {
        Self {
            input,
            rng,
            tick: timings.chaos_tick,
            poll: timings.degraded_poll,
        }
    }

    /// Run until `duration` has elapsed, or in degraded mode until
    /// `is_alive` reports the target gone. Never fails.
    pub fn run(&mut self, duration: Duration, is_alive: &mut dyn FnMut() -> bool) -> ChaosSummary {
        info!(seconds = duration.as_secs_f64(), "starting chaos run");
        let started = Instant::now();
        let deadline = started + duration;

        let mut summary = if self.input.is_available() {
            self.run_full(deadline)
        } else {
            self.run_degraded(deadline, is_alive)
        };
        summary.elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        info!(
            ticks = summary.ticks,
            failures = summary.failures,
            target_died = summary.target_died,
            "chaos run finished"
        );
        summary
    }

    fn run_full(&mut self, deadline: Instant) -> ChaosSummary {
        let mut summary = ChaosSummary::new(ChaosMode::Full);
        let screen = match self.input.screen_size() {
            BackendOutcome::Success(size) => Some(size),
            BackendOutcome::Unsupported => None,
            BackendOutcome::TransientFailure(msg) => {
                warn!(error = %msg, "could not read screen size; clicks disabled");
                None
            }
        };
        let mut reported_unsupported: HashSet<ActionKind> = HashSet::new();

        while Instant::now() < deadline {
            let kind = ActionKind::pick(&mut self.rng);
            summary.ticks += 1;

            let outcome = match ChaosAction::generate(kind, &mut self.rng, screen) {
                Some(action) => self.inject(action),
                None => BackendOutcome::Unsupported,
            };
            match outcome {
                BackendOutcome::Success(()) => summary.delivered(kind),
                BackendOutcome::Unsupported => {
                    summary.unsupported += 1;
                    if reported_unsupported.insert(kind) {
                        info!(
                            ?kind,
                            provider = self.input.provider(),
                            "action kind unsupported by input backend; skipping it"
                        );
                    }
                }
                BackendOutcome::TransientFailure(msg) => {
                    summary.failures += 1;
                    debug!(?kind, error = %msg, "chaos action failed");
                }
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            thread::sleep(self.tick.min(remaining));
        }
        summary
    }

    fn run_degraded(&mut self, deadline: Instant, is_alive: &mut dyn FnMut() -> bool) -> ChaosSummary {
        warn!("input injection unavailable; degraded chaos run polls liveness only");
        let mut summary = ChaosSummary::new(ChaosMode::Degraded);

        while Instant::now() < deadline {
            summary.liveness_polls += 1;
            if !is_alive() {
                info!("target disappeared during degraded chaos run");
                summary.target_died = true;
                break;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            thread::sleep(self.poll.min(remaining));
        }
        summary
    }

    fn inject(&self, action: ChaosAction) -> BackendOutcome {
        match action {
            ChaosAction::Click { x, y } => self.input.click(x, y),
            ChaosAction::KeyPress(key) => self.input.press(key),
            ChaosAction::Scroll(amount) => self.input.scroll(amount),
        }
    }
}
