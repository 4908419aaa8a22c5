use crate::backend::{BackendOutcome, InputInjector, Key};
use crate::config::Timings;
use serde::Serialize;
use std::thread;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct NavigateReport {
    pub delivered: u32,
    pub failed: u32,
    /// The injector cannot send keys; nothing was attempted.
    pub unsupported: bool,
}

impl NavigateReport {
    fn absorb(&mut self, other: NavigateReport) {
        self.delivered += other.delivered;
        self.failed += other.failed;
        self.unsupported |= other.unsupported;
    }
}

/// Press Tab `times` times, then Enter if `confirm_at_end`.
///
/// Focus traversal is usually debounced by the UI toolkit, so each Tab is
/// followed by `navigate_pacing`. Individual failures are counted and skipped.
pub fn navigate(
    input: &dyn InputInjector,
    times: u32,
    confirm_at_end: bool,
    timings: &Timings,
) -> NavigateReport {
    info!(
        times,
        confirm = confirm_at_end,
        "navigating: TAB x {times}{}",
        if confirm_at_end { " + ENTER" } else { "" }
    );
    let mut report = NavigateReport::default();

    let mut keys = vec![Key::Tab; times as usize];
    if confirm_at_end {
        keys.push(Key::Enter);
    }

    for key in keys {
        match input.press(key) {
            BackendOutcome::Success(()) => report.delivered += 1,
            BackendOutcome::Unsupported => {
                warn!(provider = input.provider(), "cannot navigate: key injection unavailable");
                report.unsupported = true;
                return report;
            }
            BackendOutcome::TransientFailure(msg) => {
                debug!(?key, error = %msg, "key press failed");
                report.failed += 1;
            }
        }
        if key == Key::Tab {
            thread::sleep(timings.navigate_pacing);
        }
    }

    thread::sleep(timings.navigate_settle);
    report
}

/// The fixed simple-mode regression script: TAB x3 + ENTER, pause, TAB x1.
pub fn simple_script(input: &dyn InputInjector, timings: &Timings) -> NavigateReport {
    info!("running simple navigation test");
    let mut report = navigate(input, 3, true, timings);
    if report.unsupported {
        return report;
    }
    thread::sleep(timings.simple_pause);
    report.absorb(navigate(input, 1, false, timings));
    report
}
