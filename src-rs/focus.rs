use crate::backend::{BackendOutcome, BackendSet};
use crate::target::ApplicationTarget;
use serde::Serialize;
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FocusReport {
    /// Provider that reported success, if any.
    pub focused_by: Option<String>,
    /// `(provider, note)` for every strategy that was tried and did not succeed.
    pub skipped: Vec<(String, String)>,
}

/// Bring the target window to the foreground, best effort.
///
/// Strategies are tried in bound order, each at most once; the first success
/// wins. Window managers apply focus asynchronously, so `settle` is slept
/// afterwards whatever happened.
pub fn focus(backends: &BackendSet, target: &ApplicationTarget, settle: Duration) -> FocusReport {
    info!(title = %target.window_title, "focusing window");
    let mut report = FocusReport::default();

    for activator in backends.activators() {
        match activator.activate(&target.window_title) {
            BackendOutcome::Success(()) => {
                debug!(provider = activator.provider(), "window focused");
                report.focused_by = Some(activator.provider().to_string());
                break;
            }
            BackendOutcome::Unsupported => {
                debug!(provider = activator.provider(), "focus strategy unsupported here");
                report
                    .skipped
                    .push((activator.provider().to_string(), "unsupported".to_string()));
            }
            BackendOutcome::TransientFailure(msg) => {
                warn!(provider = activator.provider(), error = %msg, "focus attempt failed");
                report.skipped.push((activator.provider().to_string(), msg));
            }
        }
    }

    if backends.activators().is_empty() {
        info!("no window activation strategy available; skipping focus");
    } else if report.focused_by.is_none() {
        warn!(title = %target.window_title, "window focus might not have taken effect");
    }

    thread::sleep(settle);
    report
}
