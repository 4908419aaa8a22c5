//! One end-to-end run: launch, checkpoint, focus, drive, judge, checkpoint.

use crate::artifacts::{ArtifactStore, Checkpoint};
use crate::backend::BackendSet;
use crate::chaos::{ChaosEngine, ChaosSummary};
use crate::config::{Mode, RunConfig};
use crate::error::HarnessError;
use crate::focus::{focus, FocusReport};
use crate::navigate::{simple_script, NavigateReport};
use crate::process::ProcessControl;
use crate::target::ApplicationTarget;
use chrono::Utc;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use serde_json::json;
use std::path::PathBuf;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Outcome {
    Success,
    Crash,
}

impl Outcome {
    pub fn exit_code(self) -> i32 {
        match self {
            Outcome::Success => 0,
            Outcome::Crash => 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunResult {
    pub outcome: Outcome,
    /// Captured images in checkpoint order.
    pub artifact_paths: Vec<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum Exercise {
    Simple(NavigateReport),
    Chaos(ChaosSummary),
}

pub struct Orchestrator<P: ProcessControl> {
    processes: P,
    backends: BackendSet,
}

impl<P: ProcessControl> Orchestrator<P> {
    pub fn new(processes: P, backends: BackendSet) -> Self {
        Self {
            processes,
            backends,
        }
    }

    pub fn backends(&self) -> &BackendSet {
        &self.backends
    }

    /// Execute one run. Only a missing or unlaunchable binary, or an unusable
    /// artifact directory, is an error; the outcome itself depends solely on
    /// whether the target is alive when the final checkpoint is taken.
    pub fn run(
        &mut self,
        target: &ApplicationTarget,
        config: &RunConfig,
    ) -> Result<RunResult, HarnessError> {
        let started_at = Utc::now();
        let pid = self.processes.launch(target)?;
        let store = ArtifactStore::prepare(&config.out_dir)?;
        let mut artifact_paths = Vec::new();

        artifact_paths.extend(store.capture(self.backends.capture(), Checkpoint::Startup));

        let focus_report = focus(&self.backends, target, config.timings.focus_settle);

        let exercise = match config.mode {
            Mode::Simple => Exercise::Simple(simple_script(self.backends.input(), &config.timings)),
            Mode::Chaos => {
                let rng = match config.seed {
                    Some(seed) => StdRng::seed_from_u64(seed),
                    None => StdRng::from_entropy(),
                };
                let processes = &mut self.processes;
                let mut is_alive = || processes.is_alive(target);
                let mut engine = ChaosEngine::new(self.backends.input(), rng, &config.timings);
                Exercise::Chaos(engine.run(config.chaos_duration, &mut is_alive))
            }
        };

        let outcome = if self.processes.is_alive(target) {
            info!("RESULT: SUCCESS - app survived");
            Outcome::Success
        } else {
            error!("RESULT: CRASH - app process died");
            Outcome::Crash
        };
        let checkpoint = match outcome {
            Outcome::Success => Checkpoint::Success,
            Outcome::Crash => Checkpoint::Crash,
        };
        artifact_paths.extend(store.capture(self.backends.capture(), checkpoint));

        if config.terminate_after && outcome == Outcome::Success {
            let killed = self.processes.terminate(target);
            info!(killed, "terminated target after run");
        }

        let result = RunResult {
            outcome,
            artifact_paths,
        };
        self.write_report(&store, target, config, pid, started_at, &focus_report, &exercise, &result);
        Ok(result)
    }

    #[allow(clippy::too_many_arguments)]
    fn write_report(
        &self,
        store: &ArtifactStore,
        target: &ApplicationTarget,
        config: &RunConfig,
        pid: u32,
        started_at: chrono::DateTime<Utc>,
        focus_report: &FocusReport,
        exercise: &Exercise,
        result: &RunResult,
    ) {
        let report = json!({
            "target": target,
            "pid": pid,
            "mode": config.mode,
            "seed": config.seed,
            "chaos_duration_secs": config.chaos_duration.as_secs(),
            "timings": config.timings,
            "backends": self.backends.summary(),
            "focus": focus_report,
            "exercise": exercise,
            "outcome": result.outcome,
            "artifact_paths": result.artifact_paths,
            "started_at": started_at.to_rfc3339(),
            "finished_at": Utc::now().to_rfc3339(),
        });
        match store.write_report(&report) {
            Ok(path) => info!(path = %path.display(), "run report written"),
            Err(err) => warn!(error = %format!("{err:#}"), "failed to write run report"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::tests::PngCapture;
    use crate::backend::{BackendOutcome, InputInjector, Key, NoOpInput};
    use crate::config::Timings;
    use serde_json::Value;
    use std::cell::{Cell, RefCell};
    use std::fs;
    use std::rc::Rc;
    use std::time::{Duration, Instant};
    use tempfile::{tempdir, TempDir};

    /// Alive until `dies_after` liveness checks have been answered.
    struct FakeProcesses {
        binary_exists: bool,
        launches: u32,
        checks: Rc<Cell<u32>>,
        dies_after: Option<u32>,
        terminated: bool,
    }

    impl FakeProcesses {
        fn healthy() -> Self {
            Self {
                binary_exists: true,
                launches: 0,
                checks: Rc::new(Cell::new(0)),
                dies_after: None,
                terminated: false,
            }
        }
    }

    impl ProcessControl for FakeProcesses {
        fn launch(&mut self, target: &ApplicationTarget) -> Result<u32, HarnessError> {
            if !self.binary_exists {
                return Err(HarnessError::BinaryNotFound(target.executable.clone()));
            }
            self.launches += 1;
            Ok(4242)
        }

        fn is_alive(&mut self, _target: &ApplicationTarget) -> bool {
            let n = self.checks.get() + 1;
            self.checks.set(n);
            !self.terminated && self.dies_after.map_or(true, |limit| n <= limit)
        }

        fn terminate(&mut self, _target: &ApplicationTarget) -> usize {
            self.terminated = true;
            1
        }
    }

    struct KeyLog(Rc<RefCell<Vec<Key>>>);

    impl InputInjector for KeyLog {
        fn provider(&self) -> &str {
            "keylog"
        }

        fn screen_size(&self) -> BackendOutcome<(u32, u32)> {
            BackendOutcome::Success((1280, 720))
        }

        fn click(&self, _x: i32, _y: i32) -> BackendOutcome {
            BackendOutcome::Success(())
        }

        fn press(&self, key: Key) -> BackendOutcome {
            self.0.borrow_mut().push(key);
            BackendOutcome::Success(())
        }

        fn scroll(&self, _amount: i32) -> BackendOutcome {
            BackendOutcome::TransientFailure("wheel glitch".to_string())
        }
    }

    fn target() -> ApplicationTarget {
        ApplicationTarget::new(
            "/opt/build/betterwallpaper",
            None,
            Some("BetterWallpaper".to_string()),
        )
    }

    fn config(dir: &TempDir, mode: Mode) -> RunConfig {
        RunConfig {
            timings: Timings::immediate(),
            seed: Some(9),
            ..RunConfig::new(mode, dir.path().join("logs"))
        }
    }

    fn pngs_in(dir: &std::path::Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().to_string())
            .filter(|n| n.ends_with(".png"))
            .collect();
        names.sort();
        names
    }

    #[test]
    fn missing_binary_aborts_before_anything_else() {
        let dir = tempdir().unwrap();
        let processes = FakeProcesses {
            binary_exists: false,
            ..FakeProcesses::healthy()
        };
        let checks = Rc::clone(&processes.checks);
        let mut orchestrator =
            Orchestrator::new(processes, BackendSet::new(Box::new(NoOpInput), Box::new(PngCapture), Vec::new()));

        let err = orchestrator.run(&target(), &config(&dir, Mode::Simple)).unwrap_err();
        assert!(matches!(err, HarnessError::BinaryNotFound(_)));
        assert_eq!(checks.get(), 0);
        assert!(!dir.path().join("logs").exists());
    }

    #[test]
    fn simple_run_that_survives_is_success_with_two_screenshots() {
        let dir = tempdir().unwrap();
        let keys = Rc::new(RefCell::new(Vec::new()));
        let backends = BackendSet::new(
            Box::new(KeyLog(Rc::clone(&keys))),
            Box::new(PngCapture),
            Vec::new(),
        );
        let mut orchestrator = Orchestrator::new(FakeProcesses::healthy(), backends);
        let cfg = config(&dir, Mode::Simple);

        let result = orchestrator.run(&target(), &cfg).unwrap();

        assert_eq!(result.outcome, Outcome::Success);
        assert_eq!(
            *keys.borrow(),
            vec![Key::Tab, Key::Tab, Key::Tab, Key::Enter, Key::Tab]
        );
        assert_eq!(
            result.artifact_paths,
            vec![
                cfg.out_dir.join("state_startup.png"),
                cfg.out_dir.join("state_success.png"),
            ]
        );
        assert_eq!(
            pngs_in(&cfg.out_dir),
            vec!["state_startup.png".to_string(), "state_success.png".to_string()]
        );

        let report: Value =
            serde_json::from_str(&fs::read_to_string(cfg.out_dir.join("run_report.json")).unwrap())
                .unwrap();
        assert_eq!(report["outcome"], "SUCCESS");
        assert_eq!(report["exercise"]["kind"], "simple");
        assert_eq!(report["exercise"]["delivered"], 5);
        assert_eq!(report["backends"]["input_injection"], "keylog");
    }

    #[test]
    fn degraded_chaos_detects_death_before_deadline() {
        let dir = tempdir().unwrap();
        let processes = FakeProcesses {
            dies_after: Some(2),
            ..FakeProcesses::healthy()
        };
        let backends = BackendSet::new(Box::new(NoOpInput), Box::new(PngCapture), Vec::new());
        let mut orchestrator = Orchestrator::new(processes, backends);
        let mut cfg = config(&dir, Mode::Chaos);
        cfg.chaos_duration = Duration::from_secs(5);
        cfg.timings.degraded_poll = Duration::from_millis(100);

        let started = Instant::now();
        let result = orchestrator.run(&target(), &cfg).unwrap();

        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(result.outcome, Outcome::Crash);
        assert_eq!(
            result.artifact_paths.last().unwrap(),
            &cfg.out_dir.join("state_crash.png")
        );
        assert!(!cfg.out_dir.join("state_success.png").exists());
    }

    #[test]
    fn full_chaos_run_with_failures_still_succeeds() {
        let dir = tempdir().unwrap();
        let keys = Rc::new(RefCell::new(Vec::new()));
        let backends = BackendSet::new(
            Box::new(KeyLog(Rc::clone(&keys))),
            Box::new(PngCapture),
            Vec::new(),
        );
        let mut orchestrator = Orchestrator::new(FakeProcesses::healthy(), backends);
        let mut cfg = config(&dir, Mode::Chaos);
        cfg.chaos_duration = Duration::from_millis(300);

        let result = orchestrator.run(&target(), &cfg).unwrap();
        assert_eq!(result.outcome, Outcome::Success);

        let report: Value =
            serde_json::from_str(&fs::read_to_string(cfg.out_dir.join("run_report.json")).unwrap())
                .unwrap();
        assert_eq!(report["exercise"]["kind"], "chaos");
        assert_eq!(report["seed"], 9);
    }

    #[test]
    fn outcome_follows_liveness_at_capture_time() {
        let dir = tempdir().unwrap();
        // The single liveness check of a simple run is the final one.
        let processes = FakeProcesses {
            dies_after: Some(0),
            ..FakeProcesses::healthy()
        };
        let mut orchestrator = Orchestrator::new(processes, BackendSet::noop());
        let result = orchestrator.run(&target(), &config(&dir, Mode::Simple)).unwrap();

        assert_eq!(result.outcome, Outcome::Crash);
        assert!(result.artifact_paths.is_empty());
        assert_eq!(Outcome::Crash.exit_code(), 2);
    }

    #[test]
    fn terminate_after_kills_surviving_target() {
        let dir = tempdir().unwrap();
        let mut orchestrator = Orchestrator::new(FakeProcesses::healthy(), BackendSet::noop());
        let mut cfg = config(&dir, Mode::Simple);
        cfg.terminate_after = true;

        let result = orchestrator.run(&target(), &cfg).unwrap();
        assert_eq!(result.outcome, Outcome::Success);
        assert!(orchestrator.processes.terminated);
        assert_eq!(orchestrator.processes.launches, 1);
    }
}
