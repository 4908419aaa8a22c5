//! Checkpoint screenshots, their JSON sidecars, and the run report.

use crate::backend::{BackendOutcome, ScreenCapturer};
use crate::error::HarnessError;
use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const IMAGE_EXT: &str = "png";
pub const REPORT_FILE: &str = "run_report.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Checkpoint {
    Startup,
    Success,
    Crash,
}

impl Checkpoint {
    pub const ALL: [Checkpoint; 3] = [Checkpoint::Startup, Checkpoint::Success, Checkpoint::Crash];

    pub fn stem(self) -> &'static str {
        match self {
            Checkpoint::Startup => "state_startup",
            Checkpoint::Success => "state_success",
            Checkpoint::Crash => "state_crash",
        }
    }
}

/// The fixed artifact directory for a run. Checkpoint files have canonical
/// names and are overwritten by every run.
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    /// Create the directory and clear checkpoint files left by an earlier
    /// run, so every file present afterwards belongs to this run. A relative
    /// `dir` is resolved against the working directory once, here.
    pub fn prepare(dir: impl Into<PathBuf>) -> Result<Self, HarnessError> {
        let mut dir = dir.into();
        if dir.is_relative() {
            let cwd = std::env::current_dir().map_err(|source| HarnessError::ArtifactDir {
                path: dir.clone(),
                source,
            })?;
            dir = cwd.join(dir);
        }
        fs::create_dir_all(&dir).map_err(|source| HarnessError::ArtifactDir {
            path: dir.clone(),
            source,
        })?;
        let store = Self { dir };
        for checkpoint in Checkpoint::ALL {
            for path in [store.image_path(checkpoint), store.sidecar_path(checkpoint)] {
                match fs::remove_file(&path) {
                    Ok(()) => {}
                    Err(err) if err.kind() == io::ErrorKind::NotFound => {}
                    Err(source) => {
                        return Err(HarnessError::ArtifactDir { path, source });
                    }
                }
            }
        }
        Ok(store)
    }

    pub fn image_path(&self, checkpoint: Checkpoint) -> PathBuf {
        self.dir.join(format!("{}.{IMAGE_EXT}", checkpoint.stem()))
    }

    pub fn sidecar_path(&self, checkpoint: Checkpoint) -> PathBuf {
        self.dir.join(format!("{}.json", checkpoint.stem()))
    }

    /// Capture one checkpoint. Returns the image path when a file was
    /// written; every failure is logged and absorbed.
    pub fn capture(&self, capturer: &dyn ScreenCapturer, checkpoint: Checkpoint) -> Option<PathBuf> {
        let out_path = self.image_path(checkpoint);
        info!(path = %out_path.display(), "snapshotting");

        match capturer.capture(&out_path) {
            BackendOutcome::Success(()) => {}
            BackendOutcome::Unsupported => {
                info!(?checkpoint, "screenshot functionality unavailable");
                return None;
            }
            BackendOutcome::TransientFailure(msg) => {
                warn!(?checkpoint, provider = capturer.provider(), error = %msg, "screenshot failed");
                return None;
            }
        }

        let payload = capture_sidecar(&out_path, capturer.provider(), checkpoint);
        if let Err(err) = self.write_json(&self.sidecar_path(checkpoint), &payload) {
            warn!(error = %format!("{err:#}"), "failed to write capture sidecar");
        }
        Some(out_path)
    }

    pub fn write_report(&self, report: &Value) -> Result<PathBuf> {
        let path = self.dir.join(REPORT_FILE);
        self.write_json(&path, report)?;
        Ok(path)
    }

    fn write_json(&self, path: &Path, value: &Value) -> Result<()> {
        let mut raw = serde_json::to_string_pretty(value)?;
        raw.push('\n');
        fs::write(path, raw).with_context(|| format!("failed to write {}", path.display()))
    }
}

fn capture_sidecar(out_path: &Path, provider: &str, checkpoint: Checkpoint) -> Value {
    let image_size = match image::image_dimensions(out_path) {
        Ok((w, h)) => Some(json!({ "w": w, "h": h, "units": "px" })),
        Err(err) => {
            warn!(path = %out_path.display(), error = %err, "could not read captured image header");
            None
        }
    };
    json!({
        "image_path": out_path.display().to_string(),
        "checkpoint": checkpoint,
        "provider": provider,
        "captured_at": Utc::now().to_rfc3339(),
        "captured_at_epoch_ms": Utc::now().timestamp_millis(),
        "image_size": image_size,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::backend::NoOpCapture;
    use image::{Rgba, RgbaImage};
    use tempfile::tempdir;

    /// Writes a small solid PNG, like a real screenshot tool would.
    pub(crate) struct PngCapture;

    impl ScreenCapturer for PngCapture {
        fn provider(&self) -> &str {
            "png-fake"
        }

        fn capture(&self, out_path: &Path) -> BackendOutcome {
            match RgbaImage::from_pixel(32, 18, Rgba([20, 40, 60, 255])).save(out_path) {
                Ok(()) => BackendOutcome::Success(()),
                Err(err) => BackendOutcome::TransientFailure(err.to_string()),
            }
        }
    }

    struct BrokenCapture;

    impl ScreenCapturer for BrokenCapture {
        fn provider(&self) -> &str {
            "broken"
        }

        fn capture(&self, _out_path: &Path) -> BackendOutcome {
            BackendOutcome::TransientFailure("display went away".to_string())
        }
    }

    #[test]
    fn capture_writes_image_and_sidecar() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::prepare(dir.path().join("logs")).unwrap();

        let path = store.capture(&PngCapture, Checkpoint::Startup).unwrap();
        assert_eq!(path.file_name().unwrap(), "state_startup.png");
        assert!(path.exists());

        let sidecar: Value =
            serde_json::from_str(&fs::read_to_string(store.sidecar_path(Checkpoint::Startup)).unwrap())
                .unwrap();
        assert_eq!(sidecar["checkpoint"], "startup");
        assert_eq!(sidecar["provider"], "png-fake");
        assert_eq!(sidecar["image_size"]["w"], 32);
        assert_eq!(sidecar["image_size"]["h"], 18);
    }

    #[test]
    fn failed_or_unsupported_capture_yields_no_artifact() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::prepare(dir.path()).unwrap();

        assert!(store.capture(&NoOpCapture, Checkpoint::Success).is_none());
        assert!(store.capture(&BrokenCapture, Checkpoint::Crash).is_none());
        assert!(!store.image_path(Checkpoint::Success).exists());
        assert!(!store.sidecar_path(Checkpoint::Crash).exists());
    }

    #[test]
    fn prepare_clears_previous_checkpoints() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::prepare(dir.path()).unwrap();
        store.capture(&PngCapture, Checkpoint::Crash).unwrap();
        fs::write(dir.path().join("notes.txt"), "keep me").unwrap();

        let store = ArtifactStore::prepare(dir.path()).unwrap();
        assert!(!store.image_path(Checkpoint::Crash).exists());
        assert!(!store.sidecar_path(Checkpoint::Crash).exists());
        assert!(dir.path().join("notes.txt").exists());
    }

    #[test]
    fn prepare_fails_when_dir_is_a_file() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("logs");
        fs::write(&blocker, "").unwrap();
        let err = ArtifactStore::prepare(&blocker).err().unwrap();
        assert!(matches!(err, HarnessError::ArtifactDir { .. }));
    }

    #[test]
    fn report_lands_beside_checkpoints() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::prepare(dir.path().join("nested").join("logs")).unwrap();
        let image = store.capture(&PngCapture, Checkpoint::Startup).unwrap();

        let path = store.write_report(&json!({"outcome": "SUCCESS"})).unwrap();
        assert_eq!(path.parent(), image.parent());
        assert_eq!(path.file_name().unwrap(), REPORT_FILE);

        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.ends_with('\n'));
        let report: Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(report["outcome"], "SUCCESS");
    }

    #[test]
    fn sidecar_points_at_absolute_image_path() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::prepare(dir.path()).unwrap();
        let image = store.capture(&PngCapture, Checkpoint::Success).unwrap();
        assert!(image.is_absolute());

        let sidecar: Value =
            serde_json::from_str(&fs::read_to_string(store.sidecar_path(Checkpoint::Success)).unwrap())
                .unwrap();
        assert_eq!(sidecar["image_path"], image.display().to_string());
    }
}
