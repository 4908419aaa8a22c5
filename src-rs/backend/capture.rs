use super::command::run_bounded;
use super::{BackendOutcome, Provider, ScreenCapturer};
use std::path::Path;
use std::time::Duration;

fn capture_with(program: &str, mut argv: Vec<String>, out_path: &Path, timeout: Duration) -> BackendOutcome {
    argv.push(out_path.display().to_string());
    match run_bounded(program, &argv, timeout) {
        BackendOutcome::Success(_) if out_path.is_file() => BackendOutcome::Success(()),
        BackendOutcome::Success(_) => BackendOutcome::TransientFailure(format!(
            "{program} exited cleanly but wrote no file at {}",
            out_path.display()
        )),
        other => other.map(|_| ()),
    }
}

/// Wayland full-output capture.
pub struct GrimCapture {
    timeout: Duration,
}

impl GrimCapture {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl ScreenCapturer for GrimCapture {
    fn provider(&self) -> &str {
        Provider::Grim.name()
    }

    fn capture(&self, out_path: &Path) -> BackendOutcome {
        capture_with("grim", Vec::new(), out_path, self.timeout)
    }
}

/// ImageMagick `import` of the X11 root window.
pub struct ImportCapture {
    timeout: Duration,
}

impl ImportCapture {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl ScreenCapturer for ImportCapture {
    fn provider(&self) -> &str {
        Provider::ImageMagickImport.name()
    }

    fn capture(&self, out_path: &Path) -> BackendOutcome {
        capture_with(
            "import",
            vec!["-window".to_string(), "root".to_string()],
            out_path,
            self.timeout,
        )
    }
}

/// macOS `screencapture -x` (no shutter sound).
pub struct ScreencaptureCapture {
    timeout: Duration,
}

impl ScreencaptureCapture {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl ScreenCapturer for ScreencaptureCapture {
    fn provider(&self) -> &str {
        Provider::Screencapture.name()
    }

    fn capture(&self, out_path: &Path) -> BackendOutcome {
        capture_with("screencapture", vec!["-x".to_string()], out_path, self.timeout)
    }
}

pub struct NoOpCapture;

impl ScreenCapturer for NoOpCapture {
    fn provider(&self) -> &str {
        Provider::NoOp.name()
    }

    fn capture(&self, _out_path: &Path) -> BackendOutcome {
        BackendOutcome::Unsupported
    }
}
